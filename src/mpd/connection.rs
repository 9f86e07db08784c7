//! A single client session with an MPD server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::mpd::codec::{Command, MpdCodec, ReplyLine};
use crate::mpd::error::{MpdError, MpdResult};
use crate::mpd::reply::{self, Record, PLAYLIST_DELIMITERS, SONG_DELIMITERS};
use crate::resilience::timeouts::with_timeout;

/// An open, greeted connection to an MPD server.
///
/// Dropping the value closes the socket. Prefer [`MpdConnection::close`] so
/// the server sees an orderly `close` first.
pub struct MpdConnection {
    framed: Framed<TcpStream, MpdCodec>,
    version: String,
    io_timeout: Duration,
}

impl std::fmt::Debug for MpdConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpdConnection")
            .field("version", &self.version)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

impl MpdConnection {
    /// Connect to `host:port` and read the server greeting.
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> MpdResult<Self> {
        let stream = with_timeout("connect", connect_timeout, async {
            TcpStream::connect((host, port)).await.map_err(MpdError::from)
        })
        .await?;
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream, MpdCodec::new());
        let greeting = with_timeout("greeting", io_timeout, async {
            framed.next().await.ok_or(MpdError::Closed)?
        })
        .await?;

        let version = match greeting {
            ReplyLine::Greeting(version) => version,
            other => {
                return Err(MpdError::Protocol(format!(
                    "expected greeting, got {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            framed,
            version,
            io_timeout,
        })
    }

    /// Protocol version announced by the server.
    pub fn server_version(&self) -> &str {
        &self.version
    }

    /// Send one command and collect its reply until `OK` or `ACK`.
    async fn command(&mut self, command: Command) -> MpdResult<Vec<(String, String)>> {
        let name = command.name();
        let framed = &mut self.framed;

        with_timeout(name, self.io_timeout, async move {
            framed.send(command).await?;

            let mut pairs = Vec::new();
            loop {
                match framed.next().await {
                    Some(Ok(ReplyLine::Pair(key, value))) => pairs.push((key, value)),
                    Some(Ok(ReplyLine::Ok)) => return Ok(pairs),
                    Some(Ok(ReplyLine::Ack(ack))) => return Err(MpdError::Ack(ack)),
                    Some(Ok(ReplyLine::Greeting(_))) => {
                        return Err(MpdError::Protocol("unexpected greeting".into()))
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(MpdError::Closed),
                }
            }
        })
        .await
    }

    async fn simple(&mut self, command: Command) -> MpdResult<()> {
        self.command(command).await.map(|_| ())
    }

    pub async fn password(&mut self, password: &str) -> MpdResult<()> {
        self.simple(Command::new("password").arg(password)).await
    }

    pub async fn ping(&mut self) -> MpdResult<()> {
        self.simple(Command::new("ping")).await
    }

    pub async fn status(&mut self) -> MpdResult<Record> {
        self.command(Command::new("status")).await.map(reply::to_record)
    }

    pub async fn current_song(&mut self) -> MpdResult<Record> {
        self.command(Command::new("currentsong"))
            .await
            .map(reply::to_record)
    }

    /// Start playback, optionally at a playlist position.
    pub async fn play(&mut self, position: Option<u32>) -> MpdResult<()> {
        let command = match position {
            Some(pos) => Command::new("play").arg(pos),
            None => Command::new("play"),
        };
        self.simple(command).await
    }

    pub async fn pause(&mut self) -> MpdResult<()> {
        self.simple(Command::new("pause").arg(1)).await
    }

    pub async fn stop(&mut self) -> MpdResult<()> {
        self.simple(Command::new("stop")).await
    }

    pub async fn next(&mut self) -> MpdResult<()> {
        self.simple(Command::new("next")).await
    }

    pub async fn previous(&mut self) -> MpdResult<()> {
        self.simple(Command::new("previous")).await
    }

    /// Seek within the current song, in seconds.
    pub async fn seek_current(&mut self, seconds: f64) -> MpdResult<()> {
        self.simple(Command::new("seekcur").arg(seconds)).await
    }

    /// Seek within the song with the given id, in seconds.
    pub async fn seek_id(&mut self, song_id: u32, seconds: f64) -> MpdResult<()> {
        self.simple(Command::new("seekid").arg(song_id).arg(seconds))
            .await
    }

    pub async fn set_volume(&mut self, volume: u8) -> MpdResult<()> {
        self.simple(Command::new("setvol").arg(volume)).await
    }

    pub async fn playlist_info(&mut self) -> MpdResult<Vec<Record>> {
        self.command(Command::new("playlistinfo"))
            .await
            .map(|pairs| reply::to_records(pairs, SONG_DELIMITERS))
    }

    pub async fn add(&mut self, uri: &str) -> MpdResult<()> {
        self.simple(Command::new("add").arg(uri)).await
    }

    pub async fn delete(&mut self, position: u32) -> MpdResult<()> {
        self.simple(Command::new("delete").arg(position)).await
    }

    pub async fn clear(&mut self) -> MpdResult<()> {
        self.simple(Command::new("clear")).await
    }

    /// Case-insensitive search across all tags.
    pub async fn search_any(&mut self, query: &str) -> MpdResult<Vec<Record>> {
        self.command(Command::new("search").arg("any").arg(query))
            .await
            .map(|pairs| reply::to_records(pairs, SONG_DELIMITERS))
    }

    pub async fn list_playlists(&mut self) -> MpdResult<Vec<Record>> {
        self.command(Command::new("listplaylists"))
            .await
            .map(|pairs| reply::to_records(pairs, PLAYLIST_DELIMITERS))
    }

    pub async fn set_random(&mut self, enabled: bool) -> MpdResult<()> {
        self.simple(Command::new("random").arg(u8::from(enabled)))
            .await
    }

    pub async fn set_repeat(&mut self, enabled: bool) -> MpdResult<()> {
        self.simple(Command::new("repeat").arg(u8::from(enabled)))
            .await
    }

    /// Say goodbye and shut the socket down.
    ///
    /// The server does not answer `close`, so only the write is awaited.
    pub async fn close(mut self) -> MpdResult<()> {
        let framed = &mut self.framed;
        with_timeout("close", self.io_timeout, async move {
            framed.send(Command::new("close")).await?;
            SinkExt::<Command>::close(framed).await
        })
        .await
    }
}
