//! Shared utilities for integration and load testing.
//!
//! `FakeMpd` is a scriptable MPD server speaking the line protocol over
//! TCP. It counts accepted connections and records every command so tests
//! can assert exactly what reached the backend.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use mpd_gateway::config::GatewayConfig;
use mpd_gateway::http::{AppState, GatewayServer};
use mpd_gateway::lifecycle::Shutdown;

/// How the fake server misbehaves.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Close this many connections right after accepting, before the greeting.
    pub drop_first: usize,
    /// Require this password before any other command.
    pub password: Option<String>,
    /// Answer these commands with an ACK.
    pub ack_on: Vec<&'static str>,
    /// Accept `add` without changing the playlist.
    pub add_is_noop: bool,
    /// Never answer these commands.
    pub stall_on: Vec<&'static str>,
}

#[derive(Debug)]
struct Player {
    playlist: Vec<String>,
    library: Vec<String>,
    current: Option<usize>,
    state: &'static str,
    volume: u8,
    random: bool,
    repeat: bool,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            playlist: Vec::new(),
            library: vec![
                "Beatles/Abbey Road/Come Together.flac".into(),
                "Beatles/Help!/Yesterday.flac".into(),
                "Miles Davis/Kind of Blue/So What.flac".into(),
            ],
            current: None,
            state: "stop",
            volume: 50,
            random: false,
            repeat: false,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    behavior: Behavior,
    connections: AtomicUsize,
    commands: Mutex<Vec<Vec<String>>>,
    player: Mutex<Player>,
}

/// A running fake MPD server.
#[derive(Clone)]
pub struct FakeMpd {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeMpd {
    pub async fn start() -> Self {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            behavior,
            ..Shared::default()
        });

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let seen = accept_shared.connections.fetch_add(1, Ordering::SeqCst);
                if seen < accept_shared.behavior.drop_first {
                    drop(socket);
                    continue;
                }
                let shared = accept_shared.clone();
                tokio::spawn(async move {
                    let _ = serve(socket, shared).await;
                });
            }
        });

        Self { addr, shared }
    }

    /// Connections accepted so far, including dropped ones.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Every command received, as `[name, args...]`.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.shared.commands.lock().unwrap().clone()
    }

    /// Command names received, ignoring the session-level `close`.
    pub fn command_names(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .map(|cmd| cmd[0].clone())
            .filter(|name| name != "close")
            .collect()
    }

    /// Whether exactly this command line was received.
    pub fn saw(&self, command: &[&str]) -> bool {
        self.commands().iter().any(|cmd| cmd == command)
    }

    pub fn set_playlist(&self, uris: &[&str]) {
        let mut player = self.shared.player.lock().unwrap();
        player.playlist = uris.iter().map(|u| u.to_string()).collect();
    }

    pub fn playlist(&self) -> Vec<String> {
        self.shared.player.lock().unwrap().playlist.clone()
    }

    pub fn random(&self) -> bool {
        self.shared.player.lock().unwrap().random
    }

    pub fn repeat(&self) -> bool {
        self.shared.player.lock().unwrap().repeat
    }

    pub fn volume(&self) -> u8 {
        self.shared.player.lock().unwrap().volume
    }
}

/// Split a command line into name and unquoted arguments.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch == ' ' {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if ch == '"' {
            chars.next();
            while let Some(ch) = chars.next() {
                match ch {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' => break,
                    other => token.push(other),
                }
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch == ' ' {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

fn ack(code: u32, command: &str, message: &str) -> String {
    format!("ACK [{code}@0] {{{command}}} {message}\n")
}

fn song_lines(uri: &str, pos: usize) -> String {
    let title = uri.rsplit('/').next().unwrap_or(uri);
    format!("file: {uri}\nTitle: {title}\nPos: {pos}\nId: {}\n", pos + 1)
}

fn respond(shared: &Shared, authed: &mut bool, cmd: &[String]) -> String {
    let name = cmd[0].as_str();
    let arg = |i: usize| cmd.get(i).cloned().unwrap_or_default();

    if name == "password" {
        return match &shared.behavior.password {
            Some(expected) if *expected == arg(1) => {
                *authed = true;
                "OK\n".into()
            }
            _ => ack(3, "password", "incorrect password"),
        };
    }
    if !*authed {
        return ack(4, name, &format!("you don't have permission for \"{name}\""));
    }
    if shared.behavior.ack_on.iter().any(|c| *c == name) {
        return ack(50, name, "No such song");
    }

    let mut player = shared.player.lock().unwrap();
    let mut body = String::new();
    match name {
        "ping" | "pause" | "next" | "previous" | "seekcur" | "seekid" => {}
        "stop" => player.state = "stop",
        "status" => {
            body.push_str(&format!(
                "volume: {}\nrepeat: {}\nrandom: {}\nplaylistlength: {}\nstate: {}\n",
                player.volume,
                u8::from(player.repeat),
                u8::from(player.random),
                player.playlist.len(),
                player.state
            ));
            if let Some(pos) = player.current {
                body.push_str(&format!("song: {pos}\nsongid: {}\n", pos + 1));
            }
        }
        "currentsong" => {
            if let Some(uri) = player.current.and_then(|pos| player.playlist.get(pos)) {
                body.push_str(&song_lines(uri, player.current.unwrap_or_default()));
            }
        }
        "play" => {
            let pos = match cmd.get(1) {
                Some(raw) => raw.parse::<usize>().unwrap_or(usize::MAX),
                None => player.current.unwrap_or(0),
            };
            if pos >= player.playlist.len() {
                return ack(2, "play", "Bad song index");
            }
            player.current = Some(pos);
            player.state = "play";
        }
        "setvol" => player.volume = arg(1).parse().unwrap_or(player.volume),
        "playlistinfo" => {
            for (pos, uri) in player.playlist.iter().enumerate() {
                body.push_str(&song_lines(uri, pos));
            }
        }
        "add" => {
            if !shared.behavior.add_is_noop {
                player.playlist.push(arg(1));
            }
        }
        "delete" => {
            let pos = arg(1).parse::<usize>().unwrap_or(usize::MAX);
            if pos >= player.playlist.len() {
                return ack(2, "delete", "Bad song index");
            }
            player.playlist.remove(pos);
        }
        "clear" => {
            player.playlist.clear();
            player.current = None;
            player.state = "stop";
        }
        "search" => {
            let needle = arg(2).to_lowercase();
            for (pos, uri) in player.library.iter().enumerate() {
                if uri.to_lowercase().contains(&needle) {
                    body.push_str(&song_lines(uri, pos));
                }
            }
        }
        "listplaylists" => {
            body.push_str("playlist: Favourites\nLast-Modified: 2024-01-01T00:00:00Z\n");
            body.push_str("playlist: Jazz\nLast-Modified: 2024-02-01T00:00:00Z\n");
        }
        "random" => player.random = arg(1) == "1",
        "repeat" => player.repeat = arg(1) == "1",
        _ => return ack(5, "", &format!("unknown command \"{name}\"")),
    }
    body.push_str("OK\n");
    body
}

async fn serve(socket: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let (read, mut write) = socket.into_split();
    write.write_all(b"OK MPD 0.23.5\n").await?;

    let mut authed = shared.behavior.password.is_none();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = tokenize(&line);
        if cmd.is_empty() {
            continue;
        }
        shared.commands.lock().unwrap().push(cmd.clone());
        if cmd[0] == "close" {
            break;
        }
        if shared.behavior.stall_on.iter().any(|c| *c == cmd[0]) {
            std::future::pending::<()>().await;
        }

        let reply = respond(&shared, &mut authed, &cmd);
        write.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

/// A port with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gateway config pointing at `mpd`, with fast retries and no rate limits.
pub fn gateway_config(mpd: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.host = mpd.ip().to_string();
    config.backend.port = mpd.port();
    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 0;
    config.retries.max_delay_ms = 0;
    config.timeouts.connect_secs = 2;
    config.timeouts.io_secs = 2;
    config.rate_limit.enabled = false;
    config
}

/// A gateway serving on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestGateway {
    pub async fn start(config: GatewayConfig) -> Self {
        let server = GatewayServer::new(config);
        let state = server.state().clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            state,
            client,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    pub fn active_connections(&self) -> u64 {
        self.state.connections.active_connections()
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
