//! Line codec for the MPD text protocol.
//!
//! Requests are single lines: a command name followed by quoted arguments.
//! Responses are a sequence of `key: value` lines terminated by `OK`, or a
//! single `ACK` line when the command failed. The first line on a fresh
//! connection is the `OK MPD <version>` greeting.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::mpd::error::{AckError, MpdError};

/// Longest reply line accepted from the server.
const MAX_LINE_LENGTH: usize = 64 * 1024;

const GREETING_PREFIX: &str = "OK MPD ";
const ACK_PREFIX: &str = "ACK ";

/// A command to send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Append an argument. Every argument is sent quoted.
    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One decoded line of a server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyLine {
    /// `OK MPD <version>`, sent once after connecting.
    Greeting(String),
    /// Successful end of a reply.
    Ok,
    /// Failed end of a reply.
    Ack(AckError),
    /// A `key: value` line.
    Pair(String, String),
}

/// `tokio_util::codec` implementation for the MPD protocol.
#[derive(Debug, Default)]
pub struct MpdCodec {
    /// Offset up to which the buffer has already been scanned for a newline.
    next_index: usize,
}

impl MpdCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn quote(arg: &str, dst: &mut BytesMut) {
    dst.extend_from_slice(b"\"");
    for ch in arg.chars() {
        if ch == '"' || ch == '\\' {
            dst.extend_from_slice(b"\\");
        }
        let mut buf = [0u8; 4];
        dst.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
    dst.extend_from_slice(b"\"");
}

fn parse_line(line: &str) -> Result<ReplyLine, MpdError> {
    if line == "OK" {
        return Ok(ReplyLine::Ok);
    }
    if let Some(version) = line.strip_prefix(GREETING_PREFIX) {
        return Ok(ReplyLine::Greeting(version.trim().to_string()));
    }
    if let Some(rest) = line.strip_prefix(ACK_PREFIX) {
        return AckError::parse(rest)
            .map(ReplyLine::Ack)
            .ok_or_else(|| MpdError::Protocol(format!("malformed ACK line: {line}")));
    }
    match line.split_once(": ") {
        Some((key, value)) => Ok(ReplyLine::Pair(key.to_string(), value.to_string())),
        None => Err(MpdError::Protocol(format!("unexpected line: {line}"))),
    }
}

impl Decoder for MpdCodec {
    type Item = ReplyLine;
    type Error = MpdError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

        let Some(offset) = newline else {
            if src.len() > MAX_LINE_LENGTH {
                return Err(MpdError::Protocol(format!(
                    "reply line exceeds {MAX_LINE_LENGTH} bytes"
                )));
            }
            self.next_index = src.len();
            return Ok(None);
        };

        let end = self.next_index + offset;
        self.next_index = 0;

        let raw = src.split_to(end);
        src.advance(1);

        let text = String::from_utf8_lossy(&raw);
        parse_line(text.trim_end_matches('\r')).map(Some)
    }
}

impl Encoder<Command> for MpdCodec {
    type Error = MpdError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // A line break inside an argument would start a second command.
        if item.args.iter().any(|arg| arg.contains(|c: char| c == '\n' || c == '\r')) {
            return Err(MpdError::Protocol(format!(
                "argument to {} contains a line break",
                item.name
            )));
        }

        dst.extend_from_slice(item.name.as_bytes());
        for arg in &item.args {
            dst.extend_from_slice(b" ");
            quote(arg, dst);
        }
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(command: Command) -> String {
        let mut buf = BytesMut::new();
        MpdCodec::new().encode(command, &mut buf).unwrap();
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn encodes_bare_command() {
        assert_eq!(encode(Command::new("status")), "status\n");
    }

    #[test]
    fn quotes_and_escapes_arguments() {
        let cmd = Command::new("search").arg("any").arg(r#"say "hi" \o/"#);
        assert_eq!(encode(cmd), "search \"any\" \"say \\\"hi\\\" \\\\o/\"\n");
    }

    #[test]
    fn refuses_line_breaks_in_arguments() {
        for arg in ["x.mp3\nclear", "x.mp3\r\nclear", "\r"] {
            let mut buf = BytesMut::new();
            let result = MpdCodec::new().encode(Command::new("add").arg(arg), &mut buf);
            assert!(matches!(result, Err(MpdError::Protocol(_))), "{arg:?}");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn decodes_reply_sequence() {
        let mut codec = MpdCodec::new();
        let mut buf = BytesMut::from("OK MPD 0.23.5\nvolume: 40\nTitle: a: b\nOK\n");

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ReplyLine::Greeting("0.23.5".into()))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ReplyLine::Pair("volume".into(), "40".into()))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ReplyLine::Pair("Title".into(), "a: b".into()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ReplyLine::Ok));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn waits_for_complete_line() {
        let mut codec = MpdCodec::new();
        let mut buf = BytesMut::from("state: pl");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"ay\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ReplyLine::Pair("state".into(), "play".into()))
        );
    }

    #[test]
    fn decodes_ack() {
        let mut codec = MpdCodec::new();
        let mut buf = BytesMut::from("ACK [50@0] {play} song doesn't exist: \"10\"\n");
        match codec.decode(&mut buf).unwrap() {
            Some(ReplyLine::Ack(ack)) => {
                assert_eq!(ack.code, 50);
                assert_eq!(ack.command, "play");
            }
            other => panic!("expected ACK, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unparseable_line() {
        let mut codec = MpdCodec::new();
        let mut buf = BytesMut::from("garbage\n");
        assert!(matches!(codec.decode(&mut buf), Err(MpdError::Protocol(_))));
    }

    #[test]
    fn rejects_oversized_line() {
        let mut codec = MpdCodec::new();
        let mut buf = BytesMut::from(vec![b'a'; MAX_LINE_LENGTH + 1].as_slice());
        assert!(matches!(codec.decode(&mut buf), Err(MpdError::Protocol(_))));
    }
}
