use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::ProtoError;
use crate::frame::FrameDecoder;
use crate::message::{ActionCall, Message, Reply, app_connect_payload};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const READ_CHUNK: usize = 4096;

/// A connected byte stream to the bridge, TCP or unix. Used by the
/// driver client below and by the engine's connect-back loop.
pub enum SocketStream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl SocketStream {
    pub fn connect(endpoint: &Endpoint) -> Result<Self, ProtoError> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpStream::connect(addr)?)),
            Endpoint::Unix(path) => Ok(Self::Unix(UnixStream::connect(path)?)),
        }
    }

    pub fn try_clone(&self) -> Result<Self, ProtoError> {
        match self {
            Self::Tcp(s) => Ok(Self::Tcp(s.try_clone()?)),
            Self::Unix(s) => Ok(Self::Unix(s.try_clone()?)),
        }
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ProtoError> {
        match self {
            Self::Tcp(s) => s.set_read_timeout(timeout)?,
            Self::Unix(s) => s.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), ProtoError> {
        match self {
            Self::Tcp(s) => s.set_write_timeout(timeout)?,
            Self::Unix(s) => s.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = match self {
            Self::Tcp(s) => s.shutdown(std::net::Shutdown::Both),
            Self::Unix(s) => s.shutdown(std::net::Shutdown::Both),
        };
    }
}

impl From<TcpStream> for SocketStream {
    fn from(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }
}

impl From<UnixStream> for SocketStream {
    fn from(stream: UnixStream) -> Self {
        Self::Unix(stream)
    }
}

impl Read for SocketStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            Self::Unix(s) => s.read(buf),
        }
    }
}

impl Write for SocketStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            Self::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            Self::Unix(s) => s.flush(),
        }
    }
}

/// Blocking test-driver client: one action out, one reply back.
///
/// Frames other than replies arriving on the stream are skipped; the
/// driver side of the wire only ever expects `{status, value}` back.
pub struct DriverClient {
    stream: SocketStream,
    decoder: FrameDecoder,
    // Frames decoded but not yet consumed by read_reply.
    pending: std::collections::VecDeque<Vec<u8>>,
}

impl DriverClient {
    pub fn connect(endpoint: &Endpoint) -> Result<Self, ProtoError> {
        let stream = SocketStream::connect(endpoint)?;
        stream.set_read_timeout(Some(DEFAULT_READ_TIMEOUT))?;
        stream.set_write_timeout(Some(DEFAULT_WRITE_TIMEOUT))?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
            pending: std::collections::VecDeque::new(),
        })
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Result<Self, ProtoError> {
        self.stream.set_read_timeout(Some(timeout))?;
        Ok(self)
    }

    /// Registers this connection under `app_name` on the bridge. No reply
    /// is expected.
    pub fn declare(&mut self, app_name: &str) -> Result<(), ProtoError> {
        let payload = app_connect_payload(app_name);
        self.send_raw(&payload)
    }

    pub fn call(&mut self, action: &str, params: Vec<Value>) -> Result<Reply, ProtoError> {
        let call = ActionCall::new(action, params);
        self.send_raw(&call.to_bytes()?)?;
        self.read_reply()
    }

    pub fn send_raw(&mut self, payload: &[u8]) -> Result<(), ProtoError> {
        self.stream.write_all(payload)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Reads frames until one classifies as a reply.
    pub fn read_reply(&mut self) -> Result<Reply, ProtoError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            while let Some(frame) = self.pending.pop_front() {
                if let Ok(Message::Reply(reply)) = Message::classify_bytes(&frame) {
                    return Ok(reply);
                }
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(ProtoError::ConnectionClosed);
            }
            self.pending.extend(self.decoder.feed(&chunk[..n])?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::net::UnixListener;
    use std::thread;

    fn unix_endpoint(dir: &tempfile::TempDir) -> Endpoint {
        Endpoint::Unix(dir.path().join("bridge.sock"))
    }

    #[test]
    fn test_call_round_trip_over_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = unix_endpoint(&dir);
        let Endpoint::Unix(path) = &endpoint else {
            unreachable!()
        };
        let listener = UnixListener::bind(path).unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut decoder = FrameDecoder::new();
            let mut chunk = [0u8; 256];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                let frames = decoder.feed(&chunk[..n]).unwrap();
                if let Some(frame) = frames.first() {
                    let call: ActionCall = serde_json::from_slice(frame).unwrap();
                    assert_eq!(call.action, "ping");
                    stream
                        .write_all(&Reply::ok(json!("pong")).to_bytes().unwrap())
                        .unwrap();
                    break;
                }
            }
        });

        let mut client = DriverClient::connect(&endpoint).unwrap();
        let reply = client.call("ping", vec![]).unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.value, json!("pong"));
        server.join().unwrap();
    }

    #[test]
    fn test_read_reply_skips_non_reply_frames() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = unix_endpoint(&dir);
        let Endpoint::Unix(path) = &endpoint else {
            unreachable!()
        };
        let listener = UnixListener::bind(path).unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            // Noise frame first, then the actual reply, concatenated.
            stream
                .write_all(br#"{"hello":"noise"}{"status":0,"value":"real"}"#)
                .unwrap();
        });

        let mut client = DriverClient::connect(&endpoint).unwrap();
        let reply = client.read_reply().unwrap();
        assert_eq!(reply.value, json!("real"));
        server.join().unwrap();
    }

    #[test]
    fn test_connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DriverClient::connect(&unix_endpoint(&dir)).is_err());
    }
}
