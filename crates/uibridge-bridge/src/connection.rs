use std::io::Write;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use uibridge_common::mutex_lock_or_recover;
use uibridge_proto::{Reply, SocketStream};

use crate::error::BridgeError;

/// One accepted peer: a driver or an application.
///
/// Holds the write half of the stream (the reader half lives in the
/// server's per-connection loop) plus the pending-reply slot used to
/// correlate a forwarded request with the bytes the app sends back.
/// Handlers reply by writing to the connection; nothing is ever returned
/// through dispatch.
pub struct Connection {
    id: Uuid,
    peer: String,
    writer: Mutex<SocketStream>,
    open: AtomicBool,
    reply: Mutex<ReplySlot>,
    reply_cv: Condvar,
}

#[derive(Default)]
struct ReplySlot {
    active: bool,
    buf: Vec<u8>,
    last_progress: Option<Instant>,
}

/// How a pending forward ended.
#[derive(Debug, PartialEq)]
pub enum ReplyWait {
    /// Accumulated bytes parse as one JSON document.
    Complete(Vec<u8>),
    /// The silence window lapsed; the partial bytes are unusable but
    /// reported for logging.
    TimedOut { partial_len: usize },
    /// The app connection closed while we waited.
    Disconnected,
}

impl Connection {
    /// Wraps an accepted stream. Returns the connection plus the read
    /// half for the caller's reader loop.
    pub fn new(stream: SocketStream, peer: String) -> Result<(Self, SocketStream), BridgeError> {
        let reader = stream.try_clone().map_err(io_err)?;
        Ok((
            Self {
                id: Uuid::new_v4(),
                peer,
                writer: Mutex::new(stream),
                open: AtomicBool::new(true),
                reply: Mutex::new(ReplySlot::default()),
                reply_cv: Condvar::new(),
            },
            reader,
        ))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Writes raw bytes. A failed write marks the connection closed;
    /// the reader loop notices on its next read and runs the disconnect
    /// path exactly once.
    pub fn send(&self, payload: &[u8]) -> Result<(), BridgeError> {
        if !self.is_open() {
            return Err(BridgeError::ConnectionClosed);
        }
        let mut writer = mutex_lock_or_recover(&self.writer);
        if let Err(err) = writer.write_all(payload).and_then(|_| writer.flush()) {
            warn!("write to {} failed: {}", self.peer, err);
            drop(writer);
            self.close();
            return Err(BridgeError::ConnectionClosed);
        }
        Ok(())
    }

    /// Writes a `{status, value}` reply, best effort. Write failures are
    /// logged and swallowed; there is nobody left to tell.
    pub fn send_reply(&self, reply: &Reply) {
        match reply.to_bytes() {
            Ok(bytes) => {
                if self.send(&bytes).is_err() {
                    debug!("reply to {} dropped, connection closed", self.peer);
                }
            }
            Err(err) => warn!("failed to serialize reply: {}", err),
        }
    }

    /// Marks closed, shuts the stream down and wakes any forward parked
    /// on this connection. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            mutex_lock_or_recover(&self.writer).shutdown();
            // Wake under the lock so a waiter cannot miss the transition.
            let _slot = mutex_lock_or_recover(&self.reply);
            self.reply_cv.notify_all();
        }
    }

    /// Claims the reply slot for one forwarded request. Fails when a
    /// forward is already in flight: pipelining on one app connection is
    /// a caller error, surfaced instead of racing.
    pub fn begin_forward(&self) -> Result<ForwardGuard<'_>, ForwardBusy> {
        let mut slot = mutex_lock_or_recover(&self.reply);
        if slot.active {
            return Err(ForwardBusy);
        }
        slot.active = true;
        slot.buf.clear();
        slot.last_progress = Some(Instant::now());
        Ok(ForwardGuard { conn: self })
    }

    /// Hands raw received bytes to the pending forward, if any. Returns
    /// false when no forward is waiting, in which case the caller frames
    /// and dispatches the bytes normally.
    pub fn offer_reply_chunk(&self, bytes: &[u8]) -> bool {
        let mut slot = mutex_lock_or_recover(&self.reply);
        if !slot.active {
            return false;
        }
        slot.buf.extend_from_slice(bytes);
        slot.last_progress = Some(Instant::now());
        self.reply_cv.notify_all();
        true
    }
}

fn io_err(err: uibridge_proto::ProtoError) -> BridgeError {
    BridgeError::Io(std::io::Error::other(err.to_string()))
}

/// Exclusive claim on a connection's reply stream for one forward call.
/// Dropping it releases the slot on every exit path.
pub struct ForwardGuard<'a> {
    conn: &'a Connection,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ForwardBusy;

impl ForwardGuard<'_> {
    /// Blocks until the accumulated bytes parse as one JSON document,
    /// the connection drops, or `silence` passes with no new bytes.
    /// Every arriving fragment restarts the window: a trickling reply
    /// never times out, a stalled one does.
    pub fn wait(&self, silence: Duration) -> ReplyWait {
        let mut slot = mutex_lock_or_recover(&self.conn.reply);
        loop {
            if !slot.buf.is_empty() && serde_json::from_slice::<Value>(&slot.buf).is_ok() {
                return ReplyWait::Complete(std::mem::take(&mut slot.buf));
            }
            if !self.conn.is_open() {
                return ReplyWait::Disconnected;
            }

            let since_progress = slot
                .last_progress
                .map(|t| t.elapsed())
                .unwrap_or(Duration::ZERO);
            let Some(remaining) = silence.checked_sub(since_progress) else {
                return ReplyWait::TimedOut {
                    partial_len: slot.buf.len(),
                };
            };

            let (guard, _timeout) = self
                .conn
                .reply_cv
                .wait_timeout(slot, remaining)
                .unwrap_or_else(|poisoned| {
                    warn!("recovering from poisoned reply slot");
                    poisoned.into_inner()
                });
            slot = guard;
        }
    }
}

impl Drop for ForwardGuard<'_> {
    fn drop(&mut self) {
        let mut slot = mutex_lock_or_recover(&self.conn.reply);
        slot.active = false;
        slot.buf.clear();
        slot.last_progress = None;
    }
}
