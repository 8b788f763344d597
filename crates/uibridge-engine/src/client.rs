use std::io::{Read, Write};

use tracing::{debug, info, warn};

use uibridge_common::{is_failure, status_name};
use uibridge_proto::{
    Endpoint, FrameDecoder, Message, SocketStream, app_connect_payload,
};

use crate::error::EngineError;
use crate::router::EngineRouter;

const READ_CHUNK: usize = 4096;

/// The app side of the wire: connects back to the bridge, registers its
/// app name, then serves forwarded actions until the bridge drops the
/// connection or a `quit` arrives.
pub struct EngineClient {
    endpoint: Endpoint,
    app_name: String,
    router: EngineRouter,
}

impl EngineClient {
    pub fn new(endpoint: Endpoint, app_name: &str, router: EngineRouter) -> Self {
        Self {
            endpoint,
            app_name: app_name.to_string(),
            router,
        }
    }

    /// Connects, registers, and serves. Returns when the bridge closes
    /// the stream or after replying to a `quit` action.
    pub fn run(&self) -> Result<(), EngineError> {
        let mut stream = SocketStream::connect(&self.endpoint)?;
        stream.write_all(&app_connect_payload(&self.app_name))?;
        stream.flush()?;
        info!(app = %self.app_name, endpoint = %self.endpoint, "registered with bridge");

        let mut decoder = FrameDecoder::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                info!(app = %self.app_name, "bridge closed the connection");
                return Ok(());
            }

            for frame in decoder.feed(&chunk[..n])? {
                if self.serve_frame(&mut stream, &frame)? {
                    return Ok(());
                }
            }
        }
    }

    /// Dispatches one frame and writes the reply. Returns true on `quit`,
    /// after the acknowledgement has gone out.
    fn serve_frame(&self, stream: &mut SocketStream, frame: &[u8]) -> Result<bool, EngineError> {
        let call = match Message::classify_bytes(frame)? {
            Message::Action(call) => call,
            other => {
                warn!(?other, "ignoring non-action frame from bridge");
                return Ok(false);
            }
        };

        debug!(action = %call.action, "serving forwarded action");
        let reply = self.router.dispatch(&call);
        if is_failure(reply.status) {
            debug!(
                action = %call.action,
                outcome = status_name(reply.status),
                "action did not succeed"
            );
        }
        stream.write_all(&reply.to_bytes()?)?;
        stream.flush()?;
        Ok(call.action == "quit")
    }
}
