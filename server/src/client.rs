use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::time::timeout;
use uuid::Uuid;

use four_row_core::protocol::decode_line;

use crate::server::{Disposition, SharedState};

/// How long one read may block before the worker rechecks the liveness
/// flag. Keeps shutdown responsive without any cancellation machinery.
const READ_POLL: Duration = Duration::from_secs(1);

/// Read worker for one connection: accumulates bytes, splits them on the
/// line delimiter, decodes each line and feeds the dispatcher. However
/// the loop ends (peer close, transport error, quit, shutdown), the
/// disconnect path runs exactly once before the task exits.
pub struct Connection {
    id: Uuid,
    read: OwnedReadHalf,
    state: SharedState,
    running: Arc<AtomicBool>,
}

impl Connection {
    pub fn new(
        id: Uuid,
        read: OwnedReadHalf,
        state: SharedState,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            read,
            state,
            running,
        }
    }

    pub async fn run(mut self) {
        if let Err(err) = self.read_loop().await {
            // Whatever went wrong stays confined to this connection; the
            // listener and the other player are unaffected.
            log::error!("client connection error: {err:#}");
        }
        self.state.lock().await.handle_disconnection(self.id).await;
    }

    async fn read_loop(&mut self) -> anyhow::Result<()> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 1024];

        while self.running.load(Ordering::SeqCst) {
            let read = match timeout(READ_POLL, self.read.read(&mut chunk)).await {
                // Bounded wait elapsed: go around and recheck the flag.
                Err(_) => continue,
                // Zero-byte read: the peer closed the connection.
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(read)) => read,
                Ok(Err(err)) => return Err(err.into()),
            };

            buffer.extend_from_slice(&chunk[..read]);
            while let Some(delimiter) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=delimiter).collect();
                let line = &line[..line.len() - 1];
                if line.is_empty() {
                    continue;
                }
                match decode_line(line) {
                    Ok(message) => {
                        let disposition =
                            self.state.lock().await.handle_message(self.id, message).await;
                        if disposition == Disposition::Close {
                            return Ok(());
                        }
                    }
                    // One bad line costs the line, not the connection.
                    Err(err) => log::warn!("discarding malformed message: {err}"),
                }
            }
        }
        Ok(())
    }
}
