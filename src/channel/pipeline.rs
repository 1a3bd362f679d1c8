//! Background tasks that move frames between the socket and the channel queues.
//!
//! The outbound task owns the writer and the inbound task owns the reader, so
//! sending never waits on receiving and vice versa. Each direction preserves
//! order.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::channel::error::ChannelError;
use crate::channel::protocol::{FrameReader, FrameWriter};

/// What the inbound task publishes: a decrypted payload or the error that stopped it.
pub type Inbound = Result<Vec<u8>, ChannelError>;

/// Drain `queue` into `writer` until every sender is dropped, then close the write half.
///
/// Returns the first write error. Anything still queued at that point is lost.
pub async fn outbound_loop<W>(
    mut writer: FrameWriter<W>,
    mut queue: mpsc::Receiver<Vec<u8>>,
) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0u64;
    while let Some(payload) = queue.recv().await {
        if let Err(e) = writer.write_frame(&payload).await {
            warn!(error = %e, "outbound pipeline stopped");
            queue.close();
            return Err(e);
        }
        sent += 1;
    }

    debug!(sent, "outbound queue closed, shutting down write half");
    writer.shutdown().await
}

/// Read frames from `reader` and publish them to `queue` in arrival order.
///
/// Stops on end-of-stream, on the first read error (which is published before
/// stopping), or when the receiving side of `queue` goes away.
pub async fn inbound_loop<R>(mut reader: FrameReader<R>, queue: mpsc::Sender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let mut received = 0u64;
    loop {
        match reader.read_frame().await {
            Ok(Some(payload)) => {
                received += 1;
                if queue.send(Ok(payload)).await.is_err() {
                    debug!(received, "inbound consumer dropped");
                    return;
                }
            }
            Ok(None) => {
                debug!(received, "peer closed the connection");
                return;
            }
            Err(e) => {
                warn!(error = %e, "inbound pipeline stopped");
                let _ = queue.send(Err(e)).await;
                return;
            }
        }
    }
}
