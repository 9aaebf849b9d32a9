use crate::frame::Frame;
use crate::provider::ChunkStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Re-frame an upstream chunk stream for the client.
///
/// Chunks are forwarded one at a time in arrival order. An upstream failure
/// becomes a single `Frame::Error`. `Frame::Done` is always the last frame and
/// is sent exactly once. If the consumer goes away the upstream stream is
/// dropped without being drained.
pub fn relay_frames(mut upstream: ChunkStream) -> ReceiverStream<Frame> {
    let (tx, rx) = mpsc::channel::<Frame>(64);

    tokio::spawn(async move {
        let mut forwarded = 0usize;
        loop {
            let item = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!(forwarded, "client disconnected; dropping upstream stream");
                    return;
                }
                item = upstream.next() => item,
            };

            match item {
                Some(Ok(chunk)) => {
                    if chunk.text.is_empty() {
                        continue;
                    }
                    if tx.send(Frame::Content(chunk.text)).await.is_err() {
                        return;
                    }
                    forwarded += 1;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %format!("{e:#}"), forwarded, "upstream failed mid-stream");
                    let _ = tx
                        .send(Frame::Error(format!("The response was interrupted: {e}")))
                        .await;
                    break;
                }
                None => break,
            }
        }

        tracing::debug!(forwarded, "stream complete");
        let _ = tx.send(Frame::Done).await;
    });

    ReceiverStream::new(rx)
}
