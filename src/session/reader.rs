//! Connection reader task
//!
//! Owns the read half of one subscriber socket: decodes frames and forwards
//! them to the broker task. The task ends on EOF, on a decode error (the
//! stream cannot be resynchronized past one) or when the broker goes away;
//! in every case a final `Closed` event is emitted.

use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::wire::frame::read_frame;

use super::ConnEvent;

/// Pump frames from `reader` into the broker's event channel
pub async fn run_reader<R>(conn: u64, mut reader: R, events: mpsc::Sender<ConnEvent>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if events.send(ConnEvent::Frame { conn, frame }).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(conn, error = %e, "stream read failed");
                break;
            }
        }
    }
    let _ = events.send(ConnEvent::Closed { conn }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::write_frame;
    use crate::wire::Frame;

    #[tokio::test]
    async fn test_frames_then_closed_on_eof() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Frame::Connect { identity: "sub1".into() })
            .await
            .unwrap();
        write_frame(&mut buf, &Frame::Subscribe { topic: "news".into(), sf: true })
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        run_reader(7, std::io::Cursor::new(buf), tx).await;

        match rx.recv().await.unwrap() {
            ConnEvent::Frame { conn, frame } => {
                assert_eq!(conn, 7);
                assert_eq!(frame, Frame::Connect { identity: "sub1".into() });
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            ConnEvent::Frame { .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), ConnEvent::Closed { conn: 7 }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_garbage_closes_the_connection() {
        let buf = vec![0xEEu8, 1, 2, 3];
        let (tx, mut rx) = mpsc::channel(8);
        run_reader(3, std::io::Cursor::new(buf), tx).await;
        assert!(matches!(rx.recv().await.unwrap(), ConnEvent::Closed { conn: 3 }));
    }
}
