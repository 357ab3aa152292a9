//! Subscriber client implementation
//!
//! The read half of the broker connection is pumped by a spawned task into
//! an event channel, so callers can multiplex broker events with their own
//! input without cancellation hazards. Topic ids are learned from TOPIC_ID
//! frames; UNSUBSCRIBE needs them, so unsubscribing a topic the broker
//! never confirmed is reported to the caller instead of sent.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::wire::frame::{read_frame, write_frame};
use crate::wire::{valid_name, Frame};

use super::IDENTITY_MAX;

/// Event produced by the broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The broker assigned (or re-announced) a topic id
    Subscribed { topic: String, topic_id: u32 },
    /// The broker confirmed an unsubscribe
    Unsubscribed { topic: String },
    /// One rendered publication
    Publication { text: String },
    /// The identity is already online elsewhere; the broker closed us
    Duplicate,
    /// The broker connection ended
    Closed,
}

/// A connected subscriber
pub struct SubscriberClient {
    identity: String,
    writer: OwnedWriteHalf,
    frames: mpsc::Receiver<Option<Frame>>,
    ids_by_name: HashMap<String, u32>,
    names_by_id: HashMap<u32, String>,
}

impl SubscriberClient {
    /// Connect to the broker and present `identity`
    pub async fn connect(identity: impl Into<String>, broker: SocketAddr) -> Result<Self> {
        let identity = identity.into();
        if identity.len() > IDENTITY_MAX || !valid_name(&identity) {
            return Err(Error::Config(format!(
                "identity must be 1..={} plain bytes, got {:?}",
                IDENTITY_MAX, identity
            )));
        }

        let stream = TcpStream::connect(broker).await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(error = %e, "could not set TCP_NODELAY");
        }
        let (read_half, mut writer) = stream.into_split();

        write_frame(&mut writer, &Frame::Connect { identity: identity.clone() }).await?;
        tracing::info!(identity = %identity, broker = %broker, "connected");

        let (tx, frames) = mpsc::channel(64);
        tokio::spawn(pump(read_half, tx));

        Ok(Self {
            identity,
            writer,
            frames,
            ids_by_name: HashMap::new(),
            names_by_id: HashMap::new(),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Ask the broker to subscribe this client to a topic
    pub async fn subscribe(&mut self, topic: &str, sf: bool) -> Result<()> {
        if !valid_name(topic) {
            return Err(Error::Config(format!("invalid topic name {:?}", topic)));
        }
        write_frame(
            &mut self.writer,
            &Frame::Subscribe { topic: topic.to_owned(), sf },
        )
        .await?;
        Ok(())
    }

    /// Ask the broker to unsubscribe from a topic, by name
    ///
    /// Returns `Ok(false)` if the topic's id is not known yet (no TOPIC_ID
    /// has been seen for it), in which case nothing is sent.
    pub async fn unsubscribe(&mut self, topic: &str) -> Result<bool> {
        let Some(&topic_id) = self.ids_by_name.get(topic) else {
            return Ok(false);
        };
        write_frame(&mut self.writer, &Frame::Unsubscribe { topic_id }).await?;
        Ok(true)
    }

    /// Wait for the next broker event
    ///
    /// Cancel-safe: frames are buffered by the reader task, so dropping
    /// this future never corrupts the stream.
    pub async fn next_event(&mut self) -> ClientEvent {
        loop {
            let frame = match self.frames.recv().await {
                Some(Some(frame)) => frame,
                Some(None) | None => return ClientEvent::Closed,
            };
            match frame {
                Frame::TopicId { topic, topic_id } => {
                    self.ids_by_name.insert(topic.clone(), topic_id);
                    self.names_by_id.insert(topic_id, topic.clone());
                    return ClientEvent::Subscribed { topic, topic_id };
                }
                Frame::ConfirmUnsubscribe { topic_id } => {
                    let topic = match self.names_by_id.remove(&topic_id) {
                        Some(topic) => {
                            self.ids_by_name.remove(&topic);
                            topic
                        }
                        None => format!("#{}", topic_id),
                    };
                    return ClientEvent::Unsubscribed { topic };
                }
                Frame::Data { text } => return ClientEvent::Publication { text },
                Frame::ConnectDup => return ClientEvent::Duplicate,
                other => {
                    tracing::warn!(frame = ?other, "unexpected frame from broker");
                }
            }
        }
    }
}

/// Reader task: forwards frames until EOF or a decode error
async fn pump(mut reader: OwnedReadHalf, tx: mpsc::Sender<Option<Frame>>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if tx.send(Some(frame)).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "broker stream failed");
                break;
            }
        }
    }
    let _ = tx.send(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn fake_broker() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_presents_identity() {
        let (listener, addr) = fake_broker().await;
        let client = tokio::spawn(SubscriberClient::connect("sub1", addr));

        let (mut broker_side, _) = listener.accept().await.unwrap();
        let frame = read_frame(&mut broker_side).await.unwrap().unwrap();
        assert_eq!(frame, Frame::Connect { identity: "sub1".into() });

        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_identity_limits_enforced() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        assert!(SubscriberClient::connect("elevenchars", addr).await.is_err());
        assert!(SubscriberClient::connect("bad/name", addr).await.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe_flow() {
        let (listener, addr) = fake_broker().await;
        let client = tokio::spawn(SubscriberClient::connect("sub1", addr));
        let (mut broker_side, _) = listener.accept().await.unwrap();
        read_frame(&mut broker_side).await.unwrap().unwrap(); // CONNECT
        let mut client = client.await.unwrap().unwrap();

        // Unsubscribe before any TOPIC_ID: id unknown, nothing sent.
        assert!(!client.unsubscribe("news").await.unwrap());

        client.subscribe("news", true).await.unwrap();
        let frame = read_frame(&mut broker_side).await.unwrap().unwrap();
        assert_eq!(frame, Frame::Subscribe { topic: "news".into(), sf: true });

        write_frame(
            &mut broker_side,
            &Frame::TopicId { topic: "news".into(), topic_id: 3 },
        )
        .await
        .unwrap();
        assert_eq!(
            client.next_event().await,
            ClientEvent::Subscribed { topic: "news".into(), topic_id: 3 }
        );

        // Now the id is known and the unsubscribe goes out.
        assert!(client.unsubscribe("news").await.unwrap());
        let frame = read_frame(&mut broker_side).await.unwrap().unwrap();
        assert_eq!(frame, Frame::Unsubscribe { topic_id: 3 });

        write_frame(&mut broker_side, &Frame::ConfirmUnsubscribe { topic_id: 3 })
            .await
            .unwrap();
        assert_eq!(
            client.next_event().await,
            ClientEvent::Unsubscribed { topic: "news".into() }
        );
    }

    #[tokio::test]
    async fn test_publications_and_close() {
        let (listener, addr) = fake_broker().await;
        let client = tokio::spawn(SubscriberClient::connect("sub1", addr));
        let (mut broker_side, _) = listener.accept().await.unwrap();
        read_frame(&mut broker_side).await.unwrap().unwrap();
        let mut client = client.await.unwrap().unwrap();

        write_frame(
            &mut broker_side,
            &Frame::Data { text: "1.2.3.4:5 - t - INT - 9".into() },
        )
        .await
        .unwrap();
        assert_eq!(
            client.next_event().await,
            ClientEvent::Publication { text: "1.2.3.4:5 - t - INT - 9".into() }
        );

        drop(broker_side);
        assert_eq!(client.next_event().await, ClientEvent::Closed);
    }

    #[tokio::test]
    async fn test_connect_dup_surfaces() {
        let (listener, addr) = fake_broker().await;
        let client = tokio::spawn(SubscriberClient::connect("sub1", addr));
        let (mut broker_side, _) = listener.accept().await.unwrap();
        read_frame(&mut broker_side).await.unwrap().unwrap();
        let mut client = client.await.unwrap().unwrap();

        write_frame(&mut broker_side, &Frame::ConnectDup).await.unwrap();
        assert_eq!(client.next_event().await, ClientEvent::Duplicate);
    }
}
