//! Publication routing
//!
//! A pure function over the registry: given a just-appended publication it
//! decides, per subscriber, between live delivery, deferred replay and
//! drop. The caller performs the actual socket writes from the returned
//! plan, so the router itself never blocks.

use crate::registry::Registry;

/// One pending live delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Connection to write the DATA frame to
    pub conn: u64,
    /// Sequence being delivered
    pub sequence: i64,
}

/// Fan a fresh publication out to the topic's subscribers
///
/// - online: schedule a DATA frame and advance the cursor to `sequence`;
/// - offline with store-and-forward: leave the cursor where it is, the
///   reconnect catch-up will replay everything past it;
/// - offline without store-and-forward: advance the cursor (drop).
pub fn fanout(registry: &mut Registry, topic_id: u32, sequence: i64) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    for subscriber in registry.subscribers_mut() {
        let Some(subscription) = subscriber.subscription(topic_id).copied() else {
            continue;
        };
        match subscriber.conn() {
            Some(conn) => {
                subscriber.mark_delivered(topic_id, sequence);
                deliveries.push(Delivery { conn, sequence });
            }
            None if subscription.sf => {}
            None => subscriber.mark_delivered(topic_id, sequence),
        }
    }
    deliveries
}
