//! Registry implementation

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::Path;

use crate::fs::Sandbox;
use crate::journal::TopicJournal;

use super::error::RegistryError;
use super::subscriber::Subscriber;
use super::topic::Topic;

/// Central store for topics and subscribers
///
/// Owned by the broker task; every method takes `&mut self` or `&self`
/// directly. Topic ids are dense and monotonic from 0, and the name ↔ id
/// mapping is a bijection for the lifetime of the broker.
#[derive(Debug)]
pub struct Registry {
    sandbox: Sandbox,
    window_capacity: usize,
    topics: HashMap<u32, Topic>,
    ids_by_name: HashMap<String, u32>,
    next_topic_id: u32,
    subscribers: HashMap<String, Subscriber>,
    identities_by_conn: HashMap<u64, String>,
}

impl Registry {
    /// Create a registry with journals rooted at `data_dir`
    pub fn new(data_dir: impl AsRef<Path>, window_capacity: usize) -> io::Result<Self> {
        Ok(Self {
            sandbox: Sandbox::new(data_dir.as_ref())?,
            window_capacity,
            topics: HashMap::new(),
            ids_by_name: HashMap::new(),
            next_topic_id: 0,
            subscribers: HashMap::new(),
            identities_by_conn: HashMap::new(),
        })
    }

    /// Look up or create a topic by name, returning its id
    ///
    /// Idempotent: an existing name returns the existing id without
    /// renumbering anything.
    pub fn add_topic(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids_by_name.get(name) {
            return id;
        }

        let id = self.next_topic_id;
        self.next_topic_id += 1;

        // The backing file is created (and any stale contents from an
        // earlier run truncated) through the sandbox. Topic names are
        // validated at decode time, so this only fails on filesystem
        // problems; fall back to an id-derived file name.
        let path = match self.sandbox.create_file(name) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(topic = %name, error = %e, "could not create journal file");
                self.sandbox.root().join(format!("topic-{}", id))
            }
        };
        let journal = TopicJournal::new(path, self.window_capacity);

        self.topics.insert(id, Topic::new(id, name, journal));
        self.ids_by_name.insert(name.to_owned(), id);
        tracing::debug!(topic = %name, id, "topic created");
        id
    }

    pub fn topic(&self, id: u32) -> Option<&Topic> {
        self.topics.get(&id)
    }

    pub fn topic_mut(&mut self, id: u32) -> Option<&mut Topic> {
        self.topics.get_mut(&id)
    }

    pub fn topic_id(&self, name: &str) -> Option<u32> {
        self.ids_by_name.get(name).copied()
    }

    pub fn topic_name(&self, id: u32) -> Option<&str> {
        self.topics.get(&id).map(Topic::name)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber_exists(&self, identity: &str) -> bool {
        self.subscribers.contains_key(identity)
    }

    /// Register a new subscriber record (offline until bound)
    pub fn add_subscriber(&mut self, identity: &str) {
        self.subscribers
            .entry(identity.to_owned())
            .or_insert_with(|| Subscriber::new(identity));
    }

    pub fn subscriber(&self, identity: &str) -> Option<&Subscriber> {
        self.subscribers.get(identity)
    }

    pub fn subscriber_mut(&mut self, identity: &str) -> Option<&mut Subscriber> {
        self.subscribers.get_mut(identity)
    }

    /// Attach a connection to a subscriber and index it
    pub fn bind_subscriber(
        &mut self,
        identity: &str,
        conn: u64,
        addr: SocketAddr,
    ) -> Result<(), RegistryError> {
        let subscriber = self
            .subscribers
            .get_mut(identity)
            .ok_or_else(|| RegistryError::UnknownSubscriber(identity.to_owned()))?;
        if subscriber.is_online() {
            return Err(RegistryError::DuplicateIdentity(identity.to_owned()));
        }
        subscriber.bind(conn, addr);
        self.identities_by_conn.insert(conn, identity.to_owned());
        Ok(())
    }

    pub fn subscriber_by_conn(&self, conn: u64) -> Option<&Subscriber> {
        let identity = self.identities_by_conn.get(&conn)?;
        self.subscribers.get(identity)
    }

    pub fn subscriber_by_conn_mut(&mut self, conn: u64) -> Option<&mut Subscriber> {
        let identity = self.identities_by_conn.get(&conn)?;
        self.subscribers.get_mut(identity)
    }

    pub fn identity_by_conn(&self, conn: u64) -> Option<&str> {
        self.identities_by_conn.get(&conn).map(String::as_str)
    }

    /// Mark the subscriber on `conn` offline, keeping its subscriptions
    ///
    /// Returns the identity that was detached, if the connection was bound.
    pub fn disconnect_by_conn(&mut self, conn: u64) -> Option<String> {
        let identity = self.identities_by_conn.remove(&conn)?;
        if let Some(subscriber) = self.subscribers.get_mut(&identity) {
            subscriber.disconnect();
        }
        Some(identity)
    }

    /// Iterate every subscriber mutably (used by the router)
    pub fn subscribers_mut(&mut self) -> impl Iterator<Item = &mut Subscriber> {
        self.subscribers.values_mut()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drain every journal window to disk (shutdown path)
    pub fn flush_all(&mut self) {
        for topic in self.topics.values_mut() {
            topic.journal.flush();
        }
    }
}
