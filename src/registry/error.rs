//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A CONNECT named an identity that is already online
    #[error("identity {0:?} is already connected")]
    DuplicateIdentity(String),

    /// An operation addressed an identity that was never registered
    #[error("unknown subscriber {0:?}")]
    UnknownSubscriber(String),
}
