use thiserror::Error;

/// Errors raised while turning key path text into something a value can watch.
///
/// Both kinds surface at [`ObservableBox`](crate::ObservableBox) construction,
/// before any watch is registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid key path '{path}': {reason}")]
    InvalidKeyPath { path: String, reason: &'static str },

    #[error("key path '{path}' is not an observable property of {owner}")]
    UnknownKeyPath { path: String, owner: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
