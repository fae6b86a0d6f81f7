use thiserror::Error;

/// Errors surfaced synchronously at the call that violates a precondition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// String-keyed repositories never register an empty key.
    #[error("flyweight key must not be empty")]
    EmptyKey,

    /// A factory keyed its instance with a string the repository's interner
    /// did not hand out.
    #[error("flyweight key {0:?} is not the interner's canonical string")]
    NonCanonicalKey(String),

    #[error("invalid repository configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
