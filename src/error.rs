use thiserror::Error;

/// Failures of the update protocol. Everything below the HTTP boundary
/// returns these typed; only the handler maps them to a response.
///
/// Missing configuration is not represented here: it fails the process at
/// startup, before any request is served.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("credential acquisition failed: {0}")]
    Credential(String),

    #[error("failed to read DNS record: {0}")]
    StoreRead(String),

    #[error("failed to write DNS record: {0}")]
    StoreWrite(String),

    /// The record's version tag changed between read and write. Never
    /// retried within an invocation; the caller's next poll converges.
    #[error("record changed concurrently, version tag no longer matches")]
    ConcurrencyConflict,

    /// Request never reached the remote service, or the response could not
    /// be read.
    #[error("transport error: {0}")]
    Transport(String),
}

impl UpdateError {
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    pub fn store_read(msg: impl Into<String>) -> Self {
        Self::StoreRead(msg.into())
    }

    pub fn store_write(msg: impl Into<String>) -> Self {
        Self::StoreWrite(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
