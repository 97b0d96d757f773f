use std::io;

use thiserror::Error;

/// Errors surfaced when setting up a match session.
///
/// Everything past setup is reported through return values and the log:
/// transport faults degrade to failed sends and closed peers, protocol
/// faults are dropped lines, and state-machine misuse is a typed no-op.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The listening endpoint could not be opened.
    #[error("could not open listening endpoint: {0}")]
    Bind(#[source] io::Error),
    /// The outbound connection could not be established. Retryable: the
    /// joining player can try again once the host is reachable.
    #[error("could not connect to host: {0}")]
    Connect(#[source] io::Error),
    /// The typed match code is not a 5-digit decimal string.
    #[error("invalid match code `{0}`: expected exactly five digits")]
    InvalidMatchCode(String),
}
