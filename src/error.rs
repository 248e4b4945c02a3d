//! Error types.
//!
//! Two families live here:
//!
//! - [`Error`]: infrastructure failures surfaced by fallible crate operations
//!   (binding a port, starting the engine with broken definitions).
//! - [`WsError`]: the outcome of a single dispatched call that did not succeed.
//!   Routing, validation and handler code all speak this type, and
//!   [`Engine::execute`](crate::Engine::execute) is the only place it is
//!   consumed.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::definition::DefinitionError;

/// The error type returned by wsengine's fallible operations.
///
/// Request-level failures never show up here: they become JSON error bodies.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("invalid socket address `{addr}`")]
    InvalidAddress { addr: String },

    #[error("web service definition: {0}")]
    Definition(#[from] DefinitionError),

    #[error("client aborted the request")]
    ClientAborted,
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// One user-facing message.
///
/// Either literal text or a translation key rendered through the
/// [`I18n`](crate::I18n) collaborator with the caller's locale.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    Text(String),
    Key { key: String, args: Vec<String> },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn key<I, A>(key: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: ToString,
    {
        Self::Key {
            key: key.into(),
            args: args.into_iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Key { key, .. } => f.write_str(key),
        }
    }
}

/// Ordered list of messages carried by a bad request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Errors(Vec<Message>);

impl Errors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, message: Message) -> &mut Self {
        self.0.push(message);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }
}

impl From<Message> for Errors {
    fn from(message: Message) -> Self {
        Self(vec![message])
    }
}

impl FromIterator<Message> for Errors {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{message}")?;
        }
        Ok(())
    }
}

// ── WsError ───────────────────────────────────────────────────────────────────

/// Why a dispatched call did not complete normally.
///
/// | Variant | Response |
/// |---|---|
/// | `BadRequest` | `400`, one entry per message |
/// | `Bug` | `400`, the message verbatim, logged as an error |
/// | `Unexpected` | `500`, generic `"Unexpected"` message, cause logged |
/// | `ClientAbort` | nothing; the caller is gone |
///
/// Handlers return it from their closures; `?` works on [`io::Error`] (a
/// broken pipe becomes `ClientAbort`) and on [`anyhow::Error`].
#[derive(Debug, Error)]
pub enum WsError {
    #[error("{0}")]
    BadRequest(Errors),

    /// The action's declared parameters and its handler code disagree.
    #[error("{0}")]
    Bug(String),

    #[error("client disconnected")]
    ClientAbort(#[source] io::Error),

    #[error(transparent)]
    Unexpected(anyhow::Error),
}

impl WsError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(Message::text(message).into())
    }

    pub fn bug(message: impl Into<String>) -> Self {
        Self::Bug(message.into())
    }

    pub fn unexpected<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        let err: anyhow::Error = err.into();
        Self::from(err)
    }

    /// `true` when the failure, or anything in its source chain, is a
    /// client disconnect.
    pub fn is_client_abort(&self) -> bool {
        match self {
            Self::ClientAbort(_) => true,
            Self::Unexpected(err) => err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<io::Error>())
                .any(is_disconnect),
            Self::BadRequest(_) | Self::Bug(_) => false,
        }
    }
}

impl From<Errors> for WsError {
    fn from(errors: Errors) -> Self {
        Self::BadRequest(errors)
    }
}

impl From<io::Error> for WsError {
    fn from(err: io::Error) -> Self {
        if is_disconnect(&err) {
            Self::ClientAbort(err)
        } else {
            Self::Unexpected(err.into())
        }
    }
}

impl From<anyhow::Error> for WsError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<io::Error>() {
            Ok(io) => Self::from(io),
            Err(err) => Self::Unexpected(err),
        }
    }
}

/// I/O error kinds a transport reports when the peer went away mid-write.
pub(crate) fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_pipe_is_a_client_abort() {
        let err = WsError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(err, WsError::ClientAbort(_)));
        assert!(err.is_client_abort());
    }

    #[test]
    fn other_io_errors_are_unexpected() {
        let err = WsError::from(io::Error::other("disk full"));
        assert!(matches!(err, WsError::Unexpected(_)));
        assert!(!err.is_client_abort());
    }

    #[test]
    fn abort_is_found_behind_context() {
        let err = anyhow::Error::new(io::Error::from(io::ErrorKind::ConnectionReset))
            .context("while streaming the report");
        assert!(WsError::from(err).is_client_abort());
    }

    #[derive(Debug, Error)]
    #[error("report export failed")]
    struct ExportFailed(#[source] io::Error);

    #[test]
    fn abort_is_found_in_source_chain() {
        let err = WsError::unexpected(ExportFailed(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(matches!(err, WsError::Unexpected(_)));
        assert!(err.is_client_abort());
    }

    #[test]
    fn message_key_stringifies_arguments() {
        let message = Message::key("bad.request.reason", [3]);
        assert_eq!(
            message,
            Message::Key { key: "bad.request.reason".to_owned(), args: vec!["3".to_owned()] }
        );
    }
}
