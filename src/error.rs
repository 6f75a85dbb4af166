//! Error taxonomy for a proxy session.
//!
//! Every variant maps to the status line the client sees, so a failing
//! session always answers with a well-formed response instead of a dropped
//! connection.

use thiserror::Error;

use crate::http::response::Status;

/// Errors that can occur while serving one client connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Peer closed the stream before a complete line or body arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A request or status line could not be split into its fields.
    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    /// A protocol line exceeded the maximum accepted length.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    /// A header block carried more lines than accepted.
    #[error("more than {0} header lines")]
    TooManyHeaders(usize),

    /// The request is well-formed but unusable (missing host, bad path).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request used a method other than GET.
    #[error("method not implemented: {0}")]
    MethodNotImplemented(String),

    /// The request used a protocol version other than HTTP/1.1.
    #[error("version not supported: {0}")]
    VersionNotSupported(String),

    /// The origin could not be reached.
    #[error("origin {origin} unreachable: {source}")]
    ConnectRefused {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    /// An origin operation did not complete in time.
    #[error("{0} timed out after {1} seconds")]
    Timeout(&'static str, u64),

    /// The origin answered with a status the caller did not expect.
    #[error("unexpected origin status {0}")]
    UnexpectedStatus(u16),

    /// The origin's response head could not be parsed.
    #[error("invalid origin response: {0}")]
    InvalidOriginResponse(String),

    /// Filesystem or socket failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Status reported to the client when this error ends a session.
    pub fn status(&self) -> Status {
        match self {
            ProxyError::MalformedLine(_) | ProxyError::MethodNotImplemented(_) => {
                Status::NotImplemented
            }
            ProxyError::VersionNotSupported(_) => Status::VersionNotSupported,
            ProxyError::BadRequest(_)
            | ProxyError::LineTooLong(_)
            | ProxyError::TooManyHeaders(_) => Status::BadRequest,
            ProxyError::ConnectRefused { .. }
            | ProxyError::UnexpectedStatus(_)
            | ProxyError::InvalidOriginResponse(_)
            | ProxyError::ConnectionClosed => Status::BadGateway,
            ProxyError::Timeout(..) => Status::GatewayTimeout,
            ProxyError::Io(_) => Status::InternalServerError,
        }
    }
}

/// Result type for session operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ProxyError::MalformedLine("GET".into()).status(),
            Status::NotImplemented
        );
        assert_eq!(
            ProxyError::VersionNotSupported("HTTP/1.0".into()).status(),
            Status::VersionNotSupported
        );
        assert_eq!(ProxyError::Timeout("origin connect", 5).status(), Status::GatewayTimeout);
        let refused = ProxyError::ConnectRefused {
            origin: "localhost:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.status(), Status::BadGateway);
        assert_eq!(
            ProxyError::InvalidOriginResponse("garbage".into()).status(),
            Status::BadGateway
        );
        assert_eq!(ProxyError::TooManyHeaders(100).status(), Status::BadRequest);
        assert_eq!(
            ProxyError::Io(std::io::Error::other("disk")).status(),
            Status::InternalServerError
        );
    }
}
