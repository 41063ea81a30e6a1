//! Error types for the IC-706 bridge.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Startup failures (serial open, GPIO
//! export, socket bind) and transient data-path failures are both captured
//! here; the bridge decides which of them are fatal.

/// The error type for all bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// The PWK GPIO line could not be initialised or driven.
    #[error("gpio error: {0}")]
    Gpio(String),

    /// An invalid configuration value was supplied.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A write did not complete within its deadline.
    ///
    /// Usually a network client that stopped reading while its socket
    /// buffer filled up.
    #[error("timeout waiting for write")]
    Timeout,

    /// The peer closed or reset the connection.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Map a data-path I/O error to the appropriate [`Error`] variant.
///
/// Resets, aborts and broken pipes mean the peer is gone; everything else
/// is reported as a plain I/O error.
pub fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_gpio() {
        let e = Error::Gpio("export failed".into());
        assert_eq!(e.to_string(), "gpio error: export failed");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("poll interval must be non-zero".into());
        assert_eq!(
            e.to_string(),
            "invalid parameter: poll interval must be non-zero"
        );
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for write");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("denied"));
    }

    #[test]
    fn map_io_error_peer_gone() {
        for kind in [
            std::io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::ConnectionAborted,
        ] {
            let e = map_io_error(std::io::Error::new(kind, "gone"));
            assert!(matches!(e, Error::ConnectionLost), "kind {kind:?}");
        }
    }

    #[test]
    fn map_io_error_other_is_io() {
        let e = map_io_error(std::io::Error::other("weird"));
        assert!(matches!(e, Error::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
