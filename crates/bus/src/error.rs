use thiserror::Error;

/// Errors that can occur in the watchdog messaging layer.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid subject: {0}")]
    Subject(String),

    #[error("connection timeout after {0:?}")]
    Timeout(std::time::Duration),
}
