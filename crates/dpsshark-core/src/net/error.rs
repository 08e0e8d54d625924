use thiserror::Error;

/// Errors returned by link/IP/TCP decoding.
///
/// # Examples
/// ```
/// use dpsshark_core::net::NetError;
///
/// let err = NetError::MissingNetworkLayer;
/// assert!(err.to_string().contains("missing network layer"));
/// ```
#[derive(Debug, Error)]
pub enum NetError {
    #[error("packet slice error: {0}")]
    Slice(String),
    #[error("missing network layer in packet")]
    MissingNetworkLayer,
    #[error("missing IP payload in packet")]
    MissingIpPayload,
    #[error("TCP header error: {0}")]
    TcpHeader(String),
}
