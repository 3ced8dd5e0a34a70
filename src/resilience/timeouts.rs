//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound upstream connection establishment by the connect timeout
//! - Keep timeouts distinct from refusals so callers can map them
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A failed connect is terminal for the request; nothing here retries
//! - Timed-out connects become 504 Gateway Timeout, refusals 502 Bad Gateway

use std::time::Duration;

use tokio::net::TcpStream;

/// Failure to reach an upstream.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connection to {addr} timed out after {timeout:?}")]
    TimedOut { addr: String, timeout: Duration },
    #[error("connection to {addr} failed: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Open a TCP connection, giving up after `timeout`.
pub async fn connect(addr: &str, timeout: Duration) -> Result<TcpStream, ConnectError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(ConnectError::Io {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(ConnectError::TimedOut {
            addr: addr.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let stream = connect(&addr, Duration::from_secs(1)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), listener.local_addr().unwrap());
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn refused_connection_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect(&addr, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ConnectError::Io { .. }));
    }
}
