//! Outbound HTTP channel owned by the delivery worker.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ureq::{Agent, AgentBuilder};

use crate::error::{ConfigError, TransportError};

use super::payload::Payload;

/// Delivers one payload and reports the status code the service returned.
///
/// Non-2xx statuses are *not* errors at this level; they are classified by
/// the worker. Only network-level failures produce [`TransportError`].
pub trait Transport: Send + 'static {
    fn send(&mut self, payload: &Payload) -> Result<u16, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &Payload) -> Result<u16, TransportError> {
        (**self).send(payload)
    }
}

/// `POST`s payloads to a fixed URL using a pooled `ureq` agent.
pub struct HttpTransport {
    agent: Agent,
    url: String,
}

impl HttpTransport {
    /// Create a transport for `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Tls`] when `url` is `https://` and the system
    /// TLS connector cannot be created.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let url = url.into();
        let mut builder = AgentBuilder::new().timeout(timeout);
        if url.starts_with("https://") {
            let connector =
                native_tls::TlsConnector::new().map_err(|err| ConfigError::Tls(err.to_string()))?;
            builder = builder.tls_connector(Arc::new(connector));
        }
        Ok(Self {
            agent: builder.build(),
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, err: &ureq::Transport) -> TransportError {
        let url = self.url.clone();
        let message = err.to_string();
        if is_timeout(err) {
            TransportError::Timeout { url, message }
        } else {
            TransportError::Network { url, message }
        }
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, payload: &Payload) -> Result<u16, TransportError> {
        let result = self
            .agent
            .post(&self.url)
            .set("Content-Type", payload.content_type())
            .send_string(payload.body());
        match result {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(ureq::Error::Transport(err)) => Err(self.transport_error(&err)),
        }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

fn is_timeout(err: &ureq::Transport) -> bool {
    std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .is_some_and(|io_err| {
            matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn refused_connection_is_a_network_error() {
        // Bind then drop so the port is very likely closed.
        let port = TcpListener::bind(("127.0.0.1", 0))
            .and_then(|l| l.local_addr())
            .expect("ephemeral port")
            .port();
        let url = format!("http://127.0.0.1:{port}/notices");
        let mut transport = HttpTransport::new(&url, Duration::from_secs(2)).expect("transport");
        let err = transport
            .send(&Payload::new("<notice/>", "text/xml"))
            .expect_err("nothing is listening");
        assert!(matches!(err, TransportError::Network { url: ref u, .. } if *u == url));
    }

    #[test]
    fn https_urls_get_a_tls_connector() {
        let transport = HttpTransport::new("https://example.invalid/notices", Duration::from_secs(1))
            .expect("system TLS connector");
        assert_eq!(transport.url(), "https://example.invalid/notices");
    }
}
