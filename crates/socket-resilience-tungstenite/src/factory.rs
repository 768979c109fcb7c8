use crate::transport::TungsteniteTransport;
use socket_resilience_reconnect::{
    ConnectRequest, Transport, TransportError, TransportEvents, TransportFactory,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;

/// How long a local close waits for the peer's close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates [`TungsteniteTransport`]s.
///
/// Must be used from within a Tokio runtime; each transport spawns one task.
#[derive(Debug, Clone)]
pub struct TungsteniteFactory {
    close_timeout: Duration,
}

impl TungsteniteFactory {
    /// Creates a factory with default settings.
    pub fn new() -> Self {
        Self {
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Sets how long a local close waits for the peer's reply before the
    /// connection is dropped.
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

impl Default for TungsteniteFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for TungsteniteFactory {
    fn connect(
        &self,
        request: &ConnectRequest,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let mut client_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if !request.protocols.is_empty() {
            let value = HeaderValue::from_str(&request.protocols.join(", "))
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            client_request
                .headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        let transport = TungsteniteTransport::spawn(
            &runtime,
            request.url.clone(),
            client_request,
            events,
            self.close_timeout,
        );
        Ok(Arc::new(transport))
    }
}
