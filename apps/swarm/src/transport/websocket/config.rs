use std::net::SocketAddr;

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::http::Request;

use crate::transport::TransportError;

/// Where and how the fleet connects.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Server host name, used for the `Host` header and the request URL.
    pub host: String,
    pub port: u16,
    /// Endpoint path on the server, e.g. `/socket-units-server/`.
    pub path: String,
    /// Pre-resolved address; resolution happens once at startup.
    pub addr: SocketAddr,
    /// Firmware version every simulated device reports.
    pub firmware: String,
}

impl WebSocketConfig {
    pub fn build_url(&self) -> String {
        let mut path = self.path.clone();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        format!("ws://{}:{}{}", self.host, self.port, path)
    }

    /// Upgrade request carrying the device identification headers.
    pub fn client_request(&self, device_id: &str) -> Result<Request<()>, TransportError> {
        let mut request = self
            .build_url()
            .into_client_request()
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(
            "DeviceID",
            HeaderValue::from_str(device_id)
                .map_err(|err| TransportError::Connect(err.to_string()))?,
        );
        headers.insert(
            "fw",
            HeaderValue::from_str(&self.firmware)
                .map_err(|err| TransportError::Connect(err.to_string()))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("swarm/", env!("CARGO_PKG_VERSION"))),
        );

        Ok(request)
    }
}
