//! Maintenance link: a long-lived websocket to the platform.
//!
//! The agent announces itself with a `hello` frame and then waits for
//! notifications. Any disconnect is followed by a reconnect after an
//! exponential backoff, which only resets once the platform has sent a
//! notification. The loop only ends with the process.

use crate::config::{Backoff, RetryConfig};
use futures_util::{SinkExt, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

/// How long a session may stay silent before it is torn down
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maintenance link failures
#[derive(Error, Debug)]
pub enum LinkError {
    /// The link URL is empty
    #[error("missing platform websocket URL")]
    NotConfigured,

    /// The link URL is not a websocket URL
    #[error("invalid platform websocket URL {url:?}: {reason}")]
    InvalidUrl {
        /// URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The websocket handshake failed
    #[error("cannot connect to {url}")]
    Connect {
        /// Link URL
        url: String,
        /// Handshake error
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// An established session failed
    #[error("maintenance link session failed")]
    Session(#[source] Box<tungstenite::Error>),

    /// The platform sent nothing within the idle timeout
    #[error("no message from the platform within {0:?}")]
    Idle(Duration),
}

/// Websocket link to the platform for out-of-band notifications
#[derive(Debug, Clone)]
pub struct MaintenanceLink {
    url: String,
    node_id: String,
    retry: RetryConfig,
    idle_timeout: Duration,
}

impl MaintenanceLink {
    /// Link for `node_id` at a `ws://` or `wss://` URL
    pub fn new(url: impl Into<String>, node_id: impl Into<String>) -> Result<Self, LinkError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(LinkError::NotConfigured);
        }
        let parsed = url::Url::parse(&url).map_err(|e| LinkError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(LinkError::InvalidUrl {
                reason: format!("unsupported scheme {}", parsed.scheme()),
                url,
            });
        }

        Ok(Self {
            url,
            node_id: node_id.into(),
            retry: RetryConfig::default(),
            idle_timeout: IDLE_TIMEOUT,
        })
    }

    /// Set reconnect backoff
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set how long a silent session is kept open
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// The `hello` frame announcing this node
    #[must_use]
    pub fn hello(&self) -> String {
        serde_json::json!({ "type": "hello", "node": self.node_id }).to_string()
    }

    /// Keep the link up forever, passing every text notification to `on_message`
    pub async fn run<F>(&self, mut on_message: F) -> Result<Infallible, LinkError>
    where
        F: FnMut(&str) + Send,
    {
        let mut backoff = Backoff::new(self.retry.clone());

        loop {
            let mut received = false;
            let result = self
                .run_session(&mut |msg: &str| {
                    received = true;
                    on_message(msg);
                })
                .await;

            if received {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            match result {
                Ok(()) => info!(url = %self.url, delay_ms = delay.as_millis(), "maintenance link closed by platform"),
                Err(e @ LinkError::Connect { .. }) => {
                    warn!(error = %e, delay_ms = delay.as_millis(), "maintenance link connect failed");
                }
                Err(e) => warn!(error = %e, delay_ms = delay.as_millis(), "maintenance link dropped"),
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection: handshake, hello, then notifications until the
    /// platform closes, the session fails or it stays idle too long.
    pub async fn run_session<F>(&self, on_message: &mut F) -> Result<(), LinkError>
    where
        F: FnMut(&str) + Send,
    {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| LinkError::Connect {
                url: self.url.clone(),
                source: Box::new(e),
            })?;
        info!(url = %self.url, node = %self.node_id, "maintenance link connected");

        ws.send(Message::Text(self.hello()))
            .await
            .map_err(|e| LinkError::Session(Box::new(e)))?;

        loop {
            let frame = tokio::time::timeout(self.idle_timeout, ws.next())
                .await
                .map_err(|_| LinkError::Idle(self.idle_timeout))?;

            match frame {
                None | Some(Ok(Message::Close(_))) => return Ok(()),
                Some(Err(e)) => return Err(LinkError::Session(Box::new(e))),
                Some(Ok(Message::Text(text))) => {
                    debug!(bytes = text.len(), "maintenance notification");
                    on_message(&text);
                }
                Some(Ok(_)) => {}
            }
        }
    }
}
