//! Port for delivering a rendered notification over a concrete transport.
//!
//! The wire protocol for each transport (WebSocket framing, APNs/GCM HTTP
//! payloads) is out of scope; this port only describes what the Notifier
//! needs from whatever delivers the bytes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::enums::Transport;
use crate::types::messages::NotificationMessage;

/// Delivers a rendered [`NotificationMessage`] to one subscriber over one
/// transport.
///
/// # Implementation Notes
///
/// A production adapter fans `Ws` out over an open `axum` WebSocket
/// connection keyed by `token_id`, and `Gcm`/`Apn` out over the respective
/// push gateway's HTTP API. Delivery failures here are infrastructure
/// concerns — the Notifier logs and moves on rather than retrying
/// indefinitely, since subscriptions are best-effort.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver `message` to `token_id` over `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport-specific delivery call fails.
    async fn dispatch(
        &self,
        transport: Transport,
        token_id: &str,
        message: &NotificationMessage,
    ) -> Result<()>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! Mock implementations for testing.

    use std::sync::Mutex;

    use super::{NotificationDispatcher, NotificationMessage, Transport};
    use crate::error::Result;

    /// Records every dispatched message instead of sending it anywhere.
    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        /// `(transport, token_id, message)` tuples, in dispatch order.
        pub sent: Mutex<Vec<(Transport, String, NotificationMessage)>>,
    }

    impl RecordingDispatcher {
        /// Create a new recording dispatcher.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait::async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            transport: Transport,
            token_id: &str,
            message: &NotificationMessage,
        ) -> Result<()> {
            self.sent
                .lock()
                .expect("lock poisoned")
                .push((transport, token_id.to_string(), message.clone()));
            Ok(())
        }
    }
}
