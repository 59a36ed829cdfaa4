//! The user-facing two-factor channel, as a transport-agnostic message bus.
//!
//! The engine publishes typed [`ServerMessage`]s to a user-scoped topic and accepts typed [`ClientAction`]s. How they
//! reach a browser (SSE, websockets, polling) is the business of the [`MessageBus`] implementation.
mod broadcast_bus;
mod messages;

use async_trait::async_trait;
pub use broadcast_bus::BroadcastBus;
pub use messages::{ClientAction, ServerMessage};

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Delivers the message to every current subscriber of the user's topic. Delivery is best effort.
    async fn publish(&self, user_id: i64, message: ServerMessage);
}
