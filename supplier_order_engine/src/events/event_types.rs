use serde::Serialize;

use crate::db_types::{Order, TwoFactorChallenge};

/// What the engine wants a user told. Delivery (email, push) is up to whoever subscribes to the hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub user_id: i64,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSubmittedEvent {
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFailedEvent {
    pub order: Order,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldKind {
    /// Warnings or price changes for the user to review.
    Review,
    /// The user must act on the supplier site or enter a two-factor code.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHeldEvent {
    pub order: Order,
    pub hold: HoldKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOpenedEvent {
    pub challenge: TwoFactorChallenge,
    pub supplier_name: String,
}

/// A challenge left the `pending` state, for whatever reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResolvedEvent {
    pub challenge: TwoFactorChallenge,
}

impl OrderSubmittedEvent {
    pub fn notification(&self) -> Notification {
        let confirmation = self.order.confirmation_number.as_deref().unwrap_or("(none)");
        Notification {
            user_id: self.order.user_id,
            subject: format!("Order {} submitted", self.order.id),
            body: format!(
                "Order {} was accepted by the supplier. Confirmation number {confirmation}, total {}.",
                self.order.id, self.order.total_amount
            ),
        }
    }
}

impl OrderFailedEvent {
    pub fn notification(&self) -> Notification {
        Notification {
            user_id: self.order.user_id,
            subject: format!("Order {} failed", self.order.id),
            body: format!("Order {} could not be placed: {}", self.order.id, self.reason),
        }
    }
}

impl OrderHeldEvent {
    pub fn notification(&self) -> Notification {
        let subject = match self.hold {
            HoldKind::Review => format!("Order {} needs your review", self.order.id),
            HoldKind::Manual => format!("Order {} needs you to finish it", self.order.id),
        };
        Notification { user_id: self.order.user_id, subject, body: self.reason.clone() }
    }
}

impl ChallengeOpenedEvent {
    pub fn notification(&self) -> Notification {
        Notification {
            user_id: self.challenge.user_id,
            subject: format!("{} needs a verification code", self.supplier_name),
            body: format!(
                "{} Enter the code before {}.",
                self.challenge.prompt_message,
                self.challenge.expires_at.format("%H:%M UTC")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderSubmitted(OrderSubmittedEvent),
    OrderFailed(OrderFailedEvent),
    OrderHeld(OrderHeldEvent),
    ChallengeOpened(ChallengeOpenedEvent),
    ChallengeResolved(ChallengeResolvedEvent),
}
