//! Notification delivery is somebody else's job. The server's hooks write every notification to the log under the
//! `sog::notifications` target, where a log shipper can pick them up.
use log::*;
use supplier_order_engine::events::{EventHooks, Notification};

const TARGET: &str = "sog::notifications";

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_submitted(|ev| Box::pin(async move { deliver(ev.notification()) }))
        .on_order_failed(|ev| Box::pin(async move { deliver(ev.notification()) }))
        .on_order_held(|ev| Box::pin(async move { deliver(ev.notification()) }))
        .on_challenge_opened(|ev| Box::pin(async move { deliver(ev.notification()) }))
        .on_challenge_resolved(|ev| {
            Box::pin(async move {
                debug!(target: TARGET, "📬️ Challenge {} is now {}", ev.challenge.id, ev.challenge.status);
            })
        });
    hooks
}

fn deliver(notification: Notification) {
    let Notification { user_id, subject, body } = notification;
    info!(target: TARGET, "📬️ [user {user_id}] {subject}: {body}");
}
