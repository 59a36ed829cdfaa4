use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    ChallengeOpenedEvent,
    ChallengeResolvedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderFailedEvent,
    OrderHeldEvent,
    OrderSubmittedEvent,
};

pub type BoxedHook = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Generates the hook registry ([`EventHooks`]), the running handlers ([`EventHandlers`]) and the cloneable producer
/// set ([`EventProducers`]) for a list of `hook_name: producer_name => EventType` entries.
macro_rules! event_hooks {
    ($($hook:ident : $producer:ident => $event:ty),+ $(,)?) => {
        #[derive(Default, Clone)]
        pub struct EventProducers {
            $(pub $producer: Vec<EventProducer<$event>>,)+
        }

        pub struct EventHandlers {
            $(pub $hook: Option<EventHandler<$event>>,)+
        }

        impl EventHandlers {
            pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
                Self { $($hook: hooks.$hook.map(|f| EventHandler::new(buffer_size, f)),)+ }
            }

            pub fn producers(&self) -> EventProducers {
                let mut result = EventProducers::default();
                $(
                    if let Some(handler) = &self.$hook {
                        result.$producer.push(handler.subscribe());
                    }
                )+
                result
            }

            pub async fn start_handlers(self) {
                $(
                    if let Some(handler) = self.$hook {
                        tokio::spawn(async move {
                            handler.start_handler().await;
                        });
                    }
                )+
            }
        }

        #[derive(Default, Clone)]
        pub struct EventHooks {
            $(pub $hook: Option<Handler<$event>>,)+
        }

        impl EventHooks {
            $(
                pub fn $hook<F>(&mut self, f: F) -> &mut Self
                where F: (Fn($event) -> BoxedHook) + Send + Sync + 'static {
                    self.$hook = Some(Arc::new(f));
                    self
                }
            )+
        }
    };
}

event_hooks! {
    on_order_submitted: order_submitted_producer => OrderSubmittedEvent,
    on_order_failed: order_failed_producer => OrderFailedEvent,
    on_order_held: order_held_producer => OrderHeldEvent,
    on_challenge_opened: challenge_opened_producer => ChallengeOpenedEvent,
    on_challenge_resolved: challenge_resolved_producer => ChallengeResolvedEvent,
}

impl EventProducers {
    pub async fn publish_order_submitted(&self, event: OrderSubmittedEvent) {
        for producer in &self.order_submitted_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_failed(&self, event: OrderFailedEvent) {
        for producer in &self.order_failed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_held(&self, event: OrderHeldEvent) {
        for producer in &self.order_held_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_challenge_opened(&self, event: ChallengeOpenedEvent) {
        for producer in &self.challenge_opened_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_challenge_resolved(&self, event: ChallengeResolvedEvent) {
        for producer in &self.challenge_resolved_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}
