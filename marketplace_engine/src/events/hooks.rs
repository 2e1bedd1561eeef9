use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderCreditedEvent, PayoutCreatedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_credited_producer: Vec<EventProducer<OrderCreditedEvent>>,
    pub payout_created_producer: Vec<EventProducer<PayoutCreatedEvent>>,
}

pub struct EventHandlers {
    pub on_order_credited: Option<EventHandler<OrderCreditedEvent>>,
    pub on_payout_created: Option<EventHandler<PayoutCreatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_credited = hooks.on_order_credited.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_created = hooks.on_payout_created.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_credited, on_payout_created }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_credited {
            result.order_credited_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_created {
            result.payout_created_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_credited {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payout_created {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_credited: Option<Handler<OrderCreditedEvent>>,
    pub on_payout_created: Option<Handler<PayoutCreatedEvent>>,
}

impl EventHooks {
    pub fn on_order_credited<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreditedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_credited = Some(Arc::new(f));
        self
    }

    pub fn on_payout_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payout_created = Some(Arc::new(f));
        self
    }
}
