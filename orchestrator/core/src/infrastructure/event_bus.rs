// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for Decision Events
//
// In-memory fan-out over a tokio broadcast channel. Observers that fall
// behind lose the oldest events; publishers never wait and never fail.

use crate::domain::events::DecisionEvent;
use ledgerline_cortex::TenantId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to decision events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DecisionEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: DecisionEvent) {
        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to decision event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single tenant.
    pub fn subscribe_tenant(&self, tenant_id: TenantId) -> TenantEventReceiver {
        TenantEventReceiver {
            receiver: self.sender.subscribe(),
            tenant_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DecisionEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DecisionEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<DecisionEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

pub struct TenantEventReceiver {
    receiver: broadcast::Receiver<DecisionEvent>,
    tenant_id: TenantId,
}

impl TenantEventReceiver {
    /// Next event for the subscribed tenant; other tenants' events are skipped.
    pub async fn recv(&mut self) -> Result<DecisionEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.tenant_id() == self.tenant_id {
                return Ok(event);
            }
        }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledgerline_cortex::AgentType;

    fn denied(tenant_id: TenantId) -> DecisionEvent {
        DecisionEvent::DecisionDenied {
            tenant_id,
            agent_type: AgentType::new("categorizer"),
            reason: "tenant cancelled".to_string(),
            denied_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        let tenant = TenantId::new();

        bus.publish(denied(tenant));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.tenant_id(), tenant);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(10);
        bus.publish(denied(TenantId::new()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_tenant_filter() {
        let bus = EventBus::new(10);
        let wanted = TenantId::new();
        let mut receiver = bus.subscribe_tenant(wanted);

        bus.publish(denied(TenantId::new()));
        bus.publish(denied(wanted));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.tenant_id(), wanted);
    }

    #[tokio::test]
    async fn test_lagging_receiver() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();

        for _ in 0..5 {
            bus.publish(denied(TenantId::new()));
        }

        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(_))));
    }
}
