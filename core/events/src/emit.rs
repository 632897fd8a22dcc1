//! Interfaces to emit audit events.
use std::sync::Arc;

use anyhow::Result;

use repairdesk_context::Context;

use super::Event;

/// Emit events to the configured audit backend.
#[derive(Clone)]
pub struct Events(Arc<dyn EventsBackend>);

impl Events {
    /// Emit an auditing event.
    pub async fn audit(&self, context: &Context, event: Event) -> Result<()> {
        self.0.audit(context, event).await
    }
}

impl<T> From<T> for Events
where
    T: EventsBackend + 'static,
{
    fn from(value: T) -> Self {
        Events(Arc::new(value))
    }
}

/// Operations implemented by audit event backends.
#[async_trait::async_trait]
pub trait EventsBackend: Send + Sync {
    /// Emit an auditing event.
    async fn audit(&self, context: &Context, event: Event) -> Result<()>;
}

/// Events backend that records audit events in the process logs.
pub struct EventsLog;

#[async_trait::async_trait]
impl EventsBackend for EventsLog {
    async fn audit(&self, context: &Context, event: Event) -> Result<()> {
        let payload = serde_json::to_string(&event.payload)?;
        let time = event
            .time
            .format(&time::format_description::well_known::Rfc3339)?;
        slog::info!(
            context.logger, "{}", event.code;
            "audit" => true,
            "payload" => payload,
            "time" => time,
        );
        Ok(())
    }
}

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::{EventsFixture, EventsFixtureBackend};

#[cfg(any(test, feature = "test-fixture"))]
mod fixture {
    use std::time::Duration;

    use anyhow::Result;
    use tokio::sync::broadcast;
    use tokio::sync::broadcast::Receiver;
    use tokio::sync::broadcast::Sender;

    use repairdesk_context::Context;

    use super::Event;
    use super::EventsBackend;

    /// Introspection tools for events emitted during unit tests.
    pub struct EventsFixture {
        audit: Receiver<Event>,
        send_audit: Sender<Event>,
    }

    impl Clone for EventsFixture {
        fn clone(&self) -> Self {
            let audit = self.send_audit.subscribe();
            Self {
                audit,
                send_audit: self.send_audit.clone(),
            }
        }
    }

    impl EventsFixture {
        /// Create a backend that will send events to this fixture.
        pub fn backend(&self) -> EventsFixtureBackend {
            let audit = self.send_audit.clone();
            EventsFixtureBackend { audit }
        }

        /// Initialise an events backend fixture for unit tests.
        pub fn new() -> EventsFixture {
            let (send_audit, audit) = broadcast::channel(50);
            EventsFixture { audit, send_audit }
        }

        /// Fetch the next [`Event`] emitted onto the audit stream.
        pub async fn pop_audit(&mut self) -> Result<Event> {
            let event = self.audit.recv().await?;
            Ok(event)
        }

        /// Fetch the next [`Event`] emitted onto the audit stream, with a timeout.
        pub async fn pop_audit_timeout(&mut self, timeout: Duration) -> Result<Event> {
            let event = tokio::time::timeout(timeout, self.pop_audit()).await?;
            event
        }
    }

    impl Default for EventsFixture {
        fn default() -> Self {
            EventsFixture::new()
        }
    }

    /// Events backend for unit tests.
    pub struct EventsFixtureBackend {
        audit: Sender<Event>,
    }

    #[async_trait::async_trait]
    impl EventsBackend for EventsFixtureBackend {
        async fn audit(&self, _: &Context, event: Event) -> Result<()> {
            self.audit.send(event)?;
            Ok(())
        }
    }
}
