//! Single consumer of the event queue.
//!
//! For each event the dispatcher selects an action, performs it, fills in
//! the acknowledgement and hands it to the write loop before taking the next
//! event, so at most one event is ever in flight.

use std::sync::Arc;

use faultline_events::Response;
use faultline_faults::{ActionRegistry, SelectionPolicy};
use faultline_relay::{Envelope, Pooled};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::status::AvailabilityMirror;

/// Routes events from the transport to fault actions.
pub struct Dispatcher {
    availability: AvailabilityMirror,
    policy: Arc<dyn SelectionPolicy>,
    registry: Arc<ActionRegistry>,
    response_tx: mpsc::Sender<Pooled<Response>>,
}

impl Dispatcher {
    /// Create a dispatcher writing acknowledgements to `response_tx`.
    #[must_use]
    pub fn new(
        policy: Arc<dyn SelectionPolicy>,
        registry: Arc<ActionRegistry>,
        response_tx: mpsc::Sender<Pooled<Response>>,
    ) -> Self {
        Self {
            availability: AvailabilityMirror::default(),
            policy,
            registry,
            response_tx,
        }
    }

    /// Report action outcomes into `availability`.
    #[must_use]
    pub fn with_availability(mut self, availability: AvailabilityMirror) -> Self {
        self.availability = availability;
        self
    }

    /// Consume `events` until cancelled or the transport goes away.
    ///
    /// Cancellation abandons an action in progress; its envelope is returned
    /// to the pools unacknowledged.
    #[instrument(skip_all)]
    pub async fn run(self, mut events: mpsc::Receiver<Envelope>, cancel: CancellationToken) {
        info!("dispatcher started");

        loop {
            let envelope = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = events.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.process(envelope) => {}
            }
        }

        info!("dispatcher stopped");
    }

    /// Handle one event end to end.
    ///
    /// The event is released before the acknowledgement is queued. Failures
    /// are logged; the node is always acknowledged.
    pub async fn process(&self, envelope: Envelope) {
        let Envelope {
            event,
            mut response,
            reset,
        } = envelope;

        let kind = self.policy.select(&event);
        let action = self.registry.get(kind);
        debug!(
            sequence = event.sequence,
            event = %event.kind,
            action = action.name(),
            "dispatching event"
        );

        match action.perform(&|| reset.request()).await {
            Ok(()) => {
                self.availability.record(kind);
                if let Err(e) = action.generate_response(&event, &mut response) {
                    warn!("sending default acknowledgement for event {}: {}", event.sequence, e);
                    response.acknowledge(&event);
                }
            }
            Err(e) => error!("{} failed for event {}: {}", action.name(), event.sequence, e),
        }
        event.release();

        if let Err(e) = self.response_tx.send(response).await {
            debug!("write loop closed, dropping acknowledgement {}", e.0.sequence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Availability;
    use faultline_events::{ActionType, Event, EventKind};
    use faultline_faults::{CommandDriven, FaultConfig, ModeFlags};
    use faultline_relay::{Pool, ResetSignal};

    fn registry(stop_command: &str) -> Arc<ActionRegistry> {
        let mut config = FaultConfig::default();
        config.actions.pause.pause_command = "true".into();
        config.actions.pause.continue_command = "true".into();
        config.actions.stop.stop_command = stop_command.into();
        config.actions.stop.restart_command = "true".into();
        Arc::new(ActionRegistry::from_config(&config).unwrap())
    }

    struct Always(ActionType);

    impl SelectionPolicy for Always {
        fn select(&self, _event: &Event) -> ActionType {
            self.0
        }
    }

    struct Fixture {
        events: Pool<Event>,
        responses: Pool<Response>,
        reset: ResetSignal,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                events: Pool::new(),
                responses: Pool::new(),
                reset: ResetSignal::new(),
            }
        }

        fn envelope(&self, kind: EventKind, sequence: u64) -> Envelope {
            let mut event = self.events.get();
            event.kind = kind;
            event.sequence = sequence;
            let mut response = self.responses.get();
            response.acknowledge(&event);
            Envelope {
                event,
                response,
                reset: self.reset.clone(),
            }
        }
    }

    #[tokio::test]
    async fn test_noop_sends_default_response() {
        let fixture = Fixture::new();
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(
            Arc::new(CommandDriven::new(ModeFlags::default())),
            registry("true"),
            tx,
        );

        dispatcher
            .process(fixture.envelope(EventKind::Heartbeat, 7))
            .await;

        let response = rx.recv().await.unwrap();
        assert!(response.is_default());
        assert_eq!(response.sequence, 7);
        assert_eq!(fixture.events.stats().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_failed_action_still_acknowledged() {
        let fixture = Fixture::new();
        let (tx, mut rx) = mpsc::channel(4);
        let availability = AvailabilityMirror::default();
        let dispatcher = Dispatcher::new(Arc::new(Always(ActionType::Stop)), registry("false"), tx)
            .with_availability(availability.clone());

        dispatcher
            .process(fixture.envelope(EventKind::VoteReceived, 1))
            .await;

        let response = rx.recv().await.unwrap();
        assert_eq!(response.sequence, 1);
        assert!(response.is_default());
        assert_eq!(availability.get(), Availability::Online);
    }

    #[tokio::test]
    async fn test_unknown_event_gets_default_response() {
        let fixture = Fixture::new();
        let (tx, mut rx) = mpsc::channel(4);
        let dispatcher = Dispatcher::new(Arc::new(Always(ActionType::Pause)), registry("true"), tx);

        dispatcher
            .process(fixture.envelope(EventKind::Unknown, 3))
            .await;

        let response = rx.recv().await.unwrap();
        assert!(response.is_default());
        assert_eq!(response.sequence, 3);
    }

    #[tokio::test]
    async fn test_stop_marks_node_stopped() {
        let fixture = Fixture::new();
        let (tx, mut rx) = mpsc::channel(4);
        let availability = AvailabilityMirror::default();
        let dispatcher = Dispatcher::new(Arc::new(Always(ActionType::Stop)), registry("true"), tx)
            .with_availability(availability.clone());

        dispatcher
            .process(fixture.envelope(EventKind::Heartbeat, 2))
            .await;

        assert_eq!(rx.recv().await.unwrap().action, Some(ActionType::Stop));
        assert_eq!(availability.get(), Availability::Stopped);
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_releases() {
        let fixture = Fixture::new();
        let (event_tx, event_rx) = mpsc::channel(16);
        let (tx, mut rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::new(
            Arc::new(CommandDriven::new(ModeFlags::default())),
            registry("true"),
            tx,
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher.run(event_rx, cancel.clone()));

        for sequence in 0..10 {
            event_tx
                .send(fixture.envelope(EventKind::Heartbeat, sequence))
                .await
                .unwrap();
        }
        for sequence in 0..10 {
            let response = rx.recv().await.unwrap();
            assert_eq!(response.sequence, sequence);
        }

        drop(event_tx);
        task.await.unwrap();

        assert_eq!(fixture.events.stats().outstanding(), 0);
        assert_eq!(fixture.responses.stats().outstanding(), 0);
        cancel.cancel();
    }
}
