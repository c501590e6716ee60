//! Event Bus
//!
//! `publish` hands the envelope to the [`Transport`] for every other peer,
//! then runs the local subscribers for that kind one after another. Each
//! subscriber runs as its own task: an error or panic is logged and
//! recorded in the [`DispatchReport`] while the remaining subscribers still
//! run.
//!
//! `Once` subscriptions leave the registry the moment a dispatch picks them
//! up. Subscriptions made while a dispatch is running only see later
//! messages.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use convoy_core::{BoxFuture, ConvoyError, ConvoyResult, Envelope, EventKind, Message, Transport};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Subscription handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// How long a subscription lives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Until unsubscribed
    Persistent,
    /// For the next matching message only
    Once,
}

/// Subscriber callback
pub type Handler = Arc<dyn Fn(Message) -> BoxFuture<'static, ConvoyResult<()>> + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    delivery: Delivery,
    handler: Handler,
}

/// One subscriber that did not complete
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub message: String,
    pub panicked: bool,
}

/// Outcome of one local dispatch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub kind: EventKind,
    /// Subscribers that completed successfully
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            delivered: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fail on the first subscriber failure
    pub fn into_result(self) -> ConvoyResult<usize> {
        match self.failures.into_iter().next() {
            None => Ok(self.delivered),
            Some(failure) => Err(ConvoyError::Handler {
                event: self.kind,
                subscription: failure.subscription.0,
                message: failure.message,
            }),
        }
    }
}

/// Per-peer event bus
pub struct EventBus {
    transport: Arc<dyn Transport>,
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a boxed handler
    pub fn subscribe(&self, kind: EventKind, delivery: Delivery, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            kind,
            delivery,
            handler,
        });
        id
    }

    /// Register a persistent async handler
    pub fn on<F, Fut>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConvoyResult<()>> + Send + 'static,
    {
        self.subscribe(kind, Delivery::Persistent, boxed(handler))
    }

    /// Register a handler for the next matching message only
    pub fn once<F, Fut>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ConvoyResult<()>> + Send + 'static,
    {
        self.subscribe(kind, Delivery::Once, boxed(handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Subscribers currently registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions.lock().iter().filter(|s| s.kind == kind).count()
    }

    /// Broadcast to peers, then dispatch locally
    pub async fn publish(&self, message: Message) -> ConvoyResult<DispatchReport> {
        let envelope = message.to_envelope()?;
        self.transport.broadcast(&envelope)?;
        Ok(self.dispatch(message).await)
    }

    /// Dispatch a message that arrived from a peer
    pub async fn receive(&self, envelope: Envelope) -> ConvoyResult<DispatchReport> {
        let message = Message::from_envelope(envelope)?;
        Ok(self.dispatch(message).await)
    }

    /// Decode and dispatch a raw wire message
    pub async fn receive_text(&self, text: &str) -> ConvoyResult<DispatchReport> {
        self.receive(Envelope::decode(text)?).await
    }

    /// Run the local subscribers for one message
    pub async fn dispatch(&self, message: Message) -> DispatchReport {
        let kind = message.kind();
        let handlers = self.take_handlers(kind);
        let mut report = DispatchReport::new(kind);

        debug!(event = %kind, subscribers = handlers.len(), "dispatch");

        for (id, handler) in handlers {
            let task = tokio::spawn(handler(message.clone()));
            match task.await {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!(event = %kind, subscription = id.0, error = %e, "handler failed");
                    report.failures.push(HandlerFailure {
                        subscription: id,
                        message: e.to_string(),
                        panicked: false,
                    });
                }
                Err(e) => {
                    warn!(event = %kind, subscription = id.0, error = %e, "handler panicked");
                    report.failures.push(HandlerFailure {
                        subscription: id,
                        message: e.to_string(),
                        panicked: e.is_panic(),
                    });
                }
            }
        }

        report
    }

    /// Snapshot the handlers for `kind`, removing once-subscriptions
    fn take_handlers(&self, kind: EventKind) -> Vec<(SubscriptionId, Handler)> {
        let mut subscriptions = self.subscriptions.lock();
        let handlers = subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, s.handler.clone()))
            .collect();
        subscriptions.retain(|s| !(s.kind == kind && s.delivery == Delivery::Once));
        handlers
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish_non_exhaustive()
    }
}

fn boxed<F, Fut>(handler: F) -> Handler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ConvoyResult<()>> + Send + 'static,
{
    Arc::new(move |message: Message| Box::pin(handler(message)) as BoxFuture<'static, ConvoyResult<()>>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::{EntityId, Link, NoPeers, SceneId};

    fn link_message() -> Message {
        Message::RemoveFollower(Link {
            leader_id: EntityId::new(1),
            follower_id: EntityId::new(2),
            scene_id: SceneId::new(3),
        })
    }

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new(Arc::new(NoPeers)))
    }

    #[derive(Default)]
    struct Capture {
        sent: Mutex<Vec<Envelope>>,
    }

    impl Transport for Capture {
        fn broadcast(&self, envelope: &Envelope) -> ConvoyResult<()> {
            self.sent.lock().push(envelope.clone());
            Ok(())
        }
    }

    struct Refuse;

    impl Transport for Refuse {
        fn broadcast(&self, _envelope: &Envelope) -> ConvoyResult<()> {
            Err(ConvoyError::Transport("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_handlers_run_in_subscription_order() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let log = log.clone();
            bus.on(EventKind::RemoveFollower, move |_| {
                let log = log.clone();
                async move {
                    tokio::task::yield_now().await;
                    log.lock().push(n);
                    Ok(())
                }
            });
        }

        let report = bus.publish(link_message()).await.unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_only_matching_kind_runs() {
        let bus = bus();
        bus.on(EventKind::AddLeader, |_| async { Err(ConvoyError::MissingLeader) });
        let report = bus.publish(link_message()).await.unwrap();
        assert_eq!(report.delivered, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_once_handler_fires_once() {
        let bus = bus();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        bus.once(EventKind::RemoveFollower, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        bus.publish(link_message()).await.unwrap();
        bus.publish(link_message()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventKind::RemoveFollower), 0);
    }

    #[tokio::test]
    async fn test_once_handler_is_removed_before_it_runs() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(None));
        let (inner, probe) = (bus.clone(), seen.clone());
        bus.once(EventKind::RemoveFollower, move |_| {
            let (inner, probe) = (inner.clone(), probe.clone());
            async move {
                *probe.lock() = Some(inner.subscriber_count(EventKind::RemoveFollower));
                Ok(())
            }
        });

        bus.dispatch(link_message()).await;
        assert_eq!(*seen.lock(), Some(0));
    }

    #[tokio::test]
    async fn test_late_subscription_waits_for_next_message() {
        let bus = bus();
        let hits = Arc::new(AtomicU64::new(0));
        let (inner, counter) = (bus.clone(), hits.clone());

        bus.once(EventKind::RemoveFollower, move |_| {
            let (inner, counter) = (inner.clone(), counter.clone());
            async move {
                inner.on(EventKind::RemoveFollower, move |_| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                });
                Ok(())
            }
        });

        let first = bus.dispatch(link_message()).await;
        assert_eq!(first.delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.dispatch(link_message()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let bus = bus();
        let ran = Arc::new(AtomicU64::new(0));

        bus.on(EventKind::RemoveFollower, |_| async { Err(ConvoyError::NoFollowers) });
        bus.on(EventKind::RemoveFollower, |_| async { panic!("handler bug") });
        let counter = ran.clone();
        bus.on(EventKind::RemoveFollower, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let report = bus.dispatch(link_message()).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(!report.failures[0].panicked);
        assert!(report.failures[1].panicked);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, ConvoyError::Handler { subscription: 1, .. }));
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = bus();
        let id = bus.on(EventKind::RemoveFollower, |_| async { Ok(()) });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.dispatch(link_message()).await.delivered, 0);
    }

    #[tokio::test]
    async fn test_publish_broadcasts_and_receive_does_not() {
        let capture = Arc::new(Capture::default());
        let bus = EventBus::new(capture.clone());
        bus.on(EventKind::RemoveFollower, |_| async { Ok(()) });

        let report = bus.publish(link_message()).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(capture.sent.lock().len(), 1);

        let text = capture.sent.lock()[0].encode().unwrap();
        let echoed = bus.receive_text(&text).await.unwrap();
        assert_eq!(echoed.delivered, 1);
        assert_eq!(capture.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_skips_local_dispatch() {
        let bus = EventBus::new(Arc::new(Refuse));
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        bus.on(EventKind::RemoveFollower, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        assert!(matches!(bus.publish(link_message()).await, Err(ConvoyError::Transport(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_text_is_a_codec_error() {
        let bus = bus();
        let err = bus.receive_text("{\"event\":\"leaderMove\"").await.unwrap_err();
        assert!(matches!(err, ConvoyError::Codec(_)));
    }
}
