use {
    crate::error::FeedError,
    domain_types::PendingTransaction,
    std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

/// Events fanned out to feed subscribers.
#[derive(Clone, Debug)]
pub enum FeedEvent {
    Connected,
    Disconnected { reason: String },
    PendingTx(Arc<PendingTransaction>),
    Error(FeedError),
}

/// Identifies one registered handler so it can unsubscribe itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&FeedEvent) + Send + Sync>;

/// Event bus with copy-on-dispatch semantics: dispatch snapshots the handler
/// list before iterating, so a handler may add or remove handlers (itself
/// included) mid-dispatch without affecting the current round.
#[derive(Default)]
pub(crate) struct EventBus {
    handlers: Mutex<Vec<(HandlerId, Handler)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub(crate) fn subscribe(&self, handler: impl Fn(&FeedEvent) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().unwrap().push((id, Arc::new(handler)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: HandlerId) {
        self.handlers.lock().unwrap().retain(|(stored, _)| *stored != id);
    }

    pub(crate) fn emit(&self, event: &FeedEvent) {
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }
}
