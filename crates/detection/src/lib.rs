//! Glue between the mempool feed and the calldata decoders: every pending
//! transaction the feed emits runs through the decoder registry, and the
//! resulting swap intents stream out through a channel to the strategy
//! layer. A transaction that fails to decode is dropped silently; the
//! pipeline never stalls on bad input.

use {
    domain_types::SwapIntent,
    mempool_feed::{FeedClient, FeedEvent, HandlerId},
    std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    swap_decoder::DecoderRegistry,
    tokio::sync::mpsc,
};

/// Counters over the detector lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub transactions_seen: u64,
    pub intents_decoded: u64,
}

/// Subscribes to a feed client and decodes its pending transactions into
/// swap intents.
pub struct Detector {
    feed: FeedClient,
    handler: HandlerId,
    seen: Arc<AtomicU64>,
    decoded: Arc<AtomicU64>,
}

impl Detector {
    /// Attaches to the feed. Swap intents arrive on the returned receiver in
    /// feed order.
    pub fn attach(
        feed: &FeedClient,
        registry: Arc<DecoderRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<SwapIntent>) {
        let (intents, receiver) = mpsc::unbounded_channel();
        let seen = Arc::new(AtomicU64::new(0));
        let decoded = Arc::new(AtomicU64::new(0));

        let handler = {
            let seen = seen.clone();
            let decoded = decoded.clone();
            feed.subscribe_events(move |event| {
                process(event, &registry, &seen, &decoded, &intents);
            })
        };

        (
            Self {
                feed: feed.clone(),
                handler,
                seen,
                decoded,
            },
            receiver,
        )
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            transactions_seen: self.seen.load(Ordering::Relaxed),
            intents_decoded: self.decoded.load(Ordering::Relaxed),
        }
    }

    /// Detaches from the feed. The intent receiver ends once the last
    /// buffered intent is drained.
    pub fn detach(self) {
        self.feed.unsubscribe_events(self.handler);
    }
}

fn process(
    event: &FeedEvent,
    registry: &DecoderRegistry,
    seen: &AtomicU64,
    decoded: &AtomicU64,
    intents: &mpsc::UnboundedSender<SwapIntent>,
) {
    let FeedEvent::PendingTx(tx) = event else {
        return;
    };
    seen.fetch_add(1, Ordering::Relaxed);
    let Some(intent) = registry.decode(tx) else {
        return;
    };
    decoded.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        tx = ?intent.tx_hash,
        protocol = intent.protocol.as_str(),
        "decoded swap intent"
    );
    if intents.send(intent).is_err() {
        tracing::debug!("intent receiver dropped");
    }
}
