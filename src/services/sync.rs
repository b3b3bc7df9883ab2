//! Sync channel: two one-way snapshot topics between the views.
//!
//! DESIGN
//! ======
//! Each [`Topic`] is a `tokio::sync::broadcast` of encoded [`Frame`] bytes,
//! so an in-process subscriber and the TCP bridge see exactly the same wire
//! form. The last published frame per topic is also kept, so a subscriber
//! that joins late (a display window opened after the map was loaded, a
//! bridge peer that just connected) starts from the current snapshot
//! instead of waiting for the next edit.
//!
//! Publishing never blocks. A publisher with no subscribers is normal.
//!
//! ORDERING
//! ========
//! A [`Publisher`] stamps every frame with a strictly increasing `seq`. A
//! [`Subscriber`] applies a frame only if its `seq` is newer than the last
//! one it applied, so duplicate deliveries (late-join snapshot plus the live
//! stream) and reordering never move a replica backwards. A lagging
//! subscriber skips ahead to the newest frames; with full snapshots on the
//! wire nothing is lost by skipping.

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};

use frames::{CodecError, Frame, Topic, decode_frame, encode_frame};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace};
use uuid::Uuid;

use super::now_ms;

/// Frames buffered per topic before a slow subscriber starts lagging.
pub const DEFAULT_TOPIC_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("frame decode failed: {0}")]
    Codec(#[from] CodecError),
    #[error("frame payload has the wrong shape: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("frame for topic {got:?} arrived on topic {expected:?}")]
    WrongTopic { expected: Topic, got: Topic },
    #[error("sync bus closed")]
    Closed,
}

// =============================================================================
// BUS
// =============================================================================

#[derive(Clone)]
struct Channel {
    tx: broadcast::Sender<Vec<u8>>,
    latest: Arc<Mutex<Option<Vec<u8>>>>,
}

impl Channel {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, latest: Arc::new(Mutex::new(None)) }
    }
}

/// Both topics of one process. Cheap to clone; clones share the channels.
#[derive(Clone)]
pub struct SyncBus {
    state: Channel,
    viewport: Channel,
}

impl Default for SyncBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl SyncBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { state: Channel::new(capacity), viewport: Channel::new(capacity) }
    }

    fn channel(&self, topic: Topic) -> &Channel {
        match topic {
            Topic::State => &self.state,
            Topic::Viewport => &self.viewport,
        }
    }

    /// Push already-encoded frame bytes onto `topic`. Returns how many live
    /// subscribers received them.
    pub fn publish_raw(&self, topic: Topic, bytes: Vec<u8>) -> usize {
        let channel = self.channel(topic);
        *channel.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.clone());
        // Err only means nobody is listening right now.
        channel.tx.send(bytes).unwrap_or(0)
    }

    /// The last frame published on `topic`, if any.
    #[must_use]
    pub fn latest(&self, topic: Topic) -> Option<Vec<u8>> {
        self.channel(topic).latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Raw byte stream for `topic`, without the late-join snapshot.
    #[must_use]
    pub fn subscribe_raw(&self, topic: Topic) -> broadcast::Receiver<Vec<u8>> {
        self.channel(topic).tx.subscribe()
    }

    #[must_use]
    pub fn publisher(&self, topic: Topic) -> Publisher {
        Publisher { bus: self.clone(), topic, seq: initial_seq() }
    }

    /// Typed subscriber that starts from the current snapshot, if one exists.
    #[must_use]
    pub fn subscriber(&self, topic: Topic) -> Subscriber {
        // Subscribe before reading the snapshot so nothing published in
        // between is missed; the seq check drops the overlap.
        let rx = self.subscribe_raw(topic);
        let pending = self.latest(topic);
        Subscriber { rx, topic, last_seq: None, pending }
    }
}

/// Publishers start counting from the wall clock so a restarted publisher
/// still supersedes what its previous run sent.
fn initial_seq() -> u64 {
    u64::try_from(now_ms()).unwrap_or(0)
}

// =============================================================================
// PUBLISHER
// =============================================================================

pub struct Publisher {
    bus: SyncBus,
    topic: Topic,
    seq: u64,
}

impl Publisher {
    /// Serialize `payload` as the next snapshot on this topic.
    ///
    /// # Errors
    ///
    /// [`SyncError::Payload`] if `payload` cannot be represented as JSON.
    pub fn publish<T: Serialize>(&mut self, payload: &T) -> Result<u64, SyncError> {
        let data = serde_json::to_value(payload)?;
        self.seq += 1;
        let frame = Frame { id: Uuid::new_v4().to_string(), seq: self.seq, ts: now_ms(), topic: self.topic, data };
        let receivers = self.bus.publish_raw(self.topic, encode_frame(&frame));
        trace!(topic = self.topic.as_str(), seq = self.seq, receivers, "sync: published");
        Ok(self.seq)
    }
}

// =============================================================================
// SUBSCRIBER
// =============================================================================

pub struct Subscriber {
    rx: broadcast::Receiver<Vec<u8>>,
    topic: Topic,
    last_seq: Option<u64>,
    pending: Option<Vec<u8>>,
}

impl Subscriber {
    /// Decode one frame. `Ok(None)` means it was stale and was dropped.
    ///
    /// # Errors
    ///
    /// [`SyncError::Codec`] for undecodable bytes, [`SyncError::WrongTopic`]
    /// for a frame addressed to the other topic, [`SyncError::Payload`] when
    /// the payload does not deserialize as `T`. The subscriber's position is
    /// unchanged on error.
    pub fn accept<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<Option<T>, SyncError> {
        let frame = decode_frame(bytes)?;
        if frame.topic != self.topic {
            return Err(SyncError::WrongTopic { expected: self.topic, got: frame.topic });
        }
        if !frame.supersedes(self.last_seq) {
            trace!(topic = self.topic.as_str(), seq = frame.seq, "sync: dropped stale frame");
            return Ok(None);
        }
        let payload = serde_json::from_value(frame.data)?;
        self.last_seq = Some(frame.seq);
        Ok(Some(payload))
    }

    /// Wait for the next snapshot newer than the last one applied.
    ///
    /// Cancel-safe: dropping the future loses nothing that a later call
    /// would not see.
    ///
    /// # Errors
    ///
    /// Any [`Subscriber::accept`] error for a bad frame, or
    /// [`SyncError::Closed`] once every publisher handle is gone.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<T, SyncError> {
        loop {
            let bytes = match self.pending.take() {
                Some(bytes) => bytes,
                None => match self.rx.recv().await {
                    Ok(bytes) => bytes,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(topic = self.topic.as_str(), skipped, "sync: subscriber lagged; skipping ahead");
                        continue;
                    }
                    Err(RecvError::Closed) => return Err(SyncError::Closed),
                },
            };
            if let Some(payload) = self.accept(&bytes)? {
                return Ok(payload);
            }
        }
    }
}
