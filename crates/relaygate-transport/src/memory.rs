//! In-process channel pairs.
//!
//! [`pair`] returns two connected [`MemoryChannel`] endpoints. Whatever one
//! end sends, the other receives, in order. Closing or dropping either end
//! disconnects both; messages already in flight can still be drained by the
//! peer before it observes the close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, Notify, mpsc};

use crate::{Channel, ChannelId, TransportError};

/// Counter for generating unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Connection state shared by both ends of a pair.
#[derive(Debug)]
struct Link {
    connected: AtomicBool,
}

/// One end of an in-memory channel pair.
pub struct MemoryChannel {
    id: ChannelId,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    link: Arc<Link>,
    /// Set when *this* end was closed, so pending `recv` calls return.
    closed_here: AtomicBool,
    closed_notify: Notify,
}

/// Creates a connected pair of in-memory channels.
pub fn pair() -> (MemoryChannel, MemoryChannel) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    let link = Arc::new(Link {
        connected: AtomicBool::new(true),
    });

    let a = MemoryChannel::new(a_tx, a_rx, Arc::clone(&link));
    let b = MemoryChannel::new(b_tx, b_rx, link);
    tracing::trace!(a = %a.id, b = %b.id, "memory channel pair created");
    (a, b)
}

impl MemoryChannel {
    fn new(
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
        link: Arc<Link>,
    ) -> Self {
        Self {
            id: ChannelId::new(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed)),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            link,
            closed_here: AtomicBool::new(false),
            closed_notify: Notify::new(),
        }
    }
}

impl Channel for MemoryChannel {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if !self.is_connected() {
            return Err(TransportError::ChannelClosed(self.id.to_string()));
        }
        let tx = self.tx.lock().await;
        let Some(tx) = tx.as_ref() else {
            return Err(TransportError::ChannelClosed(self.id.to_string()));
        };
        tx.send(data.to_vec()).map_err(|_| {
            self.link.connected.store(false, Ordering::Release);
            TransportError::ChannelClosed(self.id.to_string())
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let notified = self.closed_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.closed_here.load(Ordering::Acquire) {
            return Ok(None);
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            msg = rx.recv() => {
                if msg.is_none() {
                    self.link.connected.store(false, Ordering::Release);
                }
                Ok(msg)
            }
            _ = &mut notified => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.closed_here.store(true, Ordering::Release);
        self.link.connected.store(false, Ordering::Release);
        // Dropping our sender is what wakes the peer's pending `recv`.
        self.tx.lock().await.take();
        self.closed_notify.notify_waiters();
        Ok(())
    }

    fn id(&self) -> ChannelId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.link.connected.store(false, Ordering::Release);
    }
}
