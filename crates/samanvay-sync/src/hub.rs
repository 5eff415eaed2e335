use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use samanvay_io::{IoError, MessageSource};
use samanvay_wire::{LiveEvent, LiveEventKind};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    closed: bool,
    subscribers: BTreeMap<u64, Registration>,
}

#[derive(Debug)]
struct Registration {
    kinds: Vec<LiveEventKind>,
    sender: mpsc::Sender<LiveEvent>,
}

#[derive(Debug, Clone)]
pub struct LiveHub {
    registry: Arc<Mutex<Registry>>,
    buffer: usize,
}

impl LiveHub {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            buffer: buffer.max(1),
        }
    }

    /// Registers interest in `kinds`. Subscribing to a closed hub yields a
    /// subscription that ends immediately.
    pub fn subscribe(&self, kinds: &[LiveEventKind]) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;

        if !registry.closed {
            registry.subscribers.insert(
                id,
                Registration {
                    kinds: kinds.to_vec(),
                    sender,
                },
            );
            debug!(subscription = id, ?kinds, "live subscription registered");
        }

        Subscription {
            id,
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Delivers `event` to every subscription interested in its kind and
    /// returns how many received it. Waits while a subscriber's queue is full.
    pub async fn publish(&self, event: LiveEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<mpsc::Sender<LiveEvent>> = self
            .lock()
            .subscribers
            .values()
            .filter(|registration| registration.kinds.contains(&kind))
            .map(|registration| registration.sender.clone())
            .collect();

        let mut delivered = 0;
        for target in targets {
            if target.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn pump<S>(&self, source: &mut S) -> IoError
    where
        S: MessageSource<LiveEvent> + ?Sized,
    {
        loop {
            match source.recv().await {
                Ok(envelope) => {
                    let kind = envelope.message.kind();
                    let sequence = envelope.sequence;
                    if self.publish(envelope.message).await == 0 {
                        debug!(%kind, sequence, "live event had no subscribers");
                    }
                }
                Err(error) => {
                    info!(%error, "live event source ended");
                    self.close();
                    return error;
                }
            }
        }
    }

    /// Ends every subscription. Later subscriptions end immediately.
    pub fn close(&self) {
        let mut registry = self.lock();
        registry.closed = true;
        registry.subscribers.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<LiveEvent>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.subscribers.remove(&self.id).is_some() {
            debug!(subscription = self.id, "live subscription released");
        }
    }
}
