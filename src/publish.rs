//! Bounded, non-blocking fan-out between pipeline stages.
//!
//! A full queue drops the message being sent; the producer never waits.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Queue full; the message was discarded.
    Dropped,
    /// Consumer gone.
    Closed,
}

pub struct Publisher<T> {
    tx: mpsc::Sender<T>,
    stage: &'static str,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stage: self.stage,
        }
    }
}

impl<T> Publisher<T> {
    pub fn new(tx: mpsc::Sender<T>, stage: &'static str) -> Self {
        Self { tx, stage }
    }

    pub fn publish(&self, msg: T) -> Delivery {
        match self.tx.try_send(msg) {
            Ok(()) => {
                trace!(stage = self.stage, "published");
                Delivery::Sent
            }
            Err(TrySendError::Full(_)) => {
                warn!(stage = self.stage, "queue full, dropping message");
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                trace!(stage = self.stage, "consumer closed");
                Delivery::Closed
            }
        }
    }
}

/// Creates a bounded queue and its publishing end.
pub fn bounded<T>(capacity: usize, stage: &'static str) -> (Publisher<T>, mpsc::Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Publisher::new(tx, stage), rx)
}
