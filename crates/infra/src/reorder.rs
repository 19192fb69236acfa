//! Reorder sink implementations.
//!
//! Reorder signals are *notifications*, not ledger state: they are emitted
//! after a mutation commits and may be dropped without affecting it.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::info;

use stockledger_inventory::{ReorderSignal, ReorderSink, ReorderSinkError};

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReorderSink {
    inner: Mutex<Vec<ReorderSignal>>,
}

impl InMemoryReorderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ReorderSignal> {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReorderSink for InMemoryReorderSink {
    fn emit(&self, signal: ReorderSignal) -> Result<(), ReorderSinkError> {
        self.inner
            .lock()
            .map_err(|_| ReorderSinkError::Unavailable("lock poisoned".to_string()))?
            .push(signal);
        Ok(())
    }
}

/// Writes each signal as a structured log line. Useful where procurement
/// tooling tails the logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReorderSink;

impl ReorderSink for TracingReorderSink {
    fn emit(&self, signal: ReorderSignal) -> Result<(), ReorderSinkError> {
        let payload = serde_json::to_string(&signal)
            .map_err(|e| ReorderSinkError::Unavailable(format!("serialize signal: {e}")))?;
        info!(
            target: "stockledger::reorder",
            store_id = %signal.store_id,
            product_id = %signal.product_id,
            available = signal.available,
            reorder_quantity = signal.reorder_quantity,
            signal = %payload,
            "reorder needed"
        );
        Ok(())
    }
}

/// Hands signals to a bounded queue drained by a separate task.
///
/// Never waits: a full queue rejects the signal with `ReorderSinkError::Full`.
#[derive(Debug, Clone)]
pub struct ChannelReorderSink {
    tx: mpsc::Sender<ReorderSignal>,
}

impl ChannelReorderSink {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ReorderSignal>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ReorderSink for ChannelReorderSink {
    fn emit(&self, signal: ReorderSignal) -> Result<(), ReorderSinkError> {
        self.tx.try_send(signal).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ReorderSinkError::Full,
            mpsc::error::TrySendError::Closed(_) => ReorderSinkError::Closed,
        })
    }
}
