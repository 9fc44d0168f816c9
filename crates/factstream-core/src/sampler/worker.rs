//! Timed attribute reads.
//!
//! Attribute retrieval may block on process or network I/O. When a read
//! budget is configured, reads run on a dedicated worker thread and the
//! cycle waits at most the budget. A timed-out worker is abandoned (it may
//! be stuck inside the registry call) and replaced on the next read; its
//! late reply goes to a disconnected channel and is dropped.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::model::{AttrValue, ObjectId};
use crate::registry::{ObjectRegistry, RegistryError};

type ReadRequest = (u64, ObjectId, String);
type ReadReply = (u64, Result<AttrValue, RegistryError>);

struct Channels {
    req_tx: Sender<ReadRequest>,
    resp_rx: Receiver<ReadReply>,
}

/// Serial reader with a per-read timeout.
pub(crate) struct ReadWorker {
    registry: Arc<dyn ObjectRegistry>,
    timeout: Duration,
    channels: Option<Channels>,
    seq: u64,
}

impl ReadWorker {
    pub(crate) fn new(registry: Arc<dyn ObjectRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            timeout,
            channels: None,
            seq: 0,
        }
    }

    fn spawn(&mut self) {
        let (req_tx, req_rx) = channel::<ReadRequest>();
        let (resp_tx, resp_rx) = channel::<ReadReply>();
        let registry = Arc::clone(&self.registry);
        thread::Builder::new()
            .name("factstream-read".to_string())
            .spawn(move || {
                while let Ok((seq, id, attr)) = req_rx.recv() {
                    let result = registry.read_attribute(&id, &attr);
                    if resp_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| warn!("failed to spawn read worker: {}", e));
        self.channels = Some(Channels { req_tx, resp_rx });
    }

    /// Reads one attribute, giving up after the configured budget.
    pub(crate) fn read(&mut self, id: &ObjectId, attr: &str) -> Result<AttrValue, RegistryError> {
        if self.channels.is_none() {
            self.spawn();
        }
        self.seq += 1;
        let seq = self.seq;

        let send_failed = match &self.channels {
            Some(ch) => ch
                .req_tx
                .send((seq, id.clone(), attr.to_string()))
                .is_err(),
            None => true,
        };
        if send_failed {
            // Worker died; retry once on a fresh one.
            self.spawn();
            if let Some(ch) = &self.channels
                && ch.req_tx.send((seq, id.clone(), attr.to_string())).is_err()
            {
                return Err(RegistryError::Connect("read worker unavailable".to_string()));
            }
        }

        let Some(ch) = &self.channels else {
            return Err(RegistryError::Connect("read worker unavailable".to_string()));
        };
        let deadline = std::time::Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match ch.resp_rx.recv_timeout(remaining) {
                Ok((s, result)) if s == seq => return result,
                // Stale reply from an earlier timed-out read.
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("read of {}/{} exceeded {:?}, abandoning worker", id, attr, self.timeout);
                    self.channels = None;
                    return Err(RegistryError::Timeout(self.timeout));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.channels = None;
                    return Err(RegistryError::Connect("read worker died".to_string()));
                }
            }
        }
    }
}
