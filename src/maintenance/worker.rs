//! Applies repair tasks on a dedicated thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};

use crate::error::{Result, RowlensError};
use crate::index::IndexWriter;
use crate::maintenance::consistency::{IndexMaintenance, RepairTask};

enum Message {
    Repair(RepairTask),
    Flush(Sender<()>),
}

/// Queue of repair tasks drained by one worker thread.
///
/// `submit` only enqueues. Failed repairs are logged and dropped; the next
/// search that meets the stale entry queues it again. Dropping the repairer
/// applies whatever is still queued and joins the worker.
#[derive(Debug)]
pub struct BackgroundRepairer {
    sender: Option<Sender<Message>>,
    handle: Option<JoinHandle<()>>,
    applied: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl BackgroundRepairer {
    pub fn spawn(writer: Arc<dyn IndexWriter>) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let applied = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let worker_applied = Arc::clone(&applied);
        let worker_failed = Arc::clone(&failed);
        let handle = thread::Builder::new()
            .name("rowlens-repair".to_string())
            .spawn(move || run(writer, receiver, worker_applied, worker_failed))
            .map_err(|e| RowlensError::internal(format!("failed to start repair worker: {e}")))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            applied,
            failed,
        })
    }

    /// Wait until every task submitted before this call has been applied.
    pub fn flush(&self) -> Result<()> {
        let (done, wait) = crossbeam_channel::bounded(1);
        self.send(Message::Flush(done))?;
        wait.recv()
            .map_err(|e| RowlensError::internal(format!("repair worker stopped during flush: {e}")))
    }

    /// Number of tasks applied successfully.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    fn send(&self, message: Message) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RowlensError::internal("repair worker is shut down"))?;
        sender
            .send(message)
            .map_err(|_| RowlensError::internal("repair worker has stopped"))
    }
}

impl IndexMaintenance for BackgroundRepairer {
    fn submit(&self, task: RepairTask) -> Result<()> {
        self.send(Message::Repair(task))
    }
}

impl Drop for BackgroundRepairer {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the queue and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("repair worker panicked");
        }
    }
}

fn run(
    writer: Arc<dyn IndexWriter>,
    receiver: Receiver<Message>,
    applied: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
) {
    for message in receiver {
        match message {
            Message::Repair(task) => match task.apply(writer.as_ref()) {
                Ok(removed) => {
                    debug!("repair {task:?} removed {removed} documents");
                    applied.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!("repair {task:?} failed: {e}");
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            },
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
