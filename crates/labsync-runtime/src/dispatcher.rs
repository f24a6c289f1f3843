use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use labsync_schemas::AccessionEvent;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::FeedError;
use crate::worker::{AccessionWorker, ProcessOutcome};

type KeyLock = Arc<AsyncMutex<()>>;

/// Runs notifications with bounded concurrency while serializing
/// notifications for the same accession.
///
/// A task takes its accession lock before a concurrency permit, so tasks
/// queued behind a busy accession never hold permits others could use.
#[derive(Clone)]
pub struct Dispatcher {
    worker: Arc<AccessionWorker>,
    permits: Arc<Semaphore>,
    locks: Arc<Mutex<HashMap<String, KeyLock>>>,
}

impl Dispatcher {
    pub fn new(worker: Arc<AccessionWorker>, concurrency: usize) -> Self {
        Self {
            worker,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn dispatch(&self, event: AccessionEvent) -> Result<ProcessOutcome, FeedError> {
        let key = event.accession_key().to_string();
        let lock = self.lock_for(&key);

        let result = {
            let _serial = lock.lock().await;
            match self.permits.acquire().await {
                Ok(_permit) => self.worker.process(&event).await,
                Err(_) => Err(FeedError::Configuration("dispatcher is shut down".to_string())),
            }
        };

        self.release(&key, lock);
        result
    }

    /// Dispatch every event concurrently; results come back in input order.
    pub async fn dispatch_all(
        &self,
        events: Vec<AccessionEvent>,
    ) -> Vec<Result<ProcessOutcome, FeedError>> {
        let n = events.len();
        let mut set = JoinSet::new();
        for (i, event) in events.into_iter().enumerate() {
            let this = self.clone();
            set.spawn(async move { (i, this.dispatch(event).await) });
        }

        let mut slots: Vec<Option<Result<ProcessOutcome, FeedError>>> = (0..n).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, r)) => slots[i] = Some(r),
                Err(e) => tracing::error!(error = %e, "dispatch task panicked"),
            }
        }
        slots
            .into_iter()
            .map(|s| s.unwrap_or_else(|| Err(FeedError::Integrity("dispatch task aborted".to_string()))))
            .collect()
    }

    /// Accessions with a live lock entry (held or awaited).
    pub fn tracked_keys(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, KeyLock>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_for(&self, key: &str) -> KeyLock {
        self.table().entry(key.to_string()).or_default().clone()
    }

    /// Drop the table entry once no task holds or awaits it.
    fn release(&self, key: &str, lock: KeyLock) {
        let mut table = self.table();
        drop(lock);
        if table.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            table.remove(key);
        }
    }
}
