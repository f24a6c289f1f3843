use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use labsync_runtime::AccessionSource;
use labsync_schemas::{Accession, AccessionEvent};

/// Serves accession documents from memory, keyed by accession uuid.
/// Replacing a document simulates an upstream change.
#[derive(Default)]
pub struct StaticAccessionSource {
    docs: Mutex<HashMap<String, Accession>>,
    fetches: Mutex<usize>,
}

impl StaticAccessionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(accession: Accession) -> Self {
        let s = Self::new();
        s.put(accession);
        s
    }

    pub fn put(&self, accession: Accession) {
        self.docs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(accession.accession_uuid.clone(), accession);
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl AccessionSource for StaticAccessionSource {
    async fn fetch(&self, event: &AccessionEvent) -> Result<Accession> {
        *self.fetches.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        tokio::task::yield_now().await;
        self.docs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(event.accession_key())
            .cloned()
            .ok_or_else(|| anyhow!("lab system http error status=404 accession={}", event.accession_key()))
    }
}
