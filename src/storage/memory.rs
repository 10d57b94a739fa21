use super::types::{RecordStore, StoreError, check_record};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

/// Record store kept only in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `records`, which are not validated.
    pub fn with_records(records: Vec<String>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Every record, oldest first.
    pub async fn records(&self) -> Vec<String> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self) -> Result<Option<String>, StoreError> {
        let records = self.records.read().await;
        let picked = records.choose(&mut rand::thread_rng()).cloned();
        Ok(picked)
    }

    async fn write(&self, record: String) -> Result<(), StoreError> {
        check_record(&record)?;
        self.records.write().await.push(record);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
