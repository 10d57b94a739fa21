use super::types::{RecordStore, StoreError, check_record};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Line that terminates a record in a fortune file.
pub const SEPARATOR: &str = "%";

struct FortuneFile {
    records: Vec<String>,
    /// Written before the next record so the file stays well formed when it
    /// did not end with a separator.
    pending_prefix: String,
}

/// Fortune file kept in memory and appended to on every write.
pub struct FortuneDatabase {
    path: PathBuf,
    file: RwLock<FortuneFile>,
}

impl FortuneDatabase {
    /// Loads `path`. A missing file is an empty database and is created on
    /// the first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let (records, pending_prefix) = parse(&content);
        tracing::info!("Loaded {} fortunes from {}", records.len(), path.display());

        Ok(Self {
            path,
            file: RwLock::new(FortuneFile {
                records,
                pending_prefix,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Splits a fortune file into records. Also returns what has to be written
/// before appending a new record.
fn parse(content: &str) -> (Vec<String>, String) {
    let mut records = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim_end() == SEPARATOR {
            push_record(&mut records, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }

    let unterminated = current.iter().any(|line| !line.trim().is_empty());
    push_record(&mut records, &current);

    let mut prefix = String::new();
    if !content.is_empty() && !content.ends_with('\n') {
        prefix.push('\n');
    }
    if unterminated {
        prefix.push_str(SEPARATOR);
        prefix.push('\n');
    }

    (records, prefix)
}

fn push_record(records: &mut Vec<String>, lines: &[&str]) {
    let record = lines.join("\n");
    if !record.trim().is_empty() {
        records.push(record);
    }
}

#[async_trait]
impl RecordStore for FortuneDatabase {
    async fn read(&self) -> Result<Option<String>, StoreError> {
        let file = self.file.read().await;
        let picked = file.records.choose(&mut rand::thread_rng()).cloned();
        Ok(picked)
    }

    async fn write(&self, record: String) -> Result<(), StoreError> {
        check_record(&record)?;
        let record = record.trim_end_matches('\n').to_string();

        let mut file = self.file.write().await;
        let entry = format!("{}{}\n{}\n", file.pending_prefix, record, SEPARATOR);

        let io = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io)?;
        handle.write_all(entry.as_bytes()).await.map_err(io)?;
        handle.flush().await.map_err(io)?;

        file.pending_prefix.clear();
        file.records.push(record);
        Ok(())
    }

    async fn len(&self) -> usize {
        self.file.read().await.records.len()
    }
}
