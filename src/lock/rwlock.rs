//! Local readers-writer lock.
//!
//! Readers share the resource; a writer excludes readers and other writers.
//! The first reader in takes the writer slot on behalf of all readers and
//! the last one out gives it back, so readers are preferred.
//!
//! Acquire and release are separate calls (not guards) because the
//! distributed lock built on top releases from a different call than the
//! one that acquired.

use tokio::sync::{Mutex, Semaphore};

pub struct ReadWriteLock {
    readers: Mutex<usize>,
    writer: Semaphore,
}

impl ReadWriteLock {
    pub fn new() -> Self {
        Self {
            readers: Mutex::new(0),
            writer: Semaphore::new(1),
        }
    }

    /// Waits only while a writer is inside.
    pub async fn read_acquire(&self) {
        let mut readers = self.readers.lock().await;
        if *readers == 0 {
            self.take_writer_slot().await;
        }
        *readers += 1;
    }

    pub async fn read_release(&self) {
        let mut readers = self.readers.lock().await;
        match *readers {
            0 => tracing::warn!("read_release without a matching read_acquire"),
            1 => {
                *readers = 0;
                self.writer.add_permits(1);
            }
            _ => *readers -= 1,
        }
    }

    pub async fn write_acquire(&self) {
        self.take_writer_slot().await;
    }

    /// May be called from a task other than the one that acquired.
    pub async fn write_release(&self) {
        if self.writer.available_permits() > 0 {
            tracing::warn!("write_release without a matching write_acquire");
            return;
        }
        self.writer.add_permits(1);
    }

    pub async fn reader_count(&self) -> usize {
        *self.readers.lock().await
    }

    async fn take_writer_slot(&self) {
        // The semaphore is never closed.
        if let Ok(permit) = self.writer.acquire().await {
            permit.forget();
        }
    }
}

impl Default for ReadWriteLock {
    fn default() -> Self {
        Self::new()
    }
}
