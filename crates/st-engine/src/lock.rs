//! Cross-process migration lock with a bounded wait.

use st_core::{MigrateError, MigrateResult};
use st_db::MigrationConnection;
use std::time::{Duration, Instant};

/// Serializes engine runs against one database.
#[derive(Debug, Clone)]
pub struct MigrationLock {
    key: i64,
    timeout: Duration,
    retry_interval: Duration,
}

impl MigrationLock {
    pub fn new(key: i64, timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            key,
            timeout,
            retry_interval,
        }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    /// Retry until the lock is taken or the timeout passes.
    pub async fn acquire(&self, conn: &dyn MigrationConnection, owner: &str) -> MigrateResult<()> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if conn.try_acquire_lock(self.key, owner).await? {
                log::debug!(
                    "Acquired migration lock {} after {} attempt(s)",
                    self.key,
                    attempts
                );
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                return Err(MigrateError::LockContention {
                    key: self.key,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            if attempts == 1 {
                log::warn!(
                    "Migration lock {} is held by another instance; waiting up to {}ms",
                    self.key,
                    self.timeout.as_millis()
                );
            }
            tokio::time::sleep(self.retry_interval.min(self.timeout - waited)).await;
        }
    }

    pub async fn release(&self, conn: &dyn MigrationConnection, owner: &str) -> MigrateResult<()> {
        conn.release_lock(self.key, owner).await?;
        log::debug!("Released migration lock {}", self.key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod tests;
