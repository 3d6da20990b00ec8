//! Append-only audit logging.
//!
//! The audit store is caller-owned and injected into the executor, never an
//! ambient singleton, so each test can run against an isolated store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use marshal_protocol::AuditRecord;
use parking_lot::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Relative location of the audit log under the project root.
pub const AUDIT_LOG_RELATIVE_PATH: &str = ".marshal/audit.log";

/// Sink for audit records. Append-only: no update or delete surface.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// Audit log backed by an append-only text file at a fixed path relative to
/// the project root. Each entry is `[ISO-8601 timestamp] ACTION\ndetail\n\n`.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileAuditLog {
    /// Audit log for the given project root, at [`AUDIT_LOG_RELATIVE_PATH`].
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(AUDIT_LOG_RELATIVE_PATH),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create audit dir {parent:?}"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for FileAuditLog {
    #[instrument(skip(self, record), fields(action = %record.action))]
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        Self::ensure_parent(&self.path).await?;
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed opening audit log {:?}", self.path))?;
        file.write_all(record.render().as_bytes()).await?;
        file.flush().await?;
        debug!("audit record appended");
        Ok(())
    }
}

/// In-memory audit store for tests and embedders that present their own
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use marshal_protocol::{AuditAction, AuditRecord};
    use anyhow::Result;
    use tokio::fs;

    use crate::{AuditSink, FileAuditLog, MemoryAuditLog};

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    #[tokio::test]
    async fn file_audit_log_appends_rendered_entries_in_order() -> Result<()> {
        let root = unique_test_root("marshal-audit");
        let log = FileAuditLog::for_root(&root);

        log.append(&AuditRecord::new(
            AuditAction::CommandExecuted,
            "echo one (risk=low)",
        ))
        .await?;
        log.append(&AuditRecord::new(AuditAction::PatchApplied, "src/lib.rs"))
            .await?;

        let content = fs::read_to_string(log.path()).await?;
        let first = content.find("COMMAND_EXECUTED").unwrap();
        let second = content.find("PATCH_APPLIED").unwrap();
        assert!(first < second);
        assert!(content.contains("echo one (risk=low)\n\n"));
        assert!(content.starts_with('['));

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn memory_audit_log_keeps_caller_owned_records() -> Result<()> {
        let log = MemoryAuditLog::default();
        assert!(log.is_empty());
        log.append(&AuditRecord::new(AuditAction::PolicyDenied, "blocked"))
            .await?;
        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::PolicyDenied);
        Ok(())
    }
}
