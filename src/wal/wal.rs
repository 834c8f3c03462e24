use crate::models::{payment::Payment, user::User};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Journal record. Each line of the journal is one of these, JSON encoded.
///
/// Records carry full entity state, so replay keeps the last `Put*` per id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WalOperation {
    PutUser { user: User },
    RemoveUser { id: u32 },
    PutPayment { payment: Payment },
    /// Lowest user id that may still be assigned. Written on compaction so
    /// ids of removed users stay retired.
    NextUserId { next_id: u32 },
}

pub struct Wal {
    file: Mutex<File>,
    path: PathBuf,
    /// Records appended since the journal was opened or last compacted
    appended: AtomicUsize,
}

impl Wal {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = Self::open_append(&path)?;

        Ok(Wal {
            file: Mutex::new(file),
            path,
            appended: AtomicUsize::new(0),
        })
    }

    fn open_append(path: &PathBuf) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open journal file {}", path.display()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, File>> {
        self.file.lock().map_err(|_| anyhow!("Journal lock poisoned"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn log_operation(&self, op: &WalOperation) -> Result<()> {
        let line = serde_json::to_string(op).context("Failed to encode journal record")?;
        let mut file = self.lock()?;
        writeln!(file, "{}", line).context("Failed to write to journal")?;
        file.flush().context("Failed to flush journal")?;
        self.appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn records_since_compaction(&self) -> usize {
        self.appended.load(Ordering::Relaxed)
    }

    pub fn replay(&self) -> Result<Vec<WalOperation>> {
        let file = File::open(&self.path).context("Failed to open journal for replay")?;
        let reader = BufReader::new(file);
        let mut operations = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from journal")?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<WalOperation>(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse journal line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }

    /// Replace the journal with `operations`, one record each.
    ///
    /// The new content is written to a sibling temp file and renamed over the
    /// journal, so a crash leaves either the old or the new journal intact.
    pub fn compact(&self, operations: &[WalOperation]) -> Result<()> {
        let mut file = self.lock()?;

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut tmp = File::create(&tmp_path).context("Failed to create compacted journal")?;
            for op in operations {
                let line =
                    serde_json::to_string(op).context("Failed to encode journal record")?;
                writeln!(tmp, "{}", line).context("Failed to write compacted journal")?;
            }
            tmp.sync_all().context("Failed to sync compacted journal")?;
        }

        fs::rename(&tmp_path, &self.path).context("Failed to swap in compacted journal")?;
        *file = Self::open_append(&self.path)?;
        self.appended.store(0, Ordering::Relaxed);

        Ok(())
    }
}
