//! Hand-off point for player tables superseded by a clear.
//!
//! The aggregation engine never touches the filesystem itself: every
//! `clear_all` moves the old table into an [`Encounter`] and passes it to the
//! configured [`Archive`]. Failures are logged by the engine and otherwise
//! ignored. Wrap a filesystem archive in [`BackgroundArchive`] so the write
//! happens off the event path.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded, unbounded};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::millis_to_rfc3339;
use crate::stats::PlayerRecord;
use crate::PlayerSummary;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("archive writer thread has stopped")]
    WriterStopped,
}

/// A player table together with the epoch it covered.
#[derive(Debug, Clone)]
pub struct Encounter {
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub players: HashMap<u64, PlayerRecord>,
    /// Timestamped fight log lines, oldest first.
    pub log: Vec<String>,
}

/// Metadata written next to an archived encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterSummary {
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    pub user_count: usize,
    pub version: String,
}

impl Encounter {
    pub fn summary(&self) -> EncounterSummary {
        EncounterSummary {
            started_at_ms: self.started_at_ms,
            ended_at_ms: self.ended_at_ms,
            duration_ms: self.ended_at_ms.saturating_sub(self.started_at_ms),
            started_at: millis_to_rfc3339(self.started_at_ms),
            ended_at: millis_to_rfc3339(self.ended_at_ms),
            user_count: self.players.len(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn player_summaries(&self) -> BTreeMap<u64, PlayerSummary> {
        self.players
            .iter()
            .map(|(uid, player)| (*uid, player.summary()))
            .collect()
    }
}

/// Persistence collaborator for superseded player tables.
pub trait Archive: Send {
    fn archive(&mut self, encounter: Encounter) -> Result<(), ArchiveError>;

    /// Block until every encounter handed over so far is persisted.
    fn flush(&mut self) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Archive that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArchive;

impl Archive for NullArchive {
    fn archive(&mut self, _encounter: Encounter) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Writes each encounter to `<root>/<started_at_ms>/`:
/// `summary.json`, `all_users.json`, one `users/<uid>.json` per player and
/// `fight.log` when the encounter has log lines.
#[derive(Debug, Clone)]
pub struct JsonArchive {
    root: PathBuf,
}

impl JsonArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn encounter_dir(&self, started_at_ms: u64) -> PathBuf {
        self.root.join(started_at_ms.to_string())
    }
}

impl Archive for JsonArchive {
    fn archive(&mut self, encounter: Encounter) -> Result<(), ArchiveError> {
        let dir = self.encounter_dir(encounter.started_at_ms);
        let users_dir = dir.join("users");
        fs::create_dir_all(&users_dir)?;

        let all_users = serde_json::to_string_pretty(&encounter.player_summaries())?;
        fs::write(dir.join("all_users.json"), all_users)?;

        for (uid, player) in &encounter.players {
            let data = serde_json::to_string_pretty(&player.skill_data())?;
            fs::write(users_dir.join(format!("{uid}.json")), data)?;
        }

        if !encounter.log.is_empty() {
            let mut log = encounter.log.join("\n");
            log.push('\n');
            fs::write(dir.join("fight.log"), log)?;
        }

        let summary = serde_json::to_string_pretty(&encounter.summary())?;
        fs::write(dir.join("summary.json"), summary)?;

        tracing::debug!(
            users = encounter.players.len(),
            dir = %dir.display(),
            "encounter archived"
        );
        Ok(())
    }
}

#[derive(Debug)]
enum ArchiveJob {
    Write(Encounter),
    Flush(Sender<()>),
}

/// Runs another archive on a dedicated writer thread.
///
/// `archive` only queues the encounter; writes happen in order on the
/// writer, which logs its own failures. Dropping the handle waits for
/// queued writes to finish.
#[derive(Debug)]
pub struct BackgroundArchive {
    tx: Option<Sender<ArchiveJob>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundArchive {
    pub fn spawn<A: Archive + 'static>(mut inner: A) -> Result<Self, ArchiveError> {
        let (tx, rx) = unbounded::<ArchiveJob>();
        let worker = thread::Builder::new()
            .name("archive-writer".to_string())
            .spawn(move || {
                for job in rx {
                    match job {
                        ArchiveJob::Write(encounter) => {
                            let started_at_ms = encounter.started_at_ms;
                            if let Err(err) = inner.archive(encounter) {
                                tracing::warn!(started_at_ms, error = %err, "failed to archive encounter");
                            }
                        }
                        ArchiveJob::Flush(done) => {
                            if let Err(err) = inner.flush() {
                                tracing::warn!(error = %err, "failed to flush archive");
                            }
                            let _ = done.send(());
                        }
                    }
                }
                tracing::debug!("archive writer stopped");
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    fn send(&self, job: ArchiveJob) -> Result<(), ArchiveError> {
        self.tx
            .as_ref()
            .ok_or(ArchiveError::WriterStopped)?
            .send(job)
            .map_err(|_| ArchiveError::WriterStopped)
    }
}

impl Archive for BackgroundArchive {
    fn archive(&mut self, encounter: Encounter) -> Result<(), ArchiveError> {
        self.send(ArchiveJob::Write(encounter))
    }

    fn flush(&mut self) -> Result<(), ArchiveError> {
        let (done_tx, done_rx) = bounded(1);
        self.send(ArchiveJob::Flush(done_tx))?;
        done_rx.recv().map_err(|_| ArchiveError::WriterStopped)
    }
}

impl Drop for BackgroundArchive {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("archive writer panicked");
            }
        }
    }
}
