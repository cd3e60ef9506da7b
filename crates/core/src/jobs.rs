use crate::models::{JobSnapshot, JobState};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

#[derive(Debug, Clone)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub collection: String,
    cancelled: Arc<AtomicBool>,
}

impl JobTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct JobEntry {
    snapshot: JobSnapshot,
    cancelled: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
    permits: Arc<Semaphore>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_JOBS)
    }
}

impl JobRegistry {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    pub async fn acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().acquire_owned().await.ok()
    }

    pub fn register(&self, collection: &str, file_name: &str, settings_version: u64) -> JobTicket {
        let now = Utc::now();
        let ticket = JobTicket {
            job_id: Uuid::new_v4(),
            collection: collection.to_string(),
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        let entry = JobEntry {
            snapshot: JobSnapshot {
                job_id: ticket.job_id,
                collection: collection.to_string(),
                file_name: file_name.to_string(),
                state: JobState::Received,
                chunks: 0,
                batches_upserted: 0,
                error: None,
                settings_version,
                created_at: now,
                updated_at: now,
            },
            cancelled: ticket.cancelled.clone(),
        };

        let mut jobs = self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = jobs.insert(collection.to_string(), entry) {
            if !previous.snapshot.state.is_terminal() {
                info!(
                    collection,
                    superseded = %previous.snapshot.job_id,
                    "new upload supersedes a running job"
                );
            }
        }
        ticket
    }

    pub fn reject(&self, collection: &str, file_name: &str, error: &str) -> JobSnapshot {
        let now = Utc::now();
        let snapshot = JobSnapshot {
            job_id: Uuid::new_v4(),
            collection: collection.to_string(),
            file_name: file_name.to_string(),
            state: JobState::Rejected,
            chunks: 0,
            batches_upserted: 0,
            error: Some(error.to_string()),
            settings_version: 0,
            created_at: now,
            updated_at: now,
        };

        let mut jobs = self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let keep_running = jobs
            .get(collection)
            .is_some_and(|entry| !entry.snapshot.state.is_terminal());
        if !keep_running {
            jobs.insert(
                collection.to_string(),
                JobEntry {
                    snapshot: snapshot.clone(),
                    cancelled: Arc::new(AtomicBool::new(false)),
                },
            );
        }
        snapshot
    }

    fn update(&self, ticket: &JobTicket, apply: impl FnOnce(&mut JobSnapshot)) {
        let mut jobs = self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = jobs.get_mut(&ticket.collection) {
            if entry.snapshot.job_id == ticket.job_id {
                apply(&mut entry.snapshot);
                entry.snapshot.updated_at = Utc::now();
            }
        }
    }

    pub fn transition(&self, ticket: &JobTicket, state: JobState) {
        debug!(collection = %ticket.collection, job_id = %ticket.job_id, ?state, "job transition");
        self.update(ticket, |snapshot| snapshot.state = state);
    }

    pub fn record_chunks(&self, ticket: &JobTicket, chunks: usize) {
        self.update(ticket, |snapshot| snapshot.chunks = chunks);
    }

    pub fn record_batch(&self, ticket: &JobTicket) {
        self.update(ticket, |snapshot| snapshot.batches_upserted += 1);
    }

    pub fn fail(&self, ticket: &JobTicket, error: &str) {
        self.update(ticket, |snapshot| {
            snapshot.state = JobState::Failed;
            snapshot.error = Some(error.to_string());
        });
    }

    pub fn mark_cancelled(&self, ticket: &JobTicket) {
        self.update(ticket, |snapshot| snapshot.state = JobState::Cancelled);
    }

    pub fn cancel(&self, collection: &str) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        match jobs.get(collection) {
            Some(entry) if !entry.snapshot.state.is_terminal() => {
                entry.cancelled.store(true, Ordering::SeqCst);
                info!(collection, job_id = %entry.snapshot.job_id, "cancellation requested");
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, collection: &str) -> Option<JobSnapshot> {
        self.jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(collection)
            .map(|entry| entry.snapshot.clone())
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots = self
            .jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .map(|entry| entry.snapshot.clone())
            .collect::<Vec<_>>();
        snapshots.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_recorded() {
        let registry = JobRegistry::default();
        let ticket = registry.register("manual", "manual.pdf", 3);

        registry.transition(&ticket, JobState::Embedding);
        registry.record_chunks(&ticket, 12);
        registry.record_batch(&ticket);

        let snapshot = registry.get("manual").expect("job registered");
        assert_eq!(snapshot.state, JobState::Embedding);
        assert_eq!(snapshot.chunks, 12);
        assert_eq!(snapshot.batches_upserted, 1);
        assert_eq!(snapshot.settings_version, 3);
    }

    #[test]
    fn superseded_job_cannot_overwrite_replacement() {
        let registry = JobRegistry::default();
        let old = registry.register("manual", "manual.pdf", 1);
        let new = registry.register("manual", "manual.pdf", 1);

        registry.fail(&old, "late failure");
        let snapshot = registry.get("manual").expect("job registered");
        assert_eq!(snapshot.job_id, new.job_id);
        assert_eq!(snapshot.state, JobState::Received);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn cancel_only_affects_running_jobs() {
        let registry = JobRegistry::default();
        assert!(!registry.cancel("missing"));

        let ticket = registry.register("manual", "manual.pdf", 1);
        assert!(registry.cancel("manual"));
        assert!(ticket.is_cancelled());

        registry.mark_cancelled(&ticket);
        assert!(!registry.cancel("manual"));
    }

    #[test]
    fn rejection_does_not_hide_a_running_job() {
        let registry = JobRegistry::default();
        registry.reject("fresh", "fresh.pdf", "Settings not configured.");
        assert_eq!(
            registry.get("fresh").map(|snapshot| snapshot.state),
            Some(JobState::Rejected)
        );

        let ticket = registry.register("busy", "busy.pdf", 1);
        registry.reject("busy", "busy.pdf", "Settings not configured.");
        assert_eq!(
            registry.get("busy").map(|snapshot| snapshot.job_id),
            Some(ticket.job_id)
        );
    }

    #[tokio::test]
    async fn slots_are_bounded() {
        let registry = JobRegistry::new(1);
        let first = registry.acquire_slot().await;
        assert!(first.is_some());
        assert_eq!(registry.permits.available_permits(), 0);
        drop(first);
        assert_eq!(registry.permits.available_permits(), 1);
    }
}
