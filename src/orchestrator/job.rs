//! Video jobs and the in-memory job registry.

use crate::error::{ErrorKind, Result, VidscribeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// Where a job is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Extracting,
    Transcribing,
    Embedding,
    Indexed,
    Failed,
}

impl JobStatus {
    /// Indexed and Failed are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Indexed | JobStatus::Failed)
    }

    /// Whether the pipeline may move from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        match (self, next) {
            (Pending, Extracting)
            | (Extracting, Transcribing)
            | (Transcribing, Embedding)
            | (Transcribing, Indexed)
            | (Embedding, Indexed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Extracting => "extracting",
            JobStatus::Transcribing => "transcribing",
            JobStatus::Embedding => "embedding",
            JobStatus::Indexed => "indexed",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&VidscribeError> for JobError {
    fn from(err: &VidscribeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One run of the pipeline over one video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: Uuid,
    pub video_id: String,
    pub source: PathBuf,
    /// The source is an upload this job is responsible for removing.
    pub owns_source: bool,
    /// Transcription model this run uses.
    pub model: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<JobError>,
    pub chunks_indexed: usize,
}

impl VideoJob {
    /// A job for a new video; the video takes the job's id.
    pub fn new(source: PathBuf, owns_source: bool, model: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self::for_video(id, id.to_string(), source, owns_source, model.into())
    }

    /// Another run over a video that already has an id.
    pub fn rerun(video_id: &str, source: PathBuf, model: impl Into<String>) -> Self {
        Self::for_video(Uuid::new_v4(), video_id.to_string(), source, false, model.into())
    }

    fn for_video(id: Uuid, video_id: String, source: PathBuf, owns_source: bool, model: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            video_id,
            source,
            owns_source,
            model,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            error: None,
            chunks_indexed: 0,
        }
    }
}

struct Entry {
    job: VideoJob,
    cancel: Arc<AtomicBool>,
}

/// Jobs by id, with a cancellation flag per job.
///
/// Every status change goes through [`JobRegistry::transition`], so the
/// state machine is enforced in one place.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Entry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and hand back its cancellation flag.
    pub fn insert(&self, job: VideoJob) -> Arc<AtomicBool> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        Self::register(&mut jobs, job)
    }

    /// Register a job unless another job of the same video is unfinished.
    ///
    /// The check and the insert happen under one lock, so two callers racing
    /// for the same video cannot both succeed.
    pub fn insert_exclusive(&self, job: VideoJob) -> Result<Arc<AtomicBool>> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);

        let busy = jobs
            .values()
            .any(|e| e.job.video_id == job.video_id && !e.job.status.is_terminal());
        if busy {
            return Err(VidscribeError::InvalidInput(format!(
                "video {} is already being processed",
                job.video_id
            )));
        }

        Ok(Self::register(&mut jobs, job))
    }

    fn register(jobs: &mut HashMap<Uuid, Entry>, job: VideoJob) -> Arc<AtomicBool> {
        let cancel = Arc::new(AtomicBool::new(false));
        jobs.insert(
            job.id,
            Entry {
                job,
                cancel: Arc::clone(&cancel),
            },
        );
        cancel
    }

    pub fn get(&self, id: Uuid) -> Result<VideoJob> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|e| e.job.clone())
            .ok_or_else(|| VidscribeError::JobNotFound(id.to_string()))
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<VideoJob> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut listed: Vec<VideoJob> = jobs.values().map(|e| e.job.clone()).collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        listed
    }

    /// Jobs of one video, oldest first.
    pub fn for_video(&self, video_id: &str) -> Vec<VideoJob> {
        self.list().into_iter().filter(|j| j.video_id == video_id).collect()
    }

    /// Move a job to `next`, rejecting anything the state machine forbids.
    pub fn transition(&self, id: Uuid, next: JobStatus) -> Result<VideoJob> {
        self.update(id, |job| {
            if !job.status.can_transition_to(next) {
                return Err(VidscribeError::InvalidTransition {
                    from: job.status.to_string(),
                    to: next.to_string(),
                });
            }
            job.status = next;
            Ok(())
        })
    }

    /// Mark a job indexed with the number of chunks it stored.
    pub fn complete(&self, id: Uuid, chunks_indexed: usize) -> Result<VideoJob> {
        self.update(id, |job| {
            if !job.status.can_transition_to(JobStatus::Indexed) {
                return Err(VidscribeError::InvalidTransition {
                    from: job.status.to_string(),
                    to: JobStatus::Indexed.to_string(),
                });
            }
            job.status = JobStatus::Indexed;
            job.chunks_indexed = chunks_indexed;
            Ok(())
        })
    }

    /// Mark a job failed.
    pub fn fail(&self, id: Uuid, error: JobError) -> Result<VideoJob> {
        self.update(id, |job| {
            if !job.status.can_transition_to(JobStatus::Failed) {
                return Err(VidscribeError::InvalidTransition {
                    from: job.status.to_string(),
                    to: JobStatus::Failed.to_string(),
                });
            }
            job.status = JobStatus::Failed;
            job.error = Some(error);
            Ok(())
        })
    }

    /// Ask a running job to stop. Returns false if it had already finished.
    pub fn cancel(&self, id: Uuid) -> Result<bool> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let entry = jobs
            .get(&id)
            .ok_or_else(|| VidscribeError::JobNotFound(id.to_string()))?;

        if entry.job.status.is_terminal() {
            return Ok(false);
        }
        entry.cancel.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Flag every unfinished job, optionally only those of one video.
    pub fn cancel_all(&self, video_id: Option<&str>) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut flagged = 0;
        for entry in jobs.values() {
            if entry.job.status.is_terminal() || video_id.is_some_and(|v| entry.job.video_id != v) {
                continue;
            }
            entry.cancel.store(true, Ordering::SeqCst);
            flagged += 1;
        }
        flagged
    }

    /// Drop every job of a video, returning what was removed.
    pub fn remove_video(&self, video_id: &str) -> Vec<VideoJob> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let ids: Vec<Uuid> = jobs
            .values()
            .filter(|e| e.job.video_id == video_id)
            .map(|e| e.job.id)
            .collect();
        ids.iter().filter_map(|id| jobs.remove(id)).map(|e| e.job).collect()
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut VideoJob) -> Result<()>) -> Result<VideoJob> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let entry = jobs
            .get_mut(&id)
            .ok_or_else(|| VidscribeError::JobNotFound(id.to_string()))?;

        apply(&mut entry.job)?;
        entry.job.updated_at = Utc::now();
        Ok(entry.job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    const ALL: [JobStatus; 6] = [Pending, Extracting, Transcribing, Embedding, Indexed, Failed];

    #[test]
    fn test_allowed_transitions() {
        let allowed = [
            (Pending, Extracting),
            (Extracting, Transcribing),
            (Transcribing, Embedding),
            (Transcribing, Indexed),
            (Embedding, Indexed),
            (Pending, Failed),
            (Extracting, Failed),
            (Transcribing, Failed),
            (Embedding, Failed),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(Indexed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Embedding.is_terminal());
    }

    #[test]
    fn test_registry_rejects_skipped_stage() {
        let registry = JobRegistry::new();
        let job = VideoJob::new(PathBuf::from("talk.mp4"), false, "whisper-1");
        let id = job.id;
        registry.insert(job);

        let err = registry.transition(id, Embedding).unwrap_err();
        assert!(matches!(err, VidscribeError::InvalidTransition { .. }));
        assert_eq!(registry.get(id).unwrap().status, Pending);

        registry.transition(id, Extracting).unwrap();
        registry.transition(id, Transcribing).unwrap();
        let done = registry.complete(id, 0).unwrap();
        assert_eq!(done.status, Indexed);

        let err = registry
            .fail(id, JobError { kind: ErrorKind::Internal, message: "late".into() })
            .unwrap_err();
        assert!(matches!(err, VidscribeError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cancel_sets_flag_only_while_running() {
        let registry = JobRegistry::new();
        let job = VideoJob::new(PathBuf::from("talk.mp4"), false, "whisper-1");
        let id = job.id;
        let flag = registry.insert(job);

        assert!(registry.cancel(id).unwrap());
        assert!(flag.load(Ordering::SeqCst));

        registry
            .fail(id, JobError { kind: ErrorKind::Cancelled, message: "cancelled".into() })
            .unwrap();
        assert!(!registry.cancel(id).unwrap());
        assert!(matches!(
            registry.cancel(Uuid::new_v4()),
            Err(VidscribeError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_rerun_keeps_video_id() {
        let first = VideoJob::new(PathBuf::from("a.mp4"), true, "whisper-1");
        assert_eq!(first.video_id, first.id.to_string());

        let again = VideoJob::rerun(&first.video_id, first.source.clone(), "whisper-large");
        assert_eq!(again.video_id, first.video_id);
        assert_ne!(again.id, first.id);
        assert!(!again.owns_source);
        assert_eq!(again.model, "whisper-large");
    }

    #[test]
    fn test_remove_video_drops_only_its_jobs() {
        let registry = JobRegistry::new();
        let a = VideoJob::new(PathBuf::from("a.mp4"), false, "whisper-1");
        let b = VideoJob::new(PathBuf::from("b.mp4"), false, "whisper-1");
        let a_again = VideoJob::rerun(&a.video_id, a.source.clone(), "whisper-1");
        let video_a = a.video_id.clone();
        registry.insert(a);
        registry.insert(b);
        registry.insert(a_again);

        assert_eq!(registry.cancel_all(Some(&video_a)), 2);
        assert_eq!(registry.remove_video(&video_a).len(), 2);
        assert_eq!(registry.list().len(), 1);
        assert!(registry.for_video(&video_a).is_empty());
    }

    #[test]
    fn test_insert_exclusive_refuses_a_second_active_job() {
        let registry = JobRegistry::new();
        let first = VideoJob::new(PathBuf::from("a.mp4"), false, "whisper-1");
        let first_id = first.id;
        let video = first.video_id.clone();
        registry.insert_exclusive(first).unwrap();

        let err = registry
            .insert_exclusive(VideoJob::rerun(&video, PathBuf::from("a.mp4"), "whisper-1"))
            .unwrap_err();
        assert!(matches!(err, VidscribeError::InvalidInput(_)));
        assert_eq!(registry.for_video(&video).len(), 1);

        // Other videos are not affected
        registry
            .insert_exclusive(VideoJob::new(PathBuf::from("b.mp4"), false, "whisper-1"))
            .unwrap();

        registry
            .fail(first_id, JobError { kind: ErrorKind::Internal, message: "done".into() })
            .unwrap();
        registry
            .insert_exclusive(VideoJob::rerun(&video, PathBuf::from("a.mp4"), "whisper-1"))
            .unwrap();
        assert_eq!(registry.for_video(&video).len(), 2);
    }

    #[test]
    fn test_insert_exclusive_admits_one_of_many_racing_callers() {
        let registry = Arc::new(JobRegistry::new());
        let video = Uuid::new_v4().to_string();

        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    let video = video.clone();
                    scope.spawn(move || {
                        registry
                            .insert_exclusive(VideoJob::rerun(&video, PathBuf::from("a.mp4"), "whisper-1"))
                            .is_ok()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap() as usize).sum()
        });

        assert_eq!(admitted, 1);
        assert_eq!(registry.for_video(&video).len(), 1);
    }
}
