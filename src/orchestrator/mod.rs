//! Pipeline orchestrator for vidscribe.
//!
//! Coordinates the whole process from an uploaded video to an indexed,
//! searchable transcript, and tracks each run as a [`VideoJob`].
//!
//! Stages run strictly in order within a job. Jobs share only the vector
//! store and the job registry, and nothing reaches the store unless every
//! earlier stage succeeded.

mod context;
mod job;

pub use context::{PipelineContext, StageTimeouts};
pub use job::{JobError, JobRegistry, JobStatus, VideoJob};
pub use crate::vector_store::TranscriptRecord;

use crate::config::Settings;
use crate::embedding::embed_chunks;
use crate::error::{Result, Stage, VidscribeError};
use crate::transcription::close_gaps;
use crate::vector_store::{IndexedVideo, QueryFilter, QueryResult, VectorStore, VideoMetadata};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// The main orchestrator for the vidscribe pipeline.
///
/// Cheap to clone; clones share backends, jobs and running tasks.
#[derive(Clone)]
pub struct Orchestrator {
    context: Arc<PipelineContext>,
    jobs: Arc<JobRegistry>,
    tasks: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
    uploads_dir: PathBuf,
}

impl Orchestrator {
    /// Create an orchestrator with the backends selected in settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let context = PipelineContext::from_settings(settings)?;
        Ok(Self::with_context(context, settings.uploads_dir()))
    }

    /// Create an orchestrator with custom components.
    pub fn with_context(context: PipelineContext, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            context: Arc::new(context),
            jobs: Arc::new(JobRegistry::new()),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            uploads_dir: uploads_dir.into(),
        }
    }

    /// Get the pipeline backends.
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.context.store)
    }

    /// Start processing a video in the background.
    ///
    /// `model` overrides the transcriber's default model for this video.
    /// Must be called from within a tokio runtime.
    #[instrument(skip(self, source))]
    pub fn create_transcript(&self, source: impl Into<PathBuf>, model: Option<&str>) -> Result<Uuid> {
        let model = self.resolve_model(model)?;
        Ok(self.spawn(VideoJob::new(source.into(), false, model)))
    }

    /// Process a video to completion in the caller's task.
    ///
    /// A pipeline failure is reported through the returned job's status and
    /// error, not as an `Err`.
    pub async fn process_video(&self, source: impl Into<PathBuf>, model: Option<&str>) -> Result<VideoJob> {
        let job = VideoJob::new(source.into(), false, self.resolve_model(model)?);
        let id = job.id;
        let cancel = self.jobs.insert(job);
        self.run(id, cancel).await
    }

    /// Save an uploaded video and start processing it in the background.
    ///
    /// The saved file belongs to the job: it is removed if this first run
    /// fails, or when the transcript is deleted.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn submit_upload(&self, file_name: &str, bytes: &[u8], model: Option<&str>) -> Result<Uuid> {
        let mut job = VideoJob::new(PathBuf::new(), true, self.resolve_model(model)?);
        job.source = self
            .uploads_dir
            .join(format!("{}_{}", job.id, sanitize_file_name(file_name)));

        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::write(&job.source, bytes).await?;
        debug!("Saved upload to {:?}", job.source);

        Ok(self.spawn(job))
    }

    /// Status and failure reason of a job.
    pub fn get_status(&self, job_id: Uuid) -> Result<(JobStatus, Option<JobError>)> {
        let job = self.jobs.get(job_id)?;
        Ok((job.status, job.error))
    }

    pub fn get_job(&self, job_id: Uuid) -> Result<VideoJob> {
        self.jobs.get(job_id)
    }

    /// All known jobs, oldest first.
    pub fn list_jobs(&self) -> Vec<VideoJob> {
        self.jobs.list()
    }

    /// Ask a job to stop at its next stage boundary.
    ///
    /// Returns false if the job had already finished.
    pub fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let flagged = self.jobs.cancel(job_id)?;
        if flagged {
            info!("Cancellation requested for job {}", job_id);
        }
        Ok(flagged)
    }

    /// Semantic search over indexed transcripts.
    pub async fn search(&self, video_id: Option<&str>, query: &str, top_k: usize) -> Result<Vec<QueryResult>> {
        let filter = QueryFilter {
            video_id: video_id.map(str::to_string),
            min_score: None,
        };
        self.search_filtered(query, top_k, &filter).await
    }

    /// Semantic search with an explicit filter.
    #[instrument(skip(self, filter))]
    pub async fn search_filtered(&self, query: &str, top_k: usize, filter: &QueryFilter) -> Result<Vec<QueryResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(VidscribeError::InvalidInput("search query is empty".to_string()));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let ctx = &self.context;
        let vector = within(Stage::Embedding, ctx.timeouts.embedding, ctx.embedder.embed(query)).await?;
        let results = ctx.store.query(&vector, top_k, Some(filter)).await?;

        debug!("Search returned {} results", results.len());
        Ok(results)
    }

    /// Remove a video's record, chunks, jobs and owned upload.
    ///
    /// Unfinished jobs of the video are cancelled first. Deleting an unknown
    /// video is a no-op. Returns the number of chunks removed.
    #[instrument(skip(self))]
    pub async fn delete_transcript(&self, video_id: &str) -> Result<usize> {
        let cancelled = self.jobs.cancel_all(Some(video_id));
        if cancelled > 0 {
            info!("Cancelled {} running jobs for video {}", cancelled, video_id);
        }

        let recorded = self.context.store.get_video(video_id).await?;
        let deleted = self.context.store.delete(video_id).await?;

        let mut uploads: Vec<PathBuf> = self
            .jobs
            .remove_video(video_id)
            .into_iter()
            .filter(|j| j.owns_source)
            .map(|j| j.source)
            .collect();
        // Jobs do not outlive the process; the record still knows the upload
        if let Some(source) = recorded.and_then(|r| r.video.metadata.source) {
            if source.starts_with(&self.uploads_dir) && !uploads.contains(&source) {
                uploads.push(source);
            }
        }
        for upload in &uploads {
            remove_upload(upload).await;
        }

        info!("Deleted transcript {} ({} chunks)", video_id, deleted);
        Ok(deleted)
    }

    /// The indexed transcript of a video, if there is one.
    pub async fn get_transcript(&self, video_id: &str) -> Result<Option<TranscriptRecord>> {
        self.context.store.get_video(video_id).await
    }

    /// Indexed videos, most recent first, one page at a time.
    pub async fn list_transcripts(&self, limit: usize, offset: usize) -> Result<Vec<IndexedVideo>> {
        let videos = self.context.store.list_videos().await?;
        Ok(videos.into_iter().skip(offset).take(limit).collect())
    }

    /// Run the pipeline again for a known video from its retained source.
    ///
    /// Without `model` the video is transcribed with the model it was
    /// indexed with. Naming the model it is already indexed with is refused,
    /// as is a video that still has a job running. The previous chunks stay
    /// searchable until the new run commits.
    #[instrument(skip(self))]
    pub async fn reprocess(&self, video_id: &str, model: Option<&str>) -> Result<Uuid> {
        let recorded = self.context.store.get_video(video_id).await?.map(|r| r.video.metadata);
        let jobs = self.jobs.for_video(video_id);
        if recorded.is_none() && jobs.is_empty() {
            return Err(VidscribeError::InvalidInput(format!("unknown video {}", video_id)));
        }
        let recorded = recorded.unwrap_or_default();

        let model = match model {
            Some(model) => {
                let model = self.resolve_model(Some(model))?;
                if recorded.model.as_deref() == Some(model.as_str()) {
                    return Err(VidscribeError::InvalidInput(format!(
                        "video {} is already transcribed with {}",
                        video_id, model
                    )));
                }
                model
            }
            None => match recorded.model {
                Some(model) => model,
                None => self.resolve_model(None)?,
            },
        };

        let source = recorded
            .source
            .into_iter()
            .chain(jobs.into_iter().rev().map(|j| j.source))
            .find(|s| s.is_file())
            .ok_or_else(|| {
                VidscribeError::InvalidInput(format!("no retained source for video {}", video_id))
            })?;

        let job = VideoJob::rerun(video_id, source, model);
        let id = job.id;
        let cancel = self.jobs.insert_exclusive(job)?;
        self.start(id, cancel);
        Ok(id)
    }

    /// Wait for a background job to finish and return how it ended.
    pub async fn wait(&self, job_id: Uuid) -> Result<VideoJob> {
        let handle = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Job task ended abnormally: {}", e);
            }
        }
        self.jobs.get(job_id)
    }

    /// Cancel every running job, wait for the tasks, and close the store.
    pub async fn shutdown(&self) -> Result<()> {
        let cancelled = self.jobs.cancel_all(None);
        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));

        info!("Shutting down ({} jobs cancelled)", cancelled);
        for handle in handles.into_values() {
            if let Err(e) = handle.await {
                warn!("Job task ended abnormally: {}", e);
            }
        }

        self.context.close().await
    }

    /// The model a request runs with: the named one, or the backend default.
    fn resolve_model(&self, model: Option<&str>) -> Result<String> {
        match model.map(str::trim) {
            Some("") => Err(VidscribeError::InvalidInput("transcription model is empty".to_string())),
            Some(model) => Ok(model.to_string()),
            None => Ok(self.context.transcriber.default_model().to_string()),
        }
    }

    fn spawn(&self, job: VideoJob) -> Uuid {
        let id = job.id;
        let cancel = self.jobs.insert(job);
        self.start(id, cancel);
        id
    }

    /// Run a registered job on its own task.
    fn start(&self, id: Uuid, cancel: Arc<AtomicBool>) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = this.run(id, cancel).await {
                debug!("Job {} left the registry while running: {}", id, e);
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|_, t| !t.is_finished());
        tasks.insert(id, handle);
    }

    /// Run a registered job and record how it ended.
    #[instrument(skip(self, cancel), fields(job = %id))]
    async fn run(&self, id: Uuid, cancel: Arc<AtomicBool>) -> Result<VideoJob> {
        let job = self.jobs.get(id)?;
        info!("Processing video {} from {:?} with {}", job.video_id, job.source, job.model);

        match self.execute(&job, &cancel).await {
            Ok(stored) => info!("Indexed {} chunks for video {}", stored, job.video_id),
            Err(e) => {
                warn!("Job failed: {}", e);
                if let Err(reg) = self.jobs.fail(id, JobError::from(&e)) {
                    debug!("Could not record failure: {}", reg);
                }
                if job.owns_source {
                    remove_upload(&job.source).await;
                }
            }
        }

        self.jobs.get(id)
    }

    async fn execute(&self, job: &VideoJob, cancel: &AtomicBool) -> Result<usize> {
        let ctx = &self.context;
        let checkpoint = || {
            if cancel.load(Ordering::SeqCst) {
                Err(VidscribeError::Cancelled)
            } else {
                Ok(())
            }
        };

        checkpoint()?;
        self.jobs.transition(job.id, JobStatus::Extracting)?;
        let audio = within(Stage::Extraction, ctx.timeouts.extraction, ctx.extractor.extract(&job.source)).await?;

        checkpoint()?;
        self.jobs.transition(job.id, JobStatus::Transcribing)?;
        let raw = within(
            Stage::Transcription,
            ctx.timeouts.transcription,
            ctx.transcriber.transcribe(audio.path(), &job.model),
        )
        .await?;
        drop(audio);

        let segments = close_gaps(raw, ctx.silence_threshold_seconds)?;
        let chunks = ctx.chunker.chunk(&job.video_id, &segments);
        debug!("{} segments, {} chunks", segments.len(), chunks.len());

        // Nothing was said: skip embedding and index an empty set
        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            checkpoint()?;
            self.jobs.transition(job.id, JobStatus::Embedding)?;
            within(
                Stage::Embedding,
                ctx.timeouts.embedding,
                embed_chunks(ctx.embedder.as_ref(), &chunks),
            )
            .await?
        };

        checkpoint()?;
        let metadata = VideoMetadata::new(job.source.clone(), job.model.clone());
        let stored = ctx.store.upsert(&job.video_id, &metadata, &chunks, &vectors).await?;
        self.jobs.complete(job.id, stored)?;
        Ok(stored)
    }
}

/// Bound a stage by `limit`.
async fn within<T>(stage: Stage, limit: Duration, work: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(VidscribeError::Timeout { stage, limit }),
    }
}

async fn remove_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed upload {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove upload {:?}: {}", path, e),
    }
}

/// Reduce a client-supplied file name to a safe single path component.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
