// ABOUTME: Task orchestrator: queue snapshot, bounded worker pool, per-item state machine
// ABOUTME: Tasks fail in isolation; completion is checkpointed before a task is marked complete

use crate::error::{PublishError, PublisherResult};
use crossbeam_channel::{bounded, Receiver};
use exodus_core::event_builder;
use exodus_core::{
    CheckpointStore, EventPublisher, EventSigner, FetchedMedia, Item, ItemId, MediaRef,
    MediaResolver, ProfileUpdate, ProgressSender, Task, TaskStatus, TaskTransition, UploadedMedia,
};
use futures::future::try_join_all;
use nostr_sdk::{PublicKey, UnsignedEvent};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Context for one migration run, constructed once and passed by reference
/// into every component. No global state.
pub struct MigrationRun {
    pub run_id: String,
    pub signer: Arc<dyn EventSigner>,
    pub media: Arc<dyn MediaResolver>,
    pub publisher: Arc<dyn EventPublisher>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Minimum relay acks for a publish to count as successful.
    pub publish_quorum: usize,
    /// Fixed worker pool size.
    pub workers: usize,
    pub progress: Option<ProgressSender>,
}

/// Final counts reported to the external progress surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub completed: usize,
    pub errored: usize,
    /// Items skipped because a previous run already checkpointed them.
    pub skipped: usize,
    pub failures: Vec<(ItemId, String)>,
}

/// Drives a snapshot of content items through the publish pipeline.
pub struct Orchestrator {
    run: Arc<MigrationRun>,
    tasks: Arc<Vec<Mutex<Task>>>,
    profile: Option<ProfileUpdate>,
    skipped: usize,
}

impl Orchestrator {
    /// Snapshot the queue, skipping items the checkpoint store already
    /// reports as published. This is what makes an interrupted run
    /// resumable: re-running with the same store is a no-op for finished
    /// items.
    pub async fn new(
        run: Arc<MigrationRun>,
        items: Vec<Item>,
        profile: Option<ProfileUpdate>,
    ) -> PublisherResult<Self> {
        let mut tasks = Vec::new();
        let mut skipped = 0;

        for item in items {
            if run.checkpoints.is_published(item.id()).await? {
                tracing::info!("Skipping already-published item {}", item.id());
                skipped += 1;
                continue;
            }
            tasks.push(Mutex::new(Task::new(item)));
        }

        Ok(Self {
            run,
            tasks: Arc::new(tasks),
            profile,
            skipped,
        })
    }

    /// Run the migration to completion and report final counts.
    ///
    /// Per-item failures are recorded on their tasks and never abort the
    /// run; the only errors surfaced here are checkpoint-store failures.
    pub async fn run(&self) -> PublisherResult<RunReport> {
        self.publish_profile().await;

        let task_count = self.tasks.len();
        let (tx, rx) = bounded::<usize>(task_count.max(1));
        for index in 0..task_count {
            // Capacity equals the task count, so this never blocks
            let _ = tx.send(index);
        }
        drop(tx);

        let worker_count = self.run.workers.clamp(1, task_count.max(1));
        tracing::info!(
            "Starting migration run {} ({} task(s), {} worker(s), quorum {})",
            self.run.run_id,
            task_count,
            worker_count,
            self.run.publish_quorum
        );

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                let rx = rx.clone();
                let run = self.run.clone();
                let tasks = self.tasks.clone();
                tokio::spawn(async move { worker_loop(worker_id, rx, run, tasks).await })
            })
            .collect();
        drop(rx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task panicked: {}", e);
            }
        }

        let mut completed = 0;
        let mut errored = 0;
        let mut failures = Vec::new();
        for slot in self.tasks.iter() {
            let task = slot.lock().await;
            match task.status {
                TaskStatus::Complete => completed += 1,
                TaskStatus::Error => {
                    errored += 1;
                    failures.push((
                        task.item.id().clone(),
                        task.error.clone().unwrap_or_else(|| "unknown".to_string()),
                    ));
                }
                other => {
                    // Workers only exit once every queued task is terminal
                    tracing::error!(
                        "Task {} left in non-terminal state {}",
                        task.item.id(),
                        other
                    );
                }
            }
        }

        self.run.checkpoints.mark_complete(&self.run.run_id).await?;

        tracing::info!(
            "Migration run {} finished: {} completed, {} errored, {} skipped",
            self.run.run_id,
            completed,
            errored,
            self.skipped
        );

        Ok(RunReport {
            completed,
            errored,
            skipped: self.skipped,
            failures,
        })
    }

    /// One-shot profile publish ahead of the queue. Best-effort: failure is
    /// logged and never aborts the run.
    async fn publish_profile(&self) {
        let Some(profile) = &self.profile else {
            return;
        };

        let unsigned = event_builder::profile(self.run.signer.public_key(), profile);
        match self.run.signer.sign_event(unsigned).await {
            Ok(event) => {
                let result = self.run.publisher.publish(&event).await;
                if result.meets_quorum(self.run.publish_quorum) {
                    self.run
                        .publisher
                        .import_to_cache(std::slice::from_ref(&event))
                        .await;
                    tracing::info!("Profile update published");
                } else {
                    tracing::warn!(
                        "Profile publish rejected by all relays: {}",
                        result.failure_summary()
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Profile signing failed: {}", e);
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Receiver<usize>,
    run: Arc<MigrationRun>,
    tasks: Arc<Vec<Mutex<Task>>>,
) {
    tracing::debug!("Task worker {} started", worker_id);

    loop {
        // Atomic take-next: the channel hands each index to exactly one worker
        let index = {
            let rx = rx.clone();
            match tokio::task::spawn_blocking(move || rx.recv()).await {
                Ok(Ok(index)) => index,
                Ok(Err(_)) => break, // queue drained
                Err(e) => {
                    tracing::error!("Worker {} spawn_blocking panicked: {}", worker_id, e);
                    continue;
                }
            }
        };

        // The index is unique to this worker, so the lock is uncontended;
        // it exists to hand the run loop a &mut Task
        let mut task = tasks[index].lock().await;
        let item_id = task.item.id().clone();
        tracing::debug!("Worker {} processing item {}", worker_id, item_id);

        if let Err(e) = process_task(&run, &mut task).await {
            let message = e.to_string();
            tracing::warn!("Worker {}: item {} failed: {}", worker_id, item_id, message);
            fail_task(&run, &mut task, message);
        }
    }

    tracing::debug!("Task worker {} exited", worker_id);
}

/// Drive one task through `downloading -> signing -> uploading -> publishing
/// -> complete`. Any error leaves the task for `fail_task`.
async fn process_task(run: &Arc<MigrationRun>, task: &mut Task) -> PublisherResult<()> {
    advance(run, task, TaskStatus::Downloading)?;
    let refs: Vec<MediaRef> = task.item.media_refs().into_iter().cloned().collect();
    let fetched: Vec<FetchedMedia> =
        try_join_all(refs.iter().map(|media| run.media.fetch(media))).await?;

    // Canonical URLs are hash-derived, so the event can be signed before the
    // bytes reach the host
    advance(run, task, TaskStatus::Signing)?;
    let planned: Vec<UploadedMedia> = fetched.iter().map(planned_media).collect();
    let unsigned = build_unsigned(run.signer.public_key(), &task.item, &planned);
    let event = run.signer.sign_event(unsigned).await?;
    task.event_id = Some(event.id);

    advance(run, task, TaskStatus::Uploading)?;
    let uploaded: Vec<UploadedMedia> =
        try_join_all(fetched.iter().map(|media| run.media.upload(media))).await?;
    task.uploaded_urls = uploaded.into_iter().map(|media| media.url).collect();

    advance(run, task, TaskStatus::Publishing)?;
    let result = run.publisher.publish(&event).await;
    if !result.meets_quorum(run.publish_quorum) {
        return Err(PublishError::QuorumFailed(result.failure_summary()));
    }
    run.publisher
        .import_to_cache(std::slice::from_ref(&event))
        .await;

    // Durable checkpoint strictly before the terminal transition
    run.checkpoints.mark_published(task.item.id()).await?;
    advance(run, task, TaskStatus::Complete)?;

    Ok(())
}

fn build_unsigned(author: PublicKey, item: &Item, media: &[UploadedMedia]) -> UnsignedEvent {
    match item {
        Item::Post(post) => event_builder::post(
            author,
            media,
            post.caption.as_deref(),
            post.kind,
            post.posted_at,
        ),
        Item::Article(source) => event_builder::article(author, source, media.first()),
    }
}

/// The media list as it will appear in the signed event: hash-derived URLs.
fn planned_media(fetched: &FetchedMedia) -> UploadedMedia {
    UploadedMedia {
        url: fetched.canonical_url.clone(),
        content_hash: fetched.content_hash.clone(),
        mime_type: fetched.mime_type.clone(),
        size: fetched.size,
    }
}

fn advance(run: &MigrationRun, task: &mut Task, to: TaskStatus) -> PublisherResult<()> {
    let from = task.advance(to)?;
    emit(run, task.item.id().clone(), from, to);
    Ok(())
}

fn fail_task(run: &MigrationRun, task: &mut Task, message: String) {
    let Ok(from) = task.fail(message) else {
        // Already terminal; nothing to record
        return;
    };
    emit(run, task.item.id().clone(), from, TaskStatus::Error);
}

fn emit(run: &MigrationRun, item_id: ItemId, from: TaskStatus, to: TaskStatus) {
    if let Some(progress) = &run.progress {
        // A slow observer drops events rather than stalling the worker
        let _ = progress.try_send(TaskTransition { item_id, from, to });
    }
}
