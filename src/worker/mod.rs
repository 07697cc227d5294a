//! Bounded worker pool for asynchronous feed processing.
//!
//! Jobs flow through a bounded queue into a fixed set of workers, each
//! running one ingestion cycle; results drain through a second bounded
//! channel into the status map. Admission is load-based: near-capacity
//! queues reject submissions outright, and enqueueing itself carries a
//! deadline. Statuses are retained for a day and reaped hourly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::ingest::IngestService;
use crate::{FeedstoreError, Result};

/// How long finished and stale job statuses are retained.
pub const STATUS_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Interval between status reaper passes.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Lifecycle state of an asynchronous job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Submitted, not yet picked up by a worker.
    Pending,
    /// Being processed by a worker.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// Externally visible status of an asynchronous job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Job identifier.
    pub job_id: String,
    /// Feed URL being processed.
    pub url: String,
    /// Current lifecycle state.
    pub status: JobState,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// When a worker picked the job up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the result was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure message, when the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Items produced by the job.
    pub items_count: usize,
    /// Processing duration in milliseconds.
    pub duration_ms: u64,
}

/// A queued unit of work.
struct Job {
    id: String,
    url: String,
}

/// What a worker hands to the result drain.
struct JobOutcome {
    job_id: String,
    url: String,
    items_count: usize,
    error: Option<String>,
    duration: Duration,
}

type StatusMap = Arc<RwLock<HashMap<String, JobStatus>>>;

/// Bounded asynchronous feed processor.
pub struct WorkerPool {
    config: WorkerConfig,
    jobs_tx: Mutex<Option<mpsc::Sender<Job>>>,
    statuses: StatusMap,
    shutdown: Arc<AtomicBool>,
    worker_shutdown: watch::Sender<bool>,
    sender_shutdown: watch::Sender<bool>,
    reaper_shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start the pool: workers, result drain and status reaper.
    pub fn start(config: WorkerConfig, ingest: Arc<IngestService>) -> Arc<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(config.queue_capacity);
        let (results_tx, results_rx) = mpsc::channel::<JobOutcome>(config.queue_capacity);
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        let statuses: StatusMap = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (worker_shutdown, _) = watch::channel(false);
        let (sender_shutdown, _) = watch::channel(false);
        let (reaper_shutdown, _) = watch::channel(false);

        let mut handles = Vec::with_capacity(config.workers + 2);

        for worker_id in 0..config.workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&jobs_rx),
                results_tx.clone(),
                Arc::clone(&ingest),
                Arc::clone(&statuses),
                Arc::clone(&shutdown),
                worker_shutdown.subscribe(),
                sender_shutdown.subscribe(),
            )));
        }
        // Workers hold the only result senders; once they stop, the
        // drain sees the channel close and exits after emptying it.
        drop(results_tx);

        handles.push(tokio::spawn(result_loop(results_rx, Arc::clone(&statuses))));
        handles.push(tokio::spawn(reaper_loop(
            Arc::clone(&statuses),
            reaper_shutdown.subscribe(),
        )));

        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            backpressure = config.backpressure_enabled,
            reject_threshold = config.reject_threshold,
            "Worker pool started"
        );

        Arc::new(Self {
            config,
            jobs_tx: Mutex::new(Some(jobs_tx)),
            statuses,
            shutdown,
            worker_shutdown,
            sender_shutdown,
            reaper_shutdown,
            handles: Mutex::new(handles),
        })
    }

    /// Submit a feed URL for asynchronous processing.
    ///
    /// A `pending` status is recorded before admission, so a rejected
    /// submission stays observable until the reaper drops it.
    pub async fn submit(&self, url: &str, request_id: &str) -> Result<String> {
        let jobs_tx = self
            .jobs_tx
            .lock()
            .unwrap()
            .clone()
            .ok_or(FeedstoreError::PoolClosed)?;

        let job_id = format!(
            "job_{}_{request_id}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );

        {
            let mut statuses = self.statuses.write().unwrap();
            statuses.insert(
                job_id.clone(),
                JobStatus {
                    job_id: job_id.clone(),
                    url: url.to_string(),
                    status: JobState::Pending,
                    created_at: Utc::now(),
                    started_at: None,
                    completed_at: None,
                    error: None,
                    items_count: 0,
                    duration_ms: 0,
                },
            );
        }

        if self.config.backpressure_enabled {
            let queued = jobs_tx.max_capacity() - jobs_tx.capacity();
            let load = queued as f64 / self.config.queue_capacity as f64;
            if load >= self.config.reject_threshold {
                tracing::warn!(
                    url,
                    load = %format!("{load:.2}"),
                    queued,
                    queue_capacity = self.config.queue_capacity,
                    "Rejecting job: queue near capacity"
                );
                return Err(FeedstoreError::Backpressure { load: load * 100.0 });
            }
        }

        let job = Job {
            id: job_id.clone(),
            url: url.to_string(),
        };
        match tokio::time::timeout(self.config.wait_timeout, jobs_tx.send(job)).await {
            Ok(Ok(())) => {
                tracing::info!(job_id = %job_id, url, request_id, "Job submitted");
                Ok(job_id)
            }
            Ok(Err(_)) => Err(FeedstoreError::PoolClosed),
            Err(_) => {
                tracing::warn!(
                    url,
                    wait_timeout = ?self.config.wait_timeout,
                    "Job submission timed out under queue pressure"
                );
                Err(FeedstoreError::SubmitTimeout(self.config.wait_timeout))
            }
        }
    }

    /// Status of a submitted job, if still retained.
    pub fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.statuses.read().unwrap().get(job_id).cloned()
    }

    /// Number of jobs currently buffered in the queue.
    pub fn queued_jobs(&self) -> usize {
        match self.jobs_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.max_capacity() - tx.capacity(),
            None => 0,
        }
    }

    /// Shut the pool down cooperatively and wait for all tasks.
    ///
    /// Order matters: the shutdown flag first (so late results are
    /// dropped instead of sent), then the background signals, then the
    /// job channel, then the worker signal; finally every task is
    /// joined. The result channel closes by itself once the last worker
    /// drops its sender, after which the drain empties what remains.
    pub async fn shutdown(&self) {
        tracing::info!("Stopping worker pool");

        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.reaper_shutdown.send(true);
        let _ = self.sender_shutdown.send(true);
        self.jobs_tx.lock().unwrap().take();
        let _ = self.worker_shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = self.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!("Worker pool stopped");
    }

    /// Drop retained statuses older than the retention window.
    pub fn reap_statuses(&self) -> usize {
        reap(&self.statuses, Utc::now())
    }
}

fn reap(statuses: &StatusMap, now: DateTime<Utc>) -> usize {
    let cutoff = now - chrono::Duration::from_std(STATUS_RETENTION).unwrap_or_default();
    let mut statuses = statuses.write().unwrap();
    let before = statuses.len();
    statuses.retain(|_, status| status.created_at >= cutoff);
    before - statuses.len()
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    jobs_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    results_tx: mpsc::Sender<JobOutcome>,
    ingest: Arc<IngestService>,
    statuses: StatusMap,
    shutdown: Arc<AtomicBool>,
    mut worker_rx: watch::Receiver<bool>,
    mut sender_rx: watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let job = {
            let mut rx = jobs_rx.lock().await;
            tokio::select! {
                job = rx.recv() => job,
                _ = worker_rx.changed() => None,
            }
        };
        let Some(job) = job else { break };

        process_job(
            worker_id,
            job,
            &results_tx,
            &ingest,
            &statuses,
            &shutdown,
            &mut sender_rx,
        )
        .await;
    }

    tracing::debug!(worker_id, "Worker stopped");
}

async fn process_job(
    worker_id: usize,
    job: Job,
    results_tx: &mpsc::Sender<JobOutcome>,
    ingest: &IngestService,
    statuses: &StatusMap,
    shutdown: &AtomicBool,
    sender_rx: &mut watch::Receiver<bool>,
) {
    let started = Instant::now();

    {
        let mut statuses = statuses.write().unwrap();
        if let Some(status) = statuses.get_mut(&job.id) {
            status.status = JobState::Processing;
            status.started_at = Some(Utc::now());
        }
    }

    tracing::info!(worker_id, job_id = %job.id, url = %job.url, "Processing job");

    let outcome = match ingest.fetch_and_store(&job.url, false).await {
        Ok(result) => JobOutcome {
            job_id: job.id,
            url: job.url,
            items_count: result.items.len(),
            error: None,
            duration: started.elapsed(),
        },
        Err(e) => JobOutcome {
            job_id: job.id,
            url: job.url,
            items_count: 0,
            error: Some(e.to_string()),
            duration: started.elapsed(),
        },
    };

    // Safe send: drop the result outright once shutdown has begun,
    // otherwise race the channel against the sender-side signal so a
    // stalled drain cannot wedge the worker.
    if shutdown.load(Ordering::SeqCst) {
        tracing::debug!(job_id = %outcome.job_id, "Dropping result after shutdown");
        return;
    }

    tokio::select! {
        sent = results_tx.send(outcome) => {
            if sent.is_err() {
                tracing::debug!(worker_id, "Result channel closed");
            }
        }
        _ = sender_rx.changed() => {}
    }
}

async fn result_loop(mut results_rx: mpsc::Receiver<JobOutcome>, statuses: StatusMap) {
    // Runs until every worker has dropped its sender, which drains any
    // buffered results before exit.
    while let Some(outcome) = results_rx.recv().await {
        let state = if outcome.error.is_some() {
            JobState::Failed
        } else {
            JobState::Completed
        };

        {
            let mut statuses = statuses.write().unwrap();
            if let Some(status) = statuses.get_mut(&outcome.job_id) {
                status.status = state;
                status.error = outcome.error.clone();
                status.items_count = outcome.items_count;
                status.duration_ms = outcome.duration.as_millis() as u64;
                status.completed_at = Some(Utc::now());
            }
        }

        tracing::info!(
            job_id = %outcome.job_id,
            url = %outcome.url,
            status = ?state,
            items_count = outcome.items_count,
            duration_ms = outcome.duration.as_millis() as u64,
            "Job result recorded"
        );
    }
}

async fn reaper_loop(statuses: StatusMap, mut shutdown: watch::Receiver<bool>) {
    let mut timer = tokio::time::interval(REAP_INTERVAL);
    timer.tick().await; // first tick completes immediately
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let removed = reap(&statuses, Utc::now());
                if removed > 0 {
                    tracing::info!(removed, "Reaped old job statuses");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FeedCache;
    use crate::config::CacheConfig;
    use crate::feed::{FeedItem, FetchFeed};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct StubFetcher {
        items: usize,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl FetchFeed for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(FeedstoreError::ExternalService("stub failure".to_string()));
            }
            Ok((0..self.items)
                .map(|i| FeedItem {
                    title: format!("Item {i} from {url}"),
                    link: format!("{url}/item/{i}"),
                    description: "desc".to_string(),
                    author: format!("author-{i}"),
                    pub_date: "2025-06-01T00:00:00Z".to_string(),
                })
                .collect())
        }
    }

    fn ingest_with(fetcher: StubFetcher) -> Arc<IngestService> {
        Arc::new(IngestService::new(
            Arc::new(fetcher),
            Arc::new(InMemoryStore::new()),
            Arc::new(FeedCache::new(CacheConfig::default())),
        ))
    }

    fn config(workers: usize, capacity: usize) -> WorkerConfig {
        WorkerConfig {
            workers,
            queue_capacity: capacity,
            backpressure_enabled: true,
            reject_threshold: 0.8,
            wait_timeout: Duration::from_millis(100),
        }
    }

    async fn wait_for_state(pool: &WorkerPool, job_id: &str, state: JobState) -> JobStatus {
        for _ in 0..200 {
            if let Some(status) = pool.job_status(job_id) {
                if status.status == state {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached {state:?}");
    }

    #[tokio::test]
    async fn test_submit_and_complete() {
        let pool = WorkerPool::start(
            config(2, 10),
            ingest_with(StubFetcher {
                items: 4,
                delay: Duration::ZERO,
                fail: false,
            }),
        );

        let job_id = pool.submit("https://example.com/rss", "req-1").await.unwrap();
        assert!(job_id.starts_with("job_"));
        assert!(job_id.ends_with("_req-1"));

        let status = wait_for_state(&pool, &job_id, JobState::Completed).await;
        assert_eq!(status.items_count, 4);
        assert!(status.error.is_none());
        assert!(status.started_at.is_some());
        assert!(status.completed_at.is_some());

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_job_records_error() {
        let pool = WorkerPool::start(
            config(1, 10),
            ingest_with(StubFetcher {
                items: 0,
                delay: Duration::ZERO,
                fail: true,
            }),
        );

        let job_id = pool.submit("https://example.com/rss", "req-2").await.unwrap();
        let status = wait_for_state(&pool, &job_id, JobState::Failed).await;

        assert_eq!(status.items_count, 0);
        assert!(status.error.unwrap().contains("stub failure"));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_backpressure_rejects_at_threshold() {
        // No workers: submitted jobs stay queued.
        let pool = WorkerPool::start(
            config(0, 10),
            ingest_with(StubFetcher {
                items: 0,
                delay: Duration::ZERO,
                fail: false,
            }),
        );

        for i in 0..8 {
            pool.submit("https://example.com/rss", &format!("req-{i}"))
                .await
                .unwrap();
        }
        assert_eq!(pool.queued_jobs(), 8);

        // 8/10 = 80% load meets the 0.8 threshold.
        let err = pool
            .submit("https://example.com/rss", "req-overflow")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedstoreError::Backpressure { .. }));
        assert!(err.to_string().contains("80.00%"));
        assert_eq!(pool.queued_jobs(), 8);

        // The rejected job still left a pending status behind.
        let statuses = pool.statuses.read().unwrap();
        assert_eq!(statuses.len(), 9);
        assert!(statuses
            .values()
            .all(|s| s.status == JobState::Pending));
        drop(statuses);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_submission_times_out_when_queue_is_full() {
        let mut cfg = config(0, 2);
        cfg.backpressure_enabled = false;
        cfg.wait_timeout = Duration::from_millis(50);

        let pool = WorkerPool::start(
            cfg,
            ingest_with(StubFetcher {
                items: 0,
                delay: Duration::ZERO,
                fail: false,
            }),
        );

        pool.submit("https://example.com/rss", "req-0").await.unwrap();
        pool.submit("https://example.com/rss", "req-1").await.unwrap();

        let err = pool
            .submit("https://example.com/rss", "req-2")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedstoreError::SubmitTimeout(_)));

        // The timed-out submission stays pending until reaped.
        assert_eq!(pool.statuses.read().unwrap().len(), 3);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_never_exceeds_capacity() {
        let mut cfg = config(0, 4);
        cfg.backpressure_enabled = false;
        cfg.wait_timeout = Duration::from_millis(20);

        let pool = WorkerPool::start(
            cfg,
            ingest_with(StubFetcher {
                items: 0,
                delay: Duration::ZERO,
                fail: false,
            }),
        );

        for i in 0..10 {
            let _ = pool.submit("https://example.com/rss", &format!("req-{i}")).await;
            assert!(pool.queued_jobs() <= 4);
        }

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_then_submit_fails() {
        let pool = WorkerPool::start(
            config(1, 10),
            ingest_with(StubFetcher {
                items: 1,
                delay: Duration::ZERO,
                fail: false,
            }),
        );

        let job_id = pool.submit("https://example.com/rss", "req-1").await.unwrap();
        wait_for_state(&pool, &job_id, JobState::Completed).await;

        pool.shutdown().await;

        let err = pool
            .submit("https://example.com/rss", "req-late")
            .await
            .unwrap_err();
        assert!(matches!(err, FeedstoreError::PoolClosed));

        // Completed statuses stay readable after shutdown.
        let status = pool.job_status(&job_id).unwrap();
        assert_eq!(status.status, JobState::Completed);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_job() {
        let pool = WorkerPool::start(
            config(1, 10),
            ingest_with(StubFetcher {
                items: 2,
                delay: Duration::from_millis(50),
                fail: false,
            }),
        );

        let job_id = pool.submit("https://example.com/rss", "req-1").await.unwrap();
        wait_for_state(&pool, &job_id, JobState::Processing).await;

        // Shutdown must join the worker without panicking even though a
        // job is mid-flight; its result is either recorded or dropped.
        pool.shutdown().await;

        let status = pool.job_status(&job_id).unwrap();
        assert!(matches!(
            status.status,
            JobState::Processing | JobState::Completed
        ));
    }

    #[tokio::test]
    async fn test_reap_drops_only_old_statuses() {
        let pool = WorkerPool::start(
            config(0, 10),
            ingest_with(StubFetcher {
                items: 0,
                delay: Duration::ZERO,
                fail: false,
            }),
        );

        pool.submit("https://example.com/rss", "req-new").await.unwrap();
        {
            let mut statuses = pool.statuses.write().unwrap();
            statuses.insert(
                "job_old".to_string(),
                JobStatus {
                    job_id: "job_old".to_string(),
                    url: "https://example.com/rss".to_string(),
                    status: JobState::Completed,
                    created_at: Utc::now() - chrono::Duration::hours(25),
                    started_at: None,
                    completed_at: None,
                    error: None,
                    items_count: 0,
                    duration_ms: 0,
                },
            );
        }

        assert_eq!(pool.reap_statuses(), 1);
        assert!(pool.job_status("job_old").is_none());
        assert_eq!(pool.statuses.read().unwrap().len(), 1);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_jobs_processed_across_workers() {
        let pool = WorkerPool::start(
            config(3, 20),
            ingest_with(StubFetcher {
                items: 1,
                delay: Duration::from_millis(10),
                fail: false,
            }),
        );

        let mut job_ids = Vec::new();
        for i in 0..10 {
            job_ids.push(
                pool.submit(&format!("https://example.com/rss/{i}"), &format!("req-{i}"))
                    .await
                    .unwrap(),
            );
        }

        for job_id in &job_ids {
            wait_for_state(&pool, job_id, JobState::Completed).await;
        }

        pool.shutdown().await;
    }
}
