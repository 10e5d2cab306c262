use snaplink_core::{with_timeout, Repository, ShortId, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Largest accepted visit queue.
pub const MAX_VISIT_QUEUE_CAPACITY: usize = 1 << 20;

/// Creates a bounded visit queue holding between 1 and
/// [`MAX_VISIT_QUEUE_CAPACITY`] visits.
pub fn visit_channel(capacity: usize) -> (VisitRecorder, mpsc::Receiver<ShortId>) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_VISIT_QUEUE_CAPACITY));
    (VisitRecorder { tx }, rx)
}

/// Adds one visit to `short_id`, bounded by `timeout`.
pub async fn increment_visit<R: Repository + ?Sized>(
    repository: &R,
    short_id: &ShortId,
    timeout: Duration,
) -> Result<(), StorageError> {
    with_timeout(timeout, "increment_visits", repository.increment_visits(short_id)).await
}

/// Producer side of the visit queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct VisitRecorder {
    tx: mpsc::Sender<ShortId>,
}

impl VisitRecorder {
    /// Enqueues a visit without waiting.
    ///
    /// Returns `false` when the visit was dropped because the queue is full
    /// or the worker has stopped.
    pub fn record(&self, short_id: ShortId) -> bool {
        match self.tx.try_send(short_id) {
            Ok(()) => true,
            Err(TrySendError::Full(short_id)) => {
                warn!(code = %short_id, "visit queue full, dropping visit");
                false
            }
            Err(TrySendError::Closed(short_id)) => {
                warn!(code = %short_id, "visit worker stopped, dropping visit");
                false
            }
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct VisitWorkerConfig {
    /// Visits buffered before new ones are dropped.
    #[builder(default = 4096)]
    pub capacity: usize,
    /// Increments applied to the store at the same time. Keep this at or
    /// below the store's connection pool size.
    #[builder(default = 8)]
    pub concurrency: usize,
    /// Upper bound for each increment.
    #[builder(default = Duration::from_secs(3))]
    pub timeout: Duration,
}

impl Default for VisitWorkerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Outcome of a worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitSummary {
    pub counted: u64,
    pub failed: u64,
}

impl VisitSummary {
    fn tally(&mut self, outcome: Result<bool, JoinError>) {
        match outcome {
            Ok(true) => self.counted += 1,
            Ok(false) => self.failed += 1,
            Err(e) => {
                self.failed += 1;
                warn!(error = %e, "visit increment task failed");
            }
        }
    }
}

/// Background task applying queued visits to the store, with at most
/// `concurrency` increments in flight.
#[derive(Debug)]
pub struct VisitWorker {
    handle: JoinHandle<VisitSummary>,
}

impl VisitWorker {
    /// Creates the visit queue and starts draining it.
    pub fn spawn<R: Repository>(
        repository: R,
        config: VisitWorkerConfig,
    ) -> (VisitRecorder, VisitWorker) {
        let (recorder, rx) = visit_channel(config.capacity);
        (recorder, Self::start(repository, rx, config))
    }

    /// Starts draining an existing queue. `config.capacity` is ignored.
    pub fn start<R: Repository>(
        repository: R,
        mut rx: mpsc::Receiver<ShortId>,
        config: VisitWorkerConfig,
    ) -> VisitWorker {
        let repository = Arc::new(repository);
        let concurrency = config.concurrency.max(1);
        let timeout = config.timeout;

        let handle = tokio::spawn(async move {
            let mut summary = VisitSummary::default();
            let mut in_flight = JoinSet::new();

            while let Some(short_id) = rx.recv().await {
                while in_flight.len() >= concurrency {
                    match in_flight.join_next().await {
                        Some(outcome) => summary.tally(outcome),
                        None => break,
                    }
                }

                let repository = Arc::clone(&repository);
                in_flight.spawn(async move {
                    apply_visit(repository.as_ref(), short_id, timeout).await
                });
            }

            while let Some(outcome) = in_flight.join_next().await {
                summary.tally(outcome);
            }

            summary
        });

        VisitWorker { handle }
    }

    /// Waits until every recorder is dropped and the queue is empty.
    pub async fn join(self) -> VisitSummary {
        match self.handle.await {
            Ok(summary) => {
                info!(
                    counted = summary.counted,
                    failed = summary.failed,
                    "visit worker drained"
                );
                summary
            }
            Err(e) => {
                warn!(error = %e, "visit worker terminated abnormally");
                VisitSummary::default()
            }
        }
    }
}

/// Returns whether the visit was counted. Failures are logged here.
async fn apply_visit<R: Repository + ?Sized>(
    repository: &R,
    short_id: ShortId,
    timeout: Duration,
) -> bool {
    match increment_visit(repository, &short_id, timeout).await {
        Ok(()) => {
            debug!(code = %short_id, "visit counted");
            true
        }
        Err(StorageError::NotFound(_)) => {
            warn!(code = %short_id, "visit for unknown short id dropped");
            false
        }
        Err(e) => {
            warn!(code = %short_id, error = %e, "failed to count visit");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snaplink_core::{NewUrlRecord, ReadRepository, UrlRecord};
    use snaplink_storage::InMemoryRepository;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn id(s: &str) -> ShortId {
        ShortId::new_unchecked(s)
    }

    fn config(capacity: usize) -> VisitWorkerConfig {
        VisitWorkerConfig::builder()
            .capacity(capacity)
            .timeout(Duration::from_secs(1))
            .build()
    }

    async fn seeded_repo() -> Arc<InMemoryRepository> {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert(NewUrlRecord {
            source_url: "https://example.com/a".to_string(),
            short_id: id("abc123"),
        })
        .await
        .unwrap();
        repo
    }

    /// Slows every increment down and remembers how many overlapped.
    struct InFlightRepository {
        inner: Arc<InMemoryRepository>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl ReadRepository for InFlightRepository {
        async fn find_by_short_id(
            &self,
            short_id: &ShortId,
        ) -> snaplink_core::repository::Result<Option<UrlRecord>> {
            self.inner.find_by_short_id(short_id).await
        }

        async fn find_by_source_url(
            &self,
            source_url: &str,
        ) -> snaplink_core::repository::Result<Option<UrlRecord>> {
            self.inner.find_by_source_url(source_url).await
        }
    }

    #[async_trait]
    impl Repository for InFlightRepository {
        async fn insert(&self, record: NewUrlRecord) -> snaplink_core::repository::Result<UrlRecord> {
            self.inner.insert(record).await
        }

        async fn increment_visits(&self, short_id: &ShortId) -> snaplink_core::repository::Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let result = self.inner.increment_visits(short_id).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn queued_visits_are_counted_after_join() {
        let repo = seeded_repo().await;
        let (recorder, worker) = VisitWorker::spawn(Arc::clone(&repo), config(128));

        for _ in 0..100 {
            assert!(recorder.record(id("abc123")));
        }
        drop(recorder);

        let summary = worker.join().await;
        assert_eq!(summary, VisitSummary { counted: 100, failed: 0 });

        let record = repo.find_by_short_id(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(record.visits, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recorders_lose_nothing() {
        const RECORDERS: usize = 16;
        const VISITS_EACH: usize = 100;

        let repo = seeded_repo().await;
        let (recorder, worker) =
            VisitWorker::spawn(Arc::clone(&repo), config(RECORDERS * VISITS_EACH));
        let barrier = Arc::new(Barrier::new(RECORDERS));

        let mut handles = vec![];
        for _ in 0..RECORDERS {
            let recorder = recorder.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                let mut accepted = 0;
                for _ in 0..VISITS_EACH {
                    if recorder.record(ShortId::new_unchecked("abc123")) {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            accepted += handle.await.unwrap();
        }
        drop(recorder);

        let summary = worker.join().await;
        assert_eq!(accepted, RECORDERS * VISITS_EACH);
        assert_eq!(summary.counted, (RECORDERS * VISITS_EACH) as u64);

        let record = repo.find_by_short_id(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(record.visits, (RECORDERS * VISITS_EACH) as u64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn increments_overlap_up_to_the_concurrency_limit() {
        let inner = seeded_repo().await;
        let repo = Arc::new(InFlightRepository {
            inner: Arc::clone(&inner),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let config = VisitWorkerConfig::builder()
            .capacity(64)
            .concurrency(4)
            .timeout(Duration::from_secs(1))
            .build();
        let (recorder, worker) = VisitWorker::spawn(Arc::clone(&repo), config);

        for _ in 0..40 {
            assert!(recorder.record(id("abc123")));
        }
        drop(recorder);

        let summary = worker.join().await;
        assert_eq!(summary, VisitSummary { counted: 40, failed: 0 });

        let max = repo.max_in_flight.load(Ordering::SeqCst);
        assert!(max > 1, "increments never overlapped");
        assert!(max <= 4, "{max} increments in flight, limit is 4");

        let record = inner.find_by_short_id(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(record.visits, 40);
    }

    #[tokio::test]
    async fn unknown_ids_are_logged_and_skipped() {
        let repo = seeded_repo().await;
        let (recorder, worker) = VisitWorker::spawn(Arc::clone(&repo), config(8));

        recorder.record(id("nope00"));
        recorder.record(id("abc123"));
        drop(recorder);

        let summary = worker.join().await;
        assert_eq!(summary, VisitSummary { counted: 1, failed: 1 });
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_waiting() {
        let (recorder, _rx) = visit_channel(1);

        assert!(recorder.record(id("abc123")));
        assert!(!recorder.record(id("abc123")));
    }

    #[tokio::test]
    async fn closed_queue_drops_visits() {
        let (recorder, rx) = visit_channel(4);
        drop(rx);

        assert!(!recorder.record(id("abc123")));
    }

    #[tokio::test]
    async fn increment_visit_reports_not_found() {
        let repo = InMemoryRepository::new();

        let err = increment_visit(&repo, &id("nope00"), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
