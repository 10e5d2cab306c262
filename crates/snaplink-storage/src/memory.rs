use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use snaplink_core::repository::Result;
use snaplink_core::{NewUrlRecord, ReadRepository, Repository, ShortId, StorageError, UrlRecord};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory implementation of the repository contract using DashMap.
///
/// Records are keyed by short id, with a secondary index from source URL to
/// short id. Both uniqueness constraints are enforced under the entry locks
/// of the two maps, always taken in the order source index, then records.
/// Readers never hold both at once.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: DashMap<String, UrlRecord>,
    source_index: DashMap<String, ShortId>,
    last_id: AtomicU64,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity(capacity),
            source_index: DashMap::with_capacity(capacity),
            last_id: AtomicU64::new(0),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn find_by_short_id(&self, short_id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self
            .records
            .get(short_id.as_str())
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<UrlRecord>> {
        let Some(short_id) = self
            .source_index
            .get(source_url)
            .map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };

        self.find_by_short_id(&short_id).await
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, record: NewUrlRecord) -> Result<UrlRecord> {
        let source_slot = match self.source_index.entry(record.source_url.clone()) {
            Entry::Occupied(_) => return Err(StorageError::DuplicateSourceUrl(record.source_url)),
            Entry::Vacant(slot) => slot,
        };

        let record_slot = match self.records.entry(record.short_id.as_str().to_owned()) {
            Entry::Occupied(_) => {
                return Err(StorageError::DuplicateShortId(record.short_id.to_string()))
            }
            Entry::Vacant(slot) => slot,
        };

        let now = Timestamp::now();
        let stored = UrlRecord {
            id: self.last_id.fetch_add(1, Ordering::SeqCst) + 1,
            source_url: record.source_url,
            short_id: record.short_id,
            visits: 0,
            created_at: now,
            updated_at: now,
        };

        // The record becomes visible before the index entry that points at it.
        record_slot.insert(stored.clone());
        source_slot.insert(stored.short_id.clone());

        Ok(stored)
    }

    async fn increment_visits(&self, short_id: &ShortId) -> Result<()> {
        let Some(mut entry) = self.records.get_mut(short_id.as_str()) else {
            return Err(StorageError::NotFound(short_id.to_string()));
        };

        entry.visits += 1;
        entry.updated_at = Timestamp::now().max(entry.updated_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    fn id(s: &str) -> ShortId {
        ShortId::new_unchecked(s)
    }

    fn new_record(url: &str, short_id: &str) -> NewUrlRecord {
        NewUrlRecord {
            source_url: url.to_string(),
            short_id: id(short_id),
        }
    }

    #[tokio::test]
    async fn insert_and_find_both_ways() {
        let repo = InMemoryRepository::new();

        let stored = repo
            .insert(new_record("https://example.com/a", "abc123"))
            .await
            .unwrap();
        assert_eq!(stored.visits, 0);
        assert_eq!(stored.created_at, stored.updated_at);

        let by_id = repo.find_by_short_id(&id("abc123")).await.unwrap().unwrap();
        let by_url = repo
            .find_by_source_url("https://example.com/a")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(by_id, stored);
        assert_eq!(by_url, stored);
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let repo = InMemoryRepository::new();

        assert!(repo.find_by_short_id(&id("nope00")).await.unwrap().is_none());
        assert!(repo
            .find_by_source_url("https://example.com/missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn ids_are_assigned_and_never_reused() {
        let repo = InMemoryRepository::new();

        let first = repo
            .insert(new_record("https://example.com/1", "aaaaaa"))
            .await
            .unwrap();
        let _ = repo
            .insert(new_record("https://example.com/2", "aaaaaa"))
            .await
            .unwrap_err();
        let second = repo
            .insert(new_record("https://example.com/2", "bbbbbb"))
            .await
            .unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn duplicate_short_id_is_rejected_without_side_effects() {
        let repo = InMemoryRepository::new();

        repo.insert(new_record("https://example.com/a", "abc123"))
            .await
            .unwrap();

        let err = repo
            .insert(new_record("https://example.com/b", "abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateShortId(_)));
        assert!(repo
            .find_by_source_url("https://example.com/b")
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_source_url_is_rejected() {
        let repo = InMemoryRepository::new();

        repo.insert(new_record("https://example.com/a", "abc123"))
            .await
            .unwrap();

        let err = repo
            .insert(new_record("https://example.com/a", "xyz789"))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::DuplicateSourceUrl(_)));
        assert!(repo.find_by_short_id(&id("xyz789")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn increment_updates_counter_and_timestamp() {
        let repo = InMemoryRepository::new();
        let stored = repo
            .insert(new_record("https://example.com/a", "abc123"))
            .await
            .unwrap();

        repo.increment_visits(&id("abc123")).await.unwrap();
        repo.increment_visits(&id("abc123")).await.unwrap();

        let after = repo.find_by_short_id(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(after.visits, 2);
        assert!(after.updated_at >= stored.updated_at);
        assert_eq!(after.created_at, stored.created_at);
    }

    #[tokio::test]
    async fn increment_unknown_id_is_not_found() {
        let repo = InMemoryRepository::new();

        let err = repo.increment_visits(&id("nope00")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_of_same_url_have_one_winner() {
        const ROUNDS: usize = 200;
        const CALLERS: usize = 16;

        let repo = Arc::new(InMemoryRepository::new());

        for round in 0..ROUNDS {
            let source_url = format!("https://example.com/race/{round}");
            let barrier = Arc::new(Barrier::new(CALLERS));
            let mut handles = vec![];

            for i in 0..CALLERS {
                let repo = Arc::clone(&repo);
                let barrier = Arc::clone(&barrier);
                let source_url = source_url.clone();
                handles.push(tokio::spawn(async move {
                    barrier.wait().await;
                    repo.insert(NewUrlRecord {
                        source_url,
                        short_id: ShortId::new_unchecked(format!("r{round:03}{i:02}")),
                    })
                    .await
                }));
            }

            let mut winner = None;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(record) => {
                        assert!(winner.is_none(), "round {round} has two winners");
                        winner = Some(record);
                    }
                    Err(err) => assert!(
                        matches!(err, StorageError::DuplicateSourceUrl(_)),
                        "round {round}: {err}"
                    ),
                }
            }

            let winner = winner.expect("every round has a winner");
            let stored = repo.find_by_source_url(&source_url).await.unwrap().unwrap();
            assert_eq!(stored.short_id, winner.short_id);
            assert!(repo.find_by_short_id(&winner.short_id).await.unwrap().is_some());
        }

        assert_eq!(repo.len(), ROUNDS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        const TASKS: usize = 64;
        const INCREMENTS_EACH: usize = 100;

        let repo = Arc::new(InMemoryRepository::new());
        repo.insert(new_record("https://example.com/a", "abc123"))
            .await
            .unwrap();
        let barrier = Arc::new(Barrier::new(TASKS));

        let mut handles = vec![];
        for _ in 0..TASKS {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                for _ in 0..INCREMENTS_EACH {
                    repo.increment_visits(&ShortId::new_unchecked("abc123"))
                        .await
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let record = repo.find_by_short_id(&id("abc123")).await.unwrap().unwrap();
        assert_eq!(record.visits, (TASKS * INCREMENTS_EACH) as u64);
    }
}
