use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::{Collection, Database};
use tokio::sync::RwLock;

use crate::metrics::track_store_operation;
use crate::models::{ProgressRecord, QuestionStatus};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// The durable source of truth for participant progress. Keyed by
/// `{participant_id}_{question_id}`; a write supersedes the previous record
/// as a whole (merge-by-replacement). The core never deletes a record.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, participant_id: &str, question_id: &str)
        -> Result<Option<ProgressRecord>>;

    async fn upsert(&self, record: &ProgressRecord) -> Result<()>;

    /// Bulk read used to reconstruct all round states on session open.
    async fn list_for_participant(&self, participant_id: &str) -> Result<Vec<ProgressRecord>>;

    /// Records awaiting judgment, across all participants (judge queue).
    async fn list_pending(&self) -> Result<Vec<ProgressRecord>>;

    async fn ping(&self) -> Result<()>;
}

pub struct MongoProgressStore {
    mongo: Database,
    collection: Collection<ProgressRecord>,
}

impl MongoProgressStore {
    pub fn new(mongo: Database) -> Self {
        let collection = mongo.collection("participant_progress");
        Self { mongo, collection }
    }
}

#[async_trait]
impl ProgressStore for MongoProgressStore {
    async fn get(
        &self,
        participant_id: &str,
        question_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        let key = ProgressRecord::key(participant_id, question_id);
        track_store_operation("get", async {
            retry_async_with_config(RetryConfig::default(), || async {
                self.collection
                    .find_one(doc! { "_id": &key })
                    .await
                    .context("Failed to read progress record")
            })
            .await
        })
        .await
    }

    async fn upsert(&self, record: &ProgressRecord) -> Result<()> {
        // Transition writes gate the state machine; retry hard before
        // surfacing a PersistenceFailure.
        track_store_operation("upsert", async {
            retry_async_with_config(RetryConfig::aggressive(), || async {
                self.collection
                    .replace_one(doc! { "_id": &record.id }, record)
                    .with_options(
                        mongodb::options::ReplaceOptions::builder()
                            .upsert(true)
                            .build(),
                    )
                    .await
                    .map(|_| ())
                    .context("Failed to persist progress record")
            })
            .await
        })
        .await
    }

    async fn list_for_participant(&self, participant_id: &str) -> Result<Vec<ProgressRecord>> {
        use futures::TryStreamExt;

        track_store_operation("list_for_participant", async {
            retry_async_with_config(RetryConfig::default(), || async {
                let cursor = self
                    .collection
                    .find(doc! { "participant_id": participant_id })
                    .await
                    .context("Failed to query progress records")?;
                cursor
                    .try_collect()
                    .await
                    .context("Failed to read progress cursor")
            })
            .await
        })
        .await
    }

    async fn list_pending(&self) -> Result<Vec<ProgressRecord>> {
        use futures::TryStreamExt;

        track_store_operation("list_pending", async {
            retry_async_with_config(RetryConfig::default(), || async {
                let cursor = self
                    .collection
                    .find(doc! { "status": QuestionStatus::Pending.as_str() })
                    .await
                    .context("Failed to query pending records")?;
                cursor
                    .try_collect()
                    .await
                    .context("Failed to read pending cursor")
            })
            .await
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .context("MongoDB ping failed")
    }
}

/// Store used by the test suite and by local runs without MongoDB. Same
/// keying and merge-by-replacement semantics as the Mongo adapter.
#[derive(Default)]
pub struct InMemoryProgressStore {
    records: RwLock<HashMap<String, ProgressRecord>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get(
        &self,
        participant_id: &str,
        question_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        let key = ProgressRecord::key(participant_id, question_id);
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn upsert(&self, record: &ProgressRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_for_participant(&self, participant_id: &str) -> Result<Vec<ProgressRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.participant_id == participant_id)
            .cloned()
            .collect())
    }

    async fn list_pending(&self) -> Result<Vec<ProgressRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == QuestionStatus::Pending)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn record(participant: &str, question: &str, status: QuestionStatus) -> ProgressRecord {
        let mut r = ProgressRecord::new(participant, "team", question, Difficulty::Easy, 1, 900);
        r.status = status;
        r
    }

    #[tokio::test]
    async fn upsert_supersedes_previous_write() {
        let store = InMemoryProgressStore::new();
        store
            .upsert(&record("p1", "q1", QuestionStatus::InProgress))
            .await
            .unwrap();

        let mut updated = record("p1", "q1", QuestionStatus::Pending);
        updated.timer.remaining_time_seconds = 321;
        store.upsert(&updated).await.unwrap();

        let read = store.get("p1", "q1").await.unwrap().unwrap();
        assert_eq!(read.status, QuestionStatus::Pending);
        assert_eq!(read.timer.remaining_time_seconds, 321);
    }

    #[tokio::test]
    async fn list_for_participant_filters_by_owner() {
        let store = InMemoryProgressStore::new();
        store
            .upsert(&record("p1", "q1", QuestionStatus::Correct))
            .await
            .unwrap();
        store
            .upsert(&record("p1", "q2", QuestionStatus::InProgress))
            .await
            .unwrap();
        store
            .upsert(&record("p2", "q1", QuestionStatus::Pending))
            .await
            .unwrap();

        let records = store.list_for_participant("p1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.participant_id == "p1"));
    }

    #[tokio::test]
    async fn list_pending_is_cross_participant() {
        let store = InMemoryProgressStore::new();
        store
            .upsert(&record("p1", "q1", QuestionStatus::Pending))
            .await
            .unwrap();
        store
            .upsert(&record("p2", "q2", QuestionStatus::Pending))
            .await
            .unwrap();
        store
            .upsert(&record("p3", "q3", QuestionStatus::Correct))
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
    }
}
