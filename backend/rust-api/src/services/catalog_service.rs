use std::collections::HashMap;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;

use crate::models::{Difficulty, Question};

/// In-memory view of the question catalog, filtered and sorted locally:
/// by difficulty, then by `order` within the tier.
#[derive(Debug, Default)]
pub struct QuestionCatalog {
    by_round: HashMap<Difficulty, Vec<Question>>,
}

impl QuestionCatalog {
    pub fn new(mut questions: Vec<Question>) -> Self {
        questions.sort_by(|a, b| {
            a.difficulty
                .cmp(&b.difficulty)
                .then_with(|| a.order.cmp(&b.order))
        });

        let mut by_round: HashMap<Difficulty, Vec<Question>> = HashMap::new();
        for question in questions {
            by_round.entry(question.difficulty).or_default().push(question);
        }

        Self { by_round }
    }

    pub fn round(&self, round: Difficulty) -> &[Question] {
        self.by_round.get(&round).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tier_size(&self, round: Difficulty) -> usize {
        self.round(round).len()
    }

    pub fn question(&self, round: Difficulty, index: usize) -> Option<&Question> {
        self.round(round).get(index)
    }

    /// Looks a question up by id, returning it with its index inside its tier.
    pub fn find(&self, question_id: &str) -> Option<(&Question, usize)> {
        for round in Difficulty::ALL {
            if let Some(index) = self.round(round).iter().position(|q| q.id == question_id) {
                return Some((&self.round(round)[index], index));
            }
        }
        None
    }

    pub fn all(&self) -> Vec<&Question> {
        Difficulty::ALL
            .iter()
            .flat_map(|round| self.round(*round))
            .collect()
    }
}

pub struct CatalogService {
    mongo: Database,
}

impl CatalogService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Loads the whole catalog once at startup. The catalog is read-only to
    /// the progression core, so there is no refresh path.
    pub async fn load(&self) -> Result<QuestionCatalog> {
        let collection = self.mongo.collection::<Question>("questions");
        let cursor = collection
            .find(doc! {})
            .await
            .context("Failed to query questions collection")?;
        let questions: Vec<Question> = cursor
            .try_collect()
            .await
            .context("Failed to read questions cursor")?;

        tracing::info!("Question catalog loaded: {} questions", questions.len());
        Ok(QuestionCatalog::new(questions))
    }
}
