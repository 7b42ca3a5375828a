use std::collections::HashMap;

use crate::models::{Difficulty, ProgressRecord, QuestionStatus};
use crate::services::catalog_service::QuestionCatalog;

/// Outcome of asking whether a round can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAccess {
    Open,
    /// The preceding tier is not fully correct yet.
    Locked,
    /// Every question in the tier is already correct; nothing left to do.
    Finished,
}

/// Computes which rounds and which questions are reachable, purely from the
/// catalog and the participant's progress records. Holds no state of its own,
/// so the answer can never drift from what is persisted.
pub struct RoundGate<'a> {
    catalog: &'a QuestionCatalog,
    records: &'a HashMap<String, ProgressRecord>,
}

impl<'a> RoundGate<'a> {
    pub fn new(
        catalog: &'a QuestionCatalog,
        records: &'a HashMap<String, ProgressRecord>,
    ) -> Self {
        Self { catalog, records }
    }

    fn record(&self, round: Difficulty, index: usize) -> Option<&ProgressRecord> {
        let question = self.catalog.question(round, index)?;
        self.records.get(&question.id)
    }

    pub fn correct_count(&self, round: Difficulty) -> usize {
        self.catalog
            .round(round)
            .iter()
            .filter(|q| {
                self.records
                    .get(&q.id)
                    .map(|r| r.status == QuestionStatus::Correct)
                    .unwrap_or(false)
            })
            .count()
    }

    /// A tier is complete when every one of its questions is correct.
    pub fn round_complete(&self, round: Difficulty) -> bool {
        let size = self.catalog.tier_size(round);
        size > 0 && self.correct_count(round) == size
    }

    /// Easy is never locked; each later tier requires the preceding tier to
    /// be fully correct.
    pub fn is_round_locked(&self, round: Difficulty) -> bool {
        match round.previous() {
            None => false,
            Some(previous) => !self.round_complete(previous),
        }
    }

    pub fn round_access(&self, round: Difficulty) -> RoundAccess {
        if self.is_round_locked(round) {
            RoundAccess::Locked
        } else if self.round_complete(round) {
            RoundAccess::Finished
        } else {
            RoundAccess::Open
        }
    }

    /// Sequential-progression rule within a round, relative to the current
    /// focus index:
    /// - the focused index is always reachable;
    /// - an earlier index locks once it is resolved (correct, skipped, or
    ///   timed out);
    /// - the next index opens only once the focused question is correct;
    /// - anything further ahead stays locked.
    pub fn is_question_locked(&self, round: Difficulty, index: usize, focus: usize) -> bool {
        if index == focus {
            return false;
        }

        if index < focus {
            return match self.record(round, index) {
                Some(r) => {
                    matches!(
                        r.status,
                        QuestionStatus::Correct | QuestionStatus::Skipped
                    ) || r.timed_out()
                }
                None => false,
            };
        }

        if index == focus + 1 {
            return !self
                .record(round, focus)
                .map(|r| r.status == QuestionStatus::Correct)
                .unwrap_or(false);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;

    fn catalog() -> QuestionCatalog {
        let mut questions = Vec::new();
        for (difficulty, count) in [
            (Difficulty::Easy, 3),
            (Difficulty::Medium, 2),
            (Difficulty::Hard, 3),
        ] {
            for order in 1..=count {
                questions.push(Question {
                    id: format!("{}-{}", difficulty.as_str(), order),
                    title: format!("{} #{}", difficulty.as_str(), order),
                    description: String::new(),
                    difficulty,
                    order,
                });
            }
        }
        QuestionCatalog::new(questions)
    }

    fn record_with(
        question_id: &str,
        round: Difficulty,
        status: QuestionStatus,
        remaining: u32,
    ) -> ProgressRecord {
        let mut r = ProgressRecord::new("p1", "team", question_id, round, 1, 900);
        r.status = status;
        r.started = status != QuestionStatus::NotStarted;
        r.timer.remaining_time_seconds = remaining;
        r
    }

    fn records(
        entries: &[(&str, Difficulty, QuestionStatus, u32)],
    ) -> HashMap<String, ProgressRecord> {
        entries
            .iter()
            .map(|(id, round, status, remaining)| {
                (
                    id.to_string(),
                    record_with(id, *round, *status, *remaining),
                )
            })
            .collect()
    }

    #[test]
    fn easy_round_is_never_locked() {
        let catalog = catalog();
        let records = HashMap::new();
        let gate = RoundGate::new(&catalog, &records);
        assert!(!gate.is_round_locked(Difficulty::Easy));
        assert!(gate.is_round_locked(Difficulty::Medium));
        assert!(gate.is_round_locked(Difficulty::Hard));
    }

    #[test]
    fn medium_unlocks_only_when_all_easy_correct() {
        let catalog = catalog();

        // 2 of 3 easy questions correct: medium still locked.
        let partial = records(&[
            ("easy-1", Difficulty::Easy, QuestionStatus::Correct, 100),
            ("easy-2", Difficulty::Easy, QuestionStatus::Correct, 100),
        ]);
        let gate = RoundGate::new(&catalog, &partial);
        assert!(gate.is_round_locked(Difficulty::Medium));

        let full = records(&[
            ("easy-1", Difficulty::Easy, QuestionStatus::Correct, 100),
            ("easy-2", Difficulty::Easy, QuestionStatus::Correct, 100),
            ("easy-3", Difficulty::Easy, QuestionStatus::Correct, 100),
        ]);
        let gate = RoundGate::new(&catalog, &full);
        assert!(!gate.is_round_locked(Difficulty::Medium));
        // Hard needs all of medium, which has none correct.
        assert!(gate.is_round_locked(Difficulty::Hard));
    }

    #[test]
    fn finished_round_is_distinguished_from_locked() {
        let catalog = catalog();
        let full = records(&[
            ("easy-1", Difficulty::Easy, QuestionStatus::Correct, 100),
            ("easy-2", Difficulty::Easy, QuestionStatus::Correct, 100),
            ("easy-3", Difficulty::Easy, QuestionStatus::Correct, 100),
        ]);
        let gate = RoundGate::new(&catalog, &full);
        assert_eq!(gate.round_access(Difficulty::Easy), RoundAccess::Finished);
        assert_eq!(gate.round_access(Difficulty::Medium), RoundAccess::Open);
        assert_eq!(gate.round_access(Difficulty::Hard), RoundAccess::Locked);
    }

    #[test]
    fn focused_question_is_always_reachable() {
        let catalog = catalog();
        let records = HashMap::new();
        let gate = RoundGate::new(&catalog, &records);
        assert!(!gate.is_question_locked(Difficulty::Easy, 0, 0));
        assert!(!gate.is_question_locked(Difficulty::Easy, 1, 1));
    }

    #[test]
    fn next_question_opens_only_after_correct() {
        let catalog = catalog();

        let none = HashMap::new();
        let gate = RoundGate::new(&catalog, &none);
        assert!(gate.is_question_locked(Difficulty::Easy, 1, 0));
        assert!(gate.is_question_locked(Difficulty::Easy, 2, 0));

        let solved = records(&[(
            "easy-1",
            Difficulty::Easy,
            QuestionStatus::Correct,
            100,
        )]);
        let gate = RoundGate::new(&catalog, &solved);
        assert!(!gate.is_question_locked(Difficulty::Easy, 1, 0));
        // Two ahead stays locked regardless.
        assert!(gate.is_question_locked(Difficulty::Easy, 2, 0));
    }

    #[test]
    fn resolved_earlier_questions_lock_behind_focus() {
        let catalog = catalog();
        let entries = records(&[
            ("easy-1", Difficulty::Easy, QuestionStatus::Correct, 100),
            ("easy-2", Difficulty::Easy, QuestionStatus::Skipped, 340),
        ]);
        let gate = RoundGate::new(&catalog, &entries);
        assert!(gate.is_question_locked(Difficulty::Easy, 0, 2));
        assert!(gate.is_question_locked(Difficulty::Easy, 1, 2));
    }

    #[test]
    fn timed_out_earlier_question_locks() {
        let catalog = catalog();
        let entries = records(&[(
            "easy-1",
            Difficulty::Easy,
            QuestionStatus::InProgress,
            0,
        )]);
        let gate = RoundGate::new(&catalog, &entries);
        assert!(gate.is_question_locked(Difficulty::Easy, 0, 1));
    }
}
