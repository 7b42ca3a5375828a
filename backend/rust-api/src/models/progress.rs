use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Difficulty;

/// Submission state of a single participant x question pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    NotStarted,
    InProgress,
    Pending,
    Correct,
    Wrong,
    Skipped,
}

impl QuestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStatus::NotStarted => "not_started",
            QuestionStatus::InProgress => "in_progress",
            QuestionStatus::Pending => "pending",
            QuestionStatus::Correct => "correct",
            QuestionStatus::Wrong => "wrong",
            QuestionStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_time_seconds: u32,
    pub is_paused: bool,
}

/// The durable per-question progress document. Created lazily on first
/// interaction and never deleted afterwards; every transition is a merge
/// write superseding the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub participant_id: String,
    pub team_name: String,
    pub question_id: String,
    pub round: Difficulty,
    pub order: u32,
    pub status: QuestionStatus,
    pub started: bool,
    pub timer: TimerState,
    pub points: i32,
    /// Draft answer shown to the judge while the record is pending.
    pub answer: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn key(participant_id: &str, question_id: &str) -> String {
        format!("{}_{}", participant_id, question_id)
    }

    pub fn new(
        participant_id: &str,
        team_name: &str,
        question_id: &str,
        round: Difficulty,
        order: u32,
        time_budget_seconds: u32,
    ) -> Self {
        Self {
            id: Self::key(participant_id, question_id),
            participant_id: participant_id.to_string(),
            team_name: team_name.to_string(),
            question_id: question_id.to_string(),
            round,
            order,
            status: QuestionStatus::NotStarted,
            started: false,
            timer: TimerState {
                remaining_time_seconds: time_budget_seconds,
                is_paused: true,
            },
            points: 0,
            answer: None,
            updated_at: Utc::now(),
        }
    }

    /// A started question whose budget ran out. Submission is closed and the
    /// gate treats the question as resolved, but no status value changes.
    pub fn timed_out(&self) -> bool {
        self.started && self.timer.remaining_time_seconds == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_participant_and_question() {
        assert_eq!(ProgressRecord::key("team-7", "q-easy-1"), "team-7_q-easy-1");
    }

    #[test]
    fn fresh_record_is_paused_and_unscored() {
        let record = ProgressRecord::new("p1", "Rustaceans", "q1", Difficulty::Easy, 1, 900);
        assert_eq!(record.status, QuestionStatus::NotStarted);
        assert!(!record.started);
        assert!(record.timer.is_paused);
        assert_eq!(record.timer.remaining_time_seconds, 900);
        assert_eq!(record.points, 0);
        assert!(!record.timed_out());
    }

    #[test]
    fn timed_out_requires_started() {
        let mut record = ProgressRecord::new("p1", "t", "q1", Difficulty::Easy, 1, 900);
        record.timer.remaining_time_seconds = 0;
        assert!(!record.timed_out());
        record.started = true;
        assert!(record.timed_out());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&QuestionStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        let json = serde_json::to_string(&QuestionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
