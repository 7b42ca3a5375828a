use serde::{Deserialize, Serialize};

pub mod progress;
pub mod timer;

pub use progress::{ProgressRecord, QuestionStatus, TimerState};

/// Competition round. Rounds unlock strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// The tier that must be fully correct before this one unlocks.
    pub fn previous(self) -> Option<Difficulty> {
        match self {
            Difficulty::Easy => None,
            Difficulty::Medium => Some(Difficulty::Easy),
            Difficulty::Hard => Some(Difficulty::Medium),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog question. Read-only to the progression core; ordering within a
/// difficulty is a strict total order by `order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Wrong,
}

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRoundRequest {
    pub round: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct SelectQuestionRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct VerdictRequest {
    pub participant_id: String,
    pub question_id: String,
    pub verdict: Verdict,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct ParticipantStateResponse {
    pub participant_id: String,
    pub team_name: String,
    pub focus: FocusView,
    pub total_points: i32,
    pub rounds: Vec<RoundView>,
}

#[derive(Debug, Serialize)]
pub struct FocusView {
    pub round: Difficulty,
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct RoundView {
    pub round: Difficulty,
    pub locked: bool,
    pub finished: bool,
    pub correct_count: usize,
    pub size: usize,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub question_id: String,
    pub index: usize,
    pub title: String,
    pub status: QuestionStatus,
    pub remaining_seconds: u32,
    pub is_paused: bool,
    pub points: i32,
    pub locked: bool,
}
