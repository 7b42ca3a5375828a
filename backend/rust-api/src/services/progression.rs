use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::CompetitionFormat;
use crate::error::ProgressionError;
use crate::metrics::{
    ENGINES_OPEN, QUESTIONS_SKIPPED_TOTAL, STALE_VERDICTS_DISCARDED_TOTAL, SUBMISSIONS_TOTAL,
    TIMERS_EXPIRED_TOTAL, VERDICTS_APPLIED_TOTAL,
};
use crate::models::{
    Difficulty, FocusView, ParticipantStateResponse, ProgressRecord, Question, QuestionStatus,
    QuestionView, RoundView, TimerState,
};
use crate::services::catalog_service::QuestionCatalog;
use crate::services::gate::{RoundAccess, RoundGate};
use crate::services::handshake::{self, SubmissionHandshake};
use crate::services::progress_store::ProgressStore;
use crate::services::timer_engine::{TickOutcome, TimerEngine};
use crate::services::AppState;
use crate::utils::time::format_mm_ss;

/// Continuation decision for the ticker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictOutcome {
    Correct,
    Wrong,
    /// Observation superseded by a newer local transition; discarded.
    Stale,
}

/// The authoritative per-participant state machine. Everything it knows is
/// reconstructible from the Progress Store; in-memory state is only a mirror
/// kept in sync by write-through persistence.
pub struct ParticipantEngine {
    participant_id: String,
    team_name: String,
    catalog: Arc<QuestionCatalog>,
    store: Arc<dyn ProgressStore>,
    format: CompetitionFormat,
    records: HashMap<String, ProgressRecord>,
    focus_round: Difficulty,
    focus_index: usize,
    pub(crate) timer: TimerEngine,
    pub(crate) handshake: SubmissionHandshake,
}

impl ParticipantEngine {
    /// Rebuilds the engine purely from the Progress Store: bulk-reads the
    /// participant's records, derives focus, and loads the focused timer.
    /// No client-held state is consulted.
    pub async fn reconstruct(
        participant_id: &str,
        team_name: &str,
        catalog: Arc<QuestionCatalog>,
        store: Arc<dyn ProgressStore>,
        format: CompetitionFormat,
    ) -> Result<Self, ProgressionError> {
        let stored = store
            .list_for_participant(participant_id)
            .await
            .map_err(ProgressionError::Persistence)?;

        let mut records = HashMap::new();
        for record in stored {
            // Records for questions removed from the catalog are ignored but
            // kept in the store (audit trail).
            if catalog.find(&record.question_id).is_some() {
                records.insert(record.question_id.clone(), record);
            }
        }

        let team_name = if team_name.is_empty() {
            records
                .values()
                .next()
                .map(|r| r.team_name.clone())
                .unwrap_or_default()
        } else {
            team_name.to_string()
        };

        let focus_round = derive_focus_round(&catalog, &records);
        let focus_index = derive_focus_index(&catalog, &records, focus_round);

        let mut engine = Self {
            participant_id: participant_id.to_string(),
            team_name,
            catalog,
            store,
            timer: TimerEngine::new(format.autosave_interval_seconds),
            format,
            records,
            focus_round,
            focus_index,
            handshake: SubmissionHandshake::new(),
        };
        engine.load_focus_timer();
        engine.normalize_focus().await?;

        tracing::info!(
            "Engine reconstructed for participant {}: focus {}#{}, {} remaining",
            engine.participant_id,
            engine.focus_round,
            engine.focus_index,
            format_mm_ss(engine.timer.remaining())
        );

        Ok(engine)
    }

    pub fn focus(&self) -> (Difficulty, usize) {
        (self.focus_round, self.focus_index)
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.timer.remaining()
    }

    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn focused_question_id(&self) -> Option<String> {
        self.catalog
            .question(self.focus_round, self.focus_index)
            .map(|q| q.id.clone())
    }

    pub(crate) fn focus_is_pending(&self) -> bool {
        self.focused_question_id()
            .and_then(|qid| self.records.get(&qid))
            .map(|r| r.status == QuestionStatus::Pending)
            .unwrap_or(false)
    }

    pub(crate) fn store(&self) -> Arc<dyn ProgressStore> {
        self.store.clone()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.format.verdict_poll_interval_ms)
    }

    pub(crate) fn participant_id(&self) -> &str {
        &self.participant_id
    }

    fn focused_question(&self) -> Result<&Question, ProgressionError> {
        self.catalog
            .question(self.focus_round, self.focus_index)
            .ok_or(ProgressionError::UnknownQuestion(self.focus_index))
    }

    /// Persist-then-commit: the in-memory mirror only changes once the store
    /// accepted the write, so a failed write leaves the machine retryable.
    async fn persist(&mut self, mut record: ProgressRecord) -> Result<(), ProgressionError> {
        record.updated_at = Utc::now();
        self.store
            .upsert(&record)
            .await
            .map_err(ProgressionError::Persistence)?;
        self.records.insert(record.question_id.clone(), record);
        Ok(())
    }

    fn focus_record_or_new(&self) -> Result<ProgressRecord, ProgressionError> {
        let question = self.focused_question()?;
        Ok(self
            .records
            .get(&question.id)
            .cloned()
            .unwrap_or_else(|| {
                ProgressRecord::new(
                    &self.participant_id,
                    &self.team_name,
                    &question.id,
                    self.focus_round,
                    question.order,
                    self.format.time_budget(
                        self.focus_round,
                        self.focus_index,
                        self.catalog.tier_size(self.focus_round),
                    ),
                )
            }))
    }

    fn load_focus_timer(&mut self) {
        match self.catalog.question(self.focus_round, self.focus_index) {
            Some(question) => {
                let remaining = self
                    .records
                    .get(&question.id)
                    .map(|r| r.timer.remaining_time_seconds)
                    .unwrap_or_else(|| {
                        self.format.time_budget(
                            self.focus_round,
                            self.focus_index,
                            self.catalog.tier_size(self.focus_round),
                        )
                    });
                self.timer.load(&question.id, remaining);
            }
            None => self.timer.cancel_ticker(),
        }
    }

    /// A verdict that landed while the participant was away: a `wrong` on the
    /// focused question folds back to `in_progress` (paused until resumed).
    async fn normalize_focus(&mut self) -> Result<(), ProgressionError> {
        let Some(qid) = self.focused_question_id() else {
            return Ok(());
        };
        if let Some(record) = self.records.get(&qid) {
            if record.status == QuestionStatus::Wrong {
                let mut updated = record.clone();
                updated.status = QuestionStatus::InProgress;
                updated.timer.is_paused = true;
                updated.answer = None;
                self.persist(updated).await?;
            }
        }
        Ok(())
    }

    /// Pauses the focused timer and persists its remaining value before the
    /// focus moves elsewhere. Mandatory on every navigation.
    async fn suspend_focus(&mut self) -> Result<(), ProgressionError> {
        if self.timer.is_running() {
            self.timer.pause();
            if let Some(qid) = self.focused_question_id() {
                if let Some(record) = self.records.get(&qid) {
                    if record.status == QuestionStatus::InProgress {
                        let mut updated = record.clone();
                        updated.timer = TimerState {
                            remaining_time_seconds: self.timer.remaining(),
                            is_paused: true,
                        };
                        self.persist(updated).await?;
                    }
                }
            }
        }
        self.timer.cancel_ticker();
        Ok(())
    }

    pub async fn select_round(&mut self, round: Difficulty) -> Result<(), ProgressionError> {
        if round == self.focus_round {
            return Ok(());
        }

        let gate = RoundGate::new(&self.catalog, &self.records);
        match gate.round_access(round) {
            RoundAccess::Locked => return Err(ProgressionError::RoundLocked(round.to_string())),
            RoundAccess::Finished => {
                return Err(ProgressionError::RoundFinished(round.to_string()))
            }
            RoundAccess::Open => {}
        }

        self.suspend_focus().await?;
        self.handshake.stop_poll();
        self.focus_round = round;
        self.focus_index = derive_focus_index(&self.catalog, &self.records, round);
        self.load_focus_timer();
        self.normalize_focus().await?;
        Ok(())
    }

    pub async fn select_question(&mut self, index: usize) -> Result<(), ProgressionError> {
        if index >= self.catalog.tier_size(self.focus_round) {
            return Err(ProgressionError::UnknownQuestion(index));
        }
        if index == self.focus_index {
            return Ok(());
        }

        let gate = RoundGate::new(&self.catalog, &self.records);
        if gate.is_question_locked(self.focus_round, index, self.focus_index) {
            return Err(ProgressionError::QuestionLocked(index));
        }

        self.suspend_focus().await?;
        self.handshake.stop_poll();
        self.focus_index = index;
        self.load_focus_timer();
        self.normalize_focus().await?;
        Ok(())
    }

    /// Start a fresh question or resume a skipped/reloaded one. The timer
    /// continues from its persisted value, never from the full budget.
    pub async fn start(&mut self) -> Result<(), ProgressionError> {
        let record = self.focus_record_or_new()?;
        handshake::ensure_startable(&record)?;

        let mut updated = record;
        updated.started = true;
        updated.status = QuestionStatus::InProgress;
        updated.timer = TimerState {
            remaining_time_seconds: self.timer.remaining(),
            is_paused: false,
        };
        self.persist(updated).await?;
        self.timer.resume();

        tracing::info!(
            "Participant {} started {}#{} with {} on the clock",
            self.participant_id,
            self.focus_round,
            self.focus_index,
            format_mm_ss(self.timer.remaining())
        );
        Ok(())
    }

    /// Submit-for-judgment: freezes the timer at its current value, parks the
    /// draft answer for the judge, and flips the record to pending.
    pub async fn submit(&mut self, answer: String) -> Result<(), ProgressionError> {
        let record = self.focus_record_or_new()?;
        handshake::ensure_submittable(&record)?;

        let was_running = self.timer.is_running();
        self.timer.pause();
        let mut updated = record;
        updated.status = QuestionStatus::Pending;
        updated.answer = Some(answer);
        updated.timer = TimerState {
            remaining_time_seconds: self.timer.remaining(),
            is_paused: true,
        };

        match self.persist(updated).await {
            Ok(()) => {
                self.timer.cancel_ticker();
                SUBMISSIONS_TOTAL
                    .with_label_values(&[self.focus_round.as_str()])
                    .inc();
                tracing::info!(
                    "Participant {} submitted {}#{} for judgment ({} left)",
                    self.participant_id,
                    self.focus_round,
                    self.focus_index,
                    format_mm_ss(self.timer.remaining())
                );
                Ok(())
            }
            Err(e) => {
                // Leave the machine in the pre-attempt state: the clock keeps
                // running and the submission can be retried.
                if was_running {
                    self.timer.resume();
                }
                Err(e)
            }
        }
    }

    /// Skip to the next question without awarding points. The skipped record
    /// keeps its remaining time and can be resumed later.
    pub async fn skip(&mut self) -> Result<(), ProgressionError> {
        if self.focus_index + 1 >= self.catalog.tier_size(self.focus_round) {
            return Err(ProgressionError::NothingToSkipTo);
        }
        let record = self.focus_record_or_new()?;
        if record.timed_out() {
            return Err(ProgressionError::SubmissionClosed);
        }
        if record.status != QuestionStatus::InProgress {
            return Err(ProgressionError::InvalidTransition(record.status.as_str()));
        }
        let Some(target) = self.next_unresolved(self.focus_index) else {
            return Err(ProgressionError::NothingToSkipTo);
        };

        let was_running = self.timer.is_running();
        self.timer.pause();
        let mut updated = record;
        updated.status = QuestionStatus::Skipped;
        updated.timer = TimerState {
            remaining_time_seconds: self.timer.remaining(),
            is_paused: true,
        };

        match self.persist(updated).await {
            Ok(()) => {
                QUESTIONS_SKIPPED_TOTAL
                    .with_label_values(&[self.focus_round.as_str()])
                    .inc();
                self.handshake.stop_poll();
                self.focus_index = target;
                self.load_focus_timer();
                Ok(())
            }
            Err(e) => {
                if was_running {
                    self.timer.resume();
                }
                Err(e)
            }
        }
    }

    /// Drives the focused countdown by one second. Same path the ticker task
    /// takes, minus the staleness guard.
    pub async fn on_tick(&mut self) -> Result<TickFlow, ProgressionError> {
        let generation = self.timer.generation();
        self.handle_tick(generation).await
    }

    /// One ticker callback. `generation` identifies the ticker loop that
    /// fired; a superseded loop is told to stop without touching anything.
    async fn handle_tick(&mut self, generation: u64) -> Result<TickFlow, ProgressionError> {
        if generation != self.timer.generation() {
            return Ok(TickFlow::Stop);
        }

        match self.timer.tick() {
            TickOutcome::Idle => Ok(TickFlow::Stop),
            TickOutcome::Ticked(_) => Ok(TickFlow::Continue),
            TickOutcome::Autosave(remaining) => {
                if let Err(e) = self.autosave(remaining).await {
                    // The next autosave retries; the engine keeps ticking.
                    tracing::error!(
                        "Autosave failed for participant {}: {}",
                        self.participant_id,
                        e
                    );
                }
                Ok(TickFlow::Continue)
            }
            TickOutcome::Expired => {
                self.on_time_up().await?;
                Ok(TickFlow::Stop)
            }
        }
    }

    async fn autosave(&mut self, remaining: u32) -> Result<(), ProgressionError> {
        let Some(qid) = self.focused_question_id() else {
            return Ok(());
        };
        if let Some(record) = self.records.get(&qid) {
            let mut updated = record.clone();
            updated.timer = TimerState {
                remaining_time_seconds: remaining,
                is_paused: false,
            };
            self.persist(updated).await?;
        }
        Ok(())
    }

    /// Time-expiry path: zero points, timer frozen at zero, submission closed
    /// for this question. Focus does not advance automatically.
    pub async fn on_time_up(&mut self) -> Result<(), ProgressionError> {
        let mut record = self.focus_record_or_new()?;
        record.timer = TimerState {
            remaining_time_seconds: 0,
            is_paused: true,
        };
        record.points = 0;
        self.persist(record).await?;

        TIMERS_EXPIRED_TOTAL
            .with_label_values(&[self.focus_round.as_str()])
            .inc();
        tracing::warn!(
            "Time expired for participant {} on {}#{}",
            self.participant_id,
            self.focus_round,
            self.focus_index
        );
        Ok(())
    }

    /// Applies a judged status observed in the Progress Store. Idempotent:
    /// anything but a locally pending record is a stale observation and is
    /// discarded, so a verdict replayed twice cannot double-award points or
    /// double-advance focus.
    pub async fn absorb_verdict(
        &mut self,
        question_id: &str,
        observed: ProgressRecord,
    ) -> Result<VerdictOutcome, ProgressionError> {
        let local = match self.records.get(question_id) {
            Some(r) if r.status == QuestionStatus::Pending => r.clone(),
            _ => {
                STALE_VERDICTS_DISCARDED_TOTAL.inc();
                return Ok(VerdictOutcome::Stale);
            }
        };

        match observed.status {
            QuestionStatus::Correct => {
                let round = local.round;
                let mut updated = local;
                updated.status = QuestionStatus::Correct;
                updated.points = self.format.round_points(round);
                updated.timer.is_paused = true;
                self.persist(updated).await?;

                VERDICTS_APPLIED_TOTAL.with_label_values(&["correct"]).inc();
                tracing::info!(
                    "Verdict correct for participant {} on {} (+{} points)",
                    self.participant_id,
                    question_id,
                    self.format.round_points(round)
                );

                if self.focused_question_id().as_deref() == Some(question_id) {
                    self.advance_after_correct();
                }
                Ok(VerdictOutcome::Correct)
            }
            QuestionStatus::Wrong => {
                let mut updated = local;
                updated.status = QuestionStatus::InProgress;
                updated.answer = None;
                // No refund and no reset: time spent stays spent.
                updated.timer.is_paused = false;
                self.persist(updated).await?;

                VERDICTS_APPLIED_TOTAL.with_label_values(&["wrong"]).inc();
                tracing::info!(
                    "Verdict wrong for participant {} on {}; clock resumes at {}",
                    self.participant_id,
                    question_id,
                    format_mm_ss(self.timer.remaining())
                );

                if self.focused_question_id().as_deref() == Some(question_id) {
                    self.timer.resume();
                }
                Ok(VerdictOutcome::Wrong)
            }
            _ => {
                STALE_VERDICTS_DISCARDED_TOTAL.inc();
                Ok(VerdictOutcome::Stale)
            }
        }
    }

    /// After a correct verdict the focus moves to the next unresolved
    /// question; when the tail of the round is done it wraps back to the
    /// earliest skipped one. No target left means the round is finished.
    fn advance_after_correct(&mut self) {
        match self.next_unresolved(self.focus_index) {
            Some(target) => {
                self.focus_index = target;
                self.load_focus_timer();
            }
            None => {
                self.timer.cancel_ticker();
                tracing::info!(
                    "Participant {} finished the {} round",
                    self.participant_id,
                    self.focus_round
                );
            }
        }
    }

    /// First unresolved index after `from` (wrapping to the front), or None
    /// when every other question in the round is resolved.
    fn next_unresolved(&self, from: usize) -> Option<usize> {
        let tier = self.catalog.round(self.focus_round);
        let size = tier.len();
        (1..size)
            .map(|offset| (from + offset) % size)
            .find(|&i| self.is_unresolved(tier, i))
    }

    fn is_unresolved(&self, tier: &[Question], index: usize) -> bool {
        match self.records.get(&tier[index].id) {
            None => true,
            Some(r) => !(r.status == QuestionStatus::Correct || r.timed_out()),
        }
    }

    pub fn total_points(&self) -> i32 {
        self.records
            .values()
            .filter(|r| r.status == QuestionStatus::Correct)
            .map(|r| r.points)
            .sum()
    }

    /// Pure derived view over the canonical record set; nothing here is
    /// cached, so it cannot drift from what is persisted.
    pub fn view(&self) -> ParticipantStateResponse {
        let gate = RoundGate::new(&self.catalog, &self.records);

        let rounds = Difficulty::ALL
            .iter()
            .map(|&round| {
                let access = gate.round_access(round);
                let tier_size = self.catalog.tier_size(round);
                let focus_for_round = if round == self.focus_round {
                    self.focus_index
                } else {
                    derive_focus_index(&self.catalog, &self.records, round)
                };

                let questions = self
                    .catalog
                    .round(round)
                    .iter()
                    .enumerate()
                    .map(|(index, question)| {
                        let record = self.records.get(&question.id);
                        let focused = round == self.focus_round && index == self.focus_index;

                        let (status, mut remaining, mut is_paused, points) = match record {
                            Some(r) => (
                                r.status,
                                r.timer.remaining_time_seconds,
                                r.timer.is_paused,
                                r.points,
                            ),
                            None => (
                                QuestionStatus::NotStarted,
                                self.format.time_budget(round, index, tier_size),
                                true,
                                0,
                            ),
                        };
                        if focused {
                            remaining = self.timer.remaining();
                            is_paused = !self.timer.is_running();
                        }

                        QuestionView {
                            question_id: question.id.clone(),
                            index,
                            title: question.title.clone(),
                            status,
                            remaining_seconds: remaining,
                            is_paused,
                            points,
                            locked: gate.is_question_locked(round, index, focus_for_round),
                        }
                    })
                    .collect();

                RoundView {
                    round,
                    locked: access == RoundAccess::Locked,
                    finished: access == RoundAccess::Finished,
                    correct_count: gate.correct_count(round),
                    size: tier_size,
                    questions,
                }
            })
            .collect();

        ParticipantStateResponse {
            participant_id: self.participant_id.clone(),
            team_name: self.team_name.clone(),
            focus: FocusView {
                round: self.focus_round,
                index: self.focus_index,
            },
            total_points: self.total_points(),
            rounds,
        }
    }
}

/// The round containing an open record wins; otherwise the lowest round that
/// is neither locked nor finished; otherwise the highest unlocked round.
fn derive_focus_round(
    catalog: &QuestionCatalog,
    records: &HashMap<String, ProgressRecord>,
) -> Difficulty {
    for round in Difficulty::ALL {
        let open = catalog.round(round).iter().any(|q| {
            records
                .get(&q.id)
                .map(|r| {
                    matches!(
                        r.status,
                        QuestionStatus::InProgress | QuestionStatus::Pending | QuestionStatus::Wrong
                    ) && !r.timed_out()
                })
                .unwrap_or(false)
        });
        if open {
            return round;
        }
    }

    let gate = RoundGate::new(catalog, records);
    for round in Difficulty::ALL {
        if gate.round_access(round) == RoundAccess::Open {
            return round;
        }
    }
    for round in Difficulty::ALL.iter().rev() {
        if !gate.is_round_locked(*round) {
            return *round;
        }
    }
    Difficulty::Easy
}

/// Focus within a round, derived deterministically from the records: the
/// open question if there is one, else the first untouched index, else the
/// earliest skipped index, else the last index (round done).
fn derive_focus_index(
    catalog: &QuestionCatalog,
    records: &HashMap<String, ProgressRecord>,
    round: Difficulty,
) -> usize {
    let tier = catalog.round(round);
    if tier.is_empty() {
        return 0;
    }

    let mut first_untouched = None;
    let mut first_skipped = None;

    for (index, question) in tier.iter().enumerate() {
        match records.get(&question.id) {
            None => {
                if first_untouched.is_none() {
                    first_untouched = Some(index);
                }
            }
            Some(record) => {
                if record.timed_out() || record.status == QuestionStatus::Correct {
                    continue;
                }
                match record.status {
                    QuestionStatus::InProgress
                    | QuestionStatus::Pending
                    | QuestionStatus::Wrong => return index,
                    QuestionStatus::NotStarted => {
                        if first_untouched.is_none() {
                            first_untouched = Some(index);
                        }
                    }
                    QuestionStatus::Skipped => {
                        if first_skipped.is_none() {
                            first_skipped = Some(index);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    first_untouched
        .or(first_skipped)
        .unwrap_or(tier.len() - 1)
}

/// Facade the handlers talk to. Engine mutations happen under the per
/// participant mutex; ticker and poll tasks are (re)synchronized after every
/// operation so there is never more than one of either per engine.
pub struct ProgressionService {
    state: Arc<AppState>,
}

impl ProgressionService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn open(
        &self,
        participant_id: &str,
        team_name: &str,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = match self.state.engine(participant_id).await {
            Some(existing) => existing,
            None => {
                let engine = ParticipantEngine::reconstruct(
                    participant_id,
                    team_name,
                    self.state.catalog.clone(),
                    self.state.store.clone(),
                    self.state.config.format.clone(),
                )
                .await?;
                let (engine, inserted) = self
                    .state
                    .engine_or_insert(participant_id, engine)
                    .await;
                if inserted {
                    ENGINES_OPEN.inc();
                }
                engine
            }
        };

        resync_tasks(&engine).await;
        let guard = engine.lock().await;
        Ok(guard.view())
    }

    async fn require_engine(
        &self,
        participant_id: &str,
    ) -> Result<Arc<Mutex<ParticipantEngine>>, ProgressionError> {
        self.state
            .engine(participant_id)
            .await
            .ok_or_else(|| ProgressionError::SessionNotOpen(participant_id.to_string()))
    }

    pub async fn state_view(
        &self,
        participant_id: &str,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = self.require_engine(participant_id).await?;
        let guard = engine.lock().await;
        Ok(guard.view())
    }

    pub async fn select_round(
        &self,
        participant_id: &str,
        round: Difficulty,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = self.require_engine(participant_id).await?;
        engine.lock().await.select_round(round).await?;
        resync_tasks(&engine).await;
        let guard = engine.lock().await;
        Ok(guard.view())
    }

    pub async fn select_question(
        &self,
        participant_id: &str,
        index: usize,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = self.require_engine(participant_id).await?;
        engine.lock().await.select_question(index).await?;
        resync_tasks(&engine).await;
        let guard = engine.lock().await;
        Ok(guard.view())
    }

    pub async fn start(
        &self,
        participant_id: &str,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = self.require_engine(participant_id).await?;
        engine.lock().await.start().await?;
        resync_tasks(&engine).await;
        let guard = engine.lock().await;
        Ok(guard.view())
    }

    pub async fn submit(
        &self,
        participant_id: &str,
        answer: String,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = self.require_engine(participant_id).await?;
        engine.lock().await.submit(answer).await?;
        resync_tasks(&engine).await;
        let guard = engine.lock().await;
        Ok(guard.view())
    }

    pub async fn skip(
        &self,
        participant_id: &str,
    ) -> Result<ParticipantStateResponse, ProgressionError> {
        let engine = self.require_engine(participant_id).await?;
        engine.lock().await.skip().await?;
        resync_tasks(&engine).await;
        let guard = engine.lock().await;
        Ok(guard.view())
    }
}

/// Reconciles background tasks with the engine's current state: exactly one
/// ticker while the timer runs, exactly one poll loop while the focused
/// question is pending, none otherwise.
pub async fn resync_tasks(engine: &Arc<Mutex<ParticipantEngine>>) {
    ensure_ticker(engine).await;
    ensure_poll(engine).await;
}

pub(crate) async fn ensure_ticker(engine: &Arc<Mutex<ParticipantEngine>>) {
    let mut guard = engine.lock().await;
    if !guard.timer.is_running() {
        guard.timer.cancel_ticker();
        return;
    }

    let generation = guard.timer.next_generation();
    let handle = tokio::spawn(ticker_loop(engine.clone(), generation));
    guard.timer.set_ticker(handle);
}

async fn ticker_loop(engine: Arc<Mutex<ParticipantEngine>>, generation: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // The first interval tick completes immediately; skip it so the first
    // decrement happens a full second after start.
    interval.tick().await;

    loop {
        interval.tick().await;
        let mut guard = engine.lock().await;
        match guard.handle_tick(generation).await {
            Ok(TickFlow::Continue) => {}
            Ok(TickFlow::Stop) => {
                if guard.timer.generation() == generation {
                    guard.timer.clear_finished_ticker();
                }
                return;
            }
            Err(e) => {
                tracing::error!("Ticker transition failed: {}", e);
                return;
            }
        }
    }
}

pub(crate) async fn ensure_poll(engine: &Arc<Mutex<ParticipantEngine>>) {
    let mut guard = engine.lock().await;
    if !guard.focus_is_pending() {
        guard.handshake.stop_poll();
        return;
    }
    if guard.handshake.is_polling() {
        return;
    }
    let Some(question_id) = guard.focused_question_id() else {
        return;
    };

    let generation = guard.handshake.next_generation();
    let handle = tokio::spawn(poll_loop(
        engine.clone(),
        guard.store(),
        guard.participant_id().to_string(),
        question_id,
        generation,
        guard.poll_interval(),
    ));
    guard.handshake.begin_poll(handle);
}

/// Polls the Progress Store until the record leaves `pending`, then hands
/// the observed status to the engine exactly once. A superseded loop exits
/// without applying anything.
async fn poll_loop(
    engine: Arc<Mutex<ParticipantEngine>>,
    store: Arc<dyn ProgressStore>,
    participant_id: String,
    question_id: String,
    generation: u64,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;

        let observed = match store.get(&participant_id, &question_id).await {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("Verdict poll read failed for {}: {}", question_id, e);
                continue;
            }
        };
        if observed.status == QuestionStatus::Pending {
            continue;
        }

        let outcome = {
            let mut guard = engine.lock().await;
            if guard.handshake.generation() != generation {
                // Superseded by a newer loop; it owns the verdict now.
                return;
            }
            match guard.absorb_verdict(&question_id, observed).await {
                Ok(outcome) => {
                    guard.handshake.finish_poll(generation);
                    outcome
                }
                Err(e) => {
                    // Keep polling; the next observation retries the write.
                    tracing::error!("Failed to apply verdict for {}: {}", question_id, e);
                    continue;
                }
            }
        };

        if outcome == VerdictOutcome::Wrong {
            ensure_ticker(&engine).await;
        }
        return;
    }
}
