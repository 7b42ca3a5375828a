use tokio::task::JoinHandle;

/// What a single 1-second tick produced. `Autosave` and `Expired` both carry
/// an obligation to persist; `Expired` fires at most once per loaded question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer not running (paused, expired, or nothing loaded).
    Idle,
    Ticked(u32),
    /// Periodic checkpoint: persist the carried remaining value.
    Autosave(u32),
    Expired,
}

/// Countdown state for the question currently in focus. The ticker task and
/// its generation counter live here, never in module-level state, so a
/// navigation can always cancel exactly the ticker it owns.
pub struct TimerEngine {
    question_id: Option<String>,
    remaining_seconds: u32,
    running: bool,
    expiry_fired: bool,
    autosave_interval: u32,
    ticks_since_save: u32,
    generation: u64,
    ticker: Option<JoinHandle<()>>,
}

impl TimerEngine {
    pub fn new(autosave_interval: u32) -> Self {
        Self {
            question_id: None,
            remaining_seconds: 0,
            running: false,
            expiry_fired: false,
            autosave_interval: autosave_interval.max(1),
            ticks_since_save: 0,
            generation: 0,
            ticker: None,
        }
    }

    /// Points the engine at a (new) focused question, taking over its
    /// persisted remaining time. Always lands paused; the previous ticker is
    /// cancelled so it cannot tick a question it no longer owns.
    pub fn load(&mut self, question_id: &str, remaining_seconds: u32) {
        self.cancel_ticker();
        self.question_id = Some(question_id.to_string());
        self.remaining_seconds = remaining_seconds;
        self.running = false;
        self.expiry_fired = remaining_seconds == 0;
        self.ticks_since_save = 0;
    }

    pub fn question_id(&self) -> Option<&str> {
        self.question_id.as_deref()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn resume(&mut self) {
        if self.remaining_seconds > 0 {
            self.running = true;
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.ticks_since_save = 0;
    }

    /// One cooperative tick. Decrements by exactly one second; clamped at
    /// zero, and the zero crossing reports `Expired` exactly once.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.remaining_seconds == 0 {
            return TickOutcome::Idle;
        }

        self.remaining_seconds -= 1;

        if self.remaining_seconds == 0 {
            self.running = false;
            self.ticks_since_save = 0;
            if self.expiry_fired {
                return TickOutcome::Idle;
            }
            self.expiry_fired = true;
            return TickOutcome::Expired;
        }

        self.ticks_since_save += 1;
        if self.ticks_since_save >= self.autosave_interval {
            self.ticks_since_save = 0;
            return TickOutcome::Autosave(self.remaining_seconds);
        }

        TickOutcome::Ticked(self.remaining_seconds)
    }

    /// Generation guard for ticker callbacks: a callback created for an older
    /// generation must be discarded even if its abort raced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Installs the ticker task handle, aborting any predecessor. At most one
    /// ticker per engine.
    pub fn set_ticker(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.ticker.replace(handle) {
            old.abort();
        }
    }

    pub fn cancel_ticker(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    /// Drops the handle without aborting; used by a ticker loop that is
    /// terminating on its own.
    pub fn clear_finished_ticker(&mut self) {
        self.ticker = None;
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}
