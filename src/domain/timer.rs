pub const WORK_SECONDS: u32 = 25 * 60;
pub const BREAK_SECONDS: u32 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Work,
    Break,
}

impl TimerMode {
    pub fn default_seconds(self) -> u32 {
        match self {
            Self::Work => WORK_SECONDS,
            Self::Break => BREAK_SECONDS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "WORK",
            Self::Break => "BREAK",
        }
    }
}

/// Outcome of advancing the timer by one second. The caller owns the
/// side effects: a completed work interval is the only event that emits
/// a session record and XP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer not running or already at zero; nothing changed.
    Idle,
    Ticked,
    WorkCompleted { quest_id: Option<String> },
    BreakCompleted,
}

/// Two-mode countdown driven entirely by external events. The machine
/// never schedules anything itself, so tests can step it with a loop
/// instead of a clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomodoroTimer {
    mode: TimerMode,
    remaining_seconds: u32,
    running: bool,
    linked_quest_id: Option<String>,
}

impl PomodoroTimer {
    pub fn new() -> Self {
        Self {
            mode: TimerMode::Work,
            remaining_seconds: WORK_SECONDS,
            running: false,
            linked_quest_id: None,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn linked_quest_id(&self) -> Option<&str> {
        self.linked_quest_id.as_deref()
    }

    /// Start/pause flip. Remaining time is never touched here.
    pub fn toggle(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    pub fn link_quest(&mut self, quest_id: Option<String>) {
        self.linked_quest_id = quest_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
    }

    /// Advances one second. Hitting zero stops the timer, flips the mode,
    /// and reloads the new mode's default duration.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.remaining_seconds == 0 {
            return TickOutcome::Idle;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds > 0 {
            return TickOutcome::Ticked;
        }

        self.running = false;
        match self.mode {
            TimerMode::Work => {
                self.mode = TimerMode::Break;
                self.remaining_seconds = BREAK_SECONDS;
                TickOutcome::WorkCompleted {
                    quest_id: self.linked_quest_id.clone(),
                }
            }
            TimerMode::Break => {
                self.mode = TimerMode::Work;
                self.remaining_seconds = WORK_SECONDS;
                TickOutcome::BreakCompleted
            }
        }
    }

    /// Stops and restores the current mode's default without changing
    /// mode or emitting anything.
    pub fn reset(&mut self) {
        self.running = false;
        self.remaining_seconds = self.mode.default_seconds();
    }

    pub fn switch_mode(&mut self, target: TimerMode) {
        self.running = false;
        self.mode = target;
        self.remaining_seconds = target.default_seconds();
    }
}

impl Default for PomodoroTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_in_work_mode() {
        let timer = PomodoroTimer::new();
        assert_eq!(timer.mode(), TimerMode::Work);
        assert_eq!(timer.remaining_seconds(), WORK_SECONDS);
        assert!(!timer.is_running());
    }

    #[test]
    fn tick_is_a_no_op_while_paused() {
        let mut timer = PomodoroTimer::new();
        assert_eq!(timer.tick(), TickOutcome::Idle);
        assert_eq!(timer.remaining_seconds(), WORK_SECONDS);
    }

    #[test]
    fn toggle_flips_running_without_touching_time() {
        let mut timer = PomodoroTimer::new();
        assert!(timer.toggle());
        timer.tick();
        let remaining = timer.remaining_seconds();
        assert!(!timer.toggle());
        assert_eq!(timer.remaining_seconds(), remaining);
    }

    #[test]
    fn work_expiry_emits_exactly_one_completion_and_enters_break() {
        let mut timer = PomodoroTimer::new();
        timer.link_quest(Some("qst-1".to_string()));
        timer.toggle();

        let mut completions = 0;
        for _ in 0..WORK_SECONDS {
            if let TickOutcome::WorkCompleted { quest_id } = timer.tick() {
                completions += 1;
                assert_eq!(quest_id.as_deref(), Some("qst-1"));
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(timer.mode(), TimerMode::Break);
        assert_eq!(timer.remaining_seconds(), BREAK_SECONDS);
        assert!(!timer.is_running());
        assert_eq!(timer.tick(), TickOutcome::Idle);
    }

    #[test]
    fn break_expiry_returns_to_work_without_a_session() {
        let mut timer = PomodoroTimer::new();
        timer.switch_mode(TimerMode::Break);
        timer.toggle();

        let mut outcome = TickOutcome::Idle;
        for _ in 0..BREAK_SECONDS {
            outcome = timer.tick();
        }

        assert_eq!(outcome, TickOutcome::BreakCompleted);
        assert_eq!(timer.mode(), TimerMode::Work);
        assert_eq!(timer.remaining_seconds(), WORK_SECONDS);
        assert!(!timer.is_running());
    }

    #[test]
    fn reset_restores_current_mode_default() {
        let mut timer = PomodoroTimer::new();
        timer.toggle();
        for _ in 0..90 {
            timer.tick();
        }
        timer.reset();
        assert!(!timer.is_running());
        assert_eq!(timer.mode(), TimerMode::Work);
        assert_eq!(timer.remaining_seconds(), WORK_SECONDS);
    }

    #[test]
    fn switch_mode_stops_and_reloads_target_duration() {
        let mut timer = PomodoroTimer::new();
        timer.toggle();
        timer.tick();
        timer.switch_mode(TimerMode::Break);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining_seconds(), BREAK_SECONDS);

        timer.switch_mode(TimerMode::Work);
        assert_eq!(timer.remaining_seconds(), WORK_SECONDS);
    }

    #[test]
    fn link_quest_normalizes_blank_ids() {
        let mut timer = PomodoroTimer::new();
        timer.link_quest(Some("  ".to_string()));
        assert_eq!(timer.linked_quest_id(), None);
        timer.link_quest(Some(" qst-7 ".to_string()));
        assert_eq!(timer.linked_quest_id(), Some("qst-7"));
        timer.link_quest(None);
        assert_eq!(timer.linked_quest_id(), None);
    }
}
