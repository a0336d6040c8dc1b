/// Observable phase of the engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Starting,
    Running,
    Resetting,
    Paused,
    Terminating,
}

/// Everything the command entry points and the scheduling loop agree on.
///
/// Always accessed under the engine's flags lock.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionFlags {
    pub starting: bool,
    pub running: bool,
    pub paused: bool,
    pub resetting: bool,
    pub terminating: bool,
    pub soft_reset: bool,
    pub show_on_pause: bool,
    /// Frames left before a forced pause; `None` when disabled.
    pub pause_after_frames: Option<u32>,
    /// Frames left before the next periodic debugger refresh.
    pub debug_frame_countdown: u32,
    /// Set while a scheduling thread owns these flags.
    pub(super) loop_active: bool,
    /// The last transition performed was a pause.
    pub(super) halted: bool,
}

/// The single transition a scheduling quantum performs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(super) enum Quantum {
    Start,
    Reset { soft: bool },
    Pause { show: bool, after_frames: bool },
    Frame,
}

impl ExecutionFlags {
    pub fn state(&self) -> ExecutionState {
        if self.terminating {
            ExecutionState::Terminating
        } else if self.resetting {
            ExecutionState::Resetting
        } else if self.starting {
            ExecutionState::Starting
        } else if self.running {
            ExecutionState::Running
        } else if self.paused || self.halted {
            ExecutionState::Paused
        } else {
            ExecutionState::Idle
        }
    }

    /// Whether the loop still has work to do.
    pub(super) fn has_work(&self) -> bool {
        !self.terminating && (self.starting || self.running || self.resetting || self.paused)
    }

    /// Pick the next quantum and update the flags for it.
    ///
    /// Returns `None` once the loop should exit.
    pub(super) fn next_quantum(&mut self) -> Option<Quantum> {
        if !self.has_work() {
            return None;
        }

        if self.starting {
            self.starting = false;
            self.running = true;
            self.paused = false;
            self.halted = false;
            Some(Quantum::Start)
        } else if self.resetting {
            self.resetting = false;
            Some(Quantum::Reset {
                soft: self.soft_reset,
            })
        } else if self.paused || self.pause_after_frames == Some(0) {
            let after_frames = self.pause_after_frames == Some(0);
            if after_frames {
                self.pause_after_frames = None;
            }
            self.paused = false;
            self.running = false;
            self.halted = true;
            Some(Quantum::Pause {
                show: self.show_on_pause,
                after_frames,
            })
        } else {
            Some(Quantum::Frame)
        }
    }

    /// Bookkeeping after a frame ran. Returns `true` when debugger views are
    /// due for a refresh.
    pub(super) fn frame_completed(&mut self, update_rate: u32) -> bool {
        if let Some(frames) = self.pause_after_frames.as_mut() {
            *frames = frames.saturating_sub(1);
        }

        self.debug_frame_countdown = self.debug_frame_countdown.saturating_sub(1);
        if self.debug_frame_countdown == 0 && update_rate > 0 {
            self.debug_frame_countdown = update_rate;
            true
        } else {
            false
        }
    }
}
