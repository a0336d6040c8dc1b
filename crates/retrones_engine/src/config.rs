use typed_builder::TypedBuilder;

use crate::facade::SystemMode;

/// How often the running loop asks debugger views to refresh.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum DebuggerUpdateRate {
    /// Only on pause, reset and breakpoints.
    Off,
    /// Every `n` emulated frames.
    EveryFrames(u32),
    /// Once per emulated second (60 frames on NTSC, 50 on PAL).
    #[default]
    MatchSystem,
}

impl DebuggerUpdateRate {
    pub fn frames(self, mode: SystemMode) -> u32 {
        match self {
            DebuggerUpdateRate::Off => 0,
            DebuggerUpdateRate::EveryFrames(frames) => frames,
            DebuggerUpdateRate::MatchSystem => mode.frames_per_second(),
        }
    }
}

#[derive(Clone, Debug, TypedBuilder)]
pub struct EngineConfig {
    #[builder(default)]
    pub debugger_update_rate: DebuggerUpdateRate,
    /// Park the simulation after each produced audio buffer until the audio
    /// device has consumed one. This is what paces emulation to real time.
    #[builder(default = true)]
    pub audio_sync: bool,
    /// Samples per audio device callback.
    #[builder(default = 1024)]
    pub audio_buffer_samples: usize,
    #[builder(default = "retrones-engine".to_string())]
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
