use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::EngineConfig;
use crate::event::{EngineEvent, Notifier};
use crate::facade::SimulationHooks;
use crate::gate::Gate;

/// Buffers kept queued between the simulation and the audio device.
const AUDIO_QUEUE_BUFFERS: usize = 4;

struct AudioQueue {
    samples: VecDeque<i16>,
    capacity: usize,
    underruns: u64,
}

impl AudioQueue {
    fn new(buffer_samples: usize) -> Self {
        let capacity = buffer_samples.max(1) * AUDIO_QUEUE_BUFFERS;
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            underruns: 0,
        }
    }
}

/// The only channel between the simulation thread and the rest of the
/// engine.
///
/// Breakpoints park the simulation on one gate, finished audio buffers park
/// it on another; the engine and the audio device release them. Both gates
/// are counting semaphores owned by this instance.
pub struct HookBridge {
    notifier: Arc<Notifier>,
    breakpoint_gate: Gate,
    audio_gate: Gate,
    audio: Mutex<AudioQueue>,
    audio_suspended: AtomicBool,
    audio_sync: bool,
}

impl HookBridge {
    pub fn new(notifier: Arc<Notifier>, config: &EngineConfig) -> Self {
        Self {
            notifier,
            breakpoint_gate: Gate::new(),
            audio_gate: Gate::new(),
            audio: Mutex::new(AudioQueue::new(config.audio_buffer_samples)),
            audio_suspended: AtomicBool::new(false),
            audio_sync: config.audio_sync,
        }
    }

    fn audio(&self) -> MutexGuard<'_, AudioQueue> {
        self.audio.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Let a simulation parked at a breakpoint continue.
    ///
    /// A hit counts as pending from the moment `breakpoint_hit` is entered,
    /// so a release reacting to `BreakpointHit` is never lost. With no hit
    /// pending this does nothing and returns `false`.
    pub fn release_breakpoint(&self) -> bool {
        self.breakpoint_gate.release_expected()
    }

    /// Throw away any release credit left over from a forced shutdown
    /// round so the next real breakpoint blocks.
    pub fn drain_breakpoint_credit(&self) {
        if self.breakpoint_gate.try_acquire() {
            log::trace!("Drained stale breakpoint credit");
        }
    }

    pub fn is_at_breakpoint(&self) -> bool {
        self.breakpoint_gate.waiting() > 0
    }

    pub fn is_waiting_for_audio(&self) -> bool {
        self.audio_gate.waiting() > 0
    }

    pub fn is_audio_suspended(&self) -> bool {
        self.audio_suspended.load(Ordering::Acquire)
    }

    /// Fill one audio device buffer.
    ///
    /// Called from the real-time audio callback. Only the sample queue lock
    /// is taken, and only for the copy. Underruns and breakpoint stops
    /// produce silence.
    pub fn on_audio_buffer_needed(&self, out: &mut [i16]) {
        if self.is_audio_suspended() {
            out.fill(0);
            return;
        }

        let wanted = out.len();
        {
            let mut audio = self.audio();
            if audio.samples.len() >= wanted {
                for (slot, sample) in out.iter_mut().zip(audio.samples.drain(..wanted)) {
                    *slot = sample;
                }
            } else {
                audio.underruns += 1;
                log::trace!(
                    "Audio underrun: wanted {} samples, {} buffered",
                    wanted,
                    audio.samples.len()
                );
                out.fill(0);
            }
        }

        self.audio_gate.release_if_unavailable();
    }

    /// Resize the sample queue for a new device buffer depth.
    pub fn adjust_audio(&self, buffer_samples: usize) {
        log::info!("Adjusting audio buffer to {} samples", buffer_samples);
        *self.audio() = AudioQueue::new(buffer_samples);
    }

    pub fn buffered_samples(&self) -> usize {
        self.audio().samples.len()
    }

    pub fn underruns(&self) -> u64 {
        self.audio().underruns
    }

    /// One forced-release round used while tearing the engine down.
    pub(crate) fn release_for_shutdown(&self) {
        self.breakpoint_gate.release_if_unavailable();
        self.audio_gate.release_if_unavailable();
    }

    /// Close both gates so nothing can park on them again.
    pub(crate) fn shutdown(&self) {
        self.audio_suspended.store(true, Ordering::Release);
        self.breakpoint_gate.close();
        self.audio_gate.close();
    }
}

impl SimulationHooks for HookBridge {
    fn breakpoint_hit(&self) {
        self.breakpoint_gate.expect();
        self.audio_suspended.store(true, Ordering::Release);
        self.notifier.emit(EngineEvent::BreakpointHit);

        self.breakpoint_gate.acquire_expected();

        if !self.breakpoint_gate.is_closed() {
            self.audio_suspended.store(false, Ordering::Release);
        }
    }

    fn audio_samples_ready(&self, samples: &[i16]) {
        {
            let mut audio = self.audio();
            let overflow = (audio.samples.len() + samples.len()).saturating_sub(audio.capacity);
            if overflow > 0 {
                let drop = overflow.min(audio.samples.len());
                audio.samples.drain(..drop);
            }
            let keep = samples.len().min(audio.capacity);
            audio.samples.extend(&samples[samples.len() - keep..]);
        }

        if self.audio_sync {
            self.audio_gate.acquire();
        }
    }
}
