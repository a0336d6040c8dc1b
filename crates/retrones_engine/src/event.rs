use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Notification sent from the engine to its observers (usually the UI).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineEvent {
    /// The scheduling loop switched from starting to running.
    Started,
    /// A soft or hard reset finished.
    Reset,
    /// Execution stopped. `show` asks the UI to bring the emulator view to
    /// the front.
    Paused { show: bool },
    /// The frame countdown armed by `pause_after_frames` expired.
    PausedAfterFrames,
    /// One simulated frame completed.
    FrameCompleted,
    /// Register, memory and disassembly views should refresh.
    DebuggersShouldUpdate,
    /// The simulation stopped at a breakpoint and is blocked until resumed.
    BreakpointHit,
    /// A cartridge was loaded and the machine was reset.
    MachineReady,
}

/// Fan-out of engine events to any number of subscribers.
///
/// Every subscriber owns its own channel, so each observer sees events in
/// the order they were emitted. Emission happens under a single lock so
/// events raised from different threads are still totally ordered.
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    pub fn emit(&self, event: EngineEvent) {
        log::trace!("Engine event: {:?}", event);
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Observers that hung up are dropped.
        subscribers.retain(|sender| sender.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
