//! The execution engine: command entry points for the UI and the scheduling
//! thread that drives the simulation one frame at a time.
//!
//! Commands only flip flags and make sure a scheduling thread is alive; the
//! thread picks the flags up at its next quantum. The thread exits on its
//! own once there is nothing left to do and is spawned again by the next
//! command that needs it.

mod flags;
mod schedule;

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use retrones_common::Buttons;

use crate::bridge::HookBridge;
use crate::cartridge::CartridgeImage;
use crate::config::EngineConfig;
use crate::debuginfo::DebugInfoResolver;
use crate::event::{EngineEvent, Notifier};
use crate::facade::{ControllerPort, SimulationFacade};
use crate::marker::MarkerSet;
use crate::savestate::{self, SaveStateDocument, SramLoad};
use crate::stepping::{self, StepRequest};

pub use flags::{ExecutionFlags, ExecutionState};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the engine handle and its scheduling thread.
struct Shared<F> {
    facade: Arc<F>,
    resolver: Arc<dyn DebugInfoResolver>,
    bridge: Arc<HookBridge>,
    notifier: Arc<Notifier>,
    config: EngineConfig,
    flags: Mutex<ExecutionFlags>,
    controllers: Mutex<[Buttons; 2]>,
    /// Cartridge waiting for the next reset to load it.
    cartridge: Mutex<Option<Arc<CartridgeImage>>>,
    save_file: Mutex<Option<PathBuf>>,
    markers: Arc<Mutex<MarkerSet>>,
}

pub struct Engine<F: SimulationFacade> {
    shared: Arc<Shared<F>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<F: SimulationFacade> Engine<F> {
    /// Wrap `facade` and install the hook bridge into it.
    pub fn new(facade: Arc<F>, resolver: Arc<dyn DebugInfoResolver>, config: EngineConfig) -> Self {
        let notifier = Arc::new(Notifier::new());
        let bridge = Arc::new(HookBridge::new(Arc::clone(&notifier), &config));
        facade.install_hooks(bridge.clone());

        log::debug!(
            "Engine created: audio sync {}, {} samples per buffer, debugger updates {:?}",
            config.audio_sync,
            config.audio_buffer_samples,
            config.debugger_update_rate
        );

        Self {
            shared: Arc::new(Shared {
                facade,
                resolver,
                bridge,
                notifier,
                config,
                flags: Mutex::new(ExecutionFlags::default()),
                controllers: Mutex::new([Buttons::empty(); 2]),
                cartridge: Mutex::new(None),
                save_file: Mutex::new(None),
                markers: Arc::new(Mutex::new(MarkerSet::new())),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.shared.notifier.subscribe()
    }

    pub fn facade(&self) -> &Arc<F> {
        &self.shared.facade
    }

    pub fn bridge(&self) -> &Arc<HookBridge> {
        &self.shared.bridge
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Timing markers. The simulation side feeds them; the engine zeroes
    /// them on every reset.
    pub fn markers(&self) -> Arc<Mutex<MarkerSet>> {
        Arc::clone(&self.shared.markers)
    }

    pub fn state(&self) -> ExecutionState {
        lock(&self.shared.flags).state()
    }

    pub fn flags(&self) -> ExecutionFlags {
        lock(&self.shared.flags).clone()
    }

    pub fn is_at_breakpoint(&self) -> bool {
        self.shared.bridge.is_at_breakpoint()
    }

    pub fn controller(&self, port: ControllerPort) -> Buttons {
        lock(&self.shared.controllers)[port.index()]
    }

    /// Run one command against the flags, then make sure a scheduling thread
    /// is there to act on them.
    fn command(&self, name: &str, update: impl FnOnce(&mut ExecutionFlags)) {
        let mut flags = lock(&self.shared.flags);
        if flags.terminating {
            log::warn!("Ignoring {} on a killed engine", name);
            return;
        }
        log::debug!("Command: {}", name);
        update(&mut *flags);
        self.ensure_loop(&mut *flags);
    }

    /// Spawn the scheduling thread unless one is already running or there is
    /// nothing for it to do. Called with the flags lock held, so the check
    /// cannot race with a thread that is about to exit.
    fn ensure_loop(&self, flags: &mut ExecutionFlags) {
        if flags.loop_active || !flags.has_work() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || shared.run_loop());

        match spawned {
            Ok(handle) => {
                flags.loop_active = true;
                *lock(&self.worker) = Some(handle);
            }
            Err(err) => log::error!("Failed to spawn scheduling thread: {err}"),
        }
    }

    pub fn start(&self) {
        self.command("start", |flags| {
            flags.starting = true;
            self.shared.bridge.release_breakpoint();
        });
    }

    pub fn pause(&self, show: bool) {
        self.command("pause", |flags| {
            flags.starting = false;
            flags.running = false;
            flags.paused = true;
            flags.show_on_pause = show;
        });
    }

    pub fn soft_reset(&self) {
        self.reset("soft reset", true);
    }

    pub fn hard_reset(&self) {
        self.reset("hard reset", false);
    }

    fn reset(&self, name: &str, soft: bool) {
        self.command(name, |flags| {
            self.shared.facade.enable_breakpoints(false);
            flags.resetting = true;
            flags.soft_reset = soft;
            flags.starting = false;
            flags.running = false;
            flags.paused = true;
            flags.show_on_pause = false;
            self.shared.bridge.release_breakpoint();
        });
    }

    pub fn step_instruction(&self) {
        self.step("step instruction", stepping::step_into);
    }

    pub fn step_over(&self) {
        self.step("step over", stepping::step_over);
    }

    pub fn step_out(&self) {
        self.step("step out", stepping::step_out);
    }

    pub fn step_scanline(&self) {
        self.step("step scanline", |_, _| StepRequest::Scanline);
    }

    pub fn step_frame(&self) {
        self.step("step frame", |_, _| StepRequest::Frame);
    }

    /// Arm the simulation for one step and let it run until the step
    /// breaks back in.
    fn step(&self, name: &str, policy: fn(&F, &dyn DebugInfoResolver) -> StepRequest) {
        self.command(name, |flags| {
            let facade = self.shared.facade.as_ref();
            policy(facade, self.shared.resolver.as_ref()).apply(facade);
            flags.starting = true;
            flags.paused = false;
            self.shared.bridge.release_breakpoint();
        });
    }

    /// Pause once `frames` more frames have run. Zero disarms the countdown.
    pub fn pause_after_frames(&self, frames: u32) {
        self.command("pause after frames", |flags| {
            flags.pause_after_frames = (frames > 0).then_some(frames);
        });
    }

    /// Queue a cartridge to be loaded by the next reset.
    pub fn prime(&self, cartridge: Arc<CartridgeImage>) {
        if lock(&self.shared.flags).terminating {
            log::warn!("Ignoring cartridge on a killed engine");
            return;
        }
        log::debug!(
            "Primed cartridge: {} PRG banks, {} CHR banks, mapper {}",
            cartridge.prg_rom_banks().len(),
            cartridge.chr_rom_banks().len(),
            cartridge.mapper()
        );
        *lock(&self.shared.cartridge) = Some(cartridge);
        self.shared.facade.clear_opcode_masks();
    }

    pub fn set_controller(&self, port: ControllerPort, buttons: Buttons) {
        lock(&self.shared.controllers)[port.index()] = buttons;
    }

    /// Raw SRAM file restored whenever a cartridge finishes loading.
    pub fn set_save_file(&self, path: Option<PathBuf>) {
        *lock(&self.shared.save_file) = path;
    }

    pub fn adjust_audio(&self, buffer_samples: usize) {
        self.shared.bridge.adjust_audio(buffer_samples);
    }

    pub fn serialize_state(&self) -> SaveStateDocument {
        SaveStateDocument::capture(self.shared.facade.as_ref())
    }

    /// Restore what a save state can restore and refresh the debuggers.
    pub fn deserialize_state(&self, document: &SaveStateDocument) -> bool {
        let restored = document.restore(self.shared.facade.as_ref());
        self.shared.notifier.emit(EngineEvent::DebuggersShouldUpdate);
        restored
    }

    pub fn save_sram<W: Write>(&self, writer: W) -> Result<()> {
        savestate::write_raw_sram(self.shared.facade.as_ref(), writer)
    }

    pub fn load_sram<R: Read>(&self, reader: R) -> Result<SramLoad> {
        savestate::read_raw_sram(self.shared.facade.as_ref(), reader)
    }

    /// Stop the engine for good.
    ///
    /// Blocks until the scheduling thread is gone, forcing both gates open
    /// for as long as it takes. Returns the number of release rounds that
    /// were needed.
    pub fn kill(&self) -> usize {
        {
            let mut flags = lock(&self.shared.flags);
            if flags.terminating {
                return 0;
            }
            self.shared.facade.enable_breakpoints(false);
            flags.starting = false;
            flags.running = false;
            flags.paused = false;
            flags.show_on_pause = false;
            flags.terminating = true;
        }
        log::info!("Stopping engine");
        self.shared.bridge.shutdown();

        let Some(handle) = lock(&self.worker).take() else {
            return 0;
        };

        let mut rounds = 0;
        while !handle.is_finished() {
            self.shared.bridge.release_for_shutdown();
            rounds += 1;
            thread::yield_now();
        }
        if handle.join().is_err() {
            log::error!("Scheduling thread panicked");
        }
        log::debug!("Scheduling thread joined after {} release rounds", rounds);
        rounds
    }
}

impl<F: SimulationFacade> Drop for Engine<F> {
    fn drop(&mut self) {
        self.kill();
    }
}
