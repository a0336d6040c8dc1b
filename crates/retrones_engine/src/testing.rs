//! Scripted stand-ins for the simulation and the debug info, shared by the
//! unit tests of every module.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use retrones_common::Buttons;

use crate::cartridge::Mirroring;
use crate::debuginfo::DebugInfoResolver;
use crate::facade::{CpuRegister, SimulationFacade, SimulationHooks};
use crate::MEM_64KB;

/// Poll `cond` until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Facade calls worth asserting on. Per-frame traffic (`run_frame`,
/// `enable_breakpoints`) is tracked as state instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Call {
    SetGotoAddress(u32),
    StepCpu,
    StepScanline,
    StepFrame,
    Reset(bool),
    ResetInitial(u16),
    UnloadRom,
    LoadPrgBank(usize),
    LoadChrBank(usize),
    FinishRomLoad,
    SetMirroring(Mirroring),
    SetFourScreen,
    ClearOpcodeMasks,
    RequestBreak,
    Disassemble,
}

struct FakeState {
    pc: u16,
    prg: HashMap<u16, u8>,
    sram: Vec<u8>,
    calls: Vec<Call>,
    opcode_masks: HashMap<u32, bool>,
    breakpoints_enabled: bool,
    step_armed: bool,
    queued_breakpoints: usize,
    delayed_breakpoint: Option<Duration>,
    frames: u64,
    controllers: [Buttons; 2],
    audio_per_frame: Option<Vec<i16>>,
}

pub(crate) struct FakeSimulation {
    state: Mutex<FakeState>,
    hooks: Mutex<Option<Arc<dyn SimulationHooks>>>,
    in_hook: AtomicUsize,
    mid_frame: AtomicBool,
}

impl FakeSimulation {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                pc: 0,
                prg: HashMap::new(),
                sram: vec![0; MEM_64KB],
                calls: Vec::new(),
                opcode_masks: HashMap::new(),
                breakpoints_enabled: false,
                step_armed: false,
                queued_breakpoints: 0,
                delayed_breakpoint: None,
                frames: 0,
                controllers: [Buttons::empty(); 2],
                audio_per_frame: None,
            }),
            hooks: Mutex::new(None),
            in_hook: AtomicUsize::new(0),
            mid_frame: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    pub(crate) fn set_pc(&self, pc: u16) {
        self.state().pc = pc;
    }

    pub(crate) fn pc(&self) -> u16 {
        self.state().pc
    }

    pub(crate) fn set_prg_byte(&self, addr: u16, value: u8) {
        self.state().prg.insert(addr, value);
    }

    /// Replace SRAM with `content`, zero-filled to 64 KiB.
    pub(crate) fn fill_sram(&self, content: &[u8]) {
        let mut sram = content.to_vec();
        sram.resize(MEM_64KB, 0);
        self.state().sram = sram;
    }

    pub(crate) fn sram_snapshot(&self) -> Vec<u8> {
        self.state().sram.clone()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub(crate) fn opcode_mask(&self, absolute: u32) -> Option<bool> {
        self.state().opcode_masks.get(&absolute).copied()
    }

    pub(crate) fn opcode_mask_count(&self) -> usize {
        self.state().opcode_masks.len()
    }

    pub(crate) fn breakpoints_enabled(&self) -> bool {
        self.state().breakpoints_enabled
    }

    pub(crate) fn frames(&self) -> u64 {
        self.state().frames
    }

    pub(crate) fn controllers(&self) -> [Buttons; 2] {
        self.state().controllers
    }

    /// Fire a breakpoint in each of the next `count` frames run with
    /// breakpoints enabled.
    pub(crate) fn queue_breakpoints(&self, count: usize) {
        self.state().queued_breakpoints += count;
    }

    /// In the next frame run with breakpoints enabled, spend `delay` inside
    /// the frame and then fire a breakpoint.
    pub(crate) fn queue_delayed_breakpoint(&self, delay: Duration) {
        self.state().delayed_breakpoint = Some(delay);
    }

    /// Whether a frame is waiting out a delayed breakpoint.
    pub(crate) fn is_mid_frame(&self) -> bool {
        self.mid_frame.load(Ordering::Acquire)
    }

    /// Hand `samples` to the audio hook at the end of every frame.
    pub(crate) fn set_audio_per_frame(&self, samples: Vec<i16>) {
        self.state().audio_per_frame = Some(samples);
    }

    /// Whether the simulation thread is currently inside a hook.
    pub(crate) fn in_hook(&self) -> bool {
        self.in_hook.load(Ordering::Acquire) > 0
    }

    fn call_hook(&self, call: impl FnOnce(&dyn SimulationHooks)) {
        let hooks = self.hooks.lock().unwrap().clone();
        if let Some(hooks) = hooks {
            self.in_hook.fetch_add(1, Ordering::AcqRel);
            call(hooks.as_ref());
            self.in_hook.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl SimulationFacade for FakeSimulation {
    fn install_hooks(&self, hooks: Arc<dyn SimulationHooks>) {
        *self.hooks.lock().unwrap() = Some(hooks);
    }

    fn cpu_register(&self, register: CpuRegister) -> u16 {
        match register {
            CpuRegister::Pc => self.state().pc,
            CpuRegister::Sp => 0xFD,
            _ => 0,
        }
    }

    fn cpu_memory(&self, addr: u16) -> u8 {
        addr as u8
    }

    fn ppu_register(&self, addr: u16) -> u8 {
        addr as u8
    }

    fn ppu_memory(&self, addr: u16) -> u8 {
        (addr >> 8) as u8
    }

    fn ppu_oam(&self, index: usize) -> u8 {
        index as u8
    }

    fn apu_register(&self, addr: u16) -> u8 {
        addr as u8
    }

    fn sram(&self, index: usize) -> u8 {
        self.state().sram[index]
    }

    fn set_sram(&self, index: usize, value: u8) {
        self.state().sram[index] = value;
    }

    fn exram(&self, addr: u16) -> u8 {
        addr as u8
    }

    fn prg_rom_byte(&self, addr: u16) -> u8 {
        self.state().prg.get(&addr).copied().unwrap_or(0)
    }

    fn absolute_address(&self, addr: u16) -> u32 {
        addr as u32
    }

    fn unload_rom(&self) {
        self.record(Call::UnloadRom);
    }

    fn load_prg_rom_bank(&self, bank: usize, _data: &[u8]) {
        self.record(Call::LoadPrgBank(bank));
    }

    fn load_chr_rom_bank(&self, bank: usize, _data: &[u8]) {
        self.record(Call::LoadChrBank(bank));
    }

    fn finish_rom_load(&self) {
        self.record(Call::FinishRomLoad);
    }

    fn set_mirroring(&self, mirroring: Mirroring) {
        self.record(Call::SetMirroring(mirroring));
    }

    fn set_four_screen(&self) {
        self.record(Call::SetFourScreen);
    }

    fn clear_opcode_masks(&self) {
        let mut state = self.state();
        state.opcode_masks.clear();
        state.calls.push(Call::ClearOpcodeMasks);
    }

    fn set_opcode_mask(&self, absolute: u32, is_opcode: bool) {
        self.state().opcode_masks.insert(absolute, is_opcode);
    }

    fn reset_initial(&self, mapper: u16) {
        self.record(Call::ResetInitial(mapper));
    }

    fn reset(&self, soft: bool) {
        self.record(Call::Reset(soft));
    }

    fn enable_breakpoints(&self, enabled: bool) {
        self.state().breakpoints_enabled = enabled;
    }

    fn set_goto_address(&self, addr: u32) {
        let mut state = self.state();
        state.step_armed = true;
        state.calls.push(Call::SetGotoAddress(addr));
    }

    fn step_cpu(&self) {
        let mut state = self.state();
        state.step_armed = true;
        state.calls.push(Call::StepCpu);
    }

    fn step_scanline(&self) {
        let mut state = self.state();
        state.step_armed = true;
        state.calls.push(Call::StepScanline);
    }

    fn step_frame(&self) {
        let mut state = self.state();
        state.step_armed = true;
        state.calls.push(Call::StepFrame);
    }

    fn run_frame(&self, controllers: [Buttons; 2]) {
        let (breaks, delayed, audio) = {
            let mut state = self.state();
            state.frames += 1;
            state.controllers = controllers;
            let mut breaks = 0;
            let mut delayed = None;
            if state.breakpoints_enabled {
                delayed = state.delayed_breakpoint.take();
                if state.step_armed {
                    state.step_armed = false;
                    breaks += 1;
                }
                if state.queued_breakpoints > 0 {
                    state.queued_breakpoints -= 1;
                    breaks += 1;
                }
            }
            (breaks, delayed, state.audio_per_frame.clone())
        };

        if let Some(delay) = delayed {
            self.mid_frame.store(true, Ordering::Release);
            thread::sleep(delay);
            self.mid_frame.store(false, Ordering::Release);
            self.call_hook(|hooks| hooks.breakpoint_hit());
        }
        for _ in 0..breaks {
            self.call_hook(|hooks| hooks.breakpoint_hit());
        }
        if let Some(samples) = audio {
            self.call_hook(|hooks| hooks.audio_samples_ready(&samples));
        }

        thread::sleep(Duration::from_millis(1));
    }

    fn request_break(&self) {
        self.record(Call::RequestBreak);
    }

    fn disassemble(&self) {
        self.record(Call::Disassemble);
    }
}

/// Debug info answering from a fixed table.
#[derive(Default)]
pub(crate) struct ScriptedDebugInfo {
    lines: HashMap<u16, u32>,
    opcodes: HashSet<u32>,
}

impl ScriptedDebugInfo {
    /// The source line containing `pc` ends at `end`.
    pub(crate) fn with_line(mut self, pc: u16, end: u32) -> Self {
        self.lines.insert(pc, end);
        self
    }

    pub(crate) fn with_opcode(mut self, absolute: u32) -> Self {
        self.opcodes.insert(absolute);
        self
    }
}

impl DebugInfoResolver for ScriptedDebugInfo {
    fn line_end_address(&self, pc: u16, _absolute: u32) -> Option<u32> {
        self.lines.get(&pc).copied()
    }

    fn is_opcode_at(&self, absolute: u32) -> bool {
        self.opcodes.contains(&absolute)
    }
}
