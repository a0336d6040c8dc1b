use std::sync::Arc;

use retrones_common::Buttons;

use crate::cartridge::Mirroring;

/// 6502 registers exposed by the simulation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CpuRegister {
    Pc,
    Sp,
    A,
    X,
    Y,
    F,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SystemMode {
    #[default]
    Ntsc,
    Pal,
}

impl SystemMode {
    pub const fn frames_per_second(self) -> u32 {
        match self {
            SystemMode::Ntsc => 60,
            SystemMode::Pal => 50,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ControllerPort {
    One,
    Two,
}

impl ControllerPort {
    pub const fn index(self) -> usize {
        match self {
            ControllerPort::One => 0,
            ControllerPort::Two => 1,
        }
    }
}

/// Callbacks the simulation invokes from inside `run_frame`.
///
/// Both calls may block the calling (scheduling) thread: a breakpoint hit
/// parks it until the debugger resumes, and a finished audio buffer parks it
/// until the audio device asks for more.
pub trait SimulationHooks: Send + Sync {
    fn breakpoint_hit(&self);
    fn audio_samples_ready(&self, samples: &[i16]);
}

/// Black-box NES hardware simulation driven by the engine.
///
/// All methods take `&self`: the UI thread inspects registers and arms
/// stepping while the scheduling thread may be parked inside `run_frame`, so
/// implementations synchronise internally. They must not hold any internal
/// lock while calling into [`SimulationHooks`].
pub trait SimulationFacade: Send + Sync + 'static {
    fn install_hooks(&self, hooks: Arc<dyn SimulationHooks>);

    fn cpu_register(&self, register: CpuRegister) -> u16;
    /// Internal 2 KiB work RAM, `0x0000..0x0800`.
    fn cpu_memory(&self, addr: u16) -> u8;
    fn ppu_register(&self, addr: u16) -> u8;
    fn ppu_memory(&self, addr: u16) -> u8;
    fn ppu_oam(&self, index: usize) -> u8;
    fn apu_register(&self, addr: u16) -> u8;
    /// Physical cartridge SRAM byte, `0..0x10000`.
    fn sram(&self, index: usize) -> u8;
    fn set_sram(&self, index: usize, value: u8);
    fn exram(&self, addr: u16) -> u8;
    /// Byte currently mapped at a CPU address in PRG-ROM space.
    fn prg_rom_byte(&self, addr: u16) -> u8;
    /// Translate a CPU address to an absolute PRG-ROM offset through the
    /// current mapper banking.
    fn absolute_address(&self, addr: u16) -> u32;

    fn unload_rom(&self);
    fn load_prg_rom_bank(&self, bank: usize, data: &[u8]);
    fn load_chr_rom_bank(&self, bank: usize, data: &[u8]);
    /// Mapper fixups once every bank is in place.
    fn finish_rom_load(&self);
    fn set_mirroring(&self, mirroring: Mirroring);
    fn set_four_screen(&self);
    fn clear_opcode_masks(&self);
    fn set_opcode_mask(&self, absolute: u32, is_opcode: bool);

    /// Power-on reset after a cartridge load.
    fn reset_initial(&self, mapper: u16);
    fn reset(&self, soft: bool);
    fn enable_breakpoints(&self, enabled: bool);

    /// Break once the program counter reaches `addr`.
    fn set_goto_address(&self, addr: u32);
    /// Break after the next instruction.
    fn step_cpu(&self);
    /// Break after the next scanline.
    fn step_scanline(&self);
    /// Break after the next frame.
    fn step_frame(&self);

    /// Emulate one video frame with the given controller state.
    fn run_frame(&self, controllers: [Buttons; 2]);

    fn request_break(&self) {}

    fn disassemble(&self) {}

    fn is_debuggable(&self) -> bool {
        true
    }

    fn system_mode(&self) -> SystemMode {
        SystemMode::Ntsc
    }
}
