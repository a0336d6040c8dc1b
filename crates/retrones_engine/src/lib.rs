//! Execution engine for an NES debugger.
//!
//! The hardware simulation itself is a black box reached through
//! [`SimulationFacade`]. This crate owns everything wrapped around it: the
//! scheduling thread, the breakpoint and audio gates, stepping decisions,
//! save states and timing markers.

pub mod bridge;
pub mod cartridge;
pub mod config;
pub mod debuginfo;
pub mod engine;
pub mod event;
pub mod facade;
mod gate;
pub mod marker;
pub mod savestate;
pub mod stepping;

#[cfg(test)]
mod testing;

pub use bridge::HookBridge;
pub use cartridge::{CartridgeImage, Mirroring};
pub use config::{DebuggerUpdateRate, EngineConfig};
pub use debuginfo::{DebugInfoResolver, NoDebugInfo};
pub use engine::{Engine, ExecutionFlags, ExecutionState};
pub use event::{EngineEvent, Notifier};
pub use facade::{ControllerPort, CpuRegister, SimulationFacade, SimulationHooks, SystemMode};
pub use marker::{Marker, MarkerSet, MarkerState, Timestamp};
pub use savestate::{SaveStateDocument, SramLoad};
pub use stepping::StepRequest;

pub use retrones_common::Buttons;

pub const MEM_8B: usize = 0x8;
pub const MEM_32B: usize = 0x20;
pub const MEM_256B: usize = 0x100;
pub const MEM_1KB: usize = 0x400;
pub const MEM_2KB: usize = 0x800;
pub const MEM_8KB: usize = 0x2000;
pub const MEM_64KB: usize = 0x10000;

/// 6502 `JSR absolute` opcode.
pub const JSR_ABSOLUTE: u8 = 0x20;
