use std::fs::File;
use std::io::BufReader;

use retrones_common::Buttons;

use super::flags::Quantum;
use super::{lock, Shared};
use crate::cartridge::CartridgeImage;
use crate::event::EngineEvent;
use crate::facade::SimulationFacade;
use crate::savestate;
use crate::MEM_8KB;

impl<F: SimulationFacade> Shared<F> {
    /// Body of the scheduling thread.
    pub(super) fn run_loop(&self) {
        log::debug!("Scheduling loop started");
        loop {
            let quantum = {
                let mut flags = lock(&self.flags);
                match flags.next_quantum() {
                    Some(quantum) => quantum,
                    None => {
                        flags.loop_active = false;
                        break;
                    }
                }
            };
            self.perform(quantum);
        }
        log::debug!("Scheduling loop idle");
    }

    fn perform(&self, quantum: Quantum) {
        match quantum {
            Quantum::Start => {
                log::info!("Emulation started");
                self.facade.enable_breakpoints(true);
                self.notifier.emit(EngineEvent::Started);
            }
            Quantum::Reset { soft } => self.reset(soft),
            Quantum::Pause { show, after_frames } => {
                log::info!("Emulation paused");
                self.facade.disassemble();
                self.notifier.emit(EngineEvent::DebuggersShouldUpdate);
                self.notifier.emit(EngineEvent::Paused { show });
                if after_frames {
                    self.notifier.emit(EngineEvent::PausedAfterFrames);
                }
                self.facade.request_break();
            }
            Quantum::Frame => self.frame(),
        }
    }

    fn reset(&self, soft: bool) {
        log::info!("{} reset", if soft { "Soft" } else { "Hard" });

        *lock(&self.controllers) = [Buttons::empty(); 2];
        self.facade.reset(soft);
        self.facade.enable_breakpoints(true);
        lock(&self.markers).zero_all();

        // The reference is only held until this load.
        let cartridge = lock(&self.cartridge).take();
        if let Some(cartridge) = cartridge {
            self.load_cartridge(&cartridge);
        }

        self.facade.disassemble();
        self.notifier.emit(EngineEvent::DebuggersShouldUpdate);
        self.notifier.emit(EngineEvent::Reset);
    }

    fn load_cartridge(&self, cartridge: &CartridgeImage) {
        if cartridge.is_empty() {
            log::debug!("Cartridge has no PRG-ROM, nothing to load");
            return;
        }

        let facade = self.facade.as_ref();
        facade.unload_rom();

        for (bank, data) in cartridge.prg_rom_banks().iter().enumerate() {
            facade.load_prg_rom_bank(bank, data);

            // Opcode masks drive the disassembly views.
            let base = (bank * MEM_8KB) as u32;
            for absolute in base..base + MEM_8KB as u32 {
                facade.set_opcode_mask(absolute, self.resolver.is_opcode_at(absolute));
            }
        }
        for (bank, data) in cartridge.chr_rom_banks().iter().enumerate() {
            facade.load_chr_rom_bank(bank, data);
        }
        facade.finish_rom_load();

        facade.set_mirroring(cartridge.mirroring());
        if cartridge.four_screen() {
            facade.set_four_screen();
        }

        facade.reset_initial(cartridge.mapper());
        log::debug!(
            "Loaded {} PRG and {} CHR banks, mapper {}",
            cartridge.prg_rom_banks().len(),
            cartridge.chr_rom_banks().len(),
            cartridge.mapper()
        );

        self.restore_save_file();

        facade.disassemble();
        self.notifier.emit(EngineEvent::DebuggersShouldUpdate);
        self.notifier.emit(EngineEvent::MachineReady);
    }

    fn restore_save_file(&self) {
        let Some(path) = lock(&self.save_file).clone() else {
            return;
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("Could not open save file {}: {err}", path.display());
                return;
            }
        };

        match savestate::read_raw_sram(self.facade.as_ref(), BufReader::new(file)) {
            Ok(load) => log::debug!("Restored {} bytes of SRAM from {}", load.file_len, path.display()),
            Err(err) => log::warn!("{err:#}"),
        }
    }

    fn frame(&self) {
        self.facade.enable_breakpoints(true);
        // Credit left by a forced shutdown round must not let the next
        // breakpoint through.
        self.bridge.drain_breakpoint_credit();

        let controllers = *lock(&self.controllers);
        self.facade.run_frame(controllers);

        let update_rate = self
            .config
            .debugger_update_rate
            .frames(self.facade.system_mode());
        let refresh = lock(&self.flags).frame_completed(update_rate);

        self.notifier.emit(EngineEvent::FrameCompleted);
        if refresh && self.facade.is_debuggable() {
            self.notifier.emit(EngineEvent::DebuggersShouldUpdate);
        }
    }
}
