//! Decides where a debugger step should stop next.
//!
//! With debug information available a step covers a whole source line:
//! instead of single-stepping the CPU, the simulation is told to run until
//! the address where the line ends.

use crate::debuginfo::DebugInfoResolver;
use crate::facade::{CpuRegister, SimulationFacade};
use crate::JSR_ABSOLUTE;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepRequest {
    /// Run until the program counter reaches the address.
    RunTo(u32),
    /// Execute exactly one instruction.
    SingleInstruction,
    /// Execute one scanline.
    Scanline,
    /// Execute one frame.
    Frame,
    /// Just keep running.
    Resume,
}

impl StepRequest {
    /// Arm the simulation so its next run honours this request.
    pub fn apply<F: SimulationFacade + ?Sized>(self, facade: &F) {
        log::debug!("Step request: {:?}", self);
        match self {
            StepRequest::RunTo(addr) => facade.set_goto_address(addr),
            StepRequest::SingleInstruction => facade.step_cpu(),
            StepRequest::Scanline => facade.step_scanline(),
            StepRequest::Frame => facade.step_frame(),
            StepRequest::Resume => {}
        }
    }
}

pub fn step_into<F>(facade: &F, resolver: &dyn DebugInfoResolver) -> StepRequest
where
    F: SimulationFacade + ?Sized,
{
    let pc = facade.cpu_register(CpuRegister::Pc);
    let absolute = facade.absolute_address(pc);
    match resolver.line_end_address(pc, absolute) {
        Some(end) => StepRequest::RunTo(end),
        None => StepRequest::SingleInstruction,
    }
}

/// Like [`step_into`], but runs past a subroutine call.
///
/// Only the instruction closing the current line is inspected, which covers
/// the usual `if (f())` shape where the call is the last thing a line does.
/// The distance to the line end is measured with wrapping arithmetic, so a
/// line ending below `pc` still has its last instruction inspected.
pub fn step_over<F>(facade: &F, resolver: &dyn DebugInfoResolver) -> StepRequest
where
    F: SimulationFacade + ?Sized,
{
    let pc = facade.cpu_register(CpuRegister::Pc);
    let absolute = facade.absolute_address(pc);

    let (opcode, end) = match resolver.line_end_address(pc, absolute) {
        Some(end) => {
            let opcode = if end.wrapping_sub(pc as u32) >= 2 {
                let candidate = end.wrapping_sub(2) as u16;
                if resolver.is_opcode_at(facade.absolute_address(candidate)) {
                    facade.prg_rom_byte(candidate)
                } else {
                    facade.prg_rom_byte(pc)
                }
            } else {
                facade.prg_rom_byte(pc)
            };
            (opcode, end)
        }
        // No line info: a JSR here is three bytes long.
        None => (facade.prg_rom_byte(pc), pc as u32 + 2),
    };

    if opcode == JSR_ABSOLUTE {
        StepRequest::RunTo(end.wrapping_add(1))
    } else {
        step_into(facade, resolver)
    }
}

/// Step out of the current subroutine.
///
/// Execution just resumes; there is no call-stack tracking yet.
pub fn step_out<F>(_facade: &F, _resolver: &dyn DebugInfoResolver) -> StepRequest
where
    F: SimulationFacade + ?Sized,
{
    StepRequest::Resume
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debuginfo::NoDebugInfo;
    use crate::testing::{Call, FakeSimulation, ScriptedDebugInfo};

    fn sim_at(pc: u16, code: &[(u16, u8)]) -> FakeSimulation {
        let sim = FakeSimulation::new();
        sim.set_pc(pc);
        for &(addr, byte) in code {
            sim.set_prg_byte(addr, byte);
        }
        sim
    }

    #[test]
    fn step_into_without_line_info_is_single_instruction() {
        let sim = sim_at(0x8000, &[]);
        assert_eq!(step_into(&sim, &NoDebugInfo), StepRequest::SingleInstruction);
    }

    #[test]
    fn step_into_runs_to_line_end() {
        let sim = sim_at(0x8000, &[]);
        let info = ScriptedDebugInfo::default().with_line(0x8000, 0x8007);
        assert_eq!(step_into(&sim, &info), StepRequest::RunTo(0x8007));
    }

    #[test]
    fn step_over_skips_call_closing_the_line() {
        // LDA #1 ; JSR $9000 with the line ending after the JSR operand.
        let sim = sim_at(0x8000, &[(0x8000, 0xA9), (0x8002, JSR_ABSOLUTE)]);
        let info = ScriptedDebugInfo::default()
            .with_line(0x8000, 0x8004)
            .with_opcode(0x8002);
        assert_eq!(step_over(&sim, &info), StepRequest::RunTo(0x8005));
    }

    #[test]
    fn step_over_checks_pc_when_line_end_is_not_an_opcode() {
        let sim = sim_at(0x8000, &[(0x8000, JSR_ABSOLUTE), (0x8002, 0xEA)]);
        let info = ScriptedDebugInfo::default().with_line(0x8000, 0x8004);
        assert_eq!(step_over(&sim, &info), StepRequest::RunTo(0x8005));
    }

    #[test]
    fn step_over_inspects_line_end_below_pc() {
        // The line containing pc ends before it, e.g. after a backwards jump.
        let sim = sim_at(
            0xC010,
            &[(0xC010, 0xEA), (0xC003, JSR_ABSOLUTE)],
        );
        let info = ScriptedDebugInfo::default()
            .with_line(0xC010, 0xC005)
            .with_opcode(0xC003);
        assert_eq!(step_over(&sim, &info), StepRequest::RunTo(0xC006));
    }

    #[test]
    fn step_over_without_line_info_skips_jsr_at_pc() {
        let sim = sim_at(0xC000, &[(0xC000, JSR_ABSOLUTE)]);
        assert_eq!(step_over(&sim, &NoDebugInfo), StepRequest::RunTo(0xC003));
    }

    #[test]
    fn step_over_non_call_matches_step_into() {
        let sim = sim_at(0x8000, &[(0x8000, 0xE8)]);
        assert_eq!(step_over(&sim, &NoDebugInfo), step_into(&sim, &NoDebugInfo));

        let info = ScriptedDebugInfo::default()
            .with_line(0x8000, 0x8003)
            .with_opcode(0x8001);
        let sim = sim_at(0x8000, &[(0x8000, 0xE8), (0x8001, 0xC8)]);
        assert_eq!(step_over(&sim, &info), step_into(&sim, &info));
        assert_eq!(step_over(&sim, &info), StepRequest::RunTo(0x8003));
    }

    #[test]
    fn step_out_resumes() {
        let sim = sim_at(0x8000, &[]);
        assert_eq!(step_out(&sim, &NoDebugInfo), StepRequest::Resume);
    }

    #[test]
    fn requests_arm_the_simulation() {
        let sim = FakeSimulation::new();
        StepRequest::RunTo(0x8123).apply(&sim);
        StepRequest::SingleInstruction.apply(&sim);
        StepRequest::Scanline.apply(&sim);
        StepRequest::Frame.apply(&sim);
        StepRequest::Resume.apply(&sim);
        assert_eq!(
            sim.calls(),
            vec![
                Call::SetGotoAddress(0x8123),
                Call::StepCpu,
                Call::StepScanline,
                Call::StepFrame,
            ]
        );
    }
}
