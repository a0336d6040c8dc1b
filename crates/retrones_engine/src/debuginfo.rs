/// Source-level debug information produced by the toolchain.
pub trait DebugInfoResolver: Send + Sync {
    /// End address of the source line (or instruction) containing `pc`.
    fn line_end_address(&self, pc: u16, absolute: u32) -> Option<u32>;

    /// Whether the PRG-ROM byte at `absolute` starts an instruction.
    fn is_opcode_at(&self, absolute: u32) -> bool;
}

/// Resolver used when no debug file is loaded.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDebugInfo;

impl DebugInfoResolver for NoDebugInfo {
    fn line_end_address(&self, _pc: u16, _absolute: u32) -> Option<u32> {
        None
    }

    fn is_opcode_at(&self, _absolute: u32) -> bool {
        false
    }
}
