//! Save states and battery-backed save files.
//!
//! A save state is a tagged document (`save/cpu/...`, `save/ppu/...`,
//! `save/apu/...`, `save/cartridge/...`) whose memory regions are strings of
//! upper-case hexadecimal byte pairs. Everything is captured, but only the
//! cartridge SRAM is restored: resuming mid-frame would need the PPU timing
//! phase, which the simulation does not expose.
//!
//! The raw save file is a flat 64 KiB SRAM dump.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::facade::{CpuRegister, SimulationFacade};
use crate::{MEM_1KB, MEM_256B, MEM_2KB, MEM_32B, MEM_64KB, MEM_8B, MEM_8KB};

const PPU_REGISTER_BASE: u16 = 0x2000;
const PPU_MEMORY_BASE: u16 = 0x2000;
const APU_REGISTER_BASE: u16 = 0x4000;
const EXRAM_BASE: u16 = 0x5C00;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// A memory region stored as a hexadecimal string.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn encode(&self) -> String {
        let mut text = String::with_capacity(self.0.len() * 2);
        for &byte in &self.0 {
            text.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            text.push(HEX_DIGITS[(byte & 0x0F) as usize] as char);
        }
        text
    }

    /// Decode pairs of hex digits. A pair that does not parse decodes as 0.
    pub fn decode(text: &str) -> Self {
        let bytes = text
            .trim()
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                std::str::from_utf8(pair)
                    .ok()
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .unwrap_or(0)
            })
            .collect();
        HexBytes(bytes)
    }

    fn read<F: Fn(usize) -> u8>(len: usize, read: F) -> Self {
        HexBytes((0..len).map(read).collect())
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(HexBytes::decode(&text))
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuRegisters {
    pub pc: u16,
    pub sp: u16,
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub f: u16,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registers: Option<CpuRegisters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<HexBytes>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpuSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registers: Option<HexBytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<HexBytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oam: Option<HexBytes>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApuSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registers: Option<HexBytes>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartridgeSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sram: Option<HexBytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exram: Option<HexBytes>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSection {
    pub cpu: CpuSection,
    pub ppu: PpuSection,
    pub apu: ApuSection,
    pub cartridge: CartridgeSection,
}

/// Whole-machine save state.
///
/// Parsing is permissive: unknown tags are ignored and missing tags are
/// treated as absent.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveStateDocument {
    pub save: SaveSection,
}

impl SaveStateDocument {
    /// Snapshot every region of the simulation.
    pub fn capture<F: SimulationFacade + ?Sized>(facade: &F) -> Self {
        let registers = CpuRegisters {
            pc: facade.cpu_register(CpuRegister::Pc),
            sp: facade.cpu_register(CpuRegister::Sp),
            a: facade.cpu_register(CpuRegister::A),
            x: facade.cpu_register(CpuRegister::X),
            y: facade.cpu_register(CpuRegister::Y),
            f: facade.cpu_register(CpuRegister::F),
        };

        let save = SaveSection {
            cpu: CpuSection {
                registers: Some(registers),
                memory: Some(HexBytes::read(MEM_2KB, |idx| {
                    facade.cpu_memory(idx as u16)
                })),
            },
            ppu: PpuSection {
                registers: Some(HexBytes::read(MEM_8B, |idx| {
                    facade.ppu_register(PPU_REGISTER_BASE + idx as u16)
                })),
                memory: Some(HexBytes::read(MEM_8KB, |idx| {
                    facade.ppu_memory(PPU_MEMORY_BASE + idx as u16)
                })),
                oam: Some(HexBytes::read(MEM_256B, |idx| facade.ppu_oam(idx))),
            },
            apu: ApuSection {
                registers: Some(HexBytes::read(MEM_32B, |idx| {
                    facade.apu_register(APU_REGISTER_BASE + idx as u16)
                })),
            },
            cartridge: CartridgeSection {
                sram: Some(HexBytes::read(MEM_64KB, |idx| facade.sram(idx))),
                exram: Some(HexBytes::read(MEM_1KB, |idx| {
                    facade.exram(EXRAM_BASE + idx as u16)
                })),
            },
        };

        Self { save }
    }

    /// Write the cartridge SRAM back into the simulation.
    ///
    /// The region is always written in full: bytes missing from the
    /// document become zero. Returns `false` when the document carries no
    /// SRAM region, in which case nothing is touched.
    pub fn restore<F: SimulationFacade + ?Sized>(&self, facade: &F) -> bool {
        let Some(sram) = &self.save.cartridge.sram else {
            log::debug!("Save state has no cartridge SRAM, nothing restored");
            return false;
        };
        for idx in 0..MEM_64KB {
            facade.set_sram(idx, sram.0.get(idx).copied().unwrap_or(0));
        }
        true
    }

    /// Document holding only a cartridge SRAM image.
    pub fn from_raw_sram(bytes: &[u8]) -> Self {
        let mut document = Self::default();
        document.save.cartridge.sram = Some(HexBytes(fit_sram(bytes.to_vec())));
        document
    }

    /// The SRAM region padded or truncated to 64 KiB.
    pub fn raw_sram(&self) -> Option<Vec<u8>> {
        self.save
            .cartridge
            .sram
            .as_ref()
            .map(|sram| fit_sram(sram.0.clone()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to encode save state")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse save state")
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context("Failed to write save state")
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).context("Failed to read save state")
    }
}

/// Outcome of loading a raw save file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SramLoad {
    /// Length of the file as found on disk.
    pub file_len: usize,
}

impl SramLoad {
    pub fn size_mismatch(&self) -> bool {
        self.file_len != MEM_64KB
    }
}

fn fit_sram(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.resize(MEM_64KB, 0);
    bytes
}

/// Dump the full 64 KiB SRAM.
pub fn write_raw_sram<F, W>(facade: &F, mut writer: W) -> Result<()>
where
    F: SimulationFacade + ?Sized,
    W: Write,
{
    let bytes: Vec<u8> = (0..MEM_64KB).map(|idx| facade.sram(idx)).collect();
    writer
        .write_all(&bytes)
        .context("Failed to write save file")?;
    writer.flush().context("Failed to flush save file")?;
    Ok(())
}

/// Read a raw save file and fit it to 64 KiB.
///
/// Files that are not exactly 64 KiB are zero-padded or truncated. That is
/// reported as a warning, not an error, because the game data may still be
/// usable.
pub fn read_sram_file<R: Read>(mut reader: R) -> Result<(Vec<u8>, SramLoad)> {
    let mut bytes = Vec::with_capacity(MEM_64KB);
    reader
        .read_to_end(&mut bytes)
        .context("Failed to read save file")?;

    let load = SramLoad {
        file_len: bytes.len(),
    };
    if load.size_mismatch() {
        log::warn!(
            "Save file is {} bytes instead of {}; it may not be valid and game save data may be lost",
            load.file_len,
            MEM_64KB
        );
    }
    Ok((fit_sram(bytes), load))
}

/// Load a raw save file into SRAM.
pub fn read_raw_sram<F, R>(facade: &F, reader: R) -> Result<SramLoad>
where
    F: SimulationFacade + ?Sized,
    R: Read,
{
    let (sram, load) = read_sram_file(reader)?;
    for (idx, byte) in sram.into_iter().enumerate() {
        facade.set_sram(idx, byte);
    }
    Ok(load)
}
