use anyhow::{bail, Result};

use crate::MEM_8KB;

/// iNES header size in bytes.
pub const INES_HEADER_SIZE: usize = 16;
const INES_TRAINER_SIZE: usize = 512;
const INES_PRG_UNIT: usize = 0x4000;
const INES_CHR_UNIT: usize = 0x2000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Mirroring {
    #[default]
    Horizontal,
    Vertical,
}

/// Cartridge contents handed to the engine by the project layer.
///
/// PRG-ROM and CHR-ROM are stored as 8 KiB banks, the granularity at which
/// the simulation loads them and at which opcode masks are computed.
#[derive(Clone, Debug, Default)]
pub struct CartridgeImage {
    prg_rom_banks: Vec<Vec<u8>>,
    chr_rom_banks: Vec<Vec<u8>>,
    mirroring: Mirroring,
    four_screen: bool,
    mapper: u16,
}

impl CartridgeImage {
    pub fn new(
        prg_rom_banks: Vec<Vec<u8>>,
        chr_rom_banks: Vec<Vec<u8>>,
        mirroring: Mirroring,
        four_screen: bool,
        mapper: u16,
    ) -> Self {
        Self {
            prg_rom_banks,
            chr_rom_banks,
            mirroring,
            four_screen,
            mapper,
        }
    }

    /// Parse an iNES (`.nes`) image.
    pub fn from_ines(rom: &[u8]) -> Result<Self> {
        if rom.len() < INES_HEADER_SIZE {
            bail!("iNES image too small: {} bytes", rom.len());
        }
        if rom[..4] != *b"NES\x1A" {
            bail!("missing iNES magic");
        }

        let prg_units = rom[4] as usize;
        let chr_units = rom[5] as usize;
        let flags6 = rom[6];
        let flags7 = rom[7];

        let mut offset = INES_HEADER_SIZE;
        if flags6 & 0x04 != 0 {
            offset += INES_TRAINER_SIZE;
        }

        let prg_len = prg_units * INES_PRG_UNIT;
        let chr_len = chr_units * INES_CHR_UNIT;
        let needed = offset + prg_len + chr_len;
        if rom.len() < needed {
            bail!(
                "iNES image truncated: header declares {} bytes, file has {}",
                needed,
                rom.len()
            );
        }

        let prg = &rom[offset..offset + prg_len];
        let chr = &rom[offset + prg_len..needed];

        let mirroring = if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let mapper = ((flags7 & 0xF0) | (flags6 >> 4)) as u16;

        log::debug!(
            "iNES: {} PRG x16K, {} CHR x8K, mapper {}, {:?}{}",
            prg_units,
            chr_units,
            mapper,
            mirroring,
            if flags6 & 0x08 != 0 { ", four-screen" } else { "" }
        );

        Ok(Self {
            prg_rom_banks: split_banks(prg),
            chr_rom_banks: split_banks(chr),
            mirroring,
            four_screen: flags6 & 0x08 != 0,
            mapper,
        })
    }

    pub fn prg_rom_banks(&self) -> &[Vec<u8>] {
        &self.prg_rom_banks
    }

    pub fn chr_rom_banks(&self) -> &[Vec<u8>] {
        &self.chr_rom_banks
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn four_screen(&self) -> bool {
        self.four_screen
    }

    pub fn mapper(&self) -> u16 {
        self.mapper
    }

    pub fn is_empty(&self) -> bool {
        self.prg_rom_banks.is_empty()
    }
}

fn split_banks(data: &[u8]) -> Vec<Vec<u8>> {
    data.chunks(MEM_8KB).map(<[u8]>::to_vec).collect()
}
