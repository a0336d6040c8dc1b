use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use retrones_engine::savestate;
use retrones_engine::{CartridgeImage, SaveStateDocument};

pub enum Command {
    /// Print the iNES header of a ROM.
    Info { rom: PathBuf },
    /// Turn a raw battery save into a save-state document.
    SavToState { sav: PathBuf, state: PathBuf },
    /// Pull the cartridge SRAM out of a save-state document.
    StateToSav { state: PathBuf, sav: PathBuf },
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Info { rom } => {
            let report = cartridge_info(&rom)?;
            print!("{report}");
        }
        Command::SavToState { sav, state } => sav_to_state(&sav, &state)?,
        Command::StateToSav { state, sav } => state_to_sav(&state, &sav)?,
    }
    Ok(())
}

pub fn cartridge_info(rom: &Path) -> Result<String> {
    let bytes = fs::read(rom).with_context(|| format!("Failed to read ROM {}", rom.display()))?;
    let cartridge = CartridgeImage::from_ines(&bytes)
        .with_context(|| format!("{} is not a valid iNES image", rom.display()))?;

    let mut report = String::new();
    report.push_str(&format!("ROM:         {}\n", rom.display()));
    report.push_str(&format!("Mapper:      {}\n", cartridge.mapper()));
    report.push_str(&format!(
        "PRG-ROM:     {} x 8 KiB\n",
        cartridge.prg_rom_banks().len()
    ));
    report.push_str(&format!(
        "CHR-ROM:     {} x 8 KiB\n",
        cartridge.chr_rom_banks().len()
    ));
    report.push_str(&format!("Mirroring:   {:?}\n", cartridge.mirroring()));
    report.push_str(&format!("Four-screen: {}\n", cartridge.four_screen()));
    Ok(report)
}

pub fn sav_to_state(sav: &Path, state: &Path) -> Result<()> {
    let file =
        File::open(sav).with_context(|| format!("Failed to open save file {}", sav.display()))?;
    let (sram, load) = savestate::read_sram_file(BufReader::new(file))
        .with_context(|| format!("Failed to read save file {}", sav.display()))?;
    log::debug!("Read {} bytes from {}", load.file_len, sav.display());

    let document = SaveStateDocument::from_raw_sram(&sram);
    let file = File::create(state)
        .with_context(|| format!("Failed to create {}", state.display()))?;
    let mut writer = BufWriter::new(file);
    document.to_writer(&mut writer)?;
    writer.flush()?;

    log::info!("Wrote save state {}", state.display());
    Ok(())
}

pub fn state_to_sav(state: &Path, sav: &Path) -> Result<()> {
    let file = File::open(state).with_context(|| format!("Failed to open {}", state.display()))?;
    let document = SaveStateDocument::from_reader(BufReader::new(file))?;

    let Some(sram) = document.raw_sram() else {
        bail!("{} has no cartridge SRAM", state.display());
    };
    fs::write(sav, sram).with_context(|| format!("Failed to write {}", sav.display()))?;

    log::info!("Wrote save file {}", sav.display());
    Ok(())
}
