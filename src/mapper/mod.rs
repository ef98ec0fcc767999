pub mod base;
mod cnrom;
mod fcg;
mod mmc1;
mod mmc3;
mod mmc5;
mod nrom;
mod nsf_banking;
mod uxrom;

use std::path::Path;

use crate::bus::Interrupts;
use crate::eeprom::{Eeprom, EepromKind};
use crate::error::NesError;

pub use base::{Access, ChrSource, MapperBase, PrgSource};
pub use cnrom::Cnrom;
pub use fcg::Fcg;
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use mmc5::Mmc5;
pub use nrom::Nrom;
pub use nsf_banking::NsfBanking;
pub use uxrom::Uxrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenA,
    SingleScreenB,
    FourScreen,
}

/// Per-cartridge banking hardware as a tagged variant. Every variant embeds a
/// [`MapperBase`] carrying the bank descriptor tables; dispatch happens here
/// rather than through trait objects so the whole machine stays a plain value.
pub enum Mapper {
    Nrom(Nrom),
    Uxrom(Uxrom),
    Cnrom(Cnrom),
    Mmc1(Mmc1),
    Mmc3(Mmc3),
    Mmc5(Mmc5),
    Fcg(Fcg),
    NsfBanking(NsfBanking),
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn create_mapper(
    id: u8,
    prg: Vec<u8>,
    chr: Vec<u8>,
    battery: bool,
    mirroring: Mirroring,
    crc: u32,
    rom_path: &Path,
    bank_setup: Option<[u8; 8]>,
) -> Result<Mapper, NesError> {
    let base = MapperBase::new(prg, chr, battery, mirroring);
    let mapper = match id {
        0 => Mapper::Nrom(Nrom::new(base)),
        1 => Mapper::Mmc1(Mmc1::new(base)),
        2 => Mapper::Uxrom(Uxrom::new(base)),
        3 => Mapper::Cnrom(Cnrom::new(base)),
        4 => Mapper::Mmc3(Mmc3::new(base)),
        5 => Mapper::Mmc5(Mmc5::new(base)),
        16 => {
            let eeprom = if battery {
                Some(Eeprom::new(EepromKind::from_crc(crc), rom_path))
            } else {
                None
            };
            Mapper::Fcg(Fcg::new(base, eeprom))
        }
        31 => Mapper::NsfBanking(NsfBanking::new(base, bank_setup)),
        other => return Err(NesError::UnsupportedMapper(other)),
    };
    Ok(mapper)
}

impl Mapper {
    pub fn base(&self) -> &MapperBase {
        match self {
            Mapper::Nrom(m) => &m.base,
            Mapper::Uxrom(m) => &m.base,
            Mapper::Cnrom(m) => &m.base,
            Mapper::Mmc1(m) => &m.base,
            Mapper::Mmc3(m) => &m.base,
            Mapper::Mmc5(m) => &m.base,
            Mapper::Fcg(m) => &m.base,
            Mapper::NsfBanking(m) => &m.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut MapperBase {
        match self {
            Mapper::Nrom(m) => &mut m.base,
            Mapper::Uxrom(m) => &mut m.base,
            Mapper::Cnrom(m) => &mut m.base,
            Mapper::Mmc1(m) => &mut m.base,
            Mapper::Mmc3(m) => &mut m.base,
            Mapper::Mmc5(m) => &mut m.base,
            Mapper::Fcg(m) => &mut m.base,
            Mapper::NsfBanking(m) => &mut m.base,
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.base().mirroring()
    }

    /// CPU reads in $4100-$FFFF.
    pub fn read_cpu(
        &mut self,
        addr: u16,
        open_bus: u8,
        _cycles: u64,
        intr: &mut Interrupts,
    ) -> u8 {
        match self {
            Mapper::Mmc5(m) => m.read_cpu(addr, open_bus, intr),
            Mapper::Fcg(m) => m.read_cpu(addr, open_bus),
            Mapper::NsfBanking(m) => m.read_cpu(addr),
            _ => self.base().read_prg(addr).unwrap_or(open_bus),
        }
    }

    /// CPU writes in $4100-$FFFF.
    pub fn write_cpu(&mut self, addr: u16, value: u8, cycles: u64, intr: &mut Interrupts) {
        match self {
            Mapper::Nrom(m) => m.base.write_prg(addr, value),
            Mapper::Uxrom(m) => m.write_cpu(addr, value),
            Mapper::Cnrom(m) => m.write_cpu(addr, value),
            Mapper::Mmc1(m) => m.write_cpu(addr, value, cycles),
            Mapper::Mmc3(m) => m.write_cpu(addr, value, intr),
            Mapper::Mmc5(m) => m.write_cpu(addr, value, intr),
            Mapper::Fcg(m) => m.write_cpu(addr, value, intr),
            Mapper::NsfBanking(m) => m.write_cpu(addr, value),
        }
    }

    /// PPU reads in $0000-$3EFF. `None` means open bus.
    pub fn read_ppu(&mut self, addr: u16, intr: &mut Interrupts) -> Option<u8> {
        match self {
            Mapper::Mmc5(m) => m.read_ppu(addr, intr),
            _ => self.base().read_chr(addr),
        }
    }

    pub fn write_ppu(&mut self, addr: u16, value: u8) {
        self.base_mut().write_chr(addr, value);
    }

    /// CPU reads in $4018-$40FF. Most boards leave this floating.
    pub fn ex_read(&self, _addr: u16) -> Option<u8> {
        None
    }

    pub fn ex_write(&mut self, _addr: u16, _value: u8) {}

    /// Reported for every address the PPU drives onto its bus; scanline
    /// counter mappers watch A12 through this.
    pub fn notify_vram_addr(&mut self, addr: u16, frame_cycle: u32, intr: &mut Interrupts) {
        if let Mapper::Mmc3(m) = self {
            m.notify_vram_addr(addr, frame_cycle, intr);
        }
    }

    /// Snoop on CPU writes to the PPU registers (MMC5 needs $2000/$2001).
    pub fn notify_cpu_register_write(&mut self, addr: u16, value: u8) {
        if let Mapper::Mmc5(m) = self {
            m.notify_cpu_register_write(addr, value);
        }
    }

    /// One step per CPU cycle.
    pub fn step(&mut self, intr: &mut Interrupts) {
        match self {
            Mapper::Mmc5(m) => m.step(),
            Mapper::Fcg(m) => m.step(intr),
            _ => {}
        }
    }

    /// Flush battery-backed storage. Called at teardown.
    pub fn save_battery(&mut self, rom_path: &Path) -> std::io::Result<()> {
        if let Mapper::Fcg(m) = self {
            return m.save_eeprom();
        }
        if !self.base().save_ram.is_empty() {
            let path = rom_path.with_extension("sav");
            std::fs::write(path, &self.base().save_ram)?;
        }
        Ok(())
    }

    /// Load battery-backed PRG RAM saved by an earlier session.
    pub fn load_battery(&mut self, rom_path: &Path) {
        if matches!(self, Mapper::Fcg(_)) {
            return; // EEPROM loads itself from its own file
        }
        let base = self.base_mut();
        if base.save_ram.is_empty() {
            return;
        }
        let path = rom_path.with_extension("sav");
        if let Ok(data) = std::fs::read(path) {
            let n = data.len().min(base.save_ram.len());
            base.save_ram[..n].copy_from_slice(&data[..n]);
        }
    }
}
