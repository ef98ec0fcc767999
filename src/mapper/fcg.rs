use super::base::{ChrSource, MapperBase, PrgSource};
use super::Mirroring;
use crate::bus::{Interrupts, IrqSource};
use crate::eeprom::Eeprom;

/// Mapper 16 (Bandai FCG): 1 KiB CHR slots, 16 KiB PRG select, a 16-bit
/// down-counter IRQ, and the serial lines of an external I2C EEPROM on the
/// battery-backed boards.
pub struct Fcg {
    pub base: MapperBase,
    eeprom: Option<Eeprom>,

    prg_page: u8,
    prg_bank_select: u8,
    irq_enabled: bool,
    irq_counter: u16,
    irq_reload: u16,
}

impl Fcg {
    pub fn new(mut base: MapperBase, eeprom: Option<Eeprom>) -> Self {
        base.prg_page_size = 0x4000;
        base.chr_page_size = 0x0400;

        let last = if base.prg_page_count() >= 0x20 { 0x1F } else { 0x0F };
        base.select_prg_page(1, last, PrgSource::PrgRom);
        base.select_chr_page_8x(0, 0, ChrSource::Default);

        Fcg {
            base,
            eeprom,
            prg_page: 0,
            prg_bank_select: 0,
            irq_enabled: false,
            irq_counter: 0,
            irq_reload: 0,
        }
    }

    pub fn read_cpu(&mut self, addr: u16, open_bus: u8) -> u8 {
        match addr {
            0x6000..=0x7FFF => {
                // The serial data bit shows up on D4.
                let bit = match &self.eeprom {
                    Some(eeprom) => eeprom.read(),
                    None => false,
                };
                if bit {
                    0x10 | (open_bus & 0xE7)
                } else {
                    open_bus & 0xE7
                }
            }
            _ => self.base.read_prg(addr).unwrap_or(open_bus),
        }
    }

    pub fn write_cpu(&mut self, addr: u16, value: u8, intr: &mut Interrupts) {
        if addr < 0x8000 {
            return;
        }
        match addr & 0x000F {
            0x00..=0x07 => {
                self.base
                    .select_chr_page(addr & 0x07, value as u16, ChrSource::Default);
            }
            0x08 => {
                self.prg_page = if self.base.prg_page_count() >= 0x20 {
                    value & 0x1F
                } else {
                    value & 0x0F
                };
                self.base.select_prg_page(
                    0,
                    (self.prg_page | self.prg_bank_select) as u16,
                    PrgSource::PrgRom,
                );
            }
            0x09 => match value & 0x03 {
                0 => self.base.set_mirroring(Mirroring::Vertical),
                1 => self.base.set_mirroring(Mirroring::Horizontal),
                2 => self.base.set_mirroring(Mirroring::SingleScreenA),
                _ => self.base.set_mirroring(Mirroring::SingleScreenB),
            },
            0x0A => {
                self.irq_enabled = value & 0x01 != 0;
                self.irq_counter = self.irq_reload;
                intr.clear_irq_source(IrqSource::EXTERNAL);
            }
            0x0B => self.irq_reload = (self.irq_reload & 0xFF00) | value as u16,
            0x0C => self.irq_reload = (self.irq_reload & 0x00FF) | ((value as u16) << 8),
            0x0D => {
                if let Some(eeprom) = &mut self.eeprom {
                    eeprom.set_clock(value & 0x20 != 0);
                    eeprom.set_data(value & 0x40 != 0);
                    eeprom.write();
                }
            }
            _ => {}
        }
    }

    pub fn step(&mut self, intr: &mut Interrupts) {
        if self.irq_enabled {
            if self.irq_counter == 0 {
                intr.set_irq_source(IrqSource::EXTERNAL);
            }
            self.irq_counter = self.irq_counter.wrapping_sub(1);
        }
    }

    pub fn save_eeprom(&mut self) -> std::io::Result<()> {
        match &mut self.eeprom {
            Some(eeprom) => eeprom.save(),
            None => Ok(()),
        }
    }
}
