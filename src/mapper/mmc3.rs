use super::base::{Access, ChrSource, MapperBase, PrgSource};
use super::Mirroring;
use crate::bus::{Interrupts, IrqSource};

const DOTS_PER_FRAME: u32 = 89342;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A12Edge {
    None,
    Rise,
    Fall,
}

/// Tracks bit 12 of the PPU address bus. A rise only counts after the line
/// has been low for more than 10 PPU cycles, which filters the short dips
/// between consecutive sprite pattern fetches.
#[derive(Debug, Default)]
pub struct A12Watcher {
    last_cycle: u32,
    cycles_down: u32,
}

impl A12Watcher {
    pub fn update(&mut self, addr: u16, frame_cycle: u32) -> A12Edge {
        let mut result = A12Edge::None;

        if self.cycles_down > 0 {
            if self.last_cycle > frame_cycle {
                self.cycles_down += (DOTS_PER_FRAME - self.last_cycle) + frame_cycle;
            } else {
                self.cycles_down += frame_cycle - self.last_cycle;
            }
        }

        if addr & 0x1000 == 0 {
            if self.cycles_down == 0 {
                self.cycles_down = 1;
                result = A12Edge::Fall;
            }
        } else {
            if self.cycles_down > 10 {
                result = A12Edge::Rise;
            }
            self.cycles_down = 0;
        }
        self.last_cycle = frame_cycle;

        result
    }
}

/// Mapper 4 (MMC3): eight banking registers behind an $8000 index port, plus
/// the scanline counter clocked by filtered A12 rises.
pub struct Mmc3 {
    pub base: MapperBase,

    reg_8000: u8,
    reg_a000: u8,
    reg_a001: u8,
    registers: [u8; 8],
    current_register: u8,
    prg_mode: u8,
    chr_mode: u8,

    wram_enabled: bool,
    wram_write_protected: bool,

    a12_watcher: A12Watcher,
    irq_reload_value: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
}

impl Mmc3 {
    pub fn new(mut base: MapperBase) -> Self {
        base.prg_page_size = 0x2000;
        base.chr_page_size = 0x0400;

        let mut mapper = Mmc3 {
            base,
            reg_8000: 0,
            reg_a000: 0,
            reg_a001: 0,
            registers: [0, 2, 4, 5, 6, 7, 0, 1],
            current_register: 0,
            prg_mode: 0,
            chr_mode: 0,
            wram_enabled: false,
            wram_write_protected: false,
            a12_watcher: A12Watcher::default(),
            irq_reload_value: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
        };
        let memory_type = if mapper.base.save_ram.is_empty() {
            PrgSource::WorkRam
        } else {
            PrgSource::SaveRam
        };
        mapper
            .base
            .set_cpu_mapping_by_page(0x6000, 0x7FFF, 0, memory_type, None);
        mapper.update_state();
        mapper.update_mirroring();
        mapper
    }

    pub fn write_cpu(&mut self, addr: u16, value: u8, intr: &mut Interrupts) {
        if addr >= 0x8000 {
            self.write_register(addr, value, intr);
        } else {
            self.base.write_prg(addr, value);
        }
    }

    fn write_register(&mut self, addr: u16, value: u8, intr: &mut Interrupts) {
        match addr & 0xE001 {
            0x8000 => {
                self.reg_8000 = value;
                self.update_state();
            }
            0x8001 => {
                let mut value = value;
                if self.current_register <= 1 {
                    // 2 KiB CHR slots ignore the low bank bit.
                    value &= !0x01;
                }
                self.registers[self.current_register as usize] = value;
                self.update_state();
            }
            0xA000 => {
                self.reg_a000 = value;
                self.update_mirroring();
            }
            0xA001 => {
                self.reg_a001 = value;
                self.update_state();
            }
            0xC000 => self.irq_reload_value = value,
            0xC001 => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            0xE000 => {
                self.irq_enabled = false;
                intr.clear_irq_source(IrqSource::EXTERNAL);
            }
            _ => self.irq_enabled = true,
        }
    }

    fn update_mirroring(&mut self) {
        if self.base.mirroring() != Mirroring::FourScreen {
            if self.reg_a000 & 0x01 != 0 {
                self.base.set_mirroring(Mirroring::Horizontal);
            } else {
                self.base.set_mirroring(Mirroring::Vertical);
            }
        }
    }

    fn update_state(&mut self) {
        self.current_register = self.reg_8000 & 0x07;
        self.chr_mode = (self.reg_8000 & 0x80) >> 7;
        self.prg_mode = (self.reg_8000 & 0x40) >> 6;

        self.wram_enabled = self.reg_a001 & 0x80 != 0;
        self.wram_write_protected = self.reg_a001 & 0x40 != 0;

        let access = if self.wram_enabled {
            if self.wram_write_protected {
                Access::READ
            } else {
                Access::READ_WRITE
            }
        } else {
            Access::NONE
        };
        let memory_type = if self.base.save_ram.is_empty() {
            PrgSource::WorkRam
        } else {
            PrgSource::SaveRam
        };
        self.base
            .set_cpu_mapping_by_page(0x6000, 0x7FFF, 0, memory_type, Some(access));

        self.update_prg_mapping();
        self.update_chr_mapping();
    }

    fn update_prg_mapping(&mut self) {
        let count = self.base.prg_page_count() as u16;
        let last = count.saturating_sub(1);
        let second_last = count.saturating_sub(2);
        let r6 = self.registers[6] as u16;
        let r7 = self.registers[7] as u16;

        if self.prg_mode == 0 {
            self.base.select_prg_page(0, r6, PrgSource::PrgRom);
            self.base.select_prg_page(1, r7, PrgSource::PrgRom);
            self.base.select_prg_page(2, second_last, PrgSource::PrgRom);
            self.base.select_prg_page(3, last, PrgSource::PrgRom);
        } else {
            self.base.select_prg_page(0, second_last, PrgSource::PrgRom);
            self.base.select_prg_page(1, r7, PrgSource::PrgRom);
            self.base.select_prg_page(2, r6, PrgSource::PrgRom);
            self.base.select_prg_page(3, last, PrgSource::PrgRom);
        }
    }

    fn update_chr_mapping(&mut self) {
        let r = self.registers;
        if self.chr_mode == 0 {
            self.base
                .select_chr_page(0, (r[0] & 0xFE) as u16, ChrSource::Default);
            self.base
                .select_chr_page(1, (r[0] | 0x01) as u16, ChrSource::Default);
            self.base
                .select_chr_page(2, (r[1] & 0xFE) as u16, ChrSource::Default);
            self.base
                .select_chr_page(3, (r[1] | 0x01) as u16, ChrSource::Default);
            self.base.select_chr_page(4, r[2] as u16, ChrSource::Default);
            self.base.select_chr_page(5, r[3] as u16, ChrSource::Default);
            self.base.select_chr_page(6, r[4] as u16, ChrSource::Default);
            self.base.select_chr_page(7, r[5] as u16, ChrSource::Default);
        } else {
            self.base.select_chr_page(0, r[2] as u16, ChrSource::Default);
            self.base.select_chr_page(1, r[3] as u16, ChrSource::Default);
            self.base.select_chr_page(2, r[4] as u16, ChrSource::Default);
            self.base.select_chr_page(3, r[5] as u16, ChrSource::Default);
            self.base
                .select_chr_page(4, (r[0] & 0xFE) as u16, ChrSource::Default);
            self.base
                .select_chr_page(5, (r[0] | 0x01) as u16, ChrSource::Default);
            self.base
                .select_chr_page(6, (r[1] & 0xFE) as u16, ChrSource::Default);
            self.base
                .select_chr_page(7, (r[1] | 0x01) as u16, ChrSource::Default);
        }
    }

    pub fn notify_vram_addr(&mut self, addr: u16, frame_cycle: u32, intr: &mut Interrupts) {
        if self.a12_watcher.update(addr, frame_cycle) == A12Edge::Rise {
            if self.irq_counter == 0 || self.irq_reload {
                self.irq_counter = self.irq_reload_value;
            } else {
                self.irq_counter -= 1;
            }

            if self.irq_counter == 0 && self.irq_enabled {
                intr.set_irq_source(IrqSource::EXTERNAL);
            }
            self.irq_reload = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a12_rise_needs_long_low_time() {
        let mut watcher = A12Watcher::default();
        // Initial rise with the line never seen low yet: no edge.
        assert_eq!(watcher.update(0x1000, 10), A12Edge::None);
        assert_eq!(watcher.update(0x0000, 12), A12Edge::Fall);
        // Short dip: rise after only 4 dots of low time is filtered.
        assert_eq!(watcher.update(0x1000, 16), A12Edge::None);
        assert_eq!(watcher.update(0x0000, 20), A12Edge::Fall);
        // Long low time produces a rise.
        assert_eq!(watcher.update(0x1000, 40), A12Edge::Rise);
    }

    #[test]
    fn a12_low_time_spans_frame_wrap() {
        let mut watcher = A12Watcher::default();
        assert_eq!(watcher.update(0x0000, DOTS_PER_FRAME - 5), A12Edge::Fall);
        assert_eq!(watcher.update(0x1000, 10), A12Edge::Rise);
    }
}
