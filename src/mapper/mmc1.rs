use super::base::{Access, ChrSource, MapperBase, PrgSource};
use super::Mirroring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mmc1Register {
    R8000,
    RA000,
    RC000,
    RE000,
}

/// Mapper 1 (MMC1): 5-bit serial shift register feeding four internal
/// registers. Consecutive writes landing within one CPU cycle (as an RMW
/// instruction produces) collapse into the first.
pub struct Mmc1 {
    pub base: MapperBase,

    write_buffer: u8,
    shift_count: u8,
    last_write_cycle: u64,

    reg_8000: u8,
    reg_a000: u8,
    reg_c000: u8,
    reg_e000: u8,
    last_chr_reg: Mmc1Register,
    force_wram_on: bool,
}

impl Mmc1 {
    pub fn new(mut base: MapperBase) -> Self {
        base.prg_page_size = 0x4000;
        base.chr_page_size = 0x1000;

        let force_wram_on = base.only_chr_ram;
        let mut mapper = Mmc1 {
            base,
            write_buffer: 0,
            shift_count: 0,
            last_write_cycle: 0,
            reg_8000: 0x0C,
            reg_a000: 0,
            reg_c000: 0,
            reg_e000: 0,
            last_chr_reg: Mmc1Register::RA000,
            force_wram_on,
        };
        mapper.update_state();
        mapper
    }

    pub fn write_cpu(&mut self, addr: u16, value: u8, cycles: u64) {
        if addr >= 0x8000 {
            if cycles.wrapping_sub(self.last_write_cycle) >= 2 {
                self.write_register(addr, value);
            }
            self.last_write_cycle = cycles;
        } else {
            self.base.write_prg(addr, value);
        }
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        if !self.shift_in(value) {
            return;
        }
        match (addr & 0x6000) >> 13 {
            0 => self.reg_8000 = self.write_buffer,
            1 => {
                self.last_chr_reg = Mmc1Register::RA000;
                self.reg_a000 = self.write_buffer;
            }
            2 => {
                self.last_chr_reg = Mmc1Register::RC000;
                self.reg_c000 = self.write_buffer;
            }
            _ => self.reg_e000 = self.write_buffer,
        }
        self.update_state();
        self.reset_buffer();
    }

    fn reset_buffer(&mut self) {
        self.shift_count = 0;
        self.write_buffer = 0;
    }

    /// Returns true once five bits have accumulated. Bit 7 set resets the
    /// shifter and locks PRG mode 3.
    fn shift_in(&mut self, value: u8) -> bool {
        if value & 0x80 != 0 {
            self.reset_buffer();
            self.reg_8000 |= 0x0C;
            self.update_state();
            return false;
        }
        self.write_buffer >>= 1;
        self.write_buffer |= (value << 4) & 0x10;
        self.shift_count += 1;
        self.shift_count == 5
    }

    fn update_state(&mut self) {
        match self.reg_8000 & 0x03 {
            0 => self.base.set_mirroring(Mirroring::SingleScreenA),
            1 => self.base.set_mirroring(Mirroring::SingleScreenB),
            2 => self.base.set_mirroring(Mirroring::Vertical),
            _ => self.base.set_mirroring(Mirroring::Horizontal),
        }

        let wram_disable = self.reg_e000 & 0x10 != 0;
        let slot_8000 = self.reg_8000 & 0x04 != 0;
        let prg_16k = self.reg_8000 & 0x08 != 0;
        let chr_4k = self.reg_8000 & 0x10 != 0;

        let chr_reg0 = self.reg_a000 & 0x1F;
        let chr_reg1 = self.reg_c000 & 0x1F;
        let prg_reg = (self.reg_e000 & 0x0F) as u16;

        let extra_reg = if self.last_chr_reg == Mmc1Register::RC000 && chr_4k {
            chr_reg1
        } else {
            chr_reg0
        };

        // 512 KiB boards route PRG A18 through the CHR register.
        let prg_bank_select: u16 = if self.base.prg_rom.len() == 0x80000 {
            (extra_reg & 0x10) as u16
        } else {
            0
        };

        let access = if wram_disable && !self.force_wram_on {
            Access::NONE
        } else {
            Access::READ_WRITE
        };
        let has_battery = !self.base.save_ram.is_empty();
        let memory_type = if has_battery {
            PrgSource::SaveRam
        } else {
            PrgSource::WorkRam
        };

        let ram_total = self.base.save_ram.len() + self.base.work_ram.len();
        if ram_total > 0x4000 {
            self.base.set_cpu_mapping_by_page(
                0x6000,
                0x7FFF,
                (extra_reg as u16 >> 2) & 0x03,
                memory_type,
                Some(access),
            );
        } else if ram_total > 0x2000 {
            if self.base.save_ram.len() == 0x2000 && self.base.work_ram.len() == 0x2000 {
                let memory_type = if (extra_reg >> 3) & 0x01 != 0 {
                    PrgSource::WorkRam
                } else {
                    PrgSource::SaveRam
                };
                self.base
                    .set_cpu_mapping_by_page(0x6000, 0x7FFF, 0, memory_type, Some(access));
            } else {
                self.base.set_cpu_mapping_by_page(
                    0x6000,
                    0x7FFF,
                    (extra_reg as u16 >> 2) & 0x01,
                    memory_type,
                    Some(access),
                );
            }
        } else {
            self.base
                .set_cpu_mapping_by_page(0x6000, 0x7FFF, 0, memory_type, Some(access));
        }

        if !prg_16k {
            // 32 KiB mode
            self.base.select_prg_page_2x(
                0,
                (prg_reg & 0xFE) | prg_bank_select,
                PrgSource::PrgRom,
            );
        } else if slot_8000 {
            self.base
                .select_prg_page(0, prg_reg | prg_bank_select, PrgSource::PrgRom);
            self.base
                .select_prg_page(1, 0x0F | prg_bank_select, PrgSource::PrgRom);
        } else {
            self.base.select_prg_page(0, prg_bank_select, PrgSource::PrgRom);
            self.base
                .select_prg_page(1, prg_reg | prg_bank_select, PrgSource::PrgRom);
        }

        if chr_4k {
            self.base
                .select_chr_page(0, chr_reg0 as u16, ChrSource::Default);
            self.base
                .select_chr_page(1, chr_reg1 as u16, ChrSource::Default);
        } else {
            let page = (chr_reg0 & 0x1E) as u16;
            self.base.select_chr_page(0, page, ChrSource::Default);
            self.base.select_chr_page(1, page + 1, ChrSource::Default);
        }
    }
}
