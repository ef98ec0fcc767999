use super::base::{Access, ChrSource, MapperBase, PrgSource};
use crate::bus::{Interrupts, IrqSource};

const EX_RAM_SIZE: usize = 0x400;
const NT_EMPTY_INDEX: u8 = 2;
const NT_FILL_INDEX: u8 = 3;

/// Mapper 5 (MMC5): four PRG modes, four CHR modes with separate sprite and
/// background bank sets under 8x16 sprites, extended RAM modes (ExRAM as
/// nametable, extended attributes, CPU-visible RAM), fill-mode nametable,
/// vertical split screen, an 8x8 multiplier, and a scanline IRQ driven by
/// in-frame detection on the PPU fetch pattern.
pub struct Mmc5 {
    pub base: MapperBase,

    ppu_regs: [u8; 8],

    prg_ram_protect1: u8,
    prg_ram_protect2: u8,

    vertical_split_enabled: bool,
    vertical_split_right: bool,
    vertical_split_delimiter: u8,
    vertical_split_scroll: u8,
    vertical_split_bank: u8,

    split_in_region: bool,
    split_tile: u32,
    split_tile_number: i32,

    multiplier_1: u8,
    multiplier_2: u8,

    nametable_mapping: u8,
    extended_ram_mode: u8,

    ex_attr_last_nt_fetch: u16,
    ex_attr_fetch_counter: i8,
    ex_attr_chr_bank: u8,

    prg_mode: u8,
    prg_banks: [u8; 5],

    chr_mode: u8,
    chr_upper_bits: u8,
    chr_banks: [u16; 12],
    last_chr_reg: u16,
    prev_chr_a: bool,

    irq_counter_target: u8,
    irq_enabled: bool,
    scanline_counter: u8,
    irq_pending: bool,

    need_in_frame: bool,
    ppu_in_frame: bool,
    ppu_idle_counter: u8,
    last_ppu_read_addr: u16,
    nt_read_counter: u8,
}

impl Mmc5 {
    pub fn new(mut base: MapperBase) -> Self {
        base.prg_page_size = 0x2000;
        base.chr_page_size = 0x0400;

        let mut mapper = Mmc5 {
            base,
            ppu_regs: [0; 8],
            prg_ram_protect1: 0,
            prg_ram_protect2: 0,
            vertical_split_enabled: false,
            vertical_split_right: false,
            vertical_split_delimiter: 0,
            vertical_split_scroll: 0,
            vertical_split_bank: 0,
            split_in_region: false,
            split_tile: 0,
            split_tile_number: 0,
            multiplier_1: 0,
            multiplier_2: 0,
            nametable_mapping: 0,
            extended_ram_mode: 0,
            ex_attr_last_nt_fetch: 0,
            ex_attr_fetch_counter: 0,
            ex_attr_chr_bank: 0,
            prg_mode: 0,
            prg_banks: [0; 5],
            chr_mode: 0,
            chr_upper_bits: 0,
            chr_banks: [0; 12],
            last_chr_reg: 0,
            prev_chr_a: false,
            irq_counter_target: 0,
            irq_enabled: false,
            scanline_counter: 0,
            irq_pending: false,
            need_in_frame: false,
            ppu_in_frame: false,
            ppu_idle_counter: 0,
            last_ppu_read_addr: 0,
            nt_read_counter: 0,
        };

        let mut scratch = Interrupts::default();
        mapper.set_extended_ram_mode(0);
        mapper.write_register(0x5100, 0x03, &mut scratch);
        mapper.write_register(0x5117, 0xFF, &mut scratch);
        mapper.update_chr_banks(true);
        mapper
    }

    pub fn read_cpu(&mut self, addr: u16, open_bus: u8, intr: &mut Interrupts) -> u8 {
        match addr {
            0x5000..=0x5206 => self.read_register(addr, open_bus, intr),
            0xFFFA | 0xFFFB => {
                // Vector fetches end the frame as far as the MMC5 can tell.
                self.ppu_in_frame = false;
                self.update_chr_banks(true);
                self.last_ppu_read_addr = 0;
                self.scanline_counter = 0;
                self.irq_pending = false;
                intr.clear_irq_source(IrqSource::EXTERNAL);
                self.base.read_prg(addr).unwrap_or(open_bus)
            }
            _ => self.base.read_prg(addr).unwrap_or(open_bus),
        }
    }

    pub fn write_cpu(&mut self, addr: u16, mut value: u8, intr: &mut Interrupts) {
        if (0x5000..=0x5206).contains(&addr) {
            self.write_register(addr, value, intr);
            return;
        }
        if (0x5C00..=0x5FFF).contains(&addr) && self.extended_ram_mode <= 1 && !self.ppu_in_frame {
            // ExRAM in nametable modes only takes writes while rendering.
            value = 0;
        }
        self.base.write_prg(addr, value);
    }

    pub fn step(&mut self) {
        if self.ppu_idle_counter > 0 {
            self.ppu_idle_counter -= 1;
            if self.ppu_idle_counter == 0 {
                // Three CPU cycles with no PPU fetch: rendering has stopped.
                self.ppu_in_frame = false;
                self.update_chr_banks(true);
            }
        }
    }

    pub fn notify_cpu_register_write(&mut self, addr: u16, value: u8) {
        if (0x2000..=0x2007).contains(&addr) {
            self.ppu_regs[(addr & 0x07) as usize] = value;
        }
    }

    fn has_battery(&self) -> bool {
        !self.base.save_ram.is_empty()
    }

    fn ex_ram_offset(&self) -> usize {
        if self.has_battery() {
            self.base.save_ram.len() - EX_RAM_SIZE
        } else {
            self.base.work_ram.len() - EX_RAM_SIZE
        }
    }

    fn ex_ram(&self, index: usize) -> u8 {
        let offset = self.ex_ram_offset() + (index & (EX_RAM_SIZE - 1));
        if self.has_battery() {
            self.base.save_ram[offset]
        } else {
            self.base.work_ram[offset]
        }
    }

    fn chr_data_len(&self) -> usize {
        if self.base.only_chr_ram {
            self.base.chr_ram.len()
        } else {
            self.base.chr_rom.len()
        }
    }

    fn chr_data(&self, index: usize) -> u8 {
        let buf = if self.base.only_chr_ram {
            &self.base.chr_ram
        } else {
            &self.base.chr_rom
        };
        buf[index % buf.len()]
    }

    // --- PRG banking ---

    fn switch_prg_bank(&mut self, reg: u16, value: u8) {
        self.prg_banks[(reg - 0x5113) as usize] = value;
        self.update_prg_banks();
    }

    fn cpu_bank_info(&self, reg: u16) -> (u8, PrgSource, Access) {
        let mut bank = self.prg_banks[(reg - 0x5113) as usize];
        if (bank & 0x80 == 0 && reg != 0x5117) || reg == 0x5113 {
            bank &= 0x07;
            let mut access = Access::READ;
            if self.prg_ram_protect1 == 0x02 && self.prg_ram_protect2 == 0x01 {
                access |= Access::WRITE;
            }

            let real_work_ram = self.base.work_ram.len() as i64
                - if self.has_battery() { 0 } else { EX_RAM_SIZE as i64 };
            let real_save_ram = if self.has_battery() {
                self.base.save_ram.len() as i64 - EX_RAM_SIZE as i64
            } else {
                self.base.work_ram.len() as i64
            };

            let mut source = PrgSource::WorkRam;
            if self.has_battery() && (bank <= 3 || real_save_ram > 0x2000) {
                source = PrgSource::SaveRam;
                if real_save_ram + real_work_ram != 0x4000 && bank >= 4 {
                    access = Access::NONE;
                }
            }

            match source {
                PrgSource::WorkRam => {
                    bank &= ((real_work_ram / 0x2000) - 1) as u8;
                    if self.base.work_ram.len() == EX_RAM_SIZE {
                        access = Access::NONE;
                    }
                }
                PrgSource::SaveRam => {
                    bank &= ((real_save_ram / 0x2000) - 1) as u8;
                    if self.base.save_ram.len() == EX_RAM_SIZE {
                        access = Access::NONE;
                    }
                }
                _ => {}
            }
            (bank, source, access)
        } else {
            (bank & 0x7F, PrgSource::PrgRom, Access::READ)
        }
    }

    fn update_prg_banks(&mut self) {
        let (bank, source, access) = self.cpu_bank_info(0x5113);
        self.base
            .set_cpu_mapping_by_page(0x6000, 0x7FFF, bank as u16, source, Some(access));

        if self.prg_mode == 3 {
            let (bank, source, access) = self.cpu_bank_info(0x5114);
            self.base
                .set_cpu_mapping_by_page(0x8000, 0x9FFF, bank as u16, source, Some(access));
        }

        let (bank, source, access) = self.cpu_bank_info(0x5115);
        if self.prg_mode == 1 || self.prg_mode == 2 {
            self.base.set_cpu_mapping_by_page(
                0x8000,
                0xBFFF,
                (bank & 0xFE) as u16,
                source,
                Some(access),
            );
        } else if self.prg_mode == 3 {
            self.base
                .set_cpu_mapping_by_page(0xA000, 0xBFFF, bank as u16, source, Some(access));
        }

        if self.prg_mode == 2 || self.prg_mode == 3 {
            let (bank, source, access) = self.cpu_bank_info(0x5116);
            self.base
                .set_cpu_mapping_by_page(0xC000, 0xDFFF, bank as u16, source, Some(access));
        }

        let (bank, source, access) = self.cpu_bank_info(0x5117);
        match self.prg_mode {
            0 => self.base.set_cpu_mapping_by_page(
                0x8000,
                0xFFFF,
                (bank & 0x7C) as u16,
                source,
                Some(access),
            ),
            1 => self.base.set_cpu_mapping_by_page(
                0xC000,
                0xFFFF,
                (bank & 0x7E) as u16,
                source,
                Some(access),
            ),
            _ => self.base.set_cpu_mapping_by_page(
                0xE000,
                0xFFFF,
                (bank & 0x7F) as u16,
                source,
                Some(access),
            ),
        }
    }

    // --- CHR banking ---

    fn switch_chr_bank(&mut self, reg: u16, value: u8) {
        let new_value = value as u16 | ((self.chr_upper_bits as u16) << 8);
        let index = (reg - 0x5120) as usize;
        if new_value != self.chr_banks[index] || self.last_chr_reg != reg {
            self.chr_banks[index] = new_value;
            self.last_chr_reg = reg;
            self.update_chr_banks(true);
        }
    }

    fn update_chr_banks(&mut self, force_update: bool) {
        let large_sprites = self.ppu_regs[0] & 0x20 != 0;
        if !large_sprites {
            self.last_chr_reg = 0;
        }

        // With 8x16 sprites the A set covers sprite fetches (tiles 32..40 of
        // a scanline) and the B set covers background fetches.
        let chr_a = !large_sprites
            || (self.split_tile_number >= 32 && self.split_tile_number < 40)
            || (!self.ppu_in_frame && self.last_chr_reg <= 0x5127);
        if !force_update && chr_a == self.prev_chr_a {
            return;
        }
        self.prev_chr_a = chr_a;

        let banks = self.chr_banks;
        match self.chr_mode {
            0 => {
                let page = if chr_a { 0x07 } else { 0x0B };
                self.base
                    .select_chr_page_8x(0, banks[page] << 3, ChrSource::Default);
            }
            1 => {
                let lo = if chr_a { 0x03 } else { 0x0B };
                let hi = if chr_a { 0x07 } else { 0x0B };
                self.base
                    .select_chr_page_4x(0, banks[lo] << 2, ChrSource::Default);
                self.base
                    .select_chr_page_4x(1, banks[hi] << 2, ChrSource::Default);
            }
            2 => {
                let pages: [usize; 4] = if chr_a {
                    [0x01, 0x03, 0x05, 0x07]
                } else {
                    [0x09, 0x0B, 0x09, 0x0B]
                };
                for (slot, page) in pages.into_iter().enumerate() {
                    self.base
                        .select_chr_page_2x(slot as u16, banks[page] << 1, ChrSource::Default);
                }
            }
            _ => {
                let pages: [usize; 8] = if chr_a {
                    [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]
                } else {
                    [0x08, 0x09, 0x0A, 0x0B, 0x08, 0x09, 0x0A, 0x0B]
                };
                for (slot, page) in pages.into_iter().enumerate() {
                    self.base
                        .select_chr_page(slot as u16, banks[page], ChrSource::Default);
                }
            }
        }
    }

    // --- nametables / ExRAM ---

    fn set_nametable_mapping(&mut self, value: u8) {
        self.nametable_mapping = value;

        for i in 0..4u8 {
            let code = (value >> (i * 2)) & 0x03;
            match code {
                0 | 1 => self.base.set_nametable(i, code),
                2 => {
                    if self.extended_ram_mode <= 1 {
                        let source = if self.has_battery() {
                            ChrSource::SaveRam
                        } else {
                            ChrSource::WorkRam
                        };
                        let start = 0x2000 + i as u16 * 0x400;
                        let offset = self.ex_ram_offset() as u32;
                        self.base.set_ppu_ram_mapping(
                            start,
                            start + 0x3FF,
                            source,
                            offset,
                            Access::READ_WRITE,
                        );
                    } else {
                        self.base.set_nametable(i, NT_EMPTY_INDEX);
                    }
                }
                _ => self.base.set_nametable(i, NT_FILL_INDEX),
            }
        }
    }

    fn set_extended_ram_mode(&mut self, mode: u8) {
        self.extended_ram_mode = mode;

        let access = match mode {
            0 | 1 => Access::WRITE,
            2 => Access::READ_WRITE,
            _ => Access::READ,
        };
        let source = if self.has_battery() {
            PrgSource::SaveRam
        } else {
            PrgSource::WorkRam
        };
        let offset = self.ex_ram_offset() as u32;
        self.base
            .set_cpu_mapping(0x5C00, 0x5FFF, source, offset, access);

        self.set_nametable_mapping(self.nametable_mapping);
    }

    fn set_fill_mode_tile(&mut self, tile: u8) {
        let nt = self.base.nametable_mut(NT_FILL_INDEX as usize);
        nt[..32 * 30].fill(tile);
    }

    fn set_fill_mode_color(&mut self, color: u8) {
        let attribute = color | color << 2 | color << 4 | color << 6;
        let nt = self.base.nametable_mut(NT_FILL_INDEX as usize);
        nt[32 * 30..32 * 30 + 64].fill(attribute);
    }

    // --- scanline detection / IRQ ---

    fn detect_scanline_start(&mut self, addr: u16, intr: &mut Interrupts) {
        if (0x2000..=0x2FFF).contains(&addr) {
            if self.last_ppu_read_addr == addr {
                self.nt_read_counter += 1;
            } else {
                self.nt_read_counter = 0;
            }

            // Two identical nametable fetches in a row mark the idle dot at
            // the start of a scanline.
            if self.nt_read_counter >= 2 {
                if !self.ppu_in_frame && !self.need_in_frame {
                    self.need_in_frame = true;
                    self.scanline_counter = 0;
                } else {
                    self.scanline_counter = self.scanline_counter.wrapping_add(1);
                    if self.irq_counter_target == self.scanline_counter {
                        log::trace!("scanline {} reached IRQ target", self.scanline_counter);
                        self.irq_pending = true;
                        if self.irq_enabled {
                            intr.set_irq_source(IrqSource::EXTERNAL);
                        }
                    }
                }
                self.split_tile_number = 0;
            }
        } else {
            self.nt_read_counter = 0;
        }
    }

    pub fn read_ppu(&mut self, addr: u16, intr: &mut Interrupts) -> Option<u8> {
        let is_nt_fetch = (0x2000..=0x2FFF).contains(&addr) && (addr & 0x3FF) < 0x3C0;
        if is_nt_fetch {
            self.split_in_region = false;
            self.split_tile_number += 1;

            if self.ppu_in_frame {
                self.update_chr_banks(false);
            } else if self.need_in_frame {
                self.need_in_frame = false;
                self.ppu_in_frame = true;
                self.update_chr_banks(false);
            }
        }
        self.detect_scanline_start(addr, intr);

        self.ppu_idle_counter = 3;
        self.last_ppu_read_addr = addr;

        if self.extended_ram_mode <= 1 && self.ppu_in_frame {
            if self.vertical_split_enabled {
                let scroll =
                    (self.vertical_split_scroll.wrapping_add(self.scanline_counter)) % 240;
                if addr >= 0x2000 {
                    if is_nt_fetch {
                        let tile_number = ((self.split_tile_number + 2) % 42) as u8;
                        let in_split = tile_number <= 32
                            && ((self.vertical_split_right
                                && tile_number >= self.vertical_split_delimiter)
                                || (!self.vertical_split_right
                                    && tile_number < self.vertical_split_delimiter));
                        if in_split {
                            self.split_in_region = true;
                            self.split_tile =
                                (((scroll as u32) & 0xF8) << 2) | tile_number as u32;
                            return Some(self.ex_ram(self.split_tile as usize));
                        }
                        self.split_in_region = false;
                    } else if self.split_in_region {
                        let index = 0x3C0
                            | ((self.split_tile & 0x380) >> 4)
                            | ((self.split_tile & 0x1F) >> 2);
                        return Some(self.ex_ram(index as usize));
                    }
                } else if self.split_in_region {
                    let bank_count = ((self.chr_data_len() / 0x1000).max(1)) as u16;
                    let bank = self.vertical_split_bank as u16 % bank_count;
                    let index = bank as usize * 0x1000
                        + (((addr & !0x07) | (scroll as u16 & 0x07)) & 0xFFF) as usize;
                    return Some(self.chr_data(index));
                }
            }

            if self.extended_ram_mode == 1
                && (self.split_tile_number < 32 || self.split_tile_number >= 40)
            {
                // Extended attribute mode: each nametable byte has a matching
                // ExRAM byte carrying palette bits and a 4 KiB CHR bank.
                if is_nt_fetch {
                    self.ex_attr_last_nt_fetch = addr & 0x03FF;
                    self.ex_attr_fetch_counter = 3;
                } else if self.ex_attr_fetch_counter > 0 {
                    self.ex_attr_fetch_counter -= 1;
                    if self.ex_attr_fetch_counter == 2 {
                        let value = self.ex_ram(self.ex_attr_last_nt_fetch as usize);
                        let bank_count = ((self.chr_data_len() / 0x1000).max(1)) as u16;
                        self.ex_attr_chr_bank = ((value as u16 & 0x3F
                            | ((self.chr_upper_bits as u16) << 6))
                            % bank_count) as u8;
                        let palette = (value & 0xC0) >> 6;
                        return Some(palette | palette << 2 | palette << 4 | palette << 6);
                    } else {
                        let index =
                            self.ex_attr_chr_bank as usize * 0x1000 + (addr & 0xFFF) as usize;
                        return Some(self.chr_data(index));
                    }
                }
            }
        }

        self.base.read_chr(addr)
    }

    // --- registers ---

    fn write_register(&mut self, addr: u16, value: u8, intr: &mut Interrupts) {
        match addr {
            0x5113..=0x5117 => self.switch_prg_bank(addr, value),
            0x5120..=0x512B => self.switch_chr_bank(addr, value),
            0x5100 => {
                self.prg_mode = value & 0x03;
                self.update_prg_banks();
            }
            0x5101 => {
                self.chr_mode = value & 0x03;
                self.update_chr_banks(true);
            }
            0x5102 => {
                self.prg_ram_protect1 = value & 0x03;
                self.update_prg_banks();
            }
            0x5103 => {
                self.prg_ram_protect2 = value & 0x03;
                self.update_prg_banks();
            }
            0x5104 => self.set_extended_ram_mode(value & 0x03),
            0x5105 => self.set_nametable_mapping(value),
            0x5106 => self.set_fill_mode_tile(value),
            0x5107 => self.set_fill_mode_color(value & 0x03),
            0x5130 => self.chr_upper_bits = value & 0x03,
            0x5200 => {
                self.vertical_split_enabled = value & 0x80 != 0;
                self.vertical_split_right = value & 0x40 != 0;
                self.vertical_split_delimiter = value & 0x1F;
            }
            0x5201 => self.vertical_split_scroll = value,
            0x5202 => self.vertical_split_bank = value,
            0x5203 => self.irq_counter_target = value,
            0x5204 => {
                self.irq_enabled = value & 0x80 != 0;
                if !self.irq_enabled {
                    intr.clear_irq_source(IrqSource::EXTERNAL);
                } else if self.irq_pending {
                    intr.set_irq_source(IrqSource::EXTERNAL);
                }
            }
            0x5205 => self.multiplier_1 = value,
            0x5206 => self.multiplier_2 = value,
            _ => {}
        }
    }

    fn read_register(&mut self, addr: u16, open_bus: u8, intr: &mut Interrupts) -> u8 {
        match addr {
            0x5204 => {
                let mut value = 0;
                if self.ppu_in_frame {
                    value |= 0x40;
                }
                if self.irq_pending {
                    value |= 0x80;
                }
                self.irq_pending = false;
                intr.clear_irq_source(IrqSource::EXTERNAL);
                value
            }
            0x5205 => (self.multiplier_1 as u16 * self.multiplier_2 as u16) as u8,
            0x5206 => ((self.multiplier_1 as u16 * self.multiplier_2 as u16) >> 8) as u8,
            _ => open_bus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::Mirroring;

    fn mmc5() -> Mmc5 {
        let mut prg = vec![0u8; 0x20000];
        for (i, chunk) in prg.chunks_mut(0x2000).enumerate() {
            chunk.fill(i as u8);
        }
        let chr = vec![0u8; 0x8000];
        let base = MapperBase::new(prg, chr, false, Mirroring::Horizontal);
        Mmc5::new(base)
    }

    #[test]
    fn powerup_maps_last_prg_bank() {
        let mut m = mmc5();
        let mut intr = Interrupts::default();
        // Mode 3 with $5117 = $FF puts the last 8 KiB bank at $E000.
        assert_eq!(m.read_cpu(0xE000, 0, &mut intr), 15);
    }

    #[test]
    fn multiplier() {
        let mut m = mmc5();
        let mut intr = Interrupts::default();
        m.write_register(0x5205, 0xFF, &mut intr);
        m.write_register(0x5206, 0xFF, &mut intr);
        assert_eq!(m.read_register(0x5205, 0, &mut intr), 0x01);
        assert_eq!(m.read_register(0x5206, 0, &mut intr), 0xFE);
    }

    #[test]
    fn scanline_detection_sets_irq() {
        let mut m = mmc5();
        let mut intr = Interrupts::default();
        m.write_register(0x5203, 2, &mut intr);
        m.write_register(0x5204, 0x80, &mut intr);

        // Each scanline starts with three identical nametable fetches.
        let scanline = |m: &mut Mmc5, intr: &mut Interrupts| {
            for _ in 0..3 {
                m.read_ppu(0x2000, intr);
            }
            for i in 0..8 {
                m.read_ppu(0x2400 + i, intr);
            }
        };

        scanline(&mut m, &mut intr); // arms in-frame detection
        scanline(&mut m, &mut intr); // scanline 1
        assert!(!intr.has_irq_source(IrqSource::EXTERNAL));
        scanline(&mut m, &mut intr); // scanline 2 == target
        assert!(intr.has_irq_source(IrqSource::EXTERNAL));

        let status = m.read_register(0x5204, 0, &mut intr);
        assert_eq!(status & 0xC0, 0xC0);
        assert!(!intr.has_irq_source(IrqSource::EXTERNAL));
    }
}
