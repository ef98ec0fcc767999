use bitflags::bitflags;

use super::Mirroring;

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ  = 0x01;
        const WRITE = 0x02;
    }
}

impl Access {
    pub const NONE: Access = Access::empty();
    pub const READ_WRITE: Access = Access::READ.union(Access::WRITE);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrgSource {
    None,
    PrgRom,
    SaveRam,
    WorkRam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChrSource {
    None,
    /// CHR ROM when the cartridge has one, CHR RAM otherwise.
    Default,
    ChrRom,
    ChrRam,
    NametableRam,
    SaveRam,
    WorkRam,
}

/// One 256-byte slot of the CPU page table.
#[derive(Debug, Clone, Copy)]
pub struct PrgPage {
    pub source: PrgSource,
    pub offset: u32,
    pub access: Access,
}

/// One 256-byte slot of the PPU page table.
#[derive(Debug, Clone, Copy)]
pub struct ChrPage {
    pub source: ChrSource,
    pub offset: u32,
    pub access: Access,
}

const UNMAPPED_PRG: PrgPage = PrgPage {
    source: PrgSource::None,
    offset: 0,
    access: Access::NONE,
};

const UNMAPPED_CHR: ChrPage = ChrPage {
    source: ChrSource::None,
    offset: 0,
    access: Access::NONE,
};

/// Shared banking machinery embedded in every mapper variant: the backing
/// memories plus two page tables at 256-byte granularity. CPU pages cover
/// $0000-$FFFF (only $4100 and up are routed here), PPU pages cover
/// $0000-$3FFF including the four nametable slots.
pub struct MapperBase {
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
    pub chr_ram: Vec<u8>,
    pub work_ram: Vec<u8>,
    pub save_ram: Vec<u8>,
    pub nametables: [u8; 0x1000],

    prg_pages: Box<[PrgPage; 0x100]>,
    chr_pages: Box<[ChrPage; 0x40]>,

    pub prg_page_size: u32,
    pub chr_page_size: u32,
    pub save_ram_page_size: u32,
    pub work_ram_page_size: u32,
    pub only_chr_ram: bool,

    mirroring: Mirroring,
}

impl MapperBase {
    pub fn new(prg: Vec<u8>, chr: Vec<u8>, has_battery: bool, mirroring: Mirroring) -> Self {
        let only_chr_ram = chr.is_empty();
        let prg_len = prg.len() as u32;
        let chr_page_size = if only_chr_ram { 0x2000 } else { chr.len() as u32 };

        let mut base = MapperBase {
            prg_rom: prg,
            chr_rom: chr,
            chr_ram: vec![0; 0x2000],
            work_ram: if has_battery { Vec::new() } else { vec![0; 0x2000] },
            save_ram: if has_battery { vec![0; 0x2000] } else { Vec::new() },
            nametables: [0; 0x1000],
            prg_pages: Box::new([UNMAPPED_PRG; 0x100]),
            chr_pages: Box::new([UNMAPPED_CHR; 0x40]),
            prg_page_size: prg_len,
            chr_page_size,
            save_ram_page_size: if has_battery { 0x2000 } else { 0 },
            work_ram_page_size: if has_battery { 0 } else { 0x2000 },
            only_chr_ram,
            mirroring,
        };
        base.set_mirroring(mirroring);
        base
    }

    pub fn prg_page_count(&self) -> u32 {
        if self.prg_page_size == 0 {
            0
        } else {
            self.prg_rom.len() as u32 / self.prg_page_size
        }
    }

    pub fn chr_page_count(&self) -> u32 {
        if self.chr_page_size == 0 {
            return 0;
        }
        let size = if self.only_chr_ram {
            self.chr_ram.len()
        } else {
            self.chr_rom.len()
        };
        size as u32 / self.chr_page_size
    }

    // --- CPU side ---

    pub fn set_cpu_mapping(
        &mut self,
        start: u16,
        end: u16,
        source: PrgSource,
        source_offset: u32,
        access: Access,
    ) {
        let first = (start >> 8) as usize;
        let count = ((end - start + 1) >> 8) as usize;
        for i in 0..count {
            self.prg_pages[first + i] = PrgPage {
                source,
                offset: source_offset + (i as u32) * 0x100,
                access,
            };
        }
    }

    pub fn set_cpu_mapping_by_page(
        &mut self,
        start: u16,
        end: u16,
        page: u16,
        source: PrgSource,
        access: Option<Access>,
    ) {
        if start > 0xFF00 || end <= start {
            return;
        }

        let (page_count, page_size, default_access) = match source {
            PrgSource::PrgRom => (self.prg_page_count(), self.prg_page_size, Access::READ),
            PrgSource::SaveRam => {
                if self.save_ram_page_size == 0 {
                    return;
                }
                (
                    self.save_ram.len() as u32 / self.save_ram_page_size,
                    self.save_ram_page_size,
                    Access::READ_WRITE,
                )
            }
            PrgSource::WorkRam => {
                if self.work_ram_page_size == 0 {
                    return;
                }
                (
                    self.work_ram.len() as u32 / self.work_ram_page_size,
                    self.work_ram_page_size,
                    Access::READ_WRITE,
                )
            }
            PrgSource::None => return,
        };
        if page_count == 0 || page_size == 0 {
            return;
        }

        // Out-of-range selects wrap modulo the actual page count.
        let mut page = (page as u32 % page_count) as u16;
        let access = access.unwrap_or(default_access);

        if (end - start) as u32 >= page_size {
            let mut addr = start as u32;
            while addr + page_size <= end as u32 + 1 {
                self.set_cpu_mapping(
                    addr as u16,
                    (addr + page_size - 1) as u16,
                    source,
                    page as u32 * page_size,
                    access,
                );
                addr += page_size;
                page = ((page as u32 + 1) % page_count) as u16;
            }
        } else {
            self.set_cpu_mapping(start, end, source, page as u32 * page_size, access);
        }
    }

    pub fn select_prg_page(&mut self, slot: u16, page: u16, source: PrgSource) {
        let prg_size = self.prg_rom.len() as u32;
        if prg_size < 0x8000 && self.prg_page_size > prg_size {
            // Smaller than a page: mirror the whole image across $8000-$FFFF.
            let mut addr = 0x8000u32;
            while addr < 0x10000 {
                self.set_cpu_mapping_by_page(
                    addr as u16,
                    (addr + prg_size - 1) as u16,
                    0,
                    source,
                    None,
                );
                addr += prg_size;
            }
        } else {
            let start = 0x8000u32 + slot as u32 * self.prg_page_size;
            let end = start + self.prg_page_size - 1;
            self.set_cpu_mapping_by_page(start as u16, end as u16, page, source, None);
        }
    }

    pub fn select_prg_page_2x(&mut self, slot: u16, page: u16, source: PrgSource) {
        self.select_prg_page(slot * 2, page, source);
        self.select_prg_page(slot * 2 + 1, page + 1, source);
    }

    pub fn read_prg(&self, addr: u16) -> Option<u8> {
        let page = &self.prg_pages[(addr >> 8) as usize];
        if !page.access.contains(Access::READ) {
            return None;
        }
        let buf = self.prg_source_buf(page.source)?;
        buf.get(page.offset as usize + (addr & 0xFF) as usize).copied()
    }

    pub fn write_prg(&mut self, addr: u16, value: u8) {
        let page = self.prg_pages[(addr >> 8) as usize];
        if !page.access.contains(Access::WRITE) {
            return;
        }
        let idx = page.offset as usize + (addr & 0xFF) as usize;
        let buf = match page.source {
            PrgSource::SaveRam => &mut self.save_ram,
            PrgSource::WorkRam => &mut self.work_ram,
            _ => return,
        };
        if let Some(slot) = buf.get_mut(idx) {
            *slot = value;
        }
    }

    fn prg_source_buf(&self, source: PrgSource) -> Option<&[u8]> {
        match source {
            PrgSource::PrgRom => Some(&self.prg_rom),
            PrgSource::SaveRam => Some(&self.save_ram),
            PrgSource::WorkRam => Some(&self.work_ram),
            PrgSource::None => None,
        }
    }

    // --- PPU side ---

    fn resolve_chr_source(&self, source: ChrSource) -> ChrSource {
        match source {
            ChrSource::Default => {
                if self.only_chr_ram {
                    ChrSource::ChrRam
                } else {
                    ChrSource::ChrRom
                }
            }
            other => other,
        }
    }

    pub fn set_ppu_mapping(
        &mut self,
        start: u16,
        end: u16,
        source: ChrSource,
        source_offset: u32,
        access: Access,
    ) {
        let source = self.resolve_chr_source(source);
        let first = (start >> 8) as usize;
        let count = ((end - start + 1) >> 8) as usize;
        for i in 0..count {
            self.chr_pages[first + i] = ChrPage {
                source,
                offset: source_offset + (i as u32) * 0x100,
                access,
            };
        }
    }

    pub fn set_ppu_mapping_by_page(
        &mut self,
        start: u16,
        end: u16,
        page: u16,
        source: ChrSource,
        access: Option<Access>,
    ) {
        if start > 0x3F00 || end > 0x3FFF || end <= start {
            return;
        }

        let source = self.resolve_chr_source(source);
        let (page_count, page_size, default_access) = match source {
            ChrSource::ChrRom => (self.chr_page_count(), self.chr_page_size, Access::READ),
            ChrSource::ChrRam => {
                if self.chr_page_size == 0 {
                    return;
                }
                let count = self.chr_ram.len() as u32 / self.chr_page_size;
                (count, self.chr_page_size, Access::READ_WRITE)
            }
            ChrSource::NametableRam => (4, 0x400, Access::READ_WRITE),
            _ => return,
        };
        if page_count == 0 || page_size == 0 {
            return;
        }

        let mut page = (page as u32 % page_count) as u16;
        let access = access.unwrap_or(default_access);

        if (end - start) as u32 >= page_size {
            let mut addr = start as u32;
            while addr + page_size <= end as u32 + 1 {
                self.set_ppu_mapping(
                    addr as u16,
                    (addr + page_size - 1) as u16,
                    source,
                    page as u32 * page_size,
                    access,
                );
                addr += page_size;
                page = ((page as u32 + 1) % page_count) as u16;
            }
        } else {
            self.set_ppu_mapping(start, end, source, page as u32 * page_size, access);
        }
    }

    pub fn select_chr_page(&mut self, slot: u16, page: u16, source: ChrSource) {
        let page_size = if self.resolve_chr_source(source) == ChrSource::NametableRam {
            0x400
        } else {
            self.chr_page_size
        };
        if page_size == 0 {
            return;
        }
        let start = slot as u32 * page_size;
        let end = start + page_size - 1;
        self.set_ppu_mapping_by_page(start as u16, end as u16, page, source, None);
    }

    pub fn select_chr_page_2x(&mut self, slot: u16, page: u16, source: ChrSource) {
        self.select_chr_page(slot * 2, page, source);
        self.select_chr_page(slot * 2 + 1, page + 1, source);
    }

    pub fn select_chr_page_4x(&mut self, slot: u16, page: u16, source: ChrSource) {
        self.select_chr_page_2x(slot * 2, page, source);
        self.select_chr_page_2x(slot * 2 + 1, page + 2, source);
    }

    pub fn select_chr_page_8x(&mut self, slot: u16, page: u16, source: ChrSource) {
        self.select_chr_page_4x(slot * 2, page, source);
        self.select_chr_page_4x(slot * 2 + 1, page + 4, source);
    }

    pub fn read_chr(&self, addr: u16) -> Option<u8> {
        let page = &self.chr_pages[(addr >> 8) as usize & 0x3F];
        if !page.access.contains(Access::READ) {
            return None;
        }
        let buf = self.chr_source_buf(page.source)?;
        buf.get(page.offset as usize + (addr & 0xFF) as usize).copied()
    }

    pub fn write_chr(&mut self, addr: u16, value: u8) {
        let page = self.chr_pages[(addr >> 8) as usize & 0x3F];
        if !page.access.contains(Access::WRITE) {
            return;
        }
        let idx = page.offset as usize + (addr & 0xFF) as usize;
        let buf: &mut [u8] = match page.source {
            ChrSource::ChrRam => &mut self.chr_ram,
            ChrSource::NametableRam => &mut self.nametables,
            ChrSource::SaveRam => &mut self.save_ram,
            ChrSource::WorkRam => &mut self.work_ram,
            _ => return,
        };
        if let Some(slot) = buf.get_mut(idx) {
            *slot = value;
        }
    }

    fn chr_source_buf(&self, source: ChrSource) -> Option<&[u8]> {
        match source {
            ChrSource::ChrRom => Some(&self.chr_rom),
            ChrSource::ChrRam => Some(&self.chr_ram),
            ChrSource::NametableRam => Some(&self.nametables),
            ChrSource::SaveRam => Some(&self.save_ram),
            ChrSource::WorkRam => Some(&self.work_ram),
            _ => None,
        }
    }

    // --- nametables / mirroring ---

    pub fn nametable_mut(&mut self, index: usize) -> &mut [u8] {
        let start = (index & 0x03) * 0x400;
        &mut self.nametables[start..start + 0x400]
    }

    pub fn set_nametable(&mut self, slot: u8, nametable_index: u8) {
        let start = 0x2000 + slot as u16 * 0x400;
        self.set_ppu_mapping_by_page(
            start,
            start + 0x3FF,
            nametable_index as u16,
            ChrSource::NametableRam,
            None,
        );
        // $3000-$3EFF mirrors the nametable region.
        let mirror = 0x3000 + slot as u16 * 0x400;
        if mirror < 0x3F00 {
            self.set_ppu_mapping(
                mirror,
                mirror + 0x3FF,
                ChrSource::NametableRam,
                nametable_index as u32 * 0x400,
                Access::READ_WRITE,
            );
        }
    }

    pub fn set_nametables(&mut self, a: u8, b: u8, c: u8, d: u8) {
        self.set_nametable(0, a);
        self.set_nametable(1, b);
        self.set_nametable(2, c);
        self.set_nametable(3, d);
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
        match mirroring {
            Mirroring::Vertical => self.set_nametables(0, 1, 0, 1),
            Mirroring::Horizontal => self.set_nametables(0, 0, 1, 1),
            Mirroring::FourScreen => self.set_nametables(0, 1, 2, 3),
            Mirroring::SingleScreenA => self.set_nametables(0, 0, 0, 0),
            Mirroring::SingleScreenB => self.set_nametables(1, 1, 1, 1),
        }
    }

    /// Map an arbitrary slice of save/work RAM into PPU space (MMC5 maps its
    /// ExRAM as a nametable this way).
    pub fn set_ppu_ram_mapping(
        &mut self,
        start: u16,
        end: u16,
        source: ChrSource,
        source_offset: u32,
        access: Access,
    ) {
        self.set_ppu_mapping(start, end, source, source_offset, access);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with_prg(pages: usize, page_size: u32) -> MapperBase {
        let mut prg = vec![0u8; pages * page_size as usize];
        for (i, chunk) in prg.chunks_mut(page_size as usize).enumerate() {
            chunk.fill(i as u8);
        }
        let mut base = MapperBase::new(prg, vec![0; 0x2000], false, Mirroring::Horizontal);
        base.prg_page_size = page_size;
        base
    }

    #[test]
    fn page_select_wraps_out_of_range() {
        let mut base = base_with_prg(4, 0x4000);
        base.select_prg_page(0, 9, PrgSource::PrgRom); // 9 % 4 == 1
        base.select_prg_page(1, 3, PrgSource::PrgRom);
        assert_eq!(base.read_prg(0x8000), Some(1));
        assert_eq!(base.read_prg(0xC000), Some(3));
    }

    #[test]
    fn unmapped_reads_are_none() {
        let base = base_with_prg(2, 0x4000);
        assert_eq!(base.read_prg(0x8000), None);
        assert_eq!(base.read_prg(0x6000), None);
    }

    #[test]
    fn mirroring_nametable_slots() {
        let mut base = base_with_prg(2, 0x4000);
        base.set_mirroring(Mirroring::Vertical);
        base.write_chr(0x2000, 0xAA);
        assert_eq!(base.read_chr(0x2800), Some(0xAA));
        assert_eq!(base.read_chr(0x2400), Some(0x00));

        base.set_mirroring(Mirroring::Horizontal);
        base.write_chr(0x2000, 0x55);
        assert_eq!(base.read_chr(0x2400), Some(0x55));
        base.write_chr(0x2800, 0x66);
        assert_eq!(base.read_chr(0x2C00), Some(0x66));
    }

    #[test]
    fn nametable_mirror_region() {
        let mut base = base_with_prg(2, 0x4000);
        base.set_mirroring(Mirroring::Vertical);
        base.write_chr(0x2001, 0x42);
        assert_eq!(base.read_chr(0x3001), Some(0x42));
    }
}
