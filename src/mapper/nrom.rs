use super::base::{ChrSource, MapperBase, PrgSource};

/// Mapper 0: fixed 16 or 32 KiB PRG (16 KiB images mirror into both halves),
/// fixed 8 KiB CHR, no registers.
pub struct Nrom {
    pub base: MapperBase,
}

impl Nrom {
    pub fn new(mut base: MapperBase) -> Self {
        base.prg_page_size = 0x4000;
        base.chr_page_size = 0x2000;

        base.select_prg_page(0, 0, PrgSource::PrgRom);
        base.select_prg_page(1, 1, PrgSource::PrgRom);
        base.select_chr_page(0, 0, ChrSource::Default);

        Nrom { base }
    }
}
