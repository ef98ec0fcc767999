use std::path::{Path, PathBuf};

use crate::bus::Interrupts;
use crate::error::NesError;
use crate::mapper::{create_mapper, Mapper, Mirroring};
use crate::nsf::NsfInfo;

const INES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];
pub const PRG_BANK_SIZE: usize = 0x4000; // 16 KiB
pub const CHR_BANK_SIZE: usize = 0x2000; // 8 KiB
const TRAINER_SIZE: usize = 512;

/// Cartridge metadata plus the mapper that owns the actual memories.
pub struct Cartridge {
    pub mapper: Mapper,
    pub mapper_id: u8,
    pub battery: bool,
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub crc: u32,
    pub nsf: Option<NsfInfo>,
    pub rom_path: PathBuf,
}

impl Cartridge {
    /// Parse an iNES 1.0 image.
    pub fn from_ines_bytes(raw: &[u8], path: &Path) -> Result<Cartridge, NesError> {
        if raw.len() < 16 {
            return Err(NesError::InvalidHeader("file shorter than an iNES header"));
        }
        if raw[0..4] != INES_MAGIC {
            return Err(NesError::InvalidHeader("bad iNES magic"));
        }

        let prg_banks = raw[4];
        let chr_banks = raw[5];
        let mapper_id = (raw[7] & 0xF0) | (raw[6] >> 4);
        let battery = raw[6] & 0x02 != 0;
        let has_trainer = raw[6] & 0x04 != 0;
        let four_screen = raw[6] & 0x08 != 0;

        let mirroring = if four_screen {
            Mirroring::FourScreen
        } else if raw[6] & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let prg_size = prg_banks as usize * PRG_BANK_SIZE;
        let chr_size = chr_banks as usize * CHR_BANK_SIZE;
        let prg_start = 16 + if has_trainer { TRAINER_SIZE } else { 0 };
        let chr_start = prg_start + prg_size;
        if raw.len() < chr_start + chr_size {
            return Err(NesError::RomTruncated);
        }

        let trainer = has_trainer.then(|| raw[16..16 + TRAINER_SIZE].to_vec());
        let prg = raw[prg_start..prg_start + prg_size].to_vec();
        let chr = raw[chr_start..chr_start + chr_size].to_vec();
        let crc = crc32(raw);

        log::info!(
            "loaded iNES image: PRG {}x16K, CHR {}x8K, mapper {}, {:?}, battery: {}",
            prg_banks,
            chr_banks,
            mapper_id,
            mirroring,
            battery
        );

        let mut mapper = create_mapper(
            mapper_id, prg, chr, battery, mirroring, crc, path, None,
        )?;
        mapper.load_battery(path);

        if let Some(trainer) = trainer {
            // Trainers are dropped at $7000 in cartridge RAM.
            let base = mapper.base_mut();
            let ram = if base.save_ram.is_empty() {
                &mut base.work_ram
            } else {
                &mut base.save_ram
            };
            if ram.len() >= 0x1000 + TRAINER_SIZE {
                ram[0x1000..0x1000 + TRAINER_SIZE].copy_from_slice(&trainer);
            }
        }

        Ok(Cartridge {
            mapper,
            mapper_id,
            battery,
            prg_banks,
            chr_banks,
            crc,
            nsf: None,
            rom_path: path.to_path_buf(),
        })
    }

    /// Build a cartridge around an NSF tune: mapper 31 for banked images,
    /// NROM otherwise, with 8 KiB of CHR RAM.
    pub fn from_nsf_bytes(raw: &[u8], path: &Path) -> Result<Cartridge, NesError> {
        let info = NsfInfo::parse(raw)?;

        let mapper_id = if info.uses_banks() { 31 } else { 0 };
        let prg = info.rom.clone();
        let prg_banks = (prg.len() / PRG_BANK_SIZE) as u8;
        let crc = crc32(raw);

        log::info!(
            "loaded NSF: {:?} by {:?}, {} songs, mapper {}",
            info.song_name,
            info.artist_name,
            info.total_songs,
            mapper_id
        );

        let mapper = create_mapper(
            mapper_id,
            prg,
            Vec::new(),
            false,
            Mirroring::Horizontal,
            crc,
            path,
            Some(info.bank_setup),
        )?;

        Ok(Cartridge {
            mapper,
            mapper_id,
            battery: false,
            prg_banks,
            chr_banks: 0,
            crc,
            nsf: Some(info),
            rom_path: path.to_path_buf(),
        })
    }

    pub fn read_cpu(&mut self, addr: u16, open_bus: u8, cycles: u64, intr: &mut Interrupts) -> u8 {
        self.mapper.read_cpu(addr, open_bus, cycles, intr)
    }

    pub fn write_cpu(&mut self, addr: u16, value: u8, cycles: u64, intr: &mut Interrupts) {
        self.mapper.write_cpu(addr, value, cycles, intr);
    }

    pub fn read_vram(&mut self, addr: u16, intr: &mut Interrupts) -> Option<u8> {
        self.mapper.read_ppu(addr, intr)
    }

    pub fn write_vram(&mut self, addr: u16, value: u8) {
        self.mapper.write_ppu(addr, value);
    }

    pub fn ex_read(&self, addr: u16) -> Option<u8> {
        self.mapper.ex_read(addr)
    }

    pub fn ex_write(&mut self, addr: u16, value: u8) {
        self.mapper.ex_write(addr, value);
    }

    pub fn notify_vram_addr(&mut self, addr: u16, frame_cycle: u32, intr: &mut Interrupts) {
        self.mapper.notify_vram_addr(addr, frame_cycle, intr);
    }

    pub fn notify_cpu_register_write(&mut self, addr: u16, value: u8) {
        self.mapper.notify_cpu_register_write(addr, value);
    }

    pub fn step(&mut self, intr: &mut Interrupts) {
        self.mapper.step(intr);
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn save_battery(&mut self) -> std::io::Result<()> {
        if self.battery {
            self.mapper.save_battery(&self.rom_path)?;
        }
        Ok(())
    }
}

/// IEEE CRC-32, bitwise. Used only at load time to identify boards.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
pub(crate) mod test_rom {
    use super::*;

    pub struct TestRom {
        pub prg_banks: u8,
        pub chr_banks: u8,
        pub mapper_id: u8,
        pub flags6: u8,
        pub program: Vec<u8>,
        pub reset_vector: u16,
        pub chr: Vec<u8>,
    }

    impl Default for TestRom {
        fn default() -> Self {
            TestRom {
                prg_banks: 2,
                chr_banks: 1,
                mapper_id: 0,
                flags6: 0,
                program: vec![0x02], // KIL
                reset_vector: 0x8000,
                chr: Vec::new(),
            }
        }
    }

    /// Assemble an in-memory iNES image: program at the start of PRG, reset
    /// vector patched into the last bank.
    pub fn build(rom: TestRom) -> Vec<u8> {
        let prg_size = rom.prg_banks as usize * PRG_BANK_SIZE;
        let mut prg = vec![0u8; prg_size];
        prg[..rom.program.len()].copy_from_slice(&rom.program);
        let vector_offset = prg_size - 4;
        prg[vector_offset] = (rom.reset_vector & 0xFF) as u8;
        prg[vector_offset + 1] = (rom.reset_vector >> 8) as u8;

        let mut chr = rom.chr;
        chr.resize(rom.chr_banks as usize * CHR_BANK_SIZE, 0);

        let mut image = vec![
            0x4E,
            0x45,
            0x53,
            0x1A,
            rom.prg_banks,
            rom.chr_banks,
            (rom.mapper_id << 4) | rom.flags6,
            rom.mapper_id & 0xF0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        image.extend_from_slice(&prg);
        image.extend_from_slice(&chr);
        image
    }

    pub fn cartridge(rom: TestRom) -> Cartridge {
        let image = build(rom);
        Cartridge::from_ines_bytes(&image, Path::new("test.nes")).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_rom::{build, TestRom};
    use super::*;

    #[test]
    fn parses_header_fields() {
        let image = build(TestRom {
            prg_banks: 2,
            chr_banks: 1,
            flags6: 0x01,
            ..Default::default()
        });
        let cart = Cartridge::from_ines_bytes(&image, Path::new("test.nes")).unwrap();
        assert_eq!(cart.prg_banks, 2);
        assert_eq!(cart.chr_banks, 1);
        assert_eq!(cart.mapper_id, 0);
        assert_eq!(cart.mirroring(), Mirroring::Vertical);
        assert!(!cart.battery);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut image = build(TestRom::default());
        image[0] = 0xFF;
        assert!(matches!(
            Cartridge::from_ines_bytes(&image, Path::new("test.nes")),
            Err(NesError::InvalidHeader(_))
        ));
    }

    #[test]
    fn rejects_unknown_mapper() {
        let mut image = build(TestRom::default());
        image[6] = 0xF0; // mapper 15
        assert!(matches!(
            Cartridge::from_ines_bytes(&image, Path::new("test.nes")),
            Err(NesError::UnsupportedMapper(15))
        ));
    }

    #[test]
    fn rejects_truncated_image() {
        let mut image = build(TestRom::default());
        image.truncate(image.len() - 1);
        assert!(matches!(
            Cartridge::from_ines_bytes(&image, Path::new("test.nes")),
            Err(NesError::RomTruncated)
        ));
    }

    #[test]
    fn chr_ram_when_no_chr_banks() {
        let image = build(TestRom {
            chr_banks: 0,
            ..Default::default()
        });
        let mut cart = Cartridge::from_ines_bytes(&image, Path::new("test.nes")).unwrap();
        let mut intr = Interrupts::default();
        cart.write_vram(0x0123, 0x77);
        assert_eq!(cart.read_vram(0x0123, &mut intr), Some(0x77));
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
