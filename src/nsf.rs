use crate::error::NesError;

pub const NSF_HEADER_SIZE: usize = 0x80;
const NSF_MAGIC: [u8; 5] = *b"NESM\x1A";

/// Parsed NSF header plus the PRG image laid out for the player: banked
/// tunes keep their load-address padding and run under mapper 31, non-banked
/// tunes are placed inside a fixed 32 KiB window.
#[derive(Debug, Clone)]
pub struct NsfInfo {
    pub version: u8,
    pub total_songs: u8,
    /// 1-based in the file.
    pub starting_song: u8,
    pub load_address: u16,
    pub init_address: u16,
    pub play_address: u16,
    pub song_name: String,
    pub artist_name: String,
    pub copyright: String,
    /// PLAY call period in microseconds.
    pub play_speed_ntsc: u16,
    pub play_speed_pal: u16,
    pub bank_setup: [u8; 8],
    pub flags: u8,
    pub sound_chips: u8,
    pub rom: Vec<u8>,
}

impl NsfInfo {
    pub fn parse(raw: &[u8]) -> Result<NsfInfo, NesError> {
        if raw.len() < NSF_HEADER_SIZE {
            return Err(NesError::InvalidHeader("NSF file shorter than its header"));
        }
        if raw[0..5] != NSF_MAGIC {
            return Err(NesError::InvalidHeader("bad NSF magic"));
        }

        let word = |offset: usize| u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        let text = |offset: usize| {
            let field = &raw[offset..offset + 32];
            let end = field.iter().position(|&b| b == 0).unwrap_or(32);
            String::from_utf8_lossy(&field[..end]).into_owned()
        };

        let load_address = word(0x08);
        let mut bank_setup = [0u8; 8];
        bank_setup.copy_from_slice(&raw[0x70..0x78]);

        let mut info = NsfInfo {
            version: raw[0x05],
            total_songs: raw[0x06],
            starting_song: raw[0x07],
            load_address,
            init_address: word(0x0A),
            play_address: word(0x0C),
            song_name: text(0x0E),
            artist_name: text(0x2E),
            copyright: text(0x4E),
            play_speed_ntsc: word(0x6E),
            play_speed_pal: word(0x78),
            flags: raw[0x7A],
            sound_chips: raw[0x7B],
            bank_setup,
            rom: Vec::new(),
        };

        let data = &raw[NSF_HEADER_SIZE..];
        if info.uses_banks() {
            // Banked tunes are padded so the image starts on a 4 KiB boundary.
            let padding = (load_address & 0x0FFF) as usize;
            let mut rom = vec![0u8; padding];
            rom.extend_from_slice(data);
            info.rom = rom;
        } else {
            if load_address < 0x8000 {
                return Err(NesError::InvalidHeader("NSF load address below $8000"));
            }
            let mut rom = vec![0u8; 32 * 1024];
            let offset = (load_address - 0x8000) as usize;
            let n = data.len().min(rom.len() - offset);
            rom[offset..offset + n].copy_from_slice(&data[..n]);
            info.rom = rom;
        }

        Ok(info)
    }

    pub fn uses_banks(&self) -> bool {
        self.bank_setup.iter().any(|&b| b != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(load: u16, banks: [u8; 8]) -> Vec<u8> {
        let mut raw = vec![0u8; NSF_HEADER_SIZE];
        raw[0..5].copy_from_slice(&NSF_MAGIC);
        raw[0x05] = 1;
        raw[0x06] = 12;
        raw[0x07] = 1;
        raw[0x08..0x0A].copy_from_slice(&load.to_le_bytes());
        raw[0x0A..0x0C].copy_from_slice(&0x8020u16.to_le_bytes());
        raw[0x0C..0x0E].copy_from_slice(&0x8040u16.to_le_bytes());
        raw[0x0E..0x13].copy_from_slice(b"title");
        raw[0x2E..0x34].copy_from_slice(b"artist");
        raw[0x4E..0x52].copy_from_slice(b"none");
        raw[0x6E..0x70].copy_from_slice(&16639u16.to_le_bytes());
        raw[0x70..0x78].copy_from_slice(&banks);
        raw
    }

    #[test]
    fn parses_fields_and_places_non_banked_image() {
        let mut raw = header(0x8100, [0; 8]);
        raw.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let info = NsfInfo::parse(&raw).unwrap();
        assert_eq!(info.total_songs, 12);
        assert_eq!(info.starting_song, 1);
        assert_eq!(info.song_name, "title");
        assert_eq!(info.artist_name, "artist");
        assert_eq!(info.play_speed_ntsc, 16639);
        assert!(!info.uses_banks());

        assert_eq!(info.rom.len(), 32 * 1024);
        assert_eq!(info.rom[0x100], 0xAA);
        assert_eq!(info.rom[0x102], 0xCC);
    }

    #[test]
    fn banked_image_keeps_load_padding() {
        let mut raw = header(0x8123, [0, 1, 2, 3, 4, 5, 6, 7]);
        raw.extend_from_slice(&[0xEE; 16]);

        let info = NsfInfo::parse(&raw).unwrap();
        assert!(info.uses_banks());
        assert_eq!(info.rom.len(), 0x123 + 16);
        assert_eq!(info.rom[0x122], 0x00);
        assert_eq!(info.rom[0x123], 0xEE);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut raw = header(0x8000, [0; 8]);
        raw[0] = b'X';
        assert!(NsfInfo::parse(&raw).is_err());
    }
}
