use std::io;
use std::path::{Path, PathBuf};

/// The two serial EEPROM parts found on Bandai FCG boards. The X24C01 packs a
/// 7-bit address and the R/W bit into its first byte; the X24C02 takes a
/// device-select byte followed by an address byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromKind {
    X24C01,
    X24C02,
}

impl EepromKind {
    /// Board detection by ROM checksum; everything not in the list carries
    /// the smaller part.
    pub fn from_crc(crc: u32) -> Self {
        match crc {
            0x81A1_5EB8 => EepromKind::X24C02,
            _ => EepromKind::X24C01,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Line {
    latch: bool,
    value: bool,
}

impl Line {
    fn hi(&self) -> bool {
        self.latch && self.value
    }

    fn fall(&self) -> bool {
        self.latch && !self.value
    }

    fn rise(&self) -> bool {
        !self.latch && self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Standby,
    Device,
    Address,
    Read,
    Write,
}

const DEVICE_MEMORY: u8 = 0b1010;

/// 256-byte I2C EEPROM driven by the cartridge's SCL/SDA latches and
/// persisted as `<rom-basename>.eeprom` next to the ROM.
pub struct Eeprom {
    path: PathBuf,
    kind: EepromKind,
    memory: [u8; 256],

    mode: Mode,
    counter: u8,
    device: u8,
    address: u8,
    input: u8,
    output: u8,
    response: bool,
    acknowledge: bool,

    clock: Line,
    data: Line,
}

impl Eeprom {
    pub fn new(kind: EepromKind, rom_path: &Path) -> Self {
        let path = rom_path.with_extension("eeprom");
        let mut memory = [0u8; 256];
        match std::fs::read(&path) {
            Ok(contents) => {
                let n = contents.len().min(memory.len());
                memory[..n].copy_from_slice(&contents[..n]);
                log::info!("EEPROM image loaded from {}", path.display());
            }
            Err(_) => log::info!("EEPROM image will be created at {}", path.display()),
        }

        let mut eeprom = Eeprom {
            path,
            kind,
            memory,
            mode: Mode::Standby,
            counter: 0,
            device: 0,
            address: 0,
            input: 0,
            output: 0,
            response: false,
            acknowledge: false,
            clock: Line::default(),
            data: Line::default(),
        };
        eeprom.reset();
        eeprom
    }

    pub fn kind(&self) -> EepromKind {
        self.kind
    }

    pub fn reset(&mut self) {
        self.mode = Mode::Standby;
        self.clock = Line::default();
        self.data = Line::default();
        self.device = DEVICE_MEMORY << 4;
        self.address = 0;
        self.input = 0;
        self.output = 0;
        self.acknowledge = false;
        self.counter = 0;
        self.response = self.acknowledge;
    }

    /// Value on the data line as seen through the mapper's D4.
    pub fn read(&self) -> bool {
        if self.mode == Mode::Standby {
            self.data.value
        } else {
            self.response
        }
    }

    pub fn set_clock(&mut self, bit: bool) {
        self.clock.latch = self.clock.value;
        self.clock.value = bit;
    }

    pub fn set_data(&mut self, bit: bool) {
        self.data.latch = self.data.value;
        self.data.value = bit;
    }

    /// Advance the protocol state machine after the lines were latched.
    pub fn write(&mut self) {
        let phase = self.mode;

        if self.clock.hi() {
            if self.data.fall() {
                // START
                self.counter = 0;
                self.mode = Mode::Device;
            } else if self.data.rise() {
                // STOP
                self.counter = 0;
                self.mode = Mode::Standby;
            }
        }

        if self.clock.fall() {
            self.counter = if self.counter > 8 { 1 } else { self.counter + 1 };
        }

        if !self.clock.rise() {
            return;
        }

        match phase {
            Mode::Standby => {}
            Mode::Device => {
                if self.counter <= 8 {
                    self.device = self.device << 1 | self.data.value as u8;
                } else {
                    self.finish_first_byte();
                }
            }
            Mode::Address => {
                if self.counter <= 8 {
                    self.address = self.address << 1 | self.data.value as u8;
                } else {
                    self.mode = Mode::Write;
                    self.response = self.acknowledge;
                }
            }
            Mode::Read => {
                if self.counter <= 8 {
                    self.response = (self.output >> (8 - self.counter)) & 0x01 == 0x01;
                } else if self.data.value == self.acknowledge {
                    self.address = self.address.wrapping_add(1);
                    self.response = self.load();
                } else {
                    self.mode = Mode::Standby;
                }
            }
            Mode::Write => {
                if self.counter <= 8 {
                    self.input = self.input << 1 | self.data.value as u8;
                } else {
                    self.response = self.store();
                    self.address = self.address.wrapping_add(1);
                }
            }
        }
    }

    fn finish_first_byte(&mut self) {
        match self.kind {
            EepromKind::X24C02 => {
                if self.select_device() != self.acknowledge {
                    self.mode = Mode::Standby;
                } else if self.device & 0x01 == 0x01 {
                    self.mode = Mode::Read;
                    self.response = self.load();
                } else {
                    self.mode = Mode::Address;
                    self.response = self.acknowledge;
                }
            }
            EepromKind::X24C01 => {
                // The first byte already carries the address plus R/W.
                self.address = self.device >> 1;
                if self.device & 0x01 == 0x01 {
                    self.mode = Mode::Read;
                    self.response = self.load();
                } else {
                    self.mode = Mode::Write;
                    self.response = self.acknowledge;
                }
            }
        }
    }

    fn select_device(&self) -> bool {
        if self.device >> 4 == DEVICE_MEMORY {
            self.acknowledge
        } else {
            !self.acknowledge
        }
    }

    fn memory_index(&self) -> usize {
        match self.kind {
            EepromKind::X24C01 => (self.address & 0x7F) as usize,
            EepromKind::X24C02 => {
                let offset = ((self.device >> 1) as u32) << 8 | self.address as u32;
                (offset & 0xFF) as usize
            }
        }
    }

    fn load(&mut self) -> bool {
        if self.kind == EepromKind::X24C02 && self.device >> 4 != DEVICE_MEMORY {
            return !self.acknowledge;
        }
        self.output = self.memory[self.memory_index()];
        self.acknowledge
    }

    fn store(&mut self) -> bool {
        if self.kind == EepromKind::X24C02 && self.device >> 4 != DEVICE_MEMORY {
            return !self.acknowledge;
        }
        let index = self.memory_index();
        self.memory[index] = self.input;
        self.acknowledge
    }

    pub fn save(&mut self) -> io::Result<()> {
        std::fs::write(&self.path, self.memory)
    }
}

impl Drop for Eeprom {
    fn drop(&mut self) {
        if let Err(err) = self.save() {
            log::warn!("failed to flush EEPROM to {}: {}", self.path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_eeprom(kind: EepromKind, name: &str) -> Eeprom {
        let mut path = std::env::temp_dir();
        path.push(format!("famicore-eeprom-{}-{}.nes", name, std::process::id()));
        Eeprom::new(kind, &path)
    }

    fn pulse(e: &mut Eeprom, clock: bool, data: bool) {
        e.set_clock(clock);
        e.set_data(data);
        e.write();
    }

    fn start(e: &mut Eeprom) {
        pulse(e, true, true);
        pulse(e, true, false);
    }

    fn stop(e: &mut Eeprom) {
        pulse(e, false, false);
        pulse(e, true, false);
        pulse(e, true, true);
    }

    fn send_byte(e: &mut Eeprom, byte: u8) {
        for i in (0..8).rev() {
            let bit = (byte >> i) & 0x01 == 0x01;
            pulse(e, false, bit);
            pulse(e, true, bit);
        }
        // Ack clock
        pulse(e, false, false);
        pulse(e, true, false);
    }

    fn read_byte(e: &mut Eeprom) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            pulse(e, false, true);
            pulse(e, true, true);
            byte = byte << 1 | e.read() as u8;
        }
        byte
    }

    #[test]
    fn x24c02_write_then_read_back() {
        let mut e = scratch_eeprom(EepromKind::X24C02, "c02");

        start(&mut e);
        send_byte(&mut e, 0xA0); // device select, write
        send_byte(&mut e, 0x05); // address
        send_byte(&mut e, 0x42); // data
        stop(&mut e);

        assert_eq!(e.memory[5], 0x42);

        // Dummy write to rewind the address, then a current-address read.
        start(&mut e);
        send_byte(&mut e, 0xA0);
        send_byte(&mut e, 0x05);
        start(&mut e);
        send_byte(&mut e, 0xA1); // device select, read
        assert_eq!(read_byte(&mut e), 0x42);
    }

    #[test]
    fn x24c01_write_then_read_back() {
        let mut e = scratch_eeprom(EepromKind::X24C01, "c01");

        start(&mut e);
        send_byte(&mut e, 0x07 << 1); // address 7, write
        send_byte(&mut e, 0x99);
        stop(&mut e);

        assert_eq!(e.memory[7], 0x99);

        start(&mut e);
        send_byte(&mut e, (0x07 << 1) | 0x01); // address 7, read
        assert_eq!(read_byte(&mut e), 0x99);
    }

    #[test]
    fn kind_from_crc() {
        assert_eq!(EepromKind::from_crc(0x81A1_5EB8), EepromKind::X24C02);
        assert_eq!(EepromKind::from_crc(0xDEAD_BEEF), EepromKind::X24C01);
    }
}
