pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod console;
pub mod controller;
pub mod cpu;
pub mod eeprom;
pub mod error;
pub mod mapper;
pub mod nsf;
pub mod opcodes;
pub mod ppu;

pub use console::{Console, NsfPlayer};
pub use controller::Buttons;
pub use error::NesError;

/// NTSC 2A03 clock rate in Hz.
pub const CPU_FREQUENCY: u32 = 1_789_773;
