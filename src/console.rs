use std::path::Path;
use std::sync::mpsc::SyncSender;

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::controller::Buttons;
use crate::cpu::CPU;
use crate::error::NesError;
use crate::nsf::NsfInfo;
use crate::CPU_FREQUENCY;

/// The whole machine. The CPU owns the bus, which owns everything else; all
/// simulated time flows out of [`CPU::step`].
pub struct Console {
    pub cpu: CPU,
    stop_requested: bool,
}

impl Console {
    pub fn create(path: &Path, is_nsf: bool) -> Result<Console, NesError> {
        let bytes = std::fs::read(path)?;
        let cart = if is_nsf {
            Cartridge::from_nsf_bytes(&bytes, path)?
        } else {
            Cartridge::from_ines_bytes(&bytes, path)?
        };
        Ok(Console::with_cartridge(cart))
    }

    pub fn from_ines_bytes(bytes: &[u8]) -> Result<Console, NesError> {
        let cart = Cartridge::from_ines_bytes(bytes, Path::new("memory.nes"))?;
        Ok(Console::with_cartridge(cart))
    }

    pub fn with_cartridge(cart: Cartridge) -> Console {
        let cpu = CPU::new(Bus::new(cart));
        let mut console = Console {
            cpu,
            stop_requested: false,
        };
        console.reset();
        console
    }

    pub fn reset(&mut self) {
        self.cpu.bus.ppu.reset();
        self.cpu.bus.apu.reset();
        self.cpu.reset();
    }

    /// Execute one CPU instruction; returns the cycles consumed.
    pub fn step(&mut self) -> u64 {
        self.cpu.step()
    }

    /// Run until the PPU finishes the current frame.
    pub fn step_frame(&mut self) -> u64 {
        let frame = self.cpu.bus.ppu.frame;
        let mut cycles = 0;
        while frame == self.cpu.bus.ppu.frame && !self.stop_requested {
            cycles += self.step();
        }
        cycles
    }

    /// Run for `dt` seconds of emulated time. The stop flag is polled between
    /// instructions; no in-flight bus access is ever interrupted.
    pub fn step_seconds(&mut self, dt: f64) {
        let mut cycles = (CPU_FREQUENCY as f64 * dt) as i64;
        while cycles > 0 && !self.stop_requested {
            cycles -= self.step() as i64;
        }
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn clear_stop(&mut self) {
        self.stop_requested = false;
    }

    /// 256x240 RGBA, most recently completed frame.
    pub fn frame_buffer(&self) -> &[u8] {
        self.cpu.bus.ppu.frame_buffer()
    }

    pub fn set_buttons(&mut self, port: usize, buttons: Buttons) {
        match port {
            0 => self.cpu.bus.port1.set_buttons(buttons),
            _ => self.cpu.bus.port2.set_buttons(buttons),
        }
    }

    pub fn attach_audio(&mut self, sample_rate: f64, sink: SyncSender<f32>) {
        self.cpu.bus.apu.set_audio_sink(sample_rate, sink);
    }

    pub fn save_battery(&mut self) -> std::io::Result<()> {
        self.cpu.bus.cart.save_battery()
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if let Err(err) = self.save_battery() {
            log::warn!("failed to flush battery-backed storage: {}", err);
        }
    }
}

/// Drives a tune through the INIT/PLAY entry points of an NSF image, pacing
/// PLAY calls by emulated cycles so playback is deterministic.
pub struct NsfPlayer {
    pub console: Console,
    info: NsfInfo,
    current_song: u8,
    play_interval_cycles: i64,
    cycles_to_next_play: i64,
    play_state: bool,
}

/// Sentinel the INIT/PLAY routines return to; see `prepare_routine_call`.
const NSF_IDLE_PC: u16 = 0x0001;

impl NsfPlayer {
    pub fn new(path: &Path) -> Result<NsfPlayer, NesError> {
        let console = Console::create(path, true)?;
        let info = console
            .cpu
            .bus
            .cart
            .nsf
            .clone()
            .ok_or(NesError::InvalidHeader("not an NSF cartridge"))?;

        let play_interval_cycles =
            (info.play_speed_ntsc as f64 * CPU_FREQUENCY as f64 / 1_000_000.0) as i64;
        let starting_song = info.starting_song.saturating_sub(1);

        let mut player = NsfPlayer {
            console,
            info,
            current_song: 0,
            play_interval_cycles: play_interval_cycles.max(1),
            cycles_to_next_play: 0,
            play_state: true,
        };
        player.init_tune(starting_song);
        Ok(player)
    }

    pub fn info(&self) -> &NsfInfo {
        &self.info
    }

    pub fn song_index(&self) -> u8 {
        self.current_song
    }

    pub fn play_state(&self) -> bool {
        self.play_state
    }

    pub fn set_play_state(&mut self, playing: bool) {
        self.play_state = playing;
    }

    fn init_tune(&mut self, song: u8) {
        // Cold-boot RAM and APU state the way NSF driver code expects.
        let bus = &mut self.console.cpu.bus;
        for addr in 0x0000..0x0800u16 {
            bus.write(addr, 0x00);
        }
        for addr in 0x6000..0x8000u16 {
            bus.write(addr, 0x00);
        }
        for addr in 0x4000..0x4014u16 {
            bus.write(addr, 0x00);
        }
        bus.write(0x4015, 0x00);
        bus.write(0x4015, 0x0F);
        bus.write(0x4017, 0x40);

        if self.info.uses_banks() {
            for (i, &bank) in self.info.bank_setup.iter().enumerate() {
                bus.write(0x5FF8 + i as u16, bank);
            }
        }

        self.console.cpu.a = song;
        self.console.cpu.x = 0; // NTSC
        self.console.cpu.prepare_routine_call(self.info.init_address);

        let mut limit = 10_000_000u64;
        while self.console.cpu.pc != NSF_IDLE_PC && limit > 0 {
            limit = limit.saturating_sub(self.console.step());
        }
        if limit == 0 {
            log::warn!("NSF INIT routine did not return");
        }

        self.current_song = song;
        self.cycles_to_next_play = 0;
    }

    pub fn step_seconds(&mut self, dt: f64) {
        if !self.play_state {
            return;
        }
        let mut cycles = (CPU_FREQUENCY as f64 * dt) as i64;

        while cycles > 0 {
            if self.console.cpu.pc == NSF_IDLE_PC {
                if self.cycles_to_next_play <= 0 {
                    self.cycles_to_next_play += self.play_interval_cycles;
                    let play = self.info.play_address;
                    self.console.cpu.prepare_routine_call(play);
                } else {
                    // Idle between PLAY calls, keeping the APU running.
                    self.console.cpu.idle_cycle();
                    cycles -= 1;
                    self.cycles_to_next_play -= 1;
                    continue;
                }
            }

            let stepped = self.console.step() as i64;
            cycles -= stepped;
            self.cycles_to_next_play -= stepped;
        }
    }

    pub fn prev_song(&mut self) {
        let song = if self.current_song == 0 {
            self.info.total_songs.saturating_sub(1)
        } else {
            self.current_song - 1
        };
        self.init_tune(song);
    }

    pub fn next_song(&mut self) {
        let song = if self.current_song + 1 >= self.info.total_songs {
            0
        } else {
            self.current_song + 1
        };
        self.init_tune(song);
    }
}
