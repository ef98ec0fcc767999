use super::ChannelTimer;
use crate::bus::{Interrupts, IrqSource};

#[rustfmt::skip]
const PERIOD_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// Delta modulation channel. Sample bytes arrive through CPU DMA into a
/// one-byte buffer; the output unit shifts them out bit by bit, nudging the
/// 7-bit level up or down by 2.
pub struct DmcChannel {
    pub tm: ChannelTimer,

    sample_addr: u16,
    sample_length: u16,
    output_level: u8,
    irq_enabled: bool,
    loop_flag: bool,

    current_addr: u16,
    bytes_remaining: u16,
    read_buffer: u8,
    buffer_empty: bool,

    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
    need_init: u8,

    output: u8,
}

impl DmcChannel {
    pub fn new() -> Self {
        let mut dmc = DmcChannel {
            tm: ChannelTimer::new(),
            sample_addr: 0,
            sample_length: 0,
            output_level: 0,
            irq_enabled: false,
            loop_flag: false,
            current_addr: 0,
            bytes_remaining: 0,
            read_buffer: 0,
            buffer_empty: true,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
            need_init: 0,
            output: 0,
        };
        dmc.reset();
        dmc
    }

    pub fn reset(&mut self) {
        self.tm.reset();
        self.sample_addr = 0xC000;
        self.sample_length = 1;
        self.output_level = 0;
        self.irq_enabled = false;
        self.loop_flag = false;
        self.current_addr = 0;
        self.bytes_remaining = 0;
        self.read_buffer = 0;
        self.buffer_empty = true;
        self.shift_register = 0;
        self.bits_remaining = 8;
        self.silence = true;
        self.need_init = 0;
        self.output = 0;
        self.tm.period = PERIOD_TABLE[0] - 1;
        self.tm.timer = self.tm.period;
    }

    pub fn write_register(&mut self, addr: u16, value: u8, intr: &mut Interrupts) {
        match addr & 0x03 {
            0 => {
                // $4010
                self.irq_enabled = value & 0x80 != 0;
                self.loop_flag = value & 0x40 != 0;
                self.tm.period = PERIOD_TABLE[(value & 0x0F) as usize] - 1;
                if !self.irq_enabled {
                    intr.clear_irq_source(IrqSource::DMC);
                }
            }
            1 => {
                // $4011
                self.output_level = value & 0x7F;
                self.output = self.output_level;
            }
            2 => {
                // $4012: address = $C000 + value * 64
                self.sample_addr = 0xC000 | ((value as u16) << 6);
            }
            _ => {
                // $4013: length = value * 16 + 1
                self.sample_length = ((value as u16) << 4) | 0x0001;
            }
        }
    }

    fn init_sample(&mut self) {
        self.current_addr = self.sample_addr;
        self.bytes_remaining = self.sample_length;
    }

    pub fn set_enabled(&mut self, enabled: bool, cpu_cycles: u64) {
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.init_sample();
            // The first fetch waits 2 or 3 cycles depending on write parity.
            self.need_init = if cpu_cycles & 0x01 == 0 { 2 } else { 3 };
        }
    }

    /// Counts down the post-enable delay; called once per CPU cycle.
    pub fn process_pending_init(&mut self, intr: &mut Interrupts) {
        if self.need_init > 0 {
            self.need_init -= 1;
            if self.need_init == 0 {
                self.start_transfer(intr);
            }
        }
    }

    fn start_transfer(&mut self, intr: &mut Interrupts) {
        if self.buffer_empty && self.bytes_remaining > 0 {
            intr.request_dmc_dma();
        }
    }

    pub fn read_address(&self) -> u16 {
        self.current_addr
    }

    /// DMA completion: the CPU hands over the fetched byte.
    pub fn set_read_buffer(&mut self, value: u8, intr: &mut Interrupts) {
        if self.bytes_remaining == 0 {
            return;
        }
        self.read_buffer = value;
        self.buffer_empty = false;

        self.current_addr = self.current_addr.wrapping_add(1);
        if self.current_addr == 0 {
            self.current_addr = 0x8000;
        }

        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 {
            if self.loop_flag {
                self.init_sample();
            } else if self.irq_enabled {
                intr.set_irq_source(IrqSource::DMC);
            }
        }
    }

    fn clock(&mut self, intr: &mut Interrupts) {
        if !self.silence {
            if self.shift_register & 0x01 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
            self.shift_register >>= 1;
        }

        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            if self.buffer_empty {
                self.silence = true;
            } else {
                self.silence = false;
                self.shift_register = self.read_buffer;
                self.buffer_empty = true;
                self.start_transfer(intr);
            }
        }

        self.output = self.output_level;
    }

    pub fn run(&mut self, target_cycle: u64, intr: &mut Interrupts) {
        let mut cycles_to_run = (target_cycle - self.tm.previous_cycle) as i64;
        while cycles_to_run > self.tm.timer as i64 {
            cycles_to_run -= self.tm.timer as i64 + 1;
            self.tm.previous_cycle += self.tm.timer as u64 + 1;
            self.clock(intr);
            self.tm.timer = self.tm.period;
        }
        self.tm.timer -= cycles_to_run as u16;
        self.tm.previous_cycle = target_cycle;
    }

    pub fn output(&self) -> u8 {
        self.output
    }

    pub fn status(&self) -> bool {
        self.bytes_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_level_stays_in_range() {
        let mut dmc = DmcChannel::new();
        let mut intr = Interrupts::default();

        dmc.write_register(0x4011, 0x7F, &mut intr);
        dmc.silence = false;
        dmc.shift_register = 0xFF; // all increments
        for _ in 0..64 {
            dmc.clock(&mut intr);
        }
        assert!(dmc.output() <= 127);

        dmc.write_register(0x4011, 0x00, &mut intr);
        dmc.silence = false;
        dmc.shift_register = 0x00; // all decrements
        for _ in 0..64 {
            dmc.clock(&mut intr);
        }
        assert!(dmc.output() <= 127);
    }

    #[test]
    fn last_fetch_raises_irq() {
        let mut dmc = DmcChannel::new();
        let mut intr = Interrupts::default();

        dmc.write_register(0x4010, 0x8F, &mut intr); // IRQ on, no loop
        dmc.write_register(0x4013, 0x00, &mut intr); // 1 byte
        dmc.set_enabled(true, 0);

        dmc.process_pending_init(&mut intr);
        dmc.process_pending_init(&mut intr);
        assert!(intr.take_dmc_dma());

        dmc.set_read_buffer(0xAA, &mut intr);
        assert!(intr.has_irq_source(IrqSource::DMC));
        assert!(!dmc.status());

        // Disabling the IRQ enable bit acknowledges the source.
        dmc.write_register(0x4010, 0x0F, &mut intr);
        assert!(!intr.has_irq_source(IrqSource::DMC));
    }

    #[test]
    fn loop_restarts_sample() {
        let mut dmc = DmcChannel::new();
        let mut intr = Interrupts::default();

        dmc.write_register(0x4012, 0x04, &mut intr); // $C100
        dmc.write_register(0x4013, 0x00, &mut intr);
        dmc.write_register(0x4010, 0x4F, &mut intr); // loop
        dmc.set_enabled(true, 1);
        assert_eq!(dmc.read_address(), 0xC100);

        dmc.set_read_buffer(0x12, &mut intr);
        // Loop rewound the reader instead of raising an IRQ.
        assert_eq!(dmc.read_address(), 0xC100);
        assert!(dmc.status());
        assert!(!intr.has_irq_source(IrqSource::DMC));
    }
}
