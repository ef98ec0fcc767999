pub mod channel;
pub mod frame_counter;
pub mod units;

use std::sync::mpsc::SyncSender;

use crate::bus::{Interrupts, IrqSource};
use crate::CPU_FREQUENCY;

use self::channel::dmc::DmcChannel;
use self::channel::noise::NoiseChannel;
use self::channel::pulse::PulseChannel;
use self::channel::triangle::TriangleChannel;
use self::frame_counter::{FrameCounter, FrameType};
use self::units::filter::FilterChain;

/// Five channels plus the frame counter, clocked once per CPU cycle in
/// lock-step with the CPU. Samples leave through a bounded queue; when the
/// host falls behind, the newest sample is dropped.
pub struct APU {
    square1: PulseChannel,
    square2: PulseChannel,
    triangle: TriangleChannel,
    noise: NoiseChannel,
    dmc: DmcChannel,
    frame_counter: FrameCounter,

    current_cycle: u64,
    previous_cycle: u64,

    cycles_per_sample: f64,
    sink: Option<SyncSender<f32>>,
    filters: Option<FilterChain>,

    square_table: [f32; 31],
    tnd_table: [f32; 203],
}

impl APU {
    pub fn new() -> Self {
        let mut square_table = [0f32; 31];
        for (i, entry) in square_table.iter_mut().enumerate().skip(1) {
            *entry = 95.52 / (8128.0 / i as f32 + 100.0);
        }
        let mut tnd_table = [0f32; 203];
        for (i, entry) in tnd_table.iter_mut().enumerate().skip(1) {
            *entry = 163.67 / (24329.0 / i as f32 + 100.0);
        }

        APU {
            square1: PulseChannel::new(true),
            square2: PulseChannel::new(false),
            triangle: TriangleChannel::new(),
            noise: NoiseChannel::new(),
            dmc: DmcChannel::new(),
            frame_counter: FrameCounter::new(),
            current_cycle: 0,
            previous_cycle: 0,
            cycles_per_sample: 0.0,
            sink: None,
            filters: None,
            square_table,
            tnd_table,
        }
    }

    pub fn reset(&mut self) {
        self.current_cycle = 0;
        self.previous_cycle = 0;
        self.square1.reset();
        self.square2.reset();
        self.triangle.reset();
        self.noise.reset();
        self.dmc.reset();
        self.frame_counter.reset();
    }

    /// Route samples to the host. `sample_rate` is the output rate in Hz.
    pub fn set_audio_sink(&mut self, sample_rate: f64, sink: SyncSender<f32>) {
        self.cycles_per_sample = CPU_FREQUENCY as f64 / sample_rate;
        self.filters = Some(FilterChain::standard(sample_rate as f32));
        self.sink = Some(sink);
    }

    /// One CPU cycle.
    pub fn step(&mut self, intr: &mut Interrupts) {
        let cycle1 = self.current_cycle;
        self.current_cycle += 1;
        let cycle2 = self.current_cycle;

        self.dmc.process_pending_init(intr);
        self.run(intr);

        if self.sink.is_some() && self.cycles_per_sample > 0.0 {
            let s1 = (cycle1 as f64 / self.cycles_per_sample) as u64;
            let s2 = (cycle2 as f64 / self.cycles_per_sample) as u64;
            if s1 != s2 {
                self.send_sample();
            }
        }
    }

    /// Catch every channel up to the current cycle, distributing frame-counter
    /// clocks and committing delayed length-counter writes on the way.
    fn run(&mut self, intr: &mut Interrupts) {
        let mut cycles_to_run = (self.current_cycle - self.previous_cycle) as i32;

        while cycles_to_run > 0 {
            let (cycles_ran, tick) = self.frame_counter.run(&mut cycles_to_run, intr);
            if let Some(frame_type) = tick {
                self.tick_frame(frame_type);
            }
            self.previous_cycle += cycles_ran as u64;

            self.square1.reload_length();
            self.square2.reload_length();
            self.triangle.reload_length();
            self.noise.reload_length();

            self.square1.run(self.previous_cycle);
            self.square2.run(self.previous_cycle);
            self.triangle.run(self.previous_cycle);
            self.noise.run(self.previous_cycle);
            self.dmc.run(self.previous_cycle, intr);
        }
    }

    fn tick_frame(&mut self, frame_type: FrameType) {
        self.square1.tick_envelope();
        self.square2.tick_envelope();
        self.triangle.tick_linear_counter();
        self.noise.tick_envelope();

        if frame_type == FrameType::HalfFrame {
            self.square1.tick_length();
            self.square2.tick_length();
            self.triangle.tick_length();
            self.noise.tick_length();

            self.square1.tick_sweep();
            self.square2.tick_sweep();
        }
    }

    pub fn write_register(&mut self, addr: u16, value: u8, cpu_cycles: u64, intr: &mut Interrupts) {
        self.run(intr);
        match addr {
            0x4000..=0x4003 => self.square1.write_register(addr, value),
            0x4004..=0x4007 => self.square2.write_register(addr, value),
            0x4008..=0x400B => self.triangle.write_register(addr, value),
            0x400C..=0x400F => self.noise.write_register(addr, value),
            0x4010..=0x4013 => self.dmc.write_register(addr, value, intr),
            0x4015 => self.write_status(value, cpu_cycles, intr),
            0x4017 => self.frame_counter.write(value, cpu_cycles, intr),
            _ => {}
        }
    }

    fn write_status(&mut self, value: u8, cpu_cycles: u64, intr: &mut Interrupts) {
        intr.clear_irq_source(IrqSource::DMC);

        self.square1.set_enabled(value & 0x01 != 0);
        self.square2.set_enabled(value & 0x02 != 0);
        self.triangle.set_enabled(value & 0x04 != 0);
        self.noise.set_enabled(value & 0x08 != 0);
        self.dmc.set_enabled(value & 0x10 != 0, cpu_cycles);
    }

    /// $4015 read: channel length status plus the two IRQ flags; clears the
    /// frame-counter IRQ (the DMC flag is acknowledged by writes).
    pub fn read_status(&mut self, intr: &mut Interrupts) -> u8 {
        self.run(intr);

        let mut status = 0u8;
        if self.square1.status() {
            status |= 0x01;
        }
        if self.square2.status() {
            status |= 0x02;
        }
        if self.triangle.status() {
            status |= 0x04;
        }
        if self.noise.status() {
            status |= 0x08;
        }
        if self.dmc.status() {
            status |= 0x10;
        }
        if intr.has_irq_source(IrqSource::FRAME_COUNTER) {
            status |= 0x40;
        }
        if intr.has_irq_source(IrqSource::DMC) {
            status |= 0x80;
        }

        intr.clear_irq_source(IrqSource::FRAME_COUNTER);
        status
    }

    pub fn dmc_read_address(&self) -> u16 {
        self.dmc.read_address()
    }

    pub fn set_dmc_read_buffer(&mut self, value: u8, intr: &mut Interrupts) {
        self.dmc.set_read_buffer(value, intr);
    }

    fn mix(&self) -> f32 {
        let p1 = self.square1.output() as usize;
        let p2 = self.square2.output() as usize;
        let t = self.triangle.output() as usize;
        let n = self.noise.output() as usize;
        let d = self.dmc.output() as usize;

        let pulse_out = self.square_table[p1 + p2];
        let tnd_out = self.tnd_table[3 * t + 2 * n + d];
        pulse_out + tnd_out
    }

    fn send_sample(&mut self) {
        let raw = self.mix();
        let sample = match &mut self.filters {
            Some(chain) => chain.step(raw),
            None => raw,
        };
        if let Some(sink) = &self.sink {
            // Best-effort audio: a full queue drops this sample.
            let _ = sink.try_send(sample);
        }
    }
}

impl Default for APU {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_length_counters() {
        let mut apu = APU::new();
        let mut intr = Interrupts::default();

        apu.write_register(0x4015, 0x01, 0, &mut intr);
        apu.write_register(0x4000, 0x30, 0, &mut intr); // constant volume
        apu.write_register(0x4002, 0x80, 0, &mut intr);
        apu.write_register(0x4003, 0x08, 0, &mut intr); // length index 1

        // The pending length commits on the next run boundary.
        apu.step(&mut intr);
        assert_eq!(apu.read_status(&mut intr) & 0x01, 0x01);

        apu.write_register(0x4015, 0x00, 0, &mut intr);
        assert_eq!(apu.read_status(&mut intr) & 0x01, 0x00);
    }

    #[test]
    fn frame_irq_sets_and_clears() {
        let mut apu = APU::new();
        let mut intr = Interrupts::default();

        for _ in 0..29835 {
            apu.step(&mut intr);
        }
        assert!(intr.has_irq_source(IrqSource::FRAME_COUNTER));

        let status = apu.read_status(&mut intr);
        assert_eq!(status & 0x40, 0x40);
        assert!(!intr.has_irq_source(IrqSource::FRAME_COUNTER));
    }

    #[test]
    fn dmc_enable_requests_dma_after_parity_delay() {
        let mut apu = APU::new();
        let mut intr = Interrupts::default();

        apu.write_register(0x4013, 0x00, 0, &mut intr); // 1 byte sample
        apu.write_register(0x4015, 0x10, 0, &mut intr); // enable on even cycle

        assert!(!intr.take_dmc_dma());
        apu.step(&mut intr);
        apu.step(&mut intr);
        assert!(intr.take_dmc_dma());
    }

    #[test]
    fn mixer_tables_are_monotonic() {
        let apu = APU::new();
        for i in 1..31 {
            assert!(apu.square_table[i] > apu.square_table[i - 1]);
        }
        for i in 1..203 {
            assert!(apu.tnd_table[i] > apu.tnd_table[i - 1]);
        }
    }
}
