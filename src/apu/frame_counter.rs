use crate::bus::{Interrupts, IrqSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    QuarterFrame,
    HalfFrame,
}

const STEP_CYCLES: [[i32; 6]; 2] = [
    [7457, 14913, 22371, 29828, 29829, 29830],
    [7457, 14913, 22371, 29829, 37281, 37282],
];

const FRAME_TYPES: [[Option<FrameType>; 6]; 2] = [
    [
        Some(FrameType::QuarterFrame),
        Some(FrameType::HalfFrame),
        Some(FrameType::QuarterFrame),
        None,
        Some(FrameType::HalfFrame),
        None,
    ],
    [
        Some(FrameType::QuarterFrame),
        Some(FrameType::HalfFrame),
        Some(FrameType::QuarterFrame),
        None,
        Some(FrameType::HalfFrame),
        None,
    ],
];

/// Sequencer producing quarter- and half-frame clocks on the NTSC schedule.
/// A $4017 write lands after a 3- or 4-cycle delay depending on its parity;
/// selecting 5-step mode clocks an immediate half frame.
pub struct FrameCounter {
    previous_cycle: i32,
    current_step: usize,
    step_mode: usize,
    inhibit_irq: bool,
    block_tick: u8,
    new_value: i16,
    write_delay: i8,
}

impl FrameCounter {
    pub fn new() -> Self {
        FrameCounter {
            previous_cycle: 0,
            current_step: 0,
            step_mode: 0,
            inhibit_irq: false,
            block_tick: 0,
            new_value: 0,
            write_delay: 3,
        }
    }

    pub fn reset(&mut self) {
        self.previous_cycle = 0;
        self.step_mode = 0;
        self.current_step = 0;
        self.new_value = 0;
        self.write_delay = 3;
        self.inhibit_irq = false;
        self.block_tick = 0;
    }

    pub fn five_step_mode(&self) -> bool {
        self.step_mode == 1
    }

    /// Consume cycles up to the next step boundary. Returns the number of
    /// cycles actually consumed and an optional frame clock to distribute.
    pub fn run(&mut self, cycles_to_run: &mut i32, intr: &mut Interrupts) -> (u32, Option<FrameType>) {
        let mut tick = None;
        let cycles_ran: u32;

        if self.previous_cycle + *cycles_to_run >= STEP_CYCLES[self.step_mode][self.current_step] {
            if !self.inhibit_irq && self.step_mode == 0 && self.current_step >= 3 {
                intr.set_irq_source(IrqSource::FRAME_COUNTER);
            }

            if let Some(frame_type) = FRAME_TYPES[self.step_mode][self.current_step] {
                if self.block_tick == 0 {
                    tick = Some(frame_type);
                    self.block_tick = 2;
                }
            }

            let boundary = STEP_CYCLES[self.step_mode][self.current_step];
            cycles_ran = if boundary < self.previous_cycle {
                0
            } else {
                (boundary - self.previous_cycle) as u32
            };
            *cycles_to_run -= cycles_ran as i32;

            self.current_step += 1;
            if self.current_step == 6 {
                self.current_step = 0;
                self.previous_cycle = 0;
            } else {
                self.previous_cycle += cycles_ran as i32;
            }
        } else {
            cycles_ran = *cycles_to_run as u32;
            *cycles_to_run = 0;
            self.previous_cycle += cycles_ran as i32;
        }

        if self.new_value >= 0 {
            self.write_delay -= 1;
            if self.write_delay == 0 {
                self.step_mode = if self.new_value & 0x80 != 0 { 1 } else { 0 };

                self.write_delay = -1;
                self.current_step = 0;
                self.previous_cycle = 0;
                self.new_value = -1;

                if self.step_mode == 1 && self.block_tick == 0 {
                    tick = Some(FrameType::HalfFrame);
                    self.block_tick = 2;
                }
            }
        }

        if self.block_tick > 0 {
            self.block_tick -= 1;
        }

        (cycles_ran, tick)
    }

    pub fn write(&mut self, value: u8, cpu_cycles: u64, intr: &mut Interrupts) {
        self.new_value = value as i16;
        self.write_delay = if cpu_cycles & 0x01 != 0 { 4 } else { 3 };

        self.inhibit_irq = value & 0x40 != 0;
        if self.inhibit_irq {
            intr.clear_irq_source(IrqSource::FRAME_COUNTER);
        }
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_cycles(fc: &mut FrameCounter, intr: &mut Interrupts, cycles: i32) -> Vec<FrameType> {
        let mut ticks = Vec::new();
        for _ in 0..cycles {
            let mut to_run = 1;
            while to_run > 0 {
                let (_, tick) = fc.run(&mut to_run, intr);
                if let Some(t) = tick {
                    ticks.push(t);
                }
            }
        }
        ticks
    }

    #[test]
    fn four_step_schedule() {
        let mut fc = FrameCounter::new();
        let mut intr = Interrupts::default();

        // The power-on $4017 state applies after a 3-cycle delay, shifting
        // the whole schedule by 3.
        let ticks = run_cycles(&mut fc, &mut intr, 29834);
        assert_eq!(
            ticks,
            vec![
                FrameType::QuarterFrame,
                FrameType::HalfFrame,
                FrameType::QuarterFrame,
                FrameType::HalfFrame,
            ]
        );
        assert!(intr.has_irq_source(IrqSource::FRAME_COUNTER));
    }

    #[test]
    fn irq_inhibit_blocks_frame_irq() {
        let mut fc = FrameCounter::new();
        let mut intr = Interrupts::default();
        fc.write(0x40, 0, &mut intr);

        run_cycles(&mut fc, &mut intr, 30000);
        assert!(!intr.has_irq_source(IrqSource::FRAME_COUNTER));
    }

    #[test]
    fn five_step_write_clocks_immediate_half_frame() {
        let mut fc = FrameCounter::new();
        let mut intr = Interrupts::default();

        fc.write(0x80, 0, &mut intr); // even write cycle: 3 cycle delay
        let ticks = run_cycles(&mut fc, &mut intr, 4);
        assert_eq!(ticks, vec![FrameType::HalfFrame]);
        assert!(fc.five_step_mode());
    }
}
