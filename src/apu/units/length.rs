/// Length values indexed by the 5-bit field of the channel's fourth register.
#[rustfmt::skip]
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20,  2, 40,  4, 80,  6, 160,  8, 60, 10, 14, 12, 26, 14,
    12,  16, 24, 18, 48, 20, 96, 22, 192, 24, 72, 26, 16, 28, 32, 30,
];

/// Down-counter gating a channel's output. Register writes only take effect
/// at the next frame-counter run boundary, and a reload racing the half-frame
/// clock loses if the counter just moved.
#[derive(Debug, Default)]
pub struct LengthCounter {
    enabled: bool,
    halt: bool,
    new_halt: bool,
    counter: u8,
    reload_value: u8,
    previous_value: u8,
}

impl LengthCounter {
    pub fn new() -> Self {
        LengthCounter::default()
    }

    pub fn reset(&mut self) {
        *self = LengthCounter::default();
    }

    /// Latch the halt flag written alongside the envelope bits.
    pub fn initialize(&mut self, halt: bool) {
        self.new_halt = halt;
    }

    /// Latch a new length from the 5-bit table index.
    pub fn load(&mut self, index: u8) {
        if self.enabled {
            self.reload_value = LENGTH_TABLE[(index & 0x1F) as usize];
            self.previous_value = self.counter;
        }
    }

    /// Commit pending writes; called every frame-counter run boundary.
    pub fn reload(&mut self) {
        if self.reload_value > 0 {
            if self.counter == self.previous_value {
                self.counter = self.reload_value;
            }
            self.reload_value = 0;
        }
        self.halt = self.new_halt;
    }

    /// Half-frame clock.
    pub fn tick(&mut self) {
        if self.counter > 0 && !self.halt {
            self.counter -= 1;
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.counter = 0;
        }
        self.enabled = enabled;
    }

    pub fn active(&self) -> bool {
        self.counter > 0
    }

    pub fn halted(&self) -> bool {
        self.halt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_counter_stays_zero() {
        let mut lc = LengthCounter::new();
        lc.load(1);
        lc.reload();
        assert!(!lc.active());

        lc.set_enabled(true);
        lc.load(1); // index 1 -> 254
        lc.reload();
        assert!(lc.active());

        lc.set_enabled(false);
        assert!(!lc.active());
    }

    #[test]
    fn halt_stops_ticks() {
        let mut lc = LengthCounter::new();
        lc.set_enabled(true);
        lc.load(3); // index 3 -> 2
        lc.reload();
        lc.tick();
        lc.tick();
        assert!(!lc.active());

        lc.load(3);
        lc.initialize(true);
        lc.reload();
        lc.tick();
        assert!(lc.active());
    }
}
