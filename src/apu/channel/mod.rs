pub mod dmc;
pub mod noise;
pub mod pulse;
pub mod triangle;

/// Shared divider state: channels run in batches, consuming `timer + 1` CPU
/// (or APU) cycles per clock of their sequencer.
#[derive(Debug, Default)]
pub struct ChannelTimer {
    pub timer: u16,
    pub period: u16,
    pub previous_cycle: u64,
}

impl ChannelTimer {
    pub fn new() -> Self {
        ChannelTimer::default()
    }

    pub fn reset(&mut self) {
        self.timer = 0;
        self.period = 0;
        self.previous_cycle = 0;
    }
}
