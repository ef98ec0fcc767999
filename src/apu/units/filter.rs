use std::f32::consts::PI;

/// Single-pole filter, high-pass or low-pass, at the output sample rate.
pub struct Filter {
    x: f32,
    y: f32,
    alpha: f32,
    high: bool,
}

impl Filter {
    pub fn high_pass(sample_rate: f32, cutoff: f32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff);
        let dt = 1.0 / sample_rate;
        Filter {
            x: 0.0,
            y: 0.0,
            alpha: rc / (rc + dt),
            high: true,
        }
    }

    pub fn low_pass(sample_rate: f32, cutoff: f32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff);
        let dt = 1.0 / sample_rate;
        Filter {
            x: 0.0,
            y: 0.0,
            alpha: dt / (rc + dt),
            high: false,
        }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        let output = if self.high {
            self.alpha * self.y + self.alpha * (input - self.x)
        } else {
            self.alpha * input + (1.0 - self.alpha) * self.y
        };
        self.x = input;
        self.y = output;
        output
    }
}

/// The standard output chain: 90 Hz and 440 Hz high-pass, 14 kHz low-pass.
pub struct FilterChain(Vec<Filter>);

impl FilterChain {
    pub fn standard(sample_rate: f32) -> Self {
        FilterChain(vec![
            Filter::high_pass(sample_rate, 90.0),
            Filter::high_pass(sample_rate, 440.0),
            Filter::low_pass(sample_rate, 14_000.0),
        ])
    }

    pub fn step(&mut self, mut sample: f32) -> f32 {
        for filter in &mut self.0 {
            sample = filter.filter(sample);
        }
        sample
    }
}
