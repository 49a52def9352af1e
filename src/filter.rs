/// Clamped linear interpolation of `x` from `[in_min, in_max]` onto
/// `[out_min, out_max]`. The output range may be descending.
///
/// Inputs at or beyond either end return that end's output exactly, which
/// also covers a degenerate input range.
pub fn map(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    if x <= in_min {
        out_min
    } else if x >= in_max {
        out_max
    } else {
        (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
    }
}

/// Integer exponential smoothing.
///
/// `alpha` is the weight (percent, 0..=100) kept from `old`. The result is
/// rounded, and when rounding would stall the output one step short of the
/// input it is nudged by one unit so a constant input is always reached.
pub fn filter(new: u32, old: u32, alpha: u8) -> u32 {
    let alpha = alpha.min(100) as u32;
    let blended = (new * (100 - alpha) + old * alpha + 50) / 100;

    if blended == old {
        if blended < new {
            blended + 1
        } else if blended > new {
            blended - 1
        } else {
            blended
        }
    } else {
        blended
    }
}

/// Stateful wrapper around [`filter`] that seeds itself with its first input.
#[derive(Debug, Clone, Copy)]
pub struct LowPassFilter {
    alpha: u8,
    last_output: u32,
    initialized: bool,
}

impl LowPassFilter {
    pub const fn new(alpha: u8) -> Self {
        Self {
            alpha,
            last_output: 0,
            initialized: false,
        }
    }

    /// Starts from a known value instead of the first sample.
    pub const fn seeded(alpha: u8, value: u32) -> Self {
        Self {
            alpha,
            last_output: value,
            initialized: true,
        }
    }

    pub fn filter(&mut self, input: u32) -> u32 {
        if !self.initialized {
            self.last_output = input;
            self.initialized = true;
        } else {
            self.last_output = filter(input, self.last_output, self.alpha);
        }
        self.last_output
    }

    pub fn output(&self) -> u32 {
        self.last_output
    }

    pub fn reset(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_clamps_both_ends() {
        assert_eq!(map(-5, 0, 100, 10, 20), 10);
        assert_eq!(map(150, 0, 100, 10, 20), 20);
        assert_eq!(map(50, 0, 100, 10, 20), 15);
    }

    #[test]
    fn map_supports_descending_output() {
        assert_eq!(map(650, 650, 800, 16, 4), 16);
        assert_eq!(map(800, 650, 800, 16, 4), 4);
        assert_eq!(map(725, 650, 800, 16, 4), 10);
    }

    #[test]
    fn map_degenerate_input_range() {
        assert_eq!(map(10, 10, 10, 1, 2), 1);
        assert_eq!(map(11, 10, 10, 1, 2), 2);
    }

    #[test]
    fn filter_moves_toward_input() {
        let out = filter(1000, 0, 72);
        assert_eq!(out, 280);
        let out = filter(0, 1000, 72);
        assert_eq!(out, 720);
    }

    #[test]
    fn filter_converges_exactly_on_constant_input() {
        let mut value = 100;
        for _ in 0..200 {
            value = filter(431, value, 72);
        }
        assert_eq!(value, 431);

        for _ in 0..200 {
            value = filter(12, value, 72);
        }
        assert_eq!(value, 12);
    }

    #[test]
    fn low_pass_seeds_with_first_sample() {
        let mut lpf = LowPassFilter::new(90);
        assert_eq!(lpf.filter(500), 500);
        assert!(lpf.filter(600) > 500);
        lpf.reset();
        assert_eq!(lpf.filter(42), 42);
    }
}
