/// Longest frame fed into the accumulator; longer stalls are dropped rather
/// than replayed as a burst of ticks.
const MAX_FRAME_SECS: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct FixedTimestep {
    tick_rate: u32,
    dt: f64,
    accumulator: f64,
    ticks: u64,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            dt: 1.0 / f64::from(tick_rate),
            accumulator: 0.0,
            ticks: 0,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn accumulate(&mut self, frame_secs: f64) {
        self.accumulator += frame_secs.clamp(0.0, MAX_FRAME_SECS);
    }

    pub fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            self.ticks += 1;
            true
        } else {
            false
        }
    }

    pub fn sim_time(&self) -> f64 {
        self.ticks as f64 * self.dt
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn alpha(&self) -> f64 {
        self.accumulator / self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_whole_ticks() {
        let mut ts = FixedTimestep::new(50);

        ts.accumulate(0.05);
        assert!(ts.consume_tick());
        assert!(ts.consume_tick());
        assert!(!ts.consume_tick());
        assert_eq!(ts.ticks(), 2);
        assert!((ts.sim_time() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn long_stalls_are_clamped() {
        let mut ts = FixedTimestep::new(8);
        ts.accumulate(10.0);

        let mut ran = 0;
        while ts.consume_tick() {
            ran += 1;
        }
        assert_eq!(ran, 2);
        assert!(ts.alpha() < 1.0);
    }
}
