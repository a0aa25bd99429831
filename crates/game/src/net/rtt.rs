use std::collections::VecDeque;

const ALPHA: f32 = 0.125;
const BETA: f32 = 0.25;
const DEFAULT_MAX_PENDING: usize = 256;

#[derive(Debug, Clone)]
pub struct RttEstimator {
    srtt: f32,
    rtt_var: f32,
    samples: u32,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl RttEstimator {
    pub fn new(initial_ms: f32) -> Self {
        Self {
            srtt: initial_ms,
            rtt_var: initial_ms / 2.0,
            samples: 0,
        }
    }

    pub fn sample(&mut self, rtt_ms: f32) {
        if !rtt_ms.is_finite() || rtt_ms < 0.0 {
            return;
        }
        if self.samples == 0 {
            self.srtt = rtt_ms;
            self.rtt_var = rtt_ms / 2.0;
        } else {
            let diff = (rtt_ms - self.srtt).abs();
            self.rtt_var = (1.0 - BETA) * self.rtt_var + BETA * diff;
            self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt_ms;
        }
        self.samples += 1;
    }

    pub fn srtt_ms(&self) -> f32 {
        self.srtt
    }

    pub fn srtt_secs(&self) -> f32 {
        self.srtt / 1000.0
    }

    pub fn rtt_var_ms(&self) -> f32 {
        self.rtt_var
    }

    pub fn sample_count(&self) -> u32 {
        self.samples
    }
}

#[derive(Debug)]
pub struct SendTimes {
    pending: VecDeque<(u32, f64)>,
    max_pending: usize,
}

impl Default for SendTimes {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl SendTimes {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn track(&mut self, sequence: u32, sent_at: f64) {
        while self.pending.len() >= self.max_pending {
            self.pending.pop_front();
        }
        self.pending.push_back((sequence, sent_at));
    }

    pub fn take(&mut self, sequence: u32) -> Option<f64> {
        let mut found = None;
        while let Some(&(seq, sent_at)) = self.pending.front() {
            if seq > sequence {
                break;
            }
            if seq == sequence {
                found = Some(sent_at);
            }
            self.pending.pop_front();
        }
        found
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_estimate() {
        let mut rtt = RttEstimator::default();
        rtt.sample(40.0);
        assert_eq!(rtt.srtt_ms(), 40.0);
        rtt.sample(80.0);
        assert!((rtt.srtt_ms() - 45.0).abs() < 1e-4);
        assert!(rtt.rtt_var_ms() > 20.0);
    }

    #[test]
    fn ignores_garbage_samples() {
        let mut rtt = RttEstimator::new(50.0);
        rtt.sample(f32::NAN);
        rtt.sample(-3.0);
        assert_eq!(rtt.sample_count(), 0);
        assert_eq!(rtt.srtt_ms(), 50.0);
    }

    #[test]
    fn send_times_take_discards_older() {
        let mut times = SendTimes::new(8);
        for seq in 1..=5 {
            times.track(seq, seq as f64);
        }
        assert_eq!(times.take(3), Some(3.0));
        assert_eq!(times.len(), 2);
        assert_eq!(times.take(2), None);
        assert_eq!(times.take(5), Some(5.0));
        assert!(times.is_empty());
    }
}
