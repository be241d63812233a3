//! One Euro filter primitives for per-axis landmark smoothing.
//!
//! Timestamps come from the frame producer, not from the wall clock, so the
//! same sequence of frames always filters to the same output.

/// Low-pass filter component
///
/// `alpha` must stay in (0, 1]; callers derive it via [`smoothing_factor`].
pub struct LowPassFilter {
    alpha: f32,
    prev: Option<f32>,
}

impl LowPassFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: None }
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    pub fn filter(&mut self, value: f32) -> f32 {
        match self.prev {
            Some(prev) => {
                let result = self.alpha * value + (1.0 - self.alpha) * prev;
                self.prev = Some(result);
                result
            }
            None => {
                self.prev = Some(value);
                value
            }
        }
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
pub fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

/// One Euro Filter for a single scalar signal.
///
/// The cutoff adapts to the estimated signal speed: slow movement is smoothed
/// heavily, fast movement passes through with little lag.
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    last_value: Option<f32>,
    last_time: Option<f64>,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
            x_filter: LowPassFilter::new(1.0),
            dx_filter: LowPassFilter::new(1.0),
            last_value: None,
            last_time: None,
        }
    }

    /// Filter one sample at timestamp `t_secs` (seconds, monotonic per signal).
    ///
    /// The first call seeds the filter and returns `value` unchanged.
    /// A non-increasing timestamp falls back to dt = 1.0 instead of letting
    /// the velocity estimate blow up.
    pub fn filter(&mut self, value: f32, t_secs: f64) -> f32 {
        let dt = match self.last_time {
            Some(last) => {
                let d = (t_secs - last) as f32;
                if d > 0.0 {
                    d
                } else {
                    1.0
                }
            }
            None => 1.0,
        };

        let dx = match self.last_value {
            Some(prev) => (value - prev) / dt,
            None => 0.0,
        };
        self.last_value = Some(value);
        self.last_time = Some(t_secs);

        self.dx_filter.set_alpha(smoothing_factor(dt, self.d_cutoff));
        let edx = self.dx_filter.filter(dx);

        let cutoff = self.min_cutoff + self.beta * edx.abs();
        self.x_filter.set_alpha(smoothing_factor(dt, cutoff));
        self.x_filter.filter(value)
    }

    pub fn reset(&mut self) {
        self.x_filter.reset();
        self.dx_filter.reset();
        self.last_value = None;
        self.last_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_factor_bounds() {
        // alpha should be between 0 and 1
        for &cutoff in &[0.1, 1.0, 10.0, 100.0] {
            for &te in &[0.001, 0.01, 0.033, 0.1] {
                let alpha = smoothing_factor(te, cutoff);
                assert!(
                    alpha > 0.0 && alpha < 1.0,
                    "alpha={} for te={}, cutoff={}",
                    alpha,
                    te,
                    cutoff
                );
            }
        }
    }

    #[test]
    fn test_low_pass_first_passthrough() {
        let mut f = LowPassFilter::new(0.5);
        assert_eq!(f.filter(3.0), 3.0);
    }

    #[test]
    fn test_low_pass_blend() {
        let mut f = LowPassFilter::new(0.25);
        f.filter(0.0);
        let result = f.filter(8.0);
        assert!((result - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_low_pass_reset() {
        let mut f = LowPassFilter::new(0.5);
        f.filter(1.0);
        f.reset();
        assert_eq!(f.filter(7.0), 7.0);
    }

    #[test]
    fn test_one_euro_first_passthrough() {
        let mut f = OneEuroFilter::new(1.0, 0.0, 1.0);
        assert_eq!(f.filter(5.0, 0.0), 5.0);
    }

    #[test]
    fn test_one_euro_converges_to_constant() {
        // Repeated identical input is a fixed point of the filter
        let mut f = OneEuroFilter::new(1.0, 0.0, 1.0);
        let mut out = 0.0;
        f.filter(0.0, 0.0);
        for i in 1..200 {
            out = f.filter(4.2, i as f64 * 0.033);
        }
        assert!((out - 4.2).abs() < 1e-3, "did not converge: {}", out);

        // Once converged, further identical samples stay put
        let next = f.filter(4.2, 200.0 * 0.033);
        assert!((next - out).abs() <= (out - 4.2).abs().max(1e-6));
    }

    #[test]
    fn test_one_euro_step_no_overshoot() {
        let mut f = OneEuroFilter::new(1.0, 0.5, 1.0);
        let mut t = 0.0;
        for _ in 0..10 {
            f.filter(1.0, t);
            t += 0.033;
        }
        let mut prev = 1.0;
        for _ in 0..100 {
            let out = f.filter(2.0, t);
            t += 0.033;
            // monotone approach, bounded by the two plateau values
            assert!(out >= prev - 1e-6, "not monotonic: {} -> {}", prev, out);
            assert!((1.0..=2.0).contains(&out), "overshoot: {}", out);
            prev = out;
        }
        assert!((prev - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_one_euro_non_increasing_timestamp() {
        let mut f = OneEuroFilter::new(1.0, 0.1, 1.0);
        f.filter(1.0, 1.0);
        // Same timestamp again: dt falls back to 1.0, output stays finite
        let out = f.filter(2.0, 1.0);
        assert!(out.is_finite());
        assert!((1.0..=2.0).contains(&out));
    }

    #[test]
    fn test_one_euro_high_beta_responsive() {
        // High beta: fast movements should pass through with less filtering
        let mut f_low = OneEuroFilter::new(1.0, 0.0, 1.0);
        let mut f_high = OneEuroFilter::new(1.0, 1.0, 1.0);

        f_low.filter(0.0, 0.0);
        f_high.filter(0.0, 0.0);

        let r_low = f_low.filter(10.0, 0.033);
        let r_high = f_high.filter(10.0, 0.033);

        assert!(
            r_high > r_low,
            "high beta ({}) should track faster than low beta ({})",
            r_high,
            r_low
        );
    }

    #[test]
    fn test_one_euro_reset() {
        let mut f = OneEuroFilter::new(1.0, 0.1, 1.0);
        f.filter(1.0, 0.0);
        f.filter(2.0, 0.033);
        f.reset();
        // After reset, first sample passes through again
        assert_eq!(f.filter(9.0, 0.066), 9.0);
    }
}
