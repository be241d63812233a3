//! Frame-to-frame landmark stabilization.
//!
//! Owns one filter bank per landmark id. Two logical streams (user pose vs.
//! guideline pose) must each own their own [`LandmarkStabilizer`] so filter
//! histories never mix.

use std::collections::HashMap;

use crate::config::{FilterParams, StabilizerConfig};
use crate::landmark::Landmark;

use super::one_euro::OneEuroFilter;

const AXES: usize = 3;

/// Filter state for one landmark id (x, y, z channels + visibility history).
struct LandmarkChannel {
    axes: [OneEuroFilter; AXES],
    last_raw: [f32; AXES],
    last_output: [f32; AXES],
    seeded: [bool; AXES],
    visibility: Option<f32>,
}

impl LandmarkChannel {
    fn new(params: &FilterParams) -> Self {
        Self {
            axes: std::array::from_fn(|_| {
                OneEuroFilter::new(params.min_cutoff, params.beta, params.d_cutoff)
            }),
            last_raw: [0.0; AXES],
            last_output: [0.0; AXES],
            seeded: [false; AXES],
            visibility: None,
        }
    }
}

/// Per-stream landmark stabilizer.
///
/// Filter channels are created lazily on the first observation of an id and
/// persist until [`reset`](Self::reset). Calls must be made in frame order;
/// the filters are order-dependent.
pub struct LandmarkStabilizer {
    params: FilterParams,
    dead_zone: f32,
    visibility_jump: f32,
    visibility_blend: f32,
    channels: HashMap<u32, LandmarkChannel>,
}

impl LandmarkStabilizer {
    pub fn new(params: FilterParams, config: &StabilizerConfig) -> Self {
        Self {
            params,
            dead_zone: config.dead_zone,
            visibility_jump: config.visibility_jump,
            visibility_blend: config.visibility_blend,
            channels: HashMap::new(),
        }
    }

    /// Stabilize one frame. Output has the same length, order and ids as the
    /// input.
    pub fn stabilize(&mut self, landmarks: &[Landmark], t_secs: f64) -> Vec<Landmark> {
        landmarks
            .iter()
            .map(|lm| self.stabilize_one(lm, t_secs))
            .collect()
    }

    fn stabilize_one(&mut self, lm: &Landmark, t_secs: f64) -> Landmark {
        let params = self.params;
        let ch = self
            .channels
            .entry(lm.id)
            .or_insert_with(|| LandmarkChannel::new(&params));

        let mut out = [0.0f32; AXES];
        for axis in 0..AXES {
            let raw = lm.axis(axis);

            if !raw.is_finite() {
                // Reseed: hold the last stabilized value and let the next
                // finite sample count as a first observation.
                ch.axes[axis].reset();
                ch.seeded[axis] = false;
                ch.last_raw[axis] = ch.last_output[axis];
                out[axis] = ch.last_output[axis];
                continue;
            }

            let input = if ch.seeded[axis] && (raw - ch.last_raw[axis]).abs() < self.dead_zone {
                // Sub-perceptible jitter: feed the previous stabilized value
                // so the filter output holds exactly still.
                ch.last_output[axis]
            } else {
                raw
            };

            let filtered = ch.axes[axis].filter(input, t_secs);
            ch.seeded[axis] = true;
            ch.last_raw[axis] = raw;
            ch.last_output[axis] = filtered;
            out[axis] = filtered;
        }

        let visibility = match (lm.visibility, ch.visibility) {
            (Some(new), _) if !new.is_finite() => ch.visibility,
            (Some(new), Some(prev)) if (new - prev).abs() > self.visibility_jump => {
                Some((1.0 - self.visibility_blend) * prev + self.visibility_blend * new)
            }
            (Some(new), _) => Some(new),
            (None, _) => None,
        };
        if visibility.is_some() {
            ch.visibility = visibility;
        }

        Landmark {
            id: lm.id,
            x: out[0],
            y: out[1],
            z: out[2],
            visibility,
        }
    }

    /// Drop all filter state and history. Use when the tracked subject
    /// changes or the stream restarts.
    pub fn reset(&mut self) {
        self.channels.clear();
    }
}
