//! Linear followers: value animators that ramp from the previous value to
//! the latest target.
//!
//! A follower is mathematically a ramp — `value = lerp(start, end,
//! progress)` with progress advancing from 0 to 1. Retargeting snaps
//! `start` to the current value so motion stays continuous no matter how
//! often the target moves.

use crate::math::{Vec3, lerp};

/// Scalar linear follower.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFollower {
    start: f32,
    end: f32,
    progress: f32,
}

impl LinearFollower {
    /// Follower resting at `value` (no transition pending).
    pub fn at(value: f32) -> Self {
        Self {
            start: value,
            end: value,
            progress: 1.0,
        }
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> f32 {
        lerp(self.start, self.end, self.progress)
    }

    /// The target being approached.
    #[inline]
    pub fn target(&self) -> f32 {
        self.end
    }

    /// Slope per update of size `delta_t` (`delta_t` is the fraction of
    /// the transition covered by one update).
    #[inline]
    pub fn derivative(&self, delta_t: f32) -> f32 {
        (self.end - self.start) * delta_t
    }

    /// Retarget; safe to call every frame. A changed target restarts the
    /// ramp from the current value.
    pub fn set_target(&mut self, target: f32) {
        if target != self.end {
            self.start = self.value();
            self.end = target;
            self.progress = 0.0;
        }
    }

    /// Advance by `delta_t` (fraction of the transition per update) and
    /// return the value from *before* the advance.
    pub fn update(&mut self, delta_t: f32) -> f32 {
        let result = self.value();
        self.progress = (self.progress + delta_t).min(1.0);
        result
    }

    /// [`set_target`](Self::set_target) then [`update`](Self::update).
    pub fn update_target(&mut self, target: f32, delta_t: f32) -> f32 {
        self.set_target(target);
        self.update(delta_t)
    }

    /// Jump to `target` with no transition.
    pub fn jump(&mut self, target: f32) {
        self.start = target;
        self.end = target;
        self.progress = 1.0;
    }

    /// Begin a fresh ramp from `from` to `to`, ignoring the current value.
    ///
    /// Used to schedule block-synchronous ramps where both endpoints are
    /// known up front.
    pub fn ramp(&mut self, from: f32, to: f32) {
        self.start = from;
        self.end = to;
        self.progress = 0.0;
    }
}

/// Three-component linear follower for positions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFollower3 {
    start: Vec3,
    end: Vec3,
    progress: f32,
}

impl LinearFollower3 {
    /// Follower resting at `value`.
    pub fn at(value: Vec3) -> Self {
        Self {
            start: value,
            end: value,
            progress: 1.0,
        }
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> Vec3 {
        Vec3::lerp(self.start, self.end, self.progress)
    }

    /// The target being approached.
    #[inline]
    pub fn target(&self) -> Vec3 {
        self.end
    }

    /// Slope per update of size `delta_t`.
    #[inline]
    pub fn derivative(&self, delta_t: f32) -> Vec3 {
        self.end.sub(self.start).scale(delta_t)
    }

    /// Retarget; a changed target restarts the ramp from the current
    /// value.
    pub fn set_target(&mut self, target: Vec3) {
        if target != self.end {
            self.start = self.value();
            self.end = target;
            self.progress = 0.0;
        }
    }

    /// Advance by `delta_t` and return the value from before the advance.
    pub fn update(&mut self, delta_t: f32) -> Vec3 {
        let result = self.value();
        self.progress = (self.progress + delta_t).min(1.0);
        result
    }

    /// [`set_target`](Self::set_target) then [`update`](Self::update).
    pub fn update_target(&mut self, target: Vec3, delta_t: f32) -> Vec3 {
        self.set_target(target);
        self.update(delta_t)
    }

    /// Jump to `target` with no transition.
    pub fn jump(&mut self, target: Vec3) {
        self.start = target;
        self.end = target;
        self.progress = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_linearly_to_target() {
        let mut follower = LinearFollower::at(0.0);
        follower.set_target(10.0);
        for step in 0..10 {
            let value = follower.update(0.1);
            assert!(
                (value - step as f32).abs() < 1e-4,
                "step {step}: {value}"
            );
        }
        assert!((follower.value() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn retarget_restarts_from_current_value() {
        let mut follower = LinearFollower::at(0.0);
        follower.set_target(10.0);
        follower.update(0.5);
        follower.update(0.0);
        // Halfway there; a new target must ramp from 5, not from 0 or 10.
        follower.set_target(0.0);
        assert!((follower.value() - 5.0).abs() < 1e-4);
        follower.update(1.0);
        assert!((follower.value() - 0.0).abs() < 1e-4);
    }

    #[test]
    fn progress_saturates() {
        let mut follower = LinearFollower::at(1.0);
        follower.set_target(2.0);
        for _ in 0..100 {
            follower.update(0.3);
        }
        assert!((follower.value() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn same_target_does_not_restart() {
        let mut follower = LinearFollower::at(0.0);
        follower.set_target(4.0);
        follower.update(0.5);
        follower.set_target(4.0);
        assert!((follower.value() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn jump_skips_transition() {
        let mut follower = LinearFollower::at(0.0);
        follower.jump(7.0);
        assert_eq!(follower.value(), 7.0);
        assert_eq!(follower.target(), 7.0);
    }

    #[test]
    fn vector_follower_tracks_positions() {
        let mut follower = LinearFollower3::at(Vec3::ZERO);
        follower.set_target(Vec3::new(2.0, 4.0, 6.0));
        follower.update(0.5);
        follower.update(0.0);
        let mid = follower.value();
        assert!((mid.x - 1.0).abs() < 1e-4);
        assert!((mid.y - 2.0).abs() < 1e-4);
        assert!((mid.z - 3.0).abs() < 1e-4);
    }
}
