//! Attack/Decay/Sustain/Release amplitude envelope.
//!
//! Transitions are time-driven by delta milliseconds. An early release
//! (before the sustain stage) remembers the amplitude it started from so
//! the output never jumps.

use crate::math::{db_to_amp, lerp};

/// Envelope timing and levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrConfig {
    /// Attack time in ms (zero to full volume).
    pub attack_ms: f32,
    /// Decay time in ms (full volume to sustain volume).
    pub decay_ms: f32,
    /// Sustain gain in dB (0.0 is full volume).
    pub sustain_db: f32,
    /// Release time in ms.
    pub release_ms: f32,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack_ms: 5.0,
            decay_ms: 50.0,
            sustain_db: 0.0,
            release_ms: 100.0,
        }
    }
}

/// Which part of the envelope an instance is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdsrStage {
    /// Inactive; amplitude is zero.
    #[default]
    Stop,
    /// Rising toward full volume.
    Attack,
    /// Falling toward sustain volume.
    Decay,
    /// Holding sustain volume.
    Sustain,
    /// Falling toward zero.
    Release,
}

/// Runtime state of one envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdsrInstance {
    stage: AdsrStage,
    /// Progress along the current stage, 0 to 1.
    progress: f32,
    /// Amplitude the release started from, so an early release does not
    /// jump to the sustain level first.
    release_start_amp: f32,
}

impl AdsrInstance {
    /// Begin the attack stage from silence.
    pub fn start(&mut self) {
        self.stage = AdsrStage::Attack;
        self.progress = 0.0;
        self.release_start_amp = 0.0;
    }

    /// Trigger the release from wherever the envelope currently is.
    pub fn release(&mut self, config: &AdsrConfig) {
        if self.stage != AdsrStage::Release && self.stage != AdsrStage::Stop {
            self.release_start_amp = self.value(config);
            self.stage = AdsrStage::Release;
            self.progress = 0.0;
        }
    }

    /// Current stage.
    #[inline]
    pub fn stage(&self) -> AdsrStage {
        self.stage
    }

    /// Whether the envelope has fully finished.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stage == AdsrStage::Stop
    }

    /// Amplitude at the current position.
    pub fn value(&self, config: &AdsrConfig) -> f32 {
        let sustain = db_to_amp(config.sustain_db);
        match self.stage {
            AdsrStage::Stop => 0.0,
            AdsrStage::Attack => self.progress,
            AdsrStage::Decay => lerp(1.0, sustain, self.progress),
            AdsrStage::Sustain => sustain,
            AdsrStage::Release => lerp(self.release_start_amp, 0.0, self.progress),
        }
    }

    /// Advance by `delta_ms` and return the amplitude from before the
    /// advance.
    pub fn update(&mut self, config: &AdsrConfig, delta_ms: f32) -> f32 {
        let result = self.value(config);
        let stage_ms = match self.stage {
            AdsrStage::Stop | AdsrStage::Sustain => return result,
            AdsrStage::Attack => config.attack_ms,
            AdsrStage::Decay => config.decay_ms,
            AdsrStage::Release => config.release_ms,
        };
        if stage_ms <= 0.0 {
            self.progress = 1.0;
        } else {
            self.progress += delta_ms / stage_ms;
        }
        if self.progress >= 1.0 {
            self.progress = 0.0;
            self.stage = match self.stage {
                AdsrStage::Attack => AdsrStage::Decay,
                AdsrStage::Decay => AdsrStage::Sustain,
                AdsrStage::Release => AdsrStage::Stop,
                other => other,
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdsrConfig {
        AdsrConfig {
            attack_ms: 10.0,
            decay_ms: 10.0,
            sustain_db: -6.0,
            release_ms: 10.0,
        }
    }

    #[test]
    fn walks_through_all_stages() {
        let config = config();
        let mut env = AdsrInstance::default();
        assert!(env.is_stopped());
        env.start();
        assert_eq!(env.stage(), AdsrStage::Attack);

        // 10 ms of attack in 1 ms steps.
        for _ in 0..10 {
            env.update(&config, 1.0);
        }
        assert_eq!(env.stage(), AdsrStage::Decay);
        for _ in 0..10 {
            env.update(&config, 1.0);
        }
        assert_eq!(env.stage(), AdsrStage::Sustain);
        let sustain = env.value(&config);
        assert!((sustain - db_to_amp(-6.0)).abs() < 1e-4);

        env.release(&config);
        for _ in 0..10 {
            env.update(&config, 1.0);
        }
        assert!(env.is_stopped());
        assert_eq!(env.value(&config), 0.0);
    }

    #[test]
    fn early_release_does_not_jump() {
        let config = config();
        let mut env = AdsrInstance::default();
        env.start();
        // Halfway through the attack the amplitude is ~0.5.
        for _ in 0..5 {
            env.update(&config, 1.0);
        }
        let before = env.value(&config);
        env.release(&config);
        let after = env.value(&config);
        assert!(
            (before - after).abs() < 1e-4,
            "release must continue from {before}, got {after}"
        );
        assert!(env.update(&config, 1.0) <= before + 1e-4);
    }

    #[test]
    fn attack_rises_monotonically() {
        let config = config();
        let mut env = AdsrInstance::default();
        env.start();
        let mut last = -1.0;
        for _ in 0..10 {
            let value = env.update(&config, 1.0);
            assert!(value >= last);
            last = value;
        }
    }

    #[test]
    fn zero_attack_reaches_full_volume_immediately() {
        let config = AdsrConfig {
            attack_ms: 0.0,
            ..config()
        };
        let mut env = AdsrInstance::default();
        env.start();
        env.update(&config, 0.1);
        assert_eq!(env.stage(), AdsrStage::Decay);
    }
}
