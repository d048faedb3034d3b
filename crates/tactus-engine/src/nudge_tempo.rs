//! Momentary tempo nudge.
//!
//! While a nudge direction is held the strength ramps toward full scale;
//! on release it ramps back to zero. The engine maps strength onto a BPM
//! offset every update.

/// Full-scale ramp time is 1 / NUDGE_RATE seconds.
const NUDGE_RATE: f32 = 2.0;

#[derive(Debug, Default)]
pub struct NudgeTempo {
    direction: i32,
    strength: f32,
}

impl NudgeTempo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the held direction: -1, 0 or +1.
    pub fn set_direction(&mut self, direction: i32) {
        self.direction = direction.clamp(-1, 1);
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    /// Ramp the strength toward the held direction.
    pub fn update(&mut self, dt: f32) {
        let target = self.direction as f32;
        let step = NUDGE_RATE * dt;
        if self.strength < target {
            self.strength = (self.strength + step).min(target);
        } else {
            self.strength = (self.strength - step).max(target);
        }
    }

    /// Current nudge strength in [-1, 1].
    pub fn strength(&self) -> f32 {
        self.strength
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_up_while_held() {
        let mut nudge = NudgeTempo::new();
        nudge.set_direction(1);
        nudge.update(0.1);
        assert!((nudge.strength() - 0.2).abs() < 1e-6);
        for _ in 0..10 {
            nudge.update(0.1);
        }
        assert_eq!(nudge.strength(), 1.0);
    }

    #[test]
    fn returns_to_zero_on_release() {
        let mut nudge = NudgeTempo::new();
        nudge.set_direction(-1);
        for _ in 0..10 {
            nudge.update(0.1);
        }
        assert_eq!(nudge.strength(), -1.0);
        nudge.set_direction(0);
        for _ in 0..10 {
            nudge.update(0.1);
        }
        assert_eq!(nudge.strength(), 0.0);
    }

    #[test]
    fn direction_is_clamped() {
        let mut nudge = NudgeTempo::new();
        nudge.set_direction(5);
        assert_eq!(nudge.direction(), 1);
        nudge.set_direction(-3);
        assert_eq!(nudge.direction(), -1);
    }
}
