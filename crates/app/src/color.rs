//! Clear color animation.

use glam::Vec3;

/// Animates one RGB channel at a time.
///
/// The active channel moves by `step` each frame. Once it reaches either
/// bound its direction flips and the next channel (red, green, blue, then
/// red again) takes over.
#[derive(Clone, Debug)]
pub struct ColorCycle {
    value: Vec3,
    direction: Vec3,
    channel: usize,
    step: f32,
}

impl ColorCycle {
    /// Starts from black with red active and every channel rising.
    pub fn new(step: f32) -> Self {
        Self {
            value: Vec3::ZERO,
            direction: Vec3::ONE,
            channel: 0,
            step,
        }
    }

    /// Advances the active channel by one step.
    pub fn advance(&mut self) {
        let i = self.channel;
        let next = (self.value[i] + self.step * self.direction[i]).clamp(0.0, 1.0);
        self.value[i] = next;

        if next >= 1.0 || next <= 0.0 {
            self.direction[i] = -self.direction[i];
            self.channel = (i + 1) % 3;
        }
    }

    #[inline]
    pub fn rgb(&self) -> Vec3 {
        self.value
    }

    /// Opaque RGBA clear value.
    #[inline]
    pub fn rgba(&self) -> [f32; 4] {
        self.value.extend(1.0).to_array()
    }

    /// 0 = red, 1 = green, 2 = blue.
    #[inline]
    pub fn active_channel(&self) -> usize {
        self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_black_and_opaque() {
        let colors = ColorCycle::new(0.1);
        assert_eq!(colors.rgba(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(colors.active_channel(), 0);
    }

    #[test]
    fn test_only_active_channel_moves() {
        let mut colors = ColorCycle::new(0.1);
        colors.advance();
        colors.advance();
        let rgb = colors.rgb();
        assert!((rgb.x - 0.2).abs() < 1e-6);
        assert_eq!(rgb.y, 0.0);
        assert_eq!(rgb.z, 0.0);
    }

    #[test]
    fn test_channels_hand_over_at_bounds() {
        let mut colors = ColorCycle::new(0.5);
        let mut seen = Vec::new();
        for _ in 0..8 {
            colors.advance();
            seen.push((colors.rgb().to_array(), colors.active_channel()));
        }

        assert_eq!(
            seen,
            vec![
                ([0.5, 0.0, 0.0], 0),
                ([1.0, 0.0, 0.0], 1),
                ([1.0, 0.5, 0.0], 1),
                ([1.0, 1.0, 0.0], 2),
                ([1.0, 1.0, 0.5], 2),
                ([1.0, 1.0, 1.0], 0),
                // Red now falls.
                ([0.5, 1.0, 1.0], 0),
                ([0.0, 1.0, 1.0], 1),
            ]
        );
    }

    #[test]
    fn test_values_stay_in_range() {
        let mut colors = ColorCycle::new(0.1);
        for _ in 0..1000 {
            colors.advance();
            let rgb = colors.rgb();
            assert!(rgb.cmpge(Vec3::ZERO).all() && rgb.cmple(Vec3::ONE).all());
        }
    }
}
