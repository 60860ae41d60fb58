//! Spectrum → one color, via three frequency bands.

use crate::config;
use crate::Color;

/// Band mean that saturates each channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandThresholds {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            low: config::bands::LOW_THRESHOLD,
            mid: config::bands::MID_THRESHOLD,
            high: config::bands::HIGH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMapper {
    thresholds: BandThresholds,
    ceiling: u8,
}

impl Default for BandMapper {
    fn default() -> Self {
        Self::new(BandThresholds::default(), config::bands::CEILING)
    }
}

impl BandMapper {
    pub fn new(thresholds: BandThresholds, ceiling: u8) -> Self {
        Self {
            thresholds,
            ceiling,
        }
    }

    /// Low band drives red, mid band green, high band blue.
    pub fn map_to_color(&self, spectrum: &[f32]) -> Color {
        let [low, mid, high] = band_means(spectrum);
        let ceiling = f32::from(self.ceiling);
        Color {
            r: map(low, 0.0, self.thresholds.low, 0.0, ceiling) as u8,
            g: map(mid, 0.0, self.thresholds.mid, 0.0, ceiling) as u8,
            b: map(high, 0.0, self.thresholds.high, 0.0, ceiling) as u8,
        }
    }
}

/// Means of `[0, L/3)`, `[L/3, 2*(L/3))` and `[2*(L/3), L)`.
///
/// With `L` not divisible by 3 the high band picks up the remainder.
pub fn band_means(spectrum: &[f32]) -> [f32; 3] {
    let third = spectrum.len() / 3;
    let (low, rest) = spectrum.split_at(third);
    let (mid, high) = rest.split_at(third);
    [mean(low), mean(mid), mean(high)]
}

fn mean(band: &[f32]) -> f32 {
    if band.is_empty() {
        return 0.0;
    }
    band.iter().sum::<f32>() / band.len() as f32
}

/// Linear rescale of `value` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// `value` is clamped into the input range first, so the result never leaves the
/// output range. A degenerate input range maps everything at or above `in_max`
/// to `out_max`.
pub fn map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    if in_max <= in_min {
        return if value >= in_max { out_max } else { out_min };
    }
    let value = value.clamp(in_min, in_max);
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: BandThresholds = BandThresholds {
        low: 1.0,
        mid: 2.0,
        high: 4.0,
    };

    #[test]
    fn map_clamps_and_rescales() {
        assert_eq!(map(-1.0, 0.0, 1.0, 0.0, 255.0), 0.0);
        assert_eq!(map(0.5, 0.0, 1.0, 0.0, 200.0), 100.0);
        assert_eq!(map(7.0, 0.0, 1.0, 0.0, 255.0), 255.0);
        assert_eq!(map(0.0, 0.0, 0.0, 0.0, 255.0), 255.0);
    }

    #[test]
    fn bands_split_in_thirds() {
        let spectrum = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0];
        assert_eq!(band_means(&spectrum), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn short_spectrum_has_empty_bands() {
        assert_eq!(band_means(&[]), [0.0; 3]);
        assert_eq!(band_means(&[6.0, 0.0]), [0.0, 0.0, 3.0]);
    }

    #[test]
    fn silence_is_black() {
        let mapper = BandMapper::new(THRESHOLDS, 255);
        assert_eq!(mapper.map_to_color(&[0.0; 12]), crate::BLACK);
    }

    #[test]
    fn pure_dc_only_lights_red() {
        let mapper = BandMapper::new(THRESHOLDS, 255);
        let mut spectrum = [0.0; 12];
        spectrum[0] = 1000.0;
        assert_eq!(mapper.map_to_color(&spectrum), Color { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn loud_input_saturates_at_ceiling() {
        let mapper = BandMapper::new(THRESHOLDS, 200);
        let color = mapper.map_to_color(&[100.0; 12]);
        assert_eq!(color, Color { r: 200, g: 200, b: 200 });
    }

    #[test]
    fn each_band_drives_its_channel() {
        let mapper = BandMapper::new(THRESHOLDS, 255);
        let mut spectrum = [0.0; 12];
        // mid band sits at half its threshold
        spectrum[4..8].fill(1.0);
        assert_eq!(mapper.map_to_color(&spectrum), Color { r: 0, g: 127, b: 0 });

        spectrum = [0.0; 12];
        spectrum[8..].fill(4.0);
        assert_eq!(mapper.map_to_color(&spectrum), Color { r: 0, g: 0, b: 255 });
    }
}
