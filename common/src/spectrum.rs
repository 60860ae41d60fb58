//! Sample window → magnitude spectrum.

use crate::capture::SampleWindow;
use crate::error::ConfigError;
use crate::fft::{self, Transform, Window};
use core::ops::Deref;

/// Maps `i16` full scale to 1.0.
const SAMPLE_SCALE: f32 = 1.0 / 32768.0;

/// Owns the transform and its working region, so analyzing never allocates.
pub struct Analyzer<const N: usize> {
    transform: Transform,
    window: Window,
    region: [f32; N],
}

impl<const N: usize> Analyzer<N> {
    pub fn new(window: Window) -> Result<Self, ConfigError> {
        Ok(Self {
            transform: fft::init_transform(N)?,
            window,
            region: [0.0; N],
        })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Magnitudes of bins `0..N/2`, in units of full-scale sine amplitude.
    ///
    /// A sine of amplitude `a` (relative to `i16` full scale) centered on bin `k`
    /// yields `a` at bin `k` with a rectangular window. The DC bin is scaled so a
    /// constant offset `c` yields `c`. The Nyquist bin is dropped.
    pub fn analyze(&mut self, window: &SampleWindow<N>) -> Spectrum<'_> {
        for (x, &sample) in self.region.iter_mut().zip(window.iter()) {
            *x = f32::from(sample) * SAMPLE_SCALE;
        }
        self.window.apply_to(&mut self.region);

        let bins = self.transform.forward(&mut self.region);
        bins[0].im = 0.0;

        let dc_scale = 1.0 / N as f32;
        let scale = 2.0 / N as f32;

        // Magnitudes are packed into the front of the region as they are computed.
        // Magnitude `i` lands in the f32 slot `i`, which belongs to bin `i / 2`; that
        // bin has already been consumed because `i / 2 <= i`.
        for i in 0..bins.len() {
            let magnitude = libm::sqrtf(bins[i].norm_sqr());
            let magnitude = magnitude * if i == 0 { dc_scale } else { scale };
            let slot = &mut bins[i / 2];
            if i % 2 == 0 {
                slot.re = magnitude;
            } else {
                slot.im = magnitude;
            }
        }

        Spectrum {
            magnitudes: &self.region[..N / 2],
            bin_width_hz: 0.0,
        }
    }

    /// Like [`Analyzer::analyze`], but the spectrum knows how far apart its bins are.
    pub fn analyze_at(&mut self, window: &SampleWindow<N>, sample_rate_hz: u32) -> Spectrum<'_> {
        let mut spectrum = self.analyze(window);
        spectrum.bin_width_hz = sample_rate_hz as f32 / N as f32;
        spectrum
    }
}

/// Non-negative magnitudes, valid until the next analysis.
#[derive(Debug, Clone, Copy)]
pub struct Spectrum<'a> {
    magnitudes: &'a [f32],
    bin_width_hz: f32,
}

impl Spectrum<'_> {
    /// Strongest bin above DC, with its magnitude.
    pub fn peak(&self) -> Option<(usize, f32)> {
        self.magnitudes
            .iter()
            .copied()
            .enumerate()
            .skip(1)
            .fold(None, |best, (i, m)| match best {
                Some((_, best_m)) if best_m >= m => best,
                _ => Some((i, m)),
            })
    }

    /// Center frequency of `bin`, or 0.0 if the sample rate is unknown.
    pub fn bin_frequency_hz(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_width_hz
    }
}

impl Deref for Spectrum<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.magnitudes
    }
}
