//! Real-input FFT primitive.
//!
//! `microfft` only offers one function per size, so the size is checked once in
//! [`init_transform`] and dispatched on afterwards.

use crate::config;
use crate::error::ConfigError;
use crate::testsignal;
use core::f32::consts::PI;

pub use microfft::Complex32;

/// Every size [`init_transform`] accepts.
pub const SUPPORTED_SIZES: [usize; 8] = [32, 64, 128, 256, 512, 1024, 2048, 4096];

const _: () = assert!(SUPPORTED_SIZES[0] == config::fft::MIN_SIZE);
const _: () = assert!(SUPPORTED_SIZES[SUPPORTED_SIZES.len() - 1] == config::fft::MAX_SIZE);

/// Window function applied to the normalized samples before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Rectangle,
    Hann,
}

impl Window {
    pub fn apply_to(self, data: &mut [f32]) {
        match self {
            Window::Rectangle => {
                // no scaling
            }
            Window::Hann => hann(data),
        }
    }
}

fn hann(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let denom = (n - 1) as f32;
    for (i, v) in buffer.iter_mut().enumerate() {
        // Hann window: w[n] = 0.5 * (1 - cos(2π n / (N-1)))
        let phase = (i as f32) / denom;
        let w = 0.5 * (1.0 - libm::cosf(2.0 * PI * phase));
        *v *= w;
    }
}

/// A validated transform size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    size: usize,
}

/// Validates `size` once, before the main loop.
pub fn init_transform(size: usize) -> Result<Transform, ConfigError> {
    if SUPPORTED_SIZES.contains(&size) {
        Ok(Transform { size })
    } else {
        Err(ConfigError::UnsupportedTransformSize(size))
    }
}

impl Transform {
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform, in place.
    ///
    /// The returned bins alias `input`: bin `k` occupies `input[2k]` (re) and
    /// `input[2k + 1]` (im). There are `size / 2` of them, DC first; the real-valued
    /// Nyquist bin is packed into the imaginary part of bin 0.
    ///
    /// Panics if `input` is not exactly `size` long.
    pub fn forward<'a>(&self, input: &'a mut [f32]) -> &'a mut [Complex32] {
        assert_eq!(input.len(), self.size, "transform input length");

        macro_rules! dispatch {
            ($size:expr, $input:expr; $($n:literal => $rfft:ident,)*) => {
                match $size {
                    $($n => &mut microfft::real::$rfft(as_array($input))[..],)*
                    _ => unreachable!("size was validated by init_transform"),
                }
            };
        }

        dispatch! {
            self.size, input;
            32 => rfft_32,
            64 => rfft_64,
            128 => rfft_128,
            256 => rfft_256,
            512 => rfft_512,
            1024 => rfft_1024,
            2048 => rfft_2048,
            4096 => rfft_4096,
        }
    }
}

fn as_array<const M: usize>(s: &mut [f32]) -> &mut [f32; M] {
    match s.try_into() {
        Ok(array) => array,
        Err(_) => unreachable!("length was checked against the transform size"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub size: usize,
    pub micros: u64,
}

/// Times one forward transform of a full-scale sine at every supported size.
///
/// `now_us` is any monotonic microsecond counter.
pub fn measure_performance(
    scratch: &mut [f32; config::fft::MAX_SIZE],
    now_us: fn() -> u64,
) -> [Measurement; SUPPORTED_SIZES.len()] {
    SUPPORTED_SIZES.map(|size| {
        let input = &mut scratch[..size];
        // one cycle per window
        for (x, value) in input
            .iter_mut()
            .zip(testsignal::sine(size, 1.0, size as u32, 1.0))
        {
            *x = value;
        }

        let transform = Transform { size };
        let start = now_us();
        let bins = transform.forward(input);
        let micros = now_us().saturating_sub(start);
        core::hint::black_box(bins);

        Measurement { size, micros }
    })
}

pub fn log_performance(measurements: &[Measurement]) {
    log::info!("FFT performance: size, duration (us)");
    for m in measurements {
        log::info!("{:>6} {:>8}", m.size, m.micros);
    }
}
