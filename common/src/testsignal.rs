//! Synthetic input, for tests, benchmarks, and `config::debug::FAKE_INPUT_DATA`.

use core::f32::consts::PI;

/// `len` samples of `amplitude * sin(2 pi f t)`, normalized to -1.0..1.0 full scale.
pub fn sine(
    len: usize,
    frequency_hz: f32,
    sample_rate_hz: u32,
    amplitude: f32,
) -> impl Iterator<Item = f32> {
    let step = 2.0 * PI * frequency_hz / sample_rate_hz as f32;
    (0..len).map(move |i| amplitude * libm::sinf(step * i as f32))
}

/// Fills `out` with a sine, quantized to the capture's integer domain.
pub fn fill_sine(out: &mut [i16], frequency_hz: f32, sample_rate_hz: u32, amplitude: f32) {
    let len = out.len();
    for (x, value) in out
        .iter_mut()
        .zip(sine(len, frequency_hz, sample_rate_hz, amplitude))
    {
        // float to int casts saturate
        *x = (value * f32::from(i16::MAX)) as i16;
    }
}

/// Frequency that lands exactly on `bin` of an `fft_size` transform.
pub fn bin_center_hz(bin: usize, fft_size: usize, sample_rate_hz: u32) -> f32 {
    bin as f32 * sample_rate_hz as f32 / fft_size as f32
}
