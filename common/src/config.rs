//! Build-time configuration.
//!
//! There are no runtime flags: change a constant and reflash.

use crate::visualizer::Mode;

/// Number of LEDs on the strip (30 LEDs/m, 6 m)
pub const LED_COUNT: usize = 30 * 6;

/// Transform size, also the number of samples per capture window
pub const FFT_SIZE: usize = 1024;

/// Sampling rate of the audio input
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Visualization mode the firmware starts in
pub const MODE: Mode = Mode::BidirectionalFlow;

const _: () = assert!(LED_COUNT > 0);
const _: () = assert!(FFT_SIZE.is_power_of_two());
const _: () = assert!(FFT_SIZE >= fft::MIN_SIZE && FFT_SIZE <= fft::MAX_SIZE);

pub fn dump_to_log() {
    log::info!(
        "\n\
        Debugging flags:\n\
        - FAKE_INPUT_DATA: {}\n\
        - FAKE_INPUT_FREQ_HZ: {}\n\
        - MEASURE_PERFORMANCE: {}\n\
        - LOG_SPECTRUM: {}\n\
        Strip:\n\
        - LED_COUNT: {}\n\
        - ENCODED_LEN: {} bytes\n\
        - SPI_FREQUENCY: {} kHz\n\
        - MODE: {:?}\n\
        Sampling:\n\
        - SAMPLE_RATE: {} Hz\n\
        - WINDOW_PERIOD: {} us\n\
        FFT:\n\
        - SIZE: {}\n\
        - WINDOW: {:?}\n\
        - SPECTRUM_LEN: {}\n\
        - FREQ_RESOLUTION: {}.{:03} Hz\n\
        Bands:\n\
        - LOW_THRESHOLD:  {}\n\
        - MID_THRESHOLD:  {}\n\
        - HIGH_THRESHOLD: {}\n\
        - CEILING: {}\n\
        ",
        debug::FAKE_INPUT_DATA,
        debug::FAKE_INPUT_FREQ_HZ,
        debug::MEASURE_PERFORMANCE,
        debug::LOG_SPECTRUM,
        LED_COUNT,
        ws2812::ENCODED_LEN,
        ws2812::SPI_FREQUENCY_KHZ,
        MODE,
        SAMPLE_RATE_HZ,
        fft::WINDOW_PERIOD_US,
        FFT_SIZE,
        fft::WINDOW,
        fft::SPECTRUM_LEN,
        fft::FREQ_RESOLUTION_X1000 / 1000,
        fft::FREQ_RESOLUTION_X1000 % 1000,
        bands::LOW_THRESHOLD,
        bands::MID_THRESHOLD,
        bands::HIGH_THRESHOLD,
        bands::CEILING,
    );
}

/// Debugging flags
pub mod debug {
    /// Replace captured samples with a synthetic sine
    pub const FAKE_INPUT_DATA: bool = false;
    pub const FAKE_INPUT_FREQ_HZ: f32 = 1034.0;
    pub const FAKE_INPUT_AMPLITUDE: f32 = 0.5;

    /// Log per-stage timing every cycle, and the transform benchmark at startup
    pub const MEASURE_PERFORMANCE: bool = true;

    /// Log the strongest bin every cycle
    pub const LOG_SPECTRUM: bool = false;
}

/// Transform configuration
pub mod fft {
    use crate::config;

    /// Smallest transform the analyzer accepts
    pub const MIN_SIZE: usize = 32;
    /// Largest transform the analyzer accepts
    pub const MAX_SIZE: usize = 4096;

    pub const WINDOW: crate::fft::Window = crate::fft::Window::Rectangle;

    /// Real input symmetry: only the first half of the bins carry information
    pub const SPECTRUM_LEN: usize = config::FFT_SIZE / 2;

    /// Each bin is this many Hz apart
    pub const FREQ_RESOLUTION_X1000: usize =
        1000 * config::SAMPLE_RATE_HZ as usize / config::FFT_SIZE;

    /// Time to capture one window; processing has to finish within it
    pub const WINDOW_PERIOD_US: u64 =
        config::FFT_SIZE as u64 * 1_000_000 / config::SAMPLE_RATE_HZ as u64;
}

/// Band mapper calibration
///
/// Mean band magnitudes are in units of full-scale sine amplitude (see `spectrum`).
/// Empirical values, not derived from anything. Recalibrate if the
/// magnitude scaling in `spectrum` changes.
pub mod bands {
    /// Mean magnitude of the low band that drives red to the ceiling
    pub const LOW_THRESHOLD: f32 = 0.0035;
    /// Mean magnitude of the mid band that drives green to the ceiling
    pub const MID_THRESHOLD: f32 = 0.001;
    /// Mean magnitude of the high band that drives blue to the ceiling
    pub const HIGH_THRESHOLD: f32 = 0.001;

    /// Brightest channel value the mapper emits
    pub const CEILING: u8 = u8::MAX;
}

/// Strip protocol configuration
pub mod ws2812 {
    use crate::config;

    /// 3 SPI bits per data bit: ~1.36us per WS2812 bit
    pub const SPI_FREQUENCY_KHZ: u32 = 2_200;

    /// Size of the transmit buffer: sentinel byte + 9 bytes per LED
    pub const ENCODED_LEN: usize = crate::ws2812::encoded_len(config::LED_COUNT);
}
