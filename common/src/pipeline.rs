//! The real-time loop: capture one window while the previous one is turned into a frame.

use crate::bands::{BandMapper, BandThresholds};
use crate::capture::{CaptureCompletion, CaptureSource, DoubleBuffer, WindowRef};
use crate::error::{ConfigError, PipelineError, detail};
use crate::fft::Window;
use crate::spectrum::Analyzer;
use crate::visualizer::{LedFrame, Mode, Visualizer};
use crate::ws2812::Ws2812;
use crate::{Color, config};
use core::convert::Infallible;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::spi::SpiBus;

/// Raw mode tags from outside the loop, applied at the next cycle boundary.
pub type ModeRequests = Signal<CriticalSectionRawMutex, u8>;

/// Runtime copy of the tunables in [`config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub thresholds: BandThresholds,
    pub ceiling: u8,
    pub window: Window,
    pub mode: Mode,
    pub sample_rate_hz: u32,
    pub measure_performance: bool,
    pub log_spectrum: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: BandThresholds::default(),
            ceiling: config::bands::CEILING,
            window: config::fft::WINDOW,
            mode: config::MODE,
            sample_rate_hz: config::SAMPLE_RATE_HZ,
            measure_performance: config::debug::MEASURE_PERFORMANCE,
            log_spectrum: config::debug::LOG_SPECTRUM,
        }
    }
}

pub struct Pipeline<'a, C, T, const N: usize, const LEDS: usize, const B: usize> {
    capture: C,
    completion: &'a CaptureCompletion<N>,
    mode_requests: Option<&'a ModeRequests>,
    buffers: DoubleBuffer<N>,
    analyzer: Analyzer<N>,
    mapper: BandMapper,
    visualizer: Visualizer<LEDS>,
    strip: Ws2812<T, LEDS, B>,
    clock: fn() -> u64,
    sample_rate_hz: u32,
    window_period_us: u64,
    measure_performance: bool,
    log_spectrum: bool,
    last_color: Color,
    cycles: u64,
}

fn no_clock() -> u64 {
    0
}

impl<'a, C, T, const N: usize, const LEDS: usize, const B: usize> Pipeline<'a, C, T, N, LEDS, B>
where
    C: CaptureSource<N>,
    T: SpiBus<u8>,
{
    /// `windows` are the two buffer halves; the first is captured into first while
    /// the second (silent) is processed.
    pub fn new(
        config: PipelineConfig,
        capture: C,
        completion: &'a CaptureCompletion<N>,
        strip: Ws2812<T, LEDS, B>,
        windows: (WindowRef<N>, WindowRef<N>),
    ) -> Result<Self, ConfigError> {
        let analyzer = Analyzer::new(config.window)?;
        Ok(Self {
            capture,
            completion,
            mode_requests: None,
            buffers: DoubleBuffer::new(windows.0, windows.1),
            analyzer,
            mapper: BandMapper::new(config.thresholds, config.ceiling),
            visualizer: Visualizer::new(config.mode),
            strip,
            clock: no_clock,
            sample_rate_hz: config.sample_rate_hz,
            window_period_us: N as u64 * 1_000_000 / u64::from(config.sample_rate_hz.max(1)),
            measure_performance: config.measure_performance,
            log_spectrum: config.log_spectrum,
            last_color: crate::BLACK,
            cycles: 0,
        })
    }

    pub fn with_mode_requests(mut self, requests: &'a ModeRequests) -> Self {
        self.mode_requests = Some(requests);
        self
    }

    /// Microsecond counter for the per-cycle timing log.
    pub fn with_clock(mut self, now_us: fn() -> u64) -> Self {
        self.clock = now_us;
        self
    }

    pub fn mode(&self) -> Mode {
        self.visualizer.mode()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.visualizer.set_mode(mode);
    }

    pub fn frame(&self) -> &LedFrame<LEDS> {
        self.visualizer.frame()
    }

    /// Color computed by the most recent cycle.
    pub fn last_color(&self) -> Color {
        self.last_color
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn strip(&self) -> &Ws2812<T, LEDS, B> {
        &self.strip
    }

    pub fn strip_mut(&mut self) -> &mut Ws2812<T, LEDS, B> {
        &mut self.strip
    }

    /// Sends the all-black frame the strip starts from.
    pub fn blank(&mut self) -> Result<(), PipelineError> {
        self.strip
            .init()
            .map_err(|e| PipelineError::Transport(detail(&e)))
    }

    /// One cycle: start the next capture, process the latest window, wait for the
    /// capture, swap roles.
    ///
    /// A failed transmit is reported only after the capture has completed, so the
    /// double buffer is consistent whatever this returns.
    pub async fn cycle(&mut self) -> Result<(), PipelineError> {
        if let Some(tag) = self.mode_requests.and_then(|r| r.try_take()) {
            self.visualizer.set_mode(Mode::try_from(tag)?);
        }

        // nothing is in flight between cycles
        if self.completion.is_pending() {
            return Err(PipelineError::Sequencing);
        }

        let window = self.buffers.take_for_capture()?;
        if let Err((e, window)) = self.capture.start_async_capture(window) {
            self.buffers.restore(window);
            return Err(PipelineError::Capture(detail(&e)));
        }

        let processed = self.process();

        let filled = self.completion.wait().await;
        self.buffers.swap(filled)?;
        self.cycles += 1;

        processed
    }

    fn process(&mut self) -> Result<(), PipelineError> {
        let clock = self.clock;
        let measure = self.measure_performance;
        let start = clock();

        let mut log_timing = {
            let mut last = start;
            move |label: &str| {
                if measure {
                    let now = clock();
                    log::debug!("{} after {}us", label, now.saturating_sub(last));
                    last = now;
                }
            }
        };

        let spectrum = self
            .analyzer
            .analyze_at(self.buffers.processing(), self.sample_rate_hz);
        log_timing("Finished spectrum");

        if self.log_spectrum {
            if let Some((bin, magnitude)) = spectrum.peak() {
                log::info!(
                    "peak at bin {} ({} Hz): {}",
                    bin,
                    spectrum.bin_frequency_hz(bin),
                    magnitude
                );
            }
        }

        let color = self.mapper.map_to_color(&spectrum);
        self.last_color = color;
        let frame = self.visualizer.render(color);
        log_timing("Finished mapping and render");

        self.strip.encode(frame);
        log_timing("Finished encoding");

        let sent = self.strip.transmit();
        log_timing("Finished transmit");

        if measure {
            let took = clock().saturating_sub(start);
            if took > self.window_period_us {
                log::warn!(
                    "processing did not complete in time (took {} us, window is {} us)",
                    took,
                    self.window_period_us
                );
            }
        }

        sent.map_err(|e| PipelineError::Transport(detail(&e)))
    }

    /// Blanks the strip, then cycles until a fatal error.
    ///
    /// Capture and transport failures are logged and the loop goes on.
    pub async fn run(&mut self) -> Result<Infallible, PipelineError> {
        log::info!(
            "pipeline starting: {} LEDs, {} samples per window, {:?} window, mode {:?}",
            LEDS,
            N,
            self.analyzer.window(),
            self.mode()
        );
        if let Err(e) = self.blank() {
            log::warn!("could not blank the strip: {}", e);
        }

        loop {
            match self.cycle().await {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => {
                    log::warn!("cycle {} aborted: {}", self.cycles, e);
                }
                Err(e) => {
                    log::error!("pipeline stopped: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
