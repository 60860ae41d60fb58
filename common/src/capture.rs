//! Sample acquisition: windows, the capture seam, and the double buffer.
//!
//! Ownership of a window moves between the worker and the capture context as a
//! `&'static mut` reference, so exclusive access to each half follows from the
//! borrow rules instead of from a lock the interrupt side could never take.

use crate::error::PipelineError;
use core::fmt::Debug;
use core::mem;
use core::ops::{Deref, DerefMut};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// One capture's worth of signed samples, centered at 0.
pub struct SampleWindow<const N: usize> {
    samples: [i16; N],
}

impl<const N: usize> SampleWindow<N> {
    pub const fn new() -> Self {
        Self { samples: [0; N] }
    }
}

impl<const N: usize> Default for SampleWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Deref for SampleWindow<N> {
    type Target = [i16; N];

    fn deref(&self) -> &Self::Target {
        &self.samples
    }
}

impl<const N: usize> DerefMut for SampleWindow<N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.samples
    }
}

/// A window handed across the capture boundary.
pub type WindowRef<const N: usize> = &'static mut SampleWindow<N>;

/// Something that fills windows asynchronously, e.g. a DMA-driven ADC or I2S.
///
/// A successful start must be followed by exactly one
/// [`CaptureCompletion::complete`] carrying the same window.
pub trait CaptureSource<const N: usize> {
    type Error: Debug;

    /// Starts filling `window`, without blocking.
    ///
    /// On failure the window is handed back untouched.
    fn start_async_capture(
        &mut self,
        window: WindowRef<N>,
    ) -> Result<(), (Self::Error, WindowRef<N>)>;
}

/// Single-slot "capture finished" signal, raised from interrupt context.
///
/// Raising never blocks or allocates. A second raise before the worker consumes the
/// first replaces it; the pipeline only ever has one capture in flight, so that
/// cannot drop a window in practice.
pub struct CaptureCompletion<const N: usize> {
    signal: Signal<CriticalSectionRawMutex, WindowRef<N>>,
}

impl<const N: usize> CaptureCompletion<N> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Hands a filled window back to the worker. Safe to call from an interrupt.
    pub fn complete(&self, window: WindowRef<N>) {
        self.signal.signal(window);
    }

    /// Waits, without timeout, for the next completed window.
    pub async fn wait(&self) -> WindowRef<N> {
        self.signal.wait().await
    }

    /// A filled window is waiting to be collected.
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }
}

impl<const N: usize> Default for CaptureCompletion<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture requests travelling from the worker to a capture task.
pub struct CaptureRequests<const N: usize> {
    signal: Signal<CriticalSectionRawMutex, WindowRef<N>>,
}

impl<const N: usize> CaptureRequests<N> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Waits for the next window to fill.
    pub async fn next(&self) -> WindowRef<N> {
        self.signal.wait().await
    }

    pub fn source(&self) -> SignalCaptureSource<'_, N> {
        SignalCaptureSource { requests: self }
    }
}

impl<const N: usize> Default for CaptureRequests<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureBusy;

/// [`CaptureSource`] that posts windows to whatever task awaits [`CaptureRequests::next`].
pub struct SignalCaptureSource<'a, const N: usize> {
    requests: &'a CaptureRequests<N>,
}

impl<const N: usize> CaptureSource<N> for SignalCaptureSource<'_, N> {
    type Error = CaptureBusy;

    fn start_async_capture(
        &mut self,
        window: WindowRef<N>,
    ) -> Result<(), (Self::Error, WindowRef<N>)> {
        // an unclaimed request would be overwritten, losing its window
        if self.requests.signal.signaled() {
            return Err((CaptureBusy, window));
        }
        self.requests.signal.signal(window);
        Ok(())
    }
}

/// The two buffer halves and their roles.
///
/// `latest` is the PROCESSING half: the most recently completed window, owned by the
/// worker. `idle` holds the other half while it waits to become the CAPTURING half;
/// it is `None` exactly while that capture is in flight.
pub struct DoubleBuffer<const N: usize> {
    idle: Option<WindowRef<N>>,
    latest: WindowRef<N>,
}

impl<const N: usize> DoubleBuffer<N> {
    /// `first` is captured into first; `second` is processed (silent) meanwhile.
    pub fn new(first: WindowRef<N>, second: WindowRef<N>) -> Self {
        Self {
            idle: Some(first),
            latest: second,
        }
    }

    /// Takes the idle half so a capture can be started into it.
    pub fn take_for_capture(&mut self) -> Result<WindowRef<N>, PipelineError> {
        self.idle.take().ok_or(PipelineError::Sequencing)
    }

    /// Returns a half whose capture never started.
    pub fn restore(&mut self, window: WindowRef<N>) {
        debug_assert!(self.idle.is_none());
        self.idle = Some(window);
    }

    /// Role swap: `filled` becomes the processing half, the old one goes idle.
    pub fn swap(&mut self, filled: WindowRef<N>) -> Result<(), PipelineError> {
        if self.idle.is_some() {
            // nothing was in flight, so this completion is not ours
            return Err(PipelineError::Sequencing);
        }
        self.idle = Some(mem::replace(&mut self.latest, filled));
        Ok(())
    }

    pub fn processing(&self) -> &SampleWindow<N> {
        &*self.latest
    }

    pub fn capture_pending(&self) -> bool {
        self.idle.is_none()
    }
}
