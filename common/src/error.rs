use core::fmt::{Debug, Write};
use thiserror::Error;

/// Room for a driver error rendered with `Debug`.
pub const DETAIL_LEN: usize = 96;

/// Driver error text, so that errors from generic transports don't leak type parameters.
pub type Detail = heapless::String<DETAIL_LEN>;

/// Renders `err` with `Debug`; output that does not fit is cut off.
pub fn detail(err: &impl Debug) -> Detail {
    let mut out = Detail::new();
    let _ = write!(out, "{err:?}");
    out
}

/// Invalid build-time or boundary configuration. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported transform size {0} (must be a power of two in 32..=4096)")]
    UnsupportedTransformSize(usize),
    #[error("undefined visualization mode {0}")]
    InvalidMode(u8),
}

/// An LED index or range outside the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressingError {
    #[error("LED {index} is out of range for a strip of {count}")]
    LedOutOfRange { index: usize, count: usize },
    #[error("LED range starts at {start}, after its end {end}")]
    InvertedRange { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Addressing(#[from] AddressingError),
    #[error("failed to start capture: {0}")]
    Capture(Detail),
    #[error("failed to transmit frame: {0}")]
    Transport(Detail),
    #[error("capture sequencing violated: a buffer half was reused while its capture was pending")]
    Sequencing,
}

impl PipelineError {
    /// Whether the loop has to stop.
    ///
    /// Capture and transport failures only abort the current cycle: the next cycle
    /// re-encodes the whole frame from the visualizer's state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::Capture(_) | PipelineError::Transport(_))
    }
}
