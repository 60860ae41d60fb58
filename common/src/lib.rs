//! Music-synchronised LED strip core.
//!
//! One cycle of the real-time loop, leaves first:
//!
//! ```text
//!   capture ──> spectrum::Analyzer ──> bands::BandMapper ──> visualizer::Visualizer ──> ws2812::Ws2812 ──> SPI
//!     ^                                                                                                   |
//!     └──────────────── capture::DoubleBuffer (role swap on every CaptureCompletion) <──────────────────────┘
//! ```
//!
//! Everything here is `no_std` and free of global state; the firmware owns the
//! statics and hands them to [`pipeline::Pipeline`] at construction.

#![cfg_attr(not(test), no_std)]

pub mod bands;
pub mod capture;
pub mod config;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod spectrum;
pub mod testsignal;
pub mod visualizer;
pub mod ws2812;

/// One LED's color, additive RGB with saturating 8-bit channels.
pub type Color = smart_leds::RGB8;

pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
