//! Color → LED frame, with history.

use crate::error::ConfigError;
use crate::{BLACK, Color};
use core::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// Every LED shows the newest color.
    Flat = 0,
    /// The newest color enters at LED 0 and everything shifts one step down the strip.
    UnidirectionalFlow = 1,
    /// The newest color enters at the midpoint and both arms shift outwards.
    BidirectionalFlow = 2,
}

impl TryFrom<u8> for Mode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Flat),
            1 => Ok(Mode::UnidirectionalFlow),
            2 => Ok(Mode::BidirectionalFlow),
            other => Err(ConfigError::InvalidMode(other)),
        }
    }
}

impl Mode {
    /// Advances `leds` by one cycle.
    pub fn render(self, color: Color, leds: &mut [Color]) {
        let len = leds.len();
        if len == 0 {
            return;
        }
        match self {
            Mode::Flat => leds.fill(color),
            Mode::UnidirectionalFlow => {
                leds.copy_within(..len - 1, 1);
                leds[0] = color;
            }
            Mode::BidirectionalFlow => {
                let mid = bidirectional_midpoint(len);
                leds.copy_within(mid..2 * mid, mid + 1);
                leds.copy_within(1..=mid, 0);
                leds[mid] = color;
            }
        }
    }
}

/// Arms are `0..mid` and `mid+1..=2*mid`.
///
/// For an even count that leaves the last LED outside both arms; it stays at
/// whatever it was initialized to.
pub const fn bidirectional_midpoint(len: usize) -> usize {
    if len % 2 == 0 {
        (len.saturating_sub(1)) / 2
    } else {
        len / 2
    }
}

/// One color per LED, index 0 at the start of the strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedFrame<const LEDS: usize> {
    leds: [Color; LEDS],
}

impl<const LEDS: usize> LedFrame<LEDS> {
    pub const fn new() -> Self {
        Self {
            leds: [BLACK; LEDS],
        }
    }
}

impl<const LEDS: usize> Default for LedFrame<LEDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const LEDS: usize> Deref for LedFrame<LEDS> {
    type Target = [Color; LEDS];

    fn deref(&self) -> &Self::Target {
        &self.leds
    }
}

impl<const LEDS: usize> DerefMut for LedFrame<LEDS> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.leds
    }
}

/// Owns the frame, so history survives across cycles and mode changes.
pub struct Visualizer<const LEDS: usize> {
    frame: LedFrame<LEDS>,
    mode: Mode,
}

impl<const LEDS: usize> Visualizer<LEDS> {
    pub const fn new(mode: Mode) -> Self {
        const { assert!(LEDS > 0, "a strip needs at least one LED") };
        Self {
            frame: LedFrame::new(),
            mode,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Takes effect on the next [`Visualizer::render`]; the frame is kept.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            log::info!("visualization mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    pub fn render(&mut self, color: Color) -> &LedFrame<LEDS> {
        self.mode.render(color, &mut self.frame[..]);
        &self.frame
    }

    pub fn frame(&self) -> &LedFrame<LEDS> {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distinct color per cycle, never black.
    fn c(n: u8) -> Color {
        Color { r: n + 1, g: 0, b: n }
    }

    #[test]
    fn mode_tags_round_trip() {
        for mode in [Mode::Flat, Mode::UnidirectionalFlow, Mode::BidirectionalFlow] {
            assert_eq!(Mode::try_from(mode as u8), Ok(mode));
        }
        assert_eq!(Mode::try_from(3), Err(ConfigError::InvalidMode(3)));
        assert_eq!(Mode::try_from(255), Err(ConfigError::InvalidMode(255)));
    }

    #[test]
    fn flat_fills_everything() {
        let mut v = Visualizer::<5>::new(Mode::Flat);
        v.render(c(1));
        let frame = v.render(c(2));
        assert!(frame.iter().all(|&led| led == c(2)));
    }

    #[test]
    fn unidirectional_shifts_history_down() {
        let mut v = Visualizer::<4>::new(Mode::UnidirectionalFlow);
        for k in 0..6 {
            v.render(c(k));
        }
        // after k cycles LED i shows the color from cycle k - i
        assert_eq!(**v.frame(), [c(5), c(4), c(3), c(2)]);
    }

    #[test]
    fn unidirectional_fills_gradually() {
        let mut v = Visualizer::<4>::new(Mode::UnidirectionalFlow);
        v.render(c(0));
        assert_eq!(**v.frame(), [c(0), BLACK, BLACK, BLACK]);
    }

    #[test]
    fn bidirectional_midpoints() {
        assert_eq!(bidirectional_midpoint(1), 0);
        assert_eq!(bidirectional_midpoint(2), 0);
        assert_eq!(bidirectional_midpoint(7), 3);
        assert_eq!(bidirectional_midpoint(8), 3);
        assert_eq!(bidirectional_midpoint(180), 89);
    }

    #[test]
    fn bidirectional_even_strip_never_writes_last_led() {
        let mut v = Visualizer::<8>::new(Mode::BidirectionalFlow);
        for k in 0..20 {
            let frame = v.render(c(k));
            assert_eq!(frame[3], c(k));
            assert_eq!(frame[7], BLACK);
        }
    }

    #[test]
    fn bidirectional_pulse_is_symmetric() {
        let mut v = Visualizer::<7>::new(Mode::BidirectionalFlow);
        v.render(c(0));
        v.render(c(1));
        let frame = v.render(c(2));
        assert_eq!(
            **frame,
            [BLACK, c(0), c(1), c(2), c(1), c(0), BLACK]
        );
        let frame = v.render(c(3));
        assert_eq!(**frame, [c(0), c(1), c(2), c(3), c(2), c(1), c(0)]);
    }

    #[test]
    fn mode_switch_keeps_history() {
        let mut v = Visualizer::<4>::new(Mode::UnidirectionalFlow);
        v.render(c(0));
        v.render(c(1));
        v.set_mode(Mode::BidirectionalFlow);
        assert_eq!(v.mode(), Mode::BidirectionalFlow);
        // midpoint 1: the old midpoint spreads into both arms
        let frame = v.render(c(2));
        assert_eq!(**frame, [c(0), c(2), c(0), BLACK]);
    }

    #[test]
    fn single_led_strip_works_in_every_mode() {
        for mode in [Mode::Flat, Mode::UnidirectionalFlow, Mode::BidirectionalFlow] {
            let mut v = Visualizer::<1>::new(mode);
            assert_eq!(**v.render(c(9)), [c(9)]);
        }
    }
}
