//! WS2812 over SPI: each data bit is stretched into a 3-bit SPI pattern.
//!
//! At 2.2 MHz one SPI bit is ~455ns, so `110` gives a ~910ns high time for a 1
//! and `100` a ~455ns high time for a 0.
//!
//! Buffer layout: one sentinel byte (always 0, keeps MOSI low before the first
//! LED), then 9 bytes per LED in green, red, blue order.

use crate::error::AddressingError;
use crate::visualizer::LedFrame;
use crate::{BLACK, Color};
use embedded_hal::spi::SpiBus;

pub const SENTINEL_LEN: usize = 1;
pub const BYTES_PER_LED: usize = 9;

const ONE: u32 = 0b110;
const ZERO: u32 = 0b100;

/// Transmit buffer size for `leds` LEDs.
pub const fn encoded_len(leds: usize) -> usize {
    SENTINEL_LEN + leds * BYTES_PER_LED
}

/// Stretches one channel byte into 24 SPI bits.
///
/// Bits are visited least significant first and each code is prepended, so the
/// MSB's code ends up in the top three bits. The 24 bits go out big-endian.
pub const fn encode_byte(value: u8) -> [u8; 3] {
    let mut result: u32 = 0;
    let mut bit = 0;
    while bit < 8 {
        let code = if value & (1 << bit) != 0 { ONE } else { ZERO };
        result |= code << 24;
        result >>= 3;
        bit += 1;
    }
    let bytes = result.to_le_bytes();
    [bytes[2], bytes[1], bytes[0]]
}

static ENCODE_TABLE: [[u8; 3]; 256] = {
    let mut table = [[0; 3]; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = encode_byte(i as u8);
        i += 1;
    }
    table
};

/// Inverse of [`encode_byte`]; `None` if any 3-bit group is not a valid code.
pub fn decode_byte(encoded: [u8; 3]) -> Option<u8> {
    let bits = u32::from_be_bytes([0, encoded[0], encoded[1], encoded[2]]);
    let mut value = 0u8;
    for bit in 0..8 {
        match (bits >> (3 * bit)) & 0b111 {
            ONE => value |= 1 << bit,
            ZERO => {}
            _ => return None,
        }
    }
    Some(value)
}

fn encode_led(color: Color) -> [u8; BYTES_PER_LED] {
    let mut out = [0; BYTES_PER_LED];
    for (chunk, channel) in out.chunks_exact_mut(3).zip([color.g, color.r, color.b]) {
        chunk.copy_from_slice(&ENCODE_TABLE[usize::from(channel)]);
    }
    out
}

/// Encoded frame for a strip of `LEDS`, plus the transport it goes out on.
///
/// `B` has to equal [`encoded_len`]`(LEDS)`; stable Rust can't compute it from `LEDS`
/// in the type, so it is checked at compile time in [`Ws2812::new`] instead.
pub struct Ws2812<T, const LEDS: usize, const B: usize> {
    transport: T,
    buffer: [u8; B],
}

impl<T, const LEDS: usize, const B: usize> Ws2812<T, LEDS, B> {
    /// Buffer starts out encoding an all-black strip. Nothing is sent yet.
    pub fn new(transport: T) -> Self {
        const { assert!(B == encoded_len(LEDS), "buffer length must be 1 + 9 * LEDS") };
        let mut strip = Self {
            transport,
            buffer: [0; B],
        };
        strip.set_all(BLACK);
        strip
    }

    fn check(index: usize) -> Result<(), AddressingError> {
        if index >= LEDS {
            return Err(AddressingError::LedOutOfRange {
                index,
                count: LEDS,
            });
        }
        Ok(())
    }

    fn offset(index: usize) -> usize {
        SENTINEL_LEN + index * BYTES_PER_LED
    }

    pub fn set_led(&mut self, index: usize, color: Color) -> Result<(), AddressingError> {
        Self::check(index)?;
        let offset = Self::offset(index);
        self.buffer[offset..offset + BYTES_PER_LED].copy_from_slice(&encode_led(color));
        Ok(())
    }

    /// Sets LEDs `start..=end`. The color is encoded once and the block copied.
    pub fn set_range(
        &mut self,
        start: usize,
        end: usize,
        color: Color,
    ) -> Result<(), AddressingError> {
        if start > end {
            return Err(AddressingError::InvertedRange { start, end });
        }
        Self::check(end)?;

        self.set_led(start, color)?;
        let first = Self::offset(start);
        for index in start + 1..=end {
            self.buffer
                .copy_within(first..first + BYTES_PER_LED, Self::offset(index));
        }
        Ok(())
    }

    pub fn set_all(&mut self, color: Color) {
        if LEDS > 0 {
            // indices are in range by construction
            let _ = self.set_range(0, LEDS - 1, color);
        }
    }

    /// Encodes every LED of `frame`.
    pub fn encode(&mut self, frame: &LedFrame<LEDS>) {
        let leds = self.buffer[SENTINEL_LEN..].chunks_exact_mut(BYTES_PER_LED);
        for (chunk, &color) in leds.zip(frame.iter()) {
            chunk.copy_from_slice(&encode_led(color));
        }
    }

    /// Reads back the color of one LED, `None` if its bytes are not valid codes.
    pub fn led(&self, index: usize) -> Result<Option<Color>, AddressingError> {
        Self::check(index)?;
        let offset = Self::offset(index);
        let mut channels = self.buffer[offset..offset + BYTES_PER_LED]
            .chunks_exact(3)
            .map(|c| decode_byte([c[0], c[1], c[2]]));
        let (Some(g), Some(r), Some(b)) = (
            channels.next().flatten(),
            channels.next().flatten(),
            channels.next().flatten(),
        ) else {
            return Ok(None);
        };
        Ok(Some(Color { r, g, b }))
    }

    pub fn buffer(&self) -> &[u8; B] {
        &self.buffer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn release(self) -> T {
        self.transport
    }
}

impl<T: SpiBus<u8>, const LEDS: usize, const B: usize> Ws2812<T, LEDS, B> {
    /// Blanks the strip.
    pub fn init(&mut self) -> Result<(), T::Error> {
        self.buffer[..SENTINEL_LEN].fill(0);
        self.set_all(BLACK);
        self.transmit()
    }

    /// Sends the whole buffer in one blocking write. Failures are not retried.
    pub fn transmit(&mut self) -> Result<(), T::Error> {
        self.transport.write(&self.buffer)?;
        self.transport.flush()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError<E> {
    Addressing(AddressingError),
    Transport(E),
}

/// Writes up to `LEDS` colors from the start of the strip and blanks the rest.
impl<T: SpiBus<u8>, const LEDS: usize, const B: usize> smart_leds::SmartLedsWrite
    for Ws2812<T, LEDS, B>
{
    type Error = WriteError<T::Error>;
    type Color = Color;

    fn write<I, C>(&mut self, iterator: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<Self::Color>,
    {
        let mut written = 0;
        for color in iterator {
            self.set_led(written, color.into())
                .map_err(WriteError::Addressing)?;
            written += 1;
        }
        if written < LEDS {
            self.set_range(written, LEDS - 1, BLACK)
                .map_err(WriteError::Addressing)?;
        }
        self.transmit().map_err(WriteError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    /// Transport that only keeps the last write.
    #[derive(Default)]
    struct Capture {
        sent: Vec<u8>,
        writes: usize,
    }

    impl embedded_hal::spi::ErrorType for Capture {
        type Error = Infallible;
    }

    impl SpiBus<u8> for Capture {
        fn read(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
            Ok(())
        }
        fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
            self.sent = words.to_vec();
            self.writes += 1;
            Ok(())
        }
        fn transfer(&mut self, _read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
            self.write(write)
        }
        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            self.write(words)
        }
        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    type Strip<const LEDS: usize, const B: usize> = Ws2812<Capture, LEDS, B>;

    const RED: Color = Color { r: 255, g: 0, b: 0 };
    const SOME: Color = Color {
        r: 0x12,
        g: 0xA5,
        b: 0x7F,
    };

    #[test]
    fn byte_codes() {
        assert_eq!(encode_byte(0xFF), [0xDB, 0x6D, 0xB6]);
        assert_eq!(encode_byte(0x00), [0x92, 0x49, 0x24]);
        // MSB first on the wire: 1 then seven 0s
        assert_eq!(encode_byte(0x80), [0xD2, 0x49, 0x24]);
        assert_eq!(encode_byte(0x01), [0x92, 0x49, 0x26]);
    }

    #[test]
    fn every_byte_decodes_back() {
        for value in 0..=u8::MAX {
            assert_eq!(decode_byte(encode_byte(value)), Some(value));
            assert_eq!(ENCODE_TABLE[usize::from(value)], encode_byte(value));
        }
        assert_eq!(decode_byte([0; 3]), None);
    }

    #[test]
    fn new_strip_is_black_with_zero_sentinel() {
        let strip = Strip::<3, { encoded_len(3) }>::new(Capture::default());
        assert_eq!(strip.buffer().len(), 28);
        assert_eq!(strip.buffer()[0], 0);
        assert!(
            strip.buffer()[1..]
                .chunks_exact(3)
                .all(|c| c == encode_byte(0))
        );
    }

    #[test]
    fn channels_go_out_green_red_blue() {
        let mut strip = Strip::<2, { encoded_len(2) }>::new(Capture::default());
        strip.set_led(1, SOME).unwrap();
        let buf = strip.buffer();
        assert_eq!(buf[10..13], encode_byte(SOME.g));
        assert_eq!(buf[13..16], encode_byte(SOME.r));
        assert_eq!(buf[16..19], encode_byte(SOME.b));
        assert_eq!(strip.led(1), Ok(Some(SOME)));
        assert_eq!(strip.led(0), Ok(Some(BLACK)));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut strip = Strip::<4, { encoded_len(4) }>::new(Capture::default());
        let before = *strip.buffer();
        assert_eq!(
            strip.set_led(4, RED),
            Err(AddressingError::LedOutOfRange { index: 4, count: 4 })
        );
        assert_eq!(
            strip.set_range(2, 4, RED),
            Err(AddressingError::LedOutOfRange { index: 4, count: 4 })
        );
        assert_eq!(
            strip.set_range(3, 1, RED),
            Err(AddressingError::InvertedRange { start: 3, end: 1 })
        );
        assert_eq!(
            strip.led(9),
            Err(AddressingError::LedOutOfRange { index: 9, count: 4 })
        );
        assert_eq!(*strip.buffer(), before);
    }

    #[test]
    fn set_range_matches_per_led_encoding() {
        let mut ranged = Strip::<6, { encoded_len(6) }>::new(Capture::default());
        let mut single = Strip::<6, { encoded_len(6) }>::new(Capture::default());

        ranged.set_range(1, 4, SOME).unwrap();
        for i in 1..=4 {
            single.set_led(i, SOME).unwrap();
        }
        assert_eq!(ranged.buffer(), single.buffer());
        assert_eq!(ranged.led(5), Ok(Some(BLACK)));

        ranged.set_range(2, 2, RED).unwrap();
        assert_eq!(ranged.led(2), Ok(Some(RED)));
        assert_eq!(ranged.led(3), Ok(Some(SOME)));
    }

    #[test]
    fn frame_encoding_matches_per_led_encoding() {
        let mut frame = LedFrame::<3>::new();
        frame[0] = RED;
        frame[2] = SOME;

        let mut encoded = Strip::<3, { encoded_len(3) }>::new(Capture::default());
        encoded.encode(&frame);
        let mut single = Strip::<3, { encoded_len(3) }>::new(Capture::default());
        single.set_led(0, RED).unwrap();
        single.set_led(2, SOME).unwrap();

        assert_eq!(encoded.buffer(), single.buffer());
        assert_eq!(encoded.buffer()[0], 0);
    }

    #[test]
    fn transmit_sends_the_whole_buffer() {
        let mut strip = Strip::<2, { encoded_len(2) }>::new(Capture::default());
        strip.init().unwrap();
        strip.set_all(RED);
        strip.transmit().unwrap();
        assert_eq!(strip.transport().writes, 2);
        assert_eq!(strip.transport().sent, strip.buffer().to_vec());
    }

    #[test]
    fn smart_leds_write_blanks_the_tail() {
        use smart_leds::SmartLedsWrite;

        let mut strip = Strip::<4, { encoded_len(4) }>::new(Capture::default());
        strip.set_all(SOME);
        strip.write([RED, RED]).unwrap();
        assert_eq!(strip.led(1), Ok(Some(RED)));
        assert_eq!(strip.led(2), Ok(Some(BLACK)));
        assert_eq!(strip.release().writes, 1);

        let mut strip = Strip::<1, { encoded_len(1) }>::new(Capture::default());
        assert_eq!(
            strip.write([RED, RED]),
            Err(WriteError::Addressing(AddressingError::LedOutOfRange {
                index: 1,
                count: 1
            }))
        );
    }
}
