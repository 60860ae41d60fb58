use alloc::string::String;
use log::{Metadata, Record};

use core::fmt::Write;

use rtt_target::rprintln;

/// `anyhow::Error` tagged with the source line that raised it, for bring-up
/// failures that end in `_main`'s error loop.
#[macro_export]
macro_rules! error_with_location {
    ($msg:expr) => {
        anyhow::anyhow!("{} at {}:{}", $msg, file!(), line!())
    };
    ($fmt:expr, $($arg:tt)*) => {
        anyhow::anyhow!("{} at {}:{}", alloc::format!($fmt, $($arg)*), file!(), line!())
    };
}

/// Log sink for the firmware: mirrors each line to the debug probe's RTT
/// channel and to the serial console, so the timing logs are visible with or
/// without a probe attached.
pub struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = String::new();
        let _ = write!(
            &mut line,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );

        rprintln!("{}", line);
        esp_println::println!("{}", line);
    }

    fn flush(&self) {}
}

/// Monotonic microseconds since boot, the clock for the timing logs.
pub fn now_us() -> u64 {
    esp_hal::time::Instant::now()
        .duration_since_epoch()
        .as_micros()
}

/// Moves `$init` into a dedicated static and yields `&'static mut $ty`.
///
/// Used for the two sample windows, which the pipeline and the capture task
/// pass back and forth. Each expansion site owns one cell, so reaching the
/// same site twice panics.
#[macro_export]
macro_rules! static_cell_init {
    ($ty:ty, $init:expr) => {{
        static CELL: ::static_cell::StaticCell<$ty> = ::static_cell::StaticCell::new();
        CELL.init($init)
    }};
}

/// Zeroed `&'static mut [$ty; $len]` scratch that stays out of the task arena.
///
/// The I2S task pops DMA chunks into it. Every expansion site must run at most
/// once.
#[macro_export]
macro_rules! static_buf {
    ($ty:ty, $len:expr) => {{
        static mut SCRATCH: [$ty; $len] = [0; $len];
        #[allow(static_mut_refs)]
        unsafe {
            &mut SCRATCH
        }
    }};
}
