//! I2S microphone → sample windows.

use anyhow::Result;
use embassy_time::{Duration, Timer};
use esp_hal::{dma_buffers, i2s::master::DataFormat, time::Rate};
use musicsync::capture::{CaptureCompletion, CaptureRequests};
use musicsync::config::{self, FFT_SIZE};
use musicsync::testsignal;

use crate::{error_with_location, static_buf};

/// 2 channels of 24 bit audio, each in a 32 bit slot
const FRAME_SIZE: usize = 4 * 2;

/// Room for a bit more than one window, so a window can be filled from one pop
const I2S_DMA_BUFFER_SIZE: usize = 2 * FFT_SIZE * FRAME_SIZE;

pub struct I2sPeripherals<'a> {
    pub i2s0: esp_hal::peripherals::I2S0<'a>,
    pub dma_ch0: esp_hal::peripherals::DMA_CH0<'a>,
    pub gpio0: esp_hal::peripherals::GPIO0<'a>, // MCLK
    pub gpio4: esp_hal::peripherals::GPIO4<'a>, // BCLK
    pub gpio6: esp_hal::peripherals::GPIO6<'a>, // WS
    pub gpio5: esp_hal::peripherals::GPIO5<'a>, // DIN
}

#[embassy_executor::task]
pub async fn capture_task(
    i2s_peripherals: I2sPeripherals<'static>,
    requests: &'static CaptureRequests<FFT_SIZE>,
    completion: &'static CaptureCompletion<FFT_SIZE>,
) -> ! {
    let result = if config::debug::FAKE_INPUT_DATA {
        fake_capture(requests, completion).await
    } else {
        i2s_capture(i2s_peripherals, requests, completion).await
    };

    // the pipeline stalls on its next completion; nothing else can be done from here
    if let Err(e) = result {
        log::error!("capture stopped: {e:?}");
    }
    loop {
        embassy_futures::yield_now().await;
    }
}

async fn fake_capture(
    requests: &CaptureRequests<FFT_SIZE>,
    completion: &CaptureCompletion<FFT_SIZE>,
) -> Result<!> {
    log::info!(
        "capture: synthetic {} Hz input",
        config::debug::FAKE_INPUT_FREQ_HZ
    );
    loop {
        let window = requests.next().await;
        testsignal::fill_sine(
            &mut window[..],
            config::debug::FAKE_INPUT_FREQ_HZ,
            config::SAMPLE_RATE_HZ,
            config::debug::FAKE_INPUT_AMPLITUDE,
        );
        // pace like the real input
        Timer::after(Duration::from_micros(config::fft::WINDOW_PERIOD_US)).await;
        completion.complete(window);
    }
}

async fn i2s_capture(
    i2s_peripherals: I2sPeripherals<'static>,
    requests: &CaptureRequests<FFT_SIZE>,
    completion: &CaptureCompletion<FFT_SIZE>,
) -> Result<!> {
    let (mut rx_buffer, rx_descriptors, _, _) = dma_buffers!(I2S_DMA_BUFFER_SIZE, 0);

    let i2s = esp_hal::i2s::master::I2s::new(
        i2s_peripherals.i2s0,
        i2s_peripherals.dma_ch0,
        esp_hal::i2s::master::Config::new_tdm_philips()
            .with_sample_rate(Rate::from_hz(config::SAMPLE_RATE_HZ))
            .with_data_format(DataFormat::Data32Channel32),
    )
    .map_err(|e| error_with_location!("Failed to configure I2S: {:?}", e))?
    .with_mclk(i2s_peripherals.gpio0);

    let mut i2s_rx: esp_hal::i2s::master::I2sRx<'static, esp_hal::Blocking> = i2s
        .i2s_rx
        .with_bclk(i2s_peripherals.gpio4)
        .with_ws(i2s_peripherals.gpio6)
        .with_din(i2s_peripherals.gpio5)
        .build(rx_descriptors);

    let mut transfer = i2s_rx
        .read_dma_circular(&mut rx_buffer)
        .map_err(|e| error_with_location!("Failed to start I2S DMA: {:?}", e))?;

    let chunk = static_buf!(u8, I2S_DMA_BUFFER_SIZE);

    log::info!("capture: I2S at {} Hz", config::SAMPLE_RATE_HZ);

    loop {
        let window = requests.next().await;

        // whatever piled up while nobody was asking is stale
        let stale = transfer
            .available()
            .map_err(|e| error_with_location!("I2S DMA failed: {:?}", e))?;
        if stale > 0 {
            transfer
                .pop(&mut chunk[..stale.min(I2S_DMA_BUFFER_SIZE)])
                .map_err(|e| error_with_location!("I2S DMA failed: {:?}", e))?;
        }

        let mut filled = 0;
        while filled < FFT_SIZE {
            let available = transfer
                .available()
                .map_err(|e| error_with_location!("I2S DMA failed: {:?}", e))?;
            let wanted = (FFT_SIZE - filled) * FRAME_SIZE;
            let len = available.min(wanted) / FRAME_SIZE * FRAME_SIZE;
            if len == 0 {
                embassy_futures::yield_now().await;
                continue;
            }

            let popped = transfer
                .pop(&mut chunk[..len])
                .map_err(|e| error_with_location!("I2S DMA failed: {:?}", e))?;
            filled += decode_left(&chunk[..popped], &mut window[filled..]);
        }

        completion.complete(window);
    }
}

/// Left channel of each stereo frame, top 16 of its 24 bits. Returns the samples written.
fn decode_left(frames: &[u8], out: &mut [i16]) -> usize {
    let mut written = 0;
    for (frame, sample) in frames.chunks_exact(FRAME_SIZE).zip(out.iter_mut()) {
        let left = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        *sample = (left >> 16) as i16;
        written += 1;
    }
    written
}
