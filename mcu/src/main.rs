#![no_std]
#![no_main]
#![feature(never_type)]

extern crate alloc;
use alloc::{boxed::Box, vec};
use embassy_executor::Spawner;
use esp_hal_embassy::Executor;
use log::{LevelFilter, info};

use core::{panic::PanicInfo, ptr::addr_of_mut};

use esp_hal::{
    dma::{DmaRxBuf, DmaTxBuf},
    dma_buffers,
    gpio::{Input, InputConfig, Pull},
    spi::master::SpiDmaBus,
    system::{CpuControl, Stack},
    time::Rate,
    timer::{AnyTimer, timg::TimerGroup},
};

use anyhow::Result;

use esp_hal::peripherals::Peripherals;

use static_cell::StaticCell;

use rtt_target::{ChannelMode, rprintln, rtt_init_print};

use musicsync::capture::{CaptureCompletion, CaptureRequests, SampleWindow, SignalCaptureSource};
use musicsync::config::{self, FFT_SIZE, LED_COUNT};
use musicsync::fft;
use musicsync::pipeline::{ModeRequests, Pipeline, PipelineConfig};
use musicsync::visualizer::Mode;
use musicsync::ws2812::Ws2812;

mod audio;
pub mod util;

use util::*;

esp_bootloader_esp_idf::esp_app_desc!();

use esp_alloc as _;

type StripPipeline = Pipeline<
    'static,
    SignalCaptureSource<'static, FFT_SIZE>,
    SpiDmaBus<'static, esp_hal::Blocking>,
    FFT_SIZE,
    LED_COUNT,
    { config::ws2812::ENCODED_LEN },
>;

static CAPTURE_REQUESTS: CaptureRequests<FFT_SIZE> = CaptureRequests::new();
static CAPTURE_COMPLETION: CaptureCompletion<FFT_SIZE> = CaptureCompletion::new();
static MODE_REQUESTS: ModeRequests = ModeRequests::new();

#[inline(never)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    rprintln!("{}", info);
    log::error!("{info}");

    loop {
        // prevent optimization
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

// the pipeline is boxed, but is built on this stack first
static mut APP_CORE_STACK: Stack<{ 32 * 1024 }> = Stack::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    match _main(spawner).await {
        Err(e) => {
            log::error!("Error!");
            log::error!("{e:?}");
            loop {}
        }
    }
}

async fn _main(spawner: Spawner) -> Result<!> {
    esp_alloc::heap_allocator!(#[unsafe(link_section = ".dram2_uninit")] size: 64_000);

    // ---------------------------------------------------------------------------

    rtt_init_print!(ChannelMode::NoBlockTrim, 4 * 1024);

    static LOGGER: StaticCell<ConsoleLogger> = StaticCell::new();
    let logger = LOGGER.init(ConsoleLogger);

    log::set_logger(logger).map_err(|_| error_with_location!("Failed to set logger"))?;
    log::set_max_level(if config::debug::MEASURE_PERFORMANCE {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    config::dump_to_log();

    // ---------------------------------------------------------------------------

    let peripherals: Peripherals = esp_hal::init(esp_hal::Config::default());

    let strip_data_pin = peripherals.GPIO21;

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timer0: AnyTimer = timg0.timer0.into();
    let timer1: AnyTimer = timg0.timer1.into();
    esp_hal_embassy::init([timer0, timer1]);

    if config::debug::MEASURE_PERFORMANCE {
        let mut scratch: Box<[f32; config::fft::MAX_SIZE]> =
            vec![0.0f32; config::fft::MAX_SIZE]
                .into_boxed_slice()
                .try_into()
                .map_err(|_| error_with_location!("Failed to allocate FFT scratch"))?;
        let measurements = fft::measure_performance(&mut scratch, now_us);
        fft::log_performance(&measurements);
    }

    // Strip setup:
    //  DMA TX buffer size:
    //    1 sentinel byte + LED_COUNT * 3 channels * 3 SPI bytes per channel byte
    //    1 + 180 * 9 = 1621
    //    ==> round up to 2 kB
    const DMA_TX_SIZE: usize = 2 * 1024;
    const _: () = assert!(config::ws2812::ENCODED_LEN <= DMA_TX_SIZE);
    let (rx_buffer, rx_descriptors, tx_buffer, tx_descriptors) = dma_buffers!(1, DMA_TX_SIZE);
    let dma_rx_buf = DmaRxBuf::new(rx_descriptors, rx_buffer)
        .map_err(|err| error_with_location!("Failed to create DMA RX buffer: {:?}", err))?;
    let dma_tx_buf = DmaTxBuf::new(tx_descriptors, tx_buffer)
        .map_err(|err| error_with_location!("Failed to create DMA TX buffer: {:?}", err))?;

    let spi: SpiDmaBus<'static, esp_hal::Blocking> = esp_hal::spi::master::Spi::new(
        peripherals.SPI2,
        esp_hal::spi::master::Config::default()
            .with_frequency(Rate::from_khz(config::ws2812::SPI_FREQUENCY_KHZ)),
    )?
    .with_mosi(strip_data_pin)
    .with_dma(peripherals.DMA_CH1)
    .with_buffers(dma_rx_buf, dma_tx_buf);

    let i2s_peripherals = audio::I2sPeripherals {
        i2s0: peripherals.I2S0,
        dma_ch0: peripherals.DMA_CH0,
        gpio0: peripherals.GPIO0,
        gpio4: peripherals.GPIO4,
        gpio6: peripherals.GPIO6,
        gpio5: peripherals.GPIO5,
    };

    // capture runs on this core, so its DMA polling never competes with the pipeline
    spawner
        .spawn(audio::capture_task(
            i2s_peripherals,
            &CAPTURE_REQUESTS,
            &CAPTURE_COMPLETION,
        ))
        .map_err(|e| error_with_location!("Failed to spawn capture task: {:?}", e))?;

    let mode_button = Input::new(
        peripherals.GPIO14,
        InputConfig::default().with_pull(Pull::Up),
    );
    spawner
        .spawn(mode_button_task(mode_button))
        .map_err(|e| error_with_location!("Failed to spawn mode button task: {:?}", e))?;

    let mut cpu_control = CpuControl::new(peripherals.CPU_CTRL);
    let _guard = cpu_control
        .start_app_core(unsafe { &mut *addr_of_mut!(APP_CORE_STACK) }, move || {
            static EXECUTOR: StaticCell<Executor> = StaticCell::new();
            let executor = EXECUTOR.init(Executor::new());
            executor.run(|spawner| {
                spawner.spawn(pipeline_task(spi)).ok();
            });
        })
        .map_err(|e| error_with_location!("Failed to start app core: {:?}", e))?;

    // all processing is done in tasks
    loop {
        embassy_futures::yield_now().await;
    }
}

fn build_pipeline(spi: SpiDmaBus<'static, esp_hal::Blocking>) -> Result<Box<StripPipeline>> {
    let windows = (
        static_cell_init!(SampleWindow<FFT_SIZE>, SampleWindow::new()),
        static_cell_init!(SampleWindow<FFT_SIZE>, SampleWindow::new()),
    );

    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        CAPTURE_REQUESTS.source(),
        &CAPTURE_COMPLETION,
        Ws2812::new(spi),
        windows,
    )
    .map_err(|e| error_with_location!("Invalid pipeline configuration: {}", e))?
    .with_mode_requests(&MODE_REQUESTS)
    .with_clock(now_us);

    Ok(Box::new(pipeline))
}

#[embassy_executor::task]
async fn pipeline_task(spi: SpiDmaBus<'static, esp_hal::Blocking>) -> ! {
    info!("Pipeline task started");

    match build_pipeline(spi) {
        Ok(mut pipeline) => match pipeline.run().await {
            Ok(never) => match never {},
            // run() already logged it
            Err(_) => {}
        },
        Err(e) => log::error!("{e:?}"),
    }

    // fatal: leave the strip as it is and stop
    loop {
        embassy_futures::yield_now().await;
    }
}

/// Each press steps to the next visualization mode.
#[embassy_executor::task]
async fn mode_button_task(mut button: Input<'static>) -> ! {
    let mut mode = config::MODE;
    loop {
        button.wait_for_falling_edge().await;
        mode = match mode {
            Mode::Flat => Mode::UnidirectionalFlow,
            Mode::UnidirectionalFlow => Mode::BidirectionalFlow,
            Mode::BidirectionalFlow => Mode::Flat,
        };
        MODE_REQUESTS.signal(mode as u8);

        // debounce
        embassy_time::Timer::after(embassy_time::Duration::from_millis(200)).await;
    }
}
