use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use musicsync::capture::SampleWindow;
use musicsync::config;
use musicsync::fft::{self, Window};
use musicsync::spectrum::Analyzer;
use musicsync::visualizer::{Mode, Visualizer};
use musicsync::ws2812::{Ws2812, encoded_len};
use musicsync::{Color, bands::BandMapper, testsignal};

fn transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward transform");
    let mut scratch = vec![0.0f32; fft::SUPPORTED_SIZES[fft::SUPPORTED_SIZES.len() - 1]];

    for size in fft::SUPPORTED_SIZES {
        let transform = fft::init_transform(size).unwrap();
        let input: Vec<f32> = testsignal::sine(size, 1.0, size as u32, 1.0).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| {
                let region = &mut scratch[..size];
                region.copy_from_slice(input);
                black_box(transform.forward(region));
            })
        });
    }
    group.finish();
}

fn cycle(c: &mut Criterion) {
    const N: usize = config::FFT_SIZE;
    const LEDS: usize = config::LED_COUNT;

    let mut window = Box::new(SampleWindow::<N>::new());
    testsignal::fill_sine(
        &mut window[..],
        config::debug::FAKE_INPUT_FREQ_HZ,
        config::SAMPLE_RATE_HZ,
        config::debug::FAKE_INPUT_AMPLITUDE,
    );

    c.bench_function("analyze", |b| {
        let mut analyzer = Analyzer::<N>::new(Window::Hann).unwrap();
        b.iter(|| black_box(analyzer.analyze(&window).peak()))
    });

    c.bench_function("map, render and encode", |b| {
        let mut analyzer = Analyzer::<N>::new(Window::Rectangle).unwrap();
        let spectrum: Vec<f32> = analyzer.analyze(&window).to_vec();
        let mapper = BandMapper::default();
        let mut visualizer = Visualizer::<LEDS>::new(Mode::BidirectionalFlow);
        let mut strip = Ws2812::<(), LEDS, { encoded_len(LEDS) }>::new(());

        b.iter(|| {
            let color = mapper.map_to_color(black_box(&spectrum));
            strip.encode(visualizer.render(color));
            black_box(strip.buffer());
        })
    });

    c.bench_function("set_range whole strip", |b| {
        let mut strip = Ws2812::<(), LEDS, { encoded_len(LEDS) }>::new(());
        let color = Color { r: 1, g: 2, b: 3 };
        b.iter(|| {
            strip.set_range(0, LEDS - 1, black_box(color)).unwrap();
            black_box(strip.buffer());
        })
    });
}

criterion_group!(benches, transform, cycle);
criterion_main!(benches);
