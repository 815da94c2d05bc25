use criterion::{black_box, criterion_group, criterion_main, Criterion};
use timegrain::{denormal, Request, SampleRates, Stretcher};

fn grain_cycle(stretcher: &mut Stretcher, request: &mut Request, buffer: &[f32], stride: usize) -> f32 {
    stretcher.specify_grain(request);
    stretcher.analyse_grain(buffer, stride);
    let output = stretcher.synthesise_grain();
    let probe = output.channel(0).first().copied().unwrap_or(0.0);
    stretcher.next(request);
    probe
}

fn stretch_bench(c: &mut Criterion) {
    denormal::prevent_denormals();

    let rates = SampleRates {
        input: 48000,
        output: 48000,
    };
    let mut stretcher = Stretcher::new(rates, 2);
    let stride = stretcher.max_input_frame_count();
    let buffer: Vec<f32> = (0..2 * stride)
        .map(|i| ((i * 2654435761usize) as u32 as f32 / u32::MAX as f32 - 0.5) * 0.8)
        .collect();

    let mut slow = Request {
        position: 0.0,
        speed: 0.75,
        ..Request::default()
    };
    stretcher.preroll(&mut slow);
    c.bench_function("grain_cycle_stretch", |b| {
        b.iter(|| black_box(grain_cycle(&mut stretcher, &mut slow, &buffer, stride)))
    });

    let mut stretcher = Stretcher::new(rates, 2);
    let mut shifted = Request {
        position: 0.0,
        speed: 1.0,
        pitch: 1.5,
        ..Request::default()
    };
    stretcher.preroll(&mut shifted);
    c.bench_function("grain_cycle_pitch_shift", |b| {
        b.iter(|| black_box(grain_cycle(&mut stretcher, &mut shifted, &buffer, stride)))
    });
}

criterion_group!(benches, stretch_bench);
criterion_main!(benches);
