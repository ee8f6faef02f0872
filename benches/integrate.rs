use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hyperscatter::{
    integrate, CalibrationFormat, CalibrationInput, Frame, FrameMetadata, Geometry,
    IntegrationKind, IntegratorConfig, IntegratorHandle, Mask, KEY_ENERGY,
};
use ndarray::Array2;

const DIM: usize = 1024;

fn calibration() -> CalibrationInput {
    CalibrationInput {
        distance: Some(131.06),
        beam_center_x: Some(561.76),
        beam_center_y: Some(571.67),
        pixel_size: Some(0.027),
        tilt: Some(0.0),
    }
}

fn bench_handle_build(c: &mut Criterion) {
    let geometry =
        Geometry::from_calibration(&calibration(), CalibrationFormat::Nika, 270.0).unwrap();
    let mask = Mask::all_valid(DIM, DIM);
    let config = IntegratorConfig::default();

    c.bench_function("handle_build_1024", |b| {
        b.iter(|| {
            IntegratorHandle::build(black_box(geometry.clone()), &mask, &config).unwrap()
        })
    });
}

fn bench_single_frame(c: &mut Criterion) {
    let geometry =
        Geometry::from_calibration(&calibration(), CalibrationFormat::Nika, 270.0).unwrap();
    let mask = Mask::all_valid(DIM, DIM);
    let handle = IntegratorHandle::build(geometry, &mask, &IntegratorConfig::default()).unwrap();

    let frame = Frame::new(
        Array2::from_shape_fn((DIM, DIM), |(r, c)| ((r * 31 + c * 17) % 997) as f64),
        FrameMetadata::new().with(KEY_ENERGY, 270.0),
    )
    .unwrap();

    c.bench_function("integrate_cake_1024", |b| {
        b.iter(|| integrate(black_box(&handle), black_box(&frame)).unwrap())
    });

    let radial = IntegratorHandle::build(
        Geometry::from_calibration(&calibration(), CalibrationFormat::Nika, 270.0).unwrap(),
        &mask,
        &IntegratorConfig {
            kind: IntegrationKind::Radial,
            ..IntegratorConfig::default()
        },
    )
    .unwrap();

    c.bench_function("integrate_radial_1024", |b| {
        b.iter(|| integrate(black_box(&radial), black_box(&frame)).unwrap())
    });
}

criterion_group!(benches, bench_handle_build, bench_single_frame);
criterion_main!(benches);
