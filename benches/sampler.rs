use criterion::{criterion_group, criterion_main, Criterion};

use lumistream::{
    geometry::{ScreenSize, ToLedMatrix},
    image::*,
    models::{AspectRatio, LedLayout},
};

fn random_image(width: u32, height: u32) -> RawImage {
    let data = (0..width as usize * height as usize * PixelFormat::Bgra.channels())
        .map(|_| rand::random::<u8>())
        .collect();

    RawImage::new(data, width, height, PixelFormat::Bgra).unwrap()
}

fn layout(leds: u32) -> LedLayout {
    LedLayout {
        top: leds / 4,
        bottom_row: leds / 4,
        left: leds / 4,
        right: leds / 4,
        ..Default::default()
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let screen = ScreenSize::new(1920, 1080);
    let image = random_image(screen.width, screen.height);
    let sampler = Sampler::default();

    for leds in [40, 200] {
        let matrix = layout(leds)
            .to_matrix(screen, AspectRatio::Fullscreen)
            .unwrap();

        c.bench_function(&format!("{} {} leds", screen, matrix.len()), |b| {
            b.iter(|| sampler.sample_frame(&image, &matrix))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
