//! Trend and batch analysis benchmarks
//!
//! Run with: cargo bench --bench trend_analysis

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use field_advisor_rust::{
    analyze_trend, detect_anomalies, project_trend, FieldAdvisor, FieldData, FieldLocation, IndexKind, IndexSeries,
    Observation, TrendConfig, WeatherDay,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noisy_series(rng: &mut StdRng, kind: IndexKind, start: NaiveDate, n: i64, base: f64, slope: f64) -> IndexSeries {
    let observations = (0..n)
        .map(|i| {
            let day = i * 5;
            let mut obs = Observation::new(
                start + Duration::days(day),
                base + slope * day as f64 + rng.gen_range(-0.03..0.03),
            );
            obs.cloud_cover_pct = Some(rng.gen_range(0.0..90.0));
            obs
        })
        .collect();
    IndexSeries::new(kind, observations)
}

fn synthetic_field(rng: &mut StdRng, id: usize) -> FieldData {
    let sowing = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap_or_default();
    let reference = sowing + Duration::days(75);
    let weather = |offset: i64, count: i64, rng: &mut StdRng| -> Vec<WeatherDay> {
        (0..count)
            .map(|i| {
                let t_min = rng.gen_range(12.0..20.0);
                WeatherDay {
                    date: sowing + Duration::days(offset + i),
                    t_min_c: t_min,
                    t_max_c: t_min + rng.gen_range(8.0..16.0),
                    precipitation_mm: if rng.gen_bool(0.2) { rng.gen_range(1.0..25.0) } else { 0.0 },
                    et0_mm: None,
                }
            })
            .collect()
    };

    FieldData {
        field_id: format!("F-{:04}", id),
        name: String::new(),
        crop: "maize".to_string(),
        area_ha: rng.gen_range(2.0..40.0),
        location: FieldLocation { latitude: 45.0, longitude: 10.0, province: None },
        sowing_date: Some(sowing),
        reference_date: reference,
        indices: vec![
            noisy_series(rng, IndexKind::Ndvi, sowing, 15, 0.2, 0.008),
            noisy_series(rng, IndexKind::Ndmi, sowing, 15, 0.1, 0.003),
            noisy_series(rng, IndexKind::Reci, sowing, 15, 0.8, 0.03),
            noisy_series(rng, IndexKind::Smi, sowing, 15, 0.5, -0.02),
        ],
        weather_history: weather(0, 76, rng),
        weather_forecast: weather(76, 7, rng),
        nitrogen_applied_kg_ha: 80.0,
    }
}

fn bench_trend(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap_or_default();
    let series = noisy_series(&mut rng, IndexKind::Ndvi, start, 30, 0.2, 0.006);
    let config = TrendConfig::default();

    c.bench_function("analyze_trend_30_scenes", |b| {
        b.iter(|| analyze_trend(black_box(&series), black_box(&config)))
    });

    c.bench_function("detect_anomalies_30_scenes", |b| {
        b.iter(|| detect_anomalies(black_box(&series), black_box(&config)))
    });

    if let Ok(trend) = analyze_trend(&series, &config) {
        c.bench_function("project_30_days", |b| {
            b.iter(|| project_trend(black_box(&trend), 30, black_box(&config)))
        });
    }
}

fn bench_fields(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let fields: Vec<FieldData> = (0..100).map(|i| synthetic_field(&mut rng, i)).collect();
    let advisor = FieldAdvisor::default();

    c.bench_function("analyze_field", |b| b.iter(|| advisor.analyze(black_box(&fields[0]))));

    let mut group = c.benchmark_group("batch");
    group.sample_size(20);
    group.bench_function("analyze_batch_100_fields", |b| {
        b.iter(|| advisor.analyze_batch(black_box(&fields)))
    });
    group.finish();
}

criterion_group!(benches, bench_trend, bench_fields);
criterion_main!(benches);
