use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use rbpf_tracker::integration::{IntoScans, uniform_stream};
use rbpf_tracker::tracker::{Association, DeathSampling, KalmanFilter};
use rbpf_tracker::{FilterConfig, FilterError, ParticleFilter, TrackerPipeline};

const DT: f64 = 0.01;

fn scans(stream: &[(f64, Vec<f64>)]) -> impl Iterator<Item = (f64, &[f64])> + '_ {
    stream.iter().map(|(time, m)| (*time, m.as_slice()))
}

fn noisy_track(start: f64, velocity: f64, steps: usize, seed: u64) -> Vec<(f64, Vec<f64>)> {
    let noise = Normal::new(0.0, 0.2).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..steps)
        .map(|i| {
            let time = i as f64 * DT;
            (time, vec![start + velocity * time + noise.sample(&mut rng)])
        })
        .collect()
}

#[test]
fn test_basic_tracking() {
    let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 42).unwrap();
    let stream = noisy_track(2.0, 0.5, 300, 1);

    for (time, measurements) in &stream {
        filter.step(*time, measurements).unwrap();
        let sum: f64 = filter.particles().iter().map(|p| p.weight).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }

    let time = filter.previous_time().unwrap();
    let truth = 2.0 + 0.5 * time;
    let best = filter.best_particle();
    assert!(
        best.targets()
            .iter_living()
            .any(|t| (t.position() - truth).abs() < 1.0),
        "no living target near {truth}"
    );
}

#[test]
fn test_two_separated_targets() {
    let near = noisy_track(0.0, 0.0, 300, 2);
    let far = noisy_track(5.0, 0.0, 300, 3);
    let stream: Vec<(f64, Vec<f64>)> = near
        .into_iter()
        .zip(far)
        .map(|((time, mut a), (_, b))| {
            a.extend(b);
            (time, a)
        })
        .collect();

    let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 7).unwrap();
    let reports = filter.run(scans(&stream)).unwrap();
    assert_eq!(reports.len(), 300);
    assert!(reports.iter().all(|r| r.associations.len() == 2));

    let best = filter.best_particle();
    for truth in [0.0, 5.0] {
        assert!(
            best.targets()
                .iter_living()
                .any(|t| (t.position() - truth).abs() < 0.5),
            "no living target near {truth}"
        );
    }
}

#[test]
fn test_archive_never_shrinks() {
    let config = FilterConfig {
        death_rate: 20.0,
        death_sampling: DeathSampling::Independent,
        ..Default::default()
    };
    let mut filter = ParticleFilter::with_seed(config, 5).unwrap();
    let mut totals = vec![0; filter.particles().len()];

    // Sparse measurements give the lifetime model room to kill targets.
    for (i, (time, measurements)) in noisy_track(1.0, 0.0, 200, 4).into_iter().enumerate() {
        let scan = if i % 10 == 0 { measurements } else { Vec::new() };
        let report = filter.step(time, &scan).unwrap();
        if report.resampled {
            totals = filter
                .particles()
                .iter()
                .map(|p| p.targets().total_count())
                .collect();
            continue;
        }
        for (particle, total) in filter.particles().iter().zip(totals.iter_mut()) {
            let targets = particle.targets();
            targets.check_consistency().unwrap();
            assert!(targets.total_count() >= *total);
            assert_eq!(
                targets.living_count(),
                targets.archive().iter().filter(|t| t.is_alive()).count()
            );
            *total = targets.total_count();
        }
    }
}

#[test]
fn test_resampling_keeps_particle_count() {
    let config = FilterConfig {
        num_particles: 16,
        ..Default::default()
    };
    let mut filter = ParticleFilter::with_seed(config, 9).unwrap();
    let mut resampled = 0;
    for (time, measurements) in noisy_track(0.0, 1.0, 100, 6) {
        let report = filter.step(time, &measurements).unwrap();
        if report.resampled {
            resampled += 1;
            assert_eq!(filter.particles().len(), 16);
            for p in filter.particles() {
                assert_eq!(p.weight, 1.0 / 16.0);
            }
            assert_eq!(filter.effective_particle_count(), 16.0);
        }
    }
    assert_eq!(filter.resample_count(), resampled);
    // Differing association draws break weight uniformity almost immediately.
    assert!(resampled > 0);
}

#[test]
fn test_deterministic_with_fixed_seed() {
    let stream: Vec<(f64, Vec<f64>)> = (0..10)
        .map(|i| (i as f64 * DT, vec![i as f64 * 0.1]))
        .collect();

    let trace = |seed: u64| {
        let mut filter = ParticleFilter::with_seed(FilterConfig::default(), seed).unwrap();
        filter
            .run(scans(&stream))
            .unwrap()
            .into_iter()
            .map(|r| (r.living_counts, r.associations))
            .collect::<Vec<(Vec<usize>, Vec<Vec<Association>>)>>()
    };

    let first = trace(1234);
    assert_eq!(first, trace(1234));
    assert_eq!(first.len(), 10);
}

#[test]
fn test_single_target_matches_kalman_filter() {
    // No clutter, births effectively impossible once the target exists and a
    // lifetime long enough that deaths are negligible. A zero birth prior is
    // rejected alongside a zero clutter prior, since nothing could explain the
    // first measurement, so a negligible prior stands in for zero.
    let config = FilterConfig {
        p_clutter_prior: 0.0,
        p_birth_prior: 1e-12,
        death_rate: 0.1,
        ..Default::default()
    };
    let stream = noisy_track(3.0, -0.4, 50, 8);
    let mut filter = ParticleFilter::with_seed(config.clone(), 11).unwrap();
    filter.run(scans(&stream)).unwrap();

    let kf = KalmanFilter::new(
        config.time_step,
        config.time_step_tolerance,
        config.process_noise_spectral_density,
        config.measurement_sigma,
        config.initial_velocity_variance,
    );
    let (mut mean, mut cov) = kf.initiate(stream[0].1[0]);
    for pair in stream.windows(2) {
        let (previous, _) = &pair[0];
        let (time, measurements) = &pair[1];
        (mean, cov) = kf.predict(&mean, &cov, *time, time - previous).unwrap();
        (mean, cov) = kf.update(&mean, &cov, measurements[0]);
    }

    for particle in filter.particles() {
        let targets = particle.targets();
        assert_eq!(targets.total_count(), 1);
        let target = targets.living(0).unwrap();
        assert_relative_eq!(target.position(), mean[0], epsilon = 1e-9);
        assert_relative_eq!(target.velocity(), mean[1], epsilon = 1e-9);
        assert_relative_eq!(*target.covariance(), cov, epsilon = 1e-9);
    }
}

#[test]
fn test_measurement_after_long_silence() {
    // With rate 10 the survival of a target unseen for 73 time units underflows.
    let config = FilterConfig {
        num_particles: 4,
        p_clutter_prior: 0.0,
        death_rate: 10.0,
        ..Default::default()
    };
    let mut filter = ParticleFilter::with_seed(config, 13).unwrap();
    filter.step(0.0, &[1.0]).unwrap();
    for i in 1..7300 {
        filter.step(i as f64 * DT, &[]).unwrap();
    }

    let report = filter.step(7300.0 * DT, &[1.0]).unwrap();
    assert_eq!(report.associations.len(), 1);
    assert_eq!(report.associations[0].len(), 4);
    for particle in filter.particles() {
        particle.targets().check_consistency().unwrap();
    }
}

#[test]
fn test_rejects_irregular_timestamps() {
    let mut filter = ParticleFilter::with_seed(FilterConfig::default(), 0).unwrap();
    filter.step(0.0, &[1.0]).unwrap();
    filter.step(0.01, &[1.0]).unwrap();

    let err = filter.step(0.03, &[1.0]).unwrap_err();
    assert!(matches!(err, FilterError::TimeStepMismatch { .. }));
    let err = filter.step(0.005, &[1.0]).unwrap_err();
    assert!(matches!(err, FilterError::NonIncreasingTime { .. }));
}

#[test]
fn test_pipeline_end_to_end() {
    let values: Vec<f64> = noisy_track(1.0, 0.2, 100, 10)
        .into_iter()
        .map(|(_, m)| m[0])
        .collect();
    let source = uniform_stream(0.0, DT, values).into_scans();
    let filter = ParticleFilter::with_seed(FilterConfig::default(), 3).unwrap();
    let mut pipeline = TrackerPipeline::with_filter(source, filter);

    let table = pipeline.run().unwrap();
    let rows = table.dense(pipeline.times());
    assert_eq!(rows.len(), 100);
    assert!(rows.iter().all(|r| r.positions.len() == table.targets().len()));
}
