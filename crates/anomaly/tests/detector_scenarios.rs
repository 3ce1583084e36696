use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kilnwatch_anomaly::{AnomalyConfig, AnomalyEnsembleDetector};
use kilnwatch_core::{AnalyticsError, SensorSample, Severity};

fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// A quiet plant: pressure and energy follow temperature, so a temperature
/// excursion shows up across the coupled channels.
fn plant(rows: usize, seed: u64, spikes: &[(usize, f64)]) -> Vec<SensorSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..rows)
        .map(|i| {
            let mut temp = 1000.0 + 10.0 * gaussian(&mut rng);
            if let Some((_, delta)) = spikes.iter().find(|(at, _)| *at == i) {
                temp += delta;
            }
            let flow = 100.0 + gaussian(&mut rng);
            SensorSample {
                timestamp: start + Duration::minutes(5 * i as i64),
                kiln_temperature: temp,
                system_pressure: 3.2 + (temp - 1000.0) * 0.002 + 0.01 * gaussian(&mut rng),
                material_moisture: 5.0 + 0.1 * gaussian(&mut rng),
                material_flow_rate: flow,
                oxygen_level: 3.0 + 0.05 * gaussian(&mut rng),
                co_level: 100.0 + 2.0 * gaussian(&mut rng),
                nox_level: 400.0 + 5.0 * gaussian(&mut rng),
                mill_vibration: 2.0 + 0.05 * gaussian(&mut rng),
                kiln_vibration: 1.5 + 0.05 * gaussian(&mut rng),
                energy_consumption: temp * 0.08 + flow * 0.5 + 0.5 * gaussian(&mut rng),
                is_anomaly: false,
            }
        })
        .collect()
}

#[test]
fn temperature_spike_is_flagged_by_the_statistical_scorer() {
    let detector = AnomalyEnsembleDetector::new(AnomalyConfig::default()).unwrap();
    detector.train(&plant(1000, 1, &[])).unwrap();

    let spike_at = 500;
    let live = plant(1000, 2, &[(spike_at, 250.0)]);
    let detection = detector.detect(&live).unwrap();

    let verdict = &detection.verdicts[spike_at];
    assert!(verdict.statistical_flag, "out of bounds: {}", verdict.out_of_bounds);
    assert!(verdict.is_anomaly);

    let report = detection
        .reports
        .iter()
        .find(|r| r.index == spike_at)
        .expect("spike row is reported");
    let temp = report
        .affected_sensors
        .iter()
        .find(|s| s.sensor == "kiln_temperature")
        .expect("temperature is out of range");
    assert!(temp.deviation_percent > 15.0);
    assert!(
        report
            .causes
            .contains(&"Kiln burner malfunction or fuel supply issue".to_string())
    );
    assert!(report.severity >= Severity::Low);
    assert!(detection.severity.count >= 1);
}

#[test]
fn higher_contamination_never_flags_fewer_rows() {
    let train = plant(600, 3, &[]);
    let live = plant(300, 4, &[(50, 120.0), (150, -90.0), (250, 60.0)]);

    let run = |contamination: f64| {
        let cfg = AnomalyConfig::default()
            .with_contamination(contamination)
            .with_estimators(60)
            .with_seed(7);
        let detector = AnomalyEnsembleDetector::new(cfg).unwrap();
        detector.train(&train).unwrap();
        detector.detect(&live).unwrap()
    };

    let strict = run(0.02);
    let loose = run(0.25);
    assert!(loose.anomaly_count() >= strict.anomaly_count());
    for (s, l) in strict.verdicts.iter().zip(&loose.verdicts) {
        if s.is_anomaly {
            assert!(l.is_anomaly, "row {} lost its flag", s.index);
        }
    }
}

#[test]
fn retraining_replaces_the_model_atomically() {
    let detector = AnomalyEnsembleDetector::new(AnomalyConfig::default().with_estimators(20)).unwrap();
    let first = detector.train(&plant(200, 5, &[])).unwrap();
    let held = detector.detect(&plant(20, 6, &[])).unwrap();

    let second = detector.train(&plant(200, 8, &[])).unwrap();
    let fresh = detector.detect(&plant(20, 6, &[])).unwrap();

    assert_eq!(first.generation, 1);
    assert_eq!(second.generation, 2);
    assert_eq!(held.generation, 1);
    assert_eq!(fresh.generation, 2);
}

#[test]
fn untrained_detector_refuses_to_score() {
    let detector = AnomalyEnsembleDetector::new(AnomalyConfig::default()).unwrap();
    let err = detector.detect(&plant(10, 9, &[])).unwrap_err();
    assert!(matches!(err, AnalyticsError::UntrainedModel { .. }));
}
