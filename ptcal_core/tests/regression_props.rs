use proptest::prelude::*;
use ptcal_core::{CalibrationHistory, fit, fit_all};

fn sse(x: &[f64], y: &[f64], slope: f64, intercept: f64) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - (slope * xi + intercept);
            r * r
        })
        .sum()
}

fn spread(x: &[f64]) -> f64 {
    let m = x.iter().sum::<f64>() / x.len() as f64;
    x.iter().map(|v| (v - m) * (v - m)).sum()
}

fn points() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (2usize..20).prop_flat_map(|n| {
        (
            prop::collection::vec(-100.0f64..100.0, n),
            prop::collection::vec(-1000.0f64..1000.0, n),
        )
    })
}

proptest! {
    #[test]
    fn matches_closed_form((x, y) in points()) {
        let n = x.len() as f64;
        prop_assume!(spread(&x) >= n);

        let c = fit(&x, &y).unwrap();
        let sx: f64 = x.iter().sum();
        let sy: f64 = y.iter().sum();
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        let sxx: f64 = x.iter().map(|a| a * a).sum();
        let slope = (n * sxy - sx * sy) / (n * sxx - sx * sx);
        let intercept = (sy - slope * sx) / n;

        prop_assert!((c.slope - slope).abs() <= 1e-9 * slope.abs().max(1.0));
        prop_assert!((c.intercept - intercept).abs() <= 1e-5 + 1e-9 * intercept.abs());
    }

    #[test]
    fn no_nearby_line_fits_better((x, y) in points(), ds in -1.0f64..1.0, dc in -1.0f64..1.0) {
        let n = x.len() as f64;
        prop_assume!(spread(&x) >= n);
        prop_assume!(ds.abs() >= 0.01 || dc.abs() >= 0.01);

        let c = fit(&x, &y).unwrap();
        let best = sse(&x, &y, c.slope, c.intercept);
        let other = sse(&x, &y, c.slope + ds, c.intercept + dc);
        prop_assert!(other >= best - 1e-6 * best.max(1.0));
    }

    #[test]
    fn exact_lines_are_recovered(
        slope in -500.0f64..500.0,
        intercept in -100.0f64..100.0,
        x in prop::collection::vec(0.5f64..4.0, 3..12),
    ) {
        prop_assume!(spread(&x) > 0.5);
        let y: Vec<f64> = x.iter().map(|v| slope * v + intercept).collect();
        let c = fit(&x, &y).unwrap();
        prop_assert!((c.slope - slope).abs() < 1e-6);
        prop_assert!((c.intercept - intercept).abs() < 1e-4);
    }
}

#[test]
fn fit_all_runs_in_sensor_order() {
    let mut h = CalibrationHistory::new(3);
    for (p, base) in [(0.0, 0.5), (100.0, 0.9), (200.0, 1.3)] {
        h.push(p, &[base, base * 2.0, base + 1.0]).unwrap();
    }
    let c = fit_all(&h).unwrap();
    assert_eq!(c.len(), 3);
    assert!((c[0].slope - 250.0).abs() < 1e-9);
    assert!((c[1].slope - 125.0).abs() < 1e-9);
    assert!((c[2].slope - 250.0).abs() < 1e-9);
    assert!((c[0].intercept + 125.0).abs() < 1e-9);
}
