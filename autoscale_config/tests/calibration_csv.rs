use std::fs::File;
use std::io::Write;

use autoscale_config::{CalibrationFit, CalibrationRow, Polarity, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn row(raw: i64, grams: f32) -> CalibrationRow {
    CalibrationRow { raw, grams }
}

#[rstest]
fn two_points_give_exact_factor_and_zero() {
    let fit = CalibrationFit::from_rows(&[row(1_000_000, 0.0), row(1_098_632, 100.0)])
        .expect("fit");
    assert!((fit.scale_factor - 986.32).abs() < 1e-3);
    assert_eq!(fit.zero_offset, 1_000_000);
    assert_eq!(fit.polarity, Polarity::Positive);
}

#[rstest]
fn falling_counts_mean_negative_polarity() {
    let fit = CalibrationFit::from_rows(&[row(0, 0.0), row(-5_000, 10.0), row(-10_000, 20.0)])
        .expect("fit");
    assert!((fit.scale_factor - 500.0).abs() < 1e-3);
    assert_eq!(fit.zero_offset, 0);
    assert_eq!(fit.polarity, Polarity::Negative);
}

#[rstest]
fn outlier_is_rejected_by_refit() {
    // Exact line raw = 100 * g + 500, except one wild reading.
    let mut rows: Vec<_> = (0..10).map(|i| row(500 + 1_000 * i, 10.0 * i as f32)).collect();
    rows[4].raw += 50_000;
    let fit = CalibrationFit::from_rows(&rows).expect("fit");
    assert!((fit.scale_factor - 100.0).abs() < 1e-3, "{fit:?}");
    assert_eq!(fit.zero_offset, 500);
}

#[rstest]
#[case(vec![row(100, 0.0)], "at least two rows")]
#[case(vec![row(100, 50.0), row(200, 50.0)], "same mass")]
#[case(vec![row(100, 0.0), row(200, -1.0)], "invalid grams")]
fn rejects_unusable_tables(#[case] rows: Vec<CalibrationRow>, #[case] needle: &str) {
    let err = CalibrationFit::from_rows(&rows).expect_err("should fail");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn loads_csv_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cal.csv");
    let mut f = File::create(&path).expect("create");
    writeln!(f, "raw,grams\n1000000,0\n1098632,100").expect("write");
    let fit = load_calibration_csv(&path).expect("load");
    assert!((fit.scale_factor - 986.32).abs() < 1e-3);
}

#[rstest]
fn rejects_wrong_headers() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cal.csv");
    std::fs::write(&path, "counts,g\n1,0\n2,1\n").expect("write");
    let err = load_calibration_csv(&path).expect_err("headers");
    assert!(format!("{err}").contains("headers 'raw,grams'"));
}

#[rstest]
fn reports_bad_row_number() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cal.csv");
    std::fs::write(&path, "raw,grams\n1,0\nabc,1\n").expect("write");
    let err = load_calibration_csv(&path).expect_err("row");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}
