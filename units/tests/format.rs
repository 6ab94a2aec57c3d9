/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use units::format::{
    getsigdigits, is_fraction, round_digits, scan_double, NumFormat,
};

#[test]
fn default_format_is_eight_significant_digits() {
    let format = NumFormat::default();
    assert_eq!(format.format(200.0), "200");
    assert_eq!(format.format(1.0660684e8), "1.0660684e+08");
    assert_eq!(format.format(23.888888888888886), "23.888889");
    assert_eq!(format.format(0.00001), "1e-05");
    assert_eq!(format.format(-2.5), "-2.5");
}

#[test]
fn fixed_formats() {
    assert_eq!(NumFormat::parse("%.3f").unwrap().format(2.5), "2.500");
    assert_eq!(NumFormat::parse("%.0f").unwrap().format(2.5), "2");
    assert_eq!(NumFormat::parse("%#.0f").unwrap().format(2.0), "2.");
    assert_eq!(NumFormat::parse("%f").unwrap().format(0.5), "0.500000");
    assert_eq!(
        NumFormat::parse("%08.2f").unwrap().format(3.14159),
        "00003.14"
    );
    assert_eq!(
        NumFormat::parse("%-8.2f").unwrap().format(3.14159),
        "3.14    "
    );
    assert_eq!(NumFormat::parse("%+.2f").unwrap().format(3.14159), "+3.14");
    assert_eq!(
        NumFormat::parse("%'.0f").unwrap().format(1234567.0),
        "1,234,567"
    );
}

#[test]
fn exponential_formats() {
    assert_eq!(
        NumFormat::parse("%.2e").unwrap().format(12345.0),
        "1.23e+04"
    );
    assert_eq!(NumFormat::parse("%e").unwrap().format(0.5), "5.000000e-01");
    assert_eq!(NumFormat::parse("%.0E").unwrap().format(12345.0), "1E+04");
    assert_eq!(
        NumFormat::parse("%.1e").unwrap().format(1e100),
        "1.0e+100"
    );
}

#[test]
fn general_formats() {
    let g3 = NumFormat::parse("%.3g").unwrap();
    assert_eq!(g3.format(0.0001234), "0.000123");
    assert_eq!(g3.format(0.00001234), "1.23e-05");
    assert_eq!(g3.format(100000.0), "1e+05");
    assert_eq!(g3.format(99.96), "100");
    assert_eq!(NumFormat::parse("%#.3g").unwrap().format(1.0), "1.00");
    assert_eq!(NumFormat::parse("%.3G").unwrap().format(1e10), "1E+10");
}

#[test]
fn hexadecimal_formats() {
    let a = NumFormat::parse("%a").unwrap();
    assert_eq!(a.format(2.0), "0x1p+1");
    assert_eq!(a.format(0.0), "0x0p+0");
    assert_eq!(a.format(1.5), "0x1.8p+0");
    assert_eq!(a.format(-0.375), "-0x1.8p-2");
    assert_eq!(NumFormat::parse("%.1a").unwrap().format(1.5), "0x1.8p+0");
    assert_eq!(NumFormat::parse("%.0a").unwrap().format(3.0), "0x2p+1");
    assert_eq!(NumFormat::parse("%A").unwrap().format(2.5), "0X1.4P+1");
}

#[test]
fn invalid_specifications_are_rejected() {
    for spec in ["%.2q", "x%f", "%%f", "%.2.3f", "%hf", "%llg", "%.2"] {
        assert!(
            NumFormat::parse(spec).is_err(),
            "{} unexpectedly accepted",
            spec
        );
    }
}

#[test]
fn infinities_and_nans() {
    let format = NumFormat::default();
    assert_eq!(format.format(f64::INFINITY), "inf");
    assert_eq!(format.format(f64::NEG_INFINITY), "-inf");
    assert_eq!(format.format(f64::NAN), "nan");
    assert_eq!(
        NumFormat::parse("%.2E").unwrap().format(f64::INFINITY),
        "INF"
    );
}

#[test]
fn displays_as_predicate() {
    let format = NumFormat::default();
    assert!(format.displays_as(1.0, 0.999999999999));
    assert!(format.displays_as(1.0, 1.0));
    assert!(!format.displays_as(1.0, 0.99));
    assert!(!format.displays_as(1.0, f64::NAN));
    let (matches, nondigits) = format.displays_with(75.0, 75.0);
    assert!(matches);
    assert!(!nondigits);
    let (_, nondigits) = format.displays_with(0.5, 0.5);
    assert!(nondigits);
}

#[test]
fn round_to_displayed() {
    let format = NumFormat::default();
    let rounded = format.round_to_displayed(1.0 / 3.0);
    assert_eq!(rounded, 0.33333333);
}

#[test]
fn significant_digit_helpers() {
    assert_eq!(getsigdigits(0.0, 1.0, 10), 15);
    assert_eq!(getsigdigits(1.0, 0.0, 10), 0);
    assert_eq!(getsigdigits(1000.0, 1.0, 10), 12);
    assert_eq!(round_digits(1.67643, 3, 10), 1.68);
    assert_eq!(round_digits(0.0, 5, 10), 0.0);
    assert_eq!(round_digits(5.0, 0, 10), 0.0);
}

#[test]
fn scanning_doubles() {
    assert_eq!(scan_double("3.14xyz"), Some((3.14, 4)));
    assert_eq!(scan_double("1e"), Some((1.0, 1)));
    assert_eq!(scan_double("1e3"), Some((1000.0, 3)));
    assert_eq!(scan_double(".5"), Some((0.5, 2)));
    assert_eq!(scan_double("  42 "), Some((42.0, 4)));
    assert_eq!(scan_double("1,234"), Some((1.0, 1)));
    assert_eq!(scan_double("-2.5e-2 m"), Some((-0.025, 7)));
    assert_eq!(scan_double("abc"), None);
    assert_eq!(scan_double(""), None);
    match scan_double("inf") {
        Some((value, 3)) => assert!(value.is_infinite()),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn fraction_detection() {
    assert!(is_fraction("1|8"));
    assert!(is_fraction("1|60 min"));
    assert!(!is_fraction("1|8.5"));
    assert!(!is_fraction("18"));
    assert!(!is_fraction("x|8"));
}

#[test]
fn digits_shorthand() {
    let format = NumFormat::from_digits(3, 'g');
    assert_eq!(format.format(1234.5), "1.23e+03");
    let format = NumFormat::from_digits(15, 'g');
    assert_eq!(format.format(0.1), "0.1");
}
