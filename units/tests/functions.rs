/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use units::convert::{Answer, ConvertOpts};
use units::engine::{Engine, EngineOptions};
use units::error::UnitsError;
use units::loader::default_database;

fn engine() -> Engine {
    let mut engine = Engine::new(EngineOptions::default());
    engine
        .load_file(&default_database())
        .expect("load stock database");
    engine
}

fn kind(engine: &mut Engine, input: &str) -> UnitsError {
    match engine.evaluate(input) {
        Err(err) => err.kind,
        Ok(quantity) => panic!("{} evaluated to {}", input, quantity),
    }
}

#[test]
fn temperature_roundtrip() {
    let mut engine = engine();
    let back = engine.evaluate("~tempF(tempF(75))").unwrap();
    assert!(back.is_number());
    assert!((back.factor / 75.0 - 1.0).abs() < 1e-12);
    let boiling = engine.evaluate("tempC(100)").unwrap();
    assert!((boiling.factor / 373.15 - 1.0).abs() < 1e-12);
}

#[test]
fn function_arguments_are_dimension_checked() {
    let mut engine = engine();
    assert_eq!(kind(&mut engine, "tempC(5 m)"), UnitsError::BadFuncArg);
}

#[test]
fn domains_are_enforced() {
    let mut engine = engine();
    assert_eq!(kind(&mut engine, "tempK(-5)"), UnitsError::NotInDomain);
    assert_eq!(
        kind(&mut engine, "tempC(-300)"),
        UnitsError::NotInDomain
    );
    /* the range bounds the inverse */
    assert_eq!(
        kind(&mut engine, "~tempC(-5 K)"),
        UnitsError::NotInDomain
    );
}

#[test]
fn missing_inverse() {
    let mut engine = engine();
    assert_eq!(kind(&mut engine, "~square(4)"), UnitsError::NoInverse);
}

#[test]
fn unknown_inverse_function() {
    let mut engine = engine();
    assert_eq!(
        kind(&mut engine, "~nosuchfn(4)"),
        UnitsError::NotAFunction("nosuchfn".to_string())
    );
}

#[test]
fn table_interpolation() {
    let mut engine = engine();
    let opts = ConvertOpts::default();
    let exact = engine.convert("zincgauge(10)", "in", &opts).unwrap();
    match exact {
        Answer::Conversion { factor, .. } => {
            assert!((factor / 0.02 - 1.0).abs() < 1e-12)
        }
        other => panic!("unexpected answer {:?}", other),
    }
    let between = engine.convert("zincgauge(12.5)", "in", &opts).unwrap();
    match between {
        Answer::Conversion { factor, .. } => {
            assert!((factor / 0.03 - 1.0).abs() < 1e-12)
        }
        other => panic!("unexpected answer {:?}", other),
    }
}

#[test]
fn table_inverse_interpolation() {
    let mut engine = engine();
    let location = engine.evaluate("~zincgauge(0.03 in)").unwrap();
    assert!(location.is_number());
    assert!((location.factor / 12.5 - 1.0).abs() < 1e-12);
}

#[test]
fn table_domain_and_argument_errors() {
    let mut engine = engine();
    assert_eq!(kind(&mut engine, "zincgauge(0.5)"), UnitsError::NotInDomain);
    assert_eq!(
        kind(&mut engine, "zincgauge(2 m)"),
        UnitsError::BadFuncArg
    );
    assert_eq!(
        kind(&mut engine, "~zincgauge(2 kg)"),
        UnitsError::BadFuncArg
    );
}

#[test]
fn function_copies_behave_like_the_original() {
    let mut engine = engine();
    assert_eq!(
        engine.evaluate("dB(3)").unwrap(),
        engine.evaluate("decibel(3)").unwrap()
    );
    let milliwatt = engine.evaluate("dBm(0)").unwrap();
    assert!((milliwatt.factor / 1e-3 - 1.0).abs() < 1e-12);
}

#[test]
fn function_as_conversion_target() {
    let mut engine = engine();
    let answer = engine
        .convert("1 W", "dBW", &ConvertOpts::default())
        .unwrap();
    match answer {
        Answer::Function { result } => {
            assert!(result.is_number());
            assert!(result.factor.abs() < 1e-12);
        }
        other => panic!("unexpected answer {:?}", other),
    }
}

#[test]
fn geometry_functions() {
    let mut engine = engine();
    let area = engine.evaluate("circlearea(2 m)").unwrap();
    assert_eq!(area.units().collect::<Vec<_>>(), vec![("m", 2)]);
    assert!((area.factor / (4.0 * std::f64::consts::PI) - 1.0).abs() < 1e-12);
    let radius = engine.evaluate("~circlearea(circlearea(1 m))").unwrap();
    assert!((radius.factor / 1.0 - 1.0).abs() < 1e-12);
}

#[test]
fn parameter_binding_is_restored() {
    let mut engine = engine();
    engine.evaluate("tempF(32)").unwrap();
    match engine.evaluate("x") {
        Err(err) => {
            assert_eq!(err.kind, UnitsError::UnknownUnit("x".to_string()))
        }
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn inverses_invert() {
    let mut engine = engine();
    for (forward, expected) in [
        ("~decibel(decibel(3))", 3.0),
        ("~neper(neper(0.5))", 0.5),
        ("~bel(bel(2))", 2.0),
        ("~spherevolume(spherevolume(2 m)) / m", 2.0),
    ] {
        let back = engine.evaluate(forward).unwrap();
        assert!(
            (back.factor / expected - 1.0).abs() < 1e-12,
            "{} = {}, expected {}",
            forward,
            back.factor,
            expected
        );
    }
}
