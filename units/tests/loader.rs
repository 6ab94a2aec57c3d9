/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::path::PathBuf;

use units::engine::{Engine, EngineOptions};
use units::loader::default_database;

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

#[test]
fn stock_database_loads_cleanly() {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine.load_file(&default_database()).unwrap();
    assert_eq!(summary.errors, Vec::<String>::new());
    assert!(summary.units > 100);
    assert!(summary.prefixes > 30);
    assert!(summary.functions > 5);
}

#[test]
fn stock_database_checks_out() {
    let mut engine = Engine::new(EngineOptions {
        utf8: true,
        ..Default::default()
    });
    engine.load_file(&default_database()).unwrap();
    assert_eq!(engine.check_definitions(), Vec::<String>::new());
}

#[test]
fn conditional_blocks() {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine.load_file(&data("vars.units")).unwrap();
    assert_eq!(summary.errors, Vec::<String>::new());
    assert!(engine.symbols.unit("apple").is_some());
    assert!(engine.symbols.unit("brick").is_none());
    assert!(engine.symbols.unit("cherry").is_some());
    assert_eq!(summary.messages, vec!["vars loaded".to_string()]);
    assert_eq!(engine.prompt_prefix.as_deref(), Some("test>"));
    /* dog is defined twice, the second time silently */
    assert_eq!(summary.units, 3);
    let dog = engine.evaluate("dog").unwrap();
    assert_eq!(dog.factor, 8.0);
}

#[test]
fn include_resolution() {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine.load_file(&data("include_main.units")).unwrap();
    assert_eq!(summary.errors, Vec::<String>::new());
    assert_eq!(summary.units, 4);
    let delta = engine.evaluate("delta").unwrap();
    assert_eq!(delta.factor, 12.0);
    assert_eq!(delta.units().collect::<Vec<_>>(), vec![("alpha", 1)]);
}

#[test]
fn include_depth_is_bounded() {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine.load_file(&data("include_loop.units")).unwrap();
    assert!(summary
        .errors
        .iter()
        .any(|err| err.contains("max include depth")));
    assert!(engine.symbols.unit("zeta").is_some());
}

#[test]
fn record_errors_accumulate() {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine.load_file(&data("errors.units")).unwrap();
    assert_eq!(summary.units, 1);
    assert!(engine.symbols.unit("okunit").is_some());
    for needle in [
        "invalid character",
        "starts with a digit",
        "built-in function",
        "lacks a definition",
        "digit other than 0 or 1",
        "starts or ends with '_'",
        "points don't increase",
        "unmatched !endvar",
    ] {
        assert!(
            summary.errors.iter().any(|err| err.contains(needle)),
            "no error containing '{}' in {:?}",
            needle,
            summary.errors
        );
    }
}

#[test]
fn missing_file_is_fatal() {
    let mut engine = Engine::new(EngineOptions::default());
    assert!(engine.load_file(&data("no-such-file.units")).is_err());
}

#[test]
fn continuation_bom_and_unicode_minus() {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine.load_file(&data("texture.units")).unwrap();
    assert_eq!(summary.errors, Vec::<String>::new());
    assert_eq!(engine.evaluate("longdef").unwrap().factor, 6.0);
    assert_eq!(engine.evaluate("negdef").unwrap().factor, -3.0);
}

#[test]
fn utf8_and_locale_sections() {
    let mut engine = Engine::new(EngineOptions {
        utf8: true,
        locale: "en_GB".to_string(),
        ..Default::default()
    });
    engine.load_file(&default_database()).unwrap();
    let ohm = engine.evaluate("3 Ω").unwrap();
    assert_eq!(ohm, engine.evaluate("3 V/A").unwrap());
    let micro = engine.evaluate("5 µm").unwrap();
    assert!((micro.factor / 5e-6 - 1.0).abs() < 1e-12);
    let gallon = engine.evaluate("gallon").unwrap();
    assert!((gallon.factor / 4.54609e-3 - 1.0).abs() < 1e-12);

    let mut engine = Engine::new(EngineOptions::default());
    engine.load_file(&default_database()).unwrap();
    assert!(engine.evaluate("Ω").is_err());
    let gallon = engine.evaluate("gallon").unwrap();
    assert!((gallon.factor / 3.785411784e-3 - 1.0).abs() < 1e-12);
}

#[test]
fn aliases_are_loaded() {
    let mut engine = Engine::new(EngineOptions::default());
    engine.load_file(&default_database()).unwrap();
    for name in ["hms", "time", "dms", "ftin", "usvol"] {
        assert!(
            engine.symbols.alias(name).is_some(),
            "alias {} missing",
            name
        );
    }
}
