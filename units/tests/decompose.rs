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

fn decompose(
    engine: &mut Engine,
    have: &str,
    want: &str,
    opts: &ConvertOpts,
) -> (Vec<(f64, String)>, bool, f64) {
    match engine.convert(have, want, opts) {
        Ok(Answer::Decomposition {
            terms,
            negative,
            round_dir,
            ..
        }) => (terms, negative, round_dir),
        other => panic!("expected a decomposition, got {:?}", other),
    }
}

#[test]
fn integer_values_for_leading_units() {
    let mut engine = engine();
    let (terms, negative, _) = decompose(
        &mut engine,
        "17.5 ft",
        "ft;in",
        &ConvertOpts::default(),
    );
    assert!(!negative);
    assert_eq!(terms[0], (17.0, "ft".to_string()));
    assert!((terms[1].0 / 6.0 - 1.0).abs() < 1e-9);
}

#[test]
fn display_rounding_carries_into_the_previous_unit() {
    let mut engine = engine();
    /* Without the carry this would print as `5 ft + 12 in`. */
    let (terms, _, _) = decompose(
        &mut engine,
        "5 ft + 11.99999999999999 in",
        "ft;in",
        &ConvertOpts::default(),
    );
    assert_eq!(terms, vec![(6.0, "ft".to_string())]);
}

#[test]
fn recomposition_matches_at_display_precision() {
    let mut engine = engine();
    let have = engine.evaluate("17.5 ft").unwrap();
    let (terms, _, _) = decompose(
        &mut engine,
        "17.5 ft",
        "ft;in",
        &ConvertOpts::default(),
    );
    let mut recomposed = 0.0;
    for (value, unit) in &terms {
        recomposed += value * engine.evaluate(unit).unwrap().factor;
    }
    assert!(engine.format.displays_as(
        engine.format.round_to_displayed(have.factor),
        recomposed
    ));
}

#[test]
fn trailing_separator_repeats_the_last_unit() {
    let mut engine = engine();
    let (terms, _, _) = decompose(
        &mut engine,
        "3.371241 oz",
        "oz;",
        &ConvertOpts::default(),
    );
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0], (3.0, "oz".to_string()));
    assert_eq!(terms[1].1, "oz");
    assert!((terms[1].0 / 0.371241 - 1.0).abs() < 1e-9);
}

#[test]
fn rounding_to_the_last_unit() {
    let mut engine = engine();
    let opts = ConvertOpts {
        round: true,
        ..Default::default()
    };
    let (terms, _, round_dir) =
        decompose(&mut engine, "5.7 ft", "ft;", &opts);
    assert_eq!(terms, vec![(6.0, "ft".to_string())]);
    assert!(round_dir > 0.0);
    let (terms, _, round_dir) =
        decompose(&mut engine, "5.2 ft", "ft;", &opts);
    assert_eq!(terms, vec![(5.0, "ft".to_string())]);
    assert!(round_dir < 0.0);
}

#[test]
fn negative_quantities_keep_their_sign() {
    let mut engine = engine();
    let (terms, negative, _) = decompose(
        &mut engine,
        "-5.5 ft",
        "ft;in",
        &ConvertOpts::default(),
    );
    assert!(negative);
    assert_eq!(terms[0], (5.0, "ft".to_string()));
    let answer = engine
        .convert("-5.5 ft", "ft;in", &ConvertOpts::default())
        .unwrap();
    assert_eq!(
        engine.render(&answer, "-5.5 ft", "ft;in", 1),
        "\t-5 ft - 6 in"
    );
}

#[test]
fn zero_prints_the_last_unit() {
    let mut engine = engine();
    let answer = engine
        .convert("0 ft", "ft;in", &ConvertOpts::default())
        .unwrap();
    assert_eq!(engine.render(&answer, "0 ft", "ft;in", 1), "\t0 in");
}

#[test]
fn nonconformable_targets_are_rejected() {
    let mut engine = engine();
    match engine.convert("5 ft", "lb;oz", &ConvertOpts::default()) {
        Err(UnitsError::NotConformable { .. }) => {}
        other => panic!("expected a conformability error, got {:?}", other),
    }
}

#[test]
fn blank_list_entries_are_rejected() {
    let mut engine = engine();
    match engine.convert("5 ft", "ft;;in", &ConvertOpts::default()) {
        Err(UnitsError::Parse) => {}
        other => panic!("expected a parse error, got {:?}", other),
    }
}
