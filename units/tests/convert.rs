/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use units::convert::{Answer, ConvertOpts};
use units::engine::{Engine, EngineOptions};
use units::error::UnitsError;
use units::loader::default_database;

fn engine() -> Engine {
    let mut engine = Engine::new(EngineOptions::default());
    let summary = engine
        .load_file(&default_database())
        .expect("load stock database");
    assert_eq!(summary.errors, Vec::<String>::new());
    engine
}

fn factor(answer: &Answer) -> f64 {
    match answer {
        Answer::Conversion { factor, .. } => *factor,
        other => panic!("expected a conversion, got {:?}", other),
    }
}

fn close(a: f64, b: f64) {
    assert!((a / b - 1.0).abs() < 1e-9, "{} differs from {}", a, b);
}

#[test]
fn meters_to_centimeters() {
    let mut engine = engine();
    let answer = engine
        .convert("2 m", "cm", &ConvertOpts::default())
        .unwrap();
    assert_eq!(factor(&answer), 200.0);
    match answer {
        Answer::Conversion {
            inverse,
            reciprocal,
            ..
        } => {
            assert!(!reciprocal);
            close(inverse.unwrap(), 0.005);
        }
        _ => unreachable!(),
    }
}

#[test]
fn fahrenheit_to_celsius() {
    let mut engine = engine();
    let answer = engine
        .convert("tempF(75)", "tempC", &ConvertOpts::default())
        .unwrap();
    match answer {
        Answer::Function { result } => {
            assert!(result.is_number());
            close(result.factor, 23.88888888888889);
        }
        other => panic!("expected a function answer, got {:?}", other),
    }
}

#[test]
fn feet_and_inches() {
    let mut engine = engine();
    let answer = engine
        .convert("5.5 ft", "ft;in", &ConvertOpts::default())
        .unwrap();
    match &answer {
        Answer::Decomposition {
            terms, negative, ..
        } => {
            assert!(!negative);
            assert_eq!(terms.len(), 2);
            assert_eq!(terms[0], (5.0, "ft".to_string()));
            assert_eq!(terms[1].1, "in");
            close(terms[1].0, 6.0);
        }
        other => panic!("expected a decomposition, got {:?}", other),
    }
    assert_eq!(
        engine.render(&answer, "5.5 ft", "ft;in", 1),
        "\t5 ft + 6 in"
    );
}

#[test]
fn tablespoons_of_sugar() {
    let mut engine = engine();
    let answer = engine
        .convert("6 tbsp sugar", "g", &ConvertOpts::default())
        .unwrap();
    close(factor(&answer), 75.0);
}

#[test]
fn energy_to_compound_units() {
    let mut engine = engine();
    let answer = engine
        .convert(
            "2 btu + 450 ft lbf",
            "(kg^2/s)/(day lb/m^2)",
            &ConvertOpts::default(),
        )
        .unwrap();
    match answer {
        Answer::Conversion {
            factor, reciprocal, ..
        } => {
            assert!(!reciprocal);
            assert!((factor / 1.0660684e8 - 1.0).abs() < 1e-6);
        }
        _ => unreachable!(),
    }
}

#[test]
fn reciprocal_conversion() {
    let mut engine = engine();
    let answer = engine
        .convert("3 s", "Hz", &ConvertOpts::default())
        .unwrap();
    match answer {
        Answer::Conversion {
            factor, reciprocal, ..
        } => {
            assert!(reciprocal);
            close(factor, 1.0 / 3.0);
        }
        _ => unreachable!(),
    }
}

#[test]
fn strict_mode_disables_reciprocals() {
    let mut engine = engine();
    let opts = ConvertOpts {
        strict: true,
        ..Default::default()
    };
    match engine.convert("3 s", "Hz", &opts) {
        Err(UnitsError::NotConformable { .. }) => {}
        other => panic!("expected a conformability error, got {:?}", other),
    }
}

#[test]
fn fraction_of_a_minute() {
    let mut engine = engine();
    let answer = engine
        .convert("1|60 min", "s", &ConvertOpts::default())
        .unwrap();
    close(factor(&answer), 1.0);
    assert_eq!(
        engine.format.show_with_unit(1.0, "1|60 min", true, false),
        "1|60 min"
    );
}

#[test]
fn identity_conversion_for_every_unit() {
    let mut engine = engine();
    let names: Vec<String> = engine
        .symbols
        .units()
        .map(|(name, _)| name.to_string())
        .collect();
    for name in names {
        let answer = engine
            .convert(&name, &name, &ConvertOpts::default())
            .unwrap_or_else(|err| panic!("{} -> {}: {}", name, name, err));
        assert_eq!(factor(&answer), 1.0, "{} -> {} is not 1", name, name);
    }
}

#[test]
fn empty_want_shows_definition() {
    let mut engine = engine();
    let answer = engine
        .convert("hour", "", &ConvertOpts::default())
        .unwrap();
    match answer {
        Answer::Definition { chain, reduced } => {
            assert_eq!(chain.first().map(String::as_str), Some("60 min"));
            close(reduced.factor, 3600.0);
            assert_eq!(
                reduced.units().collect::<Vec<_>>(),
                vec![("s", 1)]
            );
        }
        other => panic!("expected a definition, got {:?}", other),
    }
}

#[test]
fn unit_list_alias_target() {
    let mut engine = engine();
    let answer = engine
        .convert("1.55 hr", "hms", &ConvertOpts::default())
        .unwrap();
    match answer {
        Answer::Decomposition { terms, .. } => {
            assert_eq!(terms[0], (1.0, "hr".to_string()));
            assert_eq!(terms[1], (33.0, "min".to_string()));
        }
        other => panic!("expected a decomposition, got {:?}", other),
    }
}

#[test]
fn conformable_search() {
    let mut engine = engine();
    let answer = engine.search_conformable("m^2").unwrap();
    match answer {
        Answer::Matches { matches } => {
            let names: Vec<&str> =
                matches.iter().map(|(name, _)| name.as_str()).collect();
            assert!(names.contains(&"acre"));
            assert!(names.contains(&"hectare"));
            assert!(names.contains(&"barn"));
            assert!(names.contains(&"circlearea"));
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(names, sorted);
        }
        other => panic!("expected matches, got {:?}", other),
    }
}

#[test]
fn text_search() {
    let engine = engine();
    match engine.search_text("meter") {
        Answer::Matches { matches } => {
            assert!(matches.iter().any(|(name, _)| name == "meter"));
            assert!(matches.iter().all(|(name, _)| name.contains("meter")));
        }
        other => panic!("expected matches, got {:?}", other),
    }
}

#[test]
fn last_result_placeholder() {
    let mut engine = engine();
    engine.evaluate("2 m").unwrap();
    let quantity = engine.evaluate("_ + 1 m").unwrap();
    close(quantity.factor, 3.0);
}

#[test]
fn last_result_unset() {
    let mut engine = engine();
    match engine.evaluate("_") {
        Err(err) => assert_eq!(err.kind, UnitsError::LastUnset),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn unknown_unit_reported_with_name() {
    let mut engine = engine();
    match engine.convert("2 zorkmids", "m", &ConvertOpts::default()) {
        Err(UnitsError::UnknownUnit(name)) => {
            assert_eq!(name, "zorkmids")
        }
        other => panic!("expected an unknown unit error, got {:?}", other),
    }
}

#[test]
fn terse_rendering() {
    let mut engine = engine();
    let opts = ConvertOpts {
        one_line: true,
        ..Default::default()
    };
    let answer = engine.convert("2 m", "cm", &opts).unwrap();
    assert_eq!(engine.render(&answer, "2 m", "cm", 0), "200");
    assert_eq!(engine.render(&answer, "2 m", "cm", 1), "\t* 200");
}
