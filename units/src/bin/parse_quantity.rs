/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::path::PathBuf;
use std::process;

use clap::Parser;

use units::engine::{Engine, EngineOptions};
use units::loader::default_database;

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
/// Quantity parser.
///
/// Parses quantity expressions, reduces them to primitive units and
/// outputs a JSON representation.
struct Args {
    /// Load this units file instead of the default database.
    #[clap(long, short)]
    file: Option<PathBuf>,
    #[clap(long, short)]
    /// Output the reduced display form instead of JSON.
    plain: bool,
    /// The quantities to parse.
    quantity: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let mut engine = Engine::new(EngineOptions::from_env());
    let database = args.file.clone().unwrap_or_else(default_database);
    if let Err(err) = engine.load_file(&database) {
        eprintln!("{}", err);
        process::exit(1);
    }

    for input in &args.quantity {
        match engine.evaluate(input) {
            Ok(quantity) => match args.plain {
                true => println!("{}", engine.show_quantity(&quantity)),
                false => println!(
                    "{}",
                    serde_json::to_string(&quantity)
                        .expect("serialization failed!?")
                ),
            },
            Err(err) => {
                eprintln!("{}: {}", input, err);
                process::exit(1);
            }
        }
    }
}
