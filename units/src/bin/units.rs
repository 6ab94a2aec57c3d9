/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use units::convert::ConvertOpts;
use units::engine::{Engine, EngineOptions};
use units::error::UnitsError;
use units::format::NumFormat;
use units::function::{FuncDef, FuncEntry};
use units::loader::{
    default_database, personal_database, replace_minus, LoadSummary,
};

#[derive(Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
/// Units conversion and calculation.
///
/// Converts a quantity expressed in one measuring system to another,
/// reduces expressions to primitive units, and decomposes values over
/// unit lists. Run without arguments for the interactive calculator.
struct Args {
    /// Load this units file instead of the default database.
    #[clap(long, short)]
    file: Vec<PathBuf>,
    /// Significant digits for output, or 'max'.
    #[clap(long, short)]
    digits: Option<String>,
    /// Number format specification (printf style, e.g. %.15g).
    #[clap(long, short)]
    output_format: Option<String>,
    /// Print only the forward conversion factor.
    #[clap(long, short = '1')]
    one_line: bool,
    /// Terse output, for use from scripts.
    #[clap(long, short)]
    terse: bool,
    /// Spell the conversion out in full.
    #[clap(long, short)]
    verbose: bool,
    /// Disable reciprocal conversions.
    #[clap(long, short = 'S')]
    strict: bool,
    /// Round the last element of unit list output to an integer.
    #[clap(long, short)]
    round: bool,
    /// Suppress prompts and loading output.
    #[clap(long, short)]
    quiet: bool,
    /// Check the units database and exit.
    #[clap(long, short)]
    check: bool,
    /// List units conformable with the input instead of converting.
    #[clap(long)]
    conformable: bool,
    /// Append the conversions of this session to a log file.
    #[clap(long)]
    log: Option<PathBuf>,
    /// Log level: off, error, warn, info, debug or trace.
    #[clap(long, default_value = "warn")]
    log_level: String,
    /// The expression to convert from.
    have: Option<String>,
    /// The units to convert to.
    want: Option<String>,
}

fn main() {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "off" => simplelog::LevelFilter::Off,
        "error" => simplelog::LevelFilter::Error,
        "warn" => simplelog::LevelFilter::Warn,
        "info" => simplelog::LevelFilter::Info,
        "debug" => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    if let Err(e) = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Error: failed to initialize logging: {}", e);
        process::exit(1);
    }

    let mut engine = Engine::new(EngineOptions {
        quiet: args.quiet,
        ..EngineOptions::from_env()
    });

    if let Some(digits) = &args.digits {
        engine.format = match digits.as_str() {
            "max" => NumFormat::from_digits(15, 'g'),
            text => match text.parse::<usize>() {
                Ok(n) if n > 0 => NumFormat::from_digits(n, 'g'),
                _ => {
                    eprintln!(
                        "invalid significant digits ({})--integer value \
                         or 'max' required",
                        text
                    );
                    process::exit(1);
                }
            },
        };
    }
    if let Some(spec) = &args.output_format {
        engine.format = match NumFormat::parse(spec) {
            Ok(format) => format,
            Err(err) => {
                eprintln!("{}", err);
                process::exit(1);
            }
        };
    }

    let mut files = args.file.clone();
    if files.is_empty() {
        files.push(default_database());
        if let Some(personal) = personal_database() {
            files.push(personal);
        }
    }
    let mut summary = LoadSummary::default();
    for path in &files {
        match engine.load_file(path) {
            Ok(loaded) => {
                summary.units += loaded.units;
                summary.prefixes += loaded.prefixes;
                summary.functions += loaded.functions;
                summary.messages.extend(loaded.messages);
                summary.errors.extend(loaded.errors);
            }
            Err(err) => {
                eprintln!("{}", err);
                process::exit(1);
            }
        }
    }
    if !args.quiet {
        for message in &summary.messages {
            println!("{}", message);
        }
    }

    if args.check {
        let problems = engine.check_definitions();
        for problem in &problems {
            println!("{}", problem);
        }
        match problems.is_empty() && summary.errors.is_empty() {
            true => process::exit(0),
            false => process::exit(1),
        }
    }

    let verbosity = match (args.terse, args.verbose) {
        (true, _) => 0,
        (false, true) => 2,
        (false, false) => 1,
    };
    let opts = ConvertOpts {
        strict: args.strict,
        one_line: args.one_line || args.terse,
        round: args.round,
    };

    match &args.have {
        Some(have) => {
            let code = run_once(
                &mut engine,
                have,
                args.want.as_deref(),
                &opts,
                verbosity,
                args.conformable,
            );
            process::exit(code);
        }
        None => interactive(&mut engine, &opts, verbosity, &args, &summary),
    }
}

fn run_once(
    engine: &mut Engine,
    have: &str,
    want: Option<&str>,
    opts: &ConvertOpts,
    verbosity: u8,
    conformable: bool,
) -> i32 {
    let have = replace_minus(have.trim());
    let want = want.map(|w| replace_minus(w.trim()));
    if conformable || want.as_deref() == Some("?") {
        return match engine.search_conformable(&have) {
            Ok(answer) => {
                println!("{}", engine.render(&answer, &have, "?", verbosity));
                0
            }
            Err(err) => {
                eprintln!("{}", err);
                1
            }
        };
    }
    if want.is_none() {
        if let Some(func) = engine.symbols.function(&have) {
            println!("{}", show_function(func, false));
            return 0;
        }
        if let Some(func) = engine.symbols.inverse_function(&have) {
            println!("{}", show_function(func, true));
            return 0;
        }
        if let Some(alias) = engine.symbols.alias(&have) {
            println!("\tDefinition: unit list, {}", alias.definition);
            return 0;
        }
    }
    let want = want.unwrap_or_default();
    match engine.convert(&have, &want, opts) {
        Ok(answer) => {
            println!("{}", engine.render(&answer, &have, &want, verbosity));
            0
        }
        Err(err) => {
            print_conversion_error(&err);
            1
        }
    }
}

fn print_conversion_error(err: &UnitsError) {
    match err {
        UnitsError::NotConformable { have, want } => {
            println!("conformability error\n\t{}\n\t{}", have, want);
        }
        err => println!("{}", err),
    }
}

fn interactive(
    engine: &mut Engine,
    opts: &ConvertOpts,
    verbosity: u8,
    args: &Args,
    summary: &LoadSummary,
) {
    if !args.quiet {
        println!(
            "{} units, {} prefixes, {} nonlinear units\n",
            summary.units, summary.prefixes, summary.functions
        );
    }
    let mut logfile = args.log.as_ref().and_then(|path| {
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let prefix = engine.prompt_prefix.clone().unwrap_or_default();
    let have_prompt = match args.quiet {
        true => String::new(),
        false => format!("{}You have: ", prefix),
    };
    let want_prompt = match args.quiet {
        true => String::new(),
        false => format!("{}You want: ", prefix),
    };

    'outer: loop {
        let have = loop {
            let line = match prompt(&have_prompt, &mut lines) {
                Some(line) => line,
                None => break 'outer,
            };
            if line.is_empty() {
                continue;
            }
            if line == "quit" || line == "exit" {
                break 'outer;
            }
            if line == "help" {
                print_help();
                continue;
            }
            if let Some(topic) = line.strip_prefix("help ") {
                print_topic_help(engine, topic.trim());
                continue;
            }
            if line == "search" {
                println!(
                    "\nType 'search text' to see a list of all unit names \
                     containing 'text' as a substring\n"
                );
                continue;
            }
            if let Some(text) = line.strip_prefix("search ") {
                let answer = engine.search_text(text.trim());
                println!("{}", engine.render(&answer, &line, "", verbosity));
                continue;
            }
            if let Some(func) = engine.symbols.function(&line) {
                println!("{}", show_function(func, false));
                continue;
            }
            if let Some(func) = engine.symbols.inverse_function(&line) {
                println!("{}", show_function(func, true));
                continue;
            }
            if let Some(alias) = engine.symbols.alias(&line) {
                println!("\tDefinition: unit list, {}", alias.definition);
                continue;
            }
            match engine.evaluate(&line) {
                Ok(_) => break line,
                Err(err) => {
                    show_pointer(&have_prompt, &line, err.offset);
                    println!("{}", err.kind);
                }
            }
        };
        let want = match prompt(&want_prompt, &mut lines) {
            Some(line) => line,
            None => break,
        };
        if want == "?" {
            match engine.search_conformable(&have) {
                Ok(answer) => println!(
                    "{}",
                    engine.render(&answer, &have, "?", verbosity)
                ),
                Err(err) => print_conversion_error(&err),
            }
            continue;
        }
        let rendered = match engine.convert(&have, &want, opts) {
            Ok(answer) => engine.render(&answer, &have, &want, verbosity),
            Err(err) => {
                print_conversion_error(&err);
                continue;
            }
        };
        println!("{}", rendered);
        if let Some(logfile) = &mut logfile {
            let _ = writeln!(logfile, "From: {}", have);
            let _ = writeln!(logfile, "To:   {}", want);
            let _ = writeln!(logfile, "{}", rendered);
        }
    }
}

fn prompt(
    text: &str,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();
    let line = lines.next()?.ok()?;
    let line = replace_minus(&line);
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => &line[..],
    };
    Some(line.trim().to_string())
}

fn show_pointer(prompt: &str, input: &str, offset: usize) {
    let offset = offset.min(input.len());
    let column = prompt.chars().count() + input[..offset].chars().count();
    println!("{}^", " ".repeat(column));
}

fn show_function(func: &FuncEntry, inverse: bool) -> String {
    match &func.def {
        FuncDef::Table { unit, points } => {
            let mut out = "\tinterpolated table with points\n".to_string();
            for (location, value) in points {
                match inverse {
                    false => out.push_str(&format!(
                        "\t\t{}({}) = {} {}\n",
                        func.name, location, value, unit
                    )),
                    true => out.push_str(&format!(
                        "\t\t~{}({} {}) = {}\n",
                        func.name, value, unit, location
                    )),
                }
            }
            out.pop();
            out
        }
        FuncDef::Analytic { forward, inverse: inv } => {
            let branch = match inverse {
                false => Some(forward),
                true => inv.as_ref(),
            };
            match branch {
                None => format!("\t~{} is undefined", func.name),
                Some(branch) => {
                    let mut out = format!(
                        "\tDefinition: {}{}({}) = {}",
                        if inverse { "~" } else { "" },
                        func.name,
                        branch.param,
                        branch.body
                    );
                    if let Some(dim) = &branch.dimension {
                        out.push_str(&format!(
                            "\n\t            {} has units {}",
                            branch.param, dim
                        ));
                    }
                    out
                }
            }
        }
    }
}

fn print_help() {
    println!(
        "\nAt the 'You have:' prompt, type in the units you want to\n\
         convert from or an expression to evaluate. At the 'You want:'\n\
         prompt, enter the units to convert to, or press return to see\n\
         the reduced form or definition, or type '?' to get a list of\n\
         conformable units. A ';'-separated unit list converts to a sum,\n\
         as in 'ft;in'. Type 'search text' to list unit names containing\n\
         'text', 'help unit' to locate a unit's definition, and 'quit'\n\
         to leave.\n"
    );
}

fn print_topic_help(engine: &Engine, topic: &str) {
    if let Some(func) = engine.symbols.function(topic) {
        println!(
            "function '{}' defined at line {} of '{}'",
            topic, func.source.line, func.source.file
        );
    } else if let Some(unit) = engine.symbols.unit(topic) {
        println!(
            "unit '{}' defined at line {} of '{}'",
            topic, unit.source.line, unit.source.file
        );
    } else if let Some(alias) = engine.symbols.alias(topic) {
        println!(
            "unit list '{}' defined at line {} of '{}'",
            topic, alias.source.line, alias.source.file
        );
    } else {
        println!("Unknown unit '{}'", topic);
    }
}
