/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::engine::EngineOptions;
use super::error::UnitsError;
use super::format::scan_double;
use super::function::{FuncBranch, FuncDef, FuncEntry};
use super::symbols::{Source, SymbolTable};

/// Maximum depth of `!include` files.
pub const MAX_INCLUDE_DEPTH: usize = 5;

const NOERROR_KEYWORD: &str = "noerror ";

/// Result of loading a definitions file. Record-level errors accumulate
/// here; only an unreadable top-level file aborts the load.
#[derive(Serialize, Clone, Debug, Default)]
pub struct LoadSummary {
    pub units: usize,
    pub prefixes: usize,
    pub functions: usize,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub prompt: Option<String>,
}

/// Replace the Unicode minus variants (figure dash, en dash, minus) with
/// the ASCII hyphen-minus.
pub fn replace_minus(input: &str) -> String {
    input
        .replace('\u{2012}', "-")
        .replace('\u{2013}', "-")
        .replace('\u{2212}', "-")
}

/// Replace control characters with spaces.
pub fn replace_ctrl_chars(input: &str) -> String {
    input
        .chars()
        .map(|c| match c.is_control() {
            true => ' ',
            false => c,
        })
        .collect()
}

/// The default database: the UNITSFILE environment variable if set, the
/// bundled definitions otherwise.
pub fn default_database() -> PathBuf {
    match std::env::var_os("UNITSFILE") {
        Some(path) => PathBuf::from(path),
        None => Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("data/definitions.units"),
    }
}

/// The personal units file (MYUNITSFILE or ~/.units), if it exists.
pub fn personal_database() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("MYUNITSFILE") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")?;
    let path = PathBuf::from(home).join(".units");
    path.exists().then_some(path)
}

/// Load a definitions file, honouring conditional blocks and includes.
pub fn load_file(
    symbols: &mut SymbolTable,
    path: &Path,
    options: &EngineOptions,
) -> Result<LoadSummary, UnitsError> {
    let mut summary = LoadSummary::default();
    read_units(symbols, path, options, &mut summary, 0)?;
    Ok(summary)
}

struct Blocks {
    in_var: bool,
    wrong_var: bool,
    in_locale: bool,
    wrong_locale: bool,
    in_utf8: bool,
}

fn read_units(
    symbols: &mut SymbolTable,
    path: &Path,
    options: &EngineOptions,
    summary: &mut LoadSummary,
    depth: usize,
) -> Result<(), UnitsError> {
    let text = fs::read_to_string(path).map_err(|err| {
        UnitsError::File(path.display().to_string(), err.to_string())
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let file = path.display().to_string();
    let raw: Vec<&str> = text.lines().collect();

    let mut blocks = Blocks {
        in_var: false,
        wrong_var: false,
        in_locale: false,
        wrong_locale: false,
        in_utf8: false,
    };

    let mut index = 0;
    while index < raw.len() {
        let line_number = index as u32 + 1;
        let mut line = raw[index].to_string();
        while line.ends_with('\\') && index + 1 < raw.len() {
            line.pop();
            index += 1;
            line.push_str(raw[index]);
        }
        index += 1;
        if let Some(pos) = line.find('#') {
            line.truncate(pos);
        }
        let line = replace_minus(&replace_ctrl_chars(&line));
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let here = Source {
            file: file.clone(),
            line: line_number,
        };

        if let Some(directive) = line.strip_prefix('!') {
            handle_directive(
                symbols, directive, &here, path, options, summary, depth,
                &mut blocks,
            );
            continue;
        }
        if blocks.in_utf8 && !options.utf8 {
            continue;
        }
        if blocks.wrong_locale || blocks.wrong_var {
            continue;
        }

        let (name, definition) = match split_record(line) {
            Some(record) => record,
            None => {
                record_error(
                    summary,
                    format!(
                        "unit '{}' lacks a definition at line {} of '{}'",
                        line, line_number, file
                    ),
                );
                continue;
            }
        };
        define_record(symbols, name, definition, here, summary);
    }
    Ok(())
}

/// Split a record line into the space-delimited name and the rest.
fn split_record(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    match rest.is_empty() {
        true => None,
        false => Some((name, rest)),
    }
}

fn record_error(summary: &mut LoadSummary, message: String) {
    log::warn!("{}", message);
    summary.errors.push(message);
}

#[allow(clippy::too_many_arguments)]
fn handle_directive(
    symbols: &mut SymbolTable,
    directive: &str,
    source: &Source,
    path: &Path,
    options: &EngineOptions,
    summary: &mut LoadSummary,
    depth: usize,
    blocks: &mut Blocks,
) {
    let (command, rest) = match directive.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (directive, ""),
    };
    let context = format!("line {} of '{}'", source.line, source.file);

    /* Conditional block delimiters are processed even inside skipped
     * blocks; everything else respects the block state. */
    match command {
        "var" | "varnot" => {
            let not = command == "varnot";
            let (name, values) = match rest.split_once(char::is_whitespace) {
                Some((name, values)) => (name, values.trim()),
                None => (rest, ""),
            };
            if name.is_empty() {
                record_error(
                    summary,
                    format!("no variable name specified on {}", context),
                );
            } else if values.is_empty() {
                record_error(
                    summary,
                    format!("no value specified on {}", context),
                );
            } else if blocks.in_var {
                record_error(
                    summary,
                    format!("nested var statements not allowed, {}", context),
                );
            } else {
                blocks.in_var = true;
                match std::env::var(name) {
                    Err(_) => {
                        record_error(
                            summary,
                            format!(
                                "environment variable {} not set at {}",
                                name, context
                            ),
                        );
                        blocks.wrong_var = true;
                    }
                    Ok(value) => {
                        let found =
                            values.split_whitespace().any(|v| v == value);
                        if !(not ^ found) {
                            blocks.wrong_var = true;
                        }
                    }
                }
            }
            return;
        }
        "endvar" => {
            if !blocks.in_var {
                record_error(
                    summary,
                    format!("unmatched !endvar on {}", context),
                );
            }
            blocks.in_var = false;
            blocks.wrong_var = false;
            return;
        }
        "locale" => {
            if rest.is_empty() {
                record_error(
                    summary,
                    format!("no locale specified on {}", context),
                );
            } else if blocks.in_locale {
                record_error(
                    summary,
                    format!("nested locales not allowed, {}", context),
                );
            } else {
                blocks.in_locale = true;
                let tag = rest.split_whitespace().next().unwrap_or("");
                if tag != options.locale {
                    blocks.wrong_locale = true;
                }
            }
            return;
        }
        "endlocale" => {
            if !blocks.in_locale {
                record_error(
                    summary,
                    format!("unmatched !endlocale on {}", context),
                );
            }
            blocks.in_locale = false;
            blocks.wrong_locale = false;
            return;
        }
        "utf8" => {
            if blocks.in_utf8 {
                record_error(
                    summary,
                    format!("nested utf8 not allowed, {}", context),
                );
            } else {
                blocks.in_utf8 = true;
            }
            return;
        }
        "endutf8" => {
            if !blocks.in_utf8 {
                record_error(
                    summary,
                    format!("unmatched !endutf8 on {}", context),
                );
            }
            blocks.in_utf8 = false;
            return;
        }
        _ => {}
    }
    if blocks.in_utf8 && !options.utf8 {
        return;
    }
    if blocks.wrong_locale || blocks.wrong_var {
        return;
    }

    match command {
        "prompt" => {
            summary.prompt = match rest.is_empty() {
                true => None,
                false => Some(rest.to_string()),
            };
        }
        "message" => {
            if !options.quiet {
                log::info!("{}", rest);
                summary.messages.push(rest.to_string());
            }
        }
        "set" => {
            let (name, value) = match rest.split_once(char::is_whitespace) {
                Some((name, value)) => (name, value.trim()),
                None => (rest, ""),
            };
            if name.is_empty() {
                record_error(
                    summary,
                    format!("no variable name specified on {}", context),
                );
            } else if value.is_empty() {
                record_error(
                    summary,
                    format!("no value specified on {}", context),
                );
            } else if std::env::var(name).is_err() {
                std::env::set_var(name, value);
            }
        }
        "unitlist" => match split_record(rest) {
            Some((name, definition)) => {
                if !definition.contains(';') {
                    record_error(
                        summary,
                        format!("unit list missing ';' on {}", context),
                    );
                } else if let Err(reason) =
                    symbols.define_alias(name, definition, source.clone())
                {
                    record_error(
                        summary,
                        format!(
                            "unit list '{}' on {} ignored.  {}",
                            name, context, reason
                        ),
                    );
                }
            }
            None => {
                record_error(summary, format!("error on {}", context));
            }
        },
        "include" => {
            if depth >= MAX_INCLUDE_DEPTH {
                record_error(
                    summary,
                    format!(
                        "max include depth of {} exceeded in {}",
                        MAX_INCLUDE_DEPTH, context
                    ),
                );
                return;
            }
            let name = match rest.split_whitespace().next() {
                Some(name) => name,
                None => {
                    record_error(
                        summary,
                        format!("missing include filename on {}", context),
                    );
                    return;
                }
            };
            let target = match Path::new(name).is_absolute() {
                true => PathBuf::from(name),
                false => path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(name),
            };
            log::info!("including units file '{}'", target.display());
            if let Err(err) =
                read_units(symbols, &target, options, summary, depth + 1)
            {
                record_error(
                    summary,
                    format!("{} (file was included at {})", err, context),
                );
            }
        }
        _ => {
            record_error(summary, format!("error on {}", context));
        }
    }
}

fn define_record(
    symbols: &mut SymbolTable,
    name: &str,
    definition: &str,
    source: Source,
    summary: &mut LoadSummary,
) {
    let (name, silent) = match name.strip_prefix('+') {
        Some(name) => (name, true),
        None => (name, false),
    };
    let context = format!("line {} of '{}'", source.line, source.file);

    if let Some(prefix) = name.strip_suffix('-') {
        match symbols.define_prefix(prefix, definition, source, silent) {
            Ok(new) => summary.prefixes += new as usize,
            Err(reason) => record_error(
                summary,
                format!(
                    "prefix '{}-' on {} ignored.  {}",
                    prefix, context, reason
                ),
            ),
        }
    } else if name.contains('[') {
        match parse_table(name, definition, source, &context) {
            Ok(entry) => match symbols.define_function(entry, silent) {
                Ok(new) => summary.functions += new as usize,
                Err(reason) => record_error(
                    summary,
                    format!("unit '{}' on {} ignored.  {}", name, context, reason),
                ),
            },
            Err(message) => record_error(summary, message),
        }
    } else if name.contains('(') {
        match parse_function(symbols, name, definition, source, &context) {
            Ok(entry) => match symbols.define_function(entry, silent) {
                Ok(new) => summary.functions += new as usize,
                Err(reason) => record_error(
                    summary,
                    format!("unit '{}' on {} ignored.  {}", name, context, reason),
                ),
            },
            Err(message) => record_error(summary, message),
        }
    } else {
        match symbols.define_unit(name, definition, source, silent) {
            Ok(new) => summary.units += new as usize,
            Err(reason) => record_error(
                summary,
                format!("unit '{}' on {} ignored.  {}", name, context, reason),
            ),
        }
    }
}

/* Table records: NAME[UNIT] loc value, loc value, ... with strictly
 * increasing locations. */

fn parse_table(
    name_part: &str,
    definition: &str,
    source: Source,
    context: &str,
) -> Result<FuncEntry, String> {
    let (name, rest) = name_part.split_once('[').unwrap();
    let unit = match rest.split_once(']') {
        Some((unit, "")) => unit,
        Some(_) => {
            return Err(format!(
                "unexpected characters after ']' on {}",
                context
            ))
        }
        None => return Err(format!("missing ']' on {}", context)),
    };
    let (noerror, mut rest) = match definition.strip_prefix(NOERROR_KEYWORD) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, definition),
    };
    let mut points: Vec<(f64, f64)> = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let (location, used) = scan_double(rest).ok_or_else(|| {
            format!(
                "cannot parse table definition {} at '{}' on {}",
                name,
                truncate(rest, 15),
                context
            )
        })?;
        if let Some((previous, _)) = points.last() {
            if location <= *previous {
                return Err(format!(
                    "points don't increase ({:.8} to {:.8}) on {}",
                    previous, location, context
                ));
            }
        }
        let after = &rest[used..];
        let (value, used) = scan_double(after).ok_or_else(|| {
            format!("missing value after {:.8} on {}", location, context)
        })?;
        points.push((location, value));
        rest = after[used..]
            .trim_start_matches(|c| c == ' ' || c == '\t' || c == ',');
    }
    if points.is_empty() {
        return Err(format!(
            "table '{}' lacks a definition on {}",
            name, context
        ));
    }
    Ok(FuncEntry {
        name: name.to_string(),
        def: FuncDef::Table {
            unit: unit.to_string(),
            points,
        },
        noerror,
        source,
    })
}

/* Function records: NAME(PARAM) [units=[fd;id]] [domain=[a,b]]
 * [range=[a,b]] [noerror] forward[; inverse]. Empty parens copy an
 * existing function. */

fn parse_function(
    symbols: &SymbolTable,
    name_part: &str,
    definition: &str,
    source: Source,
    context: &str,
) -> Result<FuncEntry, String> {
    if name_part.starts_with('(') {
        return Err(format!(
            "unit '{}' on {} ignored.  It starts with a '('",
            name_part, context
        ));
    }
    let (name, rest) = name_part.split_once('(').unwrap();
    let param = match rest.split_once(')') {
        Some((param, "")) => param.trim(),
        _ => {
            return Err(format!(
                "bad function definition of '{}' on {}",
                name, context
            ))
        }
    };
    if param.is_empty() {
        return copy_function(symbols, name, definition, source, context);
    }

    let mut forward_dim: Option<String> = None;
    let mut inverse_dim: Option<String> = None;
    let mut domain: Option<(Option<f64>, Option<f64>, bool, bool)> = None;
    let mut range: Option<(Option<f64>, Option<f64>, bool, bool)> = None;
    let mut noerror = false;
    let mut rest = definition;

    loop {
        if let Some(after) = rest.strip_prefix(NOERROR_KEYWORD) {
            noerror = true;
            rest = after.trim_start();
        } else if let Some(after) = rest.strip_prefix("units=") {
            if forward_dim.is_some() || inverse_dim.is_some() {
                return Err(repeated("units=", name, context));
            }
            let (first, second, _, _, after) =
                parse_pair(after, ';', false, name, context)?;
            forward_dim = Some(match first.is_empty() {
                true => "1".to_string(),
                false => first,
            });
            inverse_dim = second.map(|dim| match dim.is_empty() {
                true => "1".to_string(),
                false => dim,
            });
            rest = after.trim_start();
        } else if let Some(after) = rest.strip_prefix("domain=") {
            if domain.is_some() {
                return Err(repeated("domain=", name, context));
            }
            let (first, second, open_min, open_max, after) =
                parse_pair(after, ',', true, name, context)?;
            let interval =
                parse_interval(&first, second.as_deref(), "domain", name, context)?;
            domain = Some((interval.0, interval.1, open_min, open_max));
            rest = after.trim_start();
        } else if let Some(after) = rest.strip_prefix("range=") {
            if range.is_some() {
                return Err(repeated("range=", name, context));
            }
            let (first, second, open_min, open_max, after) =
                parse_pair(after, ',', true, name, context)?;
            let interval =
                parse_interval(&first, second.as_deref(), "range", name, context)?;
            range = Some((interval.0, interval.1, open_min, open_max));
            rest = after.trim_start();
        } else {
            break;
        }
    }

    if rest.is_empty() {
        return Err(format!(
            "function '{}' lacks a definition at {}",
            name, context
        ));
    }
    if rest.starts_with('[') {
        return Err(format!(
            "function '{}' missing keyword before '[' on {}",
            name, context
        ));
    }
    /* Nonzero domain and range endpoints are meaningless without declared
     * units. */
    let nonzero = |interval: &Option<(Option<f64>, Option<f64>, bool, bool)>| {
        interval.map_or(false, |(min, max, _, _)| {
            min.map_or(false, |v| v != 0.0) || max.map_or(false, |v| v != 0.0)
        })
    };
    if forward_dim.is_none() && nonzero(&domain) {
        return Err(format!(
            "function '{}' defined on {} has domain with no units",
            name, context
        ));
    }
    if inverse_dim.is_none() && nonzero(&range) {
        return Err(format!(
            "function '{}' defined on {} has range with no units",
            name, context
        ));
    }

    let (forward_body, inverse_body) = match rest.split_once(';') {
        Some((forward, inverse)) => (forward.trim(), Some(inverse.trim())),
        None => (rest.trim(), None),
    };
    let (domain_min, domain_max, domain_min_open, domain_max_open) =
        domain.unwrap_or((None, None, false, false));
    let (range_min, range_max, range_min_open, range_max_open) =
        range.unwrap_or((None, None, false, false));

    Ok(FuncEntry {
        name: name.to_string(),
        def: FuncDef::Analytic {
            forward: FuncBranch {
                param: param.to_string(),
                body: forward_body.to_string(),
                dimension: forward_dim,
                domain_min,
                domain_max,
                domain_min_open,
                domain_max_open,
            },
            inverse: inverse_body.map(|body| FuncBranch {
                param: name.to_string(),
                body: body.to_string(),
                dimension: inverse_dim,
                domain_min: range_min,
                domain_max: range_max,
                domain_min_open: range_min_open,
                domain_max_open: range_max_open,
            }),
        },
        noerror,
        source,
    })
}

fn copy_function(
    symbols: &SymbolTable,
    name: &str,
    definition: &str,
    source: Source,
    context: &str,
) -> Result<FuncEntry, String> {
    let referent = definition.trim().trim_end_matches("()").trim();
    match symbols.function(referent) {
        Some(original) => Ok(FuncEntry {
            name: name.to_string(),
            def: original.def.clone(),
            noerror: original.noerror,
            source,
        }),
        None => Err(format!(
            "bad definition for '{}' on {}, function '{}' not defined",
            name, context, referent
        )),
    }
}

fn repeated(keyword: &str, name: &str, context: &str) -> String {
    format!(
        "keyword '{}' repeated in definition of '{}' on {}",
        keyword, name, context
    )
}

/// Parse `[a<delim>b]` (or `(a<delim>b)` and mixed forms when open
/// endpoints are allowed), returning both parts, the openness flags and
/// the rest of the input.
fn parse_pair<'a>(
    input: &'a str,
    delimiter: char,
    allow_open: bool,
    name: &str,
    context: &str,
) -> Result<(String, Option<String>, bool, bool, &'a str), String> {
    let mut chars = input.chars();
    let first_open = match chars.next() {
        Some('[') => false,
        Some('(') if allow_open => true,
        _ => {
            return Err(format!(
                "expecting '[' in definition of '{}' on {}",
                name, context
            ))
        }
    };
    let body = chars.as_str();
    let close = body.find(|c| c == ']' || (allow_open && c == ')'));
    let close = match close {
        Some(pos) => pos,
        None => {
            return Err(format!(
                "expecting ']' in definition of '{}' on {}",
                name, context
            ))
        }
    };
    let second_open = body[close..].starts_with(')');
    let inside = &body[..close];
    let rest = &body[close + 1..];
    let (first, second) = match inside.split_once(delimiter) {
        Some((first, second)) => {
            (first.trim().to_string(), Some(second.trim().to_string()))
        }
        None => (inside.trim().to_string(), None),
    };
    Ok((first, second, first_open, second_open, rest))
}

fn parse_interval(
    first: &str,
    second: Option<&str>,
    which: &str,
    name: &str,
    context: &str,
) -> Result<(Option<f64>, Option<f64>), String> {
    let malformed = || {
        format!(
            "malformed {} in definition of '{}' on {}",
            which, name, context
        )
    };
    let min = match first.is_empty() {
        true => None,
        false => Some(first.parse::<f64>().map_err(|_| malformed())?),
    };
    let max = match second {
        None | Some("") => None,
        Some(text) => {
            let value = text.parse::<f64>().map_err(|_| malformed())?;
            if let Some(min) = min {
                if min >= value {
                    return Err(format!(
                        "second endpoint for {} must be greater than the first \
                         in definition of '{}' on {}",
                        which, name, context
                    ));
                }
            }
            Some(value)
        }
    };
    Ok((min, max))
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((pos, _)) => &text[..pos],
        None => text,
    }
}
