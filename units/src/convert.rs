/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use serde::Serialize;

use super::engine::Engine;
use super::error::UnitsError;
use super::format::{getsigdigits, round_digits};
use super::function::{eval_func, FuncDef};
use super::parser::parse_quantity;
use super::quantity::Quantity;
use super::reduce;
use super::symbols::PRIMITIVE_CHAR;

const DIGITS: &str = "0123456789.,";

/// Options for a single conversion request.
#[derive(Clone, Debug, Default)]
pub struct ConvertOpts {
    /// Disable reciprocal conversion.
    pub strict: bool,
    /// Print only the forward factor.
    pub one_line: bool,
    /// Round the last unit-list value to an integer.
    pub round: bool,
}

/// The result of a top-level request, ready for rendering.
#[derive(Serialize, Clone, Debug)]
pub enum Answer {
    /// Scalar conversion factors between conformable quantities.
    Conversion {
        factor: f64,
        inverse: Option<f64>,
        reciprocal: bool,
    },
    /// The expansion chain and reduced form of the source expression.
    Definition {
        chain: Vec<String>,
        reduced: Quantity,
    },
    /// The inverse of the named function applied to the source.
    Function { result: Quantity },
    /// Multi-unit decomposition into integer multiples plus remainder.
    Decomposition {
        terms: Vec<(f64, String)>,
        negative: bool,
        last_unit: String,
        round_dir: f64,
    },
    /// Conformable or matching unit names with their definitions.
    Matches { matches: Vec<(String, String)> },
}

impl Engine {
    /// Convert `have` to `want`. An empty `want` yields the definition;
    /// a function name applies the function's inverse; a `;`-separated
    /// list decomposes.
    pub fn convert(
        &mut self,
        have_text: &str,
        want_text: &str,
        opts: &ConvertOpts,
    ) -> Result<Answer, UnitsError> {
        let have_text = have_text.trim();
        let want_text = want_text.trim();
        let have = self.evaluate(have_text).map_err(|err| err.kind)?;

        if want_text.is_empty() {
            return Ok(self.definition_of(have_text, have));
        }

        /* A unit-list alias stands for its definition. */
        let want_eff = match self.symbols.alias(want_text) {
            Some(alias) => alias.definition.clone(),
            None => want_text.to_string(),
        };

        if let Some(func) = self.symbols.function(&want_eff) {
            let scope = self.scope();
            let mut result = eval_func(&scope, func, have, true, false)?;
            reduce::complete_reduce(&mut result, &scope)?;
            return Ok(Answer::Function { result });
        }

        if want_eff.contains(';') {
            return self.decompose(&have, &want_eff, opts);
        }

        let scope = self.scope();
        let mut want = parse_quantity(&want_eff, &scope)?;
        reduce::complete_reduce(&mut want, &scope)?;
        let symbols = &self.symbols;
        let ignore = |token: &str| symbols.is_dimensionless(token);
        if have.conformable(&want, ignore) {
            return Ok(Answer::Conversion {
                factor: have.factor / want.factor,
                inverse: (!opts.one_line).then(|| want.factor / have.factor),
                reciprocal: false,
            });
        }
        let mut inverse_have = have.clone();
        inverse_have.invert();
        if !opts.strict && inverse_have.conformable(&want, ignore) {
            return Ok(Answer::Conversion {
                factor: inverse_have.factor / want.factor,
                inverse: (!opts.one_line)
                    .then(|| want.factor / inverse_have.factor),
                reciprocal: true,
            });
        }
        Err(UnitsError::NotConformable {
            have: self.show_quantity(&have),
            want: self.show_quantity(&want),
        })
    }

    /// The rule chain for a unit name followed by its reduced form.
    fn definition_of(&self, have_text: &str, reduced: Quantity) -> Answer {
        let mut chain = Vec::new();
        let mut current = have_text.to_string();
        while let Some(next) = self.symbols.lookup_unit(&current, true) {
            if next.contains(PRIMITIVE_CHAR)
                || next.chars().all(|c| DIGITS.contains(c))
            {
                break;
            }
            current = next.into_owned();
            chain.push(current.clone());
            if chain.len() > 100 {
                break;
            }
        }
        Answer::Definition { chain, reduced }
    }

    /// Decompose a quantity into a sum over a `;`-separated unit list,
    /// integer multiples of every unit but the last.
    fn decompose(
        &self,
        have: &Quantity,
        want_text: &str,
        opts: &ConvertOpts,
    ) -> Result<Answer, UnitsError> {
        let scope = self.scope();
        let mut segments: Vec<&str> =
            want_text.split(';').map(str::trim).collect();
        /* A trailing separator repeats the last unit, yielding integer
         * and fractional parts; with rounding it is dropped. */
        let repeat_last = segments.last() == Some(&"");
        if repeat_last {
            segments.pop();
            if !opts.round {
                match segments.last().copied() {
                    Some(last) => segments.push(last),
                    None => return Err(UnitsError::Parse),
                }
            }
        }
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(UnitsError::Parse);
        }

        let mut units: Vec<(String, f64)> = Vec::new();
        let mut previous: Option<Quantity> = None;
        for segment in &segments {
            let mut want = parse_quantity(segment, &scope)?;
            reduce::complete_reduce(&mut want, &scope)?;
            let reference = previous.as_ref().unwrap_or(have);
            if !reference.conformable(&want, |token| {
                self.symbols.is_dimensionless(token)
            }) {
                return Err(UnitsError::NotConformable {
                    have: self.show_quantity(reference),
                    want: self.show_quantity(&want),
                });
            }
            units.push((segment.to_string(), want.factor));
            previous = Some(want);
        }

        let mut remainder = have.factor.abs();
        let negative = have.factor < 0.0;
        let mut round_dir = 0.0;
        if opts.round {
            let value = remainder;
            let last = units.last().map(|(_, f)| *f).unwrap_or(1.0);
            remainder = (remainder / last).round() * last;
            round_dir = remainder - value;
        }

        let mut terms = Vec::new();
        for (index, (text, unit_factor)) in units.iter().enumerate() {
            let sigdigits = getsigdigits(have.factor, remainder, 10);
            if sigdigits == 0 {
                break;
            }
            /* Remove sub-precision junk accumulating in the remainder;
             * rounding is base 2 to keep all valid bits. */
            remainder = round_digits(
                remainder,
                getsigdigits(have.factor, remainder, 2),
                2,
            );
            let not_last = index + 1 < units.len();
            let mut value;
            if not_last {
                value = (remainder / unit_factor).trunc();
                remainder = unit_factor * (remainder / unit_factor - value);
                /* The remainder represents less than one of the current
                 * unit, but display rounding may bring it up to one,
                 * producing output like `4 ft + 12 in`. Fold it into the
                 * current value instead. */
                let rounded_next = round_digits(
                    remainder / unit_factor,
                    getsigdigits(have.factor, remainder / unit_factor, 10),
                    10,
                );
                if self.format.displays_as(1.0, rounded_next) {
                    value += 1.0;
                    remainder = 0.0;
                }
            } else {
                value = remainder / unit_factor;
            }
            value = round_digits(value, sigdigits, 10);
            if !not_last && self.format.displays_as(0.0, value) {
                value = 0.0;
            }
            if value != 0.0 {
                terms.push((value, text.clone()));
            }
        }

        Ok(Answer::Decomposition {
            terms,
            negative,
            last_unit: segments.last().map(|s| s.to_string()).unwrap_or_default(),
            round_dir,
        })
    }

    /// List every unit, function and alias conformable with the source
    /// expression, sorted by name.
    pub fn search_conformable(
        &mut self,
        have_text: &str,
    ) -> Result<Answer, UnitsError> {
        let have = self.evaluate(have_text.trim()).map_err(|err| err.kind)?;
        let scope = self.scope();
        let mut matches = Vec::new();
        let conformable = |candidate: &str| -> bool {
            let mut want = match parse_quantity(candidate, &scope) {
                Ok(want) => want,
                Err(_) => return false,
            };
            if reduce::complete_reduce(&mut want, &scope).is_err() {
                return false;
            }
            have.conformable(&want, |token| {
                self.symbols.is_dimensionless(token)
            })
        };
        for (name, entry) in self.symbols.units() {
            if conformable(name) {
                let definition =
                    match entry.definition.contains(PRIMITIVE_CHAR) {
                        true => "<primitive unit>".to_string(),
                        false => entry.definition.clone(),
                    };
                matches.push((name.to_string(), definition));
            }
        }
        for func in self.symbols.functions() {
            match &func.def {
                FuncDef::Table { unit, .. } => {
                    if conformable(unit) {
                        matches.push((
                            func.name.clone(),
                            "<piecewise linear>".to_string(),
                        ));
                    }
                }
                FuncDef::Analytic { inverse, .. } => {
                    if let Some(dimension) =
                        inverse.as_ref().and_then(|inv| inv.dimension.as_ref())
                    {
                        if conformable(dimension) {
                            matches.push((
                                func.name.clone(),
                                "<nonlinear>".to_string(),
                            ));
                        }
                    }
                }
            }
        }
        for (name, alias) in self.symbols.aliases() {
            let first = alias
                .definition
                .split(';')
                .next()
                .unwrap_or("")
                .trim();
            if conformable(first) {
                matches.push((name.to_string(), alias.definition.clone()));
            }
        }
        matches.sort();
        Ok(Answer::Matches { matches })
    }

    /// List every unit, function and alias whose name contains the given
    /// text.
    pub fn search_text(&self, text: &str) -> Answer {
        let mut matches = Vec::new();
        for (name, entry) in self.symbols.units() {
            if name.contains(text) {
                let definition =
                    match entry.definition.contains(PRIMITIVE_CHAR) {
                        true => "<primitive unit>".to_string(),
                        false => entry.definition.clone(),
                    };
                matches.push((name.to_string(), definition));
            }
        }
        for func in self.symbols.functions() {
            if func.name.contains(text) {
                let kind = match &func.def {
                    FuncDef::Table { .. } => "<piecewise linear>",
                    FuncDef::Analytic { .. } => "<nonlinear>",
                };
                matches.push((func.name.clone(), kind.to_string()));
            }
        }
        for (name, alias) in self.symbols.aliases() {
            if name.contains(text) {
                matches.push((name.to_string(), alias.definition.clone()));
            }
        }
        matches.sort();
        Answer::Matches { matches }
    }

    /// Format a quantity with the configured number format.
    pub fn show_quantity(&self, quantity: &Quantity) -> String {
        format!(
            "{}{}",
            self.format.format(quantity.factor),
            quantity.unit_string()
        )
    }

    /// Render an answer the way the interactive calculator prints it.
    /// Verbosity 0 is terse, 1 the conventional tab-indented form, 2 the
    /// fully spelled out form.
    pub fn render(
        &self,
        answer: &Answer,
        have_text: &str,
        want_text: &str,
        verbosity: u8,
    ) -> String {
        match answer {
            Answer::Conversion {
                factor,
                inverse,
                reciprocal,
            } => {
                let mut out = String::new();
                if *reciprocal {
                    if verbosity > 0 {
                        out.push('\t');
                    }
                    out.push_str("reciprocal conversion\n");
                }
                let have_label = match (reciprocal, have_text.contains('/')) {
                    (false, _) => have_text.to_string(),
                    (true, false) => format!("1 / {}", have_text),
                    (true, true) => format!("1 / ({})", have_text),
                };
                match verbosity {
                    0 => out.push_str(&self.format.format(*factor)),
                    1 => out
                        .push_str(&format!("\t* {}", self.format.format(*factor))),
                    _ => out.push_str(&format!(
                        "\t{} = {}",
                        have_label,
                        self.format.show_with_unit(
                            *factor, want_text, true, false
                        )
                    )),
                }
                if let Some(inverse) = inverse {
                    match verbosity {
                        0 => out.push_str(&format!(
                            "\n{}",
                            self.format.format(*inverse)
                        )),
                        1 => out.push_str(&format!(
                            "\n\t/ {}",
                            self.format.format(*inverse)
                        )),
                        _ => out.push_str(&format!(
                            "\n\t{} = (1 / {}){}",
                            have_label,
                            self.format.format(*inverse),
                            self.format.show_with_unit(
                                0.0, want_text, false, false
                            )
                        )),
                    }
                }
                out
            }
            Answer::Definition { chain, reduced } => {
                let mut out = match verbosity {
                    0 => String::new(),
                    _ => "\tDefinition: ".to_string(),
                };
                for step in chain {
                    out.push_str(&format!("{} = ", step));
                }
                out.push_str(&self.show_quantity(reduced));
                out
            }
            Answer::Function { result } => match verbosity {
                0 => self.show_quantity(result),
                _ => format!("\t{}", self.show_quantity(result)),
            },
            Answer::Decomposition {
                terms,
                negative,
                last_unit,
                round_dir,
            } => {
                let mut out = match verbosity {
                    0 => String::new(),
                    _ => "\t".to_string(),
                };
                if terms.is_empty() {
                    out.push_str(&format!("0 {}", last_unit));
                } else {
                    for (index, (value, unit)) in terms.iter().enumerate() {
                        if index > 0 {
                            out.push_str(match negative {
                                true => " - ",
                                false => " + ",
                            });
                        } else if *negative {
                            out.push('-');
                        }
                        out.push_str(&self.format.show_with_unit(
                            *value, unit, true, false,
                        ));
                    }
                }
                if *round_dir > 0.0 {
                    out.push_str(&format!(
                        " (rounded up to nearest {})",
                        last_unit
                    ));
                } else if *round_dir < 0.0 {
                    out.push_str(&format!(
                        " (rounded down to nearest {})",
                        last_unit
                    ));
                }
                out
            }
            Answer::Matches { matches } => {
                let width = matches
                    .iter()
                    .map(|(name, _)| name.chars().count())
                    .max()
                    .unwrap_or(0);
                matches
                    .iter()
                    .map(|(name, definition)| {
                        format!("{:width$} {}", name, definition)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }
}
