/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::path::Path;

use super::error::{ParseError, UnitsError};
use super::format::NumFormat;
use super::function::{eval_func, FuncDef};
use super::loader::{self, LoadSummary};
use super::parser::parse_quantity;
use super::quantity::Quantity;
use super::reduce;
use super::symbols::SymbolTable;

pub const DEFAULT_LOCALE: &str = "en_US";

/// Engine-wide options, fixed at construction.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub locale: String,
    pub utf8: bool,
    /// Suppress `!message` output during loading.
    pub quiet: bool,
    /// Treat `-` as subtraction in expressions; when disabled it
    /// multiplies, as in older versions.
    pub minus_subtracts: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            locale: DEFAULT_LOCALE.to_string(),
            utf8: false,
            quiet: false,
            minus_subtracts: true,
        }
    }
}

impl EngineOptions {
    /// Detect locale and UTF-8 mode from LC_CTYPE / LANG.
    pub fn from_env() -> Self {
        let raw = std::env::var("LC_CTYPE")
            .or_else(|_| std::env::var("LANG"))
            .unwrap_or_default();
        let utf8 = raw.to_ascii_uppercase().contains("UTF-8")
            || raw.to_ascii_uppercase().contains("UTF8");
        let locale = match raw.split('.').next() {
            Some("") | None => DEFAULT_LOCALE.to_string(),
            Some(tag) => tag.to_string(),
        };
        EngineOptions {
            locale,
            utf8,
            ..Default::default()
        }
    }
}

/// The engine context: the symbol store, the output number format, the
/// engine options and the last top-level result (the `_` placeholder).
/// Constructed once and threaded through every operation.
pub struct Engine {
    pub symbols: SymbolTable,
    pub format: NumFormat,
    pub options: EngineOptions,
    pub last_result: Option<Quantity>,
    pub prompt_prefix: Option<String>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Engine {
            symbols: SymbolTable::new(),
            format: NumFormat::default(),
            options,
            last_result: None,
            prompt_prefix: None,
        }
    }

    /// Load a definitions file into the symbol store, accumulating
    /// record-level errors in the summary.
    pub fn load_file(&mut self, path: &Path) -> Result<LoadSummary, UnitsError> {
        let summary = loader::load_file(&mut self.symbols, path, &self.options)?;
        if let Some(prompt) = &summary.prompt {
            self.prompt_prefix = Some(prompt.clone());
        }
        Ok(summary)
    }

    pub fn scope(&self) -> Scope<'_> {
        Scope {
            engine: self,
            binding: None,
        }
    }

    /// Parse an expression without reducing it.
    pub fn parse(&self, input: &str) -> Result<Quantity, ParseError> {
        parse_quantity(input, &self.scope())
    }

    /// Parse an expression and reduce it to primitive units, recording the
    /// result for the `_` placeholder.
    pub fn evaluate(&mut self, input: &str) -> Result<Quantity, ParseError> {
        let result = {
            let scope = self.scope();
            let mut quantity = parse_quantity(input, &scope)?;
            reduce::complete_reduce(&mut quantity, &scope)
                .map_err(|kind| ParseError { kind, offset: 0 })?;
            quantity
        };
        self.last_result = Some(result.clone());
        Ok(result)
    }

    /// Validate the loaded database: every unit and prefix must reduce to
    /// primitive units, unit lists must be conformable, and functions with
    /// an inverse must invert at a sample point. Returns the list of
    /// problems found.
    pub fn check_definitions(&self) -> Vec<String> {
        let scope = self.scope();
        let mut problems = Vec::new();
        let mut check_reduces = |name: &str, text: String| match self
            .reduces_to_primitives(&text)
        {
            true => {}
            false => problems.push(format!("'{}' is irreducible", name)),
        };
        for (name, _) in self.symbols.units() {
            check_reduces(name, name.to_string());
        }
        for (name, _) in self.symbols.prefixes() {
            check_reduces(&format!("{}-", name), format!("{}meter", name));
        }
        for func in self.symbols.functions() {
            if let Some(problem) = self.check_function(func) {
                problems.push(problem);
            }
        }
        for (name, alias) in self.symbols.aliases() {
            let mut prev: Option<Quantity> = None;
            for part in alias.definition.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let mut quantity = match parse_quantity(part, &scope) {
                    Ok(q) => q,
                    Err(_) => {
                        problems.push(format!(
                            "unit list '{}' contains errors",
                            name
                        ));
                        break;
                    }
                };
                if reduce::complete_reduce(&mut quantity, &scope).is_err() {
                    problems.push(format!(
                        "unit list '{}' contains errors",
                        name
                    ));
                    break;
                }
                if let Some(prev) = &prev {
                    if !prev.conformable(&quantity, |t| {
                        self.symbols.is_dimensionless(t)
                    }) {
                        problems.push(format!(
                            "unit list '{}' is not conformable",
                            name
                        ));
                        break;
                    }
                }
                prev = Some(quantity);
            }
        }
        problems.sort();
        problems
    }

    fn reduces_to_primitives(&self, text: &str) -> bool {
        let scope = self.scope();
        let mut quantity = match parse_quantity(text, &scope) {
            Ok(q) => q,
            Err(_) => return false,
        };
        reduce::complete_reduce(&mut quantity, &scope).is_ok()
    }

    fn check_function(&self, func: &super::function::FuncEntry) -> Option<String> {
        let scope = self.scope();
        match &func.def {
            FuncDef::Table { points, .. } => {
                /* Locations were checked at load time; the inverse
                 * additionally needs strictly monotone values. */
                let increasing =
                    points.windows(2).all(|w| w[0].1 < w[1].1);
                let decreasing =
                    points.windows(2).all(|w| w[0].1 > w[1].1);
                match points.len() < 2 || increasing || decreasing {
                    true => None,
                    false => Some(format!(
                        "table '{}' lacks a unique inverse",
                        func.name
                    )),
                }
            }
            FuncDef::Analytic { forward, inverse } => {
                if func.noerror || inverse.is_none() {
                    return None;
                }
                let sample = match (forward.domain_min, forward.domain_max) {
                    (Some(min), Some(max)) => (min + max) / 2.0,
                    (Some(min), None) => min + 1.0,
                    (None, Some(max)) => max - 1.0,
                    (None, None) => 1.0,
                };
                let mut arg = match &forward.dimension {
                    Some(dim) => {
                        let mut q = parse_quantity(dim, &scope).ok()?;
                        q.factor *= sample;
                        q
                    }
                    None => Quantity::from_factor(sample),
                };
                if reduce::complete_reduce(&mut arg, &scope).is_err() {
                    return Some(format!(
                        "argument unit of '{}' does not reduce",
                        func.name
                    ));
                }
                let there = match eval_func(&scope, func, arg.clone(), false, true)
                {
                    Ok(v) => v,
                    Err(err) => {
                        return Some(format!(
                            "error evaluating '{}({})': {}",
                            func.name, sample, err
                        ))
                    }
                };
                let back = match eval_func(&scope, func, there, true, true) {
                    Ok(mut v) => {
                        reduce::complete_reduce(&mut v, &scope).ok()?;
                        v
                    }
                    Err(err) => {
                        return Some(format!(
                            "error evaluating '~{}' at {}: {}",
                            func.name, sample, err
                        ))
                    }
                };
                match (back.factor / arg.factor - 1.0).abs() < 1e-12 {
                    true => None,
                    false => Some(format!(
                        "inverse of '{}' does not invert at {}",
                        func.name, sample
                    )),
                }
            }
        }
    }
}

/// Symbol resolution context threaded through the parser and the
/// reduction engine. While a function is being evaluated, a child scope
/// carries the formal-parameter binding; it replaces any outer binding and
/// is restored simply by dropping the child.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    engine: &'a Engine,
    binding: Option<(&'a str, &'a Quantity)>,
}

impl<'a> Scope<'a> {
    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub fn symbols(&self) -> &'a SymbolTable {
        &self.engine.symbols
    }

    pub fn minus_subtracts(&self) -> bool {
        self.engine.options.minus_subtracts
    }

    pub fn last_result(&self) -> Option<&'a Quantity> {
        self.engine.last_result.as_ref()
    }

    /// A scope with the function parameter bound; any outer binding is
    /// shadowed for the duration.
    pub fn with_binding<'b>(
        &self,
        name: &'b str,
        value: &'b Quantity,
    ) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            engine: self.engine,
            binding: Some((name, value)),
        }
    }

    pub fn binding(&self, name: &str) -> Option<&'a Quantity> {
        match self.binding {
            Some((param, value)) if param == name => Some(value),
            _ => None,
        }
    }
}
