/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::function::FuncEntry;

/// Marks irreducible units in definition text.
pub const PRIMITIVE_CHAR: char = '!';
/// Marks primitive units ignored in conformability comparisons.
pub const DIMENSIONLESS: &str = "!dimensionless";

/// Builtin function names; unit names may not collide with these.
pub const BUILTINS: &[&str] = &[
    "sin", "cos", "tan", "ln", "log", "exp", "acos", "atan", "asin", "sqrt",
    "cuberoot", "per", "sinh", "cosh", "tanh", "asinh", "atanh", "acosh",
];

const INVALID_NAME_CHARS: &str = "~;+-*/|^)";
const DIGITS: &str = "0123456789.,";

/// Location of a definition in the units database.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Source {
    pub file: String,
    pub line: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UnitEntry {
    pub definition: String,
    pub source: Source,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PrefixEntry {
    pub definition: String,
    pub source: Source,
}

/// A multi-unit decomposition target (a `;`-separated unit list).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AliasEntry {
    pub definition: String,
    pub source: Source,
}

/// Fallback rules applied when a unit name does not match any table entry
/// directly. The default strips English plurals; replace to localise.
pub trait PluralRules: Send + Sync {
    /// Candidate singular stems for a possibly-plural name, most likely
    /// first.
    fn stems(&self, name: &str) -> Vec<String>;
}

/// Plural rules for english: strip a trailing -s; strip -es after x, sh,
/// ch, ss; -ies becomes -y.
pub struct EnglishPlurals;

impl PluralRules for EnglishPlurals {
    fn stems(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        if name.chars().count() > 2 && name.ends_with('s') {
            let stem = &name[..name.len() - 1];
            out.push(stem.to_string());
            if stem.len() > 2 && stem.ends_with('e') {
                out.push(stem[..stem.len() - 1].to_string());
            }
            if stem.len() > 2 && stem.ends_with('i') {
                out.push(format!("{}y", &stem[..stem.len() - 1]));
            }
        }
        out
    }
}

/// The four keyed symbol tables of the engine: units, prefixes, nonlinear
/// functions and unit-list aliases. Keys are case-sensitive. Prefixes are
/// indexed by their first character to speed up longest-match search.
pub struct SymbolTable {
    units: HashMap<String, UnitEntry>,
    prefixes: HashMap<char, Vec<(String, PrefixEntry)>>,
    functions: HashMap<String, FuncEntry>,
    aliases: HashMap<String, AliasEntry>,
    plural: Box<dyn PluralRules>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            units: HashMap::new(),
            prefixes: HashMap::new(),
            functions: HashMap::new(),
            aliases: HashMap::new(),
            plural: Box::new(EnglishPlurals),
        }
    }

    pub fn with_plural_rules(mut self, rules: Box<dyn PluralRules>) -> Self {
        self.plural = rules;
        self
    }

    /* Definition. Each define function returns whether the name was new,
     * so the loader can keep its counts; redefinitions replace the
     * previous entry and are warned about unless marked silent. */

    pub fn define_unit(
        &mut self,
        name: &str,
        definition: &str,
        source: Source,
        silent: bool,
    ) -> Result<bool, String> {
        if name.starts_with('_') || name.ends_with('_') {
            return Err("it starts or ends with '_'".to_string());
        }
        if name
            .chars()
            .last()
            .map_or(false, |c| DIGITS.contains(c) && c != '0' && c != '1')
            && !has_subscript(name)
        {
            return Err(
                "it ends with a digit other than 0 or 1 without preceding '_'"
                    .to_string(),
            );
        }
        check_name(name)?;
        if let Some(old) = self.units.get(name) {
            if !silent {
                log::warn!(
                    "unit '{}' defined on line {} of '{}' is redefined",
                    name,
                    old.source.line,
                    old.source.file
                );
            }
        }
        Ok(self
            .units
            .insert(
                name.to_string(),
                UnitEntry {
                    definition: definition.to_string(),
                    source,
                },
            )
            .is_none())
    }

    pub fn define_prefix(
        &mut self,
        name: &str,
        definition: &str,
        source: Source,
        silent: bool,
    ) -> Result<bool, String> {
        check_name(name)?;
        let first = match name.chars().next() {
            Some(c) => c,
            None => return Err("empty prefix name".to_string()),
        };
        let list = self.prefixes.entry(first).or_default();
        match list.iter_mut().find(|(n, _)| n == name) {
            Some((_, entry)) => {
                if !silent {
                    log::warn!(
                        "prefix '{}-' defined on line {} of '{}' is redefined",
                        name,
                        entry.source.line,
                        entry.source.file
                    );
                }
                *entry = PrefixEntry {
                    definition: definition.to_string(),
                    source,
                };
                Ok(false)
            }
            None => {
                list.push((
                    name.to_string(),
                    PrefixEntry {
                        definition: definition.to_string(),
                        source,
                    },
                ));
                Ok(true)
            }
        }
    }

    pub fn define_function(
        &mut self,
        entry: FuncEntry,
        silent: bool,
    ) -> Result<bool, String> {
        check_name(&entry.name)?;
        if let Some(old) = self.functions.get(&entry.name) {
            if !silent {
                log::warn!(
                    "function '{}' defined on line {} of '{}' is redefined",
                    entry.name,
                    old.source.line,
                    old.source.file
                );
            }
        }
        Ok(self.functions.insert(entry.name.clone(), entry).is_none())
    }

    pub fn define_alias(
        &mut self,
        name: &str,
        definition: &str,
        source: Source,
    ) -> Result<bool, String> {
        check_name(name)?;
        if let Some(old) = self.aliases.get(name) {
            log::warn!(
                "unit list '{}' defined on line {} of '{}' is redefined",
                name,
                old.source.line,
                old.source.file
            );
        }
        Ok(self
            .aliases
            .insert(
                name.to_string(),
                AliasEntry {
                    definition: definition.to_string(),
                    source,
                },
            )
            .is_none())
    }

    /* Lookup. */

    pub fn unit(&self, name: &str) -> Option<&UnitEntry> {
        self.units.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FuncEntry> {
        self.functions.get(name)
    }

    /// Look up an inverse function given as a `~` character followed by
    /// optional spaces and the function name.
    pub fn inverse_function(&self, name: &str) -> Option<&FuncEntry> {
        let name = name.strip_prefix('~')?;
        self.functions.get(name.trim())
    }

    pub fn alias(&self, name: &str) -> Option<&AliasEntry> {
        self.aliases.get(name)
    }

    /// Look up a unit definition including prefix processing and plural
    /// removal. The returned text is either the unit's raw definition, a
    /// singular stem to be looked up again, or a synthesised
    /// `"<prefix definition> <remainder>"` expression.
    pub fn lookup_unit(
        &self,
        name: &str,
        prefix_ok: bool,
    ) -> Option<Cow<'_, str>> {
        if let Some(entry) = self.units.get(name) {
            return Some(Cow::from(entry.definition.as_str()));
        }
        for stem in self.plural.stems(name) {
            if self.lookup_unit(&stem, prefix_ok).is_some() {
                return Some(Cow::from(stem));
            }
        }
        if prefix_ok {
            if let Some(expansion) = self.lookup_prefixed(name) {
                return Some(Cow::from(expansion));
            }
        }
        None
    }

    /// Longest matching prefix whose remainder is empty or resolves as a
    /// unit itself (without further prefix stripping).
    fn lookup_prefixed(&self, name: &str) -> Option<String> {
        let first = name.chars().next()?;
        let mut candidates: Vec<&(String, PrefixEntry)> = self
            .prefixes
            .get(&first)?
            .iter()
            .filter(|(prefix, _)| name.starts_with(prefix.as_str()))
            .collect();
        candidates.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));
        for (prefix, entry) in candidates {
            let rest = &name[prefix.len()..];
            if rest.is_empty() || self.lookup_unit(rest, false).is_some() {
                return Some(format!("{} {}", entry.definition, rest));
            }
        }
        None
    }

    /* Token predicates used in conformability comparisons. */

    pub fn is_primitive(&self, token: &str) -> bool {
        self.units
            .get(token)
            .map_or(false, |e| e.definition.contains(PRIMITIVE_CHAR))
    }

    pub fn is_dimensionless(&self, token: &str) -> bool {
        self.units
            .get(token)
            .map_or(false, |e| e.definition == DIMENSIONLESS)
    }

    /* Iteration, used by the conformability search and the database
     * checker. */

    pub fn units(&self) -> impl Iterator<Item = (&str, &UnitEntry)> {
        self.units.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &PrefixEntry)> {
        self.prefixes
            .values()
            .flatten()
            .map(|(n, e)| (n.as_str(), e))
    }

    pub fn functions(&self) -> impl Iterator<Item = &FuncEntry> {
        self.functions.values()
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &AliasEntry)> {
        self.aliases.iter().map(|(n, e)| (n.as_str(), e))
    }
}

/// Check for invalid unit names.
pub fn check_name(name: &str) -> Result<(), String> {
    if let Some(c) = name.chars().find(|c| INVALID_NAME_CHARS.contains(*c)) {
        return Err(format!("it contains invalid character '{}'", c));
    }
    match name.chars().next() {
        None => return Err("it is empty".to_string()),
        Some(c) if c.is_ascii_digit() => {
            return Err("it starts with a digit".to_string())
        }
        Some(_) => {}
    }
    if BUILTINS.contains(&name) {
        return Err(format!(
            "it redefines the built-in function '{}'",
            name
        ));
    }
    Ok(())
}

/// A subscript is a `_` followed by only digits, reaching to the end of
/// the name.
pub(crate) fn has_subscript(name: &str) -> bool {
    let mut chars = name.chars().rev().peekable();
    match chars.peek() {
        Some(c) if DIGITS.contains(*c) => {}
        _ => return false,
    }
    for c in chars {
        if c == '_' {
            return true;
        }
        if !DIGITS.contains(c) {
            return false;
        }
    }
    false
}
