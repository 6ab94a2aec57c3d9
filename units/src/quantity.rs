/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::error::UnitsError;

/// Maximum number of token occurrences on either side of a quantity.
pub const MAX_SUBUNITS: i32 = 100;

/// A scalar factor together with an ordered signed-power multiset of unit
/// tokens. Positive powers form the numerator, negative powers the
/// denominator. Equal tokens on opposite sides cancel arithmetically, so
/// the map never holds a zero power.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
pub struct Quantity {
    pub factor: f64,
    units: BTreeMap<String, i32>,
}

impl Quantity {
    /// The neutral quantity, equal to one.
    pub fn one() -> Self {
        Quantity {
            factor: 1.0,
            units: BTreeMap::new(),
        }
    }

    pub fn from_factor(factor: f64) -> Self {
        Quantity {
            factor,
            units: BTreeMap::new(),
        }
    }

    pub fn from_unit(name: impl Into<String>) -> Self {
        Quantity {
            factor: 1.0,
            units: BTreeMap::from([(name.into(), 1)]),
        }
    }

    /// True if no unit tokens remain (a pure number).
    pub fn is_number(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = (&str, i32)> {
        self.units.iter().map(|(u, p)| (u.as_str(), *p))
    }

    pub fn power(&self, name: &str) -> i32 {
        self.units.get(name).copied().unwrap_or(0)
    }

    /// Multiply in a single token raised to the given power.
    pub fn push_unit(
        &mut self,
        name: impl Into<String>,
        power: i32,
    ) -> Result<(), UnitsError> {
        if power != 0 {
            let name = name.into();
            match self.units.entry(name) {
                std::collections::btree_map::Entry::Occupied(mut e) => {
                    let p = e.get() + power;
                    if p == 0 {
                        e.remove();
                    } else {
                        *e.get_mut() = p;
                    }
                }
                std::collections::btree_map::Entry::Vacant(e) => {
                    e.insert(power);
                }
            }
            self.check_capacity()?;
        }
        Ok(())
    }

    pub fn take_unit(&mut self, name: &str) -> i32 {
        self.units.remove(name).unwrap_or(0)
    }

    pub fn mul_assign(&mut self, other: Quantity) -> Result<(), UnitsError> {
        self.factor *= other.factor;
        for (u, p) in other.units {
            match self.units.entry(u) {
                std::collections::btree_map::Entry::Occupied(mut e) => {
                    let q = e.get() + p;
                    if q == 0 {
                        e.remove();
                    } else {
                        *e.get_mut() = q;
                    }
                }
                std::collections::btree_map::Entry::Vacant(e) => {
                    e.insert(p);
                }
            }
        }
        self.check_capacity()
    }

    pub fn div_assign(&mut self, mut other: Quantity) -> Result<(), UnitsError> {
        other.invert();
        self.mul_assign(other)
    }

    /// Swap numerator and denominator and invert the factor.
    pub fn invert(&mut self) {
        self.factor = 1.0 / self.factor;
        for p in self.units.values_mut() {
            *p = -*p;
        }
    }

    /// Raise to an integer power. A power of zero yields one.
    pub fn powi(&mut self, n: i32) -> Result<(), UnitsError> {
        if n == 0 {
            *self = Quantity::one();
            return Ok(());
        }
        self.factor = self.factor.powi(n);
        for p in self.units.values_mut() {
            *p *= n;
        }
        self.check_capacity()
    }

    /// Compare unit compositions, skipping tokens matched by the ignore
    /// predicate. Both quantities must be reduced for the comparison to be
    /// meaningful.
    pub fn conformable(
        &self,
        other: &Quantity,
        mut ignore: impl FnMut(&str) -> bool,
    ) -> bool {
        let mine: Vec<(&str, i32)> = self
            .units
            .iter()
            .filter(|(u, _)| !ignore(u))
            .map(|(u, p)| (u.as_str(), *p))
            .collect();
        let theirs = other
            .units
            .iter()
            .filter(|(u, _)| !ignore(u))
            .map(|(u, p)| (u.as_str(), *p));
        mine.into_iter().eq(theirs)
    }

    fn check_capacity(&self) -> Result<(), UnitsError> {
        let (num, den) = self.units.values().fold((0, 0), |(n, d), p| {
            if *p > 0 {
                (n + p, d)
            } else {
                (n, d - p)
            }
        });
        match num <= MAX_SUBUNITS && den <= MAX_SUBUNITS {
            true => Ok(()),
            false => Err(UnitsError::ProductOverflow),
        }
    }

    /// The unit composition without the factor, in the conventional
    /// "a^2 b / c" notation.
    pub fn unit_string(&self) -> String {
        let mut out = String::new();
        for (u, p) in self.units.iter().filter(|(_, p)| **p > 0) {
            out.push_str(&format!(" {}", u));
            if *p > 1 {
                out.push_str(&format!("^{}", p));
            }
        }
        let mut slash = false;
        for (u, p) in self.units.iter().filter(|(_, p)| **p < 0) {
            if !slash {
                out.push_str(" /");
                slash = true;
            }
            out.push_str(&format!(" {}", u));
            if *p < -1 {
                out.push_str(&format!("^{}", -p));
            }
        }
        out
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}{}", self.factor, self.unit_string())
    }
}
