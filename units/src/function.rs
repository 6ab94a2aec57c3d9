/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use serde::{Deserialize, Serialize};

use super::engine::Scope;
use super::error::UnitsError;
use super::parser::parse_quantity;
use super::quantity::Quantity;
use super::reduce;
use super::symbols::Source;

/// One direction of an analytic function definition. The body is raw
/// expression text reparsed on each evaluation with the formal parameter
/// bound to the argument.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FuncBranch {
    pub param: String,
    pub body: String,
    pub dimension: Option<String>,
    pub domain_min: Option<f64>,
    pub domain_max: Option<f64>,
    pub domain_min_open: bool,
    pub domain_max_open: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum FuncDef {
    Analytic {
        forward: FuncBranch,
        inverse: Option<FuncBranch>,
    },
    /// A piecewise-linear table mapping locations to values expressed in
    /// the table unit. Locations increase strictly; interpolation is
    /// linear between neighbouring points.
    Table {
        unit: String,
        points: Vec<(f64, f64)>,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FuncEntry {
    pub name: String,
    pub def: FuncDef,
    pub noerror: bool,
    pub source: Source,
}

pub fn linear_interp(a: f64, b: f64, aval: f64, bval: f64, c: f64) -> f64 {
    let lambda = (b - c) / (b - a);
    lambda * aval + (1.0 - lambda) * bval
}

/// Apply a function definition or its inverse to an argument quantity.
pub fn eval_func(
    scope: &Scope,
    func: &FuncEntry,
    arg: Quantity,
    inverse: bool,
    all_errors: bool,
) -> Result<Quantity, UnitsError> {
    match &func.def {
        FuncDef::Table { unit, points } => {
            eval_table(scope, unit, points, arg, inverse)
        }
        FuncDef::Analytic { forward, inverse: inv } => {
            let branch = match inverse {
                false => forward,
                true => inv.as_ref().ok_or(UnitsError::NoInverse)?,
            };
            eval_branch(scope, branch, arg, all_errors)
        }
    }
}

fn eval_branch(
    scope: &Scope,
    branch: &FuncBranch,
    mut arg: Quantity,
    all_errors: bool,
) -> Result<Quantity, UnitsError> {
    reduce::complete_reduce(&mut arg, scope)?;
    let value = match &branch.dimension {
        Some(dim) => {
            let mut want = parse_quantity(dim, scope)
                .map_err(|_| UnitsError::BadFuncDimen)?;
            reduce::complete_reduce(&mut want, scope)
                .map_err(|_| UnitsError::BadFuncDimen)?;
            if !arg.conformable(&want, |_| false) {
                return Err(UnitsError::BadFuncArg);
            }
            arg.factor / want.factor
        }
        None => arg.factor,
    };
    if let Some(max) = branch.domain_max {
        if value > max || (branch.domain_max_open && value == max) {
            return Err(UnitsError::NotInDomain);
        }
    }
    if let Some(min) = branch.domain_min {
        if value < min || (branch.domain_min_open && value == min) {
            return Err(UnitsError::NotInDomain);
        }
    }
    let inner = scope.with_binding(&branch.param, &arg);
    match parse_quantity(&branch.body, &inner) {
        Ok(result) => Ok(result),
        Err(err) => match err.kind {
            _ if all_errors => Err(err.kind),
            UnitsError::ProductOverflow | UnitsError::NotRoot => Err(err.kind),
            _ => Err(UnitsError::FuncEval),
        },
    }
}

fn eval_table(
    scope: &Scope,
    unit: &str,
    points: &[(f64, f64)],
    mut arg: Quantity,
    inverse: bool,
) -> Result<Quantity, UnitsError> {
    let mut table_unit = parse_quantity(unit, scope)
        .map_err(|_| UnitsError::BadFuncDimen)?;
    match inverse {
        true => {
            arg.div_assign(table_unit)?;
            let value = match reduce::as_number(&mut arg, scope) {
                Ok(value) => value,
                Err(UnitsError::NotANumber) => {
                    return Err(UnitsError::BadFuncArg)
                }
                Err(err) => return Err(err),
            };
            /* The table is strictly monotone in its values, in either
             * direction, so a single bracketing pair exists. */
            for window in points.windows(2) {
                let ((la, va), (lb, vb)) = (window[0], window[1]);
                if (va <= value && value <= vb)
                    || (vb <= value && value <= va)
                {
                    return Ok(Quantity::from_factor(linear_interp(
                        va, vb, la, lb, value,
                    )));
                }
            }
            Err(UnitsError::NotInDomain)
        }
        false => {
            let value = match reduce::as_number(&mut arg, scope) {
                Ok(value) => value,
                Err(UnitsError::NotANumber) => {
                    return Err(UnitsError::BadFuncArg)
                }
                Err(err) => return Err(err),
            };
            for window in points.windows(2) {
                let ((la, va), (lb, vb)) = (window[0], window[1]);
                if la <= value && value <= lb {
                    table_unit.factor *= linear_interp(la, lb, va, vb, value);
                    return Ok(table_unit);
                }
            }
            Err(UnitsError::NotInDomain)
        }
    }
}
