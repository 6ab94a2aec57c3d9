/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use serde::Serialize;
use thiserror::Error;

/// Errors produced by the conversion engine. These are carried as return
/// values throughout; only the variants under "database" can abort a load,
/// and then only for the top-level file.
#[derive(Error, Serialize, PartialEq, Clone, Debug)]
pub enum UnitsError {
    #[error("parse error")]
    Parse,
    #[error("malformed number")]
    BadNumber,
    #[error("product overflow")]
    ProductOverflow,
    #[error("unit reduction error (bad unit definition)")]
    Reduce,
    #[error("invalid sum or difference of non-conformable units")]
    BadSum,
    #[error("unit not dimensionless")]
    NotANumber,
    #[error("unit not a root")]
    NotRoot,
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("exponent not dimensionless")]
    DimExponent,
    #[error("base unit not dimensionless; rational exponent required")]
    IrrationalExponent,
    #[error("base unit not a root")]
    BaseNotRoot,
    #[error("no previous result; '_' not set")]
    LastUnset,
    #[error("error in builtin function: {0}")]
    Math(&'static str),
    #[error("unknown function name '{0}'")]
    NotAFunction(String),
    #[error("function argument has wrong dimension")]
    BadFuncArg,
    #[error("argument of function outside domain")]
    NotInDomain,
    #[error("nonlinear unit definition has unit error")]
    BadFuncDimen,
    #[error("no inverse defined")]
    NoInverse,
    #[error("argument wrong dimension or bad nonlinear unit definition")]
    FuncEval,
    #[error("conformability error: {have} <-> {want}")]
    NotConformable { have: String, want: String },
    #[error("cannot open units file '{0}': {1}")]
    File(String, String),
    #[error("units file contains errors")]
    BadFile,
    #[error("invalid number format specification: {0}")]
    BadFormat(String),
}

/// A parse failure with the byte offset of the offending input.
#[derive(Error, Serialize, PartialEq, Clone, Debug)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: UnitsError,
    pub offset: usize,
}

impl From<ParseError> for UnitsError {
    fn from(err: ParseError) -> Self {
        err.kind
    }
}
