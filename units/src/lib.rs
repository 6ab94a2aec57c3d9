/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

pub mod convert;
pub mod engine;
pub mod error;
pub mod format;
pub mod function;
pub mod loader;
pub mod parser;
pub mod quantity;
pub mod reduce;
pub mod symbols;

pub use convert::{Answer, ConvertOpts};
pub use engine::{Engine, EngineOptions, Scope};
pub use error::{ParseError, UnitsError};
pub use format::NumFormat;
pub use loader::LoadSummary;
pub use quantity::Quantity;
pub use symbols::SymbolTable;
