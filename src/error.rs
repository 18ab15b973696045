//! Fatal error taxonomy: configuration and resolution errors.
//!
//! Partial-data failures (a field missing from one leadtime's file, an
//! observation unavailable for one timestamp) are not errors; they are logged
//! and leave an empty profile behind.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown variable `{0}`: not in the variable registry")]
    UnknownVariable(String),

    #[error("variable `{0}` has no model output field and cannot be extracted")]
    VariableNotInModel(String),

    #[error("incompatible options: {0}")]
    IncompatibleOptions(String),

    #[error("reference grid unavailable: {0}")]
    GridUnavailable(String),

    #[error("column index {ind} out of range: grid has {ncolumns} columns")]
    IndexOutOfRange { ind: usize, ncolumns: usize },

    #[error("variable `{variable}` is not observable on platform `{platform}`")]
    VariableNotObservable { variable: String, platform: String },
}
