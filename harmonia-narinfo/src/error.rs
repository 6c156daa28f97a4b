use std::num::ParseIntError;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NarInfoError {
    #[error("unable to split line {line:?}")]
    InvalidLine { line: String },

    #[error("unable to parse {key} value {value:?}: {source}")]
    InvalidInteger {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}
