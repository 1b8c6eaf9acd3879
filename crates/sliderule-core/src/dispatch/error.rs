//! Dispatcher construction errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no key calculator registered under the name '{0}'")]
    UnknownKeyCalc(String),
}
