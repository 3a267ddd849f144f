use std::result::Result as StdResult;

use thiserror::Error;

/// Result type for tableau operations.
pub type Result<T> = StdResult<T, Error>;

/// Core error type.
///
/// Programming invariant violations (attaching an item twice, removing an
/// item that is not a child, addressing a grid cell out of range) are
/// caller bugs and panic instead of surfacing here.
#[derive(PartialEq, Eq, Error, Debug, Clone)]
pub enum Error {
    /// A leaf item failed while painting. Caught at the composer boundary.
    #[error("paint: {0}")]
    Paint(String),
    /// Layout was requested against an item that has no assigned rect yet.
    #[error("layout: {0}")]
    Layout(String),
}
