//! Aggregation, filtering and session state on top of any post source.

pub mod aggregate;
pub mod session;

#[cfg(test)]
mod fake;

pub use aggregate::{Aggregator, FetchTask};
pub use session::SearchSession;
