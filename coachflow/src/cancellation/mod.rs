//! Caller-driven cancellation of pipeline runs.

mod token;

pub use token::CancellationToken;
