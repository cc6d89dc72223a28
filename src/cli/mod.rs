//! Terminal front end: interactive pad, one-shot evaluation and rate listing.

pub mod rates;
pub mod repl;
pub mod setup;
pub mod ui;
