//! Rate feed, unit registry and session handling

pub mod aggregator;
pub mod config;
pub mod log;
pub mod rates;
pub mod registry;
pub mod session;
pub mod store;
pub mod turn;

pub use registry::UnitRegistry;
pub use session::Session;
