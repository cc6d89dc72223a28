//! Expression engine: tokenizer, parser, interpreter and formatting.

pub mod complex;
pub mod engine;
pub mod eval;
pub mod evaluator;
pub mod format;
pub mod functions;
pub mod node;
pub mod ops;
pub mod parser;
pub mod tokens;
pub mod value;

pub use engine::{ExpressionEngine, MathEngine};
pub use evaluator::{Evaluator, LineResult};
pub use value::Value;
