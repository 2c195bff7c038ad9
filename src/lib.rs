//! Optimizer for a typed GLSL intermediate representation.
//!
//! A [`ir::Program`] is rewritten in place by a catalogue of passes that
//! [`optimize`] repeats until none of them makes progress.

pub mod concrete_type;
pub mod const_expr;
pub mod error;
pub mod ir;
pub mod optimizer;
pub mod precision;
pub mod stats;
pub mod utils;

pub use self::error::{OptimizeError, ReadError, ValidationError};
pub use self::optimizer::{optimize, Options, Target};
