//! Loop analysis and the transformations that depend on it: exit tests
//! folded into loop controls, and unrolling of short counted loops.

mod analysis;
mod controls;
mod unroll;

pub use self::analysis::*;
pub use self::controls::set_loop_controls;
pub use self::unroll::unroll_loops;
