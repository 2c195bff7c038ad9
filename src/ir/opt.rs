//! Rewriting passes over [`crate::ir::Program`]. Each pass reports whether it changed
//! anything; the driver in [`crate::optimizer`] runs them to a fixpoint.

mod algebraic;
mod constant;
mod control_flow;
mod copy_propagation;
mod cse;
mod dead_code;
mod inline;
mod lower_jumps;
mod minmax;
mod precision;
mod rebalance;
mod saturate;
mod split;
mod swizzle;
mod tree_grafting;
mod vector;

pub use self::algebraic::*;
pub use self::constant::*;
pub use self::control_flow::*;
pub use self::copy_propagation::*;
pub use self::cse::*;
pub use self::dead_code::*;
pub use self::inline::*;
pub use self::lower_jumps::*;
pub use self::minmax::*;
pub use self::precision::*;
pub use self::rebalance::*;
pub use self::saturate::*;
pub use self::split::*;
pub use self::swizzle::*;
pub use self::tree_grafting::*;
pub use self::vector::*;

use crate::{
    concrete_type::Type,
    ir::{Constant, Expr, Swizzle},
};

/// `value` as a value of type `ty`: unchanged when the types agree, splatted
/// when `value` is a scalar and `ty` a vector of the same base.
fn broadcast_to(value: Expr, ty: &Type) -> Option<Expr> {
    if value.ty == *ty {
        return Some(value);
    }
    if !value.ty.is_scalar() || !ty.is_vector() || value.ty.base_type() != ty.base_type() {
        return None;
    }

    let splat = match value.as_constant().and_then(Constant::as_scalar) {
        Some(s) => Expr::constant(Constant::splat(ty.clone(), s)?),
        None => {
            let precision = value.precision;
            let mut e = Expr::swizzle(value, Swizzle::new(&vec![0; usize::from(ty.vector_elements())])?)?;
            e.precision = precision;
            e
        }
    };
    if splat.ty != *ty {
        return None;
    }
    Some(splat)
}
