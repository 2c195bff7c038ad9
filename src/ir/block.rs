use crate::{
    concrete_type::Type,
    ir::{Constant, Expr, FuncId, LoopId, Operation, VarId},
};

/// Statement list. Passes rebuild it by taking the old vector and pushing the
/// survivors back.
pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub lhs: Expr,
    pub rhs: Expr,
    /// For vector destinations, bit `n` set writes component `n`; the rhs
    /// then has one component per set bit. Zero for whole non-vector writes.
    pub write_mask: u8,
    pub condition: Option<Expr>,
}
impl Assignment {
    /// Whole-value assignment.
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        let write_mask = full_write_mask(&lhs.ty);
        Self {
            lhs,
            rhs,
            write_mask,
            condition: None,
        }
    }

    pub fn masked(lhs: Expr, rhs: Expr, write_mask: u8) -> Self {
        Self {
            lhs,
            rhs,
            write_mask,
            condition: None,
        }
    }

    /// Writes every component of the destination.
    pub fn is_whole(&self) -> bool {
        self.write_mask == full_write_mask(&self.lhs.ty)
    }

    /// Variable written by an unconditional full write to a whole variable.
    pub fn whole_variable_written(&self) -> Option<VarId> {
        if self.condition.is_some() || !self.is_whole() {
            return None;
        }

        self.lhs.whole_variable_referenced()
    }
}

/// Writemask that covers every component of a value of type `ty`.
pub fn full_write_mask(ty: &Type) -> u8 {
    match ty {
        Type::Scalar(_) | Type::Vector(_, _) => (1u8 << ty.vector_elements()) - 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: FuncId,
    /// `out`/`inout` parameters take lvalue arguments.
    pub args: Vec<Expr>,
    pub return_deref: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: Expr,
    pub then_block: Block,
    pub else_block: Block,
}

/// Exit test derived from a counting loop: the loop leaves before an
/// iteration starts once `counter cmp to` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopControls {
    pub counter: VarId,
    pub from: Option<Constant>,
    pub to: Constant,
    pub increment: Constant,
    pub cmp: Operation,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub id: LoopId,
    pub body: Block,
    pub controls: Option<LoopControls>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declare(VarId),
    Assign(Assignment),
    Call(Call),
    If(If),
    Loop(Loop),
    Break,
    Continue,
    Return(Option<Expr>),
    Discard(Option<Expr>),
}
impl Stmt {
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Self::Assign(Assignment::new(lhs, rhs))
    }

    #[inline(always)]
    pub fn is_jump(&self) -> bool {
        matches!(self, Self::Break | Self::Continue | Self::Return(_))
    }

    /// Control never reaches the next statement.
    pub fn always_jumps(&self) -> bool {
        match self {
            Self::Break | Self::Continue | Self::Return(_) | Self::Discard(None) => true,
            Self::If(i) => block_always_jumps(&i.then_block) && block_always_jumps(&i.else_block),
            _ => false,
        }
    }

    /// Leaves the statement list through a `break` or `continue` of an
    /// enclosing loop, `return`, or `discard`.
    pub fn has_jump(&self) -> bool {
        match self {
            Self::Break | Self::Continue | Self::Return(_) | Self::Discard(_) => true,
            Self::If(i) => i.then_block.iter().chain(&i.else_block).any(Stmt::has_jump),
            Self::Loop(l) => l.body.iter().any(Stmt::leaves_function),
            _ => false,
        }
    }

    /// Contains a `return` or `discard` at any depth.
    pub fn leaves_function(&self) -> bool {
        match self {
            Self::Return(_) | Self::Discard(_) => true,
            Self::If(i) => i.then_block.iter().chain(&i.else_block).any(Stmt::leaves_function),
            Self::Loop(l) => l.body.iter().any(Stmt::leaves_function),
            _ => false,
        }
    }

    /// Contains a `return` at any depth.
    pub fn has_return(&self) -> bool {
        match self {
            Self::Return(_) => true,
            Self::If(i) => i.then_block.iter().chain(&i.else_block).any(Stmt::has_return),
            Self::Loop(l) => l.body.iter().any(Stmt::has_return),
            _ => false,
        }
    }
}

pub fn block_always_jumps(block: &[Stmt]) -> bool {
    block.last().is_some_and(Stmt::always_jumps)
}
