use thiserror::Error;

use crate::ir::{FuncId, LoopId, VarId};

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("optimization did not converge after {rounds} rounds")]
    NonConvergence { rounds: usize },
    #[error("invalid IR: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("in `{function}`: reference to nonexistent variable {var:?}")]
    DanglingVariable { function: String, var: VarId },
    #[error("in `{function}`: call to nonexistent function {callee:?}")]
    DanglingFunction { function: String, callee: FuncId },
    #[error("in `{function}`: `{op}` takes {expected} operands, got {got}")]
    OperandCount {
        function: String,
        op: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("in `{function}`: operand types {operands} do not fit `{op}`")]
    OperandTypes {
        function: String,
        op: &'static str,
        operands: String,
    },
    #[error("in `{function}`: expression of type {expected} has type {got}")]
    TypeMismatch {
        function: String,
        expected: String,
        got: String,
    },
    #[error("in `{function}`: writemask {mask:#06b} does not fit an assignment of {rhs} to {lhs}")]
    WriteMask {
        function: String,
        mask: u8,
        lhs: String,
        rhs: String,
    },
    #[error("in `{function}`: `{jump}` outside of a loop")]
    JumpOutsideLoop {
        function: String,
        jump: &'static str,
    },
    #[error("in `{function}`: local variable `{name}` used without declaration")]
    Undeclared { function: String, name: String },
    #[error("in `{function}`: `{name}` declared more than once")]
    Redeclared { function: String, name: String },
    #[error("in `{function}`: loop id {id:?} appears more than once")]
    DuplicateLoop { function: String, id: LoopId },
    #[error("in `{function}`: call passes {got} arguments, `{callee}` takes {expected}")]
    ArgumentCount {
        function: String,
        callee: String,
        expected: usize,
        got: usize,
    },
    #[error("in `{function}`: assignment to a non-lvalue")]
    NotAnLvalue { function: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ReadError {
    #[error("{line}:{col}: unexpected end of input")]
    UnexpectedEof { line: usize, col: usize },
    #[error("{line}:{col}: unbalanced `)`")]
    Unbalanced { line: usize, col: usize },
    #[error("{line}:{col}: {message}")]
    Malformed {
        line: usize,
        col: usize,
        message: String,
    },
    #[error("{line}:{col}: unknown type `{name}`")]
    UnknownType {
        line: usize,
        col: usize,
        name: String,
    },
    #[error("{line}:{col}: unknown variable `{name}`")]
    UnknownVariable {
        line: usize,
        col: usize,
        name: String,
    },
    #[error("{line}:{col}: no function `{name}` accepts these arguments")]
    UnknownFunction {
        line: usize,
        col: usize,
        name: String,
    },
}
