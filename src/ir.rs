use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::{
    concrete_type::{StructDef, Type},
    precision::Precision,
};

pub use self::block::{Assignment, Block, Call, If, Loop, LoopControls, Stmt};
pub use self::constant::{Constant, ConstantData, Scalar};
pub use self::expr::{Expr, ExprKind, Operation, Swizzle, TextureKind, TextureOp};

pub mod block;
pub mod constant;
pub mod expr;
pub mod loops;
pub mod opt;
pub mod print;
pub mod read;
pub mod validate;
pub mod visit;

macro_rules! handle {
    ($name: ident, $prefix: literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}
handle!(VarId, "%v");
handle!(FuncId, "%f");
handle!(StructId, "%s");
handle!(LoopId, "%l");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableMode {
    /// function local
    Auto,
    /// compiler generated
    Temporary,
    Uniform,
    ShaderIn,
    ShaderOut,
    SystemValue,
    FunctionIn,
    FunctionOut,
    FunctionInout,
    ConstIn,
}
impl VariableMode {
    /// Visible outside of the shader: reads or writes can't be removed.
    pub const fn is_interface(self) -> bool {
        matches!(
            self,
            Self::Uniform | Self::ShaderIn | Self::ShaderOut | Self::SystemValue
        )
    }

    pub const fn is_function_param(self) -> bool {
        matches!(
            self,
            Self::FunctionIn | Self::FunctionOut | Self::FunctionInout | Self::ConstIn
        )
    }

    /// Parameter written back to the caller's argument.
    pub const fn is_out_param(self) -> bool {
        matches!(self, Self::FunctionOut | Self::FunctionInout)
    }

    /// Storage whose value is defined on entry (cannot be treated as uninitialized).
    pub const fn is_externally_defined(self) -> bool {
        matches!(
            self,
            Self::Uniform
                | Self::ShaderIn
                | Self::SystemValue
                | Self::FunctionIn
                | Self::FunctionInout
                | Self::ConstIn
        )
    }

    pub const fn qualifier(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Temporary => "temporary",
            Self::Uniform => "uniform",
            Self::ShaderIn => "in",
            Self::ShaderOut => "out",
            Self::SystemValue => "sys",
            Self::FunctionIn => "param_in",
            Self::FunctionOut => "param_out",
            Self::FunctionInout => "inout",
            Self::ConstIn => "const_in",
        }
    }

    pub fn from_qualifier(s: &str) -> Option<Self> {
        Some(match s {
            "auto" => Self::Auto,
            "temporary" => Self::Temporary,
            "uniform" => Self::Uniform,
            "in" => Self::ShaderIn,
            "out" => Self::ShaderOut,
            "sys" => Self::SystemValue,
            "param_in" => Self::FunctionIn,
            "param_out" => Self::FunctionOut,
            "inout" => Self::FunctionInout,
            "const_in" => Self::ConstIn,
            _ => return None,
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VariableFlags: u8 {
        const READ_ONLY = 1 << 0;
        const INVARIANT = 1 << 1;
        const CENTROID = 1 << 2;
        const FLAT = 1 << 3;
    }
}
impl VariableFlags {
    pub const QUALIFIERS: [(Self, &'static str); 4] = [
        (Self::READ_ONLY, "const"),
        (Self::INVARIANT, "invariant"),
        (Self::CENTROID, "centroid"),
        (Self::FLAT, "flat"),
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub mode: VariableMode,
    pub precision: Precision,
    pub flags: VariableFlags,
    /// Value known at compile time (const-qualified or proven constant).
    pub constant_value: Option<Constant>,
}
impl Variable {
    pub fn new(name: impl Into<String>, ty: Type, mode: VariableMode) -> Self {
        Self {
            name: name.into(),
            ty,
            mode,
            precision: Precision::Undefined,
            flags: VariableFlags::empty(),
            constant_value: None,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    #[inline(always)]
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(VariableFlags::READ_ONLY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub return_precision: Precision,
    pub params: Vec<VarId>,
    /// `None` for prototypes and built-ins provided by the target.
    pub body: Option<Block>,
}
impl Function {
    #[inline(always)]
    pub fn is_main(&self) -> bool {
        self.name == "main"
    }

    #[inline(always)]
    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }
}

/// Parameter directions of every function, captured up front so that passes
/// can tell lvalue arguments apart while a function body is borrowed out.
pub struct Signatures(Vec<Vec<bool>>);
impl Signatures {
    pub fn is_out_param(&self, callee: FuncId, index: usize) -> bool {
        self.0
            .get(callee.0)
            .and_then(|p| p.get(index).copied())
            .unwrap_or(true)
    }
}

/// A whole shader: variable arena, struct table, function table and the
/// ordered list of global declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub variables: Vec<Variable>,
    pub structs: Vec<StructDef>,
    /// Removed functions leave a tombstone so `FuncId`s stay stable.
    pub functions: Vec<Option<Function>>,
    pub globals: Vec<VarId>,
    next_loop_id: usize,
}
impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, var: Variable) -> VarId {
        self.variables.push(var);
        VarId(self.variables.len() - 1)
    }

    pub fn add_global(&mut self, var: Variable) -> VarId {
        let id = self.add_variable(var);
        self.globals.push(id);
        id
    }

    pub fn add_struct(&mut self, def: StructDef) -> StructId {
        self.structs.push(def);
        StructId(self.structs.len() - 1)
    }

    pub fn add_function(&mut self, func: Function) -> FuncId {
        self.functions.push(Some(func));
        FuncId(self.functions.len() - 1)
    }

    /// Allocates a compiler temporary.
    pub fn new_temporary(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        precision: Precision,
    ) -> VarId {
        self.add_variable(Variable::new(name, ty, VariableMode::Temporary).with_precision(precision))
    }

    #[inline(always)]
    pub fn var(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    #[inline(always)]
    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.0]
    }

    #[inline(always)]
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn function_mut(&mut self, id: FuncId) -> Option<&mut Function> {
        self.functions.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn function_ids(&self) -> Vec<FuncId> {
        self.functions
            .iter()
            .enumerate()
            .filter_map(|(n, f)| f.as_ref().map(|_| FuncId(n)))
            .collect()
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.as_ref().is_some_and(|f| f.name == name))
            .map(FuncId)
    }

    pub fn main_function(&self) -> Option<FuncId> {
        self.find_function("main")
    }

    pub fn remove_function(&mut self, id: FuncId) -> Option<Function> {
        self.functions.get_mut(id.0).and_then(Option::take)
    }

    pub fn fresh_loop_id(&mut self) -> LoopId {
        self.next_loop_id += 1;
        LoopId(self.next_loop_id - 1)
    }

    /// Dereference of a whole variable, typed and precisioned from its declaration.
    pub fn var_ref(&self, id: VarId) -> Expr {
        let v = self.var(id);
        Expr {
            kind: ExprKind::Var(id),
            ty: v.ty.clone(),
            precision: v.precision,
        }
    }

    pub fn is_global(&self, id: VarId) -> bool {
        self.globals.contains(&id)
    }

    pub fn signatures(&self) -> Signatures {
        Signatures(
            self.functions
                .iter()
                .map(|f| match f {
                    Some(f) => f
                        .params
                        .iter()
                        .map(|&p| self.var(p).mode.is_out_param())
                        .collect(),
                    None => Vec::new(),
                })
                .collect(),
        )
    }

    /// Runs `f` on every function body in turn. The body is moved out of the
    /// function table for the duration of the call, so `f` gets the rest of
    /// the program mutably alongside it.
    pub fn for_each_body(&mut self, mut f: impl FnMut(&mut Program, FuncId, &mut Block) -> bool) -> bool {
        let mut modified = false;
        for id in self.function_ids() {
            let Some(mut body) = self.function_mut(id).and_then(|x| x.body.take()) else {
                continue;
            };
            modified |= f(self, id, &mut body);
            if let Some(func) = self.function_mut(id) {
                func.body = Some(body);
            }
        }

        modified
    }

    /// Mark-and-sweep over the variable arena: variables no longer declared
    /// or referenced anywhere are dropped and the remaining ids are relocated.
    /// Returns the number of removed variables.
    pub fn collect_garbage(&mut self) -> usize {
        let mut live = HashSet::new();
        live.extend(self.globals.iter().copied());
        for f in self.functions.iter().flatten() {
            live.extend(f.params.iter().copied());
            if let Some(b) = &f.body {
                visit::collect_block_vars(b, &mut live);
            }
        }

        let before = self.variables.len();
        let mut relocation = HashMap::new();
        let mut compacted = Vec::with_capacity(live.len());
        for (n, v) in core::mem::take(&mut self.variables).into_iter().enumerate() {
            if live.contains(&VarId(n)) {
                relocation.insert(VarId(n), VarId(compacted.len()));
                compacted.push(v);
            }
        }
        let removed = before - compacted.len();
        self.variables = compacted;

        for g in self.globals.iter_mut() {
            *g = relocation[g];
        }
        for f in self.functions.iter_mut().flatten() {
            for p in f.params.iter_mut() {
                *p = relocation[p];
            }
            if let Some(b) = &mut f.body {
                visit::remap_block_vars(b, &relocation);
            }
        }

        removed
    }
}
