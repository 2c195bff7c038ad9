//! S-expression text form of the IR.

use std::{collections::HashMap, fmt::Write};

use crate::{
    concrete_type::Type,
    ir::{
        visit, Block, Constant, ConstantData, Expr, ExprKind, Function, LoopControls, Program,
        Scalar, Stmt, VarId, VariableFlags, VariableMode,
    },
    precision::Precision,
    utils::{swizzle_char, writemask_components},
};

pub fn print_program(program: &Program) -> String {
    let mut p = Printer::new(program);
    for s in &program.structs {
        p.out.push_str(&format!("(struct {}\n  (fields", s.name));
        for f in &s.fields {
            p.out.push_str(" (");
            if let Some(q) = f.precision.qualifier() {
                p.out.push_str(q);
                p.out.push(' ');
            }
            p.out.push_str(&p.type_name(&f.ty));
            p.out.push(' ');
            p.out.push_str(&f.name);
            p.out.push(')');
        }
        p.out.push_str("))\n");
    }
    for &g in &program.globals {
        p.declaration(g);
        p.out.push('\n');
    }
    for f in program.functions.iter().flatten() {
        p.function(f);
    }

    p.out
}

/// Single-line rendering of an expression (used in logs).
pub fn print_expr(program: &Program, expr: &Expr) -> String {
    let mut p = Printer::new(program);
    p.expr(expr);
    p.out
}

pub(super) fn type_name(program: &Program, ty: &Type) -> String {
    match ty {
        Type::Array(e, n) => format!("(array {} {n})", type_name(program, e)),
        t => t.display_name(&program.structs),
    }
}

pub(super) fn qualifier_list(mode: VariableMode, flags: VariableFlags, precision: Precision) -> String {
    let mut xs = Vec::new();
    if mode != VariableMode::Auto {
        xs.push(mode.qualifier());
    }
    for (f, name) in VariableFlags::QUALIFIERS {
        if flags.contains(f) {
            xs.push(name);
        }
    }
    if let Some(p) = precision.qualifier() {
        xs.push(p);
    }

    format!("({})", xs.join(" "))
}

struct Printer<'p> {
    program: &'p Program,
    names: HashMap<VarId, String>,
    out: String,
    indent: usize,
}
impl<'p> Printer<'p> {
    fn new(program: &'p Program) -> Self {
        Self {
            program,
            names: unique_names(program),
            out: String::new(),
            indent: 0,
        }
    }

    fn name(&self, v: VarId) -> String {
        self.names.get(&v).cloned().unwrap_or_else(|| {
            format!("{}@v{}", self.program.variables.get(v.0).map_or("?", |x| &x.name), v.0)
        })
    }

    fn type_name(&self, ty: &Type) -> String {
        type_name(self.program, ty)
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn declaration(&mut self, v: VarId) {
        let var = self.program.var(v);
        let _ = write!(
            self.out,
            "(declare {} {} {}",
            qualifier_list(var.mode, var.flags, var.precision),
            self.type_name(&var.ty),
            self.name(v)
        );
        if let Some(c) = &var.constant_value {
            self.out.push(' ');
            self.constant(c, Precision::Undefined);
        }
        self.out.push(')');
    }

    fn function(&mut self, f: &Function) {
        let _ = write!(self.out, "(function {}", f.name);
        self.indent += 1;
        self.newline();
        let _ = write!(self.out, "(signature {}", self.type_name(&f.return_type));
        if let Some(q) = f.return_precision.qualifier() {
            let _ = write!(self.out, " {q}");
        }
        self.indent += 1;
        self.newline();
        self.out.push_str("(parameters");
        self.indent += 1;
        for &p in &f.params {
            self.newline();
            self.declaration(p);
        }
        self.indent -= 1;
        self.out.push(')');
        if let Some(body) = &f.body {
            self.newline();
            self.out.push_str("(body");
            self.block_contents(body);
            self.out.push(')');
        }
        self.indent -= 2;
        self.out.push_str("))\n");
    }

    fn block_contents(&mut self, block: &Block) {
        self.indent += 1;
        for s in block {
            self.newline();
            self.stmt(s);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Declare(v) => self.declaration(*v),
            Stmt::Assign(a) => {
                self.out.push_str("(assign ");
                if let Some(c) = &a.condition {
                    self.expr(c);
                    self.out.push(' ');
                }
                self.out.push('(');
                self.out
                    .extend(writemask_components(a.write_mask).map(swizzle_char));
                self.out.push_str(") ");
                self.expr(&a.lhs);
                self.out.push(' ');
                self.expr(&a.rhs);
                self.out.push(')');
            }
            Stmt::Call(c) => {
                let name = self
                    .program
                    .function(c.callee)
                    .map_or_else(|| format!("{:?}", c.callee), |f| f.name.clone());
                let _ = write!(self.out, "(call {name}");
                if let Some(r) = &c.return_deref {
                    self.out.push(' ');
                    self.expr(r);
                }
                self.out.push_str(" (");
                for (n, a) in c.args.iter().enumerate() {
                    if n > 0 {
                        self.out.push(' ');
                    }
                    self.expr(a);
                }
                self.out.push_str("))");
            }
            Stmt::If(i) => {
                self.out.push_str("(if ");
                self.expr(&i.condition);
                self.indent += 1;
                self.newline();
                self.out.push('(');
                self.block_contents(&i.then_block);
                self.out.push(')');
                self.newline();
                self.out.push('(');
                self.block_contents(&i.else_block);
                self.out.push_str("))");
                self.indent -= 1;
            }
            Stmt::Loop(l) => {
                self.out.push_str("(loop");
                self.indent += 1;
                if let Some(c) = &l.controls {
                    self.newline();
                    self.controls(c);
                }
                self.newline();
                self.out.push('(');
                self.block_contents(&l.body);
                self.out.push_str("))");
                self.indent -= 1;
            }
            Stmt::Break => self.out.push_str("(break)"),
            Stmt::Continue => self.out.push_str("(continue)"),
            Stmt::Return(None) => self.out.push_str("(return)"),
            Stmt::Return(Some(e)) => {
                self.out.push_str("(return ");
                self.expr(e);
                self.out.push(')');
            }
            Stmt::Discard(None) => self.out.push_str("(discard)"),
            Stmt::Discard(Some(c)) => {
                self.out.push_str("(discard ");
                self.expr(c);
                self.out.push(')');
            }
        }
    }

    fn controls(&mut self, c: &LoopControls) {
        let _ = write!(self.out, "(controls {}", self.name(c.counter));
        if let Some(from) = &c.from {
            self.out.push_str(" (from ");
            self.constant(from, Precision::Undefined);
            self.out.push(')');
        }
        self.out.push_str(" (to ");
        self.constant(&c.to, Precision::Undefined);
        self.out.push_str(") (increment ");
        self.constant(&c.increment, Precision::Undefined);
        let _ = write!(
            self.out,
            ") (cmp {}) (iterations {}))",
            c.cmp.name(),
            c.iterations
        );
    }

    fn precision_suffix(&mut self, p: Precision) {
        if let Some(q) = p.qualifier() {
            self.out.push(' ');
            self.out.push_str(q);
        }
    }

    fn constant(&mut self, c: &Constant, precision: Precision) {
        let _ = write!(self.out, "(constant {} ", self.type_name(&c.ty));
        match &c.data {
            ConstantData::Components(xs) => {
                self.out.push('(');
                for (n, x) in xs.iter().enumerate() {
                    if n > 0 {
                        self.out.push(' ');
                    }
                    let _ = match x {
                        Scalar::Bool(b) => write!(self.out, "{b}"),
                        Scalar::Int(i) => write!(self.out, "{i}"),
                        Scalar::UInt(u) => write!(self.out, "{u}"),
                        Scalar::Float(f) => write!(self.out, "{f:?}"),
                    };
                }
                self.out.push(')');
            }
            ConstantData::Aggregate(xs) => {
                for (n, x) in xs.iter().enumerate() {
                    if n > 0 {
                        self.out.push(' ');
                    }
                    self.constant(x, Precision::Undefined);
                }
            }
        }
        self.precision_suffix(precision);
        self.out.push(')');
    }

    fn expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::Var(v) => {
                let _ = write!(self.out, "(var_ref {}", self.name(*v));
            }
            ExprKind::Index { array, index } => {
                self.out.push_str("(array_ref ");
                self.expr(array);
                self.out.push(' ');
                self.expr(index);
            }
            ExprKind::Field { record, field } => {
                self.out.push_str("(record_ref ");
                self.expr(record);
                let name = match &record.ty {
                    Type::Struct(s) => self
                        .program
                        .structs
                        .get(s.0)
                        .and_then(|s| s.fields.get(*field))
                        .map(|f| f.name.clone()),
                    _ => None,
                };
                let _ = write!(self.out, " {}", name.unwrap_or_else(|| field.to_string()));
            }
            ExprKind::Constant(c) => return self.constant(c, e.precision),
            ExprKind::Swizzle { value, mask } => {
                let _ = write!(self.out, "(swiz {} ", mask.mask_string());
                self.expr(value);
            }
            ExprKind::Operation(op, operands) => {
                let _ = write!(self.out, "(expression {}", self.type_name(&e.ty));
                self.precision_suffix(e.precision);
                let _ = write!(self.out, " {}", op.name());
                for o in operands {
                    self.out.push(' ');
                    self.expr(o);
                }
                return self.out.push(')');
            }
            ExprKind::Texture(t) => {
                let _ = write!(self.out, "({} {} ", t.kind.name(), self.type_name(&e.ty));
                self.expr(&t.sampler);
                self.out.push(' ');
                self.expr(&t.coordinate);
                if let Some(l) = &t.lod {
                    self.out.push(' ');
                    self.expr(l);
                }
            }
        }
        self.precision_suffix(e.precision);
        self.out.push(')');
    }
}

/// Display names, unique across the program. Duplicates get an `@n` suffix
/// numbered in printing order, so printing a re-read program reproduces them.
fn unique_names(program: &Program) -> HashMap<VarId, String> {
    let mut order = Vec::new();
    order.extend(program.globals.iter().copied());
    for f in program.functions.iter().flatten() {
        order.extend(f.params.iter().copied());
        if let Some(b) = &f.body {
            visit::walk(b, &mut |s| {
                if let Stmt::Declare(v) = s {
                    order.push(*v);
                }
            });
        }
    }

    let mut counts = HashMap::<&str, usize>::new();
    for &v in &order {
        *counts.entry(program.var(v).name.as_str()).or_default() += 1;
    }
    let mut seen = HashMap::<&str, usize>::new();
    let mut names = HashMap::new();
    for v in order {
        if names.contains_key(&v) {
            continue;
        }
        let base = program.var(v).name.as_str();
        let name = if counts.get(base).copied().unwrap_or(0) > 1 || base.is_empty() {
            let n = seen.entry(base).or_default();
            *n += 1;
            format!("{base}@{n}")
        } else {
            base.to_owned()
        };
        names.insert(v, name);
    }

    names
}
