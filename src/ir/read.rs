//! Reader for the s-expression text form produced by [`super::print`].

use std::{cell::RefCell, collections::HashMap};

use typed_arena::Arena;

use crate::{
    concrete_type::{BaseType, StructDef, StructField, Type},
    error::ReadError,
    ir::{
        Assignment, Block, Call, Constant, Expr, ExprKind, FuncId, Function, If, Loop,
        LoopControls, Operation, Program, Scalar, Stmt, Swizzle, TextureKind, TextureOp, VarId,
        Variable, VariableFlags, VariableMode,
    },
    precision::Precision,
    utils::{swizzle_index, Located},
};

#[derive(Debug)]
enum Sexp<'s> {
    Atom(&'s str),
    List(Vec<Node<'s>>),
}
type Node<'s> = Located<Sexp<'s>>;

fn parse(source: &str) -> Result<Vec<Node<'_>>, ReadError> {
    let mut stack: Vec<(usize, usize, Vec<Node>)> = Vec::new();
    let mut top = Vec::new();
    let (mut line, mut col) = (1, 1);
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let (l, cl) = (line, col);
        if c == '\n' {
            line += 1;
            col = 1;
            continue;
        }
        col += 1;

        let node = match c {
            ';' => {
                while chars.next_if(|&(_, c)| c != '\n').is_some() {}
                continue;
            }
            c if c.is_whitespace() => continue,
            '(' => {
                stack.push((l, cl, Vec::new()));
                continue;
            }
            ')' => {
                let (ol, oc, xs) = stack
                    .pop()
                    .ok_or(ReadError::Unbalanced { line: l, col: cl })?;
                Located {
                    t: Sexp::List(xs),
                    line: ol,
                    col: oc,
                }
            }
            _ => {
                let mut end = start + c.len_utf8();
                while let Some((n, c)) =
                    chars.next_if(|&(_, c)| !c.is_whitespace() && c != '(' && c != ')' && c != ';')
                {
                    end = n + c.len_utf8();
                    col += 1;
                }
                Located {
                    t: Sexp::Atom(&source[start..end]),
                    line: l,
                    col: cl,
                }
            }
        };

        match stack.last_mut() {
            Some((_, _, xs)) => xs.push(node),
            None => top.push(node),
        }
    }

    match stack.last() {
        Some(_) => Err(ReadError::UnexpectedEof { line, col }),
        None => Ok(top),
    }
}

fn malformed(node: &Node, message: impl Into<String>) -> ReadError {
    ReadError::Malformed {
        line: node.line,
        col: node.col,
        message: message.into(),
    }
}

fn atom<'s>(node: &Node<'s>) -> Result<&'s str, ReadError> {
    match node.t {
        Sexp::Atom(a) => Ok(a),
        Sexp::List(_) => Err(malformed(node, "expected an atom")),
    }
}

fn list<'n, 's>(node: &'n Node<'s>) -> Result<&'n [Node<'s>], ReadError> {
    match &node.t {
        Sexp::List(xs) => Ok(xs),
        Sexp::Atom(a) => Err(malformed(node, format!("expected a list, found `{a}`"))),
    }
}

/// `(head rest...)`
fn tagged<'n, 's>(node: &'n Node<'s>) -> Option<(&'s str, &'n [Node<'s>])> {
    match &node.t {
        Sexp::List(xs) => match xs.split_first() {
            Some((
                Located {
                    t: Sexp::Atom(h), ..
                },
                rest,
            )) => Some((*h, rest)),
            _ => None,
        },
        Sexp::Atom(_) => None,
    }
}

fn expect_tagged<'n, 's>(
    node: &'n Node<'s>,
    tag: &str,
) -> Result<&'n [Node<'s>], ReadError> {
    match tagged(node) {
        Some((h, rest)) if h == tag => Ok(rest),
        _ => Err(malformed(node, format!("expected `({tag} ...)`"))),
    }
}

/// Splits a trailing precision qualifier atom off a node's arguments.
fn split_precision<'n, 's>(args: &'n [Node<'s>]) -> (&'n [Node<'s>], Precision) {
    if let Some((
        Located {
            t: Sexp::Atom(a), ..
        },
        rest,
    )) = args.split_last()
    {
        if let Some(p) = Precision::from_qualifier(a) {
            return (rest, p);
        }
    }
    (args, Precision::Undefined)
}

struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    vars: RefCell<HashMap<String, VarId>>,
}
impl<'a> Scope<'a> {
    fn new(parent: Option<&'a Scope<'a>>) -> Self {
        Self {
            parent,
            vars: RefCell::new(HashMap::new()),
        }
    }

    fn lookup(&self, name: &str) -> Option<VarId> {
        match self.vars.borrow().get(name) {
            Some(&v) => Some(v),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }

    fn declare(&self, name: &str, v: VarId) {
        self.vars.borrow_mut().insert(name.to_owned(), v);
    }
}

struct Reader {
    program: Program,
}

/// Reads a whole program. Function signatures are registered before any body
/// is read, so calls may refer to functions defined later in the text.
pub fn read_program(source: &str) -> Result<Program, ReadError> {
    let nodes = parse(source)?;
    let mut reader = Reader {
        program: Program::new(),
    };
    let arena = Arena::new();
    let globals: &Scope = arena.alloc(Scope::new(None));

    let mut bodies = Vec::new();
    for n in &nodes {
        match tagged(n) {
            Some(("struct", args)) => reader.read_struct(n, args)?,
            Some(("declare", _)) => {
                let v = reader.read_declaration(n, globals)?;
                reader.program.globals.push(v);
            }
            Some(("function", args)) => {
                let (name, sigs) = args
                    .split_first()
                    .ok_or_else(|| malformed(n, "function without a name"))?;
                let name = atom(name)?;
                for s in sigs {
                    let sig_scope: &Scope = arena.alloc(Scope::new(Some(globals)));
                    let (id, body) = reader.read_signature(name, s, sig_scope)?;
                    if let Some(body) = body {
                        bodies.push((id, body, sig_scope));
                    }
                }
            }
            _ => return Err(malformed(n, "expected `struct`, `declare` or `function`")),
        }
    }

    for (id, body, scope) in bodies {
        let block = reader.read_block(body, scope, &arena)?;
        if let Some(f) = reader.program.function_mut(id) {
            f.body = Some(block);
        }
    }

    Ok(reader.program)
}

impl Reader {
    fn read_struct(&mut self, node: &Node, args: &[Node]) -> Result<(), ReadError> {
        let [name, fields] = args else {
            return Err(malformed(node, "expected `(struct Name (fields ...))`"));
        };
        let mut def = StructDef {
            name: atom(name)?.to_owned(),
            fields: Vec::new(),
        };
        for f in expect_tagged(fields, "fields")? {
            let (xs, precision) = split_precision_front(list(f)?);
            let [ty, name] = xs else {
                return Err(malformed(f, "expected `([precision] type name)`"));
            };
            def.fields.push(StructField {
                name: atom(name)?.to_owned(),
                ty: self.read_type(ty)?,
                precision,
            });
        }
        self.program.add_struct(def);

        Ok(())
    }

    fn read_type(&self, node: &Node) -> Result<Type, ReadError> {
        match &node.t {
            Sexp::Atom(name) => Type::from_name(name)
                .or_else(|| {
                    self.program
                        .structs
                        .iter()
                        .position(|s| s.name == *name)
                        .map(|n| Type::Struct(crate::ir::StructId(n)))
                })
                .ok_or_else(|| ReadError::UnknownType {
                    line: node.line,
                    col: node.col,
                    name: (*name).to_owned(),
                }),
            Sexp::List(_) => {
                let args = expect_tagged(node, "array")?;
                let [elem, len] = args else {
                    return Err(malformed(node, "expected `(array type length)`"));
                };
                let len = atom(len)?
                    .parse::<u32>()
                    .map_err(|_| malformed(len, "bad array length"))?;
                Ok(Type::array(self.read_type(elem)?, len))
            }
        }
    }

    fn read_declaration(&mut self, node: &Node, scope: &Scope) -> Result<VarId, ReadError> {
        let args = expect_tagged(node, "declare")?;
        let (quals, ty, name, init) = match args {
            [q, t, n] => (q, t, n, None),
            [q, t, n, c] => (q, t, n, Some(c)),
            _ => return Err(malformed(node, "expected `(declare (qualifiers) type name)`")),
        };

        let ty = self.read_type(ty)?;
        let display = atom(name)?;
        let mut var = Variable::new(
            display.split('@').next().unwrap_or(display),
            ty,
            VariableMode::Auto,
        );
        for q in list(quals)? {
            let q_name = atom(q)?;
            if let Some(m) = VariableMode::from_qualifier(q_name) {
                var.mode = m;
            } else if let Some(p) = Precision::from_qualifier(q_name) {
                var.precision = p;
            } else if let Some((f, _)) = VariableFlags::QUALIFIERS
                .iter()
                .find(|(_, n)| *n == q_name)
            {
                var.flags |= *f;
            } else {
                return Err(malformed(q, format!("unknown qualifier `{q_name}`")));
            }
        }
        if let Some(c) = init {
            var.constant_value = Some(self.read_constant(c)?.0);
        }

        let id = self.program.add_variable(var);
        scope.declare(display, id);
        Ok(id)
    }

    fn read_signature<'n, 's>(
        &mut self,
        name: &str,
        node: &'n Node<'s>,
        scope: &Scope,
    ) -> Result<(FuncId, Option<&'n [Node<'s>]>), ReadError> {
        let args = expect_tagged(node, "signature")?;
        let (ret, rest) = args
            .split_first()
            .ok_or_else(|| malformed(node, "signature without a return type"))?;
        let return_type = self.read_type(ret)?;
        let (return_precision, rest) = match rest.split_first() {
            Some((
                Located {
                    t: Sexp::Atom(a), ..
                },
                rest,
            )) if Precision::from_qualifier(a).is_some() => {
                (Precision::from_qualifier(a).unwrap_or_default(), rest)
            }
            _ => (Precision::Undefined, rest),
        };

        let mut params = Vec::new();
        let mut body = None;
        for n in rest {
            match tagged(n) {
                Some(("parameters", ps)) => {
                    for p in ps {
                        params.push(self.read_declaration(p, scope)?);
                    }
                }
                Some(("body", stmts)) => body = Some(stmts),
                _ => return Err(malformed(n, "expected `(parameters ...)` or `(body ...)`")),
            }
        }

        let id = self.program.add_function(Function {
            name: name.to_owned(),
            return_type,
            return_precision,
            params,
            body: None,
        });
        Ok((id, body))
    }

    fn read_block<'a>(
        &mut self,
        stmts: &[Node],
        parent: &'a Scope<'a>,
        arena: &'a Arena<Scope<'a>>,
    ) -> Result<Block, ReadError> {
        let scope: &'a Scope<'a> = arena.alloc(Scope::new(Some(parent)));
        let mut block = Vec::with_capacity(stmts.len());
        for s in stmts {
            block.push(self.read_stmt(s, scope, arena)?);
        }
        Ok(block)
    }

    fn read_stmt<'a>(
        &mut self,
        node: &Node,
        scope: &'a Scope<'a>,
        arena: &'a Arena<Scope<'a>>,
    ) -> Result<Stmt, ReadError> {
        let (tag, args) = tagged(node).ok_or_else(|| malformed(node, "expected a statement"))?;
        let stmt = match (tag, args) {
            ("declare", _) => Stmt::Declare(self.read_declaration(node, scope)?),
            ("assign", _) => {
                let (condition, mask, lhs, rhs) = match args {
                    [m, l, r] => (None, m, l, r),
                    [c, m, l, r] => (Some(self.read_expr(c, scope)?), m, l, r),
                    _ => return Err(malformed(node, "expected `(assign [cond] (mask) lhs rhs)`")),
                };
                let mut write_mask = 0u8;
                for m in list(mask)? {
                    for b in atom(m)?.bytes() {
                        let c = swizzle_index(b, 4).ok_or_else(|| malformed(m, "bad writemask"))?;
                        write_mask |= 1 << c;
                    }
                }
                Stmt::Assign(Assignment {
                    lhs: self.read_expr(lhs, scope)?,
                    rhs: self.read_expr(rhs, scope)?,
                    write_mask,
                    condition,
                })
            }
            ("call", [name, rest @ ..]) => {
                let (ret, call_args) = match rest {
                    [a] => (None, a),
                    [r, a] => (Some(self.read_expr(r, scope)?), a),
                    _ => return Err(malformed(node, "expected `(call name [ret] (args))`")),
                };
                let args = list(call_args)?
                    .iter()
                    .map(|a| self.read_expr(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                let name = atom(name)?;
                let callee = self.resolve_call(name, &args).ok_or_else(|| {
                    ReadError::UnknownFunction {
                        line: node.line,
                        col: node.col,
                        name: name.to_owned(),
                    }
                })?;
                Stmt::Call(Call {
                    callee,
                    args,
                    return_deref: ret,
                })
            }
            ("if", [c, t, e]) => Stmt::If(If {
                condition: self.read_expr(c, scope)?,
                then_block: self.read_block(list(t)?, scope, arena)?,
                else_block: self.read_block(list(e)?, scope, arena)?,
            }),
            ("loop", [body]) => Stmt::Loop(Loop {
                id: self.program.fresh_loop_id(),
                body: self.read_block(list(body)?, scope, arena)?,
                controls: None,
            }),
            ("loop", [controls, body]) => {
                let controls = self.read_controls(controls, scope)?;
                Stmt::Loop(Loop {
                    id: self.program.fresh_loop_id(),
                    body: self.read_block(list(body)?, scope, arena)?,
                    controls: Some(controls),
                })
            }
            ("break", []) => Stmt::Break,
            ("continue", []) => Stmt::Continue,
            ("return", []) => Stmt::Return(None),
            ("return", [v]) => Stmt::Return(Some(self.read_expr(v, scope)?)),
            ("discard", []) => Stmt::Discard(None),
            ("discard", [c]) => Stmt::Discard(Some(self.read_expr(c, scope)?)),
            _ => return Err(malformed(node, format!("malformed `{tag}` statement"))),
        };

        Ok(stmt)
    }

    fn resolve_call(&self, name: &str, args: &[Expr]) -> Option<FuncId> {
        let candidates = self
            .program
            .function_ids()
            .into_iter()
            .filter(|&id| {
                self.program
                    .function(id)
                    .is_some_and(|f| f.name == name && f.params.len() == args.len())
            })
            .collect::<Vec<_>>();
        candidates
            .iter()
            .copied()
            .find(|&id| {
                self.program.function(id).is_some_and(|f| {
                    f.params
                        .iter()
                        .zip(args)
                        .all(|(&p, a)| self.program.var(p).ty == a.ty)
                })
            })
            .or_else(|| candidates.first().copied())
    }

    fn read_controls(&mut self, node: &Node, scope: &Scope) -> Result<LoopControls, ReadError> {
        let args = expect_tagged(node, "controls")?;
        let (counter, rest) = args
            .split_first()
            .ok_or_else(|| malformed(node, "controls without a counter"))?;
        let counter = self.lookup(counter, scope)?;

        let (mut from, mut to, mut increment, mut cmp, mut iterations) = (None, None, None, None, None);
        for n in rest {
            match tagged(n) {
                Some(("from", [c])) => from = Some(self.read_constant(c)?.0),
                Some(("to", [c])) => to = Some(self.read_constant(c)?.0),
                Some(("increment", [c])) => increment = Some(self.read_constant(c)?.0),
                Some(("cmp", [o])) => {
                    cmp = Some(
                        Operation::from_name(atom(o)?)
                            .filter(|o| o.is_comparison())
                            .ok_or_else(|| malformed(o, "expected a comparison operator"))?,
                    )
                }
                Some(("iterations", [i])) => {
                    iterations = Some(
                        atom(i)?
                            .parse::<u32>()
                            .map_err(|_| malformed(i, "bad iteration count"))?,
                    )
                }
                _ => return Err(malformed(n, "unknown loop control")),
            }
        }

        let missing = |what: &str| malformed(node, format!("controls without `{what}`"));
        Ok(LoopControls {
            counter,
            from,
            to: to.ok_or_else(|| missing("to"))?,
            increment: increment.ok_or_else(|| missing("increment"))?,
            cmp: cmp.ok_or_else(|| missing("cmp"))?,
            iterations: iterations.ok_or_else(|| missing("iterations"))?,
        })
    }

    fn lookup(&self, node: &Node, scope: &Scope) -> Result<VarId, ReadError> {
        let name = atom(node)?;
        scope.lookup(name).ok_or_else(|| ReadError::UnknownVariable {
            line: node.line,
            col: node.col,
            name: name.to_owned(),
        })
    }

    fn read_constant(&self, node: &Node) -> Result<(Constant, Precision), ReadError> {
        let args = expect_tagged(node, "constant")?;
        let (args, precision) = split_precision(args);
        let (ty, values) = args
            .split_first()
            .ok_or_else(|| malformed(node, "constant without a type"))?;
        let ty = self.read_type(ty)?;

        let c = match ty.base_type() {
            Some(base) => {
                let [values] = values else {
                    return Err(malformed(node, "expected `(constant type (values))`"));
                };
                let xs = list(values)?
                    .iter()
                    .map(|v| read_scalar(v, base))
                    .collect::<Result<Vec<_>, _>>()?;
                if xs.len() != ty.components() {
                    return Err(malformed(node, "component count does not match the type"));
                }
                Constant::from_components(ty, xs)
            }
            None => Constant::aggregate(
                ty,
                values
                    .iter()
                    .map(|v| self.read_constant(v).map(|(c, _)| c))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok((c, precision))
    }

    fn read_expr(&mut self, node: &Node, scope: &Scope) -> Result<Expr, ReadError> {
        let (tag, args) = tagged(node).ok_or_else(|| malformed(node, "expected an expression"))?;
        if tag == "constant" {
            let (c, precision) = self.read_constant(node)?;
            return Ok(Expr {
                precision,
                ..Expr::constant(c)
            });
        }
        if tag == "expression" {
            return self.read_operation(node, args, scope);
        }

        let (args, precision) = split_precision(args);
        let mut e = match (tag, args) {
            ("var_ref", [name]) => self.program.var_ref(self.lookup(name, scope)?),
            ("array_ref", [a, i]) => {
                let (a, i) = (self.read_expr(a, scope)?, self.read_expr(i, scope)?);
                Expr::index(a, i).ok_or_else(|| malformed(node, "indexing a non-indexable value"))?
            }
            ("record_ref", [r, field]) => {
                let r = self.read_expr(r, scope)?;
                let Type::Struct(s) = r.ty else {
                    return Err(malformed(node, "field access on a non-struct"));
                };
                let def = self
                    .program
                    .structs
                    .get(s.0)
                    .ok_or_else(|| malformed(node, "unknown struct"))?;
                let name = atom(field)?;
                let index = def
                    .field_index(name)
                    .ok_or_else(|| malformed(field, format!("no field `{name}`")))?;
                let f = &def.fields[index];
                let (ty, p) = (f.ty.clone(), f.precision);
                Expr::field(r, index, ty, p)
            }
            ("swiz", [mask, value]) => {
                let value = self.read_expr(value, scope)?;
                let m = Swizzle::parse(atom(mask)?, value.ty.vector_elements())
                    .ok_or_else(|| malformed(mask, "bad swizzle mask"))?;
                Expr::swizzle(value, m).ok_or_else(|| malformed(node, "swizzle of a non-vector"))?
            }
            (t, [ty, sampler, coordinate, lod @ ..]) if TextureKind::from_name(t).is_some() => {
                let kind = TextureKind::from_name(t).unwrap_or(TextureKind::Tex);
                let lod = match lod {
                    [] => None,
                    [l] => Some(self.read_expr(l, scope)?),
                    _ => return Err(malformed(node, "too many texture operands")),
                };
                if kind.takes_lod() != lod.is_some() {
                    return Err(malformed(node, "lod operand mismatch"));
                }
                Expr {
                    ty: self.read_type(ty)?,
                    precision: Precision::Undefined,
                    kind: ExprKind::Texture(Box::new(TextureOp {
                        kind,
                        sampler: self.read_expr(sampler, scope)?,
                        coordinate: self.read_expr(coordinate, scope)?,
                        lod,
                    })),
                }
            }
            _ => return Err(malformed(node, format!("malformed `{tag}` expression"))),
        };
        e.precision = precision;

        Ok(e)
    }

    fn read_operation(&mut self, node: &Node, args: &[Node], scope: &Scope) -> Result<Expr, ReadError> {
        let (ty, rest) = args
            .split_first()
            .ok_or_else(|| malformed(node, "expression without a type"))?;
        let ty = self.read_type(ty)?;
        let (precision, rest) = match rest.split_first() {
            Some((
                Located {
                    t: Sexp::Atom(a), ..
                },
                r,
            )) if Precision::from_qualifier(a).is_some() => {
                (Precision::from_qualifier(a).unwrap_or_default(), r)
            }
            _ => (Precision::Undefined, rest),
        };
        let (op, operands) = rest
            .split_first()
            .ok_or_else(|| malformed(node, "expression without an operator"))?;
        let op_name = atom(op)?;
        let op = Operation::from_name(op_name)
            .ok_or_else(|| malformed(op, format!("unknown operator `{op_name}`")))?;
        let operands = operands
            .iter()
            .map(|o| self.read_expr(o, scope))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Expr {
            kind: ExprKind::Operation(op, operands),
            ty,
            precision,
        })
    }
}

/// `([precision] rest...)`
fn split_precision_front<'n, 's>(args: &'n [Node<'s>]) -> (&'n [Node<'s>], Precision) {
    if let Some((
        Located {
            t: Sexp::Atom(a), ..
        },
        rest,
    )) = args.split_first()
    {
        if let Some(p) = Precision::from_qualifier(a) {
            return (rest, p);
        }
    }
    (args, Precision::Undefined)
}

fn read_scalar(node: &Node, base: BaseType) -> Result<Scalar, ReadError> {
    let s = atom(node)?;
    let bad = || malformed(node, format!("bad {} literal `{s}`", base.scalar_name()));
    Ok(match base {
        BaseType::Bool => match s {
            "true" | "1" => Scalar::Bool(true),
            "false" | "0" => Scalar::Bool(false),
            _ => return Err(bad()),
        },
        BaseType::Int => Scalar::Int(s.parse().map_err(|_| bad())?),
        BaseType::UInt => Scalar::UInt(s.parse().map_err(|_| bad())?),
        BaseType::Float => Scalar::Float(s.parse().map_err(|_| bad())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::print::print_program;

    const SOURCE: &str = r#"
; comment
(struct Light (fields (highp vec3 dir) (float power)))
(declare (uniform highp) vec4 color)
(declare (uniform) Light light)
(declare (out) vec4 frag)
(function scale
  (signature float
    (parameters (declare (param_in) float x))
    (body (return (expression float * (var_ref x) (constant float (2.0)))))))
(function main
  (signature void
    (parameters)
    (body
      (declare () float t)
      (declare (temporary) float t@2)
      (call scale (var_ref t) ((record_ref (var_ref light) power)))
      (assign (x) (var_ref t@2) (swiz x (var_ref color)))
      (loop
        ((if (expression bool >= (var_ref t) (constant float (1.0))) ((break)) ())
         (assign (x) (var_ref t) (expression float + (var_ref t) (var_ref t@2)))))
      (assign (xyzw) (var_ref frag) (expression vec4 mediump * (var_ref color) (var_ref t))))))
"#;

    #[test]
    fn reads_every_construct() {
        let p = read_program(SOURCE).unwrap();
        assert_eq!(p.structs.len(), 1);
        assert_eq!(p.globals.len(), 3);
        let main = p.function(p.main_function().unwrap()).unwrap();
        let body = main.body.as_ref().unwrap();
        assert_eq!(body.len(), 6);
        assert!(matches!(&body[2], Stmt::Call(c) if c.return_deref.is_some()));
        assert!(matches!(&body[4], Stmt::Loop(l) if l.body.len() == 2));
        assert_eq!(p.var(VarId(0)).precision, Precision::High);
    }

    #[test]
    fn print_read_print_is_stable() {
        let p = read_program(SOURCE).unwrap();
        let text = print_program(&p);
        let again = read_program(&text).unwrap();
        assert_eq!(print_program(&again), text);
        assert_eq!(again, p);
    }

    #[test]
    fn reports_positions() {
        let err = read_program("(function main\n  (signature void (parameters) (body (assign (x) (var_ref nope) (constant float (1.0))))))").unwrap_err();
        assert!(matches!(err, ReadError::UnknownVariable { line: 2, ref name, .. } if name == "nope"));
        assert!(matches!(read_program("(declare"), Err(ReadError::UnexpectedEof { .. })));
        assert!(matches!(read_program(")"), Err(ReadError::Unbalanced { .. })));
    }
}
