use indexmap::IndexMap;

use crate::{
    concrete_type::{BaseType, Type},
    const_expr::evaluate_operation,
    ir::{
        visit, Assignment, Constant, Expr, ExprKind, Loop, LoopId, Operation, Program, Scalar,
        Signatures, Stmt, VarId,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum Induction {
    /// `v = v + increment` (or `v - increment`, stored negated).
    Basic { increment: Expr },
    /// `v = scale * basic + offset`, computed from a basic induction variable.
    Derived {
        basic: VarId,
        scale: Constant,
        offset: Option<Constant>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableClass {
    General,
    /// Holds the same value in every iteration.
    Constant,
    Induction(Induction),
}

#[derive(Debug, Clone)]
pub struct LoopVariable {
    pub var: VarId,
    pub assignments: usize,
    /// Some iteration may read the value of the previous one.
    pub read_before_write: bool,
    /// Written under an `if`, a condition, a nested loop, or only in part.
    pub conditional_assignment: bool,
    /// The single assignment reads only loop constants.
    pub rhs_clean: bool,
    pub class: VariableClass,
    first_assignment: Option<Assignment>,
}
impl LoopVariable {
    fn new(var: VarId, read_before_write: bool) -> Self {
        Self {
            var,
            assignments: 0,
            read_before_write,
            conditional_assignment: false,
            rhs_clean: false,
            class: VariableClass::General,
            first_assignment: None,
        }
    }

    fn is_loop_constant(&self) -> bool {
        self.assignments == 0
            || (self.assignments == 1
                && !self.conditional_assignment
                && !self.read_before_write
                && self.rhs_clean)
    }

    /// Per-iteration step of a basic induction variable, when constant.
    pub fn constant_increment(&self) -> Option<&Constant> {
        match &self.class {
            VariableClass::Induction(Induction::Basic { increment }) => increment.as_constant(),
            _ => None,
        }
    }
}

/// Exit test derived from a terminator: starting at `from` and stepping by
/// `increment`, `counter cmp to` first holds after `iterations` iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBound {
    pub counter: VarId,
    pub from: Constant,
    pub to: Constant,
    pub increment: Constant,
    pub cmp: Operation,
    pub iterations: u32,
}

/// Leading `if (cond) break;` of a loop body.
#[derive(Debug, Clone)]
pub struct Terminator {
    /// Position in the loop body.
    pub index: usize,
    pub break_condition: Expr,
    /// Holds while the loop keeps running.
    pub guard: Option<Expr>,
    pub bound: Option<LoopBound>,
}

#[derive(Debug, Clone, Default)]
pub struct LoopVariableState {
    pub variables: IndexMap<VarId, LoopVariable>,
    pub terminators: Vec<Terminator>,
    /// `break`/`continue` statements that leave this loop, terminators included.
    pub jumps: usize,
    pub contains_calls: bool,
    pub nested_loops: bool,
    pub max_iterations: Option<u32>,
    /// Index into `terminators` of the one giving `max_iterations`.
    pub limiting_terminator: Option<usize>,
}
impl LoopVariableState {
    pub fn class(&self, v: VarId) -> Option<&VariableClass> {
        self.variables.get(&v).map(|lv| &lv.class)
    }

    pub fn basic_induction_variables(&self) -> impl Iterator<Item = &LoopVariable> {
        self.variables
            .values()
            .filter(|lv| matches!(lv.class, VariableClass::Induction(Induction::Basic { .. })))
    }

    pub fn limiting(&self) -> Option<&Terminator> {
        self.terminators.get(self.limiting_terminator?)
    }
}

/// Per-loop analysis results of one program.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    loops: IndexMap<LoopId, LoopVariableState>,
}
impl LoopState {
    pub fn get(&self, id: LoopId) -> Option<&LoopVariableState> {
        self.loops.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LoopId, &LoopVariableState)> {
        self.loops.iter().map(|(&id, ls)| (id, ls))
    }
}

pub fn analyze_loops(program: &Program) -> LoopState {
    let sigs = program.signatures();
    let mut state = LoopState::default();
    for f in program.functions.iter().flatten() {
        if let Some(body) = &f.body {
            analyze_block(&sigs, body, &mut state);
        }
    }

    if !state.is_empty() {
        tracing::debug!("[LoopAnalysis] analyzed {} loops", state.len());
    }
    state
}

fn analyze_block(sigs: &Signatures, block: &[Stmt], state: &mut LoopState) {
    for (n, s) in block.iter().enumerate() {
        if let Stmt::Loop(l) = s {
            let ls = analyze_loop(sigs, &block[..n], l);
            tracing::trace!(
                "[LoopAnalysis] {:?}: {} variables, {} terminators, max iterations {:?}",
                l.id,
                ls.variables.len(),
                ls.terminators.len(),
                ls.max_iterations
            );
            state.loops.insert(l.id, ls);
        }
        for b in visit::child_blocks(s) {
            analyze_block(sigs, b, state);
        }
    }
}

struct Recorder<'a> {
    sigs: &'a Signatures,
    state: LoopVariableState,
    conditional_depth: usize,
    loop_depth: usize,
}
impl Recorder<'_> {
    fn read(&mut self, e: &Expr) {
        let variables = &mut self.state.variables;
        e.visit(&mut |x| {
            if let ExprKind::Var(v) = x.kind {
                variables.entry(v).or_insert_with(|| LoopVariable::new(v, true));
            }
        });
    }

    fn write(&mut self, v: VarId, assignment: Option<&Assignment>) {
        let conditional = self.conditional_depth > 0
            || assignment.map_or(true, |a| a.whole_variable_written() != Some(v));
        let lv = self
            .state
            .variables
            .entry(v)
            .or_insert_with(|| LoopVariable::new(v, false));
        lv.conditional_assignment |= conditional;
        if lv.assignments == 0 {
            lv.first_assignment = assignment.cloned();
        }
        lv.assignments += 1;
    }

    fn block(&mut self, block: &[Stmt]) {
        for s in block {
            match s {
                Stmt::Declare(_) => (),
                Stmt::Assign(a) => {
                    if let Some(c) = &a.condition {
                        self.read(c);
                    }
                    self.read(&a.rhs);
                    visit::for_each_lvalue_index(&a.lhs, &mut |i| self.read(i));
                    if let Some(v) = a.lhs.variable_referenced() {
                        self.write(v, Some(a));
                    }
                }
                Stmt::Call(c) => {
                    self.state.contains_calls = true;
                    for (n, arg) in c.args.iter().enumerate() {
                        if self.sigs.is_out_param(c.callee, n) {
                            visit::for_each_lvalue_index(arg, &mut |i| self.read(i));
                            if let Some(v) = arg.variable_referenced() {
                                self.write(v, None);
                            }
                        } else {
                            self.read(arg);
                        }
                    }
                    if let Some(v) = c.return_deref.as_ref().and_then(Expr::variable_referenced) {
                        self.write(v, None);
                    }
                }
                Stmt::If(i) => {
                    self.read(&i.condition);
                    self.conditional_depth += 1;
                    self.block(&i.then_block);
                    self.block(&i.else_block);
                    self.conditional_depth -= 1;
                }
                Stmt::Loop(l) => {
                    self.state.nested_loops = true;
                    self.conditional_depth += 1;
                    self.loop_depth += 1;
                    if let Some(c) = &l.controls {
                        self.write(c.counter, None);
                    }
                    self.block(&l.body);
                    self.loop_depth -= 1;
                    self.conditional_depth -= 1;
                }
                Stmt::Break | Stmt::Continue => {
                    if self.loop_depth == 0 {
                        self.state.jumps += 1;
                    }
                }
                Stmt::Return(Some(e)) | Stmt::Discard(Some(e)) => self.read(e),
                Stmt::Return(None) | Stmt::Discard(None) => (),
            }
        }
    }
}

fn analyze_loop(sigs: &Signatures, preceding: &[Stmt], l: &Loop) -> LoopVariableState {
    let mut recorder = Recorder {
        sigs,
        state: LoopVariableState::default(),
        conditional_depth: 0,
        loop_depth: 0,
    };
    recorder.block(&l.body);
    let mut ls = recorder.state;

    ls.max_iterations = l.controls.as_ref().map(|c| c.iterations);
    if ls.contains_calls {
        // A call may write anything; no classification holds.
        return ls;
    }

    ls.terminators = find_terminators(&l.body);
    classify(&mut ls);
    for n in 0..ls.terminators.len() {
        let bound = terminator_bound(&ls, &ls.terminators[n].break_condition, preceding);
        if let Some(b) = &bound {
            if ls.max_iterations.map_or(true, |m| b.iterations < m) {
                ls.max_iterations = Some(b.iterations);
                ls.limiting_terminator = Some(n);
            }
        }
        ls.terminators[n].bound = bound;
    }
    ls
}

fn find_terminators(body: &[Stmt]) -> Vec<Terminator> {
    let mut terminators = Vec::new();
    for (index, s) in body.iter().enumerate() {
        match s {
            Stmt::Declare(_) => (),
            Stmt::If(i) if i.else_block.is_empty() && matches!(i.then_block.first(), Some(Stmt::Break)) => {
                terminators.push(Terminator {
                    index,
                    break_condition: i.condition.clone(),
                    guard: negated(&i.condition),
                    bound: None,
                });
            }
            _ => break,
        }
    }
    terminators
}

fn negated(condition: &Expr) -> Option<Expr> {
    match condition.as_operation() {
        Some((Operation::LogicNot, [x])) => Some(x.clone()),
        Some((op, xs)) if op.is_comparison() && condition.ty.is_scalar() => {
            Expr::op(op.negated_comparison()?, xs.to_vec())
        }
        _ => Expr::op(Operation::LogicNot, vec![condition.clone()]),
    }
}

fn reads_only_constants(e: &Expr, variables: &IndexMap<VarId, LoopVariable>) -> bool {
    !e.any(&mut |x| match &x.kind {
        ExprKind::Var(v) => variables.get(v).map_or(true, |lv| lv.class != VariableClass::Constant),
        ExprKind::Operation(op, _) => op.is_nondeterministic(),
        _ => false,
    })
}

fn classify(ls: &mut LoopVariableState) {
    for lv in ls.variables.values_mut() {
        if lv.is_loop_constant() {
            lv.class = VariableClass::Constant;
        }
    }

    // A variable whose single assignment reads only loop constants is itself
    // one; each new constant may qualify further variables.
    loop {
        let mut progress = false;
        for n in 0..ls.variables.len() {
            let clean = {
                let lv = &ls.variables[n];
                lv.class != VariableClass::Constant
                    && lv.assignments == 1
                    && !lv.conditional_assignment
                    && lv
                        .first_assignment
                        .as_ref()
                        .is_some_and(|a| reads_only_constants(&a.rhs, &ls.variables))
            };
            if clean {
                let lv = &mut ls.variables[n];
                lv.rhs_clean = true;
                if lv.is_loop_constant() {
                    lv.class = VariableClass::Constant;
                    progress = true;
                }
            }
        }
        if !progress {
            break;
        }
    }

    for n in 0..ls.variables.len() {
        let lv = &ls.variables[n];
        if lv.class != VariableClass::General || lv.assignments != 1 || lv.conditional_assignment {
            continue;
        }
        let Some(a) = &lv.first_assignment else {
            continue;
        };
        if let Some(increment) = basic_increment(lv.var, &a.rhs, &ls.variables) {
            ls.variables[n].class = VariableClass::Induction(Induction::Basic { increment });
        }
    }

    for n in 0..ls.variables.len() {
        let lv = &ls.variables[n];
        if lv.class != VariableClass::General
            || lv.assignments != 1
            || lv.conditional_assignment
            || lv.read_before_write
        {
            continue;
        }
        let Some(a) = &lv.first_assignment else {
            continue;
        };
        if let Some(derived) = derived_induction(&a.rhs, &ls.variables) {
            ls.variables[n].class = VariableClass::Induction(derived);
        }
    }
}

/// Step of `v = v + inc` / `v = inc + v` / `v = v - inc` with a loop-constant
/// `inc`.
fn basic_increment(v: VarId, rhs: &Expr, variables: &IndexMap<VarId, LoopVariable>) -> Option<Expr> {
    let (op, [a, b]) = rhs.as_operation()? else {
        return None;
    };
    let inc = match op {
        Operation::Add if a.whole_variable_referenced() == Some(v) => b,
        Operation::Add if b.whole_variable_referenced() == Some(v) => a,
        Operation::Sub if a.whole_variable_referenced() == Some(v) => b,
        _ => return None,
    };
    if inc.ty != rhs.ty || !inc.ty.is_scalar() {
        return None;
    }
    let constant_var = inc
        .whole_variable_referenced()
        .and_then(|w| variables.get(&w))
        .is_some_and(|lv| lv.class == VariableClass::Constant);
    if !inc.is_constant() && !constant_var {
        return None;
    }

    if op != Operation::Sub {
        return Some(inc.clone());
    }
    match inc.as_constant() {
        Some(c) => evaluate_operation(Operation::Neg, &c.ty, &[c.clone()]).map(Expr::constant),
        None => Expr::op(Operation::Neg, vec![inc.clone()]),
    }
}

/// `(basic, scale)` of `basic * scale`, `scale * basic` or a bare `basic`.
fn scaled_basic(e: &Expr, variables: &IndexMap<VarId, LoopVariable>) -> Option<(VarId, Constant)> {
    let is_basic = |x: &Expr| {
        x.whole_variable_referenced().filter(|w| {
            variables
                .get(w)
                .is_some_and(|lv| matches!(lv.class, VariableClass::Induction(Induction::Basic { .. })))
        })
    };
    if let Some(b) = is_basic(e) {
        return Some((b, Constant::splat(e.ty.clone(), Scalar::one(e.ty.base_type()?))?));
    }
    match e.as_operation()? {
        (Operation::Mul, [x, c]) | (Operation::Mul, [c, x]) if c.is_constant() && x.ty == e.ty => {
            Some((is_basic(x)?, c.as_constant()?.clone()))
        }
        _ => None,
    }
}

fn derived_induction(rhs: &Expr, variables: &IndexMap<VarId, LoopVariable>) -> Option<Induction> {
    if !rhs.ty.is_scalar() {
        return None;
    }
    if let Some((basic, scale)) = scaled_basic(rhs, variables) {
        return Some(Induction::Derived {
            basic,
            scale,
            offset: None,
        });
    }
    match rhs.as_operation()? {
        (Operation::Add, [x, d]) | (Operation::Add, [d, x]) if d.is_constant() => {
            let (basic, scale) = scaled_basic(x, variables)?;
            Some(Induction::Derived {
                basic,
                scale,
                offset: d.as_constant().cloned(),
            })
        }
        _ => None,
    }
}

/// Value the loop starts with: the unconditional constant assignment to `v`
/// right before the loop, with nothing that could write `v` in between.
fn find_initial_value(preceding: &[Stmt], v: VarId) -> Option<Constant> {
    for s in preceding.iter().rev() {
        match s {
            Stmt::Call(_)
            | Stmt::Loop(_)
            | Stmt::If(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::Return(_) => return None,
            Stmt::Assign(a) if a.lhs.variable_referenced() == Some(v) => {
                if a.whole_variable_written() != Some(v) {
                    return None;
                }
                return a.rhs.as_constant().cloned();
            }
            Stmt::Declare(_) | Stmt::Assign(_) | Stmt::Discard(_) => (),
        }
    }
    None
}

fn terminator_bound(ls: &LoopVariableState, condition: &Expr, preceding: &[Stmt]) -> Option<LoopBound> {
    let (op, operands) = match condition.as_operation()? {
        (Operation::LogicNot, [inner]) => {
            let (op, xs) = inner.as_operation()?;
            (op.negated_comparison()?, xs)
        }
        other => other,
    };
    if !matches!(
        op,
        Operation::Less | Operation::Greater | Operation::LessEqual | Operation::GreaterEqual
    ) {
        return None;
    }
    let [a, b] = operands else {
        return None;
    };
    let (counter, limit, cmp) = match (a.as_constant(), b.as_constant()) {
        (None, Some(limit)) => (a, limit, op),
        (Some(limit), None) => (b, limit, op.swapped_comparison()?),
        _ => return None,
    };

    let counter = counter.whole_variable_referenced()?;
    let increment = ls.variables.get(&counter)?.constant_increment()?.clone();
    let from = find_initial_value(preceding, counter)?;
    let iterations = calculate_iterations(&from, limit, &increment, cmp)?;
    Some(LoopBound {
        counter,
        from,
        to: limit.clone(),
        increment,
        cmp,
        iterations,
    })
}

fn count_constant(base: BaseType, n: i64) -> Option<Constant> {
    match base {
        BaseType::Int => Some(Constant::int(i32::try_from(n).ok()?)),
        BaseType::UInt => Some(Constant::uint(u32::try_from(n).ok()?)),
        BaseType::Float => Some(Constant::float(n as f32)),
        BaseType::Bool => None,
    }
}

/// Iterations a loop runs when its counter starts at `from`, steps by
/// `increment`, and the loop is left as soon as `counter cmp to` holds.
pub fn calculate_iterations(from: &Constant, to: &Constant, increment: &Constant, cmp: Operation) -> Option<u32> {
    let ty = from.ty.clone();
    if !ty.is_scalar() || to.ty != ty || increment.ty != ty || increment.is_zero() {
        return None;
    }
    let base = ty.base_type()?;
    let exits = |n: i64| -> Option<bool> {
        let step = evaluate_operation(Operation::Mul, &ty, &[count_constant(base, n)?, increment.clone()])?;
        let value = evaluate_operation(Operation::Add, &ty, &[step, from.clone()])?;
        evaluate_operation(cmp, &Type::BOOL, &[value, to.clone()])?.as_bool()
    };
    if exits(0)? {
        return Some(0);
    }

    let span = evaluate_operation(Operation::Sub, &ty, &[to.clone(), from.clone()])?;
    let quotient = evaluate_operation(Operation::Div, &ty, &[span, increment.clone()])?;
    let estimate = match quotient.as_scalar()? {
        Scalar::Float(f) if f.is_finite() => f.trunc() as i64,
        Scalar::Float(_) | Scalar::Bool(_) => return None,
        _ => quotient.as_index()?,
    };

    // The division can be off by one for inexact steps; the exit test decides.
    for bias in [-1, 0, 1] {
        let n = estimate + bias;
        if n >= 1 && exits(n)? && !exits(n - 1)? {
            return u32::try_from(n).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::read::read_program;

    fn analyze(body: &str) -> (Program, LoopState) {
        let p = read_program(&format!(
            "(declare (uniform) float u)
             (declare (out) (array int 4) a)
             (declare (out) float o)
             (function main (signature void (parameters) (body {body})))"
        ))
        .unwrap();
        let state = analyze_loops(&p);
        (p, state)
    }

    fn var(p: &Program, name: &str) -> VarId {
        VarId(p.variables.iter().position(|v| v.name == name).unwrap())
    }

    #[test]
    fn counted_loop() {
        let (p, state) = analyze(
            "(declare () int i)
             (declare () float k)
             (assign (x) (var_ref i) (constant int (0)))
             (loop (
               (if (expression bool >= (var_ref i) (constant int (4))) ((break)) ())
               (assign (x) (var_ref k) (expression float * (var_ref u) (constant float (2.0))))
               (assign (x) (array_ref (var_ref a) (var_ref i)) (var_ref i))
               (assign (x) (var_ref i) (expression int + (var_ref i) (constant int (1))))))",
        );
        let (_, ls) = state.iter().next().unwrap();
        assert_eq!(ls.class(var(&p, "u")), Some(&VariableClass::Constant));
        assert_eq!(ls.class(var(&p, "k")), Some(&VariableClass::Constant));
        assert_eq!(ls.class(var(&p, "a")), Some(&VariableClass::General));
        assert!(matches!(
            ls.class(var(&p, "i")),
            Some(VariableClass::Induction(Induction::Basic { .. }))
        ));
        assert_eq!(ls.terminators.len(), 1);
        assert_eq!(ls.jumps, 1);
        assert_eq!(ls.max_iterations, Some(4));
        let bound = ls.limiting().and_then(|t| t.bound.as_ref()).unwrap();
        assert_eq!(bound.cmp, Operation::GreaterEqual);
        assert_eq!(bound.from, Constant::int(0));
    }

    #[test]
    fn reversed_and_negated_tests() {
        let (_, state) = analyze(
            "(declare () int i)
             (assign (x) (var_ref i) (constant int (10)))
             (loop (
               (if (expression bool ! (expression bool < (constant int (0)) (var_ref i))) ((break)) ())
               (assign (x) (var_ref i) (expression int - (var_ref i) (constant int (3))))))",
        );
        let (_, ls) = state.iter().next().unwrap();
        // 10, 7, 4, 1 run; -2 exits.
        assert_eq!(ls.max_iterations, Some(4));
    }

    #[test]
    fn unknown_start_leaves_bound_open() {
        let (_, state) = analyze(
            "(declare () int i)
             (assign (x) (var_ref i) (expression int f2i (var_ref u)))
             (loop (
               (if (expression bool >= (var_ref i) (constant int (4))) ((break)) ())
               (assign (x) (var_ref i) (expression int + (var_ref i) (constant int (1))))))",
        );
        let (_, ls) = state.iter().next().unwrap();
        assert_eq!(ls.max_iterations, None);
        assert_eq!(ls.limiting_terminator, None);
    }

    #[test]
    fn derived_induction_and_conditional_writes() {
        let (p, state) = analyze(
            "(declare () int i)
             (declare () int j)
             (declare () float t)
             (assign (x) (var_ref i) (constant int (0)))
             (loop (
               (if (expression bool >= (var_ref i) (constant int (4))) ((break)) ())
               (assign (x) (var_ref j) (expression int + (expression int * (var_ref i) (constant int (2))) (constant int (1))))
               (if (expression bool < (var_ref u) (constant float (0.0))) ((assign (x) (var_ref t) (var_ref u))) ())
               (assign (x) (var_ref i) (expression int + (var_ref i) (constant int (1))))))",
        );
        let (_, ls) = state.iter().next().unwrap();
        assert!(matches!(
            ls.class(var(&p, "j")),
            Some(VariableClass::Induction(Induction::Derived { offset: Some(_), .. }))
        ));
        assert_eq!(ls.class(var(&p, "t")), Some(&VariableClass::General));
    }

    #[test]
    fn iteration_counts() {
        let int = Constant::int;
        assert_eq!(calculate_iterations(&int(0), &int(4), &int(1), Operation::GreaterEqual), Some(4));
        assert_eq!(calculate_iterations(&int(0), &int(10), &int(3), Operation::Greater), Some(4));
        assert_eq!(calculate_iterations(&int(5), &int(4), &int(1), Operation::GreaterEqual), Some(0));
        assert_eq!(calculate_iterations(&int(0), &int(4), &int(0), Operation::GreaterEqual), None);
        let float = Constant::float;
        assert_eq!(
            calculate_iterations(&float(0.0), &float(1.0), &float(0.25), Operation::GreaterEqual),
            Some(4)
        );
        // Counting away from the bound never exits.
        assert_eq!(calculate_iterations(&int(0), &int(4), &int(-1), Operation::GreaterEqual), None);
    }
}
