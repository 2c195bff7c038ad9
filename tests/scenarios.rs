use glslopt::{
    ir::{print::print_program, read::read_program, Program, Stmt},
    optimize, Options, Target,
};

fn optimized(source: &str, options: &Options) -> Program {
    let mut p = read_program(source).unwrap();
    optimize(&mut p, options).unwrap();
    p
}

fn main_body(p: &Program) -> &[Stmt] {
    p.function(p.main_function().unwrap()).unwrap().body.as_deref().unwrap()
}

#[test]
fn constant_initializer_folds() {
    let p = optimized(
        "(declare (out) float o)
         (function main (signature void (parameters) (body
           (assign (x) (var_ref o)
             (expression float + (constant float (2.0))
               (expression float * (constant float (3.0)) (constant float (1.0))))))))",
        &Options::default(),
    );
    assert_eq!(main_body(&p).len(), 1);
    assert!(print_program(&p).contains("(assign (x) (var_ref o) (constant float (5.0)))"));
}

#[test]
fn copy_of_uniform_is_propagated_and_removed() {
    let p = optimized(
        "(declare (uniform) float u)
         (declare (out) float o1)
         (declare (out) float o2)
         (function main (signature void (parameters) (body
           (declare () float t)
           (assign (x) (var_ref t) (var_ref u))
           (assign (x) (var_ref o1) (var_ref t))
           (assign (x) (var_ref o2) (var_ref t)))))",
        &Options::default(),
    );
    let text = print_program(&p);
    assert!(text.contains("(assign (x) (var_ref o1) (var_ref u))"));
    assert!(text.contains("(assign (x) (var_ref o2) (var_ref u))"));
    assert!(!main_body(&p).iter().any(|s| matches!(s, Stmt::Declare(_))));
}

#[test]
fn counted_loop_unrolls_to_constant_stores() {
    let options = Options {
        linked: true,
        max_unroll_iterations: 4,
        ..Options::default()
    };
    let p = optimized(
        "(declare (out) (array int 4) a)
         (function main (signature void (parameters) (body
           (declare () int i)
           (assign (x) (var_ref i) (constant int (0)))
           (loop (
             (if (expression bool >= (var_ref i) (constant int (4))) ((break)) ())
             (assign (x) (array_ref (var_ref a) (var_ref i)) (var_ref i))
             (assign (x) (var_ref i) (expression int + (var_ref i) (constant int (1)))))))))",
        &options,
    );
    let text = print_program(&p);
    assert!(!text.contains("(loop"));
    for n in 0..4 {
        assert!(
            text.contains(&format!(
                "(assign (x) (array_ref (var_ref a) (constant int ({n}))) (constant int ({n})))"
            )),
            "missing store {n} in\n{text}"
        );
    }
    assert_eq!(main_body(&p).len(), 4);
}

#[test]
fn identity_swizzle_disappears() {
    let p = optimized(
        "(declare (uniform) vec4 v)
         (declare (out) vec4 o)
         (function main (signature void (parameters) (body
           (assign (xyzw) (var_ref o) (swiz xyzw (var_ref v))))))",
        &Options::default(),
    );
    let text = print_program(&p);
    assert!(text.contains("(assign (xyzw) (var_ref o) (var_ref v))"));
    assert!(!text.contains("swiz"));
}

#[test]
fn repeated_expression_is_computed_once() {
    let options = Options {
        target: Target::Metal,
        ..Options::default()
    };
    let p = optimized(
        "(declare (uniform) vec4 a)
         (declare (uniform) vec4 b)
         (declare (uniform) vec4 c)
         (declare (out) vec4 o1)
         (declare (out) vec4 o2)
         (function main (signature void (parameters) (body
           (assign (xyzw) (var_ref o1) (expression vec4 + (expression vec4 * (var_ref a) (var_ref b)) (var_ref c)))
           (assign (xyzw) (var_ref o2) (expression vec4 + (expression vec4 * (var_ref a) (var_ref b)) (var_ref c))))))",
        &options,
    );
    let text = print_program(&p);
    assert_eq!(text.matches("expression vec4 *").count(), 1);
    assert_eq!(text.matches("expression vec4 +").count(), 1);
}

#[test]
fn constant_true_branch_replaces_if() {
    let p = optimized(
        "(declare (out) float o)
         (function main (signature void (parameters) (body
           (if (constant bool (1))
             ((assign (x) (var_ref o) (constant float (1.0))))
             ((assign (x) (var_ref o) (constant float (2.0))))))))",
        &Options::default(),
    );
    let text = print_program(&p);
    assert!(!text.contains("(if"));
    assert!(text.contains("(assign (x) (var_ref o) (constant float (1.0)))"));
    assert!(!text.contains("2.0"));
}
