use glslopt::{
    ir::{print::print_program, read::read_program, validate::validate},
    optimize,
    optimizer::run_round,
    precision::{higher_precision, Precision},
    Options,
};

const SHADERS: [&str; 3] = [
    "(declare (uniform mediump) vec4 color)
     (declare (uniform) float k)
     (declare (in) vec2 uv)
     (declare (out) vec4 o)
     (function main (signature void (parameters) (body
       (declare () vec4 t)
       (assign (xyzw) (var_ref t) (expression vec4 * (var_ref color) (var_ref k)))
       (if (expression bool < (swiz x (var_ref uv)) (constant float (0.5)))
         ((assign (xyzw) (var_ref o) (swiz xyzw (var_ref t))))
         ((assign (xyzw) (var_ref o) (expression vec4 + (var_ref t) (expression vec4 * (var_ref color) (var_ref k)))))))))",
    "(declare (uniform) float u)
     (declare (out) float o)
     (function scale (signature float (parameters (declare (param_in) float x)) (body
       (return (expression float * (var_ref x) (constant float (2.0)))))))
     (function main (signature void (parameters) (body
       (declare () float r)
       (call scale (var_ref r) ((var_ref u)))
       (assign (x) (var_ref o) (expression float saturate (var_ref r))))))",
    "(declare (out) (array float 3) w)
     (function main (signature void (parameters) (body
       (declare () int i)
       (assign (x) (var_ref i) (constant int (0)))
       (loop (
         (if (expression bool >= (var_ref i) (constant int (3))) ((break)) ())
         (assign (x) (array_ref (var_ref w) (var_ref i)) (expression float i2f (var_ref i)))
         (assign (x) (var_ref i) (expression int + (var_ref i) (constant int (1)))))))))",
];

fn configurations() -> [Options; 2] {
    [
        Options {
            default_high_precision_globals: false,
            ..Options::default()
        },
        Options {
            linked: true,
            default_high_precision_globals: false,
            ..Options::default()
        },
    ]
}

#[test]
fn another_round_changes_nothing() {
    for options in configurations() {
        for source in SHADERS {
            let mut p = read_program(source).unwrap();
            optimize(&mut p, &options).unwrap();
            validate(&p).unwrap();

            let before = print_program(&p);
            assert!(!run_round(&mut p, &options), "extra round progressed on\n{before}");
            assert_eq!(print_program(&p), before);
            assert!(!optimize(&mut p, &options).unwrap());
        }
    }
}

#[test]
fn unrolled_loop_is_a_fixpoint() {
    let options = Options {
        linked: true,
        default_high_precision_globals: false,
        ..Options::default()
    };
    let mut p = read_program(SHADERS[2]).unwrap();
    assert!(optimize(&mut p, &options).unwrap());
    let text = print_program(&p);
    assert!(!text.contains("(loop"), "loop left rolled in\n{text}");
    assert!(text.contains("(assign (x) (array_ref (var_ref w) (constant int (2))) (constant float (2.0)))"));

    assert!(!run_round(&mut p, &options));
    assert_eq!(print_program(&p), text);
}

#[test]
fn optimized_text_reads_back() {
    for options in configurations() {
        for source in SHADERS {
            let mut p = read_program(source).unwrap();
            optimize(&mut p, &options).unwrap();
            let text = print_program(&p);
            let reread = read_program(&text).unwrap();
            assert_eq!(print_program(&reread), text);
        }
    }
}

#[test]
fn precision_join_laws() {
    use Precision::*;
    let all = [Undefined, Low, Medium, High];
    for a in all {
        assert_eq!(higher_precision(Undefined, a), a);
        for b in all {
            let ab = higher_precision(a, b);
            assert_eq!(ab, higher_precision(b, a));
            assert!(ab >= a && ab >= b);
            for c in all {
                assert_eq!(
                    higher_precision(ab, c),
                    higher_precision(a, higher_precision(b, c))
                );
            }
        }
    }
}
