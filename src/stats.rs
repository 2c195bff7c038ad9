//! Post-optimization statistics and interface reflection.

use crate::{
    concrete_type::Type,
    ir::{visit, ExprKind, Program, Stmt, VariableMode},
    precision::Precision,
};

/// Approximate instruction counts of the optimized shader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderStats {
    /// arithmetic operators
    pub math: usize,
    /// texture fetches
    pub texture: usize,
    /// branches, loops and jumps
    pub flow: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariable {
    pub name: String,
    pub ty: Type,
    pub type_name: String,
    pub precision: Precision,
    pub array_length: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reflection {
    pub inputs: Vec<ShaderVariable>,
    pub uniforms: Vec<ShaderVariable>,
    pub textures: Vec<ShaderVariable>,
}

pub fn collect_stats(program: &Program) -> ShaderStats {
    let mut stats = ShaderStats::default();
    for f in program.functions.iter().flatten() {
        let Some(body) = &f.body else {
            continue;
        };
        visit::walk(body, &mut |s| {
            if matches!(
                s,
                Stmt::If(_) | Stmt::Loop(_) | Stmt::Break | Stmt::Continue | Stmt::Return(_) | Stmt::Discard(_)
            ) {
                stats.flow += 1;
            }
            visit::for_each_expr(s, &mut |e| {
                e.visit(&mut |x| match x.kind {
                    ExprKind::Operation(..) => stats.math += 1,
                    ExprKind::Texture(_) => stats.texture += 1,
                    _ => (),
                })
            });
        });
    }
    stats
}

/// Interface variables in declaration order. Samplers are listed under
/// `textures` rather than `uniforms`.
pub fn reflect(program: &Program) -> Reflection {
    let mut r = Reflection::default();
    for &g in &program.globals {
        let v = program.var(g);
        let entry = || ShaderVariable {
            name: v.name.clone(),
            ty: v.ty.clone(),
            type_name: v.ty.display_name(&program.structs),
            precision: v.precision,
            array_length: v.ty.array_length(),
        };
        match v.mode {
            VariableMode::ShaderIn => r.inputs.push(entry()),
            VariableMode::Uniform if is_sampler(&v.ty) => r.textures.push(entry()),
            VariableMode::Uniform => r.uniforms.push(entry()),
            _ => (),
        }
    }
    r
}

fn is_sampler(ty: &Type) -> bool {
    match ty {
        Type::Array(e, _) => is_sampler(e),
        t => t.is_sampler(),
    }
}
