//! GLSL ES 3.00 generation.
//!
//! One fragment shader is produced per [`PassLeaf`]. Every operator
//! expression is emitted inside its own parentheses, so inlined `def`
//! values and procedure arguments can be pasted in as they are. Inlined
//! procedure locals are renamed with a per-frame `tsl_<frame>_` prefix.

use crate::ast::{
    Args, ExprId, ExprKind, Input, Mutability, Program, Stmt, StmtKind, UnaryOp, VarDecl,
};
use crate::color::{channel_literal, parse_color};
use crate::error::CompileError;
use crate::expand::{Expansion, FrameId, ROOT};
use crate::ir::{PassLeaf, Resources, texture_unit};
use crate::typecheck::{Analysis, FnId, LocalId, Symbol};
use crate::types::Type;

/// Name of the colour output of every generated program.
pub const FRAG_COLOR: &str = "tsl_fragColor";

const INDENT: &str = "    ";

/// Default precision qualifier of the generated preamble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precision {
    Low,
    Medium,
    #[default]
    High,
}

impl Precision {
    pub fn keyword(self) -> &'static str {
        match self {
            Precision::Low => "lowp",
            Precision::Medium => "mediump",
            Precision::High => "highp",
        }
    }
}

pub fn sampler_name(unit: u32) -> String {
    format!("tsl_sampler{unit}")
}

/// Generate the complete shader source for one leaf.
pub fn generate_leaf(
    program: &Program,
    analysis: &Analysis,
    expansion: &Expansion<'_>,
    leaf: &PassLeaf<'_>,
    precision: Precision,
) -> Result<String, CompileError> {
    let mut generator = Generator {
        program,
        analysis,
        expansion,
        io: (leaf.in_num, leaf.out_num),
        out: String::new(),
        depth: 0,
    };
    generator.preamble(&leaf.resources, precision);
    for function in &leaf.resources.functions {
        generator.function(*function)?;
    }
    generator.line("void main() {");
    generator.depth += 1;
    for framed in &leaf.body {
        generator.stmt(framed.stmt, framed.frame, true)?;
    }
    generator.depth -= 1;
    generator.line("}");
    Ok(generator.out)
}

struct Generator<'p, 'a> {
    program: &'p Program,
    analysis: &'p Analysis,
    expansion: &'p Expansion<'a>,
    io: (u32, u32),
    out: String,
    depth: usize,
}

impl Generator<'_, '_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn preamble(&mut self, resources: &Resources, precision: Precision) {
        let analysis = self.analysis;
        let p = precision.keyword();
        self.line("#version 300 es");
        self.line(&format!("precision {p} float;"));
        self.line(&format!("precision {p} int;"));
        self.line(&format!("out vec4 {FRAG_COLOR};"));
        for unit in &resources.samplers {
            self.line(&format!("uniform sampler2D {};", sampler_name(*unit)));
        }
        if resources.uses_time {
            self.line("uniform float tsl_time;");
        }
        if resources.uses_res {
            self.line("uniform vec2 tsl_res;");
        }
        for index in &resources.uniforms {
            let uniform = &analysis.uniforms[*index];
            self.line(&format!("uniform {} {};", uniform.ty, uniform.name));
        }
        self.out.push('\n');
    }

    fn function(&mut self, function: FnId) -> Result<(), CompileError> {
        let (program, analysis) = (self.program, self.analysis);
        let info = &analysis.functions[function.0];
        let Some(StmtKind::Function(def)) = program.body.get(info.index).map(|s| &s.kind) else {
            return Err(CompileError::internal(format!(
                "function '{}' has no definition",
                info.name
            )));
        };
        if info.ret.is_undecided() {
            return Err(CompileError::internal(format!(
                "function '{}' reached code generation without a return type",
                info.name
            )));
        }
        let params = info
            .params
            .iter()
            .map(|param| format!("{} {}", param.ty, param.name))
            .collect::<Vec<_>>()
            .join(", ");
        self.line(&format!("{} {}({params}) {{", info.ret, info.name));
        self.depth += 1;
        for stmt in &def.body {
            self.stmt(stmt, ROOT, false)?;
        }
        self.depth -= 1;
        self.line("}");
        self.out.push('\n');
        Ok(())
    }

    fn stmts(&mut self, stmts: &[Stmt], frame: FrameId, color: bool) -> Result<(), CompileError> {
        for stmt in stmts {
            self.stmt(stmt, frame, color)?;
        }
        Ok(())
    }

    /// Emit one statement. With `color` set, bare expressions write the
    /// output colour.
    fn stmt(&mut self, stmt: &Stmt, frame: FrameId, color: bool) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Expr(id) => {
                let value = self.expr(*id, frame)?;
                if color && !self.is_step(*id) {
                    self.line(&format!("{FRAG_COLOR} = {value};"));
                } else {
                    self.line(&format!("{value};"));
                }
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => self.if_stmt(*cond, then_body, else_body.as_deref(), frame, color, "")?,
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let init = match init {
                    Some(init) => self.clause(init, frame)?,
                    None => String::new(),
                };
                let cond = match cond {
                    Some(cond) => self.expr(*cond, frame)?,
                    None => String::new(),
                };
                let update = match update {
                    Some(update) => self.clause(update, frame)?,
                    None => String::new(),
                };
                self.line(&format!("for ({init}; {cond}; {update}) {{"));
                self.depth += 1;
                self.stmts(body, frame, color)?;
                self.depth -= 1;
                self.line("}");
            }
            StmtKind::Return(value) => {
                let value = self.expr(*value, frame)?;
                self.line(&format!("return {value};"));
            }
            StmtKind::VarDecl(_) | StmtKind::Assign { .. } => {
                let text = self.clause(stmt, frame)?;
                self.line(&format!("{text};"));
            }
            _ => {
                return Err(CompileError::internal(format!(
                    "statement at {} reached code generation",
                    stmt.span
                )));
            }
        }
        Ok(())
    }

    fn if_stmt(
        &mut self,
        cond: ExprId,
        then_body: &[Stmt],
        else_body: Option<&[Stmt]>,
        frame: FrameId,
        color: bool,
        prefix: &str,
    ) -> Result<(), CompileError> {
        let cond = self.expr(cond, frame)?;
        self.line(&format!("{prefix}if ({cond}) {{"));
        self.depth += 1;
        self.stmts(then_body, frame, color)?;
        self.depth -= 1;
        match else_body {
            None => self.line("}"),
            Some(
                [
                    Stmt {
                        kind:
                            StmtKind::If {
                                cond,
                                then_body,
                                else_body,
                            },
                        ..
                    },
                ],
            ) => {
                self.if_stmt(*cond, then_body, else_body.as_deref(), frame, color, "} else ")?;
            }
            Some(else_body) => {
                self.line("} else {");
                self.depth += 1;
                self.stmts(else_body, frame, color)?;
                self.depth -= 1;
                self.line("}");
            }
        }
        Ok(())
    }

    /// A declaration, assignment or expression without its `;`.
    fn clause(&self, stmt: &Stmt, frame: FrameId) -> Result<String, CompileError> {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.declaration(stmt, decl, frame),
            StmtKind::Assign { target, op, value } => Ok(format!(
                "{} {} {}",
                self.expr(*target, frame)?,
                op.symbol(),
                self.expr(*value, frame)?
            )),
            StmtKind::Expr(id) => self.expr(*id, frame),
            _ => Err(CompileError::internal(format!(
                "statement at {} is not a loop clause",
                stmt.span
            ))),
        }
    }

    fn declaration(&self, stmt: &Stmt, decl: &VarDecl, frame: FrameId) -> Result<String, CompileError> {
        let local = *self.analysis.local_decls.get(&stmt.id).ok_or_else(|| {
            CompileError::internal(format!("declaration of '{}' was never checked", decl.name))
        })?;
        let info = &self.analysis.locals[local.0];
        let qualifier = match info.mutability {
            Mutability::Const => "const ",
            Mutability::Mutable | Mutability::Final => "",
        };
        Ok(format!(
            "{qualifier}{} {} = {}",
            info.ty,
            self.local_name(local, frame),
            self.expr(decl.value, frame)?
        ))
    }

    fn local_name(&self, local: LocalId, frame: FrameId) -> String {
        let name = &self.analysis.locals[local.0].name;
        if frame == ROOT {
            name.clone()
        } else {
            format!("tsl_{}_{name}", frame.0)
        }
    }

    fn is_step(&self, id: ExprId) -> bool {
        matches!(&self.program.exprs[id].kind, ExprKind::Unary { op, .. } if op.is_step())
    }

    fn expr(&self, id: ExprId, frame: FrameId) -> Result<String, CompileError> {
        let analysis = self.analysis;
        Ok(match &self.program.exprs[id].kind {
            ExprKind::Float(text) => text.clone(),
            ExprKind::Int(value) => value.to_string(),
            ExprKind::Uint(value) => format!("{value}u"),
            ExprKind::Bool(value) => value.to_string(),
            ExprKind::Color { text, size } => {
                let rgba = parse_color(text).ok_or_else(|| {
                    CompileError::internal(format!("colour '{text}' was never checked"))
                })?;
                let channels = rgba[..usize::from(*size)]
                    .iter()
                    .map(|byte| channel_literal(*byte))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("vec{size}({channels})")
            }
            ExprKind::Ident(name) => match analysis.symbols.get(&id) {
                Some(Symbol::Def(def)) => self.expr(analysis.defs[*def].value, ROOT)?,
                Some(Symbol::Uniform(uniform)) => analysis.uniforms[*uniform].name.clone(),
                Some(Symbol::Local(local)) => self.local_name(*local, frame),
                Some(Symbol::FnParam(function, index)) => {
                    analysis.functions[function.0].params[*index].name.clone()
                }
                Some(Symbol::ProcParam(_, index)) => {
                    let (arg, arg_frame) = self.expansion.argument(frame, *index)?;
                    self.expr(arg, arg_frame)?
                }
                Some(Symbol::Function(_) | Symbol::Procedure(_)) | None => {
                    return Err(CompileError::internal(format!(
                        "identifier '{name}' has no value"
                    )));
                }
            },
            ExprKind::Input(input) => match input {
                Input::Pos => "gl_FragCoord.xy".to_string(),
                Input::NPos => "(gl_FragCoord.xy / tsl_res)".to_string(),
                Input::Res => "tsl_res".to_string(),
                Input::Time => "tsl_time".to_string(),
            },
            ExprKind::Frag { .. } | ExprKind::Prev { .. } => {
                let read = analysis.frag_reads.get(&id).ok_or_else(|| {
                    CompileError::internal(format!("texture read {} was never checked", id.0))
                })?;
                let sampler = sampler_name(texture_unit(self.expansion, analysis, read, frame, self.io)?);
                match read.uv {
                    Some(uv) => format!("texture({sampler}, {})", self.expr(uv, frame)?),
                    None => format!("texelFetch({sampler}, ivec2(gl_FragCoord.xy), 0)"),
                }
            }
            ExprKind::Binary { op, left, right } => format!(
                "({} {} {})",
                self.expr(*left, frame)?,
                op.symbol(),
                self.expr(*right, frame)?
            ),
            ExprKind::Unary { op, operand } => {
                let operand = self.expr(*operand, frame)?;
                match op {
                    UnaryOp::PostInc | UnaryOp::PostDec => {
                        format!("({operand}{})", op.symbol())
                    }
                    _ => format!("({}{operand})", op.symbol()),
                }
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "({} ? {} : {})",
                self.expr(*cond, frame)?,
                self.expr(*then_expr, frame)?,
                self.expr(*else_expr, frame)?
            ),
            ExprKind::Call { callee, args } => match analysis.symbols.get(&id) {
                Some(Symbol::Function(function)) => {
                    let params = &analysis.functions[function.0].params;
                    let slots = analysis.call_args.get(&id).ok_or_else(|| {
                        CompileError::internal(format!("call to '{callee}' was never checked"))
                    })?;
                    let mut list = Vec::with_capacity(params.len());
                    for (param, slot) in params.iter().zip(slots) {
                        list.push(match (slot, param.default) {
                            (Some(arg), _) => self.expr(*arg, frame)?,
                            (None, Some(default)) => self.expr(default, ROOT)?,
                            (None, None) => {
                                return Err(CompileError::internal(format!(
                                    "call to '{callee}' is missing '{}'",
                                    param.name
                                )));
                            }
                        });
                    }
                    format!("{callee}({})", list.join(", "))
                }
                _ => format!("{callee}({})", self.args(args, frame)?),
            },
            ExprKind::Construct { ty, args } => {
                let ty = match analysis.type_of(id) {
                    Some(resolved @ Type::Array(..)) => resolved,
                    _ => ty,
                };
                format!("{ty}({})", self.args(args, frame)?)
            }
            ExprKind::Subscript { base, index } => format!(
                "{}[{}]",
                self.expr(*base, frame)?,
                self.expr(*index, frame)?
            ),
            ExprKind::Member { base, field } => format!("{}.{field}", self.expr(*base, frame)?),
            ExprKind::Length { base } => format!("{}.length()", self.expr(*base, frame)?),
        })
    }

    fn args(&self, args: &Args, frame: FrameId) -> Result<String, CompileError> {
        let mut list = Vec::with_capacity(args.len());
        for arg in args.exprs() {
            list.push(self.expr(arg, frame)?);
        }
        Ok(list.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::ir::build;
    use crate::parser::parse;
    use crate::regroup::regroup;
    use crate::typecheck::check;

    fn shaders(source: &str) -> Vec<String> {
        let program = parse(source).expect("parse");
        let analysis = check(&program).expect("check");
        let mut expansion = expand(&program, &analysis).expect("expand");
        let blocks = std::mem::take(&mut expansion.blocks)
            .into_iter()
            .map(regroup)
            .collect();
        let tree = build(&program, &analysis, &expansion, blocks).expect("build");
        tree.leaves()
            .into_iter()
            .map(|leaf| {
                generate_leaf(&program, &analysis, &expansion, leaf, Precision::High)
                    .expect("generate")
            })
            .collect()
    }

    #[test]
    fn minimal_program() {
        let glsl = shaders("{ frag }").remove(0);
        assert_eq!(
            glsl,
            "#version 300 es\n\
             precision highp float;\n\
             precision highp int;\n\
             out vec4 tsl_fragColor;\n\
             uniform sampler2D tsl_sampler0;\n\
             \n\
             void main() {\n    \
             tsl_fragColor = texelFetch(tsl_sampler0, ivec2(gl_FragCoord.xy), 0);\n\
             }\n"
        );
    }

    #[test]
    fn inputs_and_uniforms_are_declared_in_order() {
        let glsl = shaders("uniform float speed\n{ frag2(npos) * sin(time * speed) }").remove(0);
        let order = [
            "uniform sampler2D tsl_sampler2;",
            "uniform float tsl_time;",
            "uniform vec2 tsl_res;",
            "uniform float speed;",
            "void main()",
        ];
        let positions: Vec<_> = order
            .iter()
            .map(|needle| glsl.find(needle).expect(needle))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(glsl.contains(
            "tsl_fragColor = (texture(tsl_sampler2, (gl_FragCoord.xy / tsl_res)) * sin((tsl_time * speed)));"
        ));
    }

    #[test]
    fn defs_are_inlined_and_colours_expanded() {
        let glsl = shaders("def k 0.5\n{ \"#ff8000\" * k }").remove(0);
        assert!(glsl.contains("tsl_fragColor = (vec4(1.0, 0.502, 0.0, 1.0) * 0.5);"));
    }

    #[test]
    fn procedures_are_inlined_with_renamed_locals() {
        let source = "pr shade(vec4 c, float gain = 2.) { mut v := c * gain\n v.a = 1.\n v }\n\
                      { base := frag\n shade(base) }";
        let glsl = shaders(source).remove(0);
        assert!(glsl.contains("vec4 base = texelFetch("));
        assert!(glsl.contains("vec4 tsl_1_v = (base * 2.);"));
        assert!(glsl.contains("tsl_1_v.a = 1.;"));
        assert!(glsl.contains("tsl_fragColor = tsl_1_v;"));
    }

    #[test]
    fn functions_precede_main_with_defaults_filled() {
        let source = "fn lift(float x, float by = 0.1) { return x + by }\n\
                      float fn twice(float x) { return lift(x) * 2. }\n\
                      { vec4(twice(npos.x)) }";
        let glsl = shaders(source).remove(0);
        let lift = glsl.find("float lift(float x, float by) {").expect("lift");
        let twice = glsl.find("float twice(float x) {").expect("twice");
        let main = glsl.find("void main()").expect("main");
        assert!(lift < twice && twice < main);
        assert!(glsl.contains("return (lift(x, 0.1) * 2.);"));
    }

    #[test]
    fn control_flow_and_arrays() {
        let source = "{ mut c := vec4(0.)\n\
                      w := float[](1., 2.)\n\
                      for (mut i := 0; i < 2; i++) { c += frag * w[i] }\n\
                      if (c.r > 1.) { c = vec4(1.) } else if (c.r < 0.) { c = vec4(0.) } else { c.g = 0. }\n\
                      c }";
        let glsl = shaders(source).remove(0);
        assert!(glsl.contains("float[2] w = float[2](1., 2.);"));
        assert!(glsl.contains("for (int i = 0; (i < 2); (i++)) {"));
        assert!(glsl.contains("c += (texelFetch(tsl_sampler0, ivec2(gl_FragCoord.xy), 0) * w[i]);"));
        assert!(glsl.contains("} else if ((c.r < 0.)) {"));
        assert!(glsl.contains("} else {"));
    }

    #[test]
    fn prev_reads_the_output_texture() {
        let glsl = shaders("1 -> once { prev * 0.5 + frag } -> 3").remove(0);
        assert!(glsl.contains("uniform sampler2D tsl_sampler1;"));
        assert!(glsl.contains("uniform sampler2D tsl_sampler3;"));
        assert!(glsl.contains("texelFetch(tsl_sampler3, ivec2(gl_FragCoord.xy), 0)"));
    }

    #[test]
    fn precision_keywords() {
        assert_eq!(Precision::default(), Precision::High);
        assert_eq!(Precision::Medium.keyword(), "mediump");
        assert_eq!(Precision::Low.keyword(), "lowp");
    }
}
