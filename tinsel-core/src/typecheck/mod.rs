//! Semantic analysis.
//!
//! Checking runs in two passes over the top level. The first registers
//! every `def`, `uniform`, `fn` and `pr` so later declarations are visible
//! everywhere; the second checks bodies and render blocks in source order.
//! Function and procedure bodies are also checked on demand the first time
//! a caller needs their return type or parameter purity. Their diagnostics
//! are parked and released when the top-level walk reaches the definition,
//! which keeps the final list in source order.
//!
//! Every checking routine returns its diagnostics instead of stopping at the
//! first one; a statement list is the concatenation of its members'
//! diagnostics. Results are kept in side tables on [`Analysis`], keyed by
//! expression or statement id, for the expander and code generator.

mod expr;
mod scope;
mod stmt;

use std::collections::HashMap;
use std::mem;

use crate::ast::{ExprId, FnDef, Mutability, Param, ProcDef, Program, StmtId, StmtKind};
use crate::builtins::find_builtin;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::types::{Type, compatible};

pub use scope::{LValue, Symbol};
use scope::reserved_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FnId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub usize);

/// A compile-time constant integer as far as the checker can reduce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstInt {
    Value(i64),
    /// A procedure parameter; the value comes from the call site.
    Param(ProcId, usize),
}

/// Which texture a `frag`/`prev` read samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRef {
    /// The enclosing render block's input texture.
    Input,
    /// The enclosing render block's output texture (`prev`).
    Output,
    /// An explicit texture number; negative values mean the input texture.
    Unit(ConstInt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragRead {
    pub texture: TextureRef,
    pub uv: Option<ExprId>,
}

/// A checked procedure call statement.
#[derive(Debug, Clone)]
pub struct ProcCallSite {
    pub procedure: ProcId,
    /// Argument per parameter; `None` takes the parameter default.
    pub args: Vec<Option<ExprId>>,
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub span: Span,
    pub ty: Type,
    pub default: Option<ExprId>,
    /// Used as a texture, loop or block number, so every argument for it
    /// must itself be a compile-time constant.
    pub pure: bool,
    runtime_use: Option<Span>,
}

impl ParamInfo {
    fn from_ast(param: &Param) -> Self {
        ParamInfo {
            name: param.name.clone(),
            span: param.span,
            ty: param.ty.clone(),
            default: param.default,
            pure: false,
            runtime_use: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    /// Position of the definition in `Program::body`.
    pub index: usize,
    pub span: Span,
    pub params: Vec<ParamInfo>,
    /// Declared or inferred; undecided when inference failed.
    pub ret: Type,
}

#[derive(Debug, Clone)]
pub struct ProcedureInfo {
    pub name: String,
    pub index: usize,
    pub span: Span,
    pub params: Vec<ParamInfo>,
    /// Contains a `refresh`, a nested render block or a call to another
    /// multi-pass procedure.
    pub multi_pass: bool,
}

#[derive(Debug, Clone)]
pub struct DefInfo {
    pub name: String,
    pub value: ExprId,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct UniformInfo {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct LocalInfo {
    pub name: String,
    pub ty: Type,
    pub mutability: Mutability,
    pub span: Span,
    /// Pass generation for locals declared directly in a render-level
    /// statement list; such a local is only readable within that pass.
    pub pass: Option<u32>,
}

/// Everything the later stages need to know about a checked program.
#[derive(Debug, Default)]
pub struct Analysis {
    pub types: HashMap<ExprId, Type>,
    pub symbols: HashMap<ExprId, Symbol>,
    /// Argument per parameter for user function calls; `None` takes the
    /// parameter default.
    pub call_args: HashMap<ExprId, Vec<Option<ExprId>>>,
    pub proc_calls: HashMap<StmtId, ProcCallSite>,
    pub frag_reads: HashMap<ExprId, FragRead>,
    pub const_ints: HashMap<ExprId, ConstInt>,
    pub defs: Vec<DefInfo>,
    pub uniforms: Vec<UniformInfo>,
    pub functions: Vec<FunctionInfo>,
    pub procedures: Vec<ProcedureInfo>,
    pub locals: Vec<LocalInfo>,
    pub local_decls: HashMap<StmtId, LocalId>,
}

impl Analysis {
    pub fn type_of(&self, id: ExprId) -> Option<&Type> {
        self.types.get(&id)
    }

    pub fn function_at(&self, index: usize) -> Option<FnId> {
        self.functions
            .iter()
            .position(|f| f.index == index)
            .map(FnId)
    }

    pub fn procedure_at(&self, index: usize) -> Option<ProcId> {
        self.procedures
            .iter()
            .position(|p| p.index == index)
            .map(ProcId)
    }
}

/// Check a parsed program.
pub fn check(program: &Program) -> Result<Analysis, Vec<Diagnostic>> {
    let mut checker = Checker::new(program);
    let diagnostics = checker.check_program();
    log::debug!(
        "checked {} functions, {} procedures, {} diagnostics",
        checker.out.functions.len(),
        checker.out.procedures.len(),
        diagnostics.len()
    );
    if diagnostics.is_empty() {
        Ok(checker.out)
    } else {
        Err(diagnostics)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyState {
    Unchecked,
    Active,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    /// `def` initialisers and parameter defaults.
    Global,
    Function(FnId),
    Procedure(ProcId),
    Render,
}

/// Inferred-return-type cell of the function being checked.
#[derive(Debug, Clone, PartialEq)]
enum ReturnCell {
    None,
    Declared(Type),
    Unset,
    Set(Type, Span),
    /// Two returns disagreed; already reported.
    Poisoned,
}

/// State threaded explicitly through one body's statements.
#[derive(Debug)]
struct BodyCtx {
    owner: Owner,
    ret: ReturnCell,
    /// Bare expressions are colour writes.
    color: bool,
    /// Directly inside a render block or procedure body (not nested in
    /// `if`/`for`).
    render_level: bool,
    pass: u32,
}

impl BodyCtx {
    fn global() -> Self {
        BodyCtx {
            owner: Owner::Global,
            ret: ReturnCell::None,
            color: false,
            render_level: false,
            pass: 0,
        }
    }
}

struct Checker<'a> {
    program: &'a Program,
    out: Analysis,
    globals: HashMap<String, Symbol>,
    scopes: Vec<HashMap<String, Symbol>>,
    /// Memoised expression results; `None` means "failed, already reported".
    cache: HashMap<ExprId, Option<Type>>,
    fn_defs: Vec<&'a FnDef>,
    proc_defs: Vec<&'a ProcDef>,
    fn_state: Vec<BodyState>,
    proc_state: Vec<BodyState>,
    /// Diagnostics waiting for the top-level walk to reach their statement.
    pending: HashMap<usize, Vec<Diagnostic>>,
    next_pass: u32,
}

impl<'a> Checker<'a> {
    fn new(program: &'a Program) -> Self {
        Checker {
            program,
            out: Analysis::default(),
            globals: HashMap::new(),
            scopes: Vec::new(),
            cache: HashMap::new(),
            fn_defs: Vec::new(),
            proc_defs: Vec::new(),
            fn_state: Vec::new(),
            proc_state: Vec::new(),
            pending: HashMap::new(),
            next_pass: 0,
        }
    }

    fn fresh_pass(&mut self) -> u32 {
        self.next_pass += 1;
        self.next_pass
    }

    fn park(&mut self, index: usize, diagnostics: Vec<Diagnostic>) {
        if !diagnostics.is_empty() {
            self.pending.entry(index).or_default().extend(diagnostics);
        }
    }

    fn check_program(&mut self) -> Vec<Diagnostic> {
        let program = self.program;
        for (index, stmt) in program.body.iter().enumerate() {
            let diagnostics = match &stmt.kind {
                StmtKind::Def { name, value } => self.declare_def(name, *value, stmt.span),
                StmtKind::Uniform { name, ty } => self.declare_uniform(name, ty, stmt.span),
                StmtKind::Function(def) => self.declare_function(index, def, stmt.span),
                StmtKind::Procedure(def) => self.declare_procedure(index, def, stmt.span),
                StmtKind::RenderBlock(_) => Vec::new(),
                _ => vec![Diagnostic::error(
                    "only def, uniform, fn, pr and render blocks may appear at the top level",
                    stmt.span,
                )],
            };
            self.park(index, diagnostics);
        }

        let mut diagnostics = Vec::new();
        for (index, stmt) in program.body.iter().enumerate() {
            match &stmt.kind {
                StmtKind::Function(_) => {
                    if let Some(id) = self.out.function_at(index) {
                        self.ensure_function(id);
                    }
                }
                StmtKind::Procedure(_) => {
                    if let Some(id) = self.out.procedure_at(index) {
                        self.ensure_procedure(id);
                    }
                }
                StmtKind::RenderBlock(block) => {
                    let mut ctx = BodyCtx {
                        owner: Owner::Render,
                        ret: ReturnCell::None,
                        color: true,
                        render_level: true,
                        pass: self.fresh_pass(),
                    };
                    let found = self.check_render_block(&mut ctx, stmt, block);
                    self.park(index, found);
                }
                _ => {}
            }
            if let Some(found) = self.pending.remove(&index) {
                diagnostics.extend(found);
            }
        }
        diagnostics
    }

    // ------------------------------------------------------------------
    // pass one: declarations
    // ------------------------------------------------------------------

    fn declare_global(&mut self, name: &str, symbol: Symbol, span: Span) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(message) = reserved_name(name) {
            diagnostics.push(Diagnostic::error(message, span));
        }
        if find_builtin(name).is_some() {
            diagnostics.push(Diagnostic::error(
                format!("'{name}' is a built-in function and cannot be redefined"),
                span,
            ));
        } else if self.globals.contains_key(name) {
            diagnostics.push(Diagnostic::error(
                format!("'{name}' is already defined"),
                span,
            ));
        } else {
            self.globals.insert(name.to_string(), symbol);
        }
        diagnostics
    }

    fn declare_def(&mut self, name: &str, value: ExprId, span: Span) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let ctx = BodyCtx::global();
        let ty = match self.expr(&ctx, value) {
            Ok(ty) => {
                if !ty.is_undecided() && !ty.is_scalar() {
                    diagnostics.push(Diagnostic::error(
                        format!("def '{name}' must be a scalar (float, int, uint or bool), found {ty}"),
                        self.program.exprs[value].span,
                    ));
                } else if !self.is_constant(value) {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("def '{name}' must be a constant expression"),
                            self.program.exprs[value].span,
                        )
                        .with_hint("defs may only use literals, other defs, operators, constructors and built-in functions"),
                    );
                }
                ty
            }
            Err(found) => {
                diagnostics.extend(found);
                Type::Undecided
            }
        };
        let id = self.out.defs.len();
        self.out.defs.push(DefInfo {
            name: name.to_string(),
            value,
            ty,
        });
        diagnostics.extend(self.declare_global(name, Symbol::Def(id), span));
        diagnostics
    }

    fn declare_uniform(&mut self, name: &str, ty: &Type, span: Span) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if ty.is_array() {
            diagnostics.push(Diagnostic::error(
                format!("uniform '{name}' cannot have array type {ty}"),
                span,
            ));
        }
        let id = self.out.uniforms.len();
        self.out.uniforms.push(UniformInfo {
            name: name.to_string(),
            ty: ty.clone(),
        });
        diagnostics.extend(self.declare_global(name, Symbol::Uniform(id), span));
        diagnostics
    }

    fn check_param_names(&self, owner: &str, params: &[Param]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (i, param) in params.iter().enumerate() {
            if let Some(message) = reserved_name(&param.name) {
                diagnostics.push(Diagnostic::error(message, param.span));
            }
            if params[..i].iter().any(|p| p.name == param.name) {
                diagnostics.push(Diagnostic::error(
                    format!("'{owner}' has more than one parameter named '{}'", param.name),
                    param.span,
                ));
            } else if matches!(param.ty, Type::Array(_, 0)) {
                diagnostics.push(Diagnostic::error(
                    format!("parameter '{}' needs an explicit array size", param.name),
                    param.span,
                ));
            } else if find_builtin(&param.name).is_some()
                || matches!(
                    self.globals.get(&param.name),
                    Some(Symbol::Function(_) | Symbol::Procedure(_))
                )
            {
                diagnostics.push(Diagnostic::error(
                    format!("parameter '{}' shadows a function", param.name),
                    param.span,
                ));
            }
        }
        diagnostics
    }

    fn declare_function(&mut self, index: usize, def: &'a FnDef, span: Span) -> Vec<Diagnostic> {
        let id = FnId(self.out.functions.len());
        self.out.functions.push(FunctionInfo {
            name: def.name.clone(),
            index,
            span,
            params: def.params.iter().map(ParamInfo::from_ast).collect(),
            ret: def.ret.clone().unwrap_or(Type::Undecided),
        });
        self.fn_defs.push(def);
        self.fn_state.push(BodyState::Unchecked);
        let mut diagnostics = self.declare_global(&def.name, Symbol::Function(id), span);
        diagnostics.extend(self.check_param_names(&def.name, &def.params));
        diagnostics
    }

    fn declare_procedure(
        &mut self,
        index: usize,
        def: &'a ProcDef,
        span: Span,
    ) -> Vec<Diagnostic> {
        let id = ProcId(self.out.procedures.len());
        self.out.procedures.push(ProcedureInfo {
            name: def.name.clone(),
            index,
            span,
            params: def.params.iter().map(ParamInfo::from_ast).collect(),
            multi_pass: false,
        });
        self.proc_defs.push(def);
        self.proc_state.push(BodyState::Unchecked);
        let mut diagnostics = self.declare_global(&def.name, Symbol::Procedure(id), span);
        diagnostics.extend(self.check_param_names(&def.name, &def.params));
        diagnostics
    }

    // ------------------------------------------------------------------
    // pass two: bodies
    // ------------------------------------------------------------------

    /// Check a function body unless already done. Returns `false` when the
    /// function is currently being checked, i.e. the caller is recursive.
    fn ensure_function(&mut self, id: FnId) -> bool {
        match self.fn_state[id.0] {
            BodyState::Done => true,
            BodyState::Active => false,
            BodyState::Unchecked => {
                self.fn_state[id.0] = BodyState::Active;
                let saved = mem::take(&mut self.scopes);
                let found = self.check_function_body(id);
                self.scopes = saved;
                self.fn_state[id.0] = BodyState::Done;
                let index = self.out.functions[id.0].index;
                self.park(index, found);
                true
            }
        }
    }

    fn ensure_procedure(&mut self, id: ProcId) -> bool {
        match self.proc_state[id.0] {
            BodyState::Done => true,
            BodyState::Active => false,
            BodyState::Unchecked => {
                self.proc_state[id.0] = BodyState::Active;
                let saved = mem::take(&mut self.scopes);
                let found = self.check_procedure_body(id);
                self.scopes = saved;
                self.proc_state[id.0] = BodyState::Done;
                let index = self.out.procedures[id.0].index;
                self.park(index, found);
                true
            }
        }
    }

    fn check_function_body(&mut self, id: FnId) -> Vec<Diagnostic> {
        let def = self.fn_defs[id.0];
        let span = self.out.functions[id.0].span;
        let params = def
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), Symbol::FnParam(id, i)))
            .collect();
        self.scopes.push(params);

        let mut ctx = BodyCtx {
            owner: Owner::Function(id),
            ret: match &def.ret {
                Some(ty) => ReturnCell::Declared(ty.clone()),
                None => ReturnCell::Unset,
            },
            color: false,
            render_level: false,
            pass: self.fresh_pass(),
        };
        let mut diagnostics = self.check_stmts(&mut ctx, &def.body);
        self.scopes.pop();

        if !stmt::definitely_returns(&def.body) {
            diagnostics.push(Diagnostic::error(
                format!("function '{}' does not return a value on every path", def.name),
                span,
            ));
        }
        self.out.functions[id.0].ret = match ctx.ret {
            ReturnCell::Declared(ty) | ReturnCell::Set(ty, _) => ty,
            _ => Type::Undecided,
        };
        diagnostics.extend(self.check_defaults(Owner::Function(id)));
        diagnostics
    }

    fn check_procedure_body(&mut self, id: ProcId) -> Vec<Diagnostic> {
        let def = self.proc_defs[id.0];
        let span = self.out.procedures[id.0].span;
        let mut diagnostics = Vec::new();
        if def.body.is_empty() {
            diagnostics.push(Diagnostic::error(
                format!("procedure '{}' has an empty body", def.name),
                span,
            ));
        }

        let params = def
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), Symbol::ProcParam(id, i)))
            .collect();
        self.scopes.push(params);
        let mut ctx = BodyCtx {
            owner: Owner::Procedure(id),
            ret: ReturnCell::None,
            color: true,
            render_level: true,
            pass: self.fresh_pass(),
        };
        diagnostics.extend(self.check_stmts(&mut ctx, &def.body));
        self.scopes.pop();

        for param in &self.out.procedures[id.0].params {
            if let (true, Some(at)) = (param.pure, param.runtime_use) {
                diagnostics.push(
                    Diagnostic::error(
                        format!(
                            "mixed use of parameter '{}': it is used as a texture or loop number and also as a runtime value",
                            param.name
                        ),
                        at,
                    )
                    .with_hint("pass the number as a separate parameter for each use"),
                );
            }
        }
        diagnostics.extend(self.check_defaults(Owner::Procedure(id)));
        diagnostics
    }

    /// Defaults are checked after the body so parameter purity is known;
    /// they are evaluated at the top level, outside any body.
    fn check_defaults(&mut self, owner: Owner) -> Vec<Diagnostic> {
        let params = match owner {
            Owner::Function(id) => self.out.functions[id.0].params.clone(),
            Owner::Procedure(id) => self.out.procedures[id.0].params.clone(),
            _ => return Vec::new(),
        };
        let saved = mem::take(&mut self.scopes);
        let ctx = BodyCtx::global();
        let mut diagnostics = Vec::new();
        let mut seen_default = false;
        for param in &params {
            let Some(value) = param.default else {
                if seen_default {
                    diagnostics.push(Diagnostic::error(
                        format!(
                            "parameter '{}' needs a default value because an earlier parameter has one",
                            param.name
                        ),
                        param.span,
                    ));
                }
                continue;
            };
            seen_default = true;
            if param.pure {
                if let Err(found) = self.const_int(&ctx, value) {
                    diagnostics.extend(found);
                }
                continue;
            }
            match self.expr(&ctx, value) {
                Ok(ty) if !compatible(&param.ty, &ty) => {
                    diagnostics.push(Diagnostic::error(
                        format!(
                            "default value of parameter '{}' has type {ty}, expected {}",
                            param.name, param.ty
                        ),
                        self.program.exprs[value].span,
                    ));
                }
                Ok(_) => {}
                Err(found) => diagnostics.extend(found),
            }
        }
        self.scopes = saved;
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn analyse(source: &str) -> Result<Analysis, Vec<Diagnostic>> {
        let program = parse(source).expect("parse");
        check(&program)
    }

    fn errors(source: &str) -> Vec<String> {
        match analyse(source) {
            Ok(_) => Vec::new(),
            Err(diags) => diags.into_iter().map(|d| d.message).collect(),
        }
    }

    fn assert_ok(source: &str) -> Analysis {
        match analyse(source) {
            Ok(analysis) => analysis,
            Err(diags) => panic!("unexpected diagnostics: {diags:#?}"),
        }
    }

    fn assert_one_error(source: &str, needle: &str) {
        let found = errors(source);
        assert_eq!(found.len(), 1, "{found:#?}");
        assert!(found[0].contains(needle), "{found:#?}");
    }

    #[test]
    fn accepts_a_simple_program() {
        assert_ok(
            "def gain 2.\nuniform float speed\n\
             float fn wave(float x) { return sin(x * speed) }\n\
             { vec4(vec3(wave(time) * gain), 1.) }",
        );
    }

    #[test]
    fn reports_every_error_in_a_list() {
        let found = errors("{\n a := nope\n b := 1 + 1.\n vec4(zip)\n}");
        assert_eq!(found.len(), 3, "{found:#?}");
        assert!(found[0].contains("undefined identifier 'nope'"));
        assert!(found[1].contains("same base type"));
        assert!(found[2].contains("undefined identifier 'zip'"));
    }

    #[test]
    fn mismatched_returns_report_once() {
        let source = "fn f(bool c) {\n if (c) { return 1u }\n return 2\n}\n\
                      { vec4(float(f(true)) + float(f(false)) + float(f(true))) }";
        assert_one_error(source, "return type mismatch");
    }

    #[test]
    fn requires_return_on_every_path() {
        assert_one_error(
            "float fn f(bool c) { if (c) { return 1. } }",
            "does not return a value on every path",
        );
        assert_ok(
            "float fn f(bool c) { if (c) { return 1. } else { return 2. } }\n{ vec4(f(true)) }",
        );
    }

    #[test]
    fn declared_return_type_is_authoritative() {
        assert_one_error("float fn f() { return 1 }", "function returns float");
    }

    #[test]
    fn mixed_use_of_pure_parameter() {
        let source = "pr p(int tex) { frag(tex) * float(tex) }\n{ p(1) }";
        assert_one_error(source, "mixed use");
    }

    #[test]
    fn purity_propagates_through_two_levels() {
        let one = "pr inner(int t) { frag(t) }\n{ inner(2) }";
        let two = "pr inner(int t) { frag(t) }\npr outer(int u) { inner(u) }\n{ outer(2) }";
        let one = assert_ok(one);
        let two = assert_ok(two);
        assert!(one.procedures[0].params[0].pure);
        assert!(two.procedures[0].params[0].pure);
        assert!(two.procedures[1].params[0].pure);

        let bad = "pr inner(int t) { frag(t) }\npr outer(int u) { inner(u + 1) }\n{ outer(2) }";
        assert_one_error(bad, "compile-time constant");
    }

    #[test]
    fn named_and_positional_calls_map_identically() {
        let named = assert_ok(
            "float fn f(float a, float b, float c, float d = 4.) { return a + b + c + d }\n\
             { vec4(f(c: 3., a: 1., b: 2.)) }",
        );
        let positional = assert_ok(
            "float fn f(float a, float b, float c, float d = 4.) { return a + b + c + d }\n\
             { vec4(f(1., 2., 3.)) }",
        );
        let program_named = parse(
            "float fn f(float a, float b, float c, float d = 4.) { return a + b + c + d }\n\
             { vec4(f(c: 3., a: 1., b: 2.)) }",
        )
        .expect("parse");
        let program_positional = parse(
            "float fn f(float a, float b, float c, float d = 4.) { return a + b + c + d }\n\
             { vec4(f(1., 2., 3.)) }",
        )
        .expect("parse");
        let spell = |program: &Program, analysis: &Analysis| -> Vec<Option<String>> {
            let (_, mapping) = analysis.call_args.iter().next().expect("one call");
            mapping
                .iter()
                .map(|slot| {
                    slot.map(|id| match &program.exprs[id].kind {
                        crate::ast::ExprKind::Float(text) => text.clone(),
                        other => format!("{other:?}"),
                    })
                })
                .collect()
        };
        assert_eq!(
            spell(&program_named, &named),
            spell(&program_positional, &positional)
        );
        assert_eq!(
            spell(&program_named, &named),
            vec![
                Some("1.".to_string()),
                Some("2.".to_string()),
                Some("3.".to_string()),
                None
            ]
        );
    }

    #[test]
    fn argument_mapping_errors() {
        let base = "float fn f(float a, float b = 1.) { return a + b }\n";
        assert_one_error(&format!("{base}{{ vec4(f(b: 1.)) }}"), "missing argument");
        assert_one_error(&format!("{base}{{ vec4(f(1., 2., 3.)) }}"), "at most 2 arguments");
        assert_one_error(
            &format!("{base}{{ vec4(f(a: 1., q: 1.)) }}"),
            "no parameter named 'q'",
        );
        assert_one_error(
            &format!("{base}{{ vec4(f(a: 1., a: 2.)) }}"),
            "more than once",
        );
    }

    #[test]
    fn constant_index_range() {
        assert_one_error("{ vec4(float(int[](1, 2, 3)[3])) }", "out of range");
        assert_ok("{ vec4(float(int[](1, 2, 3)[0])) }");
        assert_one_error("{ vec4(vec2(1.)[2]) }", "out of range");
    }

    #[test]
    fn lvalue_rules() {
        assert_one_error("{ x := vec4(1.)\n x = vec4(0.)\n x }", "not declared 'mut'");
        assert_one_error("{ mut x := vec4(1.)\n x.xx = vec2(0.)\n x }", "repeated");
        assert_ok("{ mut x := vec4(1.)\n x.xy = vec2(0.)\n x }");
        assert_one_error("def k 1.\n{ k = 2.\n vec4(k) }", "constant");
    }

    #[test]
    fn render_level_expressions_are_colours() {
        assert_one_error("{ 1. }", "must be a vec4");
        assert_ok("{ mut i := 0\n i++\n vec4(float(i)) }");
    }

    #[test]
    fn locals_do_not_survive_refresh() {
        assert_one_error("{ c := frag\n refresh\n c }", "earlier pass");
        assert_ok("{ c := frag\n c\n refresh\n frag }");
    }

    #[test]
    fn multi_pass_arguments_cannot_use_locals() {
        let source = "pr twice(vec4 c) { c\n refresh\n c }\n{ x := frag\n twice(x) }";
        assert_one_error(source, "multi-pass procedure");
        assert_ok("pr twice(vec4 c) { c\n refresh\n c }\n{ twice(vec4(1.)) }");
    }

    #[test]
    fn placement_rules() {
        assert_one_error("{ }", "render block is empty");
        assert_one_error("x := 1", "top level");
        assert_one_error("pr p() { }", "empty body");
        assert_one_error("{ refresh }", "render block is empty");
        assert_one_error("{ frag\n { refresh\n refresh } }", "render block is empty");
        assert_one_error("fn f() { refresh\n return 1 }", "directly inside");
        assert_one_error("{ return vec4(1.) }", "only allowed inside a function");
    }

    #[test]
    fn frag_forms() {
        assert_ok("{ frag + frag2 + frag(1) + frag(npos) + frag(1, npos) + frag3(npos) + prev }");
        assert_one_error("{ frag2(1) }", "given twice");
        assert_one_error("{ frag(1.) }", "vec2");
    }

    #[test]
    fn function_params_are_not_texture_numbers() {
        let found = errors("vec4 fn f(int t) { return frag(t) }\n{ f(1) }");
        assert_eq!(found.len(), 1, "{found:#?}");
        assert!(found[0].contains("function parameter 't'"));
        assert!(found[0].contains("hint:"));
    }

    #[test]
    fn block_numbers_must_be_constant() {
        assert_ok("def target 2\npr p(int n) { loop n { frag } -> target }\n{ p(3) }");
        assert_one_error("uniform int n\n{ frag } -> n", "compile-time constant");
        assert_one_error("def target -1\n{ frag } -> target", "non-negative");
        assert_one_error("{ frag } -> 0\nloop 0 { frag }", "at least 1");
        assert!(parse("{ frag } -> -1").is_err());
    }

    #[test]
    fn recursion_is_rejected() {
        assert_one_error(
            "float fn f(float x) { return f(x) }\n{ vec4(f(1.)) }",
            "recursive",
        );
    }

    #[test]
    fn defaults_must_trail() {
        assert_one_error(
            "float fn f(float a = 1., float b) { return a + b }",
            "needs a default value",
        );
    }

    #[test]
    fn forward_references_keep_source_order() {
        let found = errors("{ vec4(later(1.)) }\nfloat fn later(float x) { return x + 1 }");
        assert_eq!(found.len(), 1, "{found:#?}");
        assert!(found[0].contains("same base type"));
    }

    #[test]
    fn defs_must_be_scalar_constants() {
        assert_one_error("def v vec2(1.)", "must be a scalar");
        assert_one_error("uniform float u\ndef k u", "constant expression");
    }

    #[test]
    fn duplicate_names() {
        assert_one_error("def a 1.\ndef a 2.", "already defined");
        assert_one_error("fn sin(float x) { return x }", "built-in");
        assert_one_error("{ a := frag\n a := frag\n a }", "already declared");
    }

    #[test]
    fn redeclaration_after_refresh_reports_once() {
        assert_one_error(
            "{ a := frag\n a\n refresh\n a := frag * 2.\n a }",
            "already declared",
        );
    }

    #[test]
    fn reserved_names_are_collected_with_other_errors() {
        let found = errors("{ gl_a := frag\n tsl_b := frag\n vec4(nope) }");
        assert_eq!(found.len(), 3, "{found:#?}");
        assert!(found[0].contains("reserved prefix 'gl_'"));
        assert!(found[1].contains("reserved prefix 'tsl_'"));
        assert!(found[2].contains("undefined identifier 'nope'"));

        assert_one_error("fn f(float gl_x) { return gl_x }", "reserved prefix");
        assert_one_error("uniform float a__b", "double underscore");
        assert_one_error("def main 1.", "reserved word");
        assert_one_error("fn modf(float x) { return x }", "reserved word");
    }

    #[test]
    fn procedures_may_follow_their_callers() {
        let analysis = assert_ok("{ p() }\npr p() { frag * 0.5 }");
        assert_eq!(analysis.proc_calls.len(), 1);
        assert_ok("pr outer() { inner(2) }\npr inner(int t) { frag(t) }\n{ outer() }");
        assert_one_error("{ vec4(p().x) }\npr p() { frag }", "cannot be used in an expression");
    }

    #[test]
    fn constructors_count_components() {
        assert_ok("{ vec4(vec2(1.), 0., 1.) + vec4(vec3(1.).xy, vec2(0.)) + vec4(1.) }");
        assert_ok("{ vec4(vec2(float[3](1., 2., 3.)[1]), 0., 1.) }");
        assert_one_error("{ vec4(vec2(1., 2., 3.), 0., 1.) }", "too many arguments");
        assert_one_error("{ vec4(vec2(1.)) }", "not enough components");
        assert_one_error("{ vec4(float(float[3](1., 2, 3.)[0])) }", "array element must be float");
        assert_one_error("{ vec4(float(float[3](1., 2.)[0])) }", "needs exactly 3 elements");
    }

    #[test]
    fn builtin_overload_errors_name_the_arguments() {
        assert_one_error("{ vec4(mix(1., vec2(1.), 0.5).xyxy) }", "mix");
    }
}
