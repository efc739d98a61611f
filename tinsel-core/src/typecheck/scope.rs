//! Name resolution and assignability.

use std::collections::HashMap;

use crate::ast::{ExprId, ExprKind, Mutability, Stmt};
use crate::builtins::find_builtin;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::types::Type;

use super::{BodyCtx, Checker, FnId, LocalId, LocalInfo, ProcId};

/// Longest identifier accepted (the WebGL 2 limit).
const MAX_IDENT_LEN: usize = 1024;

/// Identifier prefixes reserved for the target language and for names the
/// code generator introduces.
const RESERVED_PREFIXES: &[&str] = &["gl_", "webgl_", "_webgl_", "tsl_"];

/// Words that cannot be used as identifiers: GLSL ES 3.00 keywords that
/// tinsel does not use itself, words GLSL reserves for future use, and
/// names the generated code depends on.
const RESERVED_WORDS: &[&str] = &[
    "attribute", "varying", "layout", "centroid", "flat", "smooth", "break", "continue", "do",
    "while", "switch", "case", "default", "in", "out", "inout", "void", "invariant", "discard",
    "lowp", "mediump", "highp", "precision", "sampler2D", "sampler3D", "samplerCube",
    "sampler2DShadow", "samplerCubeShadow", "sampler2DArray", "sampler2DArrayShadow",
    "isampler2D", "isampler3D", "isamplerCube", "isampler2DArray", "usampler2D", "usampler3D",
    "usamplerCube", "usampler2DArray", "struct", "coherent", "volatile", "restrict",
    "readonly", "writeonly", "resource", "atomic_uint", "noperspective", "patch", "sample",
    "subroutine", "common", "partition", "active", "asm", "class", "union", "enum", "typedef",
    "template", "this", "goto", "inline", "noinline", "public", "static", "extern", "external",
    "interface", "long", "short", "double", "half", "fixed", "unsigned", "superp", "input",
    "output", "hvec2", "hvec3", "hvec4", "dvec2", "dvec3", "dvec4", "fvec2", "fvec3", "fvec4",
    "sampler3DRect", "filter", "image1D", "image2D", "image3D", "imageCube", "iimage1D",
    "iimage2D", "iimage3D", "iimageCube", "uimage1D", "uimage2D", "uimage3D", "uimageCube",
    "image1DArray", "image2DArray", "iimage1DArray", "iimage2DArray", "uimage1DArray",
    "uimage2DArray", "imageBuffer", "iimageBuffer", "uimageBuffer", "sampler1D",
    "sampler1DShadow", "sampler1DArray", "sampler1DArrayShadow", "isampler1D",
    "isampler1DArray", "usampler1D", "usampler1DArray", "sampler2DRect",
    "sampler2DRectShadow", "isampler2DRect", "usampler2DRect", "samplerBuffer",
    "isamplerBuffer", "usamplerBuffer", "sampler2DMS", "isampler2DMS", "usampler2DMS",
    "sampler2DMSArray", "isampler2DMSArray", "usampler2DMSArray", "sizeof", "cast",
    "namespace", "using", "main", "modf", "texture", "texelFetch", "texelFetchOffset",
    "textureSize", "textureLod", "textureLodOffset", "textureOffset", "textureProj",
    "textureProjOffset", "textureProjLod", "textureProjLodOffset", "textureGrad",
    "textureGradOffset", "textureProjGrad", "textureProjGradOffset",
];

/// What an identifier resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Def(usize),
    Uniform(usize),
    Function(FnId),
    Procedure(ProcId),
    Local(LocalId),
    FnParam(FnId, usize),
    ProcParam(ProcId, usize),
}

/// Whether an expression may be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LValue {
    Valid,
    /// `def`, `uniform` or `const` local.
    Const,
    /// Single-assignment local or procedure parameter.
    Final,
    Invalid,
}

/// Why `name` cannot name a user declaration, if it cannot.
pub(super) fn reserved_name(name: &str) -> Option<String> {
    if name.len() > MAX_IDENT_LEN {
        return Some(format!("identifier is longer than {MAX_IDENT_LEN} characters"));
    }
    if let Some(prefix) = RESERVED_PREFIXES.iter().find(|p| name.starts_with(*p)) {
        return Some(format!(
            "identifier '{name}' starts with the reserved prefix '{prefix}'"
        ));
    }
    if name.contains("__") {
        return Some(format!(
            "identifier '{name}' contains a double underscore, which is reserved"
        ));
    }
    if RESERVED_WORDS.contains(&name) {
        return Some(format!("'{name}' is a reserved word"));
    }
    None
}

fn has_repeated_component(field: &str) -> bool {
    field
        .char_indices()
        .any(|(i, c)| field[i + c.len_utf8()..].contains(c))
}

impl<'a> Checker<'a> {
    pub(super) fn lookup(&self, name: &str) -> Option<Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .or_else(|| self.globals.get(name).copied())
    }

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(super) fn declare_local(
        &mut self,
        ctx: &BodyCtx,
        stmt: &Stmt,
        name: &str,
        ty: Type,
        mutability: Mutability,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if let Some(message) = reserved_name(name) {
            diagnostics.push(Diagnostic::error(message, stmt.span));
        }
        if find_builtin(name).is_some()
            || matches!(
                self.globals.get(name),
                Some(Symbol::Function(_) | Symbol::Procedure(_))
            )
        {
            diagnostics.push(Diagnostic::error(
                format!("local '{name}' shadows a function"),
                stmt.span,
            ));
            return diagnostics;
        }
        // still bound, so later reads see this entry
        if self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
        {
            diagnostics.push(Diagnostic::error(
                format!("'{name}' is already declared in this scope"),
                stmt.span,
            ));
        }

        let id = LocalId(self.out.locals.len());
        self.out.locals.push(LocalInfo {
            name: name.to_string(),
            ty,
            mutability,
            span: stmt.span,
            pass: ctx.render_level.then_some(ctx.pass),
        });
        self.out.local_decls.insert(stmt.id, id);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Symbol::Local(id));
        }
        diagnostics
    }

    /// Assignability of an already checked expression.
    pub(super) fn lvalue(&self, id: ExprId) -> LValue {
        match &self.program.exprs[id].kind {
            ExprKind::Ident(_) => match self.out.symbols.get(&id) {
                Some(Symbol::Local(local)) => match self.out.locals[local.0].mutability {
                    Mutability::Mutable => LValue::Valid,
                    Mutability::Const => LValue::Const,
                    Mutability::Final => LValue::Final,
                },
                Some(Symbol::FnParam(..)) => LValue::Valid,
                Some(Symbol::ProcParam(..)) => LValue::Final,
                Some(Symbol::Def(_) | Symbol::Uniform(_)) => LValue::Const,
                _ => LValue::Invalid,
            },
            ExprKind::Member { base, field } => {
                if has_repeated_component(field) {
                    LValue::Invalid
                } else {
                    self.lvalue(*base)
                }
            }
            ExprKind::Subscript { base, .. } => self.lvalue(*base),
            _ => LValue::Invalid,
        }
    }

    /// Name of the variable an l-value expression ultimately designates.
    fn root_name(&self, id: ExprId) -> Option<&'a str> {
        let program = self.program;
        match &program.exprs[id].kind {
            ExprKind::Ident(name) => Some(name.as_str()),
            ExprKind::Member { base, .. } | ExprKind::Subscript { base, .. } => {
                self.root_name(*base)
            }
            _ => None,
        }
    }

    pub(super) fn require_assignable(&self, target: ExprId, span: Span) -> Result<(), Vec<Diagnostic>> {
        let name = self.root_name(target).unwrap_or("expression");
        let message = match self.lvalue(target) {
            LValue::Valid => return Ok(()),
            LValue::Const => format!("cannot assign to constant '{name}'"),
            LValue::Final => {
                let mut root = target;
                while let ExprKind::Member { base, .. } | ExprKind::Subscript { base, .. } =
                    &self.program.exprs[root].kind
                {
                    root = *base;
                }
                if matches!(self.out.symbols.get(&root), Some(Symbol::ProcParam(..))) {
                    format!("cannot assign to procedure parameter '{name}'")
                } else {
                    return Err(vec![
                        Diagnostic::error(
                            format!("cannot assign to '{name}' because it is not declared 'mut'"),
                            span,
                        )
                        .with_hint(&format!("declare it with 'mut {name} := ...'")),
                    ]);
                }
            }
            LValue::Invalid => match &self.program.exprs[target].kind {
                ExprKind::Member { field, .. } if has_repeated_component(field) => {
                    format!("cannot assign to swizzle '.{field}' because it has a repeated component")
                }
                _ => "this expression cannot be assigned to".to_string(),
            },
        };
        Err(vec![Diagnostic::error(message, span)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_repeated_components() {
        assert!(has_repeated_component("xx"));
        assert!(has_repeated_component("xyx"));
        assert!(!has_repeated_component("xyzw"));
        assert!(!has_repeated_component("r"));
    }
}
