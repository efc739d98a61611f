//! Expression typing.
//!
//! Built-in and user calls resolve against prototype tables. Constructors
//! are checked by counting components instead. A scalar takes one argument.
//! A vector or matrix takes a single scalar, a single value with enough
//! components (a matrix for a matrix), or a list whose last argument
//! reaches the target size. An array takes one element-typed argument per
//! slot.

use crate::ast::{Args, ExprId, ExprKind, Input, UnaryOp};
use crate::builtins::find_builtin;
use crate::color::parse_color;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::types::{ScalarKind, Type, binary_typing, compatible, unary_typing};

use super::{
    BodyCtx, Checker, ConstInt, FnId, FragRead, Owner, ParamInfo, Symbol, TextureRef,
};

const CONST_HINT: &str = "use an integer literal, a def bound to an integer literal, or a procedure parameter";

const SWIZZLE_SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];

fn error<T>(message: impl Into<String>, span: Span) -> Result<T, Vec<Diagnostic>> {
    Err(vec![Diagnostic::error(message, span)])
}

fn type_list(types: &[Type]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

impl<'a> Checker<'a> {
    /// Type of an expression, computed at most once.
    ///
    /// A failure is cached too: asking again yields an empty error list, so
    /// an expression reached twice is reported once.
    pub(super) fn expr(&mut self, ctx: &BodyCtx, id: ExprId) -> Result<Type, Vec<Diagnostic>> {
        if let Some(cached) = self.cache.get(&id) {
            return cached.clone().ok_or_else(Vec::new);
        }
        let result = self.expr_uncached(ctx, id);
        let ty = result.as_ref().ok().cloned();
        if let Some(ty) = &ty {
            self.out.types.insert(id, ty.clone());
        }
        self.cache.insert(id, ty);
        result
    }

    /// Check several expressions, keeping every failure.
    fn collect(&mut self, ctx: &BodyCtx, ids: &[ExprId]) -> Result<Vec<Type>, Vec<Diagnostic>> {
        let mut types = Vec::with_capacity(ids.len());
        let mut diagnostics = Vec::new();
        let mut failed = false;
        for &id in ids {
            match self.expr(ctx, id) {
                Ok(ty) => types.push(ty),
                Err(found) => {
                    failed = true;
                    diagnostics.extend(found);
                }
            }
        }
        if failed { Err(diagnostics) } else { Ok(types) }
    }

    fn expr_uncached(&mut self, ctx: &BodyCtx, id: ExprId) -> Result<Type, Vec<Diagnostic>> {
        let program = self.program;
        let node = &program.exprs[id];
        let span = node.span;
        match &node.kind {
            ExprKind::Float(_) => Ok(Type::FLOAT),
            ExprKind::Int(value) => {
                if *value > i64::from(u32::MAX) {
                    error(format!("integer literal {value} does not fit in 32 bits"), span)
                } else {
                    Ok(Type::INT)
                }
            }
            ExprKind::Uint(value) => {
                if *value > u64::from(u32::MAX) {
                    error(format!("unsigned literal {value}u does not fit in 32 bits"), span)
                } else {
                    Ok(Type::UINT)
                }
            }
            ExprKind::Bool(_) => Ok(Type::BOOL),
            ExprKind::Color { text, size } => match parse_color(text) {
                Some(_) => Ok(Type::with_size(ScalarKind::Float, *size)),
                None => Err(vec![
                    Diagnostic::error(format!("'{text}' is not a colour"), span).with_hint(
                        "use #rgb, #rgba, #rrggbb, #rrggbbaa or a CSS colour name",
                    ),
                ]),
            },
            ExprKind::Ident(name) => self.ident(ctx, id, name, span),
            ExprKind::Input(input) => Ok(match input {
                Input::Time => Type::FLOAT,
                Input::Pos | Input::NPos | Input::Res => Type::VEC2,
            }),
            ExprKind::Frag { unit, args } => self.frag(ctx, id, *unit, args.as_ref(), span),
            ExprKind::Prev { uv } => self.prev(ctx, id, *uv, span),
            ExprKind::Binary { op, left, right } => {
                let types = self.collect(ctx, &[*left, *right])?;
                binary_typing(*op, &types[0], &types[1])
                    .map_err(|message| vec![Diagnostic::error(message, span)])
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.expr(ctx, *operand)?;
                if op.is_step() {
                    self.require_assignable(*operand, span)?;
                }
                unary_typing(*op, &ty).map_err(|message| vec![Diagnostic::error(message, span)])
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let types = self.collect(ctx, &[*cond, *then_expr, *else_expr])?;
                let mut diagnostics = Vec::new();
                if !compatible(&Type::BOOL, &types[0]) {
                    diagnostics.push(Diagnostic::error(
                        format!("condition must be a bool, found {}", types[0]),
                        program.exprs[*cond].span,
                    ));
                }
                if !compatible(&types[1], &types[2]) {
                    diagnostics.push(Diagnostic::error(
                        format!(
                            "both branches of '?:' must have the same type, found {} and {}",
                            types[1], types[2]
                        ),
                        span,
                    ));
                }
                if !diagnostics.is_empty() {
                    return Err(diagnostics);
                }
                Ok(if types[1].is_undecided() {
                    types[2].clone()
                } else {
                    types[1].clone()
                })
            }
            ExprKind::Call { callee, args } => self.call(ctx, id, callee, args, span),
            ExprKind::Construct { ty, args } => self.construct(ctx, ty, args, span),
            ExprKind::Subscript { base, index } => self.subscript(ctx, *base, *index, span),
            ExprKind::Member { base, field } => {
                let base_ty = self.expr(ctx, *base)?;
                swizzle(&base_ty, field, span)
            }
            ExprKind::Length { base } => match self.expr(ctx, *base)? {
                Type::Array(..) | Type::Vector(..) | Type::Matrix { .. } | Type::Undecided => {
                    Ok(Type::INT)
                }
                other => error(
                    format!(".length() needs an array, vector or matrix, found {other}"),
                    span,
                ),
            },
        }
    }

    fn ident(
        &mut self,
        ctx: &BodyCtx,
        id: ExprId,
        name: &str,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        let Some(symbol) = self.lookup(name) else {
            return error(format!("undefined identifier '{name}'"), span);
        };
        self.out.symbols.insert(id, symbol);
        match symbol {
            Symbol::Def(def) => Ok(self.out.defs[def].ty.clone()),
            Symbol::Uniform(uniform) => Ok(self.out.uniforms[uniform].ty.clone()),
            Symbol::Function(_) => error(
                format!("'{name}' is a function; call it with arguments"),
                span,
            ),
            Symbol::Procedure(_) => error(
                format!("'{name}' is a procedure; call it as a statement"),
                span,
            ),
            Symbol::Local(local) => {
                let info = &self.out.locals[local.0];
                match info.pass {
                    Some(pass) if pass != ctx.pass => Err(vec![
                        Diagnostic::error(
                            format!("'{name}' belongs to an earlier pass and is not available here"),
                            span,
                        )
                        .with_hint(
                            "values do not survive a refresh, a nested render block or a multi-pass procedure call",
                        ),
                    ]),
                    _ => Ok(info.ty.clone()),
                }
            }
            Symbol::FnParam(function, index) => {
                Ok(self.out.functions[function.0].params[index].ty.clone())
            }
            Symbol::ProcParam(procedure, index) => {
                let param = &mut self.out.procedures[procedure.0].params[index];
                if param.runtime_use.is_none() {
                    param.runtime_use = Some(span);
                }
                Ok(param.ty.clone())
            }
        }
    }

    /// Reduce an expression to a compile-time constant integer.
    ///
    /// Accepts an integer literal with an optional sign, a def bound to one,
    /// or a parameter of the procedure being checked. That parameter is
    /// marked pure, which in turn forces its callers' arguments through
    /// this same routine.
    pub(super) fn const_int(&mut self, ctx: &BodyCtx, id: ExprId) -> Result<ConstInt, Vec<Diagnostic>> {
        if let Some(value) = self.out.const_ints.get(&id) {
            return Ok(*value);
        }
        let value = self.const_int_uncached(ctx, id)?;
        self.out.const_ints.insert(id, value);
        self.out.types.insert(id, Type::INT);
        self.cache.insert(id, Some(Type::INT));
        Ok(value)
    }

    fn const_int_uncached(&mut self, ctx: &BodyCtx, id: ExprId) -> Result<ConstInt, Vec<Diagnostic>> {
        let program = self.program;
        let node = &program.exprs[id];
        let span = node.span;
        if let Some(value) = literal_int(program, id) {
            return Ok(ConstInt::Value(value));
        }
        let ExprKind::Ident(name) = &node.kind else {
            return Err(vec![
                Diagnostic::error("expected a compile-time constant integer", span)
                    .with_hint(CONST_HINT),
            ]);
        };
        let Some(symbol) = self.lookup(name) else {
            return error(format!("undefined identifier '{name}'"), span);
        };
        self.out.symbols.insert(id, symbol);
        match symbol {
            Symbol::Def(def) => match literal_int(program, self.out.defs[def].value) {
                Some(value) => Ok(ConstInt::Value(value)),
                None => Err(vec![
                    Diagnostic::error(
                        format!("def '{name}' is not bound to an integer literal"),
                        span,
                    )
                    .with_hint(CONST_HINT),
                ]),
            },
            Symbol::ProcParam(procedure, index) if ctx.owner == Owner::Procedure(procedure) => {
                let param = &mut self.out.procedures[procedure.0].params[index];
                if param.ty != Type::INT {
                    return error(
                        format!(
                            "parameter '{name}' must be an int to be used as a texture or loop number, found {}",
                            param.ty
                        ),
                        span,
                    );
                }
                param.pure = true;
                Ok(ConstInt::Param(procedure, index))
            }
            Symbol::FnParam(..) => Err(vec![
                Diagnostic::error(
                    format!("function parameter '{name}' cannot be used as a texture or loop number"),
                    span,
                )
                .with_hint("take the number as a procedure parameter instead"),
            ]),
            _ => Err(vec![
                Diagnostic::error(
                    format!("'{name}' is not a compile-time constant integer"),
                    span,
                )
                .with_hint(CONST_HINT),
            ]),
        }
    }

    /// Whether a lone `frag(x)` argument is a texture number rather than a
    /// coordinate. Decided without marking parameters as runtime values.
    fn is_texture_number(&self, id: ExprId) -> bool {
        if literal_int(self.program, id).is_some() {
            return true;
        }
        let ExprKind::Ident(name) = &self.program.exprs[id].kind else {
            return false;
        };
        let ty = match self.lookup(name) {
            Some(Symbol::Def(def)) => &self.out.defs[def].ty,
            Some(Symbol::Uniform(uniform)) => &self.out.uniforms[uniform].ty,
            Some(Symbol::Local(local)) => &self.out.locals[local.0].ty,
            Some(Symbol::FnParam(function, index)) => {
                &self.out.functions[function.0].params[index].ty
            }
            Some(Symbol::ProcParam(procedure, index)) => {
                &self.out.procedures[procedure.0].params[index].ty
            }
            _ => return false,
        };
        *ty == Type::INT
    }

    fn check_uv(&mut self, ctx: &BodyCtx, uv: ExprId) -> Vec<Diagnostic> {
        let span = self.program.exprs[uv].span;
        match self.expr(ctx, uv) {
            Ok(ty) if ty == Type::INT || ty == Type::UINT => vec![
                Diagnostic::error("texture number must be a compile-time constant integer", span)
                    .with_hint(CONST_HINT),
            ],
            Ok(ty) if !compatible(&Type::VEC2, &ty) => vec![Diagnostic::error(
                format!("texture coordinate must be a vec2, found {ty}"),
                span,
            )],
            Ok(_) => Vec::new(),
            Err(found) => found,
        }
    }

    fn frag(
        &mut self,
        ctx: &BodyCtx,
        id: ExprId,
        unit: Option<u32>,
        args: Option<&Args>,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        if ctx.owner == Owner::Global {
            return error("texture reads are not allowed here", span);
        }
        let list = match args {
            None => Vec::new(),
            Some(Args::Positional(list)) => list.clone(),
            Some(Args::Named(_)) => return error("'frag' does not take named arguments", span),
        };
        let (index, uv) = match list.as_slice() {
            [] => (None, None),
            [one] if self.is_texture_number(*one) => (Some(*one), None),
            [one] => (None, Some(*one)),
            [index, uv] => (Some(*index), Some(*uv)),
            _ => {
                return error(
                    "'frag' takes at most a texture number and a vec2 coordinate",
                    span,
                );
            }
        };

        let mut diagnostics = Vec::new();
        let texture = match (unit, index) {
            (Some(unit), Some(index)) => {
                diagnostics.push(Diagnostic::error(
                    format!("texture number given twice: 'frag{unit}' already reads texture {unit}"),
                    self.program.exprs[index].span,
                ));
                None
            }
            (Some(unit), None) => Some(TextureRef::Unit(ConstInt::Value(i64::from(unit)))),
            (None, Some(index)) => match self.const_int(ctx, index) {
                Ok(value) => Some(TextureRef::Unit(value)),
                Err(found) => {
                    diagnostics.extend(found);
                    None
                }
            },
            (None, None) => Some(TextureRef::Input),
        };
        if let Some(uv) = uv {
            diagnostics.extend(self.check_uv(ctx, uv));
        }
        if let Owner::Function(_) = ctx.owner {
            let explicit = matches!(
                texture,
                Some(TextureRef::Unit(ConstInt::Value(value))) if value >= 0
            );
            if texture.is_some() && !explicit {
                diagnostics.push(Diagnostic::error(
                    "inside a function, 'frag' needs an explicit non-negative texture number",
                    span,
                ));
            }
        }

        match texture {
            Some(texture) if diagnostics.is_empty() => {
                self.out.frag_reads.insert(id, FragRead { texture, uv });
                Ok(Type::VEC4)
            }
            _ => Err(diagnostics),
        }
    }

    fn prev(
        &mut self,
        ctx: &BodyCtx,
        id: ExprId,
        uv: Option<ExprId>,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        if !matches!(ctx.owner, Owner::Render | Owner::Procedure(_)) {
            return error(
                "'prev' is only available in render blocks and procedures",
                span,
            );
        }
        if let Some(uv) = uv {
            let found = self.check_uv(ctx, uv);
            if !found.is_empty() {
                return Err(found);
            }
        }
        self.out.frag_reads.insert(
            id,
            FragRead {
                texture: TextureRef::Output,
                uv,
            },
        );
        Ok(Type::VEC4)
    }

    fn call(
        &mut self,
        ctx: &BodyCtx,
        id: ExprId,
        callee: &str,
        args: &Args,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        if let Some(builtin) = find_builtin(callee) {
            let Args::Positional(list) = args else {
                return error(
                    format!("built-in function '{callee}' does not take named arguments"),
                    span,
                );
            };
            let types = self.collect(ctx, list)?;
            if types.iter().any(Type::is_undecided) {
                return Ok(Type::Undecided);
            }
            return builtin.resolve(&types).ok_or_else(|| {
                vec![Diagnostic::error(
                    format!("no overload of '{callee}' accepts ({})", type_list(&types)),
                    span,
                )]
            });
        }

        match self.lookup(callee) {
            Some(Symbol::Function(function)) => {
                self.out.symbols.insert(id, Symbol::Function(function));
                self.user_call(ctx, id, function, callee, args, span)
            }
            Some(Symbol::Procedure(_)) => error(
                format!("procedure '{callee}' cannot be used in an expression; call it as a statement"),
                span,
            ),
            Some(_) => error(format!("'{callee}' is not a function"), span),
            None => error(format!("undefined function '{callee}'"), span),
        }
    }

    fn user_call(
        &mut self,
        ctx: &BodyCtx,
        id: ExprId,
        function: FnId,
        callee: &str,
        args: &Args,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        if !self.ensure_function(function) {
            return error(
                format!("recursive call to '{callee}' is not allowed"),
                span,
            );
        }
        let params = self.out.functions[function.0].params.clone();
        let mapping = map_args(callee, &params, args, span)?;
        let mut diagnostics = Vec::new();
        for (param, slot) in params.iter().zip(&mapping) {
            let Some(arg) = *slot else { continue };
            match self.expr(ctx, arg) {
                Ok(ty) if !compatible(&param.ty, &ty) => diagnostics.push(Diagnostic::error(
                    format!(
                        "argument '{}' of '{callee}' expects {}, found {ty}",
                        param.name, param.ty
                    ),
                    self.program.exprs[arg].span,
                )),
                Ok(_) => {}
                Err(found) => diagnostics.extend(found),
            }
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        self.out.call_args.insert(id, mapping);
        Ok(self.out.functions[function.0].ret.clone())
    }

    fn construct(
        &mut self,
        ctx: &BodyCtx,
        ty: &Type,
        args: &Args,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        let Args::Positional(list) = args else {
            return error("constructors do not take named arguments", span);
        };
        if list.is_empty() {
            return error(format!("constructor '{ty}' needs at least one argument"), span);
        }
        let types = self.collect(ctx, list)?;

        if let Type::Array(elem, size) = ty {
            let mut diagnostics = Vec::new();
            for (arg, arg_ty) in list.iter().zip(&types) {
                if arg_ty.is_array() || !compatible(elem, arg_ty) {
                    diagnostics.push(Diagnostic::error(
                        format!("array element must be {elem}, found {arg_ty}"),
                        self.program.exprs[*arg].span,
                    ));
                }
            }
            if *size != 0 && *size != list.len() {
                diagnostics.push(Diagnostic::error(
                    format!(
                        "'{ty}' needs exactly {}, found {}",
                        plural(*size, "element"),
                        list.len()
                    ),
                    span,
                ));
            }
            if !diagnostics.is_empty() {
                return Err(diagnostics);
            }
            return Ok(Type::Array(elem.clone(), list.len()));
        }

        if types.iter().any(Type::is_undecided) {
            return Ok(ty.clone());
        }
        if let Some(array) = types.iter().find(|t| t.is_array()) {
            return error(format!("cannot construct {ty} from an array {array}"), span);
        }
        let needed = ty.component_count().unwrap_or(1);
        match (ty, types.as_slice()) {
            (Type::Scalar(_), [_]) => Ok(ty.clone()),
            (Type::Scalar(_), _) => error(
                format!("'{ty}' constructor takes exactly one argument"),
                span,
            ),
            (_, [single]) if single.is_scalar() => Ok(ty.clone()),
            (Type::Matrix { .. }, [single]) if single.is_matrix() => Ok(ty.clone()),
            (Type::Matrix { .. }, _) if types.len() > 1 && types.iter().any(Type::is_matrix) => {
                error(
                    format!("'{ty}' cannot be built from a matrix and other arguments"),
                    span,
                )
            }
            (Type::Vector(..), [single]) => {
                let have = single.component_count().unwrap_or(0);
                if have >= needed {
                    Ok(ty.clone())
                } else {
                    error(
                        format!("not enough components for '{ty}': need {needed}, found {have}"),
                        span,
                    )
                }
            }
            _ => {
                let mut have = 0;
                for arg_ty in &types {
                    if have >= needed {
                        return error(format!("too many arguments to constructor '{ty}'"), span);
                    }
                    have += arg_ty.component_count().unwrap_or(0);
                }
                if have < needed {
                    return error(
                        format!("not enough components for '{ty}': need {needed}, found {have}"),
                        span,
                    );
                }
                Ok(ty.clone())
            }
        }
    }

    fn subscript(
        &mut self,
        ctx: &BodyCtx,
        base: ExprId,
        index: ExprId,
        span: Span,
    ) -> Result<Type, Vec<Diagnostic>> {
        let types = self.collect(ctx, &[base, index])?;
        let (base_ty, index_ty) = (&types[0], &types[1]);
        if !matches!(*index_ty, Type::Undecided) && *index_ty != Type::INT && *index_ty != Type::UINT
        {
            return error(
                format!("index must be an int or uint, found {index_ty}"),
                self.program.exprs[index].span,
            );
        }
        let (elem, len) = match base_ty {
            Type::Array(elem, len) => ((**elem).clone(), *len),
            Type::Vector(kind, len) => (Type::Scalar(*kind), usize::from(*len)),
            Type::Matrix { cols, rows } => (
                Type::Vector(ScalarKind::Float, *rows),
                usize::from(*cols),
            ),
            Type::Undecided => return Ok(Type::Undecided),
            other => return error(format!("cannot index a value of type {other}"), span),
        };
        if let Some(value) = self.provable_int(index) {
            let out_of_range = value < 0 || (len > 0 && value as usize >= len);
            if out_of_range {
                return error(
                    format!(
                        "index {value} is out of range for {base_ty} (valid indices are 0 to {})",
                        len.saturating_sub(1)
                    ),
                    self.program.exprs[index].span,
                );
            }
        }
        Ok(elem)
    }

    /// Integer value of an index known without any substitution.
    fn provable_int(&self, id: ExprId) -> Option<i64> {
        if let Some(value) = literal_int(self.program, id) {
            return Some(value);
        }
        match self.out.symbols.get(&id) {
            Some(Symbol::Def(def)) => literal_int(self.program, self.out.defs[*def].value),
            _ => None,
        }
    }
}

/// An integer literal, optionally with a leading `-` or `+`.
pub(crate) fn literal_int(program: &crate::ast::Program, id: ExprId) -> Option<i64> {
    match &program.exprs[id].kind {
        ExprKind::Int(value) => Some(*value),
        ExprKind::Unary {
            op: op @ (UnaryOp::Neg | UnaryOp::Plus),
            operand,
        } => match program.exprs[*operand].kind {
            ExprKind::Int(value) if *op == UnaryOp::Neg => Some(-value),
            ExprKind::Int(value) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

/// Map call arguments onto parameter slots; `None` takes the default.
pub(super) fn map_args(
    callee: &str,
    params: &[ParamInfo],
    args: &Args,
    span: Span,
) -> Result<Vec<Option<ExprId>>, Vec<Diagnostic>> {
    let mut slots = vec![None; params.len()];
    let mut diagnostics = Vec::new();
    match args {
        Args::Positional(list) => {
            if list.len() > params.len() {
                return error(
                    format!(
                        "'{callee}' takes at most {}, found {}",
                        plural(params.len(), "argument"),
                        list.len()
                    ),
                    span,
                );
            }
            for (slot, arg) in slots.iter_mut().zip(list) {
                *slot = Some(*arg);
            }
        }
        Args::Named(list) => {
            for arg in list {
                match params.iter().position(|p| p.name == arg.name) {
                    None => diagnostics.push(Diagnostic::error(
                        format!("'{callee}' has no parameter named '{}'", arg.name),
                        arg.span,
                    )),
                    Some(i) if slots[i].is_some() => diagnostics.push(Diagnostic::error(
                        format!("parameter '{}' is given more than once", arg.name),
                        arg.span,
                    )),
                    Some(i) => slots[i] = Some(arg.value),
                }
            }
        }
    }
    for (param, slot) in params.iter().zip(&slots) {
        if slot.is_none() && param.default.is_none() {
            diagnostics.push(Diagnostic::error(
                format!("missing argument for parameter '{}' of '{callee}'", param.name),
                span,
            ));
        }
    }
    if diagnostics.is_empty() {
        Ok(slots)
    } else {
        Err(diagnostics)
    }
}

fn swizzle(base: &Type, field: &str, span: Span) -> Result<Type, Vec<Diagnostic>> {
    let (kind, size) = match base {
        Type::Undecided => return Ok(Type::Undecided),
        Type::Vector(kind, size) => (*kind, *size),
        other => return error(format!("type {other} has no field '{field}'"), span),
    };
    if field.is_empty() || field.len() > 4 {
        return error(format!("'.{field}' is not a valid swizzle"), span);
    }
    let Some(set) = SWIZZLE_SETS
        .iter()
        .find(|set| field.chars().all(|c| set.contains(c)))
    else {
        return Err(vec![
            Diagnostic::error(format!("'.{field}' is not a valid swizzle"), span)
                .with_hint("components must all come from one of xyzw, rgba or stpq"),
        ]);
    };
    for c in field.chars() {
        let position = set.find(c).unwrap_or(0);
        if position >= usize::from(size) {
            return error(
                format!("'.{field}' reads component '{c}' but {base} has only {size} components"),
                span,
            );
        }
    }
    Ok(Type::with_size(kind, field.len() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzle_rules() {
        let vec3: Type = "vec3".parse().expect("type");
        assert_eq!(swizzle(&vec3, "xy", Span::default()), Ok(Type::VEC2));
        assert_eq!(swizzle(&vec3, "b", Span::default()), Ok(Type::FLOAT));
        assert!(swizzle(&vec3, "w", Span::default()).is_err());
        assert!(swizzle(&vec3, "xg", Span::default()).is_err());
        assert!(swizzle(&Type::FLOAT, "x", Span::default()).is_err());
    }

    #[test]
    fn plural_wording() {
        assert_eq!(plural(1, "argument"), "1 argument");
        assert_eq!(plural(3, "argument"), "3 arguments");
    }
}
