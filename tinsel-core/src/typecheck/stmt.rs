//! Statement checking.

use crate::ast::{
    Args, AssignOp, ExprId, ExprKind, Mutability, RenderBlock, Stmt, StmtKind, VarDecl,
};
use crate::builtins::find_builtin;
use crate::diagnostic::Diagnostic;
use crate::span::Span;
use crate::types::{Type, binary_typing, compatible};

use super::expr::map_args;
use super::{BodyCtx, Checker, ConstInt, Owner, ProcCallSite, ProcId, ReturnCell, Symbol};

/// Whether every control path through `stmts` ends in a `return`.
pub(super) fn definitely_returns(stmts: &[Stmt]) -> bool {
    match stmts.last().map(|stmt| &stmt.kind) {
        Some(StmtKind::Return(_)) => true,
        Some(StmtKind::If {
            then_body,
            else_body: Some(else_body),
            ..
        }) => definitely_returns(then_body) && definitely_returns(else_body),
        _ => false,
    }
}

#[derive(Clone, Copy)]
enum BlockNumber {
    Input,
    Output,
    Loop,
}

impl<'a> Checker<'a> {
    pub(super) fn check_stmts(&mut self, ctx: &mut BodyCtx, stmts: &[Stmt]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for stmt in stmts {
            diagnostics.extend(self.check_stmt(ctx, stmt));
        }
        diagnostics
    }

    /// Check a nested statement list in its own scope, off the render level.
    fn check_nested(&mut self, ctx: &mut BodyCtx, stmts: &[Stmt]) -> Vec<Diagnostic> {
        let render_level = ctx.render_level;
        ctx.render_level = false;
        self.push_scope();
        let diagnostics = self.check_stmts(ctx, stmts);
        self.pop_scope();
        ctx.render_level = render_level;
        diagnostics
    }

    fn check_stmt(&mut self, ctx: &mut BodyCtx, stmt: &Stmt) -> Vec<Diagnostic> {
        let program = self.program;
        let top_level_only = |what: &str| {
            vec![Diagnostic::error(
                format!("{what} can only appear at the top level"),
                stmt.span,
            )]
        };
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.check_var_decl(ctx, stmt, decl),
            StmtKind::Assign { target, op, value } => {
                self.check_assign(ctx, *target, *op, *value, stmt.span)
            }
            StmtKind::Expr(id) => {
                // procedures may be declared after their callers
                if let ExprKind::Call { callee, args } = &program.exprs[*id].kind {
                    if let Some(Symbol::Procedure(procedure)) = self.lookup(callee) {
                        return self.check_proc_call(ctx, stmt, procedure, callee, args);
                    }
                }
                self.check_expr_stmt(ctx, *id)
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let mut diagnostics = self.check_condition(ctx, *cond);
                diagnostics.extend(self.check_nested(ctx, then_body));
                if let Some(else_body) = else_body {
                    diagnostics.extend(self.check_nested(ctx, else_body));
                }
                diagnostics
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self.check_for(ctx, init.as_deref(), *cond, update.as_deref(), body),
            StmtKind::Return(value) => self.check_return(ctx, *value, stmt.span),
            StmtKind::Refresh => {
                if !ctx.render_level {
                    return vec![Diagnostic::error(
                        "'refresh' must appear directly inside a render block or procedure",
                        stmt.span,
                    )];
                }
                ctx.pass = self.fresh_pass();
                self.mark_multi_pass(ctx);
                Vec::new()
            }
            StmtKind::Def { .. } => top_level_only("'def'"),
            StmtKind::Uniform { .. } => top_level_only("'uniform'"),
            StmtKind::Function(_) => top_level_only("functions"),
            StmtKind::Procedure(_) => top_level_only("procedures"),
            StmtKind::RenderBlock(block) => {
                if !ctx.render_level {
                    return vec![Diagnostic::error(
                        "render blocks can only appear at the top level or directly inside a render block or procedure",
                        stmt.span,
                    )];
                }
                self.check_render_block(ctx, stmt, block)
            }
        }
    }

    fn mark_multi_pass(&mut self, ctx: &BodyCtx) {
        if let Owner::Procedure(procedure) = ctx.owner {
            self.out.procedures[procedure.0].multi_pass = true;
        }
    }

    fn check_condition(&mut self, ctx: &BodyCtx, cond: ExprId) -> Vec<Diagnostic> {
        match self.expr(ctx, cond) {
            Ok(ty) if !compatible(&Type::BOOL, &ty) => vec![Diagnostic::error(
                format!("condition must be a bool, found {ty}"),
                self.program.exprs[cond].span,
            )],
            Ok(_) => Vec::new(),
            Err(found) => found,
        }
    }

    fn check_var_decl(&mut self, ctx: &mut BodyCtx, stmt: &Stmt, decl: &VarDecl) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let value_span = self.program.exprs[decl.value].span;
        let value_ty = match self.expr(ctx, decl.value) {
            Ok(ty) => {
                if decl.mutability == Mutability::Const && !self.is_constant(decl.value) {
                    diagnostics.push(Diagnostic::error(
                        format!(
                            "initializer of constant '{}' must be a constant expression",
                            decl.name
                        ),
                        value_span,
                    ));
                }
                ty
            }
            Err(found) => {
                diagnostics.extend(found);
                Type::Undecided
            }
        };
        let ty = match &decl.ty {
            Some(declared) => {
                if !compatible(declared, &value_ty) {
                    diagnostics.push(Diagnostic::error(
                        format!(
                            "cannot initialize '{}' of type {declared} with a value of type {value_ty}",
                            decl.name
                        ),
                        value_span,
                    ));
                }
                match (declared, &value_ty) {
                    (Type::Array(_, 0), Type::Array(..)) => value_ty.clone(),
                    _ => declared.clone(),
                }
            }
            None => value_ty,
        };
        diagnostics.extend(self.declare_local(ctx, stmt, &decl.name, ty, decl.mutability));
        diagnostics
    }

    fn check_assign(
        &mut self,
        ctx: &BodyCtx,
        target: ExprId,
        op: AssignOp,
        value: ExprId,
        span: Span,
    ) -> Vec<Diagnostic> {
        let types = match (self.expr(ctx, target), self.expr(ctx, value)) {
            (Ok(target_ty), Ok(value_ty)) => (target_ty, value_ty),
            (left, right) => {
                let mut diagnostics = left.err().unwrap_or_default();
                diagnostics.extend(right.err().unwrap_or_default());
                return diagnostics;
            }
        };
        if let Err(found) = self.require_assignable(target, span) {
            return found;
        }
        let (target_ty, value_ty) = types;
        let message = match op {
            AssignOp::Assign if !compatible(&target_ty, &value_ty) => {
                format!("cannot assign a value of type {value_ty} to {target_ty}")
            }
            AssignOp::Assign => return Vec::new(),
            AssignOp::Compound(bin) => match binary_typing(bin, &target_ty, &value_ty) {
                Ok(result) if compatible(&target_ty, &result) => return Vec::new(),
                Ok(result) => format!(
                    "'{}' would change the type of the target from {target_ty} to {result}",
                    op.symbol()
                ),
                Err(message) => message,
            },
        };
        vec![Diagnostic::error(message, span)]
    }

    fn check_expr_stmt(&mut self, ctx: &BodyCtx, id: ExprId) -> Vec<Diagnostic> {
        let ty = match self.expr(ctx, id) {
            Ok(ty) => ty,
            Err(found) => return found,
        };
        let is_step = matches!(
            self.program.exprs[id].kind,
            ExprKind::Unary { op, .. } if op.is_step()
        );
        if ctx.color && !is_step && !ty.is_undecided() && ty != Type::VEC4 {
            return vec![Diagnostic::error(
                format!("a bare expression in a render block must be a vec4 colour, found {ty}"),
                self.program.exprs[id].span,
            )];
        }
        Vec::new()
    }

    fn check_for(
        &mut self,
        ctx: &mut BodyCtx,
        init: Option<&Stmt>,
        cond: Option<ExprId>,
        update: Option<&Stmt>,
        body: &[Stmt],
    ) -> Vec<Diagnostic> {
        let (render_level, color) = (ctx.render_level, ctx.color);
        ctx.render_level = false;
        ctx.color = false;
        self.push_scope();

        let mut diagnostics = Vec::new();
        let clause_ok = |stmt: &Stmt| {
            matches!(
                stmt.kind,
                StmtKind::VarDecl(_) | StmtKind::Assign { .. } | StmtKind::Expr(_)
            )
        };
        if let Some(init) = init {
            if clause_ok(init) {
                diagnostics.extend(self.check_stmt(ctx, init));
            } else {
                diagnostics.push(Diagnostic::error("invalid for-loop initializer", init.span));
            }
        }
        if let Some(cond) = cond {
            diagnostics.extend(self.check_condition(ctx, cond));
        }
        if let Some(update) = update {
            if clause_ok(update) && !matches!(update.kind, StmtKind::VarDecl(_)) {
                diagnostics.extend(self.check_stmt(ctx, update));
            } else {
                diagnostics.push(Diagnostic::error("invalid for-loop update", update.span));
            }
        }
        ctx.color = color;
        diagnostics.extend(self.check_nested(ctx, body));

        self.pop_scope();
        ctx.render_level = render_level;
        diagnostics
    }

    fn check_return(&mut self, ctx: &mut BodyCtx, value: ExprId, span: Span) -> Vec<Diagnostic> {
        if !matches!(ctx.owner, Owner::Function(_)) {
            return vec![Diagnostic::error(
                "'return' is only allowed inside a function",
                span,
            )];
        }
        let ty = match self.expr(ctx, value) {
            Ok(ty) => ty,
            Err(found) => return found,
        };
        let value_span = self.program.exprs[value].span;
        match &ctx.ret {
            ReturnCell::Declared(declared) if !compatible(declared, &ty) => {
                vec![Diagnostic::error(
                    format!("function returns {declared}, but this return gives {ty}"),
                    value_span,
                )]
            }
            ReturnCell::Unset => {
                ctx.ret = ReturnCell::Set(ty, value_span);
                Vec::new()
            }
            ReturnCell::Set(first, at) if !compatible(first, &ty) => {
                let message = format!(
                    "return type mismatch: this returns {ty} but the return at {at} returns {first}"
                );
                ctx.ret = ReturnCell::Poisoned;
                vec![Diagnostic::error(message, value_span)]
            }
            _ => Vec::new(),
        }
    }

    fn check_proc_call(
        &mut self,
        ctx: &mut BodyCtx,
        stmt: &Stmt,
        procedure: ProcId,
        name: &str,
        args: &Args,
    ) -> Vec<Diagnostic> {
        if !ctx.render_level {
            return vec![Diagnostic::error(
                "procedure calls must appear directly inside a render block or procedure",
                stmt.span,
            )];
        }
        if !self.ensure_procedure(procedure) {
            return vec![Diagnostic::error(
                format!("recursive call to procedure '{name}' is not allowed"),
                stmt.span,
            )];
        }

        let params = self.out.procedures[procedure.0].params.clone();
        let mapping = match map_args(name, &params, args, stmt.span) {
            Ok(mapping) => mapping,
            Err(found) => return found,
        };
        let mut diagnostics = Vec::new();
        for (param, slot) in params.iter().zip(&mapping) {
            let Some(arg) = *slot else { continue };
            if param.pure {
                if let Err(found) = self.const_int(ctx, arg) {
                    diagnostics.extend(found);
                }
                continue;
            }
            match self.expr(ctx, arg) {
                Ok(ty) if !compatible(&param.ty, &ty) => diagnostics.push(Diagnostic::error(
                    format!(
                        "argument '{}' of '{name}' expects {}, found {ty}",
                        param.name, param.ty
                    ),
                    self.program.exprs[arg].span,
                )),
                Ok(_) => {}
                Err(found) => diagnostics.extend(found),
            }
        }

        if self.out.procedures[procedure.0].multi_pass {
            for arg in mapping.iter().flatten() {
                if let Some(local) = self.pass_local_in(*arg) {
                    diagnostics.push(Diagnostic::error(
                        format!(
                            "'{local}' is a render-level local and cannot be passed to multi-pass procedure '{name}'"
                        ),
                        self.program.exprs[*arg].span,
                    ));
                }
            }
            ctx.pass = self.fresh_pass();
            self.mark_multi_pass(ctx);
        }
        self.out.proc_calls.insert(
            stmt.id,
            ProcCallSite {
                procedure,
                args: mapping,
            },
        );
        diagnostics
    }

    /// First render-level local read anywhere inside `id`.
    fn pass_local_in(&self, id: ExprId) -> Option<&str> {
        let node = &self.program.exprs[id];
        if let Some(Symbol::Local(local)) = self.out.symbols.get(&id) {
            let info = &self.out.locals[local.0];
            if info.pass.is_some() {
                return Some(&info.name);
            }
        }
        node.kind
            .children()
            .into_iter()
            .find_map(|child| self.pass_local_in(child))
    }

    pub(super) fn check_render_block(
        &mut self,
        ctx: &mut BodyCtx,
        stmt: &Stmt,
        block: &RenderBlock,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let numbers = [
            (block.in_num, BlockNumber::Input),
            (block.out_num, BlockNumber::Output),
            (block.loop_num, BlockNumber::Loop),
        ];
        for (number, kind) in numbers {
            let Some(number) = number else { continue };
            match self.const_int(ctx, number) {
                Ok(ConstInt::Value(value)) => {
                    let message = match kind {
                        BlockNumber::Input | BlockNumber::Output if value < 0 => {
                            Some(format!("texture number must be non-negative, found {value}"))
                        }
                        BlockNumber::Loop if value < 1 => {
                            Some(format!("loop count must be at least 1, found {value}"))
                        }
                        _ => None,
                    };
                    if let Some(message) = message {
                        diagnostics.push(Diagnostic::error(
                            message,
                            self.program.exprs[number].span,
                        ));
                    }
                }
                Ok(ConstInt::Param(..)) => {}
                Err(found) => diagnostics.extend(found),
            }
        }
        if block.body.iter().all(|member| matches!(member.kind, StmtKind::Refresh)) {
            diagnostics.push(Diagnostic::error("render block is empty", stmt.span));
        }

        let (render_level, color) = (ctx.render_level, ctx.color);
        ctx.render_level = true;
        ctx.color = true;
        ctx.pass = self.fresh_pass();
        self.push_scope();
        diagnostics.extend(self.check_stmts(ctx, &block.body));
        self.pop_scope();
        ctx.pass = self.fresh_pass();
        ctx.render_level = render_level;
        ctx.color = color;
        self.mark_multi_pass(ctx);
        diagnostics
    }

    /// Whether an already checked expression is a GLSL constant expression.
    pub(super) fn is_constant(&self, id: ExprId) -> bool {
        let node = &self.program.exprs[id];
        match &node.kind {
            ExprKind::Float(_)
            | ExprKind::Int(_)
            | ExprKind::Uint(_)
            | ExprKind::Bool(_)
            | ExprKind::Color { .. } => true,
            ExprKind::Ident(_) => match self.out.symbols.get(&id) {
                Some(Symbol::Def(_)) => true,
                Some(Symbol::Local(local)) => {
                    self.out.locals[local.0].mutability == Mutability::Const
                }
                _ => false,
            },
            ExprKind::Input(_) | ExprKind::Frag { .. } | ExprKind::Prev { .. } => false,
            ExprKind::Unary { op, operand } => !op.is_step() && self.is_constant(*operand),
            ExprKind::Call { callee, args } => {
                find_builtin(callee).is_some()
                    && args.exprs().into_iter().all(|arg| self.is_constant(arg))
            }
            kind => kind
                .children()
                .into_iter()
                .all(|child| self.is_constant(child)),
        }
    }
}
