//! Procedure expansion.
//!
//! Procedure calls are inlined into their call sites. Instead of copying
//! AST nodes, each inlined body is tagged with a [`FrameId`]; the frame
//! records which argument expression (and in which frame) stands for every
//! parameter. References to a parameter are substituted when the code
//! generator reaches them, and render-block numbers are reduced to
//! concrete integers here.

use crate::ast::{ExprId, Program, RenderBlock, Stmt, StmtKind};
use crate::diagnostic::Diagnostic;
use crate::error::CompileError;
use crate::typecheck::{Analysis, ConstInt, ProcCallSite, ProcId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub usize);

/// The top level. Parameter defaults are evaluated here.
pub const ROOT: FrameId = FrameId(0);

/// One inlined procedure call.
#[derive(Debug, Clone)]
pub struct Frame {
    pub parent: Option<FrameId>,
    pub procedure: Option<ProcId>,
    /// Per parameter: the argument expression and the frame it is read in.
    pub args: Vec<(ExprId, FrameId)>,
}

/// A statement together with the frame its identifiers resolve in.
#[derive(Debug, Clone, Copy)]
pub struct Framed<'a> {
    pub frame: FrameId,
    pub stmt: &'a Stmt,
}

#[derive(Debug, Clone)]
pub enum Item<'a> {
    Stmt(Framed<'a>),
    Refresh,
    Block(ExpandedBlock<'a>),
}

/// A render block with every procedure call inlined and every number
/// resolved.
#[derive(Debug, Clone)]
pub struct ExpandedBlock<'a> {
    pub once: bool,
    pub in_num: u32,
    pub out_num: u32,
    pub loop_num: u32,
    pub body: Vec<Item<'a>>,
}

impl ExpandedBlock<'_> {
    pub fn has_blocks(&self) -> bool {
        self.body.iter().any(|item| matches!(item, Item::Block(_)))
    }
}

#[derive(Debug)]
pub struct Expansion<'a> {
    pub frames: Vec<Frame>,
    /// Top-level render blocks in source order.
    pub blocks: Vec<ExpandedBlock<'a>>,
}

impl Expansion<'_> {
    /// The argument standing for parameter `index` of the procedure inlined
    /// as `frame`.
    pub fn argument(&self, frame: FrameId, index: usize) -> Result<(ExprId, FrameId), CompileError> {
        self.frames
            .get(frame.0)
            .and_then(|f| f.args.get(index))
            .copied()
            .ok_or_else(|| {
                CompileError::internal(format!(
                    "frame {} has no argument for parameter {index}",
                    frame.0
                ))
            })
    }

    /// Reduce a checked constant to an integer in the given frame.
    pub fn resolve(
        &self,
        analysis: &Analysis,
        value: ConstInt,
        frame: FrameId,
    ) -> Result<i64, CompileError> {
        match value {
            ConstInt::Value(value) => Ok(value),
            ConstInt::Param(procedure, index) => {
                if self.frames[frame.0].procedure != Some(procedure) {
                    return Err(CompileError::internal(format!(
                        "parameter {index} of '{}' read outside its procedure",
                        analysis.procedures[procedure.0].name
                    )));
                }
                let (arg, arg_frame) = self.argument(frame, index)?;
                self.resolve_expr(analysis, arg, arg_frame)
            }
        }
    }

    pub fn resolve_expr(
        &self,
        analysis: &Analysis,
        id: ExprId,
        frame: FrameId,
    ) -> Result<i64, CompileError> {
        match analysis.const_ints.get(&id) {
            Some(value) => self.resolve(analysis, *value, frame),
            None => Err(CompileError::internal(format!(
                "expression {} was not reduced to a constant integer",
                id.0
            ))),
        }
    }
}

#[derive(Clone, Copy)]
enum NumberKind {
    Texture,
    Loop,
}

struct Expander<'a, 'b> {
    program: &'a Program,
    analysis: &'b Analysis,
    expansion: Expansion<'a>,
    diagnostics: Vec<Diagnostic>,
    calls: usize,
}

/// Inline every procedure call below the top-level render blocks.
pub fn expand<'a>(program: &'a Program, analysis: &Analysis) -> Result<Expansion<'a>, CompileError> {
    let mut expander = Expander {
        program,
        analysis,
        expansion: Expansion {
            frames: vec![Frame {
                parent: None,
                procedure: None,
                args: Vec::new(),
            }],
            blocks: Vec::new(),
        },
        diagnostics: Vec::new(),
        calls: 0,
    };
    for stmt in &program.body {
        if let StmtKind::RenderBlock(block) = &stmt.kind {
            let expanded = expander.block(block, ROOT, (0, 0))?;
            expander.expansion.blocks.push(expanded);
        }
    }
    log::debug!(
        "expanded {} procedure calls across {} render blocks",
        expander.calls,
        expander.expansion.blocks.len()
    );
    if expander.diagnostics.is_empty() {
        Ok(expander.expansion)
    } else {
        Err(CompileError::from(expander.diagnostics))
    }
}

impl<'a> Expander<'a, '_> {
    fn block(
        &mut self,
        block: &'a RenderBlock,
        frame: FrameId,
        parent: (u32, u32),
    ) -> Result<ExpandedBlock<'a>, CompileError> {
        let in_num = match block.in_num {
            Some(number) => self.number(number, frame, NumberKind::Texture)?,
            None => parent.0,
        };
        let out_num = match block.out_num {
            Some(number) => self.number(number, frame, NumberKind::Texture)?,
            None => parent.1,
        };
        let loop_num = match block.loop_num {
            Some(number) => self.number(number, frame, NumberKind::Loop)?,
            None => 1,
        };
        let mut body = Vec::new();
        self.items(&block.body, frame, (in_num, out_num), &mut body)?;
        Ok(ExpandedBlock {
            once: block.once,
            in_num,
            out_num,
            loop_num,
            body,
        })
    }

    /// Resolve a block number; out-of-range values become diagnostics and
    /// a placeholder so expansion can carry on.
    fn number(&mut self, id: ExprId, frame: FrameId, kind: NumberKind) -> Result<u32, CompileError> {
        let value = self.expansion.resolve_expr(self.analysis, id, frame)?;
        let span = self.program.exprs[id].span;
        let message = match kind {
            NumberKind::Texture if value < 0 => {
                format!("texture number resolves to {value}, which is negative")
            }
            NumberKind::Loop if value < 1 => {
                format!("loop count resolves to {value}, but must be at least 1")
            }
            _ => match u32::try_from(value) {
                Ok(value) => return Ok(value),
                Err(_) => format!("block number {value} is too large"),
            },
        };
        self.diagnostics.push(Diagnostic::error(message, span));
        Ok(match kind {
            NumberKind::Texture => 0,
            NumberKind::Loop => 1,
        })
    }

    fn items(
        &mut self,
        stmts: &'a [Stmt],
        frame: FrameId,
        io: (u32, u32),
        out: &mut Vec<Item<'a>>,
    ) -> Result<(), CompileError> {
        let analysis = self.analysis;
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Refresh => out.push(Item::Refresh),
                StmtKind::RenderBlock(block) => {
                    out.push(Item::Block(self.block(block, frame, io)?));
                }
                _ => match analysis.proc_calls.get(&stmt.id) {
                    Some(site) => self.inline(site, frame, io, out)?,
                    None => out.push(Item::Stmt(Framed { frame, stmt })),
                },
            }
        }
        Ok(())
    }

    fn inline(
        &mut self,
        site: &ProcCallSite,
        frame: FrameId,
        io: (u32, u32),
        out: &mut Vec<Item<'a>>,
    ) -> Result<(), CompileError> {
        let (program, analysis) = (self.program, self.analysis);
        let info = &analysis.procedures[site.procedure.0];
        let Some(StmtKind::Procedure(def)) = program.body.get(info.index).map(|s| &s.kind) else {
            return Err(CompileError::internal(format!(
                "procedure '{}' has no definition",
                info.name
            )));
        };

        let mut args = Vec::with_capacity(site.args.len());
        for (param, slot) in info.params.iter().zip(&site.args) {
            match (slot, param.default) {
                (Some(arg), _) => args.push((*arg, frame)),
                (None, Some(default)) => args.push((default, ROOT)),
                (None, None) => {
                    return Err(CompileError::internal(format!(
                        "missing argument '{}' for '{}'",
                        param.name, info.name
                    )));
                }
            }
        }
        let inner = FrameId(self.expansion.frames.len());
        self.expansion.frames.push(Frame {
            parent: Some(frame),
            procedure: Some(site.procedure),
            args,
        });
        self.calls += 1;
        self.items(&def.body, inner, io, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::typecheck::check;

    fn expand_source(source: &str) -> (Vec<(u32, u32, u32, bool)>, usize) {
        let program = parse(source).expect("parse");
        let analysis = check(&program).expect("check");
        let expansion = expand(&program, &analysis).expect("expand");
        let numbers = expansion
            .blocks
            .iter()
            .map(|b| (b.in_num, b.out_num, b.loop_num, b.once))
            .collect();
        (numbers, expansion.frames.len())
    }

    #[test]
    fn top_level_defaults() {
        let (blocks, frames) = expand_source("{ frag }\n2 -> loop 3 once { frag } -> 1");
        assert_eq!(blocks, vec![(0, 0, 1, false), (2, 1, 3, true)]);
        assert_eq!(frames, 1);
    }

    #[test]
    fn nested_blocks_inherit_numbers() {
        let program = parse("3 -> { frag\n { frag } -> 1\n loop 2 { frag } } -> 4").expect("parse");
        let analysis = check(&program).expect("check");
        let expansion = expand(&program, &analysis).expect("expand");
        let outer = &expansion.blocks[0];
        let inner: Vec<_> = outer
            .body
            .iter()
            .filter_map(|item| match item {
                Item::Block(b) => Some((b.in_num, b.out_num, b.loop_num)),
                _ => None,
            })
            .collect();
        assert_eq!(inner, vec![(3, 1, 1), (3, 4, 2)]);
    }

    #[test]
    fn procedure_numbers_come_from_arguments() {
        let source = "pr p(int n, int k = 2) { loop k { frag } -> n }\n{ p(5) }\n{ p(k: 4, n: 1) }";
        let program = parse(source).expect("parse");
        let analysis = check(&program).expect("check");
        let expansion = expand(&program, &analysis).expect("expand");
        let nested = |block: &ExpandedBlock| match &block.body[0] {
            Item::Block(b) => (b.out_num, b.loop_num),
            other => panic!("expected a block, got {other:?}"),
        };
        assert_eq!(nested(&expansion.blocks[0]), (5, 2));
        assert_eq!(nested(&expansion.blocks[1]), (1, 4));
    }

    #[test]
    fn two_levels_of_pure_parameters() {
        let source = "pr inner(int t) { frag(t) }\n\
                      pr outer(int t) { inner(t) }\n\
                      { outer(3) }";
        let program = parse(source).expect("parse");
        let analysis = check(&program).expect("check");
        let expansion = expand(&program, &analysis).expect("expand");
        assert_eq!(expansion.frames.len(), 3);
        let Item::Stmt(framed) = &expansion.blocks[0].body[0] else {
            panic!("expected a statement");
        };
        let StmtKind::Expr(read) = &framed.stmt.kind else {
            panic!("expected an expression statement");
        };
        let frag = analysis.frag_reads[read];
        let crate::typecheck::TextureRef::Unit(unit) = frag.texture else {
            panic!("expected an explicit unit");
        };
        assert_eq!(expansion.resolve(&analysis, unit, framed.frame).expect("resolve"), 3);
    }

    #[test]
    fn refresh_inside_procedures_reaches_the_caller() {
        let program = parse("pr p() { frag\n refresh\n frag }\n{ p() }").expect("parse");
        let analysis = check(&program).expect("check");
        let expansion = expand(&program, &analysis).expect("expand");
        let body = &expansion.blocks[0].body;
        assert_eq!(body.len(), 3);
        assert!(matches!(body[1], Item::Refresh));
    }

    #[test]
    fn negative_numbers_after_substitution_are_reported() {
        let program = parse("pr p(int n) { { frag } -> n }\n{ p(-2) }").expect("parse");
        let analysis = check(&program).expect("check");
        let err = expand(&program, &analysis).expect_err("negative output");
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("negative"));
        assert_eq!(diagnostics[0].span.line, 1);
    }
}
