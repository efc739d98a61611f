//! Pass IR.
//!
//! A regrouped render block becomes either a [`PassTree`] (loop metadata
//! and ordered children) or a [`PassLeaf`] (the statements of exactly one
//! GPU program plus the resources that program needs). A body must be
//! homogeneous by now: all statements or all sub-blocks.

use std::collections::{BTreeSet, HashSet};

use crate::ast::{ExprId, ExprKind, Input, Program, Stmt, StmtKind};
use crate::error::CompileError;
use crate::expand::{ExpandedBlock, Expansion, FrameId, Framed, Item, ROOT};
use crate::typecheck::{Analysis, FnId, FragRead, Symbol, TextureRef};

#[derive(Debug)]
pub enum PassNode<'a> {
    Tree(PassTree<'a>),
    Leaf(PassLeaf<'a>),
}

#[derive(Debug)]
pub struct PassTree<'a> {
    pub loop_num: u32,
    pub once: bool,
    pub children: Vec<PassNode<'a>>,
}

#[derive(Debug)]
pub struct PassLeaf<'a> {
    pub in_num: u32,
    pub out_num: u32,
    pub body: Vec<Framed<'a>>,
    pub resources: Resources,
}

/// External inputs one generated program declares.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resources {
    pub uses_time: bool,
    pub uses_res: bool,
    /// Indices into `Analysis::uniforms`; ordered as declared.
    pub uniforms: BTreeSet<usize>,
    pub samplers: BTreeSet<u32>,
    /// Reachable user functions, callees before callers.
    pub functions: Vec<FnId>,
}

impl PassTree<'_> {
    pub fn leaves(&self) -> Vec<&PassLeaf<'_>> {
        let mut out = Vec::new();
        for child in &self.children {
            match child {
                PassNode::Leaf(leaf) => out.push(leaf),
                PassNode::Tree(tree) => out.extend(tree.leaves()),
            }
        }
        out
    }
}

/// Texture unit a `frag`/`prev` read samples inside a leaf routed
/// `in_num -> out_num`.
pub fn texture_unit(
    expansion: &Expansion<'_>,
    analysis: &Analysis,
    read: &FragRead,
    frame: FrameId,
    (in_num, out_num): (u32, u32),
) -> Result<u32, CompileError> {
    match read.texture {
        TextureRef::Input => Ok(in_num),
        TextureRef::Output => Ok(out_num),
        TextureRef::Unit(value) => {
            let unit = expansion.resolve(analysis, value, frame)?;
            if unit < 0 {
                return Ok(in_num);
            }
            u32::try_from(unit)
                .map_err(|_| CompileError::internal(format!("texture unit {unit} out of range")))
        }
    }
}

/// Build the pass tree for the regrouped top-level blocks.
pub fn build<'a>(
    program: &Program,
    analysis: &Analysis,
    expansion: &Expansion<'a>,
    blocks: Vec<ExpandedBlock<'a>>,
) -> Result<PassTree<'a>, CompileError> {
    let builder = Builder {
        program,
        analysis,
        expansion,
    };
    let mut children = Vec::with_capacity(blocks.len());
    for block in blocks {
        children.push(builder.node(block)?);
    }
    let root = PassTree {
        loop_num: 1,
        once: false,
        children,
    };
    log::debug!("built pass tree with {} leaves", root.leaves().len());
    Ok(root)
}

struct Builder<'p, 'a> {
    program: &'p Program,
    analysis: &'p Analysis,
    expansion: &'p Expansion<'a>,
}

impl<'a> Builder<'_, 'a> {
    fn node(&self, block: ExpandedBlock<'a>) -> Result<PassNode<'a>, CompileError> {
        let mut stmts = Vec::new();
        let mut blocks = Vec::new();
        for item in block.body {
            match item {
                Item::Stmt(framed) => stmts.push(framed),
                Item::Block(nested) => blocks.push(nested),
                Item::Refresh => {
                    return Err(CompileError::internal(
                        "'refresh' marker survived regrouping",
                    ));
                }
            }
        }
        if !stmts.is_empty() && !blocks.is_empty() {
            return Err(CompileError::internal(
                "render block body mixes statements and sub-blocks",
            ));
        }

        if blocks.is_empty() {
            let leaf = self.leaf(block.in_num, block.out_num, stmts)?;
            if block.loop_num == 1 && !block.once {
                return Ok(PassNode::Leaf(leaf));
            }
            return Ok(PassNode::Tree(PassTree {
                loop_num: block.loop_num,
                once: block.once,
                children: vec![PassNode::Leaf(leaf)],
            }));
        }

        let mut children = Vec::with_capacity(blocks.len());
        for nested in blocks {
            children.push(self.node(nested)?);
        }
        Ok(PassNode::Tree(PassTree {
            loop_num: block.loop_num,
            once: block.once,
            children,
        }))
    }

    fn leaf(
        &self,
        in_num: u32,
        out_num: u32,
        body: Vec<Framed<'a>>,
    ) -> Result<PassLeaf<'a>, CompileError> {
        let mut collector = Collector {
            program: self.program,
            analysis: self.analysis,
            expansion: self.expansion,
            io: (in_num, out_num),
            resources: Resources::default(),
            visited: HashSet::new(),
        };
        for framed in &body {
            collector.stmt(framed.stmt, framed.frame)?;
        }
        Ok(PassLeaf {
            in_num,
            out_num,
            body,
            resources: collector.resources,
        })
    }
}

/// Walks a leaf (and every function it reaches) for the resources it uses.
struct Collector<'p, 'a> {
    program: &'p Program,
    analysis: &'p Analysis,
    expansion: &'p Expansion<'a>,
    io: (u32, u32),
    resources: Resources,
    visited: HashSet<FnId>,
}

impl Collector<'_, '_> {
    fn stmts(&mut self, stmts: &[Stmt], frame: FrameId) -> Result<(), CompileError> {
        for stmt in stmts {
            self.stmt(stmt, frame)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, frame: FrameId) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.expr(decl.value, frame),
            StmtKind::Assign { target, value, .. } => {
                self.expr(*target, frame)?;
                self.expr(*value, frame)
            }
            StmtKind::Expr(id) | StmtKind::Return(id) => self.expr(*id, frame),
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.expr(*cond, frame)?;
                self.stmts(then_body, frame)?;
                match else_body {
                    Some(else_body) => self.stmts(else_body, frame),
                    None => Ok(()),
                }
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.stmt(init, frame)?;
                }
                if let Some(cond) = cond {
                    self.expr(*cond, frame)?;
                }
                if let Some(update) = update {
                    self.stmt(update, frame)?;
                }
                self.stmts(body, frame)
            }
            _ => Err(CompileError::internal(format!(
                "statement at {} cannot appear in a pass body",
                stmt.span
            ))),
        }
    }

    fn expr(&mut self, id: ExprId, frame: FrameId) -> Result<(), CompileError> {
        let (program, analysis) = (self.program, self.analysis);
        match &program.exprs[id].kind {
            ExprKind::Ident(_) => match analysis.symbols.get(&id) {
                Some(Symbol::Uniform(uniform)) => {
                    self.resources.uniforms.insert(*uniform);
                }
                Some(Symbol::ProcParam(_, index)) => {
                    let (arg, arg_frame) = self.expansion.argument(frame, *index)?;
                    self.expr(arg, arg_frame)?;
                }
                _ => {}
            },
            ExprKind::Input(Input::Time) => self.resources.uses_time = true,
            ExprKind::Input(Input::Res | Input::NPos) => self.resources.uses_res = true,
            ExprKind::Frag { .. } | ExprKind::Prev { .. } => {
                let read = analysis.frag_reads.get(&id).ok_or_else(|| {
                    CompileError::internal(format!("texture read {} was never checked", id.0))
                })?;
                let unit = texture_unit(self.expansion, analysis, read, frame, self.io)?;
                self.resources.samplers.insert(unit);
            }
            ExprKind::Call { .. } => {
                if let Some(Symbol::Function(function)) = analysis.symbols.get(&id) {
                    self.function(*function)?;
                    let params = &analysis.functions[function.0].params;
                    let slots = analysis.call_args.get(&id).map(Vec::as_slice).unwrap_or(&[]);
                    for (param, slot) in params.iter().zip(slots) {
                        if let (None, Some(default)) = (slot, param.default) {
                            self.expr(default, ROOT)?;
                        }
                    }
                }
            }
            _ => {}
        }
        for child in program.exprs[id].kind.children() {
            self.expr(child, frame)?;
        }
        Ok(())
    }

    fn function(&mut self, function: FnId) -> Result<(), CompileError> {
        if !self.visited.insert(function) {
            return Ok(());
        }
        let (program, analysis) = (self.program, self.analysis);
        let info = &analysis.functions[function.0];
        let Some(StmtKind::Function(def)) = program.body.get(info.index).map(|s| &s.kind)
        else {
            return Err(CompileError::internal(format!(
                "function '{}' has no definition",
                info.name
            )));
        };
        self.stmts(&def.body, ROOT)?;
        self.resources.functions.push(function);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand;
    use crate::parser::parse;
    use crate::regroup::regroup;
    use crate::typecheck::check;

    fn with_tree(source: &str, inspect: impl FnOnce(&Analysis, &PassTree<'_>)) {
        let program = parse(source).expect("parse");
        let analysis = check(&program).expect("check");
        let mut expansion = expand(&program, &analysis).expect("expand");
        let blocks = std::mem::take(&mut expansion.blocks)
            .into_iter()
            .map(regroup)
            .collect();
        let tree = build(&program, &analysis, &expansion, blocks).expect("build");
        inspect(&analysis, &tree);
    }

    #[test]
    fn single_pass_blocks_flatten_to_leaves() {
        with_tree("{ frag }\nloop 3 { frag }\nonce { frag }", |_, tree| {
            assert_eq!(tree.loop_num, 1);
            assert_eq!(tree.children.len(), 3);
            assert!(matches!(tree.children[0], PassNode::Leaf(_)));
            match &tree.children[1] {
                PassNode::Tree(t) => {
                    assert_eq!((t.loop_num, t.once, t.children.len()), (3, false, 1));
                }
                other => panic!("expected a tree, got {other:?}"),
            }
            match &tree.children[2] {
                PassNode::Tree(t) => assert!(t.once),
                other => panic!("expected a tree, got {other:?}"),
            }
        });
    }

    #[test]
    fn refresh_produces_two_leaves() {
        with_tree("{ frag\n refresh\n frag1 }", |_, tree| {
            let leaves = tree.leaves();
            assert_eq!(leaves.len(), 2);
            assert_eq!(leaves[0].resources.samplers, BTreeSet::from([0]));
            assert_eq!(leaves[1].resources.samplers, BTreeSet::from([1]));
        });
    }

    #[test]
    fn collects_builtin_inputs_and_uniforms() {
        let source = "uniform float a\nuniform float b\nuniform float c\n\
                      { vec4(c, a, time, npos.x) }";
        with_tree(source, |_, tree| {
            let leaf = tree.leaves()[0];
            assert!(leaf.resources.uses_time);
            assert!(leaf.resources.uses_res);
            assert_eq!(leaf.resources.uniforms.iter().copied().collect::<Vec<_>>(), vec![0, 2]);
            assert!(leaf.resources.samplers.is_empty());
        });
    }

    #[test]
    fn functions_come_before_their_callers() {
        let source = "fn a() { return 1. }\n\
                      fn b() { return a() * 2. }\n\
                      fn unused() { return 3. }\n\
                      { vec4(b() + a()) }";
        with_tree(source, |analysis, tree| {
            let names: Vec<_> = tree.leaves()[0]
                .resources
                .functions
                .iter()
                .map(|f| analysis.functions[f.0].name.as_str())
                .collect();
            assert_eq!(names, vec!["a", "b"]);
        });
    }

    #[test]
    fn resources_follow_procedure_arguments_and_defaults() {
        let source = "uniform float u\n\
                      fn tint(float k = time) { return vec4(k) }\n\
                      pr p(float x, int t = -1) { frag(t) * x + tint() }\n\
                      2 -> { p(u) } -> 3";
        with_tree(source, |_, tree| {
            let leaf = tree.leaves()[0];
            assert_eq!((leaf.in_num, leaf.out_num), (2, 3));
            assert!(leaf.resources.uniforms.contains(&0));
            assert!(leaf.resources.uses_time);
            assert_eq!(leaf.resources.samplers, BTreeSet::from([2]));
        });
    }

    #[test]
    fn mixed_bodies_are_internal_errors() {
        let program = parse("{ frag\n { frag } }").expect("parse");
        let analysis = check(&program).expect("check");
        let mut expansion = expand(&program, &analysis).expect("expand");
        let unregrouped = std::mem::take(&mut expansion.blocks);
        let err = build(&program, &analysis, &expansion, unregrouped).expect_err("mixed");
        assert!(err.is_internal());
    }
}
