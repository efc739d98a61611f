use serde::Serialize;

use crate::ast::Program;
use crate::codegen_glsl::{Precision, generate_leaf};
use crate::error::CompileError;
use crate::expand::{Expansion, expand};
use crate::ir::{PassNode, PassTree, build};
use crate::parser::parse;
use crate::regroup::regroup;
use crate::typecheck::{Analysis, check};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub precision: Precision,
}

/// The compiled pass graph handed to a runtime.
///
/// The root is always a single-iteration tree; its children run in source
/// order every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSchedule {
    pub loop_num: u32,
    pub once: bool,
    pub children: Vec<ProgramNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProgramNode {
    Tree(PassSchedule),
    Leaf(ShaderLeaf),
}

/// One GPU program: GLSL source plus its texture routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderLeaf {
    pub source: String,
    pub out_num: u32,
    pub in_num: u32,
}

impl PassSchedule {
    /// Every leaf in execution order (ignoring repetition).
    pub fn leaves(&self) -> Vec<&ShaderLeaf> {
        let mut out = Vec::new();
        for child in &self.children {
            match child {
                ProgramNode::Leaf(leaf) => out.push(leaf),
                ProgramNode::Tree(tree) => out.extend(tree.leaves()),
            }
        }
        out
    }
}

pub fn compile(source: &str) -> Result<PassSchedule, CompileError> {
    compile_with(source, &CompileOptions::default())
}

pub fn compile_with(source: &str, options: &CompileOptions) -> Result<PassSchedule, CompileError> {
    let program = parse(source)?;
    log::debug!("parsed {} top-level statements", program.body.len());

    let analysis = check(&program).map_err(CompileError::from)?;

    let mut expansion = expand(&program, &analysis)?;
    let blocks = std::mem::take(&mut expansion.blocks)
        .into_iter()
        .map(regroup)
        .collect();
    let tree = build(&program, &analysis, &expansion, blocks)?;

    let emitter = Emitter {
        program: &program,
        analysis: &analysis,
        expansion: &expansion,
        precision: options.precision,
    };
    let schedule = emitter.tree(&tree)?;
    log::debug!("generated {} shader programs", schedule.leaves().len());
    Ok(schedule)
}

struct Emitter<'p, 'a> {
    program: &'p Program,
    analysis: &'p Analysis,
    expansion: &'p Expansion<'a>,
    precision: Precision,
}

impl Emitter<'_, '_> {
    fn tree(&self, tree: &PassTree<'_>) -> Result<PassSchedule, CompileError> {
        let mut children = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            children.push(match child {
                PassNode::Tree(nested) => ProgramNode::Tree(self.tree(nested)?),
                PassNode::Leaf(leaf) => {
                    let source = generate_leaf(
                        self.program,
                        self.analysis,
                        self.expansion,
                        leaf,
                        self.precision,
                    )?;
                    log::trace!(
                        "pass {} -> {}:\n{source}",
                        leaf.in_num,
                        leaf.out_num
                    );
                    ProgramNode::Leaf(ShaderLeaf {
                        source,
                        out_num: leaf.out_num,
                        in_num: leaf.in_num,
                    })
                }
            });
        }
        Ok(PassSchedule {
            loop_num: tree.loop_num,
            once: tree.once,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOOM: &str = include_str!("../../demos/bloom.tsl");
    const FEEDBACK: &str = include_str!("../../demos/feedback.tsl");
    const PLASMA: &str = include_str!("../../demos/plasma.tsl");

    fn messages(source: &str) -> Vec<String> {
        compile(source)
            .expect_err("compilation should fail")
            .diagnostics()
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn compilation_is_deterministic() {
        for source in [BLOOM, FEEDBACK, PLASMA] {
            let first = compile(source).expect("compile");
            let second = compile(source).expect("compile");
            assert_eq!(first, second);
        }
    }

    #[test]
    fn bare_block_defaults_to_texture_zero() {
        let schedule = compile("{ frag * 0.5 }").expect("compile");
        let leaves = schedule.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!((leaves[0].in_num, leaves[0].out_num), (0, 0));
        assert_eq!((schedule.loop_num, schedule.once), (1, false));
    }

    #[test]
    fn one_refresh_splits_into_two_programs() {
        let schedule = compile("{ frag\n refresh\n frag * 2. }").expect("compile");
        match &schedule.children[..] {
            [ProgramNode::Tree(tree)] => {
                assert_eq!(tree.children.len(), 2);
                let leaves = tree.leaves();
                assert!(leaves[0].source.contains("tsl_fragColor = texelFetch("));
                assert!(leaves[1].source.contains("* 2.)"));
                assert!(!leaves[0].source.contains("refresh"));
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn mixed_use_of_a_texture_parameter() {
        let found = messages("pr p(int t) { frag(t) * float(t) }\n{ p(1) }");
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("mixed use"));
    }

    #[test]
    fn conflicting_returns_report_once() {
        let source = "fn f(bool c) { if (c) { return 1u } else { return 2 } }\n\
                      { vec4(float(f(true))) }\n\
                      { vec4(float(f(false)) + float(f(true))) }";
        let err = compile(source).expect_err("mismatch");
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
        assert!(diagnostics[0].message.contains("uint"));
        assert!(diagnostics[0].message.contains("int"));
    }

    #[test]
    fn constant_index_out_of_range() {
        let found = messages("{ vec4(float(int[](1, 2, 3)[3])) }");
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("out of range"));
        compile("{ vec4(float(int[](1, 2, 3)[0])) }").expect("index 0 is fine");
    }

    #[test]
    fn error_count_wording() {
        let one = compile("{ vec4(nope) }").expect_err("one error").to_string();
        assert!(one.starts_with("1 error:"), "{one}");

        let many = compile("{ a := nope\n b := 1 + true\n vec4(alsonope) }")
            .expect_err("three errors")
            .to_string();
        assert!(many.starts_with("3 errors:"), "{many}");
        assert!(many.contains("'nope'"));
        assert!(many.contains("'alsonope'"));
    }

    #[test]
    fn reserved_names_do_not_stop_checking() {
        let text = compile("{ gl_a := frag\n tsl_b := frag\n vec4(nope) }")
            .expect_err("three errors")
            .to_string();
        assert!(text.starts_with("3 errors:"), "{text}");
        assert!(text.contains("line 1, column 3"));
        assert!(text.contains("line 2, column 2"));
    }

    #[test]
    fn procedure_calls_may_precede_the_declaration() {
        let before = compile("{ p() }\npr p() { frag * 0.5 }").expect("call before declaration");
        let after = compile("pr p() { frag * 0.5 }\n{ p() }").expect("call after declaration");
        assert_eq!(before, after);
        assert!(before.leaves()[0].source.contains("* 0.5)"));
    }

    #[test]
    fn bloom_compiles_to_one_program_per_segment() {
        let schedule = compile(BLOOM).expect("bloom compiles");
        let leaves = schedule.leaves();
        assert_eq!(leaves.len(), 4);
        for leaf in &leaves {
            assert!(leaf.source.contains("void main()"));
            assert!(leaf.source.contains("tsl_fragColor ="));
        }
        let routing: Vec<_> = leaves.iter().map(|l| (l.in_num, l.out_num)).collect();
        assert_eq!(routing, vec![(0, 1), (1, 1), (1, 1), (0, 0)]);
        assert!(leaves[1].source.contains("vec4 blur5(vec2 dir)"));
        assert!(leaves[1].source.contains("blur5(vec2(1.5, 0.))"));

        match &schedule.children[1] {
            ProgramNode::Tree(outer) => match &outer.children[..] {
                [ProgramNode::Tree(looped)] => assert_eq!(looped.loop_num, 3),
                other => panic!("unexpected shape {other:?}"),
            },
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn named_arguments_match_positional_calls() {
        let decl = "fn f(float a, vec2 b, int c, float d = 1.) { return a + b.x + float(c) + d }\n";
        let named = compile(&format!(
            "{decl}{{ vec4(f(c: 3, d: 0.5, b: vec2(2.), a: 1.)) }}"
        ))
        .expect("named call");
        let positional = compile(&format!("{decl}{{ vec4(f(1., vec2(2.), 3, 0.5)) }}"))
            .expect("positional call");
        assert_eq!(named, positional);
        assert!(named.leaves()[0].source.contains("f(1., vec2(2.), 3, 0.5)"));
    }

    #[test]
    fn two_levels_of_pure_parameters_match_one() {
        let one = compile("pr read(int t) { frag(t) }\n{ read(2) }").expect("one level");
        let two = compile("pr read(int t) { frag(t) }\npr outer(int u) { read(u) }\n{ outer(2) }")
            .expect("two levels");
        assert_eq!(one.leaves()[0].source, two.leaves()[0].source);
        assert!(one.leaves()[0].source.contains("tsl_sampler2"));
    }

    #[test]
    fn precision_option_reaches_the_preamble() {
        let options = CompileOptions {
            precision: Precision::Medium,
        };
        let schedule = compile_with("{ frag }", &options).expect("compile");
        assert!(schedule.leaves()[0].source.contains("precision mediump float;"));
    }

    #[test]
    fn feedback_uses_prev_and_once() {
        let schedule = compile(FEEDBACK).expect("feedback compiles");
        match &schedule.children[0] {
            ProgramNode::Tree(tree) => assert!(tree.once),
            other => panic!("unexpected shape {other:?}"),
        }
        let leaves = schedule.leaves();
        assert_eq!(leaves.len(), 3);
        assert_eq!((leaves[1].in_num, leaves[1].out_num), (0, 2));
        assert!(leaves[1].source.contains("uniform float decay;"));
        assert!(leaves[1].source.contains("tsl_sampler2"));
    }

    #[test]
    fn schedule_serializes_in_camel_case() {
        let schedule = compile("loop 2 { frag } -> 1").expect("compile");
        let json = serde_json::to_value(&schedule).expect("serialize");
        assert_eq!(json["loopNum"], 1);
        let looped = &json["children"][0];
        assert_eq!(looped["loopNum"], 2);
        assert_eq!(looped["once"], false);
        let leaf = &looped["children"][0];
        assert_eq!(leaf["outNum"], 1);
        assert_eq!(leaf["inNum"], 0);
        assert!(leaf["source"].as_str().expect("source").starts_with("#version 300 es"));
    }

    #[test]
    fn lex_and_syntax_errors_are_positioned() {
        match compile("{ frag }\n{ 1 @ 2 }") {
            Err(CompileError::Lex { line, column, .. }) => assert_eq!((line, column), (2, 5)),
            other => panic!("expected a lex error, got {other:?}"),
        }
        assert!(matches!(
            compile("{ frag +  }"),
            Err(CompileError::Syntax { line: 1, .. })
        ));
    }
}
