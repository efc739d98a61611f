//! Core compiler for the Tinsel shading language.
//!
//! Tinsel programs describe a chain of full-screen fragment passes. The
//! pipeline is roughly:
//!
//!   source .tsl
//!     -> lexer     (tokens with statement breaks)
//!     -> parser    (AST in an expression arena)
//!     -> typecheck (types + side tables, aggregated diagnostics)
//!     -> expand    (procedure inlining, render-block numbers)
//!     -> regroup   (split at `refresh` and nested blocks)
//!     -> ir        (pass trees and leaves with their resources)
//!     -> codegen_glsl (one GLSL ES 3.00 fragment shader per leaf)
//!
//! Hosts (the CLI, a WebGL runtime) should depend on this crate and
//! consume the [`PassSchedule`] rather than reimplementing any stage.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: types, built-in signatures, type checking
// ---------------------------------------------------------------------

pub mod types;
pub mod builtins;
pub mod color;
pub mod typecheck;

// ---------------------------------------------------------------------
// Middle: procedure expansion, pass regrouping, IR
// ---------------------------------------------------------------------

pub mod expand;
pub mod regroup;
pub mod ir;

// ---------------------------------------------------------------------
// Back-end: code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod codegen_glsl;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use codegen_glsl::Precision;
pub use compiler::{CompileOptions, PassSchedule, ProgramNode, ShaderLeaf, compile, compile_with};
pub use diagnostic::{Diagnostic, Diagnostics};
pub use error::CompileError;
