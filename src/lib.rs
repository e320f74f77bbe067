//! augusta: an Ada 83 front-end and tree-walking interpreter.
//!
//! The pipeline is lexer → recursive-descent parser → resolver over a
//! symbol table and type pool → evaluator, with a line-oriented IR
//! emitter as the alternative back end. `compile` wires the phases
//! together; everything below it is usable on its own.

pub mod analysis;
pub mod arena;
pub mod arena_ctx;
pub mod ast;
pub mod bignum;
pub mod cli;
pub mod codegen;
pub mod compile;
pub mod diag;
pub mod intern;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod symtab;
pub mod token;
pub mod types;
pub mod value;
