//! Compilation pipeline.
//!
//! One call wires the phases together: lex and parse the requested file,
//! load every `with`ed library unit it can find on the include path the
//! same way, analyze everything in dependency order against one semantic
//! context, then either interpret the last unit or print IR for all of
//! them. Missing `with` targets are silently ignored; the resolver then
//! reports undefined identifiers at the use sites.

use std::fs;
use std::io::{BufRead, Cursor, Write};
use std::path::{Path, PathBuf};

use crate::analysis::{Resolver, SemCtx};
use crate::arena::Arena;
use crate::arena_ctx::AstCtx;
use crate::ast::{CompilationUnit, ContextItemKind};
use crate::codegen::Emitter;
use crate::diag::Diag;
use crate::intern::Interner;
use crate::interpreter::{Interpreter, SharedBuf};
use crate::parser::parse_source;

/// Extensions tried, in order, when resolving a `with` clause.
const SOURCE_EXTENSIONS: &[&str] = &["ada", "adb", "ads"];

#[derive(Debug, Clone)]
pub struct Options {
    pub include_paths: Vec<PathBuf>,
    pub interpret: bool,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            include_paths: vec![PathBuf::from(".")],
            interpret: false,
            verbose: false,
        }
    }
}

#[derive(Debug)]
pub enum CompileError {
    Diag(Diag),
    Io(String),
    /// An exception reached the top level of the interpreted program.
    Runtime(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Diag(d) => write!(f, "{}", d),
            CompileError::Io(e) => write!(f, "{}", e),
            CompileError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<Diag> for CompileError {
    fn from(d: Diag) -> Self {
        CompileError::Diag(d)
    }
}

/// Parse `source` plus everything it `with`s, returning the units in
/// elaboration order (dependencies first, the requested unit last).
fn load_units<'a>(
    arena: &'a Arena,
    interner: &mut Interner,
    opts: &Options,
    source: &str,
    file_name: &str,
    loaded: &mut Vec<String>,
) -> Result<Vec<&'a CompilationUnit<'a>>, CompileError> {
    let unit = parse_source(source, file_name, interner, AstCtx::new(arena))?;
    if opts.verbose {
        eprintln!("augusta: parsed {}", file_name);
    }

    let mut all = Vec::new();
    for item in unit.context {
        let ContextItemKind::With(names) = &item.kind else {
            continue;
        };
        for &name in *names {
            let key = interner.resolve(name).to_ascii_lowercase();
            if loaded.iter().any(|l| l == &key) {
                continue;
            }
            loaded.push(key.clone());
            let Some((path, text)) = find_library_unit(opts, &key) else {
                if opts.verbose {
                    eprintln!("augusta: with {} not found, ignoring", key);
                }
                continue;
            };
            let dep_name = path.to_string_lossy().into_owned();
            let mut deps = load_units(arena, interner, opts, &text, &dep_name, loaded)?;
            all.append(&mut deps);
        }
    }
    all.push(unit);
    Ok(all)
}

/// Search the include paths for `<name>.{ada,adb,ads}`, lowercased.
fn find_library_unit(opts: &Options, lower_name: &str) -> Option<(PathBuf, String)> {
    for dir in &opts.include_paths {
        for ext in SOURCE_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", lower_name, ext));
            if let Ok(text) = fs::read_to_string(&candidate) {
                return Some((candidate, text));
            }
        }
    }
    None
}

fn analyze_all<'a>(
    sem: &mut SemCtx<'a>,
    interner: &Interner,
    units: &[&'a CompilationUnit<'a>],
    opts: &Options,
) -> Result<(), CompileError> {
    for unit in units {
        let mut resolver = Resolver::new(sem, interner);
        resolver.analyze_unit(unit)?;
    }
    if opts.verbose {
        eprintln!(
            "augusta: analyzed {} unit(s), {} symbols, {} types",
            units.len(),
            sem.syms.len(),
            sem.types.len()
        );
    }
    Ok(())
}

/// Compile `source` to IR text.
pub fn emit_ir(source: &str, file_name: &str, opts: &Options) -> Result<String, CompileError> {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let mut sem = SemCtx::new(&mut interner);
    let mut loaded = Vec::new();
    let units = load_units(&arena, &mut interner, opts, source, file_name, &mut loaded)?;
    analyze_all(&mut sem, &interner, &units, opts)?;

    let mut out = String::new();
    for unit in &units {
        let emitter = Emitter::new(&sem, &interner);
        let file = interner.resolve(unit.loc.file).to_string();
        out.push_str(&emitter.emit_unit(unit, &file));
    }
    Ok(out)
}

/// Interpret `source`, wiring the given handles as the program's standard
/// input and output.
pub fn interpret(
    source: &str,
    file_name: &str,
    opts: &Options,
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
) -> Result<(), CompileError> {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let mut sem = SemCtx::new(&mut interner);
    let mut loaded = Vec::new();
    let units = load_units(&arena, &mut interner, opts, source, file_name, &mut loaded)?;
    analyze_all(&mut sem, &interner, &units, opts)?;

    let mut interp = Interpreter::new(&sem, &interner, input, output);
    // Library units elaborate in dependency order; the requested unit
    // runs last and provides the main subprogram.
    for unit in &units[..units.len() - 1] {
        if let Err(raised) = interp.elaborate_unit(unit) {
            return Err(CompileError::Runtime(interp.describe(&raised)));
        }
    }
    let main_unit = units.last().expect("at least the requested unit");
    if let Err(raised) = interp.run_unit(main_unit) {
        return Err(CompileError::Runtime(interp.describe(&raised)));
    }
    Ok(())
}

/// Convenience used by tests: interpret a source string with a canned
/// standard input, returning captured standard output.
pub fn interpret_str(source: &str, input: &[u8]) -> Result<String, CompileError> {
    let opts = Options::default();
    let buf = SharedBuf::default();
    interpret(
        source,
        "main.adb",
        &opts,
        Box::new(Cursor::new(input.to_vec())),
        Box::new(buf.clone()),
    )?;
    Ok(buf.contents())
}

/// Entry point used by the command line: read the file and run the
/// requested mode. Returns the process exit code.
pub fn compile_file(path: &Path, opts: &Options) -> Result<(), CompileError> {
    let source = fs::read_to_string(path)
        .map_err(|e| CompileError::Io(format!("{}: {}", path.display(), e)))?;
    let file_name = path.to_string_lossy().into_owned();
    if opts.interpret {
        let stdin = std::io::stdin().lock();
        let stdout = std::io::stdout();
        interpret(
            &source,
            &file_name,
            opts,
            Box::new(stdin),
            Box::new(stdout),
        )
    } else {
        let ir = emit_ir(&source, &file_name, opts)?;
        let mut stdout = std::io::stdout();
        stdout
            .write_all(ir.as_bytes())
            .map_err(|e| CompileError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_interprets() {
        let out = interpret_str(
            "procedure P is begin PUT_LINE(\"hi\"); end P;",
            b"",
        )
        .unwrap();
        assert_eq!(out, "hi\n");
    }

    #[test]
    fn parse_error_is_a_diag() {
        let err = interpret_str("procedure P is begin ; end P;", b"").unwrap_err();
        match err {
            CompileError::Diag(d) => assert!(d.to_string().contains("main.adb")),
            other => panic!("expected diagnostic, got {:?}", other),
        }
    }

    #[test]
    fn emit_ir_produces_function_header() {
        let opts = Options::default();
        let ir = emit_ir(
            "procedure P is X : INTEGER := 1; begin X := X + 1; end P;",
            "p.adb",
            &opts,
        )
        .unwrap();
        assert!(ir.contains("unit \"p.adb\""));
        assert!(ir.contains("func p()"));
        assert!(ir.contains("store x"));
        assert!(ir.contains("endfunc"));
    }
}
