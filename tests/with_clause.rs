//! `with`-clause resolution against real files on an include path.

use std::fs;
use std::io::Cursor;

use augusta::compile::{interpret, Options};
use augusta::interpreter::SharedBuf;

fn run_with_include(source: &str, dir: &std::path::Path) -> String {
    let opts = Options {
        include_paths: vec![dir.to_path_buf()],
        interpret: true,
        verbose: false,
    };
    let buf = SharedBuf::default();
    interpret(
        source,
        "main.adb",
        &opts,
        Box::new(Cursor::new(Vec::new())),
        Box::new(buf.clone()),
    )
    .expect("program runs");
    buf.contents()
}

#[test]
fn with_clause_loads_library_unit_from_include_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("utils.ada"),
        "package UTILS is \
           BONUS : INTEGER := 7; \
           function TRIPLE (X : INTEGER) return INTEGER; \
         end UTILS; \
         package body UTILS is \
           function TRIPLE (X : INTEGER) return INTEGER is \
           begin return X * 3; end TRIPLE; \
         end UTILS;",
    )
    .unwrap();

    let out = run_with_include(
        "with UTILS; use UTILS; \
         procedure MAIN is S : INTEGER; begin \
           S := TRIPLE(BONUS); \
           PUT(S'IMAGE); \
         end MAIN;",
        dir.path(),
    );
    assert_eq!(out, "21");
}

#[test]
fn adb_extension_is_searched_after_ada() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("pieces.adb"),
        "package PIECES is \
           COUNT : INTEGER := 32; \
         end PIECES;",
    )
    .unwrap();

    let out = run_with_include(
        "with PIECES; \
         procedure MAIN is begin PUT(PIECES.COUNT'IMAGE); end MAIN;",
        dir.path(),
    );
    assert_eq!(out, "32");
}

#[test]
fn library_unit_names_are_lowercased_for_lookup() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("helper.ada"),
        "package HELPER is N : INTEGER := 9; end HELPER;",
    )
    .unwrap();

    let out = run_with_include(
        "with Helper; \
         procedure MAIN is begin PUT(HELPER.N'IMAGE); end MAIN;",
        dir.path(),
    );
    assert_eq!(out, "9");
}

#[test]
fn missing_with_target_is_silently_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_with_include(
        "with NOWHERE; \
         procedure MAIN is begin PUT_LINE(\"ok\"); end MAIN;",
        dir.path(),
    );
    assert_eq!(out, "ok\n");
}

#[test]
fn undefined_names_surface_at_use_sites_when_with_misses() {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options {
        include_paths: vec![dir.path().to_path_buf()],
        interpret: true,
        verbose: false,
    };
    let buf = SharedBuf::default();
    let err = interpret(
        "with NOWHERE; \
         procedure MAIN is begin NOWHERE.RUN; end MAIN;",
        "main.adb",
        &opts,
        Box::new(Cursor::new(Vec::new())),
        Box::new(buf.clone()),
    )
    .unwrap_err();
    assert!(err.to_string().contains("undefined identifier"));
}

#[test]
fn transitive_with_clauses_load_in_dependency_order() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("base.ada"),
        "package BASE is ROOT : INTEGER := 2; end BASE;",
    )
    .unwrap();
    fs::write(
        dir.path().join("middle.ada"),
        "with BASE; \
         package MIDDLE is \
           function GROW return INTEGER; \
         end MIDDLE; \
         package body MIDDLE is \
           function GROW return INTEGER is \
           begin return BASE.ROOT * 10; end GROW; \
         end MIDDLE;",
    )
    .unwrap();

    let out = run_with_include(
        "with MIDDLE; \
         procedure MAIN is S : INTEGER; begin \
           S := MIDDLE.GROW; \
           PUT(S'IMAGE); \
         end MAIN;",
        dir.path(),
    );
    assert_eq!(out, "20");
}
