//! E2E test harness: run Ada source through the full pipeline and assert
//! on captured output.

use augusta::compile::{interpret_str, CompileError};

/// Interpret `source` with empty standard input and compare stdout.
pub fn assert_interpreter_output(source: &str, expected: &str) {
    match interpret_str(source, b"") {
        Ok(out) => assert_eq!(out, expected, "source:\n{}", source),
        Err(e) => panic!("interpretation failed: {}\nsource:\n{}", e, source),
    }
}

/// Interpret `source` feeding `input` on standard input.
#[allow(dead_code)]
pub fn assert_interpreter_io(source: &str, input: &str, expected: &str) {
    match interpret_str(source, input.as_bytes()) {
        Ok(out) => assert_eq!(out, expected, "source:\n{}", source),
        Err(e) => panic!("interpretation failed: {}\nsource:\n{}", e, source),
    }
}

/// The program must die with an unhandled exception naming `exception`.
#[allow(dead_code)]
pub fn assert_unhandled(source: &str, exception: &str) {
    match interpret_str(source, b"") {
        Ok(out) => panic!("expected unhandled {}, got output {:?}", exception, out),
        Err(CompileError::Runtime(msg)) => {
            assert!(
                msg.contains(exception),
                "expected {} in '{}'",
                exception,
                msg
            );
        }
        Err(other) => panic!("expected runtime failure, got {}", other),
    }
}

/// The program must fail to compile with a diagnostic containing `needle`.
#[allow(dead_code)]
pub fn assert_diagnostic(source: &str, needle: &str) {
    match interpret_str(source, b"") {
        Ok(out) => panic!("expected diagnostic '{}', got output {:?}", needle, out),
        Err(CompileError::Diag(d)) => {
            let text = d.to_string();
            assert!(text.contains(needle), "expected '{}' in '{}'", needle, text);
        }
        Err(other) => panic!("expected diagnostic, got {}", other),
    }
}
