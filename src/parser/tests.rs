use super::{parse_source, ExprParsing, Parser, StmtParsing};
use crate::arena::Arena;
use crate::arena_ctx::AstCtx;
use crate::ast::{
    BinOp, CompilationUnit, ContextItemKind, DeclKind, Expr, ExprKind, LoopScheme, StmtKind,
    TypeDef, UnOp,
};
use crate::intern::Interner;
use crate::lexer::Lexer;

fn check_expr(src: &str, check: impl FnOnce(&Expr<'_>, &Interner)) {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let tokens = Lexer::new(src, "test.ada", &mut interner).tokenize();
    let mut parser = Parser::new(tokens, &interner, AstCtx::new(&arena)).unwrap();
    let e = parser.parse_expression().expect("expression parses");
    check(e, &interner);
}

fn expr_fails(src: &str) {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let tokens = Lexer::new(src, "test.ada", &mut interner).tokenize();
    let mut parser = Parser::new(tokens, &interner, AstCtx::new(&arena)).unwrap();
    assert!(parser.parse_expression().is_err(), "{} should not parse", src);
}

fn check_stmt(src: &str, check: impl FnOnce(&crate::ast::Stmt<'_>, &Interner)) {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let tokens = Lexer::new(src, "test.ada", &mut interner).tokenize();
    let mut parser = Parser::new(tokens, &interner, AstCtx::new(&arena)).unwrap();
    let s = parser.parse_statement().expect("statement parses");
    check(s, &interner);
}

fn check_unit(src: &str, check: impl FnOnce(&CompilationUnit<'_>, &Interner)) {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let unit =
        parse_source(src, "test.ada", &mut interner, AstCtx::new(&arena)).expect("unit parses");
    check(unit, &interner);
}

/// Fully parenthesized rendering, used for the print-then-reparse check.
fn render(e: &Expr<'_>, interner: &Interner) -> String {
    match &e.kind {
        ExprKind::Ident(n) => interner.resolve(*n).to_string(),
        ExprKind::Int { value, .. } => value.to_string(),
        ExprKind::Real(v) => format!("{:?}", v),
        ExprKind::Char(c) => format!("'{}'", *c as char),
        ExprKind::Str(s) => format!("\"{}\"", interner.resolve(*s)),
        ExprKind::Null => "null".to_string(),
        ExprKind::Binary { op, lhs, rhs, .. } => {
            let op_text = match op {
                BinOp::And => "and",
                BinOp::AndThen => "and then",
                BinOp::Or => "or",
                BinOp::OrElse => "or else",
                BinOp::Xor => "xor",
                BinOp::Eq => "=",
                BinOp::Ne => "/=",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Cat => "&",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Mod => "mod",
                BinOp::Rem => "rem",
                BinOp::Pow => "**",
            };
            format!("({} {} {})", render(lhs, interner), op_text, render(rhs, interner))
        }
        ExprKind::Unary { op, operand } => {
            let op_text = match op {
                UnOp::Plus => "+",
                UnOp::Minus => "-",
                UnOp::Not => "not ",
                UnOp::Abs => "abs ",
            };
            format!("({}{})", op_text, render(operand, interner))
        }
        other => format!("<{:?}>", std::mem::discriminant(other)),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    check_expr("a + b * c", |e, _| match &e.kind {
        ExprKind::Binary { op: BinOp::Add, rhs, .. } => {
            assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
        }
        other => panic!("expected addition at the top, got {:?}", other),
    });
}

#[test]
fn exponentiation_is_right_associative() {
    check_expr("a ** b ** c", |e, _| match &e.kind {
        ExprKind::Binary { op: BinOp::Pow, lhs, rhs, .. } => {
            assert!(matches!(lhs.kind, ExprKind::Ident(_)));
            assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
        }
        other => panic!("expected power at the top, got {:?}", other),
    });
}

#[test]
fn not_binds_tighter_than_and() {
    check_expr("not a and b", |e, _| match &e.kind {
        ExprKind::Binary { op: BinOp::And, lhs, .. } => {
            assert!(matches!(
                lhs.kind,
                ExprKind::Unary { op: UnOp::Not, .. }
            ));
        }
        other => panic!("expected and at the top, got {:?}", other),
    });
}

#[test]
fn leading_sign_covers_the_whole_term() {
    check_expr("-a * b", |e, _| match &e.kind {
        ExprKind::Unary { op: UnOp::Minus, operand } => {
            assert!(matches!(operand.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
        }
        other => panic!("expected negation at the top, got {:?}", other),
    });
}

#[test]
fn and_then_coalesces_into_one_operator() {
    check_expr("a and then b", |e, _| {
        assert!(matches!(
            e.kind,
            ExprKind::Binary { op: BinOp::AndThen, .. }
        ));
    });
    check_expr("a or else b", |e, _| {
        assert!(matches!(e.kind, ExprKind::Binary { op: BinOp::OrElse, .. }));
    });
}

#[test]
fn mixing_logical_operators_is_rejected() {
    expr_fails("a and b or c");
    expr_fails("a or b xor c");
}

#[test]
fn same_logical_operator_chains() {
    check_expr("a and b and c", |e, _| {
        assert!(matches!(e.kind, ExprKind::Binary { op: BinOp::And, .. }));
    });
}

#[test]
fn membership_with_range() {
    check_expr("x in 1 .. 5", |e, _| match &e.kind {
        ExprKind::Membership { negated, mark, .. } => {
            assert!(!negated);
            assert!(matches!(mark.kind, ExprKind::Range { .. }));
        }
        other => panic!("expected membership, got {:?}", other),
    });
    check_expr("x not in SMALL", |e, _| {
        assert!(matches!(e.kind, ExprKind::Membership { negated: true, .. }));
    });
}

#[test]
fn name_suffixes_chain_left_to_right() {
    check_expr("A.B.C", |e, interner| match &e.kind {
        ExprKind::Selected { prefix, selector } => {
            assert_eq!(interner.resolve(*selector), "C");
            assert!(matches!(prefix.kind, ExprKind::Selected { .. }));
        }
        other => panic!("expected selection, got {:?}", other),
    });
    check_expr("F(1)", |e, _| {
        assert!(matches!(e.kind, ExprKind::Call { .. }));
    });
    check_expr("A(1 .. 3)", |e, _| {
        assert!(matches!(e.kind, ExprKind::Slice { .. }));
    });
    check_expr("X'First", |e, interner| match &e.kind {
        ExprKind::Attribute { designator, .. } => {
            assert_eq!(interner.resolve(*designator), "First");
        }
        other => panic!("expected attribute, got {:?}", other),
    });
    check_expr("T'(5)", |e, _| {
        assert!(matches!(e.kind, ExprKind::Qualified { .. }));
    });
    check_expr("P.all", |e, _| {
        assert!(matches!(e.kind, ExprKind::Deref { .. }));
    });
}

#[test]
fn parenthesized_expression_is_not_an_aggregate() {
    check_expr("(1)", |e, _| {
        assert!(matches!(e.kind, ExprKind::Int { value: 1, .. }));
    });
    check_expr("(1, 2)", |e, _| {
        assert!(matches!(e.kind, ExprKind::Aggregate { .. }));
    });
    check_expr("(x => 1)", |e, _| {
        assert!(matches!(e.kind, ExprKind::Aggregate { .. }));
    });
    check_expr("(others => 0)", |e, _| match &e.kind {
        ExprKind::Aggregate { items } => {
            assert!(matches!(items[0].choices[0].kind, ExprKind::Others));
        }
        other => panic!("expected aggregate, got {:?}", other),
    });
}

#[test]
fn allocator_forms() {
    check_expr("new NODE", |e, _| {
        assert!(matches!(e.kind, ExprKind::Allocator { init: None, .. }));
    });
    check_expr("new NODE'(5)", |e, _| {
        assert!(matches!(
            e.kind,
            ExprKind::Allocator { init: Some(_), .. }
        ));
    });
}

#[test]
fn render_and_reparse_is_stable() {
    for src in [
        "a + b * c",
        "a ** b ** c",
        "not a and b",
        "-x + y",
        "a / b mod c",
        "(a + b) * (c - d)",
        "a and then b and then c",
        "abs x ** 2",
    ] {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let tokens = Lexer::new(src, "test.ada", &mut interner).tokenize();
        let mut parser = Parser::new(tokens, &interner, AstCtx::new(&arena)).unwrap();
        let first = parser.parse_expression().unwrap();
        let printed = render(first, &interner);

        let arena2 = Arena::new();
        let mut interner2 = Interner::new();
        let tokens2 = Lexer::new(&printed, "test.ada", &mut interner2).tokenize();
        let mut parser2 = Parser::new(tokens2, &interner2, AstCtx::new(&arena2)).unwrap();
        let second = parser2.parse_expression().unwrap();
        assert_eq!(printed, render(second, &interner2), "source: {}", src);
    }
}

#[test]
fn assignment_and_call_are_distinguished_after_the_name() {
    check_stmt("X := 1;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Assign { .. }));
    });
    check_stmt("A(1) := 2;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Assign { .. }));
    });
    check_stmt("P;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Call(_)));
    });
    check_stmt("P(1, 2);", |s, _| {
        assert!(matches!(s.kind, StmtKind::Call(_)));
    });
}

#[test]
fn if_with_elsif_chain() {
    check_stmt(
        "if a then null; elsif b then null; elsif c then null; else null; end if;",
        |s, _| match &s.kind {
            StmtKind::If { arms, else_stmts } => {
                assert_eq!(arms.len(), 3);
                assert!(else_stmts.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        },
    );
}

#[test]
fn case_with_ranges_and_others() {
    check_stmt(
        "case x is when 1 .. 3 => null; when 4 | 7 => null; when others => null; end case;",
        |s, _| match &s.kind {
            StmtKind::Case { alts, .. } => {
                assert_eq!(alts.len(), 3);
                assert!(matches!(alts[0].choices[0].kind, ExprKind::Range { .. }));
                assert_eq!(alts[1].choices.len(), 2);
                assert!(matches!(alts[2].choices[0].kind, ExprKind::Others));
            }
            other => panic!("expected case, got {:?}", other),
        },
    );
}

#[test]
fn loop_forms() {
    check_stmt("loop null; end loop;", |s, _| {
        assert!(matches!(
            s.kind,
            StmtKind::Loop { scheme: LoopScheme::Forever, .. }
        ));
    });
    check_stmt("while x loop null; end loop;", |s, _| {
        assert!(matches!(
            s.kind,
            StmtKind::Loop { scheme: LoopScheme::While(_), .. }
        ));
    });
    check_stmt("for i in reverse 1 .. 10 loop null; end loop;", |s, _| {
        match &s.kind {
            StmtKind::Loop {
                scheme: LoopScheme::For { reverse, .. },
                ..
            } => assert!(*reverse),
            other => panic!("expected for loop, got {:?}", other),
        }
    });
}

#[test]
fn loop_labels_attach() {
    check_stmt("OUTER : loop exit OUTER; end loop;", |s, interner| {
        let label = s.label.expect("label recorded");
        assert_eq!(interner.resolve(label), "OUTER");
        match &s.kind {
            StmtKind::Loop { body, .. } => match &body[0].kind {
                StmtKind::Exit { loop_name, .. } => {
                    assert_eq!(interner.resolve(loop_name.unwrap()), "OUTER");
                }
                other => panic!("expected exit, got {:?}", other),
            },
            other => panic!("expected loop, got {:?}", other),
        }
    });
    check_stmt("<<HERE>> null;", |s, interner| {
        assert_eq!(interner.resolve(s.label.unwrap()), "HERE");
    });
}

#[test]
fn exit_when_condition() {
    check_stmt("exit when x > 3;", |s, _| match &s.kind {
        StmtKind::Exit { when, loop_name } => {
            assert!(when.is_some());
            assert!(loop_name.is_none());
        }
        other => panic!("expected exit, got {:?}", other),
    });
}

#[test]
fn block_with_handler() {
    check_stmt(
        "declare X : INTEGER; begin null; exception when CONSTRAINT_ERROR => null; \
         when others => null; end;",
        |s, _| match &s.kind {
            StmtKind::Block {
                decls, handlers, ..
            } => {
                assert_eq!(decls.len(), 1);
                assert_eq!(handlers.len(), 2);
            }
            other => panic!("expected block, got {:?}", other),
        },
    );
}

#[test]
fn goto_and_raise() {
    check_stmt("goto DONE;", |s, interner| match &s.kind {
        StmtKind::Goto { target } => assert_eq!(interner.resolve(*target), "DONE"),
        other => panic!("expected goto, got {:?}", other),
    });
    check_stmt("raise CONSTRAINT_ERROR;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Raise { name: Some(_) }));
    });
    check_stmt("raise;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Raise { name: None }));
    });
}

#[test]
fn tasking_statements_parse() {
    check_stmt("delay 1.5;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Delay { .. }));
    });
    check_stmt("abort WORKER;", |s, _| {
        assert!(matches!(s.kind, StmtKind::Abort { .. }));
    });
    check_stmt("accept START do null; end; ", |s, _| {
        assert!(matches!(s.kind, StmtKind::Accept { body: Some(_), .. }));
    });
    check_stmt(
        "select accept START; or when READY => delay 1.0; else null; end select;",
        |s, _| match &s.kind {
            StmtKind::Select { arms, else_stmts } => {
                assert_eq!(arms.len(), 2);
                assert!(arms[1].guard.is_some());
                assert!(else_stmts.is_some());
            }
            other => panic!("expected select, got {:?}", other),
        },
    );
}

#[test]
fn identifier_lists_expand_to_one_decl_per_name() {
    check_unit(
        "procedure P is A, B, C : INTEGER := 0; begin null; end P;",
        |unit, interner| {
            let DeclKind::Subprogram { body: Some(body), .. } = &unit.units[0].kind else {
                panic!("expected subprogram");
            };
            assert_eq!(body.decls.len(), 3);
            let names: Vec<&str> = body
                .decls
                .iter()
                .map(|d| match &d.kind {
                    DeclKind::Object { name, .. } => interner.resolve(*name),
                    other => panic!("expected object, got {:?}", other),
                })
                .collect();
            assert_eq!(names, ["A", "B", "C"]);
        },
    );
}

#[test]
fn type_declarations() {
    check_unit(
        "procedure P is \
           type COLOR is (RED, GREEN, BLUE); \
           type SMALL is range 1 .. 10; \
           type VEC is array (1 .. 8) of INTEGER; \
           type PAIR is record A, B : INTEGER; end record; \
           type LINK is access PAIR; \
           type METERS is new INTEGER; \
         begin null; end P;",
        |unit, _| {
            let DeclKind::Subprogram { body: Some(body), .. } = &unit.units[0].kind else {
                panic!("expected subprogram");
            };
            let defs: Vec<&TypeDef<'_>> = body
                .decls
                .iter()
                .map(|d| match &d.kind {
                    DeclKind::Type { def, .. } => def,
                    other => panic!("expected type, got {:?}", other),
                })
                .collect();
            assert!(matches!(defs[0], TypeDef::Enumeration { literals } if literals.len() == 3));
            assert!(matches!(defs[1], TypeDef::Integer { range: Some(_) }));
            assert!(matches!(defs[2], TypeDef::Array { .. }));
            assert!(matches!(defs[3], TypeDef::Record { components } if components.len() == 2));
            assert!(matches!(defs[4], TypeDef::Access { .. }));
            assert!(matches!(defs[5], TypeDef::Derived { .. }));
        },
    );
}

#[test]
fn representation_clauses_vanish() {
    check_unit(
        "procedure P is X : INTEGER; for X use at 16#40#; begin null; end P;",
        |unit, _| {
            let DeclKind::Subprogram { body: Some(body), .. } = &unit.units[0].kind else {
                panic!("expected subprogram");
            };
            assert_eq!(body.decls.len(), 1, "clause must leave no node");
        },
    );
}

#[test]
fn context_clause_collects_with_and_use() {
    check_unit(
        "with TEXT_IO, UTILS; use TEXT_IO; procedure P is begin null; end P;",
        |unit, interner| {
            assert_eq!(unit.context.len(), 2);
            match &unit.context[0].kind {
                ContextItemKind::With(names) => {
                    assert_eq!(names.len(), 2);
                    assert_eq!(interner.resolve(names[0]), "TEXT_IO");
                }
                other => panic!("expected with, got {:?}", other),
            }
            assert!(matches!(unit.context[1].kind, ContextItemKind::Use(_)));
        },
    );
}

#[test]
fn package_spec_body_and_generic() {
    check_unit(
        "package STACKS is \
           procedure PUSH (X : INTEGER); \
         private \
           DEPTH : INTEGER := 0; \
         end STACKS; \
         package body STACKS is \
           procedure PUSH (X : INTEGER) is begin null; end PUSH; \
         begin \
           null; \
         end STACKS;",
        |unit, _| {
            assert_eq!(unit.units.len(), 2);
            match &unit.units[0].kind {
                DeclKind::Package {
                    is_body: false,
                    visible,
                    private_part,
                    ..
                } => {
                    assert_eq!(visible.len(), 1);
                    assert_eq!(private_part.len(), 1);
                }
                other => panic!("expected package spec, got {:?}", other),
            }
            assert!(matches!(
                unit.units[1].kind,
                DeclKind::Package { is_body: true, .. }
            ));
        },
    );

    check_unit(
        "generic type ELEM is private; with function LESS (A, B : ELEM) return BOOLEAN; \
         procedure SORT (X : ELEM);",
        |unit, _| match &unit.units[0].kind {
            DeclKind::Generic { formals, inner } => {
                assert_eq!(formals.len(), 2);
                assert!(matches!(inner.kind, DeclKind::Subprogram { .. }));
            }
            other => panic!("expected generic, got {:?}", other),
        },
    );
}

#[test]
fn subprogram_variants() {
    check_unit(
        "function MIN (A, B : INTEGER) return INTEGER; \
         procedure SWAP (A, B : in out INTEGER) is begin null; end SWAP; \
         procedure ECHO renames SWAP; \
         function MAX is new MIN_GEN (INTEGER); \
         procedure LATER is separate;",
        |unit, _| {
            assert_eq!(unit.units.len(), 5);
            assert!(matches!(
                unit.units[0].kind,
                DeclKind::Subprogram { body: None, renames: None, .. }
            ));
            assert!(matches!(
                unit.units[1].kind,
                DeclKind::Subprogram { body: Some(_), .. }
            ));
            assert!(matches!(
                unit.units[2].kind,
                DeclKind::Subprogram { renames: Some(_), .. }
            ));
            assert!(matches!(
                unit.units[3].kind,
                DeclKind::Subprogram { instance_of: Some(_), .. }
            ));
            assert!(matches!(
                unit.units[4].kind,
                DeclKind::Subprogram { separate: true, .. }
            ));
        },
    );
}
