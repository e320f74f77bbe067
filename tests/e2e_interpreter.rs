//! End-to-end interpreter tests: whole programs in, stdout text out.

mod common;

use common::{
    assert_diagnostic, assert_interpreter_io, assert_interpreter_output, assert_unhandled,
};

// =============================================================================
// A. The basic scenarios
// =============================================================================

#[test]
fn e2e_hello_line() {
    assert_interpreter_output("procedure P is begin PUT_LINE(\"hi\"); end P;", "hi\n");
}

#[test]
fn e2e_for_loop_accumulates() {
    assert_interpreter_output(
        "procedure P is X : INTEGER := 0; begin \
           for I in 1 .. 5 loop X := X + I; end loop; \
           PUT(X'IMAGE); \
         end P;",
        "15",
    );
}

#[test]
fn e2e_if_with_folded_condition() {
    assert_interpreter_output(
        "procedure P is begin \
           if 2 + 2 = 4 then PUT_LINE(\"ok\"); else PUT_LINE(\"bad\"); end if; \
         end P;",
        "ok\n",
    );
}

#[test]
fn e2e_divide_by_zero_in_elaboration_is_unhandled() {
    assert_unhandled(
        "procedure P is X : INTEGER := 1 / 0; begin null; end P;",
        "CONSTRAINT_ERROR",
    );
}

#[test]
fn e2e_enumeration_image_prints_ordinal() {
    assert_interpreter_output(
        "procedure P is \
           type COLOR is (RED, GREEN, BLUE); \
           C : COLOR := GREEN; \
         begin \
           PUT(COLOR'IMAGE(C)); \
         end P;",
        "1",
    );
}

#[test]
fn e2e_recursive_factorial() {
    assert_interpreter_output(
        "procedure P is \
           function F (N : INTEGER) return INTEGER is \
           begin \
             if N <= 1 then return 1; else return N * F(N - 1); end if; \
           end F; \
         begin \
           PUT(F(5)'IMAGE); \
         end P;",
        "120",
    );
}

// =============================================================================
// B. Integer semantics
// =============================================================================

#[test]
fn e2e_mod_follows_divisor_rem_truncates() {
    assert_interpreter_output(
        "procedure P is \
           A : INTEGER := -7; B : INTEGER := 3; M : INTEGER; R : INTEGER; \
         begin \
           M := A mod B; R := A rem B; \
           PUT(M'IMAGE); PUT(\" \"); PUT(R'IMAGE); \
         end P;",
        "2 -1",
    );
}

#[test]
fn e2e_division_identity() {
    assert_interpreter_output(
        "procedure P is \
           A : INTEGER := -17; B : INTEGER := 5; C : INTEGER; \
         begin \
           C := (A / B) * B + (A rem B); \
           PUT(C'IMAGE); \
         end P;",
        "-17",
    );
}

#[test]
fn e2e_exponentiation() {
    assert_interpreter_output(
        "procedure P is X : INTEGER := 2; Y : INTEGER; begin \
           Y := X ** 10; PUT(Y'IMAGE); end P;",
        "1024",
    );
}

#[test]
fn e2e_statement_divide_by_zero() {
    assert_unhandled(
        "procedure P is X : INTEGER := 10; Y : INTEGER := 0; begin \
           X := 10 / Y; end P;",
        "CONSTRAINT_ERROR",
    );
}

// =============================================================================
// C. Loops and control flow
// =============================================================================

#[test]
fn e2e_reverse_loop_order() {
    assert_interpreter_output(
        "procedure P is begin \
           for I in reverse 1 .. 5 loop PUT(I'IMAGE); end loop; \
         end P;",
        "54321",
    );
}

#[test]
fn e2e_empty_range_never_iterates() {
    assert_interpreter_output(
        "procedure P is begin \
           for I in 5 .. 1 loop PUT_LINE(\"no\"); end loop; \
           PUT_LINE(\"done\"); \
         end P;",
        "done\n",
    );
}

#[test]
fn e2e_while_loop() {
    assert_interpreter_output(
        "procedure P is N : INTEGER := 5; begin \
           while N > 0 loop PUT(N'IMAGE); N := N - 2; end loop; \
         end P;",
        "531",
    );
}

#[test]
fn e2e_labelled_exit_leaves_outer_loop() {
    assert_interpreter_output(
        "procedure P is S : INTEGER := 0; begin \
           OUTER : loop \
             loop \
               S := S + 1; \
               exit OUTER when S > 4; \
               exit; \
             end loop; \
           end loop OUTER; \
           PUT(S'IMAGE); \
         end P;",
        "5",
    );
}

#[test]
fn e2e_goto_skips_forward() {
    assert_interpreter_output(
        "procedure P is begin \
           goto DONE; \
           PUT_LINE(\"skipped\"); \
           <<DONE>> PUT_LINE(\"after\"); \
         end P;",
        "after\n",
    );
}

#[test]
fn e2e_case_with_ranges_and_others() {
    assert_interpreter_output(
        "procedure P is X : INTEGER := 7; begin \
           case X is \
             when 1 .. 3 => PUT_LINE(\"low\"); \
             when 4 | 5 => PUT_LINE(\"mid\"); \
             when others => PUT_LINE(\"high\"); \
           end case; \
         end P;",
        "high\n",
    );
}

#[test]
fn e2e_case_over_enumeration() {
    assert_interpreter_output(
        "procedure P is \
           type COLOR is (RED, GREEN, BLUE); \
           C : COLOR := BLUE; \
         begin \
           case C is \
             when RED => PUT_LINE(\"warm\"); \
             when GREEN | BLUE => PUT_LINE(\"cool\"); \
           end case; \
         end P;",
        "cool\n",
    );
}

// =============================================================================
// D. Short-circuit forms
// =============================================================================

const SIDE_EFFECT_PACKAGE: &str = "package SIDE is \
   COUNT : INTEGER := 0; \
   function BUMP return BOOLEAN; \
 end SIDE; \
 package body SIDE is \
   function BUMP return BOOLEAN is \
   begin COUNT := COUNT + 1; return TRUE; end BUMP; \
 end SIDE; ";

#[test]
fn e2e_and_then_skips_right_operand() {
    let source = format!(
        "{}procedure MAIN is begin \
           if FALSE and then SIDE.BUMP then null; end if; \
           if TRUE or else SIDE.BUMP then null; end if; \
           PUT(SIDE.COUNT'IMAGE); \
         end MAIN;",
        SIDE_EFFECT_PACKAGE
    );
    assert_interpreter_output(&source, "0");
}

#[test]
fn e2e_and_then_evaluates_right_when_needed() {
    let source = format!(
        "{}procedure MAIN is begin \
           if TRUE and then SIDE.BUMP then null; end if; \
           PUT(SIDE.COUNT'IMAGE); \
         end MAIN;",
        SIDE_EFFECT_PACKAGE
    );
    assert_interpreter_output(&source, "1");
}

// =============================================================================
// E. Exceptions
// =============================================================================

#[test]
fn e2e_block_handler_catches_named_exception() {
    assert_interpreter_output(
        "procedure P is begin \
           begin \
             raise CONSTRAINT_ERROR; \
           exception \
             when CONSTRAINT_ERROR => PUT_LINE(\"caught\"); \
           end; \
         end P;",
        "caught\n",
    );
}

#[test]
fn e2e_user_exception_and_others_handler() {
    assert_interpreter_output(
        "procedure P is \
           TROUBLE : exception; \
         begin \
           raise TROUBLE; \
         exception \
           when others => PUT_LINE(\"handled\"); \
         end P;",
        "handled\n",
    );
}

#[test]
fn e2e_exception_unwinds_through_calls() {
    assert_interpreter_output(
        "procedure P is \
           procedure INNER is begin raise PROGRAM_ERROR; end INNER; \
         begin \
           INNER; \
         exception \
           when PROGRAM_ERROR => PUT_LINE(\"unwound\"); \
         end P;",
        "unwound\n",
    );
}

#[test]
fn e2e_bare_raise_rethrows() {
    assert_unhandled(
        "procedure P is begin \
           begin \
             raise CONSTRAINT_ERROR; \
           exception \
             when CONSTRAINT_ERROR => PUT_LINE(\"once\"); raise; \
           end; \
         end P;",
        "CONSTRAINT_ERROR",
    );
}

#[test]
fn e2e_handler_runs_exactly_once() {
    assert_interpreter_output(
        "procedure P is begin \
           begin \
             raise CONSTRAINT_ERROR; \
           exception \
             when CONSTRAINT_ERROR => PUT_LINE(\"one\"); \
             when others => PUT_LINE(\"two\"); \
           end; \
         end P;",
        "one\n",
    );
}

#[test]
fn e2e_deep_recursion_raises_storage_error() {
    assert_unhandled(
        "procedure P is \
           function LOOPY (N : INTEGER) return INTEGER is \
           begin return LOOPY(N + 1); end LOOPY; \
           X : INTEGER; \
         begin \
           X := LOOPY(1); \
         end P;",
        "STORAGE_ERROR",
    );
}

#[test]
fn e2e_index_out_of_range() {
    assert_unhandled(
        "procedure P is \
           type VEC is array (1 .. 3) of INTEGER; \
           V : VEC; \
           I : INTEGER := 9; \
           X : INTEGER; \
         begin \
           X := V(I); \
         end P;",
        "CONSTRAINT_ERROR",
    );
}

#[test]
fn e2e_null_dereference() {
    assert_unhandled(
        "procedure P is \
           type CELL is record VAL : INTEGER; end record; \
           type REF is access CELL; \
           R : REF; \
           X : INTEGER; \
         begin \
           X := R.VAL; \
         end P;",
        "CONSTRAINT_ERROR",
    );
}

// =============================================================================
// F. Composite values
// =============================================================================

#[test]
fn e2e_record_component_assignment() {
    assert_interpreter_output(
        "procedure P is \
           type PAIR is record A : INTEGER; B : INTEGER; end record; \
           X : PAIR; \
           S : INTEGER; \
         begin \
           X.A := 3; X.B := 4; \
           S := X.A + X.B; \
           PUT(S'IMAGE); \
         end P;",
        "7",
    );
}

#[test]
fn e2e_record_aggregate() {
    assert_interpreter_output(
        "procedure P is \
           type PAIR is record A : INTEGER; B : INTEGER; end record; \
           X : PAIR; \
           S : INTEGER; \
         begin \
           X := (A => 10, B => 20); \
           S := X.A + X.B; \
           PUT(S'IMAGE); \
         end P;",
        "30",
    );
}

#[test]
fn e2e_array_fill_and_sum() {
    assert_interpreter_output(
        "procedure P is \
           type VEC is array (1 .. 5) of INTEGER; \
           V : VEC; \
           S : INTEGER := 0; \
         begin \
           for I in 1 .. 5 loop V(I) := I * I; end loop; \
           for I in 1 .. 5 loop S := S + V(I); end loop; \
           PUT(S'IMAGE); \
         end P;",
        "55",
    );
}

#[test]
fn e2e_array_aggregate_with_others() {
    assert_interpreter_output(
        "procedure P is \
           type VEC is array (1 .. 4) of INTEGER; \
           V : VEC; \
           S : INTEGER := 0; \
         begin \
           V := (1 => 9, others => 1); \
           for I in 1 .. 4 loop S := S + V(I); end loop; \
           PUT(S'IMAGE); \
         end P;",
        "12",
    );
}

#[test]
fn e2e_array_attributes() {
    assert_interpreter_output(
        "procedure P is \
           type VEC is array (1 .. 5) of INTEGER; \
           V : VEC; \
         begin \
           PUT(VEC'FIRST'IMAGE); PUT(\" \"); \
           PUT(VEC'LAST'IMAGE); PUT(\" \"); \
           PUT(V'LENGTH'IMAGE); \
         end P;",
        "1 5 5",
    );
}

#[test]
fn e2e_iteration_over_array_range() {
    assert_interpreter_output(
        "procedure P is \
           type VEC is array (2 .. 4) of INTEGER; \
           V : VEC; \
           S : INTEGER := 0; \
         begin \
           for I in V'RANGE loop V(I) := I; end loop; \
           for I in VEC'RANGE loop S := S + V(I); end loop; \
           PUT(S'IMAGE); \
         end P;",
        "9",
    );
}

#[test]
fn e2e_arrays_share_backing_on_assignment() {
    assert_interpreter_output(
        "procedure P is \
           type VEC is array (1 .. 3) of INTEGER; \
           A : VEC; \
           B : VEC; \
         begin \
           A(1) := 1; \
           B := A; \
           B(1) := 5; \
           PUT(A(1)'IMAGE); \
         end P;",
        "5",
    );
}

// =============================================================================
// G. Strings and characters
// =============================================================================

#[test]
fn e2e_string_concatenation() {
    assert_interpreter_output(
        "procedure P is begin PUT_LINE(\"foo\" & \"bar\"); end P;",
        "foobar\n",
    );
}

#[test]
fn e2e_string_indexing_is_one_based() {
    assert_interpreter_output(
        "procedure P is \
           S : STRING(1 .. 5) := \"abcde\"; \
           C : CHARACTER; \
         begin \
           C := S(3); \
           PUT(C); \
         end P;",
        "c",
    );
}

#[test]
fn e2e_character_literals_print_themselves() {
    assert_interpreter_output(
        "procedure P is C : CHARACTER := 'x'; begin PUT(C); end P;",
        "x",
    );
}

#[test]
fn e2e_catenating_characters_builds_strings() {
    assert_interpreter_output(
        "procedure P is C : CHARACTER := '!'; begin \
           PUT_LINE(\"wow\" & C); end P;",
        "wow!\n",
    );
}

#[test]
fn e2e_string_comparison() {
    assert_interpreter_output(
        "procedure P is begin \
           if \"abc\" < \"abd\" then PUT_LINE(\"lt\"); end if; \
         end P;",
        "lt\n",
    );
}

// =============================================================================
// H. Subprograms
// =============================================================================

#[test]
fn e2e_out_parameter_writes_back() {
    assert_interpreter_output(
        "procedure P is \
           procedure GETVAL (R : out INTEGER) is begin R := 42; end GETVAL; \
           X : INTEGER := 0; \
         begin \
           GETVAL(X); \
           PUT(X'IMAGE); \
         end P;",
        "42",
    );
}

#[test]
fn e2e_named_associations_and_defaults() {
    assert_interpreter_output(
        "procedure P is \
           function ADD (A : INTEGER; B : INTEGER := 10) return INTEGER is \
           begin return A + B; end ADD; \
           S : INTEGER; \
         begin \
           S := ADD(5); PUT(S'IMAGE); PUT(\" \"); \
           S := ADD(B => 1, A => 2); PUT(S'IMAGE); \
         end P;",
        "15 3",
    );
}

#[test]
fn e2e_overloads_resolve_by_arity() {
    assert_interpreter_output(
        "procedure P is \
           function DOUBLE (X : INTEGER) return INTEGER is \
           begin return X * 2; end DOUBLE; \
           function DOUBLE (X : INTEGER; Y : INTEGER) return INTEGER is \
           begin return X * Y; end DOUBLE; \
           S : INTEGER; \
         begin \
           S := DOUBLE(3); PUT(S'IMAGE); PUT(\" \"); \
           S := DOUBLE(3, 4); PUT(S'IMAGE); \
         end P;",
        "6 12",
    );
}

#[test]
fn e2e_in_out_parameter() {
    assert_interpreter_output(
        "procedure P is \
           procedure BUMP (X : in out INTEGER) is begin X := X + 1; end BUMP; \
           N : INTEGER := 6; \
         begin \
           BUMP(N); BUMP(N); \
           PUT(N'IMAGE); \
         end P;",
        "8",
    );
}

// =============================================================================
// I. Packages
// =============================================================================

#[test]
fn e2e_package_state_and_qualified_names() {
    assert_interpreter_output(
        "package COUNTER is \
           VALUE : INTEGER := 0; \
           procedure BUMP; \
         end COUNTER; \
         package body COUNTER is \
           procedure BUMP is begin VALUE := VALUE + 1; end BUMP; \
         end COUNTER; \
         procedure MAIN is begin \
           COUNTER.BUMP; \
           COUNTER.BUMP; \
           PUT(COUNTER.VALUE'IMAGE); \
         end MAIN;",
        "2",
    );
}

#[test]
fn e2e_use_clause_makes_members_visible() {
    assert_interpreter_output(
        "package MATHS is \
           function SQUARE (X : INTEGER) return INTEGER; \
         end MATHS; \
         package body MATHS is \
           function SQUARE (X : INTEGER) return INTEGER is \
           begin return X * X; end SQUARE; \
         end MATHS; \
         procedure MAIN is \
           use MATHS; \
           S : INTEGER; \
         begin \
           S := SQUARE(9); \
           PUT(S'IMAGE); \
         end MAIN;",
        "81",
    );
}

#[test]
fn e2e_package_body_initialization_runs() {
    assert_interpreter_output(
        "package SETUP is \
           READY : INTEGER := 0; \
         end SETUP; \
         package body SETUP is \
         begin \
           READY := 1; \
         end SETUP; \
         procedure MAIN is begin \
           PUT(SETUP.READY'IMAGE); \
         end MAIN;",
        "1",
    );
}

// =============================================================================
// J. Access values, conversions, membership
// =============================================================================

#[test]
fn e2e_allocator_and_access_assignment() {
    assert_interpreter_output(
        "procedure P is \
           type CELL is record VAL : INTEGER; end record; \
           type REF is access CELL; \
           R : REF; \
           S : INTEGER; \
         begin \
           R := new CELL; \
           R.VAL := 5; \
           S := R.VAL; \
           PUT(S'IMAGE); \
         end P;",
        "5",
    );
}

#[test]
fn e2e_qualified_allocator() {
    assert_interpreter_output(
        "procedure P is \
           type REF is access INTEGER; \
           R : REF; \
           S : INTEGER; \
         begin \
           R := new INTEGER'(17); \
           S := R.all; \
           PUT(S'IMAGE); \
         end P;",
        "17",
    );
}

#[test]
fn e2e_type_conversion_rounds() {
    assert_interpreter_output(
        "procedure P is \
           F : FLOAT := 3.7; \
           N : INTEGER; \
         begin \
           N := INTEGER(F); \
           PUT(N'IMAGE); \
         end P;",
        "4",
    );
}

#[test]
fn e2e_real_arithmetic_image() {
    assert_interpreter_output(
        "procedure P is F : FLOAT; begin \
           F := 1.5 + 2.25; \
           PUT(F'IMAGE); \
         end P;",
        "3.75",
    );
}

#[test]
fn e2e_membership_tests() {
    assert_interpreter_output(
        "procedure P is X : INTEGER := 4; begin \
           if X in 1 .. 10 then PUT_LINE(\"in\"); end if; \
           if X not in 5 .. 9 then PUT_LINE(\"out\"); end if; \
         end P;",
        "in\nout\n",
    );
}

#[test]
fn e2e_succ_pred_val_pos() {
    assert_interpreter_output(
        "procedure P is \
           type COLOR is (RED, GREEN, BLUE); \
           C : COLOR := GREEN; \
           N : INTEGER; \
         begin \
           N := COLOR'POS(C); PUT(N'IMAGE); PUT(\" \"); \
           PUT(COLOR'POS(COLOR'SUCC(C))'IMAGE); PUT(\" \"); \
           PUT(COLOR'POS(COLOR'PRED(C))'IMAGE); \
         end P;",
        "1 2 0",
    );
}

#[test]
fn e2e_succ_past_the_end_raises() {
    assert_unhandled(
        "procedure P is \
           type COLOR is (RED, GREEN, BLUE); \
           C : COLOR := BLUE; \
           D : COLOR; \
         begin \
           D := COLOR'SUCC(C); \
         end P;",
        "CONSTRAINT_ERROR",
    );
}

// =============================================================================
// K. Declarations and constants
// =============================================================================

#[test]
fn e2e_named_number_feeds_type_bounds() {
    assert_interpreter_output(
        "procedure P is \
           TEN : constant := 10; \
           type SMALL is range 1 .. TEN; \
           K : constant INTEGER := TEN * 2; \
         begin \
           PUT(SMALL'LAST'IMAGE); PUT(\" \"); PUT(K'IMAGE); \
         end P;",
        "10 20",
    );
}

#[test]
fn e2e_subtype_constrains_conversion_checks() {
    assert_unhandled(
        "procedure P is \
           subtype DIGIT is INTEGER range 0 .. 9; \
           N : INTEGER := 42; \
           D : DIGIT; \
         begin \
           D := DIGIT(N); \
         end P;",
        "CONSTRAINT_ERROR",
    );
}

#[test]
fn e2e_object_renaming_aliases() {
    assert_interpreter_output(
        "procedure P is \
           LONG_NAME : INTEGER := 3; \
           N : INTEGER renames LONG_NAME; \
         begin \
           N := N + 4; \
           PUT(LONG_NAME'IMAGE); \
         end P;",
        "7",
    );
}

#[test]
fn e2e_identifier_case_is_insignificant() {
    assert_interpreter_output(
        "procedure P is Counter : INTEGER := 1; begin \
           COUNTER := counter + 1; \
           Put(CoUnTeR'Image); \
         end P;",
        "2",
    );
}

// =============================================================================
// L. Diagnostics
// =============================================================================

#[test]
fn e2e_undefined_identifier_reports_location() {
    assert_diagnostic(
        "procedure P is begin X := 1; end P;",
        "undefined identifier 'X'",
    );
    assert_diagnostic("procedure P is begin X := 1; end P;", "main.adb:1:22");
}

#[test]
fn e2e_type_mismatch_is_rejected() {
    assert_diagnostic(
        "procedure P is \
           type APPLES is range 1 .. 10; \
           type PEARS is range 1 .. 10; \
           A : APPLES := 1; \
           B : PEARS := 1; \
         begin \
           A := B; \
         end P;",
        "does not match",
    );
}

// =============================================================================
// M. Text input
// =============================================================================

#[test]
fn e2e_get_reads_integers() {
    assert_interpreter_io(
        "procedure P is X : INTEGER := 0; Y : INTEGER; begin \
           GET(X); Y := X * 2; PUT(Y'IMAGE); end P;",
        "21\n",
        "42",
    );
}

#[test]
fn e2e_get_line_reads_strings() {
    assert_interpreter_io(
        "procedure P is S : STRING(1 .. 10); begin \
           GET_LINE(S); PUT(S); end P;",
        "hi\n",
        "hi",
    );
}

#[test]
fn e2e_get_at_end_of_input_raises_end_error() {
    assert_unhandled(
        "procedure P is X : INTEGER := 0; begin GET(X); end P;",
        "END_ERROR",
    );
}

// =============================================================================
// N. Parse-only constructs stay inert
// =============================================================================

#[test]
fn e2e_tasking_statements_have_no_effect() {
    assert_interpreter_output(
        "procedure P is begin \
           delay 0.5; \
           PUT_LINE(\"alive\"); \
         end P;",
        "alive\n",
    );
}

#[test]
fn e2e_generic_declarations_are_accepted() {
    assert_interpreter_output(
        "procedure P is \
           generic type ELEM is private; \
           procedure NOOP (X : ELEM); \
         begin \
           PUT_LINE(\"fine\"); \
         end P;",
        "fine\n",
    );
}

#[test]
fn e2e_pragma_is_accepted_and_ignored() {
    assert_interpreter_output(
        "procedure P is pragma OPTIMIZE (TIME); begin PUT_LINE(\"on\"); end P;",
        "on\n",
    );
}
