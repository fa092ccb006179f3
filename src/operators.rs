// Copyright 2020 - 2026 LG Electronics Inc.

//! The mutation operator catalog: which AST nodes each operator can
//! mutate, and the mutants it emits for them.
//!
//! Every operator shares three preconditions: the node must lie outside
//! preprocessor constructs, the enclosing function is recorded when one
//! exists, and replacements must yield well-formed tokens after
//! substitution. Type-based guards come from the facade's conservative
//! guesses and only veto on positive evidence.

use tree_sitter::Node;

use crate::ast::{SourceUnit, TypeGuess};
use crate::mutant::{Mutant, Operator};

/// Catalog order; also the emission order at any single node.
pub const ALL: [Operator; 7] = [
    Operator::Aor,
    Operator::Bor,
    Operator::Ror,
    Operator::Sor,
    Operator::Lcr,
    Operator::Sdl,
    Operator::Uoi,
];

const ARITHMETIC: [&str; 5] = ["+", "-", "*", "/", "%"];
const BITWISE: [&str; 3] = ["&", "|", "^"];
const RELATIONAL: [&str; 6] = ["<", "<=", ">", ">=", "==", "!="];
const SHIFT: [&str; 2] = ["<<", ">>"];
const LOGICAL: [&str; 2] = ["&&", "||"];

impl Operator {
    /// A pure predicate: could this operator mutate this node?
    pub fn applicable(self, unit: &SourceUnit, node: Node<'_>) -> bool {
        match self {
            Operator::Aor => binary_operator_in(unit, node, &ARITHMETIC),
            Operator::Bor => binary_operator_in(unit, node, &BITWISE),
            Operator::Ror => binary_operator_in(unit, node, &RELATIONAL),
            Operator::Sor => binary_operator_in(unit, node, &SHIFT),
            Operator::Lcr => binary_operator_in(unit, node, &LOGICAL),
            Operator::Sdl => sdl_applicable(node),
            Operator::Uoi => uoi_applicable(unit, node),
        }
    }

    /// Push zero or more mutants for this node. Idempotent and free of
    /// side effects on the tree.
    pub fn emit(self, unit: &SourceUnit, node: Node<'_>, sink: &mut Vec<Mutant>) {
        if unit.in_macro(node) {
            return;
        }
        match self {
            Operator::Aor => emit_aor(unit, node, sink),
            Operator::Bor => emit_operator_swap(unit, node, &BITWISE, Operator::Bor, sink),
            Operator::Ror => emit_ror(unit, node, sink),
            Operator::Sor => emit_operator_swap(unit, node, &SHIFT, Operator::Sor, sink),
            Operator::Lcr => emit_lcr(unit, node, sink),
            Operator::Sdl => emit_sdl(unit, node, sink),
            Operator::Uoi => emit_uoi(unit, node, sink),
        }
    }
}

struct BinaryParts<'t> {
    token: &'t str,
    left: Node<'t>,
    right: Node<'t>,
    op_node: Node<'t>,
}

fn binary_parts<'t>(unit: &'t SourceUnit, node: Node<'t>) -> Option<BinaryParts<'t>> {
    if node.kind() != "binary_expression" {
        return None;
    }
    let op_node = node.child_by_field_name("operator")?;
    Some(BinaryParts {
        token: unit.text(op_node),
        left: node.child_by_field_name("left")?,
        right: node.child_by_field_name("right")?,
        op_node,
    })
}

fn binary_operator_in(unit: &SourceUnit, node: Node<'_>, set: &[&str]) -> bool {
    binary_parts(unit, node).is_some_and(|p| set.contains(&p.token))
}

fn push(
    unit: &SourceUnit,
    operator: Operator,
    node: Node<'_>,
    span: crate::span::Span,
    replacement: &str,
    sink: &mut Vec<Mutant>,
) {
    sink.push(Mutant {
        operator,
        path: unit.path.clone(),
        qualified_function: unit.qualified_function(node),
        span,
        replacement: replacement.to_owned(),
    });
}

/// Swap one binary operator token for each other member of its set.
fn emit_operator_swap(
    unit: &SourceUnit,
    node: Node<'_>,
    set: &[&str],
    operator: Operator,
    sink: &mut Vec<Mutant>,
) {
    let Some(parts) = binary_parts(unit, node) else {
        return;
    };
    for replacement in set {
        if *replacement != parts.token {
            push(unit, operator, node, unit.span(parts.op_node), replacement, sink);
        }
    }
}

fn emit_aor(unit: &SourceUnit, node: Node<'_>, sink: &mut Vec<Mutant>) {
    let Some(parts) = binary_parts(unit, node) else {
        return;
    };
    let left = unit.guess_type(parts.left);
    let right = unit.guess_type(parts.right);
    // Two pointers can only be subtracted from each other; no other
    // arithmetic operator would form a valid expression.
    if left.is_pointer_like() && right.is_pointer_like() {
        return;
    }
    for replacement in &ARITHMETIC {
        if *replacement == parts.token {
            continue;
        }
        // Modulo only takes integral operands.
        if *replacement == "%"
            && (left == TypeGuess::Floating
                || right == TypeGuess::Floating
                || left.is_pointer_like()
                || right.is_pointer_like())
        {
            continue;
        }
        // Multiplicative operators only take non-pointer operands.
        if (*replacement == "*" || *replacement == "/")
            && (left.is_pointer_like() || right.is_pointer_like())
        {
            continue;
        }
        push(unit, Operator::Aor, node, unit.span(parts.op_node), replacement, sink);
    }
}

fn emit_ror(unit: &SourceUnit, node: Node<'_>, sink: &mut Vec<Mutant>) {
    let Some(parts) = binary_parts(unit, node) else {
        return;
    };
    // Comparing against a null pointer literal only stays well-formed
    // (and meaningful) for equality operators.
    let operand_is_null =
        unit.is_null_literal(parts.left) || unit.is_null_literal(parts.right);
    for replacement in &RELATIONAL {
        if *replacement == parts.token {
            continue;
        }
        if operand_is_null && *replacement != "==" && *replacement != "!=" {
            continue;
        }
        push(unit, Operator::Ror, node, unit.span(parts.op_node), replacement, sink);
    }
    // Also force the whole comparison to each truth value.
    let span = unit.span(node);
    push(unit, Operator::Ror, node, span, "1", sink);
    push(unit, Operator::Ror, node, span, "0", sink);
}

fn emit_lcr(unit: &SourceUnit, node: Node<'_>, sink: &mut Vec<Mutant>) {
    let Some(parts) = binary_parts(unit, node) else {
        return;
    };
    for replacement in &LOGICAL {
        if *replacement != parts.token {
            push(unit, Operator::Lcr, node, unit.span(parts.op_node), replacement, sink);
        }
    }
    // The whole connective forced to each truth value, and to each of
    // its operands alone.
    let span = unit.span(node);
    push(unit, Operator::Lcr, node, span, "1", sink);
    push(unit, Operator::Lcr, node, span, "0", sink);
    let left_text = unit.text(parts.left);
    if !left_text.is_empty() {
        push(unit, Operator::Lcr, node, span, left_text, sink);
    }
    let right_text = unit.text(parts.right);
    if !right_text.is_empty() {
        push(unit, Operator::Lcr, node, span, right_text, sink);
    }
}

/// Statement kinds SDL may delete. Control-flow headers, declarations,
/// compound bodies and `return` are off-limits: deleting them changes
/// scoping or control flow rather than one effect.
fn sdl_applicable(node: Node<'_>) -> bool {
    match node.kind() {
        "expression_statement" => {
            // A bare `;` has nothing to delete, and deleting a
            // `delete` expression would leak rather than probe.
            match node.named_child(0) {
                None => return false,
                Some(inner) if inner.kind() == "delete_expression" => return false,
                Some(_) => {}
            }
        }
        "break_statement" | "continue_statement" | "goto_statement" => {}
        _ => return false,
    }
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "compound_statement" => {
            // Inside a GNU statement expression the last statement is
            // the expression's value; deleting it changes the type.
            if parent
                .parent()
                .is_some_and(|gp| gp.kind() == "parenthesized_expression")
            {
                let last = parent.named_child(parent.named_child_count().saturating_sub(1));
                if last.is_some_and(|l| l.id() == node.id()) {
                    return false;
                }
            }
            true
        }
        // The single-statement body of a control construct.
        "if_statement" => parent
            .child_by_field_name("consequence")
            .is_some_and(|c| c.id() == node.id()),
        "else_clause" => true,
        "while_statement" | "do_statement" | "for_statement" | "for_range_loop" => parent
            .child_by_field_name("body")
            .is_some_and(|b| b.id() == node.id()),
        _ => false,
    }
}

fn emit_sdl(unit: &SourceUnit, node: Node<'_>, sink: &mut Vec<Mutant>) {
    if !sdl_applicable(node) {
        return;
    }
    push(unit, Operator::Sdl, node, unit.span(node), "{}", sink);
}

fn uoi_applicable(unit: &SourceUnit, node: Node<'_>) -> bool {
    match node.kind() {
        "identifier" => {
            // Only names we can positively classify as variables, in
            // expression position.
            if unit.guess_type(node) == TypeGuess::Unknown {
                return false;
            }
            let Some(parent) = node.parent() else {
                return false;
            };
            match parent.kind() {
                "call_expression" => parent
                    .child_by_field_name("function")
                    .map_or(true, |f| f.id() != node.id()),
                "field_expression" => parent
                    .child_by_field_name("field")
                    .map_or(true, |f| f.id() != node.id()),
                "declaration" | "init_declarator" | "parameter_declaration"
                | "function_declarator" | "pointer_declarator" | "array_declarator" => false,
                kind => !kind.starts_with("preproc"),
            }
        }
        "field_expression" | "subscript_expression" => true,
        "pointer_expression" => unit.operator_text(node) == Some("*"),
        _ => false,
    }
}

fn emit_uoi(unit: &SourceUnit, node: Node<'_>, sink: &mut Vec<Mutant>) {
    if !uoi_applicable(unit, node) || unit.is_const_expr(node) {
        return;
    }
    let guess = unit.guess_type(node);
    let text = unit.text(node);
    let span = unit.span(node);
    match guess {
        TypeGuess::Boolean => {
            push(unit, Operator::Uoi, node, span, &format!("(!({text}))"), sink);
        }
        TypeGuess::Pointer | TypeGuess::Array => {}
        // Scalar, or unresolvable member/element types: insert the
        // increment and decrement probes.
        TypeGuess::Integral | TypeGuess::Floating | TypeGuess::Unknown => {
            if node.kind() == "identifier" && guess == TypeGuess::Unknown {
                return;
            }
            push(unit, Operator::Uoi, node, span, &format!("(({text})++)"), sink);
            push(unit, Operator::Uoi, node, span, &format!("(({text})--)"), sink);
        }
    }
}

#[cfg(test)]
mod test {
    use camino::Utf8Path;
    use indoc::indoc;
    use itertools::Itertools;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Dialect;

    fn mutants_of(code: &str) -> Vec<Mutant> {
        let unit = SourceUnit::parse(
            Utf8Path::new("/t/sample.cpp"),
            code.to_owned(),
            Dialect::Cpp,
        )
        .unwrap();
        let lines = (1..=code.lines().count()).collect_vec();
        crate::visit::collect(&unit, &lines).mutants
    }

    fn replacements(mutants: &[Mutant], operator: Operator) -> Vec<&str> {
        mutants
            .iter()
            .filter(|m| m.operator == operator)
            .map(|m| m.replacement.as_str())
            .collect()
    }

    #[test]
    fn aor_swaps_arithmetic_operators() {
        let mutants = mutants_of("int f(int a, int b) { return a + b; }\n");
        assert_eq!(
            replacements(&mutants, Operator::Aor),
            ["-", "*", "/", "%"]
        );
        let m = &mutants[0];
        assert_eq!(m.qualified_function, "f");
        assert_eq!(m.span, crate::span::Span::quad(1, 32, 1, 33));
    }

    #[test]
    fn aor_skips_modulo_for_floating_operands() {
        let mutants = mutants_of("double f(double a, int b) { return a - b; }\n");
        assert_eq!(replacements(&mutants, Operator::Aor), ["+", "*", "/"]);
    }

    #[test]
    fn aor_on_pointer_arithmetic_keeps_only_additive() {
        let mutants = mutants_of("char g(char *p, int i) { return *(p + i); }\n");
        assert_eq!(replacements(&mutants, Operator::Aor), ["-"]);
    }

    #[test]
    fn aor_skips_pointer_minus_pointer_entirely() {
        let mutants = mutants_of("long f(char *p, char *q) { return p - q; }\n");
        assert_eq!(replacements(&mutants, Operator::Aor), [] as [&str; 0]);
    }

    #[test]
    fn bor_swaps_bitwise_operators() {
        let mutants = mutants_of("int f(int a, int b) { return a & b; }\n");
        assert_eq!(replacements(&mutants, Operator::Bor), ["|", "^"]);
    }

    #[test]
    fn sor_swaps_shifts() {
        let mutants = mutants_of("int f(int a) { return a << 2; }\n");
        assert_eq!(replacements(&mutants, Operator::Sor), [">>"]);
    }

    #[test]
    fn ror_swaps_and_forces_truth_values() {
        let mutants = mutants_of("bool f(int a, int b) { return a < b; }\n");
        assert_eq!(
            replacements(&mutants, Operator::Ror),
            ["<=", ">", ">=", "==", "!=", "1", "0"]
        );
    }

    #[test]
    fn ror_null_comparison_only_swaps_equality() {
        let mutants = mutants_of("bool f(int *p) { return p == nullptr; }\n");
        assert_eq!(replacements(&mutants, Operator::Ror), ["!=", "1", "0"]);
    }

    #[test]
    fn lcr_swaps_forces_and_reduces_to_operands() {
        let mutants = mutants_of("bool f(bool a, bool b) { return a && b; }\n");
        assert_eq!(
            replacements(&mutants, Operator::Lcr),
            ["||", "1", "0", "a", "b"]
        );
        // The operand reductions span the whole connective.
        let whole = mutants
            .iter()
            .filter(|m| m.operator == Operator::Lcr && m.replacement == "a")
            .exactly_one()
            .unwrap();
        assert_eq!(whole.span, crate::span::Span::quad(1, 33, 1, 39));
    }

    #[test]
    fn sdl_deletes_simple_statements_in_blocks() {
        let code = indoc! {r"
            void f(int a) {
              work(a);
              if (a > 0)
                log(a);
              return;
            }
        "};
        let mutants = mutants_of(code);
        let sdl: Vec<&Mutant> = mutants
            .iter()
            .filter(|m| m.operator == Operator::Sdl)
            .collect();
        let texts: Vec<String> = sdl.iter().map(|m| m.span.extract(code)).collect();
        // `work(a);` in the block, and the single-statement if body;
        // never the `return` and never the `if` header.
        assert_eq!(texts, ["work(a);", "log(a);"]);
        assert!(sdl.iter().all(|m| m.replacement == "{}"));
    }

    #[test]
    fn sdl_skips_declarations_null_statements_and_headers() {
        let code = indoc! {r"
            int f(int a) {
              int b = a;
              ;
              while (a > 0) {
                a = a - 1;
              }
              return b;
            }
        "};
        let texts: Vec<String> = mutants_of(code)
            .iter()
            .filter(|m| m.operator == Operator::Sdl)
            .map(|m| m.span.extract(code))
            .collect();
        assert_eq!(texts, ["a = a - 1;"]);
    }

    #[test]
    fn uoi_increments_scalars_and_negates_booleans() {
        let code = "int f(int n, bool ok) { return ok ? n : 0; }\n";
        let mutants = mutants_of(code);
        let uoi = replacements(&mutants, Operator::Uoi);
        assert!(uoi.contains(&"((n)++)"));
        assert!(uoi.contains(&"((n)--)"));
        assert!(uoi.contains(&"(!(ok))"));
    }

    #[test]
    fn uoi_skips_const_and_pointer_variables() {
        let code = "int f(const int k, int *p) { return k; }\n";
        let uoi = mutants_of(code)
            .iter()
            .filter(|m| m.operator == Operator::Uoi)
            .count();
        assert_eq!(uoi, 0);
    }

    #[test]
    fn uoi_covers_member_and_subscript_expressions() {
        let code = indoc! {r"
            struct S { int n; };
            int f(S s, int v[]) { return s.n + v[0]; }
        "};
        let mutants = mutants_of(code);
        let uoi = replacements(&mutants, Operator::Uoi);
        assert!(uoi.contains(&"((s.n)++)"));
        assert!(uoi.contains(&"((v[0])--)"));
    }

    #[test]
    fn nothing_is_emitted_inside_macro_definitions() {
        let code = "#define ADD(a, b) ((a) + (b))\nint f() { return 1; }\n";
        let mutants = mutants_of(code);
        assert_eq!(
            mutants.iter().filter(|m| m.operator == Operator::Aor).count(),
            0
        );
    }

    #[test]
    fn emission_is_idempotent() {
        let code = "int f(int a, int b) { return a + b; }\n";
        assert_eq!(mutants_of(code), mutants_of(code));
    }
}
