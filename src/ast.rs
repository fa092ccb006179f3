// Copyright 2020 - 2026 LG Electronics Inc.

//! Source analysis over tree-sitter parse trees for C and C++.
//!
//! This is the ambient "source manager" the mutation operators consult:
//! it renders node ranges as [Span]s and text, identifies the enclosing
//! function, and answers conservative questions about operand types. The
//! type answers come from literal shapes and a scan of the file's
//! declarations, not from a real type checker, so they only ever veto a
//! mutation on positive evidence; anything unknown stays mutable.

use std::collections::HashMap;
use std::fs::read_to_string;

use anyhow::{anyhow, Context};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::{debug, warn};
use tree_sitter::{Node, Parser, Tree};

use crate::error::Error;
use crate::span::Span;
use crate::Result;

/// Which grammar to parse a file with.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dialect {
    C,
    Cpp,
}

/// A coarse classification of an expression's type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TypeGuess {
    Integral,
    Floating,
    Boolean,
    Pointer,
    Array,
    Unknown,
}

impl TypeGuess {
    pub fn is_pointer_like(self) -> bool {
        matches!(self, TypeGuess::Pointer | TypeGuess::Array)
    }
}

#[derive(Clone, Copy, Debug)]
struct VarInfo {
    kind: TypeGuess,
    is_const: bool,
}

/// One parsed translation unit.
pub struct SourceUnit {
    pub path: Utf8PathBuf,
    pub code: String,
    tree: Tree,
    vars: HashMap<String, VarInfo>,
}

impl SourceUnit {
    /// Read and parse one source file.
    pub fn load(path: &Utf8Path, dialect: Dialect) -> Result<SourceUnit> {
        let code = read_to_string(path).with_context(|| format!("read {path:?}"))?;
        SourceUnit::parse(path, code, dialect)
    }

    pub fn parse(path: &Utf8Path, code: String, dialect: Dialect) -> Result<SourceUnit> {
        let language = match dialect {
            Dialect::C => tree_sitter::Language::from(tree_sitter_c::LANGUAGE),
            Dialect::Cpp => tree_sitter::Language::from(tree_sitter_cpp::LANGUAGE),
        };
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|err| anyhow!("load grammar: {err}"))?;
        let tree = parser
            .parse(&code, None)
            .ok_or_else(|| anyhow!("failed to parse {path:?}"))?;
        let mut unit = SourceUnit {
            path: path.to_owned(),
            code,
            tree,
            vars: HashMap::new(),
        };
        unit.vars = unit.scan_declarations();
        Ok(unit)
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// The source text of a node.
    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.code.as_bytes()).unwrap_or("")
    }

    /// The node's range as a 1-based, end-exclusive [Span].
    pub fn span(&self, node: Node<'_>) -> Span {
        Span {
            start: node.start_position().into(),
            end: node.end_position().into(),
        }
    }

    /// True when the node sits inside a preprocessor construct, where a
    /// textual edit would not mean what the parse tree says it means.
    pub fn in_macro(&self, node: Node<'_>) -> bool {
        let mut cur = node;
        while let Some(parent) = cur.parent() {
            if parent.kind().starts_with("preproc") {
                return true;
            }
            cur = parent;
        }
        false
    }

    /// The number of enclosing compound statements between the node and
    /// its enclosing function. Deeper statements sit behind more guards.
    pub fn statement_depth(&self, node: Node<'_>) -> usize {
        let mut depth = 0;
        let mut cur = node;
        while let Some(parent) = cur.parent() {
            match parent.kind() {
                "compound_statement" => depth += 1,
                "function_definition" => break,
                _ => {}
            }
            cur = parent;
        }
        depth
    }

    /// The fully qualified name of the function containing `node`, with
    /// enclosing namespaces and classes joined by `::`. Empty when the
    /// node is outside any function.
    pub fn qualified_function(&self, node: Node<'_>) -> String {
        let mut func_name: Option<String> = None;
        let mut scopes: Vec<String> = Vec::new();
        let mut cur = node;
        while let Some(parent) = cur.parent() {
            match parent.kind() {
                "function_definition" if func_name.is_none() => {
                    func_name = self.declarator_name(parent);
                }
                "class_specifier" | "struct_specifier" => {
                    if func_name.is_some() {
                        if let Some(name) = parent.child_by_field_name("name") {
                            scopes.push(self.text(name).to_owned());
                        }
                    }
                }
                "namespace_definition" => {
                    if func_name.is_some() {
                        if let Some(name) = parent.child_by_field_name("name") {
                            scopes.push(self.text(name).to_owned());
                        }
                    }
                }
                _ => {}
            }
            cur = parent;
        }
        let Some(func) = func_name else {
            return String::new();
        };
        if scopes.is_empty() {
            func
        } else {
            scopes.reverse();
            format!("{}::{}", scopes.join("::"), func)
        }
    }

    fn declarator_name(&self, func_def: Node<'_>) -> Option<String> {
        let mut d = func_def.child_by_field_name("declarator")?;
        loop {
            match d.kind() {
                "function_declarator" | "pointer_declarator" | "reference_declarator"
                | "parenthesized_declarator" => {
                    d = d.child_by_field_name("declarator").or_else(|| {
                        // parenthesized_declarator has no field name
                        d.named_child(0)
                    })?;
                }
                "identifier" | "field_identifier" | "qualified_identifier" | "operator_name"
                | "destructor_name" => return Some(self.text(d).to_owned()),
                _ => return None,
            }
        }
    }

    /// Is the expression a null pointer literal (`nullptr` or `NULL`)?
    pub fn is_null_literal(&self, node: Node<'_>) -> bool {
        node.kind() == "null" || matches!(self.text(node), "nullptr" | "NULL")
    }

    /// Is the expression known to be declared `const`?
    pub fn is_const_expr(&self, node: Node<'_>) -> bool {
        match node.kind() {
            "identifier" => self
                .vars
                .get(self.text(node))
                .is_some_and(|v| v.is_const),
            "parenthesized_expression" => node
                .named_child(0)
                .is_some_and(|inner| self.is_const_expr(inner)),
            _ => false,
        }
    }

    /// A conservative guess at the expression's type.
    pub fn guess_type(&self, node: Node<'_>) -> TypeGuess {
        match node.kind() {
            "number_literal" => number_literal_type(self.text(node)),
            "true" | "false" => TypeGuess::Boolean,
            "char_literal" => TypeGuess::Integral,
            "string_literal" | "concatenated_string" | "raw_string_literal" => TypeGuess::Array,
            "null" => TypeGuess::Pointer,
            "identifier" => self
                .vars
                .get(self.text(node))
                .map_or(TypeGuess::Unknown, |v| v.kind),
            "parenthesized_expression" => node
                .named_child(0)
                .map_or(TypeGuess::Unknown, |inner| self.guess_type(inner)),
            "pointer_expression" => match self.operator_text(node) {
                Some("&") => TypeGuess::Pointer,
                // Dereference: the pointee type is unknown to us.
                _ => TypeGuess::Unknown,
            },
            "unary_expression" => match self.operator_text(node) {
                Some("!") => TypeGuess::Boolean,
                _ => node
                    .child_by_field_name("argument")
                    .map_or(TypeGuess::Unknown, |a| self.guess_type(a)),
            },
            "binary_expression" => self.binary_expression_type(node),
            "cast_expression" => node
                .child_by_field_name("type")
                .map_or(TypeGuess::Unknown, |t| type_text_guess(self.text(t))),
            "update_expression" | "assignment_expression" => node
                .child_by_field_name("argument")
                .or_else(|| node.child_by_field_name("left"))
                .map_or(TypeGuess::Unknown, |a| self.guess_type(a)),
            _ => TypeGuess::Unknown,
        }
    }

    fn binary_expression_type(&self, node: Node<'_>) -> TypeGuess {
        let Some(op) = self.operator_text(node) else {
            return TypeGuess::Unknown;
        };
        match op {
            "<" | "<=" | ">" | ">=" | "==" | "!=" | "&&" | "||" => TypeGuess::Boolean,
            "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" | "<<" | ">>" => {
                let left = node
                    .child_by_field_name("left")
                    .map_or(TypeGuess::Unknown, |n| self.guess_type(n));
                let right = node
                    .child_by_field_name("right")
                    .map_or(TypeGuess::Unknown, |n| self.guess_type(n));
                if left.is_pointer_like() || right.is_pointer_like() {
                    TypeGuess::Pointer
                } else if left == TypeGuess::Floating || right == TypeGuess::Floating {
                    TypeGuess::Floating
                } else if left == TypeGuess::Integral && right == TypeGuess::Integral {
                    TypeGuess::Integral
                } else {
                    TypeGuess::Unknown
                }
            }
            _ => TypeGuess::Unknown,
        }
    }

    /// The text of a node's `operator` field, when it has one.
    pub fn operator_text(&self, node: Node<'_>) -> Option<&str> {
        node.child_by_field_name("operator").map(|op| self.text(op))
    }

    /// Scan every declaration in the file and classify the declared
    /// names. Scoping is ignored: the last declaration of a name wins,
    /// which is good enough for a veto-only type oracle.
    fn scan_declarations(&self) -> HashMap<String, VarInfo> {
        let mut vars = HashMap::new();
        let mut cursor = self.root().walk();
        let mut done = false;
        while !done {
            let node = cursor.node();
            if matches!(
                node.kind(),
                "declaration" | "parameter_declaration" | "field_declaration"
            ) {
                self.scan_one_declaration(node, &mut vars);
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    done = true;
                    break;
                }
            }
        }
        vars
    }

    fn scan_one_declaration(&self, decl: Node<'_>, vars: &mut HashMap<String, VarInfo>) {
        let base = decl
            .child_by_field_name("type")
            .map_or(TypeGuess::Unknown, |t| type_text_guess(self.text(t)));
        let mut is_const = false;
        let mut cursor = decl.walk();
        for child in decl.children(&mut cursor) {
            if child.kind() == "type_qualifier" && self.text(child) == "const" {
                is_const = true;
            }
        }
        let mut cursor = decl.walk();
        for child in decl.children(&mut cursor) {
            if matches!(
                child.kind(),
                "init_declarator"
                    | "pointer_declarator"
                    | "array_declarator"
                    | "reference_declarator"
                    | "identifier"
                    | "field_identifier"
            ) {
                if let Some((name, kind)) = self.declared_name(child, base) {
                    vars.insert(name, VarInfo { kind, is_const });
                }
            }
        }
    }

    fn declared_name(&self, declarator: Node<'_>, base: TypeGuess) -> Option<(String, TypeGuess)> {
        match declarator.kind() {
            "identifier" | "field_identifier" => {
                Some((self.text(declarator).to_owned(), base))
            }
            "init_declarator" | "reference_declarator" => {
                let inner = declarator
                    .child_by_field_name("declarator")
                    .or_else(|| declarator.named_child(0))?;
                self.declared_name(inner, base)
            }
            "pointer_declarator" => {
                let inner = declarator.child_by_field_name("declarator")?;
                self.declared_name(inner, TypeGuess::Pointer)
            }
            "array_declarator" => {
                let inner = declarator.child_by_field_name("declarator")?;
                self.declared_name(inner, TypeGuess::Array)
            }
            _ => None,
        }
    }
}

fn number_literal_type(text: &str) -> TypeGuess {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") || lower.starts_with("0b") {
        return TypeGuess::Integral;
    }
    if lower.contains('.') || lower.ends_with('f') || lower.contains('e') {
        TypeGuess::Floating
    } else {
        TypeGuess::Integral
    }
}

/// Classify a spelled-out type, e.g. from a declaration or a cast.
fn type_text_guess(text: &str) -> TypeGuess {
    let text = text.trim();
    if text.contains('*') {
        return TypeGuess::Pointer;
    }
    if text.contains("float") || text.contains("double") {
        return TypeGuess::Floating;
    }
    if text.contains("bool") || text.contains("_Bool") {
        return TypeGuess::Boolean;
    }
    const INTEGRAL: &[&str] = &[
        "int", "char", "short", "long", "unsigned", "signed", "size_t", "ssize_t", "ptrdiff_t",
        "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
        "uintptr_t", "intptr_t",
    ];
    if text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|word| INTEGRAL.contains(&word))
    {
        return TypeGuess::Integral;
    }
    TypeGuess::Unknown
}

/// One entry of `compile_commands.json`.
#[derive(Debug, Deserialize)]
pub struct CompileCommand {
    pub directory: String,
    pub file: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
}

impl CompileCommand {
    fn command_line(&self) -> String {
        if let Some(command) = &self.command {
            command.clone()
        } else if let Some(arguments) = &self.arguments {
            arguments.join(" ")
        } else {
            String::new()
        }
    }
}

/// The compilation database: which files the build knows about, and how
/// it compiles them. Its absence is a configuration error; mutating
/// files the build does not compile would silently test nothing.
#[derive(Debug)]
pub struct CompilationDb {
    entries: HashMap<Utf8PathBuf, CompileCommand>,
}

impl CompilationDb {
    pub fn load(build_dir: &Utf8Path) -> Result<CompilationDb> {
        let path = build_dir.join("compile_commands.json");
        if !path.is_file() {
            return Err(Error::config(format!(
                "no compilation database at {path}; configure the build with \
                 CMAKE_EXPORT_COMPILE_COMMANDS or point --build-dir at one"
            ))
            .into());
        }
        let text = read_to_string(&path).with_context(|| format!("read {path:?}"))?;
        let commands: Vec<CompileCommand> =
            serde_json::from_str(&text).with_context(|| format!("parse {path:?}"))?;
        let mut entries = HashMap::new();
        for command in commands {
            let file = Utf8Path::new(&command.file);
            let absolute = if file.is_absolute() {
                file.to_owned()
            } else {
                Utf8Path::new(&command.directory).join(file)
            };
            let key = crate::path::canonicalize(&absolute).unwrap_or(absolute);
            entries.insert(key, command);
        }
        debug!(entries = entries.len(), "loaded compilation database");
        Ok(CompilationDb { entries })
    }

    pub fn contains(&self, path: &Utf8Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Decide the grammar for a file from its compile command, falling
    /// back to the extension for files the database does not list.
    pub fn dialect_for(&self, path: &Utf8Path) -> Dialect {
        if let Some(entry) = self.entries.get(path) {
            let command = entry.command_line();
            if command.contains("++") || command.contains("-x c++") {
                return Dialect::Cpp;
            }
            if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("c")) {
                return Dialect::C;
            }
            return Dialect::Cpp;
        }
        warn!(?path, "file not in compilation database; guessing dialect from extension");
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("c")) {
            Dialect::C
        } else {
            Dialect::Cpp
        }
    }
}

#[cfg(test)]
mod test {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn unit(code: &str) -> SourceUnit {
        SourceUnit::parse(Utf8Path::new("/t/sample.cpp"), code.to_owned(), Dialect::Cpp).unwrap()
    }

    fn find_node<'t>(unit: &'t SourceUnit, kind: &str, text: &str) -> Node<'t> {
        let mut cursor = unit.root().walk();
        let mut found = None;
        let mut done = false;
        while !done {
            let node = cursor.node();
            if node.kind() == kind && unit.text(node) == text {
                found = Some(node);
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    done = true;
                    break;
                }
            }
        }
        found.unwrap_or_else(|| panic!("no {kind} node with text {text:?}"))
    }

    #[test]
    fn spans_are_one_based_byte_columns() {
        let unit = unit("int f() { return 1 + 2; }\n");
        let expr = find_node(&unit, "binary_expression", "1 + 2");
        assert_eq!(unit.span(expr), crate::span::Span::quad(1, 18, 1, 23));
        let op = expr.child_by_field_name("operator").unwrap();
        assert_eq!(unit.span(op), crate::span::Span::quad(1, 20, 1, 21));
    }

    #[test]
    fn qualified_function_includes_scopes() {
        let code = indoc! {r"
            namespace net {
            class Socket {
              int close() { return fd + 1; }
            };
            int open() { return 2 + 3; }
            }
            int main() { return 4 + 5; }
        "};
        let unit = unit(code);
        let inner = find_node(&unit, "binary_expression", "fd + 1");
        assert_eq!(unit.qualified_function(inner), "net::Socket::close");
        let free = find_node(&unit, "binary_expression", "2 + 3");
        assert_eq!(unit.qualified_function(free), "net::open");
        let main = find_node(&unit, "binary_expression", "4 + 5");
        assert_eq!(unit.qualified_function(main), "main");
    }

    #[test]
    fn top_level_initializer_has_no_function() {
        let unit = unit("int x = 1 + 2;\n");
        let expr = find_node(&unit, "binary_expression", "1 + 2");
        assert_eq!(unit.qualified_function(expr), "");
    }

    #[test]
    fn statement_depth_counts_compounds() {
        let code = indoc! {r"
            int f(int a) {
              if (a > 0) {
                while (a > 1) {
                  a = a - 1;
                }
              }
              return a;
            }
        "};
        let unit = unit(code);
        let deep = find_node(&unit, "expression_statement", "a = a - 1;");
        assert_eq!(unit.statement_depth(deep), 3);
        let shallow = find_node(&unit, "return_statement", "return a;");
        assert_eq!(unit.statement_depth(shallow), 1);
    }

    #[test]
    fn type_guesses_from_declarations() {
        let code = indoc! {r"
            int f(double scale, const int limit) {
              int count = 0;
              char *name = 0;
              int grid[4];
              bool ready = false;
              return count;
            }
        "};
        let unit = unit(code);
        let at = |t: &str| find_node(&unit, "identifier", t);
        // Each identifier occurs in several places; any occurrence
        // resolves through the same declaration table.
        assert_eq!(unit.guess_type(at("count")), TypeGuess::Integral);
        assert_eq!(unit.guess_type(at("scale")), TypeGuess::Floating);
        assert_eq!(unit.guess_type(at("name")), TypeGuess::Pointer);
        assert_eq!(unit.guess_type(at("grid")), TypeGuess::Array);
        assert_eq!(unit.guess_type(at("ready")), TypeGuess::Boolean);
        assert!(unit.is_const_expr(at("limit")));
        assert!(!unit.is_const_expr(at("count")));
    }

    #[test]
    fn literal_type_guesses() {
        assert_eq!(number_literal_type("42"), TypeGuess::Integral);
        assert_eq!(number_literal_type("0x2a"), TypeGuess::Integral);
        assert_eq!(number_literal_type("4.2"), TypeGuess::Floating);
        assert_eq!(number_literal_type("1e9"), TypeGuess::Floating);
        assert_eq!(number_literal_type("1.0f"), TypeGuess::Floating);
    }

    #[test]
    fn null_literals() {
        let unit = unit("bool f(int *p) { return p == nullptr; }\n");
        let null = find_node(&unit, "null", "nullptr");
        assert!(unit.is_null_literal(null));
    }

    #[test]
    fn binary_expression_types_combine_operands() {
        let unit = unit("int f(int a, double b) { return a + 1; }\n");
        let e = find_node(&unit, "binary_expression", "a + 1");
        assert_eq!(unit.guess_type(e), TypeGuess::Integral);

        let unit2 = unit_of("int f(int a, double b) { return b + 1; }");
        let e2 = find_node(&unit2, "binary_expression", "b + 1");
        assert_eq!(unit2.guess_type(e2), TypeGuess::Floating);
    }

    fn unit_of(code: &str) -> SourceUnit {
        SourceUnit::parse(
            Utf8Path::new("/t/sample.cpp"),
            format!("{code}\n"),
            Dialect::Cpp,
        )
        .unwrap()
    }

    #[test]
    fn missing_compilation_database_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompilationDb::load(Utf8Path::from_path(dir.path()).unwrap()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Config(_))
        ));
    }

    #[test]
    fn compilation_database_dialects() {
        let dir = tempfile::tempdir().unwrap();
        let src_c = dir.path().join("pure.c");
        let src_cpp = dir.path().join("fancy.cc");
        std::fs::write(&src_c, "int x;\n").unwrap();
        std::fs::write(&src_cpp, "int y;\n").unwrap();
        let db_json = format!(
            r#"[
                {{"directory": "{d}", "command": "cc -c pure.c", "file": "pure.c"}},
                {{"directory": "{d}", "command": "c++ -c fancy.cc", "file": "fancy.cc"}}
            ]"#,
            d = dir.path().display()
        );
        std::fs::write(dir.path().join("compile_commands.json"), db_json).unwrap();
        let build_dir = Utf8Path::from_path(dir.path()).unwrap();
        let db = CompilationDb::load(build_dir).unwrap();

        let c_path = crate::path::canonicalize(&Utf8PathBuf::try_from(src_c).unwrap()).unwrap();
        let cpp_path = crate::path::canonicalize(&Utf8PathBuf::try_from(src_cpp).unwrap()).unwrap();
        assert!(db.contains(&c_path));
        assert!(db.contains(&cpp_path));
        assert_eq!(db.dialect_for(&c_path), Dialect::C);
        assert_eq!(db.dialect_for(&cpp_path), Dialect::Cpp);
    }
}
