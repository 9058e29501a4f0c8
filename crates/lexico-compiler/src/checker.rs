//! Lexico analyzer: validates a parsed program against the capability
//! registry before emission.
//!
//! Entry point: [`Analyzer::check`].
//!
//! Error codes emitted:
//! - E200: unknown library type
//! - E201: unknown method, property or event
//! - E202: wrong argument count
//! - E203: method without a return value used in an expression
//! - E204: property cannot be read
//! - E205: property cannot be written
//! - E206: event handler is not a subroutine
//! - E300: undeclared variable
//! - E301: undefined label
//! - E302: undefined subroutine
//! - E303: duplicate label
//! - E304: duplicate subroutine
//! - E400: label inside a block
//! - E401: subroutine declared inside a block or another subroutine
//! - E402: array element assignment without an index

use std::collections::HashSet;

use lexico_library::{CapabilityRegistry, MethodDescriptor, PropertyDescriptor};
use lexico_types::ir::{Expr, Program, Stmt, StmtKind, SymbolTable, Target};
use lexico_types::{CompileError, CompileErrors, ErrorCode, SourceFile, Span};

use crate::env::{RoutineEnv, ScopeKind};

// ══════════════════════════════════════════════════════════════════════════════
// Analyzer
// ══════════════════════════════════════════════════════════════════════════════

/// Walks a parsed [`Program`] and reports everything the emitter would
/// reject.
pub struct Analyzer<'a> {
    registry: &'a CapabilityRegistry,
    errors: &'a mut CompileErrors,
    source: &'a SourceFile,
    env: RoutineEnv,
    /// Every subroutine name declared anywhere in the program.
    subroutines: HashSet<String>,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        registry: &'a CapabilityRegistry,
        errors: &'a mut CompileErrors,
        source: &'a SourceFile,
    ) -> Self {
        Self {
            registry,
            errors,
            source,
            env: RoutineEnv::new(),
            subroutines: HashSet::new(),
        }
    }

    /// Check a complete program.
    pub fn check(&mut self, program: &Program) {
        // Subroutines may be called and subscribed before their declaration.
        self.declare_subroutines(&program.body);
        self.declare_labels(&program.body);
        self.check_body(&program.body, &program.symbols);
    }

    fn declare_subroutines(&mut self, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Sub { name, body } => {
                    if !self.subroutines.insert(name.clone()) {
                        self.error(
                            ErrorCode::DUPLICATE_SUBROUTINE,
                            format!("Subroutine '{name}' is declared more than once"),
                            stmt.span,
                        );
                    }
                    self.declare_subroutines(body);
                }
                StmtKind::If {
                    then,
                    else_if,
                    otherwise,
                    ..
                } => {
                    self.declare_subroutines(then);
                    for arm in else_if {
                        self.declare_subroutines(&arm.body);
                    }
                    self.declare_subroutines(otherwise);
                }
                StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                    self.declare_subroutines(body);
                }
                _ => {}
            }
        }
    }

    /// Define the top-level labels of the current routine.
    fn declare_labels(&mut self, body: &[Stmt]) {
        for stmt in body {
            if let StmtKind::Label { name } = &stmt.kind {
                if !self.env.define_label(name) {
                    self.error(
                        ErrorCode::DUPLICATE_LABEL,
                        format!("Label '{name}' is defined more than once"),
                        stmt.span,
                    );
                }
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    fn check_body(&mut self, body: &[Stmt], symbols: &SymbolTable) {
        for stmt in body {
            self.check_stmt(stmt, symbols);
        }
    }

    fn check_block(&mut self, body: &[Stmt], symbols: &SymbolTable) {
        self.env.push_scope(ScopeKind::Block);
        self.check_body(body, symbols);
        self.env.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt, symbols: &SymbolTable) {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Assign { target, value } => self.check_assign(target, value, span, symbols),
            StmtKind::Call {
                type_name,
                method,
                args,
            } => {
                self.check_call(type_name, method, args.len(), span);
                self.check_exprs(args, span, symbols);
            }
            StmtKind::If {
                condition,
                then,
                else_if,
                otherwise,
            } => {
                self.check_expr(condition, span, symbols);
                self.check_block(then, symbols);
                for arm in else_if {
                    self.check_expr(&arm.condition, span, symbols);
                    self.check_block(&arm.body, symbols);
                }
                self.check_block(otherwise, symbols);
            }
            StmtKind::While { condition, body } => {
                self.check_expr(condition, span, symbols);
                self.check_block(body, symbols);
            }
            StmtKind::For {
                variable,
                start,
                end,
                step,
                body,
            } => {
                self.check_variable(variable, span, symbols);
                self.check_expr(start, span, symbols);
                self.check_expr(end, span, symbols);
                if let Some(step) = step {
                    self.check_expr(step, span, symbols);
                }
                self.check_block(body, symbols);
            }
            StmtKind::Goto { label } => {
                if !self.env.has_label(label) {
                    self.error(
                        ErrorCode::UNDEFINED_LABEL,
                        format!("Label '{label}' is not defined in this routine"),
                        span,
                    );
                }
            }
            StmtKind::Label { name } => {
                if self.env.in_block() {
                    self.error(
                        ErrorCode::LABEL_NOT_AT_TOP_LEVEL,
                        format!("Label '{name}' must not appear inside a block"),
                        span,
                    );
                }
            }
            StmtKind::Sub { name, body } => {
                if self.env.current_scope_kind() != ScopeKind::Entry {
                    self.error(
                        ErrorCode::NESTED_SUBROUTINE,
                        format!("Subroutine '{name}' must be declared at the top level"),
                        span,
                    );
                    return;
                }
                self.env.push_scope(ScopeKind::Subroutine);
                self.declare_labels(body);
                self.check_body(body, symbols);
                self.env.pop_scope();
            }
            StmtKind::CallSub { name } => {
                if !self.subroutines.contains(name) {
                    self.error(
                        ErrorCode::UNDEFINED_SUBROUTINE,
                        format!("Subroutine '{name}' is not defined"),
                        span,
                    );
                }
            }
            StmtKind::Empty => {}
        }
    }

    fn check_assign(&mut self, target: &Target, value: &Expr, span: Span, symbols: &SymbolTable) {
        match target {
            Target::Variable(name) => {
                self.check_variable(name, span, symbols);
                self.check_expr(value, span, symbols);
            }
            Target::Index { array, indices } => {
                self.check_variable(array, span, symbols);
                if indices.is_empty() {
                    self.error(
                        ErrorCode::MISSING_INDEX,
                        format!("Assignment to an element of '{array}' has no index"),
                        span,
                    );
                }
                self.check_exprs(indices, span, symbols);
                self.check_expr(value, span, symbols);
            }
            Target::Property {
                type_name,
                property,
            } => {
                if let Some(descriptor) = self.property(type_name, property, span) {
                    if descriptor.setter.is_none() {
                        self.error(
                            ErrorCode::PROPERTY_NOT_WRITABLE,
                            format!("Property '{type_name}.{property}' cannot be assigned"),
                            span,
                        );
                    }
                }
                self.check_expr(value, span, symbols);
            }
            Target::Event { type_name, event } => {
                if self.type_known(type_name, span)
                    && self.registry.event(type_name, event).is_none()
                {
                    self.error(
                        ErrorCode::UNKNOWN_MEMBER,
                        format!("'{type_name}' has no event '{event}'"),
                        span,
                    );
                }
                let handler = match value {
                    Expr::Variable(name) if self.subroutines.contains(name) => None,
                    Expr::Variable(name) => Some(format!("'{name}' is not a subroutine")),
                    _ => Some("the value is not a subroutine name".to_string()),
                };
                if let Some(problem) = handler {
                    let err = self.make_error(
                        ErrorCode::EVENT_HANDLER_NOT_SUBROUTINE,
                        format!("Handler for '{type_name}.{event}' is invalid: {problem}"),
                        span,
                    );
                    self.errors.push_error(
                        err.with_suggestion("assign the name of a subroutine declared with Sub"),
                    );
                }
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    fn check_exprs(&mut self, exprs: &[Expr], span: Span, symbols: &SymbolTable) {
        for expr in exprs {
            self.check_expr(expr, span, symbols);
        }
    }

    /// Expressions carry no location of their own; `span` is the enclosing
    /// statement's.
    fn check_expr(&mut self, expr: &Expr, span: Span, symbols: &SymbolTable) {
        match expr {
            Expr::Number(_) | Expr::Text(_) => {}
            Expr::Variable(name) => self.check_variable(name, span, symbols),
            Expr::Index { array, indices } => {
                self.check_variable(array, span, symbols);
                self.check_exprs(indices, span, symbols);
            }
            Expr::Property {
                type_name,
                property,
            } => {
                if let Some(descriptor) = self.property(type_name, property, span) {
                    if descriptor.getter.is_none() {
                        self.error(
                            ErrorCode::PROPERTY_NOT_READABLE,
                            format!("Property '{type_name}.{property}' cannot be read"),
                            span,
                        );
                    }
                }
            }
            Expr::Call {
                type_name,
                method,
                args,
            } => {
                if let Some(descriptor) = self.check_call(type_name, method, args.len(), span) {
                    if !descriptor.returns_value {
                        self.error(
                            ErrorCode::NO_RETURN_VALUE,
                            format!("'{type_name}.{method}' does not return a value"),
                            span,
                        );
                    }
                }
                self.check_exprs(args, span, symbols);
            }
            Expr::Binary { left, right, .. } => {
                self.check_expr(left, span, symbols);
                self.check_expr(right, span, symbols);
            }
            Expr::Negate(inner) => self.check_expr(inner, span, symbols),
        }
    }

    fn check_variable(&mut self, name: &str, span: Span, symbols: &SymbolTable) {
        if !symbols.contains(name) {
            let err = self.make_error(
                ErrorCode::UNDECLARED_VARIABLE,
                format!("Variable '{name}' is not declared"),
                span,
            );
            self.errors
                .push_error(err.with_suggestion(format!("add '{name}' to the variable list")));
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Library members
    // ══════════════════════════════════════════════════════════════════════

    fn type_known(&mut self, type_name: &str, span: Span) -> bool {
        if self.registry.get(type_name).is_some() {
            return true;
        }
        self.error(
            ErrorCode::UNKNOWN_LIBRARY_TYPE,
            format!("Unknown library type '{type_name}'"),
            span,
        );
        false
    }

    /// Resolve a method and check the argument count.
    fn check_call(
        &mut self,
        type_name: &str,
        method: &str,
        arg_count: usize,
        span: Span,
    ) -> Option<&'a MethodDescriptor> {
        if !self.type_known(type_name, span) {
            return None;
        }
        let registry = self.registry;
        let Some(descriptor) = registry.method(type_name, method) else {
            self.error(
                ErrorCode::UNKNOWN_MEMBER,
                format!("'{type_name}' has no method '{method}'"),
                span,
            );
            return None;
        };
        if descriptor.param_count != arg_count {
            self.error(
                ErrorCode::WRONG_ARG_COUNT,
                format!(
                    "'{type_name}.{method}' takes {} argument(s) but {arg_count} were given",
                    descriptor.param_count
                ),
                span,
            );
        }
        Some(descriptor)
    }

    fn property(
        &mut self,
        type_name: &str,
        property: &str,
        span: Span,
    ) -> Option<&'a PropertyDescriptor> {
        if !self.type_known(type_name, span) {
            return None;
        }
        let registry = self.registry;
        let found = registry.property(type_name, property);
        if found.is_none() {
            self.error(
                ErrorCode::UNKNOWN_MEMBER,
                format!("'{type_name}' has no property '{property}'"),
                span,
            );
        }
        found
    }

    // ══════════════════════════════════════════════════════════════════════
    // Error helpers
    // ══════════════════════════════════════════════════════════════════════

    fn make_error(&self, code: ErrorCode, message: String, span: Span) -> CompileError {
        CompileError::new(
            &self.source.name,
            code,
            message,
            span,
            self.source.line_for(span),
        )
    }

    fn error(&mut self, code: ErrorCode, message: String, span: Span) {
        let err = self.make_error(code, message, span);
        self.errors.push_error(err);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use lexico_library::{CapabilityScanner, LibraryManifest, LoadedLibrary};
    use lexico_types::ir::{BinaryOp, ElseIf};

    use super::*;

    fn registry() -> CapabilityRegistry {
        let manifest: LibraryManifest = serde_json::from_value(serde_json::json!({
            "types": [
                {
                    "name": "TextWindow",
                    "library_type": true,
                    "methods": [
                        { "name": "WriteLine", "params": ["Primitive"] },
                        { "name": "Read", "returns": "Primitive" }
                    ],
                    "properties": [
                        { "name": "Title", "type": "Primitive" },
                        { "name": "Width", "type": "Primitive", "writable": false },
                        { "name": "Secret", "type": "Primitive", "readable": false }
                    ]
                },
                {
                    "name": "Timer",
                    "library_type": true,
                    "events": [{ "name": "Tick", "handler": "Callback" }]
                }
            ]
        }))
        .unwrap();
        let mut scanner = CapabilityScanner::new();
        scanner.scan_library(&LoadedLibrary {
            path: PathBuf::from("host.wasm"),
            module: "host".into(),
            manifest,
        });
        scanner.finish()
    }

    fn check(program: &Program) -> CompileErrors {
        let registry = registry();
        let source = SourceFile::new("test.json", "");
        let mut errors = CompileErrors::empty();
        Analyzer::new(&registry, &mut errors, &source).check(program);
        errors
    }

    fn codes(program: &Program) -> Vec<ErrorCode> {
        check(program).errors.iter().map(|e| e.code).collect()
    }

    fn write(value: Expr) -> Stmt {
        Stmt::call("TextWindow", "WriteLine", vec![value])
    }

    fn label(name: &str) -> Stmt {
        Stmt::new(StmtKind::Label { name: name.into() })
    }

    fn goto(name: &str) -> Stmt {
        Stmt::new(StmtKind::Goto { label: name.into() })
    }

    fn sub(name: &str, body: Vec<Stmt>) -> Stmt {
        Stmt::new(StmtKind::Sub {
            name: name.into(),
            body,
        })
    }

    fn while_true(body: Vec<Stmt>) -> Stmt {
        Stmt::new(StmtKind::While {
            condition: Expr::binary(BinaryOp::Equal, Expr::number(1.0), Expr::number(1.0)),
            body,
        })
    }

    fn handler(event: &str, value: Expr) -> Stmt {
        Stmt::new(StmtKind::Assign {
            target: Target::Event {
                type_name: "Timer".into(),
                event: event.into(),
            },
            value,
        })
    }

    #[test]
    fn valid_program_has_no_errors() {
        let program = Program::from_body(vec![
            Stmt::assign("x", Expr::number(1.0)),
            label("top"),
            write(Expr::var("x")),
            Stmt::new(StmtKind::If {
                condition: Expr::binary(BinaryOp::LessThan, Expr::var("x"), Expr::number(3.0)),
                then: vec![goto("top")],
                else_if: vec![ElseIf {
                    condition: Expr::var("x"),
                    body: vec![Stmt::new(StmtKind::CallSub { name: "Later".into() })],
                }],
                otherwise: vec![],
            }),
            handler("Tick", Expr::var("Later")),
            sub("Later", vec![label("top"), goto("top")]),
        ]);
        assert!(codes(&program).is_empty(), "{:?}", check(&program).errors);
    }

    #[test]
    fn undeclared_variable() {
        let mut program = Program::from_body(vec![write(Expr::var("y"))]);
        program.symbols = ["x"].into_iter().collect();
        let errors = check(&program);
        assert_eq!(errors.errors[0].code, ErrorCode::UNDECLARED_VARIABLE);
        assert!(errors.errors[0].suggestion.is_some());
    }

    #[test]
    fn unknown_type_and_member() {
        let program = Program::from_body(vec![
            Stmt::call("GraphicsWindow", "Show", vec![]),
            Stmt::call("TextWindow", "Explode", vec![]),
        ]);
        assert_eq!(
            codes(&program),
            vec![ErrorCode::UNKNOWN_LIBRARY_TYPE, ErrorCode::UNKNOWN_MEMBER]
        );
    }

    #[test]
    fn member_lookup_ignores_case() {
        let program = Program::from_body(vec![Stmt::call(
            "textwindow",
            "WRITELINE",
            vec![Expr::number(1.0)],
        )]);
        assert!(codes(&program).is_empty());
    }

    #[test]
    fn wrong_argument_count() {
        let program = Program::from_body(vec![Stmt::call("TextWindow", "WriteLine", vec![])]);
        assert_eq!(codes(&program), vec![ErrorCode::WRONG_ARG_COUNT]);
    }

    #[test]
    fn void_method_in_expression() {
        let program = Program::from_body(vec![Stmt::assign(
            "x",
            Expr::Call {
                type_name: "TextWindow".into(),
                method: "WriteLine".into(),
                args: vec![Expr::number(1.0)],
            },
        )]);
        assert_eq!(codes(&program), vec![ErrorCode::NO_RETURN_VALUE]);
    }

    #[test]
    fn property_access_rules() {
        let program = Program::from_body(vec![
            Stmt::new(StmtKind::Assign {
                target: Target::Property {
                    type_name: "TextWindow".into(),
                    property: "Width".into(),
                },
                value: Expr::number(1.0),
            }),
            write(Expr::Property {
                type_name: "TextWindow".into(),
                property: "Secret".into(),
            }),
        ]);
        assert_eq!(
            codes(&program),
            vec![ErrorCode::PROPERTY_NOT_WRITABLE, ErrorCode::PROPERTY_NOT_READABLE]
        );
    }

    #[test]
    fn event_handler_must_be_subroutine() {
        let program = Program::from_body(vec![
            handler("Tick", Expr::var("Missing")),
            handler("Tick", Expr::number(1.0)),
            handler("Tock", Expr::var("OnTick")),
            sub("OnTick", vec![]),
        ]);
        assert_eq!(
            codes(&program),
            vec![
                ErrorCode::EVENT_HANDLER_NOT_SUBROUTINE,
                ErrorCode::EVENT_HANDLER_NOT_SUBROUTINE,
                ErrorCode::UNKNOWN_MEMBER,
            ]
        );
    }

    #[test]
    fn labels_are_checked_per_routine() {
        let program = Program::from_body(vec![
            label("a"),
            label("a"),
            goto("b"),
            sub("S", vec![goto("a")]),
        ]);
        assert_eq!(
            codes(&program),
            vec![
                ErrorCode::DUPLICATE_LABEL,
                ErrorCode::UNDEFINED_LABEL,
                ErrorCode::UNDEFINED_LABEL,
            ]
        );
    }

    #[test]
    fn label_inside_block() {
        let program = Program::from_body(vec![while_true(vec![label("inner")])]);
        assert_eq!(codes(&program), vec![ErrorCode::LABEL_NOT_AT_TOP_LEVEL]);
    }

    #[test]
    fn subroutine_structure() {
        let program = Program::from_body(vec![
            sub("A", vec![sub("Inner", vec![])]),
            sub("A", vec![]),
            while_true(vec![sub("InLoop", vec![])]),
            Stmt::new(StmtKind::CallSub { name: "Nowhere".into() }),
        ]);
        assert_eq!(
            codes(&program),
            vec![
                ErrorCode::DUPLICATE_SUBROUTINE,
                ErrorCode::NESTED_SUBROUTINE,
                ErrorCode::NESTED_SUBROUTINE,
                ErrorCode::UNDEFINED_SUBROUTINE,
            ]
        );
    }

    #[test]
    fn element_assignment_needs_an_index() {
        let assign = |indices: Vec<Expr>| {
            Stmt::new(StmtKind::Assign {
                target: Target::Index {
                    array: "a".into(),
                    indices,
                },
                value: Expr::number(1.0),
            })
        };
        let program = Program::from_body(vec![assign(vec![]), assign(vec![Expr::number(2.0)])]);
        assert_eq!(codes(&program), vec![ErrorCode::MISSING_INDEX]);
    }

    #[test]
    fn error_carries_source_line() {
        let registry = registry();
        let source = SourceFile::new("prog.json", "[\n  {\"stmt\": \"call\"}\n]");
        let mut errors = CompileErrors::empty();
        let program = Program::from_body(vec![
            Stmt::call("Nope", "Go", vec![]).at(Span::new(2, 3, 2, 20))
        ]);
        Analyzer::new(&registry, &mut errors, &source).check(&program);
        assert_eq!(errors.errors[0].source_line, "  {\"stmt\": \"call\"}");
        assert_eq!(errors.errors[0].file, "prog.json");
    }
}
