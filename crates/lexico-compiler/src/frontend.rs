//! Front-end contract and the JSON front end.
//!
//! The backend does not parse Lexico source itself. A [`FrontEnd`] turns
//! source text into a [`Program`] and checks it against the capability
//! registry, reporting problems into the shared [`CompileErrors`].

use serde::Deserialize;

use lexico_library::CapabilityRegistry;
use lexico_types::ir::{Program, Stmt, SymbolTable};
use lexico_types::{CompileError, CompileErrors, ErrorCode, SourceFile, Span};

use crate::checker::Analyzer;

pub trait FrontEnd {
    /// Parse `source` into a program. Returns `None` when nothing usable was
    /// produced; the reason is in `errors`.
    fn parse(&self, source: &SourceFile, errors: &mut CompileErrors) -> Option<Program>;

    /// Check a parsed program against the library surface.
    fn analyze(
        &self,
        program: &Program,
        registry: &CapabilityRegistry,
        source: &SourceFile,
        errors: &mut CompileErrors,
    );
}

/// Reads the JSON form of the statement IR:
///
/// ```json
/// { "variables": ["x"],
///   "body": [ { "stmt": "assign", "target": { "variable": "x" },
///               "value": { "number": 1 } } ] }
/// ```
///
/// `variables` may be omitted, in which case the symbol table is collected
/// from the body. A bare statement array is accepted as the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFrontEnd;

#[derive(Deserialize)]
struct ProgramJson {
    #[serde(default)]
    variables: Option<Vec<String>>,
    body: Vec<Stmt>,
}

impl FrontEnd for JsonFrontEnd {
    fn parse(&self, source: &SourceFile, errors: &mut CompileErrors) -> Option<Program> {
        let parsed = if source.source.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<Stmt>>(&source.source).map(|body| ProgramJson {
                variables: None,
                body,
            })
        } else {
            serde_json::from_str::<ProgramJson>(&source.source)
        };
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                let span = Span::point(to_u32(err.line()), to_u32(err.column()));
                errors.push_error(CompileError::new(
                    &source.name,
                    ErrorCode::MALFORMED_PROGRAM,
                    format!("Malformed program: {}", syntax_message(&err)),
                    span,
                    source.line_for(span),
                ));
                return None;
            }
        };

        let symbols = match parsed.variables {
            Some(names) => declare_variables(names, source, errors),
            None => SymbolTable::collect(&parsed.body),
        };
        Some(Program {
            symbols,
            body: parsed.body,
        })
    }

    fn analyze(
        &self,
        program: &Program,
        registry: &CapabilityRegistry,
        source: &SourceFile,
        errors: &mut CompileErrors,
    ) {
        Analyzer::new(registry, errors, source).check(program);
    }
}

fn declare_variables(
    names: Vec<String>,
    source: &SourceFile,
    errors: &mut CompileErrors,
) -> SymbolTable {
    let mut symbols = SymbolTable::new();
    for name in names {
        if !symbols.declare(name.as_str()) {
            errors.push_error(CompileError::new(
                &source.name,
                ErrorCode::DUPLICATE_VARIABLE,
                format!("Variable '{name}' is declared more than once"),
                Span::default(),
                "",
            ));
        }
    }
    symbols
}

/// serde_json messages end in " at line L column C"; the span carries that.
fn syntax_message(err: &serde_json::Error) -> String {
    let message = err.to_string();
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message,
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use lexico_types::ir::{Expr, StmtKind};

    use super::*;

    fn parse(text: &str) -> (Option<Program>, CompileErrors) {
        let source = SourceFile::new("prog.json", text);
        let mut errors = CompileErrors::empty();
        let program = JsonFrontEnd.parse(&source, &mut errors);
        (program, errors)
    }

    #[test]
    fn explicit_variables_are_kept_in_order() {
        let (program, errors) = parse(
            r#"{ "variables": ["b", "a"],
                 "body": [ { "stmt": "assign", "target": { "variable": "a" },
                             "value": { "number": 1 } } ] }"#,
        );
        assert!(!errors.has_errors());
        let program = program.unwrap();
        assert_eq!(program.symbols.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(program.body[0], Stmt::assign("a", Expr::number(1.0)));
    }

    #[test]
    fn missing_variables_are_collected() {
        let (program, _) = parse(
            r#"{ "body": [ { "stmt": "for", "variable": "i",
                             "start": { "number": 1 }, "end": { "number": 3 },
                             "body": [] } ] }"#,
        );
        let program = program.unwrap();
        assert_eq!(program.symbols.iter().collect::<Vec<_>>(), vec!["i"]);
    }

    #[test]
    fn bare_statement_list_is_a_body() {
        let (program, errors) = parse(r#"[ { "stmt": "empty" } ]"#);
        assert!(!errors.has_errors());
        assert_eq!(program.unwrap().body[0].kind, StmtKind::Empty);
    }

    #[test]
    fn syntax_error_reports_position() {
        let (program, errors) = parse("{\n  \"body\": [\n    { \"stmt\": \"assign\", }\n  ]\n}");
        assert!(program.is_none());
        assert_eq!(errors.total_errors, 1);
        let err = &errors.errors[0];
        assert_eq!(err.code, ErrorCode::MALFORMED_PROGRAM);
        assert_eq!(err.span.start_line, 3);
        assert!(!err.message.contains(" at line "));
        assert_eq!(err.source_line, "    { \"stmt\": \"assign\", }");
    }

    #[test]
    fn duplicate_variable_is_reported() {
        let (program, errors) = parse(r#"{ "variables": ["x", "x"], "body": [] }"#);
        assert_eq!(errors.errors[0].code, ErrorCode::DUPLICATE_VARIABLE);
        assert_eq!(program.unwrap().symbols.len(), 1);
    }
}
