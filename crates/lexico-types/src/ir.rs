//! Statement IR handed to the backend by a front end.
//!
//! The tree is ordered exactly as written; the backend never reorders it.
//! Every statement carries a [`Span`] (possibly unknown) for diagnostics.
//! Expressions borrow the span of the statement that contains them.
//!
//! The JSON form is the serde representation of these types: statements are
//! tagged with `"stmt"`, expressions and targets are externally tagged.

use serde::{Deserialize, Serialize};

use crate::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Program & symbol table
// ══════════════════════════════════════════════════════════════════════════════

/// A parsed program: the statement tree plus its variable symbol table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "variables")]
    pub symbols: SymbolTable,
    pub body: Vec<Stmt>,
}

impl Program {
    /// Build a program whose symbol table is derived from the tree.
    pub fn from_body(body: Vec<Stmt>) -> Self {
        Self {
            symbols: SymbolTable::collect(&body),
            body,
        }
    }
}

/// Ordered set of declared variable names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    variables: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable. Returns `false` if the name was already present.
    pub fn declare(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.variables.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    /// Declaration index of a variable.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Derive the symbol table from assignment targets and `for` variables,
    /// in tree order, including subroutine bodies.
    pub fn collect(body: &[Stmt]) -> Self {
        let mut table = Self::new();
        table.collect_into(body);
        table
    }

    fn collect_into(&mut self, body: &[Stmt]) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Assign { target, .. } => match target {
                    Target::Variable(name) => {
                        self.declare(name.as_str());
                    }
                    Target::Index { array, .. } => {
                        self.declare(array.as_str());
                    }
                    Target::Property { .. } | Target::Event { .. } => {}
                },
                StmtKind::For { variable, body, .. } => {
                    self.declare(variable.as_str());
                    self.collect_into(body);
                }
                StmtKind::If {
                    then,
                    else_if,
                    otherwise,
                    ..
                } => {
                    self.collect_into(then);
                    for arm in else_if {
                        self.collect_into(&arm.body);
                    }
                    self.collect_into(otherwise);
                }
                StmtKind::While { body, .. } | StmtKind::Sub { body, .. } => {
                    self.collect_into(body);
                }
                StmtKind::Call { .. }
                | StmtKind::Goto { .. }
                | StmtKind::Label { .. }
                | StmtKind::CallSub { .. }
                | StmtKind::Empty => {}
            }
        }
    }
}

impl<S: Into<String>> FromIterator<S> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut table = Self::new();
        for name in iter {
            table.declare(name);
        }
        table
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

/// A statement node with its source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    pub kind: StmtKind,
    #[serde(default, skip_serializing_if = "Span::is_unknown")]
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// `name = value`
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Self::new(StmtKind::Assign {
            target: Target::Variable(name.into()),
            value,
        })
    }

    /// `Type.Method(args)` as a statement.
    pub fn call(type_name: impl Into<String>, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(StmtKind::Call {
            type_name: type_name.into(),
            method: method.into(),
            args,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stmt", rename_all = "snake_case")]
pub enum StmtKind {
    /// `target = value`
    Assign { target: Target, value: Expr },
    /// `Type.Method(args)` whose result, if any, is discarded.
    Call {
        #[serde(rename = "type")]
        type_name: String,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// `If .. Then .. ElseIf .. Else .. EndIf`
    If {
        condition: Expr,
        then: Vec<Stmt>,
        #[serde(default)]
        else_if: Vec<ElseIf>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Stmt>,
    },
    /// `While .. EndWhile`
    While { condition: Expr, body: Vec<Stmt> },
    /// `For v = start To end Step step .. EndFor`
    For {
        variable: String,
        start: Expr,
        end: Expr,
        #[serde(default)]
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    Goto { label: String },
    Label { name: String },
    /// `Sub name .. EndSub`
    Sub { name: String, body: Vec<Stmt> },
    /// `name()`
    CallSub { name: String },
    Empty,
}

/// One `ElseIf` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIf {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Variable(String),
    /// `array[i][j]..`; at least one index.
    Index { array: String, indices: Vec<Expr> },
    Property {
        #[serde(rename = "type")]
        type_name: String,
        property: String,
    },
    /// `Type.Event = Subroutine`; the value must name a subroutine.
    Event {
        #[serde(rename = "type")]
        type_name: String,
        event: String,
    },
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Number(f64),
    Text(String),
    Variable(String),
    Index {
        array: String,
        indices: Vec<Expr>,
    },
    Property {
        #[serde(rename = "type")]
        type_name: String,
        property: String,
    },
    Call {
        #[serde(rename = "type")]
        type_name: String,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
}

impl Expr {
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
}
