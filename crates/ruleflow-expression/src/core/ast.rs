//! Abstract syntax tree for expressions and scripts.

use std::sync::Arc;

use ruleflow_value::Value;

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),

    /// Bare identifier resolving to a context variable. Unresolved
    /// identifiers evaluate to null.
    Identifier(Arc<str>),

    /// Logical NOT (`!expr`).
    Not(Box<Expr>),

    /// Arithmetic negation (`-expr`).
    Negate(Box<Expr>),

    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Property access (`object.property`).
    Property {
        /// Receiver expression.
        object: Box<Expr>,
        /// Property name.
        name: Arc<str>,
    },

    /// Index access (`object[index]`).
    Index {
        /// Receiver expression.
        object: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },

    /// Ternary conditional (`cond ? a : b`).
    Ternary {
        /// Condition, coerced through truthiness.
        condition: Box<Expr>,
        /// Value when truthy.
        then_expr: Box<Expr>,
        /// Value when falsy.
        else_expr: Box<Expr>,
    },

    /// Method call on a value (`object.method(args)`), dispatched against a
    /// fixed allowlist. A call whose receiver is the bare identifier `util`
    /// dispatches into the builtin namespace instead.
    MethodCall {
        /// Receiver expression.
        object: Box<Expr>,
        /// Method name.
        method: Arc<str>,
        /// Argument expressions.
        args: Vec<Expr>,
    },

    /// Namespace call using colon syntax (`util:fn(args)`).
    NamespaceCall {
        /// Namespace name; only `util` is provided.
        namespace: Arc<str>,
        /// Function name.
        function: Arc<str>,
        /// Argument expressions.
        args: Vec<Expr>,
    },

    /// Bare function call (`fn(args)`). The language provides no global
    /// functions, so evaluation always fails with a pointer at `util`;
    /// keeping the node produces a far better error than a parse failure.
    FunctionCall {
        /// Function name.
        name: Arc<str>,
        /// Argument expressions.
        args: Vec<Expr>,
    },

    /// Array literal (`[a, b, c]`).
    Array(Vec<Expr>),

    /// Object literal (`{key: value}`).
    Object(Vec<(Arc<str>, Expr)>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+` (numeric addition or string concatenation)
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    /// Symbolic name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A statement in script form.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression statement; its value becomes the running result.
    Expr(Expr),

    /// Assignment to a script-local variable. Assignments are
    /// evaluation-local: they never write back into the engine context.
    Assign {
        /// Variable name.
        name: Arc<str>,
        /// Value expression.
        value: Expr,
    },

    /// `for (var : iterable) { body }` loop over array elements or object
    /// values.
    For {
        /// Loop variable name.
        var: Arc<str>,
        /// Iterable expression.
        iterable: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
}

/// A parsed program: one expression, or a `;`-separated statement sequence
/// whose last evaluated statement's value is the result.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The statements, in source order.
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Wrap a single expression as a one-statement program.
    pub fn expression(expr: Expr) -> Self {
        Self {
            statements: vec![Stmt::Expr(expr)],
        }
    }

    /// Whether this program is a single bare expression.
    pub fn is_single_expression(&self) -> bool {
        matches!(self.statements.as_slice(), [Stmt::Expr(_)])
    }
}
