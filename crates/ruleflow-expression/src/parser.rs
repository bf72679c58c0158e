//! Recursive descent parser with precedence climbing for operators.

use std::sync::Arc;

use ruleflow_value::Value;

use crate::core::ast::{BinaryOp, Expr, Program, Stmt};
use crate::core::span::Span;
use crate::core::token::{Token, TokenKind};
use crate::error::{ExpressionError, ExpressionResult};

/// Maximum recursion depth for the parser.
const MAX_PARSER_DEPTH: usize = 256;

const EOF_TOKEN: Token<'static> = Token {
    kind: TokenKind::Eof,
    span: Span { start: 0, end: 0 },
};

/// Parser over a token stream.
pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser.
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the whole token stream as a program: either a single expression
    /// or a `;`-separated statement sequence.
    pub fn parse(&mut self) -> ExpressionResult<Program> {
        let mut statements = Vec::new();

        loop {
            // Tolerate stray separators between statements.
            while self.match_token(&TokenKind::Semicolon) {}
            if self.current().kind == TokenKind::Eof {
                break;
            }

            statements.push(self.parse_statement(0)?);

            match &self.current().kind {
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Eof => break,
                other => {
                    return Err(ExpressionError::parse(format!(
                        "expected ';' or end of input, found {}",
                        other
                    )));
                }
            }
        }

        if statements.is_empty() {
            return Err(ExpressionError::parse("empty expression"));
        }

        Ok(Program { statements })
    }

    fn parse_statement(&mut self, depth: usize) -> ExpressionResult<Stmt> {
        self.check_depth(depth)?;

        if self.current().kind == TokenKind::For {
            return self.parse_for(depth + 1);
        }

        // Assignment: identifier followed by a single `=`.
        if let TokenKind::Identifier(name) = &self.current().kind {
            if self.peek().kind == TokenKind::Assign {
                let name: Arc<str> = Arc::from(*name);
                self.advance(); // identifier
                self.advance(); // =
                let value = self.parse_expression(depth + 1)?;
                return Ok(Stmt::Assign { name, value });
            }
        }

        Ok(Stmt::Expr(self.parse_expression(depth + 1)?))
    }

    fn parse_for(&mut self, depth: usize) -> ExpressionResult<Stmt> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LeftParen)?;

        let var: Arc<str> = match &self.current().kind {
            TokenKind::Identifier(name) => {
                let v = Arc::from(*name);
                self.advance();
                v
            }
            other => {
                return Err(ExpressionError::parse(format!(
                    "expected loop variable in for, found {}",
                    other
                )));
            }
        };

        self.expect(TokenKind::Colon)?;
        let iterable = self.parse_expression(depth + 1)?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        let mut body = Vec::new();
        loop {
            while self.match_token(&TokenKind::Semicolon) {}
            if self.current().kind == TokenKind::RightBrace {
                break;
            }
            if self.current().kind == TokenKind::Eof {
                return Err(ExpressionError::parse("unterminated for body"));
            }
            body.push(self.parse_statement(depth + 1)?);
            if !self.match_token(&TokenKind::Semicolon)
                && self.current().kind != TokenKind::RightBrace
            {
                return Err(ExpressionError::parse(format!(
                    "expected ';' or '}}' in for body, found {}",
                    self.current()
                )));
            }
        }
        self.expect(TokenKind::RightBrace)?;

        Ok(Stmt::For {
            var,
            iterable,
            body,
        })
    }

    /// Parse one expression. Ternary binds loosest.
    fn parse_expression(&mut self, depth: usize) -> ExpressionResult<Expr> {
        self.check_depth(depth)?;

        let condition = self.parse_binary(0, depth + 1)?;

        if self.match_token(&TokenKind::Question) {
            let then_expr = self.parse_expression(depth + 1)?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_expression(depth + 1)?;
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            });
        }

        Ok(condition)
    }

    fn parse_binary(&mut self, min_precedence: u8, depth: usize) -> ExpressionResult<Expr> {
        self.check_depth(depth)?;
        let mut left = self.parse_unary(depth + 1)?;

        while self.current().kind.is_binary_operator() {
            let precedence = self.current().kind.precedence();
            if precedence < min_precedence {
                break;
            }

            let op = match &self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                TokenKind::Equal => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                TokenKind::LessThan => BinaryOp::LessThan,
                TokenKind::GreaterThan => BinaryOp::GreaterThan,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                TokenKind::And => BinaryOp::And,
                TokenKind::Or => BinaryOp::Or,
                other => {
                    return Err(ExpressionError::parse(format!(
                        "unexpected operator: {}",
                        other
                    )));
                }
            };
            self.advance();

            let right = self.parse_binary(precedence + 1, depth + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self, depth: usize) -> ExpressionResult<Expr> {
        self.check_depth(depth)?;
        match &self.current().kind {
            TokenKind::Minus => {
                self.advance();
                let expr = self.parse_unary(depth + 1)?;
                Ok(Expr::Negate(Box::new(expr)))
            }
            TokenKind::Not => {
                self.advance();
                let expr = self.parse_unary(depth + 1)?;
                Ok(Expr::Not(Box::new(expr)))
            }
            _ => self.parse_postfix(depth + 1),
        }
    }

    fn parse_postfix(&mut self, depth: usize) -> ExpressionResult<Expr> {
        let mut expr = self.parse_primary(depth + 1)?;

        loop {
            match &self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name: Arc<str> = match &self.current().kind {
                        TokenKind::Identifier(name) => {
                            let n = Arc::from(*name);
                            self.advance();
                            n
                        }
                        other => {
                            return Err(ExpressionError::parse(format!(
                                "expected property name after '.', found {}",
                                other
                            )));
                        }
                    };

                    if self.current().kind == TokenKind::LeftParen {
                        let args = self.parse_args(depth + 1)?;
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            method: name,
                            args,
                        };
                    } else {
                        expr = Expr::Property {
                            object: Box::new(expr),
                            name,
                        };
                    }
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression(depth + 1)?;
                    self.expect(TokenKind::RightBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self, depth: usize) -> ExpressionResult<Expr> {
        self.check_depth(depth)?;
        match &self.current().kind.clone() {
            TokenKind::Integer(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Literal(Value::integer(n)))
            }
            TokenKind::Float(n) => {
                let n = *n;
                self.advance();
                Ok(Expr::Literal(Value::float(n)))
            }
            TokenKind::String(s) => {
                let s = s.clone().into_owned();
                self.advance();
                Ok(Expr::Literal(Value::text(s)))
            }
            TokenKind::Boolean(b) => {
                let b = *b;
                self.advance();
                Ok(Expr::Literal(Value::boolean(b)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Value::null()))
            }

            TokenKind::Identifier(name) => {
                let name: Arc<str> = Arc::from(*name);
                self.advance();

                // Colon-call namespace syntax: util:fn(args). Restricted to
                // the util namespace so the colon of a ternary branch is
                // never swallowed.
                if name.as_ref() == "util"
                    && self.current().kind == TokenKind::Colon
                    && matches!(self.peek().kind, TokenKind::Identifier(_))
                    && self.peek2().kind == TokenKind::LeftParen
                {
                    self.advance(); // :
                    let function: Arc<str> = match &self.current().kind {
                        TokenKind::Identifier(f) => Arc::from(*f),
                        _ => unreachable!(),
                    };
                    self.advance();
                    let args = self.parse_args(depth + 1)?;
                    return Ok(Expr::NamespaceCall {
                        namespace: name,
                        function,
                        args,
                    });
                }

                if self.current().kind == TokenKind::LeftParen {
                    let args = self.parse_args(depth + 1)?;
                    return Ok(Expr::FunctionCall { name, args });
                }

                Ok(Expr::Identifier(name))
            }

            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression(depth + 1)?;
                self.expect(TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                if self.current().kind != TokenKind::RightBracket {
                    loop {
                        elements.push(self.parse_expression(depth + 1)?);
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightBracket)?;
                Ok(Expr::Array(elements))
            }

            TokenKind::LeftBrace => {
                self.advance();
                let mut pairs = Vec::new();
                if self.current().kind != TokenKind::RightBrace {
                    loop {
                        let key: Arc<str> = match &self.current().kind {
                            TokenKind::Identifier(name) => {
                                let k = Arc::from(*name);
                                self.advance();
                                k
                            }
                            TokenKind::String(s) => {
                                let k = Arc::from(s.as_ref());
                                self.advance();
                                k
                            }
                            other => {
                                return Err(ExpressionError::parse(format!(
                                    "expected object key, found {}",
                                    other
                                )));
                            }
                        };
                        self.expect(TokenKind::Colon)?;
                        let value = self.parse_expression(depth + 1)?;
                        pairs.push((key, value));
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightBrace)?;
                Ok(Expr::Object(pairs))
            }

            other => Err(ExpressionError::parse(format!(
                "unexpected token: {}",
                other
            ))),
        }
    }

    fn parse_args(&mut self, depth: usize) -> ExpressionResult<Vec<Expr>> {
        self.expect(TokenKind::LeftParen)?;
        let mut args = Vec::new();
        if self.current().kind != TokenKind::RightParen {
            loop {
                args.push(self.parse_expression(depth + 1)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(args)
    }

    fn check_depth(&self, depth: usize) -> ExpressionResult<()> {
        if depth > MAX_PARSER_DEPTH {
            return Err(ExpressionError::parse(format!(
                "maximum parser recursion depth ({}) exceeded",
                MAX_PARSER_DEPTH
            )));
        }
        Ok(())
    }

    fn current(&self) -> &Token<'a> {
        self.tokens.get(self.position).unwrap_or(&EOF_TOKEN)
    }

    fn peek(&self) -> &Token<'a> {
        self.tokens.get(self.position + 1).unwrap_or(&EOF_TOKEN)
    }

    fn peek2(&self) -> &Token<'a> {
        self.tokens.get(self.position + 2).unwrap_or(&EOF_TOKEN)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, expected: &TokenKind<'_>) -> bool {
        if &self.current().kind == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: TokenKind<'_>) -> ExpressionResult<()> {
        if self.current().kind == expected {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::parse(format!(
                "expected {}, found {}",
                expected,
                self.current()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(input: &str) -> ExpressionResult<Program> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser::new(tokens).parse()
    }

    fn parse_expr(input: &str) -> Expr {
        let program = parse(input).unwrap();
        match program.statements.into_iter().next().unwrap() {
            Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn literal() {
        assert_eq!(parse_expr("42"), Expr::Literal(Value::integer(42)));
    }

    #[test]
    fn binary_precedence() {
        // 2 + 3 * 4 parses as 2 + (3 * 4)
        let expr = parse_expr("2 + 3 * 4");
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    op: BinaryOp::Multiply,
                    ..
                }
            )),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn ternary() {
        let expr = parse_expr("age >= 18 ? 'adult' : 'minor'");
        assert!(matches!(expr, Expr::Ternary { .. }));
    }

    #[test]
    fn nested_ternary_in_else_branch() {
        let expr = parse_expr("a ? 1 : b ? 2 : 3");
        match expr {
            Expr::Ternary { else_expr, .. } => {
                assert!(matches!(*else_expr, Expr::Ternary { .. }))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn property_chain() {
        let expr = parse_expr("result.data.user.id");
        assert!(matches!(expr, Expr::Property { .. }));
    }

    #[test]
    fn index_access() {
        let expr = parse_expr("items[0]");
        assert!(matches!(expr, Expr::Index { .. }));
    }

    #[test]
    fn util_dot_call_is_method_call() {
        let expr = parse_expr("util.roundTo(3.456, 2)");
        match expr {
            Expr::MethodCall { object, method, args } => {
                assert_eq!(*object, Expr::Identifier("util".into()));
                assert_eq!(method.as_ref(), "roundTo");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn util_colon_call_is_namespace_call() {
        let expr = parse_expr("util:uuid()");
        assert!(matches!(expr, Expr::NamespaceCall { .. }));
    }

    #[test]
    fn ternary_colon_not_taken_as_namespace() {
        // The colon belongs to the ternary even though an identifier and a
        // call follow it.
        let expr = parse_expr("flag ? a : util.round(1.2)");
        assert!(matches!(expr, Expr::Ternary { .. }));
    }

    #[test]
    fn array_and_object_literals() {
        assert!(matches!(parse_expr("[1, 2, 3]"), Expr::Array(v) if v.len() == 3));
        assert!(matches!(parse_expr("{a: 1, 'b': 2}"), Expr::Object(v) if v.len() == 2));
    }

    #[test]
    fn script_with_statements() {
        let program = parse("x = 1; y = x + 2; y * 10").unwrap();
        assert_eq!(program.statements.len(), 3);
        assert!(matches!(program.statements[0], Stmt::Assign { .. }));
        assert!(matches!(program.statements[2], Stmt::Expr(_)));
    }

    #[test]
    fn for_loop() {
        let program = parse("total = 0; for (item : items) { total = total + item }; total")
            .unwrap();
        assert_eq!(program.statements.len(), 3);
        match &program.statements[1] {
            Stmt::For { var, body, .. } => {
                assert_eq!(var.as_ref(), "item");
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn trailing_semicolon_ok() {
        let program = parse("x = 1; x;").unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn empty_input_errors() {
        assert!(parse("").is_err());
        assert!(parse(";").is_err());
    }

    #[test]
    fn unbalanced_parens_error() {
        assert!(parse("(1 + 2").is_err());
    }

    #[test]
    fn deep_nesting_within_limit() {
        let mut expr = String::from("1");
        for _ in 0..40 {
            expr = format!("({})", expr);
        }
        assert!(parse(&expr).is_ok());
    }
}
