//! Recursive-descent parser producing [`Expr`] trees.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, equality, comparison,
//! additive, multiplicative, unary, `**` (right associative).

use super::Value;
use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::deps::is_keyword;
use super::error::ParseError;
use super::lexer::{Token, TokenKind, tokenize};

/// Deepest bracket, unary or conditional nesting a parse accepts.
pub const MAX_NESTING: usize = 64;
/// Most binary and logical operators one expression may contain.
pub const MAX_OPERATORS: usize = 1024;

/// Parse a complete expression. A single trailing `;` is allowed.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokenize(source)?);
    let expr = parser.expression()?;
    parser.eat(&TokenKind::Semicolon);
    parser.finish()?;
    Ok(expr)
}

/// Parse a function body: `[return] [expression] [;]`.
///
/// An empty body evaluates to null.
pub fn parse_function_body(source: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.eat_keyword("return");
    if parser.check(&TokenKind::Semicolon) || parser.check(&TokenKind::Eof) {
        parser.eat(&TokenKind::Semicolon);
        parser.finish()?;
        return Ok(Expr::Literal(Value::Null));
    }
    let expr = parser.expression()?;
    parser.eat(&TokenKind::Semicolon);
    parser.finish()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    operators: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            depth: 0,
            operators: 0,
        }
    }

    fn peek(&self) -> &Token {
        // The token list always ends with Eof and `advance` never moves past it.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(message))
        }
    }

    fn finish(&self) -> Result<(), ParseError> {
        if self.check(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("Expected end of expression"))
        }
    }

    fn unexpected(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = describe(&token.kind);
        ParseError::new(format!("{}, found {}", message, found), token.offset)
    }

    /// Run `parse` one nesting level deeper.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                format!("Expression nested more than {} levels deep", MAX_NESTING),
                self.peek().offset,
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Count one binary or logical operator against the per-expression limit.
    fn operator(&mut self) -> Result<(), ParseError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(ParseError::new(
                format!("Expression has more than {} operators", MAX_OPERATORS),
                self.peek().offset,
            ));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let condition = self.or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then_branch = self.expression()?;
        self.expect(TokenKind::Colon, "Expected ':' in conditional")?;
        let else_branch = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.eat(&TokenKind::OrOr) {
            self.operator()?;
            let right = self.and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            self.operator()?;
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual | TokenKind::EqualEqualEqual => BinaryOp::Equal,
                TokenKind::BangEqual | TokenKind::BangEqualEqual => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            self.operator()?;
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.advance();
            self.operator()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            self.operator()?;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.advance();
            self.operator()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if self.eat(&TokenKind::StarStar) {
            self.operator()?;
            let exponent = self.nested(Self::unary)?;
            return Ok(binary(BinaryOp::Power, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                let literal = match name.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "undefined" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = literal {
                    return Ok(Expr::Literal(value));
                }
                if is_keyword(&name) {
                    return Err(ParseError::new(
                        format!("Unexpected keyword '{}'", name),
                        token.offset,
                    ));
                }
                Ok(Expr::Identifier(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "Expected ')'")?;
                Ok(expr)
            }
            TokenKind::At => {
                self.advance();
                self.module_call()
            }
            _ => Err(self.unexpected("Expected a value")),
        }
    }

    fn module_call(&mut self) -> Result<Expr, ParseError> {
        let module = self.identifier("Expected module name after '@'")?;
        self.expect(TokenKind::Dot, "Expected '.' after module name")?;
        let function = self.identifier("Expected function name after '.'")?;
        self.expect(TokenKind::LParen, "Expected '(' after function name")?;

        let mut args = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RParen, "Expected ',' or ')' in argument list")?;
                break;
            }
        }

        Ok(Expr::ModuleCall {
            module,
            function,
            args,
        })
    }

    fn identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(message)),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Ident(name) => format!("'{}'", name),
        TokenKind::Eof => "end of input".to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::Literal(Value::Number(n))
    }

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.to_string())
    }

    #[test]
    fn test_respects_precedence() {
        assert_eq!(
            parse_expression("1 + 2 * 3").unwrap(),
            binary(BinaryOp::Add, num(1.0), binary(BinaryOp::Multiply, num(2.0), num(3.0)))
        );
        assert_eq!(
            parse_expression("(1 + 2) * 3").unwrap(),
            binary(BinaryOp::Multiply, binary(BinaryOp::Add, num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn test_power_is_right_associative_and_binds_above_unary() {
        assert_eq!(
            parse_expression("2 ** 3 ** 2").unwrap(),
            binary(BinaryOp::Power, num(2.0), binary(BinaryOp::Power, num(3.0), num(2.0)))
        );
        assert_eq!(
            parse_expression("-a ** 2").unwrap(),
            Expr::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(binary(BinaryOp::Power, ident("a"), num(2.0))),
            }
        );
    }

    #[test]
    fn test_parses_module_calls() {
        assert_eq!(
            parse_expression("@m.add(x, 2)").unwrap(),
            Expr::ModuleCall {
                module: "m".into(),
                function: "add".into(),
                args: vec![ident("x"), num(2.0)],
            }
        );
        assert_eq!(
            parse_expression("@m.now()").unwrap(),
            Expr::ModuleCall {
                module: "m".into(),
                function: "now".into(),
                args: vec![],
            }
        );
        assert!(parse_expression("@m.add(1,").is_err());
        assert!(parse_expression("@m(1)").is_err());
    }

    #[test]
    fn test_parses_conditionals() {
        let expr = parse_expression("a < b ? a : b").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
        assert!(parse_expression("a ? b").is_err());
    }

    #[test]
    fn test_literals_and_keywords() {
        assert_eq!(parse_expression("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(parse_expression("undefined").unwrap(), Expr::Literal(Value::Null));
        assert!(parse_expression("while").is_err());
        assert!(parse_expression("return 1").is_err());
    }

    #[test]
    fn test_rejects_trailing_tokens() {
        let err = parse_expression("1 2").unwrap_err();
        assert_eq!(err.offset, 2);
        assert!(parse_expression("").is_err());
        assert!(parse_expression("1;").is_ok());
    }

    #[test]
    fn test_function_bodies() {
        assert_eq!(
            parse_function_body(" return x + y; ").unwrap(),
            binary(BinaryOp::Add, ident("x"), ident("y"))
        );
        assert_eq!(parse_function_body("x * 2").unwrap(), binary(BinaryOp::Multiply, ident("x"), num(2.0)));
        assert_eq!(parse_function_body("").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(parse_function_body("return;").unwrap(), Expr::Literal(Value::Null));
        assert!(parse_function_body("return 1; return 2;").is_err());
    }

    #[test]
    fn test_nesting_is_limited() {
        let ok = format!("{}1{}", "(".repeat(MAX_NESTING - 1), ")".repeat(MAX_NESTING - 1));
        assert_eq!(parse_expression(&ok).unwrap(), num(1.0));

        let deep = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        let err = parse_expression(&deep).unwrap_err();
        assert!(err.message.contains("nested more than"));
        assert!(parse_expression(&format!("{}1", "-".repeat(MAX_NESTING))).is_err());
    }

    #[test]
    fn test_operator_count_is_limited() {
        let at_limit = format!("{}1", "1+".repeat(MAX_OPERATORS));
        assert!(parse_expression(&at_limit).is_ok());

        let over = format!("{}1", "1+".repeat(MAX_OPERATORS + 1));
        let err = parse_expression(&over).unwrap_err();
        assert!(err.message.contains("more than 1024 operators"));
    }
}
