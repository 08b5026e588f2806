//! Pratt parser for binding expressions.

use reflet_carton::Value;

use crate::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::errors::ExpressionError;
use crate::lexer::{tokenize, Token};

/// Parse a full expression; trailing tokens are an error.
pub fn parse_expression(input: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.expression(0)?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a statement: an expression, optionally followed by a single
/// top-level `= <expr>` assignment.
pub fn parse_statement(input: &str) -> Result<Stmt, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.expression(0)?;
    if parser.eat(&Token::Assign) {
        if !matches!(expr, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
            return Err(ExpressionError::InvalidAssignTarget);
        }
        let rhs = parser.expression(0)?;
        parser.expect_end()?;
        return Ok(Stmt::Assign(expr, rhs));
    }
    parser.expect_end()?;
    Ok(Stmt::Expr(expr))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExpressionError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExpressionError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ExpressionError> {
        let found = self.next()?;
        if found == token {
            Ok(())
        } else {
            Err(ExpressionError::UnexpectedToken(format!("{found:?}")))
        }
    }

    fn expect_end(&self) -> Result<(), ExpressionError> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(ExpressionError::UnexpectedToken(format!("{tok:?}"))),
        }
    }

    /// Pratt loop. `min_bp` is the minimum binding power to continue.
    fn expression(&mut self, min_bp: u8) -> Result<Expr, ExpressionError> {
        let mut lhs = self.prefix()?;
        loop {
            // Postfix: call, member, index bind tightest
            match self.peek() {
                Some(Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression(0)?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                        self.expect(Token::RParen)?;
                    }
                    lhs = Expr::Call(Box::new(lhs), args);
                    continue;
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next()? {
                        Token::Ident(name) => lhs = Expr::Member(Box::new(lhs), name),
                        Token::Number(n) if n.fract() == 0.0 => {
                            lhs = Expr::Member(Box::new(lhs), format!("{}", n as i64).into())
                        }
                        other => {
                            return Err(ExpressionError::UnexpectedToken(format!("{other:?}")))
                        }
                    }
                    continue;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.expression(0)?;
                    self.expect(Token::RBracket)?;
                    lhs = Expr::Index(Box::new(lhs), Box::new(index));
                    continue;
                }
                _ => {}
            }

            let Some((op, bp)) = self.peek().and_then(binary_op) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(bp + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        // Ternary binds loosest of all
        if min_bp == 0 && self.eat(&Token::Question) {
            let then = self.expression(0)?;
            self.expect(Token::Colon)?;
            let otherwise = self.expression(0)?;
            lhs = Expr::Ternary(Box::new(lhs), Box::new(then), Box::new(otherwise));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, ExpressionError> {
        match self.next()? {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Literal(Value::Undefined),
                _ => Expr::Ident(name),
            }),
            Token::Not => Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary_operand()?))),
            Token::Minus => Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary_operand()?))),
            Token::LParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expression(0)?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RBracket)?;
                }
                Ok(Expr::Array(items))
            }
            other => Err(ExpressionError::UnexpectedToken(format!("{other:?}"))),
        }
    }

    /// Operand of a unary operator: a prefix expression with its postfix
    /// chain, but no binary operators (`!a.b` negates the member access,
    /// `-a + b` negates only `a`).
    fn unary_operand(&mut self) -> Result<Expr, ExpressionError> {
        self.expression(UNARY_BP)
    }
}

const UNARY_BP: u8 = 7;

fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    Some(match token {
        Token::OrOr => (BinaryOp::Or, 1),
        Token::AndAnd => (BinaryOp::And, 2),
        Token::EqEq => (BinaryOp::Eq, 3),
        Token::NotEq => (BinaryOp::NotEq, 3),
        Token::EqEqEq => (BinaryOp::StrictEq, 3),
        Token::NotEqEq => (BinaryOp::StrictNotEq, 3),
        Token::Lt => (BinaryOp::Lt, 4),
        Token::Gt => (BinaryOp::Gt, 4),
        Token::LtEq => (BinaryOp::LtEq, 4),
        Token::GtEq => (BinaryOp::GtEq, 4),
        Token::Plus => (BinaryOp::Add, 5),
        Token::Minus => (BinaryOp::Sub, 5),
        Token::Star => (BinaryOp::Mul, 6),
        Token::Slash => (BinaryOp::Div, 6),
        Token::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_nests_multiplication_tighter() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(Value::Number(1.0))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(Value::Number(2.0))),
                    Box::new(Expr::Literal(Value::Number(3.0))),
                )),
            )
        );
    }

    #[test]
    fn member_index_call_chain() {
        let expr = parse_expression("a.b[0](x, 1)").unwrap();
        let Expr::Call(callee, args) = expr else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(*callee, Expr::Index(..)));
    }

    #[test]
    fn ternary_is_loosest() {
        let expr = parse_expression("a > 0 ? 'pos' : 'neg'").unwrap();
        assert!(matches!(expr, Expr::Ternary(..)));
    }

    #[test]
    fn statement_assignment() {
        let stmt = parse_statement("items[0].done = !items[0].done").unwrap();
        assert!(matches!(stmt, Stmt::Assign(Expr::Member(..), _)));
        assert!(matches!(
            parse_statement("1 + 2 = 3"),
            Err(ExpressionError::InvalidAssignTarget)
        ));
    }

    #[test]
    fn trailing_tokens_are_errors() {
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("a +").is_err());
        assert!(parse_expression("(a").is_err());
    }
}
