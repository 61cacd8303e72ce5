//! Recursive-descent parser producing the arithmetic AST.

use tally_types::ExpressionError;

use super::token::{Token, TokenKind, tokenize};

/// Binary operators in precedence order: `*` and `/` bind tighter than
/// `+` and `-`; unary minus binds tightest of all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Immutable expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Field(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
}

/// Deepest nesting the parser accepts. Recursion depth tracks expression
/// nesting, so an unbounded chain of parentheses or unary minuses would
/// otherwise exhaust the stack.
const MAX_NESTING_DEPTH: usize = 128;

/// Tokenizes and parses expression text into an [`Expr`] tree.
pub fn parse(text: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let tree = parser.expression()?;

    // The grammar must consume the whole input; a trailing token is an error.
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::UnexpectedToken {
            token: token.kind.describe(),
            position: token.position,
        });
    }
    Ok(tree)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.term()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.factor()?;
        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // Every recursive path runs through `factor`, so the depth guard here
    // bounds the whole parse.
    fn factor(&mut self) -> Result<Expr, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(ExpressionError::NestingTooDeep);
        }
        let result = self.factor_inner();
        self.depth -= 1;
        result
    }

    fn factor_inner(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.advance().ok_or(ExpressionError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Field(name) => Ok(Expr::Field(name)),
            TokenKind::Minus => {
                let operand = self.factor()?;
                Ok(Expr::Negate(Box::new(operand)))
            }
            TokenKind::OpenParen => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::CloseParen,
                        ..
                    }) => Ok(inner),
                    Some(token) => Err(ExpressionError::UnexpectedToken {
                        token: token.kind.describe(),
                        position: token.position,
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            kind => Err(ExpressionError::UnexpectedToken {
                token: kind.describe(),
                position: token.position,
            }),
        }
    }
}
