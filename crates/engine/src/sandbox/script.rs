//! Lexer and parser for the `.calc` payload language.
//!
//! The language is deliberately small: phase 1 of an invocation runs the
//! top-level statements, and a `compute { ... }` block registers the
//! computation entry point whose body runs in phase 2 against the frozen
//! inputs. There is no dynamic evaluation, no I/O syntax, and no way to name
//! anything outside the execution context.
//!
//! ```text
//! payload  := { "let" IDENT "=" expr | "compute" "{" { stmt } "}" }
//! stmt     := "let" IDENT "=" expr
//!           | "log" "(" expr ")"
//!           | "repeat" expr "{" { stmt } "}"
//!           | "return" expr
//! expr     := term (("+" | "-") term)*
//! term     := unary (("*" | "/") unary)*
//! unary    := "-" unary | primary
//! primary  := NUMBER | STRING | "true" | "false" | "null"
//!           | "inputs" "." IDENT | IDENT | IDENT "(" args ")"
//!           | "{" STRING ":" expr { "," STRING ":" expr } "}"
//!           | "[" args "]" | "(" expr ")"
//! ```
//!
//! `#` starts a comment running to the end of the line.

use rust_decimal::Decimal;

use super::value::Value;

/// Parsed payload: top-level items in source order.
#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<TopLevel>,
}

/// One top-level item.
#[derive(Debug, Clone)]
pub enum TopLevel {
    /// `let name = expr`, evaluated during registration.
    Let { name: String, expr: ScriptExpr },
    /// `compute { ... }`, recording the entry-point body for phase 2.
    Compute(Vec<Stmt>),
}

/// One statement inside a compute (or repeat) body.
#[derive(Debug, Clone)]
pub enum Stmt {
    Let { name: String, expr: ScriptExpr },
    Log(ScriptExpr),
    Repeat { count: ScriptExpr, body: Vec<Stmt> },
    Return(ScriptExpr),
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum ScriptExpr {
    Literal(Value),
    Ident(String),
    Input(String),
    Call { name: String, args: Vec<ScriptExpr> },
    MapLit(Vec<(String, ScriptExpr)>),
    ListLit(Vec<ScriptExpr>),
    Binary {
        op: ArithOp,
        left: Box<ScriptExpr>,
        right: Box<ScriptExpr>,
    },
    Negate(Box<ScriptExpr>),
}

/// Arithmetic operators; same precedence ladder as the playbook grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Ident(String),
    Number(Decimal),
    Str(String),
    Assign,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Colon,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Lexeme {
    fn describe(&self) -> String {
        match self {
            Lexeme::Ident(name) => format!("'{name}'"),
            Lexeme::Number(value) => format!("'{value}'"),
            Lexeme::Str(_) => "string literal".into(),
            Lexeme::Assign => "'='".into(),
            Lexeme::OpenBrace => "'{'".into(),
            Lexeme::CloseBrace => "'}'".into(),
            Lexeme::OpenParen => "'('".into(),
            Lexeme::CloseParen => "')'".into(),
            Lexeme::OpenBracket => "'['".into(),
            Lexeme::CloseBracket => "']'".into(),
            Lexeme::Comma => "','".into(),
            Lexeme::Colon => "':'".into(),
            Lexeme::Dot => "'.'".into(),
            Lexeme::Plus => "'+'".into(),
            Lexeme::Minus => "'-'".into(),
            Lexeme::Star => "'*'".into(),
            Lexeme::Slash => "'/'".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    lexeme: Lexeme,
    line: usize,
}

/// Deepest nesting the parser accepts. Payload text is adversarial; without
/// a bound, a long chain of unary minuses or parentheses would overflow the
/// parser's stack and abort the host process instead of failing the payload.
const MAX_NESTING_DEPTH: usize = 256;

/// Parses payload text into a [`Program`].
pub fn parse_payload(text: &str) -> Result<Program, String> {
    let tokens = lex(text)?;
    let mut parser = ScriptParser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let mut items = Vec::new();
    while parser.peek().is_some() {
        items.push(parser.top_level()?);
    }
    Ok(Program { items })
}

fn lex(text: &str) -> Result<Vec<Spanned>, String> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut chars = text.char_indices().peekable();

    while let Some((index, character)) = chars.next() {
        match character {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                // Comment runs to end of line.
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '=' => tokens.push(Spanned {
                lexeme: Lexeme::Assign,
                line,
            }),
            '{' => tokens.push(Spanned {
                lexeme: Lexeme::OpenBrace,
                line,
            }),
            '}' => tokens.push(Spanned {
                lexeme: Lexeme::CloseBrace,
                line,
            }),
            '(' => tokens.push(Spanned {
                lexeme: Lexeme::OpenParen,
                line,
            }),
            ')' => tokens.push(Spanned {
                lexeme: Lexeme::CloseParen,
                line,
            }),
            '[' => tokens.push(Spanned {
                lexeme: Lexeme::OpenBracket,
                line,
            }),
            ']' => tokens.push(Spanned {
                lexeme: Lexeme::CloseBracket,
                line,
            }),
            ',' => tokens.push(Spanned {
                lexeme: Lexeme::Comma,
                line,
            }),
            ':' => tokens.push(Spanned {
                lexeme: Lexeme::Colon,
                line,
            }),
            '.' => {
                if chars.peek().is_some_and(|(_, c)| c.is_ascii_digit()) {
                    let number = lex_number(text, index, &mut chars)?;
                    tokens.push(Spanned {
                        lexeme: Lexeme::Number(number),
                        line,
                    });
                } else {
                    tokens.push(Spanned {
                        lexeme: Lexeme::Dot,
                        line,
                    });
                }
            }
            '+' => tokens.push(Spanned {
                lexeme: Lexeme::Plus,
                line,
            }),
            '-' => tokens.push(Spanned {
                lexeme: Lexeme::Minus,
                line,
            }),
            '*' => tokens.push(Spanned {
                lexeme: Lexeme::Star,
                line,
            }),
            '/' => tokens.push(Spanned {
                lexeme: Lexeme::Slash,
                line,
            }),
            '"' => {
                let mut literal = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => literal.push('\n'),
                            Some((_, 't')) => literal.push('\t'),
                            Some((_, '"')) => literal.push('"'),
                            Some((_, '\\')) => literal.push('\\'),
                            other => {
                                return Err(format!(
                                    "line {line}: unsupported escape '\\{}'",
                                    other.map(|(_, c)| c).unwrap_or(' ')
                                ));
                            }
                        },
                        '\n' => return Err(format!("line {line}: unterminated string literal")),
                        c => literal.push(c),
                    }
                }
                if !closed {
                    return Err(format!("line {line}: unterminated string literal"));
                }
                tokens.push(Spanned {
                    lexeme: Lexeme::Str(literal),
                    line,
                });
            }
            c if c.is_ascii_digit() => {
                let number = lex_number(text, index, &mut chars)?;
                tokens.push(Spanned {
                    lexeme: Lexeme::Number(number),
                    line,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = index + c.len_utf8();
                while let Some((next_index, next)) = chars.peek().copied() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        end = next_index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    lexeme: Lexeme::Ident(text[index..end].to_string()),
                    line,
                });
            }
            other => return Err(format!("line {line}: unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

fn lex_number(
    text: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Decimal, String> {
    let mut end = start + 1;
    while let Some((next_index, next)) = chars.peek().copied() {
        if next.is_ascii_digit() || next == '.' {
            end = next_index + next.len_utf8();
            chars.next();
        } else {
            break;
        }
    }
    let literal = &text[start..end];
    // Decimal's parser wants a digit before the point; normalize ".5" to "0.5".
    let normalized = if literal.starts_with('.') {
        format!("0{literal}")
    } else {
        literal.to_string()
    };
    normalized.parse::<Decimal>().map_err(|_| format!("malformed number '{literal}'"))
}

struct ScriptParser {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl ScriptParser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn descend(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(format!("payload nesting exceeds {MAX_NESTING_DEPTH} levels"));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, expected: Lexeme) -> Result<(), String> {
        match self.advance() {
            Some(token) if token.lexeme == expected => Ok(()),
            Some(token) => Err(format!(
                "line {}: expected {} but found {}",
                token.line,
                expected.describe(),
                token.lexeme.describe()
            )),
            None => Err(format!("unexpected end of payload; expected {}", expected.describe())),
        }
    }

    fn expect_ident(&mut self) -> Result<String, String> {
        match self.advance() {
            Some(Spanned {
                lexeme: Lexeme::Ident(name),
                ..
            }) => Ok(name),
            Some(token) => Err(format!("line {}: expected a name but found {}", token.line, token.lexeme.describe())),
            None => Err("unexpected end of payload; expected a name".into()),
        }
    }

    fn top_level(&mut self) -> Result<TopLevel, String> {
        let keyword = self.expect_ident()?;
        match keyword.as_str() {
            "let" => {
                let name = self.expect_ident()?;
                self.expect(Lexeme::Assign)?;
                let expr = self.expression()?;
                Ok(TopLevel::Let { name, expr })
            }
            "compute" => {
                self.expect(Lexeme::OpenBrace)?;
                let body = self.block()?;
                Ok(TopLevel::Compute(body))
            }
            other => Err(format!("expected 'let' or 'compute' at top level, found '{other}'")),
        }
    }

    // Bounds `repeat` block nesting.
    fn block(&mut self) -> Result<Vec<Stmt>, String> {
        self.descend()?;
        let result = self.block_inner();
        self.ascend();
        result
    }

    fn block_inner(&mut self) -> Result<Vec<Stmt>, String> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Some(Spanned {
                    lexeme: Lexeme::CloseBrace,
                    ..
                }) => {
                    self.advance();
                    return Ok(body);
                }
                Some(_) => body.push(self.statement()?),
                None => return Err("unexpected end of payload; expected '}'".into()),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, String> {
        let keyword = self.expect_ident()?;
        match keyword.as_str() {
            "let" => {
                let name = self.expect_ident()?;
                self.expect(Lexeme::Assign)?;
                let expr = self.expression()?;
                Ok(Stmt::Let { name, expr })
            }
            "log" => {
                self.expect(Lexeme::OpenParen)?;
                let expr = self.expression()?;
                self.expect(Lexeme::CloseParen)?;
                Ok(Stmt::Log(expr))
            }
            "repeat" => {
                let count = self.expression()?;
                self.expect(Lexeme::OpenBrace)?;
                let body = self.block()?;
                Ok(Stmt::Repeat { count, body })
            }
            "return" => {
                let expr = self.expression()?;
                Ok(Stmt::Return(expr))
            }
            other => Err(format!("expected a statement, found '{other}'")),
        }
    }

    fn expression(&mut self) -> Result<ScriptExpr, String> {
        let mut left = self.term()?;
        while let Some(token) = self.peek() {
            let op = match token.lexeme {
                Lexeme::Plus => ArithOp::Add,
                Lexeme::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            left = ScriptExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<ScriptExpr, String> {
        let mut left = self.unary()?;
        while let Some(token) = self.peek() {
            let op = match token.lexeme {
                Lexeme::Star => ArithOp::Mul,
                Lexeme::Slash => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = ScriptExpr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // Every recursive expression path runs through `unary`, so the depth
    // guard here bounds expression nesting.
    fn unary(&mut self) -> Result<ScriptExpr, String> {
        self.descend()?;
        let result = self.unary_inner();
        self.ascend();
        result
    }

    fn unary_inner(&mut self) -> Result<ScriptExpr, String> {
        if let Some(Spanned {
            lexeme: Lexeme::Minus, ..
        }) = self.peek()
        {
            self.advance();
            let operand = self.unary()?;
            return Ok(ScriptExpr::Negate(Box::new(operand)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<ScriptExpr, String> {
        let token = self.advance().ok_or("unexpected end of payload inside expression")?;
        match token.lexeme {
            Lexeme::Number(value) => Ok(ScriptExpr::Literal(Value::Number(value))),
            Lexeme::Str(text) => Ok(ScriptExpr::Literal(Value::Str(text))),
            Lexeme::Ident(name) => match name.as_str() {
                "true" => Ok(ScriptExpr::Literal(Value::Bool(true))),
                "false" => Ok(ScriptExpr::Literal(Value::Bool(false))),
                "null" => Ok(ScriptExpr::Literal(Value::Null)),
                "inputs" => {
                    self.expect(Lexeme::Dot)?;
                    let field = self.expect_ident()?;
                    Ok(ScriptExpr::Input(field))
                }
                _ => {
                    if let Some(Spanned {
                        lexeme: Lexeme::OpenParen,
                        ..
                    }) = self.peek()
                    {
                        self.advance();
                        let args = self.arguments(Lexeme::CloseParen)?;
                        Ok(ScriptExpr::Call { name, args })
                    } else {
                        Ok(ScriptExpr::Ident(name))
                    }
                }
            },
            Lexeme::OpenParen => {
                let inner = self.expression()?;
                self.expect(Lexeme::CloseParen)?;
                Ok(inner)
            }
            Lexeme::OpenBracket => {
                let items = self.arguments(Lexeme::CloseBracket)?;
                Ok(ScriptExpr::ListLit(items))
            }
            Lexeme::OpenBrace => {
                let mut entries = Vec::new();
                loop {
                    match self.advance() {
                        Some(Spanned {
                            lexeme: Lexeme::CloseBrace,
                            ..
                        }) => break,
                        Some(Spanned {
                            lexeme: Lexeme::Str(key),
                            ..
                        }) => {
                            self.expect(Lexeme::Colon)?;
                            let value = self.expression()?;
                            entries.push((key, value));
                            if let Some(Spanned {
                                lexeme: Lexeme::Comma, ..
                            }) = self.peek()
                            {
                                self.advance();
                            }
                        }
                        Some(token) => {
                            return Err(format!(
                                "line {}: map keys must be string literals, found {}",
                                token.line,
                                token.lexeme.describe()
                            ));
                        }
                        None => return Err("unexpected end of payload inside map literal".into()),
                    }
                }
                Ok(ScriptExpr::MapLit(entries))
            }
            other => Err(format!("line {}: unexpected {}", token.line, other.describe())),
        }
    }

    fn arguments(&mut self, close: Lexeme) -> Result<Vec<ScriptExpr>, String> {
        let mut args = Vec::new();
        if let Some(token) = self.peek()
            && token.lexeme == close
        {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(token) if token.lexeme == close => return Ok(args),
                Some(Spanned {
                    lexeme: Lexeme::Comma, ..
                }) => continue,
                Some(token) => {
                    return Err(format!(
                        "line {}: expected ',' or {} in argument list, found {}",
                        token.line,
                        close.describe(),
                        token.lexeme.describe()
                    ));
                }
                None => return Err("unexpected end of payload inside argument list".into()),
            }
        }
    }
}
