//! Recursive-descent parser producing the expression AST.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! assign      := conditional (("=" | "+=" | "-=") assign)?
//! conditional := nullish ("?" assign ":" assign)?
//! nullish     := or ("??" or)*
//! or          := and ("||" and)*
//! and         := equality ("&&" equality)*
//! equality    := relational (("==" | "!=" | "===" | "!==") relational)*
//! relational  := additive (("<" | ">" | "<=" | ">=") additive)*
//! additive    := term (("+" | "-") term)*
//! term        := unary (("*" | "/" | "%") unary)*
//! unary       := ("!" | "-" | "+" | "typeof") unary | postfix
//! postfix     := primary ("." ident | "?." ident | "[" assign "]" | "?.[" assign "]" | "(" args ")")*
//! ```

use super::{
    ExprError,
    lexer::{Spanned, Token, tokenize},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// Left-hand side of a loop binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// `item of items`
    Ident(String),
    /// `[key, value] of entries` (holes allowed: `[, value]`)
    Array(Vec<Option<String>>),
    /// `{ name, url } of links`
    Object(Vec<String>),
}

/// Parsed `<pattern> of <expression>` clause.
#[derive(Debug, Clone)]
pub struct LoopBinding {
    pub pattern: Pattern,
    pub iterable: Expr,
}

/// Parse a full expression.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.assignment()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a loop binding clause such as `post of posts` or `const [k, v] of entries(x)`.
pub fn parse_binding(src: &str) -> Result<LoopBinding, ExprError> {
    let mut parser = Parser::new(src)?;

    if let Token::Ident(kw) = parser.peek()
        && matches!(kw.as_str(), "const" | "let" | "var")
    {
        parser.advance();
    }

    let pattern = parser.pattern()?;
    match parser.advance() {
        Spanned { token: Token::Ident(kw), .. } if kw == "of" => {}
        Spanned { pos, .. } => {
            return Err(ExprError::syntax(pos, "expected `of` in loop binding"));
        }
    }

    let iterable = parser.assignment()?;
    parser.expect_eof()?;
    Ok(LoopBinding { pattern, iterable })
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ExprError> {
        Ok(Self { tokens: tokenize(src)?, pos: 0 })
    }

    #[inline]
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    #[inline]
    fn current_pos(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Spanned {
        let spanned = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        spanned
    }

    /// Consume the punctuator if it is next.
    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExprError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected `{punct}`")))
        }
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("expected end of expression")),
        }
    }

    fn expect_ident(&mut self) -> Result<String, ExprError> {
        match self.advance() {
            Spanned { token: Token::Ident(name), .. } => Ok(name),
            Spanned { pos, token } => Err(ExprError::syntax(
                pos,
                format!("expected identifier, found {}", describe(&token)),
            )),
        }
    }

    fn unexpected(&self, message: &str) -> ExprError {
        ExprError::syntax(
            self.current_pos(),
            format!("{message}, found {}", describe(self.peek())),
        )
    }

    fn assignment(&mut self) -> Result<Expr, ExprError> {
        let target = self.conditional()?;

        let op = if self.eat("=") {
            AssignOp::Set
        } else if self.eat("+=") {
            AssignOp::Add
        } else if self.eat("-=") {
            AssignOp::Sub
        } else {
            return Ok(target);
        };

        if !matches!(target, Expr::Ident(_) | Expr::Member { optional: false, .. }) {
            return Err(ExprError::syntax(self.current_pos(), "invalid assignment target"));
        }

        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.nullish()?;
        if !self.eat("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn nullish(&mut self) -> Result<Expr, ExprError> {
        self.logical(LogicalOp::Nullish)
    }

    /// Left-associative logical chains; `??` binds looser than `||`, which binds looser than `&&`.
    fn logical(&mut self, op: LogicalOp) -> Result<Expr, ExprError> {
        let (punct, next) = match op {
            LogicalOp::Nullish => ("??", Some(LogicalOp::Or)),
            LogicalOp::Or => ("||", Some(LogicalOp::And)),
            LogicalOp::And => ("&&", None),
        };
        let operand = |p: &mut Self| match next {
            Some(next) => p.logical(next),
            None => p.equality(),
        };

        let mut left = operand(&mut *self)?;
        while self.eat(punct) {
            let right = operand(&mut *self)?;
            left = Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::term)
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = operand(self)?;
        'outer: loop {
            for (punct, op) in ops {
                if self.eat(punct) {
                    let right = operand(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Token::Punct("!") => UnaryOp::Not,
            Token::Punct("-") => UnaryOp::Neg,
            Token::Punct("+") => UnaryOp::Plus,
            Token::Ident(kw) if kw == "typeof" => UnaryOp::TypeOf,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;

        loop {
            if self.eat(".") {
                let name = self.expect_ident()?;
                expr = member(expr, Expr::Literal(Value::String(name)), false);
            } else if self.eat("?.") {
                if self.eat("[") {
                    let property = self.assignment()?;
                    self.expect("]")?;
                    expr = member(expr, property, true);
                } else {
                    let name = self.expect_ident()?;
                    expr = member(expr, Expr::Literal(Value::String(name)), true);
                }
            } else if self.eat("[") {
                let property = self.assignment()?;
                self.expect("]")?;
                expr = member(expr, property, false);
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let Spanned { token, pos } = self.advance();
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Literal(Value::Undefined),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                let expr = self.assignment()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            Token::Punct("{") => self.object_literal(),
            other => Err(ExprError::syntax(
                pos,
                format!("unexpected {}", describe(&other)),
            )),
        }
    }

    /// Comma-separated expressions up to `close`; trailing comma allowed.
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.assignment()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn object_literal(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        while !self.eat("}") {
            let key = match self.advance() {
                Spanned { token: Token::Ident(name) | Token::Str(name), .. } => name,
                Spanned { token: Token::Number(n), .. } => super::value::format_number(n),
                Spanned { token, pos } => {
                    return Err(ExprError::syntax(
                        pos,
                        format!("expected property name, found {}", describe(&token)),
                    ));
                }
            };
            let value = if self.eat(":") {
                self.assignment()?
            } else {
                // shorthand `{ name }`
                Expr::Ident(key.clone())
            };
            entries.push((key, value));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }

    fn pattern(&mut self) -> Result<Pattern, ExprError> {
        if self.eat("[") {
            let mut names = Vec::new();
            while !self.eat("]") {
                if self.eat(",") {
                    names.push(None);
                    continue;
                }
                names.push(Some(self.expect_ident()?));
                if !self.eat(",") {
                    self.expect("]")?;
                    break;
                }
            }
            Ok(Pattern::Array(names))
        } else if self.eat("{") {
            let mut names = Vec::new();
            while !self.eat("}") {
                names.push(self.expect_ident()?);
                if !self.eat(",") {
                    self.expect("}")?;
                    break;
                }
            }
            Ok(Pattern::Object(names))
        } else {
            Ok(Pattern::Ident(self.expect_ident()?))
        }
    }
}

#[inline]
fn member(object: Expr, property: Expr, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property: Box::new(property),
        optional,
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number `{}`", super::value::format_number(*n)),
        Token::Str(_) => "string".into(),
        Token::Ident(name) => format!("`{name}`"),
        Token::Punct(p) => format!("`{p}`"),
        Token::Eof => "end of input".into(),
    }
}

// ============================================================================
// Tests
// ============================================================================
