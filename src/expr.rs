//! Arithmetic expression evaluation for KPI formulas.
//!
//! The grammar is deliberately small: number literals, `+ - * /` and
//! parentheses. There is no unary minus; a leading `-` or a `-` directly
//! after `(` is parsed as a binary operator and fails evaluation. Every
//! failure mode (unknown character, unbalanced parentheses, division by
//! zero, malformed operator placement) yields `None` rather than an error,
//! so a bad formula degrades to "no value" on the dashboard.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn precedence(&self) -> Option<u8> {
        match self {
            Token::Star | Token::Slash => Some(2),
            Token::Plus | Token::Minus => Some(1),
            _ => None,
        }
    }
}

/// Splits an expression string into tokens. Any character outside the
/// grammar fails the whole parse.
pub fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(literal.parse().ok()?));
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            _ => return None,
        }
    }

    Some(tokens)
}

/// Shunting-yard conversion to postfix order.
fn to_postfix(tokens: &[Token]) -> Option<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut operators: Vec<Token> = Vec::new();

    for &token in tokens {
        match token {
            Token::Number(_) => output.push(token),
            Token::Plus | Token::Minus | Token::Star | Token::Slash => {
                let prec = token.precedence()?;
                while let Some(&top) = operators.last() {
                    match top.precedence() {
                        Some(top_prec) if top_prec >= prec => {
                            operators.pop();
                            output.push(top);
                        }
                        _ => break,
                    }
                }
                operators.push(token);
            }
            Token::LParen => operators.push(token),
            Token::RParen => loop {
                match operators.pop() {
                    Some(Token::LParen) => break,
                    Some(op) => output.push(op),
                    None => return None,
                }
            },
        }
    }

    while let Some(op) = operators.pop() {
        if op == Token::LParen {
            return None;
        }
        output.push(op);
    }

    Some(output)
}

/// Evaluates a token stream. References that were already substituted as
/// `Token::Number` (including negative values) evaluate arithmetically.
pub fn evaluate_tokens(tokens: &[Token]) -> Option<f64> {
    if tokens.is_empty() {
        return None;
    }

    let postfix = to_postfix(tokens)?;
    let mut stack: Vec<f64> = Vec::new();

    for token in postfix {
        match token {
            Token::Number(n) => stack.push(n),
            op => {
                let right = stack.pop()?;
                let left = stack.pop()?;
                let result = match op {
                    Token::Plus => left + right,
                    Token::Minus => left - right,
                    Token::Star => left * right,
                    Token::Slash => {
                        if right == 0.0 {
                            return None;
                        }
                        left / right
                    }
                    _ => return None,
                };
                stack.push(result);
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(result), true) if result.is_finite() => Some(result),
        _ => None,
    }
}

/// Parses and evaluates an arithmetic expression string.
pub fn evaluate(expr: &str) -> Option<f64> {
    let tokens = tokenize(expr)?;
    evaluate_tokens(&tokens)
}
