//! Access Control String (ACS) evaluation.
//!
//! Menus and commands carry a short infix boolean expression deciding who may
//! see or invoke them: `S50&FA` means "access level ≥ 50 AND flag A set".
//! Operators are `&`, `|`, unary `!`, and parentheses; conditions are
//! alphanumeric atoms beginning with a letter.
//!
//! Evaluation is a single left-to-right tokenize, a shunting-yard conversion
//! to RPN (`!` binds tightest and is right-associative), and a boolean stack
//! walk. Anything malformed — mismatched parentheses, operand underflow,
//! leftover stack values — **denies** rather than erroring: a broken ACS must
//! never panic a node task or accidentally grant access.
//!
//! Unexpected characters in the input are silently dropped by the tokenizer
//! and scanning continues; `S50@FA` tokenizes as two conditions.

// Rust guideline compliant 2026-02

use crate::user::User;

/// Session facts the evaluator can test besides the user record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcsContext<'a> {
    /// Authenticated user, if any. A non-empty expression with no user
    /// denies.
    pub user: Option<&'a User>,
    /// Whether the session is a local console (`L` atom).
    pub local: bool,
    /// Whether the session is ANSI-capable / has a PTY allocated (`A` atom).
    pub ansi: bool,
}

/// A lexed ACS token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Condition atom: first letter plus its argument, e.g. `S50`, `FA`, `V`.
    Cond(String),
    /// `&`
    And,
    /// `|`
    Or,
    /// `!`
    Not,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

/// Tokenizes an ACS expression.
///
/// Never fails: unexpected characters are dropped and the scan continues.
#[must_use]
pub fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '&' => tokens.push(Token::And),
            '|' => tokens.push(Token::Or),
            '!' => tokens.push(Token::Not),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            c if c.is_ascii_alphabetic() => {
                let mut atom = String::new();
                atom.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() {
                        atom.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Cond(atom));
            }
            // Whitespace and anything unexpected: silently dropped.
            _ => {}
        }
    }
    tokens
}

/// Operator precedence; `!` binds tightest.
fn precedence(token: &Token) -> u8 {
    match token {
        Token::Not => 3,
        Token::And => 2,
        Token::Or => 1,
        _ => 0,
    }
}

/// Infix → RPN via shunting-yard.
///
/// Returns `None` on mismatched parentheses.
fn to_rpn(tokens: Vec<Token>) -> Option<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut ops: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Cond(_) => output.push(token),
            Token::LParen => ops.push(token),
            Token::RParen => {
                loop {
                    match ops.pop() {
                        Some(Token::LParen) => break,
                        Some(op) => output.push(op),
                        None => return None, // unmatched `)`
                    }
                }
            }
            Token::Not | Token::And | Token::Or => {
                while let Some(top) = ops.last() {
                    if *top == Token::LParen {
                        break;
                    }
                    let stronger = precedence(top) > precedence(&token)
                        // `!` is right-associative: equal precedence stays.
                        || (precedence(top) == precedence(&token) && token != Token::Not);
                    if stronger {
                        output.push(ops.pop()?);
                    } else {
                        break;
                    }
                }
                ops.push(token);
            }
        }
    }

    while let Some(op) = ops.pop() {
        if op == Token::LParen {
            return None; // unmatched `(`
        }
        output.push(op);
    }
    Some(output)
}

/// Evaluates one condition atom against the context.
///
/// Unknown condition letters evaluate to `false`.
fn eval_condition(atom: &str, ctx: &AcsContext<'_>) -> bool {
    let mut chars = atom.chars();
    let Some(letter) = chars.next() else {
        return false;
    };
    let arg: &str = chars.as_str();

    match letter.to_ascii_uppercase() {
        'L' => ctx.local,
        'A' => ctx.ansi,
        'S' => match (ctx.user, arg.parse::<u16>()) {
            (Some(user), Ok(level)) => u16::from(user.access_level) >= level,
            _ => false,
        },
        'F' => match ctx.user {
            Some(user) => arg.chars().next().is_some_and(|flag| {
                user.flags
                    .chars()
                    .any(|f| f.eq_ignore_ascii_case(&flag))
            }),
            None => false,
        },
        'V' => ctx.user.is_some_and(|u| u.validated),
        'U' => match (ctx.user, arg.parse::<u32>()) {
            (Some(user), Ok(id)) => user.id == id,
            _ => false,
        },
        'P' => match (ctx.user, arg.parse::<u32>()) {
            (Some(user), Ok(points)) => user.file_points >= points,
            _ => false,
        },
        'Z' => ctx.user.is_some_and(|u| {
            u.private_note
                .to_uppercase()
                .contains(&arg.to_uppercase())
        }),
        _ => false,
    }
}

/// Evaluates an RPN token stream. `None` means malformed (deny).
fn eval_rpn(rpn: &[Token], ctx: &AcsContext<'_>) -> Option<bool> {
    let mut stack: Vec<bool> = Vec::with_capacity(4);
    for token in rpn {
        match token {
            Token::Cond(atom) => stack.push(eval_condition(atom, ctx)),
            Token::Not => {
                let value = stack.pop()?;
                stack.push(!value);
            }
            Token::And => {
                let rhs = stack.pop()?;
                let lhs = stack.pop()?;
                stack.push(lhs && rhs);
            }
            Token::Or => {
                let rhs = stack.pop()?;
                let lhs = stack.pop()?;
                stack.push(lhs || rhs);
            }
            Token::LParen | Token::RParen => return None,
        }
    }
    if stack.len() == 1 {
        stack.pop()
    } else {
        None
    }
}

/// Decides whether the context may access a resource gated by `expr`.
///
/// Empty and `*` expressions allow. A non-empty expression with no
/// authenticated user denies. Malformed expressions deny without panicking.
#[must_use]
pub fn check_acs(expr: &str, ctx: &AcsContext<'_>) -> bool {
    let expr = expr.trim();
    if expr.is_empty() || expr == "*" {
        return true;
    }
    if ctx.user.is_none() {
        return false;
    }
    let tokens = tokenize(expr);
    if tokens.is_empty() {
        // Nothing but garbage characters: treat like empty (allow).
        return true;
    }
    match to_rpn(tokens) {
        Some(rpn) => eval_rpn(&rpn, ctx).unwrap_or(false),
        None => false,
    }
}
