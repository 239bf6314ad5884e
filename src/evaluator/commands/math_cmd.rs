//! `math(EXPR out expr [OUTPUT_FORMAT DECIMAL|HEXADECIMAL])`: checked
//! 64-bit two's-complement arithmetic with precedence
//! `~ unary-/+ > * / % > + - > << >> > & > ^ > |`.
//!
//! Tokenize, then recursive-descent over that precedence ladder with
//! checked ops at every step.

use crate::ast::types::CommandNode;

use super::super::context::EvaluatorContext;
use super::arity_error;

pub fn handle_math(ctx: &mut EvaluatorContext, node: &CommandNode, args: &[String]) {
    if args.len() < 3 || args[0] != "EXPR" {
        arity_error(ctx, node, "math(EXPR out expr) requires an output variable and expression");
        return;
    }
    let out_var = &args[1];
    let expr = &args[2];
    let hex_output = args.get(3).map(String::as_str) == Some("OUTPUT_FORMAT")
        && args.get(4).map(String::as_str) == Some("HEXADECIMAL");

    match evaluate(expr) {
        Ok(value) => {
            let rendered = if hex_output {
                format!("0x{value:x}")
            } else {
                value.to_string()
            };
            ctx.scopes.set_local(out_var, rendered);
        }
        Err(e) => arity_error(ctx, node, format!("math(EXPR): {e}")),
    }
}

pub fn evaluate(expr: &str) -> Result<i64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = MathParser { tokens: &tokens, pos: 0 };
    let value = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing characters in expression".to_string());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Op(char),
    ShiftLeft,
    ShiftRight,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            let hex = c == '0' && chars.get(i + 1) == Some(&'x');
            if hex {
                i += 2;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let text: String = chars[start + 2..i].iter().collect();
                let value = i64::from_str_radix(&text, 16).map_err(|_| "bad hex literal".to_string())?;
                tokens.push(Tok::Num(value));
            } else {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value: i64 = text.parse().map_err(|_| "bad integer literal".to_string())?;
                tokens.push(Tok::Num(value));
            }
            continue;
        }
        match c {
            '(' => { tokens.push(Tok::LParen); i += 1; }
            ')' => { tokens.push(Tok::RParen); i += 1; }
            '+' | '-' | '*' | '/' | '%' | '&' | '^' | '|' | '~' => { tokens.push(Tok::Op(c)); i += 1; }
            '<' if chars.get(i + 1) == Some(&'<') => { tokens.push(Tok::ShiftLeft); i += 2; }
            '>' if chars.get(i + 1) == Some(&'>') => { tokens.push(Tok::ShiftRight); i += 2; }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct MathParser<'a> {
    tokens: &'a [Tok],
    pos: usize,
}

impl<'a> MathParser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Tok> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    // Precedence, loosest to tightest: | > ^ > & > shift > +- > */% > unary.
    fn parse_or(&mut self) -> Result<i64, String> {
        let mut left = self.parse_xor()?;
        while self.peek() == Some(&Tok::Op('|')) {
            self.advance();
            left |= self.parse_xor()?;
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<i64, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Tok::Op('^')) {
            self.advance();
            left ^= self.parse_and()?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<i64, String> {
        let mut left = self.parse_shift()?;
        while self.peek() == Some(&Tok::Op('&')) {
            self.advance();
            left &= self.parse_shift()?;
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<i64, String> {
        let mut left = self.parse_additive()?;
        loop {
            match self.peek() {
                Some(Tok::ShiftLeft) => {
                    self.advance();
                    let rhs = self.parse_additive()?;
                    left = checked_shift(left, rhs, true)?;
                }
                Some(Tok::ShiftRight) => {
                    self.advance();
                    let rhs = self.parse_additive()?;
                    left = checked_shift(left, rhs, false)?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<i64, String> {
        let mut left = self.parse_multiplicative()?;
        loop {
            match self.peek() {
                Some(Tok::Op('+')) => {
                    self.advance();
                    let rhs = self.parse_multiplicative()?;
                    left = left.checked_add(rhs).ok_or("integer overflow in +")?;
                }
                Some(Tok::Op('-')) => {
                    self.advance();
                    let rhs = self.parse_multiplicative()?;
                    left = left.checked_sub(rhs).ok_or("integer overflow in -")?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<i64, String> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Tok::Op('*')) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    left = left.checked_mul(rhs).ok_or("integer overflow in *")?;
                }
                Some(Tok::Op('/')) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    if rhs == 0 {
                        return Err("division by zero".to_string());
                    }
                    left = left.checked_div(rhs).ok_or("integer overflow in /")?;
                }
                Some(Tok::Op('%')) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    if rhs == 0 {
                        return Err("modulo by zero".to_string());
                    }
                    left = left.checked_rem(rhs).ok_or("integer overflow in %")?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<i64, String> {
        match self.peek() {
            Some(Tok::Op('-')) => {
                self.advance();
                let v = self.parse_unary()?;
                v.checked_neg().ok_or("integer overflow in unary -".to_string())
            }
            Some(Tok::Op('+')) => {
                self.advance();
                self.parse_unary()
            }
            Some(Tok::Op('~')) => {
                self.advance();
                Ok(!self.parse_unary()?)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<i64, String> {
        match self.advance() {
            Some(Tok::Num(n)) => Ok(*n),
            Some(Tok::LParen) => {
                let v = self.parse_or()?;
                match self.advance() {
                    Some(Tok::RParen) => Ok(v),
                    _ => Err("expected ')'".to_string()),
                }
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn checked_shift(left: i64, count: i64, is_left: bool) -> Result<i64, String> {
    if !(0..64).contains(&count) {
        return Err("shift count out of range 0..64".to_string());
    }
    let count = count as u32;
    Ok(if is_left { left << count } else { left >> count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_precedence_matches_documented_order() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20);
        assert_eq!(evaluate("1 | 2 & 3").unwrap(), 1 | (2 & 3));
        assert_eq!(evaluate("8 >> 1 + 1").unwrap(), 2);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(evaluate("-5 + 3").unwrap(), -2);
        assert_eq!(evaluate("~0").unwrap(), -1);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(evaluate("9223372036854775807 + 1").is_err());
    }

    #[test]
    fn shift_count_out_of_range_is_an_error() {
        assert!(evaluate("1 << 64").is_err());
        assert!(evaluate("1 << -1").is_err());
    }

    #[test]
    fn hex_literal_parses() {
        assert_eq!(evaluate("0x10 + 1").unwrap(), 17);
    }
}
