//! Rule expression parser.
//!
//! Recursive descent parser for infix rules such as
//! `change_3m_pct > 10 AND max_drop_2w_pct < 15`. Converts text to AST with
//! error messages carrying the character offset of the problem.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons (chainable),
//! `+ -`, `* / %`, unary `- +`, `**` (right associative). The boolean
//! keywords are case-insensitive.

use crate::domain::error::ParseError;
use crate::domain::metrics::MetricField;
use crate::domain::rule::{BinaryOp, CompareOp, Expr, UnaryOp};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    /// Case-insensitive keyword match on a whole word.
    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let word = self.peek_word();
        if word.eq_ignore_ascii_case(keyword) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        self.skip_whitespace();
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.parse_and()?];
        while self.consume_keyword("or") {
            operands.push(self.parse_and()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Or(operands)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.parse_not()?];
        while self.consume_keyword("and") {
            operands.push(self.parse_not()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::And(operands)
        })
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.consume_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn peek_compare_op(&mut self) -> Option<CompareOp> {
        self.skip_whitespace();
        let remaining = self.remaining();
        let (op, len) = if remaining.starts_with("<=") {
            (CompareOp::Le, 2)
        } else if remaining.starts_with(">=") {
            (CompareOp::Ge, 2)
        } else if remaining.starts_with("==") {
            (CompareOp::Eq, 2)
        } else if remaining.starts_with("!=") {
            (CompareOp::Ne, 2)
        } else if remaining.starts_with('<') {
            (CompareOp::Lt, 1)
        } else if remaining.starts_with('>') {
            (CompareOp::Gt, 1)
        } else {
            return None;
        };
        self.pos += len;
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek_compare_op() {
            rest.push((op, self.parse_additive()?));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        Ok(Expr::Compare {
            first: Box::new(first),
            rest,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.consume_exact("+") {
                BinaryOp::Add
            } else if self.consume_exact("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            // `**` belongs to parse_power
            if self.remaining().starts_with("**") {
                break;
            }
            let op = if self.consume_exact("*") {
                BinaryOp::Mul
            } else if self.consume_exact("/") {
                BinaryOp::Div
            } else if self.consume_exact("%") {
                BinaryOp::Rem
            } else {
                break;
            };
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.consume_exact("-") {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.consume_exact("+") {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Pos,
                operand: Box::new(operand),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.consume_exact("**") {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();

        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => {
                return Ok(Expr::Number(self.parse_number()?));
            }
            Some('(') => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect_char(')')?;
                return Ok(inner);
            }
            None => {
                return Err(ParseError {
                    message: "expected field, number or '(', found end of input".to_string(),
                    position: self.pos,
                });
            }
            _ => {}
        }

        let start = self.pos;
        let word = self.peek_word();
        let is_identifier = word
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if !is_identifier {
            return Err(ParseError {
                message: format!("expected field, number or '(', found '{}'", word),
                position: start,
            });
        }

        if word.eq_ignore_ascii_case("true") {
            self.pos += word.len();
            return Ok(Expr::Bool(true));
        }
        if word.eq_ignore_ascii_case("false") {
            self.pos += word.len();
            return Ok(Expr::Bool(false));
        }

        match MetricField::from_name(&word) {
            Some(field) => {
                self.pos += word.len();
                Ok(Expr::Field(field))
            }
            None => Err(ParseError {
                message: format!("unknown field '{}'", word),
                position: start,
            }),
        }
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after rule: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_comparison() {
        let expr = parse("change_3m_pct > 10").unwrap();
        match expr {
            Expr::Compare { first, rest } => {
                assert_eq!(*first, Expr::Field(MetricField::Change3mPct));
                assert_eq!(rest, vec![(CompareOp::Gt, Expr::Number(10.0))]);
            }
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn parse_all_comparison_operators() {
        for (input, expected) in [
            ("total_weeks < 1", CompareOp::Lt),
            ("total_weeks <= 1", CompareOp::Le),
            ("total_weeks > 1", CompareOp::Gt),
            ("total_weeks >= 1", CompareOp::Ge),
            ("total_weeks == 1", CompareOp::Eq),
            ("total_weeks != 1", CompareOp::Ne),
        ] {
            match parse(input).unwrap() {
                Expr::Compare { rest, .. } => assert_eq!(rest[0].0, expected),
                _ => panic!("expected Compare for {input}"),
            }
        }
    }

    #[test]
    fn parse_case_insensitive_and_or() {
        for input in [
            "change_1w_pct > 1 AND change_2w_pct > 2",
            "change_1w_pct > 1 and change_2w_pct > 2",
            "change_1w_pct > 1 And change_2w_pct > 2",
        ] {
            assert!(matches!(parse(input).unwrap(), Expr::And(ref v) if v.len() == 2));
        }
        assert!(matches!(
            parse("change_1w_pct > 1 oR change_2w_pct > 2").unwrap(),
            Expr::Or(_)
        ));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr =
            parse("change_1w_pct > 1 OR change_2w_pct > 2 AND change_1m_pct > 3").unwrap();
        match expr {
            Expr::Or(operands) => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[1], Expr::And(_)));
            }
            _ => panic!("expected Or at top level"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr =
            parse("(change_1w_pct > 1 OR change_2w_pct > 2) AND change_1m_pct > 3").unwrap();
        match expr {
            Expr::And(operands) => assert!(matches!(operands[0], Expr::Or(_))),
            _ => panic!("expected And at top level"),
        }
    }

    #[test]
    fn parse_not() {
        assert!(matches!(
            parse("NOT linear_r_squared < 0.5").unwrap(),
            Expr::Not(_)
        ));
    }

    #[test]
    fn parse_chained_comparison() {
        match parse("0.5 < linear_r_squared <= 1").unwrap() {
            Expr::Compare { rest, .. } => {
                assert_eq!(rest.len(), 2);
                assert_eq!(rest[0].0, CompareOp::Lt);
                assert_eq!(rest[1].0, CompareOp::Le);
            }
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. })),
            _ => panic!("expected Add at top level"),
        }
    }

    #[test]
    fn power_is_right_associative_and_tighter_than_unary_minus() {
        match parse("-2 ** 2").unwrap() {
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => assert!(matches!(*operand, Expr::Binary { op: BinaryOp::Pow, .. })),
            _ => panic!("expected Neg at top level"),
        }
        match parse("2 ** 3 ** 2").unwrap() {
            Expr::Binary {
                op: BinaryOp::Pow,
                right,
                ..
            } => assert!(matches!(*right, Expr::Binary { op: BinaryOp::Pow, .. })),
            _ => panic!("expected Pow at top level"),
        }
    }

    #[test]
    fn parse_float_and_negative_numbers() {
        match parse("change_1y_pct > -12.5").unwrap() {
            Expr::Compare { rest, .. } => match &rest[0].1 {
                Expr::Unary {
                    op: UnaryOp::Neg,
                    operand,
                } => assert_eq!(**operand, Expr::Number(12.5)),
                other => panic!("unexpected operand {other:?}"),
            },
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn parse_boolean_literals() {
        assert_eq!(parse("true").unwrap(), Expr::Bool(true));
        assert_eq!(parse("FALSE").unwrap(), Expr::Bool(false));
    }

    #[test]
    fn whitespace_handling() {
        assert!(parse("  change_1w_pct   >=   1  ").is_ok());
        assert!(parse("change_1w_pct>=1").is_ok());
    }

    #[test]
    fn error_unknown_field() {
        let err = parse("change_3m_pct > 1 AND bogus_field < 2").unwrap_err();
        assert!(err.message.contains("unknown field 'bogus_field'"));
        assert_eq!(err.position, 22);
    }

    #[test]
    fn error_missing_paren() {
        let err = parse("(change_1w_pct > 1").unwrap_err();
        assert!(err.message.contains("expected ')'"));
    }

    #[test]
    fn error_trailing_input() {
        let err = parse("change_1w_pct > 1 garbage").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn error_dangling_operator() {
        let err = parse("change_1w_pct >").unwrap_err();
        assert!(err.message.contains("expected field, number or '('"));
    }

    #[test]
    fn error_empty_input() {
        let err = parse("").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn keyword_prefix_is_not_a_keyword() {
        // "order" starts with "or" but is not the keyword
        let err = parse("change_1w_pct > 1 order").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn error_display_with_context() {
        let input = "change_1w_pct > > 1";
        let err = parse(input).unwrap_err();
        let ctx = err.display_with_context(input);
        assert!(ctx.contains('^'));
        assert!(ctx.contains("position"));
    }
}
