//! Rule compilation and evaluation against [`StockMetrics`].
//!
//! # Evaluation Semantics
//!
//! - `and` / `or` short-circuit
//! - Chained comparisons hold only if every adjacent pair holds
//! - Any comparison involving NaN is false
//! - Division and modulo by zero produce NaN rather than failing
//! - `%` takes the sign of the divisor

use crate::domain::error::TrendpickError;
use crate::domain::metrics::{MetricField, StockMetrics};
use crate::domain::rule::{extract_fields, type_name, BinaryOp, CompareOp, Expr, UnaryOp, ValueType};
use crate::domain::rule_parser;

const EPSILON: f64 = 1e-9;

/// A parsed, type-checked rule ready to be applied to metrics.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    source: String,
    expr: Expr,
    fields: Vec<MetricField>,
}

impl CompiledRule {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn referenced_fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn matches(&self, metrics: &StockMetrics) -> bool {
        evaluate(&self.expr, metrics)
    }
}

/// Parse and type-check `rule_text`. The rule must produce a boolean.
pub fn compile(rule_text: &str) -> Result<CompiledRule, TrendpickError> {
    let expr = rule_parser::parse(rule_text)?;
    let value_type = expr
        .value_type()
        .map_err(|reason| TrendpickError::RuleInvalid { reason })?;
    if value_type != ValueType::Boolean {
        return Err(TrendpickError::RuleInvalid {
            reason: format!(
                "rule '{}' evaluates to a {} value; use comparison operators like >, <, ==",
                rule_text,
                type_name(value_type)
            ),
        });
    }
    let fields = extract_fields(&expr);
    Ok(CompiledRule {
        source: rule_text.to_string(),
        expr,
        fields,
    })
}

/// Metric field names mentioned in `rule_text`, first-seen order, no
/// duplicates. Works on any text, including rules that fail to compile.
pub fn extract_referenced_fields(rule_text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut word = String::new();

    for ch in rule_text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            push_known_field(&mut word, &mut found);
        }
    }
    push_known_field(&mut word, &mut found);
    found
}

fn push_known_field(word: &mut String, found: &mut Vec<String>) {
    if let Some(field) = MetricField::from_name(word) {
        let name = field.name().to_string();
        if !found.contains(&name) {
            found.push(name);
        }
    }
    word.clear();
}

pub fn evaluate(expr: &Expr, metrics: &StockMetrics) -> bool {
    match expr {
        Expr::Bool(b) => *b,
        Expr::Compare { first, rest } => {
            let mut left = resolve_number(first, metrics);
            for (op, operand) in rest {
                let right = resolve_number(operand, metrics);
                if !compare(*op, left, right) {
                    return false;
                }
                left = right;
            }
            true
        }
        Expr::And(exprs) => {
            for e in exprs {
                if !evaluate(e, metrics) {
                    return false;
                }
            }
            true
        }
        Expr::Or(exprs) => {
            for e in exprs {
                if evaluate(e, metrics) {
                    return true;
                }
            }
            false
        }
        Expr::Not(inner) => !evaluate(inner, metrics),
        // numeric nodes are rejected by the type check at compile time
        Expr::Number(_) | Expr::Field(_) | Expr::Unary { .. } | Expr::Binary { .. } => {
            resolve_number(expr, metrics) != 0.0
        }
    }
}

fn compare(op: CompareOp, left: f64, right: f64) -> bool {
    if left.is_nan() || right.is_nan() {
        return false;
    }
    match op {
        CompareOp::Lt => left < right,
        CompareOp::Le => left <= right,
        CompareOp::Gt => left > right,
        CompareOp::Ge => left >= right,
        CompareOp::Eq => (left - right).abs() < EPSILON,
        CompareOp::Ne => (left - right).abs() >= EPSILON,
    }
}

fn resolve_number(expr: &Expr, metrics: &StockMetrics) -> f64 {
    match expr {
        Expr::Number(v) => *v,
        Expr::Field(field) => metrics.field(*field),
        Expr::Unary { op, operand } => {
            let v = resolve_number(operand, metrics);
            match op {
                UnaryOp::Neg => -v,
                UnaryOp::Pos => v,
            }
        }
        Expr::Binary { op, left, right } => {
            let l = resolve_number(left, metrics);
            let r = resolve_number(right, metrics);
            match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => {
                    if r == 0.0 {
                        f64::NAN
                    } else {
                        l / r
                    }
                }
                BinaryOp::Rem => {
                    if r == 0.0 {
                        f64::NAN
                    } else {
                        l - r * (l / r).floor()
                    }
                }
                BinaryOp::Pow => l.powf(r),
            }
        }
        Expr::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Expr::Compare { .. } | Expr::And(_) | Expr::Or(_) | Expr::Not(_) => {
            if evaluate(expr, metrics) {
                1.0
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> StockMetrics {
        StockMetrics {
            symbol: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            total_weeks: 52,
            linear_slope_pct: 0.8,
            linear_r_squared: 0.92,
            log_slope: 0.007,
            log_r_squared: 0.9,
            change_1w_pct: 1.5,
            change_2w_pct: 2.5,
            change_1m_pct: 4.0,
            change_3m_pct: 12.0,
            change_6m_pct: 20.0,
            change_1y_pct: 35.0,
            max_jump_1w_pct: 6.0,
            max_drop_1w_pct: 4.0,
            max_jump_2w_pct: 9.0,
            max_drop_2w_pct: 7.0,
            max_jump_4w_pct: 14.0,
            max_drop_4w_pct: 10.0,
        }
    }

    fn eval(rule: &str) -> bool {
        compile(rule).unwrap().matches(&sample())
    }

    #[test]
    fn simple_comparisons() {
        assert!(eval("change_3m_pct > 10"));
        assert!(!eval("change_3m_pct > 12"));
        assert!(eval("change_3m_pct >= 12"));
        assert!(eval("total_weeks == 52"));
        assert!(eval("total_weeks != 51"));
    }

    #[test]
    fn and_or_not() {
        assert!(eval("change_3m_pct > 10 AND linear_r_squared > 0.9"));
        assert!(!eval("change_3m_pct > 10 AND linear_r_squared > 0.95"));
        assert!(eval("change_3m_pct > 50 or linear_r_squared > 0.9"));
        assert!(eval("not change_3m_pct > 50"));
    }

    #[test]
    fn arithmetic_between_fields() {
        assert!(eval("max_jump_1w_pct - max_drop_1w_pct == 2"));
        assert!(eval("change_1y_pct / change_6m_pct > 1.7"));
        assert!(eval("2 ** 3 == 8"));
        assert!(eval("-2 ** 2 == -4"));
        assert!(eval("7 % 3 == 1"));
        assert!(eval("-7 % 3 == 2"));
    }

    #[test]
    fn chained_comparison() {
        assert!(eval("0.9 < linear_r_squared < 1"));
        assert!(!eval("0.95 < linear_r_squared < 1"));
    }

    #[test]
    fn division_by_zero_is_false_not_panic() {
        assert!(!eval("change_1y_pct / 0 > 1"));
        assert!(!eval("change_1y_pct / 0 < 1"));
    }

    #[test]
    fn numeric_rule_is_rejected() {
        let err = compile("change_3m_pct + 1").unwrap_err();
        assert!(matches!(err, TrendpickError::RuleInvalid { .. }));
        assert!(err.to_string().contains("numeric"));
    }

    #[test]
    fn mixed_boolean_operand_is_rejected() {
        let err = compile("change_3m_pct > 1 AND change_1m_pct").unwrap_err();
        assert!(matches!(err, TrendpickError::RuleInvalid { .. }));
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let err = compile("symbol == 1").unwrap_err();
        assert!(matches!(err, TrendpickError::RuleParse(_)));
    }

    #[test]
    fn compiled_rule_exposes_source_and_fields() {
        let rule = compile("change_3m_pct > 1 AND max_drop_2w_pct < 15 AND change_3m_pct < 50").unwrap();
        assert_eq!(rule.source(), "change_3m_pct > 1 AND max_drop_2w_pct < 15 AND change_3m_pct < 50");
        assert_eq!(
            rule.referenced_fields(),
            vec!["change_3m_pct".to_string(), "max_drop_2w_pct".to_string()]
        );
    }

    #[test]
    fn extract_fields_from_text() {
        let fields = extract_referenced_fields("change_3m_pct > 1 AND linear_r_squared > 0.8");
        assert_eq!(fields, vec!["change_3m_pct", "linear_r_squared"]);
    }

    #[test]
    fn extract_fields_ignores_unknown_and_invalid_text() {
        let fields = extract_referenced_fields("foo > 1 and ((( linear_r_squared");
        assert_eq!(fields, vec!["linear_r_squared"]);
        assert!(extract_referenced_fields("").is_empty());
    }
}
