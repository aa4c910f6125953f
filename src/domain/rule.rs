//! Rule expression AST.
//!
//! - `Expr`: infix boolean/arithmetic expression over metric fields
//! - `BinaryOp`, `CompareOp`, `UnaryOp`: operators
//! - `ValueType`: static type of an expression (number or boolean)

use crate::domain::metrics::MetricField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Field(MetricField),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c` holds when every adjacent pair holds.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Static result type, or a description of the first operand whose type
    /// does not fit its operator.
    pub fn value_type(&self) -> Result<ValueType, String> {
        match self {
            Expr::Number(_) | Expr::Field(_) => Ok(ValueType::Number),
            Expr::Bool(_) => Ok(ValueType::Boolean),
            Expr::Unary { operand, .. } => {
                expect_type(operand, ValueType::Number, "unary sign")?;
                Ok(ValueType::Number)
            }
            Expr::Binary { left, right, .. } => {
                expect_type(left, ValueType::Number, "arithmetic")?;
                expect_type(right, ValueType::Number, "arithmetic")?;
                Ok(ValueType::Number)
            }
            Expr::Compare { first, rest } => {
                expect_type(first, ValueType::Number, "comparison")?;
                for (_, operand) in rest {
                    expect_type(operand, ValueType::Number, "comparison")?;
                }
                Ok(ValueType::Boolean)
            }
            Expr::And(exprs) => {
                for e in exprs {
                    expect_type(e, ValueType::Boolean, "and")?;
                }
                Ok(ValueType::Boolean)
            }
            Expr::Or(exprs) => {
                for e in exprs {
                    expect_type(e, ValueType::Boolean, "or")?;
                }
                Ok(ValueType::Boolean)
            }
            Expr::Not(inner) => {
                expect_type(inner, ValueType::Boolean, "not")?;
                Ok(ValueType::Boolean)
            }
        }
    }
}

fn expect_type(expr: &Expr, expected: ValueType, context: &str) -> Result<(), String> {
    let actual = expr.value_type()?;
    if actual != expected {
        return Err(format!(
            "{} expects {} operands, found {}",
            context,
            type_name(expected),
            type_name(actual)
        ));
    }
    Ok(())
}

pub fn type_name(t: ValueType) -> &'static str {
    match t {
        ValueType::Number => "numeric",
        ValueType::Boolean => "boolean",
    }
}

/// Collect every metric field referenced in `expr`, in first-seen order.
pub fn extract_fields(expr: &Expr) -> Vec<MetricField> {
    let mut fields = Vec::new();
    collect_fields(expr, &mut fields);
    fields
}

fn collect_fields(expr: &Expr, out: &mut Vec<MetricField>) {
    match expr {
        Expr::Number(_) | Expr::Bool(_) => {}
        Expr::Field(f) => {
            if !out.contains(f) {
                out.push(*f);
            }
        }
        Expr::Unary { operand, .. } => collect_fields(operand, out),
        Expr::Binary { left, right, .. } => {
            collect_fields(left, out);
            collect_fields(right, out);
        }
        Expr::Compare { first, rest } => {
            collect_fields(first, out);
            for (_, operand) in rest {
                collect_fields(operand, out);
            }
        }
        Expr::And(exprs) | Expr::Or(exprs) => {
            for e in exprs {
                collect_fields(e, out);
            }
        }
        Expr::Not(inner) => collect_fields(inner, out),
    }
}
