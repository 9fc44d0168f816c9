//! Built-in numeric threshold condition.

use crate::conditions::{AttributeSample, Condition};

/// Relational operator applied against the stored threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl std::str::FromStr for CmpOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" => Ok(CmpOp::Eq),
            "!=" => Ok(CmpOp::Ne),
            ">" => Ok(CmpOp::Gt),
            ">=" => Ok(CmpOp::Ge),
            "<" => Ok(CmpOp::Lt),
            "<=" => Ok(CmpOp::Le),
            other => Err(format!("unknown operator '{}'", other)),
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        };
        write!(f, "{}", s)
    }
}

/// Matches one object-identifier + attribute-name pair and applies a
/// relational operator against a numeric threshold.
///
/// Relational operators (`>`, `>=`, `<`, `<=`) evaluate to false for
/// non-numeric sampled values; `=` and `!=` use value-equality against the
/// numeric view and tolerate non-numeric values.
pub struct SimpleCondition {
    name: String,
    object_canonical: String,
    attr_name: String,
    threshold: f64,
    op: CmpOp,
}

impl SimpleCondition {
    /// `object_name` may be written in any property order; it is matched
    /// canonically.
    pub fn new(object_name: &str, attr_name: &str, threshold: f64, op: CmpOp) -> Self {
        let object_canonical = crate::model::ObjectId::parse(object_name)
            .map(|id| id.canonical())
            .unwrap_or_else(|_| object_name.to_string());
        Self {
            name: format!("{}@{} {} {}", attr_name, object_canonical, op, threshold),
            object_canonical,
            attr_name: attr_name.to_string(),
            threshold,
            op,
        }
    }
}

impl Condition for SimpleCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, sample: &AttributeSample) -> bool {
        if sample.attr().name != self.attr_name
            || sample.object().canonical() != self.object_canonical
        {
            return false;
        }
        let num = sample.value().and_then(|v| v.as_f64());
        match self.op {
            CmpOp::Eq => num == Some(self.threshold),
            CmpOp::Ne => num != Some(self.threshold),
            CmpOp::Gt => num.is_some_and(|v| v > self.threshold),
            CmpOp::Ge => num.is_some_and(|v| v >= self.threshold),
            CmpOp::Lt => num.is_some_and(|v| v < self.threshold),
            CmpOp::Le => num.is_some_and(|v| v <= self.threshold),
        }
    }
}
