//! Metadata filter expressions.
//!
//! Filters are written in the usual vector-store JSON dialect:
//!
//! ```json
//! {"$and": [{"is_dir": {"$eq": false}}, {"relative_path": {"$contains": "src/"}}]}
//! ```
//!
//! `{"field": value}` is shorthand for `$eq`. Substring matching on `relative_path` is not part
//! of the native dialect; [`Filter::split_path_contains`] pulls it out so the query engine can
//! apply it after retrieval.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub const PATH_FIELD: &str = "relative_path";

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed filter: {0}")]
    Malformed(String),
    #[error("unknown filter operator `{0}`")]
    UnknownOperator(String),
    #[error("operator `{op}` on `{field}` is not supported by the vector store")]
    Unsupported { field: String, op: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Contains(String),
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq(_) => "$eq",
            Operator::Ne(_) => "$ne",
            Operator::Gt(_) => "$gt",
            Operator::Gte(_) => "$gte",
            Operator::Lt(_) => "$lt",
            Operator::Lte(_) => "$lte",
            Operator::In(_) => "$in",
            Operator::NotIn(_) => "$nin",
            Operator::Contains(_) => "$contains",
        }
    }

    fn parse(name: &str, operand: &Value) -> Result<Self, FilterError> {
        let number = || {
            operand
                .as_f64()
                .ok_or_else(|| FilterError::Malformed(format!("{name} expects a number")))
        };
        let list = || {
            operand
                .as_array()
                .cloned()
                .ok_or_else(|| FilterError::Malformed(format!("{name} expects an array")))
        };
        Ok(match name {
            "$eq" => Operator::Eq(operand.clone()),
            "$ne" => Operator::Ne(operand.clone()),
            "$gt" => Operator::Gt(number()?),
            "$gte" => Operator::Gte(number()?),
            "$lt" => Operator::Lt(number()?),
            "$lte" => Operator::Lte(number()?),
            "$in" => Operator::In(list()?),
            "$nin" => Operator::NotIn(list()?),
            "$contains" => Operator::Contains(
                operand
                    .as_str()
                    .ok_or_else(|| FilterError::Malformed("$contains expects a string".into()))?
                    .to_string(),
            ),
            other => return Err(FilterError::UnknownOperator(other.to_string())),
        })
    }

    fn operand(&self) -> Value {
        match self {
            Operator::Eq(v) | Operator::Ne(v) => v.clone(),
            Operator::Gt(n) | Operator::Gte(n) | Operator::Lt(n) | Operator::Lte(n) => json!(n),
            Operator::In(vs) | Operator::NotIn(vs) => Value::Array(vs.clone()),
            Operator::Contains(s) => Value::String(s.clone()),
        }
    }

    fn evaluate(&self, actual: Option<&Value>) -> bool {
        match self {
            Operator::Eq(v) => actual.is_some_and(|a| values_equal(a, v)),
            Operator::Ne(v) => !actual.is_some_and(|a| values_equal(a, v)),
            Operator::Gt(n) => actual.and_then(Value::as_f64).is_some_and(|a| a > *n),
            Operator::Gte(n) => actual.and_then(Value::as_f64).is_some_and(|a| a >= *n),
            Operator::Lt(n) => actual.and_then(Value::as_f64).is_some_and(|a| a < *n),
            Operator::Lte(n) => actual.and_then(Value::as_f64).is_some_and(|a| a <= *n),
            Operator::In(vs) => actual.is_some_and(|a| vs.iter().any(|v| values_equal(a, v))),
            Operator::NotIn(vs) => !actual.is_some_and(|a| vs.iter().any(|v| values_equal(a, v))),
            Operator::Contains(needle) => actual
                .and_then(Value::as_str)
                .is_some_and(|s| s.contains(needle.as_str())),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub op: Operator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Field(FieldCondition),
}

impl Filter {
    pub fn field(field: impl Into<String>, op: Operator) -> Self {
        Filter::Field(FieldCondition {
            field: field.into(),
            op,
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, Operator::Eq(value.into()))
    }

    pub fn path_contains(needle: impl Into<String>) -> Self {
        Self::field(PATH_FIELD, Operator::Contains(needle.into()))
    }

    /// Collapses single-child conjunctions.
    pub fn and(mut children: Vec<Filter>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Filter::And(children)
        }
    }

    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        let obj = value
            .as_object()
            .ok_or_else(|| FilterError::Malformed("expected a JSON object".into()))?;
        if obj.is_empty() {
            return Err(FilterError::Malformed("empty filter object".into()));
        }

        let mut children = Vec::with_capacity(obj.len());
        for (key, body) in obj {
            if key == "$and" {
                let items = body
                    .as_array()
                    .ok_or_else(|| FilterError::Malformed("$and expects an array".into()))?;
                if items.is_empty() {
                    return Err(FilterError::Malformed("$and needs at least one condition".into()));
                }
                let parsed = items
                    .iter()
                    .map(Filter::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                children.push(Filter::and(parsed));
            } else if key.starts_with('$') {
                return Err(FilterError::UnknownOperator(key.clone()));
            } else {
                children.push(parse_field(key, body)?);
            }
        }
        Ok(Filter::and(children))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::And(children) => {
                json!({ "$and": children.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
            Filter::Field(cond) => {
                let mut inner = Map::new();
                inner.insert(cond.op.name().to_string(), cond.op.operand());
                let mut outer = Map::new();
                outer.insert(cond.field.clone(), Value::Object(inner));
                Value::Object(outer)
            }
        }
    }

    /// Removes every `relative_path $contains` leaf, returning the native remainder and the
    /// extracted substrings. All extracted substrings must match (conjunction).
    pub fn split_path_contains(self) -> (Option<Filter>, Vec<String>) {
        let mut needles = Vec::new();
        let rest = strip_path_contains(self, &mut needles);
        (rest, needles)
    }

    /// Evaluates the filter against a metadata record. Missing fields fail every operator
    /// except `$ne` and `$nin`.
    pub fn matches(&self, metadata: &HashMap<String, Value>) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|c| c.matches(metadata)),
            Filter::Field(cond) => cond.op.evaluate(metadata.get(&cond.field)),
        }
    }

    /// Fails on operators the vector stores cannot evaluate natively.
    pub fn ensure_native(&self) -> Result<(), FilterError> {
        match self {
            Filter::And(children) => children.iter().try_for_each(Filter::ensure_native),
            Filter::Field(FieldCondition {
                field,
                op: op @ Operator::Contains(_),
            }) => Err(FilterError::Unsupported {
                field: field.clone(),
                op: op.name(),
            }),
            Filter::Field(_) => Ok(()),
        }
    }

    /// Qdrant `filter` object (`must` / `must_not` clauses over payload keys).
    pub fn to_qdrant(&self) -> Result<Value, FilterError> {
        self.ensure_native()?;
        let mut must = Vec::new();
        let mut must_not = Vec::new();
        collect_qdrant(self, &mut must, &mut must_not);
        let mut out = Map::new();
        if !must.is_empty() {
            out.insert("must".into(), Value::Array(must));
        }
        if !must_not.is_empty() {
            out.insert("must_not".into(), Value::Array(must_not));
        }
        Ok(Value::Object(out))
    }
}

fn parse_field(field: &str, body: &Value) -> Result<Filter, FilterError> {
    match body {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            let conds = ops
                .iter()
                .map(|(name, operand)| Ok(Filter::field(field, Operator::parse(name, operand)?)))
                .collect::<Result<Vec<_>, FilterError>>()?;
            Ok(Filter::and(conds))
        }
        Value::Object(_) | Value::Array(_) => Err(FilterError::Malformed(format!(
            "condition on `{field}` must be a scalar or an operator object"
        ))),
        scalar => Ok(Filter::eq(field, scalar.clone())),
    }
}

fn strip_path_contains(filter: Filter, needles: &mut Vec<String>) -> Option<Filter> {
    match filter {
        Filter::Field(FieldCondition {
            field,
            op: Operator::Contains(needle),
        }) if field == PATH_FIELD => {
            needles.push(needle);
            None
        }
        Filter::And(children) => {
            let kept: Vec<Filter> = children
                .into_iter()
                .filter_map(|c| strip_path_contains(c, needles))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Filter::and(kept))
            }
        }
        other => Some(other),
    }
}

fn collect_qdrant(filter: &Filter, must: &mut Vec<Value>, must_not: &mut Vec<Value>) {
    match filter {
        Filter::And(children) => {
            for child in children {
                collect_qdrant(child, must, must_not);
            }
        }
        Filter::Field(FieldCondition { field, op }) => match op {
            Operator::Eq(v) => must.push(json!({"key": field, "match": {"value": v}})),
            Operator::Ne(v) => must_not.push(json!({"key": field, "match": {"value": v}})),
            Operator::In(vs) => must.push(json!({"key": field, "match": {"any": vs}})),
            Operator::NotIn(vs) => must.push(json!({"key": field, "match": {"except": vs}})),
            Operator::Gt(n) => must.push(json!({"key": field, "range": {"gt": n}})),
            Operator::Gte(n) => must.push(json!({"key": field, "range": {"gte": n}})),
            Operator::Lt(n) => must.push(json!({"key": field, "range": {"lt": n}})),
            Operator::Lte(n) => must.push(json!({"key": field, "range": {"lte": n}})),
            Operator::Contains(_) => {}
        },
    }
}
