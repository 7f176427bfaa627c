//! Condition tree
//!
//! Backend-neutral representation of a stored-event filter. The query
//! layer builds one; each store renders it in its own terms (SQL for
//! SQLite, predicate evaluation for the in-memory store).

use crate::event::StoredEvent;
use std::cmp::Ordering;

/// Fields of a stored event that can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EventType,
    Timestamp,
}

impl Field {
    /// Column name in the persisted representation
    pub fn column(&self) -> &'static str {
        match self {
            Field::EventType => "event_type",
            Field::Timestamp => "timestamp",
        }
    }

    fn extract(&self, event: &StoredEvent) -> Value {
        match self {
            Field::EventType => Value::Text(event.event_type.clone()),
            Field::Timestamp => Value::Int(event.timestamp),
        }
    }
}

/// A literal compared against a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Int(i64),
}

impl Value {
    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gte,
    Lte,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A filter over stored events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Single comparison `field op value`
    Compare {
        field: Field,
        op: Operator,
        value: Value,
    },
    /// Conjunction; an empty conjunction matches everything
    And(Vec<Condition>),
}

impl Condition {
    pub fn eq(field: Field, value: impl Into<Value>) -> Self {
        Self::Compare {
            field,
            op: Operator::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: Field, value: i64) -> Self {
        Self::Compare {
            field,
            op: Operator::Gte,
            value: Value::Int(value),
        }
    }

    pub fn lte(field: Field, value: i64) -> Self {
        Self::Compare {
            field,
            op: Operator::Lte,
            value: Value::Int(value),
        }
    }

    /// Condition that matches every event
    pub fn any() -> Self {
        Self::And(Vec::new())
    }

    /// True if this condition filters nothing out
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::And(parts) => parts.iter().all(Condition::is_empty),
            Condition::Compare { .. } => false,
        }
    }

    /// Evaluate against a stored event
    pub fn matches(&self, event: &StoredEvent) -> bool {
        match self {
            Condition::Compare { field, op, value } => field
                .extract(event)
                .compare(value)
                .map(|ordering| op.holds(ordering))
                .unwrap_or(false),
            Condition::And(parts) => parts.iter().all(|c| c.matches(event)),
        }
    }
}

/// Accumulates sub-conditions into a conjunction
#[derive(Debug, Default)]
pub struct ConditionBuilder {
    parts: Vec<Condition>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        match condition {
            // Flatten nested conjunctions
            Condition::And(parts) => self.parts.extend(parts),
            other => self.parts.push(other),
        }
        self
    }

    pub fn build(self) -> Condition {
        Condition::And(self.parts)
    }
}
