use std::cmp::Ordering;
use std::ops::Not;

use crate::document::{Document, FieldPath, Value};
use crate::error::PathError;

/// A filter over document fields.
///
/// Leaves compare the value at a field path; `And`/`Or`/`Not` combine them.
/// A field path that does not resolve against a document makes the leaf
/// false for that document. Range comparisons between values of different
/// kinds (or of unordered kinds) are false as well.
///
/// ```
/// use memodocs::Predicate;
///
/// let adults_named_alice = Predicate::gte("age", 18).and(Predicate::eq("name", "Alice"));
/// let missing_email = !Predicate::exists("contact.email");
/// # let _ = (adults_named_alice, missing_email);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(FieldPath, Value),
    /// The field exists and differs from the value.
    Ne(FieldPath, Value),
    Gt(FieldPath, Value),
    Gte(FieldPath, Value),
    Lt(FieldPath, Value),
    Lte(FieldPath, Value),
    In(FieldPath, Vec<Value>),
    Exists(FieldPath),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Predicate::Eq(path.into(), value.into())
    }

    pub fn ne(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Predicate::Ne(path.into(), value.into())
    }

    pub fn gt(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Predicate::Gt(path.into(), value.into())
    }

    pub fn gte(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Predicate::Gte(path.into(), value.into())
    }

    pub fn lt(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Predicate::Lt(path.into(), value.into())
    }

    pub fn lte(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        Predicate::Lte(path.into(), value.into())
    }

    pub fn in_set<V: Into<Value>>(
        path: impl Into<FieldPath>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn exists(path: impl Into<FieldPath>) -> Self {
        Predicate::Exists(path.into())
    }

    /// Conjunction of all `predicates`. An empty conjunction matches everything.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::And(predicates.into_iter().collect())
    }

    /// Disjunction of all `predicates`. An empty disjunction matches nothing.
    pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Or(predicates.into_iter().collect())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut children) => {
                children.push(other);
                Predicate::And(children)
            }
            this => Predicate::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut children) => {
                children.push(other);
                Predicate::Or(children)
            }
            this => Predicate::Or(vec![this, other]),
        }
    }

    /// Check every field path in the tree is well formed.
    pub fn check_paths(&self) -> Result<(), PathError> {
        match self {
            Predicate::Eq(p, _)
            | Predicate::Ne(p, _)
            | Predicate::Gt(p, _)
            | Predicate::Gte(p, _)
            | Predicate::Lt(p, _)
            | Predicate::Lte(p, _)
            | Predicate::In(p, _)
            | Predicate::Exists(p) => p.check(),
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().try_for_each(Predicate::check_paths)
            }
            Predicate::Not(inner) => inner.check_paths(),
        }
    }

    /// Evaluate against one document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::Eq(path, value) => doc.resolve(path).is_ok_and(|v| v == value),
            Predicate::Ne(path, value) => doc.resolve(path).is_ok_and(|v| v != value),
            Predicate::Gt(path, value) => ordered(doc, path, value, |o| o == Ordering::Greater),
            Predicate::Gte(path, value) => ordered(doc, path, value, |o| o != Ordering::Less),
            Predicate::Lt(path, value) => ordered(doc, path, value, |o| o == Ordering::Less),
            Predicate::Lte(path, value) => ordered(doc, path, value, |o| o != Ordering::Greater),
            Predicate::In(path, values) => doc.resolve(path).is_ok_and(|v| values.contains(v)),
            Predicate::Exists(path) => doc.resolve(path).is_ok(),
            Predicate::And(children) => children.iter().all(|p| p.matches(doc)),
            Predicate::Or(children) => children.iter().any(|p| p.matches(doc)),
            Predicate::Not(inner) => !inner.matches(doc),
        }
    }
}

fn ordered(doc: &Document, path: &FieldPath, value: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    doc.resolve(path)
        .ok()
        .and_then(|v| v.compare(value))
        .is_some_and(accept)
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::Not(inner) => *inner,
            this => Predicate::Not(Box::new(this)),
        }
    }
}
