//! Tabular data model
//!
//! Provides the typed, columnar table every explanation operates on:
//! - Scalar cell values (numeric or categorical)
//! - An explicit schema of named, typed columns
//! - A columnar [`Dataset`] with level-coded categorical columns
//! - Conversion from polars `DataFrame`s

mod dataset;
mod frame;

pub use dataset::{Column, ColumnData, Dataset};

pub(crate) use dataset::ColumnBuilder;

use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

impl Value {
    /// Kind of column this value belongs in
    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::Numeric(_) => ColumnKind::Numeric,
            Value::Categorical(_) => ColumnKind::Categorical,
        }
    }

    /// Numeric payload, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Categorical(_) => None,
        }
    }

    /// Categorical payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Numeric(_) => None,
            Value::Categorical(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Categorical(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Numeric(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Categorical(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Categorical(s)
    }
}

/// A named, typed column description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered list of fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in schema order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| ProfileError::FeatureNotFound(name.to_string()))
    }

    /// Field by name
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.index_of(name).map(|idx| &self.fields[idx])
    }

    /// Resolve an optional variable selection into column positions.
    ///
    /// `None` selects every column in schema order. A selection keeps the
    /// caller's order, drops duplicates, and fails on the first name that
    /// is not part of the schema.
    pub fn resolve<S: AsRef<str>>(&self, variables: Option<&[S]>) -> Result<Vec<usize>> {
        match variables {
            None => Ok((0..self.fields.len()).collect()),
            Some(names) => {
                let mut indices = Vec::with_capacity(names.len());
                for name in names {
                    let idx = self.index_of(name.as_ref())?;
                    if !indices.contains(&idx) {
                        indices.push(idx);
                    }
                }
                if indices.is_empty() {
                    return Err(ProfileError::InvalidInput(
                        "variable selection is empty".to_string(),
                    ));
                }
                Ok(indices)
            }
        }
    }

    /// Check that `other` carries every field of this schema with the same kind
    pub fn check_compatible(&self, other: &Schema) -> Result<()> {
        for field in &self.fields {
            let theirs = other.field(&field.name)?;
            if theirs.kind != field.kind {
                return Err(ProfileError::InvalidInput(format!(
                    "column '{}' is {} but {} was expected",
                    field.name, theirs.kind, field.kind
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            Field { name: "age".into(), kind: ColumnKind::Numeric },
            Field { name: "city".into(), kind: ColumnKind::Categorical },
        ])
    }

    #[test]
    fn test_resolve_all_columns() {
        let s = schema();
        assert_eq!(s.resolve::<&str>(None).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_resolve_keeps_order_and_dedups() {
        let s = schema();
        assert_eq!(s.resolve(Some(&["city", "age", "city"][..])).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_resolve_unknown_variable() {
        let s = schema();
        let err = s.resolve(Some(&["height"][..])).unwrap_err();
        assert!(matches!(err, ProfileError::FeatureNotFound(name) if name == "height"));
    }

    #[test]
    fn test_check_compatible_kind_mismatch() {
        let s = schema();
        let other = Schema::new(vec![
            Field { name: "age".into(), kind: ColumnKind::Categorical },
            Field { name: "city".into(), kind: ColumnKind::Categorical },
        ]);
        assert!(matches!(
            s.check_compatible(&other),
            Err(ProfileError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from("north").to_string(), "north");
    }
}
