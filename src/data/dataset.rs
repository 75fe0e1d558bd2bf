//! Columnar dataset

use super::{ColumnKind, Field, Schema, Value};
use crate::error::{ProfileError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage for a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Numeric values; NaN marks a missing value
    Numeric(Array1<f64>),
    /// Level-coded categorical values, `levels` in declaration order
    Categorical { levels: Vec<String>, codes: Vec<usize> },
}

/// A named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a numeric column
    pub fn numeric(name: impl Into<String>, values: impl Into<Array1<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values.into()),
        }
    }

    /// Create a categorical column; levels are taken in first-seen order
    pub fn categorical<S: AsRef<str>>(name: impl Into<String>, values: &[S]) -> Self {
        let mut levels: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let codes = values
            .iter()
            .map(|v| {
                let v = v.as_ref();
                *index.entry(v.to_string()).or_insert_with(|| {
                    levels.push(v.to_string());
                    levels.len() - 1
                })
            })
            .collect();

        Self {
            name: name.into(),
            data: ColumnData::Categorical { levels, codes },
        }
    }

    /// Create a categorical column with an explicit level order
    pub fn categorical_with_levels<S: AsRef<str>>(
        name: impl Into<String>,
        levels: Vec<String>,
        values: &[S],
    ) -> Result<Self> {
        let name = name.into();
        let index: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        if index.len() != levels.len() {
            return Err(ProfileError::InvalidInput(format!(
                "column '{}' declares duplicate levels",
                name
            )));
        }

        let codes = values
            .iter()
            .map(|v| {
                index.get(v.as_ref()).copied().ok_or_else(|| {
                    ProfileError::InvalidInput(format!(
                        "value '{}' is not a declared level of column '{}'",
                        v.as_ref(),
                        name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name,
            data: ColumnData::Categorical { levels, codes },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Categorical { .. } => ColumnKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric values, if this is a numeric column
    pub fn as_numeric(&self) -> Option<&Array1<f64>> {
        match &self.data {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Categorical { .. } => None,
        }
    }

    /// Declared levels, if this is a categorical column
    pub fn levels(&self) -> Option<&[String]> {
        match &self.data {
            ColumnData::Numeric(_) => None,
            ColumnData::Categorical { levels, .. } => Some(levels),
        }
    }

    /// Value at `row`
    pub fn value(&self, row: usize) -> Value {
        match &self.data {
            ColumnData::Numeric(values) => Value::Numeric(values[row]),
            ColumnData::Categorical { levels, codes } => {
                Value::Categorical(levels[codes[row]].clone())
            }
        }
    }

    /// Numeric encoding of `row`: the value itself or the level code
    pub fn encoded(&self, row: usize) -> f64 {
        match &self.data {
            ColumnData::Numeric(values) => values[row],
            ColumnData::Categorical { codes, .. } => codes[row] as f64,
        }
    }

    /// Select rows by position; positions may repeat
    pub fn take(&self, indices: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Numeric(values) => {
                ColumnData::Numeric(indices.iter().map(|&i| values[i]).collect())
            }
            ColumnData::Categorical { levels, codes } => ColumnData::Categorical {
                levels: levels.clone(),
                codes: indices.iter().map(|&i| codes[i]).collect(),
            },
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }

    /// Same values coded against `levels`; levels of this column missing
    /// from `levels` are appended in first-use order. Numeric columns are
    /// returned unchanged.
    pub fn with_levels(&self, levels: &[String]) -> Column {
        let (own, codes) = match &self.data {
            ColumnData::Numeric(_) => return self.clone(),
            ColumnData::Categorical { levels: own, codes } => (own, codes),
        };

        let mut merged = levels.to_vec();
        let index: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        let mut remap: Vec<Option<usize>> = vec![None; own.len()];
        let mut recoded = Vec::with_capacity(codes.len());
        for &code in codes {
            let new_code = match remap[code] {
                Some(c) => c,
                None => {
                    let c = match index.get(own[code].as_str()) {
                        Some(&c) => c,
                        None => {
                            merged.push(own[code].clone());
                            merged.len() - 1
                        }
                    };
                    remap[code] = Some(c);
                    c
                }
            };
            recoded.push(new_code);
        }

        Column {
            name: self.name.clone(),
            data: ColumnData::Categorical {
                levels: merged,
                codes: recoded,
            },
        }
    }
}

/// Incrementally builds a column whose values come from other columns
/// or from grid values.
pub(crate) enum ColumnBuilder {
    Numeric(Vec<f64>),
    Categorical {
        levels: Vec<String>,
        index: HashMap<String, usize>,
        codes: Vec<usize>,
    },
}

impl ColumnBuilder {
    /// Start a builder of the same kind as `template`, seeded with its levels
    pub(crate) fn like(template: &Column, capacity: usize) -> Self {
        match template.data() {
            ColumnData::Numeric(_) => ColumnBuilder::Numeric(Vec::with_capacity(capacity)),
            ColumnData::Categorical { levels, .. } => ColumnBuilder::Categorical {
                levels: levels.clone(),
                index: levels
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (l.clone(), i))
                    .collect(),
                codes: Vec::with_capacity(capacity),
            },
        }
    }

    pub(crate) fn push(&mut self, value: &Value) -> Result<()> {
        match (self, value) {
            (ColumnBuilder::Numeric(values), Value::Numeric(v)) => values.push(*v),
            (
                ColumnBuilder::Categorical {
                    levels,
                    index,
                    codes,
                },
                Value::Categorical(s),
            ) => {
                let code = match index.get(s) {
                    Some(&code) => code,
                    None => {
                        levels.push(s.clone());
                        index.insert(s.clone(), levels.len() - 1);
                        levels.len() - 1
                    }
                };
                codes.push(code);
            }
            (_, value) => {
                return Err(ProfileError::InvalidInput(format!(
                    "cannot store {} value '{}' in this column",
                    value.kind(),
                    value
                )))
            }
        }
        Ok(())
    }

    /// Copy `row` of `source` into the builder
    pub(crate) fn push_from(&mut self, source: &Column, row: usize) -> Result<()> {
        if let ColumnData::Numeric(src) = source.data() {
            if let ColumnBuilder::Numeric(values) = self {
                values.push(src[row]);
                return Ok(());
            }
        }
        self.push(&source.value(row))
    }

    pub(crate) fn finish(self, name: impl Into<String>) -> Column {
        let data = match self {
            ColumnBuilder::Numeric(values) => ColumnData::Numeric(Array1::from(values)),
            ColumnBuilder::Categorical { levels, codes, .. } => {
                ColumnData::Categorical { levels, codes }
            }
        };
        Column {
            name: name.into(),
            data,
        }
    }
}

/// Columnar table with an explicit schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Create a dataset; all columns must share one length and have unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        for column in &columns {
            if column.len() != n_rows {
                return Err(ProfileError::shape(
                    format!("{} rows in column '{}'", n_rows, column.name()),
                    column.len(),
                ));
            }
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name() == column.name()) {
                return Err(ProfileError::InvalidInput(format!(
                    "duplicate column name '{}'",
                    column.name()
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Build an all-numeric dataset from a matrix
    pub fn from_array2<S: AsRef<str>>(names: &[S], x: &Array2<f64>) -> Result<Self> {
        if names.len() != x.ncols() {
            return Err(ProfileError::shape(
                format!("{} column names", x.ncols()),
                names.len(),
            ));
        }
        let columns = names
            .iter()
            .zip(x.columns())
            .map(|(name, col)| Column::numeric(name.as_ref(), col.to_owned()))
            .collect();
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field {
                    name: c.name().to_string(),
                    kind: c.kind(),
                })
                .collect(),
        )
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| ProfileError::FeatureNotFound(name.to_string()))
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    /// Column by position
    pub fn column_at(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    /// Cell value
    pub fn value(&self, row: usize, col: usize) -> Value {
        self.columns[col].value(row)
    }

    /// Full feature vector of a row, in column order
    pub fn row(&self, row: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.value(row)).collect()
    }

    /// Select rows by position; positions may repeat
    pub fn take(&self, indices: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            n_rows: indices.len(),
        }
    }

    /// Replace the column at `idx`, keeping its position
    pub fn with_column(&self, idx: usize, column: Column) -> Result<Dataset> {
        if column.len() != self.n_rows {
            return Err(ProfileError::shape(self.n_rows, column.len()));
        }
        let mut columns = self.columns.clone();
        columns[idx] = column;
        Dataset::new(columns)
    }

    /// Reorder and subset columns to match `schema`
    pub fn select_schema(&self, schema: &Schema) -> Result<Dataset> {
        schema.check_compatible(&self.schema())?;
        let columns = schema
            .fields()
            .iter()
            .map(|f| self.column(&f.name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Dataset::new(columns)
    }

    /// Reorder columns to match `reference` and code every categorical
    /// column on the reference column's levels, so level codes agree with
    /// the reference encoding.
    pub fn conform_to(&self, reference: &Dataset) -> Result<Dataset> {
        let selected = self.select_schema(&reference.schema())?;
        let columns = selected
            .columns
            .iter()
            .zip(&reference.columns)
            .map(|(column, template)| match template.levels() {
                Some(levels) => column.with_levels(levels),
                None => column.clone(),
            })
            .collect();
        Dataset::new(columns)
    }

    /// Dense numeric matrix; categorical columns become level codes
    pub fn to_array2(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.n_rows, self.columns.len()), |(i, j)| {
            self.columns[j].encoded(i)
        })
    }
}
