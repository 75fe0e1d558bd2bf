//! Conversion from polars data frames

use super::{Column, Dataset};
use crate::error::{ProfileError, Result};
use polars::prelude::{DataFrame, DataType};

impl Dataset {
    /// Convert a polars `DataFrame`.
    ///
    /// Integer and float columns become numeric columns (nulls become NaN),
    /// string columns become categorical columns with first-seen levels.
    /// Any other dtype, or a null in a string column, is rejected.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());

        for col in df.get_columns() {
            let name = col.name().to_string();

            match col.dtype() {
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
                DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
                DataType::Float32 | DataType::Float64 => {
                    let casted = col.cast(&DataType::Float64)?;
                    let values: Vec<f64> = casted
                        .f64()?
                        .into_iter()
                        .map(|v| v.unwrap_or(f64::NAN))
                        .collect();
                    columns.push(Column::numeric(name, values));
                }
                DataType::String => {
                    let values = col
                        .str()?
                        .into_iter()
                        .map(|v| {
                            v.map(str::to_string).ok_or_else(|| {
                                ProfileError::DataError(format!(
                                    "column '{}' contains missing categorical values",
                                    name
                                ))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    columns.push(Column::categorical(name, &values));
                }
                other => {
                    return Err(ProfileError::DataError(format!(
                        "column '{}' has unsupported dtype {}",
                        name, other
                    )));
                }
            }
        }

        Dataset::new(columns)
    }
}
