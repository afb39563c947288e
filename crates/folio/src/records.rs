//! JSON record form of a DataFrame, for caching provider frames.

use folio_core::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A DataFrame as column names plus row-major JSON values.
///
/// `kinds` records each column's type so a rebuilt frame keeps it. Records
/// written without `kinds` fall back to inferring types from the values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct FrameRecords {
    pub(crate) columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) kinds: Vec<ColumnKind>,
    pub(crate) rows: Vec<Vec<Value>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Unit {
    Ns,
    Us,
    Ms,
}

impl From<TimeUnit> for Unit {
    fn from(unit: TimeUnit) -> Self {
        match unit {
            TimeUnit::Nanoseconds => Self::Ns,
            TimeUnit::Microseconds => Self::Us,
            TimeUnit::Milliseconds => Self::Ms,
        }
    }
}

impl From<Unit> for TimeUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Ns => Self::Nanoseconds,
            Unit::Us => Self::Microseconds,
            Unit::Ms => Self::Milliseconds,
        }
    }
}

/// Stored type of a cached column. Integers widen to Int64 and floats to
/// Float64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub(crate) enum ColumnKind {
    Int,
    Float,
    Bool,
    /// Values are days since the Unix epoch.
    Date,
    /// Values are `unit` ticks since the Unix epoch.
    Datetime {
        unit: Unit,
        tz: Option<String>,
    },
    Str,
}

fn float(v: Option<f64>) -> Value {
    v.and_then(Number::from_f64).map_or(Value::Null, Value::Number)
}

fn int_values(col: &Column) -> Result<Vec<Value>> {
    let col = col.cast(&DataType::Int64)?;
    Ok(col.i64()?.iter().map(|v| v.map_or(Value::Null, Value::from)).collect())
}

fn column_values(col: &Column) -> Result<(ColumnKind, Vec<Value>)> {
    let dtype = col.dtype().clone();
    let captured = match &dtype {
        dt if dt.is_integer() => (ColumnKind::Int, int_values(col)?),
        dt if dt.is_float() => {
            let col = col.cast(&DataType::Float64)?;
            (ColumnKind::Float, col.f64()?.iter().map(float).collect())
        }
        DataType::Boolean => (
            ColumnKind::Bool,
            col.bool()?.iter().map(|v| v.map_or(Value::Null, Value::Bool)).collect(),
        ),
        DataType::Date => (ColumnKind::Date, int_values(&col.cast(&DataType::Int32)?)?),
        DataType::Datetime(unit, tz) => (
            ColumnKind::Datetime {
                unit: (*unit).into(),
                tz: tz.as_ref().map(|tz| tz.to_string()),
            },
            int_values(col)?,
        ),
        _ => {
            let col = col.cast(&DataType::String)?;
            let values = col
                .str()?
                .iter()
                .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
                .collect();
            (ColumnKind::Str, values)
        }
    };
    Ok(captured)
}

fn strings(values: &[Value]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect()
}

fn ints(values: &[Value]) -> Vec<Option<i64>> {
    values.iter().map(Value::as_i64).collect()
}

/// Rebuilds a column of a known kind.
fn build_column(name: &str, kind: &ColumnKind, values: &[Value]) -> Result<Column> {
    let name: PlSmallStr = name.into();
    let column = match kind {
        ColumnKind::Int => Column::new(name, ints(values)),
        ColumnKind::Float => {
            let data: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
            Column::new(name, data)
        }
        ColumnKind::Bool => {
            let data: Vec<Option<bool>> = values.iter().map(Value::as_bool).collect();
            Column::new(name, data)
        }
        ColumnKind::Date => {
            let days: Vec<Option<i32>> = values
                .iter()
                .map(|v| v.as_i64().and_then(|d| i32::try_from(d).ok()))
                .collect();
            Column::new(name, days).cast(&DataType::Date)?
        }
        ColumnKind::Datetime { unit, tz } => Column::new(name, ints(values))
            .cast(&DataType::Datetime((*unit).into(), tz.clone().map(Into::into)))?,
        ColumnKind::Str => Column::new(name, strings(values)),
    };
    Ok(column)
}

/// Rebuilds a column from JSON values alone, choosing the narrowest type that
/// holds every non-null value: Int64, Float64, Boolean, then String.
fn infer_column(name: &str, values: &[Value]) -> Column {
    let name: PlSmallStr = name.into();
    let non_null = || values.iter().filter(|v| !v.is_null());

    if non_null().all(Value::is_i64) && non_null().next().is_some() {
        return Column::new(name, ints(values));
    }
    if non_null().all(Value::is_number) {
        let data: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        return Column::new(name, data);
    }
    if non_null().all(Value::is_boolean) {
        let data: Vec<Option<bool>> = values.iter().map(Value::as_bool).collect();
        return Column::new(name, data);
    }
    Column::new(name, strings(values))
}

impl FrameRecords {
    /// Captures `frame` column by column.
    pub(crate) fn from_frame(frame: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let (kinds, per_column): (Vec<ColumnKind>, Vec<Vec<Value>>) = frame
            .get_columns()
            .iter()
            .map(column_values)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        let rows = (0..frame.height())
            .map(|i| per_column.iter().map(|values| values[i].clone()).collect())
            .collect();
        Ok(Self {
            columns,
            kinds,
            rows,
        })
    }

    /// Rebuilds a DataFrame with the recorded column types.
    pub(crate) fn into_frame(self) -> Result<DataFrame> {
        let width = self.columns.len();
        if !self.kinds.is_empty() && self.kinds.len() != width {
            return Err(DataError::Cache(format!(
                "Cached frame has {} column types for {width} columns",
                self.kinds.len()
            )));
        }
        if let Some(bad) = self.rows.iter().position(|row| row.len() != width) {
            return Err(DataError::Cache(format!(
                "Cached frame row {bad} has {} values, expected {width}",
                self.rows[bad].len()
            )));
        }

        let mut per_column: Vec<Vec<Value>> = vec![Vec::with_capacity(self.rows.len()); width];
        for row in self.rows {
            for (i, value) in row.into_iter().enumerate() {
                per_column[i].push(value);
            }
        }
        let columns = if self.kinds.is_empty() {
            self.columns
                .iter()
                .zip(&per_column)
                .map(|(name, values)| infer_column(name, values))
                .collect()
        } else {
            self.columns
                .iter()
                .zip(&self.kinds)
                .zip(&per_column)
                .map(|((name, kind), values)| build_column(name, kind, values))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(DataFrame::new(columns)?)
    }
}
