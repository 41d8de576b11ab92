//! Design and response sheets.
//!
//! A [`Sheet`] is an ordered set of named numeric columns of equal length.
//! Design sheets hold one column per factor in natural units; response sheets
//! hold one column per measured response. Row `i` of a response sheet belongs
//! to row `i` of the design sheet it was measured on.

use serde::{Deserialize, Serialize};
use std::io;

use crate::errors::{DpError, DpResult};
use crate::validation_error;

/// Ordered, named, column-major table of `f64` values.
///
/// Deserialization goes through [`Sheet::from_columns`], so ragged or
/// duplicate columns are rejected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSheet")]
pub struct Sheet {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct RawSheet {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl TryFrom<RawSheet> for Sheet {
    type Error = DpError;

    fn try_from(raw: RawSheet) -> DpResult<Self> {
        Self::from_columns(raw.columns, raw.data)
    }
}

/// Experiment plan in natural units, one column per factor.
pub type DesignSheet = Sheet;

/// Measured responses, one column per response, row-aligned with a design.
pub type ResponseSheet = Sheet;

impl Sheet {
    /// Build a sheet from column names and per-column values.
    pub fn from_columns(columns: Vec<String>, data: Vec<Vec<f64>>) -> DpResult<Self> {
        if columns.len() != data.len() {
            return Err(validation_error!(
                "{} column names for {} columns",
                columns.len(),
                data.len()
            ));
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(validation_error!("duplicate column name: {}", name));
            }
        }
        if let Some(first) = data.first() {
            if let Some((name, col)) = columns
                .iter()
                .zip(&data)
                .find(|(_, col)| col.len() != first.len())
            {
                return Err(validation_error!(
                    "column {} has {} rows, expected {}",
                    name,
                    col.len(),
                    first.len()
                ));
            }
        }
        Ok(Self { columns, data })
    }

    /// Build a sheet from column names and row-major values.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> DpResult<Self> {
        let mut data = vec![Vec::with_capacity(rows.len()); columns.len()];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(validation_error!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    columns.len()
                ));
            }
            for (col, value) in data.iter_mut().zip(row) {
                col.push(*value);
            }
        }
        Self::from_columns(columns, data)
    }

    /// Single-column sheet, the common shape of a response sheet.
    pub fn single(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            columns: vec![name.into()],
            data: vec![values],
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
    }

    pub fn column_at(&self, index: usize) -> Option<&[f64]> {
        self.data.get(index).map(Vec::as_slice)
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name).and_then(|col| col.get(row).copied())
    }

    /// Copy of row `index` in column order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.n_rows() {
            return None;
        }
        Some(self.data.iter().map(|col| col[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.n_rows()).map(move |i| self.data.iter().map(|col| col[i]).collect())
    }

    /// Write the sheet as CSV with a header row.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> DpResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in self.rows() {
            wtr.write_record(row.iter().map(|v| v.to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> DpResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| validation_error!("CSV output is not UTF-8: {}", e))
    }

    /// Parse a CSV table with a header row into a sheet.
    pub fn from_csv_reader<R: io::Read>(reader: R) -> DpResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|e| {
                        validation_error!("line {}: invalid number {:?}: {}", line + 2, field, e)
                    })
                })
                .collect::<DpResult<Vec<f64>>>()?;
            rows.push(row);
        }
        Self::from_rows(columns, &rows)
    }
}
