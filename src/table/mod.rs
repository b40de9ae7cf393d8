use serde::{Deserialize, Serialize};

pub mod filter;
pub mod highlight;
pub mod interchange;
pub mod merge;
pub mod tokenize;

pub type Row = Vec<String>;

/// Accumulated table. Row 0 is the header, every other row is data and has
/// exactly as many cells as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Row, data: Vec<Row>) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(header);
        rows.extend(data);
        Self { rows }
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn header(&self) -> &[String] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows.iter().enumerate().skip(1)
    }

    pub fn data_len(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn data_row(&self, index: usize) -> Option<&Row> {
        if index == 0 {
            return None;
        }
        self.rows.get(index)
    }
}
