use super::{Row, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilterSet {
    excludes: BTreeMap<String, BTreeSet<String>>,
}

impl ColumnFilterSet {
    pub fn is_empty(&self) -> bool {
        self.excludes.is_empty()
    }

    pub fn exclude(&mut self, column: impl Into<String>, value: impl Into<String>) -> bool {
        self.excludes
            .entry(column.into())
            .or_default()
            .insert(value.into())
    }

    pub fn remove(&mut self, column: &str, value: &str) -> bool {
        let Some(values) = self.excludes.get_mut(column) else {
            return false;
        };
        let removed = values.remove(value);
        if values.is_empty() {
            self.excludes.remove(column);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.excludes.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.excludes.iter().flat_map(|(column, values)| {
            values
                .iter()
                .map(move |value| (column.as_str(), value.as_str()))
        })
    }

    fn excludes_row(&self, header: &[String], row: &Row) -> bool {
        self.excludes.iter().any(|(column, values)| {
            let Some(index) = header.iter().position(|name| name == column) else {
                return false;
            };
            let cell = row.get(index).map(String::as_str).unwrap_or_default();
            values
                .iter()
                .any(|value| cell.to_lowercase() == value.to_lowercase())
        })
    }
}

fn matches_search(row: &Row, needle: &str) -> bool {
    row.iter().any(|cell| cell.to_lowercase().contains(needle))
}

pub fn visible_indices(table: &Table, filters: &ColumnFilterSet, search: &str) -> Vec<usize> {
    let header = table.header();
    let needle = search.to_lowercase();
    table
        .data_rows()
        .filter(|(_, row)| !filters.excludes_row(header, row) && matches_search(row, &needle))
        .map(|(index, _)| index)
        .collect()
}

pub fn visible_rows(table: &Table, filters: &ColumnFilterSet, search: &str) -> Table {
    let rows = visible_indices(table, filters, search)
        .into_iter()
        .filter_map(|index| table.data_row(index).cloned())
        .collect();
    Table::new(table.header().to_vec(), rows)
}
