use super::Table;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSet {
    rows: BTreeSet<usize>,
}

impl HighlightSet {
    pub fn after_merge(old: &Table, new: &Table) -> Self {
        let old_count = old.data_len();
        let new_count = new.data_len();
        Self {
            rows: (old_count + 1..=new_count).collect(),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.rows.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }

    pub fn undo(&mut self, table: &Table) -> Table {
        let rows = table
            .rows()
            .iter()
            .enumerate()
            .filter(|(index, _)| *index == 0 || !self.rows.contains(index))
            .map(|(_, row)| row.clone())
            .collect();
        self.rows.clear();
        Table::from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::HighlightSet;
    use crate::table::merge::merge;
    use crate::table::Table;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    fn table_with(count: usize) -> Table {
        let data = (1..=count).map(|n| vec![n.to_string()]).collect();
        Table::new(row(&["n"]), data)
    }

    #[test]
    fn highlights_exactly_the_appended_rows() {
        let old = table_with(3);
        let new = merge("n\n4\n5", &old);
        let highlights = HighlightSet::after_merge(&old, &new);
        assert_eq!(highlights.iter().collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn first_merge_into_empty_table_highlights_from_one() {
        let old = Table::default();
        let new = merge("a,b\n1,2\n3,4", &old);
        let highlights = HighlightSet::after_merge(&old, &new);
        assert_eq!(highlights.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn no_new_rows_means_empty_highlights() {
        let old = table_with(2);
        let new = merge("n", &old);
        assert!(HighlightSet::after_merge(&old, &new).is_empty());
    }

    #[test]
    fn undo_restores_the_rows_before_the_merge() {
        let old = table_with(2);
        let new = merge("7\n8\n9", &old);
        let mut highlights = HighlightSet::after_merge(&old, &new);
        assert_eq!(highlights.len(), 3);

        let restored = highlights.undo(&new);
        assert_eq!(restored, old);
        assert!(highlights.is_empty());
    }

    #[test]
    fn undo_keeps_the_header_of_a_fresh_table() {
        let old = Table::default();
        let new = merge("a\n1", &old);
        let mut highlights = HighlightSet::after_merge(&old, &new);
        let restored = highlights.undo(&new);
        assert_eq!(restored, Table::new(row(&["a"]), Vec::new()));
    }
}
