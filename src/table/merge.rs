use super::tokenize::tokenize_document;
use super::{Row, Table};
use tracing::debug;

/// The first incoming line is a header when the table has no header yet or
/// when it shares at least one column name with the current header. Existing
/// rows are copied by position into the widened header; incoming rows are
/// placed by column name.
pub fn merge(raw: &str, current: &Table) -> Table {
    let lines = tokenize_document(raw);
    let Some(first) = lines.first() else {
        return current.clone();
    };

    let existing_header = current.header();
    let first_is_header = current.is_empty() || shares_column(existing_header, first);

    let (incoming_header, incoming_rows): (&[String], &[Row]) = if first_is_header {
        (first.as_slice(), &lines[1..])
    } else {
        (existing_header, &lines[..])
    };

    let header = merged_header(existing_header, incoming_header);

    let mut rows = Vec::with_capacity(current.data_len() + incoming_rows.len());
    rows.extend(
        current
            .data_rows()
            .map(|(_, row)| widen_row(row, existing_header.len(), header.len())),
    );
    rows.extend(
        incoming_rows
            .iter()
            .map(|row| map_row_by_name(row, incoming_header, &header)),
    );

    debug!(
        first_is_header,
        columns = header.len(),
        appended = incoming_rows.len(),
        "merged csv block"
    );

    Table::new(header, rows)
}

fn shares_column(header: &[String], candidate: &[String]) -> bool {
    header.iter().any(|column| candidate.contains(column))
}

fn merged_header(existing: &[String], incoming: &[String]) -> Row {
    let mut header: Row = Vec::with_capacity(existing.len() + incoming.len());
    for column in existing.iter().chain(incoming) {
        if !header.contains(column) {
            header.push(column.clone());
        }
    }
    header
}

// Existing columns keep their ordinal positions in the merged header, so old
// rows are copied positionally and padded for the appended columns.
fn widen_row(row: &Row, old_width: usize, new_width: usize) -> Row {
    (0..new_width)
        .map(|index| {
            if index < old_width {
                row.get(index).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .collect()
}

fn map_row_by_name(row: &Row, incoming_header: &[String], header: &[String]) -> Row {
    header
        .iter()
        .map(|column| {
            incoming_header
                .iter()
                .position(|name| name == column)
                .and_then(|index| row.get(index))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::merge;
    use crate::table::Table;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    fn alice_table() -> Table {
        Table::new(row(&["name"]), vec![row(&["Alice"])])
    }

    #[test]
    fn first_block_becomes_header_and_data() {
        let table = merge("name,age\nBob,30\nCarol,41", &Table::default());
        assert_eq!(table.header(), row(&["name", "age"]).as_slice());
        assert_eq!(table.data_len(), 2);
        assert_eq!(table.data_row(2), Some(&row(&["Carol", "41"])));
    }

    #[test]
    fn blank_response_leaves_table_unchanged() {
        let table = alice_table();
        assert_eq!(merge("", &table), table);
        assert_eq!(merge("  \n \n", &table), table);
    }

    #[test]
    fn repeated_header_alone_is_a_no_op() {
        let table = Table::new(row(&["name", "age"]), vec![row(&["Alice", "30"])]);
        assert_eq!(merge("name,age", &table), table);
    }

    #[test]
    fn shared_header_introduces_new_columns() {
        let table = merge("name,age\nBob,30", &alice_table());
        assert_eq!(table.header(), row(&["name", "age"]).as_slice());
        assert_eq!(table.data_row(1), Some(&row(&["Alice", ""])));
        assert_eq!(table.data_row(2), Some(&row(&["Bob", "30"])));
    }

    #[test]
    fn line_without_shared_column_is_appended_as_data() {
        let table = merge("name,age\nBob,30", &alice_table());
        let table = merge("Carol,40", &table);
        assert_eq!(table.header(), row(&["name", "age"]).as_slice());
        assert_eq!(table.data_len(), 3);
        assert_eq!(table.data_row(3), Some(&row(&["Carol", "40"])));
    }

    #[test]
    fn reordered_and_missing_columns_map_by_name() {
        let table = Table::new(
            row(&["name", "age", "city"]),
            vec![row(&["Alice", "30", "Oslo"])],
        );
        let table = merge("city,email,name\nRome,b@x.io,Bob", &table);
        assert_eq!(
            table.header(),
            row(&["name", "age", "city", "email"]).as_slice()
        );
        assert_eq!(table.data_row(1), Some(&row(&["Alice", "30", "Oslo", ""])));
        assert_eq!(table.data_row(2), Some(&row(&["Bob", "", "Rome", "b@x.io"])));
    }

    #[test]
    fn short_data_rows_are_padded() {
        let table = Table::new(row(&["a", "b", "c"]), Vec::new());
        let table = merge("1,2", &table);
        assert_eq!(table.data_row(1), Some(&row(&["1", "2", ""])));
    }

    #[test]
    fn data_value_matching_a_column_name_is_read_as_header() {
        let table = Table::new(row(&["name", "age"]), vec![row(&["Alice", "30"])]);
        let table = merge("name,Bob", &table);
        assert_eq!(table.header(), row(&["name", "age", "Bob"]).as_slice());
        assert_eq!(table.data_len(), 1);
    }

    #[test]
    fn duplicate_incoming_columns_are_collapsed() {
        let table = merge("a,b,a\n1,2,3", &Table::default());
        assert_eq!(table.header(), row(&["a", "b"]).as_slice());
        assert_eq!(table.data_row(1), Some(&row(&["1", "2"])));
    }

    #[test]
    fn merge_does_not_touch_the_input_table() {
        let table = alice_table();
        let before = table.clone();
        let _ = merge("name,age\nBob,30", &table);
        assert_eq!(table, before);
    }
}
