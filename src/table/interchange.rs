use super::Table;

pub const DEFAULT_EXPORT_NAME: &str = "cumulative";

fn quote_field(value: &str) -> String {
    if value.contains(',') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Renders rows as CSV text. Fields containing a comma are wrapped in double
/// quotes; nothing else is escaped.
pub fn to_csv(table: &Table) -> String {
    table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| quote_field(cell))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn export_file_name(list_name: &str) -> String {
    let base = list_name.trim();
    let base = if base.is_empty() {
        DEFAULT_EXPORT_NAME
    } else {
        base
    };
    format!("{base}.csv")
}

#[cfg(test)]
mod tests {
    use super::{export_file_name, to_csv};
    use crate::table::merge::merge;
    use crate::table::Table;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    #[test]
    fn quotes_only_fields_with_commas() {
        let table = Table::new(
            row(&["name", "address"]),
            vec![row(&["Alice", "1 Main St, Springfield"])],
        );
        assert_eq!(
            to_csv(&table),
            "name,address\nAlice,\"1 Main St, Springfield\""
        );
    }

    #[test]
    fn exported_table_imports_back_unchanged() {
        let table = Table::new(
            row(&["name", "address"]),
            vec![
                row(&["Alice", "1 Main St, Springfield"]),
                row(&["Bob", ""]),
            ],
        );
        let imported = merge(&to_csv(&table), &Table::default());
        assert_eq!(imported, table);
    }

    #[test]
    fn empty_table_exports_as_empty_text() {
        assert_eq!(to_csv(&Table::default()), "");
    }

    #[test]
    fn export_name_falls_back_when_list_is_unnamed() {
        assert_eq!(export_file_name("Leads"), "Leads.csv");
        assert_eq!(export_file_name("   "), "cumulative.csv");
    }
}
