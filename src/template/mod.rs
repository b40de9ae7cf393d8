use crate::table::Table;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub mod email;
pub mod export;

pub use email::EmailFields;

pub const ORDINAL_COLUMN: &str = "#";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern should compile"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    Custom(String),
    Email(EmailFields),
}

impl Template {
    pub fn kind(&self) -> TemplateKind {
        match self {
            Self::Custom(_) => TemplateKind::Custom,
            Self::Email(_) => TemplateKind::Email,
        }
    }

    pub fn render(&self, table: &Table) -> Vec<String> {
        table
            .data_rows()
            .map(|(ordinal, row)| {
                let context = RowContext::new(table.header(), row, ordinal);
                self.render_row(&context)
            })
            .collect()
    }

    pub fn render_row(&self, context: &RowContext<'_>) -> String {
        match self {
            Self::Custom(template) => context.substitute(template),
            Self::Email(fields) => email::build_eml(&fields.render(context)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    #[default]
    Custom,
    Email,
}

impl TemplateKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Custom => "Custom",
            Self::Email => "Email",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Custom => "txt",
            Self::Email => "eml",
        }
    }
}

pub struct RowContext<'a> {
    header: &'a [String],
    row: &'a [String],
    ordinal: String,
}

impl<'a> RowContext<'a> {
    pub fn new(header: &'a [String], row: &'a [String], ordinal: usize) -> Self {
        Self {
            header,
            row,
            ordinal: ordinal.to_string(),
        }
    }

    pub fn ordinal(&self) -> &str {
        &self.ordinal
    }

    pub fn value(&self, name: &str) -> &str {
        if name == ORDINAL_COLUMN {
            return &self.ordinal;
        }
        self.header
            .iter()
            .position(|column| column == name)
            .and_then(|index| self.row.get(index))
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Replaces every `{Name}` with the row's value for that column. Unknown
    /// names become empty.
    pub fn substitute(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |captures: &Captures<'_>| {
                self.value(captures[1].trim()).to_string()
            })
            .into_owned()
    }
}

pub fn placeholder(column: &str) -> String {
    format!("{{{column}}}")
}

/// `selection` and the returned range count characters, not bytes.
pub fn insert_placeholder(
    text: &str,
    selection: (usize, usize),
    column: &str,
) -> (String, (usize, usize)) {
    let char_count = text.chars().count();
    let start = selection.0.min(selection.1).min(char_count);
    let end = selection.0.max(selection.1).min(char_count);
    let token = placeholder(column);

    let mut result: String = text.chars().take(start).collect();
    result.push_str(&token);
    result.extend(text.chars().skip(end));

    let token_len = token.chars().count();
    (result, (start, start + token_len))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateSettings {
    #[serde(default)]
    pub kind: TemplateKind,
    #[serde(default)]
    pub custom: String,
    #[serde(default)]
    pub email: EmailFields,
    #[serde(default)]
    pub filename: String,
}

impl TemplateSettings {
    pub fn active(&self) -> Template {
        match self.kind {
            TemplateKind::Custom => Template::Custom(self.custom.clone()),
            TemplateKind::Email => Template::Email(self.email.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{insert_placeholder, RowContext, Template, TemplateKind, TemplateSettings};
    use crate::table::Table;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| cell.to_string()).collect()
    }

    fn alice() -> Table {
        Table::new(row(&["name", "age"]), vec![row(&["Alice", "30"])])
    }

    #[test]
    fn renders_one_document_per_data_row() {
        let template = Template::Custom("{name} is {age}".to_string());
        assert_eq!(template.render(&alice()), vec!["Alice is 30"]);

        let table = Table::new(
            row(&["name"]),
            vec![row(&["Alice"]), row(&["Bob"]), row(&["Carol"])],
        );
        let template = Template::Custom("{#}. {name}".to_string());
        assert_eq!(template.render(&table), vec!["1. Alice", "2. Bob", "3. Carol"]);
    }

    #[test]
    fn unknown_placeholders_render_empty() {
        let template = Template::Custom("[{missing}] {name}".to_string());
        assert_eq!(template.render(&alice()), vec!["[] Alice"]);
    }

    #[test]
    fn placeholder_names_are_trimmed_but_case_sensitive() {
        let template = Template::Custom("{ name }/{Name}".to_string());
        assert_eq!(template.render(&alice()), vec!["Alice/"]);
    }

    #[test]
    fn text_without_placeholders_is_kept() {
        let template = Template::Custom("static {} text".to_string());
        assert_eq!(template.render(&alice()), vec!["static {} text"]);
    }

    #[test]
    fn header_only_table_renders_nothing() {
        let table = Table::new(row(&["name"]), Vec::new());
        assert!(Template::Custom("{name}".to_string()).render(&table).is_empty());
        assert!(Template::Custom("x".to_string())
            .render(&Table::default())
            .is_empty());
    }

    #[test]
    fn ordinal_column_shadows_a_real_hash_column() {
        let header = row(&["#", "name"]);
        let values = row(&["99", "Alice"]);
        let context = RowContext::new(&header, &values, 4);
        assert_eq!(context.substitute("{#}-{name}"), "4-Alice");
    }

    #[test]
    fn inserts_placeholder_at_cursor() {
        let (text, selection) = insert_placeholder("Hello !", (6, 6), "name");
        assert_eq!(text, "Hello {name}!");
        assert_eq!(selection, (6, 12));
    }

    #[test]
    fn inserted_placeholder_replaces_selection() {
        let (text, _) = insert_placeholder("Dear XXX,", (8, 5), "name");
        assert_eq!(text, "Dear {name},");

        let (text, _) = insert_placeholder("héllo", (99, 99), "x");
        assert_eq!(text, "héllo{x}");
    }

    #[test]
    fn settings_switch_between_drafts() {
        let mut settings = TemplateSettings {
            custom: "{name}".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.active(), Template::Custom("{name}".to_string()));

        settings.kind = TemplateKind::Email;
        assert_eq!(settings.active().kind(), TemplateKind::Email);
        assert_eq!(settings.custom, "{name}");
    }

    #[test]
    fn settings_tolerate_missing_fields() {
        let settings: TemplateSettings =
            serde_json::from_str(r#"{"kind":"email"}"#).expect("partial settings should parse");
        assert_eq!(settings.kind, TemplateKind::Email);
        assert_eq!(settings.email.to, "{to}");
        assert!(settings.filename.is_empty());
    }
}
