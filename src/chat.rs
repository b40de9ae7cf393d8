use crate::completion::{self, CompletionError, CompletionRequest};
use crate::table::filter::{self, ColumnFilterSet};
use crate::table::highlight::HighlightSet;
use crate::table::interchange;
use crate::table::merge::merge;
use crate::table::Table;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ChatSession {
    table: Table,
    filters: ColumnFilterSet,
    search: String,
    highlights: HighlightSet,
    response: Option<String>,
    loading: bool,
}

impl ChatSession {
    pub fn with_table(table: Table) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn filters(&self) -> &ColumnFilterSet {
        &self.filters
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn highlights(&self) -> &HighlightSet {
        &self.highlights
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        filter::visible_indices(&self.table, &self.filters, &self.search)
    }

    pub fn visible_table(&self) -> Table {
        filter::visible_rows(&self.table, &self.filters, &self.search)
    }

    pub fn begin_request(
        &mut self,
        api_key: Option<String>,
        user_system_prompt: &str,
        prompt: &str,
    ) -> Result<CompletionRequest, CompletionError> {
        if self.loading {
            return Err(CompletionError::Busy);
        }
        let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) else {
            let err = CompletionError::MissingApiKey;
            self.fail(&err.to_string());
            return Err(err);
        };

        self.loading = true;
        Ok(CompletionRequest {
            api_key,
            system: completion::system_prompt(user_system_prompt, self.table.header()),
            prompt: prompt.to_string(),
        })
    }

    pub fn complete(&mut self, raw_completion: &str) {
        let text = completion::trim_response(raw_completion);
        self.absorb(&text);
        self.response = Some(text);
        self.loading = false;
    }

    pub fn fail(&mut self, description: &str) {
        self.response = Some(format!("Error: {description}"));
        self.loading = false;
    }

    pub fn import_csv(&mut self, text: &str) {
        self.absorb(text);
    }

    fn absorb(&mut self, text: &str) {
        let merged = merge(text, &self.table);
        self.highlights = HighlightSet::after_merge(&self.table, &merged);
        debug!(
            rows = merged.data_len(),
            new = self.highlights.len(),
            "table updated"
        );
        self.table = merged;
    }

    pub fn export_csv(&self) -> String {
        interchange::to_csv(&self.visible_table())
    }

    pub fn undo_last_batch(&mut self) {
        self.table = self.highlights.undo(&self.table);
    }

    pub fn clear(&mut self) {
        self.table = Table::default();
        self.filters.clear();
        self.search.clear();
        self.highlights.clear();
    }

    pub fn exclude(&mut self, column: &str, value: &str) -> bool {
        self.filters.exclude(column, value)
    }

    pub fn remove_exclude(&mut self, column: &str, value: &str) -> bool {
        self.filters.remove(column, value)
    }
}
