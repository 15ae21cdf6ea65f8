//! Multi-token, multi-column row matching.
//!
//! A row matches a query when every text token is found (case-insensitive
//! substring) in the row's details text or in at least one visible column.
//! Rendered strings are cached per row evaluation, so each column is rendered
//! at most once no matter how many tokens are tested.

use super::query::SearchQuery;

/// A table row as seen by the matcher.
pub trait TableRow {
    type Column;

    /// Expandable details text; `None` for rows without details.
    fn details_text(&self) -> Option<String>;

    /// Display string for one column; `None` if the row has no value for it.
    fn column_text(&self, column: &Self::Column) -> Option<String>;
}

/// Display state of one column at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnState<C> {
    pub column: C,
    pub visible: bool,
    /// Non-zero when rows are grouped by this column
    pub grouping_priority: u32,
}

/// Predicate over rows for one query and one snapshot of visible columns.
#[derive(Debug, Clone)]
pub struct SearchMatcher<C> {
    tokens: Vec<String>,
    columns: Vec<C>,
}

impl<C> SearchMatcher<C> {
    pub fn new(query: &SearchQuery, visible_columns: Vec<C>) -> Self {
        SearchMatcher {
            tokens: query.text_tokens().map(str::to_lowercase).collect(),
            columns: visible_columns,
        }
    }

    /// Columns that are visible or used for grouping take part in matching.
    pub fn from_column_states(query: &SearchQuery, states: impl IntoIterator<Item = ColumnState<C>>) -> Self {
        let columns = states
            .into_iter()
            .filter(|s| s.visible || s.grouping_priority > 0)
            .map(|s| s.column)
            .collect();
        Self::new(query, columns)
    }

    pub fn columns(&self) -> &[C] {
        &self.columns
    }

    pub fn matches<R>(&self, row: &R) -> bool
    where
        R: TableRow<Column = C> + ?Sized,
    {
        // slot 0: details, slots 1..: visible columns
        let mut cache: Vec<Option<String>> = vec![None; self.columns.len() + 1];
        self.tokens
            .iter()
            .all(|token| self.any_field_matches(row, token, &mut cache))
    }

    pub fn filter<'r, R>(&self, rows: impl IntoIterator<Item = &'r R>) -> Vec<&'r R>
    where
        R: TableRow<Column = C> + 'r,
    {
        rows.into_iter().filter(|row| self.matches(*row)).collect()
    }

    fn any_field_matches<R>(&self, row: &R, token: &str, cache: &mut [Option<String>]) -> bool
    where
        R: TableRow<Column = C> + ?Sized,
    {
        let details = cache[0].get_or_insert_with(|| row.details_text().unwrap_or_default().to_lowercase());
        if details.contains(token) {
            return true;
        }

        for (i, column) in self.columns.iter().enumerate() {
            let text = cache[i + 1].get_or_insert_with(|| row.column_text(column).unwrap_or_default().to_lowercase());
            if text.contains(token) {
                return true;
            }
        }
        false
    }
}
