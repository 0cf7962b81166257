//! DOM primitives the suite depends on
//!
//! Selectors are CSS. Reads operate on the first match and report absence as
//! `None`. Actions on a missing element fail with
//! [`E2eError::ElementNotFound`](crate::error::E2eError::ElementNotFound).

use async_trait::async_trait;

use crate::error::E2eResult;

/// One table row as rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSnapshot {
    /// Position among all elements matched by the row selector
    pub index: usize,
    pub cells: Vec<String>,
    pub visible: bool,
}

impl RowSnapshot {
    /// Concatenated cell text, NBSP-normalized and trimmed
    pub fn text(&self) -> String {
        normalize_text(&self.cells.concat())
    }

    /// Visible and carrying real content (pad rows render blank cells)
    pub fn is_data(&self) -> bool {
        self.visible && !self.text().is_empty()
    }

    pub fn has_cell(&self, expected: &str) -> bool {
        let expected = normalize_text(expected);
        self.cells.iter().any(|c| normalize_text(c) == expected)
    }
}

/// Replaces non-breaking spaces and trims.
pub fn normalize_text(raw: &str) -> String {
    raw.replace('\u{a0}', " ").trim().to_string()
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a path relative to the site base URL
    async fn visit(&self, path: &str) -> E2eResult<()>;

    async fn exists(&self, selector: &str) -> E2eResult<bool>;

    /// First match is present and displayed
    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    async fn text(&self, selector: &str) -> E2eResult<Option<String>>;

    /// Current `value` property of an input
    async fn value(&self, selector: &str) -> E2eResult<Option<String>>;

    async fn attr(&self, selector: &str, name: &str) -> E2eResult<Option<String>>;

    /// Every element matching `row_selector`, with the text of its `cell_selector` children
    async fn rows(&self, row_selector: &str, cell_selector: &str) -> E2eResult<Vec<RowSnapshot>>;

    async fn click(&self, selector: &str) -> E2eResult<()>;

    /// Click `target` inside the `index`-th element matching `row_selector`
    async fn click_in_row(&self, row_selector: &str, index: usize, target: &str) -> E2eResult<()>;

    /// Empty an input so the page's own input handlers see the change
    async fn clear(&self, selector: &str) -> E2eResult<()>;

    /// Clear, then type
    async fn fill(&self, selector: &str, text: &str) -> E2eResult<()>;

    /// Whether the input passes HTML constraint validation
    async fn is_valid(&self, selector: &str) -> E2eResult<bool>;

    async fn press_enter(&self, selector: &str) -> E2eResult<()>;
}
