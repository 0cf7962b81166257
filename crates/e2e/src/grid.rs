//! Web Tables grid: row counting, settling, user rows and deletion

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Timeouts;
use crate::driver::{normalize_text, PageDriver, RowSnapshot};
use crate::error::{assertion, E2eError, E2eResult};
use crate::paginator::{Paginator, PaginatorState};
use crate::wait::{self, Probe};

pub const WEB_TABLES_PATH: &str = "/webtables";

pub const TABLE_BODY: &str = ".rt-tbody";
/// Data rows; React Table pad rows carry `-padRow`
pub const DATA_ROW: &str = ".rt-tbody .rt-tr-group:not(.-padRow)";
pub const CELL: &str = ".rt-td";
pub const DELETE_BUTTON: &str = "span[id^=\"delete-record-\"]";
pub const EDIT_BUTTON: &str = "span[id^=\"edit-record-\"]";
pub const SEARCH_BOX: &str = "#searchBox";

pub const ADD_BUTTON: &str = "#addNewRecordButton";
pub const USER_FORM: &str = "#userForm";
pub const SUBMIT: &str = "#submit";
pub const OPEN_MODAL: &str = ".modal.fade.show";

/// Column order of a data row: first name, last name, age, email, salary, department
const DEPARTMENT_COLUMN: usize = 5;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+@[A-Za-z0-9_.\-]+\.[A-Za-z]{2,5}$").unwrap());

/// One input of the registration form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormField {
    /// Column header, as used in step tables
    pub label: &'static str,
    pub selector: &'static str,
}

pub const FORM_FIELDS: [FormField; 6] = [
    FormField { label: "First Name", selector: "#firstName" },
    FormField { label: "Last Name", selector: "#lastName" },
    FormField { label: "Email", selector: "#userEmail" },
    FormField { label: "Age", selector: "#age" },
    FormField { label: "Salary", selector: "#salary" },
    FormField { label: "Department", selector: "#department" },
];

impl FormField {
    /// Looks a field up by header ("First Name") or input id ("firstName", "age").
    pub fn find(name: &str) -> Option<FormField> {
        let key: String = name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
        FORM_FIELDS.into_iter().find(|f| {
            let label = f.label.replace(' ', "").to_lowercase();
            let id = f.selector.trim_start_matches('#').to_lowercase();
            key == label || key == id
        })
    }

    /// Whether the site's form constraints accept `value` for this field.
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        match self.selector {
            "#userEmail" => EMAIL.is_match(value),
            "#age" | "#salary" => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
            _ => !value.is_empty(),
        }
    }
}

/// Fields of the registration form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: String,
    pub salary: String,
    pub department: String,
}

impl UserRecord {
    /// Builds a record from a header-keyed table row ("First Name", "Email", ...).
    pub fn from_columns(row: &HashMap<String, String>) -> Self {
        let get = |key: &str| row.get(key).cloned().unwrap_or_default();
        Self {
            first_name: get("First Name"),
            last_name: get("Last Name"),
            email: get("Email"),
            age: get("Age"),
            salary: get("Salary"),
            department: get("Department"),
        }
    }

    /// `i`-th generated user for bulk pagination setup
    pub fn bulk(i: usize) -> Self {
        Self {
            first_name: format!("User{i}"),
            last_name: "Bulk".to_string(),
            email: format!("bulk{i}@test.com"),
            age: (20 + i % 10).to_string(),
            salary: (1000 + i).to_string(),
            department: "QA".to_string(),
        }
    }

    pub fn in_department(department: &str, i: usize) -> Self {
        Self {
            first_name: format!("Dept{department}{i}"),
            last_name: "User".to_string(),
            email: format!("dept-{department}-{i}@test.com"),
            age: (21 + i % 5).to_string(),
            salary: (2000 + i).to_string(),
            department: department.to_string(),
        }
    }

    /// Reads a rendered data row.
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).map(|c| normalize_text(c)).unwrap_or_default();
        Self {
            first_name: cell(0),
            last_name: cell(1),
            age: cell(2),
            email: cell(3),
            salary: cell(4),
            department: cell(DEPARTMENT_COLUMN),
        }
    }

    /// Value shown under a column header
    pub fn column(&self, label: &str) -> Option<&str> {
        let value = match FormField::find(label)?.selector {
            "#firstName" => &self.first_name,
            "#lastName" => &self.last_name,
            "#userEmail" => &self.email,
            "#age" => &self.age,
            "#salary" => &self.salary,
            _ => &self.department,
        };
        Some(value.as_str())
    }

    fn fields(&self) -> impl Iterator<Item = (FormField, &str)> + '_ {
        FORM_FIELDS
            .into_iter()
            .filter_map(move |f| self.column(f.label).map(|v| (f, v)))
    }
}

/// Fields to overwrite when editing a row; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    fields: Vec<(FormField, String)>,
}

impl UserUpdate {
    /// Builds an update from a header-keyed table row; unknown headers are rejected.
    pub fn from_columns(row: &HashMap<String, String>) -> E2eResult<Self> {
        let mut update = Self::default();
        for (header, value) in row {
            let field = FormField::find(header)
                .ok_or_else(|| E2eError::InvalidConfig(format!("unknown user field \"{header}\"")))?;
            update.fields.push((field, value.clone()));
        }
        // Table rows are unordered; fill in form order
        update
            .fields
            .sort_by_key(|(f, _)| FORM_FIELDS.iter().position(|g| g == f));
        Ok(update)
    }

    pub fn set(mut self, field: FormField, value: impl Into<String>) -> Self {
        self.fields.retain(|(f, _)| *f != field);
        self.fields.push((field, value.into()));
        self
    }

    pub fn fields(&self) -> &[(FormField, String)] {
        &self.fields
    }

    /// Every given value satisfies its field's constraints.
    pub fn looks_valid(&self) -> bool {
        self.fields.iter().all(|(f, v)| f.accepts(v))
    }
}

/// What submitting the registration form did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FormOutcome {
    /// The modal closed
    Submitted,
    /// The modal stayed open with these fields failing validation
    Rejected { invalid: Vec<&'static str> },
}

/// What a deletion run did to the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// The page had no data rows
    Nothing,
    /// Rows were removed and the page stayed put
    Removed { before: usize, after: usize },
    /// The last page lost all its rows and the paginator moved back
    Collapsed {
        before: PaginatorState,
        after: PaginatorState,
    },
}

/// Queries rows, waits a fixed beat for re-render, then queries again.
pub async fn wait_stable(page: &dyn PageDriver, timeouts: &Timeouts) -> E2eResult<()> {
    wait::until(timeouts.command_budget(), "grid body", move || async move {
        Ok(if page.exists(TABLE_BODY).await? {
            Probe::Ready(())
        } else {
            Probe::Pending(format!("{TABLE_BODY} not rendered"))
        })
    })
    .await?;
    wait::settle(timeouts.grid_settle).await;
    // Re-query; rows detached by the re-render surface as transient errors
    wait::until(timeouts.command_budget(), "grid rows", move || async move {
        page.rows(DATA_ROW, CELL).await?;
        Ok(Probe::Ready(()))
    })
    .await
}

#[derive(Clone, Copy)]
pub struct Grid<'a> {
    page: &'a dyn PageDriver,
    timeouts: &'a Timeouts,
}

impl<'a> Grid<'a> {
    pub fn new(page: &'a dyn PageDriver, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    pub fn paginator(&self) -> Paginator<'a> {
        Paginator::new(self.page, self.timeouts)
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.page.visit(WEB_TABLES_PATH).await?;
        let page = self.page;
        wait::until(self.timeouts.page_load_budget(), "web tables page", move || async move {
            Ok(if page.is_visible(ADD_BUTTON).await? {
                Probe::Ready(())
            } else {
                Probe::Pending(format!("{ADD_BUTTON} not visible"))
            })
        })
        .await
    }

    pub async fn wait_stable(&self) -> E2eResult<()> {
        wait_stable(self.page, self.timeouts).await
    }

    /// Visible rows with non-empty text, freshly queried
    pub async fn data_rows(&self) -> E2eResult<Vec<RowSnapshot>> {
        let rows = self.page.rows(DATA_ROW, CELL).await?;
        Ok(rows.into_iter().filter(RowSnapshot::is_data).collect())
    }

    /// Data rows, read again while a re-render detaches them
    pub async fn settled_rows(&self) -> E2eResult<Vec<RowSnapshot>> {
        let grid = *self;
        wait::until(self.timeouts.command_budget(), "grid rows", move || async move {
            Ok(Probe::Ready(grid.data_rows().await?))
        })
        .await
    }

    pub async fn count_rows(&self) -> E2eResult<usize> {
        Ok(self.data_rows().await?.len())
    }

    /// Polls the row count until `accept` holds.
    pub async fn wait_for_count(&self, what: &str, accept: impl Fn(usize) -> bool) -> E2eResult<usize> {
        let grid = *self;
        let accept = &accept;
        wait::until(self.timeouts.settle_budget(), what, move || async move {
            let n = grid.count_rows().await?;
            Ok(if accept(n) {
                Probe::Ready(n)
            } else {
                Probe::Pending(format!("{n} row(s) on the current page"))
            })
        })
        .await
    }

    pub async fn clear_filter(&self) -> E2eResult<()> {
        if self.page.exists(SEARCH_BOX).await? {
            self.page.clear(SEARCH_BOX).await?;
        }
        Ok(())
    }

    pub async fn search(&self, query: &str) -> E2eResult<()> {
        self.page.fill(SEARCH_BOX, query).await
    }

    pub async fn search_value(&self) -> E2eResult<String> {
        Ok(self.page.value(SEARCH_BOX).await?.unwrap_or_default())
    }

    async fn any_cell_equals(&self, expected: &str) -> E2eResult<bool> {
        Ok(self.data_rows().await?.iter().any(|r| r.has_cell(expected)))
    }

    /// Waits for some cell to equal `expected` exactly.
    pub async fn wait_for_cell(&self, expected: &str) -> E2eResult<()> {
        let grid = *self;
        wait::until(
            self.timeouts.settle_budget(),
            &format!("a cell exactly equal to \"{expected}\""),
            move || async move {
                Ok(if grid.any_cell_equals(expected).await? {
                    Probe::Ready(())
                } else {
                    Probe::Pending(format!("{} data row(s), none matching", grid.count_rows().await?))
                })
            },
        )
        .await
    }

    /// Waits until no cell equals `unexpected`.
    pub async fn wait_for_no_cell(&self, unexpected: &str) -> E2eResult<()> {
        let grid = *self;
        wait::until(
            self.timeouts.settle_budget(),
            &format!("no cell equal to \"{unexpected}\""),
            move || async move {
                Ok(if grid.any_cell_equals(unexpected).await? {
                    Probe::Pending(format!("\"{unexpected}\" still listed"))
                } else {
                    Probe::Ready(())
                })
            },
        )
        .await
    }

    /// Filters on `email` and waits for the row holding it.
    async fn find_row(&self, email: &str) -> E2eResult<RowSnapshot> {
        self.search(email).await?;
        self.wait_stable().await?;
        let grid = *self;
        wait::until(
            self.timeouts.settle_budget(),
            &format!("row with email \"{email}\""),
            move || async move {
                let rows = grid.data_rows().await?;
                Ok(match rows.into_iter().find(|r| r.has_cell(email)) {
                    Some(row) => Probe::Ready(row),
                    None => Probe::Pending("no matching row".to_string()),
                })
            },
        )
        .await
    }

    /// Department column of every data row on the page
    pub async fn departments(&self) -> E2eResult<Vec<String>> {
        Ok(self
            .data_rows()
            .await?
            .into_iter()
            .map(|r| {
                r.cells
                    .get(DEPARTMENT_COLUMN)
                    .map(|c| normalize_text(c))
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Column values of the row whose email cell equals `email`
    pub async fn row_values(&self, email: &str) -> E2eResult<UserRecord> {
        let row = self.find_row(email).await?;
        Ok(UserRecord::from_cells(&row.cells))
    }

    pub async fn form_open(&self) -> E2eResult<bool> {
        self.page.exists(OPEN_MODAL).await
    }

    async fn wait_for_form(&self) -> E2eResult<()> {
        let page = self.page;
        wait::until(self.timeouts.command_budget(), "registration form", move || async move {
            Ok(if page.is_visible(USER_FORM).await? {
                Probe::Ready(())
            } else {
                Probe::Pending(format!("{USER_FORM} not visible"))
            })
        })
        .await
    }

    /// Opens an empty registration form.
    pub async fn open_user_form(&self) -> E2eResult<()> {
        self.page.click(ADD_BUTTON).await?;
        self.wait_for_form().await
    }

    pub async fn fill_field(&self, field: FormField, value: &str) -> E2eResult<()> {
        self.page.fill(field.selector, value).await
    }

    pub async fn clear_user_form(&self) -> E2eResult<()> {
        for field in FORM_FIELDS {
            self.page.clear(field.selector).await?;
        }
        Ok(())
    }

    /// Labels of the form fields failing HTML constraint validation
    pub async fn invalid_fields(&self) -> E2eResult<Vec<&'static str>> {
        let mut invalid = Vec::new();
        for field in FORM_FIELDS {
            if !self.page.is_valid(field.selector).await? {
                invalid.push(field.label);
            }
        }
        Ok(invalid)
    }

    /// Clicks submit and waits for the modal to close or for validation to flag a field.
    pub async fn submit_form(&self) -> E2eResult<FormOutcome> {
        self.page.click(SUBMIT).await?;
        let grid = *self;
        wait::until(self.timeouts.command_budget(), "registration form to close", move || async move {
            if !grid.form_open().await? {
                return Ok(Probe::Ready(FormOutcome::Submitted));
            }
            let invalid = grid.invalid_fields().await?;
            Ok(if invalid.is_empty() {
                Probe::Pending("modal still open".to_string())
            } else {
                Probe::Ready(FormOutcome::Rejected { invalid })
            })
        })
        .await
    }

    /// Opens the registration form, fills it and waits for the modal to close.
    pub async fn add_user(&self, user: &UserRecord) -> E2eResult<()> {
        debug!("Adding user {}", user.email);
        self.open_user_form().await?;
        for (field, value) in user.fields() {
            self.fill_field(field, value).await?;
        }
        match self.submit_form().await? {
            FormOutcome::Submitted => Ok(()),
            FormOutcome::Rejected { invalid } => Err(assertion(format!(
                "registration form rejected {} ({})",
                user.email,
                invalid.join(", ")
            ))),
        }
    }

    /// Opens the row holding `email` for editing, overwrites the given fields and submits.
    pub async fn edit_user(&self, email: &str, update: &UserUpdate) -> E2eResult<FormOutcome> {
        let row = self.find_row(email).await?;
        debug!("Editing user {}", email);
        self.page.click_in_row(DATA_ROW, row.index, EDIT_BUTTON).await?;
        self.wait_for_form().await?;

        for (field, value) in update.fields() {
            self.fill_field(*field, value).await?;
        }
        let outcome = self.submit_form().await?;
        if outcome == FormOutcome::Submitted {
            self.wait_stable().await?;
        }
        Ok(outcome)
    }

    /// Deletes the last data row and waits for the count to drop.
    pub async fn delete_last_row(&self) -> E2eResult<DeletionOutcome> {
        self.clear_filter().await?;
        let rows = self.settled_rows().await?;
        let before = rows.len();
        let Some(last) = rows.last() else {
            info!("No rows on the current page; nothing to delete");
            return Ok(DeletionOutcome::Nothing);
        };

        self.page.click_in_row(DATA_ROW, last.index, DELETE_BUTTON).await?;
        self.wait_stable().await?;

        // A concurrent re-render may drop more than one row
        let after = self
            .wait_for_count(&format!("row count at most {}", before - 1), |n| n < before)
            .await?;
        Ok(DeletionOutcome::Removed { before, after })
    }

    /// Deletes every row on the current page, first row each time.
    ///
    /// Either the page ends up empty, or (on the last page) the paginator
    /// collapses back to a page that still exists.
    pub async fn delete_all_rows(&self) -> E2eResult<DeletionOutcome> {
        self.clear_filter().await?;
        let paginator = self.paginator();
        let before = paginator.state().await?;
        let n0 = self.settled_rows().await?.len();
        if n0 == 0 {
            info!("No rows on page {}; nothing to delete", before.current_page);
            return Ok(DeletionOutcome::Nothing);
        }

        for round in 0..n0 {
            let rows = self.settled_rows().await?;
            let Some(first) = rows.first() else {
                debug!("Page emptied after {} deletion(s)", round);
                break;
            };
            self.page.click_in_row(DATA_ROW, first.index, DELETE_BUTTON).await?;
            self.wait_stable().await?;
        }

        let after = paginator.state().await?;
        let collapsed =
            after.total_pages < before.total_pages || after.current_page < before.current_page;

        if collapsed {
            if after.total_pages > before.total_pages {
                return Err(assertion(format!(
                    "total pages should not increase after deletion ({} -> {})",
                    before.total_pages, after.total_pages
                )));
            }
            self.wait_stable().await?;
            let ceiling = before.current_page.saturating_sub(1).max(1);
            let current = paginator
                .wait_for_page(
                    &format!("page input to move back to at most {ceiling} after collapse"),
                    |n| n <= ceiling,
                )
                .await?;
            info!(
                "Paginator collapsed: page {}/{} -> {}/{}",
                before.current_page, before.total_pages, current, after.total_pages
            );
            return Ok(DeletionOutcome::Collapsed {
                before,
                after: PaginatorState {
                    current_page: current,
                    total_pages: after.total_pages,
                },
            });
        }

        let after_rows = self
            .wait_for_count("current page to be empty", |n| n == 0)
            .await?;
        Ok(DeletionOutcome::Removed {
            before: n0,
            after: after_rows,
        })
    }

    /// Deletes the row whose cell equals `email`; absent rows are a no-op.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete_row_with_email(&self, email: &str) -> E2eResult<bool> {
        self.search(email).await?;
        self.wait_stable().await?;

        let rows = self.settled_rows().await?;
        let deleted = match rows.iter().find(|r| r.has_cell(email)) {
            Some(row) => {
                self.page.click_in_row(DATA_ROW, row.index, DELETE_BUTTON).await?;
                self.wait_stable().await?;
                true
            }
            None => {
                info!("Row with email '{}' not present (idempotent delete)", email);
                false
            }
        };

        self.wait_for_no_cell(email).await?;
        Ok(deleted)
    }
}
