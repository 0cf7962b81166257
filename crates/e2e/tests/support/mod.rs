//! In-memory stand-in for the Web Tables page
//!
//! Mimics the React Table behavior the suite depends on: NBSP-laden page
//! info, a page-jump input that only applies on Enter and clamps to the valid
//! range, a current page that collapses when the last page empties, a blank
//! pad row and a hidden row after the data rows, and a re-render after every
//! deletion during which the first row query fails as stale. The registration
//! modal adds or edits a row only when every input passes validation.

#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use demoqa_e2e::driver::{PageDriver, RowSnapshot};
use demoqa_e2e::grid::{
    ADD_BUTTON, CELL, DATA_ROW, DELETE_BUTTON, EDIT_BUTTON, OPEN_MODAL, SEARCH_BOX, SUBMIT,
    TABLE_BODY, USER_FORM, WEB_TABLES_PATH,
};
use demoqa_e2e::paginator::{
    LAST_PAGE_BUTTON, NEXT_BUTTON, PAGE_INFO, PAGE_JUMP, PAGINATION, PREVIOUS_BUTTON,
};
use demoqa_e2e::{E2eError, E2eResult, UserRecord};

const FORM_FIELDS: [&str; 6] = ["#firstName", "#lastName", "#userEmail", "#age", "#salary", "#department"];

#[derive(Debug)]
struct State {
    users: Vec<UserRecord>,
    page_size: usize,
    current_page: u32,
    jump_input: String,
    filter: String,
    modal_open: bool,
    form: HashMap<String, String>,
    /// Email of the row open for editing
    editing: Option<String>,
    stale_reads: usize,
    garbled_info: bool,
    inert_delete: bool,
    clicks: Vec<String>,
}

impl State {
    fn visible_users(&self) -> Vec<&UserRecord> {
        let needle = self.filter.to_lowercase();
        self.users
            .iter()
            .filter(|u| {
                needle.is_empty()
                    || [&u.first_name, &u.last_name, &u.email, &u.age, &u.salary, &u.department]
                        .iter()
                        .any(|f| f.to_lowercase().contains(&needle))
            })
            .collect()
    }

    fn total_pages(&self) -> u32 {
        let n = self.visible_users().len();
        (n.div_ceil(self.page_size)).max(1) as u32
    }

    fn page_slice(&self) -> Vec<UserRecord> {
        let start = (self.current_page as usize - 1) * self.page_size;
        self.visible_users()
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect()
    }

    /// Clamps the current page and re-renders the jump input.
    fn rerender(&mut self) {
        let total = self.total_pages();
        self.current_page = self.current_page.clamp(1, total);
        self.jump_input = self.current_page.to_string();
    }

    fn form_value(&self, selector: &str) -> String {
        self.form.get(selector).cloned().unwrap_or_default()
    }

    /// `required` on every input, an email pattern, digits for age and salary
    fn field_valid(&self, selector: &str) -> bool {
        let value = self.form_value(selector);
        let value = value.trim();
        match selector {
            "#userEmail" => value
                .split_once('@')
                .is_some_and(|(user, host)| !user.is_empty() && host.contains('.') && !host.ends_with('.')),
            "#age" | "#salary" => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
            _ => !value.is_empty(),
        }
    }

    fn form_record(&self) -> UserRecord {
        UserRecord {
            first_name: self.form_value("#firstName"),
            last_name: self.form_value("#lastName"),
            email: self.form_value("#userEmail"),
            age: self.form_value("#age"),
            salary: self.form_value("#salary"),
            department: self.form_value("#department"),
        }
    }

    fn control_rendered(&self, selector: &str) -> bool {
        match selector {
            TABLE_BODY | PAGINATION | PAGE_INFO | PAGE_JUMP | SEARCH_BOX | ADD_BUTTON
            | NEXT_BUTTON | PREVIOUS_BUTTON => true,
            OPEN_MODAL | USER_FORM | SUBMIT => self.modal_open,
            s if FORM_FIELDS.contains(&s) => self.modal_open,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct FakeGrid {
    state: Mutex<State>,
    last_button: bool,
}

impl FakeGrid {
    pub fn with_users(count: usize, page_size: usize) -> Self {
        let users = (0..count).map(UserRecord::bulk).collect();
        Self {
            state: Mutex::new(State {
                users,
                page_size,
                current_page: 1,
                jump_input: "1".to_string(),
                filter: String::new(),
                modal_open: false,
                form: HashMap::new(),
                editing: None,
                stale_reads: 0,
                garbled_info: false,
                inert_delete: false,
                clicks: Vec::new(),
            }),
            last_button: false,
        }
    }

    /// Renders the optional "last page" control.
    pub fn with_last_button(mut self) -> Self {
        self.last_button = true;
        self
    }

    /// Page info without the "of N" part.
    pub fn with_garbled_page_info(self) -> Self {
        self.state.lock().garbled_info = true;
        self
    }

    /// Delete controls render but do nothing.
    pub fn with_inert_delete(self) -> Self {
        self.state.lock().inert_delete = true;
        self
    }

    /// The next `n` row queries fail as stale.
    pub fn stale_next_reads(&self, n: usize) {
        self.state.lock().stale_reads = n;
    }

    /// Appends a user to the table.
    pub fn push_user(&self, user: UserRecord) {
        let mut s = self.state.lock();
        s.users.push(user);
        s.rerender();
    }

    pub fn user(&self, email: &str) -> Option<UserRecord> {
        self.state.lock().users.iter().find(|u| u.email == email).cloned()
    }

    pub fn modal_open(&self) -> bool {
        self.state.lock().modal_open
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.state.lock().total_pages()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.state.lock().users.iter().any(|u| u.email == email)
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    fn not_found(selector: &str) -> E2eError {
        E2eError::ElementNotFound(selector.to_string())
    }
}

#[async_trait]
impl PageDriver for FakeGrid {
    async fn visit(&self, path: &str) -> E2eResult<()> {
        if path != WEB_TABLES_PATH {
            return Err(E2eError::WebDriver(format!("unexpected path {path}")));
        }
        let mut s = self.state.lock();
        s.filter.clear();
        s.modal_open = false;
        s.current_page = 1;
        s.rerender();
        Ok(())
    }

    async fn exists(&self, selector: &str) -> E2eResult<bool> {
        if selector == LAST_PAGE_BUTTON {
            return Ok(self.last_button);
        }
        Ok(self.state.lock().control_rendered(selector))
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.exists(selector).await
    }

    async fn text(&self, selector: &str) -> E2eResult<Option<String>> {
        let s = self.state.lock();
        Ok(match selector {
            PAGE_INFO if s.garbled_info => Some("Page\u{a0}".to_string()),
            PAGE_INFO => Some(format!("Page\u{a0}\u{a0}of\u{a0}{}", s.total_pages())),
            _ => None,
        })
    }

    async fn value(&self, selector: &str) -> E2eResult<Option<String>> {
        let s = self.state.lock();
        Ok(match selector {
            PAGE_JUMP => Some(s.jump_input.clone()),
            SEARCH_BOX => Some(s.filter.clone()),
            other => s.form.get(other).cloned(),
        })
    }

    async fn attr(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        let s = self.state.lock();
        let disabled = match selector {
            NEXT_BUTTON => s.current_page >= s.total_pages(),
            PREVIOUS_BUTTON => s.current_page <= 1,
            _ => return Ok(None),
        };
        Ok((name == "disabled" && disabled).then(String::new))
    }

    async fn rows(&self, row_selector: &str, cell_selector: &str) -> E2eResult<Vec<RowSnapshot>> {
        assert_eq!(row_selector, DATA_ROW);
        assert_eq!(cell_selector, CELL);

        let mut s = self.state.lock();
        if s.stale_reads > 0 {
            s.stale_reads -= 1;
            return Err(E2eError::ElementNotFound("stale row".to_string()));
        }

        let mut rows: Vec<RowSnapshot> = s
            .page_slice()
            .into_iter()
            .enumerate()
            .map(|(index, u)| RowSnapshot {
                index,
                cells: vec![u.first_name, u.last_name, u.age, u.email, u.salary, u.department, String::new()],
                visible: true,
            })
            .collect();

        let index = rows.len();
        rows.push(RowSnapshot {
            index,
            cells: vec!["\u{a0}".to_string(); 7],
            visible: true,
        });
        rows.push(RowSnapshot {
            index: index + 1,
            cells: vec!["ghost".to_string(); 7],
            visible: false,
        });
        Ok(rows)
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        let mut s = self.state.lock();
        s.clicks.push(selector.to_string());
        match selector {
            LAST_PAGE_BUTTON if self.last_button => {
                s.current_page = s.total_pages();
            }
            NEXT_BUTTON => s.current_page += 1,
            PREVIOUS_BUTTON => s.current_page = s.current_page.saturating_sub(1),
            ADD_BUTTON => {
                s.modal_open = true;
                s.editing = None;
                s.form.clear();
            }
            SUBMIT if s.modal_open => {
                if FORM_FIELDS.iter().all(|f| s.field_valid(f)) {
                    let user = s.form_record();
                    match s.editing.take() {
                        Some(email) => {
                            if let Some(row) = s.users.iter_mut().find(|u| u.email == email) {
                                *row = user;
                            }
                        }
                        None => s.users.push(user),
                    }
                    s.modal_open = false;
                }
            }
            other => return Err(Self::not_found(other)),
        }
        s.rerender();
        Ok(())
    }

    async fn click_in_row(&self, row_selector: &str, index: usize, target: &str) -> E2eResult<()> {
        assert_eq!(row_selector, DATA_ROW);

        let mut s = self.state.lock();
        s.clicks.push(target.to_string());
        let Some(user) = s.page_slice().into_iter().nth(index) else {
            return Err(Self::not_found(&format!("{target} in row {index}")));
        };
        match target {
            DELETE_BUTTON if s.inert_delete => {}
            DELETE_BUTTON => {
                s.users.retain(|u| u.email != user.email);
                s.stale_reads = 1;
                s.rerender();
            }
            EDIT_BUTTON => {
                s.form = HashMap::from([
                    ("#firstName".to_string(), user.first_name.clone()),
                    ("#lastName".to_string(), user.last_name.clone()),
                    ("#userEmail".to_string(), user.email.clone()),
                    ("#age".to_string(), user.age.clone()),
                    ("#salary".to_string(), user.salary.clone()),
                    ("#department".to_string(), user.department.clone()),
                ]);
                s.editing = Some(user.email);
                s.modal_open = true;
            }
            other => return Err(Self::not_found(other)),
        }
        Ok(())
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        self.fill(selector, "").await
    }

    async fn fill(&self, selector: &str, text: &str) -> E2eResult<()> {
        let mut s = self.state.lock();
        if !s.control_rendered(selector) {
            return Err(Self::not_found(selector));
        }
        match selector {
            // Applied on Enter
            PAGE_JUMP => s.jump_input = text.to_string(),
            SEARCH_BOX => {
                s.filter = text.to_string();
                s.rerender();
            }
            field => {
                s.form.insert(field.to_string(), text.to_string());
            }
        }
        Ok(())
    }

    async fn is_valid(&self, selector: &str) -> E2eResult<bool> {
        let s = self.state.lock();
        if !s.control_rendered(selector) {
            return Err(Self::not_found(selector));
        }
        Ok(!FORM_FIELDS.contains(&selector) || s.field_valid(selector))
    }

    async fn press_enter(&self, selector: &str) -> E2eResult<()> {
        if selector != PAGE_JUMP {
            return Ok(());
        }
        let mut s = self.state.lock();
        if let Ok(page) = s.jump_input.trim().parse::<u32>() {
            s.current_page = page;
        }
        s.rerender();
        Ok(())
    }
}
