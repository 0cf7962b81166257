//! DemoQA end-to-end suite
//!
//! Browser scenarios drive the DemoQA web tables and upload/download pages
//! through WebDriver; API scenarios exercise a public object REST API and
//! fall back to an in-process mock store once it starts rate limiting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Scenario runner (tests/e2e, cucumber)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suite                                                      │
//! │    ├── page() -> WebDriverPage (chromedriver, lazy)         │
//! │    ├── api()  -> ApiFallbackContext (Normal | Limited)      │
//! │    └── record / summary / write_results                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Grid / Paginator          over  PageDriver                 │
//! │    ├── go_to_page, go_to_last_page                          │
//! │    ├── delete_last_row, delete_all_rows                     │
//! │    ├── delete_row_with_email, add_user, search              │
//! │    └── edit_user, row_values, submit_form                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  wait::until(budget, probe)   every DOM read is bounded     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browser;
pub mod chromedriver;
pub mod config;
pub mod downloads;
pub mod driver;
pub mod error;
pub mod grid;
pub mod paginator;
pub mod runner;
pub mod wait;

pub use api::{ApiFallbackContext, ApiMode, ApiResponse, FailurePolicy};
pub use config::{SuiteArgs, SuiteConfig, Timeouts};
pub use driver::PageDriver;
pub use error::{E2eError, E2eResult};
pub use grid::{DeletionOutcome, FormField, FormOutcome, Grid, UserRecord, UserUpdate};
pub use paginator::{Paginator, PaginatorState};
pub use runner::{ScenarioOutcome, ScenarioStatus, Suite, SuiteReport};
