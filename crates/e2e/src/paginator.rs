//! React Table paginator: reading page state and jumping between pages

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::Timeouts;
use crate::driver::{normalize_text, PageDriver};
use crate::error::E2eResult;
use crate::grid;
use crate::wait::{self, Probe};

pub const PAGINATION: &str = ".-pagination";
pub const PAGE_INFO: &str = ".-pageInfo";
pub const PAGE_JUMP: &str = ".-pageJump input";
pub const NEXT_BUTTON: &str = ".-next button";
pub const PREVIOUS_BUTTON: &str = ".-previous button";
/// Only rendered by some paginator builds
pub const LAST_PAGE_BUTTON: &str = ".-last button";

static TOTAL_PAGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)of\s*(\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginatorState {
    pub current_page: u32,
    pub total_pages: u32,
}

impl PaginatorState {
    pub fn is_within_bounds(&self) -> bool {
        self.current_page >= 1 && self.current_page <= self.total_pages.max(1)
    }
}

/// Parses the `N` out of "Page X of N", tolerating NBSP.
pub fn parse_total_pages(raw: &str) -> Option<u32> {
    let text = normalize_text(raw);
    TOTAL_PAGES
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Page-jump value, `"1"` when blank.
pub fn current_page_or_default(raw: Option<String>) -> String {
    match raw.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => "1".to_string(),
    }
}

#[derive(Clone, Copy)]
pub struct Paginator<'a> {
    page: &'a dyn PageDriver,
    timeouts: &'a Timeouts,
}

impl<'a> Paginator<'a> {
    pub fn new(page: &'a dyn PageDriver, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    pub async fn total_pages(&self) -> E2eResult<u32> {
        let page = self.page;
        wait::until(self.timeouts.command_budget(), "paginator total pages", move || async move {
            if !page.is_visible(PAGE_INFO).await? {
                return Ok(Probe::Pending("paginator not visible".to_string()));
            }
            let raw = page.text(PAGE_INFO).await?.unwrap_or_default();
            Ok(match parse_total_pages(&raw) {
                Some(total) => Probe::Ready(total),
                None => Probe::Pending(format!(
                    "Paginator text not ready: \"{}\"",
                    normalize_text(&raw)
                )),
            })
        })
        .await
    }

    /// Raw page-jump value
    pub async fn current_page(&self) -> E2eResult<String> {
        let page = self.page;
        wait::until(self.timeouts.command_budget(), "page jump input", move || async move {
            if !page.is_visible(PAGE_JUMP).await? {
                return Ok(Probe::Pending("page jump input not visible".to_string()));
            }
            Ok(Probe::Ready(current_page_or_default(page.value(PAGE_JUMP).await?)))
        })
        .await
    }

    pub async fn current_page_number(&self) -> E2eResult<u32> {
        let raw = self.current_page().await?;
        raw.parse().map_err(|_| {
            crate::error::assertion(format!("Could not parse current page from \"{raw}\""))
        })
    }

    pub async fn state(&self) -> E2eResult<PaginatorState> {
        let current_page = self.current_page_number().await?;
        let total_pages = self.total_pages().await?;
        Ok(PaginatorState {
            current_page,
            total_pages,
        })
    }

    /// Polls the page-jump input until `accept` holds for its numeric value.
    pub async fn wait_for_page(&self, what: &str, accept: impl Fn(u32) -> bool) -> E2eResult<u32> {
        let page = self.page;
        let accept = &accept;
        wait::until(self.timeouts.settle_budget(), what, move || async move {
            let raw = current_page_or_default(page.value(PAGE_JUMP).await?);
            Ok(match raw.parse::<u32>() {
                Ok(n) if accept(n) => Probe::Ready(n),
                _ => Probe::Pending(format!("page jump value \"{raw}\"")),
            })
        })
        .await
    }

    /// Jumps via the page input and waits for the paginator and grid to catch up.
    pub async fn go_to_page(&self, target: u32) -> E2eResult<()> {
        let wanted = target.to_string();
        debug!("Jumping to page {}", wanted);

        self.page.fill(PAGE_JUMP, &wanted).await?;
        self.page.press_enter(PAGE_JUMP).await?;

        let page = self.page;
        let wanted = wanted.as_str();
        wait::until(
            self.timeouts.command_budget(),
            &format!("page jump to accept {wanted}"),
            move || async move {
                let value = page.value(PAGE_JUMP).await?.unwrap_or_default();
                Ok(if value == wanted {
                    Probe::Ready(())
                } else {
                    Probe::Pending(format!("page jump value \"{value}\""))
                })
            },
        )
        .await?;

        self.total_pages().await?;
        grid::wait_stable(self.page, self.timeouts).await
    }

    /// Prefers the "last page" control; falls back to jumping to the total.
    pub async fn go_to_last_page(&self) -> E2eResult<()> {
        if self.page.exists(LAST_PAGE_BUTTON).await? {
            self.page.click(LAST_PAGE_BUTTON).await?;
            return grid::wait_stable(self.page, self.timeouts).await;
        }
        let total = self.total_pages().await?;
        self.go_to_page(total).await
    }

    pub async fn next_page(&self) -> E2eResult<()> {
        self.page.click(NEXT_BUTTON).await?;
        grid::wait_stable(self.page, self.timeouts).await
    }

    pub async fn previous_page(&self) -> E2eResult<()> {
        self.page.click(PREVIOUS_BUTTON).await?;
        grid::wait_stable(self.page, self.timeouts).await
    }

    pub async fn next_enabled(&self) -> E2eResult<bool> {
        self.button_enabled(NEXT_BUTTON).await
    }

    pub async fn previous_enabled(&self) -> E2eResult<bool> {
        self.button_enabled(PREVIOUS_BUTTON).await
    }

    async fn button_enabled(&self, selector: &str) -> E2eResult<bool> {
        let page = self.page;
        wait::until(self.timeouts.command_budget(), selector, move || async move {
            if !page.exists(selector).await? {
                return Ok(Probe::Pending(format!("{selector} not rendered")));
            }
            let disabled = page.attr(selector, "disabled").await?.is_some();
            let aria_disabled = page
                .attr(selector, "aria-disabled")
                .await?
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            Ok(Probe::Ready(!(disabled || aria_disabled)))
        })
        .await
    }
}
