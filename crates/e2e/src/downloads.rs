//! Upload/download page and files landing on disk

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{Budget, Timeouts};
use crate::driver::PageDriver;
use crate::error::E2eResult;
use crate::wait::{self, Probe};

pub const UPLOAD_DOWNLOAD_PATH: &str = "/upload-download";
pub const DOWNLOAD_BUTTON: &str = "#downloadButton";
/// Name the site gives its sample download
pub const SAMPLE_FILE: &str = "sampleFile.jpeg";

pub fn downloaded_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Removes a stale copy so a later wait observes the new download.
pub async fn discard_previous(path: &Path) -> E2eResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed previous download {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Polls until `path` exists with non-zero length; returns its size.
///
/// Chrome writes to a `.crdownload` sibling first, so the final name only
/// appears once the transfer is complete.
pub async fn wait_for_download(path: &Path, budget: Budget) -> E2eResult<u64> {
    let what = format!("download {}", path.display());
    let size = wait::until(budget, &what, move || async move {
        Ok(match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => Probe::Ready(meta.len()),
            Ok(_) => Probe::Pending("file is empty".to_string()),
            Err(e) => Probe::Pending(e.to_string()),
        })
    })
    .await?;
    info!("Downloaded {} ({} bytes)", path.display(), size);
    Ok(size)
}

pub async fn open_upload_download(page: &dyn PageDriver, timeouts: &Timeouts) -> E2eResult<()> {
    page.visit(UPLOAD_DOWNLOAD_PATH).await?;
    wait::until(timeouts.page_load_budget(), "download button", move || async move {
        Ok(if page.is_visible(DOWNLOAD_BUTTON).await? {
            Probe::Ready(())
        } else {
            Probe::Pending(format!("{DOWNLOAD_BUTTON} not visible"))
        })
    })
    .await
}

pub async fn click_download(page: &dyn PageDriver) -> E2eResult<()> {
    page.click(DOWNLOAD_BUTTON).await
}
