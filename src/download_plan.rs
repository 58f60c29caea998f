use crate::error::Result;
use crate::provider::{Fetched, PepsOps};
use crate::status_log::ResultArchive;
use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    TooCloudy,
    AlreadyOnDisk,
    Downloaded { bytes: u64, resumed: bool },
    Failed(String),
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub already_on_disk: usize,
    pub too_cloudy: usize,
    /// (file name, error)
    pub failed: Vec<(String, String)>,
}

impl DownloadSummary {
    fn record(self: &mut Self, archive: &ResultArchive, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::TooCloudy => self.too_cloudy += 1,
            ItemOutcome::AlreadyOnDisk => self.already_on_disk += 1,
            ItemOutcome::Downloaded { .. } => self.downloaded += 1,
            ItemOutcome::Failed(e) => self.failed.push((archive.file_name.clone(), e.clone())),
        }
    }

    pub fn attempted(self: &Self) -> usize {
        self.downloaded + self.failed.len()
    }

    /// True when downloads were attempted and none succeeded.
    pub fn all_failed(self: &Self) -> bool {
        !self.failed.is_empty() && self.downloaded == 0
    }
}

#[derive(Debug)]
pub struct DownloadPlan {
    write_dir: PathBuf,
    archives: Vec<ResultArchive>,
}

impl DownloadPlan {
    pub fn new<P: AsRef<Path>>(write_dir: P, archives: Vec<ResultArchive>) -> Self {
        Self {
            write_dir: write_dir.as_ref().to_path_buf(),
            archives,
        }
    }

    pub fn archives(self: &Self) -> &[ResultArchive] {
        &self.archives
    }

    /// Processes the archives in order. A failed item is recorded in the
    /// summary and the next item is processed.
    pub async fn execute(self: &Self, provider: &impl PepsOps) -> Result<DownloadSummary> {
        if !self.write_dir.exists() {
            fs::create_dir_all(&self.write_dir)?;
        }

        let mut summary = DownloadSummary::default();
        for archive in self.archives.iter() {
            let outcome = self.process(provider, archive).await;
            summary.record(archive, &outcome);
        }
        Ok(summary)
    }

    async fn process(self: &Self, provider: &impl PepsOps, archive: &ResultArchive) -> ItemOutcome {
        if archive.is_too_cloudy() {
            info!("{} was too cloudy", archive.file_name);
            return ItemOutcome::TooCloudy;
        }

        let dst = self.write_dir.join(&archive.file_name);
        if dst.is_file() {
            info!("skipping {}: already on disk", archive.file_name);
            return ItemOutcome::AlreadyOnDisk;
        }

        info!("downloading {}", archive.file_name);
        match try_download(provider, &archive.url, &dst).await {
            Ok(Fetched::Full(bytes)) => {
                info!("{} complete ({} bytes)", archive.file_name, bytes);
                ItemOutcome::Downloaded {
                    bytes,
                    resumed: false,
                }
            }
            Ok(Fetched::Resumed(bytes)) => {
                info!("{} complete ({} bytes resumed)", archive.file_name, bytes);
                ItemOutcome::Downloaded {
                    bytes,
                    resumed: true,
                }
            }
            Err(e) => {
                error!("download of {} failed: {}", archive.file_name, e);
                ItemOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Downloads `url` to `dst` through `<dst>.partial`, resuming a partial file
/// left by an interrupted run. The final name only appears once complete.
pub async fn try_download(provider: &impl PepsOps, url: &str, dst: &Path) -> Result<Fetched> {
    let mut partial = dst.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let mut partial_file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(&partial)?;
    let byte_count = partial_file.metadata()?.len();
    if byte_count > 0 {
        info!("Resuming download after {} bytes", byte_count);
    }

    let fetched = provider.fetch_into(url, byte_count, &mut partial_file).await;
    drop(partial_file);
    let fetched = match fetched {
        Ok(fetched) => fetched,
        Err(e) => {
            // nothing worth resuming
            if fs::metadata(&partial).map(|m| m.len() == 0).unwrap_or(false) {
                if let Err(rm) = fs::remove_file(&partial) {
                    debug!("could not remove {}: {}", partial.display(), rm);
                }
            }
            return Err(e);
        }
    };

    fs::rename(partial, dst)?;
    Ok(fetched)
}
