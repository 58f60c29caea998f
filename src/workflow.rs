//! The operator workflows: catalog search (with optional per-product jobs),
//! full-pipeline job submission, and status polling followed by download.
use crate::catalog::{CatalogFilter, FilterReport};
use crate::config::PepsConfig;
use crate::download_plan::{DownloadPlan, DownloadSummary};
use crate::error::{PepsError, Result};
use crate::job_request::{normalize_tile, JobRequest};
use crate::provider::PepsOps;
use crate::search::{CatalogQuery, DateRange, OpenEnd};
use crate::status_log::{status_path, JobProgress, StatusLogParser};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: CatalogQuery,
    pub filter: CatalogFilter,
    pub json_path: PathBuf,
    pub write_dir: PathBuf,
    pub submit: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct FullMajaRequest {
    pub job: JobRequest,
    pub log_path: PathBuf,
    /// Date span, tile and orbit checks of the full pipeline.
    pub validate: bool,
    pub dry_run: bool,
}

impl FullMajaRequest {
    /// Time-series submission: no period checks, an open end stands for
    /// 9999-01-01 and the log is `<write_dir>/<tile>_<start>_<end>.log`.
    pub fn time_series(
        tile: &str,
        start_date: &str,
        end_date: Option<&str>,
        orbit: Option<u32>,
        write_dir: &Path,
    ) -> Result<Self> {
        let dates = DateRange::parse(start_date, end_date, OpenEnd::FarFuture)?;
        let log_name = format!(
            "{}_{}_{}.log",
            normalize_tile(tile.trim()),
            dates.start_str(),
            dates.end_str()
        );
        Ok(Self {
            job: JobRequest::full_maja(tile, dates, orbit),
            log_path: write_dir.join(log_name),
            validate: false,
            dry_run: false,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub log_path: PathBuf,
    pub write_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub log_path: PathBuf,
    pub accepted: bool,
}

#[derive(Debug)]
pub struct DownloadReport {
    pub progress: JobProgress,
    pub summary: DownloadSummary,
}

fn save_document(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, body)?;
    Ok(())
}

/// Sends an execute request and stores the response in `log_path`.
pub async fn submit_job(
    config: &PepsConfig,
    provider: &impl PepsOps,
    job: &JobRequest,
    log_path: &Path,
) -> Result<Submission> {
    let url = job.to_url(config);
    info!("{url}");

    let response = provider.get_text(&url).await?;
    save_document(log_path, &response.body)?;
    if !response.is_success() {
        return Err(PepsError::HttpStatus {
            status: response.status,
            url,
        });
    }

    Ok(Submission {
        log_path: log_path.to_path_buf(),
        accepted: response.body.contains(&job.accepted_marker()),
    })
}

pub async fn search(
    config: &PepsConfig,
    provider: &impl PepsOps,
    request: &SearchRequest,
) -> Result<FilterReport> {
    if request.json_path.exists() {
        fs::remove_file(&request.json_path)?;
    }

    let url = request.query.to_url(config);
    info!("{url}");
    let response = provider.get_text(&url).await?;
    save_document(&request.json_path, &response.body)?;

    let outcome = request.filter.read(&request.json_path);
    if !response.is_success() {
        // an explicit catalog error says more than the status code
        if let Err(e @ PepsError::Catalog { .. }) = outcome {
            return Err(e);
        }
        return Err(PepsError::HttpStatus {
            status: response.status,
            url,
        });
    }
    let report = outcome?;

    info!(
        "{} feature(s): {} selected, {} not matching, {} skipped as incomplete",
        report.total,
        report.selection.len(),
        report.rejected,
        report.skipped.len()
    );

    if report.selection.is_empty() {
        warn!("No product matches the criteria");
        return Ok(report);
    }

    for (product, selected) in report.selection.iter() {
        println!(
            "{} {} {}",
            product, selected.storage_mode, selected.resource_size
        );
    }

    if request.submit {
        for product in report.selection.keys() {
            let job = JobRequest::maja(product);
            if request.dry_run {
                println!("{}", job.to_url(config));
                continue;
            }
            let log_path = request.write_dir.join(format!("{product}.log"));
            match submit_job(config, provider, &job, &log_path).await {
                Ok(s) if s.accepted => info!("{product}: processing accepted"),
                Ok(s) => warn!("{product}: something is wrong, check {}", s.log_path.display()),
                Err(e) => error!("{product}: submission failed: {e}"),
            }
        }
    }

    Ok(report)
}

/// Submits a tile time series. Returns `None` in dry-run mode.
pub async fn process(
    config: &PepsConfig,
    provider: &impl PepsOps,
    request: &FullMajaRequest,
) -> Result<Option<Submission>> {
    if request.validate {
        request.job.validate()?;
    }

    if request.dry_run {
        println!("{}", request.job.to_url(config));
        return Ok(None);
    }

    let submission = submit_job(config, provider, &request.job, &request.log_path).await?;
    if submission.accepted {
        info!("Request OK !");
    } else {
        warn!(
            "Something is wrong : please check {} file",
            submission.log_path.display()
        );
    }
    Ok(Some(submission))
}

pub async fn download(
    config: &PepsConfig,
    provider: &impl PepsOps,
    request: &DownloadRequest,
) -> Result<DownloadReport> {
    let parser = StatusLogParser::new(config);
    let record = parser.read_job_record(&request.log_path)?;
    info!("job {} status at {}", record.job_id, record.status_url);

    let stat_path = status_path(&request.log_path);
    let response = provider.get_text(&record.status_url).await?;
    save_document(&stat_path, &response.body)?;
    if !response.is_success() {
        return Err(PepsError::HttpStatus {
            status: response.status,
            url: record.status_url,
        });
    }
    info!("Request OK");

    let archives = parser.read_archives(&stat_path)?;
    let progress = JobProgress::from_archives(&archives);
    match progress {
        JobProgress::Pending => warn!("{progress}"),
        _ => info!("{progress}"),
    }

    let plan = DownloadPlan::new(&request.write_dir, archives);
    let summary = plan.execute(provider).await?;
    info!(
        "{} downloaded, {} already on disk, {} too cloudy, {} failed",
        summary.downloaded,
        summary.already_on_disk,
        summary.too_cloudy,
        summary.failed.len()
    );
    if summary.all_failed() {
        return Err(PepsError::AllDownloadsFailed(summary.attempted()));
    }

    Ok(DownloadReport { progress, summary })
}
