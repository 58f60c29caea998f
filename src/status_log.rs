//! Parsing of the documents a submitted job leaves behind: the execute
//! response (job identifier) and the job status log (result archives).
use crate::config::PepsConfig;
use crate::error::{PepsError, Result};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const EXECUTE_RESPONSE_MARKER: &str = "<wps:ExecuteResponse";
pub const JOB_ID_PREFIX: &str = "pywps-";
pub const JOB_ID_SUFFIX: &str = ".xml";
/// File name marker of a product rejected for cloud cover.
pub const TOO_CLOUDY_MARKER: &str = "NOVALD";

const ARCHIVE_URL_PATTERN: &str = r#"https:[^\s"'<>]*\.zip"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_id: String,
    pub status_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArchive {
    pub url: String,
    pub file_name: String,
}

impl ResultArchive {
    pub fn from_url(url: &str) -> Self {
        let file_name = url.rsplit('/').next().unwrap_or(url).to_string();
        Self {
            url: url.to_string(),
            file_name,
        }
    }

    pub fn is_too_cloudy(self: &Self) -> bool {
        self.file_name.contains(TOO_CLOUDY_MARKER)
    }
}

/// Where a job stands according to its status log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobProgress {
    /// No archive listed yet. The job may still be running, or it may have
    /// finished without output; the log alone cannot tell.
    Pending,
    TooCloudy { count: usize },
    Completed { archives: usize, too_cloudy: usize },
}

impl JobProgress {
    pub fn from_archives(archives: &[ResultArchive]) -> Self {
        let too_cloudy = archives.iter().filter(|a| a.is_too_cloudy()).count();
        match (archives.len(), too_cloudy) {
            (0, _) => Self::Pending,
            (n, c) if n == c => Self::TooCloudy { count: c },
            (n, c) => Self::Completed {
                archives: n - c,
                too_cloudy: c,
            },
        }
    }
}

impl fmt::Display for JobProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(
                f,
                "no result archive listed: the job is still running or produced nothing, check again later"
            ),
            Self::TooCloudy { count } => {
                write!(f, "all {count} result(s) were too cloudy")
            }
            Self::Completed {
                archives,
                too_cloudy,
            } => write!(
                f,
                "{archives} archive(s) available, {too_cloudy} too cloudy"
            ),
        }
    }
}

/// Status file written next to an execute-response log: `log` becomes `stat`
/// in the file name (`Full_Maja.log` -> `Full_Maja.stat`).
pub fn status_path(log_path: &Path) -> PathBuf {
    let file_name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut status_name = file_name.replace("log", "stat");
    if status_name == file_name {
        status_name.push_str(".stat");
    }
    log_path.with_file_name(status_name)
}

pub struct StatusLogParser<'a> {
    config: &'a PepsConfig,
    archive_re: Regex,
}

fn read_document(what: &'static str, path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PepsError::Document {
        what,
        path: path.to_path_buf(),
        source,
    })
}

impl<'a> StatusLogParser<'a> {
    pub fn new(config: &'a PepsConfig) -> Self {
        let archive_re = Regex::new(ARCHIVE_URL_PATTERN).expect("Regex pattern should always compile");
        Self { config, archive_re }
    }

    /// Job identifier of the first execute-response line carrying one.
    pub fn job_id(content: &str) -> Option<String> {
        content
            .lines()
            .filter(|line| line.starts_with(EXECUTE_RESPONSE_MARKER))
            .find_map(|line| {
                let (_, rest) = line.split_once(JOB_ID_PREFIX)?;
                let (id, _) = rest.split_once(JOB_ID_SUFFIX)?;
                (!id.is_empty()).then(|| id.to_string())
            })
    }

    pub fn job_record(self: &Self, content: &str) -> Option<JobRecord> {
        let job_id = Self::job_id(content)?;
        let status_url = self.config.status_url(&job_id);
        Some(JobRecord { job_id, status_url })
    }

    pub fn read_job_record(self: &Self, path: &Path) -> Result<JobRecord> {
        let content = read_document("log file", path)?;
        self.job_record(&content)
            .ok_or_else(|| PepsError::JobIdNotFound(path.to_path_buf()))
    }

    /// Result archives listed in a status log, in line order. An empty list is
    /// not an error.
    pub fn archives(self: &Self, content: &str) -> Vec<ResultArchive> {
        content
            .lines()
            .filter(|line| line.contains(self.config.result_marker.as_str()))
            .flat_map(|line| self.archive_re.find_iter(line))
            .map(|m| ResultArchive::from_url(m.as_str()))
            .collect()
    }

    pub fn read_archives(self: &Self, path: &Path) -> Result<Vec<ResultArchive>> {
        let content = read_document("status file", path)?;
        Ok(self.archives(&content))
    }
}
