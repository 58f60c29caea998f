use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CATALOG_BASE: &str = "https://peps.cnes.fr/resto/api/collections";
pub const DEFAULT_WPS_BASE: &str = "https://peps.cnes.fr/resto/wps";
pub const DEFAULT_STATUS_LOG_TEMPLATE: &str =
    "https://peps.cnes.fr/cgi-bin/mapcache_results/logs/joblog-{id}.log";
pub const DEFAULT_RESULT_MARKER: &str =
    "https://peps.cnes.fr/cgi-bin/mapcache_results/maja/8cd3cfe2-f263-11ea-a8ad-0242ac110002";

/// Service endpoints and catalog defaults. Built once at startup and passed by
/// reference into every component.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PepsConfig {
    pub catalog_base: String,
    pub collection: String,
    pub product_type: String,
    pub max_records: u32,
    pub wps_base: String,
    /// `{id}` is replaced by the job identifier.
    pub status_log_template: String,
    pub result_marker: String,
    pub accept_invalid_certs: bool,
}

impl Default for PepsConfig {
    fn default() -> Self {
        Self {
            catalog_base: DEFAULT_CATALOG_BASE.to_string(),
            collection: "S2ST".to_string(),
            product_type: "S2MSI1C".to_string(),
            max_records: 500,
            wps_base: DEFAULT_WPS_BASE.to_string(),
            status_log_template: DEFAULT_STATUS_LOG_TEMPLATE.to_string(),
            result_marker: DEFAULT_RESULT_MARKER.to_string(),
            accept_invalid_certs: false,
        }
    }
}

impl PepsConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        Ok(config)
    }

    /// `<catalog_base>/<collection>/search.json`
    pub fn search_endpoint(self: &Self) -> String {
        format!(
            "{}/{}/search.json",
            self.catalog_base.trim_end_matches('/'),
            self.collection
        )
    }

    pub fn status_url(self: &Self, job_id: &str) -> String {
        self.status_log_template.replace("{id}", job_id)
    }
}

pub fn config_template() -> toml::Table {
    toml::toml! {
        catalog_base = "https://peps.cnes.fr/resto/api/collections"

        // S1, S2, S2ST, S3 or SpotWorldHeritage
        collection = "S2ST"

        product_type = "S2MSI1C"

        max_records = 500

        wps_base = "https://peps.cnes.fr/resto/wps"

        status_log_template = "https://peps.cnes.fr/cgi-bin/mapcache_results/logs/joblog-{id}.log"

        result_marker = "https://peps.cnes.fr/cgi-bin/mapcache_results/maja/8cd3cfe2-f263-11ea-a8ad-0242ac110002"

        accept_invalid_certs = false
    }
}
