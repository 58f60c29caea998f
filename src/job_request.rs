//! WPS `execute` requests that start MAJA processing on the server.
use crate::config::PepsConfig;
use crate::error::{PepsError, Result};
use crate::query::QueryBuilder;
use crate::search::DateRange;
use regex::Regex;

pub const MIN_ORBIT: u32 = 1;
pub const MAX_ORBIT: u32 = 143;

const TILE_PATTERN: &str = r"^[0-6][0-9][A-Za-z][A-Za-z]{0,2}%?$";

/// Strips the optional leading `T` of an MGRS tile name (`T31TCJ` -> `31TCJ`).
pub fn normalize_tile(tile: &str) -> &str {
    tile.strip_prefix(|c: char| c == 'T' || c == 't').unwrap_or(tile)
}

pub fn validate_tile(tile: &str) -> Result<()> {
    let re = Regex::new(TILE_PATTERN).expect("Regex pattern should always compile");
    if !re.is_match(tile) {
        return Err(PepsError::Validation(format!(
            "the tile ID '{tile}' is in the wrong format"
        )));
    }
    Ok(())
}

pub fn validate_orbit(orbit: u32) -> Result<()> {
    if !(MIN_ORBIT..=MAX_ORBIT).contains(&orbit) {
        return Err(PepsError::Validation(format!(
            "the relative orbit number must be between {MIN_ORBIT} and {MAX_ORBIT}, got {orbit}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    /// Whole time series over a tile.
    FullMaja {
        tile: String,
        dates: DateRange,
        orbit: Option<u32>,
    },
    /// One product already found in the catalog.
    Maja { product: String },
}

impl JobRequest {
    pub fn full_maja(tile: &str, dates: DateRange, orbit: Option<u32>) -> Self {
        Self::FullMaja {
            tile: normalize_tile(tile.trim()).to_string(),
            dates,
            orbit,
        }
    }

    pub fn maja(product: &str) -> Self {
        Self::Maja {
            product: product.to_string(),
        }
    }

    /// Checks done before a full-pipeline submission: tile format, orbit range
    /// and date span.
    pub fn validate(self: &Self) -> Result<()> {
        match self {
            Self::FullMaja { tile, dates, orbit } => {
                dates.validate_span()?;
                if let Some(orbit) = orbit {
                    validate_orbit(*orbit)?;
                }
                validate_tile(tile)
            }
            Self::Maja { product } if product.is_empty() => {
                Err(PepsError::Validation("empty product identifier".to_string()))
            }
            Self::Maja { .. } => Ok(()),
        }
    }

    pub fn identifier(self: &Self) -> &'static str {
        match self {
            Self::FullMaja { .. } => "FULL_MAJA",
            Self::Maja { .. } => "MAJA",
        }
    }

    /// Text the service puts in the execute response of an accepted job.
    pub fn accepted_marker(self: &Self) -> String {
        format!("Process {} accepted", self.identifier())
    }

    fn data_inputs(self: &Self) -> Vec<(String, String)> {
        match self {
            Self::FullMaja { tile, dates, orbit } => {
                let mut inputs = vec![
                    ("startDate".to_string(), dates.start_str()),
                    ("completionDate".to_string(), dates.end_str()),
                    ("tileid".to_string(), tile.clone()),
                ];
                if let Some(orbit) = orbit {
                    inputs.push(("relativeOrbitNumber".to_string(), orbit.to_string()));
                }
                inputs
            }
            Self::Maja { product } => vec![("product".to_string(), product.clone())],
        }
    }

    pub fn to_url(self: &Self, config: &PepsConfig) -> String {
        QueryBuilder::new()
            .pair("request", "execute")
            .pair("service", "WPS")
            .pair("version", "1.0.0")
            .pair("identifier", self.identifier())
            .nested("datainputs", self.data_inputs())
            .pair("status", true)
            .pair("storeExecuteResponse", true)
            .to_url(&config.wps_base)
    }
}
