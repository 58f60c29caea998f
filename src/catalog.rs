//! Catalog search responses and product selection.
//!
//! Every feature of a response is validated on its own. A feature with a
//! missing or ill-typed field is recorded as skipped and the pass goes on, so
//! the caller can see exactly how many entries were dropped and why.
use crate::error::{PepsError, Result};
use crate::job_request::normalize_tile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageMode {
    Tape,
    Disk,
    Other(String),
}

impl From<String> for StorageMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "tape" => Self::Tape,
            "disk" => Self::Disk,
            _ => Self::Other(s),
        }
    }
}

impl From<StorageMode> for String {
    fn from(mode: StorageMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tape => write!(f, "tape"),
            Self::Disk => write!(f, "disk"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Storage {
    mode: StorageMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Properties {
    product_identifier: String,
    storage: Storage,
    platform: String,
    orbit_number: i64,
    resource_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct FeatureDoc {
    id: String,
    properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFeature {
    pub product_identifier: String,
    pub feature_id: String,
    pub storage_mode: StorageMode,
    pub platform: String,
    pub orbit_number: i64,
    pub resource_size: u64,
}

impl From<FeatureDoc> for CatalogFeature {
    fn from(doc: FeatureDoc) -> Self {
        let p = doc.properties;
        Self {
            product_identifier: p.product_identifier,
            feature_id: doc.id,
            storage_mode: p.storage.mode,
            platform: p.platform,
            orbit_number: p.orbit_number,
            resource_size: p.resource_size,
        }
    }
}

/// Relative orbit of a Sentinel-1 acquisition, in [1, 175]. `None` for other
/// platforms, which carry it in the product identifier instead.
pub fn relative_orbit(platform: &str, orbit_number: i64) -> Option<i64> {
    match platform {
        "S1A" => Some((orbit_number - 73).rem_euclid(175) + 1),
        "S1B" => Some((orbit_number - 27).rem_euclid(175) + 1),
        _ => None,
    }
}

impl CatalogFeature {
    pub fn relative_orbit(self: &Self) -> Option<i64> {
        relative_orbit(&self.platform, self.orbit_number)
    }

    pub fn matches_orbit(self: &Self, orbit: u32) -> bool {
        match self.relative_orbit() {
            Some(relative) => relative == orbit as i64,
            None => self
                .product_identifier
                .contains(&format!("_R{:03}", orbit)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedProduct {
    pub feature_id: String,
    pub storage_mode: StorageMode,
    pub resource_size: u64,
}

/// Selected products keyed by product identifier.
pub type SelectionSet = BTreeMap<String, SelectedProduct>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFeature {
    pub index: usize,
    pub feature_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct FilterReport {
    pub selection: SelectionSet,
    pub skipped: Vec<SkippedFeature>,
    /// Well-formed features that did not meet the criteria.
    pub rejected: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    features: Option<Vec<Value>>,
    #[serde(rename = "ErrorCode")]
    error_code: Option<Value>,
    #[serde(rename = "ErrorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub orbit: Option<u32>,
    /// Platform prefix, e.g. `S2` or `S1A`.
    pub platform: Option<String>,
    pub tile: Option<String>,
}

impl CatalogFilter {
    pub fn read<P: AsRef<Path>>(self: &Self, path: P) -> Result<FilterReport> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PepsError::Document {
            what: "catalog response",
            path: path.to_path_buf(),
            source,
        })?;
        self.apply(&content)
    }

    pub fn apply(self: &Self, content: &str) -> Result<FilterReport> {
        let response: CatalogResponse = serde_json::from_str(content)?;

        if let Some(code) = response.error_code {
            let code = match code {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(PepsError::Catalog {
                code,
                message: response.error_message.unwrap_or_default(),
            });
        }

        let features = response
            .features
            .ok_or_else(|| PepsError::MalformedCatalog("no 'features' sequence".to_string()))?;
        if features.is_empty() {
            return Err(PepsError::NoMatch);
        }

        let mut report = FilterReport {
            total: features.len(),
            ..Default::default()
        };

        for (index, value) in features.into_iter().enumerate() {
            let feature_id = value.get("id").and_then(Value::as_str).map(str::to_owned);
            let feature: CatalogFeature = match serde_json::from_value::<FeatureDoc>(value) {
                Ok(doc) => doc.into(),
                Err(e) => {
                    warn!("Skipping catalog feature #{index} ({feature_id:?}): {e}");
                    report.skipped.push(SkippedFeature {
                        index,
                        feature_id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            info!("{} {}", feature.product_identifier, feature.storage_mode);

            if !self.matches(&feature) {
                report.rejected += 1;
                continue;
            }

            report.selection.insert(
                feature.product_identifier,
                SelectedProduct {
                    feature_id: feature.feature_id,
                    storage_mode: feature.storage_mode,
                    resource_size: feature.resource_size,
                },
            );
        }

        Ok(report)
    }

    pub fn matches(self: &Self, feature: &CatalogFeature) -> bool {
        if let Some(orbit) = self.orbit {
            if !feature.matches_orbit(orbit) {
                return false;
            }
        }
        if let Some(platform) = &self.platform {
            if !feature.platform.starts_with(platform.as_str()) {
                return false;
            }
        }
        if let Some(tile) = &self.tile {
            let tile = tile.trim().to_uppercase();
            // trailing `%` matches any tile starting with the prefix
            let tile = normalize_tile(&tile);
            let tile = tile.strip_suffix('%').unwrap_or(tile);
            if !feature.product_identifier.contains(&format!("_T{tile}")) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(id: &str, prod: &str, platform: &str, orbit: i64) -> Value {
        json!({
            "id": id,
            "properties": {
                "productIdentifier": prod,
                "storage": {"mode": "disk"},
                "platform": platform,
                "orbitNumber": orbit,
                "resourceSize": 1024
            }
        })
    }

    const S2_R051: &str = "S2A_MSIL1C_20180105T105421_N0206_R051_T31TCJ_20180105T143409";
    const S2_R008: &str = "S2B_MSIL1C_20180110T105339_N0206_R008_T31TCJ_20180110T130827";

    #[test]
    fn test_relative_orbit_formulas() {
        assert_eq!(relative_orbit("S1A", 73), Some(1));
        assert_eq!(relative_orbit("S1A", 247), Some(175));
        assert_eq!(relative_orbit("S1A", 248), Some(1));
        assert_eq!(relative_orbit("S1B", 27), Some(1));
        assert_eq!(relative_orbit("S1B", 10), Some(159));
        assert_eq!(relative_orbit("S2A", 10), None);
        for n in 0..2000 {
            let a = relative_orbit("S1A", n).unwrap();
            let b = relative_orbit("S1B", n).unwrap();
            assert!((1..=175).contains(&a));
            assert!((1..=175).contains(&b));
            assert_eq!(a, ((n - 73).rem_euclid(175)) + 1);
        }
    }

    #[test]
    fn test_no_features_is_no_match() {
        let err = CatalogFilter::default()
            .apply(r#"{"type": "FeatureCollection", "features": []}"#)
            .unwrap_err();
        assert!(matches!(err, PepsError::NoMatch));
    }

    #[test]
    fn test_error_code_surfaces_message() {
        let err = CatalogFilter::default()
            .apply(r#"{"ErrorCode": 400, "ErrorMessage": "Invalid productType"}"#)
            .unwrap_err();
        match err {
            PepsError::Catalog { code, message } => {
                assert_eq!(code, "400");
                assert_eq!(message, "Invalid productType");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_features_is_malformed() {
        let err = CatalogFilter::default().apply(r#"{"type": "x"}"#).unwrap_err();
        assert!(matches!(err, PepsError::MalformedCatalog(_)));
    }

    #[test]
    fn test_incomplete_features_are_skipped_and_counted() {
        let mut broken = feature("f2", S2_R008, "S2B", 4000);
        broken["properties"]
            .as_object_mut()
            .unwrap()
            .remove("resourceSize");
        let response = json!({"features": [feature("f1", S2_R051, "S2A", 13000), broken, {"id": 3}]});

        let report = CatalogFilter::default().apply(&response.to_string()).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.selection.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].feature_id.as_deref(), Some("f2"));
        assert_eq!(report.skipped[1].feature_id, None);
    }

    #[test]
    fn test_orbit_filter_sentinel2() {
        let response = json!({"features": [
            feature("f1", S2_R051, "S2A", 13000),
            feature("f2", S2_R008, "S2B", 4000),
        ]});
        let filter = CatalogFilter {
            orbit: Some(51),
            ..Default::default()
        };
        let report = filter.apply(&response.to_string()).unwrap();
        assert_eq!(report.selection.len(), 1);
        assert_eq!(report.rejected, 1);
        let selected = &report.selection[S2_R051];
        assert_eq!(selected.feature_id, "f1");
        assert_eq!(selected.storage_mode, StorageMode::Disk);
        assert_eq!(selected.resource_size, 1024);
    }

    #[test]
    fn test_orbit_filter_sentinel1_uses_computed_orbit() {
        // 73 + 29 -> relative orbit 30; the identifier carries no _R030 marker
        let response = json!({"features": [
            feature("a", "S1A_IW_GRDH_1SDV_20180101T055000_A", "S1A", 102),
            feature("b", "S1A_IW_GRDH_1SDV_20180102T055000_B", "S1A", 103),
        ]});
        let filter = CatalogFilter {
            orbit: Some(30),
            ..Default::default()
        };
        let report = filter.apply(&response.to_string()).unwrap();
        assert_eq!(report.selection.len(), 1);
        assert!(report
            .selection
            .contains_key("S1A_IW_GRDH_1SDV_20180101T055000_A"));
    }

    #[test]
    fn test_platform_and_tile_filters() {
        let response = json!({"features": [
            feature("f1", S2_R051, "S2A", 13000),
            feature("f2", S2_R008, "S2B", 4000),
            feature("f3", "S2A_MSIL1C_20180105T105421_N0206_R051_T31TCK_20180105T143409", "S2A", 13000),
        ]});
        let filter = CatalogFilter {
            platform: Some("S2A".to_string()),
            tile: Some("T31tcj".to_string()),
            ..Default::default()
        };
        let report = filter.apply(&response.to_string()).unwrap();
        assert_eq!(report.selection.keys().collect::<Vec<_>>(), vec![S2_R051]);
        assert_eq!(report.rejected, 2);
    }

    #[test]
    fn test_tile_filter_case_and_wildcard() {
        let response = json!({"features": [
            feature("f1", S2_R051, "S2A", 13000),
            feature("f2", "S2A_MSIL1C_20180105T105421_N0206_R051_T31UDP_20180105T143409", "S2A", 13000),
        ]});
        for tile in ["t31tcj", "31TC%", "t31tc%", "31tcj"] {
            let filter = CatalogFilter {
                tile: Some(tile.to_string()),
                ..Default::default()
            };
            let report = filter.apply(&response.to_string()).unwrap();
            assert_eq!(
                report.selection.keys().collect::<Vec<_>>(),
                vec![S2_R051],
                "tile {tile}"
            );
        }

        let filter = CatalogFilter {
            tile: Some("31%".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.apply(&response.to_string()).unwrap().selection.len(), 2);
    }

    #[test]
    fn test_duplicate_identifier_last_wins() {
        let response = json!({"features": [
            feature("first", S2_R051, "S2A", 13000),
            feature("second", S2_R051, "S2A", 13000),
        ]});
        let report = CatalogFilter::default().apply(&response.to_string()).unwrap();
        assert_eq!(report.selection.len(), 1);
        assert_eq!(report.selection[S2_R051].feature_id, "second");
    }

    #[test]
    fn test_storage_mode_parsing() {
        assert_eq!(StorageMode::from("tape".to_string()), StorageMode::Tape);
        assert_eq!(
            StorageMode::from("staging".to_string()),
            StorageMode::Other("staging".to_string())
        );
        assert_eq!(StorageMode::Other("staging".to_string()).to_string(), "staging");
    }
}
