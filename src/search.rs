//! Catalog search requests: geometry, date range and the search URL.
use crate::config::PepsConfig;
use crate::error::{PepsError, Result};
use crate::query::QueryBuilder;
use chrono::{Local, NaiveDate};

#[derive(Debug, Clone, PartialEq)]
pub enum SearchGeometry {
    Point {
        lat: f64,
        lon: f64,
    },
    Rectangle {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
    NamedLocation {
        name: String,
    },
}

/// Raw geometry options as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct GeometryParts {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub lat_min: Option<f64>,
    pub lat_max: Option<f64>,
    pub lon_min: Option<f64>,
    pub lon_max: Option<f64>,
    pub location: Option<String>,
}

impl SearchGeometry {
    /// Exactly one of point, rectangle or location must be fully given.
    pub fn from_parts(parts: &GeometryParts) -> Result<Self> {
        let point = [parts.lat, parts.lon];
        let rect = [parts.lat_min, parts.lat_max, parts.lon_min, parts.lon_max];

        let point_given = point.iter().any(Option::is_some);
        let rect_given = rect.iter().any(Option::is_some);
        let location_given = parts.location.is_some();

        let given = [point_given, rect_given, location_given]
            .iter()
            .filter(|g| **g)
            .count();
        if given == 0 {
            return Err(PepsError::Validation(
                "provide at least a point, a rectangle or a location".to_string(),
            ));
        }
        if given > 1 {
            return Err(PepsError::Validation(
                "choose one of point, rectangle or location, not several".to_string(),
            ));
        }

        if let Some(name) = &parts.location {
            if name.trim().is_empty() {
                return Err(PepsError::Validation("empty location name".to_string()));
            }
            return Ok(Self::NamedLocation { name: name.clone() });
        }

        if point_given {
            return match point {
                [Some(lat), Some(lon)] => Ok(Self::Point { lat, lon }),
                _ => Err(PepsError::Validation(
                    "a point needs both --lat and --lon".to_string(),
                )),
            };
        }

        match rect {
            [Some(lat_min), Some(lat_max), Some(lon_min), Some(lon_max)] => Ok(Self::Rectangle {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            }),
            _ => Err(PepsError::Validation(
                "a rectangle needs --latmin, --latmax, --lonmin and --lonmax".to_string(),
            )),
        }
    }

    fn append_to(self: &Self, query: QueryBuilder) -> QueryBuilder {
        match self {
            Self::Point { lat, lon } => query.pair("lat", lat).pair("lon", lon),
            Self::Rectangle {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => query.list("box", &[lon_min, lat_min, lon_max, lat_max]),
            Self::NamedLocation { name } => query.pair("q", name),
        }
    }
}

/// What an unspecified end date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenEnd {
    Today,
    FarFuture,
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const MIN_SPAN_DAYS: i64 = 55;
pub const MAX_SPAN_DAYS: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| PepsError::Validation(format!("date '{s}' is not YYYY-MM-DD: {e}")))
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(PepsError::Validation(format!(
                "end date {end} is before start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: Option<&str>, open_end: OpenEnd) -> Result<Self> {
        let start = parse_date(start)?;
        let end = match end {
            Some(end) => parse_date(end)?,
            None => match open_end {
                OpenEnd::Today => Local::now().date_naive(),
                OpenEnd::FarFuture => NaiveDate::from_ymd_opt(9999, 1, 1)
                    .ok_or_else(|| PepsError::Validation("invalid sentinel date".to_string()))?,
            },
        };
        Self::new(start, end)
    }

    pub fn span_days(self: &Self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Full-pipeline check: the span must lie in [55, 366] days.
    pub fn validate_span(self: &Self) -> Result<()> {
        let days = self.span_days();
        if !(MIN_SPAN_DAYS..=MAX_SPAN_DAYS).contains(&days) {
            return Err(PepsError::Validation(format!(
                "the time interval must be between {MIN_SPAN_DAYS} and {MAX_SPAN_DAYS} days, got {days}"
            )));
        }
        Ok(())
    }

    pub fn start_str(self: &Self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(self: &Self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub geometry: SearchGeometry,
    pub dates: DateRange,
    pub product_type: Option<String>,
    pub max_records: Option<u32>,
}

impl CatalogQuery {
    /// Builds `<catalog>/<collection>/search.json?<geometry>&startDate=..&completionDate=..&maxRecords=..&productType=..`
    pub fn to_url(self: &Self, config: &PepsConfig) -> String {
        let product_type = self
            .product_type
            .as_deref()
            .unwrap_or(config.product_type.as_str());
        let max_records = self.max_records.unwrap_or(config.max_records);

        self.geometry
            .append_to(QueryBuilder::new())
            .pair("startDate", self.dates.start_str())
            .pair("completionDate", self.dates.end_str())
            .pair("maxRecords", max_records)
            .pair("productType", product_type)
            .to_url(&config.search_endpoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates() -> DateRange {
        DateRange::parse("2018-01-01", Some("2018-03-01"), OpenEnd::FarFuture).unwrap()
    }

    #[test]
    fn test_single_geometry_accepted() {
        let point = GeometryParts {
            lat: Some(43.6),
            lon: Some(1.44),
            ..Default::default()
        };
        assert_eq!(
            SearchGeometry::from_parts(&point).unwrap(),
            SearchGeometry::Point { lat: 43.6, lon: 1.44 }
        );

        let rect = GeometryParts {
            lat_min: Some(43.0),
            lat_max: Some(44.0),
            lon_min: Some(1.0),
            lon_max: Some(2.0),
            ..Default::default()
        };
        assert!(matches!(
            SearchGeometry::from_parts(&rect).unwrap(),
            SearchGeometry::Rectangle { .. }
        ));

        let location = GeometryParts {
            location: Some("Toulouse".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            SearchGeometry::from_parts(&location).unwrap(),
            SearchGeometry::NamedLocation { .. }
        ));
    }

    #[test]
    fn test_location_and_point_rejected() {
        let parts = GeometryParts {
            lat: Some(43.6),
            lon: Some(1.44),
            location: Some("Toulouse".to_string()),
            ..Default::default()
        };
        let err = SearchGeometry::from_parts(&parts).unwrap_err();
        assert!(matches!(err, PepsError::Validation(_)));
    }

    #[test]
    fn test_no_geometry_rejected() {
        let err = SearchGeometry::from_parts(&GeometryParts::default()).unwrap_err();
        assert!(matches!(err, PepsError::Validation(_)));
    }

    #[test]
    fn test_partial_geometry_rejected() {
        let half_point = GeometryParts {
            lat: Some(43.6),
            ..Default::default()
        };
        assert!(SearchGeometry::from_parts(&half_point).is_err());

        let half_rect = GeometryParts {
            lat_min: Some(43.0),
            lon_max: Some(2.0),
            ..Default::default()
        };
        assert!(SearchGeometry::from_parts(&half_rect).is_err());
    }

    #[test]
    fn test_span_validation() {
        let long = DateRange::parse("2018-01-01", Some("2019-02-05"), OpenEnd::Today).unwrap();
        assert_eq!(long.span_days(), 400);
        assert!(long.validate_span().is_err());

        let short = DateRange::parse("2018-01-01", Some("2018-03-02"), OpenEnd::Today).unwrap();
        assert_eq!(short.span_days(), 60);
        assert!(short.validate_span().is_ok());
    }

    #[test]
    fn test_open_end_defaults() {
        let far = DateRange::parse("2018-01-01", None, OpenEnd::FarFuture).unwrap();
        assert_eq!(far.end_str(), "9999-01-01");

        let today = DateRange::parse("2018-01-01", None, OpenEnd::Today).unwrap();
        assert_eq!(today.end, Local::now().date_naive());
    }

    #[test]
    fn test_bad_dates() {
        assert!(DateRange::parse("2018-13-01", None, OpenEnd::Today).is_err());
        assert!(DateRange::parse("2018-03-01", Some("2018-01-01"), OpenEnd::Today).is_err());
    }

    #[test]
    fn test_point_query_url() {
        let query = CatalogQuery {
            geometry: SearchGeometry::Point { lat: 44.0, lon: 1.5 },
            dates: dates(),
            product_type: None,
            max_records: None,
        };
        assert_eq!(
            query.to_url(&PepsConfig::default()),
            "https://peps.cnes.fr/resto/api/collections/S2ST/search.json?lat=44&lon=1.5\
             &startDate=2018-01-01&completionDate=2018-03-01&maxRecords=500&productType=S2MSI1C"
        );
    }

    #[test]
    fn test_box_and_location_query_url() {
        let rect = CatalogQuery {
            geometry: SearchGeometry::Rectangle {
                lat_min: 43.0,
                lat_max: 44.0,
                lon_min: 1.0,
                lon_max: 2.5,
            },
            dates: dates(),
            product_type: Some("GRD".to_string()),
            max_records: Some(10),
        };
        let url = rect.to_url(&PepsConfig::default());
        assert!(url.contains("?box=1,43,2.5,44&"));
        assert!(url.ends_with("&maxRecords=10&productType=GRD"));

        let location = CatalogQuery {
            geometry: SearchGeometry::NamedLocation {
                name: "Toulouse".to_string(),
            },
            dates: dates(),
            product_type: None,
            max_records: None,
        };
        assert!(location
            .to_url(&PepsConfig::default())
            .contains("search.json?q=Toulouse&startDate="));
    }
}
