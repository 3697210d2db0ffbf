use postmap_core::config::MapConfig;
use postmap_core::error::{ErrorCode, PostmapError};
use postmap_core::model::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_THRESHOLD: f32 = 0.9;
pub const DEFAULT_K: usize = 3;
pub const DEFAULT_MAX_NODES: usize = 200;
pub const DEFAULT_MAX_EDGES: usize = 2000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamsError {
    #[error("invalid value for {name}: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("invalid map query: {0}")]
    InvalidJson(String),
    #[error("malformed query string: {0}")]
    InvalidQuery(String),
}

impl PostmapError for ParamsError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

/// Which posts a map covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapScope {
    All,
    ByAuthor(UserId),
}

impl fmt::Display for MapScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapScope::All => write!(f, "all"),
            MapScope::ByAuthor(author_id) => write!(f, "author-{author_id}"),
        }
    }
}

/// Map request parameters as they arrive from a caller. Missing fields take the defaults.
///
/// The integer bounds are kept as floats so that fractional or negative input can be floored
/// and clamped instead of rejected.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapQueryParams {
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub k: Option<f64>,
    #[serde(default)]
    pub max_nodes: Option<f64>,
    #[serde(default)]
    pub max_edges: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapDefaults {
    pub threshold: f32,
    pub k: usize,
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            k: DEFAULT_K,
            max_nodes: DEFAULT_MAX_NODES,
            max_edges: DEFAULT_MAX_EDGES,
        }
    }
}

impl From<&MapConfig> for MapDefaults {
    fn from(config: &MapConfig) -> Self {
        Self {
            threshold: config.threshold,
            k: config.k,
            max_nodes: config.max_nodes,
            max_edges: config.max_edges,
        }
    }
}

/// Effective parameters of one build; also the parameter part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMapParams {
    pub threshold: f32,
    pub k: usize,
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl MapQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k = Some(k as f64);
        self
    }

    pub fn max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes as f64);
        self
    }

    pub fn max_edges(mut self, max_edges: usize) -> Self {
        self.max_edges = Some(max_edges as f64);
        self
    }

    pub fn parse_json(raw: &str) -> Result<Self, ParamsError> {
        serde_json::from_str(raw).map_err(|err| ParamsError::InvalidJson(err.to_string()))
    }

    /// Reads `threshold`, `k`, `maxNodes` and `maxEdges` from a URL query string.
    /// Keys and values are percent-decoded. Unknown keys and empty values are ignored.
    pub fn from_query_str(query: &str) -> Result<Self, ParamsError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let raw: RawQueryParams = serde_urlencoded::from_str(query)
            .map_err(|err| ParamsError::InvalidQuery(err.to_string()))?;

        Ok(Self {
            threshold: parse_field("threshold", raw.threshold)?.map(|value| value as f32),
            k: parse_field("k", raw.k)?,
            max_nodes: parse_field("maxNodes", raw.max_nodes)?,
            max_edges: parse_field("maxEdges", raw.max_edges)?,
        })
    }

    /// Applies defaults, floors the integer bounds and clamps them at zero.
    pub fn resolve(&self, defaults: &MapDefaults) -> ResolvedMapParams {
        ResolvedMapParams {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            k: self.k.map(floor_non_negative).unwrap_or(defaults.k),
            max_nodes: self
                .max_nodes
                .map(floor_non_negative)
                .unwrap_or(defaults.max_nodes),
            max_edges: self
                .max_edges
                .map(floor_non_negative)
                .unwrap_or(defaults.max_edges),
        }
    }
}

/// Query-string form of `MapQueryParams` before numeric validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQueryParams {
    threshold: Option<String>,
    k: Option<String>,
    max_nodes: Option<String>,
    max_edges: Option<String>,
}

fn parse_field(name: &'static str, raw: Option<String>) -> Result<Option<f64>, ParamsError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_number(name, value).map(Some),
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<f64, ParamsError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| ParamsError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

fn floor_non_negative(value: f64) -> usize {
    if value.is_nan() {
        return 0;
    }
    // `as` saturates on overflow.
    value.floor().max(0.0) as usize
}

/// Every effective parameter is part of the key, so explicit defaults and omitted fields share
/// one entry.
pub fn cache_key(scope: MapScope, params: &ResolvedMapParams) -> String {
    format!(
        "map:{scope}:t={}:k={}:n={}:e={}",
        params.threshold, params.k, params.max_nodes, params.max_edges
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_applies_defaults() {
        let resolved = MapQueryParams::new().resolve(&MapDefaults::default());
        assert_eq!(
            resolved,
            ResolvedMapParams {
                threshold: 0.9,
                k: 3,
                max_nodes: 200,
                max_edges: 2000,
            }
        );
    }

    #[test]
    fn resolve_floors_and_clamps_bounds() {
        let params = MapQueryParams {
            threshold: Some(0.5),
            k: Some(2.7),
            max_nodes: Some(-4.0),
            max_edges: Some(10.9),
        };
        let resolved = params.resolve(&MapDefaults::default());
        assert_eq!(resolved.threshold, 0.5);
        assert_eq!(resolved.k, 2);
        assert_eq!(resolved.max_nodes, 0);
        assert_eq!(resolved.max_edges, 10);
    }

    #[test]
    fn explicit_defaults_share_cache_key_with_omitted_fields() {
        let defaults = MapDefaults::default();
        let implicit = MapQueryParams::new().resolve(&defaults);
        let explicit = MapQueryParams::new()
            .threshold(0.9)
            .k(3)
            .max_nodes(200)
            .max_edges(2000)
            .resolve(&defaults);

        assert_eq!(
            cache_key(MapScope::All, &implicit),
            cache_key(MapScope::All, &explicit)
        );
        assert_eq!(
            cache_key(MapScope::All, &implicit),
            "map:all:t=0.9:k=3:n=200:e=2000"
        );
    }

    #[test]
    fn cache_key_separates_scopes() {
        let resolved = MapQueryParams::new().resolve(&MapDefaults::default());
        assert_ne!(
            cache_key(MapScope::ByAuthor(1), &resolved),
            cache_key(MapScope::ByAuthor(2), &resolved)
        );
        assert!(cache_key(MapScope::ByAuthor(7), &resolved).starts_with("map:author-7:"));
    }

    #[test]
    fn parses_query_string() {
        let params =
            MapQueryParams::from_query_str("?threshold=0.8&k=5&maxNodes=50&maxEdges=&page=2")
                .unwrap();
        assert_eq!(params.threshold, Some(0.8));
        assert_eq!(params.k, Some(5.0));
        assert_eq!(params.max_nodes, Some(50.0));
        assert_eq!(params.max_edges, None);
    }

    #[test]
    fn rejects_non_numeric_query_values() {
        let err = MapQueryParams::from_query_str("k=three").unwrap_err();
        assert_eq!(
            err,
            ParamsError::InvalidNumber {
                name: "k",
                value: "three".to_string(),
            }
        );
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
        assert!(MapQueryParams::from_query_str("threshold=NaN").is_err());
    }

    #[test]
    fn decodes_percent_encoded_keys_and_values() {
        let params = MapQueryParams::from_query_str("threshold=0%2E8&maxNodes=%35").unwrap();
        assert_eq!(params.threshold, Some(0.8));
        assert_eq!(params.max_nodes, Some(5.0));

        let params = MapQueryParams::from_query_str("max%4Eodes=5&maxEdges=%20").unwrap();
        assert_eq!(params.max_nodes, Some(5.0));
        assert_eq!(params.max_edges, None);
    }

    #[test]
    fn rejects_repeated_keys() {
        let err = MapQueryParams::from_query_str("k=1&k=2").unwrap_err();
        assert!(matches!(err, ParamsError::InvalidQuery(_)));
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn parses_camel_case_json() {
        let params = MapQueryParams::parse_json(r#"{"maxEdges": 1, "k": 4}"#).unwrap();
        assert_eq!(params.max_edges, Some(1.0));
        assert_eq!(params.k, Some(4.0));
        assert_eq!(params.threshold, None);

        assert!(matches!(
            MapQueryParams::parse_json("{\"k\": \"x\"}"),
            Err(ParamsError::InvalidJson(_))
        ));
    }
}
