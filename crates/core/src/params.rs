//! Engine configuration.
//!
//! [`LayoutParams`] groups the connector, clustering and refinement settings.
//! Besides the struct fields it accepts a flat list of named options (see
//! [`LayoutParams::set_option`]) so callers can pass `key=value` pairs.

use serde::{Deserialize, Serialize};

use crate::cluster::DbscanParams;
use crate::connect::{ConnectorKind, ConnectorParams};
use crate::error::{LayoutError, Result};
use crate::graphcut::{GraphCutParams, Smoothness};
use crate::pixel::{EdgeWeight, PixelDistance};

/// Names accepted by [`LayoutParams::set_option`].
pub const OPTION_NAMES: &[&str] = &[
    "connector",
    "max_distance",
    "line_spacing_multiplier",
    "tab_multiplier",
    "tab_tolerance",
    "epsilon",
    "eps_multiplier",
    "min_pts",
    "max_neighbor_pairs",
    "distance",
    "refine",
    "smoothness",
    "smoothness_weight",
    "edge_weight",
    "max_sweeps",
    "time_budget_ms",
    "num_threads",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub connector: ConnectorParams,
    pub dbscan: DbscanParams,
    pub graphcut: GraphCutParams,
    /// Worker threads for multi-region analysis; all available cores if unset.
    pub num_threads: Option<usize>,
}

impl LayoutParams {
    /// Builds parameters from `(name, value)` pairs on top of the defaults.
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (name, value) in options {
            params.set_option(name.as_ref(), value.as_ref())?;
        }
        Ok(params)
    }

    /// Sets a single named option.
    ///
    /// Unknown names yield [`LayoutError::UnknownOption`]; values that do not
    /// parse or are out of range yield [`LayoutError::InvalidParameter`].
    /// `"none"` clears the optional settings.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match name.trim() {
            "connector" => {
                self.connector.kind = ConnectorKind::parse(value).ok_or_else(|| {
                    invalid("connector", value, "expected delaunay, region, tabstop or dbscan")
                })?;
            }
            "max_distance" => {
                self.connector.max_distance = parse_optional("max_distance", value)?;
            }
            "line_spacing_multiplier" => {
                self.connector.line_spacing_multiplier =
                    parse_positive("line_spacing_multiplier", value)?;
            }
            "tab_multiplier" => {
                self.connector.tab_multiplier = parse_positive("tab_multiplier", value)?;
            }
            "tab_tolerance" => {
                self.connector.tab_tolerance = parse_non_negative("tab_tolerance", value)?;
            }
            "epsilon" => self.dbscan.epsilon = parse_optional("epsilon", value)?,
            "eps_multiplier" => {
                self.dbscan.eps_multiplier = parse_positive("eps_multiplier", value)?;
            }
            "min_pts" => {
                let n: usize = parse("min_pts", value)?;
                if n == 0 {
                    return Err(invalid("min_pts", value, "must be at least 1"));
                }
                self.dbscan.min_pts = n;
            }
            "max_neighbor_pairs" => {
                let n: usize = parse("max_neighbor_pairs", value)?;
                if n == 0 {
                    return Err(invalid("max_neighbor_pairs", value, "must be at least 1"));
                }
                self.dbscan.max_neighbor_pairs = n;
            }
            "distance" => {
                self.dbscan.distance = PixelDistance::parse(value).ok_or_else(|| {
                    invalid("distance", value, "expected euclidean or angle_weighted")
                })?;
            }
            "refine" => self.graphcut.enabled = parse("refine", value)?,
            "smoothness" => {
                self.graphcut.smoothness = Smoothness::parse(value)
                    .ok_or_else(|| invalid("smoothness", value, "expected potts or circular"))?;
            }
            "smoothness_weight" => {
                self.graphcut.smoothness_weight = parse_non_negative("smoothness_weight", value)?;
            }
            "edge_weight" => {
                self.graphcut.edge_weight = EdgeWeight::parse(value).ok_or_else(|| {
                    invalid("edge_weight", value, "expected edge, orientation or euclidean")
                })?;
            }
            "max_sweeps" => self.graphcut.max_sweeps = parse("max_sweeps", value)?,
            "time_budget_ms" => {
                self.graphcut.time_budget_ms = if is_none(value) {
                    None
                } else {
                    Some(parse("time_budget_ms", value)?)
                }
            }
            "num_threads" => {
                self.num_threads = if is_none(value) {
                    None
                } else {
                    let n: usize = parse("num_threads", value)?;
                    if n == 0 {
                        return Err(invalid("num_threads", value, "must be at least 1"));
                    }
                    Some(n)
                }
            }
            other => return Err(LayoutError::UnknownOption(other.to_string())),
        }
        Ok(())
    }

    /// Checks ranges of values set directly on the struct.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("line_spacing_multiplier", self.connector.line_spacing_multiplier),
            ("tab_multiplier", self.connector.tab_multiplier),
            ("eps_multiplier", self.dbscan.eps_multiplier),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(invalid(name, &v.to_string(), "must be a positive number"));
            }
        }
        let non_negative = [
            ("tab_tolerance", Some(self.connector.tab_tolerance)),
            ("smoothness_weight", Some(self.graphcut.smoothness_weight)),
            ("max_distance", self.connector.max_distance),
            ("epsilon", self.dbscan.epsilon),
        ];
        for (name, v) in non_negative {
            if let Some(v) = v {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(invalid(name, &v.to_string(), "must be a non-negative number"));
                }
            }
        }
        if self.dbscan.min_pts == 0 {
            return Err(invalid("min_pts", "0", "must be at least 1"));
        }
        if self.num_threads == Some(0) {
            return Err(invalid("num_threads", "0", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, value: &str, reason: &'static str) -> LayoutError {
    LayoutError::InvalidParameter {
        name,
        value: value.to_string(),
        reason,
    }
}

fn is_none(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("none")
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| invalid(name, value, "cannot parse value"))
}

fn parse_non_negative(name: &'static str, value: &str) -> Result<f64> {
    let v: f64 = parse(name, value)?;
    if !(v.is_finite() && v >= 0.0) {
        return Err(invalid(name, value, "must be a non-negative number"));
    }
    Ok(v)
}

fn parse_positive(name: &'static str, value: &str) -> Result<f64> {
    let v = parse_non_negative(name, value)?;
    if v == 0.0 {
        return Err(invalid(name, value, "must be a positive number"));
    }
    Ok(v)
}

fn parse_optional(name: &'static str, value: &str) -> Result<Option<f64>> {
    if is_none(value) {
        Ok(None)
    } else {
        parse_non_negative(name, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = LayoutParams::default();
        assert_eq!(params.connector.kind, ConnectorKind::Delaunay);
        assert_eq!(params.connector.line_spacing_multiplier, 2.0);
        assert_eq!(params.dbscan.min_pts, 3);
        assert_eq!(params.dbscan.eps_multiplier, 2.0);
        assert_eq!(params.graphcut.max_sweeps, 2);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_named_options() {
        let params = LayoutParams::from_options([
            ("connector", "dbscan"),
            ("epsilon", "4.5"),
            ("min_pts", "5"),
            ("smoothness", "circular"),
            ("time_budget_ms", "250"),
        ])
        .unwrap();
        assert_eq!(params.connector.kind, ConnectorKind::DbScan);
        assert_eq!(params.dbscan.epsilon, Some(4.5));
        assert_eq!(params.dbscan.min_pts, 5);
        assert_eq!(params.graphcut.smoothness, Smoothness::Circular);
        assert_eq!(params.graphcut.time_budget_ms, Some(250));
    }

    #[test]
    fn test_bad_options_name_the_parameter() {
        let mut params = LayoutParams::default();
        assert!(matches!(
            params.set_option("colour", "red"),
            Err(LayoutError::UnknownOption(name)) if name == "colour"
        ));
        assert!(matches!(
            params.set_option("min_pts", "zero"),
            Err(LayoutError::InvalidParameter { name: "min_pts", .. })
        ));
        assert!(matches!(
            params.set_option("eps_multiplier", "-1"),
            Err(LayoutError::InvalidParameter { name: "eps_multiplier", .. })
        ));
        assert!(params.set_option("epsilon", "none").is_ok());
    }

    #[test]
    fn test_params_deserialize_partially() {
        let json = r#"{"connector": {"kind": "region", "max_distance": 3.0}}"#;
        let params: LayoutParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.connector.kind, ConnectorKind::Region);
        assert_eq!(params.connector.max_distance, Some(3.0));
        assert_eq!(params.connector.tab_multiplier, 1.0);
        assert_eq!(params.dbscan, DbscanParams::default());
    }
}
