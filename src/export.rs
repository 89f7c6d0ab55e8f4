/// GeoJSON point files and tabular outputs.
///
/// Well sets are exchanged as RFC 7946 FeatureCollections of Point features in
/// WGS84. Properties are kept as a JSON map so attributes added by earlier
/// steps survive every later step.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::analysis::bias::CdfPoint;
use crate::model::{WeightedWell, WellPoint, WellSummary};
use crate::weighting::validate::has_valid_geometry;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not a FeatureCollection (type = '{0}')")]
    NotFeatureCollection(String),
    #[error("feature {index}: missing or invalid '{field}'")]
    InvalidField { index: usize, field: String },
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// One point feature; `geometry` is `None` for null or non-point geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<[f64; 2]>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Option<[f64; 2]>) -> Self {
        Self {
            geometry,
            properties: Map::new(),
        }
    }

    /// Numeric property, `None` when absent, null or non-numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Sets a numeric property; `None` and non-finite values become null.
    pub fn set_f64(&mut self, key: &str, value: Option<f64>) {
        let v = value
            .filter(|v| v.is_finite())
            .map_or(Value::Null, Value::from);
        self.properties.insert(key.to_string(), v);
    }
}

#[derive(Serialize, Deserialize)]
struct CollectionDoc {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<FeatureDoc>,
}

#[derive(Serialize, Deserialize)]
struct FeatureDoc {
    #[serde(rename = "type")]
    kind: String,
    geometry: Option<GeometryDoc>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Serialize, Deserialize)]
struct GeometryDoc {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

fn point_from_doc(geometry: Option<GeometryDoc>) -> Option<[f64; 2]> {
    let geometry = geometry?;
    if geometry.kind != "Point" {
        return None;
    }
    let coords = geometry.coordinates.as_array()?;
    let x = coords.first()?.as_f64()?;
    let y = coords.get(1)?.as_f64()?;
    Some([x, y])
}

/// Parses a FeatureCollection from a JSON string.
pub fn parse_feature_collection(json: &str) -> Result<Vec<Feature>, ExportError> {
    let doc: CollectionDoc = serde_json::from_str(json)?;
    from_doc(doc)
}

fn from_doc(doc: CollectionDoc) -> Result<Vec<Feature>, ExportError> {
    if doc.kind != "FeatureCollection" {
        return Err(ExportError::NotFeatureCollection(doc.kind));
    }
    Ok(doc
        .features
        .into_iter()
        .map(|f| Feature {
            geometry: point_from_doc(f.geometry),
            properties: f.properties.unwrap_or_default(),
        })
        .collect())
}

/// Reads a GeoJSON FeatureCollection file.
pub fn read_features(path: impl AsRef<Path>) -> Result<Vec<Feature>, ExportError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let doc: CollectionDoc = serde_json::from_reader(reader)?;
    from_doc(doc)
}

/// Serializes features as a pretty-printed FeatureCollection.
pub fn feature_collection_json(features: &[Feature]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&to_doc(features))?)
}

fn to_doc(features: &[Feature]) -> CollectionDoc {
    CollectionDoc {
        kind: "FeatureCollection".to_string(),
        features: features
            .iter()
            .map(|f| FeatureDoc {
                kind: "Feature".to_string(),
                geometry: f.geometry.map(|[x, y]| GeometryDoc {
                    kind: "Point".to_string(),
                    coordinates: Value::from(vec![x, y]),
                }),
                properties: Some(f.properties.clone()),
            })
            .collect(),
    }
}

/// Writes features to a GeoJSON file, creating parent directories.
pub fn write_features(path: impl AsRef<Path>, features: &[Feature]) -> Result<(), ExportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &to_doc(features))?;
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Domain conversions
// ---------------------------------------------------------------------------

impl From<&WellSummary> for Feature {
    fn from(well: &WellSummary) -> Self {
        let geometry = well.coordinates().map(|(x, y)| [x, y]);
        let mut f = Feature::new(geometry);
        f.set("id_gerbil", well.id_gerbil);
        f.set("id_orig_src", well.id_orig_src.clone());
        f.set_f64("x_wgs84", well.x_wgs84);
        f.set_f64("y_wgs84", well.y_wgs84);
        f.set_f64("orig_elev_m_asl", well.orig_elev_m_asl);
        f.set_f64("glo90_elev_m_asl", well.glo90_elev_m_asl);
        f.set_f64("mean_gwh_m", well.mean_gwh_m);
        f.set("n_years", well.n_years);
        f.set("glim_raw", well.glim_raw);
        f.set("litho_class", well.litho_class);
        f
    }
}

/// Builds engine input from features.
///
/// The id property may be a string or an integer. The count property must be
/// a non-negative integer. Missing or non-point geometry marks the point
/// invalid rather than failing.
pub fn well_points(
    features: &[Feature],
    id_field: &str,
    count_field: &str,
) -> Result<Vec<WellPoint>, ExportError> {
    features
        .iter()
        .enumerate()
        .map(|(index, f)| {
            let id = feature_id(f, id_field).ok_or_else(|| ExportError::InvalidField {
                index,
                field: id_field.to_string(),
            })?;
            let count = f
                .properties
                .get(count_field)
                .and_then(count_value)
                .ok_or_else(|| ExportError::InvalidField {
                    index,
                    field: count_field.to_string(),
                })?;
            let (x, y, geometry_valid) = match f.geometry {
                Some([x, y]) => (x, y, true),
                None => (f64::NAN, f64::NAN, false),
            };
            Ok(WellPoint {
                id,
                x,
                y,
                observation_count: count,
                geometry_valid,
            })
        })
        .collect()
}

/// Accepts integers and integral floats (shapefile round trips turn counts
/// into floats).
fn count_value(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}

/// Id property as engine input sees it: strings as-is, numbers as text.
fn feature_id(feature: &Feature, id_field: &str) -> Option<String> {
    match feature.properties.get(id_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Attaches engine output to the matching input features.
///
/// Only features whose geometry passes validation are candidates, so a
/// dropped feature that shares an id with a surviving one is never written.
/// Features whose id has no weighted well are left out. Order follows `wells`.
pub fn attach_weights(
    features: &[Feature],
    id_field: &str,
    wells: &[WeightedWell],
) -> Vec<Feature> {
    let by_id: HashMap<String, &Feature> = features
        .iter()
        .filter_map(|f| {
            let [x, y] = f.geometry?;
            let id = feature_id(f, id_field)?;
            has_valid_geometry(&WellPoint::new(id.clone(), x, y, 0)).then_some((id, f))
        })
        .collect();

    wells
        .iter()
        .filter_map(|w| {
            let mut f = (*by_id.get(&w.id)?).clone();
            f.set_f64("nearest_neighbor_distance", Some(w.nearest_neighbor_distance));
            f.set_f64("normalized_density", Some(w.normalized_density));
            f.set_f64("share", Some(w.share));
            f.set_f64("weight", Some(w.weight));
            Some(f)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Writes a CDF as `value,cumulative_probability` CSV.
pub fn write_cdf_csv(path: impl AsRef<Path>, cdf: &[CdfPoint]) -> Result<(), ExportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    write_cdf(&mut writer, cdf)?;
    writer.flush()?;
    Ok(())
}

pub fn write_cdf<W: Write>(writer: &mut W, cdf: &[CdfPoint]) -> std::io::Result<()> {
    writeln!(writer, "value,cumulative_probability")?;
    for point in cdf {
        writeln!(writer, "{},{}", point.value, point.cumulative_probability)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [69.2, 34.5]},
             "properties": {"id_gerbil": 11, "n_years": 4, "country": "AF"}},
            {"type": "Feature", "geometry": null,
             "properties": {"id_gerbil": 12, "n_years": 2.0}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
             "properties": {"id_gerbil": "13", "n_years": 1}}
        ]
    }"#;

    #[test]
    fn test_parse_keeps_points_and_marks_others_invalid() {
        let features = parse_feature_collection(SAMPLE).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].geometry, Some([69.2, 34.5]));
        assert_eq!(features[1].geometry, None);
        assert_eq!(features[2].geometry, None);
        assert_eq!(features[0].properties["country"], json!("AF"));
    }

    #[test]
    fn test_well_points_accept_numeric_and_string_ids() {
        let features = parse_feature_collection(SAMPLE).unwrap();
        let points = well_points(&features, "id_gerbil", "n_years").unwrap();
        let ids: Vec<_> = points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["11", "12", "13"]);
        assert_eq!(points[1].observation_count, 2);
        assert!(points[0].geometry_valid);
        assert!(!points[1].geometry_valid);
    }

    #[test]
    fn test_well_points_reject_negative_count() {
        let mut f = Feature::new(Some([0.0, 0.0]));
        f.set("id_gerbil", 1);
        f.set("n_years", -3);
        let err = well_points(&[f], "id_gerbil", "n_years").unwrap_err();
        assert!(matches!(err, ExportError::InvalidField { index: 0, ref field } if field == "n_years"));
    }

    #[test]
    fn test_well_points_reject_missing_id() {
        let mut f = Feature::new(Some([0.0, 0.0]));
        f.set("n_years", 3);
        assert!(well_points(&[f], "id_gerbil", "n_years").is_err());
    }

    #[test]
    fn test_rejects_non_collection() {
        let err = parse_feature_collection(r#"{"type": "Feature", "features": []}"#).unwrap_err();
        assert!(matches!(err, ExportError::NotFeatureCollection(_)));
    }

    #[test]
    fn test_attach_weights_keeps_upstream_properties_and_drops_unweighted() {
        let features = parse_feature_collection(SAMPLE).unwrap();
        let wells = vec![WeightedWell {
            id: "11".to_string(),
            x: 69.2,
            y: 34.5,
            observation_count: 4,
            nearest_neighbor_distance: 1e6,
            normalized_density: 0.0,
            share: 1.0,
            weight: 1.0,
        }];
        let out = attach_weights(&features, "id_gerbil", &wells);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].properties["country"], json!("AF"));
        assert_eq!(out[0].number("weight"), Some(1.0));
        assert_eq!(out[0].number("nearest_neighbor_distance"), Some(1e6));
    }

    fn point_feature(id: i64, x: f64, y: f64, n_years: u32, tag: &str) -> Feature {
        let mut f = Feature::new(Some([x, y]));
        f.set("id_gerbil", id);
        f.set("n_years", n_years);
        f.set("tag", tag);
        f
    }

    fn weighted(id: &str, weight: f64) -> WeightedWell {
        WeightedWell {
            id: id.to_string(),
            x: 0.0,
            y: 0.0,
            observation_count: 1,
            nearest_neighbor_distance: 1.0,
            normalized_density: 0.0,
            share: 0.5,
            weight,
        }
    }

    #[test]
    fn test_attach_weights_ignores_dropped_feature_sharing_an_id() {
        use crate::weighting::{compute_weights, WeightingOptions};

        let features = vec![
            point_feature(1, 10.0, 10.0, 3, "kept"),
            point_feature(2, 20.0, 20.0, 1, "kept"),
            point_feature(1, 500.0, 0.0, 9, "dropped"),
        ];
        let points = well_points(&features, "id_gerbil", "n_years").unwrap();
        let outcome = compute_weights(&points, &WeightingOptions::default()).unwrap();
        assert_eq!(outcome.dropped_invalid, 1);

        let out = attach_weights(&features, "id_gerbil", &outcome.wells);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].geometry, Some([10.0, 10.0]));
        assert_eq!(out[0].properties["tag"], json!("kept"));
        assert_eq!(out[0].properties["n_years"], json!(3));
        assert!(out.iter().all(|f| f.properties["tag"] == json!("kept")));
    }

    #[test]
    fn test_attach_weights_never_writes_invalid_geometry() {
        let mut line = Feature::new(None);
        line.set("id_gerbil", 5);
        line.set("tag", "line");
        let features = vec![
            line,
            point_feature(6, 0.0, 95.0, 2, "out_of_range"),
            point_feature(7, 1.0, 1.0, 2, "kept"),
        ];
        let wells = vec![weighted("5", 1.0), weighted("6", 1.0), weighted("7", 0.0)];

        let out = attach_weights(&features, "id_gerbil", &wells);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].properties["id_gerbil"], json!(7));
        assert_eq!(out[0].properties["tag"], json!("kept"));
    }

    #[test]
    fn test_serialized_collection_reparses() {
        let mut f = Feature::new(Some([5.25, -12.5]));
        f.set("id_gerbil", 3);
        f.set_f64("mean_gwh_m", Some(f64::NAN));
        let json = feature_collection_json(&[f, Feature::new(None)]).unwrap();
        let back = parse_feature_collection(&json).unwrap();
        assert_eq!(back[0].geometry, Some([5.25, -12.5]));
        assert_eq!(back[0].properties["mean_gwh_m"], Value::Null);
        assert_eq!(back[1].geometry, None);
    }

    #[test]
    fn test_summary_feature_properties() {
        let well = WellSummary {
            id_gerbil: 77,
            id_orig_src: None,
            x_wgs84: Some(4.9),
            y_wgs84: Some(52.1),
            orig_elev_m_asl: None,
            glo90_elev_m_asl: Some(-1.5),
            mean_gwh_m: Some(0.85),
            n_years: 12,
            glim_raw: Some(101),
            litho_class: 1,
        };
        let f = Feature::from(&well);
        assert_eq!(f.geometry, Some([4.9, 52.1]));
        assert_eq!(f.properties["id_gerbil"], json!(77));
        assert_eq!(f.properties["id_orig_src"], Value::Null);
        assert_eq!(f.properties["n_years"], json!(12));
        assert_eq!(f.properties["litho_class"], json!(1));
    }

    #[test]
    fn test_cdf_csv_layout() {
        let cdf = vec![
            CdfPoint { value: -1.5, cumulative_probability: 0.0 },
            CdfPoint { value: 2.0, cumulative_probability: 1.0 },
        ];
        let mut buf = Vec::new();
        write_cdf(&mut buf, &cdf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "value,cumulative_probability\n-1.5,0\n2,1\n"
        );
    }
}
