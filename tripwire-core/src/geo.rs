//! Validation of geo-typed event data values.
//!
//! `geo_point` fields carry `{ "lon": f64, "lat": f64 }`. `geo_shape`
//! fields carry a GeoJSON-style document whose `type` discriminant selects
//! the coordinate layout, plus optional indexing options (tree, precision,
//! strategy, …) that are checked when present.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

#[allow(clippy::expect_used)]
static ORIENTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((right)|(ccw)|(counterclockwise)|(left)|(cw)|(clockwise))$")
        .expect("orientation pattern is valid")
});

#[allow(clippy::expect_used)]
static PRECISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((in)|(inch)|(yd)|(yard)|(mi)|(miles)|(km)|(kilometers)|(m)|(meters)|(cm)|(centimeters)|(mm)|(millimeters))$",
    )
    .expect("precision pattern is valid")
});

#[allow(clippy::expect_used)]
static DISTANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(([1-9][0-9]*)((in)|(inch)|(yd)|(yard)|(mi)|(miles)|(km)|(kilometers)|(m)|(meters)|(cm)|(centimeters)|(mm)|(millimeters)|$))$",
    )
    .expect("distance pattern is valid")
});

/// A `geo_point` value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

/// Validate a `geo_point` value.
pub fn validate_point(value: &Value) -> Result<(), String> {
    let point: GeoPoint = serde_json::from_value(value.clone())
        .map_err(|e| format!("not a geo_point: {e}"))?;
    if !point.lon.is_finite() || !point.lat.is_finite() {
        return Err("geo_point coordinates must be finite".to_owned());
    }
    Ok(())
}

/// A `geo_shape` value, options untyped until checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoShape {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub coordinates: Option<Value>,
    pub geometries: Option<Value>,
    pub tree: Option<Value>,
    pub precision: Option<Value>,
    pub tree_levels: Option<Value>,
    pub strategy: Option<Value>,
    pub distance_error_pct: Option<Value>,
    pub orientation: Option<Value>,
    pub points_only: Option<Value>,
    pub radius: Option<Value>,
}

/// Validate a `geo_shape` value.
pub fn validate_shape(value: &Value) -> Result<(), String> {
    let shape: GeoShape =
        serde_json::from_value(value.clone()).map_err(|e| format!("not a geo_shape: {e}"))?;
    shape.validate()
}

impl GeoShape {
    pub fn validate(&self) -> Result<(), String> {
        self.validate_options()?;

        let kind = self.kind.as_deref().unwrap_or_default().to_lowercase();

        if kind == "geometrycollection" {
            if self.coordinates.is_some() || self.geometries.is_none() {
                return Err("geometrycollection carries geometries, not coordinates".to_owned());
            }
        } else if self.geometries.is_some() || self.coordinates.is_none() {
            return Err(format!("{kind} shape carries coordinates, not geometries"));
        }

        match kind.as_str() {
            "geometrycollection" => {
                let shapes = as_array(self.geometries.as_ref(), "geometries")?;
                for member in shapes {
                    validate_shape(member)?;
                }
                Ok(())
            }
            "point" => validate_position(coords(self)?),
            "linestring" => validate_line(coords(self)?),
            "polygon" => validate_polygon(coords(self)?),
            "multipoint" => {
                for p in as_array(Some(coords(self)?), "coordinates")? {
                    validate_position(p)?;
                }
                Ok(())
            }
            "multilinestring" => {
                for line in as_array(Some(coords(self)?), "coordinates")? {
                    validate_line(line)?;
                }
                Ok(())
            }
            "multipolygon" => {
                for poly in as_array(Some(coords(self)?), "coordinates")? {
                    validate_polygon(poly)?;
                }
                Ok(())
            }
            "envelope" => {
                let corners = as_array(Some(coords(self)?), "coordinates")?;
                if corners.len() != 2 {
                    return Err("envelope needs exactly two corner points".to_owned());
                }
                for corner in corners {
                    validate_position(corner)?;
                }
                Ok(())
            }
            "circle" => {
                validate_position(coords(self)?)?;
                match &self.radius {
                    Some(radius) => validate_distance(radius, "radius"),
                    None => Err("circle needs a radius".to_owned()),
                }
            }
            other => Err(format!("{other:?} is not a geo_shape type")),
        }
    }

    fn validate_options(&self) -> Result<(), String> {
        if let Some(tree) = &self.tree {
            match tree.as_str() {
                Some("geohash") | Some("quadtree") => {}
                _ => return Err("tree must be geohash or quadtree".to_owned()),
            }
        }
        if let Some(precision) = &self.precision {
            let unit = precision
                .as_str()
                .ok_or_else(|| "precision must be a distance unit".to_owned())?;
            if !PRECISION_RE.is_match(unit) {
                return Err(format!("{unit:?} is not a distance unit"));
            }
        }
        if let Some(levels) = &self.tree_levels {
            validate_distance(levels, "tree_levels")?;
        }
        if let Some(strategy) = &self.strategy {
            match strategy.as_str() {
                Some("recursive") | Some("term") => {}
                _ => return Err("strategy must be recursive or term".to_owned()),
            }
        }
        if let Some(pct) = &self.distance_error_pct {
            let v = pct
                .as_f64()
                .ok_or_else(|| "distance_error_pct must be a number".to_owned())?;
            if !(0.0..=100.0).contains(&v) {
                return Err(format!("distance_error_pct {v} is out of range"));
            }
        }
        if let Some(orientation) = &self.orientation {
            let o = orientation
                .as_str()
                .ok_or_else(|| "orientation must be a string".to_owned())?;
            if !ORIENTATION_RE.is_match(o) {
                return Err(format!("{o:?} is not an orientation"));
            }
        }
        if let Some(points_only) = &self.points_only
            && !points_only.is_boolean()
        {
            return Err("points_only must be a boolean".to_owned());
        }
        Ok(())
    }
}

fn coords(shape: &GeoShape) -> Result<&Value, String> {
    shape
        .coordinates
        .as_ref()
        .ok_or_else(|| "shape has no coordinates".to_owned())
}

fn as_array<'v>(value: Option<&'v Value>, what: &str) -> Result<&'v Vec<Value>, String> {
    value
        .and_then(Value::as_array)
        .ok_or_else(|| format!("{what} must be an array"))
}

/// A position is a `[lon, lat]` pair of numbers.
fn validate_position(value: &Value) -> Result<(), String> {
    let pair = value
        .as_array()
        .ok_or_else(|| "position must be a [lon, lat] pair".to_owned())?;
    if pair.len() != 2 || !pair.iter().all(Value::is_number) {
        return Err("position must be a [lon, lat] pair of numbers".to_owned());
    }
    Ok(())
}

fn validate_line(value: &Value) -> Result<(), String> {
    for position in as_array(Some(value), "linestring coordinates")? {
        validate_position(position)?;
    }
    Ok(())
}

/// A polygon is one or more closed 5-point rings.
fn validate_polygon(value: &Value) -> Result<(), String> {
    let rings = as_array(Some(value), "polygon coordinates")?;
    if rings.is_empty() {
        return Err("polygon needs at least one ring".to_owned());
    }
    for ring in rings {
        let positions = as_array(Some(ring), "polygon ring")?;
        if positions.len() != 5 {
            return Err("polygon ring must hold five positions".to_owned());
        }
        for position in positions {
            validate_position(position)?;
        }
    }
    Ok(())
}

fn validate_distance(value: &Value, what: &str) -> Result<(), String> {
    let s = value
        .as_str()
        .ok_or_else(|| format!("{what} must be a distance string"))?;
    if !DISTANCE_RE.is_match(s) {
        return Err(format!("{s:?} is not a distance"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn points_need_lon_and_lat() {
        assert!(validate_point(&json!({"lon": -77.0, "lat": 38.9})).is_ok());
        assert!(validate_point(&json!({"lon": -77.0})).is_err());
        assert!(validate_point(&json!({"lon": "west", "lat": 38.9})).is_err());
    }

    #[test]
    fn simple_shapes_validate() {
        assert!(validate_shape(&json!({"type": "point", "coordinates": [1.0, 2.0]})).is_ok());
        assert!(
            validate_shape(&json!({
                "type": "linestring",
                "coordinates": [[0.0, 0.0], [1.0, 1.0]],
            }))
            .is_ok()
        );
        assert!(
            validate_shape(&json!({
                "type": "envelope",
                "coordinates": [[0.0, 1.0], [1.0, 0.0]],
            }))
            .is_ok()
        );
    }

    #[test]
    fn polygon_rings_are_closed_five_point_rings() {
        let good = json!({
            "type": "polygon",
            "coordinates": [[[0.0,0.0],[0.0,1.0],[1.0,1.0],[1.0,0.0],[0.0,0.0]]],
        });
        assert!(validate_shape(&good).is_ok());

        let open = json!({
            "type": "polygon",
            "coordinates": [[[0.0,0.0],[0.0,1.0],[1.0,1.0],[1.0,0.0]]],
        });
        assert!(validate_shape(&open).is_err());
    }

    #[test]
    fn circle_needs_a_radius() {
        assert!(
            validate_shape(&json!({
                "type": "circle",
                "coordinates": [1.0, 2.0],
                "radius": "50m",
            }))
            .is_ok()
        );
        assert!(
            validate_shape(&json!({"type": "circle", "coordinates": [1.0, 2.0]})).is_err()
        );
        assert!(
            validate_shape(&json!({
                "type": "circle",
                "coordinates": [1.0, 2.0],
                "radius": "very far",
            }))
            .is_err()
        );
    }

    #[test]
    fn geometrycollection_nests_shapes() {
        let good = json!({
            "type": "geometrycollection",
            "geometries": [
                {"type": "point", "coordinates": [1.0, 2.0]},
                {"type": "linestring", "coordinates": [[0.0, 0.0], [1.0, 1.0]]},
            ],
        });
        assert!(validate_shape(&good).is_ok());

        let mixed = json!({
            "type": "geometrycollection",
            "coordinates": [1.0, 2.0],
            "geometries": [],
        });
        assert!(validate_shape(&mixed).is_err());
    }

    #[test]
    fn shape_options_are_checked_when_present() {
        let good = json!({
            "type": "point",
            "coordinates": [1.0, 2.0],
            "tree": "quadtree",
            "precision": "meters",
            "strategy": "recursive",
            "orientation": "ccw",
            "distance_error_pct": 0.025,
            "points_only": false,
        });
        assert!(validate_shape(&good).is_ok());

        let bad_tree = json!({"type": "point", "coordinates": [1.0, 2.0], "tree": "octree"});
        assert!(validate_shape(&bad_tree).is_err());

        let bad_orientation =
            json!({"type": "point", "coordinates": [1.0, 2.0], "orientation": "sideways"});
        assert!(validate_shape(&bad_orientation).is_err());
    }
}
