//! Vector layer types
//!
//! A thin feature model over `geo-types` geometries, sufficient for AOI
//! boundaries and water feature layers. Attribute handling is minimal:
//! the pipeline only needs geometries plus a handful of OSM tag values.

use crate::crs::Crs;
use geo_types::{Coord, Geometry};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Geometry<f64>,
    /// Feature attributes (OSM tags for water features)
    pub properties: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry and no attributes
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            properties: HashMap::new(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// A set of features sharing one CRS (water layers and AOI boundaries).
/// Immutable input to rasterization.
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    pub crs: Option<Crs>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            crs: None,
        }
    }

    /// Create an empty collection in a given CRS
    pub fn empty_with_crs(crs: Crs) -> Self {
        Self {
            features: Vec::new(),
            crs: Some(crs),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) over all geometries,
    /// or `None` for an empty collection.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut acc: Option<(f64, f64, f64, f64)> = None;

        for feature in &self.features {
            visit_coords(&feature.geometry, &mut |c| {
                acc = Some(match acc {
                    None => (c.x, c.y, c.x, c.y),
                    Some((min_x, min_y, max_x, max_y)) => (
                        min_x.min(c.x),
                        min_y.min(c.y),
                        max_x.max(c.x),
                        max_y.max(c.y),
                    ),
                });
            });
        }

        acc
    }

    /// Keep only polygon and line geometries. Points and collections are
    /// dropped: they contribute nothing to a rasterized water mask.
    pub fn retain_areal_and_linear(&mut self) {
        self.features.retain(|f| {
            matches!(
                f.geometry,
                Geometry::Polygon(_)
                    | Geometry::MultiPolygon(_)
                    | Geometry::LineString(_)
                    | Geometry::MultiLineString(_)
            )
        });
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Visit every coordinate of a geometry
pub fn visit_coords<F: FnMut(Coord<f64>)>(geometry: &Geometry<f64>, f: &mut F) {
    match geometry {
        Geometry::Point(p) => f(p.0),
        Geometry::MultiPoint(mp) => mp.iter().for_each(|p| f(p.0)),
        Geometry::Line(l) => {
            f(l.start);
            f(l.end);
        }
        Geometry::LineString(ls) => ls.coords().copied().for_each(f),
        Geometry::MultiLineString(mls) => {
            for ls in mls.iter() {
                ls.coords().copied().for_each(&mut *f);
            }
        }
        Geometry::Polygon(poly) => {
            poly.exterior().coords().copied().for_each(&mut *f);
            for ring in poly.interiors() {
                ring.coords().copied().for_each(&mut *f);
            }
        }
        Geometry::MultiPolygon(mp) => {
            for poly in mp.iter() {
                visit_coords(&Geometry::Polygon(poly.clone()), f);
            }
        }
        Geometry::GeometryCollection(gc) => {
            for g in gc.iter() {
                visit_coords(g, f);
            }
        }
        Geometry::Rect(r) => {
            f(r.min());
            f(r.max());
        }
        Geometry::Triangle(t) => {
            f(t.0);
            f(t.1);
            f(t.2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, LineString};

    #[test]
    fn test_bounds() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::Polygon(polygon![
            (x: 1.0, y: 1.0),
            (x: 4.0, y: 1.0),
            (x: 4.0, y: 3.0),
            (x: 1.0, y: 3.0),
        ])));
        fc.push(Feature::new(Geometry::LineString(LineString::from(vec![
            (0.0, 0.0),
            (2.0, 5.0),
        ]))));

        assert_eq!(fc.bounds(), Some((0.0, 0.0, 4.0, 5.0)));
    }

    #[test]
    fn test_bounds_empty() {
        let fc = FeatureCollection::new();
        assert_eq!(fc.bounds(), None);
    }

    #[test]
    fn test_retain_areal_and_linear() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::Point(geo_types::Point::new(
            0.0, 0.0,
        ))));
        fc.push(Feature::new(Geometry::LineString(LineString::from(vec![
            (0.0, 0.0),
            (1.0, 1.0),
        ]))));

        fc.retain_areal_and_linear();
        assert_eq!(fc.len(), 1);
    }
}
