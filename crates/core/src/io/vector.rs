//! Vector layer reading/writing
//!
//! With the `gdal` feature, any OGR-supported format can be read and the
//! water-vector intermediate is persisted as GeoPackage. Without it, ESRI
//! shapefiles are read natively via the `shapefile` crate and writing is
//! unavailable.

use crate::error::{Error, Result};
use crate::vector::FeatureCollection;
use std::path::Path;

/// Read a vector layer into a FeatureCollection
pub fn read_vector_layer<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    imp::read_vector_layer(path.as_ref())
}

/// Write a FeatureCollection to a vector file
pub fn write_vector_layer<P: AsRef<Path>>(fc: &FeatureCollection, path: P) -> Result<()> {
    imp::write_vector_layer(fc, path.as_ref())
}

#[cfg(feature = "gdal")]
mod imp {
    use super::*;
    use crate::io::gdal_io::{crs_to_spatial_ref, spatial_ref_to_crs};
    use crate::vector::{AttributeValue, Feature};
    use gdal::vector::{FieldValue, LayerAccess, LayerOptions, OGRwkbGeometryType};
    use gdal::{Dataset, DriverManager};
    use geo_types::{Geometry, LineString, Polygon};

    pub fn read_vector_layer(path: &Path) -> Result<FeatureCollection> {
        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;

        let mut fc = FeatureCollection::new();
        fc.crs = layer.spatial_ref().map(|srs| spatial_ref_to_crs(&srs));

        for gdal_feature in layer.features() {
            let Some(geom_ref) = gdal_feature.geometry() else {
                continue;
            };
            let geometry = geom_ref
                .to_geo()
                .map_err(|e| Error::Gdal(format!("geometry conversion: {e}")))?;

            let mut feature = Feature::new(geometry);
            for (name, value) in gdal_feature.fields() {
                let attr = match value {
                    Some(FieldValue::StringValue(s)) => AttributeValue::String(s),
                    Some(FieldValue::IntegerValue(i)) => AttributeValue::Int(i as i64),
                    Some(FieldValue::Integer64Value(i)) => AttributeValue::Int(i),
                    Some(FieldValue::RealValue(f)) => AttributeValue::Float(f),
                    _ => continue,
                };
                feature.set_property(name, attr);
            }
            fc.push(feature);
        }

        Ok(fc)
    }

    pub fn write_vector_layer(fc: &FeatureCollection, path: &Path) -> Result<()> {
        let driver = DriverManager::get_driver_by_name("GPKG")?;
        let mut dataset = driver.create_vector_only(path)?;

        let srs = match &fc.crs {
            Some(crs) => Some(crs_to_spatial_ref(crs)?),
            None => None,
        };

        let mut layer = dataset.create_layer(LayerOptions {
            name: "features",
            srs: srs.as_ref(),
            ty: OGRwkbGeometryType::wkbUnknown,
            ..Default::default()
        })?;

        for feature in fc.iter() {
            let wkt = geometry_to_wkt(&feature.geometry)?;
            let geometry = gdal::vector::Geometry::from_wkt(&wkt)?;
            layer.create_feature(geometry)?;
        }

        Ok(())
    }

    fn ring_to_wkt(ring: &LineString<f64>) -> String {
        let coords: Vec<String> = ring.coords().map(|c| format!("{} {}", c.x, c.y)).collect();
        format!("({})", coords.join(", "))
    }

    fn polygon_to_wkt_body(poly: &Polygon<f64>) -> String {
        let mut rings = vec![ring_to_wkt(poly.exterior())];
        rings.extend(poly.interiors().iter().map(ring_to_wkt));
        format!("({})", rings.join(", "))
    }

    fn geometry_to_wkt(geometry: &Geometry<f64>) -> Result<String> {
        Ok(match geometry {
            Geometry::Point(p) => format!("POINT ({} {})", p.x(), p.y()),
            Geometry::LineString(ls) => format!("LINESTRING {}", ring_to_wkt(ls)),
            Geometry::MultiLineString(mls) => {
                let parts: Vec<String> = mls.iter().map(ring_to_wkt).collect();
                format!("MULTILINESTRING ({})", parts.join(", "))
            }
            Geometry::Polygon(poly) => format!("POLYGON {}", polygon_to_wkt_body(poly)),
            Geometry::MultiPolygon(mp) => {
                let parts: Vec<String> = mp.iter().map(polygon_to_wkt_body).collect();
                format!("MULTIPOLYGON ({})", parts.join(", "))
            }
            other => {
                return Err(Error::UnsupportedDataType(format!(
                    "cannot serialize geometry type {other:?}"
                )))
            }
        })
    }
}

#[cfg(not(feature = "gdal"))]
mod imp {
    use super::*;
    use crate::vector::{AttributeValue, Feature};
    use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
    use shapefile::dbase::FieldValue;
    use shapefile::{PolygonRing, Shape};

    pub fn read_vector_layer(path: &Path) -> Result<FeatureCollection> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext != "shp" {
            return Err(Error::UnsupportedDataType(format!(
                "native vector reader supports .shp only (got .{ext}); enable the gdal feature"
            )));
        }

        let mut reader = shapefile::Reader::from_path(path)?;

        let mut fc = FeatureCollection::new();
        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result?;
            let Some(geometry) = shape_to_geometry(shape) else {
                continue;
            };

            let mut feature = Feature::new(geometry);
            for (name, value) in record.into_iter() {
                let attr = match value {
                    FieldValue::Character(Some(s)) => AttributeValue::String(s),
                    FieldValue::Numeric(Some(n)) => AttributeValue::Float(n),
                    FieldValue::Integer(i) => AttributeValue::Int(i as i64),
                    FieldValue::Double(d) => AttributeValue::Float(d),
                    FieldValue::Logical(Some(b)) => AttributeValue::Bool(b),
                    _ => continue,
                };
                feature.set_property(name, attr);
            }
            fc.push(feature);
        }

        Ok(fc)
    }

    pub fn write_vector_layer(_fc: &FeatureCollection, _path: &Path) -> Result<()> {
        Err(Error::UnsupportedDataType(
            "writing vector layers requires the gdal feature".to_string(),
        ))
    }

    /// Convert a shapefile shape to a geo-types geometry.
    ///
    /// Shapefile polygons carry outer and inner rings in one shape; inner
    /// rings are attached to the first outer ring, which is sufficient
    /// for rasterization purposes.
    fn shape_to_geometry(shape: Shape) -> Option<Geometry<f64>> {
        match shape {
            Shape::Point(p) => Some(Geometry::Point(geo_types::Point::new(p.x, p.y))),
            Shape::Polyline(pl) => {
                let lines: Vec<LineString<f64>> = pl
                    .parts()
                    .iter()
                    .map(|part| {
                        LineString::new(
                            part.iter().map(|p| Coord { x: p.x, y: p.y }).collect(),
                        )
                    })
                    .collect();
                if lines.len() == 1 {
                    Some(Geometry::LineString(lines.into_iter().next().unwrap()))
                } else {
                    Some(Geometry::MultiLineString(MultiLineString::new(lines)))
                }
            }
            Shape::Polygon(poly) => {
                let mut outers: Vec<LineString<f64>> = Vec::new();
                let mut holes: Vec<LineString<f64>> = Vec::new();

                for ring in poly.rings() {
                    let coords: Vec<Coord<f64>> = ring
                        .points()
                        .iter()
                        .map(|p| Coord { x: p.x, y: p.y })
                        .collect();
                    match ring {
                        PolygonRing::Outer(_) => outers.push(LineString::new(coords)),
                        PolygonRing::Inner(_) => holes.push(LineString::new(coords)),
                    }
                }

                if outers.is_empty() {
                    return None;
                }

                if outers.len() == 1 {
                    Some(Geometry::Polygon(Polygon::new(
                        outers.into_iter().next().unwrap(),
                        holes,
                    )))
                } else {
                    let mut polys: Vec<Polygon<f64>> = Vec::new();
                    for (idx, outer) in outers.into_iter().enumerate() {
                        let rings = if idx == 0 {
                            std::mem::take(&mut holes)
                        } else {
                            Vec::new()
                        };
                        polys.push(Polygon::new(outer, rings));
                    }
                    Some(Geometry::MultiPolygon(MultiPolygon::new(polys)))
                }
            }
            _ => None,
        }
    }
}
