use crate::types::{BoundingBox, Crs, SarError, SarResult};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// WGS84 semi-major axis, the sphere radius used by Web Mercator
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Half the Web Mercator extent along x (meters)
pub const MERCATOR_MAX_EXTENT: f64 = 20_037_508.342_789_244;

/// Bounding box reprojection between the supported CRSs
///
/// Stateless: corners are transformed as coordinate pairs, since projected
/// x and y depend jointly on both geographic coordinates in general.
pub struct CoordinateProjector;

impl CoordinateProjector {
    /// Reproject `bbox` from `source` to `target`
    pub fn project(bbox: &BoundingBox, source: Crs, target: Crs) -> SarResult<BoundingBox> {
        if bbox.crs != source {
            return Err(SarError::Projection(format!(
                "bounding box is tagged {} but source CRS is {}",
                bbox.crs, source
            )));
        }

        log::debug!("Projecting bbox {:?} from {} to {}", bbox.to_array(), source, target);

        let (min_x, min_y) = Self::transform_point(bbox.min_x, bbox.min_y, source, target)?;
        let (max_x, max_y) = Self::transform_point(bbox.max_x, bbox.max_y, source, target)?;

        BoundingBox::new(min_x, min_y, max_x, max_y, target).map_err(|e| {
            SarError::Projection(format!("projected box is invalid: {}", e))
        })
    }

    /// Transform a single (x, y) pair; geographic pairs are (lon, lat)
    pub fn transform_point(x: f64, y: f64, source: Crs, target: Crs) -> SarResult<(f64, f64)> {
        match (source, target) {
            (s, t) if s == t => {
                if x.is_finite() && y.is_finite() {
                    Ok((x, y))
                } else {
                    Err(SarError::Projection(format!("non-finite coordinate ({}, {})", x, y)))
                }
            }
            (Crs::Wgs84, Crs::WebMercator) => lon_lat_to_mercator(x, y),
            (Crs::WebMercator, Crs::Wgs84) => mercator_to_lon_lat(x, y),
            _ => Err(SarError::Projection(format!(
                "unsupported transform {} -> {}",
                source, target
            ))),
        }
    }
}

/// Longitude/latitude (EPSG:4326) to Web Mercator (EPSG:3857)
///
/// The poles map to infinity, so `|lat| >= 90` is outside the domain.
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> SarResult<(f64, f64)> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(SarError::Projection(format!(
            "non-finite geographic coordinate ({}, {})",
            lon, lat
        )));
    }
    if lat.abs() >= 90.0 {
        return Err(SarError::Projection(format!(
            "latitude {} is outside the Web Mercator domain",
            lat
        )));
    }

    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok((x, y))
}

/// Web Mercator (EPSG:3857) to longitude/latitude (EPSG:4326)
pub fn mercator_to_lon_lat(x: f64, y: f64) -> SarResult<(f64, f64)> {
    if !x.is_finite() || !y.is_finite() {
        return Err(SarError::Projection(format!(
            "non-finite projected coordinate ({}, {})",
            x, y
        )));
    }

    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    Ok((lon, lat))
}
