//! Street surface classification.
//!
//! Surfaces come from outside the core (map matching, organiser annotations). A
//! [`SurfaceMap`] indexes those annotations in an R-tree; every segment takes the surface
//! of the nearest annotation within range and falls back to asphalt otherwise.

use crate::error::{Result, RiskError};
use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, TrackPoint};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Road surface under a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreetSurface {
    #[default]
    Asphalt,
    Cobblestone,
    Gravel,
    Dirt,
    Sand,
}

impl StreetSurface {
    /// Anything but asphalt: loose, bumpy or slippery under braking.
    pub fn is_irregular(&self) -> bool {
        !matches!(self, StreetSurface::Asphalt)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreetSurface::Asphalt => "asphalt",
            StreetSurface::Cobblestone => "cobblestone",
            StreetSurface::Gravel => "gravel",
            StreetSurface::Dirt => "dirt",
            StreetSurface::Sand => "sand",
        }
    }
}

impl fmt::Display for StreetSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreetSurface {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asphalt" | "paved" | "concrete" | "beton" => Ok(StreetSurface::Asphalt),
            "cobblestone" | "cobbles" | "sett" | "kopfsteinpflaster" | "pflaster" => {
                Ok(StreetSurface::Cobblestone)
            }
            "gravel" | "schotter" | "kies" | "fine_gravel" => Ok(StreetSurface::Gravel),
            "dirt" | "earth" | "ground" | "unpaved" | "erde" | "waldweg" => Ok(StreetSurface::Dirt),
            "sand" => Ok(StreetSurface::Sand),
            other => Err(RiskError::invalid(
                "street_surface",
                format!("unknown surface '{}'", other),
            )),
        }
    }
}

/// One externally supplied surface observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAnnotation {
    pub location: GpsPoint,
    pub surface: StreetSurface,
}

/// An annotation as stored in the R-tree.
#[derive(Debug, Clone, Copy)]
struct IndexedSurface {
    lat: f64,
    lng: f64,
    surface: StreetSurface,
}

impl RTreeObject for IndexedSurface {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedSurface {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Spatial lookup of surface annotations.
#[derive(Clone)]
pub struct SurfaceMap {
    tree: RTree<IndexedSurface>,
    /// Annotations farther away than this (meters) are ignored
    max_distance_m: f64,
    default_surface: StreetSurface,
}

impl fmt::Debug for SurfaceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceMap")
            .field("annotations", &self.tree.size())
            .field("max_distance_m", &self.max_distance_m)
            .field("default_surface", &self.default_surface)
            .finish()
    }
}

impl Default for SurfaceMap {
    fn default() -> Self {
        Self::new(Vec::new(), 25.0)
    }
}

impl SurfaceMap {
    /// Build a map from annotations, matching within `max_distance_m`.
    pub fn new(annotations: Vec<SurfaceAnnotation>, max_distance_m: f64) -> Self {
        let indexed = annotations
            .into_iter()
            .map(|a| IndexedSurface {
                lat: a.location.latitude,
                lng: a.location.longitude,
                surface: a.surface,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(indexed),
            max_distance_m,
            default_surface: StreetSurface::default(),
        }
    }

    /// Surface used when no annotation is in range.
    pub fn with_default(mut self, surface: StreetSurface) -> Self {
        self.default_surface = surface;
        self
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Surface at a location.
    pub fn surface_at(&self, location: &GpsPoint) -> StreetSurface {
        let query = [location.latitude, location.longitude];
        match self.tree.nearest_neighbor(&query) {
            Some(nearest) => {
                let here = TrackPoint::new(location.latitude, location.longitude);
                let there = TrackPoint::new(nearest.lat, nearest.lng);
                if haversine_distance(&here, &there) <= self.max_distance_m {
                    nearest.surface
                } else {
                    self.default_surface
                }
            }
            None => self.default_surface,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_surfaces() {
        assert_eq!("asphalt".parse::<StreetSurface>().unwrap(), StreetSurface::Asphalt);
        assert_eq!("Kopfsteinpflaster".parse::<StreetSurface>().unwrap(), StreetSurface::Cobblestone);
        assert_eq!("schotter".parse::<StreetSurface>().unwrap(), StreetSurface::Gravel);
        assert!(matches!(
            "lava".parse::<StreetSurface>(),
            Err(RiskError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_irregular() {
        assert!(!StreetSurface::Asphalt.is_irregular());
        assert!(StreetSurface::Cobblestone.is_irregular());
        assert!(StreetSurface::Sand.is_irregular());
    }

    #[test]
    fn test_empty_map_uses_default() {
        let map = SurfaceMap::default();
        assert!(map.is_empty());
        assert_eq!(map.surface_at(&GpsPoint::new(47.0, 8.0)), StreetSurface::Asphalt);

        let map = SurfaceMap::default().with_default(StreetSurface::Gravel);
        assert_eq!(map.surface_at(&GpsPoint::new(47.0, 8.0)), StreetSurface::Gravel);
    }

    #[test]
    fn test_nearest_annotation_within_range() {
        let map = SurfaceMap::new(
            vec![
                SurfaceAnnotation {
                    location: GpsPoint::new(47.0, 8.0),
                    surface: StreetSurface::Cobblestone,
                },
                SurfaceAnnotation {
                    location: GpsPoint::new(47.001, 8.0),
                    surface: StreetSurface::Gravel,
                },
            ],
            25.0,
        );
        assert_eq!(map.len(), 2);
        // ~11 m from the cobblestone annotation
        assert_eq!(map.surface_at(&GpsPoint::new(47.0001, 8.0)), StreetSurface::Cobblestone);
        assert_eq!(map.surface_at(&GpsPoint::new(47.00095, 8.0)), StreetSurface::Gravel);
        // ~55 m from either: out of range
        assert_eq!(map.surface_at(&GpsPoint::new(47.0005, 8.0)), StreetSurface::Asphalt);
    }
}
