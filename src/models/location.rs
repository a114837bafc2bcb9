use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

/// Axis-aligned lat/lng rectangle. Used for service bounds and hazard corridors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox {
            min_lat: first.lat,
            min_lng: first.lng,
            max_lat: first.lat,
            max_lng: first.lng,
        };
        for p in iter {
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.min_lng = bbox.min_lng.min(p.lng);
            bbox.max_lat = bbox.max_lat.max(p.lat);
            bbox.max_lng = bbox.max_lng.max(p.lng);
        }
        Some(bbox)
    }

    pub fn contains(&self, p: &GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lng >= self.min_lng && p.lng <= self.max_lng
    }

    /// Grows the box by `km` on every side.
    pub fn padded_km(&self, km: f64) -> Self {
        let km = km.max(0.0);
        let lat_pad = km / crate::geo::KM_PER_DEGREE_LAT;
        let mid_lat = ((self.min_lat + self.max_lat) / 2.0).to_radians();
        // cos(lat) never reaches zero inside a realistic service area
        let lng_pad = km / (crate::geo::KM_PER_DEGREE_LAT * mid_lat.cos().max(0.01));

        Self {
            min_lat: (self.min_lat - lat_pad).max(-90.0),
            min_lng: (self.min_lng - lng_pad).max(-180.0),
            max_lat: (self.max_lat + lat_pad).min(90.0),
            max_lng: (self.max_lng + lng_pad).min(180.0),
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.min_lat, self.min_lng, self.max_lat, self.max_lng]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }
}
