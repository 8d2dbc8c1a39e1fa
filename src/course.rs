//! Course records as delivered by the course store.
//!
//! Records arrive as JSON with a loosely typed `gps_route`. They are checked
//! here, once, before a [`RouteModel`] is built; nothing downstream has to
//! re-validate a coordinate.
//!
//! ```
//! use course_tracker::parse_course_json;
//!
//! let json = r#"{
//!     "id": "han-river-5k",
//!     "name": "Han River 5K",
//!     "gps_route": [
//!         {"lat": 37.5283, "lng": 126.9326},
//!         {"lat": 37.5290, "lng": 126.9400}
//!     ]
//! }"#;
//! let course = parse_course_json(json).unwrap();
//! let model = course.into_model().unwrap();
//! assert_eq!(model.points().len(), 2);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::route_model::RouteModel;
use crate::RoutePoint;

/// One entry of a record's `gps_route`, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawCoursePoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

/// A stored course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gps_route: Vec<RawCoursePoint>,
}

impl CourseRecord {
    /// Validated route points in course order.
    ///
    /// Points are sorted by `order` when every point carries one; otherwise
    /// the array order is kept. Any out-of-range or non-finite coordinate
    /// fails the whole record.
    pub fn route_points(&self) -> Result<Vec<RoutePoint>> {
        let mut points = self
            .gps_route
            .iter()
            .map(|raw| {
                let point = RoutePoint {
                    lat: raw.lat,
                    lng: raw.lng,
                    order: raw.order,
                    elevation: raw.elevation.filter(|e| e.is_finite()),
                };
                if point.is_valid() {
                    Ok(point)
                } else {
                    Err(TrackerError::InvalidCoordinate { lat: raw.lat, lng: raw.lng })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        if !points.is_empty() && points.iter().all(|p| p.order.is_some()) {
            points.sort_by_key(|p| p.order);
        }
        Ok(points)
    }

    /// Validate and build the route model for this course.
    pub fn into_model(&self) -> Result<RouteModel> {
        let points = self.route_points()?;
        debug!("course {}: {} points", self.id, points.len());
        RouteModel::build(&points)
    }
}

/// Parse one course record from JSON.
pub fn parse_course_json(json: &str) -> Result<CourseRecord> {
    Ok(serde_json::from_str(json)?)
}
