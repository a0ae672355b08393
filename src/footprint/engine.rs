use chrono::{DateTime, Utc};
use geo_types::{LineString, Polygon};

use super::error::FootprintError;
use crate::config::{AttitudeCorrection, CameraConfig, FootprintConfig};
use crate::telemetry::PoseFix;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const MIN_RAY_DOWN: f64 = 1e-6;

/// Ground footprint computation. Returns a lon/lat polygon.
pub trait FootprintEngine: Send {
    fn compute(&self, pose: &PoseFix, at: DateTime<Utc>) -> Result<Polygon<f64>, FootprintError>;
}

/// Flat-terrain projection of a nadir looking frame camera.
#[derive(Debug, Clone)]
pub struct PinholeFootprint {
    camera: CameraConfig,
    correction: AttitudeCorrection,
    ground_elevation_m: f64,
}

impl PinholeFootprint {
    pub fn new(config: &FootprintConfig) -> Self {
        Self {
            camera: config.camera,
            correction: config.attitude_correction_deg,
            ground_elevation_m: config.ground_elevation_m,
        }
    }

    /// Image corners as body frame rays (x forward, y right, z down).
    fn corner_rays(&self) -> [[f64; 3]; 4] {
        let along = (self.camera.vfov_deg.to_radians() / 2.0).tan();
        let across = (self.camera.hfov_deg.to_radians() / 2.0).tan();
        [
            [along, -across, 1.0],
            [along, across, 1.0],
            [-along, across, 1.0],
            [-along, -across, 1.0],
        ]
    }
}

impl FootprintEngine for PinholeFootprint {
    fn compute(&self, pose: &PoseFix, _at: DateTime<Utc>) -> Result<Polygon<f64>, FootprintError> {
        let height = pose.altitude - self.ground_elevation_m;
        if height <= 0.0 {
            return Err(FootprintError::BelowGround(height));
        }

        let roll = (pose.roll + self.correction.roll).to_radians();
        let pitch = (pose.pitch + self.correction.pitch).to_radians();
        let heading = (pose.heading + self.correction.heading).to_radians();

        let mut ring = Vec::with_capacity(5);
        for (i, ray) in self.corner_rays().iter().enumerate() {
            let [north, east, down] = body_to_ned(*ray, roll, pitch, heading);
            if down <= MIN_RAY_DOWN {
                return Err(FootprintError::HorizonInView(i));
            }
            let scale = height / down;
            ring.push(offset_lon_lat(
                pose.longitude,
                pose.latitude,
                north * scale,
                east * scale,
            ));
        }

        Ok(Polygon::new(LineString::from(ring), vec![]))
    }
}

/// Rotates a body vector into north-east-down with R = Rz(heading) Ry(pitch) Rx(roll).
pub fn body_to_ned(v: [f64; 3], roll: f64, pitch: f64, heading: f64) -> [f64; 3] {
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sh, ch) = heading.sin_cos();

    let [x, y, z] = v;
    let (y, z) = (y * cr - z * sr, y * sr + z * cr);
    let (x, z) = (x * cp + z * sp, -x * sp + z * cp);
    let (x, y) = (x * ch - y * sh, x * sh + y * ch);
    [x, y, z]
}

/// Local tangent plane offset in meters to (lon, lat) degrees.
fn offset_lon_lat(lon: f64, lat: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
    let dlon = (east_m / (EARTH_RADIUS_M * lat.to_radians().cos())).to_degrees();
    (lon + dlon, lat + dlat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Coord;

    fn engine(hfov: f64, vfov: f64) -> PinholeFootprint {
        PinholeFootprint::new(&FootprintConfig {
            camera: CameraConfig {
                hfov_deg: hfov,
                vfov_deg: vfov,
            },
            ..FootprintConfig::default()
        })
    }

    fn level(altitude: f64, heading: f64) -> PoseFix {
        PoseFix {
            roll: 0.0,
            pitch: 0.0,
            heading,
            altitude,
            longitude: 2.0,
            latitude: 45.0,
        }
    }

    fn centroid(polygon: &Polygon<f64>) -> Coord<f64> {
        let pts = &polygon.exterior().0[..4];
        let n = pts.len() as f64;
        Coord {
            x: pts.iter().map(|c| c.x).sum::<f64>() / n,
            y: pts.iter().map(|c| c.y).sum::<f64>() / n,
        }
    }

    #[test]
    fn level_flight_gives_square_around_nadir() {
        let polygon = engine(90.0, 90.0)
            .compute(&level(1000.0, 0.0), Utc::now())
            .unwrap();
        let ring = &polygon.exterior().0;
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);

        let half_lat = (1000.0 / EARTH_RADIUS_M).to_degrees();
        let first = ring[0];
        assert!((first.y - (45.0 + half_lat)).abs() < 1e-9);
        assert!(first.x < 2.0);

        let c = centroid(&polygon);
        assert!((c.x - 2.0).abs() < 1e-9);
        assert!((c.y - 45.0).abs() < 1e-9);
    }

    #[test]
    fn heading_rotates_forward_edge() {
        // Heading east: the leading corners lie east of the aircraft.
        let polygon = engine(60.0, 40.0)
            .compute(&level(3000.0, 90.0), Utc::now())
            .unwrap();
        let ring = &polygon.exterior().0;
        assert!(ring[0].x > 2.0 && ring[1].x > 2.0);
        assert!(ring[2].x < 2.0 && ring[3].x < 2.0);
        // Left of an eastbound aircraft is north.
        assert!(ring[0].y > 45.0);
    }

    #[test]
    fn roll_shifts_footprint_away_from_lowered_wing() {
        let mut pose = level(3000.0, 0.0);
        pose.roll = 10.0;
        let c = centroid(&engine(40.0, 30.0).compute(&pose, Utc::now()).unwrap());
        assert!(c.x < 2.0);
    }

    #[test]
    fn pitch_up_moves_footprint_forward() {
        let mut pose = level(3000.0, 0.0);
        pose.pitch = 5.0;
        let c = centroid(&engine(40.0, 30.0).compute(&pose, Utc::now()).unwrap());
        assert!(c.y > 45.0);
    }

    #[test]
    fn horizon_in_view_is_an_error() {
        let mut pose = level(3000.0, 0.0);
        pose.roll = 80.0;
        assert!(matches!(
            engine(40.0, 30.0).compute(&pose, Utc::now()),
            Err(FootprintError::HorizonInView(_))
        ));
    }

    #[test]
    fn below_ground_is_an_error() {
        let mut config = FootprintConfig::default();
        config.ground_elevation_m = 1500.0;
        let engine = PinholeFootprint::new(&config);
        assert!(matches!(
            engine.compute(&level(1000.0, 0.0), Utc::now()),
            Err(FootprintError::BelowGround(_))
        ));
    }

    #[test]
    fn body_to_ned_identity_at_zero_attitude() {
        let v = body_to_ned([1.0, 2.0, 3.0], 0.0, 0.0, 0.0);
        assert_eq!(v, [1.0, 2.0, 3.0]);
    }
}
