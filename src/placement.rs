use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::Transform;

#[derive(Debug, Error, PartialEq)]
pub enum PlacementError {
    #[error("radius band [{inner}, {outer}] is invalid, radii must be finite, non-negative and inner <= outer")]
    InvalidBand { inner: f32, outer: f32 },
    #[error("tilt bound {0} must be between 0 and pi radians")]
    InvalidTilt(f32),
}

/// Parameters for scattering objects in a ring around the origin.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementParams {
    pub count: usize,
    /// Closest distance from the origin an object center may be placed.
    pub inner_radius: f32,
    /// Farthest distance from the origin an object center may be placed.
    pub outer_radius: f32,
    /// Height every object is placed at.
    pub ground_offset: f32,
    /// Largest tilt in radians applied about the Y and Z axes, in either
    /// direction.
    pub max_tilt: f32,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            count: 30,
            inner_radius: 3.2,
            outer_radius: 7.2,
            ground_offset: PlacementParams::DEFAULT_GROUND_OFFSET,
            max_tilt: PlacementParams::DEFAULT_MAX_TILT,
        }
    }
}

impl PlacementParams {
    pub const DEFAULT_GROUND_OFFSET: f32 = 0.2;
    pub const DEFAULT_MAX_TILT: f32 = 0.2;

    pub fn validate(&self) -> Result<(), PlacementError> {
        let valid_radius = |r: f32| r.is_finite() && r >= 0.0;

        if !valid_radius(self.inner_radius)
            || !valid_radius(self.outer_radius)
            || self.inner_radius > self.outer_radius
        {
            return Err(PlacementError::InvalidBand {
                inner: self.inner_radius,
                outer: self.outer_radius,
            });
        }

        if !(0.0..=PI).contains(&self.max_tilt) {
            return Err(PlacementError::InvalidTilt(self.max_tilt));
        }

        Ok(())
    }

    /// Generate `count` transforms scattered in the ring between the inner and
    /// outer radius.
    ///
    /// Each object consumes four values from `rng` in a fixed order (angle,
    /// radius, Z tilt, Y tilt) so a seeded generator always reproduces the
    /// same layout. Objects may overlap each other.
    pub fn place<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Transform>, PlacementError> {
        self.validate()?;

        let transforms = (0..self.count)
            .map(|_| {
                let angle = rng.gen_range(0.0..TAU);
                let radius = rng.gen_range(self.inner_radius..=self.outer_radius);
                let z_tilt = self.tilt(rng);
                let y_tilt = self.tilt(rng);

                Transform::from_position(Vec3::new(
                    radius * angle.cos(),
                    self.ground_offset,
                    radius * angle.sin(),
                ))
                .with_rotation(Vec3::new(0.0, y_tilt, z_tilt))
            })
            .collect();

        Ok(transforms)
    }

    fn tilt<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max_tilt > 0.0 {
            rng.gen_range(-self.max_tilt..=self.max_tilt)
        } else {
            0.0
        }
    }
}

/// Scatter `count` graves in the ring between `inner_radius` and
/// `outer_radius` using the default ground offset and tilt.
pub fn place_graves<R: Rng + ?Sized>(
    count: usize,
    inner_radius: f32,
    outer_radius: f32,
    rng: &mut R,
) -> Result<Vec<Transform>, PlacementError> {
    PlacementParams {
        count,
        inner_radius,
        outer_radius,
        ..Default::default()
    }
    .place(rng)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn horizontal_radius(t: &Transform) -> f32 {
        (t.position.x * t.position.x + t.position.z * t.position.z).sqrt()
    }

    #[test]
    fn produces_exactly_count_transforms() {
        let mut rng = StdRng::seed_from_u64(7);

        for count in [0, 1, 2, 30, 257] {
            assert_eq!(count, place_graves(count, 3.2, 7.2, &mut rng).unwrap().len());
        }
    }

    #[test]
    fn transforms_stay_in_band_and_tilt_bounds() {
        let mut rng = StdRng::seed_from_u64(1234);
        let graves = place_graves(500, 3.2, 7.2, &mut rng).unwrap();

        for grave in &graves {
            let r = horizontal_radius(grave);
            assert!((3.2 - 1e-4..=7.2 + 1e-4).contains(&r), "radius {r}");
            assert_eq!(PlacementParams::DEFAULT_GROUND_OFFSET, grave.position.y);

            assert_eq!(0.0, grave.rotation.x);
            assert!(grave.rotation.y.abs() <= 0.2);
            assert!(grave.rotation.z.abs() <= 0.2);
            assert_eq!(Vec3::ONE, grave.scale);
        }
    }

    #[test]
    fn same_seed_gives_same_layout() {
        let a = place_graves(30, 3.2, 7.2, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = place_graves(30, 3.2, 7.2, &mut StdRng::seed_from_u64(99)).unwrap();
        let c = place_graves(30, 3.2, 7.2, &mut StdRng::seed_from_u64(100)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn single_grave_with_seed_42() {
        let graves = place_graves(1, 3.2, 7.2, &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(1, graves.len());
        let r = horizontal_radius(&graves[0]);
        assert!((3.2 - 1e-4..=7.2 + 1e-4).contains(&r));
        assert_eq!(0.2, graves[0].position.y);
    }

    #[test]
    fn degenerate_band_places_on_circle() {
        let graves = place_graves(10, 5.0, 5.0, &mut StdRng::seed_from_u64(3)).unwrap();
        assert!(graves
            .iter()
            .all(|g| (horizontal_radius(g) - 5.0).abs() < 1e-4));
    }

    #[test]
    fn zero_tilt_keeps_graves_upright() {
        let params = PlacementParams {
            max_tilt: 0.0,
            ..Default::default()
        };
        let graves = params.place(&mut StdRng::seed_from_u64(5)).unwrap();
        assert!(graves.iter().all(|g| g.rotation == Vec3::ZERO));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(
            Err(PlacementError::InvalidBand {
                inner: 7.2,
                outer: 3.2
            }),
            place_graves(3, 7.2, 3.2, &mut rng)
        );
        assert!(place_graves(3, -1.0, 3.2, &mut rng).is_err());
        assert!(place_graves(3, 1.0, f32::NAN, &mut rng).is_err());

        let params = PlacementParams {
            max_tilt: -0.1,
            ..Default::default()
        };
        assert_eq!(Err(PlacementError::InvalidTilt(-0.1)), params.place(&mut rng));
    }

    #[test]
    fn tilt_beyond_half_a_turn_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);

        for max_tilt in [f32::MAX, f32::INFINITY, f32::NAN, 4.0] {
            let params = PlacementParams {
                max_tilt,
                ..Default::default()
            };
            assert!(params.validate().is_err(), "tilt {max_tilt} accepted");
            assert!(params.place(&mut rng).is_err());
        }

        let params = PlacementParams {
            max_tilt: PI,
            ..Default::default()
        };
        assert_eq!(params.count, params.place(&mut rng).unwrap().len());
    }
}
