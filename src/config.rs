//! Tolerances shared by the aggregation stages.

use nalgebra::Vector3;

/// Decimal places used when comparing pixel spacing, normals and
/// through-plane distances. Absorbs floating-point acquisition noise.
pub const SPACING_DECIMAL_PLACES: u32 = 2;

/// Upper bound for `decimal_places`; beyond it `f64` has no digits left.
pub const MAX_DECIMAL_PLACES: u32 = 15;

/// Maximum per-axis difference for two origins to count as the same
/// spatial position.
pub const ORIGIN_TOLERANCE: f64 = 1e-6;

/// Substituted for a zero row direction.
pub const DEFAULT_ROW_DIRECTION: [f64; 3] = [1.0, 0.0, 0.0];

/// Substituted for a zero column direction.
pub const DEFAULT_COLUMN_DIRECTION: [f64; 3] = [0.0, 0.0, -1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationConfig {
    pub decimal_places: u32,
    pub origin_tolerance: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            decimal_places: SPACING_DECIMAL_PLACES,
            origin_tolerance: ORIGIN_TOLERANCE,
        }
    }
}

impl AggregationConfig {
    /// Round half away from zero to the configured number of decimals,
    /// capped at [`MAX_DECIMAL_PLACES`].
    #[inline]
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.precision());
        (value * factor).round() / factor
    }

    /// Smallest difference the configured precision still resolves.
    pub fn tolerance(&self) -> f64 {
        10f64.powi(-self.precision())
    }

    fn precision(&self) -> i32 {
        self.decimal_places.min(MAX_DECIMAL_PLACES) as i32
    }

    pub fn round_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        vector.map(|component| self.round(component))
    }

    pub fn same_position(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).iter().all(|d| d.abs() <= self.origin_tolerance)
    }
}
