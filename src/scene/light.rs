//! Point lights and their derived influence radius.
//!
//! Attenuation follows `1 / (constant + linear*d + quadratic*d^2)`. A light's radius is
//! the distance at which that denominator reaches [`RADIUS_CUTOFF`] times the light's
//! brightest channel, i.e. where its contribution drops to 5/256 of peak. The same
//! radius scales the light-volume sphere and bounds the lighting loop, so the drawn
//! volume and the shading falloff always agree.

use glam::Vec3;

/// Denominator value at the edge of a light's influence, per unit of peak intensity.
pub const RADIUS_CUTOFF: f32 = 256.0 / 5.0;

/// Attenuation coefficients
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.7,
            quadratic: 1.8,
        }
    }
}

impl Attenuation {
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self { constant, linear, quadratic }
    }

    /// Denominator of the falloff at distance `d`.
    pub fn denominator(&self, d: f32) -> f32 {
        self.constant + self.linear * d + self.quadratic * d * d
    }

    /// Falloff factor at distance `d`
    pub fn factor(&self, d: f32) -> f32 {
        1.0 / self.denominator(d)
    }

    fn is_valid(&self) -> bool {
        let coeffs = [self.constant, self.linear, self.quadratic];
        coeffs.iter().all(|c| c.is_finite() && *c >= 0.0)
    }
}

/// Solve `quadratic*d^2 + linear*d + constant = RADIUS_CUTOFF * max(color)` for the
/// positive root.
///
/// Returns `None` when no finite positive radius exists: black or non-finite color,
/// negative or non-finite coefficients, no distance term at all, a negative
/// discriminant, or a light already below the cutoff at distance zero. Such a light
/// is skipped for the frame instead of feeding a NaN scale into its volume.
pub fn compute_radius(color: Vec3, attenuation: Attenuation) -> Option<f32> {
    if !color.is_finite() || !attenuation.is_valid() {
        return None;
    }
    let peak = color.max_element();
    if peak <= 0.0 {
        return None;
    }

    let Attenuation { constant, linear, quadratic } = attenuation;
    let c = constant - RADIUS_CUTOFF * peak;

    let radius = if quadratic > f32::EPSILON {
        let discriminant = linear * linear - 4.0 * quadratic * c;
        if discriminant < 0.0 {
            return None;
        }
        (-linear + discriminant.sqrt()) / (2.0 * quadratic)
    } else if linear > f32::EPSILON {
        -c / linear
    } else {
        // Constant-only falloff never reaches the cutoff
        return None;
    };

    (radius.is_finite() && radius > 0.0).then_some(radius)
}

/// Point light with a derived radius.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    /// Linear RGB intensity
    pub color: Vec3,
    pub attenuation: Attenuation,
    /// Influence radius from the last [`PointLight::update_radius`]; `None` when skipped
    pub radius: Option<f32>,
    resolved: bool,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, attenuation: Attenuation) -> Self {
        Self {
            position,
            color,
            attenuation,
            radius: None,
            resolved: false,
        }
    }

    /// Recompute the radius from the current color and attenuation.
    ///
    /// Logs once when a light becomes degenerate, not every frame it stays so.
    pub fn update_radius(&mut self) -> Option<f32> {
        let radius = compute_radius(self.color, self.attenuation);
        if radius.is_none() && (self.radius.is_some() || !self.resolved) {
            tracing::warn!(
                "Skipping light at {:?}: no finite radius for color {:?}, attenuation {:?}",
                self.position,
                self.color,
                self.attenuation
            );
        }
        self.radius = radius;
        self.resolved = true;
        radius
    }

    /// Whether the light takes part in shading this frame.
    pub fn is_active(&self) -> bool {
        self.radius.is_some()
    }
}
