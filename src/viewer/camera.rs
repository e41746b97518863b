//! Fly camera using dolly

use dolly::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// Base movement speed in units per second
const DEFAULT_SPEED: f32 = 3.0;

/// First-person fly camera for the viewport
pub struct FlyCamera {
    rig: CameraRig,
    /// Vertical FOV in degrees
    pub fov: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Movement speed, adjusted with the scroll wheel
    pub speed: f32,
    home: (Vec3, f32, f32),
}

impl FlyCamera {
    /// Camera at `position` with yaw/pitch in degrees.
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let rig = CameraRig::builder()
            .with(Position::new(mint::Point3 {
                x: position.x,
                y: position.y,
                z: position.z,
            }))
            .with(YawPitch::new().yaw_degrees(yaw).pitch_degrees(pitch))
            .with(Smooth::new_position_rotation(0.5, 0.25))
            .build();

        Self {
            rig,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
            speed: DEFAULT_SPEED,
            home: (position, yaw, pitch),
        }
    }

    /// Mouse look, in pixels of pointer motion
    pub fn look(&mut self, delta_x: f32, delta_y: f32) {
        let sensitivity = 0.3;
        self.rig
            .driver_mut::<YawPitch>()
            .rotate_yaw_pitch(-delta_x * sensitivity, -delta_y * sensitivity);
    }

    /// Move along camera axes: x = right, y = up (world), z = forward.
    pub fn fly(&mut self, direction: Vec3, boost: bool, dt: f32) {
        if direction == Vec3::ZERO {
            return;
        }
        let rotation = self.rotation();
        let planar = rotation * Vec3::new(direction.x, 0.0, -direction.z);
        let mut step = planar + Vec3::Y * direction.y;
        step = step.clamp_length_max(1.0) * self.speed * dt;
        if boost {
            step *= 4.0;
        }
        self.rig.driver_mut::<Position>().translate(mint::Vector3 {
            x: step.x,
            y: step.y,
            z: step.z,
        });
    }

    /// Scale speed by scroll (positive = faster)
    pub fn adjust_speed(&mut self, scroll: f32) {
        self.speed = (self.speed * (1.0 + scroll * 0.002)).clamp(0.05, 100.0);
    }

    /// Back to the starting position and orientation
    pub fn reset(&mut self) {
        let (position, yaw, pitch) = self.home;
        self.rig.driver_mut::<Position>().position = mint::Point3 {
            x: position.x,
            y: position.y,
            z: position.z,
        };
        self.set_angles(yaw, pitch);
        self.speed = DEFAULT_SPEED;
    }

    /// Yaw and pitch in degrees (from final transform)
    pub fn angles(&self) -> (f32, f32) {
        let (yaw, pitch, _) = self.rotation().to_euler(glam::EulerRot::YXZ);
        (yaw.to_degrees(), pitch.to_degrees())
    }

    /// Set yaw and pitch angles in degrees
    pub fn set_angles(&mut self, yaw: f32, pitch: f32) {
        self.rig.driver_mut::<YawPitch>().set_rotation_quat(mint::Quaternion::from(Quat::from_euler(
            glam::EulerRot::YXZ,
            yaw.to_radians(),
            pitch.to_radians(),
            0.0,
        )));
    }

    /// Update camera (call each frame)
    pub fn update(&mut self, dt: f32) {
        self.rig.update(dt);
    }

    fn rotation(&self) -> Quat {
        let rot = self.rig.final_transform.rotation;
        Quat::from_xyzw(rot.v.x, rot.v.y, rot.v.z, rot.s)
    }

    /// Get camera position
    pub fn position(&self) -> Vec3 {
        let p = self.rig.final_transform.position;
        Vec3::new(p.x, p.y, p.z)
    }

    /// Get view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let t = &self.rig.final_transform;
        let pos = self.position();
        let fwd: Vec3 = t.forward();
        let up: Vec3 = t.up();
        Mat4::look_at_rh(pos, pos + fwd, up)
    }

    /// Right-handed projection with 0..1 depth
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect.max(1e-3), self.near, self.far)
    }
}

impl Default for FlyCamera {
    /// At (5, 1, 5) looking at the origin
    fn default() -> Self {
        let position = Vec3::new(5.0, 1.0, 5.0);
        let pitch = (-position.y / Vec3::new(position.x, 0.0, position.z).length()).atan().to_degrees();
        Self::new(position, 45.0, pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_looks_at_origin() {
        let mut camera = FlyCamera::default();
        camera.update(1.0);
        let eye = camera.position();
        let target = camera.view_matrix().transform_point3(Vec3::ZERO);
        // Origin lies on the view axis: x and y near zero, in front (negative z)
        assert!(target.x.abs() < 1e-3 && target.y.abs() < 1e-3, "{:?}", target);
        assert!(target.z < 0.0);
        assert!((eye - Vec3::new(5.0, 1.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn test_projection_depth_range() {
        let camera = FlyCamera::default();
        let proj = camera.projection_matrix(16.0 / 9.0);
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -camera.near));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -camera.far));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-4);
    }
}
