//! Camera - trajectories, poses and projection
//!
//! A trajectory is a pure function of elapsed time. It carries no state
//! between calls, so the pose for frame `i` depends only on `i / fps`.

use aria_core::{Mat4, RenderConfig, Vec3};

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            fov_y: config.fov_radians(),
            aspect: config.resolution.aspect(),
            near: config.near_plane,
            far: config.far_plane,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Focal length in pixels for an image `height` pixels tall
    pub fn focal_px(&self, height: u32) -> f32 {
        0.5 * height as f32 / (0.5 * self.fov_y).tan()
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// Camera state for a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraPose {
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, projection: &Projection) -> Self {
        Self {
            position: eye,
            view: Mat4::look_at(eye, target, up),
            projection: projection.matrix(),
        }
    }

    /// `P * V`
    pub fn view_projection(&self) -> Mat4 {
        self.projection.mul_mat(&self.view)
    }
}

/// Camera path over elapsed session time
pub trait CameraTrajectory: Send + Sync {
    /// Pose at `t` seconds after the start of the stream
    fn pose_at(&self, t: f64) -> CameraPose;
}

/// Default orbit radius in world units
pub const DEFAULT_ORBIT_RADIUS: f32 = 2.0;
/// Default orbit angular rate in radians per second
pub const DEFAULT_ORBIT_RATE: f32 = 0.5;

/// Circular orbit in the XZ plane around a target, looking at it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitTrajectory {
    pub radius: f32,
    /// Radians per second
    pub angular_rate: f32,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl OrbitTrajectory {
    pub fn new(projection: Projection) -> Self {
        Self::with_orbit(projection, DEFAULT_ORBIT_RADIUS, DEFAULT_ORBIT_RATE)
    }

    pub fn with_orbit(projection: Projection, radius: f32, angular_rate: f32) -> Self {
        Self {
            radius,
            angular_rate,
            target: Vec3::ZERO,
            up: Vec3::UNIT_Y,
            projection,
        }
    }

    /// Eye position at `t` seconds
    pub fn eye_at(&self, t: f64) -> Vec3 {
        let angle = self.angular_rate as f64 * t;
        let r = self.radius as f64;
        self.target + Vec3::new((r * angle.cos()) as f32, 0.0, (r * angle.sin()) as f32)
    }
}

impl CameraTrajectory for OrbitTrajectory {
    fn pose_at(&self, t: f64) -> CameraPose {
        CameraPose::look_at(self.eye_at(t), self.target, self.up, &self.projection)
    }
}

/// Fixed camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticTrajectory {
    pose: CameraPose,
}

impl StaticTrajectory {
    pub fn new(eye: Vec3, target: Vec3, projection: Projection) -> Self {
        Self {
            pose: CameraPose::look_at(eye, target, Vec3::UNIT_Y, &projection),
        }
    }
}

impl CameraTrajectory for StaticTrajectory {
    fn pose_at(&self, _t: f64) -> CameraPose {
        self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_orbit_start_pose() {
        let orbit = OrbitTrajectory::new(Projection::default());
        let pose = orbit.pose_at(0.0);
        assert!(close(pose.position.x, 2.0));
        assert!(close(pose.position.y, 0.0));
        assert!(close(pose.position.z, 0.0));

        // origin sits straight ahead, 2 units down the view axis
        let p = pose.view.transform_point(Vec3::ZERO);
        assert!(close(p.x, 0.0) && close(p.y, 0.0) && close(p.z, -2.0));
    }

    #[test]
    fn test_orbit_quarter_turn() {
        let orbit = OrbitTrajectory::new(Projection::default());
        // 0.5 rad/s -> pi/2 after pi seconds
        let pose = orbit.pose_at(std::f64::consts::PI);
        assert!(close(pose.position.x, 0.0));
        assert!(close(pose.position.z, 2.0));
    }

    #[test]
    fn test_pose_has_no_hidden_state() {
        let orbit = OrbitTrajectory::new(Projection::default());
        let first = orbit.pose_at(0.0);
        for t in [5.0, 0.3, 12.0, 0.0, 1.7] {
            orbit.pose_at(t);
        }
        assert_eq!(orbit.pose_at(0.0), first);
        assert_eq!(orbit.pose_at(1.7), orbit.pose_at(1.7));
    }

    #[test]
    fn test_projection_from_config() {
        let config = RenderConfig::default();
        let proj = Projection::from_config(&config);
        let m = proj.matrix();
        let f = 1.0 / (22.5f32.to_radians()).tan();

        assert!(close(proj.aspect, 640.0 / 480.0));
        assert!(close(m.0[1][1], f));
        assert!(close(m.0[0][0], f / proj.aspect));
        assert!(close(proj.focal_px(480), 240.0 * f));
    }

    #[test]
    fn test_static_trajectory() {
        let fixed = StaticTrajectory::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Projection::default());
        assert_eq!(fixed.pose_at(0.0), fixed.pose_at(100.0));
        assert_eq!(fixed.pose_at(0.0).position, Vec3::new(0.0, 0.0, 3.0));
    }
}
