use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// World-space transform of one interactable: position, unit-quaternion rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            ..Self::identity()
        }
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Component-wise comparison within `epsilon`; rotations compare by angle.
    pub fn approx_eq(&self, other: &Pose, epsilon: f32) -> bool {
        (self.position - other.position).amax() <= epsilon
            && (self.scale - other.scale).amax() <= epsilon
            && self.rotation.angle_to(&other.rotation) <= epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_has_unit_scale() {
        let pose = Pose::identity();
        assert_eq!(pose.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(pose.position, Vector3::zeros());
        assert_eq!(Pose::default(), pose);
    }

    #[test]
    fn approx_eq_tolerates_small_drift_only() {
        let a = Pose::at(1.0, 2.0, 3.0)
            .with_rotation(UnitQuaternion::from_euler_angles(0.0, 0.5, 0.0));
        let mut b = a;
        b.position.x += 1.0e-5;
        assert!(a.approx_eq(&b, 1.0e-4));

        let c = a.with_rotation(UnitQuaternion::from_euler_angles(0.0, 0.6, 0.0));
        assert!(!a.approx_eq(&c, 1.0e-4));
    }
}
