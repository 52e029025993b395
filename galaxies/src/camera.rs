use std::f32::consts::PI;

use cgmath::{Matrix4, Point3, Rad, SquareMatrix, Vector3, VectorSpace, Zero};

use crate::constants::{FIELD_OF_VIEW, RECENTER_STEPS, Z_FAR, Z_NEAR};

#[rustfmt::skip]
const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Sine ease-in-out on `[0, 1]`.
pub fn ease(x: f32) -> f32 {
    ((x - 0.5) * PI).sin() * 0.5 + 0.5
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Recenter {
    Idle,
    Moving {
        start: Vector3<f32>,
        end: Vector3<f32>,
        step: u32,
    },
}

/// Orbit camera around the origin. The universe is moved under it through a
/// model translation, and spun by an accumulated view rotation.
pub struct Camera {
    projection: Matrix4<f32>,
    view_translation: Matrix4<f32>,
    view_rotation: Matrix4<f32>,
    center: Vector3<f32>,
    recenter: Recenter,
    matrix: Matrix4<f32>,
    changed: bool,
}

impl Camera {
    /// Camera looking at the origin from `2 * bounds` along +z.
    pub fn new(aspect: f32, bounds: f32) -> Self {
        let eye = Point3::new(0.0, 0.0, 2.0 * bounds);
        Self {
            projection: projection(aspect),
            view_translation: Matrix4::look_at_rh(eye, Point3::new(0.0, 0.0, 0.0), Vector3::unit_y()),
            view_rotation: Matrix4::identity(),
            center: Vector3::zero(),
            recenter: Recenter::Idle,
            matrix: Matrix4::identity(),
            changed: true,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.projection = projection(width as f32 / height as f32);
        self.changed = true;
    }

    /// Spin the view. The deltas apply on top of everything before them.
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.view_rotation = Matrix4::from_angle_y(Rad(delta_yaw))
            * Matrix4::from_angle_x(Rad(delta_pitch))
            * self.view_rotation;
        self.changed = true;
    }

    /// Current model translation.
    pub fn center(&self) -> Vector3<f32> {
        self.center
    }

    pub fn is_recentering(&self) -> bool {
        matches!(self.recenter, Recenter::Moving { .. })
    }

    /// Start easing the model translation to `end`. Restarts from the current
    /// translation if an animation is already running.
    pub fn begin_recenter(&mut self, end: Vector3<f32>) {
        self.recenter = Recenter::Moving {
            start: self.center,
            end,
            step: 0,
        };
    }

    /// Set the model translation immediately, dropping any running animation.
    pub fn jump_to(&mut self, end: Vector3<f32>) {
        self.recenter = Recenter::Idle;
        self.center = end;
        self.changed = true;
    }

    /// Move a running recenter animation forward one tick.
    pub fn advance(&mut self) {
        let Recenter::Moving { start, end, step } = self.recenter else {
            return;
        };
        let step = step + 1;
        if step >= RECENTER_STEPS {
            self.center = end;
            self.recenter = Recenter::Idle;
        } else {
            let progress = step as f32 / RECENTER_STEPS as f32;
            self.center = start.lerp(end, ease(progress));
            self.recenter = Recenter::Moving { start, end, step };
        }
        self.changed = true;
    }

    /// Whether the model translation is more than `bounds` away from
    /// `target` along any axis.
    pub fn drifted_from(&self, target: Vector3<f32>, bounds: f32) -> bool {
        let d = self.center - target;
        d.x.abs() > bounds || d.y.abs() > bounds || d.z.abs() > bounds
    }

    /// Model-view-projection matrix, rebuilt only after something moved.
    pub fn matrix(&mut self) -> Matrix4<f32> {
        if self.changed {
            let model = Matrix4::from_translation(self.center);
            self.matrix = self.projection * (self.view_translation * (self.view_rotation * model));
            self.changed = false;
        }
        self.matrix
    }
}

fn projection(aspect: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Rad(FIELD_OF_VIEW), aspect, Z_NEAR, Z_FAR)
}
