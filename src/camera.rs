//! Camera, projection and the two interchangeable camera controllers.
//!
//! [`Camera`] is plain data (eye, center, up); everything derived from it is
//! computed on demand. Controllers own a camera and move it from the input
//! collected in [`InputState`] once per frame.

use std::collections::HashSet;

use cgmath::{InnerSpace, Matrix3, Point3, Rad, Vector3};
use instant::Duration;
use winit::{
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::data_structures::document::Bounds;

/// cgmath produces OpenGL clip space (z in [-1, 1]); wgpu expects z in [0, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Closest the trackball lets the eye get to the center.
const MIN_ORBIT_DISTANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub center: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new(eye: Point3<f32>, center: Point3<f32>, up: Vector3<f32>) -> Self {
        Self { eye, center, up }
    }

    /// Looks at the center of `bounds` from along its diagonal.
    ///
    /// Flat scenes (no depth along z) are viewed from the side instead, and a
    /// scene without extent is looked at from one unit along +z.
    pub fn from_bounds(bounds: &Bounds) -> Self {
        let up = Vector3::unit_y();
        let center = bounds.center();
        let diag = bounds.diagonal();
        let eye = if diag.z > 0.0 {
            center + diag
        } else {
            let side = diag.cross(up) * 2.0;
            if side.magnitude2() > 0.0 {
                center + side
            } else {
                center + Vector3::unit_z()
            }
        };
        Self { eye, center, up }
    }

    pub fn view_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::look_at_rh(self.eye, self.center, self.up)
    }

    /// Unnormalized eye-to-center vector.
    pub fn direction(&self) -> Vector3<f32> {
        self.center - self.eye
    }

    pub fn front(&self) -> Vector3<f32> {
        self.direction().normalize()
    }

    pub fn left(&self) -> Vector3<f32> {
        self.up.cross(self.front()).normalize()
    }

    /// Up vector orthogonal to the viewing direction.
    pub fn real_up(&self) -> Vector3<f32> {
        self.front().cross(self.left())
    }

    /// Translates eye and center together in the camera frame.
    pub fn move_local(&mut self, truck_left: f32, pedestal_up: f32, dolly_in: f32) {
        let offset =
            self.left() * truck_left + self.real_up() * pedestal_up + self.front() * dolly_in;
        self.eye += offset;
        self.center += offset;
    }

    /// Turns the view around the eye: `pan` around the up axis, `tilt` around
    /// the left axis.
    pub fn look_around(&mut self, pan: Rad<f32>, tilt: Rad<f32>) {
        let direction = self.direction();
        let rotated = Matrix3::from_axis_angle(self.up.normalize(), pan) * direction;
        let tilted = Matrix3::from_axis_angle(self.left(), tilt) * rotated;
        let next = if facing_up(tilted, self.up) { rotated } else { tilted };
        self.center = self.eye + next;
    }

    /// Moves the eye around the center at constant distance.
    pub fn orbit(&mut self, yaw: Rad<f32>, pitch: Rad<f32>) {
        let offset = self.eye - self.center;
        let rotated = Matrix3::from_axis_angle(self.up.normalize(), yaw) * offset;
        let left = self.up.cross(-rotated).normalize();
        let pitched = Matrix3::from_axis_angle(left, pitch) * rotated;
        let next = if facing_up(pitched, self.up) { rotated } else { pitched };
        self.eye = self.center + next;
    }

    /// Moves the eye toward the center without crossing it.
    pub fn zoom(&mut self, amount: f32) {
        let offset = self.eye - self.center;
        let distance = offset.magnitude();
        let next = (distance - amount).max(MIN_ORBIT_DISTANCE);
        self.eye = self.center + offset * (next / distance);
    }

    /// The command line flag reproducing this camera.
    pub fn lookat_args(&self) -> String {
        format!(
            "--lookat {},{},{},{},{},{},{},{},{}",
            self.eye.x,
            self.eye.y,
            self.eye.z,
            self.center.x,
            self.center.y,
            self.center.z,
            self.up.x,
            self.up.y,
            self.up.z
        )
    }
}

/// True when `v` has become (anti)parallel to `up`, where look-at degenerates.
fn facing_up(v: Vector3<f32>, up: Vector3<f32>) -> bool {
    v.normalize().dot(up.normalize()).abs() > 0.999
}

/// Perspective projection sized from the scene extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// 70 degree field of view with clip planes at `0.001 * d` and `1.5 * d`.
    pub fn for_scene(width: u32, height: u32, max_distance: f32) -> Self {
        Self::new(
            width,
            height,
            cgmath::Deg(70.0),
            0.001 * max_distance,
            1.5 * max_distance,
        )
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> cgmath::Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Length of the scene diagonal, 100 for scenes without extent.
pub fn max_distance(bounds: &Bounds) -> f32 {
    let d = bounds.diagonal().magnitude();
    if d > 0.0 { d } else { 100.0 }
}

/// Input gathered from window and device events between two updates.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    left: bool,
    right: bool,
    middle: bool,
    mouse_delta: (f32, f32),
    scroll: f32,
}

impl InputState {
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => {
                    self.keys.insert(*code);
                }
                ElementState::Released => {
                    self.keys.remove(code);
                }
            },
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state.is_pressed();
                match button {
                    MouseButton::Left => self.left = pressed,
                    MouseButton::Right => self.right = pressed,
                    MouseButton::Middle => self.middle = pressed,
                    _ => (),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
            }
            WindowEvent::Focused(false) => self.release_all(),
            _ => (),
        }
    }

    /// Raw mouse motion, independent of the cursor position.
    pub fn handle_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.mouse_delta.0 += dx as f32;
        self.mouse_delta.1 += dy as f32;
    }

    pub fn press_key(&mut self, code: KeyCode) {
        self.keys.insert(code);
    }

    pub fn set_buttons(&mut self, left: bool, right: bool, middle: bool) {
        self.left = left;
        self.right = right;
        self.middle = middle;
    }

    pub fn scroll_by(&mut self, lines: f32) {
        self.scroll += lines;
    }

    fn is_down(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }

    /// Axis value from a pair of keys: +1, -1 or 0.
    fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        (self.is_down(positive) as i32 - self.is_down(negative) as i32) as f32
    }

    /// Forgets the motion accumulated this frame. Held keys and buttons stay.
    pub fn end_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.scroll = 0.0;
    }

    fn release_all(&mut self) {
        self.keys.clear();
        self.left = false;
        self.right = false;
        self.middle = false;
        self.end_frame();
    }
}

/// Orbits around the center with the left button, zooms with the wheel or
/// the right button, pans with the middle button.
#[derive(Debug, Clone)]
pub struct TrackballController {
    camera: Camera,
    speed: f32,
    sensitivity: f32,
}

impl TrackballController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            camera: Camera::new(Point3::new(0.0, 0.0, 1.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y()),
            speed,
            sensitivity,
        }
    }

    fn update(&mut self, input: &InputState, dt: Duration) {
        let (dx, dy) = input.mouse_delta;
        if input.left {
            self.camera
                .orbit(Rad(-dx * self.sensitivity), Rad(-dy * self.sensitivity));
        } else if input.middle {
            let scale = self.speed * 0.002;
            self.camera.move_local(dx * scale, dy * scale, 0.0);
        } else if input.right {
            self.camera.zoom(dy * self.speed * 0.002);
        }
        let dt = dt.as_secs_f32();
        if input.scroll != 0.0 {
            self.camera.zoom(input.scroll * self.speed * 0.1);
        }
        let keyboard_zoom = input.axis(KeyCode::KeyW, KeyCode::KeyS);
        if keyboard_zoom != 0.0 {
            self.camera.zoom(keyboard_zoom * self.speed * dt);
        }
    }
}

/// WASD / QE flying camera, looking around while the left button is held.
#[derive(Debug, Clone)]
pub struct FirstPersonController {
    camera: Camera,
    speed: f32,
    sensitivity: f32,
}

impl FirstPersonController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            camera: Camera::new(Point3::new(0.0, 0.0, 1.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y()),
            speed,
            sensitivity,
        }
    }

    fn update(&mut self, input: &InputState, dt: Duration) {
        let distance = self.speed * dt.as_secs_f32();
        let forward = input.axis(KeyCode::KeyW, KeyCode::KeyS);
        let left = input.axis(KeyCode::KeyA, KeyCode::KeyD);
        let up = input.axis(KeyCode::KeyE, KeyCode::KeyQ);
        if forward != 0.0 || left != 0.0 || up != 0.0 {
            self.camera
                .move_local(left * distance, up * distance, forward * distance);
        }
        if input.left {
            let (dx, dy) = input.mouse_delta;
            self.camera
                .look_around(Rad(-dx * self.sensitivity), Rad(dy * self.sensitivity));
        }
    }
}

/// The active camera strategy. Swapping keeps the current camera.
#[derive(Debug, Clone)]
pub enum CameraController {
    Trackball(TrackballController),
    FirstPerson(FirstPersonController),
}

impl CameraController {
    /// Controller moving at a pace proportional to the scene size.
    pub fn trackball(max_distance: f32) -> Self {
        CameraController::Trackball(TrackballController::new(0.5 * max_distance, 0.005))
    }

    pub fn first_person(max_distance: f32) -> Self {
        CameraController::FirstPerson(FirstPersonController::new(0.5 * max_distance, 0.003))
    }

    pub fn update(&mut self, input: &InputState, dt: Duration) {
        match self {
            CameraController::Trackball(c) => c.update(input, dt),
            CameraController::FirstPerson(c) => c.update(input, dt),
        }
    }

    pub fn camera(&self) -> Camera {
        match self {
            CameraController::Trackball(c) => c.camera,
            CameraController::FirstPerson(c) => c.camera,
        }
    }

    pub fn set_camera(&mut self, camera: Camera) {
        match self {
            CameraController::Trackball(c) => c.camera = camera,
            CameraController::FirstPerson(c) => c.camera = camera,
        }
    }

    /// Switches trackball <-> first person, preserving the camera.
    pub fn swap(&mut self, max_distance: f32) {
        let camera = self.camera();
        *self = match self {
            CameraController::Trackball(_) => Self::first_person(max_distance),
            CameraController::FirstPerson(_) => Self::trackball(max_distance),
        };
        self.set_camera(camera);
    }

    pub fn name(&self) -> &'static str {
        match self {
            CameraController::Trackball(_) => "trackball",
            CameraController::FirstPerson(_) => "first-person",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{EuclideanSpace, MetricSpace};

    fn bounds(min: [f32; 3], max: [f32; 3]) -> Bounds {
        Bounds {
            min: min.into(),
            max: max.into(),
        }
    }

    fn approx(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-4
    }

    #[test]
    fn default_camera_looks_along_the_diagonal() {
        let camera = Camera::from_bounds(&bounds([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]));
        assert_eq!(camera.center, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(camera.eye, Point3::new(3.0, 3.0, 3.0));
        assert_eq!(camera.up, Vector3::unit_y());
    }

    #[test]
    fn flat_scene_is_viewed_from_the_side() {
        let camera = Camera::from_bounds(&bounds([0.0, 0.0, 0.0], [2.0, 0.0, 0.0]));
        // 2 * (diag x up) = 2 * ((2,0,0) x (0,1,0)) = (0,0,4)
        assert_eq!(camera.eye, Point3::new(1.0, 0.0, 4.0));
    }

    #[test]
    fn degenerate_scene_still_has_a_valid_view() {
        let camera = Camera::from_bounds(&bounds([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]));
        assert_ne!(camera.eye, camera.center);
        assert!(camera.view_matrix().x.x.is_finite());
    }

    #[test]
    fn camera_frame_is_orthonormal() {
        let camera = Camera::new(
            Point3::new(3.0, 2.0, 5.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        assert!((camera.front().magnitude() - 1.0).abs() < 1e-5);
        assert!((camera.left().magnitude() - 1.0).abs() < 1e-5);
        assert!(camera.front().dot(camera.left()).abs() < 1e-5);
        assert!(camera.real_up().dot(camera.front()).abs() < 1e-5);
    }

    #[test]
    fn orbit_keeps_distance_to_center() {
        let mut camera = Camera::new(
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        camera.orbit(Rad(0.7), Rad(0.3));
        assert!((camera.eye.distance(camera.center) - 5.0).abs() < 1e-4);
        assert_eq!(camera.center, Point3::origin());
    }

    #[test]
    fn zoom_never_crosses_the_center() {
        let mut camera = Camera::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        camera.zoom(10.0);
        assert!(camera.eye.z > 0.0);
    }

    #[test]
    fn swapping_controllers_preserves_the_camera() {
        let camera = Camera::new(
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(0.0, 1.0, 0.0),
            Vector3::unit_y(),
        );
        let mut controller = CameraController::trackball(10.0);
        controller.set_camera(camera);
        controller.swap(10.0);
        assert_eq!(controller.name(), "first-person");
        assert_eq!(controller.camera(), camera);
        controller.swap(10.0);
        assert_eq!(controller.name(), "trackball");
        assert_eq!(controller.camera(), camera);
    }

    #[test]
    fn first_person_moves_forward_with_time() {
        let camera = Camera::new(
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        let mut controller = CameraController::first_person(2.0);
        controller.set_camera(camera);
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);
        controller.update(&input, Duration::from_secs(1));
        // speed is half the scene size per second
        let moved = controller.camera();
        assert!(approx(moved.eye - camera.eye, Vector3::new(0.0, 0.0, -1.0)));
        assert!(approx(moved.center - camera.center, Vector3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn trackball_ignores_idle_input() {
        let camera = Camera::new(
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        let mut controller = CameraController::trackball(2.0);
        controller.set_camera(camera);
        controller.update(&InputState::default(), Duration::from_millis(16));
        assert_eq!(controller.camera(), camera);
    }

    #[test]
    fn trackball_scroll_zooms_in() {
        let camera = Camera::new(
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
            Vector3::unit_y(),
        );
        let mut controller = CameraController::trackball(10.0);
        controller.set_camera(camera);
        let mut input = InputState::default();
        input.scroll_by(1.0);
        controller.update(&input, Duration::from_millis(16));
        assert!(controller.camera().eye.z < 5.0);
        input.end_frame();
        let before = controller.camera();
        controller.update(&input, Duration::from_millis(16));
        assert_eq!(controller.camera(), before);
    }

    #[test]
    fn lookat_args_round_trip_the_pose() {
        let camera = Camera::new(
            Point3::new(1.0, 2.0, 3.0),
            Point3::new(4.0, 5.0, 6.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(camera.lookat_args(), "--lookat 1,2,3,4,5,6,0,1,0");
    }

    #[test]
    fn projection_spans_the_scene() {
        let projection = Projection::for_scene(800, 600, 10.0);
        assert_eq!(projection.znear, 0.01);
        assert_eq!(projection.zfar, 15.0);
        assert_eq!(max_distance(&bounds([0.0; 3], [0.0; 3])), 100.0);
    }
}
