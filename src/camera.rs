//! Orbit camera, projection and the uniform the shaders read.
//!
//! The camera circles a target point: left-drag rotates, right-drag pans the
//! target, the wheel moves towards or away from it.

use cgmath::*;
use instant::Duration;
use std::f32::consts::FRAC_PI_2;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use crate::data_structures::geometry::Bounds;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;
const MIN_DISTANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: Point3<f32>,
    pub distance: f32,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<T: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        target: T,
        distance: f32,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            target: target.into(),
            distance: distance.max(MIN_DISTANCE),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    /// With zero yaw and pitch the eye sits on +z looking down -z.
    pub fn eye(&self) -> Point3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let offset = Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw);
        self.target + offset * self.distance
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
    }

    /// Orbit around the centre of `bounds`, backing off far enough to see all of it.
    pub fn focus(&mut self, bounds: &Bounds, fovy: Rad<f32>) {
        self.target = Point3::from(bounds.center());
        let fit = bounds.radius() / (fovy.0 * 0.5).sin();
        if fit.is_finite() {
            self.distance = self.distance.max(fit);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Drag {
    #[default]
    None,
    Rotate,
    Pan,
}

/// Accumulates mouse input between frames and applies it in [`CameraController::update`].
#[derive(Debug)]
pub struct CameraController {
    rotate_horizontal: f32,
    rotate_vertical: f32,
    pan_horizontal: f32,
    pan_vertical: f32,
    scroll: f32,
    drag: Drag,
    cursor: Option<PhysicalPosition<f64>>,
    sensitivity: f32,
    zoom_speed: f32,
}

impl CameraController {
    pub fn new(sensitivity: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            pan_horizontal: 0.0,
            pan_vertical: 0.0,
            scroll: 0.0,
            drag: Drag::None,
            cursor: None,
            sensitivity,
            zoom_speed,
        }
    }

    /// Feed a pointer delta in pixels; what it does depends on the held button.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        match self.drag {
            Drag::Rotate => {
                self.rotate_horizontal += dx as f32;
                self.rotate_vertical += dy as f32;
            }
            Drag::Pan => {
                self.pan_horizontal += dx as f32;
                self.pan_vertical += dy as f32;
            }
            Drag::None => (),
        }
    }

    pub fn handle_scroll(&mut self, delta: &MouseScrollDelta) {
        self.scroll += match delta {
            MouseScrollDelta::LineDelta(_, scroll) => *scroll,
            MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => *y as f32 / 50.0,
        };
    }

    /// Returns whether the event was used.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => Drag::Rotate,
                    (MouseButton::Right, ElementState::Pressed) => Drag::Pan,
                    (_, ElementState::Released) => Drag::None,
                    _ => return false,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(last) = self.cursor.replace(*position) {
                    self.handle_mouse(position.x - last.x, position.y - last.y);
                }
                self.drag != Drag::None
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = Drag::None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.handle_scroll(delta);
                true
            }
            _ => false,
        }
    }

    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        // Zooming is multiplicative so it feels the same at any distance.
        camera.distance =
            (camera.distance * (1.0 - self.scroll * self.zoom_speed * dt)).max(MIN_DISTANCE);
        self.scroll = 0.0;

        camera.yaw -= Rad(self.rotate_horizontal) * self.sensitivity * dt;
        camera.pitch += Rad(self.rotate_vertical) * self.sensitivity * dt;
        camera.pitch = Rad(camera.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;

        // Pan in the view plane, scaled with distance.
        let forward = (camera.target - camera.eye()).normalize();
        let right = forward.cross(Vector3::unit_y()).normalize();
        let up = right.cross(forward);
        let scale = camera.distance * self.sensitivity * dt * 0.1;
        camera.target += (-right * self.pan_horizontal + up * self.pan_vertical) * scale;
        self.pan_horizontal = 0.0;
        self.pan_vertical = 0.0;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.eye().to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

/// GPU side of the camera: uniform buffer plus its bind group.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: CameraController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        controller: CameraController,
        projection: &Projection,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Apply pending input and upload the new matrices.
    pub fn update(&mut self, queue: &wgpu::Queue, projection: &Projection, dt: Duration) {
        self.controller.update(&mut self.camera, dt);
        self.uniform.update_view_proj(&self.camera, projection);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn default_eye_is_on_positive_z() {
        let camera = Camera::new((0.0, 0.0, 0.0), 5.0, Deg(0.0), Deg(0.0));
        let eye = camera.eye();
        assert!(close(eye.x, 0.0) && close(eye.y, 0.0) && close(eye.z, 5.0));
    }

    #[test]
    fn projection_follows_the_window_aspect() {
        let mut projection = Projection::new(800, 600, Deg(75.0), 0.1, 1000.0);
        assert!(close(projection.aspect(), 800.0 / 600.0));
        projection.resize(1000, 500);
        assert!(close(projection.aspect(), 2.0));
        projection.resize(0, 500);
        assert!(close(projection.aspect(), 2.0));
    }

    #[test]
    fn dragging_rotates_only_while_a_button_is_held() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), 5.0, Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(1.0, 1.0);
        controller.handle_mouse(100.0, 0.0);
        controller.update(&mut camera, Duration::from_secs(1));
        assert_eq!(camera.yaw, Rad(0.0));

        controller.drag = Drag::Rotate;
        controller.handle_mouse(1.0, 0.0);
        controller.update(&mut camera, Duration::from_secs(1));
        assert!(close(camera.yaw.0, -1.0));
        assert!(close(camera.distance, 5.0));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), 5.0, Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(1.0, 1.0);
        controller.drag = Drag::Rotate;
        controller.handle_mouse(0.0, 1000.0);
        controller.update(&mut camera, Duration::from_secs(1));
        assert!(camera.pitch.0 < FRAC_PI_2);
    }

    #[test]
    fn scrolling_zooms_in() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), 5.0, Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(1.0, 0.5);
        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, 1.0));
        controller.update(&mut camera, Duration::from_secs(1));
        assert!(close(camera.distance, 2.5));
    }

    #[test]
    fn panning_moves_the_target() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), 5.0, Deg(0.0), Deg(0.0));
        let mut controller = CameraController::new(1.0, 1.0);
        controller.drag = Drag::Pan;
        controller.handle_mouse(10.0, 0.0);
        controller.update(&mut camera, Duration::from_secs(1));
        // dragging right moves the scene with the pointer, so the target goes left
        assert!(camera.target.x < 0.0);
        assert!(close(camera.target.y, 0.0));
    }

    #[test]
    fn focus_centres_on_the_bounds() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), 1.0, Deg(0.0), Deg(0.0));
        let bounds = Bounds {
            min: [0.0, 0.0, 0.0],
            max: [2.0, 4.0, 2.0],
        };
        camera.focus(&bounds, Deg(90.0).into());
        assert_eq!(camera.target, Point3::new(1.0, 2.0, 1.0));
        assert!(camera.distance >= bounds.radius());
    }
}
