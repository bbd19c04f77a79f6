//! First-person camera control
//!
//! Mouse movement and the arrow keys turn the viewer; WASD moves it in the XZ plane
//! relative to where it faces, E and Q move it up and down. The camera's Y axis points
//! down, so "up" is negative Y.

use glfw::{Action, Key};

use frame_engine::foundation::math::{utils, Vec3};
use frame_engine::render::backends::vulkan::GlfwWindow;
use frame_engine::scene::TransformComponent;

/// Pitch limit in radians, just short of straight up or down
pub const MAX_PITCH: f32 = 1.5;

/// Cursor movement in pixels per unit of look input
const MOUSE_DIVISOR: f64 = 4.0;

/// Keyboard and cursor state read once per frame
pub trait InputState {
    /// Whether `key` is held down
    fn is_pressed(&self, key: Key) -> bool;

    /// Cursor position in screen coordinates
    fn cursor_position(&self) -> (f64, f64);
}

impl InputState for GlfwWindow {
    fn is_pressed(&self, key: Key) -> bool {
        self.key(key) != Action::Release
    }

    fn cursor_position(&self) -> (f64, f64) {
        self.cursor_pos()
    }
}

/// Key bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMappings {
    pub move_left: Key,
    pub move_right: Key,
    pub move_forward: Key,
    pub move_backward: Key,
    pub move_up: Key,
    pub move_down: Key,
    pub look_left: Key,
    pub look_right: Key,
    pub look_up: Key,
    pub look_down: Key,
    pub close: Key,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: Key::A,
            move_right: Key::D,
            move_forward: Key::W,
            move_backward: Key::S,
            move_up: Key::E,
            move_down: Key::Q,
            look_left: Key::Left,
            look_right: Key::Right,
            look_up: Key::Up,
            look_down: Key::Down,
            close: Key::Escape,
        }
    }
}

/// Moves a transform from keyboard and mouse input
#[derive(Debug, Clone)]
pub struct KeyboardMovementController {
    /// Bindings
    pub keys: KeyMappings,
    /// Units per second
    pub move_speed: f32,
    /// Radians per second per unit of look input
    pub look_speed: f32,
    last_cursor: Option<(f64, f64)>,
}

impl Default for KeyboardMovementController {
    fn default() -> Self {
        Self {
            keys: KeyMappings::default(),
            move_speed: 3.0,
            look_speed: 1.5,
            last_cursor: None,
        }
    }
}

impl KeyboardMovementController {
    /// Apply one frame of input to `transform`
    ///
    /// The first call only records the cursor position, so a cursor that starts far from
    /// the origin does not spin the view.
    pub fn move_in_plane_xz<I: InputState>(&mut self, input: &I, frame_time: f32, transform: &mut TransformComponent) {
        let mut rotate = self.mouse_look(input.cursor_position());

        let keys = self.keys;
        let axis = |positive: Key, negative: Key| {
            f32::from(u8::from(input.is_pressed(positive))) - f32::from(u8::from(input.is_pressed(negative)))
        };
        rotate.y += axis(keys.look_right, keys.look_left);
        rotate.x += axis(keys.look_up, keys.look_down);

        if rotate.dot(&rotate) > f32::EPSILON {
            transform.rotation += self.look_speed * frame_time * rotate;
        }
        transform.rotation.x = transform.rotation.x.clamp(-MAX_PITCH, MAX_PITCH);
        transform.rotation.y = utils::wrap_angle(transform.rotation.y);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let move_dir = forward * axis(keys.move_forward, keys.move_backward)
            + right * axis(keys.move_right, keys.move_left)
            + up * axis(keys.move_up, keys.move_down);

        if move_dir.dot(&move_dir) > f32::EPSILON {
            transform.translation += self.move_speed * frame_time * move_dir.normalize();
        }
    }

    /// Whether the close key is held
    pub fn wants_close<I: InputState>(&self, input: &I) -> bool {
        input.is_pressed(self.keys.close)
    }

    fn mouse_look(&mut self, cursor: (f64, f64)) -> Vec3 {
        let (last_x, last_y) = self.last_cursor.unwrap_or(cursor);
        self.last_cursor = Some(cursor);
        let dx = (cursor.0 - last_x) / MOUSE_DIVISOR;
        let dy = (cursor.1 - last_y) / MOUSE_DIVISOR;
        Vec3::new(-dy as f32, dx as f32, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use frame_engine::foundation::math::constants::TWO_PI;

    #[derive(Default)]
    struct FakeInput {
        pressed: Vec<Key>,
        cursor: (f64, f64),
    }

    impl FakeInput {
        fn holding(keys: &[Key]) -> Self {
            Self {
                pressed: keys.to_vec(),
                ..Self::default()
            }
        }
    }

    impl InputState for FakeInput {
        fn is_pressed(&self, key: Key) -> bool {
            self.pressed.contains(&key)
        }

        fn cursor_position(&self) -> (f64, f64) {
            self.cursor
        }
    }

    #[test]
    fn test_forward_follows_yaw() {
        let mut controller = KeyboardMovementController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&FakeInput::holding(&[Key::W]), 0.5, &mut transform);
        assert_relative_eq!(transform.translation, Vec3::new(0.0, 0.0, 1.5), epsilon = 1e-6);

        let mut transform = TransformComponent {
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            ..TransformComponent::default()
        };
        controller.move_in_plane_xz(&FakeInput::holding(&[Key::W]), 0.5, &mut transform);
        assert_relative_eq!(transform.translation, Vec3::new(1.5, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let mut controller = KeyboardMovementController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&FakeInput::holding(&[Key::W, Key::D, Key::E]), 1.0, &mut transform);
        assert_relative_eq!(transform.translation.norm(), controller.move_speed, epsilon = 1e-5);
        assert!(transform.translation.y < 0.0);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut controller = KeyboardMovementController::default();
        let mut transform = TransformComponent::default();
        controller.move_in_plane_xz(&FakeInput::holding(&[Key::A, Key::D, Key::Left, Key::Right]), 1.0, &mut transform);
        assert_eq!(transform, TransformComponent::default());
    }

    #[test]
    fn test_pitch_is_clamped_and_yaw_wrapped() {
        let mut controller = KeyboardMovementController::default();
        let mut transform = TransformComponent {
            rotation: Vec3::new(0.0, TWO_PI - 0.1, 0.0),
            ..TransformComponent::default()
        };
        controller.move_in_plane_xz(&FakeInput::holding(&[Key::Up, Key::Right]), 2.0, &mut transform);
        assert_relative_eq!(transform.rotation.x, MAX_PITCH);
        assert!(transform.rotation.y >= 0.0 && transform.rotation.y < TWO_PI);
        assert_relative_eq!(transform.rotation.y, 2.9, epsilon = 1e-4);
    }

    #[test]
    fn test_first_cursor_sample_does_not_turn() {
        let mut controller = KeyboardMovementController::default();
        let mut transform = TransformComponent::default();
        let mut input = FakeInput {
            cursor: (400.0, 300.0),
            ..FakeInput::default()
        };
        controller.move_in_plane_xz(&input, 0.1, &mut transform);
        assert_eq!(transform.rotation, Vec3::zeros());

        input.cursor = (408.0, 296.0);
        controller.move_in_plane_xz(&input, 0.1, &mut transform);
        // 8 px right is 2 units of yaw, 4 px up is 1 unit of pitch
        assert_relative_eq!(transform.rotation.y, 0.3, epsilon = 1e-6);
        assert_relative_eq!(transform.rotation.x, 0.15, epsilon = 1e-6);
    }

    #[test]
    fn test_escape_requests_close() {
        let controller = KeyboardMovementController::default();
        assert!(controller.wants_close(&FakeInput::holding(&[Key::Escape])));
        assert!(!controller.wants_close(&FakeInput::default()));
    }
}
