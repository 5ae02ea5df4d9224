//! Input handling for keyboard and mouse.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Tracks the current state of keyboard and mouse input.
///
/// Events arrive between frames; [`begin_frame`](Self::begin_frame) clears the
/// per-frame parts after they have been consumed.
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently pressed keys
    pressed_keys: HashSet<KeyCode>,
    /// Keys that were just pressed this frame
    just_pressed_keys: HashSet<KeyCode>,

    /// Currently pressed mouse buttons
    pressed_buttons: HashSet<MouseButton>,

    /// Last cursor position, unknown until the first move event
    mouse_position: Option<(f32, f32)>,
    /// Cursor movement accumulated since the last frame
    mouse_delta: (f32, f32),
}

impl InputState {
    /// Create a new input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the beginning of each frame to clear per-frame state.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    /// Handle a key press event. Auto-repeat presses are ignored.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.pressed_buttons.insert(button);
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Handle a cursor move to `(x, y)` in physical pixels.
    ///
    /// Several moves per frame add up. The first move only records a position.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.mouse_position {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.mouse_position = Some((x, y));
    }

    /// Forget the cursor position, e.g. when it leaves the window.
    pub fn on_mouse_left(&mut self) {
        self.mouse_position = None;
    }

    /// Check if a key is currently pressed.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Check if a key was just pressed this frame.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Check if a mouse button is currently pressed.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Get the mouse movement delta since last frame.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_and_release() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyW); // repeat
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));

        input.on_key_released(KeyCode::KeyW);
        assert!(!input.is_key_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_first_move_has_no_delta() {
        let mut input = InputState::new();
        input.on_mouse_moved(400.0, 300.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_moves_accumulate_until_next_frame() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 100.0);
        input.on_mouse_moved(110.0, 95.0);
        input.on_mouse_moved(125.0, 90.0);
        assert_eq!(input.mouse_delta(), (25.0, -10.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        input.on_mouse_moved(130.0, 90.0);
        assert_eq!(input.mouse_delta(), (5.0, 0.0));
    }

    #[test]
    fn test_leaving_window_resets_position() {
        let mut input = InputState::new();
        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_left();
        input.on_mouse_moved(900.0, 900.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_mouse_buttons() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Left);
        assert!(input.is_mouse_pressed(MouseButton::Left));
        assert!(!input.is_mouse_pressed(MouseButton::Right));
        input.on_mouse_released(MouseButton::Left);
        assert!(!input.is_mouse_pressed(MouseButton::Left));
    }
}
