use std::collections::HashSet;

use crate::camera::Movement;

/// Something a key can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Move(Movement),
    Quit,
}

/// Window input already translated out of the windowing library's types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    CursorMoved { x: f32, y: f32 },
    Scrolled { delta: f32 },
    Key { action: Action, pressed: bool },
    Resized { width: u32, height: u32 },
}

/// Movement keys currently held down.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<Movement>,
    quit_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_action(&mut self, action: Action, pressed: bool) {
        match action {
            Action::Quit => self.quit_requested |= pressed,
            Action::Move(movement) if pressed => {
                self.held.insert(movement);
            }
            Action::Move(movement) => {
                self.held.remove(&movement);
            }
        }
    }

    pub fn is_held(&self, movement: Movement) -> bool {
        self.held.contains(&movement)
    }

    /// Held movements in a stable order so displacement is deterministic.
    pub fn held_movements(&self) -> impl Iterator<Item = Movement> + '_ {
        [
            Movement::Forward,
            Movement::Backward,
            Movement::Left,
            Movement::Right,
            Movement::Up,
            Movement::Down,
        ]
        .into_iter()
        .filter(|movement| self.held.contains(movement))
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}
