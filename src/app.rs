//! Window event loop that feeds input into [`FrameState`] and hands each
//! recorded [`FramePlan`](crate::frame::FramePlan) to the [`Renderer`].

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

use crate::camera::Movement;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::frame::{Control, FrameState};
use crate::input::{Action, InputEvent};
use crate::render::Renderer;

/// Pixel scroll deltas are scaled down to roughly one wheel notch.
const PIXELS_PER_SCROLL_LINE: f32 = 100.0;

pub fn window_attributes(config: &Config) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(config.window.title.clone())
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
}

/// Maps a physical key to its default action.
pub fn action_for_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Escape => Action::Quit,
        KeyCode::KeyW => Action::Move(Movement::Forward),
        KeyCode::KeyS => Action::Move(Movement::Backward),
        KeyCode::KeyA => Action::Move(Movement::Left),
        KeyCode::KeyD => Action::Move(Movement::Right),
        KeyCode::KeyX => Action::Move(Movement::Up),
        KeyCode::KeyZ => Action::Move(Movement::Down),
        _ => return None,
    };
    Some(action)
}

/// Runs the demo until the window closes or Escape is pressed.
pub fn run(config: Config) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new(config, SystemClock::new());
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;
    match app.last_error.take() {
        Some(err) => Err(err),
        None => {
            info!("rendered {} frames", app.frame.frames());
            Ok(())
        }
    }
}

pub struct App<C: Clock> {
    config: Config,
    clock: C,
    frame: FrameState,
    renderer: Option<Renderer>,
    /// Unbounded cursor position rebuilt from raw mouse motion, since a
    /// grabbed cursor stops producing window positions on some platforms.
    cursor: (f32, f32),
    last_error: Option<anyhow::Error>,
}

impl<C: Clock> App<C> {
    pub fn new(config: Config, clock: C) -> Self {
        let (width, height) = (config.window.width, config.window.height);
        let frame = FrameState::new(clock.now(), width, height);
        Self {
            config,
            clock,
            frame,
            renderer: None,
            cursor: (width as f32 / 2.0, height as f32 / 2.0),
            last_error: None,
        }
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, event: InputEvent) {
        if self.frame.handle_input(event) == Control::Exit {
            info!("quit requested");
            event_loop.exit();
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };
        let plan = self.frame.advance(self.clock.now());
        match renderer.render(&plan) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = renderer.window().inner_size();
                renderer.resize(size);
                Ok(())
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("surface timeout; retrying next frame");
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("GPU is out of memory")),
            Err(err) => {
                warn!("skipping frame: {err}");
                Ok(())
            }
        }
    }
}

fn capture_cursor(window: &Window) {
    if window.set_cursor_grab(CursorGrabMode::Locked).is_err() {
        if let Err(err) = window.set_cursor_grab(CursorGrabMode::Confined) {
            warn!("cursor grab unavailable: {err}");
        }
    }
    window.set_cursor_visible(false);
}

impl<C: Clock> ApplicationHandler for App<C> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        let window = match event_loop.create_window(window_attributes(&self.config)) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, anyhow!("failed to create window: {err}"));
                return;
            }
        };
        capture_cursor(&window);
        match block_on(Renderer::new(Arc::clone(&window), &self.config)) {
            Ok(renderer) => {
                let size = renderer.size();
                self.dispatch(
                    event_loop,
                    InputEvent::Resized {
                        width: size.width,
                        height: size.height,
                    },
                );
                self.renderer = Some(renderer);
                window.request_redraw();
            }
            Err(err) => self.fail(event_loop, err.context("failed to initialize renderer")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match self.renderer.as_ref() {
            Some(renderer) if renderer.window_id() == window_id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
                self.dispatch(
                    event_loop,
                    InputEvent::Resized {
                        width: size.width,
                        height: size.height,
                    },
                );
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                if event.repeat {
                    return;
                }
                if let Some(action) = action_for_key(code) {
                    let pressed = event.state == ElementState::Pressed;
                    self.dispatch(event_loop, InputEvent::Key { action, pressed });
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_SCROLL_LINE,
                };
                self.dispatch(event_loop, InputEvent::Scrolled { delta });
            }
            WindowEvent::Focused(true) => {
                if let Some(renderer) = self.renderer.as_ref() {
                    capture_cursor(renderer.window());
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, event_loop: &ActiveEventLoop, _: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.cursor.0 += dx as f32;
            self.cursor.1 += dy as f32;
            let (x, y) = self.cursor;
            self.dispatch(event_loop, InputEvent::CursorMoved { x, y });
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_ref() {
            renderer.window().request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::clock::ManualClock;

    #[test]
    fn movement_keys_bind_to_camera_directions() {
        assert_eq!(action_for_key(KeyCode::Escape), Some(Action::Quit));
        assert_eq!(
            action_for_key(KeyCode::KeyW),
            Some(Action::Move(Movement::Forward))
        );
        assert_eq!(
            action_for_key(KeyCode::KeyD),
            Some(Action::Move(Movement::Right))
        );
        assert_eq!(
            action_for_key(KeyCode::KeyZ),
            Some(Action::Move(Movement::Down))
        );
        assert_eq!(action_for_key(KeyCode::Space), None);
    }

    #[test]
    fn each_bound_key_has_its_own_action() {
        let bound = [
            KeyCode::KeyW,
            KeyCode::KeyS,
            KeyCode::KeyA,
            KeyCode::KeyD,
            KeyCode::KeyX,
            KeyCode::KeyZ,
            KeyCode::Escape,
        ];
        let actions: HashSet<Action> = bound.iter().filter_map(|&code| action_for_key(code)).collect();
        assert_eq!(actions.len(), bound.len());
    }

    #[test]
    fn app_starts_with_centred_cursor_and_clock_origin() {
        let mut config = Config::default();
        config.window.width = 1000;
        config.window.height = 500;
        let app = App::new(config, ManualClock::new(2.0));
        assert_eq!(app.cursor, (500.0, 250.0));
        assert_eq!(app.frame.camera().last_cursor(), (500.0, 250.0));
        assert_eq!(app.frame.aspect(), 2.0);
        assert!(app.renderer.is_none());
    }
}
