use earth_demo::scene::SUN_ANGULAR_RATE;
use earth_demo::{
    Action, Clock, DepthMode, FrameState, InputEvent, ManualClock, Movement, Pass, UniformValue,
};

const FRAME: f32 = 1.0 / 60.0;

fn run_frames(frame: &mut FrameState, clock: &ManualClock, count: usize) -> Vec<earth_demo::FramePlan> {
    (0..count)
        .map(|_| {
            clock.advance(FRAME);
            frame.advance(clock.now())
        })
        .collect()
}

#[test]
fn idle_frames_only_move_the_sun() {
    let clock = ManualClock::new(0.0);
    let mut frame = FrameState::new(clock.now(), 800, 600);
    let first = run_frames(&mut frame, &clock, 1).remove(0);

    let position = frame.camera().position();
    let look = frame.camera().look_direction();
    let fov = frame.camera().fov();

    let mut angle = frame.sun().angle();
    let mut last_light = first.light_position;
    for plan in run_frames(&mut frame, &clock, 30) {
        assert_eq!(plan.view, first.view);
        assert_eq!(plan.projection, first.projection);
        assert_ne!(plan.light_position, last_light);
        last_light = plan.light_position;

        let elapsed = frame.camera().elapsed();
        let next = frame.sun().angle();
        assert!((next - angle - SUN_ANGULAR_RATE * elapsed).abs() < 1e-6);
        angle = next;
    }

    assert_eq!(frame.camera().position(), position);
    assert_eq!(frame.camera().look_direction(), look);
    assert_eq!(frame.camera().fov(), fov);
    assert_eq!(frame.frames(), 31);
}

#[test]
fn depth_mode_round_trips_every_frame() {
    let clock = ManualClock::new(0.0);
    let mut frame = FrameState::new(clock.now(), 800, 600);
    for plan in run_frames(&mut frame, &clock, 10) {
        let depths: Vec<DepthMode> = plan.draws.iter().map(|draw| draw.depth).collect();
        assert_eq!(
            depths,
            vec![
                DepthMode::Strict,
                DepthMode::Strict,
                DepthMode::Relaxed,
                DepthMode::Strict
            ]
        );
        assert_eq!(frame.depth_mode(), DepthMode::Strict);
    }
}

#[test]
fn scene_passes_share_camera_matrices() {
    let clock = ManualClock::new(0.0);
    let mut frame = FrameState::new(clock.now(), 1024, 768);
    let plan = run_frames(&mut frame, &clock, 1).remove(0);
    for draw in plan.draws.iter().filter(|d| matches!(d.pass, Pass::Earth | Pass::Sun)) {
        assert_eq!(draw.uniform("view"), Some(UniformValue::Mat4(plan.view)));
        assert_eq!(
            draw.uniform("projection"),
            Some(UniformValue::Mat4(plan.projection))
        );
    }
    let sky = &plan.draws[2];
    assert_eq!(
        sky.uniform("projection"),
        Some(UniformValue::Mat4(plan.projection))
    );
}

#[test]
fn mouse_scroll_and_keys_drive_the_camera() {
    let clock = ManualClock::new(0.0);
    let mut frame = FrameState::new(clock.now(), 800, 600);

    frame.handle_input(InputEvent::CursorMoved { x: 500.0, y: 300.0 });
    assert!((frame.camera().yaw() - (-90.0 + 100.0 * 0.05)).abs() < 1e-4);

    frame.handle_input(InputEvent::Scrolled { delta: 5.0 });
    assert_eq!(frame.camera().fov(), 40.0);

    frame.handle_input(InputEvent::Key {
        action: Action::Move(Movement::Backward),
        pressed: true,
    });
    let start = frame.camera().position();
    run_frames(&mut frame, &clock, 3);
    assert!(frame.camera().position().distance(start) > 0.0);

    frame.handle_input(InputEvent::Key {
        action: Action::Move(Movement::Backward),
        pressed: false,
    });
    let stopped = frame.camera().position();
    run_frames(&mut frame, &clock, 3);
    assert_eq!(frame.camera().position(), stopped);
}

#[test]
fn vertical_keys_leave_the_camera_in_place() {
    let clock = ManualClock::new(0.0);
    let mut frame = FrameState::new(clock.now(), 800, 600);
    for movement in [Movement::Up, Movement::Down] {
        frame.handle_input(InputEvent::Key {
            action: Action::Move(movement),
            pressed: true,
        });
    }
    let start = frame.camera().position();
    run_frames(&mut frame, &clock, 5);
    assert_eq!(frame.camera().position(), start);
}
