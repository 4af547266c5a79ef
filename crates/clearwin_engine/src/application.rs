//! Application driver
//!
//! Runs the four phases in order: start the video subsystem, create the
//! window, create the renderer, then poll/clear/present until the user closes
//! the window. Teardown is entirely structural: acquired resources are owned
//! by locals or by [`Session`] fields, and Rust's drop order releases them in
//! reverse acquisition order on every exit path.

use crate::config::AppConfig;
use crate::platform::{BackendError, Platform, PlatformWindow, VideoSubsystem};
use crate::render::{Color, Renderer};
use thiserror::Error;

/// Process exit status for any initialization failure
const FAILURE_EXIT_CODE: u8 = 1;

/// Fatal initialization errors
///
/// The `Display` output is the diagnostic written to stderr: a fixed prefix
/// naming the failing phase followed by the library's own message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The video subsystem could not start
    #[error("Video init error: {0}")]
    Init(BackendError),

    /// The window could not be created
    #[error("Window creation error: {0}")]
    WindowCreation(BackendError),

    /// The renderer could not be created
    #[error("Renderer creation error: {0}")]
    RendererCreation(BackendError),
}

impl AppError {
    /// Exit status the process should terminate with
    pub const fn exit_code(&self) -> u8 {
        FAILURE_EXIT_CODE
    }
}

/// State of the event/render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Frames keep coming
    Running,
    /// A quit event was seen; the current frame is the last one
    Terminating,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Frames cleared and presented
    pub frames: u64,
}

/// Fully initialized resources
///
/// Fields drop in declaration order, so the renderer is always released
/// before the window and the window before the video subsystem.
struct Session<V: VideoSubsystem> {
    renderer: <V::Window as PlatformWindow>::Renderer,
    window: V::Window,
    video: V,
}

impl<V: VideoSubsystem> Session<V> {
    /// Drain the event queue, returning the state for the rest of the frame
    fn pump(&mut self, mut state: LoopState) -> LoopState {
        while let Some(event) = self.video.poll_event(&self.window) {
            if event.is_quit() && state == LoopState::Running {
                log::info!("Quit requested");
                state = LoopState::Terminating;
            }
        }
        state
    }

    fn draw(&mut self, color: Color) {
        self.renderer.set_draw_color(color);
        self.renderer.clear();
        self.renderer.present();
    }
}

/// Run the application on `platform` until the window is closed
///
/// Never sleeps or yields between frames.
pub fn run<P: Platform>(platform: &mut P, config: &AppConfig) -> Result<RunReport, AppError> {
    log::info!("Initializing video subsystem...");
    let mut video = platform.init_video().map_err(|e| {
        log::error!("Video subsystem failed to start: {}", e);
        AppError::Init(e)
    })?;

    log::info!(
        "Creating {}x{} window \"{}\"...",
        config.window.width,
        config.window.height,
        config.window.title
    );
    let mut window = video.create_window(&config.window).map_err(|e| {
        log::error!("Window creation failed: {}", e);
        AppError::WindowCreation(e)
    })?;

    log::info!("Creating renderer...");
    let renderer = window.create_renderer(&config.renderer).map_err(|e| {
        log::error!("Renderer creation failed: {}", e);
        AppError::RendererCreation(e)
    })?;

    let mut session = Session {
        renderer,
        window,
        video,
    };

    log::info!("Starting main loop...");
    let clear_color = config.renderer.clear_color;
    let mut state = LoopState::Running;
    let mut frames = 0u64;

    while state == LoopState::Running {
        state = session.pump(state);
        session.draw(clear_color);
        frames += 1;
    }

    log::info!("Main loop exited after {} frames, shutting down", frames);
    drop(session);
    log::info!("Shutdown complete");

    Ok(RunReport { frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{Call, FailAt, MockPlatform};
    use crate::platform::Event;

    fn releases(calls: &[Call]) -> Vec<Call> {
        calls.iter().copied().filter(|c| c.is_release()).collect()
    }

    #[test]
    fn quit_on_first_frame_presents_once_and_releases_in_order() {
        let mut platform = MockPlatform::new().with_frames([vec![Event::Quit]]);
        let report = run(&mut platform, &AppConfig::default()).unwrap();

        assert_eq!(report.frames, 1);
        assert_eq!(
            platform.journal().calls(),
            vec![
                Call::InitVideo,
                Call::CreateWindow,
                Call::CreateRenderer,
                Call::SetDrawColor(Color::BLUE),
                Call::Clear,
                Call::Present,
                Call::ReleaseRenderer,
                Call::ReleaseWindow,
                Call::ReleaseVideo,
            ]
        );
    }

    #[test]
    fn unscripted_platform_quits_after_one_frame() {
        let mut platform = MockPlatform::new();
        let report = run(&mut platform, &AppConfig::default()).unwrap();

        assert_eq!(report.frames, 1);
        assert_eq!(platform.journal().live_resources(), 0);
    }

    #[test]
    fn frames_without_quit_keep_the_loop_running() {
        let mut platform = MockPlatform::new().with_frames([
            vec![],
            vec![Event::Other, Event::Other],
            vec![],
            vec![Event::Quit],
        ]);
        let report = run(&mut platform, &AppConfig::default()).unwrap();

        assert_eq!(report.frames, 4);
        let presents = platform
            .journal()
            .calls()
            .into_iter()
            .filter(|c| *c == Call::Present)
            .count();
        assert_eq!(presents, 4);
    }

    #[test]
    fn events_after_quit_are_drained_in_the_same_frame() {
        let mut platform = MockPlatform::new()
            .with_frames([vec![Event::Other, Event::Quit, Event::Other, Event::Quit], vec![]]);
        let report = run(&mut platform, &AppConfig::default()).unwrap();

        assert_eq!(report.frames, 1);
        assert_eq!(platform.events_left(), 0);
    }

    #[test]
    fn every_frame_clears_with_configured_color_before_presenting() {
        let mut config = AppConfig::default();
        config.renderer.clear_color = Color::rgb(10, 20, 30);
        let mut platform = MockPlatform::new().with_frames([vec![], vec![Event::Quit]]);
        run(&mut platform, &config).unwrap();

        let draws: Vec<Call> = platform
            .journal()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SetDrawColor(_) | Call::Clear | Call::Present))
            .collect();
        let frame = [Call::SetDrawColor(Color::rgb(10, 20, 30)), Call::Clear, Call::Present];
        assert_eq!(draws, [frame, frame].concat());
    }

    #[test]
    fn init_failure_skips_window_and_renderer() {
        let mut platform = MockPlatform::new().failing_at(FailAt::InitVideo);
        let err = run(&mut platform, &AppConfig::default()).unwrap_err();

        assert!(matches!(err, AppError::Init(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("Video init error: "));
        assert_eq!(platform.journal().calls(), vec![Call::Refused(FailAt::InitVideo)]);
        assert_eq!(platform.journal().live_resources(), 0);
    }

    #[test]
    fn window_failure_releases_video_exactly_once() {
        let mut platform = MockPlatform::new().failing_at(FailAt::CreateWindow);
        let err = run(&mut platform, &AppConfig::default()).unwrap_err();

        assert!(matches!(err, AppError::WindowCreation(_)));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            platform.journal().calls(),
            vec![
                Call::InitVideo,
                Call::Refused(FailAt::CreateWindow),
                Call::ReleaseVideo
            ]
        );
        assert_eq!(platform.journal().live_resources(), 0);
    }

    #[test]
    fn renderer_failure_releases_window_then_video() {
        let mut platform = MockPlatform::new().failing_at(FailAt::CreateRenderer);
        let err = run(&mut platform, &AppConfig::default()).unwrap_err();

        assert!(matches!(err, AppError::RendererCreation(_)));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            releases(&platform.journal().calls()),
            vec![Call::ReleaseWindow, Call::ReleaseVideo]
        );
        assert!(!platform.journal().calls().contains(&Call::Clear));
        assert!(platform.journal().calls().contains(&Call::Refused(FailAt::CreateRenderer)));
        assert_eq!(platform.journal().live_resources(), 0);
    }

    #[test]
    fn diagnostic_carries_library_message() {
        let mut platform = MockPlatform::new().failing_at(FailAt::CreateRenderer);
        let err = run(&mut platform, &AppConfig::default()).unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("Renderer creation error: {}", MockPlatform::FAILURE_MESSAGE)
        );
    }

    #[test]
    fn repeated_runs_leave_nothing_alive() {
        let mut platform = MockPlatform::new();
        for _ in 0..5 {
            platform.script_frames([vec![Event::Quit]]);
            run(&mut platform, &AppConfig::default()).unwrap();
            assert_eq!(platform.journal().live_resources(), 0);
        }
        assert_eq!(releases(&platform.journal().calls()).len(), 15);
    }
}
