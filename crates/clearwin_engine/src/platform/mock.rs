//! Scripted in-memory platform for tests
//!
//! Every acquisition, draw call and release is appended to a shared
//! [`Journal`], so tests can assert on ordering without a display.

use super::{BackendError, Event, Platform, PlatformWindow, VideoSubsystem};
use crate::config::{RendererConfig, WindowConfig};
use crate::render::{Color, Renderer};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One observable backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    InitVideo,
    CreateWindow,
    CreateRenderer,
    SetDrawColor(Color),
    Clear,
    Present,
    ReleaseRenderer,
    ReleaseWindow,
    ReleaseVideo,
    /// An acquisition that was refused; nothing was created
    Refused(FailAt),
}

impl Call {
    pub const fn is_release(self) -> bool {
        matches!(self, Self::ReleaseRenderer | Self::ReleaseWindow | Self::ReleaseVideo)
    }
}

/// Which acquisition should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    InitVideo,
    CreateWindow,
    CreateRenderer,
}

/// Shared, append-only call log
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    /// Resources acquired but not yet released
    pub fn live_resources(&self) -> usize {
        let calls = self.0.borrow();
        let count = |wanted: Call| calls.iter().filter(|c| **c == wanted).count();
        let acquired = count(Call::InitVideo) + count(Call::CreateWindow) + count(Call::CreateRenderer);
        let released = calls.iter().filter(|c| c.is_release()).count();
        acquired - released
    }
}

type Script = Rc<RefCell<VecDeque<VecDeque<Event>>>>;

/// Platform whose events come from a per-frame script
///
/// Each scripted frame is drained by successive `poll_event` calls, and the
/// `None` that ends it moves the script on to the next frame. Once the script
/// runs dry every frame reports a single [`Event::Quit`], so an unscripted
/// run stops after one frame.
#[derive(Debug, Default)]
pub struct MockPlatform {
    journal: Journal,
    fail_at: Option<FailAt>,
    script: Script,
}

impl MockPlatform {
    pub const FAILURE_MESSAGE: &'static str = "mock backend refused";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = Some(fail_at);
        self
    }

    pub fn with_frames<I: IntoIterator<Item = Vec<Event>>>(self, frames: I) -> Self {
        self.script_frames(frames);
        self
    }

    pub fn script_frames<I: IntoIterator<Item = Vec<Event>>>(&self, frames: I) {
        self.script
            .borrow_mut()
            .extend(frames.into_iter().map(VecDeque::from));
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Scripted events not yet polled
    pub fn events_left(&self) -> usize {
        self.script.borrow().iter().map(VecDeque::len).sum()
    }

    fn outcome(&self, step: FailAt) -> Result<(), BackendError> {
        if self.fail_at == Some(step) {
            Err(BackendError::new(Self::FAILURE_MESSAGE))
        } else {
            Ok(())
        }
    }
}

impl Platform for MockPlatform {
    type Video = MockVideo;

    fn init_video(&mut self) -> Result<MockVideo, BackendError> {
        if let Err(e) = self.outcome(FailAt::InitVideo) {
            self.journal.record(Call::Refused(FailAt::InitVideo));
            return Err(e);
        }
        self.journal.record(Call::InitVideo);
        Ok(MockVideo {
            journal: self.journal.clone(),
            fail_renderer: self.fail_at == Some(FailAt::CreateRenderer),
            fail_window: self.fail_at == Some(FailAt::CreateWindow),
            script: Rc::clone(&self.script),
            dry_quit_sent: false,
        })
    }
}

pub struct MockVideo {
    journal: Journal,
    fail_window: bool,
    fail_renderer: bool,
    script: Script,
    dry_quit_sent: bool,
}

impl VideoSubsystem for MockVideo {
    type Window = MockWindow;

    fn create_window(&mut self, _config: &WindowConfig) -> Result<MockWindow, BackendError> {
        if self.fail_window {
            self.journal.record(Call::Refused(FailAt::CreateWindow));
            return Err(BackendError::new(MockPlatform::FAILURE_MESSAGE));
        }
        self.journal.record(Call::CreateWindow);
        Ok(MockWindow {
            journal: self.journal.clone(),
            fail_renderer: self.fail_renderer,
        })
    }

    fn poll_event(&mut self, _window: &MockWindow) -> Option<Event> {
        let mut script = self.script.borrow_mut();
        let Some(frame) = script.front_mut() else {
            // Quit, then end the frame
            self.dry_quit_sent = !self.dry_quit_sent;
            return self.dry_quit_sent.then_some(Event::Quit);
        };
        let event = frame.pop_front();
        if event.is_none() {
            script.pop_front();
        }
        event
    }
}

impl Drop for MockVideo {
    fn drop(&mut self) {
        self.journal.record(Call::ReleaseVideo);
    }
}

pub struct MockWindow {
    journal: Journal,
    fail_renderer: bool,
}

impl PlatformWindow for MockWindow {
    type Renderer = MockRenderer;

    fn create_renderer(&mut self, _config: &RendererConfig) -> Result<MockRenderer, BackendError> {
        if self.fail_renderer {
            self.journal.record(Call::Refused(FailAt::CreateRenderer));
            return Err(BackendError::new(MockPlatform::FAILURE_MESSAGE));
        }
        self.journal.record(Call::CreateRenderer);
        Ok(MockRenderer {
            journal: self.journal.clone(),
        })
    }
}

impl Drop for MockWindow {
    fn drop(&mut self) {
        self.journal.record(Call::ReleaseWindow);
    }
}

pub struct MockRenderer {
    journal: Journal,
}

impl Renderer for MockRenderer {
    fn set_draw_color(&mut self, color: Color) {
        self.journal.record(Call::SetDrawColor(color));
    }

    fn clear(&mut self) {
        self.journal.record(Call::Clear);
    }

    fn present(&mut self) {
        self.journal.record(Call::Present);
    }
}

impl Drop for MockRenderer {
    fn drop(&mut self) {
        self.journal.record(Call::ReleaseRenderer);
    }
}
