//! Invariant validation for the per-thread input state.
//!
//! Called after every `dispatch_event` in debug builds.

use crate::host::Platform;
use crate::thread::ThreadInputState;

/// Error indicating which invariant was violated.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    #[error("Clip rectangle {0} is empty")]
    EmptyClip(String),

    #[error("Clip rectangle {clip} extends beyond the virtual screen {screen}")]
    ClipOutsideScreen { clip: String, screen: String },

    #[error("Clipping without a capture window")]
    MissingCaptureWindow,

    #[error("Clipping without a capture surface")]
    MissingCaptureSurface,

    #[error("Clipping while raw motion is {0:?}")]
    RawInputNotEnabled(crate::raw_motion::RawInputStatus),

    #[error("Desktop thread holds a clip")]
    DesktopThreadClipping,

    #[error("Re-entrancy guard left set outside of dispatch")]
    StaleInFlight,
}

/// Validate the thread state against the current screen layout. Returns the
/// first violation found.
pub fn validate(state: &ThreadInputState, p: &dyn Platform) -> Result<(), InvariantError> {
    // 1. An active clip is non-empty and inside the virtual screen
    if let Some(region) = state.clip {
        if region.rect.is_empty() {
            return Err(InvariantError::EmptyClip(region.rect.to_string()));
        }
        let screen = p.virtual_screen_rect();
        if !region.rect.is_within(screen) {
            return Err(InvariantError::ClipOutsideScreen {
                clip: region.rect.to_string(),
                screen: screen.to_string(),
            });
        }

        // 2. It is backed by a capture window and the capture surface
        if region.capture_window.is_null() {
            return Err(InvariantError::MissingCaptureWindow);
        }
        if state.capture_surface.is_none() {
            return Err(InvariantError::MissingCaptureSurface);
        }

        // 3. Clipping is only entered with raw motion available
        if !state.raw.is_enabled() {
            return Err(InvariantError::RawInputNotEnabled(state.raw.status()));
        }

        // 4. The desktop thread never clips
        let desktop_thread = p.window_owner(p.desktop_window()).map(|owner| owner.thread);
        if desktop_thread == Some(p.current_thread()) {
            return Err(InvariantError::DesktopThreadClipping);
        }
    }

    Ok(())
}

/// Like [`validate`], for callers outside any handler: the re-entrancy
/// guard must be clear.
pub fn validate_idle(state: &ThreadInputState, p: &dyn Platform) -> Result<(), InvariantError> {
    if state.in_handler() {
        return Err(InvariantError::StaleInFlight);
    }
    validate(state, p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HostWindow;
    use crate::geometry::Rect;
    use crate::sim::{default_raw_session, SimPlatform, DESKTOP_THREAD};
    use crate::thread::{ClipKind, ClipRegion};
    use crate::window::Hwnd;

    fn clipping_state(rect: Rect) -> ThreadInputState {
        let mut state = ThreadInputState::new();
        state.raw.enable(default_raw_session());
        state.capture_surface = Some(HostWindow(0x0500_0001));
        state.clip = Some(ClipRegion {
            rect,
            capture_window: Hwnd(0x30000),
            kind: ClipKind::Explicit,
        });
        state
    }

    #[test]
    fn test_valid_clip() {
        let p = SimPlatform::new(Rect::new(0, 0, 1920, 1080));
        assert!(validate(&clipping_state(Rect::new(0, 0, 800, 600)), &p).is_ok());
        assert!(validate_idle(&ThreadInputState::new(), &p).is_ok());
    }

    #[test]
    fn test_clip_outside_screen() {
        let p = SimPlatform::new(Rect::new(0, 0, 1920, 1080));
        let result = validate(&clipping_state(Rect::new(0, 0, 2000, 600)), &p);
        assert!(matches!(result, Err(InvariantError::ClipOutsideScreen { .. })));
    }

    #[test]
    fn test_desktop_thread_clipping() {
        let mut p = SimPlatform::new(Rect::new(0, 0, 1920, 1080));
        p.set_current_thread(DESKTOP_THREAD);
        let result = validate(&clipping_state(Rect::new(0, 0, 800, 600)), &p);
        assert!(matches!(result, Err(InvariantError::DesktopThreadClipping)));
    }

    #[test]
    fn test_clip_without_raw_input() {
        let p = SimPlatform::new(Rect::new(0, 0, 1920, 1080));
        let mut state = clipping_state(Rect::new(0, 0, 800, 600));
        state.raw.disable();
        assert!(matches!(validate(&state, &p), Err(InvariantError::RawInputNotEnabled(_))));
    }
}
