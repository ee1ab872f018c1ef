//! Per-thread input state.

use serde::{Deserialize, Serialize};

use crate::event::{EventTag, HostWindow, Serial};
use crate::fence::SerialFence;
use crate::geometry::Rect;
use crate::raw_motion::RawMotionAccumulator;
use crate::window::Hwnd;

/// Why the pointer is clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    /// The application asked for a rectangle.
    Explicit,
    /// The foreground window covers the output.
    Fullscreen,
}

/// Observable state of the clip state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipState {
    Unclipped,
    ClippingExplicit,
    ClippingFullscreen,
}

impl std::fmt::Display for ClipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unclipped => "unclipped",
            Self::ClippingExplicit => "clipping (explicit)",
            Self::ClippingFullscreen => "clipping (fullscreen)",
        };
        f.write_str(name)
    }
}

/// An enforced clip: the guest rectangle and the capture window standing
/// for the grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRegion {
    pub rect: Rect,
    pub capture_window: Hwnd,
    pub kind: ClipKind,
}

/// The event currently being handled on this thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub tag: EventTag,
    pub serial: Serial,
}

/// Input state owned by one guest UI thread.
#[derive(Debug, Default)]
pub struct ThreadInputState {
    /// Re-entrancy guard for nested dispatch.
    pub current_event: Option<InFlight>,
    /// Motion older than this was generated before our last warp.
    pub warp_fence: SerialFence,
    pub raw: RawMotionAccumulator,
    /// Applications on this thread registered for raw input only.
    pub raw_input_only: bool,
    pub clip: Option<ClipRegion>,
    /// Host capture surface, once created.
    pub capture_surface: Option<HostWindow>,
    /// Guest window that last lost focus on this thread.
    pub last_focus: Hwnd,
    /// Tick of the last external clip reset.
    pub clip_reset_at: Option<u64>,
    /// Window that last received real keyboard focus.
    pub keymap_notify_window: Hwnd,
}

impl ThreadInputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clip_state(&self) -> ClipState {
        match self.clip.map(|c| c.kind) {
            None => ClipState::Unclipped,
            Some(ClipKind::Explicit) => ClipState::ClippingExplicit,
            Some(ClipKind::Fullscreen) => ClipState::ClippingFullscreen,
        }
    }

    pub fn is_clipping(&self) -> bool {
        self.clip.is_some()
    }

    /// Capture window of the active clip, null when unclipped.
    pub fn capture_window(&self) -> Hwnd {
        self.clip.map_or(Hwnd::NULL, |c| c.capture_window)
    }

    pub const fn in_handler(&self) -> bool {
        self.current_event.is_some()
    }

    /// Whether the debounce after an external reset has elapsed at `now`.
    pub fn reset_debounced(&self, now: u64, interval_ms: u64) -> bool {
        self.clip_reset_at
            .map_or(true, |at| now.saturating_sub(at) >= interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_state_follows_region() {
        let mut state = ThreadInputState::new();
        assert_eq!(state.clip_state(), ClipState::Unclipped);
        state.clip = Some(ClipRegion {
            rect: Rect::new(0, 0, 800, 600),
            capture_window: Hwnd(0x40),
            kind: ClipKind::Fullscreen,
        });
        assert_eq!(state.clip_state(), ClipState::ClippingFullscreen);
        assert_eq!(state.capture_window(), Hwnd(0x40));
    }

    #[test]
    fn test_reset_debounce() {
        let mut state = ThreadInputState::new();
        assert!(state.reset_debounced(5, 1000));
        state.clip_reset_at = Some(10_000);
        assert!(!state.reset_debounced(10_999, 1000));
        assert!(state.reset_debounced(11_000, 1000));
    }
}
