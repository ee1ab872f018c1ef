//! Inputbridge Core - host display events to guest window-system input
//!
//! This crate translates the event stream of a host display server (X11
//! semantics: serials, grabs, window manager properties) into the input and
//! window-management model of a guest window system, and turns guest
//! requests (cursor clipping, cursor warps, focus changes) back into host
//! requests.
//!
//! There is one [`Core`] per guest UI thread. Everything it needs from the
//! outside world is reached through [`host::Platform`]; [`sim::SimPlatform`]
//! implements it in memory for tests and trace replay.
//!
//! # Quick Start
//! ```
//! use inputbridge_core::config::Config;
//! use inputbridge_core::geometry::Rect;
//! use inputbridge_core::sim::SimPlatform;
//! use inputbridge_core::{ClipState, Core};
//!
//! let mut platform = SimPlatform::new(Rect::new(0, 0, 1920, 1080));
//! let mut core = Core::new(Config::default());
//!
//! // The application confines the pointer to part of the screen
//! core.clip_cursor(&mut platform, Some(Rect::new(0, 0, 800, 600)));
//! assert_eq!(core.clip_state(), ClipState::ClippingExplicit);
//!
//! // Drain whatever the host has queued
//! core.process_events(&mut platform, inputbridge_core::dispatch::QueueMask::ALLINPUT);
//! ```

pub mod clip;
pub mod coalesce;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod event;
pub mod fence;
pub mod focus;
pub mod geometry;
pub mod host;
pub mod invariants;
pub mod message;
pub mod pointer;
pub mod raw_motion;
pub mod registry;
pub mod sim;
pub mod thread;
pub mod window;
pub mod wm_state;

#[cfg(feature = "x11")]
pub mod x11;

// Re-export primary API types at crate root
pub use event::{EventKind, EventRecord, EventTag, HostWindow};
pub use host::Platform;
pub use message::{GuestInput, GuestMessage};
pub use thread::{ClipKind, ClipRegion, ClipState};
pub use window::Hwnd;

use std::sync::Arc;

use tracing::debug;

use config::Config;
use cursor::{CursorRealizer, CursorTracker, NullRealizer};
use raw_motion::RawInputStatus;
use registry::ClipOwnerRegistry;
use thread::ThreadInputState;
use wm_state::WindowStateCache;

/// Input translation engine for one guest UI thread.
///
/// Backends feed host events through
/// [`process_events`](Core::process_events) or
/// [`dispatch_event`](Core::dispatch_event) and forward guest requests to
/// the matching methods ([`clip_cursor`](Core::clip_cursor),
/// [`set_cursor_pos`](Core::set_cursor_pos), ...).
pub struct Core {
    config: Config,
    /// Per-thread input state
    input: ThreadInputState,
    /// Host-side state of the windows this thread owns
    windows: WindowStateCache,
    /// Clip ownership; only the desktop thread's core holds one
    registry: Option<ClipOwnerRegistry>,
    /// Shared by every core of the process
    cursor: Arc<CursorTracker>,
    realizer: Box<dyn CursorRealizer + Send>,
}

impl Core {
    /// Create a core for one guest thread.
    pub fn new(config: Config) -> Self {
        let mut input = ThreadInputState::new();
        input.raw_input_only = config.pointer.raw_input_only;
        Self {
            config,
            input,
            windows: WindowStateCache::new(),
            registry: None,
            cursor: Arc::new(CursorTracker::new()),
            realizer: Box::new(NullRealizer),
        }
    }

    /// Share the process-wide cursor tracker with other cores.
    #[must_use]
    pub fn with_cursor_tracker(mut self, tracker: Arc<CursorTracker>) -> Self {
        self.cursor = tracker;
        self
    }

    #[must_use]
    pub fn with_realizer(mut self, realizer: Box<dyn CursorRealizer + Send>) -> Self {
        debug!(realizer = realizer.name(), "cursor realizer installed");
        self.realizer = realizer;
        self
    }

    /// Make this the desktop thread's core, which arbitrates clip ownership
    /// for the whole process.
    #[must_use]
    pub fn with_clip_registry(mut self) -> Self {
        self.registry = Some(ClipOwnerRegistry::new());
        self
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn input_state(&self) -> &ThreadInputState {
        &self.input
    }

    pub fn clip_state(&self) -> ClipState {
        self.input.clip_state()
    }

    pub const fn clip_region(&self) -> Option<ClipRegion> {
        self.input.clip
    }

    pub fn cursor_tracker(&self) -> &Arc<CursorTracker> {
        &self.cursor
    }

    pub const fn raw_input_status(&self) -> RawInputStatus {
        self.input.raw.status()
    }

    /// Current clip owner as seen by the registry. Null when this is not
    /// the desktop core or nobody clips.
    pub fn registry_owner(&self) -> Hwnd {
        self.registry.as_ref().map_or(Hwnd::NULL, ClipOwnerRegistry::owner)
    }

    /// An application on this thread registered for raw input only; the
    /// coalescer may then drop host motion while raw events are pending.
    pub fn set_raw_input_only(&mut self, raw_only: bool) {
        self.input.raw_input_only = raw_only;
    }

    /// Check the thread state for consistency.
    pub fn validate(&self, p: &dyn Platform) -> Result<(), invariants::InvariantError> {
        invariants::validate_idle(&self.input, p)
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("clip", &self.input.clip)
            .field("raw", &self.input.raw.status())
            .field("windows", &self.windows.len())
            .field("registry", &self.registry)
            .field("realizer", &self.realizer.name())
            .finish_non_exhaustive()
    }
}
