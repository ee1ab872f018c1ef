//! Collaborator traits implemented by the embedding environment.
//!
//! The core is driven through a `&mut dyn Platform`, which bundles the host
//! display connection, the guest window data store, the guest window shell
//! and guest message delivery. [`crate::sim::SimPlatform`] implements all of
//! them in memory.

use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::cursor::NativeCursor;
use crate::event::{EventRecord, HostWindow, Serial, Timestamp};
use crate::geometry::{CoordinateMap, Point, Rect};
use crate::message::{DeliveryError, GuestInput, GuestMessage, MessageReply};
use crate::raw_motion::RawInputSession;
use crate::window::{Hwnd, ThreadId, WindowExStyle, WindowInfo, WindowStyle};
use crate::wm_state::{NetWmState, WmState};

/// Opaque waitable object handed to [`HostDisplay::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitHandle(pub u64);

/// Result of a blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    /// The handle at this index was signaled.
    Signaled(usize),
    /// The host connection (or the guest queue) has input.
    InputReady,
    Timeout,
}

/// Host display connection.
pub trait HostDisplay {
    /// Serial the next outgoing request will carry.
    fn next_request_serial(&self) -> Serial;

    /// Remove and return the first queued event accepted by `filter`.
    fn next_event(&mut self, filter: &mut dyn FnMut(&EventRecord) -> bool) -> Option<EventRecord>;

    /// Block until a handle is signaled, host input arrives or the timeout
    /// elapses (`None` = forever).
    fn wait(&mut self, handles: &[WaitHandle], timeout: Option<Duration>) -> WaitStatus;

    fn flush(&mut self);

    fn root_window(&self) -> HostWindow;

    fn coordinate_map(&self) -> CoordinateMap;

    /// Translate a window-relative point into root coordinates.
    fn translate_to_root(&mut self, window: HostWindow, x: i32, y: i32) -> Point;

    /// Invisible input-only window used to hold clip grabs. Created lazily,
    /// `None` if the host refuses.
    fn capture_surface(&mut self) -> Option<HostWindow>;

    /// Move/resize a window, rectangle in root coordinates.
    fn move_resize_window(&mut self, window: HostWindow, rect: Rect);

    fn map_window(&mut self, window: HostWindow);

    fn unmap_window(&mut self, window: HostWindow);

    fn raise_window(&mut self, window: HostWindow);

    /// Exclusive pointer grab confined to `window`.
    fn grab_pointer(&mut self, window: HostWindow) -> bool;

    /// Grab the root window and release it immediately. Tells whether
    /// another client holds a conflicting grab.
    fn probe_root_grab(&mut self) -> bool;

    fn ungrab_pointer(&mut self);

    /// Warp the pointer, root coordinates.
    fn warp_pointer(&mut self, to: Point);

    /// Pointer position in root coordinates.
    fn query_pointer(&mut self) -> Option<Point>;

    fn define_cursor(&mut self, window: HostWindow, cursor: Option<NativeCursor>);

    /// Select raw motion and device-change events on the root window.
    /// `None` when the host has no raw input support.
    fn enable_raw_motion(&mut self) -> Option<RawInputSession>;

    fn disable_raw_motion(&mut self);

    fn set_input_focus(&mut self, window: HostWindow, time: Timestamp);

    /// Ask an XEmbed embedder for focus.
    fn request_embedder_focus(&mut self, window: HostWindow, time: Timestamp);

    fn input_focus(&mut self) -> Option<HostWindow>;

    /// Put `event` back on the host queue for a later retry.
    fn resend_event(&mut self, event: &EventRecord);

    /// Current ICCCM `WM_STATE`, `None` if unset or malformed.
    fn read_wm_state(&mut self, window: HostWindow) -> Option<WmState>;

    fn read_net_wm_state(&mut self, window: HostWindow) -> NetWmState;

    /// Ask the window manager to change `_NET_WM_STATE`.
    fn send_net_wm_state(&mut self, window: HostWindow, state: NetWmState);

    /// Echo a `_NET_WM_PING` back to the root window.
    fn reply_ping(&mut self, data: [u32; 5]);
}

/// Guest window data store.
pub trait WindowStore {
    fn lookup_window(&self, host: HostWindow) -> Option<Hwnd>;

    fn window_info(&self, hwnd: Hwnd) -> Option<WindowInfo>;

    fn window_geometry(&self, hwnd: Hwnd) -> Option<Rect> {
        self.window_info(hwnd).map(|info| info.window_rect)
    }

    fn window_style(&self, hwnd: Hwnd) -> WindowStyle {
        self.window_info(hwnd).map(|info| info.style).unwrap_or_default()
    }

    fn window_ex_style(&self, hwnd: Hwnd) -> WindowExStyle {
        self.window_info(hwnd).map(|info| info.ex_style).unwrap_or_default()
    }

    fn host_window(&self, hwnd: Hwnd) -> Option<HostWindow> {
        self.window_info(hwnd).and_then(|info| info.host_window)
    }
}

bitflags! {
    /// Window positioning flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PosFlags: u32 {
        const NOSIZE     = 0x0001;
        const NOMOVE     = 0x0002;
        const NOZORDER   = 0x0004;
        const NOACTIVATE = 0x0010;
        const SHOWWINDOW = 0x0040;
        const NOCOPYBITS = 0x0100;
    }
}

/// Thread and process that own a guest window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOwner {
    pub thread: ThreadId,
    pub in_process: bool,
}

/// Guest window system services.
pub trait GuestShell {
    fn desktop_window(&self) -> Hwnd;

    fn foreground_window(&self) -> Hwnd;

    fn set_foreground_window(&mut self, hwnd: Hwnd) -> bool;

    /// Window with keyboard focus on this thread.
    fn focus_window(&self) -> Hwnd;

    fn active_window(&self) -> Hwnd;

    fn set_active_window(&mut self, hwnd: Hwnd);

    /// Top-level ancestor.
    fn ancestor_root(&self, hwnd: Hwnd) -> Hwnd;

    fn parent(&self, hwnd: Hwnd) -> Hwnd;

    fn is_child(&self, parent: Hwnd, child: Hwnd) -> bool;

    fn current_thread(&self) -> ThreadId;

    fn window_owner(&self, hwnd: Hwnd) -> Option<WindowOwner>;

    fn virtual_screen_rect(&self) -> Rect;

    fn primary_monitor_rect(&self) -> Rect;

    /// Guest-visible cursor clip rectangle.
    fn guest_clip_rect(&self) -> Rect;

    /// Reset the guest-visible clip rectangle to the full desktop without
    /// calling back into the core.
    fn reset_guest_clip(&mut self);

    fn tick_count(&self) -> u64;

    /// An input method composition is in progress.
    fn in_composition(&self) -> bool;

    /// Create the message-only window that stands for a clip grab.
    fn create_capture_window(&mut self) -> Option<Hwnd>;

    fn destroy_window(&mut self, hwnd: Hwnd);

    fn set_window_pos(&mut self, hwnd: Hwnd, rect: Rect, flags: PosFlags);

    /// Re-parent `hwnd` under the guest window for `host_parent` (the
    /// desktop for the root). Returns the previous guest parent.
    fn reparent_window(&mut self, hwnd: Hwnd, host_parent: HostWindow, at: Point) -> Option<Hwnd>;
}

/// Guest message delivery.
pub trait MessageSink {
    fn post_message(&mut self, hwnd: Hwnd, message: GuestMessage) -> Result<(), DeliveryError>;

    /// Deliver and wait for the reply.
    fn send_message(&mut self, hwnd: Hwnd, message: GuestMessage)
        -> Result<MessageReply, DeliveryError>;

    /// Deliver and wait at most `timeout`; a timeout is reported as
    /// [`DeliveryError::Timeout`].
    fn send_message_timeout(
        &mut self,
        hwnd: Hwnd,
        message: GuestMessage,
        timeout: Duration,
    ) -> Result<MessageReply, DeliveryError>;

    /// Queue synthesized input on behalf of `hwnd` (null for raw input).
    fn send_input(&mut self, hwnd: Hwnd, input: GuestInput);
}

/// Everything the core needs from its environment.
pub trait Platform: HostDisplay + WindowStore + GuestShell + MessageSink {}

impl<T: HostDisplay + WindowStore + GuestShell + MessageSink> Platform for T {}
