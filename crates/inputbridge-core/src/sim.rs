//! In-memory platform.
//!
//! [`SimPlatform`] implements every collaborator trait with plain data: a
//! queue of host events, a table of guest windows and logs of everything
//! the core asked for. Tests drive it directly; the replay binary feeds it
//! from a trace file.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cursor::{CursorHandle, CursorRealizer, NativeCursor};
use crate::event::{AxisLabel, DeviceId, EventKind, EventRecord, HostWindow, Serial, Timestamp, ValuatorInfo, ValuatorMode};
use crate::geometry::{CoordinateMap, Point, Rect};
use crate::host::{GuestShell, HostDisplay, MessageSink, PosFlags, WaitHandle, WaitStatus, WindowOwner, WindowStore};
use crate::message::{DeliveryError, GuestInput, GuestMessage, MessageReply};
use crate::raw_motion::{DeviceInfo, DeviceUse, RawInputSession};
use crate::window::{Hwnd, ThreadId, WindowInfo, WindowStyle};
use crate::wm_state::{NetWmState, WmState};

/// Root window of the simulated host.
pub const ROOT_WINDOW: HostWindow = HostWindow(0x1);
/// Guest desktop window.
pub const DESKTOP: Hwnd = Hwnd(0x10020);
/// Thread owning the desktop window.
pub const DESKTOP_THREAD: ThreadId = ThreadId(0);
/// Thread the simulation runs as unless told otherwise.
pub const MAIN_THREAD: ThreadId = ThreadId(1);

/// Core pointer and its physical mouse in the default raw input session.
pub const CORE_POINTER: DeviceId = DeviceId(2);
pub const MOUSE_DEVICE: DeviceId = DeviceId(9);

/// A host request the core issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum HostRequest {
    MoveResize { window: HostWindow, rect: Rect },
    Map { window: HostWindow },
    Unmap { window: HostWindow },
    Raise { window: HostWindow },
    GrabPointer { window: HostWindow },
    ProbeRootGrab,
    UngrabPointer,
    WarpPointer { to: Point },
    DefineCursor { window: HostWindow, cursor: Option<NativeCursor> },
    EnableRawMotion,
    DisableRawMotion,
    SetInputFocus { window: HostWindow, time: Timestamp },
    EmbedderFocus { window: HostWindow, time: Timestamp },
    NetWmState { window: HostWindow, state: NetWmState },
    Ping { data: [u32; 5] },
}

/// A guest message the core posted (`sync` false) or sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivered {
    pub hwnd: Hwnd,
    pub message: GuestMessage,
    pub sync: bool,
}

/// Host-side properties of a simulated window.
#[derive(Debug, Clone, Default)]
struct SimWindow {
    info: WindowInfo,
    wm_state: Option<WmState>,
    net_wm_state: NetWmState,
}

/// In-memory host display, guest window system and message queue.
#[derive(Debug)]
pub struct SimPlatform {
    events: VecDeque<EventRecord>,
    serial: u64,
    map: CoordinateMap,
    virtual_screen: Rect,
    primary_monitor: Rect,
    windows: IndexMap<Hwnd, SimWindow>,
    next_hwnd: u64,
    next_host: u32,
    foreground: Hwnd,
    focus: Hwnd,
    active: Hwnd,
    current_thread: ThreadId,
    guest_clip: Rect,
    tick: u64,
    composing: bool,
    pointer: Point,
    input_focus: Option<HostWindow>,
    capture_surface: Option<HostWindow>,
    replies: HashMap<(Hwnd, GuestMessage), MessageReply>,
    unresponsive: HashSet<Hwnd>,
    signaled: Option<usize>,

    /// Host pointer grabs succeed.
    pub grab_succeeds: bool,
    /// No other client holds a conflicting grab.
    pub probe_succeeds: bool,
    /// The host can create a capture surface.
    pub capture_supported: bool,
    /// Session handed out when raw motion is enabled; `None` = unsupported.
    pub raw_session: Option<RawInputSession>,

    /// Host requests, in order.
    pub requests: Vec<HostRequest>,
    /// Guest messages, in order.
    pub messages: Vec<Delivered>,
    /// Synthesized guest input, with the target window.
    pub inputs: Vec<(Hwnd, GuestInput)>,
    /// Guest window moves/resizes.
    pub positions: Vec<(Hwnd, Rect, PosFlags)>,
    /// Events put back for a later retry.
    pub resent: Vec<EventRecord>,
    pub destroyed: Vec<Hwnd>,
    pub flushes: usize,
}

/// Raw session with one relative mouse attached to the core pointer.
pub fn default_raw_session() -> RawInputSession {
    let relative = |number, label| ValuatorInfo {
        number,
        label,
        min: -1.0,
        max: -1.0,
        mode: ValuatorMode::Relative,
    };
    RawInputSession {
        core_pointer: CORE_POINTER,
        devices: vec![
            DeviceInfo {
                id: CORE_POINTER,
                device_use: DeviceUse::MasterPointer,
                attachment: DeviceId(3),
                valuators: vec![relative(0, AxisLabel::RelX), relative(1, AxisLabel::RelY)],
            },
            DeviceInfo {
                id: MOUSE_DEVICE,
                device_use: DeviceUse::SlavePointer,
                attachment: CORE_POINTER,
                valuators: vec![relative(0, AxisLabel::RelX), relative(1, AxisLabel::RelY)],
            },
        ],
    }
}

impl SimPlatform {
    /// A single-output host whose virtual screen is `screen`.
    pub fn new(screen: Rect) -> Self {
        let mut desktop = WindowInfo::new(DESKTOP, WindowStyle::VISIBLE | WindowStyle::CLIPCHILDREN, screen);
        desktop.thread = DESKTOP_THREAD;
        desktop.mapped = true;
        let mut windows = IndexMap::new();
        windows.insert(
            DESKTOP,
            SimWindow {
                info: desktop,
                ..SimWindow::default()
            },
        );

        Self {
            events: VecDeque::new(),
            serial: 0,
            map: CoordinateMap {
                virtual_origin: screen.top_left(),
                scale: None,
            },
            virtual_screen: screen,
            primary_monitor: screen,
            windows,
            next_hwnd: 0x20000,
            next_host: 0x0400_0001,
            foreground: Hwnd::NULL,
            focus: Hwnd::NULL,
            active: Hwnd::NULL,
            current_thread: MAIN_THREAD,
            guest_clip: screen,
            tick: 10_000,
            composing: false,
            pointer: Point::default(),
            input_focus: None,
            capture_surface: None,
            replies: HashMap::new(),
            unresponsive: HashSet::new(),
            signaled: None,
            grab_succeeds: true,
            probe_succeeds: true,
            capture_supported: true,
            raw_session: Some(default_raw_session()),
            requests: Vec::new(),
            messages: Vec::new(),
            inputs: Vec::new(),
            positions: Vec::new(),
            resent: Vec::new(),
            destroyed: Vec::new(),
            flushes: 0,
        }
    }

    // ── Setup ────────────────────────────────────────────────────────

    /// Add a managed, mapped top-level window with its own host window,
    /// owned by the current thread.
    pub fn create_window(&mut self, style: WindowStyle, rect: Rect) -> (Hwnd, HostWindow) {
        let hwnd = self.alloc_hwnd();
        let host = self.alloc_host();
        let mut info = WindowInfo::new(hwnd, style, rect);
        info.host_window = Some(host);
        info.managed = true;
        info.mapped = true;
        info.thread = self.current_thread;
        self.windows.insert(
            hwnd,
            SimWindow {
                info,
                wm_state: Some(WmState::Normal),
                net_wm_state: NetWmState::empty(),
            },
        );
        (hwnd, host)
    }

    /// Add a window described by `info` as is.
    pub fn add_window(&mut self, info: WindowInfo) {
        let hwnd = info.hwnd;
        self.next_hwnd = self.next_hwnd.max(hwnd.0 + 1);
        self.windows.insert(
            hwnd,
            SimWindow {
                info,
                ..SimWindow::default()
            },
        );
    }

    pub fn window_mut(&mut self, hwnd: Hwnd) -> Option<&mut WindowInfo> {
        self.windows.get_mut(&hwnd).map(|w| &mut w.info)
    }

    pub fn set_style(&mut self, hwnd: Hwnd, style: WindowStyle) {
        if let Some(info) = self.window_mut(hwnd) {
            info.style = style;
        }
    }

    /// What the window manager reports in `WM_STATE`.
    pub fn set_wm_state(&mut self, hwnd: Hwnd, state: Option<WmState>) {
        if let Some(w) = self.windows.get_mut(&hwnd) {
            w.wm_state = state;
        }
    }

    /// What the window manager reports in `_NET_WM_STATE`.
    pub fn set_net_wm_state(&mut self, hwnd: Hwnd, state: NetWmState) {
        if let Some(w) = self.windows.get_mut(&hwnd) {
            w.net_wm_state = state;
        }
    }

    pub fn set_foreground(&mut self, hwnd: Hwnd) {
        self.foreground = hwnd;
        self.active = hwnd;
    }

    pub fn set_focus(&mut self, hwnd: Hwnd) {
        self.focus = hwnd;
    }

    pub fn set_current_thread(&mut self, thread: ThreadId) {
        self.current_thread = thread;
    }

    pub fn set_primary_monitor(&mut self, rect: Rect) {
        self.primary_monitor = rect;
    }

    pub fn set_coordinate_map(&mut self, map: CoordinateMap) {
        self.map = map;
    }

    pub fn set_guest_clip(&mut self, rect: Rect) {
        self.guest_clip = rect;
    }

    pub fn set_composing(&mut self, composing: bool) {
        self.composing = composing;
    }

    pub fn set_host_input_focus(&mut self, window: Option<HostWindow>) {
        self.input_focus = window;
    }

    pub fn set_pointer(&mut self, root: Point) {
        self.pointer = root;
    }

    pub fn advance(&mut self, ms: u64) {
        self.tick = self.tick.saturating_add(ms);
    }

    /// Answer `message` sent to `hwnd` with `reply`.
    pub fn reply(&mut self, hwnd: Hwnd, message: GuestMessage, reply: MessageReply) {
        self.replies.insert((hwnd, message), reply);
    }

    /// Synchronous messages to `hwnd` time out.
    pub fn set_unresponsive(&mut self, hwnd: Hwnd) {
        self.unresponsive.insert(hwnd);
    }

    /// Make the next wait report handle `index` as signaled.
    pub fn signal(&mut self, index: usize) {
        self.signaled = Some(index);
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Queue an event stamped with the serial of the last request.
    pub fn push_event(&mut self, window: HostWindow, kind: EventKind) -> Serial {
        let serial = Serial(self.serial);
        self.events.push_back(EventRecord::new(serial, window, kind));
        serial
    }

    /// Queue a fully specified event.
    pub fn push_record(&mut self, event: EventRecord) {
        self.events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn last_serial(&self) -> Serial {
        Serial(self.serial)
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn capture_surface_window(&self) -> Option<HostWindow> {
        self.capture_surface
    }

    pub fn guest_clip(&self) -> Rect {
        self.guest_clip
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    /// Messages delivered since the last call.
    pub fn take_messages(&mut self) -> Vec<Delivered> {
        std::mem::take(&mut self.messages)
    }

    pub fn take_inputs(&mut self) -> Vec<(Hwnd, GuestInput)> {
        std::mem::take(&mut self.inputs)
    }

    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Messages delivered to `hwnd`.
    pub fn messages_to(&self, hwnd: Hwnd) -> Vec<GuestMessage> {
        self.messages
            .iter()
            .filter(|d| d.hwnd == hwnd)
            .map(|d| d.message)
            .collect()
    }

    pub fn count_requests(&self, pred: impl Fn(&HostRequest) -> bool) -> usize {
        self.requests.iter().filter(|r| pred(r)).count()
    }

    /// Thread owning `hwnd`.
    pub fn thread_of(&self, hwnd: Hwnd) -> Option<ThreadId> {
        self.windows.get(&hwnd).map(|w| w.info.thread)
    }

    fn record(&mut self, request: HostRequest) {
        trace!(?request, "host request");
        self.serial += 1;
        self.requests.push(request);
    }

    fn alloc_hwnd(&mut self) -> Hwnd {
        let hwnd = Hwnd(self.next_hwnd);
        self.next_hwnd += 2;
        hwnd
    }

    fn alloc_host(&mut self) -> HostWindow {
        let host = HostWindow(self.next_host);
        self.next_host += 1;
        host
    }

    fn window_by_host(&self, host: HostWindow) -> Option<&SimWindow> {
        self.windows.values().find(|w| w.info.host_window == Some(host))
    }

    fn deliver(&mut self, hwnd: Hwnd, message: GuestMessage, sync: bool) -> Result<(), DeliveryError> {
        if hwnd.is_null() || !self.windows.contains_key(&hwnd) {
            return Err(DeliveryError::InvalidWindow(hwnd));
        }
        self.messages.push(Delivered { hwnd, message, sync });
        Ok(())
    }
}

impl HostDisplay for SimPlatform {
    fn next_request_serial(&self) -> Serial {
        Serial(self.serial + 1)
    }

    fn next_event(&mut self, filter: &mut dyn FnMut(&EventRecord) -> bool) -> Option<EventRecord> {
        let index = self.events.iter().position(|ev| filter(ev))?;
        self.events.remove(index)
    }

    fn wait(&mut self, handles: &[WaitHandle], timeout: Option<Duration>) -> WaitStatus {
        if let Some(index) = self.signaled.take() {
            if index < handles.len() {
                return WaitStatus::Signaled(index);
            }
        }
        if !self.events.is_empty() {
            return WaitStatus::InputReady;
        }
        if let Some(timeout) = timeout {
            self.tick = self.tick.saturating_add(timeout.as_millis() as u64);
        }
        WaitStatus::Timeout
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn root_window(&self) -> HostWindow {
        ROOT_WINDOW
    }

    fn coordinate_map(&self) -> CoordinateMap {
        self.map
    }

    fn translate_to_root(&mut self, window: HostWindow, x: i32, y: i32) -> Point {
        if window == ROOT_WINDOW {
            return Point::new(x, y);
        }
        match self.window_by_host(window) {
            Some(w) => {
                let origin = self.map.to_root(w.info.window_rect.top_left());
                Point::new(origin.x + x, origin.y + y)
            }
            None => Point::new(x, y),
        }
    }

    fn capture_surface(&mut self) -> Option<HostWindow> {
        if !self.capture_supported {
            return None;
        }
        if self.capture_surface.is_none() {
            self.capture_surface = Some(self.alloc_host());
        }
        self.capture_surface
    }

    fn move_resize_window(&mut self, window: HostWindow, rect: Rect) {
        self.record(HostRequest::MoveResize { window, rect });
    }

    fn map_window(&mut self, window: HostWindow) {
        self.record(HostRequest::Map { window });
    }

    fn unmap_window(&mut self, window: HostWindow) {
        self.record(HostRequest::Unmap { window });
    }

    fn raise_window(&mut self, window: HostWindow) {
        self.record(HostRequest::Raise { window });
    }

    fn grab_pointer(&mut self, window: HostWindow) -> bool {
        self.record(HostRequest::GrabPointer { window });
        self.grab_succeeds
    }

    fn probe_root_grab(&mut self) -> bool {
        self.record(HostRequest::ProbeRootGrab);
        self.probe_succeeds
    }

    fn ungrab_pointer(&mut self) {
        self.record(HostRequest::UngrabPointer);
    }

    fn warp_pointer(&mut self, to: Point) {
        self.record(HostRequest::WarpPointer { to });
        self.pointer = to;
    }

    fn query_pointer(&mut self) -> Option<Point> {
        Some(self.pointer)
    }

    fn define_cursor(&mut self, window: HostWindow, cursor: Option<NativeCursor>) {
        self.record(HostRequest::DefineCursor { window, cursor });
    }

    fn enable_raw_motion(&mut self) -> Option<RawInputSession> {
        self.record(HostRequest::EnableRawMotion);
        self.raw_session.clone()
    }

    fn disable_raw_motion(&mut self) {
        self.record(HostRequest::DisableRawMotion);
    }

    fn set_input_focus(&mut self, window: HostWindow, time: Timestamp) {
        self.record(HostRequest::SetInputFocus { window, time });
        self.input_focus = Some(window);
    }

    fn request_embedder_focus(&mut self, window: HostWindow, time: Timestamp) {
        self.record(HostRequest::EmbedderFocus { window, time });
    }

    fn input_focus(&mut self) -> Option<HostWindow> {
        self.input_focus
    }

    fn resend_event(&mut self, event: &EventRecord) {
        self.resent.push(event.clone());
    }

    fn read_wm_state(&mut self, window: HostWindow) -> Option<WmState> {
        self.window_by_host(window).and_then(|w| w.wm_state)
    }

    fn read_net_wm_state(&mut self, window: HostWindow) -> NetWmState {
        self.window_by_host(window)
            .map(|w| w.net_wm_state)
            .unwrap_or_default()
    }

    fn send_net_wm_state(&mut self, window: HostWindow, state: NetWmState) {
        self.record(HostRequest::NetWmState { window, state });
    }

    fn reply_ping(&mut self, data: [u32; 5]) {
        self.record(HostRequest::Ping { data });
    }
}

impl WindowStore for SimPlatform {
    fn lookup_window(&self, host: HostWindow) -> Option<Hwnd> {
        self.window_by_host(host).map(|w| w.info.hwnd)
    }

    fn window_info(&self, hwnd: Hwnd) -> Option<WindowInfo> {
        self.windows.get(&hwnd).map(|w| w.info.clone())
    }
}

impl GuestShell for SimPlatform {
    fn desktop_window(&self) -> Hwnd {
        DESKTOP
    }

    fn foreground_window(&self) -> Hwnd {
        self.foreground
    }

    fn set_foreground_window(&mut self, hwnd: Hwnd) -> bool {
        trace!(%hwnd, "foreground");
        self.foreground = hwnd;
        self.active = hwnd;
        true
    }

    fn focus_window(&self) -> Hwnd {
        self.focus
    }

    fn active_window(&self) -> Hwnd {
        self.active
    }

    fn set_active_window(&mut self, hwnd: Hwnd) {
        self.active = hwnd;
    }

    fn ancestor_root(&self, hwnd: Hwnd) -> Hwnd {
        let mut current = hwnd;
        while let Some(w) = self.windows.get(&current) {
            let parent = w.info.parent;
            if parent.is_null() || parent == DESKTOP {
                return current;
            }
            current = parent;
        }
        Hwnd::NULL
    }

    fn parent(&self, hwnd: Hwnd) -> Hwnd {
        self.windows.get(&hwnd).map_or(Hwnd::NULL, |w| w.info.parent)
    }

    fn is_child(&self, parent: Hwnd, child: Hwnd) -> bool {
        let mut current = self.parent(child);
        while !current.is_null() {
            if current == parent {
                return true;
            }
            current = self.parent(current);
        }
        false
    }

    fn current_thread(&self) -> ThreadId {
        self.current_thread
    }

    fn window_owner(&self, hwnd: Hwnd) -> Option<WindowOwner> {
        self.windows.get(&hwnd).map(|w| WindowOwner {
            thread: w.info.thread,
            in_process: !w.info.foreign,
        })
    }

    fn virtual_screen_rect(&self) -> Rect {
        self.virtual_screen
    }

    fn primary_monitor_rect(&self) -> Rect {
        self.primary_monitor
    }

    fn guest_clip_rect(&self) -> Rect {
        self.guest_clip
    }

    fn reset_guest_clip(&mut self) {
        self.guest_clip = self.virtual_screen;
    }

    fn tick_count(&self) -> u64 {
        self.tick
    }

    fn in_composition(&self) -> bool {
        self.composing
    }

    fn create_capture_window(&mut self) -> Option<Hwnd> {
        let hwnd = self.alloc_hwnd();
        let mut info = WindowInfo::new(hwnd, WindowStyle::POPUP, Rect::default());
        info.thread = self.current_thread;
        self.add_window(info);
        Some(hwnd)
    }

    fn destroy_window(&mut self, hwnd: Hwnd) {
        if self.windows.shift_remove(&hwnd).is_some() {
            self.destroyed.push(hwnd);
        }
    }

    fn set_window_pos(&mut self, hwnd: Hwnd, rect: Rect, flags: PosFlags) {
        self.positions.push((hwnd, rect, flags));
        if let Some(info) = self.window_mut(hwnd) {
            let current = info.window_rect;
            let (left, top) = if flags.contains(PosFlags::NOMOVE) {
                (current.left, current.top)
            } else {
                (rect.left, rect.top)
            };
            let (width, height) = if flags.contains(PosFlags::NOSIZE) {
                (current.width(), current.height())
            } else {
                (rect.width(), rect.height())
            };
            info.window_rect = Rect::new(left, top, left + width, top + height);
            info.client_rect = info.window_rect;
        }
    }

    fn reparent_window(&mut self, hwnd: Hwnd, host_parent: HostWindow, _at: Point) -> Option<Hwnd> {
        let new_parent = if host_parent == ROOT_WINDOW {
            DESKTOP
        } else {
            self.lookup_window(host_parent)?
        };
        let info = self.window_mut(hwnd)?;
        let old = std::mem::replace(&mut info.parent, new_parent);
        Some(if old.is_null() { DESKTOP } else { old })
    }
}

impl MessageSink for SimPlatform {
    fn post_message(&mut self, hwnd: Hwnd, message: GuestMessage) -> Result<(), DeliveryError> {
        self.deliver(hwnd, message, false)
    }

    fn send_message(&mut self, hwnd: Hwnd, message: GuestMessage) -> Result<MessageReply, DeliveryError> {
        self.deliver(hwnd, message, true)?;
        Ok(self.replies.get(&(hwnd, message)).copied().unwrap_or_default())
    }

    fn send_message_timeout(
        &mut self,
        hwnd: Hwnd,
        message: GuestMessage,
        timeout: Duration,
    ) -> Result<MessageReply, DeliveryError> {
        if self.unresponsive.contains(&hwnd) {
            self.tick = self.tick.saturating_add(timeout.as_millis() as u64);
            return Err(DeliveryError::Timeout {
                hwnd,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        self.send_message(hwnd, message)
    }

    fn send_input(&mut self, hwnd: Hwnd, input: GuestInput) {
        self.inputs.push((hwnd, input));
    }
}

/// Realizes cursors from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct TableRealizer {
    table: HashMap<CursorHandle, NativeCursor>,
}

impl TableRealizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, cursor: CursorHandle, native: NativeCursor) -> Self {
        self.table.insert(cursor, native);
        self
    }
}

impl CursorRealizer for TableRealizer {
    fn realize_cursor(&mut self, cursor: CursorHandle) -> Option<NativeCursor> {
        self.table.get(&cursor).copied()
    }

    fn name(&self) -> &'static str {
        "table"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestry() {
        let mut sim = SimPlatform::new(Rect::new(0, 0, 1024, 768));
        let (top, _) = sim.create_window(WindowStyle::VISIBLE, Rect::new(0, 0, 100, 100));
        let child = Hwnd(0x90000);
        let mut info = WindowInfo::new(child, WindowStyle::CHILD | WindowStyle::VISIBLE, Rect::new(0, 0, 10, 10));
        info.parent = top;
        sim.add_window(info);
        assert_eq!(sim.ancestor_root(child), top);
        assert!(sim.is_child(top, child));
        assert!(!sim.is_child(child, top));
    }

    #[test]
    fn test_requests_advance_serial() {
        let mut sim = SimPlatform::new(Rect::new(0, 0, 1024, 768));
        let next = sim.next_request_serial();
        sim.warp_pointer(Point::new(5, 5));
        assert_eq!(sim.last_serial(), next);
        assert_eq!(sim.next_request_serial(), Serial(next.0 + 1));
    }

    #[test]
    fn test_post_to_unknown_window_fails() {
        let mut sim = SimPlatform::new(Rect::new(0, 0, 1024, 768));
        assert_eq!(
            sim.post_message(Hwnd(0xdead), GuestMessage::Close),
            Err(DeliveryError::InvalidWindow(Hwnd(0xdead)))
        );
        assert!(sim.post_message(DESKTOP, GuestMessage::Close).is_ok());
    }
}
