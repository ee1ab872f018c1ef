//! Window manager state synchronization.
//!
//! The host window manager changes window state on its own schedule
//! (iconify, maximize, fullscreen acknowledgement). Every notification
//! triggers at most one corrective guest request; convergence over several
//! notifications is the normal case.

use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::event::{ConfigureEvent, EventRecord, HostWindow, PropertyAtom, PropertyEvent, PropertyState};
use crate::fence::SerialFence;
use crate::geometry::{Point, Rect};
use crate::host::{Platform, PosFlags};
use crate::message::{GuestMessage, SysCommand};
use crate::window::{Hwnd, WindowStyle};
use crate::Core;

/// ICCCM `WM_STATE` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WmState {
    #[default]
    Withdrawn,
    Normal,
    Iconic,
}

impl WmState {
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Withdrawn),
            1 => Some(Self::Normal),
            3 => Some(Self::Iconic),
            _ => None,
        }
    }

    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Withdrawn => 0,
            Self::Normal => 1,
            Self::Iconic => 3,
        }
    }
}

bitflags! {
    /// `_NET_WM_STATE` atoms the core tracks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NetWmState: u32 {
        const FULLSCREEN    = 1 << 0;
        const ABOVE         = 1 << 1;
        /// Both vertical and horizontal maximization.
        const MAXIMIZED     = 1 << 2;
        const SKIP_PAGER    = 1 << 3;
        const SKIP_TASKBAR  = 1 << 4;
        const SKIP_SWITCHER = 1 << 5;
    }
}

/// Cached host-side state of one guest window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowManagerState {
    /// Last state we acted on.
    pub iconic: bool,
    /// Last `WM_STATE` read from the host.
    pub wm_state: WmState,
    pub net_wm_state: NetWmState,
    /// Fullscreen was requested and the window manager has not confirmed it.
    pub pending_fullscreen: bool,
    /// Configure events older than our last configure request are stale.
    pub configure_fence: SerialFence,
}

/// Per-window cache, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct WindowStateCache {
    windows: IndexMap<Hwnd, WindowManagerState>,
}

impl WindowStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hwnd: Hwnd) -> Option<&WindowManagerState> {
        self.windows.get(&hwnd)
    }

    pub fn entry(&mut self, hwnd: Hwnd) -> &mut WindowManagerState {
        self.windows.entry(hwnd).or_default()
    }

    /// Drop a destroyed window.
    pub fn remove(&mut self, hwnd: Hwnd) -> Option<WindowManagerState> {
        self.windows.shift_remove(&hwnd)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn is_iconic(&self, hwnd: Hwnd) -> bool {
        self.get(hwnd).is_some_and(|s| s.iconic)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hwnd, &WindowManagerState)> {
        self.windows.iter()
    }
}

/// The single guest request a notification resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    None,
    SysCommand(SysCommand),
    /// Bring the minimized window to the front, then restore it.
    RestoreToForeground,
}

/// A rectangle counts as fullscreen when it covers the primary monitor or
/// the whole virtual screen.
pub(crate) fn is_fullscreen_rect(p: &dyn Platform, rect: Rect) -> bool {
    p.primary_monitor_rect().is_within(rect) || p.virtual_screen_rect().is_within(rect)
}

impl Core {
    /// Property change on a host window.
    pub(crate) fn handle_property(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &PropertyEvent) -> bool {
        match event.atom {
            PropertyAtom::WmState => {
                self.wm_state_notify(p, hwnd, event.state, true);
                true
            }
            PropertyAtom::NetWmState => {
                self.net_wm_state_notify(p, hwnd);
                true
            }
            PropertyAtom::Other(atom) => {
                trace!(%hwnd, atom, "ignoring property change");
                false
            }
        }
    }

    /// `WM_STATE` changed. With `update_window` false only the cache is
    /// refreshed.
    pub(crate) fn wm_state_notify(
        &mut self,
        p: &mut dyn Platform,
        hwnd: Hwnd,
        state: PropertyState,
        update_window: bool,
    ) {
        let Some(info) = p.window_info(hwnd) else {
            return;
        };
        let Some(host) = info.host_window else {
            return;
        };
        let entry = self.windows.entry(hwnd);

        match state {
            PropertyState::Deleted => {
                trace!(%hwnd, from = ?entry.wm_state, "WM_STATE deleted");
                entry.wm_state = WmState::Withdrawn;
            }
            PropertyState::NewValue => {
                let old = entry.wm_state;
                if let Some(new) = p.read_wm_state(host) {
                    if new != old {
                        debug!(%hwnd, ?old, ?new, "new WM_STATE");
                        entry.wm_state = new;
                        // window managers pass through Normal when mapping an
                        // iconic window; the first transition is noise
                        if old == WmState::Withdrawn {
                            return;
                        }
                    }
                }
            }
        }

        if !update_window || !info.managed || !info.mapped {
            return;
        }

        let style = info.style;
        let correction = if entry.iconic && entry.wm_state == WmState::Normal {
            entry.iconic = false;
            entry.net_wm_state = p.read_net_wm_state(host);
            if style.has_caption() && entry.net_wm_state.contains(NetWmState::MAXIMIZED) {
                if style.contains(WindowStyle::MAXIMIZEBOX) && !style.contains(WindowStyle::DISABLED) {
                    debug!(%hwnd, "restoring to maximized");
                    Correction::SysCommand(SysCommand::Maximize)
                } else {
                    trace!(%hwnd, ?style, "not restoring to maximized");
                    Correction::None
                }
            } else if style.intersects(WindowStyle::MINIMIZE | WindowStyle::MAXIMIZE) {
                debug!(%hwnd, "restoring");
                if style.contains(WindowStyle::MINIMIZE | WindowStyle::VISIBLE) {
                    Correction::RestoreToForeground
                } else {
                    Correction::SysCommand(SysCommand::Restore)
                }
            } else {
                trace!(%hwnd, ?style, "not restoring");
                Correction::None
            }
        } else if !entry.iconic && entry.wm_state == WmState::Iconic {
            entry.iconic = true;
            if style.contains(WindowStyle::MINIMIZE) {
                trace!(%hwnd, "already minimized");
                Correction::None
            } else if style.contains(WindowStyle::MINIMIZEBOX) && !style.contains(WindowStyle::DISABLED) {
                debug!(%hwnd, "minimizing");
                Correction::SysCommand(SysCommand::Minimize)
            } else {
                trace!(%hwnd, ?style, "not minimizing");
                Correction::None
            }
        } else {
            Correction::None
        };

        apply_correction(p, hwnd, correction);
    }

    /// `_NET_WM_STATE` changed: a pending fullscreen request may now be
    /// acknowledged.
    pub(crate) fn net_wm_state_notify(&mut self, p: &mut dyn Platform, hwnd: Hwnd) {
        let Some(host) = p.host_window(hwnd) else {
            return;
        };
        let entry = self.windows.entry(hwnd);
        if !entry.pending_fullscreen {
            return;
        }
        entry.net_wm_state = p.read_net_wm_state(host);
        if entry.net_wm_state.contains(NetWmState::FULLSCREEN) {
            entry.pending_fullscreen = false;
            debug!(%hwnd, state = ?entry.net_wm_state, "fullscreen acknowledged");
        } else {
            trace!(%hwnd, state = ?entry.net_wm_state, "fullscreen still pending");
        }
    }

    /// Host geometry change.
    pub(crate) fn handle_configure(
        &mut self,
        p: &mut dyn Platform,
        hwnd: Hwnd,
        event: &EventRecord,
        configure: &ConfigureEvent,
    ) -> bool {
        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        let entry = self.windows.entry(hwnd);
        if !info.mapped || entry.iconic {
            return false;
        }
        if !info.foreign && !info.managed {
            return false;
        }
        if event.send_event && info.foreign {
            trace!(%hwnd, "ignoring synthetic configure on foreign window");
            return false;
        }
        if entry.configure_fence.precedes(event.serial) {
            trace!(
                %hwnd,
                serial = %event.serial,
                fence = ?entry.configure_fence.serial(),
                "ignoring configure older than our request"
            );
            return false;
        }
        if entry.pending_fullscreen {
            trace!(%hwnd, "fullscreen pending, ignoring configure");
            return false;
        }

        let desktop = p.desktop_window();
        let parent = p.parent(hwnd);
        let map = p.coordinate_map();
        // synthetic events are already in root coordinates
        let mut root_coords = event.send_event;
        let mut origin = Point::new(configure.x, configure.y);
        if !root_coords && (parent.is_null() || parent == desktop) {
            origin = p.translate_to_root(event.window, 0, 0);
            root_coords = true;
        }
        if root_coords {
            origin = map.from_root(origin);
        }
        let mut rect = Rect::from_origin_size(origin.x, origin.y, configure.width, configure.height);
        if root_coords && !parent.is_null() && parent != desktop {
            if let Some(parent_info) = p.window_info(parent) {
                let client = parent_info.client_rect;
                rect = rect.offset(-client.left, -client.top);
            }
        }

        let current = info.window_rect;
        let mut flags = PosFlags::NOACTIVATE | PosFlags::NOZORDER;
        if info.foreign {
            flags |= PosFlags::NOCOPYBITS;
        }
        if current.left == rect.left && current.top == rect.top {
            flags |= PosFlags::NOMOVE;
        } else {
            trace!(%hwnd, from = %current, to = %rect, "moving");
        }
        if (current.width() == rect.width() && current.height() == rect.height()) || current.is_empty() {
            flags |= PosFlags::NOSIZE;
        } else {
            trace!(%hwnd, from = %current, to = %rect, "resizing");
        }

        let style = info.style;
        if let Some(host) = info.host_window {
            if style.has_caption() || !is_fullscreen_rect(&*p, current) {
                entry.net_wm_state = p.read_net_wm_state(host);
                let maximized = entry.net_wm_state.contains(NetWmState::MAXIMIZED);
                if maximized && !style.contains(WindowStyle::MAXIMIZE) {
                    debug!(%hwnd, "window manager maximized the window");
                    apply_correction(p, hwnd, Correction::SysCommand(SysCommand::Maximize));
                    return true;
                }
                if !maximized && style.contains(WindowStyle::MAXIMIZE) {
                    debug!(%hwnd, "window manager unmaximized the window");
                    apply_correction(p, hwnd, Correction::SysCommand(SysCommand::Restore));
                    return true;
                }
            }
        }

        if !flags.contains(PosFlags::NOMOVE | PosFlags::NOSIZE) {
            p.set_window_pos(hwnd, rect, flags);
            return true;
        }
        false
    }

    /// Ask the window manager for a new `_NET_WM_STATE`. Fullscreen stays
    /// pending until the window manager reports it.
    pub fn request_net_wm_state(&mut self, p: &mut dyn Platform, hwnd: Hwnd, desired: NetWmState) {
        let Some(info) = p.window_info(hwnd) else {
            return;
        };
        let (Some(host), true) = (info.host_window, info.managed) else {
            return;
        };
        let entry = self.windows.entry(hwnd);
        if info.mapped {
            entry.pending_fullscreen = desired.contains(NetWmState::FULLSCREEN)
                && !entry.net_wm_state.contains(NetWmState::FULLSCREEN);
        }
        debug!(%hwnd, ?desired, prev = ?entry.net_wm_state, pending = entry.pending_fullscreen, "requesting net wm state");
        entry.net_wm_state = desired;
        p.send_net_wm_state(host, desired);
    }

    /// Fence configure events until the host catches up with a move/resize
    /// request that is about to be sent.
    pub fn note_configure_request(&mut self, p: &mut dyn Platform, hwnd: Hwnd) {
        let serial = p.next_request_serial();
        self.windows.entry(hwnd).configure_fence.arm(serial);
    }

    /// Wait until the window manager moved `hwnd` into (`set`) or out of the
    /// withdrawn state. Returns false on timeout.
    pub fn wait_for_withdrawn_state(&mut self, p: &mut dyn Platform, hwnd: Hwnd, set: bool) -> bool {
        let deadline = p.tick_count().saturating_add(self.config.window.wait_withdrawn_timeout_ms);
        trace!(%hwnd, set, "waiting for withdrawn state");

        loop {
            let Some(info) = p.window_info(hwnd) else {
                return true;
            };
            if !info.managed || info.embedded {
                return true;
            }
            let Some(host) = info.host_window else {
                return true;
            };
            if info.mapped == set {
                trace!(%hwnd, mapped = info.mapped, "mapping changed while waiting");
                return true;
            }
            let withdrawn = self.windows.get(hwnd).map_or(WmState::Withdrawn, |s| s.wm_state) == WmState::Withdrawn;
            if withdrawn == set {
                trace!(%hwnd, withdrawn, "withdrawn state reached");
                return true;
            }

            let mut count = 0;
            while let Some(event) = p.next_event(&mut |ev| is_wm_state_notify(ev, host)) {
                count += 1;
                match event.kind {
                    crate::event::EventKind::Property(prop) => self.wm_state_notify(p, hwnd, prop.state, false),
                    crate::event::EventKind::Destroy => {
                        debug!(%hwnd, %host, "window destroyed while waiting");
                        self.forget_window(hwnd);
                        return true;
                    }
                    _ => {}
                }
            }
            if count > 0 {
                continue;
            }

            let remaining = deadline.saturating_sub(p.tick_count());
            if remaining == 0
                || p.wait(&[], Some(std::time::Duration::from_millis(remaining)))
                    == crate::host::WaitStatus::Timeout
            {
                warn!(%hwnd, %host, "wait for withdrawn state timed out");
                return false;
            }
        }
    }

    /// Cached state of `hwnd`.
    pub fn window_manager_state(&self, hwnd: Hwnd) -> Option<&WindowManagerState> {
        self.windows.get(hwnd)
    }

    /// Forget a destroyed window.
    pub fn forget_window(&mut self, hwnd: Hwnd) {
        self.windows.remove(hwnd);
    }
}

fn is_wm_state_notify(event: &EventRecord, host: HostWindow) -> bool {
    event.window == host
        && matches!(
            &event.kind,
            crate::event::EventKind::Destroy
                | crate::event::EventKind::Property(PropertyEvent {
                    atom: PropertyAtom::WmState,
                    ..
                })
        )
}

fn apply_correction(p: &mut dyn Platform, hwnd: Hwnd, correction: Correction) {
    let command = match correction {
        Correction::None => return,
        Correction::SysCommand(command) => command,
        Correction::RestoreToForeground => {
            p.set_foreground_window(hwnd);
            SysCommand::Restore
        }
    };
    if let Err(e) = p.send_message(hwnd, GuestMessage::syscommand(command)) {
        trace!(%hwnd, ?command, "state change not delivered: {}", e);
    }
}
