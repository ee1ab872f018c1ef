//! Event demultiplexing and the host event drain loop.

use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::coalesce::{merge, MergeAction, MergeContext};
use crate::event::{EventKind, EventRecord, ExposeEvent, ExtensionEvent, GravityEvent, ReparentEvent};
use crate::focus::set_input_focus;
use crate::geometry::{Point, Rect};
use crate::host::{Platform, PosFlags, WaitHandle, WaitStatus};
use crate::message::GuestMessage;
use crate::thread::InFlight;
use crate::window::Hwnd;
use crate::Core;

bitflags! {
    /// Categories of guest messages a caller is waiting for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct QueueMask: u32 {
        const KEY         = 0x0001;
        const MOUSEMOVE   = 0x0002;
        const MOUSEBUTTON = 0x0004;
        const POSTMESSAGE = 0x0008;
        const TIMER       = 0x0010;
        const PAINT       = 0x0020;
        const SENDMESSAGE = 0x0040;
        const HOTKEY      = 0x0080;
        const RAWINPUT    = 0x0400;

        const MOUSE = Self::MOUSEMOVE.bits() | Self::MOUSEBUTTON.bits();
        const INPUT = Self::MOUSE.bits() | Self::KEY.bits() | Self::RAWINPUT.bits();
        const ALLEVENTS = Self::INPUT.bits()
            | Self::POSTMESSAGE.bits()
            | Self::TIMER.bits()
            | Self::PAINT.bits()
            | Self::HOTKEY.bits();
        const ALLINPUT = Self::ALLEVENTS.bits() | Self::SENDMESSAGE.bits();
    }
}

/// Message categories a host event can produce.
pub fn event_mask(event: &EventRecord) -> QueueMask {
    match &event.kind {
        EventKind::Key(_) => QueueMask::KEY | QueueMask::HOTKEY,
        EventKind::Button(_) => QueueMask::MOUSEBUTTON,
        EventKind::Motion(_) | EventKind::Enter(_) | EventKind::Leave(_) => QueueMask::MOUSEMOVE,
        EventKind::Expose(_) => QueueMask::PAINT,
        EventKind::FocusIn(_)
        | EventKind::FocusOut(_)
        | EventKind::Map
        | EventKind::Unmap
        | EventKind::Destroy
        | EventKind::Configure(_)
        | EventKind::Property(_)
        | EventKind::ClientMessage(_) => QueueMask::POSTMESSAGE,
        EventKind::Generic(ExtensionEvent::RawMotion(_)) => QueueMask::INPUT,
        EventKind::Generic(ExtensionEvent::DeviceChanged(_)) => QueueMask::INPUT | QueueMask::MOUSEBUTTON,
        EventKind::Generic(_) | EventKind::Reparent(_) | EventKind::Gravity(_) => QueueMask::SENDMESSAGE,
    }
}

/// Whether an event should be pulled while waiting for `mask`.
pub fn filter_event(event: &EventRecord, mask: QueueMask) -> bool {
    mask.contains(QueueMask::ALLINPUT) || event_mask(event).intersects(mask)
}

impl Core {
    /// Drain every queued host event accepted by `mask`, coalescing as it
    /// goes. Returns true when a handler queued guest work.
    pub fn process_events(&mut self, p: &mut dyn Platform, mask: QueueMask) -> bool {
        let mut queued = false;
        let mut count = 0usize;
        let mut buffered: Option<EventRecord> = None;

        while let Some(mut next) = p.next_event(&mut |ev| filter_event(ev, mask)) {
            count += 1;
            let Some(mut prev) = buffered.take() else {
                buffered = Some(next);
                continue;
            };
            let ctx = MergeContext {
                raw_only: self.input.raw_input_only,
                warp_pending: self.input.warp_fence.is_armed(),
            };
            match merge(&mut prev, &mut next, ctx) {
                MergeAction::Handle => {
                    queued |= self.dispatch_event(p, &prev);
                    buffered = Some(next);
                }
                MergeAction::Discard => {
                    trace!(tag = %prev.tag(), serial = %prev.serial, "discarding");
                    buffered = Some(next);
                }
                MergeAction::Keep => {
                    queued |= self.dispatch_event(p, &next);
                    buffered = Some(prev);
                }
                MergeAction::Ignore => {
                    trace!(tag = %next.tag(), serial = %next.serial, "ignoring");
                    buffered = Some(prev);
                }
            }
        }
        if let Some(last) = buffered {
            queued |= self.dispatch_event(p, &last);
        }
        p.flush();
        if count > 0 {
            trace!(count, queued, "processed host events");
        }
        queued
    }

    /// Wait for host input, guest work or one of `handles`.
    ///
    /// Inside a handler nothing is drained, so nested waits never re-enter
    /// event processing.
    pub fn msg_wait_for_multiple_objects(
        &mut self,
        p: &mut dyn Platform,
        handles: &[WaitHandle],
        timeout: Option<Duration>,
        mask: QueueMask,
    ) -> WaitStatus {
        let mask = if self.input.in_handler() {
            QueueMask::empty()
        } else {
            mask
        };

        if self.process_events(p, mask) {
            return WaitStatus::InputReady;
        }
        if handles.is_empty() && timeout == Some(Duration::ZERO) {
            return WaitStatus::Timeout;
        }
        let status = p.wait(handles, timeout);
        if status == WaitStatus::InputReady {
            self.process_events(p, mask);
        }
        status
    }

    /// Route one host event to its handler. Returns true when the handler
    /// queued guest work.
    pub fn dispatch_event(&mut self, p: &mut dyn Platform, event: &EventRecord) -> bool {
        let tag = event.tag();
        let hwnd = match &event.kind {
            EventKind::Generic(_) => Hwnd::NULL,
            _ => p.lookup_window(event.window).unwrap_or_else(|| {
                if event.window == p.root_window() {
                    p.desktop_window()
                } else {
                    Hwnd::NULL
                }
            }),
        };
        trace!(%tag, window = %event.window, %hwnd, serial = %event.serial, "dispatching");

        let previous = self.input.current_event.replace(InFlight {
            tag,
            serial: event.serial,
        });
        let handled = self.handle_event_kind(p, hwnd, event);
        self.input.current_event = previous;

        #[cfg(debug_assertions)]
        if let Err(e) = crate::invariants::validate(&self.input, &*p) {
            warn!("Invariant violation after dispatch_event: {}", e);
        }

        handled
    }

    fn handle_event_kind(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord) -> bool {
        match &event.kind {
            EventKind::Key(key) => self.handle_key(p, hwnd, key),
            EventKind::Button(button) => self.handle_button(p, hwnd, event, button),
            EventKind::Motion(motion) => self.handle_motion(p, hwnd, event, motion),
            EventKind::Enter(crossing) => self.handle_enter(p, hwnd, event, crossing),
            EventKind::Leave(_) => {
                trace!(%hwnd, "leave");
                false
            }
            EventKind::FocusIn(focus) => self.handle_focus_in(p, hwnd, event, focus),
            EventKind::FocusOut(focus) => self.handle_focus_out(p, hwnd, event, focus),
            EventKind::Expose(expose) => self.handle_expose(p, hwnd, event, expose),
            EventKind::Map => self.handle_map(p, hwnd, event),
            EventKind::Unmap => true,
            EventKind::Destroy => {
                if hwnd.is_null() {
                    return false;
                }
                trace!(%hwnd, "host window destroyed");
                self.forget_window(hwnd);
                true
            }
            EventKind::Reparent(reparent) => self.handle_reparent(p, hwnd, reparent),
            EventKind::Configure(configure) => {
                if hwnd.is_null() {
                    return false;
                }
                self.handle_configure(p, hwnd, event, configure)
            }
            EventKind::Gravity(gravity) => self.handle_gravity(p, hwnd, gravity),
            EventKind::Property(property) => {
                if hwnd.is_null() {
                    return false;
                }
                self.handle_property(p, hwnd, property)
            }
            EventKind::ClientMessage(message) => self.handle_client_message(p, hwnd, event, message),
            EventKind::Generic(ExtensionEvent::RawMotion(raw)) => self.handle_raw_motion(p, event.serial, raw),
            EventKind::Generic(ExtensionEvent::DeviceChanged(changed)) => self.handle_device_changed(changed),
            EventKind::Generic(ExtensionEvent::Missing) => {
                warn!(serial = %event.serial, "extension event without payload");
                false
            }
            EventKind::Generic(ExtensionEvent::Unknown { extension, evtype }) => {
                trace!(extension, evtype, "unhandled extension event");
                false
            }
        }
    }

    fn handle_expose(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, expose: &ExposeEvent) -> bool {
        if hwnd.is_null() {
            return false;
        }
        let mut rect = expose.rect();
        if event.window == p.root_window() {
            let map = p.coordinate_map();
            let tl = map.from_root(rect.top_left());
            let br = map.from_root(Point::new(rect.right, rect.bottom));
            rect = Rect::new(tl.x, tl.y, br.x, br.y);
        }
        trace!(%hwnd, %rect, "expose");
        if let Err(e) = p.post_message(hwnd, GuestMessage::Redraw { rect }) {
            trace!(%hwnd, "redraw not delivered: {}", e);
            return false;
        }
        true
    }

    fn handle_map(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord) -> bool {
        if self.input.capture_surface == Some(event.window) {
            return false;
        }
        if hwnd.is_null() {
            return false;
        }
        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        if info.managed || info.embedded || !info.mapped {
            return false;
        }
        // unmanaged windows never get focus from the window manager
        let focus = p.focus_window();
        if focus.is_null() || !(focus == hwnd || p.is_child(hwnd, focus)) {
            return false;
        }
        set_input_focus(p, &info, 0);
        true
    }

    fn handle_reparent(&mut self, p: &mut dyn Platform, hwnd: Hwnd, reparent: &ReparentEvent) -> bool {
        if hwnd.is_null() {
            return false;
        }
        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        if !info.embedded {
            return false;
        }
        if reparent.parent == p.root_window() {
            debug!(%hwnd, "embedder went away, closing");
            if let Err(e) = p.post_message(hwnd, GuestMessage::Close) {
                trace!(%hwnd, "close not delivered: {}", e);
            }
            return true;
        }

        debug!(%hwnd, parent = %reparent.parent, "reparenting");
        let at = Point::new(reparent.x, reparent.y);
        if let Some(old) = p.reparent_window(hwnd, reparent.parent, at) {
            if !old.is_null() && old != p.desktop_window() {
                if let Err(e) = p.post_message(old, GuestMessage::Close) {
                    trace!(%old, "close not delivered: {}", e);
                }
            }
        }
        true
    }

    fn handle_gravity(&mut self, p: &mut dyn Platform, hwnd: Hwnd, gravity: &GravityEvent) -> bool {
        if hwnd.is_null() {
            return false;
        }
        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        if !info.foreign {
            return false;
        }
        let pos = p.coordinate_map().from_root(Point::new(gravity.x, gravity.y));
        let current = info.window_rect;
        if current.left == pos.x && current.top == pos.y {
            return false;
        }
        trace!(%hwnd, from = %current, x = pos.x, y = pos.y, "gravity");
        let rect = Rect::new(pos.x, pos.y, pos.x + current.width(), pos.y + current.height());
        p.set_window_pos(
            hwnd,
            rect,
            PosFlags::NOSIZE | PosFlags::NOZORDER | PosFlags::NOACTIVATE | PosFlags::NOCOPYBITS,
        );
        true
    }
}
