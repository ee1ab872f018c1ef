//! Pointer grab / clip state machine.
//!
//! A clip is enforced by grabbing the pointer on an invisible capture
//! surface sized to the clip rectangle. Each clip is represented on the
//! guest side by a capture window; the desktop thread's
//! [`ClipOwnerRegistry`](crate::registry::ClipOwnerRegistry) tracks which
//! capture window currently owns the pointer so that a new owner evicts the
//! previous one.
//!
//! ```text
//!   Unclipped ──clip_cursor(restricting)──▶ ClippingExplicit
//!       ▲  ▲                                     │
//!       │  └──────── release / reset / evict ────┤
//!       │                                        │
//!       └── release / reset / evict ── ClippingFullscreen ◀── clip_fullscreen_window
//! ```

use tracing::{debug, trace, warn};

use crate::geometry::Rect;
use crate::host::Platform;
use crate::message::{GuestMessage, MessageReply};
use crate::registry::OwnerUpdate;
use crate::thread::{ClipKind, ClipRegion};
use crate::window::Hwnd;
use crate::wm_state::is_fullscreen_rect;
use crate::Core;

impl Core {
    /// Guest cursor clip request. `None` releases the clip.
    ///
    /// Always succeeds from the guest's point of view; when the host grab
    /// fails the pointer simply stays unclipped.
    pub fn clip_cursor(&mut self, p: &mut dyn Platform, rect: Option<Rect>) -> bool {
        let virtual_screen = p.virtual_screen_rect();
        let rect = rect.map_or(virtual_screen, |r| r.clamp_to(virtual_screen));

        if self.config.pointer.grab_pointer && !rect.is_empty() && rect.restricts(virtual_screen) {
            let foreground = p.foreground_window();
            let current = p.current_thread();
            if let Some(owner) = p.window_owner(foreground) {
                if owner.in_process && owner.thread != current && !foreground.is_null() {
                    debug!(%foreground, thread = %owner.thread, %rect, "forwarding clip request to foreground thread");
                    match p.post_message(foreground, GuestMessage::ClipCursorRequest) {
                        Ok(()) => return true,
                        Err(e) => warn!("failed to forward clip request: {}", e),
                    }
                }
            }
            if self.grab_clipping_window(p, rect, ClipKind::Explicit) {
                return true;
            }
        }

        self.ungrab_clipping_window(p, true);
        true
    }

    /// Grab the pointer inside `rect` (guest coordinates).
    ///
    /// Returns false when the host refused the grab; the thread is then left
    /// unclipped.
    pub(crate) fn grab_clipping_window(&mut self, p: &mut dyn Platform, rect: Rect, kind: ClipKind) -> bool {
        if self.is_desktop_thread(p) {
            trace!(%rect, "no clipping in the desktop thread");
            return true;
        }
        if let Some(region) = self.input.clip {
            if region.rect == rect && region.kind == kind {
                trace!(%rect, ?kind, "clip already in place");
                return true;
            }
        }

        let Some(surface) = self.capture_surface(p) else {
            warn!("no capture surface, cannot clip");
            return false;
        };
        let previous = self.input.clip;
        let capture = match previous {
            Some(region) => region.capture_window,
            None => match p.create_capture_window() {
                Some(hwnd) => hwnd,
                None => {
                    warn!("failed to create capture window");
                    return false;
                }
            }
        };

        if previous.is_none() && !self.enable_raw_input(p) {
            warn!(%rect, "raw input not supported, refusing to clip");
            p.destroy_window(capture);
            p.reset_guest_clip();
            return true;
        }

        debug!(%rect, ?kind, %capture, "clipping pointer");
        if previous.is_none() {
            p.unmap_window(surface);
        }
        let map = p.coordinate_map();
        let root = map.rect_to_root(rect);
        let root = Rect::new(
            root.left,
            root.top,
            root.left + root.width().max(1),
            root.top + root.height().max(1),
        );
        p.move_resize_window(surface, root);
        p.map_window(surface);
        p.raise_window(surface);

        // a shrinking clip makes the host warp the pointer back inside
        if previous.map_or(true, |region| rect.shrinks_from(region.rect)) {
            let serial = p.next_request_serial();
            self.input.warp_fence.arm(serial);
        }

        if !p.grab_pointer(surface) {
            warn!(%rect, "host pointer grab failed");
            p.ungrab_pointer();
            p.unmap_window(surface);
            self.disable_raw_input(p);
            p.destroy_window(capture);
            if let Some(region) = self.input.clip.take() {
                self.notify_clip_owner(p, region.capture_window, Hwnd::NULL);
            }
            return false;
        }

        self.input.clip = Some(ClipRegion {
            rect,
            capture_window: capture,
            kind,
        });
        if previous.is_none() {
            self.sync_window_cursor(p, surface);
        }
        self.cursor.set_cursor_window(capture);
        let from = previous.map_or(Hwnd::NULL, |region| region.capture_window);
        self.notify_clip_owner(p, from, capture);
        true
    }

    /// Release the clip grab.
    ///
    /// With `notify` false the desktop is not told, because the release
    /// came from the registry itself.
    pub(crate) fn ungrab_clipping_window(&mut self, p: &mut dyn Platform, notify: bool) {
        let Some(region) = self.input.clip.take() else {
            return;
        };
        debug!(capture = %region.capture_window, "no longer clipping");
        p.ungrab_pointer();
        if let Some(surface) = self.input.capture_surface {
            p.unmap_window(surface);
        }
        self.disable_raw_input(p);
        p.destroy_window(region.capture_window);
        if notify {
            self.notify_clip_owner(p, region.capture_window, Hwnd::NULL);
        }
    }

    /// Drop the clip and reset the guest clip rectangle to the full desktop.
    pub fn reset_clipping(&mut self, p: &mut dyn Platform) {
        if !self.input.is_clipping() {
            return;
        }
        self.ungrab_clipping_window(p, true);
        p.reset_guest_clip();
    }

    /// Clip the pointer to the primary output when `hwnd` covers it.
    ///
    /// Unless `reset` is set, a recent external reset or an existing clip
    /// anywhere in the process blocks the grab.
    pub fn clip_fullscreen_window(&mut self, p: &mut dyn Platform, hwnd: Hwnd, reset: bool) -> bool {
        if !self.config.pointer.grab_pointer {
            return false;
        }
        if hwnd.is_null() || hwnd == p.desktop_window() {
            return false;
        }
        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        if !info.is_visible() || info.style.is_pure_child() {
            return false;
        }
        if self.windows.is_iconic(hwnd) {
            return false;
        }
        // maximized windows don't count as fullscreen
        if info.is_maximized() && info.style.has_caption() {
            return false;
        }
        if !is_fullscreen_rect(&*p, info.window_rect) {
            return false;
        }

        if !reset {
            let now = p.tick_count();
            if !self
                .input
                .reset_debounced(now, self.config.pointer.clip_reset_debounce_ms)
            {
                trace!(%hwnd, "clip was reset recently, not clipping");
                return false;
            }
            if self.input.is_clipping() {
                return false;
            }
            let owner = self.query_clip_owner(p);
            if !owner.is_null() {
                trace!(%hwnd, %owner, "pointer already clipped elsewhere");
                return false;
            }
        }

        let monitor = p.primary_monitor_rect();
        if !self.config.pointer.grab_fullscreen {
            if monitor != p.virtual_screen_rect() {
                return false;
            }
            if self.config.window.virtual_desktop {
                return false;
            }
        }

        debug!(%hwnd, rect = %monitor, "clipping to fullscreen window");
        self.grab_clipping_window(p, monitor, ClipKind::Fullscreen) && self.input.is_clipping()
    }

    /// Whether a pointer grab could succeed right now.
    pub(crate) fn try_grab_pointer(&mut self, p: &mut dyn Platform) -> bool {
        if !self.config.pointer.grab_pointer || self.input.is_clipping() {
            return true;
        }
        p.probe_root_grab()
    }

    /// Messages the cores exchange among themselves.
    pub fn handle_driver_message(&mut self, p: &mut dyn Platform, hwnd: Hwnd, message: GuestMessage) -> MessageReply {
        trace!(%hwnd, ?message, "driver message");
        match message {
            GuestMessage::ClipCursorNotify { from, to } => {
                let Some(registry) = self.registry.as_mut() else {
                    warn!(%hwnd, "clip notification outside the desktop thread");
                    return MessageReply::Handled(false);
                };
                match registry.update(from, to) {
                    OwnerUpdate::Accepted { evicted: Some(prev) } => {
                        debug!(%prev, %to, "evicting previous clip owner");
                        if let Err(e) = p.post_message(prev, GuestMessage::ClipCursorReset) {
                            trace!("evicted clip owner is gone: {}", e);
                        }
                        MessageReply::Handled(true)
                    }
                    OwnerUpdate::Accepted { evicted: None } => MessageReply::Handled(true),
                    OwnerUpdate::Rejected => MessageReply::Handled(false),
                }
            }
            GuestMessage::ClipCursorReset => {
                if hwnd.is_null() || hwnd != self.input.capture_window() {
                    trace!(%hwnd, "stale clip reset");
                    return MessageReply::Handled(false);
                }
                debug!(%hwnd, "clip reset externally");
                self.ungrab_clipping_window(p, false);
                p.reset_guest_clip();
                self.input.clip_reset_at = Some(p.tick_count());
                MessageReply::Handled(true)
            }
            GuestMessage::ClipCursorRequest => MessageReply::Handled(self.clip_cursor_request(p, hwnd)),
            GuestMessage::ReleaseCursor => {
                self.reset_clipping(p);
                MessageReply::Handled(true)
            }
            GuestMessage::QueryClipOwner => MessageReply::ClipOwner(self.registry_owner()),
            GuestMessage::SetCursor { cursor } => {
                self.define_cursor(p, hwnd, cursor);
                MessageReply::Handled(true)
            }
            _ => MessageReply::Default,
        }
    }

    /// The foreground window should reapply whatever clip the guest holds.
    fn clip_cursor_request(&mut self, p: &mut dyn Platform, hwnd: Hwnd) -> bool {
        if hwnd == p.desktop_window() {
            warn!("ignoring clip cursor request on desktop window");
            return false;
        }
        if hwnd != p.foreground_window() {
            warn!(%hwnd, "ignoring clip cursor request on non-foreground window");
            return false;
        }
        let clip = p.guest_clip_rect();
        let virtual_screen = p.virtual_screen_rect();
        if self.config.pointer.grab_pointer && clip.restricts(virtual_screen) {
            let clip = clip.clamp_to(virtual_screen);
            if self.grab_clipping_window(p, clip, ClipKind::Explicit) {
                return true;
            }
            self.ungrab_clipping_window(p, true);
            return false;
        }
        self.clip_fullscreen_window(p, hwnd, false)
    }

    /// Tell the registry the clip owner changed.
    fn notify_clip_owner(&mut self, p: &mut dyn Platform, from: Hwnd, to: Hwnd) {
        let message = GuestMessage::ClipCursorNotify { from, to };
        if let Some(registry) = self.registry.as_mut() {
            registry.update(from, to);
            return;
        }
        let desktop = p.desktop_window();
        if let Err(e) = p.post_message(desktop, message) {
            warn!("failed to notify clip owner change: {}", e);
        }
    }

    fn query_clip_owner(&mut self, p: &mut dyn Platform) -> Hwnd {
        if let Some(registry) = &self.registry {
            return registry.owner();
        }
        let desktop = p.desktop_window();
        match p.send_message_timeout(desktop, GuestMessage::QueryClipOwner, self.config.focus.probe_timeout()) {
            Ok(reply) => reply.clip_owner(),
            Err(e) => {
                debug!("clip owner query failed, assuming none: {}", e);
                Hwnd::NULL
            }
        }
    }

    fn capture_surface(&mut self, p: &mut dyn Platform) -> Option<crate::event::HostWindow> {
        if let Some(surface) = self.input.capture_surface {
            return Some(surface);
        }
        let surface = p.capture_surface()?;
        debug!(%surface, "capture surface created");
        self.input.capture_surface = Some(surface);
        Some(surface)
    }

    /// The desktop thread arbitrates clipping and never clips itself.
    pub(crate) fn is_desktop_thread(&self, p: &dyn Platform) -> bool {
        if self.registry.is_some() {
            return true;
        }
        p.window_owner(p.desktop_window())
            .is_some_and(|owner| owner.thread == p.current_thread())
    }
}
