//! Focus arbitration between the host window manager and the guest.
//!
//! Host focus changes become guest foreground changes. A thread that cannot
//! get the pointer grab (another client holds it) asks the desktop or the
//! foreground thread to release it and retries the event later.

use tracing::{debug, error, trace, warn};

use crate::event::{ClientMessage, ClientMessageEvent, EventRecord, FocusDetail, FocusEvent, Timestamp, WmProtocol, XembedMessage};
use crate::host::Platform;
use crate::message::{DeliveryError, GuestMessage, HitTest, MouseActivate, SysCommand};
use crate::window::{ClassStyle, Hwnd, WindowExStyle, WindowInfo};
use crate::Core;

impl Core {
    /// Host focus arrived on `hwnd`.
    pub(crate) fn handle_focus_in(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, focus: &FocusEvent) -> bool {
        if hwnd.is_null() || focus.detail == FocusDetail::Pointer || hwnd == p.desktop_window() {
            return false;
        }
        trace!(%hwnd, window = %event.window, detail = ?focus.detail, mode = ?focus.mode, "focus in");
        self.input.keymap_notify_window = hwnd;

        if !self.try_grab_pointer(p) {
            debug!(%hwnd, "pointer grabbed elsewhere, asking desktop to release it");
            let desktop = p.desktop_window();
            if let Err(e) = p.post_message(desktop, GuestMessage::ReleaseCursor) {
                warn!("failed to request cursor release: {}", e);
            }
            p.resend_event(event);
            return false;
        }

        let foreground = p.foreground_window();
        if !foreground.is_null() {
            let timeout = self.config.focus.clip_request_timeout();
            match p.send_message_timeout(foreground, GuestMessage::ClipCursorRequest, timeout) {
                Ok(_) => {}
                Err(DeliveryError::Timeout { hwnd, timeout_ms }) => {
                    error!(%hwnd, timeout_ms, "clip cursor request timed out");
                }
                Err(e) => trace!("clip cursor request not delivered: {}", e),
            }
        }

        if focus.mode.is_grab_side_channel() {
            return true;
        }

        if self.config.focus.use_take_focus {
            if hwnd == p.foreground_window() {
                self.clip_fullscreen_window(p, hwnd, false);
            }
            return true;
        }

        if self.can_activate_window(p, hwnd) && self.accepts_activation(p, hwnd, HitTest::Menu) {
            p.set_foreground_window(hwnd);
        } else {
            self.activate_fallback(p, event, hwnd, 0);
        }
        true
    }

    /// Host focus left `hwnd`.
    pub(crate) fn handle_focus_out(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, focus: &FocusEvent) -> bool {
        if focus.detail == FocusDetail::Pointer {
            if hwnd.is_null() && self.input.capture_surface == Some(event.window) && self.input.is_clipping() {
                debug!("capture surface lost focus");
                self.reset_clipping(p);
                self.input.clip_reset_at = Some(p.tick_count());
            }
            return true;
        }
        if hwnd.is_null() {
            return false;
        }
        trace!(%hwnd, window = %event.window, detail = ?focus.detail, mode = ?focus.mode, "focus out");

        if hwnd == p.foreground_window() {
            self.ungrab_clipping_window(p, true);
        }
        if focus.mode.is_grab_side_channel() {
            return true;
        }
        self.focus_out(p, hwnd);
        true
    }

    fn focus_out(&mut self, p: &mut dyn Platform, hwnd: Hwnd) {
        if p.in_composition() {
            trace!(%hwnd, "input method composing, keeping focus");
            return;
        }
        self.input.last_focus = hwnd;

        let desktop = p.desktop_window();
        if self.config.window.virtual_desktop {
            if hwnd == desktop {
                self.reset_clipping(p);
            }
            return;
        }
        if hwnd != p.foreground_window() {
            return;
        }
        if let Err(e) = p.send_message(hwnd, GuestMessage::CancelMode) {
            trace!(%hwnd, "cancel mode not delivered: {}", e);
        }

        // focus moving to another of our windows hands the foreground over
        let target = p
            .input_focus()
            .and_then(|focus| p.lookup_window(focus))
            .map(|focused| p.ancestor_root(focused))
            .filter(|root| !root.is_null() && *root != hwnd);
        if let Some(root) = target {
            if self.can_activate_window(p, root) {
                debug!(from = %hwnd, to = %root, "focus moved to another guest window");
                p.set_foreground_window(root);
                return;
            }
        }
        if hwnd == p.foreground_window() {
            debug!(%hwnd, "lost focus, setting foreground to desktop");
            p.set_foreground_window(desktop);
        }
    }

    /// Make `hwnd` the foreground window and give host input focus to the
    /// guest focus window.
    pub(crate) fn set_focus(&mut self, p: &mut dyn Platform, event: &EventRecord, hwnd: Hwnd, time: Timestamp) {
        if !self.try_grab_pointer(p) {
            let foreground = p.foreground_window();
            debug!(%hwnd, %foreground, "pointer grabbed elsewhere, asking foreground to release it");
            if !foreground.is_null() {
                if let Err(e) = p.post_message(foreground, GuestMessage::ReleaseCursor) {
                    warn!("failed to request cursor release: {}", e);
                }
            }
            p.resend_event(event);
            return;
        }

        debug!(%hwnd, "setting foreground window");
        p.set_foreground_window(hwnd);

        let mut focus = p.focus_window();
        if focus.is_null() {
            focus = p.active_window();
        }
        if focus.is_null() {
            return;
        }
        let root = p.ancestor_root(focus);
        if let Some(info) = p.window_info(root) {
            set_input_focus(p, &info, time);
        }
    }

    /// `WM_TAKE_FOCUS` from the window manager.
    fn take_focus(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, time: Timestamp) {
        if self.can_activate_window(p, hwnd) && self.accepts_activation(p, hwnd, HitTest::Menu) {
            self.set_focus(p, event, hwnd, time);
            return;
        }

        let desktop = p.desktop_window();
        if hwnd == desktop {
            let mut target = p.foreground_window();
            if target.is_null() {
                target = self.input.last_focus;
            }
            if target.is_null() {
                target = desktop;
            }
            self.set_focus(p, event, target, time);
            return;
        }

        self.activate_fallback(p, event, hwnd, time);
    }

    /// `refused` declined activation. Activate the first of guest focus
    /// root, active window and last focus relinquished that accepts, else
    /// the desktop.
    fn activate_fallback(&mut self, p: &mut dyn Platform, event: &EventRecord, refused: Hwnd, time: Timestamp) {
        let focus = p.focus_window();
        let focus_root = if focus.is_null() { Hwnd::NULL } else { p.ancestor_root(focus) };
        let candidates = [focus_root, p.active_window(), self.input.last_focus];
        for (i, candidate) in candidates.into_iter().enumerate() {
            if candidate.is_null() || candidate == refused || candidates[..i].contains(&candidate) {
                continue;
            }
            if !self.can_activate_window(p, candidate) || !self.accepts_activation(p, candidate, HitTest::Menu) {
                trace!(%candidate, "fallback window declined");
                continue;
            }
            trace!(%candidate, "activating fallback window");
            self.set_focus(p, event, candidate, time);
            return;
        }
        let desktop = p.desktop_window();
        trace!("no activatable window, falling back to desktop");
        p.set_foreground_window(desktop);
    }

    /// Whether `hwnd` may become the foreground window.
    pub fn can_activate_window(&self, p: &dyn Platform, hwnd: Hwnd) -> bool {
        if hwnd.is_null() || hwnd == p.desktop_window() {
            return false;
        }
        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        info.is_visible()
            && !info.style.is_pure_child()
            && !info.is_minimized()
            && !info.ex_style.contains(WindowExStyle::NOACTIVATE)
            && !info.window_rect.is_empty()
            && info.is_enabled()
    }

    /// Ask `hwnd` whether it wants to be activated. An unanswered probe
    /// counts as consent.
    fn accepts_activation(&mut self, p: &mut dyn Platform, hwnd: Hwnd, hit: HitTest) -> bool {
        self.probe_activation(p, hwnd, hit)
            .map_or(true, |reply| !reply.refuses_activation())
    }

    fn probe_activation(&mut self, p: &mut dyn Platform, hwnd: Hwnd, hit: HitTest) -> Option<MouseActivate> {
        let top = p.ancestor_root(hwnd);
        let probe = GuestMessage::MouseActivate { top, hit };
        match p.send_message_timeout(hwnd, probe, self.config.focus.probe_timeout()) {
            Ok(reply) => {
                let activation = reply.activation();
                trace!(%hwnd, ?hit, ?activation, "mouse activate probe");
                Some(activation)
            }
            Err(e) => {
                debug!(%hwnd, "mouse activate probe failed: {}", e);
                None
            }
        }
    }

    /// Client message from the window manager or an XEmbed embedder.
    pub(crate) fn handle_client_message(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, message: &ClientMessageEvent) -> bool {
        if hwnd.is_null() {
            return false;
        }
        if message.format != 32 {
            warn!(%hwnd, format = message.format, "don't know how to handle client message format");
            return false;
        }
        match message.message {
            ClientMessage::WmProtocols { protocol, time } => self.handle_wm_protocols(p, hwnd, event, protocol, time, message.data),
            ClientMessage::Xembed { message, time } => self.handle_xembed(p, hwnd, message, time),
            ClientMessage::Other { message_type } => {
                trace!(%hwnd, message_type, "no handler for client message");
                false
            }
        }
    }

    fn handle_wm_protocols(
        &mut self,
        p: &mut dyn Platform,
        hwnd: Hwnd,
        event: &EventRecord,
        protocol: WmProtocol,
        time: Timestamp,
        data: [u32; 5],
    ) -> bool {
        match protocol {
            WmProtocol::DeleteWindow => {
                self.delete_window_request(p, hwnd);
                true
            }
            WmProtocol::TakeFocus => {
                trace!(%hwnd, time, "take focus");
                self.take_focus(p, hwnd, event, time);
                true
            }
            WmProtocol::Ping => {
                p.reply_ping(data);
                true
            }
            WmProtocol::Other(atom) => {
                trace!(%hwnd, atom, "unhandled WM_PROTOCOLS message");
                false
            }
        }
    }

    /// The window manager's close button.
    fn delete_window_request(&mut self, p: &mut dyn Platform, hwnd: Hwnd) {
        let close = GuestMessage::syscommand(SysCommand::Close);
        if hwnd == p.desktop_window() {
            // the desktop has no close button to pretend to click
            if let Err(e) = p.send_message(hwnd, close) {
                trace!("desktop close not delivered: {}", e);
            }
            return;
        }
        let Some(info) = p.window_info(hwnd) else {
            return;
        };
        if !info.is_enabled() || info.class_style.contains(ClassStyle::NOCLOSE) {
            debug!(%hwnd, "ignoring delete request for disabled or closeless window");
            return;
        }
        if p.active_window() != hwnd {
            match self.probe_activation(p, hwnd, HitTest::Close) {
                Some(MouseActivate::ActivateAndEat | MouseActivate::NoActivateAndEat) => return,
                Some(MouseActivate::NoActivate) => {}
                Some(MouseActivate::Activate) | None => p.set_active_window(hwnd),
            }
        }
        if let Err(e) = p.post_message(hwnd, close) {
            trace!(%hwnd, "close not delivered: {}", e);
        }
    }

    fn handle_xembed(&mut self, p: &mut dyn Platform, hwnd: Hwnd, message: XembedMessage, time: Timestamp) -> bool {
        match message {
            XembedMessage::EmbeddedNotify => {
                trace!(%hwnd, time, "embedded");
                true
            }
            XembedMessage::WindowDeactivate | XembedMessage::FocusOut => {
                let root = p.ancestor_root(hwnd);
                self.focus_out(p, if root.is_null() { hwnd } else { root });
                true
            }
            XembedMessage::ModalityOn | XembedMessage::ModalityOff => {
                let enable = message == XembedMessage::ModalityOff;
                if let Err(e) = p.send_message(hwnd, GuestMessage::EnableWindow { enable }) {
                    trace!(%hwnd, "enable window not delivered: {}", e);
                }
                true
            }
            XembedMessage::Other(opcode) => {
                trace!(%hwnd, opcode, "unhandled XEmbed message");
                false
            }
        }
    }
}

/// Move host keyboard focus to the host window of `info`, through the
/// embedder for embedded windows.
pub(crate) fn set_input_focus(p: &mut dyn Platform, info: &WindowInfo, time: Timestamp) {
    let Some(host) = info.host_window else {
        return;
    };
    trace!(hwnd = %info.hwnd, %host, time, embedded = info.embedded, "setting host input focus");
    if info.embedded {
        p.request_embedder_focus(host, time);
    } else {
        p.set_input_focus(host, time);
    }
}
