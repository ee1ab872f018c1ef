//! Pointer and keyboard input: host button/motion/crossing/raw events to
//! guest mouse input, cursor warps and cursor changes.

use tracing::{debug, trace};

use crate::cursor::CursorHandle;
use crate::event::{
    ButtonEvent, CrossingEvent, DeviceChangedEvent, EventRecord, FocusDetail, HostWindow, KeyEvent,
    MotionEvent, RawMotionEvent, Serial, Timestamp,
};
use crate::geometry::Point;
use crate::host::Platform;
use crate::message::{GuestInput, GuestMessage, KeyInput, MouseFlags, MouseInput, WHEEL_DELTA, XBUTTON1, XBUTTON2};
use crate::raw_motion::{Accumulated, RawInputStatus};
use crate::window::Hwnd;
use crate::Core;

/// Guest flags and data word for a host button, `None` for buttons the
/// guest has no equivalent for.
pub fn button_input(button: u8, pressed: bool) -> Option<(MouseFlags, i32)> {
    let pick = |down: MouseFlags, up: MouseFlags| if pressed { down } else { up };
    let mapped = match button {
        1 => (pick(MouseFlags::LEFTDOWN, MouseFlags::LEFTUP), 0),
        2 => (pick(MouseFlags::MIDDLEDOWN, MouseFlags::MIDDLEUP), 0),
        3 => (pick(MouseFlags::RIGHTDOWN, MouseFlags::RIGHTUP), 0),
        // wheel "buttons" only generate input on press
        4 if pressed => (MouseFlags::WHEEL, WHEEL_DELTA),
        5 if pressed => (MouseFlags::WHEEL, -WHEEL_DELTA),
        6 if pressed => (MouseFlags::HWHEEL, -WHEEL_DELTA),
        7 if pressed => (MouseFlags::HWHEEL, WHEEL_DELTA),
        8 => (pick(MouseFlags::XDOWN, MouseFlags::XUP), XBUTTON1),
        9 => (pick(MouseFlags::XDOWN, MouseFlags::XUP), XBUTTON2),
        _ => return None,
    };
    Some(mapped)
}

impl Core {
    pub(crate) fn handle_key(&mut self, p: &mut dyn Platform, hwnd: Hwnd, key: &KeyEvent) -> bool {
        if hwnd.is_null() {
            trace!(keycode = key.keycode, "key event without a window");
            return false;
        }
        p.send_input(
            hwnd,
            GuestInput::Key(KeyInput {
                keycode: key.keycode,
                pressed: key.pressed,
                time: key.time,
            }),
        );
        true
    }

    pub(crate) fn handle_button(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, button: &ButtonEvent) -> bool {
        let Some((flags, data)) = button_input(button.button, button.pressed) else {
            trace!(button = button.button, pressed = button.pressed, "ignoring button");
            return false;
        };
        self.send_mouse_input(p, hwnd, event.window, Point::new(button.x, button.y), flags, data, button.time)
    }

    pub(crate) fn handle_motion(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, motion: &MotionEvent) -> bool {
        if hwnd.is_null() && self.input.warp_fence.is_stale(event.serial) {
            trace!(x = motion.x, y = motion.y, serial = %event.serial, "motion before warp, ignoring");
            return false;
        }
        self.send_mouse_input(p, hwnd, event.window, Point::new(motion.x, motion.y), MouseFlags::MOVE, 0, motion.time)
    }

    pub(crate) fn handle_enter(&mut self, p: &mut dyn Platform, hwnd: Hwnd, event: &EventRecord, crossing: &CrossingEvent) -> bool {
        if crossing.detail == FocusDetail::Virtual {
            return false;
        }
        if hwnd.is_null() && self.input.warp_fence.is_stale(event.serial) {
            trace!(serial = %event.serial, "enter before warp, ignoring");
            return false;
        }
        self.send_mouse_input(
            p,
            hwnd,
            event.window,
            Point::new(crossing.x, crossing.y),
            MouseFlags::MOVE,
            0,
            crossing.time,
        )
    }

    pub(crate) fn handle_raw_motion(&mut self, p: &mut dyn Platform, serial: Serial, raw: &RawMotionEvent) -> bool {
        if self.config.pointer.broken_raw_events && self.input.warp_fence.is_stale(serial) {
            trace!(%serial, "raw motion before warp, ignoring");
            return false;
        }
        let virtual_screen = p.virtual_screen_rect();
        match self.input.raw.accumulate(raw, virtual_screen) {
            Accumulated::Motion { dx, dy } => {
                let (dx, dy) = p.coordinate_map().scale_delta(dx, dy);
                trace!(dx, dy, "raw motion");
                p.send_input(Hwnd::NULL, GuestInput::Mouse(MouseInput::relative(dx, dy, raw.time)));
                true
            }
            Accumulated::Pending | Accumulated::NotApplicable => false,
        }
    }

    pub(crate) fn handle_device_changed(&mut self, changed: &DeviceChangedEvent) -> bool {
        if self.input.raw.device_changed(changed) {
            debug!(device = ?changed.device, source = ?changed.source, "raw motion source switched");
            return true;
        }
        false
    }

    /// Queue a guest mouse event for a host pointer event at `pos`, relative
    /// to `window`.
    #[allow(clippy::too_many_arguments)]
    fn send_mouse_input(
        &mut self,
        p: &mut dyn Platform,
        hwnd: Hwnd,
        window: HostWindow,
        pos: Point,
        flags: MouseFlags,
        data: i32,
        time: Timestamp,
    ) -> bool {
        let now = p.tick_count();
        let interval = self.config.pointer.cursor_sync_interval_ms;
        let map = p.coordinate_map();

        if hwnd.is_null() {
            // only the capture surface of an active clip has no guest window
            let Some(region) = self.input.clip else {
                return false;
            };
            if self.input.capture_surface != Some(window) {
                return false;
            }
            let origin = map.user_to_real(region.rect.top_left());
            let pt = map.real_to_user(Point::new(origin.x + pos.x, origin.y + pos.y));
            if self.cursor.enter_window(region.capture_window, now, interval) {
                self.sync_window_cursor(p, window);
            }
            let mut input = MouseInput::absolute(pt.x, pt.y, flags, time);
            input.data = data;
            p.send_input(Hwnd::NULL, GuestInput::Mouse(input));
            return true;
        }

        let Some(info) = p.window_info(hwnd) else {
            return false;
        };
        let pt = if window == p.root_window() {
            map.from_root(pos)
        } else {
            Point::new(info.window_rect.left + pos.x, info.window_rect.top + pos.y)
        };

        if self.cursor.enter_window(hwnd, now, interval) {
            if let Some(host) = info.host_window {
                self.sync_window_cursor(p, host);
            }
        }

        if flags.intersects(MouseFlags::LEFTDOWN | MouseFlags::RIGHTDOWN) {
            let root = p.ancestor_root(hwnd);
            if !root.is_null() && root == p.foreground_window() {
                self.clip_fullscreen_window(p, root, false);
            }
        }

        let mut input = MouseInput::absolute(pt.x, pt.y, flags, time);
        input.data = data;
        p.send_input(hwnd, GuestInput::Mouse(input));
        true
    }

    /// Show the process-wide current cursor on `window`.
    pub(crate) fn sync_window_cursor(&mut self, p: &mut dyn Platform, window: HostWindow) {
        let native = self
            .cursor
            .last_cursor()
            .and_then(|cursor| self.realizer.realize_cursor(cursor));
        p.define_cursor(window, native);
    }

    /// Apply `cursor` to the host window behind `hwnd` (or the capture
    /// surface for the capture window).
    pub(crate) fn define_cursor(&mut self, p: &mut dyn Platform, hwnd: Hwnd, cursor: Option<CursorHandle>) {
        let window = if !hwnd.is_null() && hwnd == self.input.capture_window() {
            self.input.capture_surface
        } else {
            p.host_window(hwnd)
        };
        let Some(window) = window else {
            trace!(%hwnd, "no host window for cursor");
            return;
        };
        let native = cursor.and_then(|c| self.realizer.realize_cursor(c));
        trace!(%hwnd, %window, ?cursor, ?native, "defining cursor");
        p.define_cursor(window, native);
    }

    /// Guest selected a new cursor. The window under the pointer is told
    /// when the cursor changed or the sync interval elapsed.
    pub fn set_cursor(&mut self, p: &mut dyn Platform, cursor: Option<CursorHandle>) {
        let now = p.tick_count();
        if !self
            .cursor
            .set_cursor(cursor, now, self.config.pointer.cursor_sync_interval_ms)
        {
            return;
        }
        let target = self.cursor.cursor_window();
        if target.is_null() {
            return;
        }
        if let Err(e) = p.post_message(target, GuestMessage::SetCursor { cursor }) {
            trace!(%target, "cursor window is gone: {}", e);
        }
    }

    /// The guest destroyed a cursor resource.
    pub fn destroy_cursor(&mut self, cursor: CursorHandle) {
        trace!(?cursor, "forgetting cursor");
        self.realizer.forget(cursor);
    }

    /// Warp the host pointer to a guest position.
    pub fn set_cursor_pos(&mut self, p: &mut dyn Platform, x: i32, y: i32) -> bool {
        let root = p.coordinate_map().to_root(Point::new(x, y));
        let serial = p.next_request_serial();
        self.input.warp_fence.arm(serial);
        debug!(x, y, root_x = root.x, root_y = root.y, %serial, "warping pointer");
        p.warp_pointer(root);
        p.flush();
        true
    }

    /// Host pointer position in guest coordinates.
    pub fn get_cursor_pos(&mut self, p: &mut dyn Platform) -> Option<Point> {
        let root = p.query_pointer()?;
        Some(p.coordinate_map().from_root(root))
    }

    /// Switch raw motion on, probing the host the first time.
    pub(crate) fn enable_raw_input(&mut self, p: &mut dyn Platform) -> bool {
        match self.input.raw.status() {
            RawInputStatus::Enabled => true,
            RawInputStatus::Unavailable => false,
            RawInputStatus::Unknown | RawInputStatus::Disabled => match p.enable_raw_motion() {
                Some(session) => {
                    self.input.raw.enable(session);
                    true
                }
                None => {
                    self.input.raw.mark_unavailable();
                    false
                }
            }
        }
    }

    pub(crate) fn disable_raw_input(&mut self, p: &mut dyn Platform) {
        if self.input.raw.is_enabled() {
            p.disable_raw_motion();
            self.input.raw.disable();
        }
    }
}
