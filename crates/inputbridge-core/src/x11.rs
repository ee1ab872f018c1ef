//! Translation of x11rb events into [`EventRecord`]s.
//!
//! Only the fields the core consumes are carried over. Atoms are resolved
//! once into an [`AtomTable`]; 16-bit wire sequence numbers are widened
//! against the last serial seen.

use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xinput;
use x11rb::protocol::xproto::{self, Atom, ConnectionExt, NotifyDetail, NotifyMode, Property};
use x11rb::protocol::Event;

use crate::event::{
    AxisLabel, ButtonEvent, ChangeReason, ClientMessage, ClientMessageEvent, ConfigureEvent, CrossingEvent,
    DeviceChangedEvent, DeviceId, EventKind, EventRecord, ExposeEvent, ExtensionEvent, FocusDetail, FocusEvent,
    FocusMode, GravityEvent, HostWindow, KeyEvent, MotionEvent, PropertyAtom, PropertyEvent, PropertyState,
    RawMotionEvent, ReparentEvent, Serial, ValuatorInfo, ValuatorMode, Valuators, WmProtocol, XembedMessage,
};

/// Atoms the translation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomTable {
    pub wm_state: Atom,
    pub net_wm_state: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub net_wm_ping: Atom,
    pub xembed: Atom,
    pub rel_x: Atom,
    pub rel_y: Atom,
}

impl AtomTable {
    pub fn intern<C: Connection>(conn: &C) -> Result<Self, ReplyError> {
        let atom = |name: &[u8]| -> Result<Atom, ReplyError> { Ok(conn.intern_atom(false, name)?.reply()?.atom) };
        Ok(Self {
            wm_state: atom(b"WM_STATE")?,
            net_wm_state: atom(b"_NET_WM_STATE")?,
            wm_protocols: atom(b"WM_PROTOCOLS")?,
            wm_delete_window: atom(b"WM_DELETE_WINDOW")?,
            wm_take_focus: atom(b"WM_TAKE_FOCUS")?,
            net_wm_ping: atom(b"_NET_WM_PING")?,
            xembed: atom(b"_XEMBED")?,
            rel_x: atom(b"Rel X")?,
            rel_y: atom(b"Rel Y")?,
        })
    }

    fn property(&self, atom: Atom) -> PropertyAtom {
        if atom == self.wm_state {
            PropertyAtom::WmState
        } else if atom == self.net_wm_state {
            PropertyAtom::NetWmState
        } else {
            PropertyAtom::Other(atom)
        }
    }

    fn protocol(&self, atom: Atom) -> WmProtocol {
        if atom == self.wm_delete_window {
            WmProtocol::DeleteWindow
        } else if atom == self.wm_take_focus {
            WmProtocol::TakeFocus
        } else if atom == self.net_wm_ping {
            WmProtocol::Ping
        } else {
            WmProtocol::Other(atom)
        }
    }

    fn axis_label(&self, atom: Atom) -> AxisLabel {
        if atom == self.rel_x {
            AxisLabel::RelX
        } else if atom == self.rel_y {
            AxisLabel::RelY
        } else if atom == x11rb::NONE {
            AxisLabel::Unlabelled
        } else {
            AxisLabel::Other
        }
    }
}

/// Widens 16-bit wire sequence numbers into full serials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceWidener {
    last: u64,
}

impl SequenceWidener {
    pub const fn new(last: u64) -> Self {
        Self { last }
    }

    /// Full serial for `sequence`, taking the value closest to the last one
    /// seen.
    pub fn widen(&mut self, sequence: u16) -> Serial {
        let mut full = (self.last & !0xffff) | u64::from(sequence);
        if full + 0x8000 < self.last {
            full += 0x1_0000;
        } else if full > self.last + 0x8000 && full >= 0x1_0000 {
            full -= 0x1_0000;
        }
        self.last = self.last.max(full);
        Serial(full)
    }
}

fn fp3232(value: xinput::Fp3232) -> f64 {
    f64::from(value.integral) + f64::from(value.frac) / 4_294_967_296.0
}

fn focus_detail(detail: NotifyDetail) -> FocusDetail {
    match detail {
        NotifyDetail::ANCESTOR => FocusDetail::Ancestor,
        NotifyDetail::VIRTUAL => FocusDetail::Virtual,
        NotifyDetail::INFERIOR => FocusDetail::Inferior,
        NotifyDetail::NONLINEAR => FocusDetail::Nonlinear,
        NotifyDetail::NONLINEAR_VIRTUAL => FocusDetail::NonlinearVirtual,
        NotifyDetail::POINTER => FocusDetail::Pointer,
        NotifyDetail::POINTER_ROOT => FocusDetail::PointerRoot,
        _ => FocusDetail::None,
    }
}

fn focus_mode(mode: NotifyMode) -> FocusMode {
    match mode {
        NotifyMode::GRAB => FocusMode::Grab,
        NotifyMode::UNGRAB => FocusMode::Ungrab,
        NotifyMode::WHILE_GRABBED => FocusMode::WhileGrabbed,
        _ => FocusMode::Normal,
    }
}

fn raw_valuators(mask: &[u32], values: &[xinput::Fp3232]) -> Valuators {
    let mut values = values.iter().copied();
    let mut axes = Vec::new();
    for (word, bits) in mask.iter().enumerate() {
        for bit in 0..32u16 {
            if bits & (1 << bit) == 0 {
                continue;
            }
            let Some(value) = values.next() else {
                return Valuators::from_axes(&axes);
            };
            axes.push((word as u16 * 32 + bit, fp3232(value)));
        }
    }
    Valuators::from_axes(&axes)
}

fn device_changed(atoms: &AtomTable, e: &xinput::DeviceChangedEvent) -> DeviceChangedEvent {
    let valuators = e
        .classes
        .iter()
        .filter_map(|class| match &class.data {
            xinput::DeviceClassData::Valuator(v) => Some(ValuatorInfo {
                number: v.number,
                label: atoms.axis_label(v.label),
                min: fp3232(v.min),
                max: fp3232(v.max),
                mode: if v.mode == xinput::ValuatorMode::RELATIVE {
                    ValuatorMode::Relative
                } else {
                    ValuatorMode::Absolute
                },
            }),
            _ => None,
        })
        .collect();
    DeviceChangedEvent {
        device: DeviceId(e.deviceid),
        source: DeviceId(e.sourceid),
        reason: if e.reason == xinput::ChangeReason::SLAVE_SWITCH {
            ChangeReason::SlaveSwitch
        } else {
            ChangeReason::DeviceChange
        },
        valuators,
    }
}

fn client_message(atoms: &AtomTable, e: &xproto::ClientMessageEvent) -> ClientMessageEvent {
    let data = e.data.as_data32();
    let message = if e.type_ == atoms.wm_protocols {
        ClientMessage::WmProtocols {
            protocol: atoms.protocol(data[0]),
            time: data[1],
        }
    } else if e.type_ == atoms.xembed {
        ClientMessage::Xembed {
            message: XembedMessage::from_opcode(data[1]),
            time: data[0],
        }
    } else {
        ClientMessage::Other { message_type: e.type_ }
    };
    ClientMessageEvent {
        format: e.format,
        message,
        data,
    }
}

/// Translate one x11rb event. Events the core does not consume yield `None`.
pub fn translate(event: &Event, atoms: &AtomTable, sequences: &mut SequenceWidener) -> Option<EventRecord> {
    let (sequence, window, kind) = match event {
        Event::KeyPress(e) | Event::KeyRelease(e) => (
            e.sequence,
            e.event,
            EventKind::Key(KeyEvent {
                pressed: matches!(event, Event::KeyPress(_)),
                keycode: e.detail,
                state: u16::from(e.state),
                time: e.time,
            }),
        ),
        Event::ButtonPress(e) | Event::ButtonRelease(e) => (
            e.sequence,
            e.event,
            EventKind::Button(ButtonEvent {
                pressed: matches!(event, Event::ButtonPress(_)),
                button: e.detail,
                x: i32::from(e.event_x),
                y: i32::from(e.event_y),
                state: u16::from(e.state),
                time: e.time,
            }),
        ),
        Event::MotionNotify(e) => (
            e.sequence,
            e.event,
            EventKind::Motion(MotionEvent {
                x: i32::from(e.event_x),
                y: i32::from(e.event_y),
                state: u16::from(e.state),
                time: e.time,
            }),
        ),
        Event::EnterNotify(e) | Event::LeaveNotify(e) => {
            let crossing = CrossingEvent {
                x: i32::from(e.event_x),
                y: i32::from(e.event_y),
                detail: focus_detail(e.detail),
                state: u16::from(e.state),
                time: e.time,
            };
            let kind = if matches!(event, Event::EnterNotify(_)) {
                EventKind::Enter(crossing)
            } else {
                EventKind::Leave(crossing)
            };
            (e.sequence, e.event, kind)
        }
        Event::FocusIn(e) | Event::FocusOut(e) => {
            let focus = FocusEvent {
                detail: focus_detail(e.detail),
                mode: focus_mode(e.mode),
            };
            let kind = if matches!(event, Event::FocusIn(_)) {
                EventKind::FocusIn(focus)
            } else {
                EventKind::FocusOut(focus)
            };
            (e.sequence, e.event, kind)
        }
        Event::Expose(e) => (
            e.sequence,
            e.window,
            EventKind::Expose(ExposeEvent {
                x: i32::from(e.x),
                y: i32::from(e.y),
                width: u32::from(e.width),
                height: u32::from(e.height),
            }),
        ),
        Event::MapNotify(e) => (e.sequence, e.window, EventKind::Map),
        Event::UnmapNotify(e) => (e.sequence, e.window, EventKind::Unmap),
        Event::DestroyNotify(e) => (e.sequence, e.window, EventKind::Destroy),
        Event::ReparentNotify(e) => (
            e.sequence,
            e.window,
            EventKind::Reparent(ReparentEvent {
                parent: HostWindow(e.parent),
                x: i32::from(e.x),
                y: i32::from(e.y),
            }),
        ),
        Event::ConfigureNotify(e) => (
            e.sequence,
            e.window,
            EventKind::Configure(ConfigureEvent {
                x: i32::from(e.x),
                y: i32::from(e.y),
                width: u32::from(e.width),
                height: u32::from(e.height),
            }),
        ),
        Event::GravityNotify(e) => (
            e.sequence,
            e.window,
            EventKind::Gravity(GravityEvent {
                x: i32::from(e.x),
                y: i32::from(e.y),
            }),
        ),
        Event::PropertyNotify(e) => (
            e.sequence,
            e.window,
            EventKind::Property(PropertyEvent {
                atom: atoms.property(e.atom),
                state: if e.state == Property::NEW_VALUE {
                    PropertyState::NewValue
                } else {
                    PropertyState::Deleted
                },
                time: e.time,
            }),
        ),
        Event::ClientMessage(e) => (e.sequence, e.window, EventKind::ClientMessage(client_message(atoms, e))),
        Event::XinputRawMotion(e) => (
            e.sequence,
            x11rb::NONE,
            EventKind::Generic(ExtensionEvent::RawMotion(Box::new(RawMotionEvent {
                device: DeviceId(e.deviceid),
                time: e.time,
                valuators: raw_valuators(&e.valuator_mask, &e.axisvalues_raw),
            }))),
        ),
        Event::XinputDeviceChanged(e) => (
            e.sequence,
            x11rb::NONE,
            EventKind::Generic(ExtensionEvent::DeviceChanged(Box::new(device_changed(atoms, e)))),
        ),
        _ => return None,
    };

    let mut record = EventRecord::new(sequences.widen(sequence), HostWindow(window), kind);
    record.send_event = event.sent_event();
    Some(record)
}
