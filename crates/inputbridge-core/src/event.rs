//! Host display-server event records.
//!
//! Backends translate protocol events (X11 core events, XInput2 cookies)
//! into [`EventRecord`]s. The core never sees protocol handles beyond the
//! opaque [`HostWindow`] id and the request [`Serial`].

use serde::{Deserialize, Serialize};

pub use crate::fence::Serial;
use crate::geometry::Rect;

/// Opaque host window id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostWindow(pub u32);

impl HostWindow {
    pub const NONE: Self = Self(0);

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for HostWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "xwin:{:#x}", self.0)
    }
}

/// Host timestamp in milliseconds.
pub type Timestamp = u32;

/// Input device id as reported by the host input extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u16);

/// One host event, as read from the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub serial: Serial,
    pub window: HostWindow,
    /// Generated by a client rather than the server.
    #[serde(default)]
    pub send_event: bool,
    pub kind: EventKind,
}

impl EventRecord {
    pub const fn new(serial: Serial, window: HostWindow, kind: EventKind) -> Self {
        Self {
            serial,
            window,
            send_event: false,
            kind,
        }
    }

    pub const fn tag(&self) -> EventTag {
        self.kind.tag()
    }
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    Key(KeyEvent),
    Button(ButtonEvent),
    Motion(MotionEvent),
    Enter(CrossingEvent),
    Leave(CrossingEvent),
    FocusIn(FocusEvent),
    FocusOut(FocusEvent),
    Expose(ExposeEvent),
    Map,
    Unmap,
    Destroy,
    Reparent(ReparentEvent),
    Configure(ConfigureEvent),
    Gravity(GravityEvent),
    Property(PropertyEvent),
    ClientMessage(ClientMessageEvent),
    /// Extension (generic) event. The payload is released on drop.
    Generic(ExtensionEvent),
}

impl EventKind {
    pub const fn tag(&self) -> EventTag {
        match self {
            Self::Key(_) => EventTag::Key,
            Self::Button(_) => EventTag::Button,
            Self::Motion(_) => EventTag::Motion,
            Self::Enter(_) => EventTag::Enter,
            Self::Leave(_) => EventTag::Leave,
            Self::FocusIn(_) => EventTag::FocusIn,
            Self::FocusOut(_) => EventTag::FocusOut,
            Self::Expose(_) => EventTag::Expose,
            Self::Map => EventTag::Map,
            Self::Unmap => EventTag::Unmap,
            Self::Destroy => EventTag::Destroy,
            Self::Reparent(_) => EventTag::Reparent,
            Self::Configure(_) => EventTag::Configure,
            Self::Gravity(_) => EventTag::Gravity,
            Self::Property(_) => EventTag::Property,
            Self::ClientMessage(_) => EventTag::ClientMessage,
            Self::Generic(ExtensionEvent::RawMotion(_)) => EventTag::RawMotion,
            Self::Generic(ExtensionEvent::DeviceChanged(_)) => EventTag::DeviceChanged,
            Self::Generic(_) => EventTag::Extension,
        }
    }

    pub const fn as_raw_motion(&self) -> Option<&RawMotionEvent> {
        match self {
            Self::Generic(ExtensionEvent::RawMotion(raw)) => Some(raw),
            _ => None,
        }
    }
}

/// Fieldless discriminant of [`EventKind`], used for logging, filtering and
/// the re-entrancy guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTag {
    Key,
    Button,
    Motion,
    Enter,
    Leave,
    FocusIn,
    FocusOut,
    Expose,
    Map,
    Unmap,
    Destroy,
    Reparent,
    Configure,
    Gravity,
    Property,
    ClientMessage,
    RawMotion,
    DeviceChanged,
    Extension,
}

impl EventTag {
    pub const ALL: [Self; 19] = [
        Self::Key,
        Self::Button,
        Self::Motion,
        Self::Enter,
        Self::Leave,
        Self::FocusIn,
        Self::FocusOut,
        Self::Expose,
        Self::Map,
        Self::Unmap,
        Self::Destroy,
        Self::Reparent,
        Self::Configure,
        Self::Gravity,
        Self::Property,
        Self::ClientMessage,
        Self::RawMotion,
        Self::DeviceChanged,
        Self::Extension,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Key => "Key",
            Self::Button => "Button",
            Self::Motion => "MotionNotify",
            Self::Enter => "EnterNotify",
            Self::Leave => "LeaveNotify",
            Self::FocusIn => "FocusIn",
            Self::FocusOut => "FocusOut",
            Self::Expose => "Expose",
            Self::Map => "MapNotify",
            Self::Unmap => "UnmapNotify",
            Self::Destroy => "DestroyNotify",
            Self::Reparent => "ReparentNotify",
            Self::Configure => "ConfigureNotify",
            Self::Gravity => "GravityNotify",
            Self::Property => "PropertyNotify",
            Self::ClientMessage => "ClientMessage",
            Self::RawMotion => "RawMotion",
            Self::DeviceChanged => "DeviceChanged",
            Self::Extension => "GenericEvent",
        }
    }
}

impl std::fmt::Display for EventTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host pointer button state bits carried in `state` fields.
pub const BUTTON_STATE_MASK: u16 = 0x1f00 | 0x6000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub pressed: bool,
    pub keycode: u8,
    #[serde(default)]
    pub state: u16,
    #[serde(default)]
    pub time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub pressed: bool,
    /// 1-based host button number.
    pub button: u8,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub state: u16,
    #[serde(default)]
    pub time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub state: u16,
    #[serde(default)]
    pub time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub x: i32,
    pub y: i32,
    pub detail: FocusDetail,
    #[serde(default)]
    pub state: u16,
    #[serde(default)]
    pub time: Timestamp,
}

/// Which windows a focus or crossing change involves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusDetail {
    Ancestor,
    Virtual,
    Inferior,
    Nonlinear,
    NonlinearVirtual,
    /// The change only reflects the pointer crossing, not keyboard focus.
    Pointer,
    PointerRoot,
    None,
}

/// Why a focus change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    Normal,
    /// Side effect of the host's own keyboard grab (e.g. a WM popup).
    Grab,
    Ungrab,
    WhileGrabbed,
}

impl FocusMode {
    pub const fn is_grab_side_channel(self) -> bool {
        matches!(self, Self::Grab | Self::Ungrab)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusEvent {
    pub detail: FocusDetail,
    pub mode: FocusMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposeEvent {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ExposeEvent {
    pub const fn rect(&self) -> Rect {
        Rect::from_origin_size(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReparentEvent {
    pub parent: HostWindow,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureEvent {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GravityEvent {
    pub x: i32,
    pub y: i32,
}

/// Properties the core reacts to. Backends map atoms onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyAtom {
    /// ICCCM `WM_STATE`.
    WmState,
    /// EWMH `_NET_WM_STATE`.
    NetWmState,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyState {
    NewValue,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEvent {
    pub atom: PropertyAtom,
    pub state: PropertyState,
    #[serde(default)]
    pub time: Timestamp,
}

/// `WM_PROTOCOLS` sub-protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WmProtocol {
    DeleteWindow,
    TakeFocus,
    Ping,
    Other(u32),
}

/// XEmbed opcodes the core reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XembedMessage {
    EmbeddedNotify,
    WindowDeactivate,
    FocusOut,
    ModalityOn,
    ModalityOff,
    Other(u32),
}

impl XembedMessage {
    pub const fn from_opcode(op: u32) -> Self {
        match op {
            0 => Self::EmbeddedNotify,
            2 => Self::WindowDeactivate,
            6 => Self::FocusOut,
            10 => Self::ModalityOn,
            11 => Self::ModalityOff,
            other => Self::Other(other),
        }
    }
}

/// Decoded client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    WmProtocols { protocol: WmProtocol, time: Timestamp },
    Xembed { message: XembedMessage, time: Timestamp },
    Other { message_type: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessageEvent {
    /// Data format in bits; only 32 is understood.
    pub format: u8,
    pub message: ClientMessage,
    /// Undecoded data words, kept for echoing (ping replies).
    #[serde(default)]
    pub data: [u32; 5],
}

/// Extension events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "evtype", content = "payload", rename_all = "snake_case")]
pub enum ExtensionEvent {
    RawMotion(Box<RawMotionEvent>),
    DeviceChanged(Box<DeviceChangedEvent>),
    /// Payload could not be retrieved from the host.
    Missing,
    Unknown { extension: u8, evtype: u16 },
}

/// Valuator values for the axes set in `mask`, in ascending axis order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Valuators {
    pub mask: u32,
    pub values: Vec<f64>,
}

impl Valuators {
    pub const MAX_AXES: u16 = 32;

    /// Build from `(axis, value)` pairs; later duplicates overwrite.
    pub fn from_axes(axes: &[(u16, f64)]) -> Self {
        let mut sorted: Vec<(u16, f64)> = axes
            .iter()
            .copied()
            .filter(|(axis, _)| *axis < Self::MAX_AXES)
            .collect();
        sorted.sort_by_key(|(axis, _)| *axis);
        sorted.dedup_by(|later, earlier| {
            if later.0 == earlier.0 {
                earlier.1 = later.1;
                true
            } else {
                false
            }
        });
        let mask = sorted.iter().fold(0u32, |m, (axis, _)| m | (1 << axis));
        Self {
            mask,
            values: sorted.into_iter().map(|(_, v)| v).collect(),
        }
    }

    pub const fn is_set(&self, axis: u16) -> bool {
        axis < Self::MAX_AXES && self.mask & (1 << axis) != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Value of `axis`, if present.
    pub fn get(&self, axis: u16) -> Option<f64> {
        if !self.is_set(axis) {
            return None;
        }
        let below = self.mask & ((1u32 << axis) - 1);
        self.values.get(below.count_ones() as usize).copied()
    }

    /// Iterate `(axis, value)` pairs in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, f64)> + '_ {
        (0..Self::MAX_AXES)
            .filter(|axis| self.is_set(*axis))
            .zip(self.values.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMotionEvent {
    pub device: DeviceId,
    #[serde(default)]
    pub time: Timestamp,
    pub valuators: Valuators,
}

/// Axis identity as labelled by the host input extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisLabel {
    RelX,
    RelY,
    Other,
    Unlabelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuatorMode {
    Relative,
    Absolute,
}

/// One valuator class of an input device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuatorInfo {
    pub number: u16,
    pub label: AxisLabel,
    pub min: f64,
    pub max: f64,
    pub mode: ValuatorMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    /// The master pointer is now driven by a different physical device.
    SlaveSwitch,
    DeviceChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChangedEvent {
    pub device: DeviceId,
    pub source: DeviceId,
    pub reason: ChangeReason,
    pub valuators: Vec<ValuatorInfo>,
}
