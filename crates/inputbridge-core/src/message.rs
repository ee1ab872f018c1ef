//! Guest window messages and synthesized guest input.
//!
//! Everything the core asks of the guest window system goes through
//! [`MessageSink`](crate::host::MessageSink) as one of these values.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::cursor::CursorHandle;
use crate::event::Timestamp;
use crate::geometry::Rect;
use crate::window::Hwnd;

/// System commands, as sent by a window's system menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SysCommand {
    Minimize,
    Maximize,
    Restore,
    Close,
}

/// Hit-test code carried by a mouse-activate probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitTest {
    /// Click on the close button (window manager close request).
    Close,
    /// Click on the menu bar (take-focus request).
    Menu,
}

/// Messages the core posts or sends to guest windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum GuestMessage {
    SysCommand { command: SysCommand },
    Close,
    CancelMode,
    /// Pre-activation probe; answered with [`MessageReply::Activate`].
    MouseActivate { top: Hwnd, hit: HitTest },
    /// To the desktop: the clip owner changed from `from` to `to`
    /// (`to` null when `from` stopped clipping).
    ClipCursorNotify { from: Hwnd, to: Hwnd },
    /// To a capture window: its clip was taken over or broken externally.
    ClipCursorReset,
    /// To the foreground window: reapply the current clip rectangle.
    ClipCursorRequest,
    /// Drop any pointer grab held by the receiver.
    ReleaseCursor,
    /// To the cursor window: show this cursor.
    SetCursor { cursor: Option<CursorHandle> },
    /// To the desktop: which capture window owns the clip right now.
    QueryClipOwner,
    EnableWindow { enable: bool },
    Redraw { rect: Rect },
}

impl GuestMessage {
    pub const fn syscommand(command: SysCommand) -> Self {
        Self::SysCommand { command }
    }

    /// Messages consumed by the core itself rather than by guest window procs.
    pub const fn is_driver_message(&self) -> bool {
        matches!(
            self,
            Self::ClipCursorNotify { .. }
                | Self::ClipCursorReset
                | Self::ClipCursorRequest
                | Self::ReleaseCursor
                | Self::SetCursor { .. }
                | Self::QueryClipOwner
        )
    }
}

/// Reply to a mouse-activate probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseActivate {
    #[default]
    Activate,
    ActivateAndEat,
    NoActivate,
    NoActivateAndEat,
}

impl MouseActivate {
    /// The window refuses to become active.
    pub const fn refuses_activation(self) -> bool {
        matches!(self, Self::NoActivate | Self::NoActivateAndEat)
    }

    /// The click itself should be swallowed.
    pub const fn eats_click(self) -> bool {
        matches!(self, Self::ActivateAndEat | Self::NoActivateAndEat)
    }
}

/// Result of a synchronously delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageReply {
    #[default]
    Default,
    Handled(bool),
    Activate(MouseActivate),
    ClipOwner(Hwnd),
}

impl MessageReply {
    pub const fn activation(self) -> MouseActivate {
        match self {
            Self::Activate(ma) => ma,
            _ => MouseActivate::Activate,
        }
    }

    pub const fn clip_owner(self) -> Hwnd {
        match self {
            Self::ClipOwner(owner) => owner,
            _ => Hwnd::NULL,
        }
    }
}

/// Message delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("message to {hwnd} timed out after {timeout_ms} ms")]
    Timeout { hwnd: Hwnd, timeout_ms: u64 },

    #[error("window {0} no longer exists")]
    InvalidWindow(Hwnd),
}

bitflags! {
    /// Mouse input flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MouseFlags: u32 {
        const MOVE        = 0x0001;
        const LEFTDOWN    = 0x0002;
        const LEFTUP      = 0x0004;
        const RIGHTDOWN   = 0x0008;
        const RIGHTUP     = 0x0010;
        const MIDDLEDOWN  = 0x0020;
        const MIDDLEUP    = 0x0040;
        const XDOWN       = 0x0080;
        const XUP         = 0x0100;
        const WHEEL       = 0x0800;
        const HWHEEL      = 0x1000;
        const ABSOLUTE    = 0x8000;
    }
}

/// One wheel notch.
pub const WHEEL_DELTA: i32 = 120;
pub const XBUTTON1: i32 = 1;
pub const XBUTTON2: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseInput {
    pub dx: i32,
    pub dy: i32,
    /// Wheel delta or X button number, depending on flags.
    #[serde(default)]
    pub data: i32,
    pub flags: MouseFlags,
    #[serde(default)]
    pub time: Timestamp,
}

impl MouseInput {
    pub const fn absolute(x: i32, y: i32, flags: MouseFlags, time: Timestamp) -> Self {
        Self {
            dx: x,
            dy: y,
            data: 0,
            flags: MouseFlags::from_bits_retain(flags.bits() | MouseFlags::ABSOLUTE.bits()),
            time,
        }
    }

    pub const fn relative(dx: i32, dy: i32, time: Timestamp) -> Self {
        Self {
            dx,
            dy,
            data: 0,
            flags: MouseFlags::MOVE,
            time,
        }
    }

    pub const fn is_absolute(&self) -> bool {
        self.flags.contains(MouseFlags::ABSOLUTE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub keycode: u8,
    pub pressed: bool,
    #[serde(default)]
    pub time: Timestamp,
}

/// Synthesized guest input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum GuestInput {
    Mouse(MouseInput),
    Key(KeyInput),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_reply() {
        assert!(MessageReply::Activate(MouseActivate::NoActivate)
            .activation()
            .refuses_activation());
        assert!(!MessageReply::Default.activation().refuses_activation());
        assert!(MouseActivate::NoActivateAndEat.eats_click());
    }

    #[test]
    fn test_absolute_sets_flag() {
        let input = MouseInput::absolute(3, 4, MouseFlags::MOVE, 0);
        assert!(input.is_absolute());
        assert!(input.flags.contains(MouseFlags::MOVE));
        assert!(!MouseInput::relative(1, 1, 0).is_absolute());
    }
}
