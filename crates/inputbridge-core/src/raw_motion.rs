//! Raw relative motion accumulation.
//!
//! High-resolution relative deltas arrive as floating-point valuator values.
//! The accumulator keeps the fractional remainder per axis so that slow
//! motion adds up instead of being truncated away event by event.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::event::{
    AxisLabel, ChangeReason, DeviceChangedEvent, DeviceId, RawMotionEvent, ValuatorInfo,
    ValuatorMode,
};
use crate::geometry::Rect;

/// How a device is attached in the host input hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceUse {
    MasterPointer,
    MasterKeyboard,
    SlavePointer,
    SlaveKeyboard,
    Floating,
}

/// One entry of the host device list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub device_use: DeviceUse,
    /// Master device for slaves, paired master for masters.
    pub attachment: DeviceId,
    #[serde(default)]
    pub valuators: Vec<ValuatorInfo>,
}

/// What the host reports when raw motion is switched on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInputSession {
    pub core_pointer: DeviceId,
    /// Device list snapshot, used to find the initial source device.
    pub devices: Vec<DeviceInfo>,
}

impl RawInputSession {
    fn device(&self, id: DeviceId) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.id == id)
    }
}

/// Raw input availability on this thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawInputStatus {
    /// Not probed yet.
    #[default]
    Unknown,
    /// Probed and missing; never retried.
    Unavailable,
    Disabled,
    Enabled,
}

/// Calibration of one relative axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    pub number: u16,
    pub min: f64,
    pub max: f64,
}

impl AxisCalibration {
    fn scale(&self, value: f64, extent: i32) -> f64 {
        if self.min < self.max {
            value * f64::from(extent) / (self.max - self.min)
        } else {
            value
        }
    }
}

/// Outcome of feeding one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulated {
    /// No relative axes are calibrated, or the event is not ours.
    NotApplicable,
    /// Absorbed into the remainder; nothing to emit yet.
    Pending,
    Motion { dx: i32, dy: i32 },
}

/// Per-thread raw motion state.
#[derive(Debug, Clone, Default)]
pub struct RawMotionAccumulator {
    x: Option<AxisCalibration>,
    y: Option<AxisCalibration>,
    accum_x: f64,
    accum_y: f64,
    status: RawInputStatus,
    core_pointer: Option<DeviceId>,
    current_source: Option<DeviceId>,
    devices: Vec<DeviceInfo>,
}

impl RawMotionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn status(&self) -> RawInputStatus {
        self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.status == RawInputStatus::Enabled
    }

    pub const fn x_axis(&self) -> Option<AxisCalibration> {
        self.x
    }

    pub const fn y_axis(&self) -> Option<AxisCalibration> {
        self.y
    }

    pub const fn remainder(&self) -> (f64, f64) {
        (self.accum_x, self.accum_y)
    }

    pub const fn current_source(&self) -> Option<DeviceId> {
        self.current_source
    }

    /// Both relative axes are known.
    pub const fn is_calibrated(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    /// Resolve the relative X/Y axes from a device's valuator classes and
    /// reset the remainders.
    pub fn calibrate(&mut self, valuators: &[ValuatorInfo]) {
        self.x = None;
        self.y = None;
        self.accum_x = 0.0;
        self.accum_y = 0.0;

        for v in valuators {
            let unlabelled_rel =
                v.label == AxisLabel::Unlabelled && v.mode == ValuatorMode::Relative;
            let slot = if v.label == AxisLabel::RelX || (unlabelled_rel && v.number == 0) {
                &mut self.x
            } else if v.label == AxisLabel::RelY || (unlabelled_rel && v.number == 1) {
                &mut self.y
            } else {
                continue;
            };
            *slot = Some(AxisCalibration {
                number: v.number,
                min: v.min,
                max: v.max,
            });
        }
        debug!(x = ?self.x, y = ?self.y, "raw motion axes calibrated");
    }

    /// The host could not provide raw motion.
    pub fn mark_unavailable(&mut self) {
        if self.status != RawInputStatus::Unavailable {
            warn!("raw relative motion not available on this host");
        }
        self.status = RawInputStatus::Unavailable;
    }

    /// Start a raw input session.
    pub fn enable(&mut self, session: RawInputSession) {
        match session.device(session.core_pointer) {
            Some(pointer) => self.calibrate(&pointer.valuators),
            None => self.calibrate(&[]),
        }
        self.core_pointer = Some(session.core_pointer);
        self.current_source = None;
        self.devices = session.devices;
        self.status = RawInputStatus::Enabled;
        debug!(core_pointer = ?self.core_pointer, "raw motion enabled");
    }

    /// End the session and forget all calibration.
    pub fn disable(&mut self) {
        if self.status != RawInputStatus::Enabled {
            return;
        }
        trace!("raw motion disabled");
        self.status = RawInputStatus::Disabled;
        self.x = None;
        self.y = None;
        self.accum_x = 0.0;
        self.accum_y = 0.0;
        self.devices.clear();
        self.core_pointer = None;
        self.current_source = None;
    }

    /// Apply a device-changed notification. Returns true when it switched
    /// the source device of the core pointer.
    pub fn device_changed(&mut self, event: &DeviceChangedEvent) -> bool {
        if Some(event.device) != self.core_pointer {
            return false;
        }
        if event.reason != ChangeReason::SlaveSwitch {
            return false;
        }
        self.calibrate(&event.valuators);
        self.current_source = Some(event.source);
        true
    }

    /// Whether raw events from `device` drive the core pointer. Without a
    /// known source, the device list snapshot is consulted once.
    fn accepts(&mut self, device: DeviceId) -> bool {
        if self.current_source.is_none() {
            let core = self.core_pointer;
            let attached = self.devices.iter().any(|d| {
                d.device_use == DeviceUse::SlavePointer
                    && d.id == device
                    && Some(d.attachment) == core
            });
            if attached {
                self.current_source = Some(device);
            }
        }
        self.current_source == Some(device)
    }

    /// Feed one raw motion event. `virtual_screen` is used to rescale
    /// bounded axes.
    pub fn accumulate(&mut self, event: &RawMotionEvent, virtual_screen: Rect) -> Accumulated {
        let (Some(x_axis), Some(y_axis)) = (self.x, self.y) else {
            return Accumulated::NotApplicable;
        };
        if event.valuators.is_empty() || !self.is_enabled() {
            return Accumulated::NotApplicable;
        }
        if !self.accepts(event.device) {
            trace!(device = ?event.device, "raw motion from foreign device");
            return Accumulated::NotApplicable;
        }

        let mut dx = 0.0;
        let mut dy = 0.0;
        for (axis, value) in event.valuators.iter() {
            if axis == x_axis.number {
                dx = x_axis.scale(value, virtual_screen.width());
            }
            if axis == y_axis.number {
                dy = y_axis.scale(value, virtual_screen.height());
            }
        }

        self.accum_x += dx;
        self.accum_y += dy;
        if self.accum_x.abs() < 1.0 && self.accum_y.abs() < 1.0 {
            trace!(
                dx,
                dy,
                accum_x = self.accum_x,
                accum_y = self.accum_y,
                "accumulating raw motion"
            );
            return Accumulated::Pending;
        }

        let out_x = self.accum_x.trunc();
        let out_y = self.accum_y.trunc();
        self.accum_x -= out_x;
        self.accum_y -= out_y;
        Accumulated::Motion {
            dx: out_x as i32,
            dy: out_y as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Valuators;
    use proptest::prelude::*;

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

    fn rel(number: u16, label: AxisLabel) -> ValuatorInfo {
        ValuatorInfo {
            number,
            label,
            min: -1.0,
            max: -1.0,
            mode: ValuatorMode::Relative,
        }
    }

    fn session() -> RawInputSession {
        RawInputSession {
            core_pointer: DeviceId(2),
            devices: vec![
                DeviceInfo {
                    id: DeviceId(2),
                    device_use: DeviceUse::MasterPointer,
                    attachment: DeviceId(3),
                    valuators: vec![rel(0, AxisLabel::RelX), rel(1, AxisLabel::RelY)],
                },
                DeviceInfo {
                    id: DeviceId(9),
                    device_use: DeviceUse::SlavePointer,
                    attachment: DeviceId(2),
                    valuators: vec![],
                },
            ],
        }
    }

    fn raw(device: u16, axes: &[(u16, f64)]) -> RawMotionEvent {
        RawMotionEvent {
            device: DeviceId(device),
            time: 0,
            valuators: Valuators::from_axes(axes),
        }
    }

    fn enabled() -> RawMotionAccumulator {
        let mut acc = RawMotionAccumulator::new();
        acc.enable(session());
        acc
    }

    #[test]
    fn test_sub_unit_motion_is_carried() {
        let mut acc = enabled();
        assert_eq!(acc.accumulate(&raw(9, &[(0, 0.4)]), SCREEN), Accumulated::Pending);
        assert_eq!(acc.accumulate(&raw(9, &[(0, 0.4)]), SCREEN), Accumulated::Pending);
        assert_eq!(
            acc.accumulate(&raw(9, &[(0, 0.4), (1, -0.2)]), SCREEN),
            Accumulated::Motion { dx: 1, dy: 0 }
        );
        let (rx, ry) = acc.remainder();
        assert!((rx - 0.2).abs() < 1e-9);
        assert!((ry + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_negative_motion_truncates_toward_zero() {
        let mut acc = enabled();
        assert_eq!(
            acc.accumulate(&raw(9, &[(0, -2.7), (1, 1.5)]), SCREEN),
            Accumulated::Motion { dx: -2, dy: 1 }
        );
    }

    #[test]
    fn test_uncalibrated_is_not_applicable() {
        let mut acc = RawMotionAccumulator::new();
        acc.enable(RawInputSession {
            core_pointer: DeviceId(2),
            devices: vec![],
        });
        assert_eq!(acc.accumulate(&raw(9, &[(0, 5.0)]), SCREEN), Accumulated::NotApplicable);
    }

    #[test]
    fn test_foreign_device_ignored() {
        let mut acc = enabled();
        assert_eq!(acc.accumulate(&raw(11, &[(0, 5.0)]), SCREEN), Accumulated::NotApplicable);
        assert_eq!(acc.current_source(), None);
        assert_eq!(
            acc.accumulate(&raw(9, &[(0, 5.0)]), SCREEN),
            Accumulated::Motion { dx: 5, dy: 0 }
        );
        assert_eq!(acc.current_source(), Some(DeviceId(9)));
    }

    #[test]
    fn test_bounded_axis_is_rescaled() {
        let mut acc = RawMotionAccumulator::new();
        acc.enable(RawInputSession {
            core_pointer: DeviceId(2),
            devices: vec![DeviceInfo {
                id: DeviceId(2),
                device_use: DeviceUse::MasterPointer,
                attachment: DeviceId(3),
                valuators: vec![
                    ValuatorInfo {
                        number: 0,
                        label: AxisLabel::RelX,
                        min: 0.0,
                        max: 960.0,
                        mode: ValuatorMode::Relative,
                    },
                    rel(1, AxisLabel::RelY),
                ],
            }],
        });
        acc.device_changed(&DeviceChangedEvent {
            device: DeviceId(2),
            source: DeviceId(9),
            reason: ChangeReason::SlaveSwitch,
            valuators: vec![
                ValuatorInfo {
                    number: 0,
                    label: AxisLabel::RelX,
                    min: 0.0,
                    max: 960.0,
                    mode: ValuatorMode::Relative,
                },
                rel(1, AxisLabel::RelY),
            ],
        });
        assert_eq!(
            acc.accumulate(&raw(9, &[(0, 3.0)]), SCREEN),
            Accumulated::Motion { dx: 6, dy: 0 }
        );
    }

    #[test]
    fn test_slave_switch_recalibrates() {
        let mut acc = enabled();
        acc.accumulate(&raw(9, &[(0, 0.5)]), SCREEN);
        let switched = acc.device_changed(&DeviceChangedEvent {
            device: DeviceId(2),
            source: DeviceId(12),
            reason: ChangeReason::SlaveSwitch,
            valuators: vec![rel(2, AxisLabel::RelX), rel(3, AxisLabel::RelY)],
        });
        assert!(switched);
        assert_eq!(acc.remainder(), (0.0, 0.0));
        assert_eq!(acc.x_axis().map(|a| a.number), Some(2));
        assert_eq!(
            acc.accumulate(&raw(12, &[(2, 1.0), (3, 2.0)]), SCREEN),
            Accumulated::Motion { dx: 1, dy: 2 }
        );
    }

    #[test]
    fn test_device_change_for_other_device_ignored() {
        let mut acc = enabled();
        assert!(!acc.device_changed(&DeviceChangedEvent {
            device: DeviceId(5),
            source: DeviceId(12),
            reason: ChangeReason::SlaveSwitch,
            valuators: vec![],
        }));
        assert!(!acc.device_changed(&DeviceChangedEvent {
            device: DeviceId(2),
            source: DeviceId(12),
            reason: ChangeReason::DeviceChange,
            valuators: vec![],
        }));
        assert!(acc.is_calibrated());
    }

    #[test]
    fn test_unlabelled_relative_axes() {
        let mut acc = RawMotionAccumulator::new();
        acc.calibrate(&[
            rel(0, AxisLabel::Unlabelled),
            rel(1, AxisLabel::Unlabelled),
            ValuatorInfo {
                number: 2,
                label: AxisLabel::Unlabelled,
                min: 0.0,
                max: 1.0,
                mode: ValuatorMode::Absolute,
            },
        ]);
        assert!(acc.is_calibrated());
    }

    #[test]
    fn test_disable_forgets_everything() {
        let mut acc = enabled();
        acc.accumulate(&raw(9, &[(0, 0.5)]), SCREEN);
        acc.disable();
        assert_eq!(acc.status(), RawInputStatus::Disabled);
        assert!(!acc.is_calibrated());
        assert_eq!(acc.remainder(), (0.0, 0.0));
    }

    proptest! {
        #[test]
        fn prop_emitted_motion_tracks_true_sum(
            deltas in prop::collection::vec((-0.99f64..0.99, -0.99f64..0.99), 1..400)
        ) {
            let mut acc = enabled();
            let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
            let (mut out_x, mut out_y) = (0i64, 0i64);
            for (dx, dy) in deltas {
                sum_x += dx;
                sum_y += dy;
                if let Accumulated::Motion { dx, dy } = acc.accumulate(&raw(9, &[(0, dx), (1, dy)]), SCREEN) {
                    out_x += i64::from(dx);
                    out_y += i64::from(dy);
                }
            }
            prop_assert!((sum_x - out_x as f64).abs() < 1.0 + 1e-6);
            prop_assert!((sum_y - out_y as f64).abs() < 1.0 + 1e-6);
        }
    }
}
