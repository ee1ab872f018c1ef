//! Merging of consecutive host events.
//!
//! The drain loop keeps one buffered event and asks [`merge`] what to do with
//! each newly read one. Geometry and motion events are snapshots, so only the
//! latest of a run matters; raw motion deltas are additive and get summed.

use tracing::trace;

use crate::event::{EventKind, EventRecord, ExtensionEvent, Valuators};

/// What to do with the buffered (`prev`) and the new (`next`) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Drop `prev`, buffer `next`.
    Discard,
    /// Handle `prev`, buffer `next`.
    Handle,
    /// Handle `next` now, keep `prev` buffered for further merging.
    Keep,
    /// Drop `next`, keep `prev` buffered.
    Ignore,
}

/// Thread state the merge rules depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeContext {
    /// The application only consumes raw input; motion and raw events must
    /// not be reordered or combined.
    pub raw_only: bool,
    /// A pointer warp fence is armed.
    pub warp_pending: bool,
}

/// Decide how `next` combines with the buffered `prev`. May fold raw motion
/// deltas into whichever of the two survives.
pub fn merge(prev: &mut EventRecord, next: &mut EventRecord, ctx: MergeContext) -> MergeAction {
    match (&mut prev.kind, &mut next.kind) {
        (EventKind::Configure(_), EventKind::Configure(_)) if prev.window == next.window => {
            trace!(window = %prev.window, "discarding duplicate ConfigureNotify");
            MergeAction::Discard
        }
        (EventKind::Configure(_), EventKind::Expose(_) | EventKind::Property(_)) => {
            MergeAction::Keep
        }
        (EventKind::Motion(_), EventKind::Motion(_)) if prev.window == next.window => {
            trace!(window = %prev.window, "discarding duplicate MotionNotify");
            MergeAction::Discard
        }
        (EventKind::Motion(_), EventKind::Generic(ExtensionEvent::RawMotion(_)))
            if !ctx.raw_only && !ctx.warp_pending =>
        {
            MergeAction::Keep
        }
        (
            EventKind::Generic(ExtensionEvent::RawMotion(p)),
            EventKind::Generic(ExtensionEvent::RawMotion(n)),
        ) if !ctx.raw_only && !ctx.warp_pending => {
            merge_raw_valuators(&mut p.valuators, &mut n.valuators)
        }
        _ => MergeAction::Handle,
    }
}

fn merge_raw_valuators(prev: &mut Valuators, next: &mut Valuators) -> MergeAction {
    if prev.is_empty() || next.is_empty() {
        return MergeAction::Handle;
    }
    let union = prev.mask | next.mask;
    if union == next.mask {
        add_into(next, prev);
        trace!("merging duplicate raw motion into newer event");
        return MergeAction::Discard;
    }
    if union == prev.mask {
        add_into(prev, next);
        trace!("merging duplicate raw motion into older event");
        return MergeAction::Ignore;
    }
    MergeAction::Handle
}

/// Add every axis of `from` onto `into`. `from.mask` must be a subset of
/// `into.mask`.
fn add_into(into: &mut Valuators, from: &Valuators) {
    let mut slot = 0usize;
    let mut src = from.values.iter();
    for axis in 0..Valuators::MAX_AXES {
        let in_into = into.is_set(axis);
        if from.is_set(axis) {
            if let (Some(v), Some(dst)) = (src.next(), into.values.get_mut(slot)) {
                *dst += *v;
            }
        }
        if in_into {
            slot += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const A: HostWindow = HostWindow(0x100);
    const B: HostWindow = HostWindow(0x200);

    fn rec(serial: u64, window: HostWindow, kind: EventKind) -> EventRecord {
        EventRecord::new(Serial(serial), window, kind)
    }

    fn raw(axes: &[(u16, f64)]) -> EventKind {
        EventKind::Generic(ExtensionEvent::RawMotion(Box::new(RawMotionEvent {
            device: DeviceId(9),
            time: 0,
            valuators: Valuators::from_axes(axes),
        })))
    }

    fn configure(x: i32) -> EventKind {
        EventKind::Configure(ConfigureEvent {
            x,
            y: 0,
            width: 100,
            height: 100,
        })
    }

    fn motion(x: i32) -> EventKind {
        EventKind::Motion(MotionEvent {
            x,
            y: 0,
            state: 0,
            time: 0,
        })
    }

    /// One representative event per tag.
    fn sample(tag: EventTag) -> EventKind {
        let focus = FocusEvent {
            detail: FocusDetail::Nonlinear,
            mode: FocusMode::Normal,
        };
        let crossing = CrossingEvent {
            x: 0,
            y: 0,
            detail: FocusDetail::Nonlinear,
            state: 0,
            time: 0,
        };
        match tag {
            EventTag::Key => EventKind::Key(KeyEvent {
                pressed: true,
                keycode: 38,
                state: 0,
                time: 0,
            }),
            EventTag::Button => EventKind::Button(ButtonEvent {
                pressed: true,
                button: 1,
                x: 0,
                y: 0,
                state: 0,
                time: 0,
            }),
            EventTag::Motion => motion(1),
            EventTag::Enter => EventKind::Enter(crossing),
            EventTag::Leave => EventKind::Leave(crossing),
            EventTag::FocusIn => EventKind::FocusIn(focus),
            EventTag::FocusOut => EventKind::FocusOut(focus),
            EventTag::Expose => EventKind::Expose(ExposeEvent {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            }),
            EventTag::Map => EventKind::Map,
            EventTag::Unmap => EventKind::Unmap,
            EventTag::Destroy => EventKind::Destroy,
            EventTag::Reparent => EventKind::Reparent(ReparentEvent {
                parent: B,
                x: 0,
                y: 0,
            }),
            EventTag::Configure => configure(1),
            EventTag::Gravity => EventKind::Gravity(GravityEvent { x: 0, y: 0 }),
            EventTag::Property => EventKind::Property(PropertyEvent {
                atom: PropertyAtom::WmState,
                state: PropertyState::NewValue,
                time: 0,
            }),
            EventTag::ClientMessage => EventKind::ClientMessage(ClientMessageEvent {
                format: 32,
                message: ClientMessage::WmProtocols {
                    protocol: WmProtocol::Ping,
                    time: 0,
                },
                data: [0; 5],
            }),
            EventTag::RawMotion => raw(&[(0, 1.0)]),
            EventTag::DeviceChanged => {
                EventKind::Generic(ExtensionEvent::DeviceChanged(Box::new(DeviceChangedEvent {
                    device: DeviceId(2),
                    source: DeviceId(9),
                    reason: ChangeReason::SlaveSwitch,
                    valuators: vec![],
                })))
            }
            EventTag::Extension => EventKind::Generic(ExtensionEvent::Unknown {
                extension: 140,
                evtype: 3,
            }),
        }
    }

    fn expected(prev: EventTag, next: EventTag) -> MergeAction {
        match (prev, next) {
            (EventTag::Configure, EventTag::Configure)
            | (EventTag::Motion, EventTag::Motion)
            | (EventTag::RawMotion, EventTag::RawMotion) => MergeAction::Discard,
            (EventTag::Configure, EventTag::Expose | EventTag::Property)
            | (EventTag::Motion, EventTag::RawMotion) => MergeAction::Keep,
            _ => MergeAction::Handle,
        }
    }

    #[test]
    fn test_every_kind_pair_same_window() {
        for prev_tag in EventTag::ALL {
            for next_tag in EventTag::ALL {
                let mut prev = rec(1, A, sample(prev_tag));
                let mut next = rec(2, A, sample(next_tag));
                let action = merge(&mut prev, &mut next, MergeContext::default());
                assert_eq!(
                    action,
                    expected(prev_tag, next_tag),
                    "{prev_tag} followed by {next_tag}"
                );
            }
        }
    }

    #[test]
    fn test_every_kind_pair_other_window() {
        for prev_tag in EventTag::ALL {
            for next_tag in EventTag::ALL {
                let mut prev = rec(1, A, sample(prev_tag));
                let mut next = rec(2, B, sample(next_tag));
                let action = merge(&mut prev, &mut next, MergeContext::default());
                let want = match (prev_tag, next_tag) {
                    (EventTag::Configure, EventTag::Configure)
                    | (EventTag::Motion, EventTag::Motion) => MergeAction::Handle,
                    pair => expected(pair.0, pair.1),
                };
                assert_eq!(action, want, "{prev_tag} followed by {next_tag} on another window");
            }
        }
    }

    #[test]
    fn test_raw_only_and_warp_disable_raw_rules() {
        for ctx in [
            MergeContext {
                raw_only: true,
                warp_pending: false,
            },
            MergeContext {
                raw_only: false,
                warp_pending: true,
            },
        ] {
            let mut prev = rec(1, A, motion(1));
            let mut next = rec(2, A, raw(&[(0, 1.0)]));
            assert_eq!(merge(&mut prev, &mut next, ctx), MergeAction::Handle);

            let mut prev = rec(1, A, raw(&[(0, 1.0)]));
            let mut next = rec(2, A, raw(&[(0, 1.0)]));
            assert_eq!(merge(&mut prev, &mut next, ctx), MergeAction::Handle);

            // snapshot rules are unaffected
            let mut prev = rec(1, A, motion(1));
            let mut next = rec(2, A, motion(2));
            assert_eq!(merge(&mut prev, &mut next, ctx), MergeAction::Discard);
        }
    }

    #[test]
    fn test_raw_same_axis_sums() {
        let mut prev = rec(1, A, raw(&[(0, 2.0)]));
        let mut next = rec(2, A, raw(&[(0, 3.0)]));
        assert_eq!(
            merge(&mut prev, &mut next, MergeContext::default()),
            MergeAction::Discard
        );
        let merged = next.kind.as_raw_motion().map(|r| r.valuators.clone());
        assert_eq!(merged, Some(Valuators::from_axes(&[(0, 5.0)])));
    }

    #[test]
    fn test_raw_superset_kept_on_prev() {
        let mut prev = rec(1, A, raw(&[(0, 1.0), (1, 2.0)]));
        let mut next = rec(2, A, raw(&[(1, 0.5)]));
        assert_eq!(
            merge(&mut prev, &mut next, MergeContext::default()),
            MergeAction::Ignore
        );
        let merged = prev.kind.as_raw_motion().map(|r| r.valuators.clone());
        assert_eq!(merged, Some(Valuators::from_axes(&[(0, 1.0), (1, 2.5)])));
    }

    #[test]
    fn test_raw_superset_kept_on_next() {
        let mut prev = rec(1, A, raw(&[(1, 4.0)]));
        let mut next = rec(2, A, raw(&[(0, 1.0), (1, 2.0), (3, 7.0)]));
        assert_eq!(
            merge(&mut prev, &mut next, MergeContext::default()),
            MergeAction::Discard
        );
        let merged = next.kind.as_raw_motion().map(|r| r.valuators.clone());
        assert_eq!(
            merged,
            Some(Valuators::from_axes(&[(0, 1.0), (1, 6.0), (3, 7.0)]))
        );
    }

    #[test]
    fn test_raw_empty_mask_not_merged() {
        let mut prev = rec(1, A, raw(&[]));
        let mut next = rec(2, A, raw(&[(0, 1.0)]));
        assert_eq!(
            merge(&mut prev, &mut next, MergeContext::default()),
            MergeAction::Handle
        );
    }

    /// Run the drain-loop bookkeeping over a batch and return what would be
    /// handled, in order.
    fn drain(events: Vec<EventRecord>, ctx: MergeContext) -> Vec<EventRecord> {
        let mut handled = Vec::new();
        let mut buffered: Option<EventRecord> = None;
        for mut next in events {
            let Some(mut prev) = buffered.take() else {
                buffered = Some(next);
                continue;
            };
            match merge(&mut prev, &mut next, ctx) {
                MergeAction::Handle => {
                    handled.push(prev);
                    buffered = Some(next);
                }
                MergeAction::Discard => buffered = Some(next),
                MergeAction::Keep => {
                    handled.push(next);
                    buffered = Some(prev);
                }
                MergeAction::Ignore => buffered = Some(prev),
            }
        }
        handled.extend(buffered);
        handled
    }

    proptest! {
        #[test]
        fn prop_configure_run_keeps_only_last(xs in prop::collection::vec(-500i32..500, 1..30)) {
            let last = *xs.last().unwrap_or(&0);
            let events: Vec<_> = xs
                .iter()
                .enumerate()
                .map(|(i, x)| rec(i as u64, A, configure(*x)))
                .collect();
            let out = drain(events, MergeContext::default());
            prop_assert_eq!(out.len(), 1);
            prop_assert_eq!(&out[0].kind, &configure(last));
        }

        #[test]
        fn prop_disjoint_raw_masks_never_merge(
            a in 1u32..0xffff,
            pick in 1u32..=0xffff,
        ) {
            // b takes bits from the complement of a only
            let rest = !a & 0xffff;
            let b = if pick & rest == 0 { rest } else { pick & rest };
            let axes = |mask: u32, base: f64| -> Vec<(u16, f64)> {
                (0u16..16).filter(|i| mask & (1 << i) != 0).map(|i| (i, base + f64::from(i))).collect()
            };
            let first = rec(1, A, raw(&axes(a, 1.0)));
            let second = rec(2, A, raw(&axes(b, 100.0)));
            let out = drain(vec![first.clone(), second.clone()], MergeContext::default());
            prop_assert_eq!(out, vec![first, second]);
        }

        #[test]
        fn prop_raw_merge_preserves_total(
            deltas in prop::collection::vec(-10.0f64..10.0, 1..20),
        ) {
            let total: f64 = deltas.iter().sum();
            let events: Vec<_> = deltas
                .iter()
                .enumerate()
                .map(|(i, d)| rec(i as u64, A, raw(&[(0, *d)])))
                .collect();
            let out = drain(events, MergeContext::default());
            prop_assert_eq!(out.len(), 1);
            let merged = out[0].kind.as_raw_motion().and_then(|r| r.valuators.get(0)).unwrap_or(f64::NAN);
            prop_assert!((merged - total).abs() < 1e-9);
        }
    }
}
