//! Trace replay
//!
//! A trace is a JSON-lines file. Each line is one [`TraceStep`]: a host event
//! to queue, a drain of the queue, a guest call into the core, or a change to
//! the simulated guest window system. Blank lines and lines starting with `#`
//! are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use inputbridge_core::config::Config;
use inputbridge_core::cursor::CursorHandle;
use inputbridge_core::dispatch::QueueMask;
use inputbridge_core::event::{EventKind, EventRecord, HostWindow, Serial};
use inputbridge_core::geometry::Rect;
use inputbridge_core::host::GuestShell;
use inputbridge_core::message::GuestMessage;
use inputbridge_core::sim::SimPlatform;
use inputbridge_core::window::{Hwnd, ThreadId, WindowInfo};
use inputbridge_core::wm_state::WmState;
use inputbridge_core::{ClipState, Core};

/// One line of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceStep {
    /// Queue a host event. Without a serial the event carries the serial of
    /// the last host request.
    Event {
        window: HostWindow,
        #[serde(default)]
        serial: Option<Serial>,
        #[serde(default)]
        send_event: bool,
        kind: EventKind,
    },
    /// Drain the host queue.
    Process {
        #[serde(default)]
        mask: Option<QueueMask>,
    },
    /// Add a guest window.
    Window {
        info: WindowInfo,
        #[serde(default)]
        wm_state: Option<WmState>,
    },
    /// Change what the window manager reports in `WM_STATE`.
    WmState { hwnd: Hwnd, state: Option<WmState> },
    ClipCursor { rect: Option<Rect> },
    SetCursorPos { x: i32, y: i32 },
    SetCursor { cursor: Option<CursorHandle> },
    Foreground { hwnd: Hwnd },
    /// Deliver a message exchanged between cores.
    DriverMessage { hwnd: Hwnd, message: GuestMessage },
    /// Let time pass.
    Advance { ms: u64 },
}

/// Parse one trace line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<TraceStep>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let step = serde_json::from_str(line)?;
    Ok(Some(step))
}

/// What a replay produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub steps: usize,
    pub guest_messages: usize,
    pub guest_inputs: usize,
    pub host_requests: usize,
    pub clip_state: Option<ClipState>,
}

/// A core for one guest thread running against the simulated platform.
pub struct Replay {
    platform: SimPlatform,
    core: Core,
    summary: ReplaySummary,
}

impl Replay {
    pub fn new(config: Config, screen: Rect) -> Self {
        Self {
            platform: SimPlatform::new(screen),
            core: Core::new(config),
            summary: ReplaySummary::default(),
        }
    }

    pub fn apply(&mut self, step: TraceStep) {
        debug!(?step, "trace step");
        let p = &mut self.platform;
        match step {
            TraceStep::Event {
                window,
                serial,
                send_event,
                kind,
            } => {
                let mut record = EventRecord::new(serial.unwrap_or_else(|| p.last_serial()), window, kind);
                record.send_event = send_event;
                p.push_record(record);
            }
            TraceStep::Process { mask } => {
                let queued = self.core.process_events(p, mask.unwrap_or(QueueMask::ALLINPUT));
                debug!(queued, "processed");
            }
            TraceStep::Window { info, wm_state } => {
                let hwnd = info.hwnd;
                p.add_window(info);
                p.set_wm_state(hwnd, wm_state);
            }
            TraceStep::WmState { hwnd, state } => p.set_wm_state(hwnd, state),
            TraceStep::ClipCursor { rect } => {
                self.core.clip_cursor(p, rect);
            }
            TraceStep::SetCursorPos { x, y } => {
                self.core.set_cursor_pos(p, x, y);
            }
            TraceStep::SetCursor { cursor } => self.core.set_cursor(p, cursor),
            TraceStep::Foreground { hwnd } => p.set_foreground(hwnd),
            TraceStep::DriverMessage { hwnd, message } => {
                let reply = self.core.handle_driver_message(p, hwnd, message);
                info!(%hwnd, ?message, ?reply, "driver message");
            }
            TraceStep::Advance { ms } => p.advance(ms),
        }
        self.summary.steps += 1;
        self.deliver_own_messages();
        self.log_effects();
    }

    /// Driver messages addressed to windows of this thread are handled right
    /// away; everything else only gets logged.
    fn deliver_own_messages(&mut self) {
        let thread: ThreadId = self.platform.current_thread();
        loop {
            let own: Vec<_> = self
                .platform
                .messages
                .iter()
                .filter(|d| d.message.is_driver_message() && self.platform.thread_of(d.hwnd) == Some(thread))
                .copied()
                .collect();
            if own.is_empty() {
                return;
            }
            self.platform.messages.retain(|d| !own.contains(d));
            for delivered in own {
                self.core
                    .handle_driver_message(&mut self.platform, delivered.hwnd, delivered.message);
            }
        }
    }

    fn log_effects(&mut self) {
        for delivered in self.platform.take_messages() {
            self.summary.guest_messages += 1;
            info!(hwnd = %delivered.hwnd, message = ?delivered.message, sync = delivered.sync, "guest message");
        }
        for (hwnd, input) in self.platform.take_inputs() {
            self.summary.guest_inputs += 1;
            info!(%hwnd, ?input, "guest input");
        }
        for request in self.platform.take_requests() {
            self.summary.host_requests += 1;
            info!(?request, "host request");
        }
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn finish(mut self) -> ReplaySummary {
        if let Err(e) = self.core.validate(&self.platform) {
            warn!("Core state inconsistent after replay: {}", e);
        }
        self.summary.clip_state = Some(self.core.clip_state());
        self.summary
    }
}

/// Replay every step of the trace at `path`.
pub fn run(path: &Path, config: Config, screen: Rect) -> Result<ReplaySummary> {
    let file = File::open(path).with_context(|| format!("Failed to open trace: {path:?}"))?;
    let mut replay = Replay::new(config, screen);

    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read trace: {path:?}"))?;
        let step = parse_line(&line).with_context(|| format!("Invalid trace step on line {}", number + 1))?;
        if let Some(step) = step {
            replay.apply(step);
        }
    }

    info!(steps = replay.summary.steps, "trace replayed");
    debug!(core = ?replay.core(), "final core state");
    Ok(replay.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inputbridge_core::sim::DESKTOP;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

    #[test]
    fn test_comments_and_blanks_skipped() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   # a comment").unwrap().is_none());
        assert!(parse_line("{\"op\":\"bogus\"}").is_err());
    }

    #[test]
    fn test_parse_guest_calls() {
        let step = parse_line(r#"{"op":"clip_cursor","rect":{"left":0,"top":0,"right":800,"bottom":600}}"#).unwrap();
        assert_eq!(
            step,
            Some(TraceStep::ClipCursor {
                rect: Some(Rect::new(0, 0, 800, 600)),
            })
        );
        let step = parse_line(r#"{"op":"advance","ms":250}"#).unwrap();
        assert_eq!(step, Some(TraceStep::Advance { ms: 250 }));
    }

    #[test]
    fn test_replay_clip_and_release() {
        let mut replay = Replay::new(Config::default(), SCREEN);
        replay.apply(TraceStep::ClipCursor {
            rect: Some(Rect::new(0, 0, 800, 600)),
        });
        assert_eq!(replay.core().clip_state(), ClipState::ClippingExplicit);
        replay.apply(TraceStep::ClipCursor { rect: None });

        let summary = replay.finish();
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.clip_state, Some(ClipState::Unclipped));
        // clip owner notifications to the desktop, one per transition
        assert_eq!(summary.guest_messages, 2);
        assert!(summary.host_requests > 0);
    }

    #[test]
    fn test_own_cursor_message_is_delivered() {
        let mut replay = Replay::new(Config::default(), SCREEN);
        replay.apply(TraceStep::ClipCursor {
            rect: Some(Rect::new(0, 0, 800, 600)),
        });
        replay.apply(TraceStep::SetCursor {
            cursor: Some(CursorHandle(3)),
        });
        // the SetCursor message went to our own capture window and was
        // consumed instead of logged
        assert_eq!(replay.summary.guest_messages, 1);
        assert!(replay.platform.messages_to(DESKTOP).is_empty());
    }

    #[test]
    fn test_run_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# clip, then drain the queue").unwrap();
        writeln!(
            file,
            r#"{{"op":"clip_cursor","rect":{{"left":0,"top":0,"right":800,"bottom":600}}}}"#
        )
        .unwrap();
        writeln!(file, r#"{{"op":"process"}}"#).unwrap();
        writeln!(file).unwrap();

        let summary = run(file.path(), Config::default(), SCREEN).unwrap();
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.clip_state, Some(ClipState::ClippingExplicit));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"op":"advance","ms":1}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        let err = run(file.path(), Config::default(), SCREEN).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
