//! Roof/dome shutter state machine.

use crate::io::LimitSwitches;
use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ShutterState {
    Open,
    Closed,
    Opening,
    Closing,
    Error,
}

impl ShutterState {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Position implied by the limit switches, used whenever the shutter is not under command.
    pub fn from_switches(switches: LimitSwitches) -> Self {
        if switches.closed {
            Self::Closed
        } else if switches.open {
            Self::Open
        } else {
            Self::Error
        }
    }
}

/// Which relay, if any, is being driven.
///
/// A single value is held so that the open and close relays can never be requested together.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum Drive {
    #[default]
    Idle,
    Open,
    Close,
}

impl Drive {
    pub fn open_relay(&self) -> bool {
        *self == Self::Open
    }

    pub fn close_relay(&self) -> bool {
        *self == Self::Close
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum CompletionMode {
    /// Movement ends on the matching limit switch, the timeout is a stall guard.
    LimitSwitches,
    /// Movement ends once the timeout has elapsed.
    Timer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct MovementWindow {
    pub start: Instant,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum CommandError {
    /// The shutter is moving in the opposite direction.
    Conflict,
    /// The command came from a session that is not connected to the device.
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct ShutterSettings {
    pub mode: CompletionMode,
    pub timeout: Duration,
    /// Time the close relay stays on after the close switch confirms, limit switch mode only.
    pub extend_closing: Duration,
}

pub struct Shutter {
    settings: ShutterSettings,
    state: ShutterState,
    drive: Drive,
    window: Option<MovementWindow>,
    dwell_end: Option<Instant>,
}

impl Shutter {
    pub fn new(settings: ShutterSettings) -> Self {
        Self {
            settings,
            state: ShutterState::Error,
            drive: Drive::Idle,
            window: None,
            dwell_end: None,
        }
    }

    /// Sets the start-up position. Without limit switches the position is never known.
    pub fn begin(&mut self, switches: LimitSwitches) {
        self.state = match self.settings.mode {
            CompletionMode::LimitSwitches => ShutterState::from_switches(switches),
            CompletionMode::Timer => ShutterState::Error,
        };
        info!("Shutter starts {}", self.state.as_str());
    }

    pub fn settings(&self) -> &ShutterSettings {
        &self.settings
    }

    pub fn configure(&mut self, settings: ShutterSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> ShutterState {
        self.state
    }

    pub fn drive(&self) -> Drive {
        self.drive
    }

    pub fn window(&self) -> Option<MovementWindow> {
        self.window
    }

    pub fn is_moving(&self) -> bool {
        self.window.is_some()
    }

    pub fn open(&mut self, now: Instant) -> Result<(), CommandError> {
        match self.state {
            ShutterState::Closing => {
                warn!("Open rejected, shutter is closing");
                Err(CommandError::Conflict)
            }
            ShutterState::Opening => Ok(()),
            _ => {
                self.start(ShutterState::Opening, Drive::Open, now);
                Ok(())
            }
        }
    }

    pub fn close(&mut self, now: Instant) -> Result<(), CommandError> {
        match self.state {
            ShutterState::Opening => {
                warn!("Close rejected, shutter is opening");
                Err(CommandError::Conflict)
            }
            ShutterState::Closing => Ok(()),
            _ => {
                self.start(ShutterState::Closing, Drive::Close, now);
                Ok(())
            }
        }
    }

    pub fn abort(&mut self) {
        info!("Shutter aborted while {}", self.state.as_str());
        self.state = ShutterState::Error;
        self.drive = Drive::Idle;
        self.window = None;
        self.dwell_end = None;
    }

    /// Releases the relays. A movement in progress is aborted, a closing dwell just ends.
    pub fn halt(&mut self) {
        if self.is_moving() {
            self.abort();
        } else {
            self.drive = Drive::Idle;
            self.dwell_end = None;
        }
    }

    /// Re-reads the position from the switches while nothing is commanded.
    pub fn sync_position(&mut self, switches: LimitSwitches) {
        if self.is_moving() || self.settings.mode != CompletionMode::LimitSwitches {
            return;
        }

        let state = ShutterState::from_switches(switches);
        if state != self.state {
            info!("Shutter position now {}", state.as_str());
            self.state = state;
        }
    }

    /// Marks the position as unknown after the shutter was moved without supervision.
    pub fn invalidate_position(&mut self) {
        if !self.is_moving() && self.state != ShutterState::Error {
            info!("Shutter position lost");
            self.state = ShutterState::Error;
        }
    }

    pub fn tick(&mut self, now: Instant, switches: LimitSwitches) {
        if let Some(end) = self.dwell_end {
            if now >= end {
                debug!("Extended closing finished");
                self.dwell_end = None;
                self.drive = Drive::Idle;
            }
        }

        let Some(window) = self.window else {
            return;
        };

        match self.settings.mode {
            CompletionMode::LimitSwitches => {
                if self.state == ShutterState::Opening && switches.open {
                    self.finish(ShutterState::Open);
                } else if self.state == ShutterState::Closing && switches.closed {
                    self.finish(ShutterState::Closed);

                    if self.settings.extend_closing > Duration::from_ticks(0) {
                        self.drive = Drive::Close;
                        self.dwell_end = Some(now + self.settings.extend_closing);
                    }
                } else if now > window.deadline {
                    warn!("Shutter stalled while {}", self.state.as_str());
                    self.abort();
                }
            }
            CompletionMode::Timer => {
                if now > window.deadline {
                    match self.state {
                        ShutterState::Opening => self.finish(ShutterState::Open),
                        ShutterState::Closing => self.finish(ShutterState::Closed),
                        _ => {}
                    }
                }
            }
        }
    }

    fn start(&mut self, state: ShutterState, drive: Drive, now: Instant) {
        info!("Shutter {}", state.as_str());
        self.state = state;
        self.drive = drive;
        self.window = Some(MovementWindow {
            start: now,
            deadline: now + self.settings.timeout,
        });
        self.dwell_end = None;
    }

    fn finish(&mut self, state: ShutterState) {
        info!("Shutter {}", state.as_str());
        self.state = state;
        self.drive = Drive::Idle;
        self.window = None;
    }
}
