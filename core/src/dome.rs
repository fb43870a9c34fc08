//! Roll-off roof / dome device.
//!
//! A connected client has sole authority over the shutter. With no client connected the local
//! open and close buttons drive the relays directly for as long as they are held.

use crate::{
    config::validate_range,
    device::Device,
    io::{LimitSwitches, ManualButtons},
    shutter::{CommandError, CompletionMode, Drive, Shutter, ShutterSettings, ShutterState},
};
use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct DomeConfiguration {
    #[serde(rename = "Use limit switches")]
    pub use_limit_switches: bool,

    /// Seconds
    #[serde(rename = "Shutter timeout")]
    pub shutter_timeout: u16,

    /// Seconds
    #[serde(rename = "Extend closing")]
    pub extend_closing: u16,
}

impl Default for DomeConfiguration {
    fn default() -> Self {
        Self {
            use_limit_switches: true,
            shutter_timeout: 60,
            extend_closing: 0,
        }
    }
}

impl DomeConfiguration {
    pub fn validated(self) -> Self {
        let default = Self::default();

        Self {
            use_limit_switches: self.use_limit_switches,
            shutter_timeout: validate_range(
                "Shutter timeout",
                self.shutter_timeout,
                5,
                600,
                default.shutter_timeout,
            ),
            extend_closing: validate_range(
                "Extend closing",
                self.extend_closing,
                0,
                30,
                default.extend_closing,
            ),
        }
    }

    fn shutter_settings(&self) -> ShutterSettings {
        ShutterSettings {
            mode: if self.use_limit_switches {
                CompletionMode::LimitSwitches
            } else {
                CompletionMode::Timer
            },
            timeout: Duration::from_secs(self.shutter_timeout.into()),
            extend_closing: Duration::from_secs(self.extend_closing.into()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DomeInputs {
    pub switches: LimitSwitches,
    pub buttons: ManualButtons,
    /// A client is connected to the dome.
    pub remote_control: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct DomeStatus {
    pub shutter: ShutterState,
    pub slewing: bool,
    pub drive: Drive,
}

/// Relay request from the hold-to-run buttons.
///
/// A button does nothing while the opposite one is also held or the travel is already at its
/// limit.
pub fn manual_drive(buttons: ManualButtons, switches: LimitSwitches) -> Drive {
    if buttons.close && !buttons.open && !switches.closed {
        Drive::Close
    } else if buttons.open && !buttons.close && !switches.open {
        Drive::Open
    } else {
        Drive::Idle
    }
}

pub struct Dome {
    config: DomeConfiguration,
    shutter: Shutter,
    manual: Drive,
    /// Completion mode changed, the position is re-derived once the shutter is idle.
    resync: bool,
}

impl Dome {
    pub fn new(config: DomeConfiguration) -> Self {
        let config = config.validated();
        let shutter = Shutter::new(config.shutter_settings());

        Self {
            config,
            shutter,
            manual: Drive::Idle,
            resync: false,
        }
    }

    pub fn open(&mut self, now: Instant) -> Result<(), CommandError> {
        self.shutter.open(now)
    }

    pub fn close(&mut self, now: Instant) -> Result<(), CommandError> {
        self.shutter.close(now)
    }

    pub fn abort(&mut self) {
        self.shutter.abort();
    }

    pub fn shutter(&self) -> &Shutter {
        &self.shutter
    }

    /// The relay request to put on the outputs this cycle.
    pub fn drive(&self) -> Drive {
        match self.shutter.drive() {
            Drive::Idle => self.manual,
            drive => drive,
        }
    }

    fn resync_position(&mut self, switches: LimitSwitches) {
        if !self.resync || self.shutter.is_moving() {
            return;
        }
        self.resync = false;

        match self.shutter.settings().mode {
            CompletionMode::LimitSwitches => self.shutter.sync_position(switches),
            CompletionMode::Timer => self.shutter.invalidate_position(),
        }
    }

    fn manual_control(&mut self, inputs: &DomeInputs) {
        if self.shutter.drive() != Drive::Idle {
            warn!("Remote control lost with shutter {}, halting", self.shutter.state().as_str());
            self.shutter.halt();
        }

        let manual = manual_drive(inputs.buttons, inputs.switches);
        if manual != self.manual {
            info!("Manual drive {:?}", manual);
            self.manual = manual;
        }

        match self.shutter.settings().mode {
            CompletionMode::LimitSwitches => self.shutter.sync_position(inputs.switches),
            CompletionMode::Timer => {
                if self.manual != Drive::Idle {
                    self.shutter.invalidate_position();
                }
            }
        }
    }
}

impl Device for Dome {
    type Inputs = DomeInputs;
    type Configuration = DomeConfiguration;
    type Status = DomeStatus;

    fn begin(&mut self, _now: Instant, inputs: &Self::Inputs) {
        info!(
            "Dome: limit switches {}, timeout {}s, extend closing {}s",
            self.config.use_limit_switches,
            self.config.shutter_timeout,
            self.config.extend_closing
        );
        self.shutter.begin(inputs.switches);
    }

    fn tick(&mut self, now: Instant, inputs: &Self::Inputs) {
        self.shutter.tick(now, inputs.switches);
        self.resync_position(inputs.switches);

        if inputs.remote_control {
            if self.manual != Drive::Idle {
                info!("Manual drive released, client connected");
                self.manual = Drive::Idle;
            }
        } else {
            self.manual_control(inputs);
        }
    }

    fn read_configuration(&mut self, config: Self::Configuration) {
        let config = config.validated();
        if config.use_limit_switches != self.config.use_limit_switches {
            self.resync = true;
        }
        self.config = config;
        self.shutter.configure(self.config.shutter_settings());
        info!("Dome configuration updated");
    }

    fn write_configuration(&self) -> Self::Configuration {
        self.config.clone()
    }

    fn status(&self) -> Self::Status {
        DomeStatus {
            shutter: self.shutter.state(),
            slewing: self.shutter.is_moving(),
            drive: self.drive(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn inputs(
        open_switch: bool,
        closed_switch: bool,
        open_button: bool,
        close_button: bool,
        remote_control: bool,
    ) -> DomeInputs {
        DomeInputs {
            switches: LimitSwitches {
                open: open_switch,
                closed: closed_switch,
            },
            buttons: ManualButtons {
                open: open_button,
                close: close_button,
            },
            remote_control,
        }
    }

    #[test]
    fn manual_drive_resolution() {
        let none = LimitSwitches::default();
        let at_open = LimitSwitches {
            open: true,
            closed: false,
        };
        let at_closed = LimitSwitches {
            open: false,
            closed: true,
        };
        let open = ManualButtons {
            open: true,
            close: false,
        };
        let close = ManualButtons {
            open: false,
            close: true,
        };
        let both = ManualButtons {
            open: true,
            close: true,
        };

        assert_eq!(manual_drive(ManualButtons::default(), none), Drive::Idle);
        assert_eq!(manual_drive(open, none), Drive::Open);
        assert_eq!(manual_drive(close, none), Drive::Close);
        assert_eq!(manual_drive(both, none), Drive::Idle);
        assert_eq!(manual_drive(open, at_open), Drive::Idle);
        assert_eq!(manual_drive(close, at_closed), Drive::Idle);
        assert_eq!(manual_drive(open, at_closed), Drive::Open);
    }

    #[test]
    fn buttons_ignored_with_client() {
        let mut dome = Dome::new(DomeConfiguration::default());
        dome.begin(at(0), &inputs(false, true, false, false, true));

        for (i, (open, close)) in [(true, false), (false, true), (true, true), (false, false)]
            .into_iter()
            .enumerate()
        {
            dome.tick(at(i as u64 * 200), &inputs(false, true, open, close, true));
            assert_eq!(dome.drive(), Drive::Idle);
            assert_eq!(dome.status().shutter, ShutterState::Closed);
        }
    }

    #[test]
    fn buttons_drive_without_client() {
        let mut dome = Dome::new(DomeConfiguration::default());
        dome.begin(at(0), &inputs(false, true, false, false, false));

        dome.tick(at(200), &inputs(false, true, true, false, false));
        assert_eq!(dome.drive(), Drive::Open);

        // Released
        dome.tick(at(400), &inputs(false, false, false, false, false));
        assert_eq!(dome.drive(), Drive::Idle);
        assert_eq!(dome.status().shutter, ShutterState::Error);

        dome.tick(at(600), &inputs(false, false, true, false, false));
        dome.tick(at(800), &inputs(true, false, true, false, false));
        assert_eq!(dome.drive(), Drive::Idle);
        assert_eq!(dome.status().shutter, ShutterState::Open);
    }

    #[test]
    fn manual_move_in_timer_mode_loses_position() {
        let mut dome = Dome::new(DomeConfiguration {
            use_limit_switches: false,
            shutter_timeout: 10,
            extend_closing: 0,
        });
        dome.begin(at(0), &inputs(false, false, false, false, true));
        dome.close(at(0)).unwrap();
        dome.tick(at(10_001), &inputs(false, false, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Closed);

        // Holding no buttons keeps the position
        dome.tick(at(10_200), &inputs(false, false, false, false, false));
        assert_eq!(dome.status().shutter, ShutterState::Closed);

        dome.tick(at(10_400), &inputs(false, false, true, false, false));
        assert_eq!(dome.drive(), Drive::Open);
        assert_eq!(dome.status().shutter, ShutterState::Error);
    }

    #[test]
    fn client_disconnect_halts_movement() {
        let mut dome = Dome::new(DomeConfiguration::default());
        dome.begin(at(0), &inputs(false, true, false, false, true));
        dome.open(at(0)).unwrap();

        dome.tick(at(200), &inputs(false, false, false, false, true));
        assert_eq!(dome.drive(), Drive::Open);

        dome.tick(at(400), &inputs(false, false, false, false, false));
        assert_eq!(dome.drive(), Drive::Idle);
        assert_eq!(dome.status().shutter, ShutterState::Error);
        assert!(!dome.status().slewing);
    }

    #[test]
    fn client_connect_releases_manual_drive() {
        let mut dome = Dome::new(DomeConfiguration::default());
        dome.begin(at(0), &inputs(false, true, false, false, false));

        dome.tick(at(200), &inputs(false, true, true, false, false));
        assert_eq!(dome.drive(), Drive::Open);

        dome.tick(at(400), &inputs(false, false, true, false, true));
        assert_eq!(dome.drive(), Drive::Idle);
    }

    #[test]
    fn remote_open_and_close() {
        let mut dome = Dome::new(DomeConfiguration::default());
        dome.begin(at(0), &inputs(false, true, false, false, true));

        dome.open(at(0)).unwrap();
        assert_eq!(
            dome.status(),
            DomeStatus {
                shutter: ShutterState::Opening,
                slewing: true,
                drive: Drive::Open,
            }
        );
        assert_eq!(dome.close(at(100)), Err(CommandError::Conflict));

        dome.tick(at(30_000), &inputs(true, false, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Open);
        assert_eq!(dome.drive(), Drive::Idle);
    }

    #[test]
    fn switching_to_limit_switches_reads_position() {
        let mut dome = Dome::new(DomeConfiguration {
            use_limit_switches: false,
            ..Default::default()
        });
        dome.begin(at(0), &inputs(false, true, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Error);

        dome.read_configuration(DomeConfiguration::default());
        dome.tick(at(200), &inputs(false, true, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Closed);

        // Back to timer mode the position is unknown again
        dome.read_configuration(DomeConfiguration {
            use_limit_switches: false,
            ..Default::default()
        });
        dome.tick(at(400), &inputs(false, true, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Error);
    }

    #[test]
    fn mode_change_waits_for_movement() {
        let mut dome = Dome::new(DomeConfiguration {
            use_limit_switches: false,
            shutter_timeout: 10,
            extend_closing: 0,
        });
        dome.begin(at(0), &inputs(false, false, false, false, true));
        dome.open(at(0)).unwrap();

        dome.read_configuration(DomeConfiguration::default());
        dome.tick(at(200), &inputs(false, false, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Opening);

        dome.tick(at(400), &inputs(true, false, false, false, true));
        assert_eq!(dome.status().shutter, ShutterState::Open);
        assert!(!dome.status().slewing);
    }

    #[test]
    fn configuration_is_validated() {
        let mut dome = Dome::new(DomeConfiguration::default());

        dome.read_configuration(DomeConfiguration {
            use_limit_switches: false,
            shutter_timeout: 2,
            extend_closing: 31,
        });

        assert_eq!(
            dome.write_configuration(),
            DomeConfiguration {
                use_limit_switches: false,
                shutter_timeout: 60,
                extend_closing: 0,
            }
        );
        assert_eq!(dome.shutter().settings().mode, CompletionMode::Timer);
    }

    #[test]
    fn configuration_round_trip() {
        let config = DomeConfiguration {
            use_limit_switches: true,
            shutter_timeout: 120,
            extend_closing: 5,
        };

        let mut dome = Dome::new(DomeConfiguration::default());
        dome.read_configuration(config.clone());

        let mut buf = [0u8; 16];
        let bytes = postcard::to_slice(&dome.write_configuration(), &mut buf).unwrap();
        let decoded: DomeConfiguration = postcard::from_bytes(bytes).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(
            dome.shutter().settings().extend_closing,
            Duration::from_secs(5)
        );
    }
}
