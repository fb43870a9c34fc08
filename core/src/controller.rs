//! The poll loop: reads the input chain, ticks the devices, composes and writes the output word.
//!
//! The controller is the only owner of both I/O words and of the client presence counts.
//! Devices receive typed slices of the input snapshot and hand back relay requests.

use crate::{
    device::{ClientPresence, Device, DeviceKind},
    dome::{Dome, DomeConfiguration, DomeInputs, DomeStatus},
    heartbeat::Heartbeat,
    io::{InputWord, OutputSignal, OutputWord},
    safety::{SafetyMonitor, SafetyMonitorConfiguration, SafetyMonitorInputs, SafetyMonitorStatus},
    shutter::CommandError,
    transport::Transport,
    weather::{WeatherReport, WeatherStation},
};
use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct ControllerConfig {
    pub read_interval: Duration,
    pub write_interval: Duration,
    /// An unchanged output word is rewritten this often.
    pub refresh_interval: Duration,
    pub weather_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            read_interval: Duration::from_millis(200),
            write_interval: Duration::from_millis(200),
            refresh_interval: Duration::from_secs(5),
            weather_timeout: Duration::from_secs(10),
        }
    }
}

/// State of the I/O words for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct IoFrame {
    pub now: Instant,
    pub inputs: InputWord,
    pub outputs: OutputWord,
}

pub struct Controller {
    config: ControllerConfig,
    frame: IoFrame,
    started: bool,
    last_read: Option<Instant>,
    last_write: Option<Instant>,
    written: Option<(OutputWord, Instant)>,
    presence: ClientPresence,
    dome: Dome,
    safety_monitor: SafetyMonitor,
    weather: WeatherStation,
    heartbeat: Heartbeat,
}

fn is_due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last.is_none_or(|last| now.saturating_duration_since(last) >= interval)
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        dome: DomeConfiguration,
        safety_monitor: SafetyMonitorConfiguration,
    ) -> Self {
        Self {
            config,
            frame: IoFrame {
                now: Instant::from_ticks(0),
                inputs: InputWord::default(),
                outputs: OutputWord::SAFE,
            },
            started: false,
            last_read: None,
            last_write: None,
            written: None,
            presence: ClientPresence::default(),
            dome: Dome::new(dome),
            safety_monitor: SafetyMonitor::new(safety_monitor),
            weather: WeatherStation::new(config.weather_timeout),
            heartbeat: Heartbeat::default(),
        }
    }

    /// Runs one cycle. Transport failures are logged, they never stop the loop.
    pub fn poll<T: Transport>(&mut self, now: Instant, transport: &mut T) {
        self.frame.now = now;

        if is_due(self.last_read, self.config.read_interval, now) {
            self.read(now, transport);
        }

        self.weather.tick(now);

        let dome_inputs = self.dome_inputs();
        let safety_monitor_inputs = self.safety_monitor_inputs(now);

        if !self.started {
            self.dome.begin(now, &dome_inputs);
            self.safety_monitor.begin(now, &safety_monitor_inputs);
            self.started = true;
        }

        self.dome.tick(now, &dome_inputs);
        self.safety_monitor.tick(now, &safety_monitor_inputs);

        self.frame.outputs = self.compose_outputs(now);

        if is_due(self.last_write, self.config.write_interval, now) {
            self.write(now, transport);
        }
    }

    fn read<T: Transport>(&mut self, now: Instant, transport: &mut T) {
        self.last_read = Some(now);

        match transport.read_inputs() {
            Ok(inputs) => {
                if inputs != self.frame.inputs {
                    debug!("Inputs: {:?}", inputs);
                }
                self.frame.inputs = inputs;
            }
            Err(e) => {
                warn!("Failed to read inputs: {:?}", e);
            }
        }
    }

    fn write<T: Transport>(&mut self, now: Instant, transport: &mut T) {
        let outputs = self.frame.outputs;

        let stale = match self.written {
            Some((word, at)) => {
                word != outputs
                    || now.saturating_duration_since(at) >= self.config.refresh_interval
            }
            None => true,
        };

        if !stale {
            return;
        }

        self.last_write = Some(now);

        match transport.write_outputs(outputs) {
            Ok(()) => {
                self.written = Some((outputs, now));
            }
            Err(e) => {
                warn!("Failed to write outputs: {:?}", e);
            }
        }
    }

    fn dome_inputs(&self) -> DomeInputs {
        DomeInputs {
            switches: self.frame.inputs.limit_switches(),
            buttons: self.frame.inputs.manual_buttons(),
            remote_control: self.presence.is_connected(DeviceKind::Dome),
        }
    }

    fn safety_monitor_inputs(&self, now: Instant) -> SafetyMonitorInputs {
        SafetyMonitorInputs {
            digital: self.frame.inputs.safety_inputs(),
            weather: self.weather.current(now),
            supervised: self.presence.is_connected(DeviceKind::SafetyMonitor),
        }
    }

    fn compose_outputs(&self, now: Instant) -> OutputWord {
        let drive = self.dome.drive();

        let mut outputs = OutputWord::SAFE;
        outputs.set(OutputSignal::RoofOpen, drive.open_relay());
        outputs.set(OutputSignal::RoofClose, drive.close_relay());
        outputs.set(OutputSignal::CpuOk, self.heartbeat.is_on(now));
        outputs.set(OutputSignal::WeatherOk, self.weather.is_connected(now));
        outputs.set(
            OutputSignal::DomeClient,
            self.presence.is_connected(DeviceKind::Dome),
        );
        outputs.set(
            OutputSignal::SafetyMonitorClient,
            self.presence.is_connected(DeviceKind::SafetyMonitor),
        );
        outputs
    }

    pub fn frame(&self) -> &IoFrame {
        &self.frame
    }

    pub fn presence(&self) -> &ClientPresence {
        &self.presence
    }

    pub fn connect(&mut self, device: DeviceKind) {
        self.presence.connect(device);
        let name: &'static str = device.into();
        info!("{} client connected ({})", name, self.presence.count(device));
    }

    pub fn disconnect(&mut self, device: DeviceKind) {
        self.presence.disconnect(device);
        let name: &'static str = device.into();
        info!("{} client disconnected ({})", name, self.presence.count(device));
    }

    fn require_client(&self, device: DeviceKind) -> Result<(), CommandError> {
        if self.presence.is_connected(device) {
            Ok(())
        } else {
            warn!("Command rejected, no client connected");
            Err(CommandError::NotConnected)
        }
    }

    pub fn open_shutter(&mut self, now: Instant) -> Result<(), CommandError> {
        self.require_client(DeviceKind::Dome)?;
        self.dome.open(now)
    }

    pub fn close_shutter(&mut self, now: Instant) -> Result<(), CommandError> {
        self.require_client(DeviceKind::Dome)?;
        self.dome.close(now)
    }

    pub fn abort_shutter(&mut self) -> Result<(), CommandError> {
        self.require_client(DeviceKind::Dome)?;
        self.dome.abort();
        Ok(())
    }

    pub fn dome_status(&self) -> DomeStatus {
        self.dome.status()
    }

    pub fn safety_monitor_status(&self) -> SafetyMonitorStatus {
        self.safety_monitor.status()
    }

    pub fn dome_configuration(&self) -> DomeConfiguration {
        self.dome.write_configuration()
    }

    pub fn set_dome_configuration(&mut self, config: DomeConfiguration) -> DomeConfiguration {
        self.dome.read_configuration(config);
        self.dome.write_configuration()
    }

    pub fn safety_monitor_configuration(&self) -> SafetyMonitorConfiguration {
        self.safety_monitor.write_configuration()
    }

    pub fn set_safety_monitor_configuration(
        &mut self,
        config: SafetyMonitorConfiguration,
    ) -> SafetyMonitorConfiguration {
        self.safety_monitor.read_configuration(config);
        self.safety_monitor.write_configuration()
    }

    pub fn receive_weather(&mut self, now: Instant, bytes: &[u8]) {
        self.weather.receive(now, bytes);
    }

    pub fn weather(&self, now: Instant) -> Option<WeatherReport> {
        self.weather.current(now)
    }
}
