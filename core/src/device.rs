use embassy_time::Instant;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

/// Hooks through which the poll loop and the remote side drive a logical device.
pub trait Device {
    /// The slice of the input snapshot the device consumes.
    type Inputs;
    type Configuration;
    type Status;

    /// Called once with the first input snapshot.
    fn begin(&mut self, now: Instant, inputs: &Self::Inputs);

    /// Called every poll cycle.
    fn tick(&mut self, now: Instant, inputs: &Self::Inputs);

    /// Applies a configuration document, out of range values are replaced by defaults.
    fn read_configuration(&mut self, config: Self::Configuration);

    fn write_configuration(&self) -> Self::Configuration;

    fn status(&self) -> Self::Status;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum DeviceKind {
    Dome,
    SafetyMonitor,
}

/// Number of connected remote sessions per device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct ClientPresence {
    dome: u8,
    safety_monitor: u8,
}

impl ClientPresence {
    pub fn count(&self, device: DeviceKind) -> u8 {
        match device {
            DeviceKind::Dome => self.dome,
            DeviceKind::SafetyMonitor => self.safety_monitor,
        }
    }

    pub fn is_connected(&self, device: DeviceKind) -> bool {
        self.count(device) > 0
    }

    pub fn connect(&mut self, device: DeviceKind) {
        let count = self.count_mut(device);
        *count = count.saturating_add(1);
    }

    pub fn disconnect(&mut self, device: DeviceKind) {
        let count = self.count_mut(device);
        *count = count.saturating_sub(1);
    }

    fn count_mut(&mut self, device: DeviceKind) -> &mut u8 {
        match device {
            DeviceKind::Dome => &mut self.dome,
            DeviceKind::SafetyMonitor => &mut self.safety_monitor,
        }
    }
}
