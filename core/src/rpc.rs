use crate::{
    controller::Controller,
    device::DeviceKind,
    dome::{DomeConfiguration, DomeStatus},
    safety::{SafetyMonitorConfiguration, SafetyMonitorStatus},
    shutter::CommandError,
    weather::WeatherReport,
};
use embassy_time::Instant;
use serde::{Deserialize, Serialize};

pub const SERIAL_BAUD: u32 = 115_200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum Request {
    Ping(u32),
    Connect(DeviceKind),
    Disconnect(DeviceKind),
    OpenShutter,
    CloseShutter,
    AbortShutter,
    GetDomeStatus,
    GetSafetyMonitorStatus,
    GetWeather,
    GetDomeConfiguration,
    SetDomeConfiguration(DomeConfiguration),
    GetSafetyMonitorConfiguration,
    SetSafetyMonitorConfiguration(SafetyMonitorConfiguration),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum Response {
    Ping(u32),
    Connect,
    Disconnect,
    OpenShutter(Result<(), CommandError>),
    CloseShutter(Result<(), CommandError>),
    AbortShutter(Result<(), CommandError>),
    GetDomeStatus(DomeStatus),
    GetSafetyMonitorStatus(SafetyMonitorStatus),
    GetWeather(Option<WeatherReport>),
    GetDomeConfiguration(DomeConfiguration),
    /// Carries the configuration as applied, after validation.
    SetDomeConfiguration(DomeConfiguration),
    GetSafetyMonitorConfiguration(SafetyMonitorConfiguration),
    /// Carries the configuration as applied, after validation.
    SetSafetyMonitorConfiguration(SafetyMonitorConfiguration),
}

impl Controller {
    pub fn handle_request(&mut self, now: Instant, request: Request) -> Response {
        match request {
            Request::Ping(i) => Response::Ping(i),
            Request::Connect(device) => {
                self.connect(device);
                Response::Connect
            }
            Request::Disconnect(device) => {
                self.disconnect(device);
                Response::Disconnect
            }
            Request::OpenShutter => Response::OpenShutter(self.open_shutter(now)),
            Request::CloseShutter => Response::CloseShutter(self.close_shutter(now)),
            Request::AbortShutter => Response::AbortShutter(self.abort_shutter()),
            Request::GetDomeStatus => Response::GetDomeStatus(self.dome_status()),
            Request::GetSafetyMonitorStatus => {
                Response::GetSafetyMonitorStatus(self.safety_monitor_status())
            }
            Request::GetWeather => Response::GetWeather(self.weather(now)),
            Request::GetDomeConfiguration => {
                Response::GetDomeConfiguration(self.dome_configuration())
            }
            Request::SetDomeConfiguration(config) => {
                Response::SetDomeConfiguration(self.set_dome_configuration(config))
            }
            Request::GetSafetyMonitorConfiguration => {
                Response::GetSafetyMonitorConfiguration(self.safety_monitor_configuration())
            }
            Request::SetSafetyMonitorConfiguration(config) => {
                Response::SetSafetyMonitorConfiguration(
                    self.set_safety_monitor_configuration(config),
                )
            }
        }
    }
}
