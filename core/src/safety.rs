//! Safety monitor: debounced rain, power and weather conditions reduced to one verdict.

use crate::{
    changed::Changed,
    config::validate_range,
    debounce::DebouncedCondition,
    device::Device,
    io::SafetyInputs,
    weather::WeatherReport,
};
use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum SafetyChannelKind {
    Rain,
    Power,
    SkyTemperature,
    Wind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct SafetyMonitorConfiguration {
    /// Seconds
    #[serde(rename = "Rain_delay")]
    pub rain_delay: u16,

    /// Seconds, zero disables the power channel
    #[serde(rename = "Power_off_delay")]
    pub power_off_delay: u16,

    /// Seconds, applies to every weather derived channel
    #[serde(rename = "Weather_delay")]
    pub weather_delay: u16,

    #[serde(rename = "Sky_temperature_enabled")]
    pub sky_temperature_enabled: bool,

    /// °C, unsafe when the sky is warmer (cloudy)
    #[serde(rename = "Sky_temperature_limit")]
    pub sky_temperature_limit: i16,

    #[serde(rename = "Wind_enabled")]
    pub wind_enabled: bool,

    /// km/h
    #[serde(rename = "Wind_limit")]
    pub wind_limit: u16,
}

impl Default for SafetyMonitorConfiguration {
    fn default() -> Self {
        Self {
            rain_delay: 2,
            power_off_delay: 0,
            weather_delay: 10,
            sky_temperature_enabled: false,
            sky_temperature_limit: -15,
            wind_enabled: false,
            wind_limit: 40,
        }
    }
}

impl SafetyMonitorConfiguration {
    pub fn validated(self) -> Self {
        let default = Self::default();

        Self {
            rain_delay: validate_range("Rain_delay", self.rain_delay, 1, 60, default.rain_delay),
            power_off_delay: validate_range(
                "Power_off_delay",
                self.power_off_delay,
                0,
                600,
                default.power_off_delay,
            ),
            weather_delay: validate_range(
                "Weather_delay",
                self.weather_delay,
                1,
                600,
                default.weather_delay,
            ),
            sky_temperature_enabled: self.sky_temperature_enabled,
            sky_temperature_limit: validate_range(
                "Sky_temperature_limit",
                self.sky_temperature_limit,
                -50,
                50,
                default.sky_temperature_limit,
            ),
            wind_enabled: self.wind_enabled,
            wind_limit: validate_range("Wind_limit", self.wind_limit, 0, 100, default.wind_limit),
        }
    }

    fn delay(&self, kind: SafetyChannelKind) -> Duration {
        let secs = match kind {
            SafetyChannelKind::Rain => self.rain_delay,
            SafetyChannelKind::Power => self.power_off_delay,
            SafetyChannelKind::SkyTemperature | SafetyChannelKind::Wind => self.weather_delay,
        };
        Duration::from_secs(secs.into())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SafetyMonitorInputs {
    pub digital: SafetyInputs,
    /// `None` while the weather station is disconnected.
    pub weather: Option<WeatherReport>,
    /// A client is connected to the safety monitor.
    pub supervised: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct SafetyMonitorStatus {
    pub is_safe: bool,
    pub rain: bool,
    pub power: bool,
    pub sky_temperature: bool,
    pub wind: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Channels {
    rain: DebouncedCondition,
    power: DebouncedCondition,
    sky_temperature: DebouncedCondition,
    wind: DebouncedCondition,
}

impl Channels {
    fn get(&self, kind: SafetyChannelKind) -> &DebouncedCondition {
        match kind {
            SafetyChannelKind::Rain => &self.rain,
            SafetyChannelKind::Power => &self.power,
            SafetyChannelKind::SkyTemperature => &self.sky_temperature,
            SafetyChannelKind::Wind => &self.wind,
        }
    }

    fn get_mut(&mut self, kind: SafetyChannelKind) -> &mut DebouncedCondition {
        match kind {
            SafetyChannelKind::Rain => &mut self.rain,
            SafetyChannelKind::Power => &mut self.power,
            SafetyChannelKind::SkyTemperature => &mut self.sky_temperature,
            SafetyChannelKind::Wind => &mut self.wind,
        }
    }
}

pub struct SafetyMonitor {
    config: SafetyMonitorConfiguration,
    channels: Channels,
}

impl SafetyMonitor {
    pub fn new(config: SafetyMonitorConfiguration) -> Self {
        let config = config.validated();
        let channel = |kind| DebouncedCondition::new(config.delay(kind));

        let channels = Channels {
            rain: channel(SafetyChannelKind::Rain),
            power: channel(SafetyChannelKind::Power),
            sky_temperature: channel(SafetyChannelKind::SkyTemperature),
            wind: channel(SafetyChannelKind::Wind),
        };

        Self { config, channels }
    }

    pub fn is_tripped(&self, kind: SafetyChannelKind) -> bool {
        self.channels.get(kind).is_tripped()
    }

    pub fn is_safe(&self) -> bool {
        !SafetyChannelKind::iter().any(|kind| self.is_tripped(kind))
    }

    /// Raw condition and enable flag of a channel for the current inputs.
    fn evaluate(&self, kind: SafetyChannelKind, inputs: &SafetyMonitorInputs) -> (bool, bool) {
        match kind {
            SafetyChannelKind::Rain => (inputs.digital.rain, true),
            SafetyChannelKind::Power => {
                (inputs.digital.power_loss, self.config.power_off_delay != 0)
            }
            SafetyChannelKind::SkyTemperature => match inputs.weather {
                Some(w) => (
                    i32::from(w.sky_temperature)
                        > i32::from(self.config.sky_temperature_limit) * 10,
                    self.config.sky_temperature_enabled,
                ),
                None => (false, false),
            },
            SafetyChannelKind::Wind => match inputs.weather {
                Some(w) => (
                    i32::from(w.wind_speed) > i32::from(self.config.wind_limit),
                    self.config.wind_enabled,
                ),
                None => (false, false),
            },
        }
    }

    fn reset(&mut self) {
        let mut changed = Changed::No;
        for kind in SafetyChannelKind::iter() {
            changed = changed.or(self.channels.get_mut(kind).reset());
        }

        if changed == Changed::Yes {
            info!("Safety monitor reset, no client connected");
        }
    }
}

impl Device for SafetyMonitor {
    type Inputs = SafetyMonitorInputs;
    type Configuration = SafetyMonitorConfiguration;
    type Status = SafetyMonitorStatus;

    fn begin(&mut self, _now: Instant, _inputs: &Self::Inputs) {
        info!(
            "Safety monitor: rain delay {}s, power delay {}s",
            self.config.rain_delay,
            self.config.power_off_delay
        );
    }

    fn tick(&mut self, now: Instant, inputs: &Self::Inputs) {
        if !inputs.supervised {
            self.reset();
            return;
        }

        let was_safe = self.is_safe();

        for kind in SafetyChannelKind::iter() {
            let (raw, enabled) = self.evaluate(kind, inputs);
            if self.channels.get_mut(kind).update(now, raw, enabled) == Changed::Yes {
                let name: &'static str = kind.into();
                info!("{} tripped: {}", name, self.is_tripped(kind));
            }
        }

        let safe = self.is_safe();
        if safe != was_safe {
            info!("Safety verdict now {}", if safe { "SAFE" } else { "UNSAFE" });
        }
    }

    fn read_configuration(&mut self, config: Self::Configuration) {
        self.config = config.validated();
        for kind in SafetyChannelKind::iter() {
            let delay = self.config.delay(kind);
            self.channels.get_mut(kind).set_delay(delay);
        }
        info!("Safety monitor configuration updated");
    }

    fn write_configuration(&self) -> Self::Configuration {
        self.config.clone()
    }

    fn status(&self) -> Self::Status {
        SafetyMonitorStatus {
            is_safe: self.is_safe(),
            rain: self.is_tripped(SafetyChannelKind::Rain),
            power: self.is_tripped(SafetyChannelKind::Power),
            sky_temperature: self.is_tripped(SafetyChannelKind::SkyTemperature),
            wind: self.is_tripped(SafetyChannelKind::Wind),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn inputs(rain: bool, power_loss: bool) -> SafetyMonitorInputs {
        SafetyMonitorInputs {
            digital: SafetyInputs { rain, power_loss },
            weather: None,
            supervised: true,
        }
    }

    fn weather(sky_temperature: i16, wind_speed: i16) -> SafetyMonitorInputs {
        SafetyMonitorInputs {
            weather: Some(WeatherReport {
                sky_temperature,
                wind_speed,
                ..Default::default()
            }),
            ..inputs(false, false)
        }
    }

    #[test]
    fn rain_debounce() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            rain_delay: 5,
            ..Default::default()
        });
        monitor.begin(at(0), &inputs(false, false));

        monitor.tick(at(0), &inputs(true, false));
        assert!(monitor.is_safe());

        monitor.tick(at(4_900), &inputs(true, false));
        assert!(monitor.is_safe());

        monitor.tick(at(5_100), &inputs(true, false));
        assert!(!monitor.is_safe());
        assert!(monitor.status().rain);

        monitor.tick(at(5_300), &inputs(false, false));
        assert!(monitor.is_safe());
    }

    #[test]
    fn power_channel_disabled_by_zero_delay() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration::default());

        monitor.tick(at(0), &inputs(false, true));
        monitor.tick(at(100_000), &inputs(false, true));
        assert!(monitor.is_safe());
    }

    #[test]
    fn power_channel() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            power_off_delay: 30,
            ..Default::default()
        });

        monitor.tick(at(0), &inputs(false, true));
        monitor.tick(at(29_999), &inputs(false, true));
        assert!(monitor.is_safe());

        monitor.tick(at(30_000), &inputs(false, true));
        assert!(!monitor.is_safe());
        assert!(monitor.status().power);
    }

    #[test]
    fn sky_temperature_channel() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            weather_delay: 1,
            sky_temperature_enabled: true,
            sky_temperature_limit: -15,
            ..Default::default()
        });

        // Clear sky
        monitor.tick(at(0), &weather(-175, 0));
        monitor.tick(at(5_000), &weather(-175, 0));
        assert!(monitor.is_safe());

        // Clouds coming in
        monitor.tick(at(6_000), &weather(-120, 0));
        monitor.tick(at(7_000), &weather(-120, 0));
        assert!(!monitor.is_safe());
        assert!(monitor.status().sky_temperature);
    }

    #[test]
    fn wind_channel() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            weather_delay: 1,
            wind_enabled: true,
            wind_limit: 30,
            ..Default::default()
        });

        monitor.tick(at(0), &weather(-175, 30));
        monitor.tick(at(2_000), &weather(-175, 30));
        assert!(monitor.is_safe());

        monitor.tick(at(3_000), &weather(-175, 31));
        monitor.tick(at(4_000), &weather(-175, 31));
        assert!(!monitor.is_safe());
    }

    #[test]
    fn disabled_weather_channels_never_trip() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            weather_delay: 1,
            ..Default::default()
        });

        monitor.tick(at(0), &weather(400, 100));
        monitor.tick(at(10_000), &weather(400, 100));
        assert!(monitor.is_safe());
    }

    #[test]
    fn weather_disconnect_clears_weather_channels() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            weather_delay: 1,
            wind_enabled: true,
            ..Default::default()
        });

        monitor.tick(at(0), &weather(-175, 80));
        monitor.tick(at(1_000), &weather(-175, 80));
        assert!(!monitor.is_safe());

        monitor.tick(at(1_200), &inputs(false, false));
        assert!(monitor.is_safe());
    }

    #[test]
    fn unsupervised_monitor_is_reset() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            rain_delay: 1,
            ..Default::default()
        });

        monitor.tick(at(0), &inputs(true, false));
        monitor.tick(at(1_000), &inputs(true, false));
        assert!(!monitor.is_safe());

        let unsupervised = SafetyMonitorInputs {
            supervised: false,
            ..inputs(true, false)
        };
        monitor.tick(at(1_200), &unsupervised);
        assert!(monitor.is_safe());

        // Debounce starts over once supervised again
        monitor.tick(at(1_400), &inputs(true, false));
        assert!(monitor.is_safe());
    }

    #[test]
    fn configuration_is_validated() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration::default());

        monitor.read_configuration(SafetyMonitorConfiguration {
            rain_delay: 0,
            power_off_delay: 601,
            weather_delay: 30,
            sky_temperature_enabled: true,
            sky_temperature_limit: 51,
            wind_enabled: true,
            wind_limit: 101,
        });

        assert_eq!(
            monitor.write_configuration(),
            SafetyMonitorConfiguration {
                rain_delay: 2,
                power_off_delay: 0,
                weather_delay: 30,
                sky_temperature_enabled: true,
                sky_temperature_limit: -15,
                wind_enabled: true,
                wind_limit: 40,
            }
        );
    }

    #[test]
    fn configuration_round_trip() {
        let config = SafetyMonitorConfiguration {
            rain_delay: 10,
            power_off_delay: 120,
            weather_delay: 60,
            sky_temperature_enabled: true,
            sky_temperature_limit: -20,
            wind_enabled: false,
            wind_limit: 25,
        };

        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration::default());
        monitor.read_configuration(config.clone());

        let mut buf = [0u8; 64];
        let bytes = postcard::to_slice(&monitor.write_configuration(), &mut buf).unwrap();
        let decoded: SafetyMonitorConfiguration = postcard::from_bytes(bytes).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn running_timer_keeps_its_delay() {
        let mut monitor = SafetyMonitor::new(SafetyMonitorConfiguration {
            rain_delay: 60,
            ..Default::default()
        });

        monitor.tick(at(0), &inputs(true, false));
        monitor.tick(at(5_000), &inputs(true, false));
        assert!(monitor.is_safe());

        monitor.read_configuration(SafetyMonitorConfiguration {
            rain_delay: 5,
            ..Default::default()
        });
        monitor.tick(at(5_200), &inputs(true, false));
        assert!(monitor.is_safe());

        monitor.tick(at(60_000), &inputs(true, false));
        assert!(!monitor.is_safe());

        // The shorter delay applies from the next assertion
        monitor.tick(at(60_200), &inputs(false, false));
        monitor.tick(at(61_000), &inputs(true, false));
        monitor.tick(at(66_000), &inputs(true, false));
        assert!(!monitor.is_safe());
    }
}
