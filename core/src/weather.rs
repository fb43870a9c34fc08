//! Weather station uplink.
//!
//! The station sends ASCII frames such as `%WS,-175,-120,24,85,1,1270,-1,-1#`, one field each
//! for sky temperature, air temperature, wind, humidity, rain, light, cloud cover and visible
//! stars. Temperatures are in tenths of a degree Celsius.

use embassy_time::{Duration, Instant};
use heapless::Vec;
use serde::{Deserialize, Serialize};

pub const SERIAL_BAUD: u32 = 9_600;

const FRAME_START: u8 = b'%';
const FRAME_END: u8 = b'#';
const MAX_FRAME_LEN: usize = 64;

pub const FIELD_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum Error {
    Overflow,
    NotUtf8,
    UnknownSentence,
    FieldCount,
    InvalidField,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Collects the bytes between a `%` and the next `#`.
#[derive(Default)]
pub struct FrameAssembler {
    buffer: Vec<u8, MAX_FRAME_LEN>,
    in_frame: bool,
}

impl FrameAssembler {
    /// Feeds one byte, returning the parsed fields once a frame is complete.
    pub fn push(&mut self, byte: u8) -> Option<Result<[i16; FIELD_COUNT]>> {
        match byte {
            FRAME_START => {
                self.buffer.clear();
                self.in_frame = true;
                None
            }
            FRAME_END if self.in_frame => {
                self.in_frame = false;
                Some(parse_sentence(&self.buffer))
            }
            _ if self.in_frame => {
                if self.buffer.push(byte).is_err() {
                    self.in_frame = false;
                    Some(Err(Error::Overflow))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Parses the body of a frame, without the start and end markers.
pub fn parse_sentence(body: &[u8]) -> Result<[i16; FIELD_COUNT]> {
    let body = core::str::from_utf8(body).map_err(|_| Error::NotUtf8)?;

    let mut parts = body.split(',');
    if parts.next() != Some("WS") {
        return Err(Error::UnknownSentence);
    }

    let mut fields = [0i16; FIELD_COUNT];
    let mut count = 0;

    for part in parts {
        let slot = fields.get_mut(count).ok_or(Error::FieldCount)?;
        *slot = part.trim().parse().map_err(|_| Error::InvalidField)?;
        count += 1;
    }

    if count == FIELD_COUNT {
        Ok(fields)
    } else {
        Err(Error::FieldCount)
    }
}

/// Latest accepted readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct WeatherReport {
    /// 0.1 °C
    pub sky_temperature: i16,
    /// 0.1 °C
    pub air_temperature: i16,
    /// km/h
    pub wind_speed: i16,
    /// %
    pub humidity: i16,
    pub rain: i16,
    /// lux
    pub light: i16,
    /// %, -1 when not measured
    pub cloud_cover: i16,
    /// -1 when not measured
    pub stars: i16,
}

impl Default for WeatherReport {
    fn default() -> Self {
        Self {
            sky_temperature: 0,
            air_temperature: 0,
            wind_speed: 0,
            humidity: 0,
            rain: 0,
            light: 0,
            cloud_cover: -1,
            stars: -1,
        }
    }
}

impl WeatherReport {
    /// Takes each field that is within its plausible range, keeping the previous value for the
    /// rest. Returns the number of fields rejected.
    pub fn apply(&mut self, fields: [i16; FIELD_COUNT]) -> usize {
        let [tsky, tair, wind, humidity, rain, light, clouds, stars] = fields;

        [
            update_in_range(&mut self.sky_temperature, tsky, -500, 500),
            update_in_range(&mut self.air_temperature, tair, -500, 500),
            update_in_range(&mut self.wind_speed, wind, 0, 100),
            update_in_range(&mut self.humidity, humidity, 0, 110),
            update_in_range(&mut self.rain, rain, 0, 9999),
            update_in_range(&mut self.light, light, 0, 9999),
            update_in_range(&mut self.cloud_cover, clouds, -1, 100),
            update_in_range(&mut self.stars, stars, -1, 9999),
        ]
        .into_iter()
        .filter(|accepted| !accepted)
        .count()
    }
}

fn update_in_range(value: &mut i16, new: i16, min: i16, max: i16) -> bool {
    if (min..=max).contains(&new) {
        *value = new;
        true
    } else {
        false
    }
}

/// Frame decoding and liveness of the weather station.
pub struct WeatherStation {
    assembler: FrameAssembler,
    report: WeatherReport,
    last_frame: Option<Instant>,
    timeout: Duration,
}

impl WeatherStation {
    pub fn new(timeout: Duration) -> Self {
        Self {
            assembler: FrameAssembler::default(),
            report: WeatherReport::default(),
            last_frame: None,
            timeout,
        }
    }

    pub fn receive(&mut self, now: Instant, bytes: &[u8]) {
        for &byte in bytes {
            match self.assembler.push(byte) {
                None => {}
                Some(Ok(fields)) => {
                    let rejected = self.report.apply(fields);
                    if rejected > 0 {
                        warn!("Weather frame had {} fields out of range", rejected);
                    }
                    debug!("Weather: {:?}", self.report);

                    if self.last_frame.is_none() {
                        info!("Weather station connected");
                    }
                    self.last_frame = Some(now);
                }
                Some(Err(e)) => {
                    warn!("Dropped weather frame: {:?}", e);
                }
            }
        }
    }

    pub fn is_connected(&self, now: Instant) -> bool {
        self.last_frame
            .is_some_and(|last| now.saturating_duration_since(last) <= self.timeout)
    }

    /// Forgets the station once it has been silent for longer than the timeout.
    pub fn tick(&mut self, now: Instant) {
        if self.last_frame.is_some() && !self.is_connected(now) {
            warn!("Weather station timed out");
            self.last_frame = None;
        }
    }

    pub fn report(&self) -> &WeatherReport {
        &self.report
    }

    /// The latest readings, if the station is still connected.
    pub fn current(&self, now: Instant) -> Option<WeatherReport> {
        self.is_connected(now).then_some(self.report)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn feed(assembler: &mut FrameAssembler, bytes: &[u8]) -> std::vec::Vec<Result<[i16; 8]>> {
        bytes.iter().filter_map(|b| assembler.push(*b)).collect()
    }

    #[test]
    fn parse_typical_frame() {
        let mut assembler = FrameAssembler::default();
        let frames = feed(&mut assembler, b"%WS,-175,-120,24,85,1,1270,-1,-1#");
        assert_eq!(frames, [Ok([-175, -120, 24, 85, 1, 1270, -1, -1])]);
    }

    #[test]
    fn noise_between_frames_is_ignored() {
        let mut assembler = FrameAssembler::default();
        let frames = feed(
            &mut assembler,
            b"\r\n#garbage%WS,1,2,3,4,5,6,7,8#\r\n%WS,0,0,0,0,0,0,0,0#",
        );
        assert_eq!(
            frames,
            [Ok([1, 2, 3, 4, 5, 6, 7, 8]), Ok([0, 0, 0, 0, 0, 0, 0, 0])]
        );
    }

    #[test]
    fn start_marker_restarts_frame() {
        let mut assembler = FrameAssembler::default();
        let frames = feed(&mut assembler, b"%WS,1,2,%WS,1,2,3,4,5,6,7,8#");
        assert_eq!(frames, [Ok([1, 2, 3, 4, 5, 6, 7, 8])]);
    }

    #[test]
    fn overflow() {
        let mut assembler = FrameAssembler::default();
        let mut bytes = std::vec::Vec::from(&b"%WS,"[..]);
        bytes.extend(std::iter::repeat(b'1').take(MAX_FRAME_LEN));
        bytes.push(b'#');

        let frames = feed(&mut assembler, &bytes);
        assert_eq!(frames, [Err(Error::Overflow)]);
    }

    #[test]
    fn malformed_sentences() {
        assert_eq!(parse_sentence(b"XX,1,2,3,4,5,6,7,8"), Err(Error::UnknownSentence));
        assert_eq!(parse_sentence(b"WS,1,2,3,4,5,6,7"), Err(Error::FieldCount));
        assert_eq!(parse_sentence(b"WS,1,2,3,4,5,6,7,8,9"), Err(Error::FieldCount));
        assert_eq!(parse_sentence(b"WS,1,2,x,4,5,6,7,8"), Err(Error::InvalidField));
        assert_eq!(parse_sentence(b"WS,1,2,,4,5,6,7,8"), Err(Error::InvalidField));
        assert_eq!(parse_sentence(b"WS,99999,2,3,4,5,6,7,8"), Err(Error::InvalidField));
        assert_eq!(parse_sentence(&[b'W', b'S', b',', 0xff]), Err(Error::NotUtf8));
    }

    #[test]
    fn out_of_range_fields_keep_previous_value() {
        let mut report = WeatherReport::default();
        assert_eq!(report.apply([-175, -120, 24, 85, 1, 1270, -1, -1]), 0);

        assert_eq!(report.apply([-600, 200, 101, 50, 0, 100, 101, -2]), 4);
        assert_eq!(
            report,
            WeatherReport {
                sky_temperature: -175,
                air_temperature: 200,
                wind_speed: 24,
                humidity: 50,
                rain: 0,
                light: 100,
                cloud_cover: -1,
                stars: -1,
            }
        );
    }

    #[test]
    fn liveness() {
        let mut station = WeatherStation::new(Duration::from_secs(10));
        assert!(!station.is_connected(at(0)));
        assert_eq!(station.current(at(0)), None);

        station.receive(at(1_000), b"%WS,-175,-120,24,85,1,1270,-1,-1#");
        assert!(station.is_connected(at(1_000)));
        assert!(station.is_connected(at(11_000)));
        assert_eq!(station.current(at(2_000)).unwrap().wind_speed, 24);

        station.tick(at(11_001));
        assert!(!station.is_connected(at(11_001)));
        assert_eq!(station.current(at(11_001)), None);

        // Readings are kept for display, only the connection is lost
        assert_eq!(station.report().wind_speed, 24);
    }

    #[test]
    fn rejected_frame_does_not_refresh_liveness() {
        let mut station = WeatherStation::new(Duration::from_secs(10));

        station.receive(at(0), b"%WS,1,2,3,4,5,6,7,8#");
        station.receive(at(9_000), b"%WS,1,2,3#");
        assert!(!station.is_connected(at(10_500)));
    }

    #[test]
    fn frame_split_across_reads() {
        let mut station = WeatherStation::new(Duration::from_secs(10));

        station.receive(at(0), b"%WS,-175,-1");
        assert!(!station.is_connected(at(0)));

        station.receive(at(200), b"20,24,85,1,1270,-1,-1#");
        assert!(station.is_connected(at(200)));
        assert_eq!(station.report().air_temperature, -120);
    }
}
