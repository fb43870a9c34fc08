//! Signal assignment of the shift register chains.
//!
//! Both chains are 16 bits wide. Every signal has exactly one bit, defined in the `mask` tables
//! below. Components never see the raw words, only the typed slices taken from them.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum InputSignal {
    CloseLimit,
    OpenLimit,
    OpenButton,
    CloseButton,
    Rain,
    PowerLoss,
}

impl InputSignal {
    pub const fn mask(self) -> u16 {
        match self {
            Self::CloseLimit => 0x0100,
            Self::OpenLimit => 0x0200,
            Self::OpenButton => 0x0400,
            Self::CloseButton => 0x0800,
            Self::Rain => 0x1000,
            Self::PowerLoss => 0x2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum OutputSignal {
    RoofClose,
    RoofOpen,
    CpuOk,
    WeatherOk,
    DomeClient,
    SafetyMonitorClient,
}

impl OutputSignal {
    pub const fn mask(self) -> u16 {
        match self {
            Self::RoofClose => 0x0100,
            Self::RoofOpen => 0x0200,
            Self::CpuOk => 0x0400,
            Self::WeatherOk => 0x0800,
            Self::DomeClient => 0x1000,
            Self::SafetyMonitorClient => 0x4000,
        }
    }
}

/// Snapshot of the input chain, in logical sense (a set bit is an asserted signal).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct InputWord(u16);

impl InputWord {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    pub const fn is_set(&self, signal: InputSignal) -> bool {
        self.0 & signal.mask() != 0
    }

    pub fn with(mut self, signal: InputSignal, asserted: bool) -> Self {
        if asserted {
            self.0 |= signal.mask();
        } else {
            self.0 &= !signal.mask();
        }
        self
    }

    pub fn limit_switches(&self) -> LimitSwitches {
        LimitSwitches {
            open: self.is_set(InputSignal::OpenLimit),
            closed: self.is_set(InputSignal::CloseLimit),
        }
    }

    pub fn manual_buttons(&self) -> ManualButtons {
        ManualButtons {
            open: self.is_set(InputSignal::OpenButton),
            close: self.is_set(InputSignal::CloseButton),
        }
    }

    pub fn safety_inputs(&self) -> SafetyInputs {
        SafetyInputs {
            rain: self.is_set(InputSignal::Rain),
            power_loss: self.is_set(InputSignal::PowerLoss),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct OutputWord(u16);

impl OutputWord {
    /// Every output released.
    pub const SAFE: Self = Self(0);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u16 {
        self.0
    }

    pub const fn is_set(&self, signal: OutputSignal) -> bool {
        self.0 & signal.mask() != 0
    }

    pub fn set(&mut self, signal: OutputSignal, asserted: bool) {
        if asserted {
            self.0 |= signal.mask();
        } else {
            self.0 &= !signal.mask();
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct LimitSwitches {
    pub open: bool,
    pub closed: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct ManualButtons {
    pub open: bool,
    pub close: bool,
}

/// Raw (undebounced) digital safety conditions. A `true` field means the unsafe condition is
/// present.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct SafetyInputs {
    pub rain: bool,
    pub power_loss: bool,
}
