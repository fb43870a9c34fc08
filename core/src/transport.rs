//! Bit-serial transport over a 74HC165 input chain and a 74HC595 output chain.

use crate::io::{InputWord, OutputWord};
use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, InputPin, OutputPin, PinState},
};

/// Width of both chains.
pub const WORD_BITS: u32 = 16;

/// Settling time between every clock or latch edge.
const EDGE_DELAY_US: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub enum Error {
    Pin(ErrorKind),
}

pub type Result<T> = core::result::Result<T, Error>;

fn pin_error<E: embedded_hal::digital::Error>(e: E) -> Error {
    Error::Pin(e.kind())
}

pub trait Transport {
    fn read_inputs(&mut self) -> Result<InputWord>;
    fn write_outputs(&mut self, word: OutputWord) -> Result<()>;
}

/// Parallel-in serial-out chain (74HC165).
pub struct InputChain<PL, CE, CP, Q> {
    parallel_load: PL,
    clock_enable: CE,
    clock: CP,
    data: Q,
}

impl<PL, CE, CP, Q> InputChain<PL, CE, CP, Q>
where
    PL: OutputPin,
    CE: OutputPin,
    CP: OutputPin,
    Q: InputPin,
{
    pub fn new(parallel_load: PL, clock_enable: CE, clock: CP, data: Q) -> Result<Self> {
        let mut chain = Self {
            parallel_load,
            clock_enable,
            clock,
            data,
        };

        chain.parallel_load.set_high().map_err(pin_error)?;
        chain.clock_enable.set_high().map_err(pin_error)?;
        chain.clock.set_low().map_err(pin_error)?;

        Ok(chain)
    }

    /// Latches the parallel inputs and shifts them out, first bit received is the MSB.
    pub fn read<D: DelayNs>(&mut self, delay: &mut D) -> Result<u16> {
        self.clock.set_low().map_err(pin_error)?;

        self.parallel_load.set_low().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);
        self.parallel_load.set_high().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);

        self.clock_enable.set_low().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);

        let mut value = 0u16;
        for _ in 0..WORD_BITS {
            let bit = self.data.is_high().map_err(pin_error)?;
            value = (value << 1) | u16::from(bit);

            self.clock.set_high().map_err(pin_error)?;
            delay.delay_us(EDGE_DELAY_US);
            self.clock.set_low().map_err(pin_error)?;
            delay.delay_us(EDGE_DELAY_US);
        }

        self.clock_enable.set_high().map_err(pin_error)?;

        Ok(value)
    }
}

/// Serial-in parallel-out chain (74HC595) with a storage latch.
pub struct OutputChain<DS, SHCP, STCP, OE, MR> {
    data: DS,
    shift_clock: SHCP,
    storage_clock: STCP,
    output_enable: OE,
    master_reset: MR,
    enabled: bool,
}

impl<DS, SHCP, STCP, OE, MR> OutputChain<DS, SHCP, STCP, OE, MR>
where
    DS: OutputPin,
    SHCP: OutputPin,
    STCP: OutputPin,
    OE: OutputPin,
    MR: OutputPin,
{
    /// Takes the pins with the outputs disabled. They stay disabled until the first word has
    /// been latched.
    pub fn new(
        data: DS,
        shift_clock: SHCP,
        storage_clock: STCP,
        output_enable: OE,
        master_reset: MR,
    ) -> Result<Self> {
        let mut chain = Self {
            data,
            shift_clock,
            storage_clock,
            output_enable,
            master_reset,
            enabled: false,
        };

        chain.output_enable.set_high().map_err(pin_error)?;
        chain.master_reset.set_high().map_err(pin_error)?;
        chain.shift_clock.set_low().map_err(pin_error)?;
        chain.storage_clock.set_low().map_err(pin_error)?;
        chain.data.set_low().map_err(pin_error)?;

        Ok(chain)
    }

    pub fn write<D: DelayNs>(&mut self, value: u16, delay: &mut D) -> Result<()> {
        // Clear the shift stage, the storage stage keeps driving the old word
        self.data.set_low().map_err(pin_error)?;
        self.master_reset.set_low().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);
        self.pulse_shift_clock(delay)?;
        self.master_reset.set_high().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);

        for bit in (0..WORD_BITS).rev() {
            let state = PinState::from(value & (1 << bit) != 0);
            self.data.set_state(state).map_err(pin_error)?;
            delay.delay_us(EDGE_DELAY_US);
            self.pulse_shift_clock(delay)?;
        }

        self.storage_clock.set_high().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);
        self.storage_clock.set_low().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);

        if !self.enabled {
            self.output_enable.set_low().map_err(pin_error)?;
            self.enabled = true;
        }

        Ok(())
    }

    fn pulse_shift_clock<D: DelayNs>(&mut self, delay: &mut D) -> Result<()> {
        self.shift_clock.set_high().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);
        self.shift_clock.set_low().map_err(pin_error)?;
        delay.delay_us(EDGE_DELAY_US);
        Ok(())
    }
}

/// How raw bits from the input chain are turned into an [`InputWord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "no-std", derive(defmt::Format))]
pub struct InputPolicy {
    /// Sense lines pull low when asserted.
    pub active_low: bool,
    /// Bits that are physically wired.
    pub mask: u16,
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self {
            active_low: true,
            mask: 0x3fff,
        }
    }
}

pub struct ShiftRegisterTransport<PL, CE, CP, Q, DS, SHCP, STCP, OE, MR, D> {
    inputs: InputChain<PL, CE, CP, Q>,
    outputs: OutputChain<DS, SHCP, STCP, OE, MR>,
    delay: D,
    policy: InputPolicy,
}

impl<PL, CE, CP, Q, DS, SHCP, STCP, OE, MR, D>
    ShiftRegisterTransport<PL, CE, CP, Q, DS, SHCP, STCP, OE, MR, D>
{
    pub fn new(
        inputs: InputChain<PL, CE, CP, Q>,
        outputs: OutputChain<DS, SHCP, STCP, OE, MR>,
        delay: D,
        policy: InputPolicy,
    ) -> Self {
        Self {
            inputs,
            outputs,
            delay,
            policy,
        }
    }
}

impl<PL, CE, CP, Q, DS, SHCP, STCP, OE, MR, D> Transport
    for ShiftRegisterTransport<PL, CE, CP, Q, DS, SHCP, STCP, OE, MR, D>
where
    PL: OutputPin,
    CE: OutputPin,
    CP: OutputPin,
    Q: InputPin,
    DS: OutputPin,
    SHCP: OutputPin,
    STCP: OutputPin,
    OE: OutputPin,
    MR: OutputPin,
    D: DelayNs,
{
    fn read_inputs(&mut self) -> Result<InputWord> {
        let raw = self.inputs.read(&mut self.delay)?;
        let raw = if self.policy.active_low { !raw } else { raw };
        Ok(InputWord::from_raw(raw & self.policy.mask))
    }

    fn write_outputs(&mut self, word: OutputWord) -> Result<()> {
        self.outputs.write(word.raw(), &mut self.delay)
    }
}
