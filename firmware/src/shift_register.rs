use crate::{InputChainResources, OutputChainResources};
use defmt::unwrap;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_time::Delay;
use tsboard_core::transport::{
    InputChain, InputPolicy, OutputChain, Result, ShiftRegisterTransport,
};

pub(crate) type Outputs = OutputChain<
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
>;

pub(crate) type Transport = ShiftRegisterTransport<
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Input<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Output<'static>,
    Delay,
>;

/// The 74HC595 chain, with the outputs held disabled until the first write.
pub(crate) fn output_chain(r: OutputChainResources) -> Result<Outputs> {
    OutputChain::new(
        Output::new(r.data, Level::Low),
        Output::new(r.shift_clock, Level::Low),
        Output::new(r.storage_clock, Level::Low),
        Output::new(r.output_enable, Level::High),
        Output::new(r.master_reset, Level::High),
    )
}

pub(crate) fn transport(inputs: InputChainResources, outputs: OutputChainResources) -> Transport {
    let inputs = unwrap!(InputChain::new(
        Output::new(inputs.parallel_load, Level::High),
        Output::new(inputs.clock_enable, Level::High),
        Output::new(inputs.clock, Level::Low),
        Input::new(inputs.data, Pull::None),
    ));
    let outputs = unwrap!(output_chain(outputs));

    ShiftRegisterTransport::new(inputs, outputs, Delay, InputPolicy::default())
}
