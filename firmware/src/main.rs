#![no_std]
#![no_main]

mod io_loop;
mod rpc_server;
mod shift_register;
mod weather_uart;

use assign_resources::assign_resources;
use core::cell::RefCell;
use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::{
    gpio::{Level, Output},
    peripherals,
    watchdog::Watchdog,
    Peri,
};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Timer};
use git_version::git_version;
#[cfg(feature = "panic-probe")]
use panic_probe as _;
use portable_atomic as _;
use static_cell::StaticCell;
use tsboard_core::{
    dome::DomeConfiguration, safety::SafetyMonitorConfiguration, Controller, ControllerConfig,
};

assign_resources! {
    status: StatusResources {
        watchdog: WATCHDOG,
        led: PIN_25,
    },
    output_chain: OutputChainResources {
        output_enable: PIN_2,
        storage_clock: PIN_3,
        master_reset: PIN_4,
        shift_clock: PIN_5,
        data: PIN_6,
    },
    input_chain: InputChainResources {
        clock_enable: PIN_7,
        clock: PIN_8,
        parallel_load: PIN_9,
        data: PIN_10,
    },
    rpc: RpcResources {
        uart: UART0,
        tx_pin: PIN_0,
        rx_pin: PIN_1,
    },
    weather: WeatherResources {
        uart: UART1,
        tx_pin: PIN_20,
        rx_pin: PIN_21,
    },
}

pub(crate) type SharedController = Mutex<CriticalSectionRawMutex, RefCell<Controller>>;

#[cfg(not(feature = "panic-probe"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    use tsboard_core::io::OutputWord;

    let p = unsafe { embassy_rp::Peripherals::steal() };
    let r = split_resources!(p);

    // Release both roof relays and every indicator
    let mut outputs = shift_register::output_chain(r.output_chain).ok();
    let mut delay = embassy_time::Delay;

    let mut watchdog = Watchdog::new(r.status.watchdog);
    let mut led = Output::new(r.status.led, Level::Low);

    loop {
        // Keep feeding the watchdog so that we do not quickly reset.
        // Panics should be properly investigated.
        watchdog.feed();

        if let Some(outputs) = outputs.as_mut() {
            let _ = outputs.write(OutputWord::SAFE.raw(), &mut delay);
        }

        // Blink the on-board LED pretty fast
        led.toggle();

        embassy_time::block_for(Duration::from_millis(50));
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    info!("Version: {}", git_version!());

    static CONTROLLER: StaticCell<SharedController> = StaticCell::new();
    let controller: &'static SharedController =
        CONTROLLER.init(Mutex::new(RefCell::new(Controller::new(
            ControllerConfig::default(),
            DomeConfiguration::default(),
            SafetyMonitorConfiguration::default(),
        ))));

    spawner.must_spawn(watchdog_feed_task(r.status));
    spawner.must_spawn(io_loop::task(r.input_chain, r.output_chain, controller));
    spawner.must_spawn(weather_uart::task(r.weather, controller));
    spawner.must_spawn(rpc_server::task(r.rpc, controller));

    #[cfg(feature = "test-panic")]
    spawner.must_spawn(dummy_panic());
}

#[embassy_executor::task]
async fn watchdog_feed_task(r: StatusResources) {
    let mut watchdog = Watchdog::new(r.watchdog);
    watchdog.start(Duration::from_secs(5));

    let mut led = Output::new(r.led, Level::Low);

    loop {
        Timer::after_secs(1).await;

        // Flash LED steadily to indicate normal operation
        watchdog.feed();
        led.toggle();
    }
}

#[cfg(feature = "test-panic")]
#[embassy_executor::task]
async fn dummy_panic() {
    Timer::after_secs(5).await;
    panic!("oh dear, how sad. nevermind...");
}
