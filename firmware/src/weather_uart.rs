use crate::{SharedController, WeatherResources};
use defmt::warn;
use embassy_rp::{
    bind_interrupts,
    peripherals::UART1,
    uart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig},
};
use embassy_time::Instant;
use embedded_io_async::Read;
use static_cell::StaticCell;
use tsboard_core::weather::SERIAL_BAUD;

bind_interrupts!(struct Irqs {
    UART1_IRQ  => BufferedInterruptHandler<UART1>;
});

#[embassy_executor::task]
pub(crate) async fn task(r: WeatherResources, controller: &'static SharedController) {
    const TX_BUFFER_SIZE: usize = 16;
    static TX_BUFFER: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
    let tx_buffer = &mut TX_BUFFER.init([0; TX_BUFFER_SIZE])[..];

    const RX_BUFFER_SIZE: usize = 128;
    static RX_BUFFER: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
    let rx_buffer = &mut RX_BUFFER.init([0; RX_BUFFER_SIZE])[..];

    let mut config = UartConfig::default();
    config.baudrate = SERIAL_BAUD;

    let mut uart = BufferedUart::new(
        r.uart, r.tx_pin, r.rx_pin, Irqs, tx_buffer, rx_buffer, config,
    );

    let mut buffer = [0u8; 32];

    loop {
        match uart.read(&mut buffer).await {
            Ok(n) => {
                let bytes = &buffer[..n];
                controller.lock(|c| c.borrow_mut().receive_weather(Instant::now(), bytes));
            }
            Err(e) => {
                warn!("Weather station UART read failed: {}", e);
            }
        }
    }
}
