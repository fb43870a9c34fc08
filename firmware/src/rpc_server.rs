use crate::{RpcResources, SharedController};
use core::time::Duration as CoreDuration;
use defmt::{debug, warn};
use embassy_rp::{
    bind_interrupts,
    peripherals::UART0,
    uart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig},
};
use embassy_time::Instant;
use static_cell::StaticCell;
use teeny_rpc::{server::Server, transport::embedded::EioTransport};
use tsboard_core::rpc::{Request, Response, SERIAL_BAUD};

bind_interrupts!(struct Irqs {
    UART0_IRQ  => BufferedInterruptHandler<UART0>;
});

#[embassy_executor::task]
pub(crate) async fn task(r: RpcResources, controller: &'static SharedController) {
    const TX_BUFFER_SIZE: usize = 256;
    static TX_BUFFER: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
    let tx_buffer = &mut TX_BUFFER.init([0; TX_BUFFER_SIZE])[..];

    const RX_BUFFER_SIZE: usize = 256;
    static RX_BUFFER: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();
    let rx_buffer = &mut RX_BUFFER.init([0; RX_BUFFER_SIZE])[..];

    let mut config = UartConfig::default();
    config.baudrate = SERIAL_BAUD;

    let uart = BufferedUart::new(
        r.uart, r.tx_pin, r.rx_pin, Irqs, tx_buffer, rx_buffer, config,
    );

    let transport = EioTransport::<_, 512>::new(uart);
    let mut server = Server::<_, Request, Response>::new(transport, CoreDuration::from_millis(100));

    loop {
        match server.wait_for_request(CoreDuration::from_secs(5)).await {
            Ok(request) => {
                debug!("Request: {}", request);

                let response =
                    controller.lock(|c| c.borrow_mut().handle_request(Instant::now(), request));

                if let Err(e) = server.send_response(response).await {
                    warn!("Server failed sending response: {}", e);
                }
            }
            Err(teeny_rpc::Error::Timeout) => {
                debug!("Timeout when waiting for request");
            }
            Err(e) => {
                warn!("Server failed waiting for request: {}", e);
            }
        }
    }
}
