use crate::{InputChainResources, OutputChainResources, SharedController};
use embassy_time::{Duration, Instant, Ticker};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[embassy_executor::task]
pub(crate) async fn task(
    inputs: InputChainResources,
    outputs: OutputChainResources,
    controller: &'static SharedController,
) {
    let mut transport = crate::shift_register::transport(inputs, outputs);
    let mut ticker = Ticker::every(POLL_INTERVAL);

    loop {
        ticker.next().await;

        controller.lock(|c| c.borrow_mut().poll(Instant::now(), &mut transport));
    }
}
