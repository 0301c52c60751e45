/*!
 * vmprocd - Main Entry Point
 *
 * In-guest supervision agent:
 * - opens the inbound/outbound control devices (fatal on failure)
 * - starts the outbound flush loop and announces Online
 * - runs the serial inbound command loop on the main thread
 */

use std::error::Error;
use std::sync::Arc;

use tracing::info;

use vmproc_agent::{
    init_tracing, spawn_flush_loop, AgentConfig, Dispatcher, Event, EventQueue,
    InboundReader, ProcessTable, RxChannel, TxChannel,
};

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    info!("vmprocd starting");
    let config = AgentConfig::from_env();
    info!(
        rx = %config.rx_path.display(),
        tx = %config.tx_path.display(),
        "Opening control channels"
    );

    // The only fatal errors: without both channels there is no agent.
    let rx = RxChannel::open(&config.rx_path)?;
    let tx = TxChannel::open(&config.tx_path)?;

    let table = Arc::new(ProcessTable::new());
    let events = Arc::new(EventQueue::new());

    spawn_flush_loop(Arc::clone(&events), tx)?;
    events.push(Event::online());
    info!("Agent online");

    let dispatcher = Dispatcher::new(table, Arc::clone(&events));
    InboundReader::new(rx, dispatcher).run();

    Ok(())
}
