use soullink::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let config = LogConfig {
        filter: "soullink=trace,debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!(target: "soullink::realtime", attempt = 1, "reconnect trace log");
    debug!(delay_ms = 1000u64, "application debug log");
    info!("application info log");

    Ok(())
}
