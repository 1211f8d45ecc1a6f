use log::{debug, error, info, warn};
use p1meter::{process_telegram, ConfigHolder, P1Event, P1Manager};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

async fn log_events(mut receiver: Receiver<P1Event>) {
    while let Some(event) = receiver.recv().await {
        match event {
            P1Event::PortsDiscovered(ports) => {
                for port in ports {
                    debug!("Found serial port {} ({:?}:{:?})", port.path, port.vendor_id, port.product_id);
                }
            }
            P1Event::Open(address) => info!("Reading telegrams from {}", address),
            P1Event::Close(address) => info!("Stopped reading from {}", address),
            P1Event::Telegram(raw) => debug!("Telegram:\n{}", raw),
            P1Event::RawFields(fields) => debug!("Decoded {} fields", fields.len()),
            P1Event::Reading(reading) => match serde_json::to_string(&reading) {
                Ok(json) => info!("{}", json),
                Err(e) => error!("Unable to serialize reading: {}", e),
            },
            // Already logged where they happened
            P1Event::Warning(_) | P1Event::Error(_) => {}
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    let default_filter = std::env::var("P1_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match ConfigHolder::load() {
        Ok(holder) => holder.config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let (sender, receiver) = tokio::sync::mpsc::channel(100);
    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    threads.push(tokio::spawn(log_events(receiver)));

    if let Some(telegram) = config.sample_telegram() {
        info!("Decoding configured sample telegram {}", config.telegram.as_deref().unwrap_or_default());
        for event in process_telegram(telegram) {
            if sender.send(event).await.is_err() {
                warn!("Event logger is gone");
            }
        }
    }

    let mut p1 = P1Manager::new(config.to_settings(), config.reconnect_interval(), sender);
    threads.push(tokio::spawn(async move {
        p1.start_thread().await;
    }));

    info!("P1 reader started, waiting for a signal to exit");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = wait_any(&mut threads) => warn!("A task ended unexpectedly, shutting down"),
    }

    for task in threads.iter() {
        task.abort();
    }
}

async fn wait_any(threads: &mut [JoinHandle<()>]) {
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        if threads.iter().any(|t| t.is_finished()) {
            return;
        }
    }
}
