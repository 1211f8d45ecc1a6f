use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::frame::FrameReader;
use super::transport::{self, Discovery};
use super::{process_telegram, publish, P1Error, P1Event};

pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 120;
/// DSMR 2.2 meters only send every 10 seconds and may pause longer
pub const MIN_LEGACY_TIMEOUT_SECS: u64 = 50;

const READ_BUFFER: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Device path or `host:port`, discovered when absent
    pub address: Option<String>,
    /// DSMR 2.2 serial parameters
    pub legacy: bool,
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings { address: None, legacy: false, timeout_secs: MIN_TIMEOUT_SECS }
    }
}

impl ConnectionSettings {
    pub fn idle_timeout(&self) -> Duration {
        let mut secs = self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        if self.legacy {
            secs = secs.max(MIN_LEGACY_TIMEOUT_SECS);
        }
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Owns one transport at a time, feeds it through framing and decoding
/// and closes it when it stays silent for longer than the idle timeout.
pub struct ConnectionManager {
    settings: ConnectionSettings,
    sender: Sender<P1Event>,
    discovery: Discovery,
    state: Arc<Mutex<ConnectionState>>,
    address: Option<String>,
    reader: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings, sender: Sender<P1Event>) -> Self {
        ConnectionManager {
            settings,
            sender,
            discovery: transport::discover,
            state: Arc::new(Mutex::new(ConnectionState::Closed)),
            address: None,
            reader: None,
        }
    }

    /// Replaces the serial port enumeration used when no address is configured
    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn state(&self) -> ConnectionState {
        current_state(&self.state)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Locates and opens the transport, then starts reading from it
    pub async fn open(&mut self) -> Result<(), P1Error> {
        if !transition(&self.state, ConnectionState::Closed, ConnectionState::Opening) {
            debug!("Open requested while {:?}, ignoring", self.state());
            return Ok(());
        }

        let address = match transport::locate(self.settings.address.as_deref(), self.discovery, &self.sender).await {
            Ok(address) => address,
            Err(e) => return Err(self.fail(e).await),
        };

        info!("Opening {}", address.to_string());
        let stream = match transport::connect(&address, self.settings.legacy).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e).await),
        };

        self.attach(&address.to_string(), stream).await;
        Ok(())
    }

    async fn fail(&mut self, e: P1Error) -> P1Error {
        error!("{}", e);
        set_state(&self.state, ConnectionState::Closed);
        publish(&self.sender, P1Event::Error(e.clone())).await;
        e
    }

    /// Starts reading from an already opened stream
    pub async fn attach<S>(&mut self, address: &str, stream: S)
    where
        S: AsyncRead + Unpin + Send + 'static,
    {
        let attachable = transition(&self.state, ConnectionState::Opening, ConnectionState::Open)
            || transition(&self.state, ConnectionState::Closed, ConnectionState::Open);
        if !attachable {
            warn!("Connection to {} is already {:?}, dropping new stream", address, self.state());
            return;
        }

        info!("Connected to {}", address);
        self.address = Some(address.to_string());
        publish(&self.sender, P1Event::Open(address.to_string())).await;

        let reader = StreamReader {
            address: address.to_string(),
            timeout: self.settings.idle_timeout(),
            state: self.state.clone(),
            sender: self.sender.clone(),
        };
        self.reader = Some(tokio::spawn(reader.run(stream)));
    }

    /// Stops reading and releases the transport. Safe to call in any state.
    pub async fn close(&mut self) {
        if !transition(&self.state, ConnectionState::Open, ConnectionState::Closing) {
            debug!("Close requested while {:?}, nothing to do", self.state());
            return;
        }

        // The reader owns the stream and the watchdog, aborting it drops both
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let address = self.address.take().unwrap_or_default();
        info!("Closed {}", address);
        set_state(&self.state, ConnectionState::Closed);
        publish(&self.sender, P1Event::Close(address)).await;
    }

    /// Resolves once the connection has closed on its own
    pub async fn wait_closed(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            let _ = reader.await;
        }
        self.reader = None;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

fn current_state(state: &Mutex<ConnectionState>) -> ConnectionState {
    match state.lock() {
        Ok(s) => *s,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn set_state(state: &Mutex<ConnectionState>, next: ConnectionState) {
    match state.lock() {
        Ok(mut s) => *s = next,
        Err(poisoned) => *poisoned.into_inner() = next,
    }
}

/// Moves `from` to `to` atomically, false if the state was not `from`
fn transition(state: &Mutex<ConnectionState>, from: ConnectionState, to: ConnectionState) -> bool {
    let mut guard = match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *guard != from {
        return false;
    }
    *guard = to;
    true
}

struct StreamReader {
    address: String,
    timeout: Duration,
    state: Arc<Mutex<ConnectionState>>,
    sender: Sender<P1Event>,
}

impl StreamReader {
    async fn run<S: AsyncRead + Unpin>(self, mut stream: S) {
        let mut frames = FrameReader::new();
        let mut buffer = [0u8; READ_BUFFER];

        let watchdog = sleep(self.timeout);
        tokio::pin!(watchdog);

        let failure = 'reading: loop {
            tokio::select! {
                _ = &mut watchdog => {
                    break Some(P1Error::IdleTimeout(self.timeout.as_secs()));
                }
                result = stream.read(&mut buffer) => match result {
                    Ok(0) => {
                        info!("{} closed the stream", self.address);
                        break None;
                    }
                    Ok(n) => {
                        watchdog.as_mut().reset(Instant::now() + self.timeout);
                        for frame in frames.push(&buffer[..n]) {
                            for event in process_telegram(&frame) {
                                if !publish(&self.sender, event).await {
                                    debug!("Stopping reader for {}", self.address);
                                    break 'reading None;
                                }
                            }
                        }
                    }
                    Err(e) => break Some(P1Error::Io(e.to_string())),
                }
            }
        };

        drop(stream);
        self.shut_down(failure).await;
    }

    async fn shut_down(&self, failure: Option<P1Error>) {
        // A concurrent close() already took care of the events
        if !transition(&self.state, ConnectionState::Open, ConnectionState::Closing) {
            return;
        }

        if let Some(e) = failure {
            error!("{}: {}", self.address, e);
            publish(&self.sender, P1Event::Error(e)).await;
        }

        info!("Closed {}", self.address);
        set_state(&self.state, ConnectionState::Closed);
        publish(&self.sender, P1Event::Close(self.address.clone())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_p1::telegrams;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc::{self, Receiver};

    fn manager() -> (ConnectionManager, Receiver<P1Event>) {
        let (tx, rx) = mpsc::channel(64);
        (ConnectionManager::new(ConnectionSettings::default(), tx), rx)
    }

    #[test]
    fn test_idle_timeout_is_clamped() {
        let settings = |timeout_secs, legacy| ConnectionSettings { address: None, legacy, timeout_secs };
        assert_eq!(settings(0, false).idle_timeout(), Duration::from_secs(5));
        assert_eq!(settings(30, false).idle_timeout(), Duration::from_secs(30));
        assert_eq!(settings(600, false).idle_timeout(), Duration::from_secs(120));
        assert_eq!(settings(5, true).idle_timeout(), Duration::from_secs(50));
        assert_eq!(settings(90, true).idle_timeout(), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_closes_connection() {
        let (mut manager, mut rx) = manager();
        let (_meter, stream) = tokio::io::duplex(1024);

        manager.attach("test", stream).await;
        assert!(manager.is_open());
        assert_eq!(rx.recv().await, Some(P1Event::Open("test".to_string())));

        assert_eq!(rx.recv().await, Some(P1Event::Error(P1Error::IdleTimeout(5))));
        assert_eq!(rx.recv().await, Some(P1Event::Close("test".to_string())));
        manager.wait_closed().await;
        assert_eq!(manager.state(), ConnectionState::Closed);

        // Nothing fires later
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_rewinds_watchdog() {
        let (mut manager, mut rx) = manager();
        let (mut meter, stream) = tokio::io::duplex(1024);

        manager.attach("test", stream).await;
        assert_eq!(rx.recv().await, Some(P1Event::Open("test".to_string())));

        for _ in 0..200 {
            meter.write_all(b"x").await.unwrap();
            tokio::time::sleep(Duration::from_millis(4500)).await;
        }

        assert!(manager.is_open());
        assert!(rx.try_recv().is_err());
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_telegram_events_in_order() {
        let (mut manager, mut rx) = manager();
        let (mut meter, stream) = tokio::io::duplex(4096);

        manager.attach("test", stream).await;
        meter.write_all(telegrams::V50.as_bytes()).await.unwrap();
        meter.write_all(b"/").await.unwrap();

        assert_eq!(rx.recv().await, Some(P1Event::Open("test".to_string())));
        assert_eq!(rx.recv().await, Some(P1Event::Telegram(telegrams::V50.to_string())));
        assert!(matches!(rx.recv().await, Some(P1Event::RawFields(_))));
        match rx.recv().await {
            Some(P1Event::Reading(r)) => assert_eq!(r.electricity.id.as_deref(), Some("E0045004014698317")),
            other => panic!("expected a reading, got {:?}", other),
        }
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_checksum_keeps_connection_open() {
        let (mut manager, mut rx) = manager();
        let (mut meter, stream) = tokio::io::duplex(4096);

        manager.attach("test", stream).await;
        meter.write_all(telegrams::V50.replace("!22EE", "!22EF").as_bytes()).await.unwrap();
        meter.write_all(b"/").await.unwrap();

        assert_eq!(rx.recv().await, Some(P1Event::Open("test".to_string())));
        assert!(matches!(rx.recv().await, Some(P1Event::Warning(_))));
        assert!(manager.is_open());
        assert!(rx.try_recv().is_err());
        manager.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let (mut manager, mut rx) = manager();
        let (_meter, stream) = tokio::io::duplex(1024);

        manager.close().await;
        manager.attach("test", stream).await;
        manager.close().await;
        manager.close().await;

        assert_eq!(rx.recv().await, Some(P1Event::Open("test".to_string())));
        assert_eq!(rx.recv().await, Some(P1Event::Close("test".to_string())));

        // The cancelled watchdog must not fire
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_stream_closes_without_error() {
        let (mut manager, mut rx) = manager();
        let (meter, stream) = tokio::io::duplex(1024);

        manager.attach("test", stream).await;
        drop(meter);
        manager.wait_closed().await;

        assert_eq!(rx.recv().await, Some(P1Event::Open("test".to_string())));
        assert_eq!(rx.recv().await, Some(P1Event::Close("test".to_string())));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_open_unreachable_relay_reports_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let settings = ConnectionSettings { address: Some("127.0.0.1:1".to_string()), ..Default::default() };
        let mut manager = ConnectionManager::new(settings, tx);

        assert!(matches!(manager.open().await, Err(P1Error::OpenFailed { .. })));
        assert!(matches!(rx.recv().await, Some(P1Event::Error(P1Error::OpenFailed { .. }))));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_open_without_meter_cable() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut manager = ConnectionManager::new(ConnectionSettings::default(), tx)
            .with_discovery(|| Ok(vec![transport::PortDescriptor::new("/dev/ttyS0")]));

        assert_eq!(manager.open().await, Err(P1Error::DeviceNotFound));
        assert!(matches!(rx.recv().await, Some(P1Event::PortsDiscovered(ports)) if ports.len() == 1));
        assert_eq!(rx.recv().await, Some(P1Event::Error(P1Error::DeviceNotFound)));
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(!manager.is_open());
    }

    #[tokio::test]
    async fn test_discovery_failure_is_reported() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut manager = ConnectionManager::new(ConnectionSettings::default(), tx)
            .with_discovery(|| Err(P1Error::Io("no ports".to_string())));

        assert_eq!(manager.open().await, Err(P1Error::Io("no ports".to_string())));
        assert_eq!(rx.recv().await, Some(P1Event::Error(P1Error::Io("no ports".to_string()))));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }
}
