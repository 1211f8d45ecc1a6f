use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

use crate::models::Reading;

pub mod assembler;
pub mod connection;
pub mod frame;
pub mod meter_definitions;
pub mod obis_parser;
pub mod structs;
pub mod telegrams;
pub mod transport;
pub mod utils;
pub mod validator;

use connection::{ConnectionManager, ConnectionSettings};
use obis_parser::FieldDecoder;
use structs::FlatFieldMap;
use transport::{Discovery, PortDescriptor};

/// Conditions that end the current connection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum P1Error {
    #[error("No P1 cable found")]
    DeviceNotFound,
    #[error("Unable to open {address}: {reason}")]
    OpenFailed { address: String, reason: String },
    #[error("No data received for {0} seconds")]
    IdleTimeout(u64),
    #[error("Transport error: {0}")]
    Io(String),
}

/// Conditions that discard a single telegram
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelegramError {
    #[error("Malformed telegram: {0}")]
    Malformed(&'static str),
    #[error("Checksum mismatch: telegram says {expected:04X}, computed {computed:04X}")]
    ChecksumMismatch { expected: u16, computed: u16 },
}

/// Conditions that discard a single field
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(String),
    #[error("invalid token {0}")]
    InvalidToken(String),
    #[error("unknown unit {0}")]
    UnknownUnit(String),
    #[error("unknown breaker value {0}")]
    UnknownBreakerValue(i64),
    #[error("missing token at position {0}")]
    MissingToken(usize),
}

/// Everything the reader publishes, in the order it happens
#[derive(Debug, Clone, PartialEq)]
pub enum P1Event {
    PortsDiscovered(Vec<PortDescriptor>),
    Open(String),
    Close(String),
    /// Raw wire content of a verified telegram
    Telegram(String),
    RawFields(FlatFieldMap),
    Reading(Reading),
    Warning(String),
    Error(P1Error),
}

/// Sends an event, returns false once nobody is listening anymore
pub async fn publish(sender: &Sender<P1Event>, event: P1Event) -> bool {
    match sender.send(event).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Event receiver dropped, discarding {:?}", e.0);
            false
        }
    }
}

/// Validates, decodes and assembles one framed telegram, as received from the wire
pub fn process_telegram(frame: impl AsRef<[u8]>) -> Vec<P1Event> {
    let telegram = match validator::validate(frame) {
        Ok(t) => t,
        Err(e) => {
            warn!("Dropping telegram: {}", e);
            return vec![P1Event::Warning(e.to_string())];
        }
    };

    debug!("Received telegram {}", telegram.header);
    let mut events = vec![P1Event::Telegram(telegram.raw.clone())];

    let outcome = FieldDecoder::new().decode(&telegram);
    events.extend(outcome.warnings.into_iter().map(P1Event::Warning));

    let reading = assembler::assemble(&outcome.fields);
    events.push(P1Event::RawFields(outcome.fields));
    events.push(P1Event::Reading(reading));
    events
}

/// Keeps a connection to the meter up, reopening it after a fixed interval.
/// Gives up when discovery finds no cable at all.
pub struct P1Manager {
    settings: ConnectionSettings,
    reconnect_interval: Duration,
    sender: Sender<P1Event>,
    discovery: Discovery,
}

impl P1Manager {
    pub fn new(settings: ConnectionSettings, reconnect_interval: Duration, sender: Sender<P1Event>) -> Self {
        Self { settings, reconnect_interval, sender, discovery: transport::discover }
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = discovery;
        self
    }

    pub async fn start_thread(&mut self) {
        info!("Starting P1 thread");

        loop {
            let mut connection = ConnectionManager::new(self.settings.clone(), self.sender.clone())
                .with_discovery(self.discovery);

            match connection.open().await {
                Ok(()) => connection.wait_closed().await,
                Err(P1Error::DeviceNotFound) => {
                    info!("No address configured, stopping P1 thread");
                    break;
                }
                // Already reported by the connection
                Err(e) => debug!("Connection attempt failed: {}", e),
            }

            if self.sender.is_closed() {
                info!("No more event consumers, stopping P1 thread");
                break;
            }

            info!("Reconnecting in {} seconds", self.reconnect_interval.as_secs());
            tokio::time::sleep(self.reconnect_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_valid_telegram_event_order() {
        let events = process_telegram(telegrams::V50);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], P1Event::Telegram(telegrams::V50.to_string()));
        assert!(matches!(events[1], P1Event::RawFields(_)));
        let P1Event::Reading(reading) = &events[2] else { panic!("no reading") };
        assert_eq!(reading.electricity.consumption.total, Some(2213.501));
    }

    #[test]
    fn test_process_frame_without_delimiter() {
        let events = process_telegram(&telegrams::V42[1..]);
        assert_eq!(events[0], P1Event::Telegram(telegrams::V42.to_string()));
    }

    #[test]
    fn test_corrupted_checksum_gives_one_warning() {
        let events = process_telegram(&telegrams::V50.replace("!22EE", "!22EF"));
        assert_eq!(events.len(), 1);
        let P1Event::Warning(message) = &events[0] else { panic!("no warning") };
        assert!(message.contains("22EF"));
    }

    #[test]
    fn test_unknown_code_still_gives_reading() {
        let telegram = telegrams::V50
            .replace("0-0:96.13.0()\r\n", "0-0:96.13.0()\r\n0-0:96.99.9(00042)\r\n")
            .replace("!22EE", "!C35C");
        let events = process_telegram(&telegram);

        let warnings: Vec<&P1Event> = events.iter().filter(|e| matches!(e, P1Event::Warning(_))).collect();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], P1Event::Warning(m) if m.contains("0-0:96.99.9")));

        let P1Event::Reading(reading) = events.last().unwrap() else { panic!("no reading") };
        assert_eq!(reading.electricity.power, Some(276.0));
        assert_eq!(reading.gas().and_then(|g| g.consumption), Some(485.627));
    }

    #[test]
    fn test_malformed_frame_gives_warning() {
        let events = process_telegram("garbage without structure");
        assert_eq!(events, vec![P1Event::Warning("Malformed telegram: missing header".to_string())]);
    }

    #[test]
    fn test_non_ascii_header_through_reader() {
        let mut body = b"/AB\xB0C\r\n\r\n1-0:1.8.1(000001.000*kWh)\r\n!".to_vec();
        let crc = validator::calculate_crc(&body);
        body.extend_from_slice(format!("{:04X}\r\n", crc).as_bytes());
        body.push(b'/');

        let mut reader = frame::FrameReader::new();
        let frames = reader.push(&body);
        assert_eq!(frames.len(), 1);

        let events = process_telegram(&frames[0]);
        assert_eq!(events.len(), 3, "{:?}", events);
        let P1Event::Telegram(raw) = &events[0] else { panic!("no telegram") };
        assert!(raw.starts_with("/AB\u{b0}C\r\n"));
        let P1Event::Reading(reading) = &events[2] else { panic!("no reading") };
        assert_eq!(reading.header, "AB\u{b0}C");
        assert_eq!(reading.electricity.consumption.low, Some(1.0));
    }

    #[tokio::test]
    async fn test_publish_reports_dropped_receiver() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        assert!(publish(&tx, P1Event::Open("COM1".to_string())).await);
        assert_eq!(rx.recv().await, Some(P1Event::Open("COM1".to_string())));
        drop(rx);
        assert!(!publish(&tx, P1Event::Close("COM1".to_string())).await);
    }

    #[tokio::test]
    async fn test_manager_stops_without_consumers() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        drop(rx);

        let settings = ConnectionSettings { address: Some("127.0.0.1:1".to_string()), ..Default::default() };
        let mut manager = P1Manager::new(settings, Duration::from_secs(1), tx);
        let stopped = tokio::time::timeout(Duration::from_secs(5), manager.start_thread()).await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_manager_stops_without_meter_cable() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut manager = P1Manager::new(ConnectionSettings::default(), Duration::from_secs(1), tx)
            .with_discovery(|| Ok(Vec::new()));

        let stopped = tokio::time::timeout(Duration::from_secs(5), manager.start_thread()).await;
        assert!(stopped.is_ok());
        assert_eq!(rx.recv().await, Some(P1Event::PortsDiscovered(Vec::new())));
        assert_eq!(rx.recv().await, Some(P1Event::Error(P1Error::DeviceNotFound)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(P1Error::IdleTimeout(5).to_string(), "No data received for 5 seconds");
        let e = TelegramError::ChecksumMismatch { expected: 0x22EF, computed: 0x22EE };
        assert_eq!(e.to_string(), "Checksum mismatch: telegram says 22EF, computed 22EE");
    }
}
