use log::{debug, info};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;

use super::{publish, P1Error, P1Event};

/// Boxed byte source handed to the connection
pub type TransportStream = Box<dyn AsyncRead + Unpin + Send>;

/// Lists the local serial ports, `discover` unless replaced
pub type Discovery = fn() -> Result<Vec<PortDescriptor>, P1Error>;

/// USB to serial bridges found in P1 cables (vendor id, product id)
const METER_CABLES: &[(u16, u16)] = &[
    (0x0403, 0x6001), // FTDI FT232R
    (0x067b, 0x2303), // Prolific PL2303
];

/// A locally visible serial device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortDescriptor {
    pub path: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
}

impl PortDescriptor {
    pub fn new(path: &str) -> Self {
        PortDescriptor {
            path: path.to_string(),
            vendor_id: None,
            product_id: None,
            manufacturer: None,
            serial_number: None,
        }
    }
}

/// Where a meter can be read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAddress {
    /// Local device path
    Serial(String),
    /// `host:port` of a relay forwarding the raw serial bytes
    Network(String),
}

impl TransportAddress {
    /// Device paths start with `/` or are Windows COM names, anything with a port is a network relay
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        let is_device = address.starts_with('/') || address.to_uppercase().starts_with("COM");

        match address.rsplit_once(':') {
            Some((host, port)) if !is_device && !host.is_empty() && port.parse::<u16>().is_ok() => {
                TransportAddress::Network(address.to_string())
            }
            _ => TransportAddress::Serial(address.to_string()),
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            TransportAddress::Serial(path) => path.clone(),
            TransportAddress::Network(host) => host.clone(),
        }
    }
}

pub fn is_meter_cable(port: &PortDescriptor) -> bool {
    match (port.vendor_id, port.product_id) {
        (Some(vid), Some(pid)) => METER_CABLES.contains(&(vid, pid)),
        _ => false,
    }
}

#[cfg(feature = "serial")]
pub fn discover() -> Result<Vec<PortDescriptor>, P1Error> {
    use tokio_serial::SerialPortType;

    let ports = tokio_serial::available_ports()
        .map_err(|e| P1Error::Io(format!("Unable to enumerate serial ports: {}", e)))?;

    Ok(ports.into_iter().map(|port| {
        let mut descriptor = PortDescriptor::new(&port.port_name);
        if let SerialPortType::UsbPort(usb) = port.port_type {
            descriptor.vendor_id = Some(usb.vid);
            descriptor.product_id = Some(usb.pid);
            descriptor.manufacturer = usb.manufacturer;
            descriptor.serial_number = usb.serial_number;
        }
        descriptor
    }).collect())
}

#[cfg(not(feature = "serial"))]
pub fn discover() -> Result<Vec<PortDescriptor>, P1Error> {
    debug!("Built without serial support, no local ports to discover");
    Ok(Vec::new())
}

/// First meter cable among the given ports
pub fn select_port(ports: &[PortDescriptor]) -> Result<TransportAddress, P1Error> {
    ports.iter()
        .find(|p| is_meter_cable(p))
        .map(|p| TransportAddress::Serial(p.path.clone()))
        .ok_or(P1Error::DeviceNotFound)
}

/// Resolves the address to read from. An explicit address is returned unchecked,
/// otherwise the discovered ports are published and the first meter cable wins.
pub async fn locate(explicit: Option<&str>, discovery: Discovery, sender: &Sender<P1Event>) -> Result<TransportAddress, P1Error> {
    if let Some(address) = explicit.filter(|a| !a.trim().is_empty()) {
        return Ok(TransportAddress::parse(address));
    }

    let ports = discovery()?;
    debug!("Discovered {} serial ports", ports.len());
    publish(sender, P1Event::PortsDiscovered(ports.clone())).await;

    let address = select_port(&ports)?;
    info!("Found P1 cable at {}", address.to_string());
    Ok(address)
}

/// Opens the transport. Serial devices use 115200 8N1, or 9600 7E1 for DSMR 2.2 meters.
pub async fn connect(address: &TransportAddress, legacy: bool) -> Result<TransportStream, P1Error> {
    match address {
        TransportAddress::Network(host) => {
            let stream = TcpStream::connect(host.as_str()).await
                .map_err(|e| P1Error::OpenFailed { address: host.clone(), reason: e.to_string() })?;
            Ok(Box::new(stream))
        }
        TransportAddress::Serial(path) => open_serial(path, legacy),
    }
}

#[cfg(feature = "serial")]
fn open_serial(path: &str, legacy: bool) -> Result<TransportStream, P1Error> {
    use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

    let builder = if legacy {
        tokio_serial::new(path, 9600)
            .data_bits(DataBits::Seven)
            .parity(Parity::Even)
    } else {
        tokio_serial::new(path, 115_200)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
    };

    let stream = builder
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| P1Error::OpenFailed { address: path.to_string(), reason: e.to_string() })?;

    Ok(Box::new(stream))
}

#[cfg(not(feature = "serial"))]
fn open_serial(path: &str, _legacy: bool) -> Result<TransportStream, P1Error> {
    Err(P1Error::OpenFailed { address: path.to_string(), reason: "built without serial support".to_string() })
}
