//! # Connection and Encoding Configuration
//!
//! Plain configuration records supplied by the caller before any I/O.
//! All of them derive serde so an application can load them from its own
//! configuration format; this crate never reads files itself.
//!
//! ```rust
//! use ems_modbus_master::config::{ConnectionConfig, ModbusConfig, Parity};
//!
//! let config: ModbusConfig = serde_json::from_str(r#"{
//!     "connection": {
//!         "type": "rtu",
//!         "serial_port": "/dev/ttyUSB0",
//!         "baud_rate": 9600,
//!         "data_bits": 8,
//!         "stop_bits": 1,
//!         "parity": "N"
//!     },
//!     "timeout": { "sec": 3, "usec": 0 },
//!     "slave_id": 1
//! }"#).unwrap();
//!
//! match &config.connection {
//!     ConnectionConfig::Rtu(rtu) => assert_eq!(rtu.parity, Parity::None),
//!     ConnectionConfig::Tcp(_) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_USEC};
use crate::error::{ModbusError, ModbusResult};

// ============================================================================
// Name tables
// ============================================================================

/// Static value/name mapping for configuration enums.
///
/// Lookups lower-case and trim their input, so `"Holding_Register"` and
/// `"holding_register"` resolve to the same value.
pub trait NamedEnum: Copy + PartialEq + Sized + 'static {
    /// Every value with its canonical name.
    const NAMES: &'static [(Self, &'static str)];

    /// Canonical name of this value.
    fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(value, _)| *value == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    /// Resolve a name to its value.
    fn lookup(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(_, candidate)| *candidate == normalized)
            .map(|(value, _)| *value)
    }

    /// All values in table order.
    fn all() -> impl Iterator<Item = Self> {
        Self::NAMES.iter().map(|(value, _)| *value)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Transport kind. Only RTU and TCP are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Tcp,
    Rtu,
}

impl NamedEnum for ConnectionType {
    const NAMES: &'static [(Self, &'static str)] = &[(Self::Tcp, "tcp"), (Self::Rtu, "rtu")];
}

impl FromStr for ConnectionType {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ModbusError::ConnectionType {
            value: s.to_string(),
        })
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Modbus TCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Host name or IP address
    pub ip: String,
    /// Port, 502 unless the device says otherwise
    #[serde(default = "default_tcp_port")]
    pub port: u16,
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

impl TcpConfig {
    pub fn new<S: Into<String>>(ip: S, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.ip.trim().is_empty() {
            return Err(ModbusError::configuration("tcp ip address is empty"));
        }
        if self.port == 0 {
            return Err(ModbusError::configuration("tcp port must be non-zero"));
        }
        Ok(())
    }
}

/// Serial parity, written as the single characters `N`, `E` and `O`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl TryFrom<char> for Parity {
    type Error = ModbusError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value.to_ascii_uppercase() {
            'N' => Ok(Self::None),
            'E' => Ok(Self::Even),
            'O' => Ok(Self::Odd),
            _ => Err(ModbusError::RtuParity {
                value: value.to_string(),
            }),
        }
    }
}

impl From<Parity> for char {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }
}

impl FromStr for Parity {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::try_from(c),
            _ => match s.trim().to_ascii_lowercase().as_str() {
                "none" => Ok(Self::None),
                "even" => Ok(Self::Even),
                "odd" => Ok(Self::Odd),
                _ => Err(ModbusError::RtuParity {
                    value: s.to_string(),
                }),
            },
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// Modbus RTU serial line settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtuConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM4`
    pub serial_port: String,
    pub baud_rate: u32,
    /// 5, 6, 7 or 8
    pub data_bits: u8,
    /// 1 or 2
    pub stop_bits: u8,
    pub parity: Parity,
}

impl RtuConfig {
    /// 8 data bits, 1 stop bit, no parity.
    pub fn new<S: Into<String>>(serial_port: S, baud_rate: u32) -> Self {
        Self {
            serial_port: serial_port.into(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }

    pub fn with_data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: u8) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.serial_port.trim().is_empty() {
            return Err(ModbusError::configuration("rtu serial port is empty"));
        }
        if self.baud_rate == 0 {
            return Err(ModbusError::configuration("rtu baud rate must be non-zero"));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(ModbusError::configuration(format!(
                "rtu data bits must be 5-8, got {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(ModbusError::configuration(format!(
                "rtu stop bits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        Ok(())
    }
}

/// Link settings. The variant selects the transport built by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Tcp(TcpConfig),
    Rtu(RtuConfig),
}

impl ConnectionConfig {
    pub fn connection_type(&self) -> ConnectionType {
        match self {
            Self::Tcp(_) => ConnectionType::Tcp,
            Self::Rtu(_) => ConnectionType::Rtu,
        }
    }

    pub fn validate(&self) -> ModbusResult<()> {
        match self {
            Self::Tcp(tcp) => tcp.validate(),
            Self::Rtu(rtu) => rtu.validate(),
        }
    }
}

impl From<TcpConfig> for ConnectionConfig {
    fn from(config: TcpConfig) -> Self {
        Self::Tcp(config)
    }
}

impl From<RtuConfig> for ConnectionConfig {
    fn from(config: RtuConfig) -> Self {
        Self::Rtu(config)
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(tcp) => write!(f, "tcp://{}:{}", tcp.ip, tcp.port),
            Self::Rtu(rtu) => write!(
                f,
                "rtu:{}@{} {}{}{}",
                rtu.serial_port, rtu.baud_rate, rtu.data_bits, rtu.parity, rtu.stop_bits
            ),
        }
    }
}

// ============================================================================
// Timeout
// ============================================================================

/// Response timeout split into seconds and microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeout {
    pub sec: u64,
    #[serde(default)]
    pub usec: u32,
}

impl Timeout {
    pub fn new(sec: u64, usec: u32) -> Self {
        Self { sec, usec }
    }

    /// Rejects a zero timeout and a microsecond part of one second or more.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.usec > MAX_TIMEOUT_USEC {
            return Err(ModbusError::configuration(format!(
                "timeout usec must be at most {}, got {}",
                MAX_TIMEOUT_USEC, self.usec
            )));
        }
        if self.sec == 0 && self.usec == 0 {
            return Err(ModbusError::configuration("timeout must be non-zero"));
        }
        Ok(())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::new(self.sec, self.usec.saturating_mul(1_000))
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self {
            sec: DEFAULT_TIMEOUT_SECS,
            usec: 0,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self {
            sec: duration.as_secs(),
            usec: duration.subsec_micros(),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Order of the 16-bit words making up a multi-register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Most significant first, e.g. AB
    #[default]
    Big,
    /// Least significant first, e.g. BA
    Little,
}

impl NamedEnum for Endianness {
    const NAMES: &'static [(Self, &'static str)] = &[(Self::Big, "big"), (Self::Little, "little")];
}

impl FromStr for Endianness {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ModbusError::encoding(format!("unknown endianness: {}", s)))
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How multi-register values are laid out on the wire.
///
/// `byte_swap` exchanges the two bytes inside each register; `endianness`
/// decides the word order. Together they produce the four orders seen on
/// field devices:
///
/// | endianness | byte_swap | 32-bit layout |
/// |------------|-----------|---------------|
/// | Big | false | AB CD |
/// | Little | false | DC BA |
/// | Big | true | BA DC |
/// | Little | true | CD AB |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Encoding {
    #[serde(default)]
    pub byte_swap: bool,
    #[serde(default)]
    pub endianness: Endianness,
}

impl Encoding {
    pub fn new(endianness: Endianness, byte_swap: bool) -> Self {
        Self {
            byte_swap,
            endianness,
        }
    }

    /// AB CD, the Modbus default.
    pub fn big_endian() -> Self {
        Self::new(Endianness::Big, false)
    }

    /// Every (endianness, byte_swap) combination.
    pub fn all() -> [Self; 4] {
        [
            Self::new(Endianness::Big, false),
            Self::new(Endianness::Little, false),
            Self::new(Endianness::Big, true),
            Self::new(Endianness::Little, true),
        ]
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.byte_swap {
            write!(f, "{} (byte swap)", self.endianness)
        } else {
            write!(f, "{}", self.endianness)
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Everything needed to open a session against one slave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub timeout: Timeout,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
}

fn default_slave_id() -> u8 {
    1
}

impl ModbusConfig {
    pub fn new<C: Into<ConnectionConfig>>(connection: C) -> Self {
        Self {
            connection: connection.into(),
            timeout: Timeout::default(),
            encoding: Encoding::default(),
            slave_id: default_slave_id(),
        }
    }

    pub fn validate(&self) -> ModbusResult<()> {
        self.connection.validate()?;
        self.timeout.validate()
    }
}
