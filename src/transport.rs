//! # Transport Layer
//!
//! The [`ModbusTransport`] trait is the boundary between the transaction layer
//! and the wire. Framing (MBAP for TCP, CRC for RTU) belongs to the transport;
//! the session above only sees element slices and a [`TransportError`].
//!
//! [`TokioModbusTransport`] is the production implementation. It wraps a
//! `tokio-modbus` client context and builds either a TCP socket or a serial
//! port from the [`ConnectionConfig`] it was created with.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ems_modbus_master::config::TcpConfig;
//! use ems_modbus_master::transport::{ModbusTransport, TokioModbusTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut transport = TokioModbusTransport::new(TcpConfig::new("127.0.0.1", 502).into());
//!     transport.set_timeout(Duration::from_secs(2));
//!     transport.connect().await?;
//!
//!     let mut words = [0u16; 4];
//!     let n = transport.read_holding_registers(0x0000, &mut words).await?;
//!     println!("{:?}", &words[..n]);
//!
//!     transport.close().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::time::error::Elapsed;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::{tcp, Client as _, ExceptionCode, Reader, Slave, SlaveContext, Writer};
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, TcpConfig};
use crate::constants::{self, DEFAULT_TIMEOUT_SECS};

#[cfg(feature = "rtu")]
use crate::config::{Parity, RtuConfig};

/// Result alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

// ============================================================================
// Errors
// ============================================================================

/// Failure class reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// No live link: never connected, closed, or dropped by the peer.
    NotConnected,
    /// No response within the configured timeout.
    Timeout,
    /// Socket or serial port failure.
    Io,
    /// Malformed or mismatched response frame.
    Protocol,
    /// The slave answered with a Modbus exception.
    Exception,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotConnected => "not connected",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Exception => "exception",
        })
    }
}

/// Error returned by a [`ModbusTransport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(kind: TransportErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_connected<S: Into<String>>(message: S) -> Self {
        Self::new(TransportErrorKind::NotConnected, message)
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    pub fn exception(code: ExceptionCode) -> Self {
        Self::new(TransportErrorKind::Exception, format!("{:?}", code))
    }

    /// Classify an I/O error; a dead link becomes `NotConnected`.
    pub fn io(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => TransportErrorKind::NotConnected,
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }

    #[inline]
    pub fn is_not_connected(&self) -> bool {
        self.kind == TransportErrorKind::NotConnected
    }
}

impl From<tokio_modbus::Error> for TransportError {
    fn from(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(io) => Self::io(io),
            other => Self::protocol(other.to_string()),
        }
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Raw element exchange with one slave.
///
/// Read calls fill the destination slice and return how many elements the
/// slave delivered. Bits are carried as bytes holding 0 or 1.
pub trait ModbusTransport: Send {
    /// Establish the link. Calling it on a live link is a no-op.
    fn connect(&mut self) -> impl Future<Output = TransportResult<()>> + Send;

    /// Release the link. Never fails.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;

    /// Response wait bound for subsequent calls.
    fn set_timeout(&mut self, timeout: Duration);

    /// Unit identifier addressed by subsequent calls.
    fn set_slave(&mut self, slave: u8);

    /// FC01
    fn read_coils(
        &mut self,
        address: u16,
        dest: &mut [u8],
    ) -> impl Future<Output = TransportResult<usize>> + Send;

    /// FC02
    fn read_discrete_inputs(
        &mut self,
        address: u16,
        dest: &mut [u8],
    ) -> impl Future<Output = TransportResult<usize>> + Send;

    /// FC03
    fn read_holding_registers(
        &mut self,
        address: u16,
        dest: &mut [u16],
    ) -> impl Future<Output = TransportResult<usize>> + Send;

    /// FC04
    fn read_input_registers(
        &mut self,
        address: u16,
        dest: &mut [u16],
    ) -> impl Future<Output = TransportResult<usize>> + Send;

    /// FC05
    fn write_coil(
        &mut self,
        address: u16,
        value: bool,
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// FC15. Non-zero bytes are written as ON.
    fn write_coils(
        &mut self,
        address: u16,
        values: &[u8],
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// FC06
    fn write_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> impl Future<Output = TransportResult<()>> + Send;

    /// FC16
    fn write_registers(
        &mut self,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = TransportResult<()>> + Send;
}

// ============================================================================
// tokio-modbus implementation
// ============================================================================

type Outcome<T> = Result<Result<Result<T, ExceptionCode>, tokio_modbus::Error>, Elapsed>;

/// TCP or RTU transport built on a `tokio-modbus` client context.
///
/// A timed-out or mismatched response leaves the link out of step with the
/// slave, since the late reply is still in flight. The context is discarded and the
/// next call reconnects, so stale frames are never matched to a new request.
pub struct TokioModbusTransport {
    config: ConnectionConfig,
    context: Option<Context>,
    /// Context was discarded after a desync and is rebuilt on the next call.
    resync: bool,
    timeout: Duration,
    slave: Slave,
}

impl TokioModbusTransport {
    /// Prepare a transport for `config`. No I/O happens until
    /// [`connect`](ModbusTransport::connect).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            context: None,
            resync: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            slave: Slave(1),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Context for the next call, reconnecting first when the previous call
    /// left the link out of step. A failed reconnect reports `NotConnected`.
    async fn live_context(&mut self) -> TransportResult<&mut Context> {
        if self.context.is_none() && self.resync {
            debug!("reconnecting to {} after desync", self.config);
            match open_context(&self.config, self.slave, self.timeout).await {
                Ok(context) => {
                    self.context = Some(context);
                    self.resync = false;
                }
                Err(err) => {
                    self.resync = false;
                    return Err(TransportError::not_connected(format!("reconnect failed: {}", err)));
                }
            }
        }
        self.context
            .as_mut()
            .ok_or_else(|| TransportError::not_connected("transport is not connected"))
    }

    /// Flatten a timed tokio-modbus call. A dead link drops the context so
    /// later calls fail fast with `NotConnected`. Any other failure except a
    /// slave exception drops it for a reconnect on the next call.
    fn finish<T>(&mut self, function: u8, address: u16, outcome: Outcome<T>) -> TransportResult<T> {
        let result = match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(code))) => Err(TransportError::exception(code)),
            Ok(Err(err)) => Err(TransportError::from(err)),
            Err(_) => Err(TransportError::timeout(format!(
                "no response within {:?}",
                self.timeout
            ))),
        };

        if let Err(err) = &result {
            warn!(
                "{} @ {:#06x} on {} failed: {}",
                constants::function_name(function),
                address,
                self.config,
                err
            );
            match err.kind {
                TransportErrorKind::NotConnected => {
                    self.context = None;
                    self.resync = false;
                }
                TransportErrorKind::Timeout | TransportErrorKind::Protocol | TransportErrorKind::Io => {
                    self.context = None;
                    self.resync = true;
                }
                TransportErrorKind::Exception => {}
            }
        }
        result
    }
}

async fn open_context(config: &ConnectionConfig, slave: Slave, timeout: Duration) -> TransportResult<Context> {
    match config {
        ConnectionConfig::Tcp(tcp) => connect_tcp(tcp, slave, timeout).await,
        #[cfg(feature = "rtu")]
        ConnectionConfig::Rtu(rtu) => connect_rtu(rtu, slave),
        #[cfg(not(feature = "rtu"))]
        ConnectionConfig::Rtu(_) => Err(TransportError::new(
            TransportErrorKind::Io,
            "rtu support is not enabled in this build",
        )),
    }
}

async fn connect_tcp(tcp: &TcpConfig, slave: Slave, timeout: Duration) -> TransportResult<Context> {
    let mut addrs = tokio::time::timeout(timeout, tokio::net::lookup_host((tcp.ip.as_str(), tcp.port)))
        .await
        .map_err(|_| TransportError::timeout(format!("resolving {} timed out", tcp.ip)))?
        .map_err(TransportError::io)?;
    let addr = addrs
        .next()
        .ok_or_else(|| TransportError::new(TransportErrorKind::Io, format!("no address for {}", tcp.ip)))?;

    tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
        .await
        .map_err(|_| TransportError::timeout(format!("connecting to {} timed out", addr)))?
        .map_err(TransportError::io)
}

#[cfg(feature = "rtu")]
fn connect_rtu(rtu: &RtuConfig, slave: Slave) -> TransportResult<Context> {
    use tokio_modbus::prelude::rtu;
    use tokio_serial::{DataBits, SerialStream, StopBits};

    let data_bits = match rtu.data_bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        8 => DataBits::Eight,
        other => {
            return Err(TransportError::new(
                TransportErrorKind::Io,
                format!("unsupported data bits: {}", other),
            ))
        }
    };
    let stop_bits = match rtu.stop_bits {
        1 => StopBits::One,
        2 => StopBits::Two,
        other => {
            return Err(TransportError::new(
                TransportErrorKind::Io,
                format!("unsupported stop bits: {}", other),
            ))
        }
    };
    let parity = match rtu.parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    };

    let builder = tokio_serial::new(&rtu.serial_port, rtu.baud_rate)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity);

    SerialStream::open(&builder)
        .map(|stream| rtu::attach_slave(stream, slave))
        .map_err(|err| TransportError::new(TransportErrorKind::Io, err.to_string()))
}

fn request_quantity(len: usize) -> TransportResult<u16> {
    u16::try_from(len).map_err(|_| TransportError::protocol(format!("quantity {} exceeds u16", len)))
}

fn copy_bits(bits: &[bool], dest: &mut [u8]) -> usize {
    let n = bits.len().min(dest.len());
    for (slot, bit) in dest.iter_mut().zip(bits) {
        *slot = u8::from(*bit);
    }
    n
}

fn copy_words(words: &[u16], dest: &mut [u16]) -> usize {
    let n = words.len().min(dest.len());
    dest[..n].copy_from_slice(&words[..n]);
    n
}

impl ModbusTransport for TokioModbusTransport {
    async fn connect(&mut self) -> TransportResult<()> {
        if self.context.is_some() {
            return Ok(());
        }

        let context = open_context(&self.config, self.slave, self.timeout).await?;
        debug!("connected to {}", self.config);
        self.context = Some(context);
        self.resync = false;
        Ok(())
    }

    async fn close(&mut self) {
        self.resync = false;
        if let Some(mut context) = self.context.take() {
            if let Err(err) = context.disconnect().await {
                warn!("closing {} reported: {}", self.config, err);
            }
            debug!("closed {}", self.config);
        }
    }

    fn is_connected(&self) -> bool {
        self.context.is_some() || self.resync
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn set_slave(&mut self, slave: u8) {
        self.slave = Slave(slave);
        if let Some(context) = self.context.as_mut() {
            context.set_slave(Slave(slave));
        }
    }

    async fn read_coils(&mut self, address: u16, dest: &mut [u8]) -> TransportResult<usize> {
        let quantity = request_quantity(dest.len())?;
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome = tokio::time::timeout(timeout, context.read_coils(address, quantity)).await;
        let bits = self.finish(constants::FC_READ_COILS, address, outcome)?;
        Ok(copy_bits(&bits, dest))
    }

    async fn read_discrete_inputs(&mut self, address: u16, dest: &mut [u8]) -> TransportResult<usize> {
        let quantity = request_quantity(dest.len())?;
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome =
            tokio::time::timeout(timeout, context.read_discrete_inputs(address, quantity)).await;
        let bits = self.finish(constants::FC_READ_DISCRETE_INPUTS, address, outcome)?;
        Ok(copy_bits(&bits, dest))
    }

    async fn read_holding_registers(&mut self, address: u16, dest: &mut [u16]) -> TransportResult<usize> {
        let quantity = request_quantity(dest.len())?;
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome =
            tokio::time::timeout(timeout, context.read_holding_registers(address, quantity)).await;
        let words = self.finish(constants::FC_READ_HOLDING_REGISTERS, address, outcome)?;
        Ok(copy_words(&words, dest))
    }

    async fn read_input_registers(&mut self, address: u16, dest: &mut [u16]) -> TransportResult<usize> {
        let quantity = request_quantity(dest.len())?;
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome =
            tokio::time::timeout(timeout, context.read_input_registers(address, quantity)).await;
        let words = self.finish(constants::FC_READ_INPUT_REGISTERS, address, outcome)?;
        Ok(copy_words(&words, dest))
    }

    async fn write_coil(&mut self, address: u16, value: bool) -> TransportResult<()> {
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome = tokio::time::timeout(timeout, context.write_single_coil(address, value)).await;
        self.finish(constants::FC_WRITE_SINGLE_COIL, address, outcome)
    }

    async fn write_coils(&mut self, address: u16, values: &[u8]) -> TransportResult<()> {
        request_quantity(values.len())?;
        let bits: Vec<bool> = values.iter().map(|v| *v != 0).collect();
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome =
            tokio::time::timeout(timeout, context.write_multiple_coils(address, &bits)).await;
        self.finish(constants::FC_WRITE_MULTIPLE_COILS, address, outcome)
    }

    async fn write_register(&mut self, address: u16, value: u16) -> TransportResult<()> {
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome =
            tokio::time::timeout(timeout, context.write_single_register(address, value)).await;
        self.finish(constants::FC_WRITE_SINGLE_REGISTER, address, outcome)
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> TransportResult<()> {
        request_quantity(values.len())?;
        let timeout = self.timeout;
        let context = self.live_context().await?;
        let outcome =
            tokio::time::timeout(timeout, context.write_multiple_registers(address, values)).await;
        self.finish(constants::FC_WRITE_MULTIPLE_REGISTERS, address, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let err = TransportError::io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(err.kind, TransportErrorKind::NotConnected);
        assert!(err.is_not_connected());

        let err = TransportError::io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(err.kind, TransportErrorKind::Timeout);

        let err = TransportError::io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(err.kind, TransportErrorKind::Io);
        assert_eq!(err.to_string(), "io: refused");
    }

    #[test]
    fn test_exception_message() {
        let err = TransportError::exception(ExceptionCode::IllegalDataAddress);
        assert_eq!(err.kind, TransportErrorKind::Exception);
        assert!(err.message.contains("IllegalDataAddress"));
    }

    #[test]
    fn test_copy_helpers() {
        let mut dest = [9u8; 4];
        assert_eq!(copy_bits(&[true, false, true], &mut dest), 3);
        assert_eq!(dest, [1, 0, 1, 9]);

        let mut words = [0u16; 2];
        assert_eq!(copy_words(&[7, 8, 9], &mut words), 2);
        assert_eq!(words, [7, 8]);
    }

    #[tokio::test]
    async fn test_calls_before_connect_fail_fast() {
        let mut transport = TokioModbusTransport::new(TcpConfig::new("127.0.0.1", 502).into());
        assert!(!transport.is_connected());

        let mut dest = [0u16; 2];
        let err = transport.read_holding_registers(0, &mut dest).await.unwrap_err();
        assert!(err.is_not_connected());

        let err = transport.write_coil(0, true).await.unwrap_err();
        assert!(err.is_not_connected());

        transport.close().await;
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_timeout_discards_context_for_reconnect() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut silent = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                silent.push(socket);
            }
        });

        let mut transport = TokioModbusTransport::new(TcpConfig::new("127.0.0.1", port).into());
        transport.set_timeout(Duration::from_millis(100));
        transport.connect().await.unwrap();

        let mut dest = [0u16; 2];
        let err = transport.read_holding_registers(0, &mut dest).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert!(transport.context.is_none());
        assert!(transport.is_connected());

        let err = transport.read_holding_registers(0, &mut dest).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert_eq!(accepted.load(Ordering::SeqCst), 2);

        transport.close().await;
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TokioModbusTransport::new(TcpConfig::new("127.0.0.1", port).into());
        transport.set_timeout(Duration::from_millis(500));
        let err = transport.connect().await.unwrap_err();
        assert_ne!(err.kind, TransportErrorKind::Exception);
        assert!(!transport.is_connected());
    }
}
