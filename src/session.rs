//! # Connection Session
//!
//! A [`ConnectionSession`] is one sequential conversation with one slave. It
//! owns the transport, the addressing state (slave id, timeout, encoding) and
//! two fixed-capacity scratch buffers that every read goes through.
//!
//! ```text
//!   RegisterDescriptor ──► ConnectionSession ──► ModbusTransport ──► wire
//!                               │    ▲
//!                               ▼    │ raw words
//!                            codec::decode_values / encode_values
//! ```
//!
//! Request sizes are checked before anything reaches the transport: every
//! call carries between 1 and [`MAX_REQUEST_LENGTH`] elements and must stay
//! inside the 16-bit address space.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ems_modbus_master::{ConnectionSession, ModbusResult};
//! use ems_modbus_master::config::{RtuConfig, Timeout};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let mut session = ConnectionSession::new(RtuConfig::new("/dev/ttyUSB0", 9600).into())?;
//!     session.set_slave(1);
//!     session.set_timeout(Timeout::new(3, 0))?;
//!     session.open().await?;
//!
//!     let words = session.read_holding_registers(0x0001, 10).await?;
//!     println!("{:?}", words);
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::codec;
use crate::config::{ConnectionConfig, Encoding, ModbusConfig, Timeout};
use crate::constants::{self, ADDRESS_SPACE, MAX_REQUEST_LENGTH};
use crate::error::{ModbusError, ModbusResult};
use crate::register::{RegisterDescriptor, RegisterType};
use crate::transport::{ModbusTransport, TokioModbusTransport, TransportError, TransportErrorKind};
use crate::value::ActualData;

// ============================================================================
// State and statistics
// ============================================================================

/// Link state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No link; transactions fail with `NonSocket`.
    #[default]
    Closed,
    /// Link established by `open`.
    Open,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
        })
    }
}

/// Transaction counters for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Transactions handed to the transport
    pub transactions: u64,
    /// Transactions that failed at the transport, timeouts included
    pub failures: u64,
    /// Failures where the slave did not answer in time
    pub timeouts: u64,
    /// Completion time of the most recent successful transaction
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the most recent transport failure
    pub last_error: Option<String>,
}

impl SessionStats {
    /// Percentage of transactions that succeeded, 100 when none were issued.
    pub fn success_rate(&self) -> f64 {
        if self.transactions == 0 {
            return 100.0;
        }
        let ok = self.transactions.saturating_sub(self.failures);
        ok as f64 / self.transactions as f64 * 100.0
    }

    fn record_success(&mut self) {
        self.transactions += 1;
        self.last_success = Some(Utc::now());
    }

    fn record_failure(&mut self, err: &TransportError) {
        self.transactions += 1;
        self.failures += 1;
        if err.kind == TransportErrorKind::Timeout {
            self.timeouts += 1;
        }
        self.last_error = Some(err.to_string());
    }
}

// ============================================================================
// Session
// ============================================================================

/// One master-side conversation with a slave over one transport.
///
/// All transactions take `&mut self`; share a session between tasks through
/// [`SharedSession`].
pub struct ConnectionSession<T: ModbusTransport = TokioModbusTransport> {
    transport: T,
    state: SessionState,
    slave: u8,
    timeout: Timeout,
    encoding: Encoding,
    bits: [u8; MAX_REQUEST_LENGTH],
    words: [u16; MAX_REQUEST_LENGTH],
    stats: SessionStats,
}

impl ConnectionSession<TokioModbusTransport> {
    /// Build a closed session whose transport kind follows the config variant.
    pub fn new(config: ConnectionConfig) -> ModbusResult<Self> {
        config.validate()?;
        debug!("session created for {}", config);
        Ok(Self::with_transport(TokioModbusTransport::new(config)))
    }

    /// Build a closed session and apply the timeout, slave and encoding of
    /// `config`.
    pub fn from_config(config: &ModbusConfig) -> ModbusResult<Self> {
        config.validate()?;
        let mut session = Self::new(config.connection.clone())?;
        session.set_timeout(config.timeout)?;
        session.set_slave(config.slave_id);
        session.set_encoding(config.encoding);
        Ok(session)
    }
}

impl<T: ModbusTransport> ConnectionSession<T> {
    /// Wrap an existing transport. The session starts closed with slave 1,
    /// the default timeout and big-endian encoding.
    pub fn with_transport(transport: T) -> Self {
        let mut session = Self {
            transport,
            state: SessionState::Closed,
            slave: 1,
            timeout: Timeout::default(),
            encoding: Encoding::default(),
            bits: [0; MAX_REQUEST_LENGTH],
            words: [0; MAX_REQUEST_LENGTH],
            stats: SessionStats::default(),
        };
        session.transport.set_slave(session.slave);
        session.transport.set_timeout(session.timeout.as_duration());
        session
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Establish the link. Opening an open session does nothing.
    pub async fn open(&mut self) -> ModbusResult<()> {
        if self.state == SessionState::Open && self.transport.is_connected() {
            debug!("open() on an open session ignored");
            return Ok(());
        }

        self.transport.set_slave(self.slave);
        self.transport.set_timeout(self.timeout.as_duration());
        match self.transport.connect().await {
            Ok(()) => {
                self.state = SessionState::Open;
                debug!("session open, slave {}", self.slave);
                Ok(())
            }
            Err(err) => {
                warn!("connect failed: {}", err);
                self.state = SessionState::Closed;
                Err(ModbusError::connection_establishing(err.message))
            }
        }
    }

    /// Release the link. Safe on a closed session.
    pub async fn close(&mut self) {
        if self.state == SessionState::Open || self.transport.is_connected() {
            self.transport.close().await;
            debug!("session closed");
        }
        self.state = SessionState::Closed;
    }

    /// Response wait bound for transactions issued after this call.
    pub fn set_timeout(&mut self, timeout: Timeout) -> ModbusResult<()> {
        timeout.validate()?;
        self.timeout = timeout;
        self.transport.set_timeout(timeout.as_duration());
        Ok(())
    }

    pub fn set_slave(&mut self, slave: u8) {
        self.slave = slave;
        self.transport.set_slave(slave);
    }

    /// Word layout used by [`read_point`](Self::read_point) and
    /// [`write_point`](Self::write_point).
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn slave(&self) -> u8 {
        self.slave
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ------------------------------------------------------------------
    // Bit access
    // ------------------------------------------------------------------

    /// FC01. Returns `quantity` bytes holding 0 or 1.
    pub async fn read_coils(&mut self, address: u16, quantity: usize) -> ModbusResult<Vec<u8>> {
        self.read_bits(RegisterType::Coil, address, quantity).await
    }

    /// FC02. Returns `quantity` bytes holding 0 or 1.
    pub async fn read_discrete_inputs(
        &mut self,
        address: u16,
        quantity: usize,
    ) -> ModbusResult<Vec<u8>> {
        self.read_bits(RegisterType::DiscreteInput, address, quantity).await
    }

    /// FC05
    pub async fn write_coil(&mut self, address: u16, value: bool) -> ModbusResult<()> {
        check_span(address, 1)?;
        self.ensure_open()?;
        trace_call(constants::FC_WRITE_SINGLE_COIL, address, 1);
        let result = self.transport.write_coil(address, value).await;
        self.settle(result)
    }

    /// FC15. Non-zero bytes switch the coil on.
    pub async fn write_coils(&mut self, address: u16, values: &[u8]) -> ModbusResult<()> {
        check_span(address, values.len())?;
        self.ensure_open()?;
        trace_call(constants::FC_WRITE_MULTIPLE_COILS, address, values.len());
        let result = self.transport.write_coils(address, values).await;
        self.settle(result)
    }

    // ------------------------------------------------------------------
    // Register access
    // ------------------------------------------------------------------

    /// FC03. Returns `quantity` raw words.
    pub async fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: usize,
    ) -> ModbusResult<Vec<u16>> {
        self.read_words(RegisterType::HoldingRegister, address, quantity).await
    }

    /// FC04. Returns `quantity` raw words.
    pub async fn read_input_registers(
        &mut self,
        address: u16,
        quantity: usize,
    ) -> ModbusResult<Vec<u16>> {
        self.read_words(RegisterType::InputRegister, address, quantity).await
    }

    /// FC06
    pub async fn write_holding_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        check_span(address, 1)?;
        self.ensure_open()?;
        trace_call(constants::FC_WRITE_SINGLE_REGISTER, address, 1);
        let result = self.transport.write_register(address, value).await;
        self.settle(result)
    }

    /// FC16
    pub async fn write_holding_registers(&mut self, address: u16, values: &[u16]) -> ModbusResult<()> {
        check_span(address, values.len())?;
        self.ensure_open()?;
        trace_call(constants::FC_WRITE_MULTIPLE_REGISTERS, address, values.len());
        let result = self.transport.write_registers(address, values).await;
        self.settle(result)
    }

    // ------------------------------------------------------------------
    // Typed points
    // ------------------------------------------------------------------

    /// Read a point and decode it with the session encoding.
    ///
    /// Bit points yield one `Bool` per element; string points yield a single
    /// `String`; other word points yield `number` values, scaled to `F64`
    /// when the descriptor carries an offset or accuracy.
    pub async fn read_point(&mut self, point: &RegisterDescriptor) -> ModbusResult<Vec<ActualData>> {
        let register_type = point.register_type();
        if register_type.is_bit() {
            let bits = self
                .read_bits(register_type, point.address(), point.quantity())
                .await?;
            return Ok(bits.into_iter().map(|b| ActualData::Bool(b != 0)).collect());
        }

        let words = self
            .read_words(register_type, point.address(), point.quantity())
            .await?;
        codec::decode_values(
            &words,
            point.data_type(),
            point.number(),
            self.encoding,
            point.scaling(),
        )
    }

    /// Encode `values` with the session encoding and write them to a coil or
    /// holding register point. Scaling is not inverted.
    pub async fn write_point(
        &mut self,
        point: &RegisterDescriptor,
        values: &[ActualData],
    ) -> ModbusResult<()> {
        let register_type = point.register_type();
        if !register_type.is_writable() {
            return Err(ModbusError::register_type(format!(
                "{} is read-only",
                register_type
            )));
        }

        if register_type.is_bit() {
            if values.len() != point.number() {
                return Err(ModbusError::decode(format!(
                    "expected {} coil value(s), got {}",
                    point.number(),
                    values.len()
                )));
            }
            let mut bits = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    ActualData::Bool(b) => bits.push(u8::from(*b)),
                    other => {
                        return Err(ModbusError::decode(format!(
                            "coil takes bool, got {}",
                            other.type_name()
                        )))
                    }
                }
            }
            return match bits.as_slice() {
                [single] => self.write_coil(point.address(), *single != 0).await,
                many => self.write_coils(point.address(), many).await,
            };
        }

        let words = codec::encode_values(values, point.data_type(), point.number(), self.encoding)?;
        match words.as_slice() {
            [single] => self.write_holding_register(point.address(), *single).await,
            many => self.write_holding_registers(point.address(), many).await,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn read_bits(
        &mut self,
        register_type: RegisterType,
        address: u16,
        quantity: usize,
    ) -> ModbusResult<Vec<u8>> {
        check_span(address, quantity)?;
        self.ensure_open()?;

        self.bits.fill(0);
        let dest = &mut self.bits[..quantity];
        let result = match register_type {
            RegisterType::Coil => {
                trace_call(constants::FC_READ_COILS, address, quantity);
                self.transport.read_coils(address, dest).await
            }
            _ => {
                trace_call(constants::FC_READ_DISCRETE_INPUTS, address, quantity);
                self.transport.read_discrete_inputs(address, dest).await
            }
        };

        let count = self.settle(result)?;
        check_count(count, quantity)?;
        Ok(self.bits[..quantity].to_vec())
    }

    async fn read_words(
        &mut self,
        register_type: RegisterType,
        address: u16,
        quantity: usize,
    ) -> ModbusResult<Vec<u16>> {
        check_span(address, quantity)?;
        self.ensure_open()?;

        self.words.fill(0);
        let dest = &mut self.words[..quantity];
        let result = match register_type {
            RegisterType::InputRegister => {
                trace_call(constants::FC_READ_INPUT_REGISTERS, address, quantity);
                self.transport.read_input_registers(address, dest).await
            }
            _ => {
                trace_call(constants::FC_READ_HOLDING_REGISTERS, address, quantity);
                self.transport.read_holding_registers(address, dest).await
            }
        };

        let count = self.settle(result)?;
        check_count(count, quantity)?;
        Ok(self.words[..quantity].to_vec())
    }

    fn ensure_open(&self) -> ModbusResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(ModbusError::non_socket("session is not open")),
        }
    }

    /// Map a transport outcome into the crate error model and update stats.
    fn settle<R>(&mut self, result: Result<R, TransportError>) -> ModbusResult<R> {
        match result {
            Ok(value) => {
                self.stats.record_success();
                Ok(value)
            }
            Err(err) => {
                self.stats.record_failure(&err);
                if err.is_not_connected() {
                    warn!("link lost: {}", err.message);
                    self.state = SessionState::Closed;
                    Err(ModbusError::non_socket(err.message))
                } else {
                    Err(ModbusError::communication(err.to_string()))
                }
            }
        }
    }
}

impl<T: ModbusTransport> fmt::Debug for ConnectionSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("state", &self.state)
            .field("slave", &self.slave)
            .field("timeout", &self.timeout)
            .field("encoding", &self.encoding)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Reject empty requests, requests over the buffer capacity and spans that
/// run past address 0xFFFF.
fn check_span(address: u16, quantity: usize) -> ModbusResult<()> {
    if quantity == 0 || quantity > MAX_REQUEST_LENGTH {
        return Err(ModbusError::QuantityOutOfRange {
            requested: quantity,
            limit: MAX_REQUEST_LENGTH,
        });
    }
    let room = ADDRESS_SPACE - usize::from(address);
    if quantity > room {
        return Err(ModbusError::QuantityOutOfRange {
            requested: quantity,
            limit: room,
        });
    }
    Ok(())
}

fn check_count(count: usize, quantity: usize) -> ModbusResult<()> {
    if count < quantity {
        return Err(ModbusError::communication(format!(
            "short response: {} of {} element(s)",
            count, quantity
        )));
    }
    Ok(())
}

#[inline]
fn trace_call(function: u8, address: u16, quantity: usize) {
    debug!(
        "{} @ {:#06x} x{}",
        constants::function_name(function),
        address,
        quantity
    );
}

// ============================================================================
// Shared handle
// ============================================================================

/// Cloneable handle serialising access to one session across tasks.
///
/// ```rust,no_run
/// use ems_modbus_master::{ConnectionSession, SharedSession};
/// use ems_modbus_master::config::TcpConfig;
///
/// # async fn example() -> ems_modbus_master::ModbusResult<()> {
/// let shared = SharedSession::new(ConnectionSession::new(TcpConfig::new("10.0.0.5", 502).into())?);
/// shared.lock().await.open().await?;
///
/// let worker = shared.clone();
/// tokio::spawn(async move {
///     let _ = worker.lock().await.read_input_registers(0, 2).await;
/// });
/// # Ok(())
/// # }
/// ```
pub struct SharedSession<T: ModbusTransport = TokioModbusTransport> {
    inner: Arc<Mutex<ConnectionSession<T>>>,
}

impl<T: ModbusTransport> SharedSession<T> {
    pub fn new(session: ConnectionSession<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Exclusive access for a sequence of transactions.
    pub async fn lock(&self) -> MutexGuard<'_, ConnectionSession<T>> {
        self.inner.lock().await
    }

    pub async fn read_point(&self, point: &RegisterDescriptor) -> ModbusResult<Vec<ActualData>> {
        self.inner.lock().await.read_point(point).await
    }

    pub async fn write_point(
        &self,
        point: &RegisterDescriptor,
        values: &[ActualData],
    ) -> ModbusResult<()> {
        self.inner.lock().await.write_point(point, values).await
    }
}

impl<T: ModbusTransport> Clone for SharedSession<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endianness, RtuConfig, TcpConfig};
    use crate::register::DataType;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Clone, PartialEq)]
    struct MockCall {
        function: u8,
        address: u16,
        quantity: usize,
    }

    /// In-memory slave image recording every call it receives.
    struct MockTransport {
        calls: Vec<MockCall>,
        coils: Vec<u8>,
        registers: Vec<u16>,
        failures: VecDeque<TransportError>,
        connect_error: Option<TransportError>,
        connected: bool,
        connects: usize,
        slave: u8,
        timeout: Duration,
        short_by: usize,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                coils: vec![0; ADDRESS_SPACE],
                registers: vec![0; ADDRESS_SPACE],
                failures: VecDeque::new(),
                connect_error: None,
                connected: false,
                connects: 0,
                slave: 0,
                timeout: Duration::ZERO,
                short_by: 0,
            }
        }

        fn with_registers(mut self, address: u16, values: &[u16]) -> Self {
            let start = usize::from(address);
            self.registers[start..start + values.len()].copy_from_slice(values);
            self
        }

        fn fail_next(&mut self, err: TransportError) {
            self.failures.push_back(err);
        }

        fn record(&mut self, function: u8, address: u16, quantity: usize) -> Result<(), TransportError> {
            self.calls.push(MockCall {
                function,
                address,
                quantity,
            });
            if !self.connected {
                return Err(TransportError::not_connected("mock is closed"));
            }
            match self.failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    impl ModbusTransport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.connects += 1;
            if let Some(err) = self.connect_error.clone() {
                return Err(err);
            }
            self.connected = true;
            Ok(())
        }

        async fn close(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn set_timeout(&mut self, timeout: Duration) {
            self.timeout = timeout;
        }

        fn set_slave(&mut self, slave: u8) {
            self.slave = slave;
        }

        async fn read_coils(&mut self, address: u16, dest: &mut [u8]) -> Result<usize, TransportError> {
            self.record(constants::FC_READ_COILS, address, dest.len())?;
            let start = usize::from(address);
            dest.copy_from_slice(&self.coils[start..start + dest.len()]);
            Ok(dest.len())
        }

        async fn read_discrete_inputs(&mut self, address: u16, dest: &mut [u8]) -> Result<usize, TransportError> {
            self.record(constants::FC_READ_DISCRETE_INPUTS, address, dest.len())?;
            let start = usize::from(address);
            dest.copy_from_slice(&self.coils[start..start + dest.len()]);
            Ok(dest.len())
        }

        async fn read_holding_registers(&mut self, address: u16, dest: &mut [u16]) -> Result<usize, TransportError> {
            self.record(constants::FC_READ_HOLDING_REGISTERS, address, dest.len())?;
            let start = usize::from(address);
            dest.copy_from_slice(&self.registers[start..start + dest.len()]);
            Ok(dest.len() - self.short_by)
        }

        async fn read_input_registers(&mut self, address: u16, dest: &mut [u16]) -> Result<usize, TransportError> {
            self.record(constants::FC_READ_INPUT_REGISTERS, address, dest.len())?;
            let start = usize::from(address);
            dest.copy_from_slice(&self.registers[start..start + dest.len()]);
            Ok(dest.len())
        }

        async fn write_coil(&mut self, address: u16, value: bool) -> Result<(), TransportError> {
            self.record(constants::FC_WRITE_SINGLE_COIL, address, 1)?;
            self.coils[usize::from(address)] = u8::from(value);
            Ok(())
        }

        async fn write_coils(&mut self, address: u16, values: &[u8]) -> Result<(), TransportError> {
            self.record(constants::FC_WRITE_MULTIPLE_COILS, address, values.len())?;
            let start = usize::from(address);
            for (slot, v) in self.coils[start..start + values.len()].iter_mut().zip(values) {
                *slot = u8::from(*v != 0);
            }
            Ok(())
        }

        async fn write_register(&mut self, address: u16, value: u16) -> Result<(), TransportError> {
            self.record(constants::FC_WRITE_SINGLE_REGISTER, address, 1)?;
            self.registers[usize::from(address)] = value;
            Ok(())
        }

        async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<(), TransportError> {
            self.record(constants::FC_WRITE_MULTIPLE_REGISTERS, address, values.len())?;
            let start = usize::from(address);
            self.registers[start..start + values.len()].copy_from_slice(values);
            Ok(())
        }
    }

    async fn open_session(mock: MockTransport) -> ConnectionSession<MockTransport> {
        let mut session = ConnectionSession::with_transport(mock);
        session.open().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_read_holding_registers_returns_slave_words() {
        let words: Vec<u16> = (100..110).collect();
        let mut session = open_session(MockTransport::new().with_registers(0x0001, &words)).await;

        let result = session.read_holding_registers(0x0001, 10).await.unwrap();
        assert_eq!(result, words);
        assert_eq!(
            session.transport().calls,
            vec![MockCall {
                function: constants::FC_READ_HOLDING_REGISTERS,
                address: 0x0001,
                quantity: 10
            }]
        );
        assert_eq!(session.stats().transactions, 1);
        assert!(session.stats().last_success.is_some());
    }

    #[tokio::test]
    async fn test_quantity_boundary() {
        let mut session = open_session(MockTransport::new()).await;

        assert_eq!(session.read_input_registers(0, 256).await.unwrap().len(), 256);
        assert_eq!(session.read_coils(0, 256).await.unwrap().len(), 256);
        assert_eq!(session.transport().calls.len(), 2);

        let err = session.read_holding_registers(0, 257).await.unwrap_err();
        assert_eq!(
            err,
            ModbusError::QuantityOutOfRange {
                requested: 257,
                limit: 256
            }
        );
        let err = session.write_holding_registers(0, &[0; 257]).await.unwrap_err();
        assert!(matches!(err, ModbusError::QuantityOutOfRange { .. }));
        let err = session.read_discrete_inputs(0, 0).await.unwrap_err();
        assert!(matches!(err, ModbusError::QuantityOutOfRange { requested: 0, .. }));
        let err = session.write_coils(0, &[]).await.unwrap_err();
        assert!(matches!(err, ModbusError::QuantityOutOfRange { .. }));

        assert_eq!(session.transport().calls.len(), 2);
    }

    #[tokio::test]
    async fn test_span_past_address_space() {
        let mut session = open_session(MockTransport::new()).await;

        assert!(session.read_holding_registers(0xFFFF, 1).await.is_ok());
        let err = session.read_holding_registers(0xFFFF, 2).await.unwrap_err();
        assert_eq!(
            err,
            ModbusError::QuantityOutOfRange {
                requested: 2,
                limit: 1
            }
        );
    }

    #[tokio::test]
    async fn test_bounds_checked_before_state() {
        let mut session = ConnectionSession::with_transport(MockTransport::new());
        let err = session.read_coils(0, 300).await.unwrap_err();
        assert!(matches!(err, ModbusError::QuantityOutOfRange { .. }));
    }

    #[tokio::test]
    async fn test_closed_session_is_non_socket() {
        let mut session = ConnectionSession::with_transport(MockTransport::new());
        let err = session.read_holding_registers(0, 1).await.unwrap_err();
        assert!(matches!(err, ModbusError::NonSocket { .. }));
        assert!(session.transport().calls.is_empty());

        session.open().await.unwrap();
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        let err = session.write_coil(0, true).await.unwrap_err();
        assert!(matches!(err, ModbusError::NonSocket { .. }));

        // close twice is fine
        session.close().await;
    }

    #[tokio::test]
    async fn test_reopen_is_noop() {
        let mut session = open_session(MockTransport::new()).await;
        session.open().await.unwrap();
        assert_eq!(session.transport().connects, 1);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let mut mock = MockTransport::new();
        mock.connect_error = Some(TransportError::new(TransportErrorKind::Io, "No such file or directory"));
        let mut session = ConnectionSession::with_transport(mock);

        let err = session.open().await.unwrap_err();
        assert_eq!(
            err,
            ModbusError::connection_establishing("No such file or directory")
        );
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_transport_failures_map_to_communication() {
        let mut session = open_session(MockTransport::new()).await;
        session
            .transport_mut()
            .fail_next(TransportError::timeout("no response within 1s"));
        session
            .transport_mut()
            .fail_next(TransportError::new(TransportErrorKind::Exception, "IllegalDataAddress"));

        let err = session.read_input_registers(0, 4).await.unwrap_err();
        assert!(matches!(err, ModbusError::Communication { .. }));
        assert!(err.is_retryable());
        let err = session.write_holding_register(0, 1).await.unwrap_err();
        assert!(err.to_string().contains("IllegalDataAddress"));

        // still usable afterwards
        assert!(session.read_input_registers(0, 4).await.is_ok());

        let stats = session.stats();
        assert_eq!(stats.transactions, 3);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.timeouts, 1);
        assert!(stats.last_error.as_deref().unwrap_or("").contains("exception"));
    }

    #[tokio::test]
    async fn test_lost_link_closes_session() {
        let mut session = open_session(MockTransport::new()).await;
        session
            .transport_mut()
            .fail_next(TransportError::not_connected("Broken pipe"));

        let err = session.read_coils(0, 1).await.unwrap_err();
        assert_eq!(err, ModbusError::non_socket("Broken pipe"));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_short_response() {
        let mut mock = MockTransport::new();
        mock.short_by = 1;
        let mut session = open_session(mock).await;
        let err = session.read_holding_registers(0, 4).await.unwrap_err();
        assert!(matches!(err, ModbusError::Communication { .. }));
    }

    #[tokio::test]
    async fn test_scratch_buffer_is_zeroed_between_calls() {
        let mut session = open_session(MockTransport::new().with_registers(0, &[0xAAAA; 8])).await;
        session.read_holding_registers(0, 8).await.unwrap();
        let words = session.read_holding_registers(8, 4).await.unwrap();
        assert_eq!(words, vec![0; 4]);
    }

    #[tokio::test]
    async fn test_bit_roundtrip() {
        let mut session = open_session(MockTransport::new()).await;
        session.write_coils(10, &[1, 0, 1, 1]).await.unwrap();
        session.write_coil(14, true).await.unwrap();
        assert_eq!(session.read_coils(10, 5).await.unwrap(), vec![1, 0, 1, 1, 1]);
        assert_eq!(session.read_discrete_inputs(10, 2).await.unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_settings_reach_transport() {
        let mut session = ConnectionSession::with_transport(MockTransport::new());
        session.set_slave(17);
        assert_ok!(session.set_timeout(Timeout::new(3, 0)));
        assert_eq!(session.transport().slave, 17);
        assert_eq!(session.transport().timeout, Duration::from_secs(3));

        assert_err!(session.set_timeout(Timeout::new(0, 0)));
        assert_eq!(session.timeout(), Timeout::new(3, 0));

        tokio_test::block_on(async {
            assert_ok!(session.open().await);
            assert_ok!(session.set_timeout(Timeout::new(0, 250_000)));
            assert_eq!(session.transport().timeout, Duration::from_millis(250));
            assert_ok!(session.read_holding_registers(0, 1).await);
        });
    }

    #[tokio::test]
    async fn test_point_read_with_encoding_and_scaling() {
        let mock = MockTransport::new().with_registers(0x0100, &[0x5678, 0x1234, 1234]);
        let mut session = open_session(mock).await;
        session.set_encoding(Encoding::new(Endianness::Little, true));

        let power = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::UInt32, 0x0100, 1).unwrap();
        assert_eq!(session.read_point(&power).await.unwrap(), vec![ActualData::U32(0x1234_5678)]);

        session.set_encoding(Encoding::default());
        let volts = RegisterDescriptor::new(RegisterType::InputRegister, DataType::UInt16, 0x0102, 1)
            .unwrap()
            .with_accuracy(0.1)
            .unwrap();
        match session.read_point(&volts).await.unwrap().as_slice() {
            [ActualData::F64(v)] => assert!((v - 123.4).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_point_write() {
        let mut session = open_session(MockTransport::new()).await;

        let setpoint = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::Float, 0x0200, 1).unwrap();
        session.write_point(&setpoint, &[ActualData::F32(25.0)]).await.unwrap();
        assert_eq!(&session.transport().registers[0x0200..0x0202], &[0x41C8, 0x0000]);
        assert_eq!(session.read_point(&setpoint).await.unwrap(), vec![ActualData::F32(25.0)]);

        let mode = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::UInt16, 0x0300, 1).unwrap();
        session.write_point(&mode, &[ActualData::U16(3)]).await.unwrap();
        assert_eq!(
            session.transport().calls.last().map(|c| c.function),
            Some(constants::FC_WRITE_SINGLE_REGISTER)
        );

        let relay = RegisterDescriptor::new(RegisterType::Coil, DataType::Bool, 5, 2).unwrap();
        session
            .write_point(&relay, &[ActualData::Bool(true), ActualData::Bool(false)])
            .await
            .unwrap();
        assert_eq!(
            session.read_point(&relay).await.unwrap(),
            vec![ActualData::Bool(true), ActualData::Bool(false)]
        );
    }

    #[tokio::test]
    async fn test_point_write_rejections() {
        let mut session = open_session(MockTransport::new()).await;

        let input = RegisterDescriptor::new(RegisterType::InputRegister, DataType::UInt16, 0, 1).unwrap();
        let err = session.write_point(&input, &[ActualData::U16(1)]).await.unwrap_err();
        assert!(matches!(err, ModbusError::RegisterType { .. }));

        let coil = RegisterDescriptor::new(RegisterType::Coil, DataType::Bool, 0, 1).unwrap();
        let err = session.write_point(&coil, &[ActualData::U16(1)]).await.unwrap_err();
        assert!(matches!(err, ModbusError::Decode { .. }));

        let word = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::Int32, 0, 1).unwrap();
        let err = session.write_point(&word, &[ActualData::F32(1.0)]).await.unwrap_err();
        assert!(matches!(err, ModbusError::Decode { .. }));

        assert!(session.transport().calls.is_empty());
    }

    #[tokio::test]
    async fn test_shared_session_serialises_callers() {
        let mock = MockTransport::new().with_registers(0, &[1, 2, 3, 4]);
        let shared = SharedSession::new(open_session(mock).await);

        let point = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::UInt16, 0, 4).unwrap();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let worker = shared.clone();
            let point = point.clone();
            handles.push(tokio::spawn(async move { worker.read_point(&point).await }));
        }
        for handle in handles {
            let values = handle.await.unwrap().unwrap();
            assert_eq!(values.len(), 4);
        }
        assert_eq!(shared.lock().await.transport().calls.len(), 4);
    }

    #[test]
    fn test_factory_validates_config() {
        let err = ConnectionSession::new(RtuConfig::new("/dev/ttyUSB0", 9600).with_data_bits(9).into())
            .unwrap_err();
        assert!(err.is_configuration());

        let session = ConnectionSession::new(TcpConfig::new("127.0.0.1", 502).into()).unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        let mut config = ModbusConfig::new(RtuConfig::new("/dev/ttyUSB0", 9600));
        config.slave_id = 7;
        config.timeout = Timeout::new(3, 0);
        config.encoding = Encoding::new(Endianness::Big, true);
        let session = ConnectionSession::from_config(&config).unwrap();
        assert_eq!(session.slave(), 7);
        assert_eq!(session.timeout(), Timeout::new(3, 0));
        assert_eq!(session.encoding(), config.encoding);
        assert_eq!(session.transport().timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_stats_success_rate() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.success_rate(), 100.0);
        stats.record_success();
        stats.record_failure(&TransportError::timeout("t"));
        assert_eq!(stats.success_rate(), 50.0);
    }
}
