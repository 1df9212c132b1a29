//! Typed Point Example
//!
//! Reads a small meter register map over Modbus TCP as typed values, then
//! writes a power setpoint.
//!
//! # Register Map
//!
//! | Address | Table | Type | Description |
//! |---------|-------|------|-------------|
//! | 0x0000 | input | float x3 | Phase voltages (V) |
//! | 0x0006 | input | int16, accuracy 0.01 | Power factor |
//! | 0x0010 | input | string x8 | Serial number |
//! | 0x0100 | holding | int32 | Active power setpoint (W) |
//!
//! # Running this example
//!
//! ```bash
//! cargo run --example tcp_point -- 127.0.0.1:502
//! ```

use ems_modbus_master::config::{Encoding, Endianness, ModbusConfig, TcpConfig, Timeout};
use ems_modbus_master::{
    ActualData, ConnectionSession, DataType, ModbusResult, RegisterDescriptor, RegisterType,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ModbusResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let target = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:502".to_string());
    let (host, port) = target.rsplit_once(':').unwrap_or((target.as_str(), "502"));
    let port = port.parse().unwrap_or(502);

    let mut config = ModbusConfig::new(TcpConfig::new(host, port));
    config.timeout = Timeout::new(2, 0);
    config.encoding = Encoding::new(Endianness::Little, true);

    let mut session = ConnectionSession::from_config(&config)?;
    session.open().await?;

    let voltages = RegisterDescriptor::new(RegisterType::InputRegister, DataType::Float, 0x0000, 3)?;
    let power_factor = RegisterDescriptor::new(RegisterType::InputRegister, DataType::Int16, 0x0006, 1)?
        .with_accuracy(0.01)?;
    let serial = RegisterDescriptor::new(RegisterType::InputRegister, DataType::String, 0x0010, 8)?;
    let setpoint = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::Int32, 0x0100, 1)?;

    for (label, point) in [("voltage", &voltages), ("pf", &power_factor), ("serial", &serial)] {
        let values = session.read_point(point).await?;
        let text: Vec<String> = values.iter().map(ToString::to_string).collect();
        println!("{:<8} {}", label, text.join(", "));
    }

    session.write_point(&setpoint, &[ActualData::I32(-5_000)]).await?;
    println!("setpoint written: {:?}", session.read_point(&setpoint).await?);

    session.close().await;
    Ok(())
}
