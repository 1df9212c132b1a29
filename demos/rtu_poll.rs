//! RTU Polling Example
//!
//! Polls a block of holding registers from a serial slave once per second
//! and prints the raw words.
//!
//! # Running this example
//!
//! ```bash
//! RUST_LOG=debug cargo run --example rtu_poll -- /dev/ttyUSB0
//! ```

use std::time::Duration;

use ems_modbus_master::config::{Parity, RtuConfig, Timeout};
use ems_modbus_master::{ConnectionSession, ModbusResult};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ModbusResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let port = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let rtu = RtuConfig::new(port, 9600)
        .with_data_bits(8)
        .with_parity(Parity::None)
        .with_stop_bits(1);

    let mut session = ConnectionSession::new(rtu.into())?;
    session.set_slave(1);
    session.set_timeout(Timeout::new(3, 0))?;
    session.open().await?;

    for _ in 0..10 {
        match session.read_holding_registers(0x0001, 10).await {
            Ok(words) => println!("{:04X?}", words),
            Err(e) if e.is_retryable() => eprintln!("poll failed, retrying: {}", e),
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let stats = session.stats();
    println!(
        "transactions={} failures={} timeouts={} success={:.1}%",
        stats.transactions,
        stats.failures,
        stats.timeouts,
        stats.success_rate()
    );

    session.close().await;
    Ok(())
}
