//! Voltage S7 Demo
//!
//! Demonstrates the voltage_s7 library features against the in-process
//! simulated PLC:
//! - Address resolution and typed values
//! - Connect / read / write through a shared DeviceSession
//! - HTTP request mapping (PlcApi)
//! - Continuous write test with cancellation
//!
//! Usage: cargo run --bin demo [config_path]
//! Example: cargo run --bin demo config/config.json

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use voltage_s7::api::{ReadRequest, WriteRequest};
use voltage_s7::transport::memory::MemoryConnector;
use voltage_s7::{
    logging, resolve, AreaDescriptor, DataType, DeviceSession, PlcApi, SettingsLoader, StressTest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_LOG_LEVEL)?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| voltage_s7::config::DEFAULT_SETTINGS_PATH.to_string());
    let settings = SettingsLoader::new(&config_path).load_or_create()?;

    println!("🚀 {}", voltage_s7::info());
    println!("=============================");
    println!("Settings: PLC {} / API {}\n", settings.plc_ip_address, settings.api_base_url);

    // =========================================================================
    // Part 1: Addresses and data types (no connection required)
    // =========================================================================
    println!("📦 Part 1: Addresses and Data Types");
    println!("-----------------------------------");

    for text in ["2", "10.3", "5.8", "1.2.3"] {
        match resolve(text) {
            Ok(addr) => println!(
                "  {:>6} -> byte {}, bit {:?}",
                text,
                addr.byte_offset(),
                addr.bit_offset()
            ),
            Err(e) => println!("  {:>6} -> {}", text, e),
        }
    }
    for data_type in DataType::ALL {
        println!("  {:<6} {} bytes", data_type, data_type.byte_len());
    }

    // =========================================================================
    // Part 2: Session operations
    // =========================================================================
    println!("\n🔌 Part 2: Session Operations");
    println!("-----------------------------");

    let session = Arc::new(DeviceSession::new(MemoryConnector::new()));
    session.on_connection_status_changed(|connected| {
        info!("Connection status changed: {}", connected);
    });

    session.connect(&settings.endpoint()).await?;
    println!("  ✅ Connected to {}", settings.endpoint());

    let db = AreaDescriptor::data_block(1);
    session.write_typed(db, "0.1", "BOOL", "true", None).await?;
    session.write_typed(db, "2", "INT", "-1234", None).await?;
    session.write_typed(db, "4", "REAL", "36.6", None).await?;
    session.write_typed(db, "100", "STRING", "HELLO S7", None).await?;

    for (addr, ty) in [("0.1", "BOOL"), ("2", "INT"), ("4", "REAL"), ("100", "STRING")] {
        let value = session.read_typed(db, addr, ty, None).await?;
        println!("  DB1 @ {:<5} {:<6} = {}", addr, ty, value);
    }

    if let Err(e) = session.write_typed(db, "0", "BYTE", "256", None).await {
        println!("  ⚠️  Rejected: {}", e);
    }

    // =========================================================================
    // Part 3: HTTP mapping
    // =========================================================================
    println!("\n🌐 Part 3: API Requests");
    println!("-----------------------");

    let api = PlcApi::new(Arc::clone(&session));
    let write: WriteRequest = serde_json::from_str(
        r#"{"db": 1000, "byteAdr": "2", "dataType": "INT", "data": 10}"#,
    )?;
    let (status, reply) = api.write(&write).await;
    println!("  write -> {} {}", status, serde_json::to_string(&reply)?);

    let read = ReadRequest {
        db: 1000,
        byte_adr: "2".to_string(),
        data_type: "INT".to_string(),
    };
    let (status, reply) = api.read(&read).await;
    println!("  read  -> {} {}", status, serde_json::to_string(&reply)?);

    // =========================================================================
    // Part 4: Continuous test
    // =========================================================================
    println!("\n⏱️  Part 4: Continuous Test");
    println!("---------------------------");

    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            StressTest::default()
                .with_verify(true)
                .run(&session, stop_rx)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(500)).await;
    stop_tx.send(true)?;

    let report = runner.await??;
    println!(
        "  {} iterations, average {:.3} ms ({:?})",
        report.iterations,
        report.average_ms(),
        report.stop_reason
    );

    // =========================================================================
    // Statistics
    // =========================================================================
    let stats = session.get_stats();
    println!("\n📊 Statistics:");
    println!(
        "    Reads: {}, Writes: {}, Failures: {}",
        stats.reads, stats.writes, stats.failures
    );

    session.disconnect().await;
    println!("\n🎉 Demo completed!");
    Ok(())
}
