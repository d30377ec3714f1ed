//! Monitor node notifications.
//!
//! Enables data and node id notifications, then prints every frame the
//! module pushes on its own, along with any frames the decoder discards.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p swarmlink --example monitor_events
//! ```

use std::time::Duration;

use swarmlink::bee::{BeeBuilder, NodeEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to module on {}...", serial_port);

    let node = BeeBuilder::new().serial_port(serial_port).build().await?;
    println!("Connected: node {}\n", node.node_id().await?);

    let mut events = node.subscribe();
    node.set_data_notification(true).await?;
    node.set_node_id_notification(true).await?;
    println!("Monitoring for 60 seconds...\n");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    let start = tokio::time::Instant::now();

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                let elapsed = start.elapsed();
                let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

                match event {
                    NodeEvent::Unsolicited(frame) => {
                        println!(
                            "{} Frame       type 0x{:02X} opcode 0x{:02X} payload {:02X?}",
                            timestamp,
                            frame.frame_type.as_byte(),
                            frame.opcode,
                            frame.payload
                        );
                    }
                    NodeEvent::CrcMismatch { computed, received } => {
                        println!(
                            "{} CrcMismatch computed 0x{:04X} received 0x{:04X}",
                            timestamp, computed, received
                        );
                    }
                    NodeEvent::Desync(reason) => {
                        println!("{} Desync      {:?}", timestamp, reason);
                    }
                }
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(n))) => {
                println!("(missed {} events due to lag)", n);
            }
            Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => break,
        }
    }

    node.set_data_notification(false).await?;
    node.set_node_id_notification(false).await?;
    node.close().await?;
    println!("\nMonitoring complete.");
    Ok(())
}
