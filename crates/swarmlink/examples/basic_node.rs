//! Basic node control example.
//!
//! Demonstrates connecting to a module over its serial port, reading its
//! identity, adjusting the transmit power, and sending a short payload to
//! another node.
//!
//! # Requirements
//!
//! - A module in binary API mode connected via a USB-UART adapter
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p swarmlink --example basic_node
//! ```

use std::time::Duration;

use swarmlink::bee::{BeeBuilder, NodeId, SendTiming};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to module on {}...", serial_port);

    let node = BeeBuilder::new()
        .serial_port(serial_port)
        .baud_rate(115_200)
        .response_timeout(Duration::from_millis(300))
        .build()
        .await?;

    println!("Node id:   {}", node.node_id().await?);
    println!("Firmware:  {}", node.firmware_version().await?);
    println!("Unique id: {}", node.unique_id().await?);

    // Transmit power steps run 0..=63.
    let power = node.set_tx_power(40).await?;
    println!("TX power step: {}", power);

    // Send two bytes to a peer and print the module's status.
    let peer: NodeId = "0000000000AB".parse()?;
    let status = node
        .send_data(SendTiming::Immediate, peer, &[0xCA, 0xFE], 0)
        .await?;
    println!("Send to {}: {}", peer, status);

    node.close().await?;
    Ok(())
}
