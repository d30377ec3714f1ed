// swarmlink test application -- CLI tool for exercising a Bee radio module
// over its serial binary API, or against a scripted mock link.
//
// Usage:
//   swarmlink-test-app list
//   swarmlink-test-app --port /dev/ttyUSB0 info
//   swarmlink-test-app --port /dev/ttyUSB0 --baud 921600 power 40
//   swarmlink-test-app --port /dev/ttyUSB0 send 0000000000AB cafe
//   swarmlink-test-app --mock poll
//   SWARMLINK_PORT=/dev/ttyUSB0 swarmlink-test-app monitor --duration 30

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use swarmlink::LinkRegistry;
use swarmlink::bee::commands::{self, Request};
use swarmlink::bee::{BeeBuilder, BeeNode, FrameCodec, FrameType, NodeEvent, NodeId, SendTiming};
use swarmlink::transport::serial::DEFAULT_BAUD_RATE;
use swarmlink_test_harness::{MockHandle, MockLink};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// swarmlink test application -- drives a Bee module from the command line.
#[derive(Parser)]
#[command(name = "swarmlink-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    /// Required for node commands unless --mock is used.
    #[arg(long, env = "SWARMLINK_PORT")]
    port: Option<String>,

    /// UART speed of the module.
    #[arg(long, env = "SWARMLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    timeout: u64,

    /// Use a scripted mock link instead of a real serial port.
    /// Useful for verifying CLI parsing and builder wiring without hardware.
    #[arg(long)]
    mock: bool,

    /// Log exchange details (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every command in the catalog.
    List,

    /// Print node id, firmware version, and MCU unique id.
    Info,

    /// Set transmit power (0..=63).
    Power { step: u8 },

    /// Select the air sync word (0..=12).
    SyncWord { word: u8 },

    /// Persist the current settings on the module.
    Save,

    /// Send a payload to one node.
    Send {
        /// Destination node id in hex (e.g. 0000000000AB).
        dest: String,
        /// Payload in hex (e.g. cafe).
        data: String,
        /// Queue until after the next blink instead of sending immediately.
        #[arg(long)]
        after_blink: bool,
        /// Blink timeout in milliseconds (only with --after-blink).
        #[arg(long, default_value_t = 0)]
        blink_timeout: u16,
    },

    /// Read out the oldest pending message.
    Poll,

    /// Enable notifications and print node events as they arrive.
    Monitor {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Switch the module from its text API to the binary API.
    Binary,
}

/// Parsed arguments of the `send` command.
struct SendArgs {
    timing: SendTiming,
    dest: NodeId,
    data: Vec<u8>,
    timeout_ms: u16,
}

fn parse_send_args(
    dest: &str,
    data: &str,
    after_blink: bool,
    blink_timeout: u16,
) -> Result<SendArgs> {
    let dest: NodeId = dest
        .parse()
        .with_context(|| format!("invalid destination node id '{dest}'"))?;
    let data = hex::decode(data).with_context(|| format!("invalid hex payload '{data}'"))?;
    let timing = if after_blink {
        SendTiming::AfterBlink
    } else {
        SendTiming::Immediate
    };
    Ok(SendArgs {
        timing,
        dest,
        data,
        timeout_ms: blink_timeout,
    })
}

// ---------------------------------------------------------------------------
// Node construction
// ---------------------------------------------------------------------------

async fn create_node(cli: &Cli) -> Result<(BeeNode, Option<MockHandle>)> {
    let builder = BeeBuilder::new().response_timeout(Duration::from_millis(cli.timeout));

    if cli.mock {
        let registry = LinkRegistry::new();
        let mock = MockLink::new(registry.clone());
        let handle = mock.handle();
        script_mock(&handle, &cli.command)?;
        let node = builder
            .build_with_transport(Box::new(mock), registry)
            .context("failed to build node with mock link")?;
        println!("Connected (mock link)");
        return Ok((node, Some(handle)));
    }

    let port = cli
        .port
        .as_deref()
        .context("--port is required when not using --mock")?;
    let node = builder
        .serial_port(port)
        .baud_rate(cli.baud)
        .build()
        .await
        .with_context(|| format!("failed to open {port}"))?;
    println!("Connected on {port} at {} baud", cli.baud);
    Ok((node, None))
}

// ---------------------------------------------------------------------------
// Mock scripting
// ---------------------------------------------------------------------------

fn wire(request: &Request) -> Result<Vec<u8>> {
    Ok(request.to_wire(&FrameCodec::default())?)
}

fn frame(frame_type: FrameType, opcode: u8, payload: &[u8]) -> Result<Vec<u8>> {
    Ok(FrameCodec::default().encode(frame_type, opcode, payload)?)
}

/// Pre-load the mock with what a module would answer for `command`.
fn script_mock(mock: &MockHandle, command: &Command) -> Result<()> {
    match command {
        Command::List => {}
        Command::Info => {
            let id = NodeId::new(0x0000_0000_00AB)?;
            mock.expect(
                &wire(&commands::cmd_get_node_id())?,
                &frame(FrameType::Get, 0x00, &id.to_bytes())?,
            );
            mock.expect(
                &wire(&commands::cmd_firmware_version())?,
                &frame(FrameType::Get, 0x08, &[1, 4, 2, 0])?,
            );
            let uid: Vec<u8> = (0x10..0x1C).collect();
            mock.expect(
                &wire(&commands::cmd_unique_id())?,
                &frame(FrameType::Get, 0x09, &uid)?,
            );
        }
        Command::Power { step } => {
            // Out-of-range values never reach the link.
            if let Ok(request) = commands::cmd_set_tx_power(*step) {
                mock.expect(&wire(&request)?, &frame(FrameType::Set, 0x05, &[*step])?);
            }
        }
        Command::SyncWord { word } => {
            if let Ok(request) = commands::cmd_set_sync_word(*word) {
                mock.expect(&wire(&request)?, &frame(FrameType::Set, 0x06, &[*word])?);
            }
        }
        Command::Save => {
            mock.expect(
                &wire(&commands::cmd_save_settings())?,
                &frame(FrameType::Set, 0x01, &[0])?,
            );
        }
        Command::Send {
            dest,
            data,
            after_blink,
            blink_timeout,
        } => {
            let args = parse_send_args(dest, data, *after_blink, *blink_timeout)?;
            if let Ok(request) =
                commands::cmd_send_data(args.timing, args.dest, &args.data, args.timeout_ms)
            {
                mock.expect(&wire(&request)?, &frame(FrameType::Set, 0x21, &[0])?);
            }
        }
        Command::Poll => {
            let mut payload = vec![4];
            payload.extend_from_slice(&NodeId::new(0x0000_0000_00CD)?.to_bytes());
            payload.extend_from_slice(b"ping");
            mock.expect(
                &wire(&commands::cmd_get_data())?,
                &frame(FrameType::Get, 0x27, &payload)?,
            );
        }
        Command::Monitor { .. } => {
            for (request, frame_type, opcode) in [
                (commands::cmd_data_notification(true), FrameType::Set, 0x20),
                (commands::cmd_node_id_notification(true), FrameType::Aux, 0x26),
                (commands::cmd_data_notification(false), FrameType::Set, 0x20),
                (commands::cmd_node_id_notification(false), FrameType::Aux, 0x26),
            ] {
                let flag = request.payload().first().copied().unwrap_or(0);
                mock.expect(&wire(&request)?, &frame(frame_type, opcode, &[flag])?);
            }
        }
        Command::Binary => {
            mock.expect_silence(&wire(&commands::cmd_binary_mode())?);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_list() -> Result<()> {
    let catalog = swarmlink::supported_commands();
    let name_width = catalog
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(12)
        .max(12);

    println!(
        "{:<4}  {:<9}  {:<name_width$}  Request / Response",
        "Cmd", "Encoding", "Description",
    );
    println!(
        "{:<4}  {:<9}  {:<name_width$}  ------------------",
        "----",
        "---------",
        "-".repeat(name_width),
    );

    for cmd in &catalog {
        let encoding = match cmd.encoding {
            commands::Encoding::Frame { frame_type, opcode } => {
                format!("{:02X}/{:02X}", frame_type.as_byte(), opcode)
            }
            commands::Encoding::Ascii(_) => "ascii".to_string(),
        };
        let response = if cmd.expects_response {
            cmd.response
        } else {
            "(none)"
        };
        println!(
            "{:<4}  {:<9}  {:<name_width$}  {} / {}",
            cmd.mnemonic, encoding, cmd.name, cmd.request, response,
        );
    }

    println!();
    println!("{} commands total.", catalog.len());
    Ok(())
}

async fn cmd_info(node: &BeeNode) -> Result<()> {
    let id = node.node_id().await.context("GNID failed")?;
    let version = node.firmware_version().await.context("GFWV failed")?;
    let uid = node.unique_id().await.context("GUID failed")?;

    println!("Node Information");
    println!("  Node id:        {id}");
    println!("  Firmware:       {version}");
    println!("  Unique id:      {uid}");
    println!("  Link:           {}", node.link_id());
    println!("  Timeout:        {} ms", node.response_timeout().as_millis());
    Ok(())
}

async fn cmd_power(node: &BeeNode, step: u8) -> Result<()> {
    let applied = node.set_tx_power(step).await?;
    println!("TX power step set to {applied}");
    Ok(())
}

async fn cmd_sync_word(node: &BeeNode, word: u8) -> Result<()> {
    let applied = node.set_sync_word(word).await?;
    println!("Sync word set to {applied}");
    Ok(())
}

async fn cmd_save(node: &BeeNode) -> Result<()> {
    let status = node.save_settings().await?;
    if !status.is_ok() {
        bail!("save settings {status}");
    }
    println!("Settings saved");
    Ok(())
}

async fn cmd_send(node: &BeeNode, args: SendArgs) -> Result<()> {
    let start = Instant::now();
    let status = node
        .send_data(args.timing, args.dest, &args.data, args.timeout_ms)
        .await?;
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "SDAT answered");
    if !status.is_ok() {
        bail!("send to {} {status}", args.dest);
    }
    println!("Sent {} bytes to {}", args.data.len(), args.dest);
    Ok(())
}

async fn cmd_poll(node: &BeeNode) -> Result<()> {
    match node.pending_data().await? {
        Some(msg) => println!(
            "From {}: {} ({} bytes)",
            msg.sender,
            hex::encode(&msg.data),
            msg.data.len()
        ),
        None => println!("No pending data."),
    }
    Ok(())
}

async fn cmd_monitor(node: &BeeNode, mock: Option<&MockHandle>, duration_secs: u64) -> Result<()> {
    let mut event_rx = node.subscribe();
    node.set_data_notification(true).await?;
    node.set_node_id_notification(true).await?;

    if let Some(mock) = mock {
        // A data notification as the module would push it.
        let mut payload = NodeId::new(0x0000_0000_00CD)?.to_bytes().to_vec();
        payload.extend_from_slice(b"hi");
        mock.inject(&frame(FrameType::Other(0x56), 0x27, &payload)?);
    }

    println!("Monitoring node events (Ctrl-C to stop)...");

    let deadline = if duration_secs > 0 {
        Some(tokio::time::Instant::now() + Duration::from_secs(duration_secs))
    } else if mock.is_some() {
        Some(tokio::time::Instant::now() + Duration::from_millis(100))
    } else {
        None
    };
    let printed = print_events(&mut event_rx, deadline).await;
    debug!(printed, "monitor finished");

    node.set_data_notification(false).await?;
    node.set_node_id_notification(false).await?;
    Ok(())
}

/// Print events until `deadline`, or until the channel closes when there is
/// no deadline. Returns the number of events printed.
async fn print_events(
    event_rx: &mut broadcast::Receiver<NodeEvent>,
    deadline: Option<tokio::time::Instant>,
) -> usize {
    let mut printed = 0;
    loop {
        let wait = match deadline {
            Some(dl) => tokio::time::timeout_at(dl, event_rx.recv()).await,
            None => tokio::time::timeout(Duration::from_secs(3600), event_rx.recv()).await,
        };
        match wait {
            Ok(Ok(NodeEvent::Unsolicited(frame))) => {
                println!(
                    "[frame] type 0x{:02X} opcode 0x{:02X} payload {}",
                    frame.frame_type.as_byte(),
                    frame.opcode,
                    hex::encode(&frame.payload)
                );
                printed += 1;
            }
            Ok(Ok(event)) => {
                println!("[discard] {event:?}");
                printed += 1;
            }
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                println!("[warning] missed {n} events (consumer too slow)");
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            // An idle hour is not the end of an open-ended monitor.
            Err(_) if deadline.is_none() => continue,
            Err(_) => {
                println!("Monitor duration elapsed.");
                break;
            }
        }
    }
    printed
}

async fn cmd_binary(node: &BeeNode) -> Result<()> {
    node.set_binary_mode().await?;
    println!("Sent {:?}", commands::BINARY_MODE_SWITCH);
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // The `list` command does not require a node connection.
    if matches!(cli.command, Command::List) {
        return cmd_list();
    }

    // Reject malformed `send` arguments before opening the port.
    let send_args = match &cli.command {
        Command::Send {
            dest,
            data,
            after_blink,
            blink_timeout,
        } => Some(parse_send_args(dest, data, *after_blink, *blink_timeout)?),
        _ => None,
    };

    let (node, mock) = create_node(&cli).await?;

    let result = match (&cli.command, send_args) {
        (Command::Info, _) => cmd_info(&node).await,
        (Command::Power { step }, _) => cmd_power(&node, *step).await,
        (Command::SyncWord { word }, _) => cmd_sync_word(&node, *word).await,
        (Command::Save, _) => cmd_save(&node).await,
        (Command::Send { .. }, Some(args)) => cmd_send(&node, args).await,
        (Command::Poll, _) => cmd_poll(&node).await,
        (Command::Monitor { duration }, _) => cmd_monitor(&node, mock.as_ref(), *duration).await,
        (Command::Binary, _) => cmd_binary(&node).await,
        (Command::Send { .. }, None) => unreachable!("send arguments parsed above"),
        (Command::List, _) => unreachable!("list handled above"),
    };

    node.close().await.ok();
    result
}
