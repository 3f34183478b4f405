//! # Labelbot CLI
//!
//! Direct printer control plus the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! # Print an image on a B1 over USB (port auto-detected)
//! labelbot print --model b1 --image label.png
//!
//! # Same, over Bluetooth, rotated, machine-readable output
//! labelbot --json print --model d110 --connection bluetooth --address AA:BB:CC:DD:EE:FF \
//!     --image label.png --rotation 90
//!
//! # Printer state
//! labelbot status --model b1
//! labelbot info --model b1 --info-type battery
//! labelbot rfid --model b1
//! labelbot list-ports
//!
//! # Run the pipeline server
//! labelbot serve --images-dir ./images
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use labelbot::{
    LabelbotError,
    adapter::{self, AdaptOptions, LabelSource},
    bridge::{DEFAULT_TIMEOUT, PrintTarget, PrinterBridge},
    pipeline::context::decode_base64_image,
    printer::{PaperType, PrinterModel, Rotation, TransportKind},
    protocol::InfoKind,
    render::dither::DitheringAlgorithm,
    server::{self, ServerConfig},
    transport,
};

/// Labelbot - turn requests into printed labels on Niimbot printers
#[derive(Parser, Debug)]
#[command(name = "labelbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print one JSON document instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which printer to talk to.
#[derive(Args, Debug, Clone)]
struct PrinterArgs {
    /// Printer model
    #[arg(long, value_enum)]
    model: PrinterModel,

    #[arg(long, value_enum, default_value = "usb")]
    connection: TransportKind,

    /// Serial device path (USB) or MAC address (Bluetooth)
    #[arg(long)]
    address: Option<String>,
}

impl PrinterArgs {
    fn target(&self) -> PrintTarget {
        PrintTarget::new(self.model, self.connection, self.address.clone())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an image
    Print {
        #[command(flatten)]
        printer: PrinterArgs,

        /// Image file to print
        #[arg(long, value_name = "FILE", required_unless_present = "image_base64", conflicts_with = "image_base64")]
        image: Option<PathBuf>,

        /// Base64-encoded image to print
        #[arg(long)]
        image_base64: Option<String>,

        /// Print density 1-5 (capped per model)
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=5))]
        density: u8,

        /// Rotation in degrees: 0, 90, 180 or 270
        #[arg(long, default_value = "0")]
        rotation: Rotation,

        /// Label stock: 1 = 50x15mm, 2 = 50x30mm, 3 = large
        #[arg(long, default_value_t = 1)]
        paper_type: u8,

        /// Dithering: threshold, bayer or floyd-steinberg (auto when omitted)
        #[arg(long)]
        dither: Option<String>,
    },

    /// Read one info value from the printer
    Info {
        #[command(flatten)]
        printer: PrinterArgs,

        #[arg(long, value_enum)]
        info_type: InfoKind,
    },

    /// Read the label roll's RFID tag
    Rfid {
        #[command(flatten)]
        printer: PrinterArgs,
    },

    /// Printer heartbeat
    Status {
        #[command(flatten)]
        printer: PrinterArgs,
    },

    /// List serial ports that may be printers
    ListPorts,

    /// Run the HTTP pipeline server
    Serve {
        #[command(flatten)]
        config: ServerConfig,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,labelbot=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                println!(
                    "{}",
                    json!({ "success": false, "error": e.to_string(), "kind": e.kind(), "hint": e.hint() })
                );
            } else {
                eprintln!("Error: {}", e);
                if let Some(hint) = e.hint() {
                    eprintln!("Hint: {}", hint);
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), LabelbotError> {
    let bridge = PrinterBridge::device(DEFAULT_TIMEOUT);

    match cli.command {
        Commands::Print {
            printer,
            image,
            image_base64,
            density,
            rotation,
            paper_type,
            dither,
        } => {
            let bytes = match (image, image_base64) {
                (Some(path), _) => std::fs::read(&path).map_err(|e| {
                    LabelbotError::InputValidation(format!("Cannot read {}: {}", path.display(), e))
                })?,
                (None, Some(encoded)) => decode_base64_image(&encoded)?,
                (None, None) => {
                    return Err(LabelbotError::InputValidation(
                        "Provide --image or --image-base64".to_string(),
                    ));
                }
            };
            let target = printer.target();
            let options = AdaptOptions {
                density,
                rotation,
                paper_type: PaperType::try_from(paper_type)?,
                algorithm: dither.as_deref().map(DitheringAlgorithm::parse),
            };
            let job = adapter::adapt_blocking(LabelSource::Image(bytes), target.profile(), options).await?;
            let receipt = bridge.print(job, &target).await?;

            if cli.json {
                println!(
                    "{}",
                    json!({
                        "success": true,
                        "message": receipt.message(),
                        "image_size": { "width": receipt.width, "height": receipt.height },
                        "model": target.model,
                        "density": receipt.density,
                        "warnings": receipt.warnings,
                    })
                );
            } else {
                for warning in &receipt.warnings {
                    println!("! {}", warning);
                }
                println!("✓ {}", receipt.message());
            }
        }

        Commands::Info { printer, info_type } => {
            let target = printer.target();
            let value = bridge.info(&target, info_type).await?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "success": true,
                        "info_type": info_type.name(),
                        "value": value,
                        "model": target.model,
                    })
                );
            } else {
                println!("{}: {}", info_type.name(), value);
            }
        }

        Commands::Rfid { printer } => {
            let rfid = bridge.rfid(&printer.target()).await?;
            if cli.json {
                let body = match &rfid {
                    Some(tag) => json!({
                        "success": true,
                        "rfid_detected": true,
                        "uuid": tag.uuid,
                        "barcode": tag.barcode,
                        "serial": tag.serial,
                        "used_length_mm": tag.used_length_mm,
                        "total_length_mm": tag.total_length_mm,
                        "type": tag.kind,
                    }),
                    None => json!({ "success": true, "rfid_detected": false }),
                };
                println!("{}", body);
            } else {
                match rfid {
                    Some(tag) => {
                        println!("RFID Tag Detected:");
                        println!("  UUID: {}", tag.uuid);
                        println!("  Barcode: {}", tag.barcode);
                        println!("  Serial: {}", tag.serial);
                        println!("  Used: {}mm / {}mm", tag.used_length_mm, tag.total_length_mm);
                        println!("  Type: {}", tag.kind);
                    }
                    None => println!("No RFID tag detected"),
                }
            }
        }

        Commands::Status { printer } => {
            let target = printer.target();
            let snapshot = bridge.status(&target).await?;
            let hb = snapshot.heartbeat;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "success": true,
                        "closing_state": hb.closing_state,
                        "power_level": hb.power_level,
                        "paper_state": hb.paper_state,
                        "rfid_read_state": hb.rfid_read_state,
                        "model": target.model,
                    })
                );
            } else {
                println!("Printer Status:");
                let fields = [
                    ("Cover", hb.closing_state),
                    ("Power level", hb.power_level),
                    ("Paper", hb.paper_state),
                    ("RFID read", hb.rfid_read_state),
                ];
                for (label, value) in fields {
                    if let Some(value) = value {
                        println!("  {}: {}", label, value);
                    }
                }
            }
        }

        Commands::ListPorts => {
            let ports = transport::list_ports()?;
            if cli.json {
                println!("{}", json!({ "success": true, "ports": ports }));
            } else if ports.is_empty() {
                println!("No serial ports detected");
            } else {
                println!("Available Serial Ports:");
                for p in &ports {
                    println!("  {}: {}", p.port, p.description);
                }
            }
        }

        Commands::Serve { config } => {
            server::serve(config).await?;
        }
    }

    Ok(())
}
