//! Command-line interface for bridge-proto
//!
//! # Usage Examples
//!
//! ## Inspect
//! ```bash
//! # List raw tags and values, no schema needed
//! bridge-proto inspect --input payload.bin
//! bridge-proto inspect --input payload.b64 --base64
//! ```
//!
//! ## Decode
//! ```bash
//! bridge-proto decode \
//!   --schema schema.yaml \
//!   --message-type test.Person \
//!   --input payload.bin
//! ```
//!
//! ## Re-encode
//! ```bash
//! # Drop default-valued scalars and cap nesting at 32 levels
//! bridge-proto --max-depth 32 reencode \
//!   --schema schema.yaml \
//!   --message-type test.Person \
//!   --input payload.bin \
//!   --output compact.bin \
//!   --skip-defaults
//! ```
//!
//! Logging is controlled through `RUST_LOG`, e.g. `RUST_LOG=proto_codec=trace`
//! shows per-field decode detail.

use bridge_proto::{commands, CodecOpts, InputOpts, MessageOpts};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bridge-proto")]
#[command(about = "Decode, inspect and re-encode protobuf payloads against a descriptor table")]
#[command(long_about = None)]
struct Cli {
    #[command(flatten)]
    codec: CodecOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the raw fields of a payload without a schema
    Inspect {
        #[command(flatten)]
        input: InputOpts,
    },

    /// List the message types and fields of a descriptor table
    Schema {
        /// YAML or JSON descriptor table
        #[arg(long, value_name = "PATH")]
        schema: PathBuf,

        /// Print the validated table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a payload and print it with field names
    Decode {
        #[command(flatten)]
        message: MessageOpts,

        #[command(flatten)]
        input: InputOpts,
    },

    /// Decode a payload and write it back out through the encoder
    Reencode {
        #[command(flatten)]
        message: MessageOpts,

        #[command(flatten)]
        input: InputOpts,

        /// Where to write the encoded message
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Omit singular scalars equal to their type default
        #[arg(long)]
        skip_defaults: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.codec.load_config()?;
    tracing::debug!(?config, "codec configuration");

    match cli.command {
        Commands::Inspect { input } => {
            print!("{}", commands::inspect_payload(&input, &config)?);
        }
        Commands::Schema { schema, json } => {
            let text = commands::describe_schema(&schema, json)?;
            if json {
                println!("{text}");
            } else {
                print!("{text}");
            }
        }
        Commands::Decode { message, input } => {
            print!("{}", commands::decode_payload(&message, &input, config)?);
        }
        Commands::Reencode {
            message,
            input,
            output,
            skip_defaults,
        } => {
            let written =
                commands::reencode_payload(&message, &input, &output, config, skip_defaults)?;
            tracing::info!("Wrote {written} bytes to {output:?}");
        }
    }

    Ok(())
}
