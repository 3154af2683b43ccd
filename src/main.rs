//! CLI for the broker
//!
//! Subcommands:
//! - `server`: run the broker until Ctrl-C
//! - `client`: run a small demo client (useful for smoke tests)

use clap::Parser;
use pubsub_broker::broker::message::{Method, Value};
use pubsub_broker::codec::{self, Format};
use pubsub_broker::config::load_config;
use pubsub_broker::transport::{Server, frame, read_replies_until};
use pubsub_broker::utils::{BrokerError, logging};
use tokio::net::TcpStream;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pubsub-broker")]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the broker
    Server,
    /// Run the demo client (handshake, subscribe, publish, list topics)
    Client {
        /// Broker address to connect to
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: String,
        /// Serialization format: JSON, XML or BINARY
        #[arg(long, default_value = "JSON")]
        format: Format,
        #[arg(long, default_value = "demo")]
        topic: String,
        #[arg(long, default_value = "hello")]
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Server => run_server().await,
        Command::Client {
            addr,
            format,
            topic,
            value,
        } => run_client(&addr, format, &topic, value).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server() -> Result<(), BrokerError> {
    let config = load_config()?;
    let server = Server::bind(config).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
        })
        .await
}

async fn run_client(
    addr: &str,
    format: Format,
    topic: &str,
    value: String,
) -> Result<(), BrokerError> {
    let mut stream = TcpStream::connect(addr).await?;
    info!(addr, %format, "connected");

    // 1. Handshake, always sent in the default format
    let hello = codec::encode(
        Method::Publish,
        None,
        &Value::from(format.name()),
        Format::default(),
    )?;
    frame::write_frame(&mut stream, &hello).await?;

    // 2. Subscribe
    let subscribe = codec::encode(Method::Subscribe, Some(topic), &Value::Null, format)?;
    frame::write_frame(&mut stream, &subscribe).await?;

    // 3. Publish; our own subscription echoes it back as PUBLISH_REP.
    // A SUBSCRIBE_REP comes first when the topic already holds a value.
    let publish = codec::encode(Method::Publish, Some(topic), &Value::Text(value), format)?;
    frame::write_frame(&mut stream, &publish).await?;
    print_replies_until(&mut stream, format, Method::PublishRep).await?;

    // 4. List topics
    let list = codec::encode(Method::ListTopics, None, &Value::Null, format)?;
    frame::write_frame(&mut stream, &list).await?;
    print_replies_until(&mut stream, format, Method::ListTopicsRep).await?;

    Ok(())
}

/// Print incoming replies up to and including the first `expected` one.
async fn print_replies_until(
    stream: &mut TcpStream,
    format: Format,
    expected: Method,
) -> Result<(), BrokerError> {
    for reply in read_replies_until(stream, format, expected).await? {
        println!(
            "{} topic={:?} value={:?}",
            reply.method, reply.topic, reply.value
        );
    }
    Ok(())
}
