use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use nslookup::config::{NameserverEndpoint, ResolverConfig, DNS_PORT};
use nslookup::logging::init_logging;
use nslookup::{inspect_reply, DnsQuery, ResolutionOutcome, ResolverSession};

const EXIT_TIMED_OUT: u8 = 2;

#[derive(Parser)]
#[command(name = "nslookup")]
#[command(version)]
#[command(about = "Send one DNS query over UDP and report what comes back")]
struct Cli {
    /// Ask for mail exchangers (MX) instead of addresses (A)
    #[arg(short = 'm', long = "mx")]
    mx: bool,

    /// Nameserver IPv4 address
    #[arg(short, long, default_value = "8.8.8.8")]
    server: Ipv4Addr,

    /// Nameserver port
    #[arg(short, long, default_value_t = DNS_PORT)]
    port: u16,

    /// How long to wait for a reply, in milliseconds
    #[arg(short, long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Set the recursion desired flag
    #[arg(short, long)]
    recursive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Host to look up, e.g. www.sandiego.edu
    hostname: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = ResolverConfig {
        server: NameserverEndpoint::with_port(cli.server, cli.port),
        timeout: Duration::from_millis(cli.timeout_ms),
        recursion_desired: cli.recursive,
        ..ResolverConfig::default()
    };
    let session = ResolverSession::new(&config)?;

    let query = if cli.mx {
        DnsQuery::mx_query(&cli.hostname)?
    } else {
        DnsQuery::addr_query(&cli.hostname)?
    };
    let query = if config.recursion_desired { query.with_recursion() } else { query };

    info!(
        id = query.id(),
        hostname = query.hostname(),
        qtype = %query.query_type(),
        server = %config.server,
        timeout = ?session.timeout(),
        "resolving"
    );

    match session.resolve(&query.encode_packet(), config.server) {
        ResolutionOutcome::Received(reply) => {
            println!("Received {} bytes from {}", reply.bytes.len(), reply.source);
            match inspect_reply(&query, &reply.bytes) {
                Ok(summary) => {
                    let header = summary.header;
                    println!(
                        "id {:#06x}, rcode {}, {} answer(s), {} authority, {} additional",
                        header.transaction_id,
                        header.rcode(),
                        header.answer_rr_count,
                        header.authority_rr_count,
                        header.additional_rr_count,
                    );
                }
                Err(err) => warn!(error = %err, "reply does not match the query"),
            }
            Ok(ExitCode::SUCCESS)
        }
        ResolutionOutcome::TimedOut => {
            println!("Timed out!");
            Ok(ExitCode::from(EXIT_TIMED_OUT))
        }
        ResolutionOutcome::TransportError(err) => Err(err.into()),
    }
}
