use clap::Parser;
use doh_proxy_domain::config::parse_ip_csv;
use doh_proxy_domain::{CliOverrides, Config, QueryMode};
use tracing::{error, info};

mod bootstrap;
mod di;
mod server;

/// A DNS-protocol proxy for DNS-over-HTTPS service.
#[derive(Parser)]
#[command(name = "doh-proxy")]
#[command(version)]
#[command(about = "A DNS-protocol proxy for DNS-over-HTTPS service")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address, as `[host]:port`
    #[arg(long)]
    listen: Option<String>,

    /// DNS-over-HTTPS endpoint url
    #[arg(long)]
    endpoint: Option<String>,

    /// IPs of the DNS-over-HTTPS endpoint; if provided, endpoint lookup is
    /// skipped and TLS is established against these addresses directly.
    /// Comma separated with no spaces; one server is chosen randomly for
    /// each connection.
    #[arg(long)]
    endpoint_ips: Option<String>,

    /// Subnet for the edns0-client-subnet option: `no`, `auto`, or
    /// `net/mask`
    #[arg(long)]
    edns_subnet: Option<String>,

    /// Reply to all AAAA questions with an empty answer
    #[arg(long)]
    no_ipv6: bool,

    /// CA certificate for TLS establishment
    #[arg(long)]
    cacert: Option<String>,

    /// Use HTTP/2 for the query connection
    #[arg(long)]
    http2: bool,

    /// DNS resolver for retrieving the IP of the DoH endpoint host,
    /// e.g. "8.8.8.8:53"
    #[arg(long)]
    dns_resolver: Option<String>,

    /// Cache the DNS answers
    #[arg(long)]
    cache: Option<bool>,

    /// Listen on TCP
    #[arg(long)]
    tcp: Option<bool>,

    /// Listen on UDP
    #[arg(long)]
    udp: Option<bool>,

    /// Alternative google url scheme, as in dns.google/resolve
    #[arg(long)]
    google: bool,

    /// JSON API of dns.google/resolve
    #[arg(long)]
    json: bool,

    /// Additional header sent with every upstream request, as Key=Value;
    /// repeatable
    #[arg(long = "headers", value_name = "KEY=VALUE")]
    headers: Vec<String>,

    /// Additional query parameter sent with every upstream request, as
    /// key=value; repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Log level, one of: debug, info, warn, error, fatal, panic
    #[arg(long)]
    loglevel: Option<String>,
}

impl Cli {
    fn overrides(&self) -> anyhow::Result<CliOverrides> {
        let endpoint_ips = match &self.endpoint_ips {
            Some(csv) => Some(parse_ip_csv(csv)?),
            None => None,
        };
        let mode = if self.google {
            Some(QueryMode::Resolve)
        } else if self.json {
            Some(QueryMode::Json)
        } else {
            None
        };

        Ok(CliOverrides {
            listen: self.listen.clone(),
            endpoint: self.endpoint.clone(),
            endpoint_ips,
            edns_subnet: self.edns_subnet.clone(),
            no_aaaa: self.no_ipv6.then_some(true),
            cacert: self.cacert.clone(),
            http2: self.http2.then_some(true),
            dns_resolver: self.dns_resolver.clone(),
            mode,
            cache: self.cache,
            udp: self.udp,
            tcp: self.tcp,
            headers: self.headers.clone(),
            params: self.params.clone(),
            log_level: self.loglevel.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.overrides()?)?;

    bootstrap::init_logging(&config);
    info!("starting doh-proxy v{}", env!("CARGO_PKG_VERSION"));

    let handler = di::build_handler(&config)?;
    let listen_addr = config.server.listen_addr()?;

    if config.stub.enabled {
        let stub_config = config.stub.clone();
        tokio::spawn(async move {
            if let Err(e) = doh_proxy_stub::serve(&stub_config).await {
                error!(error = %e, "stub server error");
            }
        });
    }

    let server = tokio::spawn(server::start_dns_server(
        listen_addr,
        handler,
        config.server.udp,
        config.server.tcp,
    ));

    tokio::select! {
        result = server => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, stopping");
        }
    }

    info!("servers exited, stopping");
    Ok(())
}
