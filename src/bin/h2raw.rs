use clap::{Args, Parser, Subcommand};
use h2raw::http::h2::{H2Client, H2ClientBuilder, Request, Response};
use h2raw::http::tls::{TlsConfig, TlsVersion};
use h2raw::net::Endpoint;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "h2raw")]
#[command(about = "Send raw, possibly non-conformant HTTP/2 requests", long_about = None)]
struct Cli {
    /// Log every frame sent and received
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    conn: ConnArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnArgs {
    /// Speak cleartext HTTP/2 instead of TLS
    #[arg(long, global = true)]
    plain: bool,

    /// Verify the server certificate
    #[arg(long, global = true)]
    verify: bool,

    /// CA bundle used with --verify
    #[arg(long, global = true, value_name = "PATH")]
    ca_file: Option<PathBuf>,

    /// SNI name, defaults to the endpoint host
    #[arg(long, global = true)]
    servername: Option<String>,

    /// Disable frame validation in both directions
    #[arg(long, global = true)]
    allow_illegal: bool,

    /// TCP connect timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    connect_timeout: Option<f64>,

    /// Per read/write timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    io_timeout: Option<f64>,

    /// Whole exchange deadline in seconds
    #[arg(long, global = true, value_name = "SECS")]
    deadline: Option<f64>,

    /// Abort when the response body grows past this many bytes
    #[arg(long, global = true, value_name = "BYTES")]
    max_body_size: Option<usize>,

    /// Acknowledge server SETTINGS and PING frames
    #[arg(long, global = true)]
    auto_ack: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single request
    Request(RequestArgs),
    /// Replay the built-in probes, each on its own connection
    Demo {
        /// host:port to connect to
        endpoint: String,

        /// :authority value, defaults to the endpoint host
        #[arg(long)]
        authority: Option<String>,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// host:port to connect to
    endpoint: String,

    /// :method value, sent verbatim
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// :scheme value, defaults to https (http with --plain)
    #[arg(long)]
    scheme: Option<String>,

    /// :authority value, defaults to the endpoint host
    #[arg(long)]
    authority: Option<String>,

    /// :path value
    #[arg(long, default_value = "/")]
    path: String,

    /// Header as name:value, repeatable, order and case kept
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long, conflicts_with = "body_file")]
    data: Option<String>,

    /// Read the request body from a file
    #[arg(long, value_name = "PATH")]
    body_file: Option<PathBuf>,

    /// Stream identifier for the request
    #[arg(long, default_value_t = 1)]
    stream_id: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "h2raw=debug" } else { "h2raw=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = build_client(&cli.conn)?;

    match cli.command {
        Commands::Request(args) => run_request(&client, &cli.conn, args),
        Commands::Demo {
            endpoint,
            authority,
        } => run_demo(&client, &cli.conn, &endpoint, authority),
    }
}

fn build_client(args: &ConnArgs) -> Result<H2Client, Box<dyn std::error::Error>> {
    let mut builder = H2ClientBuilder::new()
        .allow_illegal(args.allow_illegal)
        .auto_ack(args.auto_ack);

    if !args.plain {
        let mut tls = TlsConfig::client()
            .version_range(TlsVersion::Tls10, TlsVersion::Tls13)
            .alpn(&["h2"])
            .verify_peer(args.verify);
        if let Some(name) = &args.servername {
            tls = tls.servername(name.clone());
        }
        if let Some(path) = &args.ca_file {
            tls = tls.ca_file(path);
        }
        builder = builder.tls(tls.build()?);
    }

    if let Some(secs) = args.connect_timeout {
        builder = builder.connect_timeout(Duration::try_from_secs_f64(secs)?);
    }
    if let Some(secs) = args.io_timeout {
        builder = builder.io_timeout(Duration::try_from_secs_f64(secs)?);
    }
    if let Some(secs) = args.deadline {
        builder = builder.deadline(Duration::try_from_secs_f64(secs)?);
    }
    if let Some(max) = args.max_body_size {
        builder = builder.max_body_size(max);
    }

    Ok(builder.build())
}

fn run_request(
    client: &H2Client,
    conn_args: &ConnArgs,
    args: RequestArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = Endpoint::parse(&args.endpoint)?;
    let scheme = args
        .scheme
        .unwrap_or_else(|| default_scheme(conn_args).to_string());
    let authority = args
        .authority
        .unwrap_or_else(|| endpoint.host().to_string());

    let mut request = Request::new(args.method, scheme, authority, args.path);
    for header in &args.headers {
        let (name, value) = split_header(header)
            .ok_or_else(|| format!("header {:?} is not in name:value form", header))?;
        request.add_header(name, value);
    }
    if let Some(data) = args.data {
        request.set_body(data);
    }
    if let Some(path) = args.body_file {
        request.set_body(std::fs::read(path)?);
    }

    let response = exchange(client, &args.endpoint, &request, args.stream_id)?;
    std::io::stdout().lock().write_all(&render(&response))?;
    Ok(())
}

fn run_demo(
    client: &H2Client,
    conn_args: &ConnArgs,
    endpoint: &str,
    authority: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let authority = match authority {
        Some(authority) => authority,
        None => Endpoint::parse(endpoint)?.host().to_string(),
    };
    let scheme = default_scheme(conn_args);

    for (name, request) in demo_requests(scheme, &authority)? {
        tracing::info!(probe = name, "running probe");
        match exchange(client, endpoint, &request, 1) {
            Ok(response) => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "== {}", name)?;
                out.write_all(&render(&response))?;
                writeln!(out, "\n")?;
            }
            Err(e) => tracing::error!(probe = name, error = %e, "probe failed"),
        }
    }

    Ok(())
}

fn demo_requests(
    scheme: &str,
    authority: &str,
) -> Result<Vec<(&'static str, Request)>, Box<dyn std::error::Error>> {
    let simple_get = Request::new("GET", scheme, authority, "/example/simpleget")
        .with_header("host", authority)
        .with_header("x-demo-header", "just some header value");

    let get_with_body = Request::new("GET", scheme, authority, "/example/fatget")
        .with_body("This GET request has a body!");

    let mut random = [0u8; 100];
    openssl::rand::rand_bytes(&mut random)?;
    let mut binary = Vec::new();
    binary.extend_from_slice(b"First some text. Next binary data follows.");
    binary.extend_from_slice(&random);
    binary.extend_from_slice(b"And finally some text again");
    let binary_post = Request::new("POST", scheme, authority, "/example/post").with_body(binary);

    let lying_post = Request::new("POST", scheme, authority, "/example/post")
        .with_header("content-length", "2")
        .with_body("Some body longer than 2 bytes!");

    let junk = Request::new("JUNK method 1234", scheme, authority, "/example/simpleget")
        .with_header("x-demo-header", "just some header value");

    Ok(vec![
        ("simple GET", simple_get),
        ("GET with body", get_with_body),
        ("binary POST", binary_post),
        ("POST with lying content-length", lying_post),
        ("junk method", junk),
    ])
}

fn exchange(
    client: &H2Client,
    endpoint: &str,
    request: &Request,
    stream_id: u32,
) -> Result<Response, h2raw::http::h2::Error> {
    let mut conn = client.connect(endpoint)?;
    let result = client.make_request(&mut conn, request, stream_id);
    if let Err(e) = conn.close() {
        tracing::debug!(error = %e, "close failed");
    }
    result
}

fn default_scheme(args: &ConnArgs) -> &'static str {
    if args.plain {
        "http"
    } else {
        "https"
    }
}

/// Split `name:value`; a leading colon belongs to the name
fn split_header(header: &str) -> Option<(&str, &str)> {
    let offset = usize::from(header.starts_with(':'));
    let idx = header[offset..].find(':')? + offset;
    Some((&header[..idx], header[idx + 1..].trim_start()))
}

/// Header lines, a blank line, then the body, all as received
fn render(response: &Response) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in response.headers().iter() {
        out.extend_from_slice(name);
        out.extend_from_slice(b": ");
        out.extend_from_slice(value);
        out.push(b'\n');
    }
    out.push(b'\n');
    if let Some(body) = response.body() {
        out.extend_from_slice(body);
    }
    out
}
