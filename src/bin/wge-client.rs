//! Request peer configurations from a wge-server.
//!
//! For every interface name (from `--conf` and the command line), generates
//! a fresh key pair and preshared key, submits them to `<endpoint>/add-peer` and writes the returned
//! configuration, completed with the private key and the local interface
//! hooks, to `<out-dir>/<name>/<name>.conf`.

use clap::Parser;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use wg_exchange::config::client::{load_client_config, validate_client_name, ClientConfig};
use wg_exchange::config::ObservabilityConfig;
use wg_exchange::http::AdmitRequest;
use wg_exchange::observability::logging;
use wg_exchange::processor::sink::CONF_FILE_MODE;
use wg_exchange::wireguard::{ClientConf, PresharedKey, WgKeyPair};

#[derive(Parser)]
#[command(name = "wge-client", version, about = "Request WireGuard peer configurations", long_about = None)]
struct Cli {
    /// Client configuration file (names, keepalive, interface hooks).
    #[arg(short, long)]
    conf: Option<PathBuf>,

    /// Server endpoint.
    #[arg(short, long, default_value = "https://127.0.0.1:7777")]
    endpoint: String,

    /// Extra root certificate (PEM) to trust for the endpoint.
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Directory the per-interface folders are created in.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// PersistentKeepalive in seconds, overriding the file. 0 disables it.
    #[arg(short, long)]
    keepalive: Option<u16>,

    /// Firewall mark, overriding the file and the server's value.
    #[arg(long)]
    fw_mark: Option<u32>,

    /// Interface names to request, in addition to those in the file.
    names: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&ObservabilityConfig::default());

    let mut config = match &cli.conf {
        Some(path) => load_client_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(keepalive) = cli.keepalive {
        config.client.persistent_keepalive = keepalive;
    }
    if let Some(fw_mark) = cli.fw_mark {
        config.interface.fw_mark = fw_mark;
    }
    for name in &cli.names {
        validate_client_name(name)?;
        config.client.names.push(name.clone());
    }
    if config.client.names.is_empty() {
        return Err("no client names given (command line or [client] names)".into());
    }

    let mut url = reqwest::Url::parse(&cli.endpoint)?;
    if url.scheme() != "https" {
        tracing::warn!(endpoint = %url, "Endpoint is not https; keys travel in the clear");
    }
    url.set_path("/add-peer");
    url.set_query(None);
    url.set_fragment(None);

    let mut builder = reqwest::Client::builder();
    if let Some(ca) = &cli.ca {
        let pem = fs::read(ca)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }
    let client = builder.build()?;

    let mut failures = 0usize;
    for name in &config.client.names {
        tracing::info!(interface = %name, "Requesting peer");
        match create_client(&client, &url, &config, &cli.out_dir, name).await {
            Ok(path) => tracing::info!(interface = %name, path = %path.display(), "Client created"),
            Err(e) => {
                failures += 1;
                tracing::error!(interface = %name, error = %e, "Client creation failed");
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} clients failed", failures, config.client.names.len()).into());
    }
    Ok(())
}

async fn create_client(
    client: &reqwest::Client,
    url: &reqwest::Url,
    config: &ClientConfig,
    out_dir: &Path,
    name: &str,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let keys = WgKeyPair::generate();
    let psk = PresharedKey::generate();

    let request = AdmitRequest {
        public_key: keys.public_key().as_bytes().to_vec(),
        preshared_key: Some(psk.as_bytes().to_vec()),
    };

    let res = client.post(url.clone()).json(&request).send().await?;
    let status = res.status();
    if !status.is_success() {
        let reason = res.text().await.unwrap_or_default();
        return Err(format!("server returned {}: {}", status, reason.trim()).into());
    }

    let mut conf: ClientConf = res.json().await?;
    if conf.peers.len() != 1 {
        return Err(format!("expected one peer, got {}", conf.peers.len()).into());
    }
    conf.interface.private_key = Some(keys.private_key().clone());
    config.apply_defaults(&mut conf.interface);
    conf.peers[0].persistent_keepalive = Some(config.client.persistent_keepalive).filter(|k| *k > 0);

    Ok(write_conf(out_dir, name, &conf)?)
}

fn write_conf(out_dir: &Path, name: &str, conf: &ClientConf) -> Result<PathBuf, std::io::Error> {
    let dir = out_dir.join(name);
    DirBuilder::new().recursive(true).mode(0o740).create(&dir)?;

    let path = dir.join(format!("{}.conf", name));
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(CONF_FILE_MODE)
        .open(&path)?;
    file.write_all(conf.to_string().as_bytes())?;
    file.sync_data()?;
    Ok(path)
}
