use crate::cli::duration::parse_duration;
use crate::cli::ui::{display_drop, display_info, display_warning};
use crate::config::DropConfig;
use crate::core::{ConsumptionPolicy, Session, SessionStore, StoreConfig};
use crate::discovery::{AliasPublisher, MdnsPublisher, NoopPublisher, alias_host};
use crate::error::{DropError, Result};
use crate::protocol::{DEFAULT_HOST, normalize_alias, validate_duration, validate_port};
use crate::server::DropServer;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
pub struct ShareCommand {
    /// File or directory to share; omit to start in upload mode
    #[arg(short, long, env = "DROP_FILE")]
    pub file: Option<PathBuf>,

    /// Time until the drop expires: 5m, 1h, 90s, or seconds (300)
    #[arg(short, long, env = "DROP_TIME", default_value = "5m", value_parser = parse_duration)]
    pub time: Duration,

    #[arg(short, long, env = "DROP_PORT", default_value = "8080", value_parser = validate_port)]
    pub port: u16,

    /// Also answer as <alias>.local and serve the file at /
    #[arg(short, long, env = "DROP_ALIAS", value_parser = normalize_alias)]
    pub alias: Option<String>,

    #[arg(long, env = "DROP_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Invalidate the drop after its first download
    #[arg(long, env = "DROP_SINGLE_USE")]
    pub single_use: bool,

    /// Hide the upload form and reject uploads
    #[arg(long, env = "DROP_NO_UPLOAD")]
    pub no_upload: bool,
}

impl ShareCommand {
    /// Validated configuration; a given file must exist
    pub fn into_drop_config(self) -> Result<DropConfig> {
        validate_duration(self.time)?;

        let file_path = match self.file {
            Some(path) => {
                if !path.exists() {
                    return Err(DropError::invalid_config(format!(
                        "File not found: {}",
                        path.display()
                    )));
                }
                Some(path.canonicalize()?)
            }
            None => None,
        };

        if file_path.is_none() && self.no_upload {
            return Err(DropError::invalid_config(
                "Nothing to serve: pass --file or allow uploads",
            ));
        }

        Ok(DropConfig {
            file_path,
            duration: self.time,
            port: self.port,
            host: self.host,
            alias: self.alias,
            single_use: self.single_use,
            allow_uploads: !self.no_upload,
        })
    }
}

/// LAN URL for a session and, with an alias, the `.local` URL
///
/// The alias URL drops the port when it is 80.
pub fn build_share_urls(
    alias: Option<&str>,
    base_url: &str,
    session_id: &str,
) -> (String, Option<String>) {
    let path = if session_id.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", session_id)
    };
    let lan_url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let alias_url = alias.map(|alias| {
        let port = base_url
            .trim_end_matches('/')
            .rsplit_once(':')
            .map(|(_, port)| port)
            .filter(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or("80");
        let port_suffix = if port == "80" {
            String::new()
        } else {
            format!(":{}", port)
        };
        format!("http://{}{}{}", alias_host(alias), port_suffix, path)
    });

    (lan_url, alias_url)
}

pub async fn execute(command: ShareCommand) -> anyhow::Result<()> {
    let config = command.into_drop_config()?;

    let policy = if config.single_use {
        ConsumptionPolicy::SingleUse
    } else {
        ConsumptionPolicy::MultiUse
    };
    let store = SessionStore::with_config(StoreConfig {
        policy,
        ..StoreConfig::default()
    });

    let session = match &config.file_path {
        Some(path) => Some(
            store
                .create_session(path, config.duration, config.uses_root_slot())
                .await?,
        ),
        None => None,
    };

    let mut server = DropServer::new(store.clone(), config.server_config());
    server.start().await?;

    let mut publisher: Box<dyn AliasPublisher> = match config.alias {
        Some(_) => Box::new(MdnsPublisher::new()),
        None => Box::new(NoopPublisher),
    };
    if let Some(alias) = &config.alias {
        if let Err(e) = publisher.publish_alias(alias, server.port()).await {
            tracing::warn!("mDNS publish failed: {}", e);
            display_warning(&format!("Could not publish {}: {}", alias_host(alias), e));
        }
    }

    let base_url = server.url();
    match &session {
        Some(session) => {
            let (lan_url, alias_url) =
                build_share_urls(config.alias.as_deref(), &base_url, &session.id);
            display_drop(session, &lan_url, alias_url.as_deref());
            display_info("Waiting for download... (Ctrl+C to stop)");
        }
        None => {
            let (lan_url, alias_url) = build_share_urls(config.alias.as_deref(), &base_url, "");
            println!("\nUpload files at {}", lan_url);
            if let Some(alias_url) = alias_url {
                println!("or {}", alias_url);
            }
            display_info("Press Ctrl+C to stop.");
        }
    }

    tokio::select! {
        result = wait_for_shutdown_signal() => {
            result?;
            display_info("Shutting down...");
        }
        _ = wait_for_expiry(&store, session.as_ref()) => {
            display_info("Drop expired, shutting down...");
        }
    }

    server.stop().await;
    publisher.stop().await;
    store.cleanup();
    display_info("Goodbye!");

    Ok(())
}

/// Resolve once the shared file's session lapses; never in upload mode
async fn wait_for_expiry(store: &SessionStore, session: Option<&Session>) {
    match session {
        Some(session) => tokio::time::sleep(session.remaining_at(store.now())).await,
        None => std::future::pending().await,
    }
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => {},
            result = tokio::signal::ctrl_c() => result?,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
