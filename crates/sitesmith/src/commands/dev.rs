//! Development server command.

use anyhow::Result;
use sitesmith_build::SiteConfig;
use sitesmith_server::{DevServer, DevServerConfig};

use crate::commands::build;
use crate::config::{LoadedConfig, ServerSettings};

/// Build, then run the dev server.
pub async fn run(loaded: LoadedConfig, port: Option<u16>, open: bool) -> Result<()> {
    let LoadedConfig { site, server } = loaded;

    build::build(site.clone()).await?;

    let config = server_config(site, server, port, open);
    tracing::info!("Starting development server on port {}", config.port);

    DevServer::new(config).start().await?;

    Ok(())
}

/// Server settings from the command line, then sitesmith.toml, then defaults.
///
/// `open` is the negation of `--no-open`; either source can turn it off.
pub fn server_config(
    site: SiteConfig,
    server: ServerSettings,
    port: Option<u16>,
    open: bool,
) -> DevServerConfig {
    let defaults = DevServerConfig::default();

    DevServerConfig {
        site,
        port: port.or(server.port).unwrap_or(defaults.port),
        host: server.host.unwrap_or(defaults.host),
        open: open && server.open.unwrap_or(defaults.open),
        debounce: defaults.debounce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_port_wins_over_config() {
        let server = ServerSettings {
            port: Some(8080),
            host: Some("0.0.0.0".to_string()),
            open: None,
        };

        let config = server_config(SiteConfig::default(), server, Some(4000), true);

        assert_eq!(config.port, 4000);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.open);
    }

    #[test]
    fn falls_back_to_config_then_defaults() {
        let server = ServerSettings {
            port: Some(8080),
            host: None,
            open: Some(false),
        };

        let config = server_config(SiteConfig::default(), server, None, true);
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.open);

        let config = server_config(SiteConfig::default(), ServerSettings::default(), None, false);
        assert_eq!(config.port, 3000);
        assert!(!config.open);
    }
}
