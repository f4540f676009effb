use crate::{
    cli::OutputFormat,
    config::AppConfig,
    error::{CliError, Result},
    output::{OutputManager, write_output},
    server::{self, AppState},
};
use mirror_resolver::extractor::default::create_client;
use mirror_resolver::{
    ContentId, EpisodeMeta, MirrorEntry, ProxySigner, Resolver, StreamAssembler, StreamsResponse,
};
use std::{io::Read, path::Path};
use tracing::{debug, info};
use url::form_urlencoded;

pub struct CommandExecutor {
    config: AppConfig,
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn output(&self) -> OutputManager {
        OutputManager::new(self.config.colored_output)
    }

    fn signer(&self) -> ProxySigner {
        ProxySigner::new(self.config.proxy_secret.clone())
    }

    pub async fn resolve(
        &self,
        input: &Path,
        content_id: &str,
        anime_name: Option<String>,
        privileged: bool,
        output_format: &OutputFormat,
        output_file: Option<&Path>,
    ) -> Result<()> {
        let content: ContentId = content_id.parse()?;
        let entries = read_mirrors(input)?;
        info!(mirrors = entries.len(), %content, "resolving");

        let resolver = Resolver::from_config(self.config.resolver.clone());
        let report = resolver.resolve(&entries, privileged).await?;

        let meta = EpisodeMeta::new(content.to_string(), anime_name, content.episode);
        let response = StreamsResponse {
            streams: StreamAssembler::new().assemble(report.streams.clone(), &meta),
        };

        let output = self
            .output()
            .format_streams(&response, &report, output_format)?;
        write_output(&output, output_file)?;

        if response.streams.is_empty() && !entries.is_empty() {
            return Err(CliError::NoStreamsAvailable);
        }
        Ok(())
    }

    /// Prints a `/proxy/m3u8` link for `url`.
    pub fn sign(&self, url: &str, referer: Option<&str>) -> Result<()> {
        url::Url::parse(url).map_err(|e| CliError::invalid_input(format!("{url}: {e}")))?;
        println!("{}", self.proxy_link(url, referer));
        Ok(())
    }

    fn proxy_link(&self, url: &str, referer: Option<&str>) -> String {
        let signer = self.signer();
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("url", &signer.encode(url));
        if let Some(referer) = referer {
            query.append_pair("referer", &signer.encode(referer));
        }

        let base = self
            .config
            .server
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.config.server.bind));
        format!("{}/proxy/m3u8?{}", base.trim_end_matches('/'), query.finish())
    }

    pub fn verify(&self, token: &str) -> Result<()> {
        let url = self.signer().decode(token)?;
        println!("{url}");
        Ok(())
    }

    pub fn list_providers(&self, detailed: bool) -> Result<()> {
        let resolver = Resolver::from_config(self.config.resolver.clone());
        let output = self
            .output()
            .format_providers(resolver.registry().descriptors(), detailed);
        println!("{output}");
        Ok(())
    }

    pub async fn serve(&self, bind: Option<&str>) -> Result<()> {
        let bind = bind.unwrap_or(&self.config.server.bind);
        let client = create_client(&self.config.resolver)?;
        let resolver = Resolver::from_config(self.config.resolver.clone());
        debug!(providers = resolver.registry().descriptors().len(), "starting front end");

        server::serve(AppState::new(resolver, client, self.signer()), bind).await?;
        Ok(())
    }
}

/// Reads a JSON mirror list from `input`, or stdin for `-`.
fn read_mirrors(input: &Path) -> Result<Vec<MirrorEntry>> {
    let content = if input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(input)?
    };
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> CommandExecutor {
        let mut config = AppConfig::default();
        config.proxy_secret = "change-me".to_string();
        config.server.public_url = Some("https://mirror.example/".to_string());
        CommandExecutor::new(config)
    }

    #[test]
    fn test_proxy_link() {
        let link = executor().proxy_link("https://cdn.example/hls/master.m3u8?token=abc", None);
        assert_eq!(
            link,
            "https://mirror.example/proxy/m3u8?url=aHR0cHM6Ly9jZG4uZXhhbXBsZS9obHMvbWFzdGVyLm0zdTg_dG9rZW49YWJj.05bbd0a1879a6856"
        );
    }

    #[test]
    fn test_proxy_link_defaults_to_bind_address() {
        let executor = CommandExecutor::new(AppConfig::default());
        let link = executor.proxy_link("https://a.example/m.m3u8", Some("https://a.example/"));
        assert!(link.starts_with("http://127.0.0.1:7000/proxy/m3u8?url="));
        assert!(link.contains("&referer="));
    }

    #[test]
    fn test_read_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrors.json");
        std::fs::write(
            &path,
            r#"[{"player":"https://ebd.cda.pl/620x368/1","player_hosting":"cda","translator_title":"Group","isInverted":"true"}]"#,
        )
        .unwrap();

        let entries = read_mirrors(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].provider_label, "cda");
        assert!(entries[0].inverted);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(read_mirrors(&path), Err(CliError::Json(_))));
    }
}
