//! Layered configuration: optional TOML file, then `PIGMAP__*` environment
//! variables (`PIGMAP__SERVER__PORT=9000`, `PIGMAP__LIVE__SNAPSHOT__KIND=memory`).

use std::path::Path;

use actors::CoordinatorConfig;
use api::ReportPolicy;
use db::DbConfig;
use serde::Deserialize;
use storage::StorageConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DbConfig,
    pub storage: StorageConfig,
    pub live: CoordinatorConfig,
    pub reports: ReportPolicy,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("PIGMAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use actors::SnapshotBackend;
    use config::{Config, File, FileFormat};
    use storage::StorageBackendConfig;

    use super::*;

    fn from_toml(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .unwrap()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let settings = from_toml("");
        assert_eq!(settings.server.port, 8787);
        assert_eq!(settings.database.endpoint, "mem://");
        assert_eq!(settings.live.name.as_deref(), Some("global-reports"));
        assert_eq!(settings.live.cache.reports, 100);
        assert_eq!(settings.reports, ReportPolicy::default());
        assert!(matches!(
            settings.storage.backend,
            StorageBackendConfig::Filesystem { .. }
        ));
    }

    #[test]
    fn nested_sections_override_defaults() {
        let settings = from_toml(
            r#"
            [server]
            port = 9000

            [storage.backend]
            kind = "memory"

            [live]
            snapshot_key = "cache-v2"

            [live.cache]
            reports = 50

            [live.snapshot]
            kind = "file"
            dir = "/var/lib/pigmap/live"

            [reports]
            edit_token_ttl_days = 14
            "#,
        );

        assert_eq!(settings.server.address(), "0.0.0.0:9000");
        assert!(matches!(settings.storage.backend, StorageBackendConfig::Memory));
        assert_eq!(settings.live.snapshot_key, "cache-v2");
        assert_eq!(settings.live.cache.reports, 50);
        assert_eq!(settings.live.cache.comments_per_report, 100);
        assert_eq!(
            settings.live.snapshot,
            SnapshotBackend::File {
                dir: PathBuf::from("/var/lib/pigmap/live")
            }
        );
        assert_eq!(settings.reports.edit_token_ttl_days, 14);
        assert_eq!(settings.reports.max_list_limit, 500);
    }
}
