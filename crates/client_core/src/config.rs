use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use url::Url;

pub const SETTINGS_FILE: &str = "gallery.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub collection_path: String,
    pub upload_url: String,
    pub upload_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub upload_chunk_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000".into(),
            collection_path: "/collection".into(),
            upload_url: "http://127.0.0.1:3000/upload".into(),
            upload_api_key: None,
            request_timeout_secs: 30,
            upload_chunk_bytes: 64 * 1024,
        }
    }
}

impl Settings {
    pub fn collection_url(&self) -> anyhow::Result<Url> {
        let base = parse_base_url(&self.api_url)?;
        base.join(self.collection_path.trim_start_matches('/'))
            .with_context(|| {
                format!(
                    "invalid collection path '{}' for api url '{}'",
                    self.collection_path, self.api_url
                )
            })
    }

    pub fn upload_endpoint(&self) -> anyhow::Result<Url> {
        Url::parse(self.upload_url.trim())
            .with_context(|| format!("invalid upload url '{}'", self.upload_url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()
            .context("failed to build http client")
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("GALLERY_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Ok(v) = std::env::var("APP__COLLECTION_PATH") {
        settings.collection_path = v;
    }

    if let Ok(v) = std::env::var("GALLERY_UPLOAD_URL") {
        settings.upload_url = v;
    }
    if let Ok(v) = std::env::var("APP__UPLOAD_URL") {
        settings.upload_url = v;
    }

    if let Ok(v) = std::env::var("GALLERY_UPLOAD_API_KEY") {
        settings.upload_api_key = Some(v);
    }

    if let Ok(v) = std::env::var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = raw.parse::<toml::Table>() else {
        tracing::warn!("config: ignoring malformed {SETTINGS_FILE}");
        return;
    };

    if let Some(v) = string_key(&file_cfg, "api_url") {
        settings.api_url = v;
    }
    if let Some(v) = string_key(&file_cfg, "collection_path") {
        settings.collection_path = v;
    }
    if let Some(v) = string_key(&file_cfg, "upload_url") {
        settings.upload_url = v;
    }
    if let Some(v) = string_key(&file_cfg, "upload_api_key") {
        settings.upload_api_key = Some(v);
    }
    if let Some(v) = number_key(&file_cfg, "request_timeout_secs") {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = number_key(&file_cfg, "upload_chunk_bytes") {
        settings.upload_chunk_bytes = v;
    }
}

fn string_key(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(v) => Some(v.clone()),
        other => {
            tracing::warn!("config: {key} must be a string, got {}", other.type_str());
            None
        }
    }
}

/// Accepts `key = 5` as well as the quoted `key = "5"`.
fn number_key<T>(table: &toml::Table, key: &str) -> Option<T>
where
    T: FromStr + TryFrom<i64>,
{
    let parsed = match table.get(key)? {
        toml::Value::Integer(v) => T::try_from(*v).ok(),
        toml::Value::String(v) => v.trim().parse::<T>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        tracing::warn!("config: ignoring invalid {key}");
    }
    parsed
}

fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("api url must not be empty"));
    }

    // Url::join drops the last path segment unless the base ends with '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).with_context(|| format!("invalid api url '{raw}'"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
