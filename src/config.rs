use serde::{Deserialize, Serialize};

pub const CONFIG_STORAGE_KEY: &str = "study-notes.config";

/// Client settings persisted in `localStorage`. Missing fields fall back to
/// their defaults so older stored blobs keep loading.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend prefix; relative values are resolved against the page origin.
    pub api_base: String,
    pub autosave_delay_ms: u32,
    pub toast_duration_ms: u32,
    pub log_level: String,
    pub font_size: u32,
    pub accent_color: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "/api".to_string(),
            autosave_delay_ms: 800,
            toast_duration_ms: 2000,
            log_level: "info".to_string(),
            font_size: 16,
            accent_color: "#6366f1".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Reads the stored config. `Ok(None)` when nothing is stored or storage
    /// is unavailable; `Err` carries the reason a stored blob was ignored.
    pub fn load_stored() -> Result<Option<Self>, String> {
        let Some(storage) = leptos::prelude::window().local_storage().ok().flatten() else {
            return Ok(None);
        };
        match storage.get_item(CONFIG_STORAGE_KEY) {
            Ok(Some(raw)) => Self::from_json(&raw)
                .map(Some)
                .map_err(|e| format!("invalid stored config: {e}")),
            Ok(None) => Ok(None),
            Err(_) => Err("localStorage read failed".to_string()),
        }
    }

    pub fn store(&self) -> Result<(), String> {
        let storage = leptos::prelude::window()
            .local_storage()
            .ok()
            .flatten()
            .ok_or_else(|| "localStorage unavailable".to_string())?;
        let raw = serde_json::to_string(self).map_err(|e| e.to_string())?;
        storage
            .set_item(CONFIG_STORAGE_KEY, &raw)
            .map_err(|_| "localStorage write failed".to_string())
    }

    /// Absolute backend URL for `origin` (e.g. `https://host`).
    pub fn api_url(&self, origin: &str) -> String {
        let base = self.api_base.trim();
        if base.starts_with("http://") || base.starts_with("https://") {
            return base.trim_end_matches('/').to_string();
        }
        format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            base.trim_matches('/')
        )
    }

    /// CSS custom properties applied to the app root.
    pub fn style_vars(&self) -> String {
        format!(
            "--editor-font-size: {}px; --accent-color: {};",
            self.font_size, self.accent_color
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ClientConfig::from_json(r#"{"autosave_delay_ms": 1500}"#).unwrap();
        assert_eq!(config.autosave_delay_ms, 1500);
        assert_eq!(config.api_base, "/api");
        assert_eq!(config.toast_duration_ms, 2000);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(ClientConfig::from_json("{not json").is_err());
        assert!(ClientConfig::from_json(r#"{"font_size": "big"}"#).is_err());
    }

    #[test]
    fn resolves_api_url_against_origin() {
        let mut config = ClientConfig::default();
        assert_eq!(config.api_url("https://study.example/"), "https://study.example/api");

        config.api_base = "http://localhost:5000/api/".into();
        assert_eq!(config.api_url("https://study.example"), "http://localhost:5000/api");
    }

    #[test]
    fn style_vars_follow_settings() {
        let config = ClientConfig {
            font_size: 18,
            accent_color: "#ff0000".into(),
            ..Default::default()
        };
        assert_eq!(
            config.style_vars(),
            "--editor-font-size: 18px; --accent-color: #ff0000;"
        );
    }
}
