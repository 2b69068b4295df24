use std::{collections::HashMap, fs};

#[derive(Debug)]
pub struct Settings {
    pub backend_url: Option<String>,
    pub user_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: None,
            user_id: "demo-user".into(),
        }
    }
}

/// Defaults, overlaid by `composer.toml`, overlaid by environment
/// variables. Missing or malformed sources are skipped.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("composer.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("backend_url") {
                settings.backend_url = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("user_id") {
                settings.user_id = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("COMPOSER_BACKEND_URL") {
        settings.backend_url = Some(v);
    }
    if let Ok(v) = std::env::var("COMPOSER_USER_ID") {
        settings.user_id = v;
    }

    settings
}
