use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Minutes after creation during which a message may still be edited
    pub max_edit_minutes: i64,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub search_result_cap: usize,
    pub contact_result_cap: usize,
    /// Character cap applied when message content is mirrored into
    /// conversation summaries and reply previews
    pub preview_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_edit_minutes: 15,
            default_page_size: 50,
            max_page_size: 100,
            search_result_cap: 50,
            contact_result_cap: 20,
            preview_max_chars: 100,
        }
    }
}

impl Config {
    fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
        env::var(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let defaults = Self::default();
        let cfg = Self {
            max_edit_minutes: Self::env_parse("EDIT_WINDOW_MINUTES", defaults.max_edit_minutes),
            default_page_size: Self::env_parse("MESSAGE_PAGE_SIZE", defaults.default_page_size),
            max_page_size: Self::env_parse("MESSAGE_PAGE_SIZE_MAX", defaults.max_page_size),
            search_result_cap: Self::env_parse("SEARCH_RESULT_CAP", defaults.search_result_cap),
            contact_result_cap: Self::env_parse("CONTACT_RESULT_CAP", defaults.contact_result_cap),
            preview_max_chars: Self::env_parse("PREVIEW_MAX_CHARS", defaults.preview_max_chars),
        };
        if cfg.max_edit_minutes < 0 {
            return Err(crate::error::AppError::Config(
                "EDIT_WINDOW_MINUTES must be non-negative".into(),
            ));
        }
        if cfg.default_page_size == 0 || cfg.max_page_size == 0 {
            return Err(crate::error::AppError::Config(
                "page sizes must be positive".into(),
            ));
        }
        Ok(cfg)
    }
}
