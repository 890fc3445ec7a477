pub const FEED_LIMIT: usize = 10;
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_STORE_LABEL: &str = "default";

pub const USERS_LIST_KEY: &str = "users_list";

pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

pub fn post_key(post_id: &str) -> String {
    format!("post:{}", post_id)
}

pub fn posts_by_key(author_id: &str) -> String {
    format!("posts_by:{}", author_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub store_label: String,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store_label: DEFAULT_STORE_LABEL.to_string(),
            seed_demo: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            port: lookup("MURMUR_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            store_label: lookup("MURMUR_STORE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.store_label),
            seed_demo: lookup("MURMUR_SEED_DEMO")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.seed_demo),
        }
    }
}
