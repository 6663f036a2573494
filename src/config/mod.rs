use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub upload_dir: PathBuf,
    pub seed_admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);

        Ok(Config {
            database_url: database_url_from_env(),
            redis_url: var_or("REDIS_URL", "redis://127.0.0.1/"),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            rate_limit_window_secs: var_or("RATE_LIMIT_WINDOW", "60").parse().unwrap_or(60),
            rate_limit_requests: var_or("RATE_LIMIT_REQUESTS", "100").parse().unwrap_or(100),
            server_host: var_or("SERVER_HOST", "0.0.0.0"),
            server_port: env::var("PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            api_base_uri: var_or("API_BASE_URI", "/api"),
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "uploads")),
            seed_admin_password: env::var("SEED_ADMIN_PASSWORD").ok(),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

// DATABASE_URL wins; otherwise the URL is assembled from the discrete DB_* variables.
fn database_url_from_env() -> String {
    if let Ok(url) = env::var("DATABASE_URL") {
        return url;
    }
    format!(
        "postgres://{}:{}@{}:{}/{}",
        var_or("DB_USERNAME", "postgres"),
        var_or("DB_PASSWORD", "postgres"),
        var_or("DB_HOST", "localhost"),
        var_or("DB_PORT", "5432"),
        var_or("DB_NAME", "vehicle_entries"),
    )
}
