/// Server configuration, read once from the environment at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub host: String,
    pub port: u16,
    pub bots_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "daily-trivia.db".into());
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);
        let bots_enabled = std::env::var("DAILY_BOTS")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        AppConfig {
            db_path,
            host,
            port,
            bots_enabled,
        }
    }
}
