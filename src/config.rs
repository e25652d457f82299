use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub store_path: String,
    /// Local hour (0-23) at which the nightly guardian summaries go out.
    pub summary_hour: u32,
    /// How many days a submission is kept before the eraser removes it.
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            store_path: env::var("STORE_PATH").unwrap_or_else(|_| "homework.json".into()),
            summary_hour: env::var("SUMMARY_HOUR")
                .unwrap_or_else(|_| "21".into())
                .parse()?,
            retention_days: env::var("RETENTION_DAYS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
