use crate::openai::real::DEFAULT_CONNECT_TIMEOUT;
use clap::Parser;
use std::path::PathBuf;

/// Common command-line arguments that can be shared between different apps
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the SQLite database holding settings and AI config records
    #[arg(long, env = "AI_RELAY_DB", default_value = "data/ai_relay.db")]
    pub db: PathBuf,

    /// Connect timeout for AI requests, in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout_secs: u64,

    /// Timezone used when logging response timestamps
    #[arg(long, env = "TIMEZONE")]
    pub timezone: Option<String>,

    /// Seed for the BASE_URL setting (written to the database at start-up)
    #[arg(long, env = "AI_BASE_URL")]
    pub base_url: Option<String>,

    /// Seed for the API_KEY setting (written to the database at start-up)
    #[arg(long, env = "AI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Seed for the MODEL setting (written to the database at start-up)
    #[arg(long, env = "AI_MODEL")]
    pub model: Option<String>,
}

impl CommonArgs {
    /// Settings given on the command line or environment, keyed by setting
    /// name.
    pub fn setting_seeds(&self) -> Vec<(&'static str, &str)> {
        [
            (crate::settings::BASE_URL, self.base_url.as_deref()),
            (crate::settings::API_KEY, self.api_key.as_deref()),
            (crate::settings::MODEL, self.model.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn only_given_seeds_are_returned() {
        let cli = TestCli::parse_from([
            "ai_relay",
            "--db",
            "/tmp/test.db",
            "--base-url",
            "https://api.example.com/v1",
            "--model",
            "gpt-4",
        ]);
        let seeds = cli.common.setting_seeds();
        assert!(seeds.contains(&("BASE_URL", "https://api.example.com/v1")));
        assert!(seeds.contains(&("MODEL", "gpt-4")));
        assert_eq!(cli.common.connect_timeout_secs, 60);
    }
}
