use serde::Deserialize;
use std::env;

use crate::models::Difficulty;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub bind_addr: String,
    pub format: CompetitionFormat,
}

/// Competition format constants. Everything here is overridable through the
/// config file or `APP__COMPETITION__*` environment variables so a different
/// event (other point values, other time budgets) needs no code change.
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionFormat {
    pub easy_points: i32,
    pub medium_points: i32,
    pub hard_points: i32,
    pub easy_time_seconds: u32,
    pub medium_time_seconds: u32,
    pub hard_time_seconds: u32,
    pub hard_final_time_seconds: u32,
    pub autosave_interval_seconds: u32,
    pub verdict_poll_interval_ms: u64,
}

impl Default for CompetitionFormat {
    fn default() -> Self {
        Self {
            easy_points: 2,
            medium_points: 4,
            hard_points: 6,
            easy_time_seconds: 15 * 60,
            medium_time_seconds: 20 * 60,
            hard_time_seconds: 25 * 60,
            hard_final_time_seconds: 30 * 60,
            autosave_interval_seconds: 15,
            verdict_poll_interval_ms: 2000,
        }
    }
}

impl CompetitionFormat {
    pub fn round_points(&self, round: Difficulty) -> i32 {
        match round {
            Difficulty::Easy => self.easy_points,
            Difficulty::Medium => self.medium_points,
            Difficulty::Hard => self.hard_points,
        }
    }

    /// Time budget for a question at `index` within its tier. Only the last
    /// question of the hard tier gets the extended budget.
    pub fn time_budget(&self, round: Difficulty, index: usize, tier_size: usize) -> u32 {
        match round {
            Difficulty::Easy => self.easy_time_seconds,
            Difficulty::Medium => self.medium_time_seconds,
            Difficulty::Hard => {
                if tier_size > 0 && index + 1 == tier_size {
                    self.hard_final_time_seconds
                } else {
                    self.hard_time_seconds
                }
            }
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/coderush".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "coderush".to_string());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let defaults = CompetitionFormat::default();
        let get_u32 = |key: &str, fallback: u32| -> u32 {
            settings
                .get_int(key)
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback)
        };
        let get_i32 = |key: &str, fallback: i32| -> i32 {
            settings
                .get_int(key)
                .ok()
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(fallback)
        };

        let format = CompetitionFormat {
            easy_points: get_i32("competition.easy_points", defaults.easy_points),
            medium_points: get_i32("competition.medium_points", defaults.medium_points),
            hard_points: get_i32("competition.hard_points", defaults.hard_points),
            easy_time_seconds: get_u32("competition.easy_time_seconds", defaults.easy_time_seconds),
            medium_time_seconds: get_u32(
                "competition.medium_time_seconds",
                defaults.medium_time_seconds,
            ),
            hard_time_seconds: get_u32("competition.hard_time_seconds", defaults.hard_time_seconds),
            hard_final_time_seconds: get_u32(
                "competition.hard_final_time_seconds",
                defaults.hard_final_time_seconds,
            ),
            autosave_interval_seconds: get_u32(
                "competition.autosave_interval_seconds",
                defaults.autosave_interval_seconds,
            ),
            verdict_poll_interval_ms: settings
                .get_int("competition.verdict_poll_interval_ms")
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(defaults.verdict_poll_interval_ms),
        };

        Ok(Config {
            mongo_uri,
            mongo_database,
            bind_addr,
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_match_round_values() {
        let format = CompetitionFormat::default();
        assert_eq!(format.round_points(Difficulty::Easy), 2);
        assert_eq!(format.round_points(Difficulty::Medium), 4);
        assert_eq!(format.round_points(Difficulty::Hard), 6);
    }

    #[test]
    fn hard_tier_final_question_gets_extended_budget() {
        let format = CompetitionFormat::default();
        assert_eq!(format.time_budget(Difficulty::Hard, 0, 3), 1500);
        assert_eq!(format.time_budget(Difficulty::Hard, 1, 3), 1500);
        assert_eq!(format.time_budget(Difficulty::Hard, 2, 3), 1800);
    }

    #[test]
    fn easy_and_medium_budgets_ignore_position() {
        let format = CompetitionFormat::default();
        assert_eq!(format.time_budget(Difficulty::Easy, 0, 3), 900);
        assert_eq!(format.time_budget(Difficulty::Easy, 2, 3), 900);
        assert_eq!(format.time_budget(Difficulty::Medium, 1, 2), 1200);
    }
}
