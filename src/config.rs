use std::collections::HashMap;
use std::fs;

use crate::error::ConfigError;

/// Raw KEY=VALUE config file with `#` comments and optional `export `
/// prefixes, so the same file can be sourced by a shell.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(format!("Invalid config line {}: {}", idx + 1, line));
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Calendar mirror settings; both must be present or the mirror is off.
#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub token: String,
    pub raid_calendar_id: String,
    pub offnight_calendar_id: String,
}

/// Typed, validated settings. Missing identifiers or credentials fail
/// startup; nothing later in the process is allowed to be fatal.
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub guild_id: u64,
    pub raid_channel_id: String,
    pub offnight_channel_id: String,
    pub inventory_channel_id: String,

    pub github_token: String,
    pub github_owner: String,
    pub github_repo: String,
    pub github_branch: String,
    pub raid_file_path: String,
    pub offnight_file_path: String,

    pub calendar: Option<CalendarSettings>,
    pub event_location: String,
    pub cache_path: String,
}

impl Settings {
    pub fn load<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let guild_raw = require("DISCORD_GUILD_ID")?;
        let guild_id = guild_raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
            key: "DISCORD_GUILD_ID",
            value: guild_raw.clone(),
        })?;

        let calendar = match (
            get("GOOGLE_CALENDAR_TOKEN"),
            get("RAID_CALENDAR_ID"),
            get("OFFNIGHT_CALENDAR_ID"),
        ) {
            (Some(token), Some(raid_calendar_id), Some(offnight_calendar_id)) => {
                Some(CalendarSettings {
                    token,
                    raid_calendar_id,
                    offnight_calendar_id,
                })
            }
            _ => None,
        };

        Ok(Self {
            discord_token: require("DISCORD_TOKEN")?,
            guild_id,
            raid_channel_id: require("RAID_CHANNEL_ID")?,
            offnight_channel_id: require("OFFNIGHT_CHANNEL_ID")?,
            inventory_channel_id: require("INVENTORY_CHANNEL_ID")?,
            github_token: require("GITHUB_TOKEN")?,
            github_owner: require("GITHUB_OWNER")?,
            github_repo: require("GITHUB_REPO")?,
            github_branch: get("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
            raid_file_path: get("RAID_FILE_PATH").unwrap_or_else(|| "assets/data/raids.txt".to_string()),
            offnight_file_path: get("OFFNIGHT_FILE_PATH")
                .unwrap_or_else(|| "assets/data/offnight.txt".to_string()),
            calendar,
            event_location: get("EVENT_LOCATION").unwrap_or_else(|| "In game".to_string()),
            cache_path: get("CACHE_LOCATION")
                .unwrap_or_else(crate::models::cache::get_cache_location),
        })
    }
}
