use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How mutations reach the upstream: straight to main, or through a
/// reviewed per-item branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    WildWest,
    Pr,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::WildWest => "wild-west",
            Mode::Pr => "pr",
        }
    }

    pub fn is_wild_west(&self) -> bool {
        matches!(self, Mode::WildWest)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Mode> {
        match value {
            "wild-west" => Ok(Mode::WildWest),
            "pr" => Ok(Mode::Pr),
            other => Err(Error::InvalidInput(format!("unknown mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub mode: Mode,
    pub sign_commits: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: Mode::Pr,
            sign_commits: false,
        }
    }
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Settings> {
        toml::from_str(raw).map_err(|err| Error::InvalidInput(format!("malformed settings: {err}")))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|err| Error::InvalidInput(format!("unencodable settings: {err}")))
    }
}

/// One joined commons: where the fork lives and how mutations travel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamInfo {
    pub id: String,
    pub fork_org: String,
    pub fork_db: String,
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_roundtrip_through_toml() {
        let settings = Settings {
            mode: Mode::WildWest,
            sign_commits: true,
        };
        let raw = settings.to_toml_string().unwrap();
        assert!(raw.contains("wild-west"));
        let parsed = Settings::from_toml_str(&raw).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn mode_parses_known_values_only() {
        assert_eq!("pr".parse::<Mode>().unwrap(), Mode::Pr);
        assert_eq!("wild-west".parse::<Mode>().unwrap(), Mode::WildWest);
        assert!("yolo".parse::<Mode>().is_err());
    }

    #[test]
    fn settings_default_to_reviewed_mode() {
        let settings = Settings::default();
        assert_eq!(settings.mode, Mode::Pr);
        assert!(!settings.sign_commits);
    }
}
