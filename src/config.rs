use std::fmt::{self, Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use failure::{Error, ResultExt};

/// The configuration for a mirroring run.
///
/// Stored on disk as a flat JSON object. Every key may be omitted, in which
/// case it defaults to empty.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// A GitHub access token. Takes precedence over `github_user` and
    /// `github_password` when both are provided.
    pub github_token: String,
    pub github_user: String,
    pub github_password: String,
    /// The directory all mirrors are placed under.
    pub output_directory: PathBuf,
    /// The repository identifiers to mirror.
    pub repositories: Vec<String>,
}

impl Config {
    /// The default config file location, expanded with `shellexpand` before
    /// use.
    pub const DEFAULT_PATH: &'static str = "~/.config/git-backup/config.json";

    /// Load a `Config` from a JSON file on disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let path = path.as_ref();

        let contents =
            fs::read_to_string(path).context(format!("Couldn't read {}", path.display()))?;
        let cfg = serde_json::from_str(&contents)
            .context(format!("Couldn't parse {}", path.display()))?;

        Ok(cfg)
    }

    /// An empty config listing every recognised key, for `--generate-config`.
    pub fn template() -> Config {
        Config::default()
    }

    pub fn as_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("a Config is always serializable")
    }

    /// Work out which credentials to present to the API.
    ///
    /// A token wins over a user/password pair, and a user/password pair wins
    /// over anonymous access. Empty strings count as absent.
    pub fn credentials(&self) -> Credentials {
        if !self.github_token.is_empty() {
            Credentials::Token(self.github_token.clone())
        } else if !self.github_user.is_empty() && !self.github_password.is_empty() {
            Credentials::Basic {
                user: self.github_user.clone(),
                password: self.github_password.clone(),
            }
        } else {
            Credentials::Anonymous
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &redacted(&self.github_token))
            .field("github_user", &self.github_user)
            .field("github_password", &redacted(&self.github_password))
            .field("output_directory", &self.output_directory)
            .field("repositories", &self.repositories)
            .finish()
    }
}

/// How to authenticate against the API.
#[derive(Clone, PartialEq)]
pub enum Credentials {
    Token(String),
    Basic { user: String, password: String },
    Anonymous,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Credentials::Token(_) => f.write_str("Token(<redacted>)"),
            Credentials::Basic { ref user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "github_token": "super-secret-token",
        "github_user": "",
        "github_password": "",
        "output_directory": "/srv/mirrors",
        "repositories": ["octocat/Hello-World", "git@example.com:team/proj.git"]
    }"#;

    #[test]
    fn parse_a_full_config() {
        let got: Config = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(got.github_token, "super-secret-token");
        assert_eq!(got.output_directory, PathBuf::from("/srv/mirrors"));
        assert_eq!(got.repositories.len(), 2);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let got: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(got, Config::default());
    }

    #[test]
    fn the_template_matches_the_documented_shape() {
        let got: serde_json::Value = serde_json::from_str(&Config::template().as_json()).unwrap();

        let should_be = json!({
            "github_token": "",
            "github_user": "",
            "github_password": "",
            "output_directory": "",
            "repositories": []
        });

        assert_eq!(got, should_be);
    }

    #[test]
    fn round_trip_through_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = Config::default();
        cfg.github_token = String::from("abc123");
        cfg.output_directory = PathBuf::from("/tmp/mirrors");
        cfg.repositories = vec![String::from("octocat")];

        fs::write(&path, cfg.as_json()).unwrap();
        let reloaded = Config::from_file(&path).unwrap();

        assert_eq!(reloaded, cfg);
    }

    #[test]
    fn a_missing_config_file_is_an_error() {
        let dir = tempdir().unwrap();

        let got = Config::from_file(dir.path().join("nope.json"));

        assert!(got.is_err());
    }

    #[test]
    fn a_token_wins_over_basic_auth() {
        let mut cfg = Config::default();
        cfg.github_token = String::from("t0k3n");
        cfg.github_user = String::from("alice");
        cfg.github_password = String::from("hunter2");

        assert_eq!(cfg.credentials(), Credentials::Token(String::from("t0k3n")));
    }

    #[test]
    fn user_and_password_fall_back_to_basic_auth() {
        let mut cfg = Config::default();
        cfg.github_user = String::from("alice");
        cfg.github_password = String::from("hunter2");

        assert_eq!(
            cfg.credentials(),
            Credentials::Basic {
                user: String::from("alice"),
                password: String::from("hunter2"),
            }
        );
    }

    #[test]
    fn empty_strings_mean_anonymous() {
        let cfg = Config::default();
        assert_eq!(cfg.credentials(), Credentials::Anonymous);

        // A user without a password isn't enough for basic auth.
        let mut cfg = Config::default();
        cfg.github_user = String::from("alice");
        assert_eq!(cfg.credentials(), Credentials::Anonymous);
    }

    #[test]
    fn debug_output_never_contains_secrets() {
        let mut cfg = Config::default();
        cfg.github_token = String::from("super-secret-token");
        cfg.github_password = String::from("hunter2");

        let printed = format!("{:?} {:?}", cfg, cfg.credentials());

        assert!(!printed.contains("super-secret-token"));
        assert!(!printed.contains("hunter2"));
    }
}
