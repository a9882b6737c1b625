use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use failure::{Error, ResultExt};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::Credentials;
use crate::utils::{api_get, FailedRequest, Paginated};
use crate::{Provider, Repo};

pub const DEFAULT_API_ROOT: &str = "https://api.github.com";

/// An interface to the repositories stored on GitHub.
#[derive(Clone)]
pub struct GitHub {
    client: Client,
    credentials: Credentials,
    api_root: String,
}

impl GitHub {
    /// Create a client for the public GitHub API.
    pub fn new(credentials: Credentials) -> Result<GitHub, Error> {
        GitHub::with_api_root(DEFAULT_API_ROOT, credentials)
    }

    /// Create a client for some other API root, e.g. a GitHub Enterprise
    /// install.
    pub fn with_api_root(api_root: &str, credentials: Credentials) -> Result<GitHub, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Couldn't create the HTTP client")?;

        Ok(GitHub {
            client,
            credentials,
            api_root: api_root.trim_end_matches('/').to_string(),
        })
    }

    fn convert_repo(&self, raw: RawRepo) -> Repo {
        Repo {
            name: raw.name,
            owner: raw.owner.login,
            url: raw.clone_url,
        }
    }
}

impl Provider for GitHub {
    fn name(&self) -> &str {
        "github"
    }

    fn owner_repositories(&self, owner: &str) -> Result<Vec<Repo>, Error> {
        debug!("Fetching repositories belonging to {}", owner);

        let endpoint = format!("{}/users/{}/repos", self.api_root, owner);
        let mut repos = Vec::new();

        for repo in Paginated::new(&self.client, &self.credentials, &endpoint) {
            let repo: RawRepo = repo?;
            repos.push(self.convert_repo(repo));
        }

        debug!("{} repos belong to {}", repos.len(), owner);
        Ok(repos)
    }

    fn repository(&self, owner: &str, name: &str) -> Result<Repo, Error> {
        debug!("Looking up {}/{}", owner, name);

        let endpoint = format!("{}/repos/{}/{}", self.api_root, owner, name);
        let response = api_get(&self.client, &self.credentials, &endpoint)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let err = RepoNotFound {
                owner: owner.to_string(),
                name: name.to_string(),
            };

            return Err(err.into());
        }

        if !status.is_success() {
            warn!("Request failed with {}", status);

            let err = FailedRequest {
                status,
                url: endpoint,
            };

            return Err(err.into());
        }

        let raw: Value = response.json().context("Unable to read the response")?;

        if log_enabled!(log::Level::Trace) {
            trace!("Body:");
            for line in serde_json::to_string_pretty(&raw).unwrap().lines() {
                trace!("{}", line);
            }
        }

        let raw: RawRepo =
            serde_json::from_value(raw).context("Unable to deserialize response")?;

        Ok(self.convert_repo(raw))
    }
}

impl Debug for GitHub {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("GitHub")
            .field("api_root", &self.api_root)
            .finish()
    }
}

/// The error returned when a repository doesn't exist, or isn't visible
/// with the current credentials.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Couldn't find {}/{}", owner, name)]
pub struct RepoNotFound {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepo {
    name: String,
    clone_url: String,
    owner: Owner,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Owner {
    login: String,
    #[serde(rename = "type")]
    kind: String,
}
