//! A small utility for mirroring remote Git repositories.
//!
//! `git-backup` takes a list of repository identifiers (`owner/repo` pairs,
//! bare owner names, or plain clone URLs), works out where each one lives,
//! then clones every repository into an output directory as a bare mirror.
//! Repositories which already have a mirror on disk are fetched instead, so
//! the tool can be re-run as often as you like.
//!
//! The usual entry point is [`Driver::run()`], driven by a [`Config`] built
//! either from command line arguments or a JSON config file.

#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod classify;
pub mod config;
pub mod driver;
pub mod github;
mod utils;

pub use crate::classify::{classify, Classification, OwnerRepo};
pub use crate::config::{Config, Credentials};
pub use crate::driver::{Driver, SyncFailure, SyncOutcome};
pub use crate::github::GitHub;

use std::path::{Path, PathBuf};

use failure::Error;

/// A repository resolved on the remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    /// The user or organisation the repository belongs to.
    pub owner: String,
    pub name: String,
    /// The URL to clone from.
    pub url: String,
}

impl Repo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Something which can look up repositories on a hosting service.
pub trait Provider {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Every repository under `owner` which is visible with the current
    /// credentials.
    fn owner_repositories(&self, owner: &str) -> Result<Vec<Repo>, Error>;

    /// Look up a single repository.
    fn repository(&self, owner: &str, name: &str) -> Result<Repo, Error>;
}

/// A clone URL paired with the place its mirror lives on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTarget {
    pub url: String,
    pub local_path: PathBuf,
}

impl RemoteTarget {
    /// The target for a repository resolved through a provider, mirrored to
    /// `<output>/<owner>/<name>.git`.
    pub fn hosted(output_dir: &Path, repo: &Repo) -> RemoteTarget {
        RemoteTarget {
            url: repo.url.clone(),
            local_path: output_dir
                .join(&repo.owner)
                .join(format!("{}.git", repo.name)),
        }
    }

    /// The target for a raw clone URL.
    ///
    /// The URL is turned into a relative path by replacing `:` with `/` and
    /// trimming any leading slashes, so `git@host:owner/repo.git` is
    /// mirrored to `<output>/git@host/owner/repo.git`. Runs of slashes left
    /// behind by the escaping (e.g. from `https://`) collapse under normal
    /// path semantics.
    pub fn direct(output_dir: &Path, url: &str) -> RemoteTarget {
        let escaped = url.replace(':', "/");
        let relative = escaped.trim_start_matches('/');

        RemoteTarget {
            url: url.to_string(),
            local_path: output_dir.join(relative),
        }
    }
}
