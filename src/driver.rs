use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;

use failure::{Error, ResultExt};
use git2::build::RepoBuilder;
use git2::{AutotagOption, FetchOptions, FetchPrune, Repository};

use crate::config::Config;
use crate::github::GitHub;
use crate::{classify, Classification, Provider, RemoteTarget};

/// The fetch refspec given to every mirror's `origin` remote.
const MIRROR_REFSPEC: &str = "+refs/*:refs/*";

/// The thing which actually mirrors repositories.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    config: Config,
}

impl Driver {
    pub fn with_config(config: Config) -> Driver {
        Driver { config }
    }

    /// Mirror every repository the config names.
    ///
    /// Failures affecting a single repository are collected instead of
    /// aborting the run. If there were any, the returned error is a
    /// [`SyncFailure`] listing each one.
    pub fn run(&self) -> Result<(), Error> {
        let classification = classify(&self.config.repositories);

        if classification.is_empty() {
            warn!("No repositories to mirror");
            return Ok(());
        }

        let (targets, mut errors) = self.resolve_targets(&classification)?;
        let targets = dedup_targets(targets);

        self.sync_repos(&targets, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyncFailure { errors }.into())
        }
    }

    fn resolve_targets(
        &self,
        classification: &Classification,
    ) -> Result<(Vec<RemoteTarget>, Vec<(String, Error)>), Error> {
        let mut targets = Vec::new();
        let mut errors = Vec::new();

        if classification.has_hosted() {
            let github = GitHub::new(self.config.credentials())
                .context("Couldn't create the GitHub client")?;

            self.resolve_hosted(&github, classification, &mut targets, &mut errors);
        }

        for url in &classification.urls {
            targets.push(RemoteTarget::direct(&self.config.output_directory, url));
        }

        Ok((targets, errors))
    }

    fn resolve_hosted(
        &self,
        provider: &dyn Provider,
        classification: &Classification,
        targets: &mut Vec<RemoteTarget>,
        errors: &mut Vec<(String, Error)>,
    ) {
        info!("Resolving repositories via {}", provider.name());

        let mut owners: BTreeSet<&str> =
            classification.owners.iter().map(|s| s.as_str()).collect();
        // A pair with nothing after the slash ("octocat/") stands for
        // everything the owner has.
        owners.extend(
            classification
                .pairs
                .iter()
                .filter(|pair| pair.repo.is_empty())
                .map(|pair| pair.owner.as_str()),
        );

        for owner in owners {
            match provider.owner_repositories(owner) {
                Ok(repos) => {
                    info!("Found {} repos belonging to {}", repos.len(), owner);
                    targets.extend(
                        repos
                            .iter()
                            .map(|repo| RemoteTarget::hosted(&self.config.output_directory, repo)),
                    );
                }
                Err(e) => {
                    warn!("Couldn't resolve {}, {}", owner, e);
                    errors.push((owner.to_string(), e));
                }
            }
        }

        for pair in classification.pairs.iter().filter(|p| !p.repo.is_empty()) {
            match provider.repository(&pair.owner, &pair.repo) {
                Ok(repo) => {
                    targets.push(RemoteTarget::hosted(&self.config.output_directory, &repo));
                }
                Err(e) => {
                    let full_name = format!("{}/{}", pair.owner, pair.repo);
                    warn!("Couldn't resolve {}, {}", full_name, e);
                    errors.push((full_name, e));
                }
            }
        }
    }

    fn sync_repos(&self, targets: &[RemoteTarget], errors: &mut Vec<(String, Error)>) {
        info!("Mirroring {} repositories", targets.len());
        let mut cloned = 0;
        let mut fetched = 0;

        for target in targets {
            match sync_target(target) {
                Ok(SyncOutcome::Cloned) => cloned += 1,
                Ok(SyncOutcome::Fetched) => fetched += 1,
                Err(e) => {
                    warn!("Mirroring {} failed, {}", target.url, e);
                    errors.push((target.url.clone(), e));
                }
            }
        }

        info!("Cloned {} and fetched {} repositories", cloned, fetched);
    }
}

/// What [`sync_target`] did to bring a mirror up to date.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SyncOutcome {
    Cloned,
    Fetched,
}

/// Bring the mirror for a single remote up to date, cloning it if it
/// doesn't exist yet.
pub fn sync_target(target: &RemoteTarget) -> Result<SyncOutcome, Error> {
    match Repository::discover(&target.local_path) {
        Ok(repo) => {
            println!("Fetching from {}", target.url);
            fetch_existing(&repo, target).context("`git fetch` failed")?;
            Ok(SyncOutcome::Fetched)
        }
        Err(_) => {
            println!("Cloning from {}...", target.url);
            clone_mirror(target).context("`git clone --mirror` failed")?;
            Ok(SyncOutcome::Cloned)
        }
    }
}

fn clone_mirror(target: &RemoteTarget) -> Result<(), Error> {
    debug!("Cloning {} into {}", target.url, target.local_path.display());

    if let Some(parent) = target.local_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).context(format!(
                "Couldn't create the target directory ({})",
                parent.display()
            ))?;
        }
    }

    let mut builder = RepoBuilder::new();
    builder.bare(true);
    builder.remote_create(|repo, name, url| {
        let remote = repo.remote_with_fetch(name, url, MIRROR_REFSPEC)?;
        repo.config()?
            .set_bool(&format!("remote.{}.mirror", name), true)?;

        Ok(remote)
    });

    builder.clone(&target.url, &target.local_path)?;

    Ok(())
}

fn fetch_existing(repo: &Repository, target: &RemoteTarget) -> Result<(), Error> {
    let mut remote = repo
        .find_remote("origin")
        .context("The repo has no `origin` remote")?;

    let mut fetch_opts = FetchOptions::default();
    fetch_opts
        .prune(FetchPrune::On)
        .download_tags(AutotagOption::All);
    remote
        .download(&[] as &[&str], Some(&mut fetch_opts))
        .context("Download failed")?;

    if remote.stats().received_bytes() != 0 {
        // If there are local objects (we got a thin pack), then tell the user
        // how many objects we saved from having to cross the network.
        let stats = remote.stats();
        if stats.local_objects() > 0 {
            debug!(
                "Received {} objects in {} bytes for {} (used {} local \
                 objects)",
                stats.indexed_objects(),
                stats.received_bytes(),
                target.url,
                stats.local_objects()
            );
        } else {
            debug!(
                "Received {} objects in {} bytes for {}",
                stats.indexed_objects(),
                stats.received_bytes(),
                target.url
            );
        }
    }

    // Disconnect the underlying connection to prevent it from idling.
    remote.disconnect()?;

    // Update the references in the remote's namespace to point to the right
    // commits. This may be needed even if there was no packfile to download,
    // which can happen e.g. when the branches have been changed but all the
    // needed objects are available locally.
    remote.update_tips(None, true, AutotagOption::Unspecified, None)?;

    Ok(())
}

fn dedup_targets(targets: Vec<RemoteTarget>) -> Vec<RemoteTarget> {
    let mut seen = HashSet::new();

    targets
        .into_iter()
        .filter(|target| seen.insert(target.url.clone()))
        .collect()
}

#[derive(Debug, Fail)]
#[fail(display = "One or more errors encountered while mirroring repositories")]
pub struct SyncFailure {
    errors: Vec<(String, Error)>,
}

impl SyncFailure {
    /// Write a report of every failure, and its causes, to `writer`.
    pub fn display<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writeln!(
            writer,
            "There were {} errors mirroring repositories",
            self.errors.len()
        )?;

        for &(ref name, ref err) in &self.errors {
            writeln!(writer, "Error: {} failed with {}", name, err)?;
            for cause in err.iter_causes() {
                writeln!(writer, "\tCaused By: {}", cause)?;
            }
        }

        Ok(())
    }
}
