//! The install pipeline.
//!
//! resolve → schema diff → confirm → apply → generate per target → output
//! diff → confirm → apply.
//!
//! Rendering and prompting belong to the caller and go through an
//! [`InstallObserver`].

use std::fmt;
use std::path::Path;

use lexicon_pm_core::{LexiconDoc, OutputTarget};
use tracing::info;

use crate::config::ResolverConfig;
use crate::error::Result;
use crate::fetch::SchemaFetcher;
use crate::generate::ApiGenerator;
use crate::manifest::Manifest;
use crate::reconcile::{FileDiff, apply, diff};
use crate::resolve::{Resolution, Resolver};

/// Which tree a set of changes applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Schemas,
    Output(OutputTarget),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Schemas => f.write_str("schemas"),
            Stage::Output(target) => write!(f, "{target} output"),
        }
    }
}

/// Receives progress from [`Installer::run`].
pub trait InstallObserver {
    /// Called once resolution has finished.
    fn resolved(&mut self, _resolution: &Resolution) {}

    /// Asked before a non-empty change set is applied. Returning `false`
    /// stops the run without writing anything further.
    fn confirm(&mut self, stage: Stage, changes: &[FileDiff]) -> bool;

    /// Called after a change set has been written.
    fn applied(&mut self, _stage: Stage, _changes: &[FileDiff]) {}
}

/// How an install run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Every tree matches the resolved set. `digest` identifies that set.
    Completed { digest: String },
    /// The observer declined a change set.
    Aborted { stage: Stage },
}

/// One install run over a project.
pub struct Installer<'a, F: SchemaFetcher + ?Sized, G: ApiGenerator + ?Sized> {
    project: &'a Path,
    manifest: &'a Manifest,
    config: &'a ResolverConfig,
    fetcher: &'a F,
    generator: &'a G,
}

impl<'a, F: SchemaFetcher + ?Sized, G: ApiGenerator + ?Sized> Installer<'a, F, G> {
    pub fn new(
        project: &'a Path,
        manifest: &'a Manifest,
        config: &'a ResolverConfig,
        fetcher: &'a F,
        generator: &'a G,
    ) -> Self {
        Self {
            project,
            manifest,
            config,
            fetcher,
            generator,
        }
    }

    /// Runs the pipeline.
    ///
    /// # Errors
    ///
    /// Fails on manifest misconfiguration (unknown output target, unknown
    /// fallback registry), generator failure, or any filesystem error while
    /// diffing or writing. Per-identifier resolution failures are not errors;
    /// they are reported through [`InstallObserver::resolved`].
    pub async fn run(&self, observer: &mut dyn InstallObserver) -> Result<InstallOutcome> {
        let targets = self.manifest.output_targets()?;
        let fallback = self.config.fallback()?;
        let schema_dir = self.manifest.schema_path(self.project);

        let resolution = Resolver::new(self.fetcher, &schema_dir, targets.keys().copied())
            .with_fallback(fallback)
            .with_extension(self.config.schema_extension.clone())
            .resolve(&self.manifest.lexicons)
            .await;
        info!(count = resolution.set.len(), "Resolved schemas");
        observer.resolved(&resolution);

        let extensions = [self.config.schema_extension.clone()];
        let changes = diff(&schema_dir, &extensions, &resolution.set.schema_files())?;
        if !reconcile(observer, Stage::Schemas, &schema_dir, &changes)? {
            return Ok(InstallOutcome::Aborted { stage: Stage::Schemas });
        }

        for (&target, dir) in &targets {
            let docs: Vec<&LexiconDoc> = resolution
                .set
                .files_for(target)
                .into_iter()
                .map(|file| &file.document)
                .collect();
            let files = self.generator.generate(target, &docs)?;
            let out_dir = self.project.join(dir);
            let changes = diff(&out_dir, &self.config.output_extensions, &files)?;
            let stage = Stage::Output(target);
            if !reconcile(observer, stage, &out_dir, &changes)? {
                return Ok(InstallOutcome::Aborted { stage });
            }
        }

        Ok(InstallOutcome::Completed {
            digest: resolution.set.digest(),
        })
    }
}

/// Confirms and applies one change set. Returns `false` if declined.
fn reconcile(observer: &mut dyn InstallObserver, stage: Stage, dir: &Path, changes: &[FileDiff]) -> Result<bool> {
    if changes.is_empty() {
        return Ok(true);
    }
    if !observer.confirm(stage, changes) {
        info!(stage = %stage, "Changes declined");
        return Ok(false);
    }
    apply(dir, changes)?;
    info!(stage = %stage, count = changes.len(), "Changes applied");
    observer.applied(stage, changes);
    Ok(true)
}
