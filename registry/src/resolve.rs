//! Dependency resolution.
//!
//! Starting from the manifest's root identifiers, [`Resolver::resolve`] finds
//! every schema reachable through the reference-extraction rules of the
//! configured output targets and fetches each one exactly once.
//!
//! # Algorithm
//!
//! 1. Roots with an invalid identifier or source descriptor are skipped.
//! 2. Every root is fetched from its declared source and seeds `All`.
//! 3. Each fetched root gets a candidate order for its undeclared
//!    dependencies (see [`candidate_order`]).
//! 4. The root's subtree is walked depth-first. For each document the
//!    references for every target are extracted and recorded as per-target
//!    edges; their union is the list of dependencies to visit.
//! 5. A dependency already in `All` is not fetched again, which also makes
//!    reference cycles terminate. Otherwise candidates are tried in order; the
//!    first success joins `All` and is walked, exhaustion is reported once.
//! 6. Per-target subsets are computed at the end as everything reachable from
//!    the roots over that target's edges, restricted to `All`.
//!
//! Resolution is best effort. No per-identifier failure aborts the run; each
//! becomes a [`ResolveEvent`] for the caller to render.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::Path;

use lexicon_pm_core::{LexiconDoc, Nsid, NsidError, OutputTarget, extract_references, read_lexicon};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::FetchError;
use crate::fallback::first_success;
use crate::fetch::SchemaFetcher;
use crate::reconcile::GeneratedFile;
use crate::source::{Registry, candidate_order};

/// One fetched and validated schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub nsid: Nsid,
    /// Path relative to the schema directory, `/`-separated.
    pub path: String,
    /// Text exactly as fetched.
    pub content: String,
    pub document: LexiconDoc,
    /// Source the document was fetched from.
    pub registry: Registry,
}

/// Output of one resolution run: every document, plus the subset each target
/// needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSchemaSet {
    all: BTreeMap<Nsid, ResolvedFile>,
    targets: BTreeMap<OutputTarget, BTreeSet<Nsid>>,
}

impl ResolvedSchemaSet {
    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn contains(&self, nsid: &Nsid) -> bool {
        self.all.contains_key(nsid)
    }

    pub fn get(&self, nsid: &Nsid) -> Option<&ResolvedFile> {
        self.all.get(nsid)
    }

    /// Returns every resolved file, ordered by identifier.
    pub fn files(&self) -> impl Iterator<Item = &ResolvedFile> {
        self.all.values()
    }

    /// Returns the identifiers needed by `target`; empty for unknown targets.
    pub fn target(&self, target: OutputTarget) -> BTreeSet<&Nsid> {
        self.targets
            .get(&target)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default()
    }

    /// Returns the files needed by `target`, ordered by identifier.
    pub fn files_for(&self, target: OutputTarget) -> Vec<&ResolvedFile> {
        self.target(target)
            .into_iter()
            .filter_map(|nsid| self.all.get(nsid))
            .collect()
    }

    /// Returns the schema tree as `{path, content}` pairs, ordered by path.
    pub fn schema_files(&self) -> Vec<GeneratedFile> {
        let mut files: Vec<GeneratedFile> = self
            .all
            .values()
            .map(|file| GeneratedFile::new(file.path.clone(), file.content.clone()))
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// SHA-256 over every `path\0content\0` pair in path order, hex encoded.
    ///
    /// Two runs over unchanged sources produce the same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for file in self.schema_files() {
            hasher.update(file.path.as_bytes());
            hasher.update([0]);
            hasher.update(file.content.as_bytes());
            hasher.update([0]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A diagnostic produced during resolution.
#[derive(Debug)]
pub enum ResolveEvent {
    /// A root identifier failed the NSID grammar and was skipped.
    InvalidIdentifier { id: String, error: NsidError },
    /// A root's source descriptor was not recognised.
    InvalidRegistry { nsid: Nsid, error: FetchError },
    /// A root is about to be fetched.
    ResolvingRoot { nsid: Nsid, registry: Registry },
    /// A root could not be fetched from its declared source.
    RootFailed { nsid: Nsid, registry: Registry, error: FetchError },
    /// Walking of root dependencies is starting.
    ResolvingDependencies,
    /// One candidate source failed for a dependency.
    AttemptFailed { nsid: Nsid, registry: Registry, error: FetchError },
    /// A dependency was fetched.
    Resolved { nsid: Nsid, registry: Registry },
    /// Every candidate failed for a dependency. Reported once per identifier,
    /// carrying each candidate's error in attempt order.
    Unresolvable {
        nsid: Nsid,
        failures: Vec<(Registry, FetchError)>,
    },
}

/// A finished resolution run.
#[derive(Debug)]
pub struct Resolution {
    pub set: ResolvedSchemaSet,
    pub events: Vec<ResolveEvent>,
}

impl Resolution {
    /// Returns `true` if any identifier was skipped or could not be fetched.
    pub fn has_failures(&self) -> bool {
        self.events.iter().any(|event| {
            matches!(
                event,
                ResolveEvent::InvalidIdentifier { .. }
                    | ResolveEvent::InvalidRegistry { .. }
                    | ResolveEvent::RootFailed { .. }
                    | ResolveEvent::Unresolvable { .. }
            )
        })
    }
}

/// Walks the schema graph from a set of roots.
pub struct Resolver<'a, F: SchemaFetcher + ?Sized> {
    fetcher: &'a F,
    base: &'a Path,
    targets: BTreeSet<OutputTarget>,
    fallback: Vec<Registry>,
    extension: String,
}

#[derive(Default)]
struct Walk {
    all: BTreeMap<Nsid, ResolvedFile>,
    edges: BTreeMap<OutputTarget, BTreeMap<Nsid, BTreeSet<Nsid>>>,
    failed: HashSet<(Nsid, Vec<Registry>)>,
    unresolvable: BTreeSet<Nsid>,
    events: Vec<ResolveEvent>,
}

impl<'a, F: SchemaFetcher + ?Sized> Resolver<'a, F> {
    /// Creates a resolver reading local schemas from `base`.
    pub fn new(fetcher: &'a F, base: &'a Path, targets: impl IntoIterator<Item = OutputTarget>) -> Self {
        Self {
            fetcher,
            base,
            targets: targets.into_iter().collect(),
            fallback: vec![Registry::Pds, Registry::Github, Registry::Local],
            extension: "json".to_string(),
        }
    }

    /// Sets the fallback sources tried for dependencies after declared base
    /// URLs. `local` is always tried last.
    pub fn with_fallback(mut self, fallback: Vec<Registry>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Sets the schema file extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Resolves `roots` (identifier → source descriptor).
    pub async fn resolve(&self, roots: &BTreeMap<String, String>) -> Resolution {
        let mut walk = Walk::default();

        let declared: Vec<Registry> = roots.values().filter_map(|r| r.parse().ok()).collect();
        let mut fetched_roots: Vec<(Nsid, Registry)> = Vec::new();

        for (id, descriptor) in roots {
            let nsid = match Nsid::parse(id) {
                Ok(nsid) => nsid,
                Err(error) => {
                    info!(id = %id, error = %error, "Skipping invalid identifier");
                    walk.events.push(ResolveEvent::InvalidIdentifier { id: id.clone(), error });
                    continue;
                }
            };
            let registry = match descriptor.parse::<Registry>() {
                Ok(registry) => registry,
                Err(error) => {
                    info!(nsid = %nsid, error = %error, "Skipping root with unknown registry");
                    walk.events.push(ResolveEvent::InvalidRegistry { nsid, error });
                    continue;
                }
            };

            info!(nsid = %nsid, registry = %registry, "Resolving root");
            walk.events.push(ResolveEvent::ResolvingRoot {
                nsid: nsid.clone(),
                registry: registry.clone(),
            });
            match first_success([registry], |r| self.load(&nsid, r)).await {
                Ok(success) => {
                    walk.all.entry(nsid.clone()).or_insert(success.value);
                    fetched_roots.push((nsid, success.candidate));
                }
                Err(failures) => {
                    for (registry, error) in failures {
                        info!(nsid = %nsid, registry = %registry, error = %error, "Root fetch failed");
                        walk.events.push(ResolveEvent::RootFailed {
                            nsid: nsid.clone(),
                            registry,
                            error,
                        });
                    }
                }
            }
        }

        walk.events.push(ResolveEvent::ResolvingDependencies);
        for (root, registry) in &fetched_roots {
            let candidates = candidate_order(registry, &declared, &self.fallback);
            debug!(root = %root, candidates = ?candidates, "Walking dependencies");
            self.walk_root(&mut walk, root, &candidates).await;
        }

        let roots: Vec<&Nsid> = fetched_roots.iter().map(|(nsid, _)| nsid).collect();
        let targets: BTreeMap<_, _> = self
            .targets
            .iter()
            .map(|&target| (target, reachable(&walk, target, &roots)))
            .collect();

        Resolution {
            set: ResolvedSchemaSet {
                all: walk.all,
                targets,
            },
            events: walk.events,
        }
    }

    async fn walk_root(&self, walk: &mut Walk, root: &Nsid, candidates: &[Registry]) {
        let mut stack = vec![self.expand(walk, root).into_iter()];

        while let Some(frame) = stack.last_mut() {
            let Some(dep) = frame.next() else {
                stack.pop();
                continue;
            };
            if walk.all.contains_key(&dep) {
                continue;
            }
            let key = (dep.clone(), candidates.to_vec());
            if walk.failed.contains(&key) {
                continue;
            }

            match first_success(candidates.iter().cloned(), |r| self.load(&dep, r)).await {
                Ok(success) => {
                    record_failures(walk, &dep, success.failures);
                    debug!(nsid = %dep, registry = %success.candidate, "Resolved dependency");
                    walk.events.push(ResolveEvent::Resolved {
                        nsid: dep.clone(),
                        registry: success.candidate,
                    });
                    walk.all.insert(dep.clone(), success.value);
                    stack.push(self.expand(walk, &dep).into_iter());
                }
                Err(failures) => {
                    walk.failed.insert(key);
                    if walk.unresolvable.insert(dep.clone()) {
                        info!(nsid = %dep, "Could not be loaded in any registry");
                        walk.events.push(ResolveEvent::Unresolvable { nsid: dep, failures });
                    } else {
                        record_failures(walk, &dep, failures);
                    }
                }
            }
        }
    }

    /// Records per-target edges out of `nsid` and returns their union.
    fn expand(&self, walk: &mut Walk, nsid: &Nsid) -> Vec<Nsid> {
        let Some(file) = walk.all.get(nsid) else {
            return Vec::new();
        };
        let mut union = BTreeSet::new();
        for &target in &self.targets {
            let refs = extract_references(&file.document, target);
            union.extend(refs.iter().cloned());
            walk.edges.entry(target).or_default().insert(nsid.clone(), refs);
        }
        union.into_iter().collect()
    }

    async fn load(&self, nsid: &Nsid, registry: Registry) -> Result<ResolvedFile, FetchError> {
        let path = nsid.to_path(&self.extension);
        let content = self.fetcher.fetch(nsid, &registry, self.base).await?;
        let location = format!("{registry}:{path}");
        let document = read_lexicon(&content, &location, Some(nsid.as_str()))?;
        Ok(ResolvedFile {
            nsid: nsid.clone(),
            path,
            content,
            document,
            registry,
        })
    }
}

fn record_failures(walk: &mut Walk, nsid: &Nsid, failures: Vec<(Registry, FetchError)>) {
    for (registry, error) in failures {
        debug!(nsid = %nsid, registry = %registry, error = %error, "Candidate failed");
        walk.events.push(ResolveEvent::AttemptFailed {
            nsid: nsid.clone(),
            registry,
            error,
        });
    }
}

/// Everything reachable from `roots` over `target`'s edges, restricted to
/// resolved documents.
fn reachable(walk: &Walk, target: OutputTarget, roots: &[&Nsid]) -> BTreeSet<Nsid> {
    let empty = BTreeMap::new();
    let edges = walk.edges.get(&target).unwrap_or(&empty);
    let mut seen: BTreeSet<Nsid> = BTreeSet::new();
    let mut queue: VecDeque<&Nsid> = roots.iter().copied().collect();

    while let Some(nsid) = queue.pop_front() {
        if !walk.all.contains_key(nsid) || !seen.insert(nsid.clone()) {
            continue;
        }
        if let Some(next) = edges.get(nsid) {
            queue.extend(next.iter());
        }
    }
    seen
}
