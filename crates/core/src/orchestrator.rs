//! One batch run: collect documents, decide between clustering and the
//! pending fallback, name the groups and relocate every document once.
//!
//! A run is split into [`BatchOrchestrator::plan`], which never writes to the
//! filesystem, and [`BatchOrchestrator::execute`], which performs the moves.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{NotefoldError, Result};
use crate::keywords::top_keywords;
use crate::naming::{folder_name, generic_label, sanitize_folder_name, suffixed_folder_name};
use crate::partition::{KMeansPartitioner, PartitionStrategy, Partitioner};
use crate::relocate::{FileRelocator, MoveOutcome, MoveRecord, Relocator};
use crate::source::{DirectorySource, Document, DocumentSource};
use crate::vectorize::TfidfVectorizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Collecting,
    Fallback,
    Clustering,
    Relocating,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Collecting => "collecting",
            RunState::Fallback => "fallback",
            RunState::Clustering => "clustering",
            RunState::Relocating => "relocating",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Nothing to do.
    Empty,
    /// Too few documents; everything goes to the pending directory.
    Fallback,
    Clustered,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupPlan {
    /// `None` for the pending group.
    pub group: Option<usize>,
    pub name: String,
    pub keywords: Vec<String>,
    pub destination: PathBuf,
    pub members: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchPlan {
    pub mode: PlanMode,
    pub documents: usize,
    pub skipped: Vec<SkippedDocument>,
    pub partition: Option<PartitionStrategy>,
    pub groups: Vec<GroupPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub mode: PlanMode,
    pub documents: usize,
    pub skipped: Vec<SkippedDocument>,
    pub moves: Vec<MoveRecord>,
    /// Documents left in place because a stop was requested.
    pub deferred: Vec<PathBuf>,
}

impl BatchReport {
    pub fn moved(&self) -> usize {
        self.moves.iter().filter(|m| m.is_moved()).count()
    }

    pub fn failed(&self) -> usize {
        self.moves.len() - self.moved()
    }
}

pub struct BatchOrchestrator<S, P, R> {
    settings: Settings,
    source: S,
    partitioner: P,
    relocator: R,
    stop: Arc<AtomicBool>,
}

impl BatchOrchestrator<DirectorySource, KMeansPartitioner, FileRelocator> {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let source = DirectorySource::new(&settings.source_dir, &settings.patterns)?;
        let partitioner = KMeansPartitioner::new(settings.default_group_count, settings.kmeans);
        let relocator = FileRelocator::new(settings.archive_root.clone());
        Ok(Self::with_parts(settings, source, partitioner, relocator))
    }
}

impl<S, P, R> BatchOrchestrator<S, P, R>
where
    S: DocumentSource,
    P: Partitioner,
    R: Relocator,
{
    pub fn with_parts(settings: Settings, source: S, partitioner: P, relocator: R) -> Self {
        Self {
            settings,
            source,
            partitioner,
            relocator,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a stop flag; once set, the run ends at the next group boundary.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn run(&self) -> Result<BatchReport> {
        let plan = self.plan()?;
        Ok(self.execute(&plan))
    }

    pub fn plan(&self) -> Result<BatchPlan> {
        debug!(state = %RunState::Collecting, "run state");
        let (documents, skipped) = self.collect()?;
        if documents.is_empty() {
            debug!("no documents found");
            return Ok(BatchPlan {
                mode: PlanMode::Empty,
                documents: 0,
                skipped,
                partition: None,
                groups: Vec::new(),
            });
        }
        info!(count = documents.len(), "documents collected");

        if documents.len() < self.settings.min_documents_for_clustering {
            debug!(
                state = %RunState::Fallback,
                count = documents.len(),
                min = self.settings.min_documents_for_clustering,
                "not enough documents for clustering"
            );
            let pending = self.settings.pending_dir();
            let name = pending
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(BatchPlan {
                mode: PlanMode::Fallback,
                documents: documents.len(),
                skipped,
                partition: None,
                groups: vec![GroupPlan {
                    group: None,
                    name,
                    keywords: Vec::new(),
                    destination: pending,
                    members: documents.into_iter().map(|d| d.path).collect(),
                }],
            });
        }

        debug!(state = %RunState::Clustering, count = documents.len(), "run state");
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let features =
            TfidfVectorizer::new(self.settings.max_vocabulary_size).fit_transform(&texts)?;
        debug!(terms = features.vocabulary.len(), "vectorized batch");
        let partition = self
            .partitioner
            .partition(&features.matrix, self.settings.requested_group_count)?;
        if partition.labels.len() != documents.len() {
            return Err(NotefoldError::Internal(format!(
                "partition labelled {} of {} documents",
                partition.labels.len(),
                documents.len()
            )));
        }

        let mut members: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
        for (doc, &label) in documents.iter().zip(&partition.labels) {
            members.entry(label).or_default().push(doc.path.clone());
        }

        let max_len = self.settings.max_folder_name_len;
        let mut used = HashSet::new();
        let pending = self.settings.pending_dir();
        if pending.parent() == Some(self.settings.destination_root.as_path()) {
            if let Some(name) = pending.file_name() {
                used.insert(name.to_string_lossy().to_lowercase());
            }
        }
        let mut groups = Vec::with_capacity(members.len());
        for (group, paths) in members {
            let keywords = if self.settings.name_groups_by_keywords {
                top_keywords(
                    &features.matrix,
                    &features.vocabulary,
                    &partition.labels,
                    group,
                    self.settings.top_keywords,
                )
            } else {
                Vec::new()
            };
            let name = if keywords.is_empty() {
                sanitize_folder_name(&generic_label(group), max_len)
            } else {
                folder_name(&keywords, group, max_len)
            };
            let name = unique_name(name, group, max_len, &mut used);
            debug!(group, name = %name, ?keywords, size = paths.len(), "group named");
            groups.push(GroupPlan {
                group: Some(group),
                destination: self.settings.destination_root.join(&name),
                name,
                keywords,
                members: paths,
            });
        }

        Ok(BatchPlan {
            mode: PlanMode::Clustered,
            documents: documents.len(),
            skipped,
            partition: Some(partition.strategy),
            groups,
        })
    }

    /// Relocates every planned document. Per-document failures are recorded
    /// and never stop the batch.
    pub fn execute(&self, plan: &BatchPlan) -> BatchReport {
        debug!(state = %RunState::Relocating, groups = plan.groups.len(), "run state");
        let mut moves = Vec::with_capacity(plan.documents);
        let mut deferred = Vec::new();
        for group in &plan.groups {
            if self.stop.load(Ordering::SeqCst) {
                deferred.extend(group.members.iter().cloned());
                continue;
            }
            if let Err(err) = fs::create_dir_all(&group.destination) {
                error!(
                    destination = %group.destination.display(),
                    error = %err,
                    "cannot create group directory"
                );
                for source in &group.members {
                    moves.push(failed_record(source, &group.destination, err.to_string()));
                }
                continue;
            }
            for source in &group.members {
                moves.push(self.relocate_one(source, &group.destination));
            }
        }
        if !deferred.is_empty() {
            warn!(count = deferred.len(), "stop requested; documents left for the next run");
        }
        debug!(state = %RunState::Idle, "run state");
        let report = BatchReport {
            mode: plan.mode,
            documents: plan.documents,
            skipped: plan.skipped.clone(),
            moves,
            deferred,
        };
        if plan.mode != PlanMode::Empty {
            info!(
                moved = report.moved(),
                failed = report.failed(),
                skipped = report.skipped.len(),
                deferred = report.deferred.len(),
                "batch finished"
            );
        }
        report
    }

    fn collect(&self) -> Result<(Vec<Document>, Vec<SkippedDocument>)> {
        let mut documents = Vec::new();
        let mut skipped = Vec::new();
        for path in self.source.list()? {
            match self.source.read(&path) {
                Ok(text) => documents.push(Document { path, text }),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable document");
                    skipped.push(SkippedDocument {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok((documents, skipped))
    }

    fn relocate_one(&self, source: &Path, destination_dir: &Path) -> MoveRecord {
        match self.relocator.relocate(source, destination_dir) {
            Ok(target) => {
                info!(source = %source.display(), destination = %target.display(), "moved");
                MoveRecord {
                    source: source.to_path_buf(),
                    destination: target,
                    outcome: MoveOutcome::Moved,
                }
            }
            Err(err) => {
                let err = NotefoldError::Move {
                    path: source.to_path_buf(),
                    source: err,
                };
                error!(error = %err, "move failed");
                failed_record(source, destination_dir, err.to_string())
            }
        }
    }
}

/// Two groups may produce the same label; later ones get `_<group>`
/// appended, then `_<group>_<n>` until the name is free.
fn unique_name(name: String, group: usize, max_len: usize, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_lowercase()) {
        return name;
    }
    let mut candidate = name.clone();
    // at most `used.len()` candidates can collide
    for attempt in 0..=used.len() {
        let suffix = match attempt {
            0 => format!("_{group}"),
            n => format!("_{group}_{n}"),
        };
        candidate = suffixed_folder_name(&name, &suffix, max_len);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
    }
    warn!(group, name = %candidate, "no free folder name; sharing an existing one");
    candidate
}

fn failed_record(source: &Path, destination_dir: &Path, reason: String) -> MoveRecord {
    let destination = match source.file_name() {
        Some(name) => destination_dir.join(name),
        None => destination_dir.to_path_buf(),
    };
    MoveRecord {
        source: source.to_path_buf(),
        destination,
        outcome: MoveOutcome::Failed { reason },
    }
}
