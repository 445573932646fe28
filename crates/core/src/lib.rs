mod config;
mod error;
mod keywords;
mod naming;
mod normalization;
mod orchestrator;
mod partition;
mod relocate;
mod source;
mod stopwords;
mod vectorize;

pub use config::{
    KMeansSettings, Settings, DEFAULT_GROUP_COUNT, DEFAULT_MAX_FOLDER_NAME_LEN,
    DEFAULT_MIN_DOCUMENTS, DEFAULT_PATTERNS, PENDING_DIR_NAME,
};
pub use error::{MoveError, NotefoldError, Result};
pub use keywords::{ranked_columns, top_keywords};
pub use naming::{
    folder_name, generic_label, sanitize_folder_name, suffixed_folder_name, DEFAULT_LABEL,
    MAX_NAME_BYTES,
};
pub use normalization::{normalize_text, terms, tokenize};
pub use orchestrator::{
    BatchOrchestrator, BatchPlan, BatchReport, GroupPlan, PlanMode, RunState, SkippedDocument,
};
pub use partition::{
    effective_group_count, KMeansPartitioner, Partition, PartitionStrategy, Partitioner,
};
pub use relocate::{FileRelocator, MoveOutcome, MoveRecord, Relocator};
pub use source::{decode_text, DirectorySource, Document, DocumentSource};
pub use vectorize::{FeatureMatrix, Features, TfidfVectorizer, Vocabulary};
