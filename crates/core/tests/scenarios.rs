use std::fs;
use std::path::{Path, PathBuf};

use notefold_core::{
    BatchOrchestrator, DirectorySource, FileRelocator, KMeansPartitioner, MoveError,
    PartitionStrategy, PlanMode, Relocator, Settings,
};
use tempfile::{tempdir, TempDir};

const NOTES: [(&str, &str); 5] = [
    ("rust-1.md", "Rust borrow checker and lifetimes in the compiler"),
    ("rust-2.md", "The Rust compiler rejects borrow errors; lifetimes again"),
    ("rust-3.md", "Lifetimes, borrow checker, Rust compiler diagnostics"),
    ("garden-1.md", "Tomato seedlings need compost and garden soil"),
    ("garden-2.md", "Garden soil, compost heap and tomato watering"),
];

fn workspace(notes: &[(&str, &str)]) -> (TempDir, Settings) {
    let dir = tempdir().unwrap();
    let source = dir.path().join("inbox");
    fs::create_dir_all(&source).unwrap();
    for (name, body) in notes {
        fs::write(source.join(name), body).unwrap();
    }
    let settings = Settings::new(source, dir.path().join("sorted"));
    (dir, settings)
}

fn subdirs(path: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<_> = fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn files_under(path: &Path) -> Vec<String> {
    let mut names = Vec::new();
    for dir in subdirs(path) {
        for entry in fs::read_dir(dir).unwrap() {
            names.push(entry.unwrap().file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}

#[test]
fn five_documents_two_groups() {
    let (_dir, mut settings) = workspace(&NOTES);
    settings.min_documents_for_clustering = 3;
    settings.requested_group_count = Some(2);
    let dest = settings.destination_root.clone();
    let source = settings.source_dir.clone();

    let report = BatchOrchestrator::from_settings(settings).unwrap().run().unwrap();
    assert_eq!(report.mode, PlanMode::Clustered);
    assert_eq!(report.moved(), 5);
    assert_eq!(report.failed(), 0);

    let groups = subdirs(&dest);
    assert_eq!(groups.len(), 2);
    for group in &groups {
        let name = group.file_name().unwrap().to_string_lossy();
        assert!(!name.is_empty());
        assert!(!name.contains(['<', '>', ':', '"', '/', '\\', '|', '?', '*']));
    }
    let mut expected: Vec<String> = NOTES.iter().map(|(n, _)| n.to_string()).collect();
    expected.sort();
    assert_eq!(files_under(&dest), expected);
    assert_eq!(fs::read_dir(source).unwrap().count(), 0);
}

#[test]
fn too_few_documents_go_to_pending() {
    let (_dir, mut settings) = workspace(&NOTES[..2]);
    settings.min_documents_for_clustering = 3;
    let dest = settings.destination_root.clone();

    let report = BatchOrchestrator::from_settings(settings).unwrap().run().unwrap();
    assert_eq!(report.mode, PlanMode::Fallback);
    assert_eq!(report.moved(), 2);
    assert_eq!(subdirs(&dest), vec![dest.join("pending")]);
    assert!(dest.join("pending/rust-1.md").is_file());
    assert!(dest.join("pending/rust-2.md").is_file());
}

#[test]
fn single_document_forms_one_group() {
    let (_dir, mut settings) = workspace(&NOTES[..1]);
    settings.min_documents_for_clustering = 1;
    settings.requested_group_count = Some(4);
    let dest = settings.destination_root.clone();

    let orchestrator = BatchOrchestrator::from_settings(settings).unwrap();
    let plan = orchestrator.plan().unwrap();
    assert_eq!(plan.partition, Some(PartitionStrategy::Trivial));
    assert_eq!(plan.groups.len(), 1);
    let report = orchestrator.execute(&plan);
    assert_eq!(report.moved(), 1);
    let groups = subdirs(&dest);
    assert_eq!(groups.len(), 1);
    assert!(groups[0].join("rust-1.md").is_file());
}

struct FailFor {
    name: &'static str,
    inner: FileRelocator,
}

impl Relocator for FailFor {
    fn relocate(&self, source: &Path, destination_dir: &Path) -> Result<PathBuf, MoveError> {
        if source.file_name().is_some_and(|n| n == self.name) {
            return Err(MoveError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "injected",
            )));
        }
        self.inner.relocate(source, destination_dir)
    }
}

#[test]
fn one_failed_move_does_not_stop_the_batch() {
    let (_dir, mut settings) = workspace(&NOTES);
    settings.requested_group_count = Some(2);
    let dest = settings.destination_root.clone();
    let source_dir = settings.source_dir.clone();

    let source = DirectorySource::new(&source_dir, "*.md").unwrap();
    let partitioner = KMeansPartitioner::new(5, settings.kmeans);
    let relocator = FailFor {
        name: "rust-1.md",
        inner: FileRelocator::default(),
    };
    let report = BatchOrchestrator::with_parts(settings, source, partitioner, relocator)
        .run()
        .unwrap();

    assert_eq!(report.moved(), 4);
    assert_eq!(report.failed(), 1);
    assert!(source_dir.join("rust-1.md").is_file());
    assert_eq!(files_under(&dest).len(), 4);
}

#[test]
fn archive_keeps_a_copy_of_every_moved_note() {
    let (dir, mut settings) = workspace(&NOTES);
    settings.requested_group_count = Some(2);
    let archive = dir.path().join("archive");
    settings.archive_root = Some(archive.clone());

    let report = BatchOrchestrator::from_settings(settings).unwrap().run().unwrap();
    assert_eq!(report.moved(), 5);
    for (name, body) in NOTES {
        assert_eq!(fs::read_to_string(archive.join(name)).unwrap(), body);
    }
}

#[test]
fn plan_does_not_touch_files() {
    let (_dir, settings) = workspace(&NOTES);
    let dest = settings.destination_root.clone();
    let source_dir = settings.source_dir.clone();
    let plan = BatchOrchestrator::from_settings(settings).unwrap().plan().unwrap();
    assert_eq!(plan.documents, 5);
    assert!(!dest.exists());
    assert_eq!(fs::read_dir(source_dir).unwrap().count(), 5);
    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["mode"], "clustered");
}

#[test]
fn missing_source_directory_fails_the_run() {
    let dir = tempdir().unwrap();
    let settings = Settings::new(dir.path().join("absent"), dir.path().join("sorted"));
    assert!(BatchOrchestrator::from_settings(settings).unwrap().run().is_err());
}

#[test]
fn long_cyrillic_keywords_still_produce_a_usable_folder() {
    let body = format!("{} {}", "заметка".repeat(15), "проект".repeat(15));
    let notes = [("a.md", body.as_str()), ("b.md", body.as_str()), ("c.md", body.as_str())];
    let (_dir, mut settings) = workspace(&notes);
    settings.requested_group_count = Some(1);
    let dest = settings.destination_root.clone();

    let report = BatchOrchestrator::from_settings(settings).unwrap().run().unwrap();
    assert_eq!(report.mode, PlanMode::Clustered);
    assert_eq!(report.moved(), 3);
    assert_eq!(report.failed(), 0);

    let groups = subdirs(&dest);
    assert_eq!(groups.len(), 1);
    let name = groups[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.len() <= 255);
    assert!(name.starts_with("заметка") || name.starts_with("проект"));
    assert_eq!(files_under(&dest), vec!["a.md", "b.md", "c.md"]);
}

#[test]
fn blocked_group_directory_fails_its_members() {
    let (_dir, mut settings) = workspace(&NOTES[..3]);
    settings.requested_group_count = Some(1);
    settings.name_groups_by_keywords = false;
    let dest = settings.destination_root.clone();
    let source = settings.source_dir.clone();
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("cluster_0"), "not a directory").unwrap();

    let report = BatchOrchestrator::from_settings(settings).unwrap().run().unwrap();
    assert_eq!(report.moved(), 0);
    assert_eq!(report.failed(), 3);
    assert_eq!(fs::read_dir(source).unwrap().count(), 3);
}
