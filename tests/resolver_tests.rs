//! Resolver behavior against on-disk fixtures

use std::path::Path;

use facerebuild_cli::domain::model::*;
use facerebuild_cli::error::ReconError;
use facerebuild_cli::resolver::{AnalysisLayout, ParticipantResolver, SourceCatalog};
use tempfile::TempDir;

fn extensions() -> Vec<String> {
    ["avi", "mp4", "mov", "mkv"].iter().map(|s| s.to_string()).collect()
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

fn write_csv(layout: &AnalysisLayout, participant: u32, body: &str) {
    let path = layout.segment_csv(participant, Role::for_participant(participant));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("name,start_frame,finish_frame,video_cnt\n{}", body)).unwrap();
}

#[test]
fn test_discover_filters_extensions_and_sorts() {
    let sources = TempDir::new().unwrap();
    touch(&sources.path().join("b/s2_navigator.avi"));
    touch(&sources.path().join("a/s1_navigator.MP4"));
    touch(&sources.path().join("a/s1_navigator.txt"));
    touch(&sources.path().join("a/notes.csv"));

    let catalog = SourceCatalog::discover(sources.path(), &extensions()).unwrap();

    assert_eq!(
        catalog.files(),
        &[
            sources.path().join("a/s1_navigator.MP4"),
            sources.path().join("b/s2_navigator.avi")
        ]
    );
}

#[test]
fn test_discover_missing_directory() {
    let err = SourceCatalog::discover(Path::new("/nonexistent/captures"), &extensions()).unwrap_err();
    assert!(matches!(err, ReconError::NotFound { .. }));
}

#[test]
fn test_rewrapped_copy_preferred_on_disk() {
    let sources = TempDir::new().unwrap();
    touch(&sources.path().join("s1/pp4_pilot.avi"));
    touch(&sources.path().join("s1/pp4_pilot_rewrapped.avi"));
    touch(&sources.path().join("s2/pp4_pilot.avi"));

    let catalog = SourceCatalog::discover(sources.path(), &extensions()).unwrap();

    assert_eq!(
        catalog.candidates_for(Role::Pilot),
        vec![
            sources.path().join("s1/pp4_pilot_rewrapped.avi"),
            sources.path().join("s2/pp4_pilot.avi")
        ]
    );
}

#[test]
fn test_resolve_segment_plan() {
    let root = TempDir::new().unwrap();
    let layout = AnalysisLayout::new(root.path());
    write_csv(&layout, 3, "task1,100.0,104.0,1\n");
    std::fs::write(layout.sidecar(3, Role::Navigator, "task1"), "0, 1, 3, 4,\n").unwrap();
    let catalog = SourceCatalog::from_paths(vec![
        "cap/s1_navigator.avi".into(),
        "cap/s2_navigator.avi".into(),
    ]);

    let resolver = ParticipantResolver::new(&layout, &catalog, 3, SeekMode::Declared);
    let (resolved, failure) = resolver.resolve_all();

    assert!(failure.is_none());
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].source, Path::new("cap/s2_navigator.avi"));
    let plan = resolved[0].frames.as_ref().unwrap();
    assert_eq!(plan.absolute_frames(), vec![100, 101, 103, 104]);
    assert_eq!(
        plan.entries.iter().map(|e| e.seek_target).collect::<Vec<_>>(),
        vec![100, 101, 103, 104]
    );
}

#[test]
fn test_index_past_filtered_candidates() {
    let root = TempDir::new().unwrap();
    let layout = AnalysisLayout::new(root.path());
    write_csv(&layout, 4, "task1,0,,5\n");
    let catalog = SourceCatalog::from_paths(vec![
        "cap/s1_pilot.avi".into(),
        "cap/s2_pilot.avi".into(),
        "cap/s3_pilot.avi".into(),
        "cap/s1_navigator.avi".into(),
    ]);

    let resolver = ParticipantResolver::new(&layout, &catalog, 4, SeekMode::Declared);
    let (resolved, failure) = resolver.resolve_all();

    assert!(resolved.is_empty());
    match failure {
        Some(ReconError::IndexOutOfRange {
            index, available, ..
        }) => {
            assert_eq!(index, 5);
            assert_eq!(available, 3);
        }
        other => panic!("expected IndexOutOfRange, got {:?}", other),
    }
}

#[test]
fn test_missing_video_index_uses_first_candidate() {
    let root = TempDir::new().unwrap();
    let layout = AnalysisLayout::new(root.path());
    write_csv(&layout, 3, "task1,0,,\n");
    let catalog = SourceCatalog::from_paths(vec![
        "cap/s1_navigator.avi".into(),
        "cap/s2_navigator.avi".into(),
    ]);

    let resolver = ParticipantResolver::new(&layout, &catalog, 3, SeekMode::Declared);
    let (resolved, failure) = resolver.resolve_all();

    assert!(failure.is_none());
    assert_eq!(resolved[0].source, Path::new("cap/s1_navigator.avi"));
    assert_eq!(resolved[0].frames, Err(SkipReason::MissingSidecar));
}

#[test]
fn test_missing_segment_csv() {
    let root = TempDir::new().unwrap();
    let layout = AnalysisLayout::new(root.path());
    let catalog = SourceCatalog::default();

    let resolver = ParticipantResolver::new(&layout, &catalog, 3, SeekMode::Declared);
    assert!(matches!(resolver.segments(), Err(ReconError::NotFound { .. })));
}

#[test]
fn test_negative_seek_target_skips_segment() {
    let root = TempDir::new().unwrap();
    let layout = AnalysisLayout::new(root.path());
    write_csv(&layout, 3, "task1,0,,0\n");
    std::fs::write(layout.sidecar(3, Role::Navigator, "task1"), "-2,-1,0").unwrap();
    let catalog = SourceCatalog::from_paths(vec!["cap/s1_navigator.avi".into()]);

    let resolver = ParticipantResolver::new(&layout, &catalog, 3, SeekMode::Declared);
    let (resolved, failure) = resolver.resolve_all();

    assert!(failure.is_none());
    assert!(matches!(resolved[0].frames, Err(SkipReason::MalformedSidecar(_))));
}

#[test]
fn test_overflowing_sidecar_value_skips_segment() {
    let root = TempDir::new().unwrap();
    let layout = AnalysisLayout::new(root.path());
    write_csv(&layout, 3, "task1,1,,0\n");
    std::fs::write(layout.sidecar(3, Role::Navigator, "task1"), "0,9223372036854775807").unwrap();
    let catalog = SourceCatalog::from_paths(vec!["cap/s1_navigator.avi".into()]);

    let resolver = ParticipantResolver::new(&layout, &catalog, 3, SeekMode::Declared);
    let (resolved, failure) = resolver.resolve_all();

    assert!(failure.is_none());
    assert!(matches!(resolved[0].frames, Err(SkipReason::MalformedSidecar(_))));
}
