use pretty_assertions::assert_eq;
use repo_intel_mapper::{Diagnostic, MapperConfig, MapperError, RepositoryMapper, ScanCancel};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn python_package(root: &Path) {
    write(
        root,
        "main.py",
        "from utils import helper\n\ndef main():\n    helper()\n",
    );
    write(
        root,
        "utils.py",
        "def helper():\n    \"\"\"Do the thing.\"\"\"\n    return 1\n",
    );
    write(
        root,
        "tests/test_utils.py",
        "from utils import helper\n\ndef test_helper():\n    assert helper() == 1\n",
    );
}

#[tokio::test]
async fn clean_scan_ranks_shared_module_highest_and_tests_lowest() {
    let temp = tempdir().unwrap();
    python_package(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let map = mapper.scan_repository().await.unwrap();

    assert_eq!(map.total_files, 3);
    assert_eq!(map.languages.get("python"), Some(&3));
    assert!(map.graph.dependencies_of("main.py").contains("utils.py"));
    assert!(map
        .graph
        .dependencies_of("tests/test_utils.py")
        .contains("utils.py"));

    let best = map
        .scores
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(path, _)| path.clone())
        .unwrap();
    assert_eq!(best, "utils.py");

    let worst = map
        .scores
        .iter()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(path, _)| path.clone())
        .unwrap();
    assert_eq!(worst, "tests/test_utils.py");

    assert!(map.entry_points.contains(&"main.py".to_string()));
    assert_eq!(map.test_files, vec!["tests/test_utils.py".to_string()]);
}

#[tokio::test]
async fn scanning_twice_is_idempotent() {
    let temp = tempdir().unwrap();
    python_package(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let first = mapper.scan_repository().await.unwrap();
    let second = mapper.scan_repository().await.unwrap();

    assert_eq!(first.aggregate_hash, second.aggregate_hash);
    assert_eq!(first.modules, second.modules);
    assert_eq!(
        first.modules.keys().collect::<Vec<_>>(),
        second.modules.keys().collect::<Vec<_>>()
    );
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[tokio::test]
async fn snapshot_skips_reparse_on_fresh_mapper() {
    let temp = tempdir().unwrap();
    python_package(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let first = mapper.scan_repository().await.unwrap();
    assert!(temp.path().join(".repo-intel/map.json").is_file());

    // A second mapper instance (fresh process, conceptually) reuses the
    // snapshot because the aggregate hash still matches the tree
    let restarted = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let restored = restarted.scan_repository().await.unwrap();

    assert_eq!(first.aggregate_hash, restored.aggregate_hash);
    assert_eq!(first.modules, restored.modules);
}

#[tokio::test]
async fn unparsable_file_is_kept_partial_with_diagnostic() {
    let temp = tempdir().unwrap();
    python_package(temp.path());
    write(temp.path(), "broken.py", "def f(:\n    pass\n");

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let map = mapper.scan_repository().await.unwrap();

    let broken = map.modules.get("broken.py").unwrap();
    assert!(broken.partial);
    assert_eq!(broken.lines, 2);
    assert!(map.diagnostics.contains(&Diagnostic::PartialParse {
        path: "broken.py".to_string()
    }));
}

#[tokio::test]
async fn unreadable_file_counts_toward_totals_without_structure() {
    let temp = tempdir().unwrap();
    python_package(temp.path());
    fs::write(temp.path().join("blob.py"), [0xff_u8, 0xfe, 0x01]).unwrap();

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let map = mapper.scan_repository().await.unwrap();

    assert_eq!(map.total_files, 4);
    assert!(!map.modules.contains_key("blob.py"));
    assert!(map.diagnostics.contains(&Diagnostic::Unreadable {
        path: "blob.py".to_string()
    }));
}

#[tokio::test]
async fn unresolved_imports_become_diagnostics_not_errors() {
    let temp = tempdir().unwrap();
    write(temp.path(), "app.py", "import requests\n\nx = 1\n");

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let map = mapper.scan_repository().await.unwrap();

    assert!(map.diagnostics.contains(&Diagnostic::UnresolvedImport {
        path: "app.py".to_string(),
        import: "requests".to_string()
    }));
    assert!(map.graph.external_all().contains("requests"));
}

#[tokio::test]
async fn import_cycles_are_reported_and_scoring_terminates() {
    let temp = tempdir().unwrap();
    write(temp.path(), "a.py", "import b\n");
    write(temp.path(), "b.py", "import c\n");
    write(temp.path(), "c.py", "import a\n");

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let map = mapper.scan_repository().await.unwrap();

    assert_eq!(map.graph.edge_count(), 3);
    assert_eq!(
        map.graph.cycles,
        vec![vec![
            "a.py".to_string(),
            "b.py".to_string(),
            "c.py".to_string()
        ]]
    );
    // scoring completed without infinite recursion
    assert_eq!(map.scores.len(), 3);
}

#[tokio::test]
async fn missing_root_is_the_only_fatal_error() {
    let err = RepositoryMapper::new("/definitely/not/a/real/root", MapperConfig::default())
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, MapperError::RootUnavailable(_)));
}

#[tokio::test]
async fn cancelled_scan_discards_partial_results() {
    let temp = tempdir().unwrap();
    python_package(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let cancel = ScanCancel::new();
    cancel.cancel();

    let result = mapper.scan_with_cancel(&cancel).await;
    assert!(matches!(result, Err(MapperError::Cancelled)));
    assert!(mapper.current_map().await.is_none());
}
