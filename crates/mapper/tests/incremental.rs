use pretty_assertions::assert_eq;
use repo_intel_mapper::{MapperConfig, RepositoryMapper};
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

fn seed(root: &Path) {
    write(root, "main.py", "from utils import helper\n");
    write(root, "utils.py", "def helper():\n    return 1\n");
    write(root, "extra.py", "x = 1\n");
}

#[tokio::test]
async fn single_file_edit_matches_full_rescan() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    mapper.scan_repository().await.unwrap();

    // Edit one file, update incrementally
    write(
        temp.path(),
        "extra.py",
        "from utils import helper\n\ny = helper()\n",
    );
    let incremental = mapper
        .update_on_file_change(temp.path().join("extra.py"))
        .await
        .unwrap();

    // A brand-new mapper doing a full scan of the same tree must agree.
    // Disable its snapshot reuse by pointing the cache elsewhere.
    let fresh_config = MapperConfig {
        cache_dir_name: ".repo-intel-verify".to_string(),
        ..Default::default()
    };
    let fresh = RepositoryMapper::new(temp.path(), fresh_config).unwrap();
    let rescanned = fresh.scan_repository().await.unwrap();

    assert_eq!(incremental.modules, rescanned.modules);
    assert_eq!(incremental.scores, rescanned.scores);
    assert_eq!(
        incremental.graph.dependencies_of("extra.py"),
        rescanned.graph.dependencies_of("extra.py")
    );
    assert_eq!(incremental.aggregate_hash, rescanned.aggregate_hash);
}

#[tokio::test]
async fn new_dependent_raises_target_score_monotonically() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let before = mapper.scan_repository().await.unwrap();
    let score_before = before.score_of("utils.py");

    write(temp.path(), "newcomer.py", "from utils import helper\n");
    let after = mapper
        .update_on_file_change(temp.path().join("newcomer.py"))
        .await
        .unwrap();

    assert!(after.modules.contains_key("newcomer.py"));
    assert!(after.score_of("utils.py") >= score_before);
    assert_eq!(after.graph.in_degree("utils.py"), 2);
}

#[tokio::test]
async fn deleting_a_file_removes_node_and_edges() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let before = mapper.scan_repository().await.unwrap();
    assert!(before.modules.contains_key("main.py"));
    assert_eq!(before.graph.in_degree("utils.py"), 1);

    fs::remove_file(temp.path().join("main.py")).unwrap();
    let after = mapper
        .update_on_file_change(temp.path().join("main.py"))
        .await
        .unwrap();

    assert!(!after.modules.contains_key("main.py"));
    assert_eq!(after.graph.in_degree("utils.py"), 0);
    assert_eq!(after.total_files, 2);
    assert!(!after.scores.contains_key("main.py"));
}

#[tokio::test]
async fn ensure_fresh_picks_up_out_of_band_edits() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let first = mapper.scan_repository().await.unwrap();
    assert!(!first.modules.contains_key("late.py"));

    // Simulate an editor writing a file without telling us
    write(temp.path(), "late.py", "from utils import helper\n");
    let refreshed = mapper.ensure_fresh().await.unwrap();

    assert!(refreshed.modules.contains_key("late.py"));
    assert!(refreshed
        .graph
        .dependencies_of("late.py")
        .contains("utils.py"));
}

#[tokio::test]
async fn ensure_fresh_is_a_no_op_on_quiet_trees() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    let mapper = RepositoryMapper::new(temp.path(), MapperConfig::default()).unwrap();
    let first = mapper.scan_repository().await.unwrap();
    let refreshed = mapper.ensure_fresh().await.unwrap();

    assert_eq!(first.aggregate_hash, refreshed.aggregate_hash);
    assert_eq!(first.modules, refreshed.modules);
}
