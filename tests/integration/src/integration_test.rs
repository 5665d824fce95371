//! End-to-end integration test for the whole metadata flow
//!
//! Exercises the complete pipeline: tree initialization -> growth from
//! files -> inheritance -> context adjustment -> selection -> write-back.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use stratum_context::Context;
use stratum_tree::{AdjustOptions, PruneOptions, Tree, Undecided, Value};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Set up a realistic test-suite metadata tree.
fn setup_tree() -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    let root = Tree::init(temp.path()).unwrap();

    write(
        &root.join("main.fmf"),
        concat!(
            "duration: 5m\n",
            "tag: [stable]\n",
            "adjust:\n",
            "  - when: arch == s390x\n",
            "    enabled: false\n",
            "    because: hardware is scarce\n",
            "  - when: distro < fedora-40\n",
            "    tag+: [legacy]\n",
        ),
    );
    write(
        &root.join("tests/main.fmf"),
        concat!(
            "test: ./runtest.sh\n",
            "tag+: [tests]\n",
            "/smoke:\n",
            "  summary: Quick sanity check\n",
            "  tier: 1\n",
        ),
    );
    write(
        &root.join("tests/full.fmf"),
        concat!(
            "summary: Full coverage run\n",
            "tier: 2\n",
            "duration+: ' extra'\n",
            "tag-: [stable]\n",
        ),
    );
    write(
        &root.join("plans/main.fmf"),
        concat!(
            "/ci:\n",
            "  summary: Continuous integration\n",
            "  discover: {how: fmf}\n",
        ),
    );
    temp
}

#[test]
fn test_grow_and_inherit() {
    let temp = setup_tree();
    let tree = Tree::from_path(temp.path()).unwrap();

    let smoke = tree.find("/tests/smoke").unwrap();
    assert_eq!(smoke.get("test"), Some(&Value::from("./runtest.sh")));
    assert_eq!(smoke.get("duration"), Some(&Value::from("5m")));
    assert_eq!(
        smoke.get("tag"),
        Some(&Value::Sequence(vec![
            Value::from("stable"),
            Value::from("tests"),
        ]))
    );

    // Suffix operators applied against inherited values.
    let full = tree.find("/tests/full").unwrap();
    assert_eq!(full.get("duration"), Some(&Value::from("5m extra")));
    assert_eq!(
        full.get("tag"),
        Some(&Value::Sequence(vec![Value::from("tests")]))
    );
}

#[test]
fn test_adjust_across_the_tree() {
    let temp = setup_tree();
    let mut tree = Tree::from_path(temp.path()).unwrap();

    let context = Context::new()
        .with_dimension("arch", ["s390x"])
        .with_dimension("distro", ["fedora-38"]);
    tree.adjust(&context, &AdjustOptions::default()).unwrap();

    let smoke = tree.find("/tests/smoke").unwrap();
    assert_eq!(smoke.get("enabled"), Some(&Value::Bool(false)));
    assert_eq!(smoke.get("because"), None);
    assert_eq!(
        smoke.get("tag"),
        Some(&Value::Sequence(vec![
            Value::from("stable"),
            Value::from("tests"),
            Value::from("legacy"),
        ]))
    );
}

#[test]
fn test_adjust_undecided_raise_policy() {
    let temp = setup_tree();
    let mut tree = Tree::from_path(temp.path()).unwrap();

    // The distro rule cannot be decided without a distro dimension.
    let context = Context::new().with_dimension("arch", ["x86_64"]);
    let options = AdjustOptions {
        undecided: Undecided::Raise,
        ..Default::default()
    };
    let error = tree.adjust(&context, &options).unwrap_err();
    assert!(error.is_cannot_decide());

    // The default policy skips the same rule silently.
    let mut tree = Tree::from_path(temp.path()).unwrap();
    tree.adjust(&context, &AdjustOptions::default()).unwrap();
    assert_eq!(tree.find("/tests/smoke").unwrap().get("enabled"), None);
}

#[test]
fn test_selection_and_filtering() {
    let temp = setup_tree();
    let tree = Tree::from_path(temp.path()).unwrap();

    let names: Vec<_> = tree
        .root()
        .climb(false)
        .into_iter()
        .map(|node| node.name().to_string())
        .collect();
    assert_eq!(names, vec!["/plans/ci", "/tests/full", "/tests/smoke"]);

    let options = PruneOptions {
        keys: vec!["test".to_string()],
        filters: vec!["tag: stable".to_string()],
        ..Default::default()
    };
    let selected = tree.root().prune(&options).unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name(), "/tests/smoke");
}

#[test]
fn test_write_back_and_reload() {
    let temp = setup_tree();
    let mut tree = Tree::from_path(temp.path()).unwrap();

    tree.modify("/tests/smoke", |data| {
        data.insert("tier".to_string(), Value::Int(0));
    })
    .unwrap();

    let reloaded = Tree::from_path(temp.path()).unwrap();
    assert_eq!(
        reloaded.find("/tests/smoke").unwrap().get("tier"),
        Some(&Value::Int(0))
    );
    // Inherited attributes survive the reload untouched.
    assert_eq!(
        reloaded.find("/tests/smoke").unwrap().get("duration"),
        Some(&Value::from("5m"))
    );
}

#[test]
fn test_independent_trees_do_not_interfere() {
    let first = setup_tree();
    let second = setup_tree();

    let handle = {
        let path = second.path().to_path_buf();
        std::thread::spawn(move || Tree::from_path(path).unwrap())
    };
    let tree_one = Tree::from_path(first.path()).unwrap();
    let tree_two = handle.join().unwrap();

    let names = |tree: &Tree| {
        tree.root()
            .climb(true)
            .into_iter()
            .map(|node| node.name().to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&tree_one), names(&tree_two));
}
