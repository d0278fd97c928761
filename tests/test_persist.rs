//! Round-tripping translation units through their cached JSON form and the
//! modification-time staleness check.

use std::fs;
use std::time::{Duration, SystemTime};

use tempfile::tempdir;
use weld::base::Fqn;
use weld::entity::Group;
use weld::tree::{Element, ElementBuilder, ExpressionBuilder};
use weld::{SourceSet, TranslationUnit};

fn sample_tree() -> Element {
    ElementBuilder::new("unit")
        .children(
            "children",
            vec![
                ElementBuilder::new("use").attr("path", "lib/core").build(),
                ExpressionBuilder::named("answer")
                    .call("Integer", [ExpressionBuilder::lit("42")])
                    .build(),
            ],
        )
        .build()
}

fn sample_unit() -> TranslationUnit {
    let sources = SourceSet::new();
    TranslationUnit::build("main.bdl", sample_tree(), &sources).unwrap()
}

#[test]
fn test_store_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("main.unit");

    let unit = sample_unit();
    unit.store(&cache).unwrap();

    let loaded = TranslationUnit::load(&cache).unwrap();
    assert_eq!(loaded.path, "main.bdl");
    assert_eq!(loaded.uses, vec!["lib/core"]);
    assert!(loaded.symbols.is_closed());
    let answer = loaded
        .symbols
        .get(&Fqn::new("answer"), Group::NONE)
        .expect("cached entry resolvable");
    assert_eq!(answer.fqn, Some(Fqn::new("answer")));
}

#[test]
fn test_load_rejects_garbage() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("main.unit");
    fs::write(&cache, "not a cached unit").unwrap();

    let err = TranslationUnit::load(&cache).unwrap_err();
    assert!(
        err.to_string().contains("invalid cached form"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_missing_cache_is_stale() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.bdl");
    fs::write(&source, "").unwrap();

    let stale = TranslationUnit::is_stale(&source, &dir.path().join("main.unit")).unwrap();
    assert!(stale);
}

#[test]
fn test_fresh_cache_is_not_stale() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.bdl");
    let cache = dir.path().join("main.unit");
    fs::write(&source, "").unwrap();
    sample_unit().store(&cache).unwrap();

    assert!(!TranslationUnit::is_stale(&source, &cache).unwrap());
}

#[test]
fn test_touched_source_invalidates_the_cache() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.bdl");
    let cache = dir.path().join("main.unit");
    fs::write(&source, "").unwrap();
    sample_unit().store(&cache).unwrap();

    let file = fs::File::options().write(true).open(&source).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    assert!(TranslationUnit::is_stale(&source, &cache).unwrap());
}

#[test]
fn test_load_or_build_skips_the_parser_on_a_fresh_cache() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.bdl");
    let cache = dir.path().join("main.unit");
    fs::write(&source, "").unwrap();
    sample_unit().store(&cache).unwrap();

    let sources = SourceSet::new();
    let mut parsed = false;
    let unit = TranslationUnit::load_or_build(&source, &cache, &sources, || {
        parsed = true;
        Ok(sample_tree())
    })
    .unwrap();
    assert!(!parsed, "a fresh cache must not trigger a parse");
    assert_eq!(unit.path, "main.bdl");
}

#[test]
fn test_load_or_build_rebuilds_a_stale_cache() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("main.bdl");
    let cache = dir.path().join("main.unit");
    fs::write(&source, "").unwrap();

    let sources = SourceSet::new();
    let mut parsed = false;
    let unit = TranslationUnit::load_or_build(&source, &cache, &sources, || {
        parsed = true;
        Ok(sample_tree())
    })
    .unwrap();
    assert!(parsed, "a missing cache must trigger a parse");
    assert!(unit.symbols.is_closed());
}
