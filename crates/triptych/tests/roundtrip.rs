//! End-to-end split/merge behavior against real files.

use std::fs;

use triptych::app::split::SplitEngine;
use triptych::domain::model::FragmentKind;
use triptych::infra::config::Config;

fn default_config() -> Config {
    toml::from_str(include_str!("../assets/default-config.toml")).expect("valid defaults")
}

const CANONICAL: &str = "<script lang=\"ts\">\nexport default {};\n</script>\n\n<template>\n<div>hi</div>\n</template>\n\n<style scoped>\n.a { color: red; }\n</style>\n\n<style lang=\"scss\">\n.b { color: blue; }\n</style>\n";

#[test]
fn canonical_document_round_trips_byte_for_byte() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, CANONICAL).expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");

    // Merging untouched fragments reproduces the document exactly.
    let merged_main = engine
        .merge(files.get(FragmentKind::Script))
        .expect("merges");
    assert_eq!(merged_main, main);
    assert_eq!(fs::read_to_string(&main).expect("read"), CANONICAL);
}

#[test]
fn fragment_files_carry_content_and_styles_keep_wrappers() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, CANONICAL).expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");

    // Script and template files hold bare content, named after the block's
    // language.
    let script = files.get(FragmentKind::Script);
    assert!(script.to_string_lossy().ends_with("Card.vue.ts"));
    assert_eq!(
        fs::read_to_string(script).expect("read"),
        "export default {};"
    );
    let template = files.get(FragmentKind::Template);
    assert!(template.to_string_lossy().ends_with("Card.vue.html"));
    assert_eq!(fs::read_to_string(template).expect("read"), "<div>hi</div>");

    // The style aggregate keeps every block's wrapper in-file.
    let style = files.get(FragmentKind::Style);
    assert!(style.to_string_lossy().ends_with("Card.vue.css.vue"));
    let aggregate = fs::read_to_string(style).expect("read");
    insta::assert_snapshot!(aggregate, @r###"
    <style scoped>
    .a { color: red; }
    </style>

    <style lang="scss">
    .b { color: blue; }
    </style>
    "###);
}

#[test]
fn missing_kinds_are_stubbed_and_survive_the_merge() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Bare.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, "<template>\n<p>only markup</p>\n</template>\n").expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");

    // All three fragment files exist; the absent kinds are empty stubs.
    for kind in FragmentKind::ALL {
        assert!(files.get(kind).exists(), "{} file missing", kind.name());
    }
    assert_eq!(
        fs::read_to_string(files.get(FragmentKind::Script)).expect("read"),
        ""
    );

    let merged = engine
        .merge(files.get(FragmentKind::Template))
        .expect("merges");
    assert_eq!(
        fs::read_to_string(merged).expect("read"),
        "<script>\n\n</script>\n\n<template>\n<p>only markup</p>\n</template>\n\n<style>\n\n</style>\n"
    );
}

#[test]
fn editing_one_fragment_updates_only_its_region() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, CANONICAL).expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");

    let style = files.get(FragmentKind::Style);
    fs::write(
        style,
        "<style scoped>\n.a { color: green; }\n</style>\n\n<style lang=\"scss\">\n.b { color: blue; }\n</style>",
    )
    .expect("write");
    engine.merge(style).expect("merges");

    let doc = fs::read_to_string(&main).expect("read");
    assert!(doc.contains("color: green"));
    assert!(!doc.contains("color: red"));
    // Untouched regions keep their verbatim wrappers.
    assert!(doc.starts_with("<script lang=\"ts\">\nexport default {};\n</script>"));
    assert!(doc.contains("<template>\n<div>hi</div>\n</template>"));
}

#[test]
fn merge_fails_cleanly_when_a_fragment_file_disappears() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, CANONICAL).expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");

    fs::remove_file(files.get(FragmentKind::Template)).expect("remove");
    let err = engine.merge(files.get(FragmentKind::Script)).unwrap_err();
    assert!(matches!(
        err,
        triptych::domain::errors::ComponentError::MergeConflict { .. }
    ));
    // The combined document was not touched.
    assert_eq!(fs::read_to_string(&main).expect("read"), CANONICAL);
}

#[test]
fn failed_document_write_leaves_fragment_state_unchanged() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, "<script>\nlet a = 1;\n</script>\n").expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");
    let script = files.get(FragmentKind::Script).clone();
    fs::write(&script, "let a = 2;").expect("write");

    // Replace the document with a directory so the atomic rename fails.
    fs::remove_file(&main).expect("remove");
    fs::create_dir(&main).expect("mkdir");
    let err = engine.merge(&script).unwrap_err();
    assert!(matches!(
        err,
        triptych::domain::errors::ComponentError::Io(_)
    ));
    // The record still reflects the last successfully merged content.
    let component = engine.owner_of(&script).expect("component");
    assert_eq!(component.script.content, "let a = 1;");

    fs::remove_dir(&main).expect("rmdir");
    engine.merge(&script).expect("merges");
    assert!(fs::read_to_string(&main).expect("read").contains("let a = 2;"));
}

#[test]
fn resplit_renames_fragments_when_a_language_changes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, "<script>\nlet a = 1;\n</script>\n").expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");
    let old_script = files.get(FragmentKind::Script).clone();
    assert!(old_script.to_string_lossy().ends_with("Card.vue.js"));

    fs::write(&main, "<script lang=\"ts\">\nlet a: number = 1;\n</script>\n").expect("write");
    let fresh = engine.resplit(&config, root, &main).expect("resplits");

    let new_script = fresh.get(FragmentKind::Script);
    assert!(new_script.to_string_lossy().ends_with("Card.vue.ts"));
    assert!(new_script.exists());
    assert!(!old_script.exists(), "stale fragment file should be removed");
}

#[test]
fn resplit_keeps_the_previous_split_when_the_new_parse_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, "<script>\nlet a = 1;\n</script>\n").expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");
    let script = files.get(FragmentKind::Script).clone();

    fs::write(&main, "<script>\nunclosed\n").expect("write");
    assert!(engine.resplit(&config, root, &main).is_err());

    // The old registration still routes saves to the merge.
    assert!(engine.owner_of(&script).is_some());
    assert!(script.exists());
}

#[test]
fn origin_file_maps_fragments_back_to_the_document() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, CANONICAL).expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");

    let origin =
        SplitEngine::recover_origin(files.get(FragmentKind::Style)).expect("origin recorded");
    assert_eq!(
        origin.canonicalize().expect("canonical"),
        main.canonicalize().expect("canonical")
    );
}

#[test]
fn dispose_removes_the_split_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let main = root.join("components/Card.vue");
    fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
    fs::write(&main, CANONICAL).expect("write");

    let config = default_config();
    let mut engine = SplitEngine::new();
    let files = engine.split(&config, root, &main).expect("splits");
    let dir = files
        .get(FragmentKind::Script)
        .parent()
        .expect("dir")
        .to_path_buf();

    engine.dispose(&main).expect("disposes");
    assert!(!dir.exists());
    assert!(engine.owner_of(files.get(FragmentKind::Script)).is_none());
}
