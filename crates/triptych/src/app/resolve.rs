//! Member discovery: split, sibling, and cross strategies in fallback order.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::app::classify::{classify, is_combined};
use crate::app::matcher;
use crate::app::split::SplitEngine;
use crate::domain::errors::ComponentError;
use crate::domain::model::{FragmentKind, MemberSet};
use crate::infra::config::Config;

/// Resolves the files constituting the component a path belongs to.
///
/// Strategies are tried in order: split mode (decompose a combined
/// document), sibling mode (scan the immediate directory), cross mode (walk
/// the whole project under recognized component directories). The first
/// strategy meeting its own sufficiency criterion wins.
pub struct Resolver<'a> {
    config: &'a Config,
    root: &'a Path,
    include_dirs: GlobSet,
    excluded: GlobSet,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a Config, root: &'a Path) -> Self {
        Self {
            include_dirs: build_dir_globs(&config.component_dir_names()),
            excluded: build_exclusion_globs(config),
            config,
            root,
        }
    }

    pub fn resolve(
        &self,
        path: &Path,
        engine: &mut SplitEngine,
    ) -> Result<MemberSet, ComponentError> {
        if self.wants_split(path) {
            let files = engine.split(self.config, self.root, path)?;
            let mut set = MemberSet {
                split_mode: true,
                ..MemberSet::default()
            };
            for kind in FragmentKind::ALL {
                set.candidates.set(kind, vec![files.get(kind).clone()]);
            }
            return Ok(set);
        }

        let mut set = self.sibling_candidates(path)?;
        // Sibling mode is sufficient when at most one kind came up empty.
        if set.missing_kinds() > 1 {
            tracing::debug!(path = %path.display(), "sibling scan insufficient, walking project");
            set = self.cross_candidates();
        }

        for kind in FragmentKind::ALL {
            let candidates = set.candidates.get(kind);
            // A lone candidate is taken unconditionally; ranking only
            // arbitrates real ambiguity.
            if candidates.len() > 1 {
                let ranked = matcher::rank(kind, candidates, path);
                set.candidates.set(kind, ranked);
            }
        }

        if set.missing_kinds() >= 2 {
            return Err(ComponentError::ResolutionExhausted {
                path: path.to_path_buf(),
            });
        }
        Ok(set)
    }

    /// Split mode applies to combined documents when enabled, but never to
    /// files already living inside a split cache directory.
    pub fn wants_split(&self, path: &Path) -> bool {
        is_combined(self.config, path)
            && self.config.split_enabled()
            && !SplitEngine::is_split_file(self.config, path)
    }

    /// Whether the path sits under a recognized component directory.
    pub fn in_component_dirs(&self, path: &Path) -> bool {
        self.include_dirs.is_match(self.relative(path))
    }

    /// Whether the path is excluded (dependency/build output, split cache).
    pub fn is_excluded(&self, path: &Path) -> bool {
        let rel = self.relative(path);
        self.excluded.is_match(rel) || SplitEngine::is_split_file(self.config, path)
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root).unwrap_or(path)
    }

    fn sibling_candidates(&self, path: &Path) -> Result<MemberSet, ComponentError> {
        let mut set = MemberSet::default();
        let Some(dir) = path.parent() else {
            return Ok(set);
        };

        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();

        for file in entries {
            if SplitEngine::is_split_file(self.config, &file) {
                continue;
            }
            if let Some(kind) = classify(self.config, &file) {
                set.candidates.get_mut(kind).push(file);
            }
        }
        Ok(set)
    }

    fn cross_candidates(&self) -> MemberSet {
        let mut set = MemberSet {
            cross_mode: true,
            ..MemberSet::default()
        };

        let walker = WalkBuilder::new(self.root)
            .git_ignore(true)
            .hidden(true)
            .build();

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "walk error during cross-mode scan");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.into_path();
            if self.is_excluded(&path) || !self.in_component_dirs(&path) {
                continue;
            }
            files.push(path);
        }
        files.sort();

        for file in files {
            if let Some(kind) = classify(self.config, &file) {
                set.candidates.get_mut(kind).push(file);
            }
        }
        set
    }
}

/// Globs matching anything under a named directory or its pluralized form,
/// case-insensitively (`view` also matches `Views/`).
fn build_dir_globs(names: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for name in names {
        for variant in [name.clone(), format!("{name}s")] {
            match GlobBuilder::new(&format!("**/{variant}/**"))
                .case_insensitive(true)
                .literal_separator(false)
                .build()
            {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => {
                    tracing::warn!(pattern = %variant, error = %err, "invalid directory pattern");
                }
            }
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

fn build_exclusion_globs(config: &Config) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    let mut patterns: Vec<String> = config.ignore.paths.clone();
    patterns.push(config.cache_dir().to_owned());
    patterns.push(".*".into());

    for raw in &patterns {
        for expanded in expand_dir_pattern(raw) {
            match GlobBuilder::new(&expanded).literal_separator(false).build() {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => {
                    tracing::warn!(pattern = %raw, error = %err, "invalid ignore pattern");
                }
            }
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        trimmed.to_owned(),
        format!("{trimmed}/**"),
        format!("**/{trimmed}"),
        format!("**/{trimmed}/**"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn default_config() -> Config {
        toml::from_str(include_str!("../../assets/default-config.toml")).expect("valid defaults")
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, b"").expect("write");
    }

    #[test]
    fn sibling_mode_resolves_single_candidates_directly() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("btn/btn.js"));
        touch(&root.join("btn/btn.html"));
        touch(&root.join("btn/btn.css"));

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let set = resolver
            .resolve(&root.join("btn/btn.html"), &mut engine)
            .expect("resolves");

        assert!(!set.cross_mode);
        assert!(!set.split_mode);
        assert_eq!(set.primary(FragmentKind::Script), Some(&*root.join("btn/btn.js")));
        assert_eq!(set.primary(FragmentKind::Style), Some(&*root.join("btn/btn.css")));
        assert_eq!(
            set.primary(FragmentKind::Template),
            Some(&*root.join("btn/btn.html"))
        );
    }

    #[test]
    fn one_missing_kind_is_still_sufficient() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("card/card.ts"));
        touch(&root.join("card/card.html"));

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let set = resolver
            .resolve(&root.join("card/card.ts"), &mut engine)
            .expect("resolves");

        assert!(!set.cross_mode);
        assert_eq!(set.missing_kinds(), 1);
    }

    #[test]
    fn falls_back_to_cross_mode_when_two_kinds_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        // Only a script next to the anchor; style and template live in
        // recognized component directories elsewhere.
        touch(&root.join("components/nav/nav.js"));
        touch(&root.join("views/nav/nav.css"));
        touch(&root.join("views/nav/nav.html"));

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let set = resolver
            .resolve(&root.join("components/nav/nav.js"), &mut engine)
            .expect("resolves");

        assert!(set.cross_mode);
        assert_eq!(set.primary(FragmentKind::Style), Some(&*root.join("views/nav/nav.css")));
        assert_eq!(
            set.primary(FragmentKind::Template),
            Some(&*root.join("views/nav/nav.html"))
        );
    }

    #[test]
    fn cross_mode_skips_dependency_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("components/app/app.js"));
        touch(&root.join("node_modules/components/lib/lib.css"));
        touch(&root.join("components/widgets/app.css"));
        touch(&root.join("components/widgets/app.html"));

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let set = resolver
            .resolve(&root.join("components/app/app.js"), &mut engine)
            .expect("resolves");

        assert!(set.cross_mode);
        let styles = set.candidates.get(FragmentKind::Style);
        assert!(styles.iter().all(|p| !p.to_string_lossy().contains("node_modules")));
    }

    #[test]
    fn resolution_exhausted_when_nothing_relatable_exists() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(&root.join("misc/lonely.js"));

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let err = resolver
            .resolve(&root.join("misc/lonely.js"), &mut engine)
            .unwrap_err();
        assert!(matches!(err, ComponentError::ResolutionExhausted { .. }));
    }

    #[test]
    fn split_mode_wins_for_combined_documents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let main = root.join("components/Btn.vue");
        fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
        fs::write(
            &main,
            "<script>\nexport default {};\n</script>\n\n<template>\n<b>x</b>\n</template>\n",
        )
        .expect("write");

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let set = resolver.resolve(&main, &mut engine).expect("resolves");

        assert!(set.split_mode);
        for kind in FragmentKind::ALL {
            let primary = set.primary(kind).expect("one file per kind");
            assert!(primary.exists());
            assert!(SplitEngine::is_split_file(&config, primary));
        }
    }

    #[test]
    fn split_fragments_do_not_resolve_as_their_own_siblings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let main = root.join("components/Btn.vue");
        fs::create_dir_all(main.parent().expect("parent")).expect("mkdir");
        fs::write(&main, "<script>\nx\n</script>\n").expect("write");

        let config = default_config();
        let resolver = Resolver::new(&config, root);
        let mut engine = SplitEngine::new();
        let set = resolver.resolve(&main, &mut engine).expect("splits");
        let script = set.primary(FragmentKind::Script).expect("script").to_path_buf();

        // Resolving the materialized fragment must not re-enter split mode.
        assert!(!resolver.wants_split(&script));
        assert!(resolver.is_excluded(&script));
    }
}
