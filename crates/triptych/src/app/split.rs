//! Split/merge engine for combined component documents.
//!
//! A combined document (`*.vue` and friends) is decomposed into one file per
//! fragment kind inside a per-component cache directory; editing a fragment
//! file and saving it reassembles the combined document. The decomposition is
//! lossless for canonically ordered documents: wrappers are captured verbatim
//! and the only normalization is the boundary trim applied identically in
//! both directions.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::errors::ComponentError;
use crate::domain::model::{ComponentId, Fragment, FragmentKind, KindMap};
use crate::infra::config::Config;

/// Subdirectory of the cache dir holding one directory per component.
pub const COMPONENTS_SUBDIR: &str = "components";
/// Back-reference file mapping a split directory to its combined document.
pub const ORIGIN_FILE: &str = ".origin";
/// Pseudo-extension of the style aggregate file. Compound on purpose: the
/// classifier must treat it as one unit so the aggregate never reads as a
/// combined document.
const STYLE_AGGREGATE_EXT: &str = "css.vue";

/// The style tag is disguised before scanning so a markup-aware consumer of
/// the block stream can never apply style-specific handling to it; the real
/// tag name is restored in every captured wrapper and in extracted content.
static STYLE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<style\b").expect("valid regex"));
static STYLE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</style\s*>").expect("valid regex"));
static STYLESHEET_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<stylesheet\b").expect("valid regex"));
static STYLESHEET_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</stylesheet\s*>").expect("valid regex"));

static SCRIPT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<script\b").expect("valid regex"));
static SCRIPT_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"</script\s*>").expect("valid regex"));
static TEMPLATE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<template\b").expect("valid regex"));
static TEMPLATE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</template\s*>").expect("valid regex"));

static OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<(script|template|stylesheet)(\s[^>]*)?>").expect("valid regex"));
static LANG_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\blang\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>'"]+))"#).expect("valid regex")
});
static SCOPED_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s)scoped?(?:\s|=|$)").expect("valid regex"));

/// Result of parsing a combined document: at most one script and template
/// block, styles as an ordered sequence.
#[derive(Debug, Default, Clone)]
pub struct ParsedDocument {
    pub script: Option<Fragment>,
    pub styles: Vec<Fragment>,
    pub template: Option<Fragment>,
}

/// Parse a combined document into typed fragments.
///
/// Only top-level `<script>`, `<template>`, and `<style>` blocks are
/// accepted; anything else between blocks fails the parse rather than being
/// silently dropped, which is what keeps the round trip honest. Inner
/// content is trimmed at block boundaries.
pub fn parse_combined(source: &str) -> Result<ParsedDocument, ComponentError> {
    let disguised = disguise_style_tags(source);
    let bytes = disguised.as_str();
    let mut doc = ParsedDocument::default();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let rest = &bytes[pos..];
        let skipped = rest.len() - rest.trim_start().len();
        pos += skipped;
        if pos >= bytes.len() {
            break;
        }

        let rest = &bytes[pos..];
        let caps = OPEN_TAG.captures(rest).ok_or_else(|| {
            ComponentError::ParseFailure {
                reason: "expected a top-level script, style, or template block".into(),
                offset: pos,
            }
        })?;
        let open_text = caps.get(0).expect("whole match").as_str();
        let tag = caps.get(1).expect("tag name").as_str();
        let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let content_start = pos + open_text.len();
        let (content_end, close_text, block_end) =
            find_matching_close(bytes, tag, content_start).ok_or_else(|| {
                ComponentError::ParseFailure {
                    reason: format!("unclosed <{}> block", restore_tag_name(tag)),
                    offset: pos,
                }
            })?;

        let kind = match tag {
            "script" => FragmentKind::Script,
            "stylesheet" => FragmentKind::Style,
            _ => FragmentKind::Template,
        };
        let fragment = Fragment {
            kind,
            lang: extract_lang(attrs).unwrap_or_else(|| kind.default_lang().to_owned()),
            content: restore_style_tags(bytes[content_start..content_end].trim()),
            open_wrapper: restore_style_tags(open_text),
            close_wrapper: restore_style_tags(&close_text),
            path: None,
            scoped: kind == FragmentKind::Style && SCOPED_ATTR.is_match(attrs),
        };

        match kind {
            FragmentKind::Style => doc.styles.push(fragment),
            FragmentKind::Script => {
                if doc.script.is_some() {
                    return Err(ComponentError::ParseFailure {
                        reason: "duplicate script block".into(),
                        offset: pos,
                    });
                }
                doc.script = Some(fragment);
            }
            FragmentKind::Template => {
                if doc.template.is_some() {
                    return Err(ComponentError::ParseFailure {
                        reason: "duplicate template block".into(),
                        offset: pos,
                    });
                }
                doc.template = Some(fragment);
            }
        }

        pos = block_end;
    }

    if doc.script.is_none() && doc.template.is_none() && doc.styles.is_empty() {
        return Err(ComponentError::ParseFailure {
            reason: "document contains no component blocks".into(),
            offset: 0,
        });
    }

    Ok(doc)
}

fn disguise_style_tags(source: &str) -> String {
    let opened = STYLE_OPEN.replace_all(source, "<stylesheet");
    STYLE_CLOSE.replace_all(&opened, "</stylesheet>").into_owned()
}

fn restore_style_tags(text: &str) -> String {
    let opened = STYLESHEET_OPEN.replace_all(text, "<style");
    STYLESHEET_CLOSE.replace_all(&opened, "</style>").into_owned()
}

fn restore_tag_name(tag: &str) -> &str {
    if tag == "stylesheet" { "style" } else { tag }
}

fn delims_for(tag: &str) -> (&'static Regex, &'static Regex) {
    match tag {
        "script" => (&*SCRIPT_OPEN, &*SCRIPT_CLOSE),
        "stylesheet" => (&*STYLESHEET_OPEN, &*STYLESHEET_CLOSE),
        _ => (&*TEMPLATE_OPEN, &*TEMPLATE_CLOSE),
    }
}

/// Locate the close tag matching an open tag at `from`, counting nested
/// same-name opens (templates may nest). Returns content end, the verbatim
/// close tag text, and the index just past it.
fn find_matching_close(text: &str, tag: &str, from: usize) -> Option<(usize, String, usize)> {
    let (open_pat, close_pat) = delims_for(tag);

    let mut depth = 1usize;
    let mut cursor = from;
    loop {
        let close = close_pat.find_at(text, cursor)?;
        match open_pat.find_at(text, cursor) {
            Some(open) if open.start() < close.start() => {
                depth += 1;
                cursor = open.end();
            }
            _ => {
                depth -= 1;
                cursor = close.end();
                if depth == 0 {
                    return Some((close.start(), close.as_str().to_owned(), close.end()));
                }
            }
        }
    }
}

fn extract_lang(attrs: &str) -> Option<String> {
    let caps = LANG_ATTR.captures(attrs)?;
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))?
        .as_str()
        .trim_start_matches('.');
    if value.is_empty() {
        None
    } else {
        Some(value.to_ascii_lowercase())
    }
}

/// One split component: its fragments, cache directory, and materialized
/// file per kind.
#[derive(Debug, Clone)]
pub struct SplitComponent {
    pub id: ComponentId,
    pub main: PathBuf,
    pub dir: PathBuf,
    pub script: Fragment,
    pub styles: Vec<Fragment>,
    pub template: Fragment,
    pub files: KindMap<PathBuf>,
}

/// Owns every split directory and the fragment-path registration table that
/// routes save notifications to a merge.
#[derive(Debug, Default)]
pub struct SplitEngine {
    components: HashMap<ComponentId, SplitComponent>,
    registry: HashMap<PathBuf, ComponentId>,
}

impl SplitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a path lies inside any split cache directory. Keeps sibling
    /// and cross scans from resolving a component's own fragments, and stops
    /// split mode from recursing into its own output.
    pub fn is_split_file(config: &Config, path: &Path) -> bool {
        let marker = format!(
            "{}/{}/",
            config.cache_dir().trim_matches('/'),
            COMPONENTS_SUBDIR
        );
        path.to_string_lossy().replace('\\', "/").contains(&marker)
    }

    /// Decompose `main` into fragment files, one navigable file per kind.
    ///
    /// Parsing happens before anything touches the filesystem, so a
    /// malformed document never leaves a partial split directory behind.
    pub fn split(
        &mut self,
        config: &Config,
        root: &Path,
        main: &Path,
    ) -> Result<KindMap<PathBuf>, ComponentError> {
        let source = fs::read_to_string(main)?;
        let parsed = parse_combined(&source)?;

        let id = ComponentId::of_path(main);
        let dir = root
            .join(config.cache_dir())
            .join(COMPONENTS_SUBDIR)
            .join(id.as_str());
        fs::create_dir_all(&dir)?;

        let base = main
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("component")
            .to_owned();

        let mut script = parsed
            .script
            .unwrap_or_else(|| Fragment::stub(FragmentKind::Script));
        let mut template = parsed
            .template
            .unwrap_or_else(|| Fragment::stub(FragmentKind::Template));
        let mut styles = parsed.styles;
        if styles.is_empty() {
            styles.push(Fragment::stub(FragmentKind::Style));
        }

        let script_path = dir.join(format!("{base}.{}", script.lang));
        fs::write(&script_path, &script.content)?;
        script.path = Some(script_path.clone());

        let template_path = dir.join(format!("{base}.{}", template.lang));
        fs::write(&template_path, &template.content)?;
        template.path = Some(template_path.clone());

        // All style blocks are edited as one artifact; wrappers travel with
        // the file so block boundaries survive user edits.
        let style_path = dir.join(format!("{base}.{STYLE_AGGREGATE_EXT}"));
        let aggregate: Vec<String> = styles.iter().map(Fragment::to_block).collect();
        fs::write(&style_path, aggregate.join("\n\n"))?;
        for style in &mut styles {
            style.path = Some(style_path.clone());
        }

        let main_abs = canonical_main(main);
        fs::write(dir.join(ORIGIN_FILE), main_abs.to_string_lossy().as_bytes())?;

        let mut files = KindMap::default();
        files.set(FragmentKind::Script, script_path);
        files.set(FragmentKind::Style, style_path);
        files.set(FragmentKind::Template, template_path);

        for (_, path) in files.iter() {
            self.registry.insert(path.clone(), id.clone());
        }
        tracing::debug!(component = %id, dir = %dir.display(), "split combined document");

        self.components.insert(
            id.clone(),
            SplitComponent {
                id,
                main: main.to_path_buf(),
                dir,
                script,
                styles,
                template,
                files: files.clone(),
            },
        );

        Ok(files)
    }

    /// Component owning a fragment path, if any.
    pub fn owner_of(&self, path: &Path) -> Option<&SplitComponent> {
        self.registry
            .get(path)
            .and_then(|id| self.components.get(id))
    }

    /// Component split from `main`, if any.
    pub fn component_for_main(&self, main: &Path) -> Option<&SplitComponent> {
        self.components.get(&ComponentId::of_path(main))
    }

    /// Read the back-reference file next to a fragment, mapping it to its
    /// combined document without re-deriving anything from content.
    pub fn recover_origin(fragment_path: &Path) -> Option<PathBuf> {
        let origin = fragment_path.parent()?.join(ORIGIN_FILE);
        let main = fs::read_to_string(origin).ok()?;
        let main = main.trim();
        if main.is_empty() {
            None
        } else {
            Some(PathBuf::from(main))
        }
    }

    /// Reassemble the combined document after a fragment was saved.
    ///
    /// Script and template content is re-wrapped with the originally
    /// captured wrappers; the style aggregate is inserted verbatim, so every
    /// original style wrapper is preserved. Region order is fixed: script,
    /// template, style. The previous document is left untouched when any
    /// fragment file is missing.
    pub fn merge(&mut self, fragment_path: &Path) -> Result<PathBuf, ComponentError> {
        let id = self
            .registry
            .get(fragment_path)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownFragment {
                path: fragment_path.to_path_buf(),
            })?;
        let component = self
            .components
            .get_mut(&id)
            .ok_or_else(|| ComponentError::UnknownFragment {
                path: fragment_path.to_path_buf(),
            })?;

        let script_src = read_fragment(component.files.get(FragmentKind::Script))?;
        let template_src = read_fragment(component.files.get(FragmentKind::Template))?;
        let style_src = read_fragment(component.files.get(FragmentKind::Style))?;

        let script_content = script_src.trim().to_owned();
        let template_content = template_src.trim().to_owned();
        let document = [
            wrap_block(&component.script, &script_content),
            wrap_block(&component.template, &template_content),
            style_src.trim().to_owned(),
        ]
        .join("\n\n")
            + "\n";

        write_atomic(&component.main, &document)?;
        // Committed only after the document hit the disk; a failed write
        // leaves the record matching the previous document.
        component.script.content = script_content;
        component.template.content = template_content;
        tracing::debug!(component = %id, main = %component.main.display(), "merged fragments");
        Ok(component.main.clone())
    }

    /// Re-split after the combined document itself changed.
    ///
    /// Fresh fragment files are written first; stale files from the previous
    /// split (a block's language may have changed its file name) are removed
    /// only afterwards, and the caller swaps the new identities in.
    pub fn resplit(
        &mut self,
        config: &Config,
        root: &Path,
        main: &Path,
    ) -> Result<KindMap<PathBuf>, ComponentError> {
        let id = ComponentId::of_path(main);
        let previous = self.components.remove(&id);
        if let Some(old) = &previous {
            for (_, path) in old.files.iter() {
                self.registry.remove(path);
            }
        }

        let result = self.split(config, root, main);
        match (&result, previous) {
            (Ok(fresh), Some(old)) => {
                for (_, stale) in old.files.iter() {
                    let still_used = FragmentKind::ALL
                        .into_iter()
                        .any(|kind| fresh.get(kind) == stale);
                    if !still_used {
                        if let Err(err) = fs::remove_file(stale) {
                            tracing::warn!(path = %stale.display(), error = %err, "stale fragment not removed");
                        }
                    }
                }
            }
            (Err(_), Some(old)) => {
                // Parse failed: keep the previous split alive.
                for (_, path) in old.files.iter() {
                    self.registry.insert(path.clone(), id.clone());
                }
                self.components.insert(id, old);
            }
            _ => {}
        }
        result
    }

    /// Drop a component and delete its split directory. The directory is
    /// disposable by design: splitting again reproduces equivalent
    /// fragments.
    pub fn dispose(&mut self, main: &Path) -> Result<(), ComponentError> {
        let id = ComponentId::of_path(main);
        if let Some(component) = self.components.remove(&id) {
            for (_, path) in component.files.iter() {
                self.registry.remove(path);
            }
            match fs::remove_dir_all(&component.dir) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn canonical_main(main: &Path) -> PathBuf {
    main.canonicalize().unwrap_or_else(|_| main.to_path_buf())
}

fn wrap_block(fragment: &Fragment, content: &str) -> String {
    format!(
        "{}\n{}\n{}",
        fragment.open_wrapper, content, fragment.close_wrapper
    )
}

fn read_fragment(path: &Path) -> Result<String, ComponentError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(ComponentError::MergeConflict {
            missing: path.to_path_buf(),
        }),
        Err(err) => Err(err.into()),
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ComponentError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let tmp = path.with_file_name(format!(".{name}.tmp"));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
