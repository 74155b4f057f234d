//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::model::FragmentKind;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".triptych/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Drop the built-in extension/directory tables entirely and use only
    /// what user layers declare.
    #[serde(default)]
    pub suppress_builtins: bool,
    #[serde(default)]
    pub extensions: Extensions,
    #[serde(default)]
    pub directories: Directories,
    #[serde(default)]
    pub split: Split,
    #[serde(default)]
    pub columns: Columns,
    #[serde(default)]
    pub ignore: Ignore,
}

/// Per-kind filename suffix sets. Entries keep their leading dot and may be
/// compound (".css.vue"); suffix matching treats them as a single unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Extensions {
    #[serde(default)]
    pub script: Vec<String>,
    #[serde(default)]
    pub style: Vec<String>,
    #[serde(default)]
    pub template: Vec<String>,
    /// Extensions marking a single combined document.
    #[serde(default)]
    pub combined: Vec<String>,
}

/// Directory names recognized as component territory. Matching also accepts
/// the pluralized form ("view" matches "views").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Directories {
    #[serde(default)]
    pub script: Vec<String>,
    #[serde(default)]
    pub style: Vec<String>,
    #[serde(default)]
    pub template: Vec<String>,
    #[serde(default)]
    pub component: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    #[serde(default = "Split::default_enabled")]
    pub enabled: bool,
    #[serde(default = "Split::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "Split::default_resplit_delay_ms")]
    pub resplit_delay_ms: u64,
    #[serde(default = "Split::default_resolve_delay_ms")]
    pub resolve_delay_ms: u64,
    #[serde(default = "Split::default_close_wait_ms")]
    pub close_wait_ms: u64,
}

impl Split {
    fn default_enabled() -> bool {
        true
    }

    fn default_cache_dir() -> String {
        ".triptych".into()
    }

    fn default_resplit_delay_ms() -> u64 {
        800
    }

    fn default_resolve_delay_ms() -> u64 {
        300
    }

    fn default_close_wait_ms() -> u64 {
        2000
    }
}

impl Default for Split {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            cache_dir: Self::default_cache_dir(),
            resplit_delay_ms: Self::default_resplit_delay_ms(),
            resolve_delay_ms: Self::default_resolve_delay_ms(),
            close_wait_ms: Self::default_close_wait_ms(),
        }
    }
}

/// Display column order. A kind missing from the order has its column
/// disabled and is skipped by the session tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Columns {
    #[serde(default = "Columns::default_order")]
    pub order: Vec<String>,
}

impl Columns {
    fn default_order() -> Vec<String> {
        vec!["script".into(), "template".into(), "style".into()]
    }
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            order: Self::default_order(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Ignore {
    /// Directory prefixes excluded from every scan.
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    split: Option<bool>,
    cache_dir: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            split: env::var("TRIPTYCH_SPLIT")
                .ok()
                .map(|v| !matches!(v.trim(), "0" | "false" | "off" | "no")),
            cache_dir: env::var("TRIPTYCH_CACHE_DIR").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(split: Option<bool>, cache_dir: Option<&str>) -> Self {
        Self {
            split,
            cache_dir: cache_dir.map(str::to_owned),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config,
    /// and env overrides, resolving the workspace relative to `root`.
    pub fn load_for_root(root: &Path) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH));
        Self::load_with_layers(global, workspace, env)
    }

    /// Load using the current directory's repository root as the workspace.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir()?;
        let root = find_repo_root(&cwd).unwrap_or(cwd);
        Self::load_for_root(&root)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut overlays: Vec<Config> = Vec::new();

        if let Some(global_path) = global.filter(|path| path.exists()) {
            overlays.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            overlays.push(Self::from_file(&workspace_path)?);
        }

        let suppress = overlays.iter().any(|layer| layer.suppress_builtins);
        let mut layers: Vec<Config> = Vec::new();
        if suppress {
            layers.push(Config {
                split: Split::default(),
                columns: Columns::default(),
                ..Config::default()
            });
        } else {
            layers.push(Self::from_str(&DEFAULT_CONFIG)?);
        }
        layers.extend(overlays);

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            suppress_builtins: self.suppress_builtins || other.suppress_builtins,
            extensions: Extensions {
                script: merge_patterns(self.extensions.script, other.extensions.script),
                style: merge_patterns(self.extensions.style, other.extensions.style),
                template: merge_patterns(self.extensions.template, other.extensions.template),
                combined: merge_patterns(self.extensions.combined, other.extensions.combined),
            },
            directories: Directories {
                script: merge_patterns(self.directories.script, other.directories.script),
                style: merge_patterns(self.directories.style, other.directories.style),
                template: merge_patterns(self.directories.template, other.directories.template),
                component: merge_patterns(self.directories.component, other.directories.component),
            },
            split: merge_split(self.split, other.split),
            columns: merge_columns(self.columns, other.columns),
            ignore: Ignore {
                paths: merge_patterns(self.ignore.paths, other.ignore.paths),
            },
        }
    }

    /// Cleaned, lowercased suffix set for a kind, negations applied.
    pub fn exts_for(&self, kind: FragmentKind) -> Vec<String> {
        let raw = match kind {
            FragmentKind::Script => &self.extensions.script,
            FragmentKind::Style => &self.extensions.style,
            FragmentKind::Template => &self.extensions.template,
        };
        clean_patterns(raw)
    }

    /// Cleaned combined-document suffix set.
    pub fn combined_exts(&self) -> Vec<String> {
        clean_patterns(&self.extensions.combined)
    }

    /// Every directory name recognized as component territory, slashes
    /// stripped, negations applied.
    pub fn component_dir_names(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for list in [
            &self.directories.script,
            &self.directories.style,
            &self.directories.template,
            &self.directories.component,
        ] {
            all.extend(list.iter().cloned());
        }
        clean_patterns(&all)
            .into_iter()
            .map(|d| d.trim_matches('/').to_owned())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// One-based display column for a kind, or `None` when its column is
    /// disabled.
    pub fn column_of(&self, kind: FragmentKind) -> Option<usize> {
        self.columns
            .order
            .iter()
            .position(|name| name == kind.name())
            .map(|idx| idx + 1)
    }

    pub fn split_enabled(&self) -> bool {
        self.split.enabled
    }

    /// Name of the per-project cache directory holding split components.
    pub fn cache_dir(&self) -> &str {
        &self.split.cache_dir
    }

    pub fn resplit_delay(&self) -> Duration {
        Duration::from_millis(self.split.resplit_delay_ms)
    }

    pub fn resolve_delay(&self) -> Duration {
        Duration::from_millis(self.split.resolve_delay_ms)
    }

    pub fn close_wait(&self) -> Duration {
        Duration::from_millis(self.split.close_wait_ms)
    }
}

/// Union two pattern lists, keeping first-seen order.
fn merge_patterns(base: Vec<String>, overlay: Vec<String>) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut merged = Vec::new();
    for pattern in base.into_iter().chain(overlay) {
        if seen.insert(pattern.clone()) {
            merged.push(pattern);
        }
    }
    merged
}

/// Apply `!`-negations and lowercase everything. A negated entry removes its
/// positive form wherever it appears in the layered list.
fn clean_patterns(patterns: &[String]) -> Vec<String> {
    let negated: BTreeSet<String> = patterns
        .iter()
        .filter_map(|p| p.strip_prefix('!'))
        .map(str::to_ascii_lowercase)
        .collect();

    let mut seen = BTreeSet::new();
    patterns
        .iter()
        .filter(|p| !p.starts_with('!'))
        .map(|p| p.to_ascii_lowercase())
        .filter(|p| !negated.contains(p))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn merge_split(base: Split, overlay: Split) -> Split {
    Split {
        enabled: if overlay.enabled != Split::default_enabled() {
            overlay.enabled
        } else {
            base.enabled
        },
        cache_dir: if overlay.cache_dir != Split::default_cache_dir() {
            overlay.cache_dir
        } else {
            base.cache_dir
        },
        resplit_delay_ms: if overlay.resplit_delay_ms != Split::default_resplit_delay_ms() {
            overlay.resplit_delay_ms
        } else {
            base.resplit_delay_ms
        },
        resolve_delay_ms: if overlay.resolve_delay_ms != Split::default_resolve_delay_ms() {
            overlay.resolve_delay_ms
        } else {
            base.resolve_delay_ms
        },
        close_wait_ms: if overlay.close_wait_ms != Split::default_close_wait_ms() {
            overlay.close_wait_ms
        } else {
            base.close_wait_ms
        },
    }
}

fn merge_columns(base: Columns, overlay: Columns) -> Columns {
    let mut order = if overlay.order != Columns::default_order() {
        overlay.order
    } else {
        base.order
    };
    // Unknown names are tolerated but kinds never disappear silently unless
    // the user left them out on purpose; dedupe repeated entries.
    let mut seen = BTreeSet::new();
    order.retain(|name| seen.insert(name.clone()));
    Columns { order }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("triptych/config.toml"))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(split) = env.split {
        config.split.enabled = split;
    }
    if let Some(cache_dir) = env.cache_dir {
        config.split.cache_dir = cache_dir;
    }
    config
}
