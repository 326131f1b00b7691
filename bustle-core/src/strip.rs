//! Mod stripping pipeline
//!
//! Turns a mod's scripts into scripts that no longer rely on global
//! `class_name` registration. Per file, in order:
//!
//! 1. Remove the file's own `class_name` declaration
//! 2. Rewrite `extends <ModClass>` to `extends "res://<mod>/<path>"`
//! 3. Strip type hints naming mod classes
//! 4. Detect which mod classes the file uses
//! 5. Generate a fresh alias per used class
//! 6. Substitute class names with their aliases
//! 7. Prepend one load statement per alias
//! 8. Move the `extends` line back to the top
//! 9. Write the result under `<dest>/<mod>/<relative path>`
//!
//! Steps 1-8 are pure apart from the alias registry; step 9 is done by
//! [`strip_mod`] or [`strip_mod_concurrent`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::annotations::TypeStripper;
use crate::class_map::{find_class_name, locate_scripts, strip_class_declaration, ClassMap};
use crate::extends::{move_extends_to_top, ExtendsRewriter};
use crate::mangling::{generate_load_statements, FileAliasMap, LoadStyle, MangledNameRegistry};
use crate::path_utils::{dest_is_safe, make_relative_path, pathbuf_with_suffix};
use crate::scanner::process_code;
use crate::tokens::{apply_replacements, TokenMatcher};

/// Errors from the file-level drivers
///
/// The text transforms themselves never fail.
#[derive(Debug, thiserror::Error)]
pub enum StripError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to list {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Refusing to write into the source directory: {}", .path.display())]
    UnsafeDestination { path: PathBuf },

    #[error("Strip task failed: {0}")]
    Join(String),
}

/// Configuration for stripping one mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripConfig {
    /// Mod folder name, used to build `res://<mod>/...` paths
    pub mod_name: String,

    /// Extension of the scripts to rewrite
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    #[serde(default)]
    pub load_style: LoadStyle,

    /// Run the pipeline without writing anything
    #[serde(default)]
    pub dry_run: bool,

    /// Also write every intermediate stage next to the output file
    #[serde(default)]
    pub stepwise: bool,
}

fn default_script_extension() -> String {
    "gd".to_string()
}

impl StripConfig {
    pub fn new(mod_name: impl Into<String>) -> Self {
        Self {
            mod_name: mod_name.into(),
            script_extension: default_script_extension(),
            load_style: LoadStyle::default(),
            dry_run: false,
            stepwise: false,
        }
    }

    /// Load from a `.json` or `.toml` file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: StripConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        Ok(config)
    }
}

/// Intermediate pipeline stages kept when `stepwise` is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ClassName,
    Extends,
    Types,
    Tokens,
}

impl Stage {
    /// File suffix for this stage's debug output
    pub fn suffix(self) -> &'static str {
        match self {
            Stage::ClassName => ".class_name",
            Stage::Extends => ".extends",
            Stage::Types => ".types",
            Stage::Tokens => ".tokens",
        }
    }
}

/// One script to rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Path relative to the mod root, forward slashes
    pub relative_path: String,
    pub text: String,
}

impl SourceUnit {
    pub fn new(relative_path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            text: text.into(),
        }
    }
}

/// A unit after steps 1-4, waiting for its aliases
#[derive(Debug, Clone)]
pub struct PreparedUnit {
    pub relative_path: String,
    pub text: String,
    pub class_name_removed: Option<String>,
    pub extends_rewritten: BTreeSet<String>,
    pub used_classes: BTreeSet<String>,
    pub stages: Vec<(Stage, String)>,
}

/// Final output for one script
#[derive(Debug, Clone)]
pub struct RewrittenUnit {
    pub relative_path: String,
    pub text: String,
    /// Class whose declaration was removed, if the file declared one
    pub class_name_removed: Option<String>,
    pub extends_rewritten: BTreeSet<String>,
    pub used_classes: BTreeSet<String>,
    pub aliases: FileAliasMap,
    /// Intermediate texts, only filled in stepwise mode
    pub stages: Vec<(Stage, String)>,
}

/// Per-run pipeline with every class-dependent matcher compiled once
#[derive(Debug)]
pub struct Stripper {
    config: StripConfig,
    class_map: ClassMap,
    matcher: TokenMatcher,
    types: TypeStripper,
    extends: ExtendsRewriter,
}

impl Stripper {
    pub fn new(config: StripConfig, class_map: ClassMap) -> Self {
        let matcher = TokenMatcher::new(class_map.class_names());
        let types = TypeStripper::new(class_map.class_names());
        let extends = ExtendsRewriter::for_mod(&class_map, &config.mod_name);
        Self {
            config,
            class_map,
            matcher,
            types,
            extends,
        }
    }

    pub fn config(&self) -> &StripConfig {
        &self.config
    }

    pub fn class_map(&self) -> &ClassMap {
        &self.class_map
    }

    /// Steps 1-4: everything that does not need the alias registry
    pub fn prepare_unit(&self, unit: SourceUnit) -> PreparedUnit {
        let SourceUnit { relative_path, mut text } = unit;
        let mut stages = Vec::new();

        let class_name_removed = find_class_name(&text).map(str::to_string);
        if let Some(class_name) = &class_name_removed {
            tracing::debug!("{}: removing class_name {}", relative_path, class_name);
            text = strip_class_declaration(&text, class_name);
        }
        self.record(&mut stages, Stage::ClassName, &text);

        let (rewritten, extends_rewritten) = self.extends.rewrite(&text);
        text = rewritten;
        self.record(&mut stages, Stage::Extends, &text);

        text = self.types.strip_types(&text);
        self.record(&mut stages, Stage::Types, &text);

        // The rewritten extends path is a string, so it is not seen by detection
        let mut used_classes = self.matcher.detect(&text);
        used_classes.extend(extends_rewritten.iter().cloned());
        tracing::debug!("{}: uses {:?}", relative_path, used_classes);

        PreparedUnit {
            relative_path,
            text,
            class_name_removed,
            extends_rewritten,
            used_classes,
            stages,
        }
    }

    /// Steps 6-8, given the aliases generated for the unit's used classes
    pub fn finish_unit(&self, prepared: PreparedUnit, aliases: FileAliasMap) -> RewrittenUnit {
        let PreparedUnit {
            relative_path,
            text,
            class_name_removed,
            extends_rewritten,
            used_classes,
            mut stages,
        } = prepared;

        let text = if aliases.is_empty() {
            text
        } else {
            process_code(&text, |segment, _| apply_replacements(segment, &self.matcher, &aliases))
        };
        self.record(&mut stages, Stage::Tokens, &text);

        let statements = generate_load_statements(
            &used_classes,
            &self.class_map,
            &self.config.mod_name,
            &aliases,
            self.config.load_style,
        );
        let text = if statements.is_empty() {
            text
        } else {
            format!("{}\n\n{}", statements.join("\n"), text)
        };

        RewrittenUnit {
            relative_path,
            text: move_extends_to_top(&text),
            class_name_removed,
            extends_rewritten,
            used_classes,
            aliases,
            stages,
        }
    }

    /// Steps 1-8 on one unit
    pub fn strip_unit(&self, unit: SourceUnit, registry: &mut MangledNameRegistry) -> RewrittenUnit {
        let prepared = self.prepare_unit(unit);
        let aliases = registry.file_alias_map(&prepared.used_classes);
        self.finish_unit(prepared, aliases)
    }

    fn record(&self, stages: &mut Vec<(Stage, String)>, stage: Stage, text: &str) {
        if self.config.stepwise {
            stages.push((stage, text.to_string()));
        }
    }
}

/// Per-file line of a [`StripReport`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub relative_path: String,
    pub class_name_removed: Option<String>,
    pub extends_rewritten: Vec<String>,
    pub aliases: FileAliasMap,
    pub written: bool,
}

/// Outcome of stripping a whole mod
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripReport {
    pub files_processed: usize,
    pub class_names_removed: usize,
    pub extends_rewritten: usize,
    pub aliases_generated: usize,
    pub files_written: usize,
    pub files: Vec<FileSummary>,
}

impl StripReport {
    fn record(&mut self, unit: &RewrittenUnit, written: bool) {
        self.files_processed += 1;
        if unit.class_name_removed.is_some() {
            self.class_names_removed += 1;
        }
        self.extends_rewritten += unit.extends_rewritten.len();
        self.aliases_generated += unit.aliases.len();
        if written {
            self.files_written += 1;
        }
        self.files.push(FileSummary {
            relative_path: unit.relative_path.clone(),
            class_name_removed: unit.class_name_removed.clone(),
            extends_rewritten: unit.extends_rewritten.iter().cloned().collect(),
            aliases: unit.aliases.clone(),
            written,
        });
    }
}

/// Strip in-memory `(relative_path, text)` pairs
///
/// The class map is built from the units themselves.
pub fn strip_units<I, P, T>(config: &StripConfig, units: I) -> Vec<RewrittenUnit>
where
    I: IntoIterator<Item = (P, T)>,
    P: Into<String>,
    T: Into<String>,
{
    let units: Vec<SourceUnit> = units
        .into_iter()
        .map(|(path, text)| SourceUnit::new(path, text))
        .collect();
    let stripper = Stripper::new(config.clone(), class_map_of(&units));
    let mut registry = MangledNameRegistry::new();

    units
        .into_iter()
        .map(|unit| stripper.strip_unit(unit, &mut registry))
        .collect()
}

fn class_map_of(units: &[SourceUnit]) -> ClassMap {
    ClassMap::from_sources(units.iter().map(|u| (u.relative_path.as_str(), u.text.as_str())))
}

/// Read every script under `source_dir`, in sorted path order
pub fn read_sources(source_dir: &Path, extension: &str) -> Result<Vec<SourceUnit>, StripError> {
    locate_scripts(source_dir, extension)?
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).map_err(|source| StripError::Read {
                path: path.clone(),
                source,
            })?;
            Ok(SourceUnit::new(make_relative_path(&path, source_dir), text))
        })
        .collect()
}

/// Output root for the mod, `<dest_dir>/<mod>`, if it is outside `source_dir`
fn output_root(config: &StripConfig, source_dir: &Path, dest_dir: &Path) -> Result<PathBuf, StripError> {
    let root = dest_dir.join(&config.mod_name);
    if !dest_is_safe(source_dir, &root) {
        tracing::warn!(
            "Destination {} is inside source {}, refusing to write",
            root.display(),
            source_dir.display()
        );
        return Err(StripError::UnsafeDestination { path: root });
    }
    Ok(root)
}

/// Strip every script under `source_dir` into `<dest_dir>/<mod>/`
///
/// Stops at the first I/O failure; files already written are left as is.
pub fn strip_mod(config: &StripConfig, source_dir: &Path, dest_dir: &Path) -> Result<StripReport, StripError> {
    let root = output_root(config, source_dir, dest_dir)?;
    if config.dry_run {
        tracing::warn!("Dry run, no files will be written");
    }

    let units = read_sources(source_dir, &config.script_extension)?;
    tracing::info!(
        "Stripping {} scripts of {} from {} to {}",
        units.len(),
        config.mod_name,
        source_dir.display(),
        root.display()
    );

    let stripper = Stripper::new(config.clone(), class_map_of(&units));
    let mut registry = MangledNameRegistry::new();
    let mut report = StripReport::default();

    for unit in units {
        let rewritten = stripper.strip_unit(unit, &mut registry);
        let written = write_unit(config, &root.join(&rewritten.relative_path), &rewritten)?;
        report.record(&rewritten, written);
    }

    tracing::info!(
        "Stripped {} scripts: {} class_name removed, {} aliases, {} written",
        report.files_processed,
        report.class_names_removed,
        report.aliases_generated,
        report.files_written
    );
    Ok(report)
}

fn write_unit(config: &StripConfig, dest: &Path, unit: &RewrittenUnit) -> Result<bool, StripError> {
    if config.dry_run {
        tracing::debug!("Would write {}", dest.display());
        return Ok(false);
    }

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| StripError::Write { path, source }
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(write_err(parent))?;
    }
    fs::write(dest, &unit.text).map_err(write_err(dest))?;
    for (stage, text) in &unit.stages {
        let stage_path = pathbuf_with_suffix(dest, stage.suffix());
        fs::write(&stage_path, text).map_err(write_err(&stage_path))?;
    }

    tracing::debug!("Wrote {}", dest.display());
    Ok(true)
}

async fn write_unit_async(config: &StripConfig, dest: &Path, unit: &RewrittenUnit) -> Result<bool, StripError> {
    if config.dry_run {
        tracing::debug!("Would write {}", dest.display());
        return Ok(false);
    }

    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| StripError::Write { path, source }
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err(parent))?;
    }
    tokio::fs::write(dest, &unit.text).await.map_err(write_err(dest))?;
    for (stage, text) in &unit.stages {
        let stage_path = pathbuf_with_suffix(dest, stage.suffix());
        tokio::fs::write(&stage_path, text).await.map_err(write_err(&stage_path))?;
    }

    tracing::debug!("Wrote {}", dest.display());
    Ok(true)
}

/// Concurrent version of [`strip_mod`]
///
/// Files are read and written in parallel and transformed on the blocking
/// pool. Alias generation is serialized through the shared registry. Every
/// file task runs to completion; if any failed, the first failure is
/// returned once all of them are done.
pub async fn strip_mod_concurrent(
    config: &StripConfig,
    source_dir: &Path,
    dest_dir: &Path,
) -> Result<StripReport, StripError> {
    let root = output_root(config, source_dir, dest_dir)?;
    if config.dry_run {
        tracing::warn!("Dry run, no files will be written");
    }

    let scripts = {
        let dir = source_dir.to_path_buf();
        let extension = config.script_extension.clone();
        tokio::task::spawn_blocking(move || locate_scripts(&dir, &extension))
            .await
            .map_err(|e| StripError::Join(e.to_string()))??
    };

    let mut reads = JoinSet::new();
    for (index, path) in scripts.into_iter().enumerate() {
        let relative_path = make_relative_path(&path, source_dir);
        reads.spawn(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => Ok((index, SourceUnit::new(relative_path, text))),
                Err(source) => Err(StripError::Read { path, source }),
            }
        });
    }
    let mut units = join_all(reads).await?;
    units.sort_by_key(|(index, _)| *index);
    let units: Vec<SourceUnit> = units.into_iter().map(|(_, unit)| unit).collect();

    tracing::info!(
        "Stripping {} scripts of {} from {} to {}",
        units.len(),
        config.mod_name,
        source_dir.display(),
        root.display()
    );

    let stripper = Arc::new(Stripper::new(config.clone(), class_map_of(&units)));
    let registry = Arc::new(Mutex::new(MangledNameRegistry::new()));

    let mut tasks = JoinSet::new();
    for (index, unit) in units.into_iter().enumerate() {
        let stripper = Arc::clone(&stripper);
        let registry = Arc::clone(&registry);
        let dest = root.join(&unit.relative_path);

        tasks.spawn(async move {
            let worker = Arc::clone(&stripper);
            let rewritten = tokio::task::spawn_blocking(move || {
                let prepared = worker.prepare_unit(unit);
                let aliases = registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .file_alias_map(&prepared.used_classes);
                worker.finish_unit(prepared, aliases)
            })
            .await
            .map_err(|e| StripError::Join(e.to_string()))?;

            let written = write_unit_async(stripper.config(), &dest, &rewritten).await?;
            Ok::<_, StripError>((index, rewritten, written))
        });
    }

    let mut results = join_all(tasks).await?;
    results.sort_by_key(|(index, _, _)| *index);

    let mut report = StripReport::default();
    for (_, rewritten, written) in &results {
        report.record(rewritten, *written);
    }

    tracing::info!(
        "Stripped {} scripts: {} class_name removed, {} aliases, {} written",
        report.files_processed,
        report.class_names_removed,
        report.aliases_generated,
        report.files_written
    );
    Ok(report)
}

/// Wait for every task, then return all results or the first failure
async fn join_all<T: 'static>(mut tasks: JoinSet<Result<T, StripError>>) -> Result<Vec<T>, StripError> {
    let mut results = Vec::new();
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(e)) => {
                tracing::error!("{}", e);
                first_error.get_or_insert(e);
            }
            Err(e) => {
                tracing::error!("Strip task failed: {}", e);
                first_error.get_or_insert(StripError::Join(e.to_string()));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}
