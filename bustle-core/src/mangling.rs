//! Per-file class aliases and load statements
//!
//! Every class a script uses gets a fresh local alias (`Foo` -> `FooQXRT`)
//! bound by a load statement at the top of that script. Aliases are unique
//! per class for the whole run, tracked by a [`MangledNameRegistry`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::class_map::ClassMap;
use crate::path_utils::resource_path;

const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 4;

/// Class name -> alias for one file
pub type FileAliasMap = BTreeMap<String, String>;

/// How generated load statements bind an alias
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStyle {
    /// `const Alias = preload("res://...")`
    #[default]
    Preload,
    /// `var Alias = load("res://...")`
    Load,
}

/// Every alias generated during one run, bucketed by class name
#[derive(Debug, Clone, Default)]
pub struct MangledNameRegistry {
    names: HashMap<String, HashSet<String>>,
}

impl MangledNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and record a new alias for `class_name`
    pub fn generate(&mut self, class_name: &str) -> String {
        self.generate_with(class_name, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&mut self, class_name: &str, rng: &mut R) -> String {
        let used = self.names.entry(class_name.to_string()).or_default();
        generate_mangled_name_with(class_name, used, rng)
    }

    /// Aliases generated so far for `class_name`
    pub fn aliases(&self, class_name: &str) -> Option<&HashSet<String>> {
        self.names.get(class_name)
    }

    /// Seed a bucket, e.g. with names that must never be generated
    pub fn reserve(&mut self, class_name: &str, alias: impl Into<String>) {
        self.names
            .entry(class_name.to_string())
            .or_default()
            .insert(alias.into());
    }

    /// Total number of aliases across all classes
    pub fn len(&self) -> usize {
        self.names.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh aliases for every class in `used_classes`
    pub fn file_alias_map<'a, I>(&mut self, used_classes: I) -> FileAliasMap
    where
        I: IntoIterator<Item = &'a String>,
    {
        used_classes
            .into_iter()
            .map(|class_name| {
                let alias = self.generate(class_name);
                tracing::debug!("Mangled class name: {} -> {}", class_name, alias);
                (class_name.clone(), alias)
            })
            .collect()
    }
}

/// Append 4 random uppercase letters to `class_name` until the result is not
/// in `used`, then record it there
pub fn generate_mangled_name(class_name: &str, used: &mut HashSet<String>) -> String {
    generate_mangled_name_with(class_name, used, &mut rand::thread_rng())
}

pub fn generate_mangled_name_with<R: Rng + ?Sized>(
    class_name: &str,
    used: &mut HashSet<String>,
    rng: &mut R,
) -> String {
    loop {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_CHARS[rng.gen_range(0..SUFFIX_CHARS.len())] as char)
            .collect();
        let candidate = format!("{}{}", class_name, suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Fresh aliases for every class in `used_classes`
pub fn generate_file_alias_map(used_classes: &BTreeSet<String>, registry: &mut MangledNameRegistry) -> FileAliasMap {
    registry.file_alias_map(used_classes)
}

/// One load statement binding `alias` to a mod script
pub fn generate_load_statement(alias: &str, relative_path: &str, mod_name: &str, style: LoadStyle) -> String {
    let path = resource_path(mod_name, relative_path);
    match style {
        LoadStyle::Preload => format!("const {} = preload(\"{}\")", alias, path),
        LoadStyle::Load => format!("var {} = load(\"{}\")", alias, path),
    }
}

/// Load statements for every used class, sorted by class name
///
/// Classes missing from the class map or the alias map are skipped.
pub fn generate_load_statements(
    used_classes: &BTreeSet<String>,
    class_map: &ClassMap,
    mod_name: &str,
    aliases: &FileAliasMap,
    style: LoadStyle,
) -> Vec<String> {
    used_classes
        .iter()
        .filter_map(|class_name| {
            let alias = aliases.get(class_name)?;
            let path = class_map.get(class_name)?;
            Some(generate_load_statement(alias, path, mod_name, style))
        })
        .collect()
}
