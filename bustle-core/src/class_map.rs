//! Mod class map
//!
//! Maps every `class_name` declared in a mod to the mod-relative path of the
//! script that declares it. Built once per run, read-only afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::path_utils::{make_relative_path, resource_path};
use crate::strip::StripError;

/// `class_name Foo` at the start of a line, optionally after `@annotations`
static CLASS_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:@\w+(?:\([^)\n]*\))?[ \t]+)*class_name[ \t]+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// `extends` clause following a `class_name` on the same line
static EXTENDS_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^extends\b").unwrap());

/// Declared class name -> mod-relative script path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    classes: BTreeMap<String, String>,
}

impl ClassMap {
    /// Build from `(relative_path, text)` pairs
    ///
    /// A class declared by more than one file maps to the last one seen.
    pub fn from_sources<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut classes = BTreeMap::new();
        for (relative_path, text) in sources {
            let Some(class_name) = find_class_name(text) else {
                continue;
            };
            if let Some(previous) = classes.insert(class_name.to_string(), relative_path.to_string()) {
                tracing::warn!(
                    "class_name {} declared in both {} and {}, using {}",
                    class_name,
                    previous,
                    relative_path,
                    relative_path
                );
            }
        }
        Self { classes }
    }

    pub fn get(&self, class_name: &str) -> Option<&str> {
        self.classes.get(class_name).map(String::as_str)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// Class names in sorted order
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// `res://<mod>/<path>` for a class, if known
    pub fn load_path(&self, mod_name: &str, class_name: &str) -> Option<String> {
        self.get(class_name).map(|path| resource_path(mod_name, path))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ClassMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            classes: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// First class declared in `text`
pub fn find_class_name(text: &str) -> Option<&str> {
    CLASS_NAME_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Remove the `class_name <class>` declaration from `text`
///
/// The declaration goes together with an optional icon path
/// (`class_name Foo, "res://icon.svg"`). An `extends` clause on the same
/// line and any leading `@annotations` stay; anything else on the line is
/// dropped with it.
pub fn strip_class_declaration(text: &str, class_name: &str) -> String {
    let pattern = format!(
        r#"(?m)^([ \t]*(?:@\w+(?:\([^)\n]*\))?[ \t]+)*)class_name[ \t]+{}\b(?:[ \t]*,[ \t]*(?:"[^"\n]*"|'[^'\n]*'))?[ \t]*;?[ \t]*"#,
        regex::escape(class_name)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return text.to_string();
    };
    let Some(caps) = re.captures(text) else {
        return text.to_string();
    };
    let (Some(whole), Some(prefix)) = (caps.get(0), caps.get(1)) else {
        return text.to_string();
    };

    let line_end = text[whole.end()..]
        .find('\n')
        .map(|i| whole.end() + i)
        .unwrap_or(text.len());
    let prefix = prefix.as_str().trim();
    let keep_rest = EXTENDS_CLAUSE_RE.is_match(&text[whole.end()..line_end]);

    let mut result = String::with_capacity(text.len());
    result.push_str(&text[..whole.start()]);
    if keep_rest {
        if !prefix.is_empty() {
            result.push_str(prefix);
            result.push(' ');
        }
        result.push_str(&text[whole.end()..]);
    } else if prefix.is_empty() {
        // Drop the line together with its newline
        let next_line = if line_end < text.len() { line_end + 1 } else { line_end };
        result.push_str(&text[next_line..]);
    } else {
        result.push_str(prefix);
        result.push_str(&text[line_end..]);
    }
    result
}

/// All scripts with the given extension under `dir`, sorted
pub fn locate_scripts(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, StripError> {
    let extension = extension.trim_start_matches('.');
    let mut scripts = Vec::new();
    collect_scripts(dir, extension, &mut scripts)?;
    scripts.sort();
    Ok(scripts)
}

fn collect_scripts(dir: &Path, extension: &str, scripts: &mut Vec<PathBuf>) -> Result<(), StripError> {
    let entries = fs::read_dir(dir).map_err(|source| StripError::Walk {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| StripError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_scripts(&path, extension, scripts)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            scripts.push(path);
        }
    }

    Ok(())
}

/// Scan every script under `source_dir` and map its class to its path
pub fn build_class_map(source_dir: &Path, extension: &str) -> Result<ClassMap, StripError> {
    let mut sources = Vec::new();
    for path in locate_scripts(source_dir, extension)? {
        let text = fs::read_to_string(&path).map_err(|source| StripError::Read {
            path: path.clone(),
            source,
        })?;
        sources.push((make_relative_path(&path, source_dir), text));
    }
    Ok(ClassMap::from_sources(
        sources.iter().map(|(path, text)| (path.as_str(), text.as_str())),
    ))
}
