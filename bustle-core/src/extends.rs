//! `extends` rewriting
//!
//! Inheritance from a mod class is turned into inheritance from the class's
//! script path, `extends Foo` -> `extends "res://MyMod/Foo.gd"`, because the
//! global `class_name` no longer exists after stripping. Engine base classes
//! (`extends Node`) are left alone.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::class_map::ClassMap;

/// Top-level `extends` statement (an indented one belongs to an inner class)
static TOP_LEVEL_EXTENDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^extends\b").unwrap());

/// Rewrites `extends <Class>` for every class of a mod in one pass
#[derive(Debug, Clone)]
pub struct ExtendsRewriter {
    regex: Option<Regex>,
    load_paths: BTreeMap<String, String>,
}

impl ExtendsRewriter {
    /// Build from `class name -> load path literal` pairs
    pub fn new<I, K, V>(load_paths: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let load_paths: BTreeMap<String, String> = load_paths
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();

        let regex = if load_paths.is_empty() {
            None
        } else {
            let mut names: Vec<&str> = load_paths.keys().map(String::as_str).collect();
            names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            let alternation = names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
            Regex::new(&format!(r"(?m)^([ \t]*)extends[ \t]+({})\b", alternation)).ok()
        };

        Self { regex, load_paths }
    }

    /// Rewriter for every class of `class_map`, loaded from `res://<mod>/...`
    pub fn for_mod(class_map: &ClassMap, mod_name: &str) -> Self {
        Self::new(
            class_map
                .class_names()
                .filter_map(|name| class_map.load_path(mod_name, name).map(|path| (name, path))),
        )
    }

    /// Rewrite `text`, returning it with the set of classes whose extends was
    /// rewritten
    pub fn rewrite(&self, text: &str) -> (String, BTreeSet<String>) {
        let mut rewritten = BTreeSet::new();
        let Some(re) = &self.regex else {
            return (text.to_string(), rewritten);
        };

        let result = re
            .replace_all(text, |caps: &Captures| {
                let class_name = &caps[2];
                match self.load_paths.get(class_name) {
                    Some(path) => {
                        tracing::debug!("Replacing extends {} with \"{}\"", class_name, path);
                        rewritten.insert(class_name.to_string());
                        format!("{}extends \"{}\"", &caps[1], path)
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned();

        (result, rewritten)
    }
}

/// Rewrite every `extends <class_name>` line to `extends "<load_path>"`
pub fn replace_extends(text: &str, class_name: &str, load_path: &str) -> String {
    ExtendsRewriter::new([(class_name, load_path)]).rewrite(text).0
}

/// Move the first top-level `extends` line to the top of the file
///
/// Every other line keeps its relative order. No-op when there is no such
/// line or it is already first.
pub fn move_extends_to_top(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let Some(idx) = lines.iter().position(|line| TOP_LEVEL_EXTENDS_RE.is_match(line)) else {
        return text.to_string();
    };
    if idx == 0 {
        return text.to_string();
    }

    let mut reordered = Vec::with_capacity(lines.len());
    reordered.push(lines[idx]);
    reordered.extend(lines[..idx].iter().copied());
    reordered.extend(lines[idx + 1..].iter().copied());
    reordered.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_extends() {
        assert_eq!(
            replace_extends("extends Foo\nvar x", "Foo", "res://Mod/Foo.gd"),
            "extends \"res://Mod/Foo.gd\"\nvar x"
        );
    }

    #[test]
    fn test_replace_extends_keeps_indentation() {
        assert_eq!(
            replace_extends("class Inner:\n\textends Foo\n", "Foo", "res://Mod/Foo.gd"),
            "class Inner:\n\textends \"res://Mod/Foo.gd\"\n"
        );
    }

    #[test]
    fn test_replace_extends_whole_word() {
        let text = "extends FooBar";
        assert_eq!(replace_extends(text, "Foo", "res://Mod/Foo.gd"), text);
    }

    #[test]
    fn test_replace_extends_ignores_other_classes_and_comments() {
        let text = "# extends Foo\nextends Node";
        assert_eq!(replace_extends(text, "Foo", "res://Mod/Foo.gd"), text);
    }

    #[test]
    fn test_replace_extends_keeps_trailing_comment() {
        assert_eq!(
            replace_extends("extends Foo # base", "Foo", "res://Mod/Foo.gd"),
            "extends \"res://Mod/Foo.gd\" # base"
        );
    }

    #[test]
    fn test_rewriter_reports_rewritten_classes() {
        let rewriter = ExtendsRewriter::new([("Foo", "res://M/Foo.gd"), ("Bar", "res://M/lib/Bar.gd")]);
        let (text, rewritten) = rewriter.rewrite("extends Bar\nfunc f():\n\tFoo.new()");
        assert_eq!(text, "extends \"res://M/lib/Bar.gd\"\nfunc f():\n\tFoo.new()");
        assert_eq!(rewritten.into_iter().collect::<Vec<_>>(), vec!["Bar".to_string()]);
    }

    #[test]
    fn test_rewriter_for_mod() {
        let class_map: ClassMap = [("Bar", "lib/Bar.gd")].into_iter().collect();
        let rewriter = ExtendsRewriter::for_mod(&class_map, "MyMod");
        let (text, _) = rewriter.rewrite("extends Bar");
        assert_eq!(text, "extends \"res://MyMod/lib/Bar.gd\"");
    }

    #[test]
    fn test_move_extends_to_top() {
        let input = "class_name MyClass\n# comment\nextends Foo\nfunc bar():\n    pass";
        let expected = "extends Foo\nclass_name MyClass\n# comment\nfunc bar():\n    pass";
        assert_eq!(move_extends_to_top(input), expected);
    }

    #[test]
    fn test_move_extends_already_first() {
        let input = "extends Foo\nclass_name MyClass\nfunc _ready(): pass";
        assert_eq!(move_extends_to_top(input), input);
    }

    #[test]
    fn test_move_extends_missing() {
        let input = "class_name MyClass\nfunc _ready(): pass";
        assert_eq!(move_extends_to_top(input), input);
    }

    #[test]
    fn test_move_extends_ignores_comments() {
        let input = "# extends Foo\nclass_name MyClass\nfunc _ready(): pass";
        assert_eq!(move_extends_to_top(input), input);
    }

    #[test]
    fn test_move_extends_first_only() {
        let input = "class_name MyClass\nextends Foo\nfunc _ready(): pass\nextends Bar";
        let expected = "extends Foo\nclass_name MyClass\nfunc _ready(): pass\nextends Bar";
        assert_eq!(move_extends_to_top(input), expected);
    }

    #[test]
    fn test_move_extends_keeps_blank_lines() {
        let input = "const A = 1\n\nextends \"res://M/Foo.gd\"\n\nfunc f():\n\tpass\n";
        let expected = "extends \"res://M/Foo.gd\"\nconst A = 1\n\n\nfunc f():\n\tpass\n";
        assert_eq!(move_extends_to_top(input), expected);
    }

    #[test]
    fn test_move_extends_skips_inner_class() {
        let input = "const A = 1\nclass Inner:\n\textends Node";
        assert_eq!(move_extends_to_top(input), input);
    }
}
