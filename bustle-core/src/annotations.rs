//! GDScript type annotation stripping
//!
//! Removes type hints that name one of the mod's own classes, since those
//! classes lose their global `class_name` during the build. Hints naming
//! engine or built-in types (`int`, `Node`, `Array[String]`...) are never
//! touched.
//!
//! Handled forms:
//! - `var x: Foo`, `const X: Foo = ...`, `onready var`, `@onready var`
//! - parameters, `func f(a: Foo, b: Foo = null)`, single or multi-line
//! - return types, `func f() -> Foo:`

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::scanner::{is_escaped, is_string_delimiter, CodeSpans};

static SIGNATURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:def|func)\s+\w+\s*\(").unwrap());

/// Type hint remover compiled for one set of class names
#[derive(Debug, Clone)]
pub struct TypeStripper {
    var_hint: Option<Regex>,
    param_hint: Option<Regex>,
    /// `-> Foo:` directly after a parameter list
    return_hint: Option<Regex>,
    /// `) -> Foo:` anywhere
    return_annotation: Option<Regex>,
}

impl TypeStripper {
    pub fn new<I, S>(class_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(names) = class_alternation(class_names) else {
            return Self {
                var_hint: None,
                param_hint: None,
                return_hint: None,
                return_annotation: None,
            };
        };

        let build = |pattern: String| Regex::new(&pattern).ok();
        Self {
            var_hint: build(format!(
                r"(?m)^([ \t]*(?:@\w+(?:\([^)\n]*\))?[ \t]+)*(?:static[ \t]+)?(?:onready[ \t]+var|var|const)[ \t]+\w+)[ \t]*:[ \t]*(?:{names})\b(?P<after>[^.]|$)"
            )),
            param_hint: build(format!(
                r"(?s)^([A-Za-z_]\w*)[ \t]*:[ \t]*(?:{names})[ \t]*(?:=[ \t]*(.*))?$"
            )),
            return_hint: build(format!(r"^\s*->\s*(?:{names})\b\s*:")),
            return_annotation: build(format!(r"\)\s*->\s*(?:{names})\b\s*:")),
        }
    }

    /// Strip every signature and declaration in a whole file
    pub fn strip_types(&self, code: &str) -> String {
        let code = self.strip_signatures(code);
        self.strip_vars(&code)
    }

    /// Remove the class type hint from `var`/`const` declarations
    pub fn strip_vars(&self, code: &str) -> String {
        let Some(re) = &self.var_hint else {
            return code.to_string();
        };
        let spans = CodeSpans::of(code);
        re.replace_all(code, |caps: &Captures| match caps.get(0) {
            Some(whole) if !spans.contains(whole.start()) => whole.as_str().to_string(),
            _ => format!(
                "{}{}",
                caps.get(1).map_or("", |m| m.as_str()),
                caps.name("after").map_or("", |m| m.as_str())
            ),
        })
        .into_owned()
    }

    /// Strip one parameter, `foo: Bar = 5` -> `foo = 5`
    ///
    /// The parameter comes back trimmed whether or not it was stripped.
    pub fn strip_param(&self, param: &str) -> String {
        let param = param.trim();
        let Some(caps) = self.param_hint.as_ref().and_then(|re| re.captures(param)) else {
            return param.to_string();
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        match caps.get(2).map(|m| m.as_str().trim()) {
            Some(default) if !default.is_empty() => format!("{} = {}", name, default),
            _ => name.to_string(),
        }
    }

    /// Strip the parameters of one list (the text between the parentheses)
    pub fn strip_param_list(&self, list: &str) -> String {
        if self.param_hint.is_none() {
            return list.to_string();
        }
        if list.contains('\n') {
            self.strip_multi_line_params(list)
        } else {
            self.strip_single_line_params(list)
        }
    }

    fn strip_single_line_params(&self, list: &str) -> String {
        let params = split_param_list(list);
        let stripped: Vec<String> = params.iter().map(|p| self.strip_param(p)).collect();
        if params.iter().zip(&stripped).all(|(p, s)| p.trim() == s) {
            return list.to_string();
        }
        stripped
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn strip_multi_line_params(&self, list: &str) -> String {
        let mut changed = false;
        let pieces: Vec<(String, bool)> = param_ranges(list)
            .into_iter()
            .map(|range| {
                let piece = &list[range];
                let Some(core) = code_bounds(piece) else {
                    return (piece.to_string(), false);
                };
                let stripped = self.strip_param(&piece[core.clone()]);
                changed |= stripped != piece[core.clone()];
                (format!("{}{}{}", &piece[..core.start], stripped, &piece[core.end..]), true)
            })
            .collect();
        if !changed {
            return list.to_string();
        }

        // Commas go between parameters; one after the last parameter is dropped
        let mut out = String::with_capacity(list.len());
        for (i, (piece, _)) in pieces.iter().enumerate() {
            let trailing_blank = i + 1 == pieces.len() && i > 0 && !pieces[i].1;
            if i > 0 && !trailing_blank {
                out.push(',');
            }
            out.push_str(piece);
        }
        out
    }

    /// Strip parameter and return hints from every `func`/`def` signature
    pub fn strip_signatures(&self, code: &str) -> String {
        if self.param_hint.is_none() && self.return_hint.is_none() {
            return code.to_string();
        }

        let spans = CodeSpans::of(code);
        let mut out = String::with_capacity(code.len());
        let mut cursor = 0;

        for m in SIGNATURE_RE.find_iter(code) {
            if m.start() < cursor || !spans.contains(m.start()) {
                continue;
            }
            let open = m.end() - 1;
            let Some(close) = find_matching_paren(code, open, &spans) else {
                continue;
            };

            out.push_str(&code[cursor..=open]);
            out.push_str(&self.strip_param_list(&code[open + 1..close]));
            out.push(')');
            cursor = close + 1;

            if let Some(ret) = self.return_hint.as_ref().and_then(|re| re.find(&code[cursor..])) {
                out.push(':');
                cursor += ret.end();
            }
        }

        out.push_str(&code[cursor..]);
        out
    }

    /// `) -> Foo:` -> `):` anywhere in `text`
    pub fn strip_return_annotations(&self, text: &str) -> String {
        match &self.return_annotation {
            Some(re) => re.replace_all(text, "):").into_owned(),
            None => text.to_string(),
        }
    }
}

/// Escaped class names joined longest first, or `None` if there are none
fn class_alternation<I, S>(class_names: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = class_names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return None;
    }
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();
    Some(names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|"))
}

/// Byte index of the closing paren matching the one at `open`
fn find_matching_paren(code: &str, open: usize, spans: &CodeSpans) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in code[open..].char_indices() {
        let i = open + i;
        if !spans.contains(i) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte ranges of the comma-separated pieces of a parameter list
///
/// Commas nested in `()[]{}`, inside string literals or inside `#` comments
/// do not split. The commas themselves are not part of any range.
fn param_ranges(list: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut depth: i32 = 0;
    let mut delimiter: Option<char> = None;
    let mut in_comment = false;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        if let Some(d) = delimiter {
            if c == '\n' || (c == d && !is_escaped(list, i)) {
                delimiter = None;
            }
            continue;
        }
        match c {
            c if is_string_delimiter(c) && !is_escaped(list, i) => delimiter = Some(c),
            '#' => in_comment = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                ranges.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }

    ranges.push(start..list.len());
    ranges
}

/// Range of `piece` from its first to its last code character
///
/// Whitespace and `#` comments around the parameter are outside the range;
/// string contents count as code. `None` for a piece with no code at all.
fn code_bounds(piece: &str) -> Option<Range<usize>> {
    let mut bounds: Option<Range<usize>> = None;
    let mut delimiter: Option<char> = None;
    let mut in_comment = false;

    for (i, c) in piece.char_indices() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        match delimiter {
            Some(d) => {
                if c == '\n' || (c == d && !is_escaped(piece, i)) {
                    delimiter = None;
                }
            }
            None if c == '#' => {
                in_comment = true;
                continue;
            }
            None if is_string_delimiter(c) && !is_escaped(piece, i) => delimiter = Some(c),
            None if c.is_whitespace() => continue,
            None => {}
        }
        let end = i + c.len_utf8();
        bounds = Some(match bounds {
            Some(b) => b.start..end,
            None => i..end,
        });
    }
    bounds
}

/// Split a parameter list on top-level commas
///
/// Commas nested in `()[]{}`, inside string literals or inside comments do
/// not split. Pieces keep their surrounding whitespace; a blank final piece
/// is dropped.
pub fn split_param_list(list: &str) -> Vec<&str> {
    let mut params: Vec<&str> = param_ranges(list).into_iter().map(|r| &list[r]).collect();
    if params.last().is_some_and(|last| last.trim().is_empty()) {
        params.pop();
    }
    params
}

/// Remove a class type hint from a `var`/`const`/`onready var` line
pub fn strip_var_type_hint<S: AsRef<str>>(line: &str, class_names: &[S]) -> String {
    TypeStripper::new(class_names).strip_vars(line)
}

/// Remove a class type hint from a single parameter
pub fn strip_param_type_hint<S: AsRef<str>>(param: &str, class_names: &[S]) -> String {
    TypeStripper::new(class_names).strip_param(param)
}

/// Remove class type hints from a parameter list (single or multi-line)
pub fn strip_param_list_type_hints<S: AsRef<str>>(list: &str, class_names: &[S]) -> String {
    TypeStripper::new(class_names).strip_param_list(list)
}

/// Remove class type hints from every signature in `code`
pub fn strip_signature_type_hints<S: AsRef<str>>(code: &str, class_names: &[S]) -> String {
    TypeStripper::new(class_names).strip_signatures(code)
}

/// `) -> Foo:` -> `):` when `Foo` is one of `class_names`
pub fn strip_return_type_annotation<S: AsRef<str>>(text: &str, class_names: &[S]) -> String {
    TypeStripper::new(class_names).strip_return_annotations(text)
}

/// Strip all class type hints from a file
pub fn strip_types<S: AsRef<str>>(code: &str, class_names: &[S]) -> String {
    TypeStripper::new(class_names).strip_types(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSES: [&str; 3] = ["Baz", "Bar", "Foo"];

    #[test]
    fn test_strip_var_type_hint() {
        assert_eq!(strip_var_type_hint("var foo: Bar = 1", &CLASSES), "var foo = 1");
        assert_eq!(strip_var_type_hint("const X: Foo = 2", &CLASSES), "const X = 2");
        assert_eq!(strip_var_type_hint("onready var y: Baz = get()", &CLASSES), "onready var y = get()");
        assert_eq!(strip_var_type_hint("var z: int = 3", &CLASSES), "var z: int = 3");
    }

    #[test]
    fn test_strip_var_type_hint_annotations() {
        assert_eq!(strip_var_type_hint("@onready var y: Baz = $Node", &CLASSES), "@onready var y = $Node");
        assert_eq!(strip_var_type_hint("@export var f: Foo", &CLASSES), "@export var f");
        assert_eq!(strip_var_type_hint("  var inner: Bar", &CLASSES), "  var inner");
    }

    #[test]
    fn test_strip_var_type_hint_leaves_other_text() {
        assert_eq!(strip_var_type_hint("var b: BarBaz = 1", &CLASSES), "var b: BarBaz = 1");
        assert_eq!(strip_var_type_hint("var b: Bar.Inner", &CLASSES), "var b: Bar.Inner");
        assert_eq!(strip_var_type_hint("var s = \"x: Bar\"", &CLASSES), "var s = \"x: Bar\"");
        assert_eq!(strip_var_type_hint("# var c: Bar", &CLASSES), "# var c: Bar");
    }

    #[test]
    fn test_strip_var_type_hint_no_classes() {
        let none: [&str; 0] = [];
        assert_eq!(strip_var_type_hint("var foo: Bar = 1", &none), "var foo: Bar = 1");
    }

    #[test]
    fn test_strip_param_type_hint() {
        assert_eq!(strip_param_type_hint("foo: Bar", &CLASSES), "foo");
        assert_eq!(strip_param_type_hint("foo: Bar = 5", &CLASSES), "foo = 5");
        assert_eq!(strip_param_type_hint("foo:Bar=5", &CLASSES), "foo = 5");
        assert_eq!(strip_param_type_hint("bar: Baz", &CLASSES), "bar");
        assert_eq!(strip_param_type_hint("baz: int", &CLASSES), "baz: int");
        assert_eq!(strip_param_type_hint("x := Bar.new()", &CLASSES), "x := Bar.new()");
    }

    #[test]
    fn test_split_param_list() {
        assert_eq!(split_param_list("a, b, c"), vec!["a", " b", " c"]);
        assert_eq!(split_param_list("a: Bar, b: Baz = 2"), vec!["a: Bar", " b: Baz = 2"]);
        assert_eq!(split_param_list("a, b = (1, 2), c"), vec!["a", " b = (1, 2)", " c"]);
        assert_eq!(split_param_list("foo(bar, baz), qux"), vec!["foo(bar, baz)", " qux"]);
    }

    #[test]
    fn test_split_param_list_strings_and_collections() {
        assert_eq!(split_param_list("a = \"x, y\", b"), vec!["a = \"x, y\"", " b"]);
        assert_eq!(split_param_list("a = [1, 2], b = {1: 2, 3: 4}"), vec!["a = [1, 2]", " b = {1: 2, 3: 4}"]);
        assert_eq!(split_param_list("a = 'it\\'s, ok', b"), vec!["a = 'it\\'s, ok'", " b"]);
        assert!(split_param_list("").is_empty());
        assert!(split_param_list("   ").is_empty());
    }

    #[test]
    fn test_single_line_param_list() {
        assert_eq!(strip_param_list_type_hints("a: Bar, b: int, c: Baz", &CLASSES), "a, b: int, c");
        assert_eq!(strip_param_list_type_hints("foo: Foo = 1, bar", &CLASSES), "foo = 1, bar");
    }

    #[test]
    fn test_single_line_param_list_untouched() {
        assert_eq!(strip_param_list_type_hints("a:int,b", &CLASSES), "a:int,b");
    }

    #[test]
    fn test_multi_line_param_list() {
        let input = "    foo: Bar,\n    bar: Baz = 5,\n    baz: int = 6";
        let expected = "    foo,\n    bar = 5,\n    baz: int = 6";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), expected);

        let input = "  a: Bar,\n  b: Baz,\n  c: int";
        let expected = "  a,\n  b,\n  c: int";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), expected);
    }

    #[test]
    fn test_multi_line_param_list_blank_lines() {
        let input = "\n    a: Bar,\n\n    b: Baz = 2\n";
        let expected = "\n    a,\n\n    b = 2\n";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), expected);
    }

    #[test]
    fn test_multi_line_param_list_trailing_comma() {
        let input = "\n    a: Bar,\n    b: int,\n";
        let expected = "\n    a,\n    b: int\n";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), expected);
    }

    #[test]
    fn test_multi_line_param_list_untouched() {
        let input = "\n    a: int,  # count\n    b = 2,\n";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), input);
    }

    #[test]
    fn test_multi_line_dict_default_untouched() {
        let code = "func f(opts = {\n\t\"a\": 1,\n\t\"b\": 2\n}):\n\tpass";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), code);
    }

    #[test]
    fn test_multi_line_array_default_with_stripped_param() {
        let code = "func f(\n\ta: Bar,\n\titems = [\n\t\t1, 2\n\t]\n) -> Baz:\n\tpass";
        let expected = "func f(\n\ta,\n\titems = [\n\t\t1, 2\n\t]\n):\n\tpass";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), expected);
    }

    #[test]
    fn test_multi_line_default_of_stripped_param() {
        let input = "\n    a: Bar = {\n        \"k\": 1,\n    },\n    b: Baz\n";
        let expected = "\n    a = {\n        \"k\": 1,\n    },\n    b\n";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), expected);
    }

    #[test]
    fn test_split_param_list_skips_comment_commas() {
        assert_eq!(split_param_list("a, # x, y\n b"), vec!["a", " # x, y\n b"]);
    }

    #[test]
    fn test_multi_line_param_list_comments() {
        let input = "\n    a: Bar, # the bar\n    # spacer\n    b: Baz # last\n";
        let expected = "\n    a, # the bar\n    # spacer\n    b # last\n";
        assert_eq!(strip_param_list_type_hints(input, &CLASSES), expected);
    }

    #[test]
    fn test_strip_return_type_annotation() {
        assert_eq!(strip_return_type_annotation(") -> Bar:", &CLASSES), "):");
        assert_eq!(strip_return_type_annotation(") -> int:", &CLASSES), ") -> int:");
        assert_eq!(strip_return_type_annotation(") -> Baz:", &CLASSES), "):");
        assert_eq!(strip_return_type_annotation(")\n    -> Bar :", &CLASSES), "):");
    }

    #[test]
    fn test_strip_signature_type_hints() {
        assert_eq!(
            strip_signature_type_hints("func foo(a: Bar, b: int) -> Baz:", &CLASSES),
            "func foo(a, b: int):"
        );
        assert_eq!(
            strip_signature_type_hints("def bar(x: Foo, y: int) -> int:", &CLASSES),
            "def bar(x, y: int) -> int:"
        );
    }

    #[test]
    fn test_strip_all_signatures() {
        let code = "func foo(a: Bar, b: int) -> Baz:\nfunc bar(x: Foo, y: int) -> int:";
        let expected = "func foo(a, b: int):\nfunc bar(x, y: int) -> int:";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), expected);
    }

    #[test]
    fn test_signature_with_nested_calls() {
        let code = "func f(a = max(1, 2), b: Bar = Bar.new()) -> Foo:\n\tpass";
        let expected = "func f(a = max(1, 2), b = Bar.new()):\n\tpass";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), expected);
    }

    #[test]
    fn test_signature_with_paren_in_string() {
        let code = "func f(a = \")\", b: Bar):\n\tpass";
        let expected = "func f(a = \")\", b):\n\tpass";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), expected);
    }

    #[test]
    fn test_multi_line_signature() {
        let code = "func f(\n\ta: Bar,\n\tb: int\n) -> Baz:\n\tpass";
        let expected = "func f(\n\ta,\n\tb: int\n):\n\tpass";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), expected);
    }

    #[test]
    fn test_signatures_in_comments_and_strings_untouched() {
        let code = "# func f(a: Bar) -> Bar:\nvar s = \"func g(b: Bar) -> Bar:\"";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), code);
    }

    #[test]
    fn test_unbalanced_signature_untouched() {
        let code = "func f(a: Bar";
        assert_eq!(strip_signature_type_hints(code, &CLASSES), code);
    }

    #[test]
    fn test_strip_types() {
        let code = "func foo(a: Bar, b: int) -> Baz:\nvar foo: Bar = 1\nonready var y: Baz = get()\nconst X: Foo = 2";
        let expected = "func foo(a, b: int):\nvar foo = 1\nonready var y = get()\nconst X = 2";
        assert_eq!(strip_types(code, &CLASSES), expected);
    }

    #[test]
    fn test_strip_types_built_ins_untouched() {
        let code = "extends Node\nvar n: Node2D\nfunc f(v: Vector2) -> int:\n\treturn 1";
        assert_eq!(strip_types(code, &CLASSES), code);
    }
}
