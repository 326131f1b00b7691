//! GDScript lexical scanner
//!
//! Partitions source text into string literals, `#` comments and code
//! segments. Only code segments are handed to the caller's processor; string
//! and comment text is copied through byte for byte.
//!
//! The scanner is a small explicit state machine:
//! - `Normal` + unescaped `"` / `'` -> `InString`
//! - `InString` + matching unescaped delimiter or newline -> `Normal`
//! - `Normal` + `#` -> `InComment`
//! - `InComment` + newline -> `Normal`
//!
//! If the text ends inside a string and the caller asked for a concatenated
//! result, the original text is returned unchanged instead of a partially
//! rewritten one.

use std::ops::Range;

/// Start position of a code segment, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset into the source text
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

/// How the scanner assembles its result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Keep the processor output of every code segment, in order
    Collect,
    /// Reassemble processed code with the untouched strings and comments
    Concat,
}

/// Scanner result, one variant per [`ScanMode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutput {
    Collected(Vec<String>),
    Concatenated(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString { delimiter: char },
    InComment,
    End,
}

struct Scanner<'a, F> {
    text: &'a str,
    mode: ScanMode,
    processor: F,
    state: ScanState,
    output: String,
    collected: Vec<String>,
    segment: String,
    segment_start: Position,
    position: Position,
}

impl<'a, F> Scanner<'a, F>
where
    F: FnMut(&str, Position) -> String,
{
    fn new(text: &'a str, mode: ScanMode, processor: F) -> Self {
        Self {
            text,
            mode,
            processor,
            state: ScanState::Normal,
            output: String::with_capacity(if mode == ScanMode::Concat { text.len() } else { 0 }),
            collected: Vec::new(),
            segment: String::new(),
            segment_start: Position::default(),
            position: Position::default(),
        }
    }

    fn run(mut self) -> ScanOutput {
        for (offset, c) in self.text.char_indices() {
            self.position.offset = offset;
            let next = match self.state {
                ScanState::Normal => self.normal(offset, c),
                ScanState::InString { delimiter } => self.in_string(offset, c, delimiter),
                ScanState::InComment => self.in_comment(c),
                ScanState::End => ScanState::End,
            };
            self.state = next;
            self.advance(c);
        }

        self.position.offset = self.text.len();
        self.flush();
        let unterminated = matches!(self.state, ScanState::InString { .. });
        self.state = ScanState::End;

        match self.mode {
            ScanMode::Collect => ScanOutput::Collected(self.collected),
            ScanMode::Concat if unterminated => {
                tracing::debug!(
                    "Unterminated string at line {}, leaving text unchanged",
                    self.position.line
                );
                ScanOutput::Concatenated(self.text.to_string())
            }
            ScanMode::Concat => ScanOutput::Concatenated(self.output),
        }
    }

    fn normal(&mut self, offset: usize, c: char) -> ScanState {
        if is_string_delimiter(c) && !is_escaped(self.text, offset) {
            self.flush();
            self.emit(c);
            ScanState::InString { delimiter: c }
        } else if c == '#' {
            self.flush();
            self.emit(c);
            ScanState::InComment
        } else {
            if self.segment.is_empty() {
                self.segment_start = self.position;
            }
            self.segment.push(c);
            ScanState::Normal
        }
    }

    fn in_string(&mut self, offset: usize, c: char, delimiter: char) -> ScanState {
        self.emit(c);
        // A bare newline ends the string even without a closing delimiter
        if c == '\n' || (c == delimiter && !is_escaped(self.text, offset)) {
            ScanState::Normal
        } else {
            ScanState::InString { delimiter }
        }
    }

    fn in_comment(&mut self, c: char) -> ScanState {
        self.emit(c);
        if c == '\n' {
            ScanState::Normal
        } else {
            ScanState::InComment
        }
    }

    /// Copy a string/comment character straight to the output
    fn emit(&mut self, c: char) {
        if self.mode == ScanMode::Concat {
            self.output.push(c);
        }
    }

    fn advance(&mut self, c: char) {
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
    }

    fn flush(&mut self) {
        if self.segment.is_empty() {
            return;
        }
        let segment = std::mem::take(&mut self.segment);
        let processed = (self.processor)(&segment, self.segment_start);
        match self.mode {
            ScanMode::Collect => self.collected.push(processed),
            ScanMode::Concat => self.output.push_str(&processed),
        }
    }
}

/// Run `processor` over every code segment of `text`
pub fn scan<F>(text: &str, mode: ScanMode, processor: F) -> ScanOutput
where
    F: FnMut(&str, Position) -> String,
{
    Scanner::new(text, mode, processor).run()
}

/// Rewrite the code segments of `text`, leaving strings and comments intact
pub fn process_code<F>(text: &str, processor: F) -> String
where
    F: FnMut(&str, Position) -> String,
{
    match scan(text, ScanMode::Concat, processor) {
        ScanOutput::Concatenated(result) => result,
        ScanOutput::Collected(parts) => parts.concat(),
    }
}

/// Collect the processor output of every code segment of `text`
pub fn collect_code<F>(text: &str, processor: F) -> Vec<String>
where
    F: FnMut(&str, Position) -> String,
{
    match scan(text, ScanMode::Collect, processor) {
        ScanOutput::Collected(parts) => parts,
        ScanOutput::Concatenated(result) => vec![result],
    }
}

/// Byte ranges of `text` that are code (not string, not comment)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSpans {
    spans: Vec<Range<usize>>,
}

impl CodeSpans {
    pub fn of(text: &str) -> Self {
        let mut spans = Vec::new();
        scan(text, ScanMode::Collect, |segment, position| {
            spans.push(position.offset..position.offset + segment.len());
            String::new()
        });
        Self { spans }
    }

    /// Whether the byte at `offset` lies in a code segment
    pub fn contains(&self, offset: usize) -> bool {
        let idx = self.spans.partition_point(|span| span.end <= offset);
        self.spans
            .get(idx)
            .is_some_and(|span| span.start <= offset && offset < span.end)
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }
}

/// Check if a character opens or closes a string literal
#[inline]
pub fn is_string_delimiter(c: char) -> bool {
    c == '"' || c == '\''
}

/// Count consecutive backslashes directly before byte `index`
pub fn count_preceding_backslashes(text: &str, index: usize) -> usize {
    text.as_bytes()[..index.min(text.len())]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
}

/// A character is escaped when preceded by an odd number of backslashes
#[inline]
pub fn is_escaped(text: &str, index: usize) -> bool {
    count_preceding_backslashes(text, index) % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(text: &str) -> String {
        process_code(text, |segment, _| segment.to_uppercase())
    }

    #[test]
    fn test_code_is_processed() {
        assert_eq!(upper("var x = 1"), "VAR X = 1");
    }

    #[test]
    fn test_strings_are_untouched() {
        assert_eq!(upper(r#"print("hello") + 'world'"#), r#"PRINT("hello") + 'world'"#);
    }

    #[test]
    fn test_comments_are_untouched() {
        assert_eq!(upper("var a # note here\nvar b"), "VAR A # note here\nVAR B");
    }

    #[test]
    fn test_hash_inside_string_is_not_a_comment() {
        assert_eq!(upper(r##"x = "#not" + y"##), r##"X = "#not" + Y"##);
    }

    #[test]
    fn test_quote_inside_comment_is_ignored() {
        assert_eq!(upper("a # it's fine\nb"), "A # it's fine\nB");
    }

    #[test]
    fn test_escaped_delimiter_stays_in_string() {
        assert_eq!(upper(r#"s = "a\"b" + c"#), r#"S = "a\"b" + C"#);
    }

    #[test]
    fn test_even_backslashes_close_string() {
        assert_eq!(upper(r#"s = "a\\" + c"#), r#"S = "a\\" + C"#);
    }

    #[test]
    fn test_other_delimiter_inside_string() {
        assert_eq!(upper(r#"s = "it's" + c"#), r#"S = "it's" + C"#);
    }

    #[test]
    fn test_newline_ends_unterminated_string() {
        assert_eq!(upper("s = \"open\nnext"), "S = \"open\nNEXT");
    }

    #[test]
    fn test_unterminated_string_at_eof_returns_original() {
        let text = "foo = \"bar";
        assert_eq!(upper(text), text);
    }

    #[test]
    fn test_collect_mode_has_no_fallback() {
        let parts = collect_code("foo = \"bar", |segment, _| segment.to_string());
        assert_eq!(parts, vec!["foo = ".to_string()]);
    }

    #[test]
    fn test_collect_mode_returns_segments_in_order() {
        let parts = collect_code("a \"s\" b # c\nd", |segment, _| segment.trim().to_string());
        assert_eq!(parts, vec!["a", "b", "d"]);
    }

    #[test]
    fn test_segment_positions() {
        let mut positions = Vec::new();
        collect_code("a 'x'\n  b", |segment, position| {
            positions.push((segment.to_string(), position));
            String::new()
        });
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].1, Position { offset: 0, line: 1, column: 1 });
        assert_eq!(positions[1].0, "\n  b");
        assert_eq!(positions[1].1, Position { offset: 5, line: 1, column: 6 });
    }

    #[test]
    fn test_scan_output_variants() {
        assert_eq!(
            scan("a", ScanMode::Concat, |s, _| s.to_string()),
            ScanOutput::Concatenated("a".to_string())
        );
        assert_eq!(
            scan("a", ScanMode::Collect, |s, _| s.to_string()),
            ScanOutput::Collected(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(upper(""), "");
        assert!(collect_code("", |s, _| s.to_string()).is_empty());
    }

    #[test]
    fn test_multibyte_characters() {
        assert_eq!(upper("é = \"ü\" # ß\nà"), "É = \"ü\" # ß\nÀ");
    }

    #[test]
    fn test_code_spans() {
        let text = "a \"s\" b # c\nd";
        let spans = CodeSpans::of(text);
        assert!(spans.contains(0));
        assert!(!spans.contains(3)); // inside "s"
        assert!(spans.contains(6)); // b
        assert!(!spans.contains(9)); // comment
        assert!(spans.contains(12)); // d
        assert!(!spans.contains(100));
    }

    #[test]
    fn test_count_preceding_backslashes() {
        assert_eq!(count_preceding_backslashes("foo", 2), 0);
        assert_eq!(count_preceding_backslashes("foo\\", 4), 1);
        assert_eq!(count_preceding_backslashes("foo\\\\\"", 5), 2);
        assert_eq!(count_preceding_backslashes("foo\\\"", 4), 1);
    }

    #[test]
    fn test_is_escaped() {
        assert!(is_escaped("foo\\\"", 4));
        assert!(!is_escaped("foo\\\\\"", 5));
    }
}
