//! Bustle Core Library
//!
//! Build-time rewriting of GDScript mods so they can be loaded into a shared
//! project without registering global class names:
//! - Lexical scanning (strings, comments, code segments)
//! - Whole-word token detection and substitution
//! - Class map building from `class_name` declarations
//! - Type annotation stripping
//! - `extends` rewriting to script paths
//! - Per-file class aliases and load statements
//! - The per-file pipeline and mod-level drivers

pub mod annotations;
pub mod class_map;
pub mod extends;
pub mod mangling;
pub mod path_utils;
pub mod scanner;
pub mod strip;
pub mod tokens;

// Re-export commonly used types
pub use annotations::{
    split_param_list, strip_param_list_type_hints, strip_param_type_hint, strip_return_type_annotation,
    strip_signature_type_hints, strip_types, strip_var_type_hint, TypeStripper,
};
pub use class_map::{build_class_map, find_class_name, locate_scripts, strip_class_declaration, ClassMap};
pub use extends::{move_extends_to_top, replace_extends, ExtendsRewriter};
pub use mangling::{
    generate_file_alias_map, generate_load_statement, generate_load_statements, generate_mangled_name,
    generate_mangled_name_with, FileAliasMap, LoadStyle, MangledNameRegistry,
};
pub use path_utils::{dest_is_safe, make_relative_path, normalize_path, path_to_string, resource_path};
pub use scanner::{collect_code, process_code, scan, CodeSpans, Position, ScanMode, ScanOutput};
pub use strip::{
    read_sources, strip_mod, strip_mod_concurrent, strip_units, FileSummary, PreparedUnit, RewrittenUnit,
    SourceUnit, Stage, StripConfig, StripError, StripReport, Stripper,
};
pub use tokens::{detect_tokens, substitute_tokens, TokenMatcher};
