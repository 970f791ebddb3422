//! A tiny declaration-surface syntax for tests.
//!
//! The engine consumes pre-parsed stubs, so tests need a way to write stub
//! trees legibly. The fixture format is line-oriented Rust-shaped
//! declarations, one item per line, with `mod`/`enum`/macro bodies spanning
//! lines via braces:
//!
//! ```text
//! //- /lib.rs crate:main deps:util edition:2018 cfg:feature=extra
//! pub struct Foo
//! mod a {
//!     pub fn f
//! }
//! mod b;
//! use a::f as g
//! pub use util::*
//! macro_rules! m { fn generated }
//! m!()
//! ```
//!
//! Macro bodies are themselves fixture items: the test expander "expands" a
//! call by parsing the definition body, which is all declarative macros do
//! as far as name resolution is concerned.

use defmap::Name;
use defmap::NsSet;
use defmap::input::{
    CfgExpr, EnumStub, ExternCrateStub, ItemStubs, MacroCallStub, MacroDefStub, Macro2DefStub,
    ModDeclStub, ModStub, RawVisibility, SimpleStub, StubItem, UseStub, VariantStub,
};
use std::hash::{Hash, Hasher};

/// One `//- /path [key:value..]` section of a fixture.
#[derive(Debug, Clone)]
pub struct FixtureFile {
    pub path: String,
    pub text: String,
    /// Set when the section declared `crate:name`.
    pub crate_name: Option<String>,
    pub deps: Vec<String>,
    pub edition: Option<String>,
    /// `cfg:a,feature=x` atoms and key-values.
    pub cfg: Vec<(String, Option<String>)>,
}

/// Split a fixture into files. Text before the first marker belongs to an
/// implicit `/lib.rs crate:main`.
pub fn parse_fixture(text: &str) -> Vec<FixtureFile> {
    let mut files: Vec<FixtureFile> = Vec::new();
    let mut current: Option<FixtureFile> = None;
    let mut body = String::new();

    let flush = |files: &mut Vec<FixtureFile>, current: &mut Option<FixtureFile>, body: &mut String| {
        if let Some(mut file) = current.take() {
            file.text = std::mem::take(body);
            files.push(file);
        } else if !body.trim().is_empty() {
            files.push(FixtureFile {
                path: "/lib.rs".to_string(),
                text: std::mem::take(body),
                crate_name: Some("main".to_string()),
                deps: Vec::new(),
                edition: None,
                cfg: Vec::new(),
            });
        } else {
            body.clear();
        }
    };

    for line in text.lines() {
        if let Some(header) = line.trim_start().strip_prefix("//- ") {
            flush(&mut files, &mut current, &mut body);
            current = Some(parse_header(header));
        } else {
            body.push_str(line);
            body.push('\n');
        }
    }
    flush(&mut files, &mut current, &mut body);
    files
}

fn parse_header(header: &str) -> FixtureFile {
    let mut file = FixtureFile {
        path: String::new(),
        text: String::new(),
        crate_name: None,
        deps: Vec::new(),
        edition: None,
        cfg: Vec::new(),
    };
    for (index, token) in header.split_whitespace().enumerate() {
        if index == 0 {
            file.path = token.to_string();
            continue;
        }
        if let Some(name) = token.strip_prefix("crate:") {
            file.crate_name = Some(name.to_string());
        } else if let Some(deps) = token.strip_prefix("deps:") {
            file.deps = deps.split(',').filter(|d| !d.is_empty()).map(String::from).collect();
        } else if let Some(edition) = token.strip_prefix("edition:") {
            file.edition = Some(edition.to_string());
        } else if let Some(cfg) = token.strip_prefix("cfg:") {
            for entry in cfg.split(',').filter(|e| !e.is_empty()) {
                match entry.split_once('=') {
                    Some((key, value)) => {
                        file.cfg.push((key.to_string(), Some(value.trim_matches('"').to_string())));
                    }
                    None => file.cfg.push((entry.to_string(), None)),
                }
            }
        } else {
            panic!("unknown fixture header token: {token}");
        }
    }
    assert!(!file.path.is_empty(), "fixture header without a path: {header}");
    file
}

/// Parse one items-owner's worth of fixture text into stubs.
pub fn parse_items(text: &str) -> ItemStubs {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = 0;
    let mut stubs = ItemStubs::new(Vec::new());

    // file-level inner attributes come first
    while cursor < lines.len() {
        let line = lines[cursor].trim();
        if line.is_empty() || line.starts_with("//") {
            cursor += 1;
            continue;
        }
        if let Some(inner) = line.strip_prefix("#![") {
            let inner = inner.trim_end_matches(']');
            if inner == "macro_use" {
                stubs.inner_macro_use = true;
            } else if let Some(cfg) = inner.strip_prefix("cfg(") {
                stubs.inner_cfg = Some(parse_cfg(cfg.trim_end_matches(')')));
            } else {
                panic!("unsupported inner attribute: {line}");
            }
            cursor += 1;
            continue;
        }
        break;
    }

    stubs.items = parse_item_list(&lines, &mut cursor, false);
    stubs
}

/// Parse items until end of input or a lone `}` when `in_block`.
fn parse_item_list(lines: &[&str], cursor: &mut usize, in_block: bool) -> Vec<StubItem> {
    let mut items = Vec::new();
    while *cursor < lines.len() {
        let line = lines[*cursor].trim();
        if line.is_empty() || line.starts_with("//") {
            *cursor += 1;
            continue;
        }
        if line == "}" {
            if in_block {
                *cursor += 1;
            }
            return items;
        }
        items.push(parse_item(lines, cursor));
    }
    assert!(!in_block, "fixture block not closed with }}");
    items
}

#[derive(Default)]
struct Attrs {
    cfg: Option<CfgExpr>,
    macro_use: bool,
    macro_export: bool,
    local_inner_macros: bool,
    prelude_import: bool,
    proc_macro: bool,
    path_attr: Option<String>,
}

fn parse_item(lines: &[&str], cursor: &mut usize) -> StubItem {
    let mut attrs = Attrs::default();
    // attribute lines stack up before the item
    loop {
        let line = lines[*cursor].trim();
        if let Some(attr) = line.strip_prefix("#[") {
            parse_attr(attr.trim_end_matches(']'), &mut attrs);
            *cursor += 1;
            continue;
        }
        break;
    }

    let line = lines[*cursor].trim();
    let (visibility, rest) = parse_visibility(line);
    let rest = rest.trim();

    if let Some(rest) = rest.strip_prefix("mod ") {
        return parse_mod(lines, cursor, attrs, visibility, rest);
    }
    if let Some(rest) = rest.strip_prefix("enum ") {
        return parse_enum(lines, cursor, attrs, visibility, rest);
    }
    if let Some(rest) = rest.strip_prefix("use ") {
        *cursor += 1;
        return parse_use(attrs, visibility, rest);
    }
    if let Some(rest) = rest.strip_prefix("extern crate ") {
        *cursor += 1;
        let rest = rest.trim_end_matches(';');
        let (name, alias) = match rest.split_once(" as ") {
            Some((name, alias)) => (name.trim(), Some(Name::from(alias.trim()))),
            None => (rest.trim(), None),
        };
        return StubItem::ExternCrate(ExternCrateStub {
            name: name.into(),
            alias,
            visibility,
            cfg: attrs.cfg,
            has_macro_use: attrs.macro_use,
        });
    }
    if let Some(rest) = rest.strip_prefix("macro_rules! ") {
        let (name, body) = parse_named_body(lines, cursor, rest);
        return StubItem::MacroDef(MacroDefStub {
            body_hash: text_hash(&body),
            name,
            body,
            cfg: attrs.cfg,
            has_macro_export: attrs.macro_export,
            has_local_inner_macros: attrs.local_inner_macros,
        });
    }
    if let Some(rest) = rest.strip_prefix("macro ") {
        let (name, body) = parse_named_body(lines, cursor, rest);
        return StubItem::Macro2Def(Macro2DefStub {
            body_hash: text_hash(&body),
            name,
            visibility,
            body,
            cfg: attrs.cfg,
        });
    }
    if let Some(bang) = rest.find('!') {
        let path_text = &rest[..bang];
        let after = rest[bang + 1..].trim();
        let path: Vec<Name> = split_path(path_text);
        let body = parse_call_body(lines, cursor, after);
        let is_include = path.last().map(|s| s.as_str()) == Some("include");
        return StubItem::MacroCall(MacroCallStub {
            body_hash: if is_include { None } else { Some(text_hash(&body)) },
            path,
            body,
            cfg: attrs.cfg,
        });
    }

    // plain named items: `kind name`
    *cursor += 1;
    let rest = rest.trim_end_matches(';');
    let (kind, name) = rest
        .split_once(' ')
        .unwrap_or_else(|| panic!("unparseable fixture item: {line}"));
    let namespaces = match kind {
        "struct" | "union" => NsSet::TYPES_AND_VALUES,
        "trait" | "type" => NsSet::TYPES,
        "fn" | "const" | "static" => NsSet::VALUES,
        other => panic!("unknown fixture item kind: {other}"),
    };
    StubItem::Simple(SimpleStub {
        name: name.trim().into(),
        visibility,
        cfg: attrs.cfg,
        namespaces: if attrs.proc_macro { namespaces.union(NsSet::MACROS) } else { namespaces },
        is_proc_macro: attrs.proc_macro,
    })
}

fn parse_mod(
    lines: &[&str],
    cursor: &mut usize,
    attrs: Attrs,
    visibility: RawVisibility,
    rest: &str,
) -> StubItem {
    let rest = rest.trim();
    if let Some(name) = rest.strip_suffix(';') {
        *cursor += 1;
        return StubItem::ModDecl(ModDeclStub {
            name: name.trim().into(),
            visibility,
            cfg: attrs.cfg,
            has_macro_use: attrs.macro_use,
            path_attr: attrs.path_attr,
        });
    }
    let name = rest
        .strip_suffix('{')
        .unwrap_or_else(|| panic!("inline mod must end with '{{': mod {rest}"))
        .trim();
    *cursor += 1;
    let items = parse_item_list(lines, cursor, true);
    StubItem::Mod(ModStub {
        name: name.into(),
        visibility,
        cfg: attrs.cfg,
        has_macro_use: attrs.macro_use,
        items: ItemStubs::new(items),
    })
}

fn parse_enum(
    lines: &[&str],
    cursor: &mut usize,
    attrs: Attrs,
    visibility: RawVisibility,
    rest: &str,
) -> StubItem {
    let rest = rest.trim();
    let mut variants: Vec<VariantStub> = Vec::new();

    if let Some(inline) = rest.split_once('{') {
        let (name, tail) = inline;
        let tail = tail.trim();
        if let Some(variant_list) = tail.strip_suffix('}') {
            // single line: enum E { V1, V2 }
            *cursor += 1;
            for variant in variant_list.split(',').map(str::trim).filter(|v| !v.is_empty()) {
                variants.push(VariantStub { name: variant.into(), cfg: None });
            }
            return StubItem::Enum(EnumStub {
                name: name.trim().into(),
                visibility,
                cfg: attrs.cfg,
                variants,
            });
        }
        // multi line: variants until `}`
        *cursor += 1;
        let mut pending_cfg: Option<CfgExpr> = None;
        while *cursor < lines.len() {
            let line = lines[*cursor].trim();
            *cursor += 1;
            if line == "}" {
                break;
            }
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some(attr) = line.strip_prefix("#[cfg(") {
                pending_cfg = Some(parse_cfg(attr.trim_end_matches([']', ')'])));
                continue;
            }
            let variant = line.trim_end_matches(',');
            variants.push(VariantStub { name: variant.into(), cfg: pending_cfg.take() });
        }
        return StubItem::Enum(EnumStub {
            name: name.trim().into(),
            visibility,
            cfg: attrs.cfg,
            variants,
        });
    }
    // `enum E;` or `enum E`: no variants
    *cursor += 1;
    StubItem::Enum(EnumStub {
        name: rest.trim_end_matches(';').trim().into(),
        visibility,
        cfg: attrs.cfg,
        variants,
    })
}

fn parse_use(attrs: Attrs, visibility: RawVisibility, rest: &str) -> StubItem {
    let rest = rest.trim_end_matches(';').trim();
    let (path_text, alias) = match rest.split_once(" as ") {
        Some((path, alias)) => (path.trim(), Some(Name::from(alias.trim()))),
        None => (rest, None),
    };
    let is_glob = path_text.ends_with("::*") || path_text == "*";
    let path_text = path_text.strip_suffix("::*").unwrap_or(path_text);
    let path_text = if path_text == "*" { "" } else { path_text };
    StubItem::Use(UseStub {
        path: split_path(path_text),
        alias,
        visibility,
        cfg: attrs.cfg,
        is_glob,
        is_prelude: attrs.prelude_import,
    })
}

/// `name { body }` possibly spanning lines; used for macro definitions.
fn parse_named_body(lines: &[&str], cursor: &mut usize, rest: &str) -> (Name, String) {
    let (name, after) = match rest.split_once('{') {
        Some((name, after)) => (name.trim(), after),
        None => panic!("macro definition must open a brace: {rest}"),
    };
    let body = collect_brace_body(lines, cursor, after);
    (name.into(), body)
}

/// `( body )` / `{ body }` after a `!`, possibly spanning lines.
fn parse_call_body(lines: &[&str], cursor: &mut usize, after_bang: &str) -> String {
    let after_bang = after_bang.trim().trim_end_matches(';');
    if let Some(inner) = after_bang.strip_prefix('(') {
        *cursor += 1;
        return inner.trim_end_matches(')').trim().to_string();
    }
    if let Some(inner) = after_bang.strip_prefix('{') {
        return collect_brace_body(lines, cursor, inner);
    }
    panic!("macro call must have a ( or {{ body: {after_bang}");
}

/// Collect text until the brace that closes the already-open one. Works on
/// whole lines; the closing line contributes what precedes the brace.
fn collect_brace_body(lines: &[&str], cursor: &mut usize, after_open: &str) -> String {
    let mut depth = 1i32;
    let mut body = String::new();

    let mut consume = |text: &str, body: &mut String| -> bool {
        for (offset, character) in text.char_indices() {
            match character {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        body.push_str(&text[..offset]);
                        return true;
                    }
                }
                _ => {}
            }
        }
        body.push_str(text);
        body.push('\n');
        false
    };

    if consume(after_open, &mut body) {
        *cursor += 1;
        return body.trim().to_string();
    }
    *cursor += 1;
    while *cursor < lines.len() {
        let line = lines[*cursor];
        let closed = consume(line, &mut body);
        *cursor += 1;
        if closed {
            return body.trim().to_string();
        }
    }
    panic!("unclosed macro body");
}

fn parse_attr(attr: &str, attrs: &mut Attrs) {
    if let Some(cfg) = attr.strip_prefix("cfg(") {
        attrs.cfg = Some(parse_cfg(cfg.trim_end_matches(')')));
    } else if attr == "macro_use" {
        attrs.macro_use = true;
    } else if attr == "macro_export" {
        attrs.macro_export = true;
    } else if attr == "macro_export(local_inner_macros)" {
        attrs.macro_export = true;
        attrs.local_inner_macros = true;
    } else if attr == "prelude_import" {
        attrs.prelude_import = true;
    } else if attr == "proc_macro" || attr == "proc_macro_derive" {
        attrs.proc_macro = true;
    } else if let Some(path) = attr.strip_prefix("path = ") {
        attrs.path_attr = Some(path.trim_matches('"').to_string());
    } else if let Some(path) = attr.strip_prefix("path=") {
        attrs.path_attr = Some(path.trim_matches('"').to_string());
    } else {
        panic!("unsupported fixture attribute: #[{attr}]");
    }
}

/// cfg predicate: `a`, `key=value`, `not(..)`, `all(..)`, `any(..)`.
pub fn parse_cfg(text: &str) -> CfgExpr {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("not(").and_then(|t| t.strip_suffix(')')) {
        return CfgExpr::Not(Box::new(parse_cfg(inner)));
    }
    if let Some(inner) = text.strip_prefix("all(").and_then(|t| t.strip_suffix(')')) {
        return CfgExpr::All(split_cfg_list(inner).into_iter().map(|e| parse_cfg(&e)).collect());
    }
    if let Some(inner) = text.strip_prefix("any(").and_then(|t| t.strip_suffix(')')) {
        return CfgExpr::Any(split_cfg_list(inner).into_iter().map(|e| parse_cfg(&e)).collect());
    }
    match text.split_once('=') {
        Some((key, value)) => CfgExpr::KeyValue {
            key: key.trim().into(),
            value: value.trim().trim_matches('"').into(),
        },
        None => CfgExpr::Atom(text.into()),
    }
}

/// Split a cfg argument list on top-level commas.
fn split_cfg_list(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for character in text.chars() {
        match character {
            '(' => {
                depth += 1;
                current.push(character);
            }
            ')' => {
                depth -= 1;
                current.push(character);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(character),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

pub fn split_path(text: &str) -> Vec<Name> {
    if text.is_empty() {
        return vec![Name::from("")];
    }
    if let Some(rest) = text.strip_prefix("::") {
        // leading :: becomes a leading empty segment
        let mut path = vec![Name::from("")];
        path.extend(rest.split("::").map(Name::from));
        return path;
    }
    text.split("::").map(Name::from).collect()
}

pub fn text_hash(text: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Strip a leading visibility token off an item line.
fn parse_visibility(line: &str) -> (RawVisibility, &str) {
    if let Some(rest) = line.strip_prefix("pub(") {
        let close = rest.find(')').unwrap_or_else(|| panic!("unclosed pub(..): {line}"));
        let inner = rest[..close].trim();
        let rest = &rest[close + 1..];
        let visibility = match inner {
            "crate" => RawVisibility::RestrictedCrate,
            "self" => RawVisibility::Private,
            other => {
                let path = other.strip_prefix("in ").unwrap_or(other);
                RawVisibility::restricted(path.trim().split("::").map(Name::from).collect())
            }
        };
        (visibility, rest)
    } else if let Some(rest) = line.strip_prefix("pub ") {
        (RawVisibility::Public, rest)
    } else {
        (RawVisibility::Private, line)
    }
}
