// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Recognizers for `style`, `linkStyle`, `class` and `classDef` directive lines, plus the
//! `key:value,key:value` property lists they carry.

use smol_str::SmolStr;

use super::ident::{ident_len, is_ident_char};

/// Ordered CSS-like property list.
pub type Properties = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDirective {
    pub target: SmolStr,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStyleTarget {
    Default,
    Indices(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStyleDirective {
    pub target: LinkStyleTarget,
    pub properties: Properties,
}

impl LinkStyleDirective {
    pub fn indices(&self) -> &[usize] {
        match &self.target {
            LinkStyleTarget::Default => &[],
            LinkStyleTarget::Indices(indices) => indices,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassApplication {
    pub ids: Vec<SmolStr>,
    pub class_name: SmolStr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub names: Vec<SmolStr>,
    pub properties: Properties,
}

fn strip_keyword<'a>(trimmed: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = trimmed.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim())
}

fn split_head(rest: &str) -> (&str, &str) {
    match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    }
}

/// Splits on commas outside parentheses. A segment without `:` continues the previous value,
/// so `fill:rgb(255,0,0)` and `stroke-dasharray:5,5` keep their commas.
pub fn parse_properties(raw: &str) -> Properties {
    let raw = raw.trim().trim_end_matches(';');
    let mut segments = Vec::new();
    let (mut depth, mut start) = (0usize, 0);
    for (idx, ch) in raw.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push(&raw[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&raw[start..]);

    let mut properties = Properties::new();
    for segment in segments {
        match segment.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                properties.push((key.trim().to_owned(), value.trim().to_owned()));
            }
            Some(_) => {}
            None => {
                if let Some((_, value)) = properties.last_mut() {
                    value.push(',');
                    value.push_str(segment.trim());
                }
            }
        }
    }
    properties
}

pub fn format_properties(properties: &[(String, String)]) -> String {
    let mut out = String::new();
    for (idx, (key, value)) in properties.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push(':');
        out.push_str(value);
    }
    out
}

/// Sets (`Some`) or removes (`None`/empty) one key, keeping the position of existing keys.
pub fn set_property(properties: &mut Properties, key: &str, value: Option<&str>) {
    let value = value.map(str::trim).filter(|value| !value.is_empty());
    match (properties.iter().position(|(k, _)| k == key), value) {
        (Some(idx), Some(value)) => properties[idx].1 = value.to_owned(),
        (Some(idx), None) => {
            properties.remove(idx);
        }
        (None, Some(value)) => properties.push((key.to_owned(), value.to_owned())),
        (None, None) => {}
    }
}

/// `style <id> <props>`
pub fn match_style_directive(line: &str) -> Option<StyleDirective> {
    let rest = strip_keyword(line.trim(), "style")?;
    let (target, props) = split_head(rest);
    if target.is_empty() || ident_len(target, is_ident_char) != target.len() {
        return None;
    }
    Some(StyleDirective { target: target.into(), properties: parse_properties(props) })
}

/// `linkStyle <n[,m...]|default> <props>`
pub fn match_link_style_directive(line: &str) -> Option<LinkStyleDirective> {
    let rest = strip_keyword(line.trim(), "linkStyle")?;
    let (targets, props) = split_head(rest);
    let target = if targets == "default" {
        LinkStyleTarget::Default
    } else {
        let indices = targets
            .split(',')
            .map(|raw| raw.trim().parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()?;
        if indices.is_empty() {
            return None;
        }
        LinkStyleTarget::Indices(indices)
    };
    Some(LinkStyleDirective { target, properties: parse_properties(props) })
}

/// `class <id1,id2,...> <className>`
pub fn match_class_application(line: &str) -> Option<ClassApplication> {
    let rest = strip_keyword(line.trim(), "class")?;
    let (ids_raw, class_name) = split_head(rest);
    if class_name.is_empty() || class_name.contains(char::is_whitespace) {
        return None;
    }
    let ids = ids_raw
        .split(',')
        .map(str::trim)
        .map(|id| (!id.is_empty() && ident_len(id, is_ident_char) == id.len()).then(|| id.into()))
        .collect::<Option<Vec<SmolStr>>>()?;
    Some(ClassApplication { ids, class_name: class_name.into() })
}

/// `classDef <name[,name...]> <props>`
pub fn match_class_def(line: &str) -> Option<ClassDef> {
    let rest = strip_keyword(line.trim(), "classDef")?;
    let (names, props) = split_head(rest);
    let names = names.split(',').map(|name| SmolStr::new(name.trim())).collect::<Vec<_>>();
    if names.iter().any(SmolStr::is_empty) {
        return None;
    }
    Some(ClassDef { names, properties: parse_properties(props) })
}

pub fn format_style_directive(indent: &str, target: &str, properties: &[(String, String)]) -> String {
    format!("{indent}style {target} {}", format_properties(properties))
}

pub fn format_link_style_directive(
    indent: &str,
    indices: &[usize],
    properties: &[(String, String)],
) -> String {
    let mut buffer = itoa::Buffer::new();
    let targets = indices.iter().map(|idx| buffer.format(*idx).to_owned()).collect::<Vec<_>>();
    format!("{indent}linkStyle {} {}", targets.join(","), format_properties(properties))
}

pub fn format_class_def(indent: &str, name: &str, properties: &[(String, String)]) -> String {
    format!("{indent}classDef {name} {}", format_properties(properties))
}

pub fn format_class_application(indent: &str, ids: &[SmolStr], class_name: &str) -> String {
    let ids = ids.iter().map(SmolStr::as_str).collect::<Vec<_>>();
    format!("{indent}class {} {class_name}", ids.join(","))
}
