//! Packaging manifests (PKGBUILD and RPM spec files).
//!
//! A [`ManifestDocument`] is an immutable value. Every edit returns a new
//! document and leaves every byte outside the targeted field alone, so the
//! result can be inspected (dry run) before it is written anywhere.

pub mod patch;

use anyhow::{bail, Context, Result};
use regex::{NoExpand, Regex};
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;

pub use patch::{patch, transform, PatchOptions, PatchOutcome};

/// Checksum arrays cleared together with `source` in a PKGBUILD.
const ARCH_CHECKSUM_FIELDS: &[&str] = &[
    "md5sums",
    "sha1sums",
    "sha224sums",
    "sha256sums",
    "sha384sums",
    "sha512sums",
    "b2sums",
    "cksums",
];

/// RPM tags holding dependency lists.
const RPM_DEPENDENCY_TAGS: &[&str] = &["BuildRequires", "Requires"];

/// Manifest dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// makepkg `PKGBUILD`
    Arch,
    /// rpmbuild `.spec`
    Rpm,
}

impl ManifestFormat {
    /// Infer the dialect from a file name.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name == "PKGBUILD" {
            Some(ManifestFormat::Arch)
        } else if name.ends_with(".spec") {
            Some(ManifestFormat::Rpm)
        } else {
            None
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestFormat::Arch => write!(f, "PKGBUILD"),
            ManifestFormat::Rpm => write!(f, "RPM spec"),
        }
    }
}

/// A packaging manifest held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    format: ManifestFormat,
    text: String,
}

impl ManifestDocument {
    pub fn new(format: ManifestFormat, text: impl Into<String>) -> Self {
        Self {
            format,
            text: text.into(),
        }
    }

    /// Read a manifest, inferring its format from the file name.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_or(path, None)
    }

    /// Like [`ManifestDocument::load`], using `fallback` when the file name
    /// is not recognized.
    pub fn load_or(path: &Path, fallback: Option<ManifestFormat>) -> Result<Self> {
        let Some(format) = ManifestFormat::detect(path).or(fallback) else {
            bail!(
                "Unrecognized manifest {} (expected PKGBUILD or *.spec)",
                path.display()
            );
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Ok(Self::new(format, text))
    }

    pub fn format(&self) -> ManifestFormat {
        self.format
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current value of the version field.
    pub fn version(&self) -> Option<&str> {
        let re = match self.format {
            ManifestFormat::Arch => Regex::new(r"(?m)^pkgver=(.*)$"),
            ManifestFormat::Rpm => Regex::new(r"(?m)^Version:[ \t]*(.*)$"),
        }
        .ok()?;
        re.captures(&self.text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }

    /// True if a line binds the version field to exactly `version`.
    pub fn has_version(&self, version: &str) -> bool {
        let escaped = regex::escape(version);
        let pattern = match self.format {
            ManifestFormat::Arch => format!(r"(?m)^pkgver={}[ \t]*$", escaped),
            ManifestFormat::Rpm => format!(r"(?m)^Version:[ \t]*{}[ \t]*$", escaped),
        };
        Regex::new(&pattern)
            .map(|re| re.is_match(&self.text))
            .unwrap_or(false)
    }

    /// Rebind the version field. Documents without a version field are
    /// returned unchanged.
    pub fn with_version(&self, version: &str) -> Self {
        let text = match self.format {
            ManifestFormat::Arch => {
                let re = Regex::new(r"(?m)^pkgver=.*$").expect("valid pkgver regex");
                re.replace_all(&self.text, NoExpand(&format!("pkgver={}", version)))
                    .into_owned()
            }
            ManifestFormat::Rpm => {
                let re = Regex::new(r"(?m)^(Version:[ \t]*).*$").expect("valid Version regex");
                re.replace_all(&self.text, |caps: &regex::Captures| {
                    format!("{}{}", &caps[1], version)
                })
                .into_owned()
            }
        };
        Self::new(self.format, text)
    }

    /// Remove every occurrence of `token` from the dependency lists.
    ///
    /// Spellings are stripped in order (quoted, double-quoted, bare for a
    /// PKGBUILD; versioned, bare for a spec file), so a versioned entry goes
    /// whole before the bare name is considered. Passes repeat until nothing
    /// changes, which keeps the edit idempotent when spellings are mixed.
    pub fn without_dependency(&self, token: &str) -> Self {
        let text = match self.format {
            ManifestFormat::Arch => strip_arch_dependency(&self.text, token),
            ManifestFormat::Rpm => strip_rpm_dependency(&self.text, token),
        };
        Self::new(self.format, text)
    }

    /// Clear the source and checksum lists.
    ///
    /// PKGBUILD arrays become `()`. Spec files lose their `SourceN:` tags,
    /// which is rpmbuild's equivalent of an empty source list.
    pub fn without_sources(&self) -> Self {
        let text = match self.format {
            ManifestFormat::Arch => {
                let mut text = rewrite_arrays(&self.text, "source", |_| String::new());
                for field in ARCH_CHECKSUM_FIELDS {
                    text = rewrite_arrays(&text, field, |_| String::new());
                }
                text
            }
            ManifestFormat::Rpm => {
                let re = Regex::new(r"(?m)^Source[0-9]*:.*(\n|$)").expect("valid Source regex");
                re.replace_all(&self.text, "").into_owned()
            }
        };
        Self::new(self.format, text)
    }
}

// =============================================================================
// PKGBUILD arrays
// =============================================================================

/// Byte range of the body of every `field=( ... )` array, in order.
fn array_bodies(text: &str, field: &str) -> Vec<Range<usize>> {
    let pattern = format!(r"(?m)^[ \t]*{}=\(", regex::escape(field));
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    let mut bodies = Vec::new();
    let mut search_from = 0;
    while let Some(m) = re.find_at(text, search_from) {
        let body_start = m.end();
        match closing_paren(text, body_start) {
            Some(body_end) => {
                bodies.push(body_start..body_end);
                search_from = body_end;
            }
            None => break,
        }
    }
    bodies
}

/// Index of the `)` closing an array body that starts at `from`.
fn closing_paren(text: &str, from: usize) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    let mut in_comment = false;
    let mut prev = '(';

    for (offset, c) in text[from..].char_indices() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
        } else if in_single {
            in_single = c != '\'';
        } else if in_double {
            in_double = !(c == '"' && prev != '\\');
        } else {
            match c {
                '\'' => in_single = true,
                '"' => in_double = true,
                '#' if prev.is_whitespace() || prev == '(' => in_comment = true,
                ')' => return Some(from + offset),
                _ => {}
            }
        }
        prev = c;
    }
    None
}

fn rewrite_arrays(text: &str, field: &str, rewrite: impl Fn(&str) -> String) -> String {
    let bodies = array_bodies(text, field);
    if bodies.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for body in bodies {
        out.push_str(&text[cursor..body.start]);
        out.push_str(&rewrite(&text[body.clone()]));
        cursor = body.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn strip_arch_dependency(text: &str, token: &str) -> String {
    let escaped = regex::escape(token);
    let variants = [
        format!(r"'{}(?:[<>=][^']*)?'", escaped),
        format!(r#""{}(?:[<>=][^"]*)?""#, escaped),
        format!(r"{}(?:[<>=][^\s)]*)?", escaped),
    ];
    strip_until_stable(text, &variants, strip_arch_variant)
}

fn strip_arch_variant(text: &str, re: &Regex) -> String {
    let is_separator = |c: char| c.is_whitespace();
    rewrite_arrays(text, "depends", |body| {
        let ranges = bounded_matches(body, re, is_separator)
            .into_iter()
            .map(|m| deletion_range(body, m))
            .collect::<Vec<_>>();
        if ranges.is_empty() {
            return body.to_string();
        }
        let stripped = delete_ranges(body, &ranges);
        if stripped.trim().is_empty() {
            String::new()
        } else {
            stripped
        }
    })
}

/// Apply `strip` once per spelling, in precedence order, and repeat until a
/// full pass changes nothing.
fn strip_until_stable(
    text: &str,
    variants: &[String],
    strip: impl Fn(&str, &Regex) -> String,
) -> String {
    let patterns: Vec<Regex> = variants.iter().filter_map(|v| Regex::new(v).ok()).collect();
    let mut current = text.to_string();
    loop {
        let next = patterns.iter().fold(current.clone(), |acc, re| strip(&acc, re));
        if next == current {
            return current;
        }
        current = next;
    }
}

// =============================================================================
// RPM dependency tags
// =============================================================================

fn strip_rpm_dependency(text: &str, token: &str) -> String {
    let escaped = regex::escape(token);
    let variants = [
        format!(r"{}\s*[<>=]+\s*[^\s,]+", escaped),
        escaped.clone(),
    ];
    strip_until_stable(text, &variants, strip_rpm_variant)
}

fn strip_rpm_variant(text: &str, re: &Regex) -> String {
    let tags = RPM_DEPENDENCY_TAGS.join("|");
    let line_re = Regex::new(&format!(r"^((?:{})(?:\([^)]*\))?:[ \t]*)(.*)$", tags))
        .expect("valid dependency tag regex");
    let is_separator = |c: char| c.is_whitespace() || c == ',';

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };
        let Some(caps) = line_re.captures(content) else {
            out.push_str(line);
            continue;
        };
        let value = &caps[2];
        let hits = bounded_matches(value, re, is_separator);
        if hits.is_empty() {
            out.push_str(line);
            continue;
        }
        let remaining = tidy_rpm_list(&delete_ranges(value, &hits));
        if !remaining.is_empty() {
            out.push_str(&caps[1]);
            out.push_str(&remaining);
            out.push_str(newline);
        }
    }
    out
}

fn tidy_rpm_list(value: &str) -> String {
    let commas = Regex::new(r"\s*,[\s,]*").expect("valid comma regex");
    let collapsed = commas.replace_all(value, ", ");
    collapsed
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Token matching helpers
// =============================================================================

/// Matches of `re` in `haystack` that are delimited by separators or the
/// ends of the haystack, so `wine` never matches inside `wine-mono`.
fn bounded_matches(
    haystack: &str,
    re: &Regex,
    is_separator: impl Fn(char) -> bool,
) -> Vec<Range<usize>> {
    re.find_iter(haystack)
        .filter(|m| {
            let before = haystack[..m.start()].chars().next_back();
            let after = haystack[m.end()..].chars().next();
            before.map_or(true, &is_separator) && after.map_or(true, &is_separator)
        })
        .map(|m| m.range())
        .collect()
}

/// Widen a match so removing it leaves no stray blank line or double space.
fn deletion_range(body: &str, m: Range<usize>) -> Range<usize> {
    let line_start = body[..m.start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = body[m.end..].find('\n').map_or(body.len(), |i| m.end + i);
    let before = &body[line_start..m.start];
    let after = &body[m.end..line_end];
    let multiline = line_start > 0 || line_end < body.len();

    if multiline && before.trim().is_empty() && after.trim().is_empty() {
        if line_end < body.len() {
            return line_start..line_end + 1;
        }
        return line_start.saturating_sub(1)..line_end;
    }

    let ws_before = before.len() - before.trim_end_matches([' ', '\t']).len();
    if ws_before > 0 {
        return m.start - ws_before..m.end;
    }
    let ws_after = after.len() - after.trim_start_matches([' ', '\t']).len();
    m.start..m.end + ws_after
}

fn delete_ranges(text: &str, ranges: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..range.start]);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}
