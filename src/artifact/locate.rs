//! Finding the package a build produced.
//!
//! Roots are searched in order; inside a root, patterns are tried in order
//! against file names; the first hit ends the search. If nothing matches,
//! the whole workspace is scanned as a last resort.

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::Artifact;
use crate::format::PackageFormat;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// Where and how to look for a package.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    /// Directories searched recursively, in priority order.
    pub roots: Vec<PathBuf>,
    /// File-name globs, in priority order.
    pub patterns: Vec<String>,
    /// Scanned with `patterns` if no root yields a match.
    pub fallback_root: Option<PathBuf>,
    /// Project whose already published packages (`<project>-<version>.<ext>`)
    /// are never candidates.
    pub skip_published: Option<String>,
}

impl SearchPlan {
    /// Standard plan: exact project-named pattern, then any package of the
    /// format, across `roots`, then the workspace.
    pub fn for_project(
        project: &str,
        format: PackageFormat,
        roots: Vec<PathBuf>,
        workspace: &Path,
    ) -> Self {
        let ext = format.extension();
        Self {
            roots: dedup(roots),
            patterns: vec![format!("{}-[0-9]*.{}", project, ext), format!("*.{}", ext)],
            fallback_root: Some(workspace.to_path_buf()),
            skip_published: None,
        }
    }

    /// Ignore packages an earlier run published for `project`.
    pub fn skipping_published(mut self, project: &str) -> Self {
        self.skip_published = Some(project.to_string());
        self
    }

    /// Every root/pattern combination in the order it is tried.
    pub fn describe(&self) -> Vec<String> {
        let mut attempts = Vec::new();
        for root in &self.roots {
            for pattern in &self.patterns {
                attempts.push(format!("{}/**/{}", root.display(), pattern));
            }
        }
        if let Some(root) = &self.fallback_root {
            for pattern in &self.patterns {
                attempts.push(format!("{}/**/{} (workspace scan)", root.display(), pattern));
            }
        }
        attempts
    }
}

/// First artifact matching `patterns` under `search_roots`, in priority order.
pub fn find(search_roots: &[PathBuf], patterns: &[String]) -> Option<Artifact> {
    find_skipping(search_roots, patterns, None)
}

fn find_skipping(
    search_roots: &[PathBuf],
    patterns: &[String],
    skip_published: Option<&str>,
) -> Option<Artifact> {
    let matchers = compile(patterns);
    for root in search_roots {
        if !root.is_dir() {
            debug!("Search root {} does not exist", root.display());
            continue;
        }
        for (pattern, matcher) in &matchers {
            if let Some(artifact) = first_match(root, matcher, skip_published) {
                debug!(
                    "Matched {} with '{}' under {}",
                    artifact.path.display(),
                    pattern,
                    root.display()
                );
                return Some(artifact);
            }
        }
    }
    None
}

/// Run a [`SearchPlan`], including the last-resort workspace scan.
pub fn locate(plan: &SearchPlan) -> Option<Artifact> {
    let skip = plan.skip_published.as_deref();
    if let Some(artifact) = find_skipping(&plan.roots, &plan.patterns, skip) {
        return Some(artifact);
    }
    let root = plan.fallback_root.as_ref()?;
    let found = find_skipping(std::slice::from_ref(root), &plan.patterns, skip);
    if let Some(artifact) = &found {
        warn!(
            "Artifact found only by workspace scan: {}",
            artifact.path.display()
        );
    }
    found
}

/// Bounded recursive listing of `root` for failure reports.
pub fn list_tree(root: &Path, max_depth: usize, max_entries: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));

    for entry in walker.flatten() {
        if lines.len() == max_entries {
            lines.push(format!("... (truncated after {} entries)", max_entries));
            break;
        }
        let indent = "  ".repeat(entry.depth());
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        lines.push(format!(
            "{}{}{}",
            indent,
            entry.file_name().to_string_lossy(),
            suffix
        ));
    }
    lines
}

fn compile(patterns: &[String]) -> Vec<(String, GlobMatcher)> {
    patterns
        .iter()
        .filter_map(|p| match Glob::new(p) {
            Ok(glob) => Some((p.clone(), glob.compile_matcher())),
            Err(e) => {
                warn!("Ignoring invalid artifact pattern '{}': {}", p, e);
                None
            }
        })
        .collect()
}

fn first_match(
    root: &Path,
    matcher: &GlobMatcher,
    skip_published: Option<&str>,
) -> Option<Artifact> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter(|e| matcher.is_match(e.file_name()))
        .filter_map(|e| Artifact::from_path(e.path()))
        .find(|artifact| match skip_published {
            Some(project) if is_published(artifact, project) => {
                debug!("Skipping published package {}", artifact.path.display());
                false
            }
            _ => true,
        })
}

/// True for `<project>-<version>.<ext>` with no release or architecture
/// part, the shape [`super::publish`] gives its output.
fn is_published(artifact: &Artifact, project: &str) -> bool {
    let (Some(name), Some(ext)) = (artifact.file_name(), artifact.extension_chain()) else {
        return false;
    };
    name.strip_prefix(project)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(ext))
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|version| !version.is_empty() && !version.contains('-'))
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn dedup(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut unique: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if !unique.contains(&root) {
            unique.push(root);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"pkg").unwrap();
    }

    fn patterns() -> Vec<String> {
        vec![
            "winetricks-[0-9]*.pkg.tar.zst".to_string(),
            "*.pkg.tar.zst".to_string(),
        ]
    }

    #[test]
    fn test_project_pattern_beats_generic_within_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a-debug-1.0-1-x86_64.pkg.tar.zst"));
        touch(&dir.path().join("nested/winetricks-1.0-1-x86_64.pkg.tar.zst"));

        let found = find(&[dir.path().to_path_buf()], &patterns()).unwrap();
        assert!(found.path.ends_with("nested/winetricks-1.0-1-x86_64.pkg.tar.zst"));
    }

    #[test]
    fn test_debug_package_is_not_project_match() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("winetricks-debug-1.0-1-x86_64.pkg.tar.zst"));
        touch(&dir.path().join("winetricks-1.0-1-x86_64.pkg.tar.zst"));

        let found = find(&[dir.path().to_path_buf()], &patterns()).unwrap();
        assert_eq!(found.file_name(), Some("winetricks-1.0-1-x86_64.pkg.tar.zst"));
    }

    #[test]
    fn test_earlier_root_wins_over_better_pattern() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(&first.path().join("other-2.0-1-x86_64.pkg.tar.zst"));
        touch(&second.path().join("winetricks-1.0-1-x86_64.pkg.tar.zst"));

        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let found = find(&roots, &patterns()).unwrap();
        assert!(found.path.starts_with(first.path()));
    }

    #[test]
    fn test_vcs_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(".git/objects/winetricks-1.0-1-x86_64.pkg.tar.zst"));
        assert!(find(&[dir.path().to_path_buf()], &patterns()).is_none());
    }

    #[test]
    fn test_missing_roots_are_ignored() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("winetricks-1.0-1-x86_64.pkg.tar.zst"));
        let roots = vec![dir.path().join("absent"), dir.path().to_path_buf()];
        assert!(find(&roots, &patterns()).is_some());
    }

    #[test]
    fn test_published_packages_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("winetricks-1.0.pkg.tar.zst"));
        touch(&dir.path().join("winetricks-2.3.1-1-x86_64.pkg.tar.zst"));

        let plan = SearchPlan::for_project(
            "winetricks",
            PackageFormat::Arch,
            vec![dir.path().to_path_buf()],
            dir.path(),
        );
        let unfiltered = locate(&plan).unwrap();
        assert_eq!(unfiltered.file_name(), Some("winetricks-1.0.pkg.tar.zst"));

        let found = locate(&plan.skipping_published("winetricks")).unwrap();
        assert_eq!(found.file_name(), Some("winetricks-2.3.1-1-x86_64.pkg.tar.zst"));
    }

    #[test]
    fn test_only_published_package_is_not_found() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("winetricks-1.0.rpm"));
        let plan = SearchPlan::for_project(
            "winetricks",
            PackageFormat::Rpm,
            vec![dir.path().to_path_buf()],
            dir.path(),
        )
        .skipping_published("winetricks");
        assert!(locate(&plan).is_none());
    }

    #[test]
    fn test_locate_falls_back_to_workspace() {
        let workspace = TempDir::new().unwrap();
        touch(&workspace.path().join("deep/tree/winetricks-1.0-1-x86_64.pkg.tar.zst"));
        let plan = SearchPlan::for_project(
            "winetricks",
            PackageFormat::Arch,
            vec![workspace.path().join("out")],
            workspace.path(),
        );
        assert!(locate(&plan).is_some());
    }

    #[test]
    fn test_describe_lists_every_attempt() {
        let plan = SearchPlan::for_project(
            "winetricks",
            PackageFormat::Rpm,
            vec![PathBuf::from("/out"), PathBuf::from("/out"), PathBuf::from("/ws/dist")],
            Path::new("/ws"),
        );
        let attempts = plan.describe();
        assert_eq!(plan.roots.len(), 2);
        assert_eq!(attempts.len(), 6);
        assert_eq!(attempts[0], "/out/**/winetricks-[0-9]*.rpm");
        assert!(attempts[5].ends_with("(workspace scan)"));
    }

    #[test]
    fn test_list_tree_is_bounded() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            touch(&dir.path().join(format!("f{}", i)));
        }
        touch(&dir.path().join("a/b/c/d/too-deep"));

        let lines = list_tree(dir.path(), 2, 5);
        assert_eq!(lines.len(), 6);
        assert!(lines[5].contains("truncated"));
        assert!(!lines.iter().any(|l| l.contains("too-deep")));
    }
}
