//! Stage-level tests through the public API.
//!
//! Each stage is exercised on its own against files in a temporary
//! workspace.

mod helpers;

use distpack::artifact::{self, Artifact, ArtifactKind, SearchPlan};
use distpack::format::PackageFormat;
use distpack::manifest::{self, ManifestDocument, ManifestFormat, PatchOptions};
use distpack::version::{self, VersionSource, DEFAULT_VERSION};
use helpers::{TestEnv, SAMPLE_PKGBUILD, SAMPLE_SPEC};
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};

// =============================================================================
// Version
// =============================================================================

#[test]
fn test_release_tag_suffix_is_verbatim() {
    let env = TestEnv::new();
    for v in ["1.0", "2.3.1-beta+build.7", "20240101", "v2"] {
        let reference = format!("refs/tags/v{}", v);
        assert_eq!(version::resolve(Some(&reference), &env.path("Cargo.toml")), v);
    }
}

#[test]
fn test_manifest_version_without_release_ref() {
    let env = TestEnv::new();
    assert_eq!(version::resolve(None, &env.path("Cargo.toml")), "2.3.1");
    assert_eq!(
        version::resolve(Some("refs/heads/main"), &env.path("Cargo.toml")),
        "2.3.1"
    );
}

#[test]
fn test_default_version_without_inputs() {
    let env = TestEnv::new();
    fs::write(env.path("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
    assert_eq!(
        version::resolve_with_source(None, &env.path("Cargo.toml")),
        (DEFAULT_VERSION.to_string(), VersionSource::Default)
    );
    assert_eq!(version::resolve(None, &env.path("missing.toml")), "0.1.0");
}

#[test]
#[serial]
fn test_resolution_ignores_process_environment() {
    let env = TestEnv::new();
    std::env::set_var("GITHUB_REF", "refs/tags/v9.9.9");
    let resolved = version::resolve(None, &env.path("Cargo.toml"));
    std::env::remove_var("GITHUB_REF");
    assert_eq!(resolved, "2.3.1");
}

// =============================================================================
// Manifest patch
// =============================================================================

#[test]
fn test_patch_twice_equals_patch_once() {
    let env = TestEnv::with_rpm_spec();
    let options = PatchOptions {
        strip_dependency: Some("wine".to_string()),
        strip_source: true,
        ..Default::default()
    };

    for name in ["PKGBUILD", "winetricks.spec"] {
        let path = env.path(name);
        manifest::patch(&path, "1.2.3", &options).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        let second = manifest::patch(&path, "1.2.3", &options).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), once, "{}", name);
        assert!(!second.changed);
        assert!(second.applied);
    }
}

#[test]
fn test_patch_strips_mixed_spellings_in_one_pass() {
    let env = TestEnv::with_rpm_spec();
    fs::write(
        env.path("PKGBUILD"),
        "pkgver=0.1\ndepends=('wine' wine \"wine>=9\" zenity)\n",
    )
    .unwrap();
    fs::write(
        env.path("winetricks.spec"),
        "Version: 0.1\nRequires: wine >= 8, wine, cabextract\n",
    )
    .unwrap();
    let options = PatchOptions {
        strip_dependency: Some("wine".to_string()),
        ..Default::default()
    };

    for (name, expected) in [
        ("PKGBUILD", "pkgver=1.0\ndepends=(zenity)\n"),
        ("winetricks.spec", "Version: 1.0\nRequires: cabextract\n"),
    ] {
        let path = env.path(name);
        manifest::patch(&path, "1.0", &options).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected, "{}", name);
        let second = manifest::patch(&path, "1.0", &options).unwrap();
        assert!(!second.changed, "{}", name);
    }
}

#[test]
fn test_strip_only_dependency_leaves_other_lines() {
    let env = TestEnv::new();
    let options = PatchOptions {
        strip_dependency: Some("wine".to_string()),
        ..Default::default()
    };
    manifest::patch(&env.path("PKGBUILD"), "0.0.1", &options).unwrap();

    let patched = fs::read_to_string(env.path("PKGBUILD")).unwrap();
    let expected = SAMPLE_PKGBUILD.replace("depends=('wine')\n", "depends=()\n");
    assert_eq!(patched, expected);
}

#[test]
fn test_dry_run_leaves_file_untouched() {
    let env = TestEnv::with_rpm_spec();
    let options = PatchOptions {
        dry_run: true,
        ..Default::default()
    };
    let outcome = manifest::patch(&env.path("winetricks.spec"), "5.0", &options).unwrap();

    assert!(outcome.applied);
    assert!(outcome.changed);
    assert!(outcome.written_to.is_none());
    assert!(outcome.document.text().contains("Version:        5.0\n"));
    assert_eq!(fs::read_to_string(env.path("winetricks.spec")).unwrap(), SAMPLE_SPEC);
}

#[test]
fn test_commit_to_staging_copy() {
    let env = TestEnv::new();
    let staged = env.path("stage/PKGBUILD");
    let options = PatchOptions {
        commit_to: Some(staged.clone()),
        ..Default::default()
    };
    let outcome = manifest::patch(&env.path("PKGBUILD"), "3.0", &options).unwrap();

    assert_eq!(outcome.written_to.as_deref(), Some(staged.as_path()));
    assert!(fs::read_to_string(&staged).unwrap().contains("pkgver=3.0\n"));
    assert_eq!(fs::read_to_string(env.path("PKGBUILD")).unwrap(), SAMPLE_PKGBUILD);
}

#[test]
fn test_missing_version_field_warns_but_succeeds() {
    let env = TestEnv::new();
    fs::write(env.path("PKGBUILD"), "pkgname=x\ndepends=('wine')\n").unwrap();
    let outcome = manifest::patch(&env.path("PKGBUILD"), "1.0", &PatchOptions::default()).unwrap();

    assert!(!outcome.applied);
    assert!(outcome.warnings.iter().any(|w| w.contains("not present")));
}

#[test]
fn test_unknown_dependency_warns() {
    let env = TestEnv::new();
    let options = PatchOptions {
        strip_dependency: Some("zenity".to_string()),
        ..Default::default()
    };
    let outcome = manifest::patch(&env.path("PKGBUILD"), "0.0.1", &options).unwrap();
    assert!(outcome.warnings.iter().any(|w| w.contains("'zenity' not found")));
}

#[test]
fn test_pure_transform_matches_patch() {
    let doc = ManifestDocument::new(ManifestFormat::Arch, SAMPLE_PKGBUILD);
    let options = PatchOptions {
        strip_source: true,
        ..Default::default()
    };
    let transformed = manifest::transform(&doc, "4.0", &options);
    assert_eq!(transformed.version(), Some("4.0"));
    assert_eq!(doc.text(), SAMPLE_PKGBUILD);
}

// =============================================================================
// Locate and publish
// =============================================================================

#[test]
fn test_publish_uses_canonical_name() {
    let env = TestEnv::new();
    let built = env.path("build/foo.pkg.tar.zst");
    fs::create_dir_all(built.parent().unwrap()).unwrap();
    fs::write(&built, b"package").unwrap();
    let artifact = Artifact::from_path(&built).unwrap();

    let published = artifact::publish(&artifact, &env.workspace, "Proj", "1.2.3");
    assert_eq!(published, env.path("Proj-1.2.3.pkg.tar.zst"));
    assert_eq!(published.file_name().unwrap(), "Proj-1.2.3.pkg.tar.zst");
}

#[test]
fn test_locate_prefers_earlier_root() {
    let env = TestEnv::new();
    for rel in ["out/winetricks-1.0-1-x86_64.pkg.tar.zst", "winetricks-0.9-1-x86_64.pkg.tar.zst"] {
        let path = env.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"pkg").unwrap();
    }

    let plan = SearchPlan::for_project(
        "winetricks",
        PackageFormat::Arch,
        vec![env.path("out")],
        &env.workspace,
    );
    let found = artifact::locate(&plan).unwrap();
    assert_eq!(found.path, env.path("out/winetricks-1.0-1-x86_64.pkg.tar.zst"));
    assert_eq!(found.kind, ArtifactKind::ArchPackage);
}

#[test]
fn test_find_returns_none_without_packages() {
    let env = TestEnv::new();
    let roots: Vec<PathBuf> = vec![env.workspace.clone(), Path::new("/nonexistent").to_path_buf()];
    let patterns = vec!["*.rpm".to_string()];
    assert!(artifact::find(&roots, &patterns).is_none());
}
