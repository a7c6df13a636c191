use pakt_core::{InstallManager, InstallOptions, resolve_on_disk};
use pakt_error::PackageManagerError;
use pakt_hoist::LinkingStrategy;
use pakt_lock::Lockfile;
use pakt_project::{DependencyType, read_package_json};
use pakt_registry::{MemoryIndex, PublishSpec};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
    store: PathBuf,
}

impl Workspace {
    fn new(manifest: &str) -> Self {
        let ws = Self::without_root_project();
        fs::write(ws.root.join("package.json"), manifest).unwrap();
        ws
    }

    fn without_root_project() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        let root = base.join("ws");
        fs::create_dir_all(&root).unwrap();
        Self {
            _dir: dir,
            root,
            store: base.join("store"),
        }
    }

    fn project(&self, rel: &str, manifest: &str) -> PathBuf {
        let dir = self.root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), manifest).unwrap();
        dir
    }

    fn options(&self) -> InstallOptions {
        InstallOptions {
            store_dir: Some(self.store.clone()),
            ..InstallOptions::new(&self.root)
        }
    }

    fn manager(&self, index: &Arc<MemoryIndex>) -> InstallManager<Arc<MemoryIndex>> {
        InstallManager::with_index(self.options(), Arc::clone(index))
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join("pakt-lock.json")
    }

    fn lockfile(&self) -> Lockfile {
        Lockfile::read_from(&self.lock_path()).unwrap().unwrap()
    }

    fn dependency(&self, name: &str) -> Option<String> {
        read_package_json(&self.root)
            .unwrap()
            .field(DependencyType::Dependencies)
            .and_then(|deps| deps.get(name).cloned())
    }
}

fn version_at(dir: &Path) -> String {
    let manifest = read_package_json(dir).unwrap();
    manifest.version.unwrap()
}

/// Version the runtime would load for `name` from `from`.
fn loaded(from: &Path, name: &str) -> Option<String> {
    resolve_on_disk(from, name).map(|dir| version_at(&dir))
}

fn registry() -> Arc<MemoryIndex> {
    let index = MemoryIndex::new();
    index.publish(PublishSpec::new("a", "1.0.0").dep("c", "^1.0.0")).unwrap();
    index.publish(PublishSpec::new("b", "1.0.0").dep("c", "^2.0.0")).unwrap();
    index.publish(PublishSpec::new("c", "1.0.0")).unwrap();
    index
        .publish(PublishSpec::new("c", "2.0.0").bin("c", "bin/c.js"))
        .unwrap();
    index.publish(PublishSpec::new("d", "1.0.0")).unwrap();
    Arc::new(index)
}

const AB: &str = r#"{"name":"app","dependencies":{"a":"^1.0.0","b":"^1.0.0"}}"#;

#[tokio::test]
async fn identical_inputs_write_identical_lockfiles() {
    let index = registry();
    let first = Workspace::new(AB);
    let second = Workspace::new(AB);

    let report = first.manager(&index).install().await.unwrap();
    assert!(report.lockfile_written);
    second.manager(&index).install().await.unwrap();

    let a = fs::read(first.lock_path()).unwrap();
    let b = fs::read(second.lock_path()).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn reinstalling_an_unchanged_workspace_writes_nothing() {
    let index = registry();
    let ws = Workspace::new(AB);
    ws.manager(&index).install().await.unwrap();
    let metadata_requests = index.metadata_requests();

    let again = ws.manager(&index).install().await.unwrap();
    assert_eq!(again.link.writes(), 0);
    assert!(!again.lockfile_written);
    assert_eq!(again.extracted, 0);
    assert_eq!(index.metadata_requests(), metadata_requests);
}

#[tokio::test]
async fn both_layouts_load_the_same_versions() {
    let index = registry();
    for strategy in [LinkingStrategy::Hoisted, LinkingStrategy::Isolated] {
        let ws = Workspace::new(AB);
        let options = InstallOptions {
            strategy: Some(strategy),
            ..ws.options()
        };
        InstallManager::with_index(options, Arc::clone(&index))
            .install()
            .await
            .unwrap();

        let a = resolve_on_disk(&ws.root, "a").unwrap();
        let b = resolve_on_disk(&ws.root, "b").unwrap();
        assert_eq!(version_at(&a), "1.0.0", "{strategy}");
        assert_eq!(loaded(&a, "c").as_deref(), Some("1.0.0"), "{strategy}");
        assert_eq!(loaded(&b, "c").as_deref(), Some("2.0.0"), "{strategy}");
    }
}

#[tokio::test]
async fn shared_packages_are_extracted_once() {
    let index = registry();
    let ws = Workspace::new(r#"{"name":"root","dependencies":{"c":"^1.0.0"}}"#);
    ws.project("packages/app", r#"{"name":"app","dependencies":{"c":"^1.0.0"}}"#);
    let options = InstallOptions {
        project_roots: vec![".".into(), "packages/app".into()],
        ..ws.options()
    };

    let report = InstallManager::with_index(options, Arc::clone(&index))
        .install()
        .await
        .unwrap();
    assert_eq!(report.installed, 1);
    assert_eq!(report.extracted, 1);
    assert_eq!(index.tarball_requests(), 1);
    assert_eq!(loaded(&ws.root.join("packages/app"), "c").as_deref(), Some("1.0.0"));

    // A second workspace sharing the store reuses the entry.
    let other = Workspace::new(r#"{"dependencies":{"c":"^1.0.0"}}"#);
    let options = InstallOptions {
        store_dir: Some(ws.store.clone()),
        ..other.options()
    };
    let report = InstallManager::with_index(options, Arc::clone(&index))
        .install()
        .await
        .unwrap();
    assert_eq!(report.extracted, 0);
    assert_eq!(index.tarball_requests(), 1);
}

#[tokio::test]
async fn workspace_projects_link_to_each_other() {
    let index = registry();
    let ws = Workspace::new(r#"{"name":"root","private":true}"#);
    let app = ws.project(
        "packages/app",
        r#"{"name":"app","dependencies":{"lib":"workspace:*"}}"#,
    );
    ws.project("packages/lib", r#"{"name":"lib","version":"0.3.0","dependencies":{"d":"1.0.0"}}"#);
    let options = InstallOptions {
        project_roots: vec![".".into(), "packages/app".into(), "packages/lib".into()],
        ..ws.options()
    };
    InstallManager::with_index(options, Arc::clone(&index))
        .install()
        .await
        .unwrap();

    let lib = resolve_on_disk(&app, "lib").unwrap();
    assert_eq!(lib, ws.root.join("packages/lib"));
    assert_eq!(loaded(&lib, "d").as_deref(), Some("1.0.0"));

    let lockfile = ws.lockfile();
    let entry = lockfile
        .importers
        .get("packages/app")
        .and_then(|importer| importer.dependencies.get("lib"))
        .unwrap();
    assert_eq!(entry.version.as_deref(), Some("link:packages/lib"));
}

#[tokio::test]
async fn projects_without_a_root_project_hoist_into_the_workspace_root() {
    let index = MemoryIndex::new();
    index.publish(PublishSpec::new("bar", "100.0.0")).unwrap();
    index
        .publish(PublishSpec::new("foobarqar", "1.0.0").dep("bar", "100.0.0"))
        .unwrap();
    index.publish(PublishSpec::new("is-negative", "1.0.0")).unwrap();
    let index = Arc::new(index);
    let ws = Workspace::without_root_project();
    let project_1 = ws.project(
        "project-1",
        r#"{"name":"project-1","version":"1.0.0","dependencies":{"bar":"100.0.0"}}"#,
    );
    ws.project(
        "project-2",
        r#"{"name":"project-2","version":"1.0.0","dependencies":{"foobarqar":"1.0.0"}}"#,
    );
    let options = || InstallOptions {
        strategy: Some(LinkingStrategy::Hoisted),
        project_roots: vec![PathBuf::from("project-1"), PathBuf::from("project-2")],
        target_project: Some(PathBuf::from("project-1")),
        ..ws.options()
    };

    InstallManager::with_index(options(), Arc::clone(&index))
        .install()
        .await
        .unwrap();
    let modules = ws.root.join("node_modules");
    assert_eq!(version_at(&modules.join("bar")), "100.0.0");
    assert_eq!(version_at(&modules.join("foobarqar")), "1.0.0");
    assert!(!project_1.join("node_modules/bar").exists());

    InstallManager::with_index(
        InstallOptions {
            dependency_type: DependencyType::DevDependencies,
            ..options()
        },
        Arc::clone(&index),
    )
    .add(&["is-negative@1.0.0".to_string()])
    .await
    .unwrap();

    let manifest = read_package_json(&project_1).unwrap();
    let field = |field| {
        manifest
            .field(field)
            .map(|deps| deps.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>())
    };
    assert_eq!(
        field(DependencyType::Dependencies),
        Some(vec![("bar".to_string(), "100.0.0".to_string())])
    );
    assert_eq!(
        field(DependencyType::DevDependencies),
        Some(vec![("is-negative".to_string(), "1.0.0".to_string())])
    );
    assert_eq!(version_at(&modules.join("bar")), "100.0.0");
    assert_eq!(version_at(&modules.join("is-negative")), "1.0.0");
    assert_eq!(loaded(&project_1, "is-negative").as_deref(), Some("1.0.0"));
    assert!(ws.lock_path().exists());
}

#[tokio::test]
async fn merged_optional_dependencies_keep_the_layout_across_installs() {
    let index = MemoryIndex::new();
    index
        .publish(
            PublishSpec::new("p", "1.0.0")
                .dep("a", "1.0.0")
                .dep("b", "1.0.0")
                .optional_dep("a", "1.0.0"),
        )
        .unwrap();
    index.publish(PublishSpec::new("a", "1.0.0").dep("x", "1.0.0")).unwrap();
    index.publish(PublishSpec::new("b", "1.0.0").dep("x", "2.0.0")).unwrap();
    index.publish(PublishSpec::new("x", "1.0.0")).unwrap();
    index.publish(PublishSpec::new("x", "2.0.0")).unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(r#"{"dependencies":{"p":"1.0.0"}}"#);
    let hoisted = || InstallOptions {
        strategy: Some(LinkingStrategy::Hoisted),
        ..ws.options()
    };

    InstallManager::with_index(hoisted(), Arc::clone(&index))
        .install()
        .await
        .unwrap();
    let top = ws.root.join("node_modules/x");
    let first = version_at(&top);
    let lockfile = fs::read(ws.lock_path()).unwrap();

    let report = InstallManager::with_index(hoisted(), Arc::clone(&index))
        .install()
        .await
        .unwrap();
    assert_eq!(version_at(&top), first);
    assert_eq!(first, "1.0.0");
    assert!(!report.link.state_written);
    assert_eq!(fs::read(ws.lock_path()).unwrap(), lockfile);
}

#[tokio::test]
async fn updating_one_package_keeps_its_siblings_locked() {
    let index = MemoryIndex::new();
    index
        .publish(PublishSpec::new("foobarqar", "1.0.0").dep("bar", "^1.0.0").dep("qar", "^1.0.0"))
        .unwrap();
    index.publish(PublishSpec::new("bar", "1.0.0")).unwrap();
    index.publish(PublishSpec::new("qar", "1.0.0")).unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(r#"{"dependencies":{"foobarqar":"^1.0.0"}}"#);
    ws.manager(&index).install().await.unwrap();

    index.publish(PublishSpec::new("bar", "1.1.0")).unwrap();
    index.publish(PublishSpec::new("qar", "1.1.0")).unwrap();

    // The lockfile keeps a plain install on the locked versions.
    ws.manager(&index).install().await.unwrap();
    let foobarqar = resolve_on_disk(&ws.root, "foobarqar").unwrap();
    assert_eq!(loaded(&foobarqar, "bar").as_deref(), Some("1.0.0"));

    ws.manager(&index)
        .update(&["bar".to_string()], false)
        .await
        .unwrap();
    assert_eq!(loaded(&foobarqar, "bar").as_deref(), Some("1.1.0"));
    assert_eq!(loaded(&foobarqar, "qar").as_deref(), Some("1.0.0"));

    let lockfile = ws.lockfile();
    assert!(lockfile.packages.contains_key(&Lockfile::package_key("bar", "1.1.0")));
    assert!(!lockfile.packages.contains_key(&Lockfile::package_key("bar", "1.0.0")));
    assert!(lockfile.packages.contains_key(&Lockfile::package_key("qar", "1.0.0")));
}

#[tokio::test]
async fn updating_a_package_leaves_unrelated_constraints_alone() {
    let index = MemoryIndex::new();
    index
        .publish(PublishSpec::new("foobarqar", "1.0.0").dep("bar", "100.0.0"))
        .unwrap();
    index.publish(PublishSpec::new("bar", "100.0.0")).unwrap();
    index.publish(PublishSpec::new("bar", "100.1.0")).unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(r#"{"dependencies":{"foobarqar":"1.0.0","bar":"100.1.0"}}"#);
    let hoisted = || InstallOptions {
        strategy: Some(LinkingStrategy::Hoisted),
        ..ws.options()
    };
    InstallManager::with_index(hoisted(), Arc::clone(&index))
        .install()
        .await
        .unwrap();

    index
        .publish(PublishSpec::new("foobarqar", "1.0.1").dep("bar", "100.0.0"))
        .unwrap();
    InstallManager::with_index(hoisted(), Arc::clone(&index))
        .update(&["foobarqar".to_string()], true)
        .await
        .unwrap();

    let modules = ws.root.join("node_modules");
    assert_eq!(version_at(&modules.join("foobarqar")), "1.0.1");
    assert_eq!(version_at(&modules.join("bar")), "100.1.0");
    assert_eq!(
        version_at(&modules.join("foobarqar/node_modules/bar")),
        "100.0.0"
    );
    assert_eq!(ws.dependency("bar").as_deref(), Some("100.1.0"));
    assert_eq!(ws.dependency("foobarqar").as_deref(), Some("^1.0.1"));
}

#[tokio::test]
async fn an_alias_and_its_real_name_share_one_store_entry() {
    let index = MemoryIndex::new();
    index
        .publish(
            PublishSpec::new("pkg-with-1-aliased-dep", "100.0.0")
                .dep("dep", "npm:dep-of-pkg-with-1-dep@^100.0.0"),
        )
        .unwrap();
    index
        .publish(PublishSpec::new("dep-of-pkg-with-1-dep", "100.0.0"))
        .unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(
        r#"{"dependencies":{"pkg-with-1-aliased-dep":"100.0.0","dep-of-pkg-with-1-dep":"^100.0.0"}}"#,
    );
    let options = InstallOptions {
        strategy: Some(LinkingStrategy::Hoisted),
        ..ws.options()
    };
    let report = InstallManager::with_index(options, Arc::clone(&index))
        .install()
        .await
        .unwrap();

    let modules = ws.root.join("node_modules");
    assert_eq!(version_at(&modules.join("dep")), "100.0.0");
    assert_eq!(version_at(&modules.join("dep-of-pkg-with-1-dep")), "100.0.0");
    let aliased = resolve_on_disk(&modules.join("pkg-with-1-aliased-dep"), "dep").unwrap();
    assert_eq!(aliased, modules.join("dep"));
    assert_eq!(report.installed, 2);
    assert_eq!(report.extracted, 2);
    assert_eq!(index.tarball_requests(), 2);
}

#[tokio::test]
async fn aliased_and_plain_versions_coexist() {
    let index = registry();
    let ws = Workspace::new(r#"{"dependencies":{"c":"^2.0.0","old-c":"npm:c@^1.0.0"}}"#);
    ws.manager(&index).install().await.unwrap();

    assert_eq!(loaded(&ws.root, "c").as_deref(), Some("2.0.0"));
    assert_eq!(loaded(&ws.root, "old-c").as_deref(), Some("1.0.0"));

    let lockfile = ws.lockfile();
    let root = lockfile.importers.get(".").unwrap();
    let old = root.dependencies.get("old-c").unwrap();
    assert_eq!(old.specifier, "npm:c@^1.0.0");
    assert_eq!(old.version.as_deref(), Some("c@1.0.0"));
    assert_eq!(
        root.dependencies.get("c").and_then(|dep| dep.version.as_deref()),
        Some("2.0.0")
    );
}

#[tokio::test]
async fn unmet_peers_are_reported_as_warnings() {
    let index = MemoryIndex::new();
    index
        .publish(
            PublishSpec::new("plugin", "1.0.0")
                .peer("host", "^2.0.0")
                .optional_peer("extras", "^1.0.0"),
        )
        .unwrap();
    index.publish(PublishSpec::new("host", "1.0.0")).unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(r#"{"dependencies":{"plugin":"1.0.0","host":"1.0.0"}}"#);

    let report = ws.manager(&index).install().await.unwrap();

    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    let warning = report.warnings.first().unwrap();
    assert!(warning.contains("host@^2.0.0"));
    assert!(warning.contains("host@1.0.0 is installed"));
    assert!(ws.root.join("node_modules/plugin").exists());
}

#[tokio::test]
async fn frozen_installs_reject_stale_lockfiles() {
    let index = registry();
    let ws = Workspace::new(r#"{"dependencies":{"a":"^1.0.0"}}"#);
    let frozen = |ws: &Workspace| InstallOptions {
        frozen_lockfile: true,
        ..ws.options()
    };

    let err = InstallManager::with_index(frozen(&ws), Arc::clone(&index))
        .install()
        .await
        .unwrap_err();
    assert!(matches!(err, PackageManagerError::LockfileDivergence(_)));
    assert!(!ws.root.join("node_modules").exists());

    ws.manager(&index).install().await.unwrap();
    let locked = fs::read(ws.lock_path()).unwrap();
    let metadata_requests = index.metadata_requests();

    fs::remove_dir_all(ws.root.join("node_modules")).unwrap();
    InstallManager::with_index(frozen(&ws), Arc::clone(&index))
        .install()
        .await
        .unwrap();
    assert_eq!(index.metadata_requests(), metadata_requests);
    assert_eq!(loaded(&ws.root, "a").as_deref(), Some("1.0.0"));

    fs::write(
        ws.root.join("package.json"),
        r#"{"dependencies":{"a":"^1.0.0","d":"^1.0.0"}}"#,
    )
    .unwrap();
    let err = InstallManager::with_index(frozen(&ws), Arc::clone(&index))
        .install()
        .await
        .unwrap_err();
    match err {
        PackageManagerError::LockfileDivergence(reasons) => {
            assert!(reasons.iter().any(|reason| reason.contains("'d'")), "{reasons:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read(ws.lock_path()).unwrap(), locked);
    assert!(!ws.root.join("node_modules/d").exists());
}

#[tokio::test]
async fn frozen_mutations_report_the_divergence() {
    let index = registry();
    let ws = Workspace::new(r#"{"dependencies":{"a":"^1.0.0"}}"#);
    ws.manager(&index).install().await.unwrap();
    let manifest = fs::read(ws.root.join("package.json")).unwrap();
    let locked = fs::read(ws.lock_path()).unwrap();
    let frozen = || {
        InstallManager::with_index(
            InstallOptions {
                frozen_lockfile: true,
                ..ws.options()
            },
            Arc::clone(&index),
        )
    };

    let reasons = |err: PackageManagerError| match err {
        PackageManagerError::LockfileDivergence(reasons) => reasons,
        other => panic!("unexpected error: {other}"),
    };
    let added = reasons(frozen().add(&["d".to_string()]).await.unwrap_err());
    assert!(added.iter().any(|r| r.contains("adds 'd'")), "{added:?}");
    let removed = reasons(frozen().remove(&["a".to_string()]).await.unwrap_err());
    assert!(removed.iter().any(|r| r.contains("removes 'a'")), "{removed:?}");
    let updated = reasons(frozen().update(&["c".to_string()], false).await.unwrap_err());
    assert!(updated.iter().any(|r| r.contains("'c'")), "{updated:?}");

    assert_eq!(fs::read(ws.root.join("package.json")).unwrap(), manifest);
    assert_eq!(fs::read(ws.lock_path()).unwrap(), locked);
    assert!(!ws.root.join("node_modules/d").exists());
}

#[tokio::test]
async fn platform_mismatches_follow_engine_strictness() {
    let index = MemoryIndex::new();
    index
        .publish(PublishSpec::new("native", "1.0.0").os(&["nonexistent-os"]))
        .unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(r#"{"dependencies":{"native":"1.0.0"}}"#);

    let err = InstallManager::with_index(
        InstallOptions {
            engine_strict: Some(true),
            ..ws.options()
        },
        Arc::clone(&index),
    )
    .install()
    .await
    .unwrap_err();
    assert!(matches!(err, PackageManagerError::EngineIncompatible(ref id, _) if id == "native@1.0.0"));
    assert!(!ws.root.join("node_modules").exists());
    assert!(!ws.store.exists());
    assert!(!ws.lock_path().exists());

    let report = InstallManager::with_index(
        InstallOptions {
            engine_strict: Some(false),
            ..ws.options()
        },
        Arc::clone(&index),
    )
    .install()
    .await
    .unwrap();
    assert!(report.warnings.iter().any(|w| w.contains("native@1.0.0")));
    assert!(ws.root.join("node_modules/native").exists());
    assert!(ws.lock_path().exists());
}

#[tokio::test]
async fn strict_engines_fail_before_touching_the_disk() {
    let index = MemoryIndex::new();
    index
        .publish(PublishSpec::new("modern", "1.0.0").engine("node", ">=20"))
        .unwrap();
    let index = Arc::new(index);
    let ws = Workspace::new(r#"{"dependencies":{"modern":"^1.0.0"}}"#);

    let strict = InstallOptions {
        engine_strict: Some(true),
        node_version: Some("18.0.0".to_string()),
        ..ws.options()
    };
    let err = InstallManager::with_index(strict, Arc::clone(&index))
        .install()
        .await
        .unwrap_err();
    assert!(matches!(err, PackageManagerError::EngineIncompatible(..)));
    assert!(!ws.root.join("node_modules").exists());
    assert!(!ws.lock_path().exists());
    assert!(!ws.store.exists());
    assert_eq!(index.tarball_requests(), 0);

    let lenient = InstallOptions {
        node_version: Some("v18.0.0".to_string()),
        ..ws.options()
    };
    let report = InstallManager::with_index(lenient, Arc::clone(&index))
        .install()
        .await
        .unwrap();
    assert!(report.warnings.iter().any(|warning| warning.contains("modern")));
    assert_eq!(loaded(&ws.root, "modern").as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn add_saves_resolved_specifiers() {
    let index = registry();
    let ws = Workspace::new(r#"{"name":"app"}"#);

    ws.manager(&index).add(&["c".to_string()]).await.unwrap();
    assert_eq!(ws.dependency("c").as_deref(), Some("^2.0.0"));
    assert_eq!(loaded(&ws.root, "c").as_deref(), Some("2.0.0"));

    ws.manager(&index)
        .add(&["old-c@npm:c".to_string(), "a@~1.0.0".to_string()])
        .await
        .unwrap();
    assert_eq!(ws.dependency("old-c").as_deref(), Some("npm:c@^2.0.0"));
    assert_eq!(ws.dependency("a").as_deref(), Some("~1.0.0"));

    let exact = InstallOptions {
        save_exact: Some(true),
        dependency_type: DependencyType::DevDependencies,
        ..ws.options()
    };
    InstallManager::with_index(exact, Arc::clone(&index))
        .add(&["d".to_string()])
        .await
        .unwrap();
    let manifest = read_package_json(&ws.root).unwrap();
    let dev = manifest.field(DependencyType::DevDependencies).unwrap();
    assert_eq!(dev.get("d").map(String::as_str), Some("1.0.0"));

    let lockfile = ws.lockfile();
    let root = lockfile.importers.get(".").unwrap();
    assert_eq!(
        root.dependencies.get("c").map(|dep| dep.specifier.as_str()),
        Some("^2.0.0")
    );
}

#[tokio::test]
async fn add_rejects_invalid_names() {
    let index = registry();
    let ws = Workspace::new(r#"{"name":"app"}"#);
    let err = ws
        .manager(&index)
        .add(&["../evil".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, PackageManagerError::InvalidPackageSpec(_)));
    assert_eq!(ws.dependency("../evil"), None);
}

#[tokio::test]
async fn remove_drops_the_package_everywhere() {
    let index = registry();
    let ws = Workspace::new(AB);
    ws.manager(&index).install().await.unwrap();

    ws.manager(&index).remove(&["b".to_string()]).await.unwrap();
    assert_eq!(ws.dependency("b"), None);
    assert!(!ws.root.join("node_modules/b").exists());
    let lockfile = ws.lockfile();
    assert!(!lockfile.packages.contains_key(&Lockfile::package_key("b", "1.0.0")));
    assert!(!lockfile.packages.contains_key(&Lockfile::package_key("c", "2.0.0")));

    let err = ws
        .manager(&index)
        .remove(&["missing".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, PackageManagerError::PackageJsonError(_)));
}

#[tokio::test]
async fn production_installs_skip_dev_dependencies() {
    let index = registry();
    let ws = Workspace::new(
        r#"{"dependencies":{"a":"^1.0.0"},"devDependencies":{"d":"^1.0.0"}}"#,
    );
    let options = InstallOptions {
        production: true,
        ..ws.options()
    };
    let report = InstallManager::with_index(options, Arc::clone(&index))
        .install()
        .await
        .unwrap();

    assert_eq!(report.installed, 2);
    assert!(!ws.root.join("node_modules/d").exists());
    assert_eq!(loaded(&ws.root, "a").as_deref(), Some("1.0.0"));
    let lockfile = ws.lockfile();
    assert!(lockfile.packages.contains_key(&Lockfile::package_key("d", "1.0.0")));
}

#[tokio::test]
async fn update_latest_moves_past_the_saved_range() {
    let index = registry();
    let ws = Workspace::new(r#"{"dependencies":{"c":"^1.0.0"}}"#);
    ws.manager(&index).install().await.unwrap();

    ws.manager(&index)
        .update(&["c".to_string()], true)
        .await
        .unwrap();
    assert_eq!(ws.dependency("c").as_deref(), Some("^2.0.0"));
    assert_eq!(loaded(&ws.root, "c").as_deref(), Some("2.0.0"));
}

#[tokio::test]
async fn disabling_the_lockfile_leaves_none_behind() {
    let index = registry();
    let ws = Workspace::new(AB);
    let options = InstallOptions {
        use_lockfile: false,
        ..ws.options()
    };
    let report = InstallManager::with_index(options, Arc::clone(&index))
        .install()
        .await
        .unwrap();
    assert!(!report.lockfile_written);
    assert!(!ws.lock_path().exists());
    assert_eq!(loaded(&ws.root, "b").as_deref(), Some("1.0.0"));
}
