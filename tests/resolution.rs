// tests/resolution.rs

//! End-to-end resolution scenarios: version selection, constraint
//! conflicts, concurrent coexistence, cycles, trimming, and cross-linking.

use registrar::{
    Extension, ExtensionPoint, PluginDescriptor, PluginRegistry, PluginVersion, Prerequisite,
    RegistryResolver,
};

fn plugin(id: &str, version: &str) -> PluginDescriptor {
    PluginDescriptor::new(id, id, version)
}

fn registry(plugins: Vec<PluginDescriptor>) -> PluginRegistry {
    let mut reg = PluginRegistry::new();
    for pd in plugins {
        reg.add_plugin(pd);
    }
    reg
}

fn codes(status: &registrar::ResolveStatus) -> Vec<&'static str> {
    status.diagnostics().iter().map(|d| d.code()).collect()
}

/// Every enabled plugin's prerequisites must be satisfied by exactly one
/// enabled descriptor whose version the annotation reports.
fn assert_prerequisites_consistent(reg: &PluginRegistry) {
    for pd in reg.plugins() {
        if !pd.enabled {
            continue;
        }
        for prq in &pd.requires {
            let Some(target) = prq.plugin.as_deref() else {
                continue;
            };
            let required = prq.version.as_deref().map(PluginVersion::parse_lenient);
            let matching: Vec<&PluginDescriptor> = reg
                .plugins()
                .iter()
                .filter(|cand| cand.enabled && cand.id.as_deref() == Some(target))
                .filter(|cand| match (&required, prq.exact) {
                    (None, _) => true,
                    (Some(v), true) => cand.version_id().is_equivalent_to(v),
                    (Some(v), false) => cand.version_id().is_compatible_with(v),
                })
                .collect();
            assert_eq!(
                matching.len(),
                1,
                "prerequisite {:?} of {:?} must have exactly one enabled satisfier",
                target,
                pd.id
            );
            assert_eq!(
                prq.resolved_version.as_deref().map(PluginVersion::parse_lenient),
                Some(matching[0].version_id()),
                "resolved_version must name the chosen descriptor"
            );
        }
    }
}

#[test]
fn linear_chain_resolves_to_latest() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b")]),
        plugin("b", "1.0.0"),
        plugin("b", "2.0.0"),
    ]);
    let status = RegistryResolver::new().resolve(&mut reg);

    assert!(status.is_ok(), "unexpected diagnostics: {}", status);
    assert!(reg.plugin_at("b", "2.0.0").is_some());
    assert!(reg.plugin_at("b", "1.0.0").is_none(), "stale version trimmed");
    assert_eq!(
        reg.plugin("a").unwrap().requires[0].resolved_version.as_deref(),
        Some("2.0.0")
    );
    assert_prerequisites_consistent(&reg);
}

#[test]
fn exact_mismatch_disables_requirer() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b").with_exact_version("2.0.0")]),
        plugin("b", "1.0.0"),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    assert!(codes(&status).contains(&"parse.unsatisfiedPrereq"));
    assert!(!reg.plugin("a").unwrap().enabled);
    // b was demoted from the root set by a's requirement, so with no
    // surviving constraint it resolves to nothing
    assert!(!reg.plugin("b").unwrap().enabled);
}

#[test]
fn library_versions_coexist_under_disjoint_pins() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("c").with_exact_version("1.0.0")]),
        plugin("b", "1.0.0").with_requires(vec![Prerequisite::new("c").with_exact_version("2.0.0")]),
        plugin("c", "1.0.0"),
        plugin("c", "2.0.0"),
    ]);
    let status = RegistryResolver::new().resolve(&mut reg);

    assert!(status.is_ok(), "unexpected diagnostics: {}", status);
    assert!(reg.plugin_at("c", "1.0.0").is_some_and(|pd| pd.enabled));
    assert!(reg.plugin_at("c", "2.0.0").is_some_and(|pd| pd.enabled));
    assert_eq!(
        reg.plugin("a").unwrap().requires[0].resolved_version.as_deref(),
        Some("1.0.0")
    );
    assert_eq!(
        reg.plugin("b").unwrap().requires[0].resolved_version.as_deref(),
        Some("2.0.0")
    );

    // concurrently enabled versions never publish an extension surface
    for pd in reg.plugins().iter().filter(|pd| pd.id.as_deref() == Some("c")) {
        assert!(pd.extensions.is_empty() && pd.extension_points.is_empty());
    }
    assert_prerequisites_consistent(&reg);
}

#[test]
fn concurrency_refused_when_winner_has_extension_surface() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("c").with_exact_version("1.0.0")]),
        plugin("b", "1.0.0").with_requires(vec![Prerequisite::new("c").with_exact_version("2.0.0")]),
        plugin("c", "1.0.0").with_extension_points(vec![ExtensionPoint::new("hooks", "Hooks")]),
        plugin("c", "2.0.0"),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    assert!(codes(&status).contains(&"parse.unsatisfiedPrereq"));
    // a's pin arrived first; b's could not be accommodated
    assert!(reg.plugin("a").unwrap().enabled);
    assert!(!reg.plugin("b").unwrap().enabled);
    assert!(reg.plugin_at("c", "1.0.0").is_some_and(|pd| pd.enabled));
    assert!(reg.plugin_at("c", "2.0.0").is_some_and(|pd| !pd.enabled));
    assert_eq!(
        reg.plugin("a").unwrap().requires[0].resolved_version.as_deref(),
        Some("1.0.0")
    );
}

#[test]
fn prerequisite_loop_disables_cycle_members() {
    let mut reg = registry(vec![
        plugin("app", "1.0.0").with_requires(vec![Prerequisite::new("a")]),
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b")]),
        plugin("b", "1.0.0").with_requires(vec![Prerequisite::new("a")]),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    let loop_count = status.with_code("parse.prereqLoop").count();
    assert_eq!(loop_count, 1, "exactly one loop diagnostic: {}", status);
    assert!(!reg.plugin("a").unwrap().enabled);
    assert!(!reg.plugin("b").unwrap().enabled);
    assert!(!reg.plugin("app").unwrap().enabled, "root above the cycle falls too");
    assert!(!status.is_ok());
}

#[test]
fn mutual_requirement_leaves_no_roots() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b")]),
        plugin("b", "1.0.0").with_requires(vec![Prerequisite::new("a")]),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    assert_eq!(codes(&status), vec!["plugin.unableToResolve"]);
}

#[test]
fn missing_prerequisite_reported_and_requirer_disabled() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("ghost")]),
        plugin("b", "1.0.0"),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    assert!(codes(&status).contains(&"parse.prereqDisabled"));
    assert!(!reg.plugin("a").unwrap().enabled);
    assert!(reg.plugin("b").unwrap().enabled);
}

#[test]
fn resolve_is_idempotent() {
    let build = || {
        registry(vec![
            plugin("a", "1.0.0").with_requires(vec![
                Prerequisite::new("b").with_version("1.0.0"),
                Prerequisite::new("c"),
            ]),
            plugin("b", "1.0.0"),
            plugin("b", "1.2.0"),
            plugin("c", "3.0.0"),
        ])
    };
    let resolver = RegistryResolver::new();

    let mut once = build();
    assert!(resolver.resolve(&mut once).is_ok());

    let mut twice = build();
    assert!(resolver.resolve(&mut twice).is_ok());
    let second = resolver.resolve(&mut twice);
    assert!(second.is_ok());

    let left = serde_json::to_value(&once).expect("serializable");
    let right = serde_json::to_value(&twice).expect("serializable");
    assert_eq!(left, right, "re-resolving must not change the registry");
    assert_prerequisites_consistent(&once);
}

#[test]
fn trim_toggle_returns_to_default_behavior() {
    let build = || {
        registry(vec![
            plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b")]),
            plugin("b", "1.0.0"),
            plugin("b", "2.0.0"),
        ])
    };

    let mut toggled = build();
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    resolver.set_trim_plugins(true);
    resolver.resolve(&mut toggled);

    let mut plain = build();
    RegistryResolver::new().resolve(&mut plain);

    assert_eq!(
        serde_json::to_value(&toggled).unwrap(),
        serde_json::to_value(&plain).unwrap()
    );
}

#[test]
fn trim_disabled_keeps_stale_versions() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b")]),
        plugin("b", "1.0.0"),
        plugin("b", "2.0.0"),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    assert!(status.is_ok(), "unexpected diagnostics: {}", status);
    assert_eq!(reg.plugins().len(), 3);
    assert!(reg.plugin_at("b", "1.0.0").is_some_and(|pd| !pd.enabled));
    assert!(reg.plugin_at("b", "2.0.0").is_some_and(|pd| pd.enabled));
}

#[test]
fn extensions_cross_link_to_their_points() {
    let mut reg = registry(vec![
        plugin("ui", "1.0.0")
            .with_requires(vec![Prerequisite::new("core")])
            .with_extensions(vec![Extension::new("core.services").with_id("ui-service")]),
        plugin("core", "2.1.0")
            .with_extension_points(vec![ExtensionPoint::new("services", "Service Registry")]),
    ]);
    let status = RegistryResolver::new().resolve(&mut reg);

    assert!(status.is_ok(), "unexpected diagnostics: {}", status);
    let core = reg.plugin("core").unwrap();
    let point = core.extension_point("services").unwrap();
    assert_eq!(point.extensions.len(), 1);

    let attached = &point.extensions[0];
    assert_eq!(attached.plugin_id, "ui");
    assert_eq!(attached.plugin_version, "1.0.0");
    // the handle leads back to an extension that targets this very point
    let host = reg.plugin_at(&attached.plugin_id, &attached.plugin_version).unwrap();
    assert_eq!(
        host.extensions[attached.extension].extension_point.as_deref(),
        Some("core.services")
    );
}

#[test]
fn cross_link_disabled_leaves_points_empty() {
    let mut reg = registry(vec![
        plugin("ui", "1.0.0")
            .with_requires(vec![Prerequisite::new("core")])
            .with_extensions(vec![Extension::new("core.services")]),
        plugin("core", "2.1.0")
            .with_extension_points(vec![ExtensionPoint::new("services", "Service Registry")]),
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_cross_link(false);
    let status = resolver.resolve(&mut reg);

    assert!(status.is_ok());
    let core = reg.plugin("core").unwrap();
    assert!(core.extension_point("services").unwrap().extensions.is_empty());
}

#[test]
fn cross_link_faults_are_reported() {
    let mut broken = plugin("legacy", "1.0.0")
        .with_extension_points(vec![ExtensionPoint::new("spots", "Spots")]);
    broken.name = None; // fails validation, so the plugin ends up disabled

    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_extensions(vec![
            Extension::new("ghost.point"),
            Extension::new("b.missing"),
            Extension::new("dotless"),
            Extension::new("legacy.spots"),
        ]),
        plugin("b", "1.0.0"),
        broken,
    ]);
    let mut resolver = RegistryResolver::new();
    resolver.set_trim_plugins(false);
    let status = resolver.resolve(&mut reg);

    let produced = codes(&status);
    assert_eq!(
        produced
            .iter()
            .filter(|c| **c == "parse.extPointUnknown")
            .count(),
        3,
        "unknown plugin, unknown point id, and dotless target: {}",
        status
    );
    assert!(produced.contains(&"parse.extPointDisabled"));
    assert!(produced.contains(&"parse.pluginMissingAttr"));
    assert_eq!(status.is_ok(), status.diagnostics().is_empty());
}

#[test]
fn host_disabled_version_is_skipped() {
    let mut reg = registry(vec![
        plugin("a", "1.0.0").with_requires(vec![Prerequisite::new("b")]),
        plugin("b", "1.0.0"),
        plugin("b", "2.0.0"),
    ]);
    // the host vetoes b 2.0.0 before resolution
    for pd in reg.plugins_mut() {
        if pd.id.as_deref() == Some("b") && pd.version.as_deref() == Some("2.0.0") {
            pd.enabled = false;
        }
    }
    let status = RegistryResolver::new().resolve(&mut reg);

    assert!(status.is_ok(), "unexpected diagnostics: {}", status);
    assert_eq!(
        reg.plugin("a").unwrap().requires[0].resolved_version.as_deref(),
        Some("1.0.0"),
        "matching only considers enabled descriptors"
    );
    assert!(reg.plugin_at("b", "2.0.0").is_none(), "vetoed version trimmed");
}

#[test]
fn diamond_dependency_resolves_once() {
    let mut reg = registry(vec![
        plugin("app", "1.0.0").with_requires(vec![
            Prerequisite::new("left"),
            Prerequisite::new("right"),
        ]),
        plugin("left", "1.0.0").with_requires(vec![Prerequisite::new("base").with_version("1.0.0")]),
        plugin("right", "1.0.0").with_requires(vec![Prerequisite::new("base").with_version("1.1.0")]),
        plugin("base", "1.0.0"),
        plugin("base", "1.1.0"),
        plugin("base", "1.4.0"),
    ]);
    let status = RegistryResolver::new().resolve(&mut reg);

    assert!(status.is_ok(), "unexpected diagnostics: {}", status);
    // both compatible pins land on the newest 1.x
    assert_eq!(
        reg.plugin("left").unwrap().requires[0].resolved_version.as_deref(),
        Some("1.4.0")
    );
    assert_eq!(
        reg.plugin("right").unwrap().requires[0].resolved_version.as_deref(),
        Some("1.4.0")
    );
    assert_prerequisites_consistent(&reg);
}
