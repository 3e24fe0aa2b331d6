//! Version resolution rules of the plugin catalog.

use std::sync::Arc;

use lattice::plugin::{NodePlugin, PluginCatalog};
use lattice::{CoreError, Node};

struct FakePlugin {
    id: &'static str,
    major: u32,
    minor: u32,
}

impl NodePlugin for FakePlugin {
    fn id(&self) -> &str {
        self.id
    }

    fn label(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> (u32, u32) {
        (self.major, self.minor)
    }

    fn construct(&self, _node: &mut Node) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Catalog with "Blur" registered as 1.0, 2.0, 2.3 and 3.1.
fn blur_catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    for (major, minor) in [(1, 0), (2, 0), (2, 3), (3, 1)] {
        catalog.register(Arc::new(FakePlugin {
            id: "Blur",
            major,
            minor,
        }));
    }
    catalog
}

#[test]
fn latest_major_wins_for_minus_one() {
    let catalog = blur_catalog();
    let resolved = catalog.resolve("Blur", -1, -1).unwrap();
    assert_eq!(resolved.descriptor.major, 3);
    assert_eq!(resolved.descriptor.minor, 1);
}

#[test]
fn latest_minor_under_explicit_major() {
    let catalog = blur_catalog();
    let resolved = catalog.resolve("Blur", 2, -1).unwrap();
    assert_eq!(resolved.descriptor.major, 2);
    assert_eq!(resolved.descriptor.minor, 3);
}

#[test]
fn smallest_minor_at_least_requested() {
    let catalog = blur_catalog();
    let resolved = catalog.resolve("Blur", 2, 1).unwrap();
    assert_eq!(resolved.descriptor.minor, 3);

    let exact = catalog.resolve("Blur", 2, 0).unwrap();
    assert_eq!(exact.descriptor.minor, 0);
}

#[test]
fn minor_with_no_qualifying_registration_fails() {
    let catalog = blur_catalog();
    let err = catalog.resolve("Blur", 2, 4).unwrap_err();
    assert!(matches!(
        err,
        CoreError::PluginVersionNotFound { major: 2, minor: 4, .. }
    ));
}

#[test]
fn unknown_identifier_or_major_fails_with_plugin_not_found() {
    let catalog = blur_catalog();
    assert!(matches!(
        catalog.resolve("Sharpen", -1, -1),
        Err(CoreError::PluginNotFound(_))
    ));
    assert!(matches!(
        catalog.resolve("Blur", 5, -1),
        Err(CoreError::PluginNotFound(_))
    ));
}

#[test]
fn lookup_lists_versions_ascending() {
    let catalog = blur_catalog();
    assert_eq!(
        catalog.lookup("Blur").unwrap(),
        vec![(1, 0), (2, 0), (2, 3), (3, 1)]
    );
    assert!(catalog.lookup("Sharpen").is_none());
}

#[test]
fn legacy_lower_case_retry_is_opt_in() {
    let catalog = blur_catalog();
    assert!(matches!(
        catalog.resolve_with_fallback("blur", -1, -1, false),
        Err(CoreError::PluginNotFound(_))
    ));

    let resolved = catalog.resolve_with_fallback("blur", -1, -1, true).unwrap();
    assert_eq!(resolved.descriptor.id, "Blur");
    assert_eq!(resolved.descriptor.major, 3);
}

#[test]
fn legacy_retry_does_not_mask_unknown_plugins() {
    let catalog = blur_catalog();
    assert!(matches!(
        catalog.resolve_with_fallback("sharpen", -1, -1, true),
        Err(CoreError::PluginNotFound(_))
    ));
}
