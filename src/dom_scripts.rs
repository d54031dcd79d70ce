//! Page-context helper script embedding.
//!
//! The live-page surface installs a small helper bundle into each document it
//! drives. Keeping the script in its own `.js` file allows editors to offer
//! proper syntax highlighting while still bundling it as a string at compile
//! time.

/// Embedded contents of `scripts/surface_helpers.js`.
pub const SURFACE_HELPERS_SCRIPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/surface_helpers.js"
));

/// Return the embedded helper bundle.
pub fn surface_helpers_script() -> &'static str {
    SURFACE_HELPERS_SCRIPT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_script_is_non_empty() {
        assert!(!SURFACE_HELPERS_SCRIPT.trim().is_empty());
    }

    #[test]
    fn embedded_script_exposes_expected_entry_points() {
        for marker in [
            "queryAllDeep",
            "drainMutations",
            "window.__askrunner",
            "getClientRects",
            "state.epoch",
        ] {
            assert!(
                SURFACE_HELPERS_SCRIPT.contains(marker),
                "helper bundle should expose {marker}"
            );
        }
    }
}
