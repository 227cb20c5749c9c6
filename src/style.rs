//! Style provider – the static utility CSS sheet inlined into every
//! assembled document.
//!
//! The sheet is compiled into the binary and shared read-only for the
//! process lifetime; it is the only state concurrent requests share. The
//! class vocabulary is a small Tailwind-like utility set (spacing,
//! typography, flex, table, background) that the fixed templates and most
//! dynamic templates style themselves with.

/// The full utility CSS text.
pub const UTILITY_CSS: &str = include_str!("../assets/utility.css");

/// Accessor used by the pipeline; returns the shared sheet.
pub fn utility_css() -> &'static str {
    UTILITY_CSS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_is_not_empty() {
        assert!(UTILITY_CSS.len() > 500);
    }

    #[test]
    fn core_utility_classes_are_defined() {
        for class in [
            ".p-6", ".p-2", ".mb-4", ".mt-6", ".flex", ".justify-between",
            ".font-bold", ".italic", ".text-3xl", ".text-sm", ".text-right",
            ".text-gray-500", ".bg-gray-100", ".bg-gray-200", ".w-full",
        ] {
            assert!(
                UTILITY_CSS.contains(class),
                "utility sheet should define `{class}`"
            );
        }
    }
}
