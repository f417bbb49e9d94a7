//! Test utilities for property-based testing
//!
//! This module provides generators and helpers for proptest.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Directory name usable for a source tree
    pub fn dir_name() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,15}"
    }

    /// Board name as found under `boards/<arch>/<soc>/`
    pub fn board_name() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9_-]{0,24}"
    }

    /// Defconfig name; `=` and `:` must survive the descriptor format
    pub fn defconfig_name() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9_=:.-]{0,20}"
    }

    /// Kconfig symbol without the `CONFIG_` prefix
    pub fn kconfig_symbol() -> impl Strategy<Value = String> {
        "[A-Z][A-Z0-9_]{0,30}"
    }

    /// Printable single-line string value, quotes and backslashes included
    pub fn kconfig_string() -> impl Strategy<Value = String> {
        "[ -~]{0,40}"
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_dir_name_generator(name in dir_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(!name.contains('/'));
        }

        #[test]
        fn test_kconfig_symbol_generator(symbol in kconfig_symbol()) {
            prop_assert!(crate::core::kconfig::normalize_key(&symbol).is_ok());
        }

        #[test]
        fn test_kconfig_string_generator(value in kconfig_string()) {
            prop_assert!(!value.contains('\n'));
        }
    }
}
