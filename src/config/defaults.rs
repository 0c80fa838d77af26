//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    pub fn name() -> String {
        "lancer".into()
    }

    pub fn locales() -> Vec<String> {
        vec!["en".into()]
    }
}

// ============================================================================
// [paths] Section Defaults
// ============================================================================

pub mod paths {
    use std::path::PathBuf;

    pub fn client() -> PathBuf {
        "client".into()
    }

    pub fn files() -> PathBuf {
        "files".into()
    }

    pub fn r#static() -> PathBuf {
        "static".into()
    }

    pub fn build() -> PathBuf {
        "build".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5400
    }

    pub fn workers() -> usize {
        4
    }
}

// ============================================================================
// [bundle] Section Defaults
// ============================================================================

pub mod bundle {
    use std::path::PathBuf;

    pub fn script() -> Vec<String> {
        vec!["esbuild".into(), "--bundle".into()]
    }

    pub fn style() -> Vec<String> {
        vec!["tailwindcss".into(), "-i".into()]
    }

    pub fn style_config() -> PathBuf {
        "tailwind.config.js".into()
    }
}
