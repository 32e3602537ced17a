//! XDG Base Directory paths for the attainment tools.
//!
//! The CLI uses XDG paths on every platform, the way gh and kubectl do,
//! rather than platform-native locations.

use std::path::PathBuf;

const APP_DIR: &str = "attainment";

/// File name of the default catalog database.
pub const DATABASE_FILE: &str = "attainment.db";

/// Get the attainment config directory.
///
/// Returns `$XDG_CONFIG_HOME/attainment` if set, otherwise
/// `~/.config/attainment`.
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Get the attainment data directory.
///
/// Returns `$XDG_DATA_HOME/attainment` if set, otherwise
/// `~/.local/share/attainment`. The catalog database lives here unless
/// configured otherwise.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// Default location of the catalog database.
///
/// # Examples
///
/// ```
/// use attainment_paths::default_database_path;
///
/// let db = default_database_path();
/// assert!(db.ends_with("attainment/attainment.db"));
/// ```
pub fn default_database_path() -> PathBuf {
    data_dir().join(DATABASE_FILE)
}

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    if let Ok(base) = std::env::var(var) {
        PathBuf::from(base).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(home_relative).join(APP_DIR)
    } else {
        PathBuf::from(home_relative).join(APP_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn config_dir_ends_with_app_dir() {
        assert!(config_dir().ends_with("attainment"));
    }

    #[test]
    #[serial]
    fn config_dir_respects_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
        }
        let path = config_dir();
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
        assert_eq!(path, PathBuf::from("/tmp/test-config/attainment"));
    }

    #[test]
    #[serial]
    fn database_path_lives_in_data_dir() {
        unsafe {
            std::env::set_var("XDG_DATA_HOME", "/tmp/test-data");
        }
        let path = default_database_path();
        unsafe {
            std::env::remove_var("XDG_DATA_HOME");
        }
        assert_eq!(path, PathBuf::from("/tmp/test-data/attainment/attainment.db"));
    }
}
