//! Platform paths

use std::path::PathBuf;

const SERVICE: &str = "prizecraft";

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references in a path string
pub fn expand_path(path: &str) -> PathBuf {
    let with_home = if path == "~" {
        home_dir().display().to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest).display().to_string()
    } else {
        path.to_string()
    };

    let mut out = String::with_capacity(with_home.len());
    let mut chars = with_home.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }
        if braced && chars.peek() == Some(&'}') {
            chars.next();
        }
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&name).unwrap_or_default());
        }
    }
    PathBuf::from(out)
}

/// Config directory
///
/// - macOS: `~/Library/Application Support/PrizeCraft`
/// - Linux: `$XDG_CONFIG_HOME/prizecraft` or `~/.config/prizecraft`
/// - Windows: `%APPDATA%\PrizeCraft`
pub fn default_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home_dir().join("Library").join("Application Support").join("PrizeCraft")
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".config"))
            .join(SERVICE)
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join("AppData").join("Roaming"))
            .join("PrizeCraft")
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        home_dir().join(format!(".{}", SERVICE))
    }
}

/// Data directory (store state files)
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".local").join("share"))
            .join(SERVICE)
    }
    #[cfg(not(target_os = "linux"))]
    {
        default_config_dir()
    }
}

/// Keystore directory
pub fn default_keystore_dir() -> PathBuf {
    default_data_dir().join("keys")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_plain_path() {
        assert_eq!(expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_path("~/keys/a.key");
        assert!(expanded.ends_with("keys/a.key"));
        assert!(!expanded.display().to_string().starts_with('~'));
    }

    #[test]
    fn test_expand_env_var() {
        std::env::set_var("PRIZECRAFT_TEST_DIR", "/var/prize");
        assert_eq!(expand_path("$PRIZECRAFT_TEST_DIR/a"), PathBuf::from("/var/prize/a"));
        assert_eq!(expand_path("${PRIZECRAFT_TEST_DIR}/b"), PathBuf::from("/var/prize/b"));
    }

    #[test]
    fn test_lone_dollar_kept() {
        assert_eq!(expand_path("/tmp/$"), PathBuf::from("/tmp/$"));
    }

    #[test]
    fn test_keystore_under_data_dir() {
        assert!(default_keystore_dir().starts_with(default_data_dir()));
    }
}
