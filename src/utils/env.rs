//! Environment variable utilities with platform-specific behavior.

/// Expand an environment variable placeholder (`${VAR_NAME}`).
///
/// Values that are not exactly one placeholder are returned unchanged, as is
/// a placeholder whose variable is unset.
///
/// # Platform Behavior
/// - **Windows**: Case-insensitive (e.g., `%USERNAME%` == `%username%`)
/// - **Linux/macOS**: Case-sensitive (e.g., `$USER` != `$user`)
pub fn expand_env_var(value: &str) -> String {
    if !value.starts_with("${") || !value.ends_with('}') {
        return value.to_string();
    }

    let var_name = &value[2..value.len() - 1];

    #[cfg(windows)]
    {
        std::env::vars()
            .find(|(k, _)| k.eq_ignore_ascii_case(var_name))
            .map(|(_, v)| v)
            .unwrap_or_else(|| value.to_string())
    }

    #[cfg(not(windows))]
    {
        std::env::var(var_name).unwrap_or_else(|_| value.to_string())
    }
}

/// Read a non-empty environment variable.
pub fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
