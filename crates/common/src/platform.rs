use std::path::PathBuf;
use tracing::debug;

/// Directory name used under the platform config/data roots
const APP_DIR: &str = "flowmail";

/// Gets the default configuration file path for Flow Mail.
/// - Linux: ~/.config/flowmail/config.toml
/// - macOS: ~/Library/Application Support/flowmail/config.toml
/// - Windows: %APPDATA%/flowmail/config.toml
pub fn get_config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join(APP_DIR).join("config.toml"))
}

/// Gets the default path of the persisted session file.
/// - Linux: ~/.local/share/flowmail/sessions.json
/// - macOS: ~/Library/Application Support/flowmail/sessions.json
/// - Windows: %APPDATA%/flowmail/sessions.json
pub fn get_sessions_path() -> Option<PathBuf> {
    let data_dir = dirs::data_dir()?;
    let path = data_dir.join(APP_DIR).join("sessions.json");
    debug!("Default session storage at {:?}", path);
    Some(path)
}

/// Returns a human-readable string for the current OS.
pub fn get_os_name() -> &'static str {
    #[cfg(target_os = "linux")]
    return "Linux";

    #[cfg(target_os = "macos")]
    return "macOS";

    #[cfg(target_os = "windows")]
    return "Windows";

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "Unknown";
}
