use std::path::{Path, PathBuf};

/// Defaults that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct MemeSettings {
    /// Preferred display face; empty = first available candidate.
    pub font_family: String,
    /// Caption size in CSS pixels
    pub font_size: u32,
    /// Caption fill as a hex string
    pub text_color: String,
    /// Width of the container the surface is fitted into
    pub container_width: u32,
    /// JPEG quality for written files (1-100)
    pub jpeg_quality: u8,
}

impl Default for MemeSettings {
    fn default() -> Self {
        Self {
            font_family: "Impact".to_string(),
            font_size: 40,
            text_color: "#ffffff".to_string(),
            container_width: 500,
            jpeg_quality: 90,
        }
    }
}

impl MemeSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/memefe/memefe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\MemeFE\memefe_settings.cfg
    /// On macOS:   ~/Library/Application Support/MemeFE/memefe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("memefe");
            return Some(config_dir.join("memefe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("MemeFE").join("memefe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("MemeFE")
                    .join("memefe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("memefe_settings.cfg")))
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location. Failures are logged, not returned.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config())
    }

    pub fn to_config(&self) -> String {
        format!(
            "font_family={}\n\
             font_size={}\n\
             text_color={}\n\
             container_width={}\n\
             jpeg_quality={}\n",
            self.font_family,
            self.font_size,
            self.text_color,
            self.container_width,
            self.jpeg_quality,
        )
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values keep the default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "font_family" => {
                    s.font_family = val.to_string();
                }
                "font_size" => {
                    s.font_size = val.parse().ok().filter(|&v| v > 0).unwrap_or(s.font_size);
                }
                "text_color" => {
                    if crate::ops::color::parse_hex_color(val).is_ok() {
                        s.text_color = val.to_string();
                    }
                }
                "container_width" => {
                    s.container_width = val.parse().unwrap_or(s.container_width);
                }
                "jpeg_quality" => {
                    s.jpeg_quality = val
                        .parse::<u8>()
                        .map(|q| q.clamp(1, 100))
                        .unwrap_or(s.jpeg_quality);
                }
                _ => {}
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_text_round_trips() {
        let settings = MemeSettings {
            font_family: "Anton".to_string(),
            font_size: 64,
            text_color: "#ffcc00".to_string(),
            container_width: 720,
            jpeg_quality: 75,
        };
        assert_eq!(MemeSettings::parse(&settings.to_config()), settings);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let parsed = MemeSettings::parse(
            "font_size=0\n\
             text_color=purple\n\
             container_width=wide\n\
             jpeg_quality=300\n\
             mystery=1\n\
             not a pair\n",
        );
        let defaults = MemeSettings::default();
        assert_eq!(parsed.font_size, defaults.font_size);
        assert_eq!(parsed.text_color, defaults.text_color);
        assert_eq!(parsed.container_width, defaults.container_width);
        assert_eq!(parsed.jpeg_quality, defaults.jpeg_quality);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("memefe-no-such-dir").join("nope.cfg");
        assert_eq!(MemeSettings::load_from(&path), MemeSettings::default());
    }
}
