use std::path::PathBuf;

use image::Rgba;

/// Editor preferences that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Base URL of the project server (`POST {server_url}/api/save_project`)
    pub server_url: String,
    /// Bounding box loaded images are fitted into (downscale only)
    pub max_width: u32,
    pub max_height: u32,

    // Default tool properties for new sessions
    pub brush_size: f32,
    pub opacity: f32,
    pub color: Rgba<u8>,
    pub retouch_intensity: f32,
    pub retouch_softness: u32,

    /// Preferred family for the text tool
    pub font_family: String,
    /// Maximum number of history entries (0 = unbounded)
    pub max_history_steps: usize,
    /// Ask before closing the window with unsaved edits.
    pub confirm_on_exit: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            max_width: 800,
            max_height: 600,
            brush_size: 10.0,
            opacity: 1.0,
            color: Rgba([0, 0, 0, 255]),
            retouch_intensity: 0.5,
            retouch_softness: 3,
            font_family: "Arial".to_string(),
            max_history_steps: 0,
            confirm_on_exit: true,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/photoedit/photoedit_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PhotoEdit\photoedit_settings.cfg
    /// On macOS:   ~/Library/Application Support/PhotoEdit/photoedit_settings.cfg
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("photoedit");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("photoedit_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join(crate::logger::APP_DIR_NAME);
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("photoedit_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(crate::logger::APP_DIR_NAME);
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("photoedit_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("photoedit_settings.cfg")))
        }
    }

    /// Serialize a colour as "r,g,b,a"
    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a colour from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Rgba([r, g, b, a]))
        } else {
            None
        }
    }

    pub fn to_cfg_string(&self) -> String {
        format!(
            "server_url={}\n\
             max_width={}\n\
             max_height={}\n\
             brush_size={}\n\
             opacity={}\n\
             color={}\n\
             retouch_intensity={}\n\
             retouch_softness={}\n\
             font_family={}\n\
             max_history_steps={}\n\
             confirm_on_exit={}\n",
            self.server_url,
            self.max_width,
            self.max_height,
            self.brush_size,
            self.opacity,
            Self::color_to_str(self.color),
            self.retouch_intensity,
            self.retouch_softness,
            self.font_family,
            self.max_history_steps,
            self.confirm_on_exit,
        )
    }

    /// Parse `key=value` lines.  Unknown keys are skipped and malformed
    /// values keep their defaults.
    pub fn parse(content: &str) -> Self {
        let defaults = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "server_url" => {
                    if !val.is_empty() {
                        s.server_url = val.trim_end_matches('/').to_string();
                    }
                }
                "max_width" => {
                    s.max_width = val.parse().ok().filter(|&w| w > 0).unwrap_or(defaults.max_width);
                }
                "max_height" => {
                    s.max_height = val.parse().ok().filter(|&h| h > 0).unwrap_or(defaults.max_height);
                }
                "brush_size" => {
                    s.brush_size = val
                        .parse::<f32>()
                        .ok()
                        .filter(|b| b.is_finite() && *b >= 1.0)
                        .unwrap_or(defaults.brush_size);
                }
                "opacity" => {
                    s.opacity = val
                        .parse::<f32>()
                        .map(|o| o.clamp(0.0, 1.0))
                        .unwrap_or(defaults.opacity);
                }
                "color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.color = c;
                    }
                }
                "retouch_intensity" => {
                    s.retouch_intensity = val
                        .parse::<f32>()
                        .map(|i| i.clamp(0.0, 1.0))
                        .unwrap_or(defaults.retouch_intensity);
                }
                "retouch_softness" => {
                    s.retouch_softness = val.parse().unwrap_or(defaults.retouch_softness);
                }
                "font_family" => {
                    if !val.is_empty() {
                        s.font_family = val.to_string();
                    }
                }
                "max_history_steps" => {
                    s.max_history_steps = val.parse().unwrap_or(defaults.max_history_steps);
                }
                "confirm_on_exit" => {
                    s.confirm_on_exit = val == "true";
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_cfg_string()) {
            crate::log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_settings_load_back() {
        let mut s = AppSettings::default();
        s.server_url = "https://editor.example.org".to_string();
        s.brush_size = 24.0;
        s.color = Rgba([12, 200, 7, 128]);
        s.max_history_steps = 40;
        s.confirm_on_exit = false;
        assert_eq!(AppSettings::parse(&s.to_cfg_string()), s);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let s = AppSettings::parse(
            "max_width=wide\nopacity=7\ncolor=1,2,3\nretouch_softness=-2\nmystery=1\nnot a pair",
        );
        let d = AppSettings::default();
        assert_eq!(s.max_width, d.max_width);
        assert_eq!(s.opacity, 1.0);
        assert_eq!(s.color, d.color);
        assert_eq!(s.retouch_softness, d.retouch_softness);
    }

    #[test]
    fn server_url_loses_trailing_slash() {
        let s = AppSettings::parse("server_url = http://localhost:8080/ ");
        assert_eq!(s.server_url, "http://localhost:8080");
    }
}
