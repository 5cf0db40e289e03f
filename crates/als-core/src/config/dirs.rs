use directories::ProjectDirs;
use std::path::PathBuf;

/// Application directories following XDG spec
#[derive(Debug, Clone)]
pub struct Directories {
    /// Config directory (~/.config/als-correction)
    pub config: PathBuf,

    /// Config file path
    pub config_file: PathBuf,
}

impl Directories {
    /// Standard XDG paths, or `None` when no home directory can be found
    /// (common for daemons started by init).
    #[must_use]
    pub fn new() -> Option<Self> {
        let project = ProjectDirs::from("", "", "als-correction")?;
        Some(Self::with_base(project.config_dir().to_path_buf()))
    }

    #[must_use]
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.json"),
            config: base,
        }
    }

    /// Config file to read when none is given on the command line.
    ///
    /// Uses the XDG location when available, otherwise the system-wide path.
    #[must_use]
    pub fn default_config_file() -> PathBuf {
        Self::new().map_or_else(Self::system_config_file, |dirs| dirs.config_file)
    }

    fn system_config_file() -> PathBuf {
        PathBuf::from("/etc/als-correction/config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base() {
        let dirs = Directories::with_base(PathBuf::from("/tmp/als"));
        assert_eq!(dirs.config, PathBuf::from("/tmp/als"));
        assert_eq!(dirs.config_file, PathBuf::from("/tmp/als/config.json"));
    }

    #[test]
    fn test_default_config_file_is_json() {
        let path = Directories::default_config_file();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("config.json"));
    }
}
