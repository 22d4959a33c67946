use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".iro2tm"))
            .unwrap_or_else(|| PathBuf::from(".iro2tm"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Parent directory for per-run browser profile directories.
    pub fn profiles_dir(&self) -> PathBuf {
        self.base.join("profiles")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
