use super::error::ModelError;
use super::ffmpeg_cmd::reserved_options;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

/// x264 speed presets, slowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Veryslow,
    Slower,
    Slow,
    Medium,
    Fast,
    Faster,
    Veryfast,
    Superfast,
    Ultrafast,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 9] = [
        SpeedPreset::Veryslow,
        SpeedPreset::Slower,
        SpeedPreset::Slow,
        SpeedPreset::Medium,
        SpeedPreset::Fast,
        SpeedPreset::Faster,
        SpeedPreset::Veryfast,
        SpeedPreset::Superfast,
        SpeedPreset::Ultrafast,
    ];

    /// Token passed to `-preset`
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedPreset::Veryslow => "veryslow",
            SpeedPreset::Slower => "slower",
            SpeedPreset::Slow => "slow",
            SpeedPreset::Medium => "medium",
            SpeedPreset::Fast => "fast",
            SpeedPreset::Faster => "faster",
            SpeedPreset::Veryfast => "veryfast",
            SpeedPreset::Superfast => "superfast",
            SpeedPreset::Ultrafast => "ultrafast",
        }
    }

    /// Position on a 0..=8 speed slider (0 = slowest, best compression)
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedPreset {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ModelError::UnknownPreset(s.to_string()))
    }
}

fn default_keyint() -> u32 {
    600
}
fn default_refs() -> u32 {
    4
}
fn default_bframes() -> u32 {
    3
}

/// Encoding profile configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub name: String,

    /// x264 constant rate factor (lower = better quality, bigger file)
    pub crf: f64,
    pub preset: SpeedPreset,

    // GOP & reference frames
    #[serde(default = "default_keyint")]
    pub keyint: u32,
    #[serde(default = "default_refs")]
    pub refs: u32,
    #[serde(default = "default_bframes")]
    pub bframes: u32,

    /// Let ffmpeg pick a hardware decoder (`-hwaccel auto`)
    #[serde(default)]
    pub hardware_acceleration: bool,

    /// Extra ffmpeg arguments, shell-quoted, inserted before the output.
    /// Options the command builder owns (audio, codec, `-crf`, `-preset`,
    /// `-hwaccel`, `-map`, `-i`, `-y`) are rejected on save and load, and
    /// dropped with a warning when a profile reaches the builder anyway.
    #[serde(default)]
    pub additional_args: String,
}

impl EncodingProfile {
    /// Get a built-in profile by name
    pub fn get_builtin(name: &str) -> Option<Self> {
        let (crf, preset, keyint, refs, bframes) = match name {
            "default" => (23.5, SpeedPreset::Slow, 600, 4, 3),
            "fast" => (26.0, SpeedPreset::Veryfast, 250, 2, 2),
            "archive" => (20.0, SpeedPreset::Veryslow, 600, 6, 5),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            crf,
            preset,
            keyint,
            refs,
            bframes,
            hardware_acceleration: false,
            additional_args: String::new(),
        })
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["default", "fast", "archive"]
    }

    /// Get the profiles directory path (creates if doesn't exist)
    /// Priority: <config dir>/videoslim/profiles/
    /// Fallback: ./.videoslim_profiles/
    pub fn profiles_dir() -> io::Result<PathBuf> {
        let profiles_path = dirs::config_dir()
            .map(|c| c.join("videoslim").join("profiles"))
            .unwrap_or_else(|| PathBuf::from(".videoslim_profiles"));

        std::fs::create_dir_all(&profiles_path)?;

        Ok(profiles_path)
    }

    /// Names become file names inside the profiles directory
    pub fn validate_name(name: &str) -> Result<(), ModelError> {
        let bad = name.trim().is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\', ':', '\0']);
        if bad {
            return Err(ModelError::InvalidProfileName(name.to_string()));
        }
        Ok(())
    }

    /// Checks a profile must pass before it is saved or used from disk
    pub fn validate(&self) -> Result<(), ModelError> {
        Self::validate_name(&self.name)?;
        match reserved_options(&self.additional_args).into_iter().next() {
            Some(option) => Err(ModelError::ReservedArgument(option)),
            None => Ok(()),
        }
    }

    fn file_name(name: &str) -> io::Result<String> {
        Self::validate_name(name)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(format!("{}.json", name.to_lowercase().replace(' ', "_")))
    }

    /// Save profile to JSON file
    pub fn save(&self, profiles_dir: &Path) -> io::Result<()> {
        self.validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        std::fs::create_dir_all(profiles_dir)?;
        let path = profiles_dir.join(Self::file_name(&self.name)?);

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Load profile from JSON file
    pub fn load(profiles_dir: &Path, name: &str) -> io::Result<Self> {
        let path = profiles_dir.join(Self::file_name(name)?);
        let json = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&json)?;
        profile
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(profile)
    }

    /// List all saved profiles
    pub fn list_saved(profiles_dir: &Path) -> io::Result<Vec<String>> {
        if !profiles_dir.exists() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();
        for entry in std::fs::read_dir(profiles_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            // Read the JSON file to get the actual profile name
            match std::fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str::<EncodingProfile>(&json).ok())
            {
                Some(profile) => profiles.push(profile.name),
                None => tracing::warn!("ignoring unreadable profile {}", path.display()),
            }
        }
        profiles.sort();

        Ok(profiles)
    }
}

/// Read-only lookup of profiles by name
pub trait ProfileStore: Send + Sync {
    fn get(&self, name: &str) -> Option<EncodingProfile>;
}

/// Profiles compiled into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinProfiles;

impl ProfileStore for BuiltinProfiles {
    fn get(&self, name: &str) -> Option<EncodingProfile> {
        EncodingProfile::get_builtin(name)
    }
}

/// Layered lookup: in-memory overrides, then saved profiles, then built-ins
#[derive(Debug, Default)]
pub struct ProfileCatalog {
    overrides: RwLock<HashMap<String, EncodingProfile>>,
    profiles_dir: Option<PathBuf>,
}

impl ProfileCatalog {
    pub fn new(profiles_dir: Option<PathBuf>) -> Self {
        Self {
            overrides: RwLock::new(HashMap::new()),
            profiles_dir,
        }
    }

    /// Catalog backed by the user's profiles directory, if it can be created
    pub fn from_user_dir() -> Self {
        match EncodingProfile::profiles_dir() {
            Ok(dir) => Self::new(Some(dir)),
            Err(e) => {
                tracing::warn!("profiles directory unavailable, using built-ins only: {}", e);
                Self::new(None)
            }
        }
    }

    /// Register a profile that shadows any saved or built-in profile of the same name
    pub fn set_override(&self, profile: EncodingProfile) {
        let mut overrides = self
            .overrides
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        overrides.insert(profile.name.clone(), profile);
    }

    pub fn profiles_dir(&self) -> Option<&Path> {
        self.profiles_dir.as_deref()
    }

    /// Names of every profile reachable through this catalog
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = EncodingProfile::builtin_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(dir) = &self.profiles_dir {
            if let Ok(saved) = EncodingProfile::list_saved(dir) {
                names.extend(saved);
            }
        }
        if let Ok(overrides) = self.overrides.read() {
            names.extend(overrides.keys().cloned());
        }
        names.sort();
        names.dedup();
        names
    }
}

impl ProfileStore for ProfileCatalog {
    fn get(&self, name: &str) -> Option<EncodingProfile> {
        let overridden = self
            .overrides
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned();
        if overridden.is_some() {
            return overridden;
        }

        if let Some(dir) = &self.profiles_dir {
            match EncodingProfile::load(dir, name) {
                Ok(profile) => return Some(profile),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("failed to load profile '{}': {}", name, e),
            }
        }

        EncodingProfile::get_builtin(name)
    }
}
