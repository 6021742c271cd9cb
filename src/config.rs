use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{audio::queue::QueueLimits, user::Admins};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,
    pub voice: VoiceConfig,

    // Audio
    pub default_volume: f32,

    // Límites
    pub max_track_duration: u64, // En segundos, 0 = sin límite
    pub max_queue_size: usize,   // 0 = sin límite
    pub max_playlist_size: usize,
    pub resolve_timeout: String, // Formato humantime ("30s"), "0s" desactiva

    pub cache: CacheConfig,
    pub admins: Admins,
    pub commands: CommandsConfig,
}

/// Canal de voz al que el bot se une al arrancar
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VoiceConfig {
    pub guild_id: Option<u64>,
    pub channel_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
}

/// Metadata of one chat command. Loaded once and held by the command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandSettings {
    pub aliases: Vec<String>,
    pub description: String,
    pub is_admin: bool,
}

impl CommandSettings {
    fn new(aliases: &[&str], description: &str, is_admin: bool) -> Self {
        Self {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            description: description.to_string(),
            is_admin,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub add: CommandSettings,
    pub addnext: CommandSettings,
    pub currenttrack: CommandSettings,
    pub help: CommandSettings,
    pub listtracks: CommandSettings,
    pub nexttrack: CommandSettings,
    pub numtracks: CommandSettings,
    pub remove: CommandSettings,
    pub reset: CommandSettings,
    pub shuffle: CommandSettings,
    pub skip: CommandSettings,
}

impl Config {
    /// Carga la configuración: valores por defecto, luego `config.toml`
    /// (o la ruta en `TRACKDJ_CONFIG`), luego variables `TRACKDJ__*`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var_os("TRACKDJ_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));

        let mut config = Self::load_from(&path)?;

        // Compatibilidad con la variable clásica
        if config.discord_token.is_empty() {
            if let Ok(token) = std::env::var("DISCORD_TOKEN") {
                config.discord_token = token;
            }
        }

        if config.cache.enabled {
            std::fs::create_dir_all(&config.cache.directory)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Layers an optional TOML file and `TRACKDJ__` environment variables over the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default())?)
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("TRACKDJ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Error leyendo configuración de {}", path.display()))?;

        Ok(settings.try_deserialize()?)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - A Discord token must be present
    /// - The command prefix must not be empty
    /// - Volume must be between 0.0 and 2.0
    /// - Playlist size must be greater than 0
    /// - `resolve_timeout` must be a valid duration
    /// - Every command needs at least one alias
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is required");
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        self.resolve_timeout()?;

        for (name, settings) in self.commands.iter() {
            if settings.aliases.iter().all(|a| a.trim().is_empty()) {
                anyhow::bail!("Command `{}` must have at least one alias", name);
            }
        }

        Ok(())
    }

    pub fn queue_limits(&self) -> QueueLimits {
        QueueLimits {
            max_track_duration: (self.max_track_duration > 0)
                .then(|| Duration::from_secs(self.max_track_duration)),
            max_tracks: (self.max_queue_size > 0).then_some(self.max_queue_size),
        }
    }

    /// `None` when resolution should not be bounded.
    pub fn resolve_timeout(&self) -> Result<Option<Duration>> {
        let timeout = humantime::parse_duration(self.resolve_timeout.trim())
            .with_context(|| format!("Invalid resolve_timeout: {}", self.resolve_timeout))?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Chat: prefix '{}', {} admin user(s), {} admin role(s) (enabled={})\n  \
            Voice: guild {}, channel {}\n  \
            Limits: {} queue, {}s max duration, {} playlist items, {} resolve timeout\n  \
            Cache: enabled={} at {}",
            self.command_prefix,
            self.admins.user_ids.len(),
            self.admins.role_ids.len(),
            self.admins.enabled,
            self.voice.guild_id.map_or("-".to_string(), |id| id.to_string()),
            self.voice.channel_id.map_or("-".to_string(), |id| id.to_string()),
            self.max_queue_size,
            self.max_track_duration,
            self.max_playlist_size,
            self.resolve_timeout,
            self.cache.enabled,
            self.cache.directory.display(),
        )
    }
}

impl CommandsConfig {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CommandSettings)> {
        [
            ("add", &self.add),
            ("addnext", &self.addnext),
            ("currenttrack", &self.currenttrack),
            ("help", &self.help),
            ("listtracks", &self.listtracks),
            ("nexttrack", &self.nexttrack),
            ("numtracks", &self.numtracks),
            ("remove", &self.remove),
            ("reset", &self.reset),
            ("shuffle", &self.shuffle),
            ("skip", &self.skip),
        ]
        .into_iter()
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            add: CommandSettings::new(&["add", "a"], "Adds songs/playlists to the queue.", false),
            addnext: CommandSettings::new(
                &["addnext", "an"],
                "Adds songs/playlists to the queue after the current song.",
                true,
            ),
            currenttrack: CommandSettings::new(
                &["currenttrack", "currentsong", "current"],
                "Outputs information about the current track.",
                false,
            ),
            help: CommandSettings::new(&["help", "h"], "Outputs this list of commands.", false),
            listtracks: CommandSettings::new(
                &["listtracks", "listsongs", "list", "l"],
                "Outputs a list of the tracks currently in the queue.",
                false,
            ),
            nexttrack: CommandSettings::new(
                &["nexttrack", "nextsong", "next"],
                "Outputs information about the next track in the queue.",
                false,
            ),
            numtracks: CommandSettings::new(
                &["numtracks", "numsongs", "nt"],
                "Outputs the number of tracks currently in the queue.",
                false,
            ),
            remove: CommandSettings::new(
                &["remove", "rm"],
                "Removes the track at the given queue position.",
                true,
            ),
            reset: CommandSettings::new(
                &["reset", "re"],
                "Stops playback and clears the queue.",
                true,
            ),
            shuffle: CommandSettings::new(&["shuffle", "shuf", "sh"], "Randomizes the queue.", true),
            skip: CommandSettings::new(
                &["skip", "forceskip", "fs"],
                "Immediately skips the current track.",
                true,
            ),
        }
    }
}

/// Default configuration values.
///
/// Used as the lowest layer when loading.
impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_string(),
            voice: VoiceConfig::default(),

            default_volume: 0.5,

            max_track_duration: 7200, // 2 horas
            max_queue_size: 1000,
            max_playlist_size: 100,
            resolve_timeout: "30s".to_string(),

            cache: CacheConfig {
                enabled: false,
                directory: "/app/cache".into(),
            },
            admins: Admins {
                enabled: true,
                user_ids: Vec::new(),
                role_ids: Vec::new(),
            },
            commands: CommandsConfig::default(),
        }
    }
}
