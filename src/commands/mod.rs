//! # Commands Module
//!
//! Chat commands that read user input and mutate the shared queue.
//!
//! Every command implements [`Command`] and carries its own
//! [`CommandSettings`] (aliases, description, admin flag) loaded once from
//! configuration. The [`CommandRegistry`] maps every alias to exactly one
//! command; an alias declared twice is rejected at startup.

mod add;
mod addnext;
mod control;
mod help;
mod info;

use async_trait::async_trait;
use futures::future::join_all;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    audio::{
        player::PlayerControl,
        queue::{BatchOutcome, Queue, QueueError},
        track::Track,
    },
    config::{CommandSettings, CommandsConfig},
    sources::ServiceRegistry,
    user::User,
};

pub use add::AddCommand;
pub use addnext::AddNextCommand;
pub use control::{RemoveCommand, ResetCommand, ShuffleCommand, SkipCommand};
pub use help::HelpCommand;
pub use info::{CurrentTrackCommand, ListTracksCommand, NextTrackCommand, NumTracksCommand};

/// Respuesta de un comando.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    /// `true`: solo para quien invocó el comando. `false`: para todo el canal.
    pub private: bool,
}

impl Reply {
    pub fn public(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            private: false,
        }
    }

    pub fn private(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            private: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing arguments. Usage: {0}")]
    MissingArguments(String),

    #[error("No valid tracks were found with the provided URL(s).")]
    NoValidTracks,

    #[error("Your track(s) were either too long or an error occurred while processing them. No track(s) have been added.")]
    NoTracksAdded,

    #[error("You do not have permission to use `{0}`.")]
    PermissionDenied(String),

    #[error("Command `{0}` does not exist.")]
    UnknownCommand(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("There is no track playing right now.")]
    NothingPlaying,

    #[error("{0}")]
    Queue(#[from] QueueError),

    #[error("Playback error: {0}")]
    Playback(#[source] anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("alias `{alias}` is declared by both `{first}` and `{second}`")]
    AliasCollision {
        alias: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("command `{0}` has no aliases")]
    NoAliases(&'static str),
}

/// Estado compartido que los comandos consultan y mutan.
pub struct CommandContext {
    pub queue: Arc<Queue>,
    pub services: Arc<ServiceRegistry>,
    pub player: Arc<dyn PlayerControl>,
}

/// A named, aliasable, optionally admin-only chat command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Nombre canónico (clave en la configuración)
    fn key(&self) -> &'static str;

    fn settings(&self) -> &CommandSettings;

    fn aliases(&self) -> &[String] {
        &self.settings().aliases
    }

    fn description(&self) -> &str {
        &self.settings().description
    }

    fn is_admin_command(&self) -> bool {
        self.settings().is_admin
    }

    async fn execute(&self, user: &User, args: &[String]) -> Result<Reply, CommandError>;
}

/// Help line for one registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    pub aliases: Vec<String>,
    pub description: String,
    pub is_admin: bool,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
    aliases: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra todos los comandos con la metadata de la configuración.
    pub fn from_config(
        config: &CommandsConfig,
        ctx: Arc<CommandContext>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        registry.register(Arc::new(AddCommand::new(config.add.clone(), ctx.clone())))?;
        registry.register(Arc::new(AddNextCommand::new(config.addnext.clone(), ctx.clone())))?;
        registry.register(Arc::new(CurrentTrackCommand::new(
            config.currenttrack.clone(),
            ctx.clone(),
        )))?;
        registry.register(Arc::new(ListTracksCommand::new(
            config.listtracks.clone(),
            ctx.clone(),
        )))?;
        registry.register(Arc::new(NextTrackCommand::new(config.nexttrack.clone(), ctx.clone())))?;
        registry.register(Arc::new(NumTracksCommand::new(config.numtracks.clone(), ctx.clone())))?;
        registry.register(Arc::new(RemoveCommand::new(config.remove.clone(), ctx.clone())))?;
        registry.register(Arc::new(ResetCommand::new(config.reset.clone(), ctx.clone())))?;
        registry.register(Arc::new(ShuffleCommand::new(config.shuffle.clone(), ctx.clone())))?;
        registry.register(Arc::new(SkipCommand::new(config.skip.clone(), ctx)))?;

        // help se registra al final para poder listar a los demás
        let mut catalog = registry.summaries();
        catalog.push(CommandSummary {
            aliases: config.help.aliases.clone(),
            description: config.help.description.clone(),
            is_admin: config.help.is_admin,
        });
        registry.register(Arc::new(HelpCommand::new(config.help.clone(), catalog)))?;

        Ok(registry)
    }

    /// Aliases are matched case-insensitively. A duplicate alias is a load-time error.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let aliases: Vec<String> = command
            .aliases()
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();

        if aliases.is_empty() {
            return Err(RegistryError::NoAliases(command.key()));
        }

        for alias in &aliases {
            if let Some(&index) = self.aliases.get(alias) {
                return Err(RegistryError::AliasCollision {
                    alias: alias.clone(),
                    first: self.commands[index].key(),
                    second: command.key(),
                });
            }
        }

        let index = self.commands.len();
        for alias in aliases {
            self.aliases.insert(alias, index);
        }
        debug!("📝 Comando registrado: {}", command.key());
        self.commands.push(command);

        Ok(())
    }

    pub fn find(&self, alias: &str) -> Option<&Arc<dyn Command>> {
        self.aliases
            .get(&alias.to_lowercase())
            .map(|&index| &self.commands[index])
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn summaries(&self) -> Vec<CommandSummary> {
        self.commands
            .iter()
            .map(|c| CommandSummary {
                aliases: c.aliases().to_vec(),
                description: c.description().to_string(),
                is_admin: c.is_admin_command(),
            })
            .collect()
    }
}

/// Resolves every URL concurrently, keeping argument order.
///
/// A URL that fails to resolve contributes no tracks.
pub(crate) async fn resolve_all(services: &ServiceRegistry, user: &User, urls: &[String]) -> Vec<Track> {
    let results = join_all(urls.iter().map(|url| services.resolve(url, user))).await;

    results
        .into_iter()
        .zip(urls)
        .flat_map(|(result, url)| match result {
            Ok(tracks) => tracks,
            Err(e) => {
                debug!("🚫 Ignorando {}: {}", url, e);
                Vec::new()
            }
        })
        .collect()
}

/// Turns a batch outcome into the reply shown to the channel.
pub(crate) fn added_reply(user: &User, outcome: BatchOutcome) -> Result<Reply, CommandError> {
    let mut message = match (outcome.added, outcome.last_added) {
        (0, _) | (_, None) => return Err(CommandError::NoTracksAdded),
        (1, Some(track)) => format!(
            "**{}** added **1** track to the queue:\n\"{}\" from {}",
            user.name,
            track.title(),
            track.service()
        ),
        (added, Some(_)) => format!("**{}** added **{}** tracks to the queue.", user.name, added),
    };

    if outcome.rejected > 0 {
        message.push_str(&format!(
            "\n**{}** tracks could not be added due to error or because they are too long.",
            outcome.rejected
        ));
    }
    Ok(Reply::public(message))
}

/// Pide al reproductor que arranque si estaba inactivo.
pub(crate) async fn kick_player(ctx: &CommandContext) {
    if let Err(e) = ctx.player.start_if_idle().await {
        warn!("⚠️ No se pudo iniciar la reproducción: {:?}", e);
    }
}
