//! # Bot Module
//!
//! Discord transport for the track queue.
//!
//! The [`TrackDj`] handler implements Serenity's [`EventHandler`]:
//!
//! - `ready`: joins the configured voice channel through Songbird and hands
//!   the call to the [`Player`]
//! - `message`: turns the author into a [`User`], runs the line through the
//!   [`Dispatcher`] and delivers the reply to the channel or by direct message
//! - `voice_state_update`: detaches the player when the bot is disconnected
//!
//! Everything Discord-specific stays in this module; commands only see
//! [`User`] and [`Reply`](crate::commands::Reply).

pub mod dispatcher;

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, CreateMessage, EventHandler, GuildId, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    audio::player::{Player, PlayerControl},
    config::VoiceConfig,
    user::User,
};

pub use dispatcher::Dispatcher;

/// Límite de caracteres de un mensaje de Discord
const MESSAGE_LIMIT: usize = 2000;

pub struct TrackDj {
    dispatcher: Arc<Dispatcher>,
    player: Arc<Player>,
    voice: VoiceConfig,
}

impl TrackDj {
    pub fn new(dispatcher: Arc<Dispatcher>, player: Arc<Player>, voice: VoiceConfig) -> Self {
        Self {
            dispatcher,
            player,
            voice,
        }
    }

    /// Joins the configured voice channel and attaches the call to the player.
    async fn join_voice_channel(&self, ctx: &Context) -> Result<()> {
        let (Some(guild_id), Some(channel_id)) = (self.voice.guild_id, self.voice.channel_id) else {
            warn!("⚠️ Canal de voz no configurado, el bot no reproducirá audio");
            return Ok(());
        };

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager
            .join(GuildId::new(guild_id), ChannelId::new(channel_id))
            .await
            .map_err(|e| anyhow::anyhow!("Error al conectar al canal de voz: {:?}", e))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        self.player.attach(call);
        self.player.start_if_idle().await
    }

    async fn deliver(&self, ctx: &Context, msg: &Message, private: bool, text: &str) -> Result<()> {
        for chunk in split_message(text, MESSAGE_LIMIT) {
            if private {
                msg.author
                    .direct_message(ctx, CreateMessage::new().content(chunk))
                    .await?;
            } else {
                msg.channel_id.say(&ctx.http, chunk).await?;
            }
        }

        Ok(())
    }
}

/// Maps a Discord author onto the transport-independent [`User`].
fn to_user(msg: &Message) -> User {
    let roles = msg
        .member
        .as_ref()
        .map(|member| member.roles.iter().map(|role| role.get()).collect())
        .unwrap_or_default();

    User::new(msg.author.id.get(), msg.author.name.clone()).with_roles(roles)
}

/// Parte un texto largo en trozos de como mucho `limit` bytes, cortando en saltos de línea.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if !current.is_empty() && current.len() + 1 + line.len() > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }

        let mut rest = line;
        while rest.len() > limit {
            let mut cut = limit;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        current.push_str(rest);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl EventHandler for TrackDj {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.join_voice_channel(&ctx).await {
            error!("❌ Error al unirse al canal de voz: {:?}", e);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let user = to_user(&msg);
        let Some(reply) = self.dispatcher.dispatch(&user, &msg.content).await else {
            return;
        };

        if let Err(e) = self.deliver(&ctx, &msg, reply.private, &reply.message).await {
            error!("Error enviando respuesta a {}: {:?}", user.name, e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            info!("🔌 Bot desconectado del canal de voz");

            if let Err(e) = self.player.stop().await {
                error!("Error al detener reproducción: {:?}", e);
            }
            self.player.detach();
        } else {
            debug!("Estado de voz del bot actualizado: {:?}", new.channel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_messages_are_not_split() {
        assert_eq!(split_message("hola\nmundo", 2000), vec!["hola\nmundo"]);
    }

    #[test]
    fn long_messages_split_on_lines() {
        let text = "aaaa\nbbbb\ncccc";

        assert_eq!(split_message(text, 9), vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn oversized_line_is_hard_wrapped() {
        assert_eq!(split_message("abcdefg", 3), vec!["abc", "def", "g"]);
    }
}
