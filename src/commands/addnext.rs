use async_trait::async_trait;
use std::sync::Arc;

use super::{added_reply, kick_player, resolve_all, Command, CommandContext, CommandError, Reply};
use crate::{config::CommandSettings, user::User};

/// Puts the tracks behind one or more URLs at the front of the queue.
///
/// Left-to-right argument order becomes play order: `addnext A B` plays the
/// tracks of `A` before those of `B`, and both before anything already queued.
pub struct AddNextCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl AddNextCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for AddNextCommand {
    fn key(&self) -> &'static str {
        "addnext"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, user: &User, args: &[String]) -> Result<Reply, CommandError> {
        if args.is_empty() {
            return Err(CommandError::MissingArguments(
                "addnext <url> [url...]".to_string(),
            ));
        }

        // La resolución ocurre antes de tocar la cola
        let tracks = resolve_all(&self.ctx.services, user, args).await;
        if tracks.is_empty() {
            return Err(CommandError::NoValidTracks);
        }

        let outcome = self.ctx.queue.insert_next_batch(tracks);
        let reply = added_reply(user, outcome)?;

        kick_player(&self.ctx).await;
        Ok(reply)
    }
}
