use async_trait::async_trait;
use std::sync::Arc;

use super::{added_reply, kick_player, resolve_all, Command, CommandContext, CommandError, Reply};
use crate::{config::CommandSettings, user::User};

/// Adds the tracks behind one or more URLs to the end of the queue.
pub struct AddCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl AddCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for AddCommand {
    fn key(&self) -> &'static str {
        "add"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, user: &User, args: &[String]) -> Result<Reply, CommandError> {
        if args.is_empty() {
            return Err(CommandError::MissingArguments(
                "add <url> [url...]".to_string(),
            ));
        }

        let tracks = resolve_all(&self.ctx.services, user, args).await;
        if tracks.is_empty() {
            return Err(CommandError::NoValidTracks);
        }

        let outcome = self.ctx.queue.append_batch(tracks);
        let reply = added_reply(user, outcome)?;

        kick_player(&self.ctx).await;
        Ok(reply)
    }
}
