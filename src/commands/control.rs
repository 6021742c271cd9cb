use async_trait::async_trait;
use std::sync::Arc;

use super::{Command, CommandContext, CommandError, Reply};
use crate::{config::CommandSettings, user::User};

pub struct RemoveCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl RemoveCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for RemoveCommand {
    fn key(&self) -> &'static str {
        "remove"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, user: &User, args: &[String]) -> Result<Reply, CommandError> {
        let raw = args
            .first()
            .ok_or_else(|| CommandError::MissingArguments("remove <position>".to_string()))?;
        let position = raw.parse::<usize>().map_err(|_| {
            CommandError::InvalidArgument(format!("`{}` is not a valid queue position.", raw))
        })?;

        let removed = self.ctx.queue.remove_at(position)?;

        Ok(Reply::public(format!(
            "**{}** removed \"{}\" from the queue.",
            user.name,
            removed.title()
        )))
    }
}

/// Saltea el track actual; el reproductor avanza solo.
pub struct SkipCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl SkipCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for SkipCommand {
    fn key(&self) -> &'static str {
        "skip"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        let current = self.ctx.queue.current().ok_or(CommandError::NothingPlaying)?;

        self.ctx.player.skip().await.map_err(CommandError::Playback)?;

        Ok(Reply::public(format!(
            "**{}** skipped \"{}\".",
            user.name,
            current.title()
        )))
    }
}

/// Skip-all: vacía la cola y detiene la reproducción.
///
/// Insertions racing with the reset that land after the clear are kept.
pub struct ResetCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl ResetCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for ResetCommand {
    fn key(&self) -> &'static str {
        "reset"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        let cleared = self.ctx.queue.clear();
        self.ctx.player.stop().await.map_err(CommandError::Playback)?;

        Ok(Reply::public(format!(
            "**{}** reset the queue ({} track(s) removed).",
            user.name, cleared
        )))
    }
}

pub struct ShuffleCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl ShuffleCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for ShuffleCommand {
    fn key(&self) -> &'static str {
        "shuffle"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        if self.ctx.queue.len() < 2 {
            return Err(CommandError::InvalidArgument(
                "There are not enough tracks in the queue to shuffle.".to_string(),
            ));
        }

        self.ctx.queue.shuffle();

        Ok(Reply::public(format!("**{}** shuffled the queue.", user.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{player::MockPlayerControl, queue::QueueError, track::Track},
        commands::testing::{args, context_with, settings, user},
        sources::testing::StaticService,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn ctx(player: MockPlayerControl) -> Arc<CommandContext> {
        context_with(StaticService::new("Test", "https://"), 600, player)
    }

    fn fill(ctx: &CommandContext, titles: &[&str]) {
        for title in titles {
            ctx.queue
                .append(
                    Track::new(*title, *title, *title, "Test", "bob")
                        .with_duration(Duration::from_secs(30)),
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn remove_takes_one_based_position() {
        let ctx = ctx(MockPlayerControl::new());
        fill(&ctx, &["A", "B", "C"]);
        let command = RemoveCommand::new(settings("remove", true), ctx.clone());

        let reply = command.execute(&user(), &args(&["2"])).await.unwrap();

        assert_eq!(reply.message, "**alice** removed \"B\" from the queue.");
        assert_eq!(ctx.queue.len(), 2);
    }

    #[tokio::test]
    async fn remove_reports_bad_positions() {
        let ctx = ctx(MockPlayerControl::new());
        fill(&ctx, &["A"]);
        let command = RemoveCommand::new(settings("remove", true), ctx.clone());

        let err = command.execute(&user(), &args(&["5"])).await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Queue(QueueError::PositionOutOfRange { position: 5, len: 1 })
        ));

        let err = command.execute(&user(), &args(&["two"])).await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));

        let err = command.execute(&user(), &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::MissingArguments(_)));
        assert_eq!(ctx.queue.len(), 1);
    }

    #[tokio::test]
    async fn skip_asks_the_player() {
        let mut player = MockPlayerControl::new();
        player.expect_skip().times(1).returning(|| Ok(()));
        let ctx = ctx(player);
        fill(&ctx, &["A"]);
        ctx.queue.next();

        let reply = SkipCommand::new(settings("skip", true), ctx)
            .execute(&user(), &[])
            .await
            .unwrap();

        assert_eq!(reply.message, "**alice** skipped \"A\".");
    }

    #[tokio::test]
    async fn skip_with_nothing_playing_fails() {
        let mut player = MockPlayerControl::new();
        player.expect_skip().never();

        let err = SkipCommand::new(settings("skip", true), ctx(player))
            .execute(&user(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::NothingPlaying));
    }

    #[tokio::test]
    async fn reset_clears_and_stops() {
        let mut player = MockPlayerControl::new();
        player.expect_stop().times(1).returning(|| Ok(()));
        let ctx = ctx(player);
        fill(&ctx, &["A", "B"]);

        let reply = ResetCommand::new(settings("reset", true), ctx.clone())
            .execute(&user(), &[])
            .await
            .unwrap();

        assert!(ctx.queue.is_empty());
        assert!(reply.message.contains("2 track(s) removed"));
    }

    #[tokio::test]
    async fn reset_surfaces_playback_errors() {
        let mut player = MockPlayerControl::new();
        player
            .expect_stop()
            .returning(|| Err(anyhow::anyhow!("voice gone")));

        let err = ResetCommand::new(settings("reset", true), ctx(player))
            .execute(&user(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Playback(_)));
    }

    #[tokio::test]
    async fn shuffle_keeps_every_track() {
        let ctx = ctx(MockPlayerControl::new());
        fill(&ctx, &["A", "B", "C", "D"]);

        ShuffleCommand::new(settings("shuffle", true), ctx.clone())
            .execute(&user(), &[])
            .await
            .unwrap();

        let mut titles: Vec<_> = ctx
            .queue
            .snapshot(10)
            .iter()
            .map(|t| t.title().to_string())
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn shuffle_needs_two_tracks() {
        let ctx = ctx(MockPlayerControl::new());
        fill(&ctx, &["A"]);

        let err = ShuffleCommand::new(settings("shuffle", true), ctx)
            .execute(&user(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::InvalidArgument(_)));
    }
}
