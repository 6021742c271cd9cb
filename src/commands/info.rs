//! Read-only commands that report on the queue. Replies are private.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Command, CommandContext, CommandError, Reply};
use crate::{
    audio::{format_duration, track::Track},
    config::CommandSettings,
    user::User,
};

/// Filas mostradas por `listtracks` cuando no se indica un número
const DEFAULT_LIST_LENGTH: usize = 10;

fn describe(track: &Track) -> String {
    let mut line = format!("\"{}\"", track.title());
    if !track.author().is_empty() {
        line.push_str(&format!(" by {}", track.author()));
    }
    line.push_str(&format!(
        " from {}, added by **{}**",
        track.service(),
        track.submitter()
    ));
    if let Some(playlist) = track.playlist() {
        line.push_str(&format!(" (playlist \"{}\")", playlist.title));
    }
    line
}

pub struct CurrentTrackCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl CurrentTrackCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for CurrentTrackCommand {
    fn key(&self) -> &'static str {
        "currenttrack"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, _user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        let track = self.ctx.queue.current().ok_or(CommandError::NothingPlaying)?;

        Ok(Reply::private(format!(
            "Now playing: {} [{}/{}]",
            describe(&track),
            format_duration(track.playback_offset()),
            format_duration(track.duration()),
        )))
    }
}

pub struct NextTrackCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl NextTrackCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for NextTrackCommand {
    fn key(&self) -> &'static str {
        "nexttrack"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, _user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        match self.ctx.queue.peek_next() {
            Some(track) => Ok(Reply::private(format!(
                "Up next: {} [{}]",
                describe(&track),
                format_duration(track.duration())
            ))),
            None => Ok(Reply::private("There are no tracks queued after this one.")),
        }
    }
}

/// Lista los tracks pendientes, numerados por posición.
pub struct ListTracksCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl ListTracksCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for ListTracksCommand {
    fn key(&self) -> &'static str {
        "listtracks"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, _user: &User, args: &[String]) -> Result<Reply, CommandError> {
        let limit = match args.first() {
            None => DEFAULT_LIST_LENGTH,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(CommandError::InvalidArgument(format!(
                        "`{}` is not a valid number of tracks.",
                        raw
                    )))
                }
            },
        };

        let tracks = self.ctx.queue.snapshot(limit);
        if tracks.is_empty() {
            return Ok(Reply::private("There are no tracks in the queue."));
        }

        let lines: Vec<String> = tracks
            .iter()
            .enumerate()
            .map(|(i, track)| {
                format!(
                    "{}) \"{}\" [{}] added by {}",
                    i + 1,
                    track.title(),
                    format_duration(track.duration()),
                    track.submitter()
                )
            })
            .collect();

        let mut message = lines.join("\n");
        let total = self.ctx.queue.len();
        if total > tracks.len() {
            message.push_str(&format!("\n...and {} more.", total - tracks.len()));
        }

        Ok(Reply::private(message))
    }
}

pub struct NumTracksCommand {
    settings: CommandSettings,
    ctx: Arc<CommandContext>,
}

impl NumTracksCommand {
    pub fn new(settings: CommandSettings, ctx: Arc<CommandContext>) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl Command for NumTracksCommand {
    fn key(&self) -> &'static str {
        "numtracks"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, _user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        let count = self.ctx.queue.len();
        let total = format_duration(self.ctx.queue.total_duration());

        let message = match count {
            0 => "There are no tracks in the queue.".to_string(),
            1 => format!("There is **1** track in the queue ({} remaining).", total),
            n => format!("There are **{}** tracks in the queue ({} remaining).", n, total),
        };

        Ok(Reply::private(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            player::MockPlayerControl,
            track::{Playlist, PlaylistInfo},
        },
        commands::testing::{args, context_with, settings, user},
        sources::testing::StaticService,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn ctx() -> Arc<CommandContext> {
        context_with(StaticService::new("Test", "https://"), 3600, MockPlayerControl::new())
    }

    fn track(id: &str, title: &str, secs: u64) -> Track {
        Track::new(id, id, title, "Test", "bob").with_duration(Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn current_track_requires_something_playing() {
        let ctx = ctx();
        let command = CurrentTrackCommand::new(settings("currenttrack", false), ctx.clone());

        let err = command.execute(&user(), &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::NothingPlaying));
    }

    #[tokio::test]
    async fn current_track_shows_position_and_playlist() {
        let ctx = ctx();
        let playlist = Playlist::new(
            PlaylistInfo {
                id: "pl".to_string(),
                url: "https://list".to_string(),
                title: "Mix".to_string(),
                submitter: "bob".to_string(),
                service: "Test".to_string(),
            },
            vec![track("1", "Song", 200).with_author("Band")],
        );
        ctx.queue.append_batch(playlist.into_tracks());
        ctx.queue.next();
        ctx.queue.set_playback_offset(Duration::from_secs(65));

        let command = CurrentTrackCommand::new(settings("currenttrack", false), ctx.clone());
        let reply = command.execute(&user(), &[]).await.unwrap();

        assert!(reply.private);
        assert_eq!(
            reply.message,
            "Now playing: \"Song\" by Band from Test, added by **bob** (playlist \"Mix\") [1:05/3:20]"
        );
    }

    #[tokio::test]
    async fn next_track_peeks_without_popping() {
        let ctx = ctx();
        ctx.queue.append(track("1", "First", 30)).unwrap();
        let command = NextTrackCommand::new(settings("nexttrack", false), ctx.clone());

        let reply = command.execute(&user(), &[]).await.unwrap();

        assert_eq!(reply.message, "Up next: \"First\" from Test, added by **bob** [0:30]");
        assert_eq!(ctx.queue.len(), 1);
    }

    #[tokio::test]
    async fn list_tracks_numbers_positions_and_truncates() {
        let ctx = ctx();
        for i in 1..=3 {
            ctx.queue
                .append(track(&i.to_string(), &format!("T{i}"), 60))
                .unwrap();
        }
        let command = ListTracksCommand::new(settings("listtracks", false), ctx.clone());

        let reply = command.execute(&user(), &args(&["2"])).await.unwrap();

        assert_eq!(
            reply.message,
            "1) \"T1\" [1:00] added by bob\n2) \"T2\" [1:00] added by bob\n...and 1 more."
        );
    }

    #[tokio::test]
    async fn list_tracks_rejects_bad_count() {
        let command = ListTracksCommand::new(settings("listtracks", false), ctx());

        for bad in ["0", "-1", "many"] {
            let err = command.execute(&user(), &args(&[bad])).await.unwrap_err();
            assert!(matches!(err, CommandError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn num_tracks_reports_count_and_duration() {
        let ctx = ctx();
        let command = NumTracksCommand::new(settings("numtracks", false), ctx.clone());

        let empty = command.execute(&user(), &[]).await.unwrap();
        assert_eq!(empty.message, "There are no tracks in the queue.");

        ctx.queue.append(track("1", "A", 90)).unwrap();
        ctx.queue.append(track("2", "B", 90)).unwrap();

        let reply = command.execute(&user(), &[]).await.unwrap();
        assert_eq!(reply.message, "There are **2** tracks in the queue (3:00 remaining).");
    }
}
