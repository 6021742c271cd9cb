use async_trait::async_trait;

use super::{Command, CommandError, CommandSummary, Reply};
use crate::{config::CommandSettings, user::User};

/// Lista de comandos disponible, enviada por privado.
pub struct HelpCommand {
    settings: CommandSettings,
    catalog: Vec<CommandSummary>,
}

impl HelpCommand {
    pub fn new(settings: CommandSettings, catalog: Vec<CommandSummary>) -> Self {
        Self { settings, catalog }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn key(&self) -> &'static str {
        "help"
    }

    fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    async fn execute(&self, _user: &User, _args: &[String]) -> Result<Reply, CommandError> {
        let mut lines = vec!["**Commands:**".to_string()];

        for summary in &self.catalog {
            let aliases = summary
                .aliases
                .iter()
                .map(|a| format!("`{}`", a))
                .collect::<Vec<_>>()
                .join(", ");
            let admin = if summary.is_admin { " (admin)" } else { "" };

            lines.push(format!("{}{}: {}", aliases, admin, summary.description));
        }

        Ok(Reply::private(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{settings, user};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn lists_every_command_and_marks_admin_ones() {
        let catalog = vec![
            CommandSummary {
                aliases: vec!["add".to_string(), "a".to_string()],
                description: "Adds tracks.".to_string(),
                is_admin: false,
            },
            CommandSummary {
                aliases: vec!["skip".to_string()],
                description: "Skips.".to_string(),
                is_admin: true,
            },
        ];

        let reply = HelpCommand::new(settings("help", false), catalog)
            .execute(&user(), &[])
            .await
            .unwrap();

        assert!(reply.private);
        assert_eq!(
            reply.message,
            "**Commands:**\n`add`, `a`: Adds tracks.\n`skip` (admin): Skips."
        );
    }
}
