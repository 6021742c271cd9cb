//! Routes chat lines to commands.
//!
//! The dispatcher owns the alias table and the admin list. It is the only
//! place where permissions are enforced, and it turns every failure into a
//! private reply so a command never fails silently.

use tracing::{debug, info, warn};

use crate::{
    commands::{CommandError, CommandRegistry, Reply},
    user::{Admins, User},
};

/// Comando ya separado en token y argumentos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

pub struct Dispatcher {
    registry: CommandRegistry,
    admins: Admins,
    prefix: String,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry, admins: Admins, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            admins,
            prefix: prefix.into(),
        }
    }

    /// Returns `None` for lines that are not commands.
    pub fn parse(&self, raw: &str) -> Option<Invocation> {
        let body = raw.trim_start().strip_prefix(self.prefix.as_str())?;
        let mut tokens = body.split_whitespace();

        let command = tokens.next()?.to_lowercase();
        let args = tokens.map(str::to_string).collect();

        Some(Invocation { command, args })
    }

    /// Ejecuta la línea si es un comando y devuelve la respuesta a entregar.
    pub async fn dispatch(&self, user: &User, raw: &str) -> Option<Reply> {
        let invocation = self.parse(raw)?;

        let result = self.run(user, &invocation).await;
        match result {
            Ok(reply) => Some(reply),
            Err(e) => {
                match &e {
                    CommandError::Playback(cause) => {
                        warn!("❌ Error de reproducción en `{}`: {:?}", invocation.command, cause)
                    }
                    _ => debug!("Comando `{}` de {} falló: {}", invocation.command, user.name, e),
                }
                Some(Reply::private(e.to_string()))
            }
        }
    }

    async fn run(&self, user: &User, invocation: &Invocation) -> Result<Reply, CommandError> {
        let command = self
            .registry
            .find(&invocation.command)
            .ok_or_else(|| CommandError::UnknownCommand(invocation.command.clone()))?;

        if command.is_admin_command() && !self.admins.is_admin(user) {
            warn!("🔒 {} intentó usar `{}` sin permisos", user.name, invocation.command);
            return Err(CommandError::PermissionDenied(invocation.command.clone()));
        }

        info!(
            "🎛️ {} ejecuta `{}` ({} argumento(s))",
            user.name,
            command.key(),
            invocation.args.len()
        );
        command.execute(user, &invocation.args).await
    }
}
