use serde::{Deserialize, Serialize};

/// Identidad del usuario que invoca un comando.
///
/// Es independiente del transporte: el adaptador de chat construye un
/// `User` a partir del autor del mensaje antes de despachar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub roles: Vec<u64>,
}

impl User {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<u64>) -> Self {
        self.roles = roles;
        self
    }
}

/// Admin membership as read from configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Admins {
    /// When disabled every user is treated as an admin.
    pub enabled: bool,
    #[serde(default)]
    pub user_ids: Vec<u64>,
    #[serde(default)]
    pub role_ids: Vec<u64>,
}

impl Admins {
    pub fn is_admin(&self, user: &User) -> bool {
        if !self.enabled {
            return true;
        }

        self.user_ids.contains(&user.id) || user.roles.iter().any(|r| self.role_ids.contains(r))
    }
}
