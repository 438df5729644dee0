//! Group membership resolution for principals.
//!
//! Failures never surface as errors: an unresolvable principal simply has no
//! groups, and decisions fall back to user-only matching.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

/// Resolves the groups a principal belongs to.
#[async_trait]
pub trait GroupResolver: Send + Sync {
    /// Groups of `user`, empty when unknown.
    async fn groups(&self, user: &str) -> Vec<String>;
}

/// Local system accounts, read from the passwd and group databases.
#[derive(Debug, Clone)]
pub struct SystemGroupResolver {
    passwd_path: PathBuf,
    group_path: PathBuf,
}

impl Default for SystemGroupResolver {
    fn default() -> Self {
        Self::new("/etc/passwd", "/etc/group")
    }
}

impl SystemGroupResolver {
    /// Resolver reading the given passwd and group files.
    pub fn new(passwd_path: impl Into<PathBuf>, group_path: impl Into<PathBuf>) -> Self {
        Self {
            passwd_path: passwd_path.into(),
            group_path: group_path.into(),
        }
    }
}

#[async_trait]
impl GroupResolver for SystemGroupResolver {
    async fn groups(&self, user: &str) -> Vec<String> {
        let passwd = match tokio::fs::read_to_string(&self.passwd_path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.passwd_path.display(), error = %e, "Cannot read passwd database");
                return Vec::new();
            }
        };
        let Some(primary_gid) = primary_gid(&passwd, user) else {
            debug!(user, "User not found in passwd database");
            return Vec::new();
        };

        match tokio::fs::read_to_string(&self.group_path).await {
            Ok(group) => memberships(&group, user, primary_gid),
            Err(e) => {
                debug!(path = %self.group_path.display(), error = %e, "Cannot read group database");
                Vec::new()
            }
        }
    }
}

/// Primary gid of `user` from passwd-format text.
fn primary_gid(passwd: &str, user: &str) -> Option<u32> {
    passwd
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let mut fields = line.split(':');
            if fields.next()? != user {
                return None;
            }
            fields.nth(2)?.trim().parse().ok()
        })
}

/// Group names from group-format text: the primary group first, then
/// supplementary groups in file order.
fn memberships(group: &str, user: &str, primary_gid: u32) -> Vec<String> {
    let mut primary = None;
    let mut supplementary = Vec::new();

    for line in group.lines().filter(|line| !line.starts_with('#')) {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 4 {
            continue;
        }
        let name = fields[0];
        if fields[2].trim().parse::<u32>().ok() == Some(primary_gid) {
            primary = Some(name.to_string());
        } else if fields[3].split(',').map(str::trim).any(|member| member == user) {
            supplementary.push(name.to_string());
        }
    }

    primary.into_iter().chain(supplementary).collect()
}

/// Map-backed resolver.
#[derive(Debug, Default, Clone)]
pub struct StaticGroupResolver {
    groups: HashMap<String, Vec<String>>,
}

impl StaticGroupResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign groups to a user.
    #[must_use]
    pub fn with_user<I, S>(mut self, user: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(user.into(), groups.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl GroupResolver for StaticGroupResolver {
    async fn groups(&self, user: &str) -> Vec<String> {
        self.groups.get(user).cloned().unwrap_or_default()
    }
}

/// Resolver for deployments without group data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGroups;

#[async_trait]
impl GroupResolver for NoGroups {
    async fn groups(&self, _user: &str) -> Vec<String> {
        Vec::new()
    }
}
