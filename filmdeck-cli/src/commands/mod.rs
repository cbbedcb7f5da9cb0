pub mod card;
pub mod collection;
pub mod family;
pub mod play;
pub mod user;

pub use card::{handle_card_command, CardCommands};
pub use collection::{handle_collection_command, CollectionCommands};
pub use family::{handle_family_command, FamilyCommands};
pub use play::{handle_play_command, PlayCommands};
pub use user::{handle_user_command, UserCommands};

use filmdeck_core::{EngineConfig, Storage};

/// Everything a command handler needs: the open database, the admin list
/// and whoever the invocation acts as.
pub struct Context {
    pub storage: Storage,
    pub engine_config: EngineConfig,
    pub acting_user: Option<i64>,
}

impl Context {
    /// The `--user` the invocation acts as; most player commands need one.
    pub fn acting_user(&self) -> anyhow::Result<i64> {
        self.acting_user
            .ok_or_else(|| anyhow::anyhow!("This command needs --user <id>"))
    }

    /// Privileged commands go through here. An empty admin list permits
    /// everyone, so a fresh install can bootstrap itself.
    pub fn require_admin(&self) -> anyhow::Result<()> {
        if self.engine_config.admin_ids.is_empty() {
            tracing::warn!("No admins configured; allowing privileged command");
            return Ok(());
        }
        let user = self.acting_user()?;
        if self.engine_config.is_admin(user) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("User {} is not an admin", user))
        }
    }
}
