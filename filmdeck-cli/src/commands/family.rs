use super::Context;
use chrono::Local;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use filmdeck_core::{Entitlements, FamilyStore, UserStore};

#[derive(Subcommand)]
pub enum FamilyCommands {
    /// Found a family (pass holders only)
    Create {
        name: String,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Bring another user into your family
    Invite { user_id: i64 },
    /// Leave your family
    Leave,
    /// Dissolve the family you lead
    Disband {
        #[arg(short, long)]
        force: bool,
    },
    /// List a family's members
    Members { name: String },
}

pub async fn handle_family_command(cmd: FamilyCommands, ctx: &Context) -> anyhow::Result<()> {
    let families = FamilyStore::new(&ctx.storage);
    let users = UserStore::new(&ctx.storage);

    match cmd {
        FamilyCommands::Create {
            name,
            avatar_url,
            description,
        } => {
            let user_id = ctx.acting_user()?;
            Entitlements::new(&ctx.storage)
                .ensure_can_create_family(user_id, Local::now().naive_local())
                .await?;
            families
                .create(user_id, &name, avatar_url.as_deref(), description.as_deref())
                .await?;
            println!("Family '{}' founded by user {}", name, user_id);
        }

        FamilyCommands::Invite { user_id } => {
            let leader = ctx.acting_user()?;
            let family = families
                .get_by_leader(leader)
                .await?
                .ok_or_else(|| anyhow::anyhow!("User {} does not lead a family", leader))?;
            families.add_member(&family.name, user_id).await?;
            println!("User {} joined '{}'", user_id, family.name);
        }

        FamilyCommands::Leave => {
            let user_id = ctx.acting_user()?;
            let user = users.get(user_id).await?;
            let name = user
                .family
                .ok_or_else(|| anyhow::anyhow!("User {} is not in a family", user_id))?;
            families.remove_member(&name, user_id).await?;
            println!("User {} left '{}'", user_id, name);
        }

        FamilyCommands::Disband { force } => {
            let leader = ctx.acting_user()?;
            let family = families
                .get_by_leader(leader)
                .await?
                .ok_or_else(|| anyhow::anyhow!("User {} does not lead a family", leader))?;
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Disband '{}' and release its {} members?",
                        family.name,
                        family.members.len()
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            families.disband(&family.name).await?;
            println!("Family '{}' disbanded.", family.name);
        }

        FamilyCommands::Members { name } => {
            let family = families.get(&name).await?;
            let members = families.members(&name).await?;

            println!("Family '{}' ({} points)", family.name, family.points);
            if let Some(desc) = &family.description {
                println!("  {}", desc);
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["User", "Handle", "Role"]);
            for (member_id, handle) in members {
                table.add_row(vec![
                    member_id.to_string(),
                    handle.map(|h| format!("@{}", h)).unwrap_or_default(),
                    if member_id == family.leader_id {
                        "leader"
                    } else {
                        "member"
                    }
                    .to_string(),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
