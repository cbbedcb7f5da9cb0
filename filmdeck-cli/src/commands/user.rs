use super::Context;
use chrono::Local;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use filmdeck_core::{Entitlements, StatsStore, UserStore};

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user, or refresh their handle
    Register {
        user_id: i64,
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Show a user's profile
    Info {
        /// User id, or @handle with --by-handle
        user: String,
        #[arg(long)]
        by_handle: bool,
    },
    /// Extend a user's pass
    GrantPass {
        user_id: i64,
        /// Whole months, 1-12
        #[arg(short, long, default_value_t = 1)]
        months: u32,
    },
    /// Grant extra draw attempts
    Attempts { user_id: i64, amount: i64 },
    /// Ban a user from drawing
    Ban { user_id: i64 },
    /// Lift a ban
    Unban { user_id: i64 },
    /// Credit donate currency
    Donate { user_id: i64, amount: i64 },
    /// Top players by lifetime points
    Top {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
        /// Rank by season points instead
        #[arg(long)]
        season: bool,
    },
}

pub async fn handle_user_command(cmd: UserCommands, ctx: &Context) -> anyhow::Result<()> {
    let users = UserStore::new(&ctx.storage);

    match cmd {
        UserCommands::Register { user_id, username } => {
            users.ensure(user_id, username.as_deref()).await?;
            println!("User {} registered.", user_id);
        }

        UserCommands::Info { user, by_handle } => {
            let user = if by_handle {
                users.get_by_username(&user).await?
            } else {
                users.get(user.parse()?).await?
            };
            let stats = StatsStore::new(&ctx.storage).get(user.user_id).await?;

            println!("User {}", user.user_id);
            if let Some(handle) = &user.username {
                println!("  Handle: @{}", handle);
            }
            println!("  Points: {} (season {}, shop {})", user.points, user.season_points, user.shop_points);
            println!("  Donate balance: {}", user.donate);
            println!("  Cards held: {}", user.cards.len());
            match &user.family {
                Some(family) => println!("  Family: {}", family),
                None => println!("  Family: none"),
            }
            match user.pass_expiry {
                Some(expiry) => println!("  Pass until: {}", expiry),
                None => println!("  Pass: none"),
            }
            if user.is_banned() {
                println!("  BANNED");
            } else {
                println!("  Extra attempts: {}", user.attempts);
            }
            println!(
                "  Duels: {} played, {} won, {} lost ({}% win rate)",
                stats.games,
                stats.wins,
                stats.losses,
                stats.win_rate()
            );
        }

        UserCommands::GrantPass { user_id, months } => {
            ctx.require_admin()?;
            let now = Local::now().naive_local();
            let expiry = Entitlements::new(&ctx.storage)
                .grant_pass(user_id, months, now)
                .await?;
            println!("Pass for user {} now runs until {}", user_id, expiry);
        }

        UserCommands::Attempts { user_id, amount } => {
            ctx.require_admin()?;
            users.add_attempts(user_id, amount).await?;
            println!("Granted {} attempts to user {}", amount, user_id);
        }

        UserCommands::Ban { user_id } => {
            ctx.require_admin()?;
            users.ban(user_id).await?;
            println!("User {} banned.", user_id);
        }

        UserCommands::Unban { user_id } => {
            ctx.require_admin()?;
            users.unban(user_id).await?;
            println!("User {} unbanned.", user_id);
        }

        UserCommands::Donate { user_id, amount } => {
            ctx.require_admin()?;
            users.add_donate(user_id, amount).await?;
            println!("Credited {} donate to user {}", amount, user_id);
        }

        UserCommands::Top { limit, season } => {
            let entries = if season {
                users.top_by_season_points(limit).await?
            } else {
                users.top_by_points(limit).await?
            };
            if entries.is_empty() {
                println!("No one has scored yet.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["#", "User", "Points"]);
            for (rank, entry) in entries.iter().enumerate() {
                let name = entry
                    .username
                    .clone()
                    .unwrap_or_else(|| entry.user_id.to_string());
                table.add_row(vec![
                    (rank + 1).to_string(),
                    name,
                    entry.score.to_string(),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
