use super::Context;
use chrono::Local;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use filmdeck_core::{CollectionManager, Entitlements, RewardEngine};
use filmdeck_game::{DiceRoller, RandomRoller};

#[derive(Subcommand)]
pub enum CollectionCommands {
    /// Draw a card
    Draw,
    /// Page through your collection
    Show {
        /// Page index; wraps around at both ends
        #[arg(short, long, default_value_t = 0)]
        page: i64,
    },
    /// List every card you hold, copies included
    List,
    /// Drop entries whose card no longer exists
    Prune,
    /// Buy a card from the shop with shop points
    Buy { card_id: i64 },
    /// Claim the legendary giveaway (pass holders, on the 15th)
    Giveaway,
    /// Roll the monthly dice for extra draw attempts (pass holders)
    Roll,
}

pub async fn handle_collection_command(
    cmd: CollectionCommands,
    ctx: &Context,
) -> anyhow::Result<()> {
    let user_id = ctx.acting_user()?;
    let collection = CollectionManager::new(&ctx.storage);
    let now = Local::now().naive_local();

    match cmd {
        CollectionCommands::Draw => {
            let has_pass = Entitlements::new(&ctx.storage)
                .has_active_pass(user_id, now)
                .await?;
            let card = RewardEngine::new(&ctx.storage)
                .claim_card(user_id, has_pass, now)
                .await?;
            println!("You drew '{}' ({}, +{} points)!", card.name, card.rarity, card.points);
            println!("  {}", card.image_url);
        }

        CollectionCommands::Show { page } => match collection.browse_at(user_id, page).await? {
            Some(page) => {
                println!(
                    "[{}/{}] '{}' ({}) x{}",
                    page.position + 1,
                    page.total,
                    page.card.name,
                    page.card.rarity,
                    page.copies
                );
                println!("  {}", page.card.image_url);
            }
            None => println!("Your collection is empty."),
        },

        CollectionCommands::List => {
            let held = collection.distinct(user_id).await?;
            if held.is_empty() {
                println!("Your collection is empty.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Rarity", "Copies"]);
            for (card, copies) in held {
                table.add_row(vec![
                    card.card_id.to_string(),
                    card.name,
                    card.rarity.to_string(),
                    copies.to_string(),
                ]);
            }
            println!("{}", table);
        }

        CollectionCommands::Prune => {
            let removed = collection.prune_orphans(user_id).await?;
            println!("Removed {} orphaned entries.", removed);
        }

        CollectionCommands::Buy { card_id } => {
            let card = collection.purchase(user_id, card_id).await?;
            println!("Bought '{}' for {} shop points.", card.name, card.price);
        }

        CollectionCommands::Giveaway => {
            let card = Entitlements::new(&ctx.storage)
                .claim_giveaway(user_id, now)
                .await?;
            println!("Giveaway! You received '{}' ({})", card.name, card.rarity);
        }

        CollectionCommands::Roll => {
            let rolled = RandomRoller
                .roll(user_id)
                .await
                .map_err(|e| anyhow::anyhow!("Roll failed: {}", e))?;
            let granted = Entitlements::new(&ctx.storage)
                .roll_for_attempts(user_id, rolled, now)
                .await?;
            println!("You rolled a {} and gained {} extra attempts.", rolled, granted);
        }
    }
    Ok(())
}
