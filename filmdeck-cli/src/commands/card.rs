use super::Context;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use filmdeck_core::{CardStore, NewCard, Rarity};

#[derive(Subcommand)]
pub enum CardCommands {
    /// Add a card to the catalog
    Add {
        /// Card name
        name: String,
        /// Artwork URL
        #[arg(long)]
        image_url: String,
        /// Rarity tier (base, medium, episode, muth, legendary, limited)
        #[arg(short, long, default_value = "base")]
        rarity: String,
        /// Shop price; 0 keeps it out of the shop
        #[arg(short, long, default_value_t = 0)]
        price: i64,
        /// Copies available for drawing
        #[arg(short, long, default_value_t = 100)]
        stock: i64,
    },
    /// List the whole catalog
    List,
    /// Remove a card from the catalog
    Delete {
        /// Card id
        card_id: i64,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_card_command(cmd: CardCommands, ctx: &Context) -> anyhow::Result<()> {
    ctx.require_admin()?;
    let cards = CardStore::new(&ctx.storage);

    match cmd {
        CardCommands::Add {
            name,
            image_url,
            rarity,
            price,
            stock,
        } => {
            let rarity: Rarity = rarity
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let limited = rarity == Rarity::Limited;
            let card_id = cards
                .add(&NewCard {
                    name: name.clone(),
                    image_url,
                    limited,
                    rarity,
                    points: rarity.points(),
                    price,
                    stock,
                })
                .await?;
            println!("Added card {} '{}' ({}, {} in stock)", card_id, name, rarity, stock);
        }

        CardCommands::List => {
            let all = cards.list_all().await?;
            if all.is_empty() {
                println!("The catalog is empty.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Rarity", "Points", "Price", "Stock", "Limited"]);
            for card in all {
                table.add_row(vec![
                    card.card_id.to_string(),
                    card.name,
                    card.rarity.to_string(),
                    card.points.to_string(),
                    card.price.to_string(),
                    card.stock.to_string(),
                    if card.limited { "yes" } else { "no" }.to_string(),
                ]);
            }
            println!("{}", table);
        }

        CardCommands::Delete { card_id, force } => {
            let card = cards.get(card_id).await?;
            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete card {} '{}'?", card_id, card.name))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            cards.delete(card_id).await?;
            println!("Deleted card {} '{}'", card_id, card.name);
            println!("Copies already in collections stay until pruned.");
        }
    }
    Ok(())
}
