use super::Context;
use async_trait::async_trait;
use clap::Subcommand;
use dialoguer::{Confirm, Select};
use filmdeck_core::{Card, CollectionManager};
use filmdeck_game::{DuelFlow, Presenter, RandomRoller, RollResult, TradeFlow};

#[derive(Subcommand)]
pub enum PlayCommands {
    /// Run a card trade with another user, driving both sides
    Trade {
        /// Counterpart user id
        with: i64,
    },
    /// Run a dice duel with another user, driving both sides
    Duel {
        /// Counterpart user id
        with: i64,
    },
}

/// Presenter that prints to the terminal; stands in for a chat platform.
pub struct ConsolePresenter;

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn send_text(&self, user_id: i64, text: &str) -> anyhow::Result<()> {
        println!("[to {}] {}", user_id, text);
        Ok(())
    }

    async fn send_card(&self, user_id: i64, card: &Card) -> anyhow::Result<()> {
        println!("[to {}] '{}' ({}) {}", user_id, card.name, card.rarity, card.image_url);
        Ok(())
    }

    async fn send_menu(
        &self,
        user_id: i64,
        prompt: &str,
        options: &[String],
    ) -> anyhow::Result<()> {
        println!("[to {}] {} ({})", user_id, prompt, options.join(" / "));
        Ok(())
    }
}

async fn pick_card(ctx: &Context, user_id: i64, prompt: &str) -> anyhow::Result<i64> {
    let distinct = CollectionManager::new(&ctx.storage).distinct(user_id).await?;
    if distinct.is_empty() {
        anyhow::bail!("User {} has no cards to stake", user_id);
    }
    let labels: Vec<String> = distinct
        .iter()
        .map(|(card, copies)| format!("{} ({}) x{}", card.name, card.rarity, copies))
        .collect();
    let choice = Select::new()
        .with_prompt(format!("{} (user {})", prompt, user_id))
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(distinct[choice].0.card_id)
}

pub async fn handle_play_command(cmd: PlayCommands, ctx: &Context) -> anyhow::Result<()> {
    let initiator = ctx.acting_user()?;
    let presenter = ConsolePresenter;

    match cmd {
        PlayCommands::Trade { with } => {
            let flow = TradeFlow::new(&ctx.storage);
            let session = flow.begin(initiator).await?;

            let stake = pick_card(ctx, initiator, "Pick your card to trade").await?;
            flow.select_card(session.id, initiator, stake).await?;
            flow.propose_to(session.id, initiator, with).await?;
            presenter
                .send_text(with, &format!("User {} proposes a trade.", initiator))
                .await
                .ok();

            let accepted = Confirm::new()
                .with_prompt(format!("User {}: accept the trade?", with))
                .default(true)
                .interact()?;
            if !accepted {
                flow.reject(session.id, with).await?;
                println!("Trade rejected.");
                return Ok(());
            }
            flow.accept(session.id, with).await?;

            let response = pick_card(ctx, with, "Pick your card in return").await?;
            flow.select_response(session.id, with, response).await?;

            let confirmed = Confirm::new()
                .with_prompt(format!("User {}: confirm the swap?", initiator))
                .default(true)
                .interact()?;
            if !confirmed {
                flow.cancel(session.id, initiator).await?;
                println!("Trade cancelled.");
                return Ok(());
            }
            let outcome = flow.confirm(session.id, initiator).await?;
            println!(
                "Trade done: card {} went to user {}, card {} to user {}.",
                outcome.offered_card,
                outcome.counterpart_id,
                outcome.response_card,
                outcome.initiator_id
            );
        }

        PlayCommands::Duel { with } => {
            let flow = DuelFlow::new(&ctx.storage);
            let roller = RandomRoller;
            let session = flow.begin(initiator).await?;

            let stake = pick_card(ctx, initiator, "Pick your card to stake").await?;
            flow.select_card(session.id, initiator, stake).await?;
            flow.propose_to(session.id, initiator, with).await?;
            presenter
                .send_text(with, &format!("User {} challenges you to a duel.", initiator))
                .await
                .ok();

            let accepted = Confirm::new()
                .with_prompt(format!("User {}: accept the duel?", with))
                .default(true)
                .interact()?;
            if !accepted {
                flow.reject(session.id, with).await?;
                println!("Duel declined.");
                return Ok(());
            }
            flow.accept(session.id, with).await?;

            let response = pick_card(ctx, with, "Pick your card to stake").await?;
            flow.select_response(session.id, with, response).await?;

            let session = flow.confirm(session.id, initiator).await?;
            let first = session
                .first_player
                .ok_or_else(|| anyhow::anyhow!("Duel has no first player"))?;
            let second = session
                .second_player
                .ok_or_else(|| anyhow::anyhow!("Duel has no second player"))?;
            println!("Coin flip: user {} rolls first.", first);

            let mid = flow.roll(session.id, first, &roller).await?;
            if let RollResult::Waiting { rolled, .. } = &mid {
                println!("User {} rolls a {}.", first, rolled);
            }
            let done = flow.roll(session.id, second, &roller).await?;
            let RollResult::Resolved(outcome) = done else {
                anyhow::bail!("Duel did not resolve after the second roll");
            };
            println!("User {} rolls a {}.", second, outcome.second_roll);

            match outcome.winner {
                Some(winner) => {
                    let card = outcome
                        .transferred_card
                        .map(|id| id.to_string())
                        .unwrap_or_default();
                    println!("User {} wins and takes card {}!", winner, card);
                }
                None => println!("A draw; both cards stay put."),
            }
        }
    }
    Ok(())
}
