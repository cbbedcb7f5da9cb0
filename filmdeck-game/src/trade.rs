//! Card-for-card trades. All the back-and-forth is the shared negotiation;
//! the only trade-specific step is the final swap.

use crate::error::{GameError, Result};
use crate::negotiation::{require_phase, Negotiation};
use filmdeck_core::{Session, SessionKind, SessionPhase, SessionStore, Storage, UserStore};
use uuid::Uuid;

pub struct TradeFlow<'a> {
    negotiation: Negotiation<'a>,
}

/// What changed hands when a trade resolved.
#[derive(Debug, Clone, Copy)]
pub struct TradeOutcome {
    pub initiator_id: i64,
    pub counterpart_id: i64,
    /// Initiator's card, now with the counterpart.
    pub offered_card: i64,
    /// Counterpart's card, now with the initiator.
    pub response_card: i64,
}

impl<'a> TradeFlow<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            negotiation: Negotiation::new(storage, SessionKind::Trade),
        }
    }

    pub async fn begin(&self, initiator_id: i64) -> Result<Session> {
        self.negotiation.begin(initiator_id).await
    }

    pub async fn current(&self, user_id: i64) -> Result<Session> {
        self.negotiation.current(user_id).await
    }

    pub async fn move_cursor(&self, session_id: Uuid, user_id: i64, delta: i64) -> Result<Session> {
        self.negotiation.move_cursor(session_id, user_id, delta).await
    }

    pub async fn select_card(
        &self,
        session_id: Uuid,
        user_id: i64,
        card_id: i64,
    ) -> Result<Session> {
        self.negotiation.select_card(session_id, user_id, card_id).await
    }

    pub async fn propose_to(
        &self,
        session_id: Uuid,
        user_id: i64,
        counterpart_id: i64,
    ) -> Result<Session> {
        self.negotiation
            .propose_to(session_id, user_id, counterpart_id)
            .await
    }

    pub async fn accept(&self, session_id: Uuid, user_id: i64) -> Result<Session> {
        self.negotiation.accept(session_id, user_id).await
    }

    pub async fn reject(&self, session_id: Uuid, user_id: i64) -> Result<()> {
        self.negotiation.reject(session_id, user_id).await
    }

    pub async fn select_response(
        &self,
        session_id: Uuid,
        user_id: i64,
        card_id: i64,
    ) -> Result<Session> {
        self.negotiation
            .select_response(session_id, user_id, card_id)
            .await
    }

    pub async fn cancel(&self, session_id: Uuid, user_id: i64) -> Result<()> {
        self.negotiation.cancel(session_id, user_id).await
    }

    /// The initiator signs off and the swap commits atomically. Both sides
    /// keep their card if anything fails in between.
    pub async fn confirm(&self, session_id: Uuid, user_id: i64) -> Result<TradeOutcome> {
        let session = self.negotiation.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::AwaitingConfirmation)?;
        if session.initiator_id != user_id {
            return Err(GameError::NotAParticipant {
                session_id,
                user_id,
            });
        }

        // Both set by the time the phase check passed.
        let (counterpart_id, offered, response) = match (
            session.counterpart_id,
            session.offered_card,
            session.response_card,
        ) {
            (Some(c), Some(o), Some(r)) => (c, o, r),
            _ => {
                return Err(GameError::Internal(format!(
                    "Session {} reached confirmation incomplete",
                    session.id
                )))
            }
        };

        // Mark the session resolved first so a concurrent confirm loses the
        // CAS race instead of swapping twice.
        let mut resolved = session.clone();
        SessionStore::new(self.negotiation.storage())
            .update(&mut resolved)
            .await?;

        UserStore::new(self.negotiation.storage())
            .trade_cards(session.initiator_id, counterpart_id, offered, response)
            .await?;
        self.negotiation.finish(&session).await?;

        tracing::info!(
            "Trade {} resolved: card {} <-> card {}",
            session.id,
            offered,
            response
        );
        Ok(TradeOutcome {
            initiator_id: session.initiator_id,
            counterpart_id,
            offered_card: offered,
            response_card: response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filmdeck_core::storage::card_store::NewCard;
    use filmdeck_core::{CardStore, FilmdeckError, Rarity, StateStore};

    async fn setup() -> (tempfile::TempDir, Storage, i64, i64) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("deck.db")).await.unwrap();

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();
        users.ensure(2, Some("bob")).await.unwrap();

        let cards = CardStore::new(&storage);
        let mut ids = Vec::new();
        for name in ["hers", "his"] {
            ids.push(
                cards
                    .add(&NewCard {
                        name: name.to_string(),
                        image_url: format!("https://cards.example/{}.png", name),
                        limited: false,
                        rarity: Rarity::Base,
                        points: 250,
                        price: 0,
                        stock: 10,
                    })
                    .await
                    .unwrap(),
            );
        }
        users.write_cards(1, &[ids[0]]).await.unwrap();
        users.write_cards(2, &[ids[1]]).await.unwrap();
        (dir, storage, ids[0], ids[1])
    }

    #[tokio::test]
    async fn full_trade_swaps_the_stakes() {
        let (_dir, storage, card_a, card_b) = setup().await;
        let flow = TradeFlow::new(&storage);

        let session = flow.begin(1).await.unwrap();
        flow.select_card(session.id, 1, card_a).await.unwrap();
        flow.propose_to(session.id, 1, 2).await.unwrap();

        // Bob finds the proposal through his own pointer.
        let seen = flow.current(2).await.unwrap();
        assert_eq!(seen.id, session.id);

        flow.accept(session.id, 2).await.unwrap();
        flow.select_response(session.id, 2, card_b).await.unwrap();
        let outcome = flow.confirm(session.id, 1).await.unwrap();
        assert_eq!(outcome.offered_card, card_a);
        assert_eq!(outcome.response_card, card_b);

        let users = UserStore::new(&storage);
        assert_eq!(users.get(1).await.unwrap().cards, vec![card_b]);
        assert_eq!(users.get(2).await.unwrap().cards, vec![card_a]);

        // Session is gone and both pointers are cleared.
        let states = StateStore::new(&storage);
        assert_eq!(states.active_session(1).await.unwrap(), None);
        assert_eq!(states.active_session(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejection_ends_the_session_without_moving_cards() {
        let (_dir, storage, card_a, _card_b) = setup().await;
        let flow = TradeFlow::new(&storage);

        let session = flow.begin(1).await.unwrap();
        flow.select_card(session.id, 1, card_a).await.unwrap();
        flow.propose_to(session.id, 1, 2).await.unwrap();
        flow.reject(session.id, 2).await.unwrap();

        let users = UserStore::new(&storage);
        assert_eq!(users.get(1).await.unwrap().cards, vec![card_a]);
        assert!(matches!(
            flow.current(1).await,
            Err(GameError::Core(FilmdeckError::SessionNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn cannot_stake_a_card_you_do_not_own() {
        let (_dir, storage, _card_a, card_b) = setup().await;
        let flow = TradeFlow::new(&storage);

        let session = flow.begin(1).await.unwrap();
        assert!(matches!(
            flow.select_card(session.id, 1, card_b).await,
            Err(GameError::Core(FilmdeckError::CardNotOwned { .. }))
        ));
    }

    #[tokio::test]
    async fn cannot_trade_with_yourself() {
        let (_dir, storage, card_a, _card_b) = setup().await;
        let flow = TradeFlow::new(&storage);

        let session = flow.begin(1).await.unwrap();
        flow.select_card(session.id, 1, card_a).await.unwrap();
        assert!(matches!(
            flow.propose_to(session.id, 1, 1).await,
            Err(GameError::SelfTarget)
        ));
    }

    #[tokio::test]
    async fn one_session_at_a_time() {
        let (_dir, storage, _card_a, _card_b) = setup().await;
        let flow = TradeFlow::new(&storage);

        flow.begin(1).await.unwrap();
        assert!(matches!(flow.begin(1).await, Err(GameError::AlreadyInSession)));
    }

    #[tokio::test]
    async fn out_of_order_transitions_are_refused() {
        let (_dir, storage, card_a, _card_b) = setup().await;
        let flow = TradeFlow::new(&storage);

        let session = flow.begin(1).await.unwrap();
        // Confirming before anything was staked.
        assert!(matches!(
            flow.confirm(session.id, 1).await,
            Err(GameError::InvalidPhase { .. })
        ));
        flow.select_card(session.id, 1, card_a).await.unwrap();
        // Accepting a proposal that was never sent.
        assert!(matches!(
            flow.accept(session.id, 1).await,
            Err(GameError::InvalidPhase { .. })
        ));
    }
}
