//! Dice duels. The negotiation is the same dance as a trade; once both
//! stakes are down, a coin flip fixes the roll order, each side rolls once,
//! and the loser's card moves to the winner.

use crate::error::{GameError, Result};
use crate::negotiation::{require_phase, Negotiation};
use crate::ports::DiceRoller;
use filmdeck_core::{
    Session, SessionKind, SessionPhase, SessionStore, StatsStore, Storage, UserStore,
};
use rand::Rng;
use uuid::Uuid;

pub struct DuelFlow<'a> {
    negotiation: Negotiation<'a>,
}

/// How a single roll landed. `Resolved` carries the final outcome.
#[derive(Debug, Clone)]
pub enum RollResult {
    /// First roll is in; the other player is up.
    Waiting { session: Session, rolled: i64 },
    Resolved(DuelOutcome),
}

#[derive(Debug, Clone)]
pub struct DuelOutcome {
    pub first_player: i64,
    pub second_player: i64,
    pub first_roll: i64,
    pub second_roll: i64,
    /// `None` on equal rolls; nothing changes hands then.
    pub winner: Option<i64>,
    /// The card that moved, if any.
    pub transferred_card: Option<i64>,
}

impl<'a> DuelFlow<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            negotiation: Negotiation::new(storage, SessionKind::Duel),
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

    /// The initiator locks the duel in. A coin flip decides who rolls
    /// first; from here on the session only accepts rolls.
    pub async fn confirm(&self, session_id: Uuid, user_id: i64) -> Result<Session> {
        let mut session = self.negotiation.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::AwaitingConfirmation)?;
        if session.initiator_id != user_id {
            return Err(GameError::NotAParticipant {
                session_id,
                user_id,
            });
        }
        let counterpart_id = session.counterpart_id.ok_or_else(|| {
            GameError::Internal(format!("Session {} confirmed without counterpart", session.id))
        })?;

        let initiator_first = rand::thread_rng().gen_bool(0.5);
        let (first, second) = if initiator_first {
            (session.initiator_id, counterpart_id)
        } else {
            (counterpart_id, session.initiator_id)
        };
        session.first_player = Some(first);
        session.second_player = Some(second);
        session.phase = SessionPhase::WaitingFirstRoll;
        SessionStore::new(self.negotiation.storage())
            .update(&mut session)
            .await?;

        tracing::info!("Duel {}: user {} rolls first", session.id, first);
        Ok(session)
    }

    /// One roll of the die, strictly in turn order. The second roll settles
    /// the duel: the loser's stake moves, the tallies update, the session
    /// is torn down.
    pub async fn roll(
        &self,
        session_id: Uuid,
        user_id: i64,
        roller: &dyn DiceRoller,
    ) -> Result<RollResult> {
        let mut session = self.negotiation.load(session_id, user_id).await?;
        match session.phase {
            SessionPhase::WaitingFirstRoll => {
                if session.first_player != Some(user_id) {
                    return Err(GameError::WrongTurn);
                }
                let rolled = roller
                    .roll(user_id)
                    .await
                    .map_err(|e| GameError::Internal(format!("Roll failed: {}", e)))?;
                session.first_roll = Some(rolled);
                session.phase = SessionPhase::WaitingSecondRoll;
                SessionStore::new(self.negotiation.storage())
                    .update(&mut session)
                    .await?;
                Ok(RollResult::Waiting { session, rolled })
            }
            SessionPhase::WaitingSecondRoll => {
                if session.second_player != Some(user_id) {
                    return Err(GameError::WrongTurn);
                }
                let rolled = roller
                    .roll(user_id)
                    .await
                    .map_err(|e| GameError::Internal(format!("Roll failed: {}", e)))?;
                session.second_roll = Some(rolled);
                // Claim the settlement through CAS before touching cards.
                SessionStore::new(self.negotiation.storage())
                    .update(&mut session)
                    .await?;
                let outcome = self.settle(&session).await?;
                Ok(RollResult::Resolved(outcome))
            }
            other => Err(GameError::InvalidPhase {
                expected: "a rolling phase",
                found: other,
            }),
        }
    }

    async fn settle(&self, session: &Session) -> Result<DuelOutcome> {
        let (first, second, first_roll, second_roll, offered, response) = match (
            session.first_player,
            session.second_player,
            session.first_roll,
            session.second_roll,
            session.offered_card,
            session.response_card,
        ) {
            (Some(a), Some(b), Some(ra), Some(rb), Some(o), Some(r)) => (a, b, ra, rb, o, r),
            _ => {
                return Err(GameError::Internal(format!(
                    "Session {} settled incomplete",
                    session.id
                )))
            }
        };

        let users = UserStore::new(self.negotiation.storage());
        let stats = StatsStore::new(self.negotiation.storage());

        // The stakes follow the initiator/counterpart split, not the roll
        // order: the initiator staked `offered`, the counterpart `response`.
        let stake_of = |player: i64| {
            if player == session.initiator_id {
                offered
            } else {
                response
            }
        };

        let (winner, transferred) = if first_roll > second_roll {
            let stake = stake_of(second);
            users.transfer_card(second, first, stake).await?;
            stats.record_win(first).await?;
            stats.record_loss(second).await?;
            (Some(first), Some(stake))
        } else if second_roll > first_roll {
            let stake = stake_of(first);
            users.transfer_card(first, second, stake).await?;
            stats.record_win(second).await?;
            stats.record_loss(first).await?;
            (Some(second), Some(stake))
        } else {
            // Equal rolls: nothing moves and nothing is tallied.
            (None, None)
        };

        self.negotiation.finish(session).await?;
        tracing::info!(
            "Duel {} resolved: {} vs {}, winner {:?}",
            session.id,
            first_roll,
            second_roll,
            winner
        );
        Ok(DuelOutcome {
            first_player: first,
            second_player: second,
            first_roll,
            second_roll,
            winner,
            transferred_card: transferred,
        })
    }
}
