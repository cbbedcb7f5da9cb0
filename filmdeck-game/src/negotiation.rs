//! Phase transitions shared by trades and duels: one party picks a card to
//! stake, proposes to a counterpart, and the counterpart answers with a
//! stake of their own. What happens after confirmation differs by kind and
//! lives in [`crate::trade`] and [`crate::duel`].

use crate::error::{GameError, Result};
use filmdeck_core::{
    FilmdeckError, Session, SessionKind, SessionPhase, SessionStore, StateStore, Storage,
    UserStore,
};
use uuid::Uuid;

pub struct Negotiation<'a> {
    storage: &'a Storage,
    kind: SessionKind,
}

impl<'a> Negotiation<'a> {
    pub fn new(storage: &'a Storage, kind: SessionKind) -> Self {
        Self { storage, kind }
    }

    pub fn storage(&self) -> &'a Storage {
        self.storage
    }

    /// Open a fresh session for the initiator. A user can only be in one
    /// negotiation at a time; a pointer at a vanished session is cleaned up
    /// rather than blocking them forever.
    pub async fn begin(&self, initiator_id: i64) -> Result<Session> {
        let states = StateStore::new(self.storage);
        let sessions = SessionStore::new(self.storage);

        if let Some(existing) = states.active_session(initiator_id).await? {
            match sessions.load(existing).await {
                Ok(_) => return Err(GameError::AlreadyInSession),
                Err(FilmdeckError::SessionNotFound(_)) | Err(FilmdeckError::SessionExpired) => {
                    states.clear_active_session(initiator_id).await?;
                }
                Err(other) => return Err(other.into()),
            }
        }

        let session = Session::new(self.kind, initiator_id);
        sessions.insert(&session).await?;
        states.set_active_session(initiator_id, session.id).await?;
        tracing::info!(
            "User {} opened a {} session {}",
            initiator_id,
            self.kind,
            session.id
        );
        Ok(session)
    }

    /// Load the session a user is currently in, checking kind and
    /// membership.
    pub async fn current(&self, user_id: i64) -> Result<Session> {
        let states = StateStore::new(self.storage);
        let id = states
            .active_session(user_id)
            .await?
            .ok_or(FilmdeckError::SessionNotFound(Uuid::nil()))?;
        self.load(id, user_id).await
    }

    pub async fn load(&self, session_id: Uuid, user_id: i64) -> Result<Session> {
        let session = SessionStore::new(self.storage).load(session_id).await?;
        if session.kind != self.kind {
            return Err(GameError::WrongKind(session.kind));
        }
        if !session.is_member(user_id) {
            return Err(GameError::NotAParticipant {
                session_id,
                user_id,
            });
        }
        Ok(session)
    }

    /// Step the browse cursor of whichever party is currently selecting.
    pub async fn move_cursor(&self, session_id: Uuid, user_id: i64, delta: i64) -> Result<Session> {
        let mut session = self.load(session_id, user_id).await?;
        self.require_selector(&session, user_id)?;
        session.cursor += delta;
        SessionStore::new(self.storage).update(&mut session).await?;
        Ok(session)
    }

    /// Stake the initiator's card and start looking for a counterpart.
    pub async fn select_card(
        &self,
        session_id: Uuid,
        user_id: i64,
        card_id: i64,
    ) -> Result<Session> {
        let mut session = self.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::SelectingCard)?;
        if session.initiator_id != user_id {
            return Err(GameError::NotAParticipant {
                session_id,
                user_id,
            });
        }
        self.require_ownership(user_id, card_id).await?;

        session.offered_card = Some(card_id);
        session.cursor = 0;
        session.phase = SessionPhase::AwaitingCounterparty;
        SessionStore::new(self.storage).update(&mut session).await?;
        Ok(session)
    }

    /// Name the counterpart and send them the proposal. The counterpart
    /// picks it up through their own session pointer.
    pub async fn propose_to(
        &self,
        session_id: Uuid,
        user_id: i64,
        counterpart_id: i64,
    ) -> Result<Session> {
        let mut session = self.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::AwaitingCounterparty)?;
        if counterpart_id == session.initiator_id {
            return Err(GameError::SelfTarget);
        }

        let states = StateStore::new(self.storage);
        UserStore::new(self.storage).get(counterpart_id).await?;
        if states.active_session(counterpart_id).await?.is_some() {
            return Err(GameError::AlreadyInSession);
        }

        session.counterpart_id = Some(counterpart_id);
        session.phase = SessionPhase::ProposalSent;
        SessionStore::new(self.storage).update(&mut session).await?;
        states.set_active_session(counterpart_id, session.id).await?;
        Ok(session)
    }

    /// Counterpart turns the proposal down; the session ends here.
    pub async fn reject(&self, session_id: Uuid, user_id: i64) -> Result<()> {
        let session = self.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::ProposalSent)?;
        self.require_counterpart(&session, user_id)?;
        self.finish(&session).await
    }

    /// Counterpart takes the proposal up and starts picking their stake.
    pub async fn accept(&self, session_id: Uuid, user_id: i64) -> Result<Session> {
        let mut session = self.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::ProposalSent)?;
        self.require_counterpart(&session, user_id)?;

        session.phase = SessionPhase::CounterpartySelecting;
        session.cursor = 0;
        SessionStore::new(self.storage).update(&mut session).await?;
        Ok(session)
    }

    /// Counterpart stakes their card; the ball goes back to the initiator.
    pub async fn select_response(
        &self,
        session_id: Uuid,
        user_id: i64,
        card_id: i64,
    ) -> Result<Session> {
        let mut session = self.load(session_id, user_id).await?;
        require_phase(&session, SessionPhase::CounterpartySelecting)?;
        self.require_counterpart(&session, user_id)?;
        self.require_ownership(user_id, card_id).await?;

        session.response_card = Some(card_id);
        session.phase = SessionPhase::AwaitingConfirmation;
        SessionStore::new(self.storage).update(&mut session).await?;
        Ok(session)
    }

    /// Either party walks away at any point before resolution.
    pub async fn cancel(&self, session_id: Uuid, user_id: i64) -> Result<()> {
        let session = self.load(session_id, user_id).await?;
        self.finish(&session).await
    }

    /// Tear the session down: row deleted, both pointers cleared.
    pub(crate) async fn finish(&self, session: &Session) -> Result<()> {
        SessionStore::new(self.storage).delete(session.id).await?;
        Ok(())
    }

    pub(crate) async fn require_ownership(&self, user_id: i64, card_id: i64) -> Result<()> {
        let user = UserStore::new(self.storage).get(user_id).await?;
        if user.cards.contains(&card_id) {
            Ok(())
        } else {
            Err(FilmdeckError::CardNotOwned { user_id, card_id }.into())
        }
    }

    pub(crate) fn require_counterpart(&self, session: &Session, user_id: i64) -> Result<()> {
        if session.counterpart_id == Some(user_id) {
            Ok(())
        } else {
            Err(GameError::NotAParticipant {
                session_id: session.id,
                user_id,
            })
        }
    }

    fn require_selector(&self, session: &Session, user_id: i64) -> Result<()> {
        let selector = match session.phase {
            SessionPhase::SelectingCard => Some(session.initiator_id),
            SessionPhase::CounterpartySelecting => session.counterpart_id,
            _ => None,
        };
        if selector == Some(user_id) {
            Ok(())
        } else {
            Err(GameError::InvalidPhase {
                expected: "a selection phase",
                found: session.phase,
            })
        }
    }
}

pub(crate) fn require_phase(session: &Session, expected: SessionPhase) -> Result<()> {
    if session.phase == expected {
        Ok(())
    } else {
        Err(GameError::InvalidPhase {
            expected: expected.as_str(),
            found: session.phase,
        })
    }
}
