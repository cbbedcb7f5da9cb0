//! Background task that tells pass holders when their draw cooldown is up.
//! Delivery failures are logged and dropped; the loop never dies over them.

use crate::ports::Presenter;
use chrono::{Local, NaiveTime};
use filmdeck_core::rewards::{elapsed_since, COOLDOWN_WITH_PASS};
use filmdeck_core::{StateStore, Storage, UserStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct CooldownNotifier {
    storage: Arc<Storage>,
    presenter: Arc<dyn Presenter>,
    poll_interval: Duration,
    /// Last draw time we already notified each user about, so a user is
    /// pinged once per cooldown, not once per poll.
    notified: HashMap<i64, NaiveTime>,
}

impl CooldownNotifier {
    pub fn new(storage: Arc<Storage>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            storage,
            presenter,
            poll_interval: DEFAULT_POLL_INTERVAL,
            notified: HashMap::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run forever. Spawn this on the runtime and forget about it.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                tracing::warn!("Cooldown sweep failed: {}", e);
            }
        }
    }

    /// One pass over the pass holders. Public so tests can drive it
    /// without the timer.
    pub async fn sweep(&mut self) -> filmdeck_core::Result<()> {
        let now = Local::now().naive_local();
        self.sweep_at(now.time(), now).await
    }

    pub async fn sweep_at(
        &mut self,
        now_time: NaiveTime,
        now: chrono::NaiveDateTime,
    ) -> filmdeck_core::Result<()> {
        let users = UserStore::new(&self.storage);
        let states = StateStore::new(&self.storage);

        for user_id in users.users_with_active_pass(now).await? {
            let Some(last_draw) = states.last_draw(user_id).await? else {
                continue;
            };
            if elapsed_since(last_draw, now_time) < COOLDOWN_WITH_PASS {
                continue;
            }
            if self.notified.get(&user_id) == Some(&last_draw) {
                continue;
            }

            if let Err(e) = self
                .presenter
                .send_text(user_id, "Your next card is ready to draw!")
                .await
            {
                tracing::warn!("Could not notify user {}: {}", user_id, e);
                continue;
            }
            self.notified.insert(user_id, last_draw);
            tracing::debug!("Notified user {} that the cooldown is over", user_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Presenter;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use filmdeck_core::Card;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPresenter {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Presenter for RecordingPresenter {
        async fn send_text(&self, user_id: i64, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((user_id, text.to_string()));
            Ok(())
        }

        async fn send_card(&self, _user_id: i64, _card: &Card) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send_menu(
            &self,
            _user_id: i64,
            _prompt: &str,
            _options: &[String],
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn notifies_once_per_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::open(&dir.path().join("deck.db")).await.unwrap());

        let users = UserStore::new(&storage);
        users.ensure(1, Some("alice")).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        users
            .set_pass_expiry(1, day.succ_opt().unwrap().and_hms_opt(0, 0, 0).unwrap())
            .await
            .unwrap();
        StateStore::new(&storage)
            .set_last_draw(1, t(8, 0))
            .await
            .unwrap();

        let presenter = Arc::new(RecordingPresenter::default());
        let mut notifier = CooldownNotifier::new(storage.clone(), presenter.clone());

        // Cooldown still running: nothing goes out.
        let noon = day.and_hms_opt(9, 0, 0).unwrap();
        notifier.sweep_at(t(9, 0), noon).await.unwrap();
        assert!(presenter.sent.lock().unwrap().is_empty());

        // Cooldown over: exactly one notification, even across repeat polls.
        let later = day.and_hms_opt(10, 30, 0).unwrap();
        notifier.sweep_at(t(10, 30), later).await.unwrap();
        notifier.sweep_at(t(10, 31), later).await.unwrap();
        assert_eq!(presenter.sent.lock().unwrap().len(), 1);

        // A fresh draw re-arms it.
        StateStore::new(&storage)
            .set_last_draw(1, t(11, 0))
            .await
            .unwrap();
        notifier.sweep_at(t(13, 30), later).await.unwrap();
        assert_eq!(presenter.sent.lock().unwrap().len(), 2);
    }
}
