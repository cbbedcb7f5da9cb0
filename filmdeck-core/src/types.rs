use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wall-clock format used for pass expiries in the users table.
pub const PASS_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Day-agnostic format used for the last-draw stamp.
pub const DRAW_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Base,
    Medium,
    Episode,
    Muth,
    Legendary,
    Limited,
}

impl Rarity {
    pub const ALL: [Rarity; 6] = [
        Rarity::Base,
        Rarity::Medium,
        Rarity::Episode,
        Rarity::Muth,
        Rarity::Legendary,
        Rarity::Limited,
    ];

    /// Tiers eligible for the weighted random draw, with their fixed weights.
    pub const DRAW_WEIGHTS: [(Rarity, f64); 5] = [
        (Rarity::Base, 0.35),
        (Rarity::Medium, 0.25),
        (Rarity::Episode, 0.20),
        (Rarity::Muth, 0.15),
        (Rarity::Legendary, 0.05),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Base => "Base",
            Rarity::Medium => "Medium",
            Rarity::Episode => "Episode",
            Rarity::Muth => "Muth",
            Rarity::Legendary => "Legendary",
            Rarity::Limited => "Limited",
        }
    }

    /// Points awarded when a card of this tier is drawn, and its shop price.
    pub fn points(&self) -> i64 {
        match self {
            Rarity::Base => 250,
            Rarity::Medium => 350,
            Rarity::Episode => 500,
            Rarity::Muth => 1500,
            Rarity::Legendary => 3000,
            Rarity::Limited => 10000,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Rarity::Base),
            "medium" => Ok(Rarity::Medium),
            "episode" => Ok(Rarity::Episode),
            "muth" => Ok(Rarity::Muth),
            "legendary" => Ok(Rarity::Legendary),
            "limited" => Ok(Rarity::Limited),
            other => Err(format!("unknown rarity: {}", other)),
        }
    }
}

/// Catalog entry. Identity is immutable after creation; only `stock`
/// changes during normal operation (decremented by successful draws).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub card_id: i64,
    pub name: String,
    pub image_url: String,
    pub limited: bool,
    pub rarity: Rarity,
    pub points: i64,
    pub price: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    /// Owned card ids as a multiset; the same id may appear more than once.
    pub cards: Vec<i64>,
    pub points: i64,
    pub shop_points: i64,
    pub season_points: i64,
    pub donate: i64,
    pub family: Option<String>,
    pub pass_expiry: Option<NaiveDateTime>,
    /// Remaining draw attempts; -1 is the ban sentinel.
    pub attempts: i64,
    pub dice_rolls_count: i64,
    /// `%Y-%m` token of the month the roll counter was last reset.
    pub last_dice_roll_month: Option<String>,
}

impl User {
    pub fn is_banned(&self) -> bool {
        self.attempts == -1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub leader_id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    /// Member ids in join order; the leader is always present.
    pub members: Vec<i64>,
    pub points: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DuelStats {
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
}

impl DuelStats {
    pub fn win_rate(&self) -> u32 {
        if self.games == 0 {
            0
        } else {
            ((self.wins as f64 / self.games as f64) * 100.0).round() as u32
        }
    }
}

/// Leaderboard row: user id, handle if known, score.
#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: Option<String>,
    pub score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_round_trips_through_str() {
        for rarity in Rarity::ALL {
            assert_eq!(rarity.as_str().parse::<Rarity>().unwrap(), rarity);
        }
        assert!("Epic".parse::<Rarity>().is_err());
    }

    #[test]
    fn draw_weights_sum_to_one() {
        let total: f64 = Rarity::DRAW_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn win_rate_rounds() {
        let stats = DuelStats {
            games: 3,
            wins: 2,
            losses: 1,
        };
        assert_eq!(stats.win_rate(), 67);
        assert_eq!(DuelStats::default().win_rate(), 0);
    }
}
