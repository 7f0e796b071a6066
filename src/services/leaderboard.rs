//! Leaderboard ranking.
//!
//! Users are ordered by score descending with ties broken by id ascending,
//! so equal scores always come back in the same order. The top three form
//! the podium; everyone after is ranked `index + 4` within the remainder.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

pub const MAX_LIMIT: i64 = 500;
pub const PODIUM_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ScoreRow {
    pub id: Uuid,
    pub full_name: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub id: Uuid,
    pub full_name: String,
    pub score: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    pub podium: Vec<RankedEntry>,
    pub rest: Vec<RankedEntry>,
}

impl Leaderboard {
    /// All entries in rank order.
    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = &RankedEntry> {
        self.podium.iter().chain(self.rest.iter())
    }
}

/// Order rows and assign ranks. Input order does not matter.
#[must_use]
pub fn rank(mut rows: Vec<ScoreRow>) -> Leaderboard {
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

    let mut board = Leaderboard::default();
    for (index, row) in rows.into_iter().enumerate() {
        let entry = RankedEntry { rank: index + 1, id: row.id, full_name: row.full_name, score: row.score };
        if index < PODIUM_SIZE {
            board.podium.push(entry);
        } else {
            board.rest.push(entry);
        }
    }
    board
}

/// Clamp a requested size to `1..=MAX_LIMIT`, falling back to `default`.
#[must_use]
pub fn effective_limit(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, MAX_LIMIT)
}

/// Load the top `limit` users and rank them.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn load(pool: &PgPool, limit: i64) -> Result<Leaderboard, sqlx::Error> {
    let rows = sqlx::query_as::<_, ScoreRow>(
        "SELECT id, full_name, score FROM users ORDER BY score DESC, id ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rank(rows))
}

#[cfg(test)]
#[path = "leaderboard_test.rs"]
mod tests;
