//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! Functions take the pool (and the object store where media is involved)
//! plus the authenticated user id; none of them read ambient auth state.

pub mod auth;
pub mod chat;
pub mod community;
pub mod course;
pub mod leaderboard;
pub mod lecture;
pub mod play;
pub mod quiz;
pub mod resource;
pub mod session;
pub mod storage;
pub mod study_plan;
pub mod upload;
pub mod user;

use sqlx::PgPool;
use uuid::Uuid;

/// Result of an ownership lookup on a table with `id` and `user_id` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ownership {
    Owner,
    NotOwner,
    Missing(Uuid),
}

impl Ownership {
    /// `table` must be a trusted identifier, never user input.
    pub(crate) async fn check(pool: &PgPool, table: &'static str, id: Uuid, user_id: Uuid) -> Result<Self, sqlx::Error> {
        let owner: Option<Uuid> = sqlx::query_scalar(&format!("SELECT user_id FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(match owner {
            None => Self::Missing(id),
            Some(owner) if owner == user_id => Self::Owner,
            Some(_) => Self::NotOwner,
        })
    }

    /// Map to a service error.
    pub(crate) fn require<E>(self, forbidden: E, missing: impl FnOnce(Uuid) -> E) -> Result<(), E> {
        match self {
            Self::Owner => Ok(()),
            Self::NotOwner => Err(forbidden),
            Self::Missing(id) => Err(missing(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_maps_each_outcome() {
        let id = Uuid::new_v4();
        assert_eq!(Ownership::Owner.require("forbidden", |_| "missing"), Ok(()));
        assert_eq!(Ownership::NotOwner.require("forbidden", |_| "missing"), Err("forbidden"));
        assert_eq!(Ownership::Missing(id).require(None, Some), Err(Some(id)));
    }
}
