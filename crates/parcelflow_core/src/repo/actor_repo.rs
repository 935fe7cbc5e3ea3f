//! Display-name lookup for actor ids recorded on packages.
//!
//! Identity itself lives outside this crate; the `actors` table is a local
//! projection used only to render creator names on board cards.

use crate::repo::package_repo::StoreResult;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashMap;

pub struct SqliteActorRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActorRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Inserts or renames one actor.
    pub fn upsert_actor(&self, actor_id: &str, display_name: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO actors (id, display_name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name;",
            params![actor_id, display_name],
        )?;
        Ok(())
    }

    /// Resolves display names for the given ids. Unknown ids are absent from
    /// the returned map.
    pub fn display_names(&self, actor_ids: &[String]) -> StoreResult<HashMap<String, String>> {
        if actor_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; actor_ids.len()].join(", ");
        let sql = format!("SELECT id, display_name FROM actors WHERE id IN ({placeholders});");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(
            actor_ids.iter().map(|id| Value::Text(id.clone())),
        ))?;

        let mut names = HashMap::new();
        while let Some(row) = rows.next()? {
            names.insert(row.get(0)?, row.get(1)?);
        }
        Ok(names)
    }
}
