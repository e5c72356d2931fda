//! SQLite-backed identity store.
//!
//! Single write connection behind a mutex. All identity operations are
//! short point lookups or small transactions, so no read pool is needed.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::normalize::normalize;

use super::models::{
    PlatformAssociation, PlatformTag, Provenance, UniversalTrackIdentity,
};
use super::schema;
use super::trait_def::{AssociationUpdate, CreateOutcome, IdentityStore, StoreError};

pub struct SqliteIdentityStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIdentityStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Operation(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| StoreError::Operation(e.to_string()))?;
        schema::initialize(&conn)?;
        info!(path = %path.display(), "identity db ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("identity db lock poisoned".to_string()))
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Operation(e.to_string())
}

fn timestamp_from_db(epoch_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch_secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn load_identity(
    conn: &Connection,
    canonical_id: &str,
) -> Result<Option<UniversalTrackIdentity>, StoreError> {
    let row = conn
        .query_row(
            "SELECT canonical_id, title, artist, album, duration_secs,
                    standard_code, confidence, method, updated_at
             FROM identities WHERE canonical_id = ?1",
            params![canonical_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, i64>(8)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    let Some((id, title, artist, album, duration_secs, standard_code, confidence, method, updated_at)) =
        row
    else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare("SELECT platform, platform_id FROM associations WHERE canonical_id = ?1")
        .map_err(db_err)?;
    let associations = stmt
        .query_map(params![id], |row| {
            Ok(PlatformAssociation {
                platform: PlatformTag::new(&row.get::<_, String>(0)?),
                platform_id: row.get(1)?,
            })
        })
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;

    Ok(Some(UniversalTrackIdentity {
        canonical_id: id,
        title,
        artist,
        album,
        duration_secs,
        associations,
        standard_code,
        confidence,
        method: Provenance::from_db_str(&method),
        updated_at: timestamp_from_db(updated_at),
    }))
}

fn canonical_id_for_platform(
    conn: &Connection,
    platform: &PlatformTag,
    platform_id: &str,
) -> Result<Option<String>, StoreError> {
    conn.query_row(
        "SELECT canonical_id FROM associations WHERE platform = ?1 AND platform_id = ?2",
        params![platform.as_str(), platform_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
}

fn canonical_id_for_code(conn: &Connection, code: &str) -> Result<Option<String>, StoreError> {
    conn.query_row(
        "SELECT canonical_id FROM identities WHERE standard_code = ?1",
        params![code],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
}

fn insert_identity(tx: &Transaction<'_>, identity: &UniversalTrackIdentity) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO identities
            (canonical_id, title, artist, artist_key, album, duration_secs,
             standard_code, confidence, method, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            identity.canonical_id,
            identity.title,
            identity.artist,
            normalize(&identity.artist),
            identity.album,
            identity.duration_secs,
            identity.standard_code,
            identity.confidence,
            identity.method.to_db_str(),
            identity.updated_at.timestamp(),
        ],
    )
    .map_err(db_err)?;
    for assoc in &identity.associations {
        tx.execute(
            "INSERT INTO associations (canonical_id, platform, platform_id) VALUES (?1, ?2, ?3)",
            params![
                identity.canonical_id,
                assoc.platform.as_str(),
                assoc.platform_id
            ],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn find_by_platform_id(
        &self,
        platform: &PlatformTag,
        platform_id: &str,
    ) -> Result<Option<UniversalTrackIdentity>, StoreError> {
        let conn = self.lock()?;
        match canonical_id_for_platform(&conn, platform, platform_id)? {
            Some(id) => load_identity(&conn, &id),
            None => Ok(None),
        }
    }

    async fn find_by_standard_code(
        &self,
        code: &str,
    ) -> Result<Option<UniversalTrackIdentity>, StoreError> {
        let conn = self.lock()?;
        match canonical_id_for_code(&conn, code)? {
            Some(id) => load_identity(&conn, &id),
            None => Ok(None),
        }
    }

    async fn find_candidates_by_normalized_artist(
        &self,
        artist_key: &str,
        limit: usize,
    ) -> Result<Vec<UniversalTrackIdentity>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT canonical_id FROM identities
                 WHERE artist_key = ?1
                 ORDER BY updated_at DESC
                 LIMIT ?2",
            )
            .map_err(db_err)?;
        let ids: Vec<String> = stmt
            .query_map(params![artist_key, limit as i64], |row| row.get(0))
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        let mut candidates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(identity) = load_identity(&conn, &id)? {
                candidates.push(identity);
            }
        }
        Ok(candidates)
    }

    async fn create(
        &self,
        identity: &UniversalTrackIdentity,
    ) -> Result<CreateOutcome, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        // Somebody may have created this identity between our lookup miss
        // and now. The unique keys decide, inside the transaction.
        for assoc in &identity.associations {
            if let Some(existing_id) =
                canonical_id_for_platform(&tx, &assoc.platform, &assoc.platform_id)?
            {
                let existing = load_identity(&tx, &existing_id)?.ok_or_else(|| {
                    StoreError::Operation("association points at missing identity".to_string())
                })?;
                return Ok(CreateOutcome::Existing(existing));
            }
        }
        if let Some(code) = identity.standard_code.as_deref() {
            if let Some(existing_id) = canonical_id_for_code(&tx, code)? {
                let existing = load_identity(&tx, &existing_id)?.ok_or_else(|| {
                    StoreError::Operation("standard code points at missing identity".to_string())
                })?;
                return Ok(CreateOutcome::Existing(existing));
            }
        }

        insert_identity(&tx, identity)?;
        tx.commit().map_err(db_err)?;
        Ok(CreateOutcome::Created)
    }

    async fn add_association(
        &self,
        canonical_id: &str,
        update: AssociationUpdate<'_>,
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM identities WHERE canonical_id = ?1",
                params![canonical_id],
                |_| Ok(true),
            )
            .optional()
            .map_err(db_err)?
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::Operation(format!(
                "unknown canonical id: {}",
                canonical_id
            )));
        }

        let mut attached = 0;

        if let Some(platform_id) = update.platform_id {
            // First claim wins, a second descriptor with the same pair
            // leaves the existing mapping untouched.
            attached += tx
                .execute(
                    "INSERT OR IGNORE INTO associations (canonical_id, platform, platform_id)
                     VALUES (?1, ?2, ?3)",
                    params![canonical_id, update.platform.as_str(), platform_id],
                )
                .map_err(db_err)?;
        }

        if let Some(code) = update.standard_code {
            attached += tx
                .execute(
                    "UPDATE identities SET standard_code = ?1
                     WHERE canonical_id = ?2
                       AND standard_code IS NULL
                       AND NOT EXISTS (SELECT 1 FROM identities WHERE standard_code = ?1)",
                    params![code, canonical_id],
                )
                .map_err(db_err)?;
        }

        // Merge metadata reflects writes that actually took effect; a
        // fully-redundant update leaves the record untouched.
        if attached > 0 {
            tx.execute(
                "UPDATE identities SET confidence = ?1, method = ?2, updated_at = ?3
                 WHERE canonical_id = ?4",
                params![
                    update.confidence,
                    Provenance::FuzzyMerge.to_db_str(),
                    Utc::now().timestamp(),
                    canonical_id
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)
    }
}
