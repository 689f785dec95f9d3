// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use collnav_app::{
    BackendError, Collection, CollectionId, CollectionKey, ListEntry, ListId, ListPatch,
    ListsBackend, ListsSnapshot, OwnerId, RequestKind, Revision,
};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const APP_NAME: &str = "collnav";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "collections",
        &[
            "owner",
            "slug",
            "title",
            "description",
            "public_index",
            "revision",
        ],
    ),
    (
        "lists",
        &[
            "id",
            "owner",
            "collection",
            "title",
            "description",
            "public",
            "position",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[RequiredIndex {
    name: "idx_lists_collection_position",
    create_sql: "CREATE INDEX IF NOT EXISTS idx_lists_collection_position ON lists (owner, collection, position)",
}];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub owner: OwnerId,
    pub slug: CollectionId,
    pub title: String,
    pub description: String,
    pub public_index: bool,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            info!("creating collnav schema");
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)
    }

    pub fn create_collection(&self, new_collection: &NewCollection) -> Result<Collection> {
        let title = new_collection.title.trim();
        if title.is_empty() {
            bail!("collection title is required -- enter a title and retry");
        }
        self.conn
            .execute(
                "
                INSERT INTO collections (owner, slug, title, description, public_index)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    new_collection.owner.as_str(),
                    new_collection.slug.as_str(),
                    title,
                    new_collection.description,
                    new_collection.public_index,
                ],
            )
            .with_context(|| {
                format!(
                    "insert collection {}/{}",
                    new_collection.owner, new_collection.slug
                )
            })?;

        Ok(Collection {
            owner: new_collection.owner.clone(),
            id: new_collection.slug.clone(),
            loaded: true,
            title: title.to_owned(),
            description: new_collection.description.clone(),
            public_index: new_collection.public_index,
        })
    }

    pub fn get_collection(&self, key: &CollectionKey) -> Result<Option<Collection>> {
        self.conn
            .query_row(
                "
                SELECT title, description, public_index
                FROM collections
                WHERE owner = ? AND slug = ?
                ",
                params![key.owner.as_str(), key.collection.as_str()],
                |row| {
                    Ok(Collection {
                        owner: key.owner.clone(),
                        id: key.collection.clone(),
                        loaded: true,
                        title: row.get(0)?,
                        description: row.get(1)?,
                        public_index: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load collection {}/{}", key.owner, key.collection))
    }

    /// Authoritative list sequence for one collection, in position order.
    pub fn snapshot(&self, key: &CollectionKey) -> Result<ListsSnapshot> {
        let revision = self.revision(key)?.ok_or_else(|| {
            anyhow!(
                "collection {}/{} not found -- create it first",
                key.owner,
                key.collection
            )
        })?;

        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, title, description, public
                FROM lists
                WHERE owner = ? AND collection = ?
                ORDER BY position ASC, id ASC
                ",
            )
            .context("prepare lists query")?;
        let rows = stmt
            .query_map(params![key.owner.as_str(), key.collection.as_str()], |row| {
                Ok(ListEntry {
                    id: ListId::new(row.get(0)?),
                    title: row.get(1)?,
                    description: row.get(2)?,
                    public: row.get(3)?,
                })
            })
            .context("query lists")?;
        let lists = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect lists")?;

        Ok(ListsSnapshot::new(revision, lists))
    }

    pub fn revision(&self, key: &CollectionKey) -> Result<Option<Revision>> {
        let raw: Option<i64> = self
            .conn
            .query_row(
                "SELECT revision FROM collections WHERE owner = ? AND slug = ?",
                params![key.owner.as_str(), key.collection.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("query collection revision")?;
        raw.map(|value| {
            u64::try_from(value)
                .map(Revision::new)
                .with_context(|| format!("invalid stored revision {value}"))
        })
        .transpose()
    }

    fn insert_list(&mut self, key: &CollectionKey, title: &str) -> Result<ListId> {
        let tx = self.conn.transaction().context("begin create list")?;
        require_collection(&tx, key)?;
        tx.execute(
            "
            INSERT INTO lists (owner, collection, title, public, position)
            VALUES (
              ?1, ?2, ?3, 0,
              (SELECT COALESCE(MAX(position) + 1, 0) FROM lists WHERE owner = ?1 AND collection = ?2)
            )
            ",
            params![key.owner.as_str(), key.collection.as_str(), title],
        )
        .context("insert list")?;
        let id = ListId::new(tx.last_insert_rowid());
        bump_revision(&tx, key)?;
        tx.commit().context("commit create list")?;
        Ok(id)
    }

    fn update_list(&mut self, key: &CollectionKey, list_id: ListId, patch: &ListPatch) -> Result<()> {
        let tx = self.conn.transaction().context("begin edit list")?;
        require_collection(&tx, key)?;
        let mut entry = tx
            .query_row(
                "
                SELECT title, description, public
                FROM lists
                WHERE id = ? AND owner = ? AND collection = ?
                ",
                params![list_id.get(), key.owner.as_str(), key.collection.as_str()],
                |row| {
                    Ok(ListEntry {
                        id: list_id,
                        title: row.get(0)?,
                        description: row.get(1)?,
                        public: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("load list for edit")?
            .ok_or(BackendError::ListNotFound(list_id))?;

        patch.apply_to(&mut entry);
        tx.execute(
            "UPDATE lists SET title = ?, description = ?, public = ? WHERE id = ?",
            params![entry.title, entry.description, entry.public, list_id.get()],
        )
        .context("update list")?;
        bump_revision(&tx, key)?;
        tx.commit().context("commit edit list")
    }

    fn remove_list(&mut self, key: &CollectionKey, list_id: ListId) -> Result<()> {
        let tx = self.conn.transaction().context("begin delete list")?;
        require_collection(&tx, key)?;
        let removed = tx
            .execute(
                "DELETE FROM lists WHERE id = ? AND owner = ? AND collection = ?",
                params![list_id.get(), key.owner.as_str(), key.collection.as_str()],
            )
            .context("delete list")?;
        if removed == 0 {
            return Err(BackendError::ListNotFound(list_id).into());
        }

        let remaining = ordered_ids(&tx, key)?;
        write_positions(&tx, &remaining)?;
        bump_revision(&tx, key)?;
        tx.commit().context("commit delete list")
    }

    fn apply_order(&mut self, key: &CollectionKey, order: &[ListId]) -> Result<()> {
        let tx = self.conn.transaction().context("begin reorder lists")?;
        require_collection(&tx, key)?;
        let stored: BTreeSet<ListId> = ordered_ids(&tx, key)?.into_iter().collect();
        let requested: BTreeSet<ListId> = order.iter().copied().collect();
        if requested.len() != order.len() || requested != stored {
            return Err(BackendError::rejected(
                RequestKind::Reorder,
                "order must name every list in the collection exactly once",
            )
            .into());
        }

        write_positions(&tx, order)?;
        bump_revision(&tx, key)?;
        tx.commit().context("commit reorder lists")
    }

    fn update_public_index(&self, key: &CollectionKey, public_index: bool) -> Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE collections SET public_index = ? WHERE owner = ? AND slug = ?",
                params![public_index, key.owner.as_str(), key.collection.as_str()],
            )
            .context("update collection visibility")?;
        if updated == 0 {
            return Err(BackendError::collection_not_found(key).into());
        }
        Ok(())
    }
}

impl ListsBackend for Store {
    fn create_list(&mut self, key: &CollectionKey, title: &str) -> Result<(), BackendError> {
        let id = self.insert_list(key, title).map_err(into_backend_error)?;
        debug!(%id, %title, "list created");
        Ok(())
    }

    fn edit_list(
        &mut self,
        key: &CollectionKey,
        list_id: ListId,
        patch: &ListPatch,
    ) -> Result<(), BackendError> {
        self.update_list(key, list_id, patch)
            .map_err(into_backend_error)?;
        debug!(id = %list_id, "list edited");
        Ok(())
    }

    fn delete_list(&mut self, key: &CollectionKey, list_id: ListId) -> Result<(), BackendError> {
        self.remove_list(key, list_id).map_err(into_backend_error)?;
        debug!(id = %list_id, "list deleted");
        Ok(())
    }

    fn reorder_lists(
        &mut self,
        key: &CollectionKey,
        order: &[ListId],
    ) -> Result<(), BackendError> {
        self.apply_order(key, order).map_err(into_backend_error)?;
        debug!(count = order.len(), "lists reordered");
        Ok(())
    }

    fn set_collection_visibility(
        &mut self,
        key: &CollectionKey,
        public_index: bool,
    ) -> Result<(), BackendError> {
        self.update_public_index(key, public_index)
            .map_err(into_backend_error)?;
        debug!(public_index, "collection visibility changed");
        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("COLLNAV_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set COLLNAV_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("collnav.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

/// Typed failures pass through untouched; anything else is a storage fault.
fn into_backend_error(error: anyhow::Error) -> BackendError {
    match error.downcast::<BackendError>() {
        Ok(typed) => typed,
        Err(other) => BackendError::Unavailable(format!("{other:#}")),
    }
}

fn require_collection(tx: &Transaction<'_>, key: &CollectionKey) -> Result<()> {
    let exists: i64 = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE owner = ? AND slug = ?)",
            params![key.owner.as_str(), key.collection.as_str()],
            |row| row.get(0),
        )
        .context("check collection existence")?;
    if exists != 1 {
        return Err(BackendError::collection_not_found(key).into());
    }
    Ok(())
}

fn bump_revision(tx: &Transaction<'_>, key: &CollectionKey) -> Result<()> {
    tx.execute(
        "UPDATE collections SET revision = revision + 1 WHERE owner = ? AND slug = ?",
        params![key.owner.as_str(), key.collection.as_str()],
    )
    .context("bump collection revision")?;
    Ok(())
}

fn ordered_ids(tx: &Transaction<'_>, key: &CollectionKey) -> Result<Vec<ListId>> {
    let mut stmt = tx
        .prepare(
            "
            SELECT id FROM lists
            WHERE owner = ? AND collection = ?
            ORDER BY position ASC, id ASC
            ",
        )
        .context("prepare list order query")?;
    let rows = stmt
        .query_map(params![key.owner.as_str(), key.collection.as_str()], |row| {
            row.get::<_, i64>(0).map(ListId::new)
        })
        .context("query list order")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("collect list order")
}

/// Positions are dense and zero-based after every write.
fn write_positions(tx: &Transaction<'_>, order: &[ListId]) -> Result<()> {
    let mut stmt = tx
        .prepare("UPDATE lists SET position = ? WHERE id = ?")
        .context("prepare position update")?;
    for (position, id) in order.iter().enumerate() {
        let position = i64::try_from(position).context("list position overflow")?;
        stmt.execute(params![position, id.get()])
            .with_context(|| format!("update position for list {id}"))?;
    }
    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; point COLLNAV_DB_PATH at a collnav database"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; recreate the database",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}
