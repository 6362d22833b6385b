//! The conversation tree store.
//!
//! Messages form one forest per owner. Inserts compute the new node's
//! materialized path from the parent's stored path inside the same writer
//! transaction; reads are single range scans over `(owner_id, path)`.

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;
use uuid::Uuid;

use branchchat_types::models::Message;

use crate::models::{MessageRow, format_timestamp, parse_timestamp};
use crate::path::MessagePath;
use crate::{Database, Result, StoreError};

/// Content of a node about to be inserted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub is_user: bool,
    pub doc_id: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            doc_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            doc_id: None,
        }
    }

    pub fn with_doc(mut self, doc_id: Option<String>) -> Self {
        self.doc_id = doc_id;
        self
    }
}

impl Database {
    /// Inserts a new tree root owned by `owner_id`.
    pub fn create_root(&self, owner_id: Uuid, msg: NewMessage) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let message = insert_node(&tx, owner_id, None, msg)?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// Inserts a new child of `parent_id`. The parent must belong to
    /// `owner_id`; otherwise this fails with `NotFound` and nothing is written.
    pub fn create_child(&self, owner_id: Uuid, parent_id: Uuid, msg: NewMessage) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let parent_path = query_owned_path(&tx, owner_id, parent_id)?
                .ok_or_else(|| StoreError::not_found("message", parent_id))?;
            let message = insert_node(&tx, owner_id, Some((parent_id, &parent_path)), msg)?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// Root or child insert depending on whether a parent is given.
    pub fn create_message(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        msg: NewMessage,
    ) -> Result<Message> {
        match parent_id {
            Some(parent_id) => self.create_child(owner_id, parent_id, msg),
            None => self.create_root(owner_id, msg),
        }
    }

    /// Every message owned by `owner_id`, in path order.
    pub fn list_tree(&self, owner_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE owner_id = ?1
                 ORDER BY path, created_at, id",
                MessageRow::COLUMNS
            );
            collect_messages(conn, &sql, params![owner_id.to_string()])
        })
    }

    /// `root_id` and all of its descendants, in path order.
    pub fn list_subtree(&self, owner_id: Uuid, root_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let root_path = query_owned_path(conn, owner_id, root_id)?
                .ok_or_else(|| StoreError::not_found("message", root_id))?;

            let sql = format!(
                "SELECT {} FROM messages
                 WHERE owner_id = ?1 AND path >= ?2 AND path < ?3
                 ORDER BY path, created_at, id",
                MessageRow::COLUMNS
            );
            collect_messages(
                conn,
                &sql,
                params![
                    owner_id.to_string(),
                    root_path.as_str(),
                    root_path.subtree_upper_bound()
                ],
            )
        })
    }
}

fn query_owned_path(conn: &Connection, owner_id: Uuid, id: Uuid) -> Result<Option<MessagePath>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT path FROM messages WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(raw.as_deref().map(MessagePath::parse).transpose()?)
}

fn collect_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(Message::try_from).collect()
}

/// Allocates the next sequence number and a creation time that never runs
/// backwards relative to the previous insert.
fn next_sequence(tx: &Transaction<'_>) -> Result<(u64, DateTime<Utc>)> {
    let last: Option<(i64, String)> = tx
        .query_row(
            "SELECT seq, created_at FROM messages ORDER BY seq DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    // Stored timestamps carry microseconds.
    let now = Utc::now().trunc_subsecs(6);
    match last {
        None => Ok((1, now)),
        Some((seq, created_at)) => {
            let seq = u64::try_from(seq)
                .map_err(|_| anyhow::anyhow!("Corrupt message sequence {}", seq))?;
            Ok((seq + 1, now.max(parse_timestamp(&created_at)?)))
        }
    }
}

fn insert_node(
    tx: &Transaction<'_>,
    owner_id: Uuid,
    parent: Option<(Uuid, &MessagePath)>,
    msg: NewMessage,
) -> Result<Message> {
    let id = Uuid::new_v4();
    let (seq, created_at) = next_sequence(tx)?;

    let path = match parent {
        Some((_, parent_path)) => parent_path.child(seq, &id)?,
        None => MessagePath::root(seq, &id)?,
    };
    let parent_id = parent.map(|(parent_id, _)| parent_id);

    tx.execute(
        "INSERT INTO messages (id, seq, owner_id, parent_id, path, content, is_user, doc_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id.to_string(),
            seq as i64,
            owner_id.to_string(),
            parent_id.map(|p| p.to_string()),
            path.as_str(),
            &msg.content,
            msg.is_user,
            &msg.doc_id,
            format_timestamp(&created_at),
        ],
    )?;

    debug!("Inserted message {} at {} (owner {})", id, path, owner_id);

    Ok(Message {
        id,
        owner_id,
        parent_id,
        path: path.as_str().to_string(),
        content: msg.content,
        is_user: msg.is_user,
        doc_id: msg.doc_id,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn user(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), name, "hash").unwrap();
        id
    }

    fn path(m: &Message) -> MessagePath {
        MessagePath::parse(&m.path).unwrap()
    }

    #[test]
    fn root_has_single_segment_and_no_parent() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let root = db.create_root(alice, NewMessage::user("Hello")).unwrap();

        assert!(root.is_root());
        assert_eq!(path(&root).depth(), 1);
        assert_eq!(root.owner_id, alice);
        assert!(root.is_user);
        assert_eq!(db.list_subtree(alice, root.id).unwrap(), vec![root]);
    }

    #[test]
    fn child_path_extends_parent_by_one_segment() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let root = db.create_root(alice, NewMessage::user("Hello")).unwrap();
        let reply = db
            .create_child(alice, root.id, NewMessage::assistant("Hi!").with_doc(Some("doc".into())))
            .unwrap();

        assert_eq!(reply.parent_id, Some(root.id));
        assert_eq!(path(&reply).parent(), Some(path(&root)));
        assert_eq!(path(&reply).depth(), 2);
        assert!(!reply.is_user);
        assert_eq!(reply.doc_id.as_deref(), Some("doc"));
    }

    #[test]
    fn stored_paths_satisfy_prefix_invariant() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let root = db.create_root(alice, NewMessage::user("a")).unwrap();
        let b = db.create_child(alice, root.id, NewMessage::assistant("b")).unwrap();
        let c = db.create_child(alice, b.id, NewMessage::user("c")).unwrap();
        db.create_child(alice, root.id, NewMessage::user("d")).unwrap();
        db.create_child(alice, c.id, NewMessage::assistant("e")).unwrap();

        let all = db.list_tree(alice).unwrap();
        for m in &all {
            match m.parent_id {
                None => assert_eq!(path(m).depth(), 1),
                Some(pid) => {
                    let parent = all.iter().find(|p| p.id == pid).unwrap();
                    assert_eq!(path(m).parent(), Some(path(parent)));
                }
            }
        }
    }

    #[test]
    fn foreign_or_missing_parent_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let alice_root = db.create_root(alice, NewMessage::user("mine")).unwrap();

        let err = db
            .create_child(bob, alice_root.id, NewMessage::user("sneaky"))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = db
            .create_child(alice, Uuid::new_v4(), NewMessage::user("orphan"))
            .unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(db.list_tree(alice).unwrap().len(), 1);
        assert!(db.list_tree(bob).unwrap().is_empty());
    }

    #[test]
    fn list_tree_is_owner_scoped_and_deterministic() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let a1 = db.create_root(alice, NewMessage::user("a1")).unwrap();
        let b1 = db.create_root(bob, NewMessage::user("b1")).unwrap();
        db.create_child(alice, a1.id, NewMessage::assistant("a2")).unwrap();
        db.create_child(bob, b1.id, NewMessage::assistant("b2")).unwrap();

        let first = db.list_tree(alice).unwrap();
        let second = db.list_tree(alice).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|m| m.owner_id == alice));
    }

    #[test]
    fn conversation_scenario_orders_depth_first() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let u1 = db.create_root(alice, NewMessage::user("Hello")).unwrap();
        let a1 = db.create_child(alice, u1.id, NewMessage::assistant("Hi")).unwrap();
        let u2 = db.create_child(alice, u1.id, NewMessage::user("Follow-up")).unwrap();
        let a2 = db.create_child(alice, u2.id, NewMessage::assistant("Sure")).unwrap();

        let ids: Vec<Uuid> = db.list_tree(alice).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![u1.id, a1.id, u2.id, a2.id]);

        let subtree: Vec<Uuid> = db
            .list_subtree(alice, u1.id)
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(subtree, ids);
    }

    #[test]
    fn subtree_is_prefix_closed_and_matches_tree_order() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let r1 = db.create_root(alice, NewMessage::user("r1")).unwrap();
        let x = db.create_child(alice, r1.id, NewMessage::user("x")).unwrap();
        let y = db.create_child(alice, r1.id, NewMessage::user("y")).unwrap();
        db.create_child(alice, x.id, NewMessage::assistant("x1")).unwrap();
        db.create_child(alice, y.id, NewMessage::assistant("y1")).unwrap();
        let r2 = db.create_root(alice, NewMessage::user("r2")).unwrap();
        db.create_child(alice, r2.id, NewMessage::assistant("r2a")).unwrap();

        let root_path = path(&x);
        let subtree = db.list_subtree(alice, x.id).unwrap();
        assert_eq!(subtree.len(), 2);
        assert_eq!(subtree[0].id, x.id);
        assert!(subtree.iter().all(|m| path(m).is_descendant_or_self_of(&root_path)));

        let expected: Vec<Message> = db
            .list_tree(alice)
            .unwrap()
            .into_iter()
            .filter(|m| path(m).is_descendant_or_self_of(&root_path))
            .collect();
        assert_eq!(subtree, expected);
    }

    #[test]
    fn subtree_of_foreign_root_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let root = db.create_root(alice, NewMessage::user("private")).unwrap();

        assert!(db.list_subtree(bob, root.id).unwrap_err().is_not_found());
        assert!(db.list_subtree(alice, Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn creation_times_never_run_backwards() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        let mut parent = db.create_root(alice, NewMessage::user("0")).unwrap();
        for i in 1..20 {
            parent = db
                .create_child(alice, parent.id, NewMessage::user(i.to_string()))
                .unwrap();
        }

        let all = db.list_tree(alice).unwrap();
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn concurrent_forks_of_one_parent_become_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("tree.db")).unwrap());
        let alice = user(&db, "alice");
        let root = db.create_root(alice, NewMessage::user("root")).unwrap();

        let forks: Vec<Message> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let db = Arc::clone(&db);
                    s.spawn(move || {
                        db.create_child(alice, root.id, NewMessage::user(format!("fork {i}")))
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut ids: Vec<Uuid> = forks.iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);

        for fork in &forks {
            assert_eq!(fork.parent_id, Some(root.id));
            let subtree = db.list_subtree(alice, fork.id).unwrap();
            assert_eq!(subtree, vec![fork.clone()]);
        }
        assert_eq!(db.list_subtree(alice, root.id).unwrap().len(), 9);
    }
}
