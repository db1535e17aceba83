//! SurrealQL builders for the pivot relations.
//!
//! Every multi-statement write is wrapped in `BEGIN TRANSACTION` /
//! `COMMIT TRANSACTION`, so a concurrent reader sees either the old or the
//! new edge set. Record ids are UUIDs formatted by us, which keeps the
//! interpolated statements injection-free.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;

/// A pivot relation stored as a SurrealDB edge table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Relation {
    pub edge: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// Role -> Permission.
pub(crate) const GRANTS: Relation = Relation {
    edge: "grants",
    from: "role",
    to: "permission",
};

/// Package -> Permission.
pub(crate) const INCLUDES: Relation = Relation {
    edge: "includes",
    from: "package",
    to: "permission",
};

/// User -> Package.
pub(crate) const HOLDS: Relation = Relation {
    edge: "holds",
    from: "user",
    to: "package",
};

pub(crate) fn record(table: &str, id: Uuid) -> String {
    format!("{table}:`{id}`")
}

fn record_list<'a>(table: &str, ids: impl IntoIterator<Item = &'a Uuid>) -> String {
    let items: Vec<String> = ids.into_iter().map(|id| record(table, *id)).collect();
    format!("[{}]", items.join(", "))
}

impl Relation {
    /// Edges for a freshly created source row.
    pub fn relate(&self, from_id: Uuid, ids: &BTreeSet<Uuid>) -> String {
        let from = record(self.from, from_id);
        let mut sql = String::new();
        for id in ids {
            let _ = writeln!(
                sql,
                "RELATE {from}->{}->{} RETURN NONE;",
                self.edge,
                record(self.to, *id)
            );
        }
        sql
    }

    /// Add the edges in `ids` that are not there yet.
    pub fn attach(&self, from_id: Uuid, ids: &BTreeSet<Uuid>) -> String {
        if ids.is_empty() {
            return String::new();
        }
        let from = record(self.from, from_id);
        format!(
            "LET $current = (SELECT VALUE out FROM {edge} WHERE in = {from});\n\
             FOR $target IN {targets} {{\n\
                 IF $target NOTINSIDE $current {{\n\
                     RELATE {from}->{edge}->$target RETURN NONE;\n\
                 }};\n\
             }};\n",
            edge = self.edge,
            targets = record_list(self.to, ids),
        )
    }

    /// Make the outgoing edge set of `from_id` exactly `ids`: drop edges not
    /// in the set, add the missing ones, leave the shared ones untouched.
    pub fn sync(&self, from_id: Uuid, ids: &BTreeSet<Uuid>) -> String {
        let from = record(self.from, from_id);
        let mut sql = format!(
            "DELETE {edge} WHERE in = {from} AND out NOTINSIDE {targets} RETURN NONE;\n",
            edge = self.edge,
            targets = record_list(self.to, ids),
        );
        sql.push_str(&self.attach(from_id, ids));
        sql
    }

    /// Remove every outgoing edge of `from_id`.
    pub fn detach(&self, from_id: Uuid) -> String {
        format!(
            "DELETE {} WHERE in = {} RETURN NONE;\n",
            self.edge,
            record(self.from, from_id)
        )
    }

    /// Remove every incoming edge of `to_id`.
    pub fn detach_incoming(&self, to_id: Uuid) -> String {
        format!(
            "DELETE {} WHERE out = {} RETURN NONE;\n",
            self.edge,
            record(self.to, to_id)
        )
    }
}

/// Wrap statements in a single transaction.
pub(crate) fn transaction(statements: &str) -> String {
    format!("BEGIN TRANSACTION;\n{statements}COMMIT TRANSACTION;")
}

/// Execute a transaction built by [`transaction`], failing on the first
/// statement error.
pub(crate) async fn run_transaction<C: Connection>(
    db: &Surreal<C>,
    sql: String,
) -> Result<(), DbError> {
    db.query(sql)
        .await?
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_targets_only_the_source() {
        let id = Uuid::nil();
        let sql = GRANTS.detach(id);
        assert_eq!(
            sql,
            "DELETE grants WHERE in = role:`00000000-0000-0000-0000-000000000000` RETURN NONE;\n"
        );
    }

    #[test]
    fn sync_to_empty_set_removes_everything() {
        let sql = INCLUDES.sync(Uuid::nil(), &BTreeSet::new());
        assert!(sql.contains("out NOTINSIDE []"));
        assert!(!sql.contains("RELATE"));
    }

    #[test]
    fn sync_only_relates_missing_targets() {
        let target = Uuid::new_v4();
        let sql = HOLDS.sync(Uuid::new_v4(), &BTreeSet::from([target]));
        assert!(sql.contains(&format!("package:`{target}`")));
        assert!(sql.contains("IF $target NOTINSIDE $current"));
    }

    #[test]
    fn transaction_wraps_statements() {
        let sql = transaction("DELETE holds RETURN NONE;\n");
        assert!(sql.starts_with("BEGIN TRANSACTION;"));
        assert!(sql.ends_with("COMMIT TRANSACTION;"));
    }
}
