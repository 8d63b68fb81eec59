//! SQLite-backed durable store

use crate::store::{check_transition, ResultStore};
use mnemo_core::{
    Group, GroupId, MemoryError, RelationKind, ResultState, Result, ToolId, ToolResult,
    ToolStatus, ToolSummary,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable backing for long-lived sessions. One database per session.
pub struct SqliteStore {
    conn: Connection,
}

fn db_err(e: rusqlite::Error) -> MemoryError {
    MemoryError::StoreUnavailable(e.to_string())
}

fn json_err(e: serde_json::Error) -> MemoryError {
    MemoryError::StoreUnavailable(format!("corrupt stored record: {}", e))
}

impl SqliteStore {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tool_results (
                id INTEGER PRIMARY KEY,
                tool_name TEXT NOT NULL,
                input TEXT NOT NULL,
                output TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                full_token_count INTEGER NOT NULL,
                summary TEXT,
                state TEXT NOT NULL,
                group_id INTEGER
            );
            CREATE TABLE IF NOT EXISTS result_groups (
                id INTEGER PRIMARY KEY,
                member_ids TEXT NOT NULL,
                combined_summary TEXT NOT NULL,
                combined_token_count INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS relationships (
                src INTEGER NOT NULL,
                dst INTEGER NOT NULL,
                kind TEXT NOT NULL,
                UNIQUE(src, dst, kind)
            );
            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )
        .map_err(db_err)
    }

    fn exists(&self, id: ToolId) -> Result<bool> {
        let n: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM tool_results WHERE id = ?",
                params![id.0 as i64],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(n > 0)
    }

    fn next_seq(&mut self, name: &str) -> Result<u64> {
        let tx = self.conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO counters(name, value) VALUES (?, 0)
             ON CONFLICT(name) DO NOTHING",
            params![name],
        )
        .map_err(db_err)?;
        tx.execute(
            "UPDATE counters SET value = value + 1 WHERE name = ?",
            params![name],
        )
        .map_err(db_err)?;
        let value: i64 = tx
            .query_row(
                "SELECT value FROM counters WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(value as u64)
    }

    fn row_to_record(row: &rusqlite::Row) -> std::result::Result<ToolResult, rusqlite::Error> {
        let input: String = row.get(2)?;
        let status: String = row.get(4)?;
        let timestamp: String = row.get(6)?;
        let summary: Option<String> = row.get(8)?;
        let state: String = row.get(9)?;
        let group_id: Option<i64> = row.get(10)?;

        let bad = |col: usize, msg: String| {
            rusqlite::Error::FromSqlConversionFailure(
                col,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
            )
        };

        Ok(ToolResult {
            id: ToolId(row.get::<_, i64>(0)? as u64),
            tool_name: row.get(1)?,
            input: serde_json::from_str(&input).map_err(|e| bad(2, e.to_string()))?,
            output: row.get(3)?,
            status: ToolStatus::parse(&status)
                .ok_or_else(|| bad(4, format!("unknown status {:?}", status)))?,
            created_at: row.get::<_, i64>(5)? as u64,
            timestamp: timestamp
                .parse()
                .map_err(|e| bad(6, format!("bad timestamp: {}", e)))?,
            full_token_count: row.get::<_, i64>(7)? as usize,
            summary: match summary {
                Some(json) => {
                    Some(serde_json::from_str::<ToolSummary>(&json).map_err(|e| bad(8, e.to_string()))?)
                }
                None => None,
            },
            state: ResultState::parse(&state)
                .ok_or_else(|| bad(9, format!("unknown state {:?}", state)))?,
            group_id: group_id.map(|g| GroupId(g as u64)),
        })
    }

    fn row_to_group(row: &rusqlite::Row) -> std::result::Result<Group, rusqlite::Error> {
        let members: String = row.get(1)?;
        let member_ids: Vec<u64> = serde_json::from_str(&members).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                )),
            )
        })?;
        Ok(Group {
            id: GroupId(row.get::<_, i64>(0)? as u64),
            member_ids: member_ids.into_iter().map(ToolId).collect(),
            combined_summary: row.get(2)?,
            combined_token_count: row.get::<_, i64>(3)? as usize,
        })
    }
}

impl ResultStore for SqliteStore {
    fn append(&mut self, record: ToolResult) -> Result<()> {
        if self.exists(record.id)? {
            return Err(MemoryError::DuplicateId(record.id.to_string()));
        }
        let summary = match &record.summary {
            Some(s) => Some(serde_json::to_string(s).map_err(json_err)?),
            None => None,
        };
        self.conn
            .execute(
                "INSERT INTO tool_results VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.id.0 as i64,
                    record.tool_name,
                    serde_json::to_string(&record.input).map_err(json_err)?,
                    record.output,
                    record.status.as_str(),
                    record.created_at as i64,
                    record.timestamp.to_rfc3339(),
                    record.full_token_count as i64,
                    summary,
                    record.state.as_str(),
                    record.group_id.map(|g| g.0 as i64),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn get(&self, id: ToolId) -> Result<ToolResult> {
        self.conn
            .query_row(
                "SELECT * FROM tool_results WHERE id = ?",
                params![id.0 as i64],
                Self::row_to_record,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<ToolResult>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tool_results ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt.query_map([], Self::row_to_record).map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }

    fn attach_summary(&mut self, id: ToolId, summary: ToolSummary) -> Result<()> {
        let json = serde_json::to_string(&summary).map_err(json_err)?;
        let n = self
            .conn
            .execute(
                "UPDATE tool_results SET summary = ? WHERE id = ?",
                params![json, id.0 as i64],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn add_relationship(&mut self, src: ToolId, dst: ToolId, kind: RelationKind) -> Result<()> {
        for end in [src, dst] {
            if !self.exists(end)? {
                return Err(MemoryError::NotFound(end.to_string()));
            }
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO relationships(src, dst, kind) VALUES (?, ?, ?)",
                params![src.0 as i64, dst.0 as i64, kind.as_str()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn relationships_of(&self, id: ToolId) -> Result<Vec<(ToolId, RelationKind)>> {
        if !self.exists(id)? {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        let mut stmt = self
            .conn
            .prepare("SELECT src, dst, kind FROM relationships WHERE src = ?1 OR dst = ?1")
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id.0 as i64], |row| {
                let src: i64 = row.get(0)?;
                let dst: i64 = row.get(1)?;
                let kind: String = row.get(2)?;
                Ok((src as u64, dst as u64, kind))
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (src, dst, kind) = row.map_err(db_err)?;
            let kind = RelationKind::parse(&kind)
                .ok_or_else(|| MemoryError::StoreUnavailable(format!("unknown edge kind {:?}", kind)))?;
            let other = if src == id.0 { dst } else { src };
            out.push((ToolId(other), kind));
        }
        Ok(out)
    }

    fn relationships(&self) -> Result<Vec<(ToolId, ToolId, RelationKind)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT src, dst, kind FROM relationships")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let src: i64 = row.get(0)?;
                let dst: i64 = row.get(1)?;
                let kind: String = row.get(2)?;
                Ok((src as u64, dst as u64, kind))
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (src, dst, kind) = row.map_err(db_err)?;
            let kind = RelationKind::parse(&kind)
                .ok_or_else(|| MemoryError::StoreUnavailable(format!("unknown edge kind {:?}", kind)))?;
            out.push((ToolId(src), ToolId(dst), kind));
        }
        Ok(out)
    }

    fn update_state(
        &mut self,
        id: ToolId,
        new_state: ResultState,
        group_id: Option<GroupId>,
    ) -> Result<()> {
        if let Some(gid) = group_id {
            self.get_group(gid)?;
        }
        let record = self.get(id)?;
        check_transition(&record, new_state)?;
        self.conn
            .execute(
                "UPDATE tool_results SET state = ?, group_id = ? WHERE id = ?",
                params![
                    new_state.as_str(),
                    group_id.map(|g| g.0 as i64),
                    id.0 as i64
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn insert_group(&mut self, group: Group) -> Result<()> {
        let members: Vec<u64> = group.member_ids.iter().map(|m| m.0).collect();
        let n = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO result_groups VALUES (?, ?, ?, ?)",
                params![
                    group.id.0 as i64,
                    serde_json::to_string(&members).map_err(json_err)?,
                    group.combined_summary,
                    group.combined_token_count as i64,
                ],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(MemoryError::DuplicateId(group.id.to_string()));
        }
        Ok(())
    }

    fn get_group(&self, id: GroupId) -> Result<Group> {
        self.conn
            .query_row(
                "SELECT * FROM result_groups WHERE id = ?",
                params![id.0 as i64],
                Self::row_to_group,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    fn update_group(&mut self, group: Group) -> Result<()> {
        let members: Vec<u64> = group.member_ids.iter().map(|m| m.0).collect();
        let n = self
            .conn
            .execute(
                "UPDATE result_groups
                 SET member_ids = ?, combined_summary = ?, combined_token_count = ?
                 WHERE id = ?",
                params![
                    serde_json::to_string(&members).map_err(json_err)?,
                    group.combined_summary,
                    group.combined_token_count as i64,
                    group.id.0 as i64,
                ],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(MemoryError::NotFound(group.id.to_string()));
        }
        Ok(())
    }

    fn remove_group(&mut self, id: GroupId) -> Result<()> {
        let n = self
            .conn
            .execute(
                "DELETE FROM result_groups WHERE id = ?",
                params![id.0 as i64],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM result_groups ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt.query_map([], Self::row_to_group).map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }

    fn next_tool_seq(&mut self) -> Result<u64> {
        self.next_seq("tool")
    }

    fn next_group_seq(&mut self) -> Result<u64> {
        self.next_seq("group")
    }
}
