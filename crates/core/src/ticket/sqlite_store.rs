//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{CreateTicketRequest, Ticket, TicketError, TicketStatus, TicketStore};

/// Default page size when the caller passes a non-positive limit.
const DEFAULT_LIST_LIMIT: i64 = 50;

const TICKET_COLUMNS: &str =
    "id, title, description, requester, assignee, status, process_instance_id, created_at, updated_at";

/// SQLite-backed ticket store.
///
/// The connection is guarded by a mutex, so every store call (including the
/// read-check-write inside [`transition`](TicketStore::transition)) is
/// atomic with respect to all other store calls in this process.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                requester TEXT NOT NULL,
                assignee TEXT,
                status TEXT NOT NULL,
                process_instance_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_tickets_created_at ON tickets(created_at DESC);
            "#,
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let description: String = row.get(2)?;
        let requester: String = row.get(3)?;
        let assignee: Option<String> = row.get(4)?;
        let status_str: String = row.get(5)?;
        let process_instance_id: Option<String> = row.get(6)?;
        let created_at_str: String = row.get(7)?;
        let updated_at_str: String = row.get(8)?;

        // Timestamps were written by us as RFC3339; fall back to now on
        // corrupt rows rather than failing the whole query.
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let status = TicketStatus::parse(&status_str).unwrap_or(TicketStatus::Draft);

        Ok(Ticket {
            id,
            title,
            description,
            requester,
            assignee,
            status,
            process_instance_id,
            created_at,
            updated_at,
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<Ticket, TicketError> {
        let result = conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        );

        match result {
            Ok(ticket) => Ok(ticket),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(TicketError::NotFound(id.to_string()))
            }
            Err(e) => Err(TicketError::Database(e.to_string())),
        }
    }
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = TicketStatus::Draft;

        conn.execute(
            "INSERT INTO tickets (id, title, description, requester, assignee, status, process_instance_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.title,
                request.description,
                request.requester,
                request.assignee,
                status.as_str(),
                Option::<String>::None,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(Ticket {
            id,
            title: request.title,
            description: request.description,
            requester: request.requester,
            assignee: request.assignee,
            status,
            process_instance_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();

        match Self::get_locked(&conn, id) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(TicketError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, limit: i64) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();

        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM tickets ORDER BY created_at DESC LIMIT ?",
                TICKET_COLUMNS
            ))
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit], Self::row_to_ticket)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut tickets = Vec::new();
        for row_result in rows {
            let ticket = row_result.map_err(|e| TicketError::Database(e.to_string()))?;
            tickets.push(ticket);
        }

        Ok(tickets)
    }

    fn transition(
        &self,
        id: &str,
        allowed_from: &[TicketStatus],
        to: TicketStatus,
        process_instance_id: Option<&str>,
    ) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::get_locked(&conn, id)?;

        if !allowed_from.contains(&current.status) {
            return Err(TicketError::InvalidTransition {
                ticket_id: id.to_string(),
                status: current.status,
                operation: format!("move to {}", to),
            });
        }

        let now = Utc::now();

        match process_instance_id {
            Some(pid) => {
                conn.execute(
                    "UPDATE tickets SET status = ?, process_instance_id = ?, updated_at = ? WHERE id = ?",
                    params![to.as_str(), pid, now.to_rfc3339(), id],
                )
                .map_err(|e| TicketError::Database(e.to_string()))?;
            }
            None => {
                conn.execute(
                    "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?",
                    params![to.as_str(), now.to_rfc3339(), id],
                )
                .map_err(|e| TicketError::Database(e.to_string()))?;
            }
        }

        Ok(Ticket {
            status: to,
            process_instance_id: process_instance_id
                .map(String::from)
                .or(current.process_instance_id),
            updated_at: now,
            ..current
        })
    }

    fn set_status(&self, id: &str, to: TicketStatus) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::get_locked(&conn, id)?;
        let now = Utc::now();

        conn.execute(
            "UPDATE tickets SET status = ?, updated_at = ? WHERE id = ?",
            params![to.as_str(), now.to_rfc3339(), id],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(Ticket {
            status: to,
            updated_at: now,
            ..current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteTicketStore {
        SqliteTicketStore::in_memory().unwrap()
    }

    fn create_test_request() -> CreateTicketRequest {
        CreateTicketRequest {
            title: "Replace laptop".to_string(),
            description: "Battery no longer holds charge".to_string(),
            requester: "alice".to_string(),
            assignee: None,
        }
    }

    #[test]
    fn test_create_ticket() {
        let store = create_test_store();
        let request = create_test_request();

        let ticket = store.create(request.clone()).unwrap();

        assert!(!ticket.id.is_empty());
        assert_eq!(ticket.title, request.title);
        assert_eq!(ticket.requester, request.requester);
        assert_eq!(ticket.status, TicketStatus::Draft);
        assert!(ticket.process_instance_id.is_none());
    }

    #[test]
    fn test_get_ticket() {
        let store = create_test_store();

        let created = store.create(create_test_request()).unwrap();
        let fetched = store.get(&created.id).unwrap();

        assert!(fetched.is_some());
        let fetched = fetched.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, created.title);
    }

    #[test]
    fn test_get_nonexistent_ticket() {
        let store = create_test_store();
        let result = store.get("nonexistent-id").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_list_orders_most_recent_first() {
        let store = create_test_store();

        let mut ids = Vec::new();
        for i in 0..3 {
            let mut request = create_test_request();
            request.title = format!("ticket-{}", i);
            ids.push(store.create(request).unwrap().id);
            // created_at resolution is sub-millisecond but not guaranteed
            // distinct; nudge the clock
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let tickets = store.list(10).unwrap();
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets[0].id, ids[2]);
        assert_eq!(tickets[2].id, ids[0]);
    }

    #[test]
    fn test_list_default_limit_on_non_positive() {
        let store = create_test_store();
        for _ in 0..3 {
            store.create(create_test_request()).unwrap();
        }

        // Non-positive limit falls back to the default of 50
        let tickets = store.list(0).unwrap();
        assert_eq!(tickets.len(), 3);
        let tickets = store.list(-7).unwrap();
        assert_eq!(tickets.len(), 3);
    }

    #[test]
    fn test_list_respects_limit() {
        let store = create_test_store();
        for _ in 0..5 {
            store.create(create_test_request()).unwrap();
        }

        let tickets = store.list(2).unwrap();
        assert_eq!(tickets.len(), 2);
    }

    #[test]
    fn test_transition_records_process_instance() {
        let store = create_test_store();
        let ticket = store.create(create_test_request()).unwrap();

        let updated = store
            .transition(
                &ticket.id,
                &[TicketStatus::Draft, TicketStatus::Rejected],
                TicketStatus::Submitted,
                Some("proc-1"),
            )
            .unwrap();

        assert_eq!(updated.status, TicketStatus::Submitted);
        assert_eq!(updated.process_instance_id.as_deref(), Some("proc-1"));

        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert_eq!(fetched.status, TicketStatus::Submitted);
        assert_eq!(fetched.process_instance_id.as_deref(), Some("proc-1"));
    }

    #[test]
    fn test_transition_preserves_process_instance_when_not_given() {
        let store = create_test_store();
        let ticket = store.create(create_test_request()).unwrap();

        store
            .transition(
                &ticket.id,
                &[TicketStatus::Draft],
                TicketStatus::Submitted,
                Some("proc-1"),
            )
            .unwrap();

        let updated = store
            .transition(
                &ticket.id,
                &[TicketStatus::Submitted],
                TicketStatus::Processing,
                None,
            )
            .unwrap();

        assert_eq!(updated.process_instance_id.as_deref(), Some("proc-1"));
    }

    #[test]
    fn test_transition_rejected_from_wrong_status() {
        let store = create_test_store();
        let ticket = store.create(create_test_request()).unwrap();

        let result = store.transition(
            &ticket.id,
            &[TicketStatus::Submitted],
            TicketStatus::Approved,
            None,
        );

        match result {
            Err(TicketError::InvalidTransition { status, .. }) => {
                assert_eq!(status, TicketStatus::Draft);
            }
            other => panic!("Expected InvalidTransition, got {:?}", other),
        }

        // Status unchanged
        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert_eq!(fetched.status, TicketStatus::Draft);
    }

    #[test]
    fn test_transition_nonexistent_ticket() {
        let store = create_test_store();

        let result = store.transition(
            "nonexistent-id",
            &[TicketStatus::Draft],
            TicketStatus::Submitted,
            None,
        );

        assert!(matches!(result, Err(TicketError::NotFound(_))));
    }

    #[test]
    fn test_set_status_unconditional() {
        let store = create_test_store();
        let ticket = store.create(create_test_request()).unwrap();

        let updated = store.set_status(&ticket.id, TicketStatus::Completed).unwrap();
        assert_eq!(updated.status, TicketStatus::Completed);

        let fetched = store.get(&ticket.id).unwrap().unwrap();
        assert_eq!(fetched.status, TicketStatus::Completed);
    }

    #[test]
    fn test_set_status_refreshes_updated_at() {
        let store = create_test_store();
        let ticket = store.create(create_test_request()).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));
        let updated = store.set_status(&ticket.id, TicketStatus::Completed).unwrap();

        assert!(updated.updated_at > ticket.updated_at);
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("tickets.db");

        let store = SqliteTicketStore::new(&db_path).unwrap();
        let ticket = store.create(create_test_request()).unwrap();

        assert!(db_path.exists());

        let fetched = store.get(&ticket.id).unwrap();
        assert!(fetched.is_some());
    }
}
