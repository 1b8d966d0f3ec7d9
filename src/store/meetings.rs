//! Meeting loading
//!
//! Meetings have no upstream identifier. A meeting is identified by the
//! listing host it was scraped from, its date, location and subject, and a
//! key built from its participants and entities. The store assigns the
//! numeric ID.

use super::StoreError;
use crate::types::{Meeting, Participants};
use sqlx::PgPool;
use tracing::debug;

const UPSERT_MEETING: &str = r#"
    INSERT INTO meetings
        (meeting_host, meeting_date, meeting_cancelled, meeting_location, meeting_subject, meeting_key)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (meeting_host, meeting_date, meeting_location, meeting_subject, meeting_key)
    DO UPDATE SET
        meeting_cancelled = EXCLUDED.meeting_cancelled
    RETURNING meeting_id
"#;

const LINK_LEADER: &str = r#"
    INSERT INTO meetings_leaders (meeting_id, leader_id) VALUES ($1, $2)
    ON CONFLICT DO NOTHING
"#;

const LINK_MEMBER: &str = r#"
    INSERT INTO meetings_members (meeting_id, member_id) VALUES ($1, $2)
    ON CONFLICT DO NOTHING
"#;

const LINK_ENTITY: &str = r#"
    INSERT INTO meetings_entities (meeting_id, entity_id) VALUES ($1, $2)
    ON CONFLICT DO NOTHING
"#;

/// Order-independent identity of who met whom.
///
/// Two rows of one listing with the same date, location and subject are
/// still separate meetings when their participants or entities differ.
pub fn meeting_key(meeting: &Meeting) -> String {
    let participants = match &meeting.participants {
        Participants::Leader(leader_id) => format!("leader:{}", leader_id),
        Participants::Members(member_ids) => {
            let mut ids: Vec<&str> = member_ids.iter().map(String::as_str).collect();
            ids.sort_unstable();
            ids.dedup();
            format!("members:{}", ids.join(","))
        }
    };

    let mut entities: Vec<&str> = meeting.entities.iter().map(|e| e.as_str()).collect();
    entities.sort_unstable();
    entities.dedup();

    format!("{}|entities:{}", participants, entities.join(","))
}

/// Writes scraped meetings to the store
#[derive(Clone)]
pub struct MeetingLoader {
    pool: PgPool,
}

impl MeetingLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the meetings of one listing crawl in a single transaction.
    ///
    /// Returns the store IDs in input order.
    pub async fn load(&self, host: &str, meetings: &[Meeting]) -> Result<Vec<i64>, StoreError> {
        let mut ids = Vec::with_capacity(meetings.len());
        if meetings.is_empty() {
            return Ok(ids);
        }

        let mut tx = self.pool.begin().await?;

        for meeting in meetings {
            let meeting_id: i64 = sqlx::query_scalar(UPSERT_MEETING)
                .bind(host)
                .bind(meeting.date)
                .bind(meeting.cancelled)
                .bind(&meeting.location)
                .bind(&meeting.subject)
                .bind(meeting_key(meeting))
                .fetch_one(&mut *tx)
                .await?;

            match &meeting.participants {
                Participants::Leader(leader_id) => {
                    sqlx::query(LINK_LEADER)
                        .bind(meeting_id)
                        .bind(leader_id)
                        .execute(&mut *tx)
                        .await?;
                }
                Participants::Members(member_ids) => {
                    for member_id in member_ids {
                        sqlx::query(LINK_MEMBER)
                            .bind(meeting_id)
                            .bind(member_id)
                            .execute(&mut *tx)
                            .await?;
                    }
                }
            }

            for entity in &meeting.entities {
                sqlx::query(LINK_ENTITY)
                    .bind(meeting_id)
                    .bind(entity.as_str())
                    .execute(&mut *tx)
                    .await?;
            }

            ids.push(meeting_id);
        }

        tx.commit().await?;

        debug!("Loaded {} meetings for host {}", ids.len(), host);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityRef;
    use chrono::NaiveDate;

    fn meeting(entities: &[&str], participants: Participants) -> Meeting {
        Meeting {
            date: NaiveDate::from_ymd_opt(2017, 3, 14),
            cancelled: false,
            location: "Brussels".to_string(),
            subject: "Trade policy".to_string(),
            entities: entities
                .iter()
                .map(|id| EntityRef::Registered(id.to_string()))
                .collect(),
            participants,
        }
    }

    #[test]
    fn test_key_separates_entities() {
        let leader = || Participants::Leader("L1".to_string());
        assert_ne!(
            meeting_key(&meeting(&["1111-11"], leader())),
            meeting_key(&meeting(&["2222-22"], leader()))
        );
    }

    #[test]
    fn test_key_separates_participants() {
        assert_ne!(
            meeting_key(&meeting(&[], Participants::Leader("L1".to_string()))),
            meeting_key(&meeting(&[], Participants::Members(vec!["L1".to_string()])))
        );
    }

    #[test]
    fn test_key_ignores_order() {
        let a = meeting(
            &["2222-22", "1111-11"],
            Participants::Members(vec!["m-2".to_string(), "m-1".to_string()]),
        );
        let b = meeting(
            &["1111-11", "2222-22"],
            Participants::Members(vec!["m-1".to_string(), "m-2".to_string()]),
        );
        assert_eq!(meeting_key(&a), meeting_key(&b));
        assert_eq!(
            meeting_key(&a),
            "members:m-1,m-2|entities:1111-11,2222-22"
        );
    }
}
