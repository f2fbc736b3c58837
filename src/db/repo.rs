use super::model::{DateRow, MemberRow, ReflectionRow, StatusLabels, SubmissionRow};
use crate::model::{
    DateFlag, MemberFlag, MemberId, ReflectStatus, ReflectionRecord, ShareStatus, SubmitStatus,
    Submission,
};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

const MAX_ID_ATTEMPTS: usize = 16;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("connecting to {normalized}"))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For a file-backed SQLite URL: expand a leading `~/`, make sure the parent
/// directory exists, and ask SQLite to create the file. In-memory and
/// non-sqlite URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{path}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn member_row(row: &SqliteRow) -> MemberRow {
    MemberRow {
        id: row.get("id"),
        name: row.get("name"),
        display_name: row.get("display_name"),
        position: row.get("position"),
        submit_status: row.get("submit_status"),
        check_flag: row.get("check_flag"),
        reflect_status: row.get("reflect_status"),
        sheet_ref: row.get("sheet_ref"),
        locked: row.get("locked"),
    }
}

const MEMBER_COLUMNS: &str = "id, name, display_name, position, submit_status, check_flag, \
                              reflect_status, sheet_ref, locked";

#[instrument(skip_all)]
pub async fn fetch_members(pool: &Pool) -> Result<Vec<MemberRow>> {
    let rows = sqlx::query(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members ORDER BY position"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(member_row).collect())
}

#[instrument(skip_all)]
pub async fn fetch_member(pool: &Pool, member_id: &MemberId) -> Result<Option<MemberRow>> {
    let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"))
        .bind(member_id.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(member_row))
}

#[instrument(skip_all)]
pub async fn fetch_dates(pool: &Pool) -> Result<Vec<DateRow>> {
    let rows = sqlx::query("SELECT date, complete, share_status FROM schedule_dates ORDER BY date")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| DateRow {
            date: row.get("date"),
            complete: row.get("complete"),
            share_status: row.get("share_status"),
        })
        .collect())
}

#[instrument(skip_all)]
pub async fn fetch_submission(
    pool: &Pool,
    member_id: &MemberId,
    date: NaiveDate,
) -> Result<Option<SubmissionRow>> {
    let row = sqlx::query(
        "SELECT wish_status, raw_start, raw_end, note FROM submissions WHERE member_id = ? AND date = ?",
    )
    .bind(member_id.as_str())
    .bind(date)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| SubmissionRow {
        wish_status: row.get("wish_status"),
        raw_start: row.get("raw_start"),
        raw_end: row.get("raw_end"),
        note: row.get("note"),
    }))
}

#[instrument(skip_all)]
pub async fn upsert_reflection(pool: &Pool, record: &ReflectionRecord) -> Result<()> {
    let slots = serde_json::to_string(&record.grid)?;
    sqlx::query(
        "INSERT INTO reflections (member_id, date, slots, note, start_label, end_label) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(member_id, date) DO UPDATE SET \
            slots = excluded.slots, note = excluded.note, \
            start_label = excluded.start_label, end_label = excluded.end_label, \
            updated_at = CURRENT_TIMESTAMP",
    )
    .bind(record.member_id.as_str())
    .bind(record.date)
    .bind(slots)
    .bind(&record.note)
    .bind(&record.start_label)
    .bind(&record.end_label)
    .execute(pool)
    .await?;
    Ok(())
}

/// Reflections for one date, in roster order.
#[instrument(skip_all)]
pub async fn fetch_reflections(pool: &Pool, date: NaiveDate) -> Result<Vec<ReflectionRow>> {
    let rows = sqlx::query(
        "SELECT r.member_id, m.display_name, m.position, r.date, r.slots, r.note, \
                r.start_label, r.end_label \
         FROM reflections r \
         JOIN members m ON m.id = r.member_id \
         WHERE r.date = ? \
         ORDER BY m.position",
    )
    .bind(date)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| ReflectionRow {
            member_id: row.get("member_id"),
            display_name: row.get("display_name"),
            position: row.get("position"),
            date: row.get("date"),
            slots: row.get("slots"),
            note: row.get("note"),
            start_label: row.get("start_label"),
            end_label: row.get("end_label"),
        })
        .collect())
}

/// Returns false when no such member exists.
#[instrument(skip_all, fields(field = flag.field_name()))]
pub async fn update_member_flag(
    pool: &Pool,
    labels: &StatusLabels,
    member_id: &MemberId,
    flag: MemberFlag,
) -> Result<bool> {
    let query = match flag {
        MemberFlag::Submit(status) => {
            sqlx::query("UPDATE members SET submit_status = ? WHERE id = ?")
                .bind(labels.submit(status).to_string())
        }
        MemberFlag::Check(checked) => {
            sqlx::query("UPDATE members SET check_flag = ? WHERE id = ?").bind(checked)
        }
        MemberFlag::Reflect(status) => {
            sqlx::query("UPDATE members SET reflect_status = ? WHERE id = ?")
                .bind(labels.reflect(status).to_string())
        }
    };
    let res = query.bind(member_id.as_str()).execute(pool).await?;
    Ok(res.rows_affected() > 0)
}

/// Returns false when the date is not on the schedule.
#[instrument(skip_all, fields(date = %date, field = flag.field_name()))]
pub async fn update_date_flag(
    pool: &Pool,
    labels: &StatusLabels,
    date: NaiveDate,
    flag: DateFlag,
) -> Result<bool> {
    let query = match flag {
        DateFlag::Complete(complete) => {
            sqlx::query("UPDATE schedule_dates SET complete = ? WHERE date = ?").bind(complete)
        }
        DateFlag::Share(status) => {
            sqlx::query("UPDATE schedule_dates SET share_status = ? WHERE date = ?")
                .bind(labels.share(status).to_string())
        }
    };
    let res = query.bind(date).execute(pool).await?;
    Ok(res.rows_affected() > 0)
}

/// Returns false when no such member exists.
#[instrument(skip_all)]
pub async fn set_locked(pool: &Pool, member_id: &MemberId, locked: bool) -> Result<bool> {
    let res = sqlx::query("UPDATE members SET locked = ? WHERE id = ?")
        .bind(locked)
        .bind(member_id.as_str())
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

async fn id_in_use(tx: &mut Transaction<'_, Sqlite>, id: &MemberId) -> Result<bool> {
    let hit: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM members WHERE id = ? UNION ALL SELECT 1 FROM retired_member_ids WHERE id = ? LIMIT 1",
    )
    .bind(id.as_str())
    .bind(id.as_str())
    .fetch_optional(&mut **tx)
    .await?;
    Ok(hit.is_some())
}

/// Appends a member at the end of the roster with a freshly issued id.
#[instrument(skip_all)]
pub async fn insert_member(
    pool: &Pool,
    labels: &StatusLabels,
    name: &str,
    display_name: &str,
    sheet_ref: Option<&str>,
) -> Result<MemberId> {
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("member name must be non-empty"));
    }
    let display_name = match display_name.trim() {
        "" => name,
        d => d,
    };

    let mut tx = pool.begin().await?;
    let taken: Option<String> = sqlx::query_scalar("SELECT id FROM members WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(existing) = taken {
        return Err(anyhow!("member name {name:?} already used by {existing}"));
    }

    let mut id = None;
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = MemberId::generate();
        if !id_in_use(&mut tx, &candidate).await? {
            id = Some(candidate);
            break;
        }
        debug!(%candidate, "member id collision; regenerating");
    }
    let id = id.ok_or_else(|| anyhow!("could not issue a fresh member id"))?;

    let position: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
        .fetch_one(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO members (id, name, display_name, position, submit_status, check_flag, reflect_status, sheet_ref) \
         VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(id.as_str())
    .bind(name)
    .bind(display_name)
    .bind(position)
    .bind(labels.submit(SubmitStatus::NotSubmitted).to_string())
    .bind(labels.reflect(ReflectStatus::NotReflected).to_string())
    .bind(sheet_ref)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(id)
}

/// Removes the member with their submissions and reflections, retires the
/// id, and closes the gap in roster positions. Returns false when absent.
#[instrument(skip_all)]
pub async fn delete_member(pool: &Pool, member_id: &MemberId) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let position: Option<i64> = sqlx::query_scalar("SELECT position FROM members WHERE id = ?")
        .bind(member_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
    let Some(position) = position else {
        return Ok(false);
    };

    for sql in [
        "DELETE FROM submissions WHERE member_id = ?",
        "DELETE FROM reflections WHERE member_id = ?",
        "DELETE FROM members WHERE id = ?",
        "INSERT OR IGNORE INTO retired_member_ids (id) VALUES (?)",
    ] {
        sqlx::query(sql)
            .bind(member_id.as_str())
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("UPDATE members SET position = position - 1 WHERE position > ?")
        .bind(position)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}

/// Adds schedule dates; ones already present are left alone. Returns how
/// many were new.
#[instrument(skip_all, fields(count = dates.len()))]
pub async fn insert_dates(pool: &Pool, labels: &StatusLabels, dates: &[NaiveDate]) -> Result<u64> {
    let not_shared = labels.share(ShareStatus::NotShared).to_string();
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for date in dates {
        let res = sqlx::query(
            "INSERT OR IGNORE INTO schedule_dates (date, complete, share_status) VALUES (?, 0, ?)",
        )
        .bind(*date)
        .bind(&not_shared)
        .execute(&mut *tx)
        .await?;
        inserted += res.rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

/// Stores what the member entered for one date and marks them submitted.
/// Returns false when no such member exists.
#[instrument(skip_all)]
pub async fn record_submission(
    pool: &Pool,
    labels: &StatusLabels,
    member_id: &MemberId,
    date: NaiveDate,
    submission: &Submission,
) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let res = sqlx::query("UPDATE members SET submit_status = ? WHERE id = ?")
        .bind(labels.submit(SubmitStatus::Submitted).to_string())
        .bind(member_id.as_str())
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Ok(false);
    }
    sqlx::query(
        "INSERT INTO submissions (member_id, date, wish_status, raw_start, raw_end, note) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(member_id, date) DO UPDATE SET \
            wish_status = excluded.wish_status, raw_start = excluded.raw_start, \
            raw_end = excluded.raw_end, note = excluded.note, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(member_id.as_str())
    .bind(date)
    .bind(labels.wish(submission.wish_status).to_string())
    .bind(submission.raw_start.as_deref())
    .bind(submission.raw_end.as_deref())
    .bind(&submission.note)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(true)
}

/// Next-term reset. Submissions and submit statuses are kept; checks,
/// locks, reflections and per-date completion start over.
#[instrument(skip_all)]
pub async fn reset_term(pool: &Pool, labels: &StatusLabels) -> Result<(u64, u64)> {
    let mut tx = pool.begin().await?;
    let members = sqlx::query("UPDATE members SET check_flag = 0, locked = 0, reflect_status = ?")
        .bind(labels.reflect(ReflectStatus::NotReflected).to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let dates = sqlx::query("UPDATE schedule_dates SET complete = 0, share_status = ?")
        .bind(labels.share(ShareStatus::NotShared).to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok((members, dates))
}
