use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::QueueError},
    db_types::{Job, PaymentTask, ProcessorId, QueuedJob, Receipt},
};

#[derive(Debug, Clone, FromRow)]
pub struct QueueRow {
    pub id: i64,
    pub kind: String,
    pub processor: Option<String>,
    pub correlation_id: String,
    pub amount: i64,
    pub requested_at: i64,
}

impl TryFrom<QueueRow> for QueuedJob {
    type Error = QueueError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        let corrupt = |msg: String| QueueError::CorruptEntry(row.id, msg);
        let requested_at = DateTime::<Utc>::from_timestamp_millis(row.requested_at)
            .ok_or_else(|| corrupt(format!("{} is not a valid timestamp", row.requested_at)))?;
        let task = PaymentTask::new(row.correlation_id.clone(), row.amount.into(), requested_at);
        let job = match (row.kind.as_str(), &row.processor) {
            ("payment", _) => Job::Payment(task),
            ("settle", Some(p)) => {
                let processor = p.parse::<ProcessorId>().map_err(|e| corrupt(e.to_string()))?;
                Job::Settle { task, processor }
            },
            ("settle", None) => return Err(corrupt("settle job without a processor".into())),
            (kind, _) => return Err(corrupt(format!("unknown job kind '{kind}'"))),
        };
        Ok(QueuedJob { receipt: Receipt(row.id), job })
    }
}

fn job_columns(job: &Job) -> (&'static str, Option<&'static str>) {
    match job {
        Job::Payment(_) => ("payment", None),
        Job::Settle { processor, .. } => ("settle", Some(processor.as_str())),
    }
}

/// Appends the job after every other row. Returns the new row id.
pub async fn push_back(job: &Job, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    insert(job, "(SELECT COALESCE(MAX(position), 0) + 1 FROM task_queue)", conn).await
}

/// Inserts the job before every other row. Returns the new row id.
pub async fn push_front(job: &Job, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    insert(job, "(SELECT COALESCE(MIN(position), 0) - 1 FROM task_queue)", conn).await
}

async fn insert(job: &Job, position: &str, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let (kind, processor) = job_columns(job);
    let task = job.task();
    let sql = format!(
        r#"
            INSERT INTO task_queue (position, kind, processor, correlation_id, amount, requested_at)
            VALUES ({position}, $1, $2, $3, $4, $5)
            RETURNING id;
        "#
    );
    let (id,): (i64,) = sqlx::query_as(&sql)
        .bind(kind)
        .bind(processor)
        .bind(&task.correlation_id)
        .bind(task.amount)
        .bind(task.requested_at.timestamp_millis())
        .fetch_one(conn)
        .await?;
    Ok(id)
}

/// Claims the unclaimed row with the lowest position. The `claimed = 0` guard on the outer update means that two
/// connections racing for the same row cannot both win; the loser simply gets `None`.
pub async fn claim_head(conn: &mut SqliteConnection) -> Result<Option<QueueRow>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, QueueRow>(
        r#"
            UPDATE task_queue SET claimed = 1
            WHERE claimed = 0 AND id = (SELECT id FROM task_queue WHERE claimed = 0 ORDER BY position LIMIT 1)
            RETURNING id, kind, processor, correlation_id, amount, requested_at;
        "#,
    )
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Releases a claimed row, overwriting its job and moving it to the head of the queue. Returns false if the row does
/// not exist.
pub async fn move_to_front(
    receipt: Receipt,
    job: &Job,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let (kind, processor) = job_columns(job);
    let result = sqlx::query(
        r#"
            UPDATE task_queue
            SET position = (SELECT COALESCE(MIN(position), 0) - 1 FROM task_queue),
                kind = $1,
                processor = $2,
                claimed = 0
            WHERE id = $3;
        "#,
    )
    .bind(kind)
    .bind(processor)
    .bind(receipt.0)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(receipt: Receipt, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM task_queue WHERE id = $1").bind(receipt.0).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_unclaimed(conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_queue WHERE claimed = 0").fetch_one(conn).await?;
    u64::try_from(count).map_err(|e| SqliteDatabaseError::QueryError(e.to_string()))
}

/// Moves every claimed row in front of the unclaimed ones, keeping their relative order, and marks them unclaimed.
/// Returns the number of rows released.
pub async fn release_claimed(conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let mut tx = sqlx::Connection::begin(conn).await?;
    let (head, last_claimed): (Option<i64>, Option<i64>) = sqlx::query_as(
        r#"
            SELECT (SELECT MIN(position) FROM task_queue), (SELECT MAX(position) FROM task_queue WHERE claimed = 1);
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;
    let (Some(head), Some(last_claimed)) = (head, last_claimed) else {
        tx.commit().await?;
        return Ok(0);
    };
    // Shifting by this offset puts the last claimed row just before the current head
    let offset = head - 1 - last_claimed;
    let result = sqlx::query("UPDATE task_queue SET position = position + $1, claimed = 0 WHERE claimed = 1")
        .bind(offset)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected())
}
