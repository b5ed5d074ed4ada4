use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{PaymentsSummary, ProcessorId, RecordResult, SettledTransaction, TimeWindow},
};

/// Inserts the transaction unless one with the same correlation id is already present. This is a single statement, so
/// concurrent inserts of the same id cannot both succeed.
pub async fn idempotent_insert(
    transaction: &SettledTransaction,
    conn: &mut SqliteConnection,
) -> Result<RecordResult, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            INSERT INTO settled_transactions (correlation_id, amount, requested_at, processor)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (correlation_id) DO NOTHING;
        "#,
    )
    .bind(&transaction.correlation_id)
    .bind(transaction.amount)
    .bind(transaction.requested_at.timestamp_millis())
    .bind(transaction.processor.as_str())
    .execute(conn)
    .await?;
    match result.rows_affected() {
        0 => Ok(RecordResult::AlreadyRecorded),
        _ => Ok(RecordResult::Inserted),
    }
}

/// Counts and sums settled transactions per processor, optionally restricted to an inclusive window on
/// `requested_at`. Processors without any transactions report zeroes.
pub async fn summarize(
    window: Option<TimeWindow>,
    conn: &mut SqliteConnection,
) -> Result<PaymentsSummary, SqliteDatabaseError> {
    let from = window.map(|w| w.from().timestamp_millis());
    let to = window.map(|w| w.to().timestamp_millis());
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
            SELECT processor, COUNT(*), COALESCE(SUM(amount), 0)
            FROM settled_transactions
            WHERE ($1 IS NULL OR requested_at >= $1) AND ($2 IS NULL OR requested_at <= $2)
            GROUP BY processor;
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await?;
    let mut summary = PaymentsSummary::default();
    for (processor, count, amount) in rows {
        let processor = match processor.parse::<ProcessorId>() {
            Ok(p) => p,
            Err(e) => {
                error!("🗃️ Ignoring {count} ledger rows. {e}");
                continue;
            },
        };
        let totals = summary.totals_mut(processor);
        totals.total_requests = u64::try_from(count).map_err(|e| SqliteDatabaseError::QueryError(e.to_string()))?;
        totals.total_amount = amount.into();
    }
    trace!("🗃️ Summary for {window:?}: {summary:?}");
    Ok(summary)
}
