#![allow(dead_code)]
use std::{future::Future, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use payment_relay_engine::{
    db_types::PaymentTask,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};
use relay_common::Cents;

pub async fn fresh_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await.with_poll_interval(Duration::from_millis(20))
}

pub fn init_logging() {
    let _ = env_logger::try_init();
}

pub fn task(id: &str, cents: i64) -> PaymentTask {
    PaymentTask::now(id, Cents::from(cents))
}

pub fn task_at(id: &str, cents: i64, ts: DateTime<Utc>) -> PaymentTask {
    PaymentTask::new(id, Cents::from(cents), ts)
}

pub fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 15, h, m, s).unwrap()
}

/// Polls `check` every 10 ms until it returns true, panicking after `timeout`.
pub async fn wait_for<F, Fut>(timeout: Duration, what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !check().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("Timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
