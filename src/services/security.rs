use chrono::{Datelike, Local, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::config::SecurityLimits;
use crate::error::PayError;

/// Fraud detection, rate limiting and transaction monitoring.
///
/// All counters are process-local and reset on restart; they are a
/// secondary control behind the gateway's own fraud checks. The per-user
/// minute buckets use atomics so concurrent workers never over-count: a
/// rollover racing with an increment can only drop requests from the new
/// window, never carry stale counts into it.
pub struct SecurityGuard {
    limits: SecurityLimits,
    rate_buckets: RwLock<HashMap<String, Arc<MinuteBucket>>>,
    daily_totals: Mutex<HashMap<String, DayBucket>>,
}

struct MinuteBucket {
    epoch_minute: AtomicI64,
    count: AtomicU32,
}

struct DayBucket {
    day_of_year: u32,
    total: Decimal,
}

impl SecurityGuard {
    pub fn new(limits: SecurityLimits) -> Self {
        Self {
            limits,
            rate_buckets: RwLock::new(HashMap::new()),
            daily_totals: Mutex::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &SecurityLimits {
        &self.limits
    }

    /// Validates a single amount against the per-transaction bounds and the
    /// per-user daily running total. The day boundary is the local calendar
    /// day-of-year; crossing it resets the accumulator. The amount is added
    /// before the cap comparison, so a rejected amount stays counted.
    pub fn validate_amount(&self, amount: Decimal, user_id: &str) -> Result<(), PayError> {
        self.validate_amount_on_day(amount, user_id, Local::now().ordinal())
    }

    fn validate_amount_on_day(
        &self,
        amount: Decimal,
        user_id: &str,
        day_of_year: u32,
    ) -> Result<(), PayError> {
        if amount < self.limits.min_amount {
            tracing::warn!(
                amount = %amount,
                min = %self.limits.min_amount,
                user_id,
                "Payment amount below minimum"
            );
            return Err(PayError::AmountOutOfRange(format!(
                "Payment amount must be at least ${}",
                self.limits.min_amount
            )));
        }

        if amount > self.limits.max_amount {
            tracing::warn!(
                amount = %amount,
                max = %self.limits.max_amount,
                user_id,
                "Payment amount above maximum"
            );
            return Err(PayError::AmountOutOfRange(format!(
                "Payment amount exceeds maximum limit of ${}",
                self.limits.max_amount
            )));
        }

        let mut totals = self
            .daily_totals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = totals.entry(user_id.to_string()).or_insert(DayBucket {
            day_of_year,
            total: Decimal::ZERO,
        });

        if bucket.day_of_year != day_of_year {
            bucket.day_of_year = day_of_year;
            bucket.total = Decimal::ZERO;
        }

        bucket.total += amount;
        if bucket.total > self.limits.max_daily_amount {
            tracing::warn!(
                user_id,
                daily_total = %bucket.total,
                max = %self.limits.max_daily_amount,
                "Daily payment limit exceeded"
            );
            return Err(PayError::AmountOutOfRange(format!(
                "Daily payment limit exceeded. Maximum: ${}",
                self.limits.max_daily_amount
            )));
        }

        Ok(())
    }

    /// Counts one request against the user's current epoch-minute window and
    /// rejects once the count, after this increment, exceeds the configured
    /// ceiling. A no-op when rate limiting is disabled.
    pub fn check_rate_limit(&self, user_id: &str, endpoint: &str) -> Result<(), PayError> {
        self.check_rate_limit_at(user_id, endpoint, current_epoch_minute())
    }

    fn check_rate_limit_at(
        &self,
        user_id: &str,
        endpoint: &str,
        epoch_minute: i64,
    ) -> Result<(), PayError> {
        if !self.limits.rate_limit_enabled {
            return Ok(());
        }

        let bucket = self.bucket_for(user_id);
        let requests = record_request(&bucket, epoch_minute);

        if requests > self.limits.max_requests_per_minute {
            tracing::warn!(
                user_id,
                endpoint,
                requests,
                max = self.limits.max_requests_per_minute,
                "Rate limit exceeded"
            );
            return Err(PayError::RateLimited);
        }

        Ok(())
    }

    /// Advisory telemetry only; never fails the caller.
    pub fn detect_suspicious_activity(&self, user_id: &str, amount: Decimal, order_id: Option<&str>) {
        self.detect_suspicious_activity_at(user_id, amount, order_id, current_epoch_minute())
    }

    fn detect_suspicious_activity_at(
        &self,
        user_id: &str,
        amount: Decimal,
        order_id: Option<&str>,
        epoch_minute: i64,
    ) {
        let requests = self.current_minute_count(user_id, epoch_minute);
        if requests > 10 {
            tracing::warn!(
                user_id,
                requests,
                "Suspicious activity detected: rapid payments"
            );
        }

        if amount > self.limits.max_amount * rust_decimal_macros::dec!(0.8) {
            tracing::warn!(
                user_id,
                amount = %amount,
                order_id = order_id.unwrap_or("-"),
                "Large payment detected"
            );
        }
    }

    /// Append-only audit trail. Sink failures must never propagate, so this
    /// goes straight to the log layer.
    pub fn log_security_event(&self, event_type: &str, user_id: &str, details: &str) {
        tracing::info!(
            target: "fleetpay::security",
            event_type,
            user_id,
            details,
            timestamp = %Utc::now(),
            "SECURITY_EVENT"
        );
    }

    fn bucket_for(&self, user_id: &str) -> Arc<MinuteBucket> {
        if let Some(bucket) = self
            .rate_buckets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(user_id)
        {
            return Arc::clone(bucket);
        }

        let mut buckets = self
            .rate_buckets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(buckets.entry(user_id.to_string()).or_insert_with(|| {
            Arc::new(MinuteBucket {
                epoch_minute: AtomicI64::new(-1),
                count: AtomicU32::new(0),
            })
        }))
    }

    fn current_minute_count(&self, user_id: &str, epoch_minute: i64) -> u32 {
        let buckets = self
            .rate_buckets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match buckets.get(user_id) {
            Some(bucket) if bucket.epoch_minute.load(Ordering::SeqCst) == epoch_minute => {
                bucket.count.load(Ordering::SeqCst)
            }
            _ => 0,
        }
    }
}

fn current_epoch_minute() -> i64 {
    Utc::now().timestamp() / 60
}

/// Counts one request in the bucket, resetting first when the window has
/// rolled over. Returns the count including this request.
fn record_request(bucket: &MinuteBucket, epoch_minute: i64) -> u32 {
    let stored = bucket.epoch_minute.load(Ordering::SeqCst);
    if stored != epoch_minute
        && bucket
            .epoch_minute
            .compare_exchange(stored, epoch_minute, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    {
        bucket.count.store(0, Ordering::SeqCst);
    }

    bucket.count.fetch_add(1, Ordering::SeqCst) + 1
}
