use chrono::{NaiveDate, Utc};
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;

use crate::config::GatewaySettings;
use crate::error::{RelayError, Result};

fn per_second(field: &str, rate: u32, burst: u32) -> Result<Quota> {
    let rate = NonZeroU32::new(rate)
        .ok_or_else(|| RelayError::Config(format!("{} rate must be > 0", field)))?;
    let burst = NonZeroU32::new(burst)
        .ok_or_else(|| RelayError::Config(format!("{} burst must be > 0", field)))?;
    Ok(Quota::per_second(rate).allow_burst(burst))
}

/// Requests per API key per UTC day.
#[derive(Debug)]
pub struct DailyQuota {
    limit: u32,
    usage: Mutex<HashMap<String, (NaiveDate, u32)>>,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            usage: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `key` on `today`; returns how many remain.
    pub fn try_consume(&self, key: &str, today: NaiveDate) -> Result<u32> {
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let entry = usage.entry(key.to_string()).or_insert((today, 0));
        if entry.0 != today {
            *entry = (today, 0);
        }
        if entry.1 >= self.limit {
            return Err(RelayError::QuotaExceeded);
        }
        entry.1 += 1;
        Ok(self.limit - entry.1)
    }
}

/// Stage-wide throttle, per-key throttle, then the daily quota.
pub struct UsagePlan {
    stage: DefaultDirectRateLimiter,
    per_key: DefaultKeyedRateLimiter<String>,
    quota: DailyQuota,
}

impl UsagePlan {
    pub fn from_settings(gateway: &GatewaySettings) -> Result<Self> {
        let stage = per_second(
            "stage",
            gateway.stage_rate_limit,
            gateway.stage_burst_limit,
        )?;
        let per_key = per_second("usage plan", gateway.rate_limit, gateway.burst_limit)?;
        Ok(Self {
            stage: RateLimiter::direct(stage),
            per_key: RateLimiter::keyed(per_key),
            quota: DailyQuota::new(gateway.daily_quota),
        })
    }

    pub fn admit(&self, api_key: &str) -> Result<u32> {
        self.admit_on(api_key, Utc::now().date_naive())
    }

    fn admit_on(&self, api_key: &str, today: NaiveDate) -> Result<u32> {
        if self.stage.check().is_err() {
            return Err(RelayError::Throttled);
        }
        if self.per_key.check_key(&api_key.to_string()).is_err() {
            return Err(RelayError::Throttled);
        }
        self.quota.try_consume(api_key, today)
    }
}
