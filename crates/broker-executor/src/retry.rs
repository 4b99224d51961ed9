//! Transience classification (§7) and exponential backoff with jitter,
//! grounded on `journal-client`'s uncommitted-read retry loop.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::time::Duration;

static TRANSPORT_TRANSIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)timeout|network|connection|econnrefused|econnreset").unwrap()
});

/// Whether a transport-level failure message looks transient.
pub fn transport_error_is_transient(message: &str) -> bool {
    TRANSPORT_TRANSIENT.is_match(message)
}

/// Whether a non-2xx HTTP status is transient per §7: 5xx other than 501 is
/// transient, everything else (4xx, 501) is not.
pub fn status_is_transient(status: u16) -> bool {
    (500..600).contains(&status) && status != 501
}

/// Exponential backoff with jitter: `base * 2^attempt`, plus up to 10% extra,
/// capped at `max_backoff`.
pub fn backoff_duration(attempt: u32, base: Duration, max_backoff: Duration) -> Duration {
    let exp = base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let jitter_fraction: f64 = rand::thread_rng().gen_range(0.0..0.1);
    let jitter = exp.mul_f64(jitter_fraction);
    (exp + jitter).min(max_backoff)
}
