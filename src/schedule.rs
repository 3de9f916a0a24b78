use anyhow::Result;
use chrono::{Local, NaiveTime};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::bot::Bot;

/// Whether `now` falls inside the active-hours window. The window includes
/// its start and excludes its end, may wrap past midnight, and covers the
/// whole day when both ends are equal.
pub fn within_window(now: NaiveTime, window: Option<(NaiveTime, NaiveTime)>) -> bool {
    match window {
        None => true,
        Some((start, end)) if start == end => true,
        Some((start, end)) if start < end => now >= start && now < end,
        Some((start, end)) => now >= start || now < end,
    }
}

/// Tick period for a configured interval in minutes.
pub fn interval_period(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Check all filters on a fixed interval until Ctrl-C. A cycle runs to
/// completion before the next tick is awaited, so cycles never overlap.
pub async fn run(bot: &Bot) -> Result<()> {
    let schedule = &bot.config().schedule;
    let window = schedule.active_window()?;
    let mut tick = tokio::time::interval(interval_period(schedule.interval_minutes));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        "Checking issues every {} minutes",
        schedule.interval_minutes
    );
    if let Some((start, end)) = window {
        tracing::info!(%start, %end, "Active hours window");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = Local::now().time();
                if !within_window(now, window) {
                    tracing::debug!(%now, "Outside active hours, skipping check");
                    continue;
                }
                bot.run_all().await;
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn interval_period_in_seconds() {
        assert_eq!(interval_period(15), Duration::from_secs(900));
        assert_eq!(interval_period(u64::MAX), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn no_window_is_always_active() {
        assert!(within_window(t(3, 0), None));
    }

    #[test]
    fn daytime_window() {
        let window = Some((t(8, 0), t(18, 0)));
        assert!(within_window(t(8, 0), window));
        assert!(within_window(t(12, 30), window));
        assert!(!within_window(t(18, 0), window));
        assert!(!within_window(t(7, 59), window));
    }

    #[test]
    fn window_wrapping_midnight() {
        let window = Some((t(22, 0), t(6, 0)));
        assert!(within_window(t(23, 0), window));
        assert!(within_window(t(2, 0), window));
        assert!(!within_window(t(6, 0), window));
        assert!(!within_window(t(12, 0), window));
    }

    #[test]
    fn equal_ends_cover_whole_day() {
        let window = Some((t(9, 0), t(9, 0)));
        assert!(within_window(t(0, 0), window));
        assert!(within_window(t(9, 0), window));
    }
}
