use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Client;

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn http_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(3)))
        .user_agent("Mozilla/5.0")
        .build()?)
}

/// Parses clock times such as `7:00 PM`, `07:00PM` or `7:00pm`.
pub fn parse_clock(value: &str) -> Result<NaiveTime> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    NaiveTime::parse_from_str(&compact, "%I:%M%p")
        .map_err(|err| anyhow!("invalid clock time {:?}: {}", value, err))
}

/// Splits `start - end` into two clock times.
pub fn parse_time_range(value: &str) -> Result<(NaiveTime, NaiveTime)> {
    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| anyhow!("invalid time range {:?}", value))?;
    Ok((parse_clock(start)?, parse_clock(end)?))
}

/// Places a year-less date in the current year, or the next one when that
/// moment has already passed.
pub fn upcoming_datetime(month: u32, day: u32, time: NaiveTime, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let at_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|date| date.and_time(time))
            .ok_or_else(|| anyhow!("invalid date {}/{} in {}", month, day, year))
    };
    let candidate = at_year(now.year())?;
    if candidate < now {
        at_year(now.year() + 1)
    } else {
        Ok(candidate)
    }
}

/// Reads the first `$x.yy` amount following `Order Total`, in cents.
/// End of a clock range that starts at `start`; ranges past midnight end the next day.
pub fn end_after(start: NaiveDateTime, end_clock: NaiveTime) -> Result<NaiveDateTime> {
    let date = if end_clock <= start.time() {
        start
            .date()
            .succ_opt()
            .ok_or_else(|| anyhow!("no day after {}", start.date()))?
    } else {
        start.date()
    };
    Ok(date.and_time(end_clock))
}

pub fn parse_order_total_cents(page: &str) -> Option<u64> {
    let after_label = &page[page.find("Order Total")?..];
    let amount = &after_label[after_label.find('$')? + 1..];
    let digits: String = amount
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    let (dollars, cents) = match digits.split_once('.') {
        Some((dollars, cents)) => (dollars, cents),
        None => (digits.as_str(), "0"),
    };
    let dollars: u64 = dollars.parse().ok()?;
    let cents: u64 = match cents.len() {
        0 => 0,
        1 => cents.parse::<u64>().ok()? * 10,
        _ => cents.get(..2)?.parse().ok()?,
    };
    dollars.checked_mul(100)?.checked_add(cents)
}
