// Grafana time specifications and their resolution to absolute instants
//
// Accepted forms:
//   * "now"
//   * relative: "now-1h", "now+30m", "now-2d", "now-3w", "now-5M", "now-1y"
//   * absolute milliseconds since epoch: "1463464226537"
//   * any of the above with a boundary suffix: "now/d", "now-1d/d", "now-1M/M"
//
// A boundary suffix resolves differently for the start and the end of a
// range: From "now/d" is the start of today, To "now/d" is the start of
// tomorrow.
use chrono::{
    DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone,
};

const DEFAULT_FROM: &str = "now-1h";
const DEFAULT_TO: &str = "now";

/// `Mon Jan  2 15:04:05 UTC 2006`
const DISPLAY_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeSpecError {
    #[error("{0} is not a recognised time format")]
    Malformed(String),
}

/// Which end of a range a specification is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    From,
    To,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(c: char) -> Option<Self> {
        match c {
            'm' => Some(Unit::Minute),
            'h' => Some(Unit::Hour),
            'd' => Some(Unit::Day),
            'w' => Some(Unit::Week),
            'M' => Some(Unit::Month),
            'y' => Some(Unit::Year),
            _ => None,
        }
    }

    fn is_calendar_boundary(self) -> bool {
        !matches!(self, Unit::Minute | Unit::Hour)
    }
}

/// The raw `from`/`to` pair of a report request. Kept as text because the
/// Grafana render endpoint takes the specifications verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    from: String,
    to: String,
}

impl TimeRange {
    /// Empty specifications fall back to the last hour.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            from: if from.is_empty() { DEFAULT_FROM.to_string() } else { from },
            to: if to.is_empty() { DEFAULT_TO.to_string() } else { to },
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn resolve<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<ResolvedRange<Tz>, TimeSpecError> {
        Ok(ResolvedRange {
            from: resolve(&self.from, now, Boundary::From)?,
            to: resolve(&self.to, now, Boundary::To)?,
        })
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.from, self.to)
    }
}

/// Both ends of a [`TimeRange`] resolved against a single anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange<Tz: TimeZone> {
    pub from: DateTime<Tz>,
    pub to: DateTime<Tz>,
}

impl<Tz: TimeZone> ResolvedRange<Tz>
where
    Tz::Offset: std::fmt::Display,
{
    pub fn from_formatted(&self) -> String {
        format_instant(&self.from)
    }

    pub fn to_formatted(&self) -> String {
        format_instant(&self.to)
    }
}

pub fn format_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.format(DISPLAY_FORMAT).to_string()
}

/// Resolve a single specification against `now`.
pub fn resolve<Tz: TimeZone>(
    spec: &str,
    now: &DateTime<Tz>,
    boundary: Boundary,
) -> Result<DateTime<Tz>, TimeSpecError> {
    let malformed = || TimeSpecError::Malformed(spec.to_string());

    match spec.rsplit_once('/') {
        Some((moment, unit)) => {
            let unit = single_char(unit)
                .and_then(Unit::parse)
                .filter(|u| u.is_calendar_boundary())
                .ok_or_else(malformed)?;
            let moment = parse_moment(moment, now).ok_or_else(malformed)?;
            round_to_boundary(&moment, unit, boundary).ok_or_else(malformed)
        }
        None => parse_moment(spec, now).ok_or_else(malformed),
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn parse_moment<Tz: TimeZone>(s: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    if s == "now" {
        return Some(now.clone());
    }
    if let Some(offset) = s.strip_prefix("now") {
        return parse_relative(offset, now);
    }
    parse_absolute(s, &now.timezone())
}

/// `[+-]<digits><unit>`, the part after "now".
fn parse_relative<Tz: TimeZone>(offset: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let unit = Unit::parse(offset.chars().last()?)?;
    let amount = &offset[..offset.len() - 1];

    let (sign, digits) = match amount.split_at_checked(1)? {
        ("+", digits) => (1, digits),
        ("-", digits) => (-1, digits),
        _ => return None,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = sign * digits.parse::<i64>().ok()?;

    match unit {
        Unit::Minute => now.clone().checked_add_signed(TimeDelta::try_minutes(n)?),
        Unit::Hour => now.clone().checked_add_signed(TimeDelta::try_hours(n)?),
        Unit::Day => shift_days(now, n),
        Unit::Week => shift_days(now, n.checked_mul(7)?),
        Unit::Month => shift_months(now, n),
        Unit::Year => shift_months(now, n.checked_mul(12)?),
    }
}

fn parse_absolute<Tz: TimeZone>(s: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let millis: i64 = s.parse().ok()?;
    tz.timestamp_opt(millis / 1000, 0).single()
}

/// Calendar day shift: keeps the wall-clock time of day in the anchor's zone.
fn shift_days<Tz: TimeZone>(now: &DateTime<Tz>, n: i64) -> Option<DateTime<Tz>> {
    let naive = now.naive_local();
    let shifted = naive.checked_add_signed(TimeDelta::try_days(n)?)?;
    localize(&now.timezone(), shifted)
}

/// Month shift with day-of-month overflow rolling into the following month,
/// so Jan 31 2016 + 1 month is Mar 2.
fn shift_months<Tz: TimeZone>(now: &DateTime<Tz>, n: i64) -> Option<DateTime<Tz>> {
    let naive = now.naive_local();
    let months = i64::from(naive.year()) * 12 + i64::from(naive.month0()) + n;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month0 = u32::try_from(months.rem_euclid(12)).ok()?;

    let date = NaiveDate::from_ymd_opt(year, month0 + 1, 1)?
        .checked_add_days(Days::new(u64::from(naive.day0())))?;
    localize(&now.timezone(), date.and_time(naive.time()))
}

fn round_to_boundary<Tz: TimeZone>(
    moment: &DateTime<Tz>,
    unit: Unit,
    boundary: Boundary,
) -> Option<DateTime<Tz>> {
    let date = moment.date_naive();
    let to = boundary == Boundary::To;

    let start = match unit {
        Unit::Day => {
            if to {
                date.succ_opt()?
            } else {
                date
            }
        }
        Unit::Week => {
            let since_sunday = u64::from(date.weekday().num_days_from_sunday());
            let sunday = date.checked_sub_days(Days::new(since_sunday))?;
            if to {
                sunday.checked_add_days(Days::new(7))?
            } else {
                sunday
            }
        }
        Unit::Month => {
            let first = date.with_day(1)?;
            if to {
                first.checked_add_months(chrono::Months::new(1))?
            } else {
                first
            }
        }
        Unit::Year => {
            let year = if to { date.year() + 1 } else { date.year() };
            NaiveDate::from_ymd_opt(year, 1, 1)?
        }
        Unit::Minute | Unit::Hour => return None,
    };

    localize(&moment.timezone(), start.and_time(NaiveTime::MIN))
}

/// Map a wall-clock time back into `tz`. Ambiguous times take the earlier
/// instant; times inside a DST gap move forward by an hour.
fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&naive.checked_add_signed(TimeDelta::try_hours(1)?)?)
            .earliest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // Wed, 06 Jan 2016 16:34:32 UTC
    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 6, 16, 34, 32).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn from(spec: &str) -> DateTime<Utc> {
        resolve(spec, &anchor(), Boundary::From).unwrap()
    }

    fn to(spec: &str) -> DateTime<Utc> {
        resolve(spec, &anchor(), Boundary::To).unwrap()
    }

    #[test]
    fn test_now_returns_the_anchor() {
        assert_eq!(to("now"), anchor());
        assert_eq!(from("now"), anchor());
    }

    #[test]
    fn test_minutes_and_hours_use_exact_durations() {
        assert_eq!(to("now-1m"), anchor() - TimeDelta::minutes(1));
        assert_eq!(to("now-58m"), anchor() - TimeDelta::minutes(58));
        assert_eq!(to("now+1m"), anchor() + TimeDelta::minutes(1));
        assert_eq!(to("now+58m"), anchor() + TimeDelta::minutes(58));
        assert_eq!(to("now-3h"), anchor() - TimeDelta::hours(3));
        assert_eq!(to("now-82h"), anchor() - TimeDelta::hours(82));
    }

    #[test]
    fn test_days_and_weeks_use_calendar_arithmetic() {
        assert_eq!(to("now-1d"), Utc.with_ymd_and_hms(2016, 1, 5, 16, 34, 32).unwrap());
        assert_eq!(to("now-105d"), anchor() - TimeDelta::days(105));
        assert_eq!(to("now-1w"), Utc.with_ymd_and_hms(2015, 12, 30, 16, 34, 32).unwrap());
        assert_eq!(to("now-33w"), anchor() - TimeDelta::days(33 * 7));
    }

    #[test]
    fn test_months_and_years_use_calendar_arithmetic() {
        assert_eq!(to("now-1M"), Utc.with_ymd_and_hms(2015, 12, 6, 16, 34, 32).unwrap());
        assert_eq!(to("now-33M"), Utc.with_ymd_and_hms(2013, 4, 6, 16, 34, 32).unwrap());
        assert_eq!(to("now+2M"), Utc.with_ymd_and_hms(2016, 3, 6, 16, 34, 32).unwrap());
        assert_eq!(to("now-1y"), Utc.with_ymd_and_hms(2015, 1, 6, 16, 34, 32).unwrap());
        assert_eq!(to("now-33y"), Utc.with_ymd_and_hms(1983, 1, 6, 16, 34, 32).unwrap());
    }

    #[test]
    fn test_month_overflow_rolls_into_the_next_month() {
        let jan31 = Utc.with_ymd_and_hms(2016, 1, 31, 12, 0, 0).unwrap();
        let shifted = resolve("now+1M", &jan31, Boundary::From).unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2016, 3, 2, 12, 0, 0).unwrap());

        let leap_day = Utc.with_ymd_and_hms(2016, 2, 29, 8, 0, 0).unwrap();
        let shifted = resolve("now+1y", &leap_day, Boundary::From).unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2017, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_absolute_milliseconds_truncate_to_seconds() {
        assert_eq!(to("1463464226537"), Utc.timestamp_opt(1463464226, 0).unwrap());
        assert_eq!(from("1463464226537"), to("1463464226537"));
    }

    #[test]
    fn test_unrecognised_formats_are_rejected_for_both_boundaries() {
        for spec in ["not-a-time", "now-43k", "1235032k", "", "now-", "now1h", "now-1h/h", "/d", "now/d/d", "now/x"] {
            for boundary in [Boundary::From, Boundary::To] {
                assert_eq!(
                    resolve(spec, &anchor(), boundary),
                    Err(TimeSpecError::Malformed(spec.to_string())),
                    "{spec:?} as {boundary:?}"
                );
            }
        }
    }

    #[test]
    fn test_from_without_boundary_matches_to() {
        for spec in ["now", "now-3M", "14123456789"] {
            assert_eq!(from(spec), to(spec));
        }
    }

    #[test]
    fn test_start_boundaries() {
        let start_of_today = utc(2016, 1, 6);
        assert_eq!(from("now/d"), start_of_today);
        assert_eq!(from("now-1m/d"), start_of_today);
        assert_eq!(from("now-72m/d"), start_of_today);
        assert_eq!(from("now-1d/d"), utc(2016, 1, 5));
        assert_eq!(from("now-24h/d"), utc(2016, 1, 5));

        let start_of_week = utc(2016, 1, 3);
        for spec in ["now/w", "now-82m/w", "now-33h/w", "now-2d/w"] {
            assert_eq!(from(spec), start_of_week, "{spec}");
        }
        assert_eq!(from("now-1w/w"), utc(2015, 12, 27));

        for spec in ["now/M", "now-82m/M", "now-33h/M", "now-2d/M", "now/y", "now-2d/y"] {
            assert_eq!(from(spec), utc(2016, 1, 1), "{spec}");
        }
        assert_eq!(from("now-1M/M"), utc(2015, 12, 1));
        assert_eq!(from("now-1y/y"), utc(2015, 1, 1));
    }

    #[test]
    fn test_end_boundaries() {
        let end_of_today = utc(2016, 1, 7);
        assert_eq!(to("now/d"), end_of_today);
        assert_eq!(to("now-1m/d"), end_of_today);
        assert_eq!(to("now-72m/d"), end_of_today);
        assert_eq!(to("now-1d/d"), utc(2016, 1, 6));

        let end_of_week = utc(2016, 1, 10);
        for spec in ["now/w", "now-82m/w", "now-33h/w", "now-2d/w"] {
            assert_eq!(to(spec), end_of_week, "{spec}");
        }
        assert_eq!(to("now-1w/w"), utc(2016, 1, 3));

        for spec in ["now/M", "now-82m/M", "now-33h/M", "now-2d/M"] {
            assert_eq!(to(spec), utc(2016, 2, 1), "{spec}");
        }
        assert_eq!(to("now-1M/M"), utc(2016, 1, 1));

        for spec in ["now/y", "now-82m/y", "now-33h/y", "now-2d/y"] {
            assert_eq!(to(spec), utc(2017, 1, 1), "{spec}");
        }
        assert_eq!(to("now-1y/y"), utc(2016, 1, 1));
    }

    #[test]
    fn test_day_boundary_end_is_one_day_after_start() {
        assert_ne!(from("now/d"), to("now/d"));
        assert_eq!(to("now/d") - from("now/d"), TimeDelta::days(1));
    }

    #[test]
    fn test_boundaries_roll_over_month_and_year_ends() {
        let new_years_eve = Utc.with_ymd_and_hms(2015, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(resolve("now/d", &new_years_eve, Boundary::To).unwrap(), utc(2016, 1, 1));
        assert_eq!(resolve("now/M", &new_years_eve, Boundary::To).unwrap(), utc(2016, 1, 1));
        // Sat 2 Jan 2016: the week ends on the following Sunday
        let saturday = Utc.with_ymd_and_hms(2016, 1, 2, 10, 0, 0).unwrap();
        assert_eq!(resolve("now/w", &saturday, Boundary::To).unwrap(), utc(2016, 1, 3));
        // a Sunday is its own week start
        let sunday = Utc.with_ymd_and_hms(2016, 1, 3, 10, 0, 0).unwrap();
        assert_eq!(resolve("now/w", &sunday, Boundary::From).unwrap(), utc(2016, 1, 3));
    }

    #[test]
    fn test_boundaries_follow_the_anchor_time_zone() {
        let plus_two = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        // 23:30 UTC on the 5th is already the 6th at +02:00
        let now = plus_two.with_ymd_and_hms(2016, 1, 6, 1, 30, 0).unwrap();
        let start = resolve("now/d", &now, Boundary::From).unwrap();
        assert_eq!(start, plus_two.with_ymd_and_hms(2016, 1, 6, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_day_boundary_snaps_to_local_midnight_in_a_named_zone() {
        use chrono_tz::Europe::Berlin;
        // 23:30 UTC on the 5th, 00:30 on the 6th in Berlin
        let now = Utc.with_ymd_and_hms(2016, 1, 5, 23, 30, 0).unwrap().with_timezone(&Berlin);
        let range = TimeRange::new("now/d", "now/d").resolve(&now).unwrap();
        assert_eq!(range.from, Berlin.with_ymd_and_hms(2016, 1, 6, 0, 0, 0).unwrap());
        assert_eq!(range.to, Berlin.with_ymd_and_hms(2016, 1, 7, 0, 0, 0).unwrap());
        assert_eq!(range.from.with_timezone(&Utc), Utc.with_ymd_and_hms(2016, 1, 5, 23, 0, 0).unwrap());
        assert_eq!(range.from_formatted(), "Wed Jan  6 00:00:00 CET 2016");
    }

    #[test]
    fn test_minutes_and_hours_in_a_named_zone_cross_dst() {
        use chrono_tz::Europe::Berlin;
        // clocks jumped from 02:00 CET to 03:00 CEST that night
        let now = Berlin.with_ymd_and_hms(2016, 3, 27, 4, 0, 0).unwrap();
        let range = TimeRange::new("now-3h", "now-30m").resolve(&now).unwrap();
        assert_eq!(range.from, Berlin.with_ymd_and_hms(2016, 3, 27, 0, 0, 0).unwrap());
        assert_eq!(range.to, Berlin.with_ymd_and_hms(2016, 3, 27, 3, 30, 0).unwrap());
    }

    #[test]
    fn test_empty_range_defaults_to_the_last_hour() {
        let range = TimeRange::new("", "");
        assert_eq!(range.from(), "now-1h");
        assert_eq!(range.to(), "now");
        assert_eq!(TimeRange::default(), range);

        let resolved = range.resolve(&anchor()).unwrap();
        assert_eq!(resolved.from, anchor() - TimeDelta::hours(1));
        assert_eq!(resolved.to, anchor());
    }

    #[test]
    fn test_resolution_depends_only_on_the_anchor() {
        let range = TimeRange::new("now-1d/d", "now-1d/d");
        let first = range.resolve(&anchor()).unwrap();
        assert_eq!(first, range.resolve(&anchor()).unwrap());
        assert_eq!(first.from, utc(2016, 1, 5));
        assert_eq!(first.to, utc(2016, 1, 6));

        let later = range.resolve(&(anchor() + TimeDelta::days(3))).unwrap();
        assert_eq!(later.from, utc(2016, 1, 8));
    }

    #[test]
    fn test_formatted_instants_are_human_readable() {
        let resolved = TimeRange::new("1453206447000", "now").resolve(&anchor()).unwrap();
        assert_eq!(resolved.from_formatted(), "Tue Jan 19 12:27:27 UTC 2016");
        assert_eq!(resolved.to_formatted(), "Wed Jan  6 16:34:32 UTC 2016");
    }
}
