use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Rendering of a schedule with no set slots.
pub const NO_ACTIVE_PERIODS: &str = "No active periods";

const SLOT_MINUTES: u16 = 30;
const SLOTS_PER_HALF: u16 = 24;
const HALF_MINUTES: u16 = SLOT_MINUTES * SLOTS_PER_HALF;
const SLOT_MASK: u32 = (1 << SLOTS_PER_HALF) - 1;

/// Which half of the day a schedule register covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayHalf {
    /// 00:00 to 12:00
    Am,
    /// 12:00 to 24:00
    Pm,
}

impl DayHalf {
    fn offset(self) -> u16 {
        match self {
            DayHalf::Am => 0,
            DayHalf::Pm => HALF_MINUTES,
        }
    }
}

/// Half-open interval of minutes since midnight. `end` may be 24:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u16,
    pub end: u16,
}

impl TimeRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| Error::InvalidSchedule(format!("expected HH:MM-HH:MM, got {s:?}")))?;
        Ok(TimeRange {
            start: parse_clock(start)?,
            end: parse_clock(end)?,
        })
    }
}

fn parse_clock(s: &str) -> Result<u16> {
    let invalid = || Error::InvalidSchedule(format!("bad time {s:?}"));
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    let h: u16 = h.parse().map_err(|_| invalid())?;
    let m: u16 = m.parse().map_err(|_| invalid())?;
    if m >= 60 || h > 24 || h * 60 + m > 24 * 60 {
        return Err(invalid());
    }
    Ok(h * 60 + m)
}

/// Runs of consecutive set slots, in ascending order.
pub fn ranges(mask: u32, half: DayHalf) -> Vec<TimeRange> {
    let mask = mask & SLOT_MASK;
    let offset = half.offset();
    let mut out = Vec::new();
    let mut start = None;

    for slot in 0..=SLOTS_PER_HALF {
        let set = slot < SLOTS_PER_HALF && mask & (1 << slot) != 0;
        match (set, start) {
            (true, None) => start = Some(slot),
            (false, Some(s)) => {
                out.push(TimeRange::new(
                    offset + s * SLOT_MINUTES,
                    offset + slot * SLOT_MINUTES,
                ));
                start = None;
            }
            _ => {}
        }
    }
    out
}

/// Human-readable form of one half-day register, e.g. `"06:00-09:30, 10:00-11:00"`.
pub fn decode(mask: u32, half: DayHalf) -> String {
    render(&ranges(mask, half))
}

/// Combined AM and PM view of one day.
pub fn decode_day(am: u32, pm: u32) -> String {
    let mut all = ranges(am, DayHalf::Am);
    all.extend(ranges(pm, DayHalf::Pm));
    render(&all)
}

fn render(ranges: &[TimeRange]) -> String {
    if ranges.is_empty() {
        return NO_ACTIVE_PERIODS.to_string();
    }
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse the output of [`decode`]. The empty sentinel yields no ranges.
pub fn parse_ranges(text: &str) -> Result<Vec<TimeRange>> {
    let text = text.trim();
    if text.is_empty() || text == NO_ACTIVE_PERIODS {
        return Ok(Vec::new());
    }
    text.split(',').map(str::parse).collect()
}

/// Inverse of [`ranges`]. Every range must be half-hour aligned and lie
/// inside `half`.
pub fn encode(ranges: &[TimeRange], half: DayHalf) -> Result<u32> {
    let offset = half.offset();
    let mut mask = 0u32;
    for r in ranges {
        if r.start >= r.end {
            return Err(Error::InvalidSchedule(format!("empty or inverted range {r}")));
        }
        if r.start % SLOT_MINUTES != 0 || r.end % SLOT_MINUTES != 0 {
            return Err(Error::InvalidSchedule(format!("{r} is not on half-hour boundaries")));
        }
        if r.start < offset || r.end > offset + HALF_MINUTES {
            return Err(Error::InvalidSchedule(format!("{r} is outside the {half:?} half")));
        }
        let first = (r.start - offset) / SLOT_MINUTES;
        let last = (r.end - offset) / SLOT_MINUTES;
        for slot in first..last {
            mask |= 1 << slot;
        }
    }
    Ok(mask)
}
