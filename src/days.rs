use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// All seven weekdays in Monday-first order.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Encodes a set of weekdays as a bitmask, Monday = bit 0 ... Sunday = bit 6.
pub fn encode<I>(days: I) -> u8
where
    I: IntoIterator<Item = Weekday>,
{
    days.into_iter()
        .fold(0u8, |mask, d| mask | (1 << d.num_days_from_monday()))
}

/// Decodes a bitmask into weekdays, Monday first. Bits above bit 6 are ignored.
pub fn decode(mask: u8) -> Vec<Weekday> {
    WEEK.iter()
        .copied()
        .filter(|d| mask & (1 << d.num_days_from_monday()) != 0)
        .collect()
}

/// A set of weekdays stored as the compact mask.
///
/// Serialized as the plain integer so the persisted form stays the mask.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct DaySet(u8);

impl DaySet {
    pub const EMPTY: DaySet = DaySet(0);

    pub fn from_mask(mask: u8) -> Self {
        DaySet(mask & 0x7f)
    }

    pub fn mask(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn is_empty(self) -> bool {
        self.0 & 0x7f == 0
    }

    /// Weekdays in the set, Monday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        decode(self.0).into_iter()
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<T: IntoIterator<Item = Weekday>>(iter: T) -> Self {
        DaySet(encode(iter))
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let names: Vec<String> = self.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

/// Parses `mon,wed,fri` (short or long names, any case).
impl FromStr for DaySet {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = DaySet::EMPTY;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = part
                .parse::<Weekday>()
                .map_err(|_| PlannerError::Parse(format!("Unknown weekday '{}'", part)))?;
            set.insert(day);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_sets_monday_first_bits() {
        assert_eq!(encode([Weekday::Mon]), 0b000_0001);
        assert_eq!(encode([Weekday::Sun]), 0b100_0000);
        assert_eq!(encode([Weekday::Mon, Weekday::Wed, Weekday::Fri]), 0b001_0101);
        assert_eq!(encode(Vec::new()), 0);
    }

    #[test]
    fn test_decode_ignores_high_bits() {
        assert_eq!(decode(0b1000_0001), vec![Weekday::Mon]);
        assert_eq!(decode(0xff), WEEK.to_vec());
    }

    #[test]
    fn test_decode_is_monday_first() {
        let mask = encode([Weekday::Sun, Weekday::Tue]);
        assert_eq!(decode(mask), vec![Weekday::Tue, Weekday::Sun]);
    }

    #[test]
    fn test_parse_day_list() {
        let set: DaySet = "mon, Wed,friday".parse().unwrap();
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Wed));
        assert!(set.contains(Weekday::Fri));
        assert!(!set.contains(Weekday::Tue));
        assert_eq!(set.to_string(), "Mon,Wed,Fri");

        assert!("mon,funday".parse::<DaySet>().is_err());
        assert!("".parse::<DaySet>().unwrap().is_empty());
    }
}
