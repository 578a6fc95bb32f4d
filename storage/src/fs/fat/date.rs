//! DOS timestamps as stored in directory entries.
//!
//! Dates pack `year - 1980` in bits 9..16, the month in bits 5..9 and the day in
//! bits 0..5. Times pack the hour in bits 11..16, the minutes in bits 5..11 and
//! the seconds divided by two in bits 0..5.

/// Calendar date of a directory entry.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Date {
    /// Year number, in [1980, 2107].
    year: u16,
    /// Month of the year, in [1, 12] on well-formed volumes.
    month: u8,
    /// Day of the month, in [1, 31] on well-formed volumes.
    day: u8,
}

impl Date {
    const MIN_YEAR: u16 = 1980;

    /// 1980-01-01, the earliest representable date.
    pub const DOS_EPOCH: Self = Self {
        year: Self::MIN_YEAR,
        month: 1,
        day: 1,
    };

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(raw: u16) -> Self {
        Self {
            year: (raw >> 9) + Self::MIN_YEAR,
            month: ((raw >> 5) & 0xF) as u8,
            day: (raw & 0x1F) as u8,
        }
    }

    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn encode(self) -> u16 {
        ((self.year - Self::MIN_YEAR) << 9) | ((self.month as u16) << 5) | self.day as u16
    }

    #[must_use]
    #[inline]
    pub const fn year(&self) -> u16 {
        self.year
    }

    #[must_use]
    #[inline]
    pub const fn month(&self) -> u8 {
        self.month
    }

    #[must_use]
    #[inline]
    pub const fn day(&self) -> u8 {
        self.day
    }
}

/// A DOS time, with a two-second resolution.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Time {
    hour: u8,
    min: u8,
    sec: u8,
}

impl Time {
    pub const MIDNIGHT: Self = Self {
        hour: 0,
        min: 0,
        sec: 0,
    };

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(raw: u16) -> Self {
        Self {
            hour: (raw >> 11) as u8,
            min: ((raw >> 5) & 0x3F) as u8,
            sec: ((raw & 0x1F) * 2) as u8,
        }
    }

    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn encode(self) -> u16 {
        ((self.hour as u16) << 11) | ((self.min as u16) << 5) | (self.sec as u16 / 2)
    }

    #[must_use]
    #[inline]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    #[inline]
    pub const fn min(&self) -> u8 {
        self.min
    }

    #[must_use]
    #[inline]
    pub const fn sec(&self) -> u8 {
        self.sec
    }
}

/// Combined date and time fields of a directory entry.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DateTime {
    date: Date,
    time: Time,
}

impl DateTime {
    /// Timestamp given to entries created by the driver.
    pub const DOS_EPOCH: Self = Self::new(Date::DOS_EPOCH, Time::MIDNIGHT);

    #[must_use]
    #[inline]
    pub const fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    #[must_use]
    #[inline]
    pub const fn decode(raw_date: u16, raw_time: u16) -> Self {
        Self::new(Date::decode(raw_date), Time::decode(raw_time))
    }

    #[must_use]
    #[inline]
    pub const fn date(&self) -> Date {
        self.date
    }

    #[must_use]
    #[inline]
    pub const fn time(&self) -> Time {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_decode() {
        let date = Date::decode(38647);
        assert_eq!((date.year(), date.month(), date.day()), (2055, 7, 23));
        assert_eq!(date.encode(), 38647);
        assert_eq!(Date::DOS_EPOCH.encode(), 33);
    }

    #[test]
    fn time_decode() {
        // 15:03:28
        let time = Time::decode(30830);
        assert_eq!((time.hour(), time.min(), time.sec()), (15, 3, 28));
        assert_eq!(time.encode(), 30830);
        assert_eq!(Time::MIDNIGHT.encode(), 0);
    }

    #[test]
    fn datetime_decode() {
        let datetime = DateTime::decode(33, 0);
        assert_eq!(datetime, DateTime::DOS_EPOCH);
        assert_eq!(datetime.date().year(), 1980);
        assert_eq!(datetime.time().hour(), 0);
    }
}
