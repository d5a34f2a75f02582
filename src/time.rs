extern crate ffmpeg_next as ffmpeg;

use ffmpeg::util::mathematics::rescale::Rescale;
use ffmpeg::Rational as AvRational;

/// The time base every [`crate::Packet`] and [`crate::recorder::Recorder`]
/// duration is expressed in before it is rescaled into a muxer's native time
/// base: microseconds.
pub fn pipeline_time_base() -> AvRational {
    AvRational::new(1, 1_000_000)
}

/// A timestamp or duration in the pipeline time base (microseconds), or the
/// absence of one.
///
/// [`Time::unset()`] represents both "no PTS" (e.g. a config packet) and "no
/// duration yet" (a packet awaiting its successor during duration
/// inference). Every value in this crate is already expressed in the
/// pipeline time base ([`pipeline_time_base`], 1/1,000,000s) until the
/// moment it is written to a muxer, so this type carries no `time_base`
/// field of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time(Option<i64>);

impl Time {
    /// The wire sentinel for "unset": all bits set in the 64-bit header
    /// field.
    pub const WIRE_UNSET: u64 = u64::MAX;

    /// A timestamp with a concrete value, in microseconds.
    pub fn micros(value: i64) -> Self {
        Self(Some(value))
    }

    /// The unset sentinel.
    pub fn unset() -> Self {
        Self(None)
    }

    /// Decode a wire timestamp: `Time::WIRE_UNSET` maps to [`Time::unset()`].
    pub fn from_wire(value: u64) -> Self {
        if value == Self::WIRE_UNSET {
            Self::unset()
        } else {
            Self::micros(value as i64)
        }
    }

    /// Whether this timestamp carries a value.
    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }

    /// The raw microsecond value, if set.
    pub fn value(&self) -> Option<i64> {
        self.0
    }

    /// Rescale this timestamp from the pipeline time base into `time_base`,
    /// returning `None` if the timestamp is unset.
    pub fn rescale(&self, time_base: AvRational) -> Option<i64> {
        self.0
            .map(|time| time.rescale(pipeline_time_base(), time_base))
    }

    /// Build a [`Time`] from a raw value expressed in `from_base`, rescaling
    /// it into the pipeline time base (microseconds). Used to bring a
    /// decoder's native-time-base frame PTS back into pipeline time.
    pub fn from_rescaled(value: Option<i64>, from_base: AvRational) -> Self {
        Self(value.map(|time| time.rescale(from_base, pipeline_time_base())))
    }
}

impl std::ops::Sub for Time {
    type Output = Option<i64>;

    /// The delta `self - rhs` in microseconds, or `None` if either side is
    /// unset. Used by the recorder's duration-inference algorithm.
    fn sub(self, rhs: Time) -> Option<i64> {
        match (self.0, rhs.0) {
            (Some(lhs), Some(rhs)) => Some(lhs - rhs),
            _ => None,
        }
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.0 {
            Some(time) => write!(f, "{time}us"),
            None => write!(f, "unset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_sentinel_decodes_to_unset() {
        assert!(!Time::from_wire(Time::WIRE_UNSET).has_value());
        assert_eq!(Time::from_wire(1_000).value(), Some(1_000));
    }

    #[test]
    fn delta_requires_both_sides_set() {
        assert_eq!(Time::micros(4_000) - Time::micros(1_000), Some(3_000));
        assert_eq!(Time::unset() - Time::micros(1_000), None);
        assert_eq!(Time::micros(1_000) - Time::unset(), None);
    }
}
