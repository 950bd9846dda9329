use std::fmt;
use std::time::Duration;

/// Coarse lifecycle stage of a playback pipeline.
///
/// Variants are ordered, so `state >= TransportState::Paused` reads the same
/// way the engine thinks about it: media is prerolled and has a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl TransportState {
    pub fn can_play(&self) -> bool {
        !matches!(self, TransportState::Playing)
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn can_stop(&self) -> bool {
        matches!(self, TransportState::Paused | TransportState::Playing)
    }

    pub fn can_seek(&self) -> bool {
        matches!(self, TransportState::Paused | TransportState::Playing)
    }

    /// The neighbouring state one step closer to `target`, or `None` when
    /// already there. Pipelines never skip states.
    pub fn step_towards(self, target: TransportState) -> Option<TransportState> {
        use TransportState::*;
        if self == target {
            return None;
        }
        let next = if target > self {
            match self {
                Null => Ready,
                Ready => Paused,
                Paused | Playing => Playing,
            }
        } else {
            match self {
                Playing => Paused,
                Paused => Ready,
                Ready | Null => Null,
            }
        };
        Some(next)
    }

    pub fn display_text(&self) -> &'static str {
        match self {
            TransportState::Null => "NULL",
            TransportState::Ready => "READY",
            TransportState::Paused => "PAUSED",
            TransportState::Playing => "PLAYING",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// How a state change request was taken by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeReturn {
    /// Completed before `set_state` returned.
    Success,
    /// Will complete on the engine thread; a state-changed message follows.
    Async,
}

/// Media time in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockTime(u64);

impl ClockTime {
    pub const ZERO: ClockTime = ClockTime(0);
    pub const SECOND: ClockTime = ClockTime(1_000_000_000);

    pub const fn from_nseconds(ns: u64) -> Self {
        ClockTime(ns)
    }

    /// Negative, NaN and infinite inputs clamp to zero.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        if !seconds.is_finite() || seconds <= 0.0 {
            return ClockTime::ZERO;
        }
        ClockTime((seconds * Self::SECOND.0 as f64).round() as u64)
    }

    pub const fn nseconds(self) -> u64 {
        self.0
    }

    pub fn seconds_f64(self) -> f64 {
        self.0 as f64 / Self::SECOND.0 as f64
    }

    pub fn saturating_add(self, other: Duration) -> Self {
        ClockTime(self.0.saturating_add(other.as_nanos().min(u64::MAX as u128) as u64))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = self.0 / 1_000_000;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms / 60_000) % 60;
        let seconds = (total_ms / 1000) % 60;
        let millis = total_ms % 1000;
        write!(f, "{}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }
}

/// Seek behaviour requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekFlags {
    /// Drop everything queued in the pipeline before seeking.
    pub flush: bool,
    /// Snap to the nearest key unit instead of decoding up to the exact target.
    pub key_unit: bool,
}

impl SeekFlags {
    pub const FLUSH: SeekFlags = SeekFlags { flush: true, key_unit: false };
    pub const KEY_UNIT: SeekFlags = SeekFlags { flush: false, key_unit: true };
}

impl std::ops::BitOr for SeekFlags {
    type Output = SeekFlags;

    fn bitor(self, rhs: SeekFlags) -> SeekFlags {
        SeekFlags {
            flush: self.flush || rhs.flush,
            key_unit: self.key_unit || rhs.key_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering() {
        assert!(TransportState::Null < TransportState::Ready);
        assert!(TransportState::Ready < TransportState::Paused);
        assert!(TransportState::Paused < TransportState::Playing);
        assert!(TransportState::Playing >= TransportState::Paused);
    }

    #[test]
    fn test_state_enablement() {
        assert!(TransportState::Ready.can_play());
        assert!(!TransportState::Playing.can_play());
        assert!(TransportState::Playing.can_pause());
        assert!(!TransportState::Paused.can_pause());
        assert!(!TransportState::Ready.can_seek());
        assert!(!TransportState::Null.can_seek());
        assert!(TransportState::Paused.can_seek());
        assert!(TransportState::Playing.can_stop());
    }

    #[test]
    fn test_step_towards_walks_one_state_at_a_time() {
        use TransportState::*;
        assert_eq!(Null.step_towards(Playing), Some(Ready));
        assert_eq!(Ready.step_towards(Playing), Some(Paused));
        assert_eq!(Paused.step_towards(Playing), Some(Playing));
        assert_eq!(Playing.step_towards(Ready), Some(Paused));
        assert_eq!(Paused.step_towards(Null), Some(Ready));
        assert_eq!(Ready.step_towards(Ready), None);
    }

    #[test]
    fn test_clock_time_conversions() {
        assert_eq!(ClockTime::from_seconds_f64(45.0).nseconds(), 45_000_000_000);
        assert_eq!(ClockTime::from_nseconds(120_000_000_000).seconds_f64(), 120.0);
        assert_eq!(ClockTime::from_seconds_f64(-3.0), ClockTime::ZERO);
        assert_eq!(ClockTime::from_seconds_f64(f64::NAN), ClockTime::ZERO);
        assert_eq!(ClockTime::from_seconds_f64(0.5).nseconds(), 500_000_000);
    }

    #[test]
    fn test_clock_time_display() {
        let t = ClockTime::from_seconds_f64(3725.25);
        assert_eq!(t.to_string(), "1:02:05.250");
    }

    #[test]
    fn test_seek_flags_combine() {
        let flags = SeekFlags::FLUSH | SeekFlags::KEY_UNIT;
        assert!(flags.flush);
        assert!(flags.key_unit);
        assert_eq!(SeekFlags::default() | SeekFlags::FLUSH, SeekFlags::FLUSH);
    }
}
