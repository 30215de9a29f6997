use crate::{
    defaults::{SPIKE_CYCLE, SPIKE_MULTIPLIER, SPIKE_NORMAL_PHASE},
    time,
};
use logos::{Lexer, Logos};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

/// Shape of the traffic over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// nominal traffic for the whole run
    #[default]
    Constant,
    /// traffic grows linearly from nothing to nominal over the profile's
    /// duration, then stays nominal
    Ramp,
    /// nominal traffic for the first [`SPIKE_NORMAL_PHASE`] of every
    /// [`SPIKE_CYCLE`], [`SPIKE_MULTIPLIER`] times nominal for the rest
    Spike,
}

/// The load profile a simulation runs under.
///
/// The nominal traffic is the `generated_rps` of each entry component:
/// the profile only scales it over time (see [`LoadProfile::multiplier`]).
/// `rps` is carried along for the caller's bookkeeping.
///
/// Profiles can be parsed from a short human readable form:
///
/// ```
/// use std::time::Duration;
/// use trafficsim_core::profile::{LoadProfile, ProfileKind};
///
/// let profile: LoadProfile = "ramp 30s".parse()?;
/// assert_eq!(profile.kind, ProfileKind::Ramp);
/// assert_eq!(profile.duration, Duration::from_secs(30));
/// assert_eq!(profile.multiplier(Duration::from_secs(15)), 0.5);
///
/// let profile: LoadProfile = "spike".parse()?;
/// assert_eq!(profile.to_string(), "spike");
/// # Ok::<(), trafficsim_core::profile::ProfileParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProfile {
    #[serde(rename = "type")]
    pub kind: ProfileKind,
    #[serde(default)]
    pub rps: f64,
    #[serde(rename = "durationSec", default, with = "seconds")]
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum ProfileParseError {
    #[error("Empty load profile")]
    Empty,
    #[error("Unknown load profile `{0}', expecting `constant', `ramp' or `spike'")]
    UnknownKind(String),
    #[error("Invalid duration in load profile `{profile}'")]
    InvalidDuration {
        profile: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Token {
    #[token("constant", ignore(ascii_case))]
    Constant,
    #[token("ramp", ignore(ascii_case))]
    Ramp,
    #[token("spike", ignore(ascii_case))]
    Spike,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Ramp => "ramp",
            Self::Spike => "spike",
        }
    }
}

impl LoadProfile {
    pub fn constant() -> Self {
        Self::default()
    }

    pub fn ramp(duration: Duration) -> Self {
        Self {
            kind: ProfileKind::Ramp,
            duration,
            ..Self::default()
        }
    }

    pub fn spike() -> Self {
        Self {
            kind: ProfileKind::Spike,
            ..Self::default()
        }
    }

    pub fn with_rps(mut self, rps: f64) -> Self {
        self.rps = rps;
        self
    }

    /// Factor applied to the nominal traffic `elapsed` into the run.
    ///
    /// A ramp without duration is at nominal traffic straight away.
    pub fn multiplier(&self, elapsed: Duration) -> f64 {
        match self.kind {
            ProfileKind::Constant => 1.0,
            ProfileKind::Ramp if self.duration.is_zero() => 1.0,
            ProfileKind::Ramp => elapsed.div_duration_f64(self.duration).min(1.0),
            ProfileKind::Spike => {
                let position = elapsed.as_nanos() % SPIKE_CYCLE.as_nanos();
                if position < SPIKE_NORMAL_PHASE.as_nanos() {
                    1.0
                } else {
                    SPIKE_MULTIPLIER
                }
            }
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Display for LoadProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.duration.is_zero() {
            write!(f, " {}", time::Duration::new(self.duration))?;
        }
        Ok(())
    }
}

impl FromStr for LoadProfile {
    type Err = ProfileParseError;

    /// `<kind> [duration]`, e.g. `"constant"`, `"ramp 30s"`, `"spike 1m30s"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, Token>::new(s);

        let kind = match lex.next() {
            None => return Err(ProfileParseError::Empty),
            Some(Ok(Token::Constant)) => ProfileKind::Constant,
            Some(Ok(Token::Ramp)) => ProfileKind::Ramp,
            Some(Ok(Token::Spike)) => ProfileKind::Spike,
            Some(Err(())) => return Err(ProfileParseError::UnknownKind(s.trim().to_owned())),
        };

        // `constantly` is not `constant` followed by a duration
        let remainder = lex.remainder();
        if !remainder.is_empty() && !remainder.starts_with(char::is_whitespace) {
            return Err(ProfileParseError::UnknownKind(s.trim().to_owned()));
        }

        let remainder = remainder.trim();
        let duration = if remainder.is_empty() {
            Duration::ZERO
        } else {
            remainder
                .parse::<time::Duration>()
                .map_err(|source| ProfileParseError::InvalidDuration {
                    profile: s.to_owned(),
                    source,
                })?
                .into_duration()
        };

        Ok(Self {
            kind,
            rps: 0.0,
            duration,
        })
    }
}

/// `Duration` on the wire as a floating number of seconds.
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(secs: f64) -> Duration {
        Duration::from_secs_f64(secs)
    }

    #[test]
    fn constant_is_flat() {
        let profile = LoadProfile::constant();
        for elapsed in [0.0, 0.1, 7.5, 3_600.0] {
            assert_eq!(profile.multiplier(secs(elapsed)), 1.0);
        }
    }

    #[test]
    fn ramp_grows_then_caps() {
        let profile = LoadProfile::ramp(Duration::from_secs(10));
        assert_eq!(profile.multiplier(Duration::ZERO), 0.0);
        assert_eq!(profile.multiplier(Duration::from_secs(5)), 0.5);
        assert_eq!(profile.multiplier(Duration::from_secs(10)), 1.0);
        assert_eq!(profile.multiplier(Duration::from_secs(60)), 1.0);
    }

    #[test]
    fn ramp_without_duration() {
        let profile = LoadProfile::ramp(Duration::ZERO);
        assert_eq!(profile.multiplier(Duration::from_secs(1)), 1.0);
    }

    #[test]
    fn spike_cycles() {
        let profile = LoadProfile::spike();
        assert_eq!(profile.multiplier(Duration::from_millis(100)), 1.0);
        assert_eq!(profile.multiplier(Duration::from_millis(6_900)), 1.0);
        assert_eq!(profile.multiplier(Duration::from_secs(7)), SPIKE_MULTIPLIER);
        assert_eq!(profile.multiplier(Duration::from_millis(9_900)), SPIKE_MULTIPLIER);
        assert_eq!(profile.multiplier(Duration::from_secs(10)), 1.0);
        assert_eq!(profile.multiplier(Duration::from_secs(18)), SPIKE_MULTIPLIER);
    }

    #[test]
    fn parse() {
        assert_eq!("constant".parse::<LoadProfile>().unwrap(), LoadProfile::constant());
        assert_eq!(
            "  RAMP 1m30s ".parse::<LoadProfile>().unwrap(),
            LoadProfile::ramp(Duration::from_secs(90))
        );
        assert_eq!("spike".parse::<LoadProfile>().unwrap().kind, ProfileKind::Spike);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!("".parse::<LoadProfile>(), Err(ProfileParseError::Empty)));
        assert!(matches!(
            "burst".parse::<LoadProfile>(),
            Err(ProfileParseError::UnknownKind(_))
        ));
        assert!(matches!(
            "constantly".parse::<LoadProfile>(),
            Err(ProfileParseError::UnknownKind(kind)) if kind == "constantly"
        ));
        assert!(matches!(
            "ramp30s".parse::<LoadProfile>(),
            Err(ProfileParseError::UnknownKind(_))
        ));
        assert!(matches!(
            "ramp fast".parse::<LoadProfile>(),
            Err(ProfileParseError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn display() {
        assert_eq!(LoadProfile::constant().to_string(), "constant");
        assert_eq!(LoadProfile::ramp(Duration::from_secs(30)).to_string(), "ramp 30s");
        assert_eq!(
            LoadProfile::ramp(Duration::from_millis(1_500)).to_string(),
            "ramp 1.5s"
        );
    }

    #[test]
    fn wire_format() {
        let profile: LoadProfile =
            serde_json::from_str(r#"{"type":"ramp","rps":100,"durationSec":30}"#).unwrap();
        assert_eq!(profile.kind, ProfileKind::Ramp);
        assert_eq!(profile.rps, 100.0);
        assert_eq!(profile.duration, Duration::from_secs(30));

        let json = serde_json::to_string(&LoadProfile::spike()).unwrap();
        assert_eq!(json, r#"{"type":"spike","rps":0.0,"durationSec":0.0}"#);

        assert!(
            serde_json::from_str::<LoadProfile>(r#"{"type":"ramp","durationSec":-1}"#).is_err()
        );
    }
}
