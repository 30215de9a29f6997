use anyhow::{Result, bail, ensure};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr, time};

/// Human readable wrapper around [`std::time::Duration`].
///
/// Parses sequences like `"1m30s"` or `"1s 500ms"` (the parts are
/// summed) and prints with the standard `Debug` formatting of
/// [`std::time::Duration`] (`"1.5s"`, `"150ms"`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub(crate) struct Duration(time::Duration);

/// One `<number><unit>` part of a duration.
#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum Part {
    #[regex(r"[0-9]+(\.[0-9]+)?ms", |lex| part(lex, "ms", 1e6))]
    #[regex(r"[0-9]+(\.[0-9]+)?s", |lex| part(lex, "s", 1e9))]
    #[regex(r"[0-9]+(\.[0-9]+)?m", |lex| part(lex, "m", 60e9))]
    #[regex(r"[0-9]+(\.[0-9]+)?h", |lex| part(lex, "h", 3_600e9))]
    Elapsed(time::Duration),
}

fn part(lex: &Lexer<'_, Part>, unit: &str, nanos_per_unit: f64) -> Option<time::Duration> {
    let value: f64 = lex.slice().strip_suffix(unit)?.parse().ok()?;
    let nanos = (value * nanos_per_unit).round();
    if nanos >= u64::MAX as f64 {
        return None;
    }
    Some(time::Duration::from_nanos(nanos as u64))
}

impl Duration {
    pub(crate) fn new(dur: time::Duration) -> Self {
        Self(dur)
    }

    #[inline]
    pub(crate) fn into_duration(self) -> time::Duration {
        self.0
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <time::Duration as fmt::Debug>::fmt(&self.0, f)
    }
}

impl FromStr for Duration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut total = time::Duration::ZERO;
        let mut parts = 0;

        for part in Part::lexer(s) {
            let Ok(Part::Elapsed(elapsed)) = part else {
                bail!("Invalid duration `{s}', expecting something like `1m30s' or `500ms'")
            };
            total = total.saturating_add(elapsed);
            parts += 1;
        }

        ensure!(parts > 0, "Empty duration");

        Ok(Self(total))
    }
}
