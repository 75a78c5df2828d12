use std::fmt;

/// An operator-facing entry name split into its base and collision counter.
///
/// `"report"` parses as `{ base: "report", counter: None }` and
/// `"report (2)"` as `{ base: "report", counter: Some(2) }`. Only the exact
/// suffix ` (n)` counts: a space, `(`, a decimal integer >= 1 without leading
/// zeros, and `)`. `"report(2)"` is a plain name.
///
/// The counter is formatted back only at the boundary via [`fmt::Display`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogicalName {
    base: String,
    counter: Option<u32>,
}

impl LogicalName {
    /// Parse a name, recognising a trailing ` (n)` counter.
    pub fn parse(name: &str) -> Self {
        match split_counter(name) {
            Some((base, counter)) => Self {
                base: base.to_string(),
                counter: Some(counter),
            },
            None => Self {
                base: name.to_string(),
                counter: None,
            },
        }
    }

    /// Build a name from parts.
    pub fn new(base: impl Into<String>, counter: Option<u32>) -> Self {
        Self {
            base: base.into(),
            counter,
        }
    }

    /// The part before the counter.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The collision counter, if any.
    pub fn counter(&self) -> Option<u32> {
        self.counter
    }

    /// The next candidate in the collision sequence.
    ///
    /// A plain name gains ` (1)`; a counted name increments its counter.
    /// Returns `None` only when the counter would overflow.
    pub fn successor(&self) -> Option<Self> {
        let next = match self.counter {
            None => 1,
            Some(n) => n.checked_add(1)?,
        };
        Some(Self {
            base: self.base.clone(),
            counter: Some(next),
        })
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.counter {
            Some(n) => write!(f, "{} ({n})", self.base),
            None => f.write_str(&self.base),
        }
    }
}

fn split_counter(name: &str) -> Option<(&str, u32)> {
    let inner = name.strip_suffix(')')?;
    let open = inner.rfind(" (")?;
    let (base, digits) = (&inner[..open], &inner[open + 2..]);
    if base.is_empty() || digits.is_empty() || digits.starts_with('0') {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let counter = digits.parse::<u32>().ok()?;
    Some((base, counter))
}
