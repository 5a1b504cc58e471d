//! Package version ordering.
//!
//! Versions have the shape `[epoch:]pkgver[-pkgrel]` and are ordered the way
//! pacman orders them: epoch first, then pkgver, then pkgrel. Each part is
//! compared segment by segment with the rpmvercmp rules implemented in
//! [`segment_cmp`]. A version without pkgrel sorts before the same pkgver
//! with one, which keeps the order total.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A parsed package version.
///
/// Equality follows the ordering, so `1.01` and `1.1` are equal versions even
/// though their strings differ. Use [`Version::as_str`] when the exact text
/// matters.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    epoch: String,
    pkgver: String,
    pkgrel: Option<String>,
}

impl Version {
    pub fn parse(s: &str) -> Self {
        // Leading digits followed by ':' form the epoch; ":1.0" has an empty one
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        let (epoch, rest) = match s[digits..].strip_prefix(':') {
            Some(rest) if digits > 0 => (&s[..digits], rest),
            Some(rest) => ("0", rest),
            None => ("0", s),
        };

        let (pkgver, pkgrel) = match rest.rsplit_once('-') {
            Some((pkgver, pkgrel)) => (pkgver, Some(pkgrel.to_string())),
            None => (rest, None),
        };

        Self {
            raw: s.to_string(),
            epoch: epoch.to_string(),
            pkgver: pkgver.to_string(),
            pkgrel,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn pkgver(&self) -> &str {
        &self.pkgver
    }

    pub fn pkgrel(&self) -> Option<&str> {
        self.pkgrel.as_deref()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.raw == other.raw {
            return Ordering::Equal;
        }
        segment_cmp(&self.epoch, &other.epoch)
            .then_with(|| segment_cmp(&self.pkgver, &other.pkgver))
            .then_with(|| match (&self.pkgrel, &other.pkgrel) {
                (Some(a), Some(b)) => segment_cmp(a, b),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Compare two full version strings.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// Compare one version part (epoch, pkgver or pkgrel).
///
/// Alphanumeric runs are compared pairwise: numbers by value, letters
/// lexicographically, and a number always beats letters. Separator runs of
/// different length decide on their own. When one side runs out, a leftover
/// alphabetic run is older (`1.0a < 1.0`) and anything else is newer
/// (`1.0.1 > 1.0`).
pub fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let (sep_i, sep_j) = (i, j);
        while i < a.len() && !a[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < b.len() && !b[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= a.len() || j >= b.len() {
            break;
        }
        if i - sep_i != j - sep_j {
            return (i - sep_i).cmp(&(j - sep_j));
        }

        let (start_i, start_j) = (i, j);
        let numeric = a[i].is_ascii_digit();
        let in_run = |c: u8| {
            if numeric {
                c.is_ascii_digit()
            } else {
                c.is_ascii_alphabetic()
            }
        };
        while i < a.len() && in_run(a[i]) {
            i += 1;
        }
        while j < b.len() && in_run(b[j]) {
            j += 1;
        }

        let (mut run_a, mut run_b) = (&a[start_i..i], &b[start_j..j]);
        if run_b.is_empty() {
            // Segments of different kinds: numbers are newer than letters
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        if numeric {
            run_a = trim_zeros(run_a);
            run_b = trim_zeros(run_b);
            match run_a.len().cmp(&run_b.len()) {
                Ordering::Equal => {}
                longer => return longer,
            }
        }
        match run_a.cmp(run_b) {
            Ordering::Equal => {}
            decided => return decided,
        }
    }

    let (rest_a, rest_b) = (&a[i..], &b[j..]);
    match (rest_a.first(), rest_b.first()) {
        (None, None) => Ordering::Equal,
        (None, Some(c)) if !c.is_ascii_alphabetic() => Ordering::Less,
        (Some(c), _) if c.is_ascii_alphabetic() => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn trim_zeros(run: &[u8]) -> &[u8] {
    let zeros = run.iter().take_while(|&&c| c == b'0').count();
    &run[zeros..]
}
