//! Commit specs: `HEAD`, branch or tag names, hashes, and `~n` / `^n` walks.

use std::fmt;
use std::str::FromStr;

use ply_types::Hash;

use crate::error::{DbError, DbResult};

/// Where a commit spec starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpecBase {
    /// The head of the checked-out branch.
    Head,
    /// A branch or tag name. Branches are tried first.
    Name(String),
    /// A commit hash.
    Hash(Hash),
}

/// One walk step applied after the base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AncestorStep {
    /// `~n`: follow the first parent `n` times.
    FirstParent(u32),
    /// `^n`: take the `n`-th parent (1-based).
    Parent(u32),
}

/// A parsed revision expression such as `main~2^2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitSpec {
    pub base: SpecBase,
    pub steps: Vec<AncestorStep>,
}

impl CommitSpec {
    pub fn head() -> Self {
        Self {
            base: SpecBase::Head,
            steps: Vec::new(),
        }
    }

    pub fn parse(spec: &str) -> DbResult<Self> {
        let invalid = |reason: &str| DbError::InvalidCommitSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let spec_trimmed = spec.trim();
        let split = spec_trimmed
            .find(['~', '^'])
            .unwrap_or(spec_trimmed.len());
        let (base, mut rest) = spec_trimmed.split_at(split);
        if base.is_empty() {
            return Err(invalid("missing base revision"));
        }
        let base = if base.eq_ignore_ascii_case("HEAD") {
            SpecBase::Head
        } else if Hash::is_hex_hash(base) {
            SpecBase::Hash(Hash::from_hex(base).map_err(|e| invalid(&e.to_string()))?)
        } else {
            SpecBase::Name(base.to_string())
        };

        let mut steps = Vec::new();
        while let Some(op) = rest.chars().next() {
            rest = &rest[op.len_utf8()..];
            let digits_end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            let (digits, tail) = rest.split_at(digits_end);
            rest = tail;
            let n = if digits.is_empty() {
                1
            } else {
                digits
                    .parse::<u32>()
                    .map_err(|_| invalid("step count out of range"))?
            };
            match op {
                '~' => steps.push(AncestorStep::FirstParent(n)),
                '^' if n == 0 => return Err(invalid("parent numbers start at 1")),
                '^' => steps.push(AncestorStep::Parent(n)),
                _ => return Err(invalid(&format!("unexpected character {op:?}"))),
            }
        }
        Ok(Self { base, steps })
    }
}

impl FromStr for CommitSpec {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            SpecBase::Head => f.write_str("HEAD")?,
            SpecBase::Name(name) => f.write_str(name)?,
            SpecBase::Hash(h) => write!(f, "{}", h.to_hex())?,
        }
        for step in &self.steps {
            match step {
                AncestorStep::FirstParent(n) => write!(f, "~{n}")?,
                AncestorStep::Parent(n) => write!(f, "^{n}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bases() {
        assert_eq!(CommitSpec::parse("HEAD").unwrap(), CommitSpec::head());
        assert_eq!(
            CommitSpec::parse("feature/x").unwrap().base,
            SpecBase::Name("feature/x".into())
        );
        let h = Hash::of(b"c");
        assert_eq!(CommitSpec::parse(&h.to_hex()).unwrap().base, SpecBase::Hash(h));
    }

    #[test]
    fn walk_steps() {
        let spec = CommitSpec::parse("main~3^2~^").unwrap();
        assert_eq!(
            spec.steps,
            vec![
                AncestorStep::FirstParent(3),
                AncestorStep::Parent(2),
                AncestorStep::FirstParent(1),
                AncestorStep::Parent(1),
            ]
        );
        assert_eq!(spec.to_string(), "main~3^2~1^1");
    }

    #[test]
    fn rejects_bad_specs() {
        assert!(CommitSpec::parse("").is_err());
        assert!(CommitSpec::parse("~1").is_err());
        assert!(CommitSpec::parse("main^0").is_err());
        assert!(CommitSpec::parse("main~99999999999").is_err());
    }

    #[test]
    fn tilde_zero_is_identity() {
        let spec: CommitSpec = "HEAD~0".parse().unwrap();
        assert_eq!(spec.steps, vec![AncestorStep::FirstParent(0)]);
    }
}
