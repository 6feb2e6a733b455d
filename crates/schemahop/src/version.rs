//! Schema version parsing and range matching.
//!
//! Versions follow `MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]`; missing
//! components are zero, so `2.0` and `2.0.0` are the same version. Ordering is
//! semantic-versioning precedence (build metadata is ignored).
//!
//! A constraint is either `*` or a comma-separated list of clauses that must
//! all hold:
//!
//! | Clause | Meaning |
//! |---|---|
//! | `==1.4.1`, `=1.4.1`, `1.4.1` | exactly this version |
//! | `!=1.4.1` | any other version |
//! | `>=2.0`, `>2.0`, `<=2.0`, `<3.0` | ordering |
//! | `==1.4.*`, `!=1.*` | same leading components (prefix wildcard) |

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::error::{MigrateError, Result};

/// Parse a schema version, padding missing minor/patch components with zero.
pub fn parse_version(input: &str) -> Result<Version> {
    let invalid = |reason: &str| MigrateError::InvalidVersion {
        version: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("version is empty"));
    }

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);

    let components: Vec<&str> = core.split('.').collect();
    if components.len() > 3 {
        return Err(invalid("expected at most three numeric components"));
    }
    if components
        .iter()
        .any(|c| c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid("components must be non-negative integers"));
    }

    let mut padded = components.join(".");
    for _ in components.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| invalid(&e.to_string()))
}

/// Compare two versions by precedence, ignoring build metadata.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Ge => ">=",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Lt => "<",
        }
    }

    /// Split a clause into its operator and operand. Two-character operators
    /// are tried first so `>=` is not read as `>` followed by `=1.0`.
    fn split(clause: &str) -> (Op, &str) {
        const OPS: [(&str, Op); 7] = [
            ("==", Op::Eq),
            ("!=", Op::Ne),
            (">=", Op::Ge),
            ("<=", Op::Le),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ];
        for (symbol, op) in OPS {
            if let Some(rest) = clause.strip_prefix(symbol) {
                return (op, rest.trim());
            }
        }
        (Op::Eq, clause)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Compare { op: Op, version: Version },
    Prefix { negated: bool, components: Vec<u64> },
}

impl Clause {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Clause::Compare { op, version: bound } => {
                let ord = precedence(version, bound);
                match op {
                    Op::Eq => ord == Ordering::Equal,
                    Op::Ne => ord != Ordering::Equal,
                    Op::Ge => ord != Ordering::Less,
                    Op::Le => ord != Ordering::Greater,
                    Op::Gt => ord == Ordering::Greater,
                    Op::Lt => ord == Ordering::Less,
                }
            }
            Clause::Prefix {
                negated,
                components,
            } => {
                let actual = [version.major, version.minor, version.patch];
                let same = components.iter().zip(actual.iter()).all(|(a, b)| a == b);
                same != *negated
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Compare { op, version } => write!(f, "{}{}", op.symbol(), version),
            Clause::Prefix {
                negated,
                components,
            } => {
                let prefix: Vec<String> = components.iter().map(u64::to_string).collect();
                let op = if *negated { "!=" } else { "==" };
                write!(f, "{}{}.*", op, prefix.join("."))
            }
        }
    }
}

/// A parsed version range.
///
/// An empty clause list is the wildcard `*`, which matches every version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    clauses: Vec<Clause>,
}

impl VersionConstraint {
    /// The constraint matching every version.
    pub fn any() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Check whether a version satisfies every clause.
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }

    fn parse_clause(constraint: &str, clause: &str) -> Result<Clause> {
        let invalid = |reason: String| MigrateError::InvalidConstraint {
            constraint: constraint.to_string(),
            reason,
        };

        let clause = clause.trim();
        if clause.is_empty() {
            return Err(invalid("empty clause".to_string()));
        }

        let (op, operand) = Op::split(clause);
        if operand.is_empty() {
            return Err(invalid(format!("clause '{}' has no version", clause)));
        }
        if operand.starts_with(['=', '!', '<', '>', '~', '^']) {
            return Err(invalid(format!("unknown operator in clause '{}'", clause)));
        }

        if let Some(prefix) = operand.strip_suffix(".*") {
            let negated = match op {
                Op::Eq => false,
                Op::Ne => true,
                _ => {
                    return Err(invalid(format!(
                        "wildcard '{}' is only allowed with == or !=",
                        operand
                    )))
                }
            };
            let components = prefix
                .split('.')
                .map(|c| c.parse::<u64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| invalid(format!("bad wildcard prefix '{}'", operand)))?;
            if components.len() > 2 {
                return Err(invalid(format!(
                    "wildcard '{}' must replace at least the patch component",
                    operand
                )));
            }
            return Ok(Clause::Prefix {
                negated,
                components,
            });
        }

        let version = parse_version(operand).map_err(|e| match e {
            MigrateError::InvalidVersion { reason, .. } => {
                invalid(format!("bad version '{}': {}", operand, reason))
            }
            other => other,
        })?;

        Ok(Clause::Compare { op, version })
    }
}

impl FromStr for VersionConstraint {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed == "*" {
            return Ok(Self::any());
        }
        if trimmed.is_empty() {
            return Err(MigrateError::InvalidConstraint {
                constraint: s.to_string(),
                reason: "constraint is empty".to_string(),
            });
        }

        let clauses = trimmed
            .split(',')
            .map(|clause| Self::parse_clause(s, clause))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { clauses })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("*");
        }
        let clauses: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        f.write_str(&clauses.join(","))
    }
}

/// Check whether `version` satisfies `constraint`.
pub fn matches(constraint: &str, version: &str) -> Result<bool> {
    let version = parse_version(version)?;
    let constraint: VersionConstraint = constraint.parse()?;
    Ok(constraint.matches(&version))
}
