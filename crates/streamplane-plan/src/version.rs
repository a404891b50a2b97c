//! Engine versions and plan shapes.
//!
//! A plan's shape is the set of tags it uses. Each tag records the engine
//! version that introduced it, so the shape tells which builds can replay
//! the plan. This is regression tooling; runtime decoding only needs the
//! tag table.

use std::fmt;
use std::str::FromStr;

use crate::document::PlanDocument;
use crate::error::PlanError;
use crate::registry::{self, TagSpec};

/// A `major.minor.patch` engine build version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl EngineVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for EngineVersion {
    type Err = PlanError;

    /// Parses `major.minor[.patch]`, ignoring any `-suffix`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PlanError::InvalidPlan(format!("invalid engine version '{s}'"));
        let core = s.split_once('-').map_or(s, |(core, _)| core);
        let mut parts = core.split('.').map(str::parse::<u32>);
        let major = parts.next().and_then(Result::ok).ok_or_else(invalid)?;
        let minor = parts.next().and_then(Result::ok).ok_or_else(invalid)?;
        let patch = match parts.next() {
            Some(p) => p.map_err(|_| invalid())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor, patch))
    }
}

/// The distinct tags a document uses, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanShape {
    tags: Vec<&'static TagSpec>,
}

impl PlanShape {
    /// Computes the shape of a decoded document.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::UnknownTag` if the document holds a variant with
    /// no row in the tag table.
    pub fn of(document: &PlanDocument) -> Result<Self, PlanError> {
        let mut tags: Vec<&'static TagSpec> = Vec::new();
        let mut push = |tag: &str| -> Result<(), PlanError> {
            let spec = registry::lookup(tag).ok_or_else(|| PlanError::UnknownTag {
                tag: tag.to_string(),
                path: "$".to_string(),
            })?;
            if !tags.iter().any(|known| known.tag == spec.tag) {
                tags.push(spec);
            }
            Ok(())
        };
        for entry in &document.plan {
            push(entry.tag())?;
            push(entry.ddl_command().tag())?;
            if let Some(query) = entry.query_plan() {
                for step in query.physical_plan.steps() {
                    push(step.tag())?;
                }
            }
        }
        Ok(Self { tags })
    }

    /// Tags in first-seen order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tags.iter().map(|spec| spec.tag)
    }

    /// Oldest engine version able to read every tag in the shape.
    #[must_use]
    pub fn minimum_engine_version(&self) -> EngineVersion {
        self.tags
            .iter()
            .map(|spec| spec.since)
            .max()
            .unwrap_or(EngineVersion::new(0, 0, 0))
    }

    /// Returns `true` if an engine at `version` can read the plan.
    #[must_use]
    pub fn is_readable_by(&self, version: EngineVersion) -> bool {
        self.minimum_engine_version() <= version
    }
}
