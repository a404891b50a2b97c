//! Replay of frozen historical plans.
//!
//! A fixture corpus is laid out as `<root>/<name>/<version>/` with two
//! files per directory: `plan.json`, the document as written by engine
//! `<version>`, and `topology`, the topology that engine built from it.
//! Replaying a fixture must decode the plan, regenerate an identical
//! topology, and survive re-encoding unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec;
use crate::document::PlanDocument;
use crate::error::CompatibilityError;
use crate::topology::PlanTopology;
use crate::version::{EngineVersion, PlanShape};

/// Plan file name inside a fixture directory.
pub const PLAN_FILE: &str = "plan.json";

/// Topology file name inside a fixture directory.
pub const TOPOLOGY_FILE: &str = "topology";

/// A historical plan and the topology it produced.
#[derive(Debug, Clone)]
pub struct HistoricalPlan {
    /// Fixture name (the parent directory).
    pub name: String,
    /// Engine version that wrote the plan.
    pub version: EngineVersion,
    /// Persisted plan bytes.
    pub plan: Vec<u8>,
    /// Frozen topology text.
    pub topology: String,
}

fn read(path: &Path) -> Result<Vec<u8>, CompatibilityError> {
    fs::read(path).map_err(|source| CompatibilityError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn dir_name(path: &Path) -> Result<String, CompatibilityError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| CompatibilityError::Layout(path.display().to_string()))
}

fn subdirectories(path: &Path) -> Result<Vec<PathBuf>, CompatibilityError> {
    let io_err = |source| CompatibilityError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

impl HistoricalPlan {
    /// Loads one fixture from a `<name>/<version>/` directory.
    ///
    /// # Errors
    ///
    /// Returns `CompatibilityError::Io` for unreadable files and
    /// `CompatibilityError::Layout` if the directory names are not a fixture
    /// name and an engine version.
    pub fn load(dir: &Path) -> Result<Self, CompatibilityError> {
        let version_text = dir_name(dir)?;
        let version = version_text
            .parse()
            .map_err(|_| CompatibilityError::Layout(dir.display().to_string()))?;
        let name = dir
            .parent()
            .ok_or_else(|| CompatibilityError::Layout(dir.display().to_string()))
            .and_then(dir_name)?;

        let plan = read(&dir.join(PLAN_FILE))?;
        let topology = String::from_utf8_lossy(&read(&dir.join(TOPOLOGY_FILE))?).into_owned();
        Ok(Self {
            name,
            version,
            plan,
            topology,
        })
    }

    /// Loads every fixture under `root`, ordered by name then version
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns the first load failure.
    pub fn load_corpus(root: &Path) -> Result<Vec<Self>, CompatibilityError> {
        let mut plans = Vec::new();
        for name_dir in subdirectories(root)? {
            for version_dir in subdirectories(&name_dir)? {
                plans.push(Self::load(&version_dir)?);
            }
        }
        Ok(plans)
    }

    /// Renders the topology of every query in a document, in plan order.
    #[must_use]
    pub fn render(document: &PlanDocument) -> String {
        document
            .queries()
            .map(|query| PlanTopology::of(query, &document.configs).to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replays the fixture and returns the decoded document.
    ///
    /// # Errors
    ///
    /// Returns `Plan` if the plan no longer decodes, `VersionTooOld` if it
    /// uses tags newer than its recorded engine version, `TopologyMismatch`
    /// if the regenerated topology differs, and `RoundTrip` if re-encoding
    /// changes the document.
    pub fn verify(&self) -> Result<PlanDocument, CompatibilityError> {
        let plan_err = |source| CompatibilityError::Plan {
            name: self.name.clone(),
            version: self.version.to_string(),
            source,
        };
        let document = codec::decode(&self.plan).map_err(plan_err)?;

        let shape = PlanShape::of(&document).map_err(plan_err)?;
        if !shape.is_readable_by(self.version) {
            return Err(CompatibilityError::VersionTooOld {
                name: self.name.clone(),
                version: self.version.to_string(),
                required: shape.minimum_engine_version().to_string(),
            });
        }

        let actual = Self::render(&document);
        if actual.trim_end() != self.topology.trim_end() {
            return Err(CompatibilityError::TopologyMismatch {
                name: self.name.clone(),
                version: self.version.to_string(),
                expected: self.topology.trim_end().to_string(),
                actual: actual.trim_end().to_string(),
            });
        }

        let reencoded = codec::encode(&document).map_err(plan_err)?;
        let redecoded = codec::decode(&reencoded).map_err(plan_err)?;
        if redecoded != document {
            return Err(CompatibilityError::RoundTrip {
                name: self.name.clone(),
                version: self.version.to_string(),
            });
        }

        debug!(name = %self.name, version = %self.version, "historical plan verified");
        Ok(document)
    }
}
