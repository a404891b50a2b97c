//! Error types for plan decoding and validation.

/// Errors raised while encoding, decoding, or validating a plan document.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The document is not valid JSON, or a known tag has a malformed body.
    #[error("malformed plan document: {0}")]
    Json(#[from] serde_json::Error),

    /// A `@type` tag names a kind this engine has never heard of.
    #[error("unknown plan tag '{tag}' at {path}")]
    UnknownTag {
        /// The offending tag.
        tag: String,
        /// JSON path of the object carrying the tag.
        path: String,
    },

    /// A `@type` tag names a known kind at a version this engine cannot read.
    #[error("unsupported version of '{kind}' (tag '{tag}') at {path}")]
    UnsupportedVersion {
        /// Kind part of the tag, e.g. `tableSink`.
        kind: String,
        /// The offending tag.
        tag: String,
        /// JSON path of the object carrying the tag.
        path: String,
    },

    /// A tag does not follow the `<kindLowerCamel>V<integer>` grammar.
    #[error("invalid plan tag '{0}'")]
    InvalidTag(String),

    /// A tagged object lacks its `@type` field.
    #[error("missing @type at {0}")]
    MissingTag(String),

    /// The plan violates a structural invariant.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A schema string could not be parsed.
    #[error("schema error: {0}")]
    Schema(String),
}

impl PlanError {
    /// Returns `true` for tag errors that indicate a plan written by an
    /// engine this build cannot read.
    #[must_use]
    pub fn is_version_error(&self) -> bool {
        matches!(
            self,
            PlanError::UnknownTag { .. } | PlanError::UnsupportedVersion { .. }
        )
    }
}

/// Result alias for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors raised while replaying a historical plan fixture.
#[derive(Debug, thiserror::Error)]
pub enum CompatibilityError {
    /// A fixture file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File or directory being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The fixture directory layout is not `<name>/<version>/`.
    #[error("invalid fixture layout: {0}")]
    Layout(String),

    /// The historical plan no longer decodes.
    #[error("plan {name}@{version} failed to decode: {source}")]
    Plan {
        /// Fixture name.
        name: String,
        /// Engine version the plan was captured at.
        version: String,
        /// Decode error.
        source: PlanError,
    },

    /// The regenerated topology differs from the frozen one.
    #[error("plan {name}@{version} topology changed:\n--- expected\n{expected}\n--- actual\n{actual}")]
    TopologyMismatch {
        /// Fixture name.
        name: String,
        /// Engine version the plan was captured at.
        version: String,
        /// Frozen topology text.
        expected: String,
        /// Regenerated topology text.
        actual: String,
    },

    /// Re-encoding the decoded plan lost or reordered information.
    #[error("plan {name}@{version} does not survive re-encoding")]
    RoundTrip {
        /// Fixture name.
        name: String,
        /// Engine version the plan was captured at.
        version: String,
    },

    /// The plan uses a tag introduced after the version it claims.
    #[error("plan {name}@{version} uses tags requiring engine {required}")]
    VersionTooOld {
        /// Fixture name.
        name: String,
        /// Engine version the plan was captured at.
        version: String,
        /// Minimum version according to the tag table.
        required: String,
    },
}
