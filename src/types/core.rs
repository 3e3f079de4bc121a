//! Core analysis types - capabilities, witness paths, and the report envelope.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const SCHEMA_VERSION: &str = "1.0";

/// A privileged behavior a function may exercise.
///
/// The declaration order is load-bearing: `Ord` follows it, and every
/// iteration over capabilities (search, reports, comparisons) uses it.
/// `Unspecified` means "not decided here, keep searching transitively";
/// `Safe` means "explicitly trusted, do not descend".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    #[default]
    Unspecified,
    Safe,
    Files,
    Network,
    Runtime,
    ReadSystemState,
    ModifySystemState,
    OperatingSystem,
    SystemCalls,
    ArbitraryExecution,
    Cgo,
    Unanalyzed,
    UnsafePointer,
    Reflect,
    Exec,
}

impl Capability {
    pub const ALL: [Capability; 15] = [
        Capability::Unspecified,
        Capability::Safe,
        Capability::Files,
        Capability::Network,
        Capability::Runtime,
        Capability::ReadSystemState,
        Capability::ModifySystemState,
        Capability::OperatingSystem,
        Capability::SystemCalls,
        Capability::ArbitraryExecution,
        Capability::Cgo,
        Capability::Unanalyzed,
        Capability::UnsafePointer,
        Capability::Reflect,
        Capability::Exec,
    ];

    /// Short name, as used in capability map files and reports.
    pub fn name(self) -> &'static str {
        match self {
            Capability::Unspecified => "UNSPECIFIED",
            Capability::Safe => "SAFE",
            Capability::Files => "FILES",
            Capability::Network => "NETWORK",
            Capability::Runtime => "RUNTIME",
            Capability::ReadSystemState => "READ_SYSTEM_STATE",
            Capability::ModifySystemState => "MODIFY_SYSTEM_STATE",
            Capability::OperatingSystem => "OPERATING_SYSTEM",
            Capability::SystemCalls => "SYSTEM_CALLS",
            Capability::ArbitraryExecution => "ARBITRARY_EXECUTION",
            Capability::Cgo => "CGO",
            Capability::Unanalyzed => "UNANALYZED",
            Capability::UnsafePointer => "UNSAFE_POINTER",
            Capability::Reflect => "REFLECT",
            Capability::Exec => "EXEC",
        }
    }

    /// One-line description used in comparison summaries.
    pub fn describe(self) -> &'static str {
        match self {
            Capability::Unspecified => "No category has been assigned",
            Capability::Safe => "Explicitly trusted",
            Capability::Files => "Access to the file system",
            Capability::Network => "Access to the network",
            Capability::Runtime => "Read or modify settings in the language runtime",
            Capability::ReadSystemState => "Read system information, e.g. environment variables",
            Capability::ModifySystemState => "Modify system information, e.g. environment variables",
            Capability::OperatingSystem => "Miscellaneous operating-system interfaces",
            Capability::SystemCalls => "Make system calls",
            Capability::ArbitraryExecution => "Invoke arbitrary code, e.g. assembly",
            Capability::Cgo => "Call foreign functions",
            Capability::Unanalyzed => "Code the analyzer cannot effectively analyze",
            Capability::UnsafePointer => "Uses unsafe pointer conversions",
            Capability::Reflect => "Uses runtime reflection",
            Capability::Exec => "Execute other programs",
        }
    }

    /// Parse a capability token: either the short name (`FILES`) or the
    /// legacy long form (`CAPABILITY_FILES`). The legacy prefix is stripped;
    /// a legacy token that does not name a known capability is rejected even
    /// if its suffix would otherwise parse oddly.
    pub fn parse(token: &str) -> Option<Capability> {
        let short = token.strip_prefix("CAPABILITY_").unwrap_or(token);
        Capability::ALL.iter().copied().find(|c| c.name() == short)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Capability {
    type Error = String;
    fn try_from(value: String) -> Result<Self, String> {
        Capability::parse(&value).ok_or_else(|| format!("unknown capability {value:?}"))
    }
}

impl From<Capability> for String {
    fn from(c: Capability) -> String {
        c.name().to_string()
    }
}

/// A set of capabilities with an inclusive or exclusive mode, used to filter
/// findings and subgraph output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFilter {
    set: BTreeSet<Capability>,
    exclusive: bool,
}

impl CapabilityFilter {
    pub fn inclusive(caps: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            set: caps.into_iter().collect(),
            exclusive: false,
        }
    }

    pub fn exclusive(caps: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            set: caps.into_iter().collect(),
            exclusive: true,
        }
    }

    /// Parse a comma-separated capability list. An empty string means "no
    /// filter" and returns None. Every entry may be prefixed with '-' to
    /// build an exclusive filter; mixing negated and unnegated entries is an
    /// error, as is an unknown capability name.
    pub fn parse(list: &str) -> Result<Option<CapabilityFilter>, Error> {
        if list.is_empty() {
            return Ok(None);
        }
        let mut set = BTreeSet::new();
        let mut exclusive = false;
        for (i, raw) in list.split(',').enumerate() {
            if raw.is_empty() {
                return Err(Error::CapabilityList {
                    list: list.to_string(),
                    message: "empty capability in list".to_string(),
                });
            }
            let (neg, token) = match raw.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            if i > 0 && neg != exclusive {
                return Err(Error::CapabilityList {
                    list: list.to_string(),
                    message: "mix of negated and unnegated capabilities".to_string(),
                });
            }
            exclusive = neg;
            let cap = Capability::parse(token).ok_or_else(|| Error::CapabilityList {
                list: list.to_string(),
                message: format!("unknown capability {token:?}"),
            })?;
            set.insert(cap);
        }
        Ok(Some(CapabilityFilter { set, exclusive }))
    }

    pub fn admits(&self, c: Capability) -> bool {
        self.set.contains(&c) != self.exclusive
    }
}

/// Reporting granularity: the identity key under which findings are
/// deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Function,
    Package,
    /// One finding per package appearing on any witness path.
    Intermediate,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Granularity> {
        match s {
            "" | "function" => Some(Granularity::Function),
            "package" => Some(Granularity::Package),
            "intermediate" => Some(Granularity::Intermediate),
            _ => None,
        }
    }
}

/// A call-site position. Column and line are 1-based; the filename is a
/// basename in serialized output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Site {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

/// One step of a witness path. The first step of a path has no site; each
/// later step carries the position of the call made by the previous step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub site: Option<Site>,
}

/// Whether a witness path stays within the queried package and the standard
/// library, or crosses into third-party dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityType {
    Direct,
    Transitive,
}

/// One (queried function, capability) result with an example call path
/// demonstrating how the capability is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub package_name: String,
    pub package_dir: String,
    pub capability: Capability,
    pub capability_type: CapabilityType,
    pub path: Vec<PathStep>,
    /// Space-joined function names of `path`, a convenience flattening.
    pub dep_path: String,
}

impl Finding {
    /// Name of the queried function this finding is about.
    pub fn function_name(&self) -> Option<&str> {
        self.path.first().map(|s| s.name.as_str())
    }
}

/// A module that contributed packages to the analysis, for audit
/// reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub path: String,
    pub version: String,
}

/// A non-standard-library package seen by the analysis, with the files the
/// front-end excluded under the active build constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ignored_files: Vec<String>,
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub schema_version: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modules: Vec<ModuleInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub packages: Vec<PackageInfo>,
}

impl AnalysisReport {
    pub fn new(findings: Vec<Finding>, modules: Vec<ModuleInfo>, packages: Vec<PackageInfo>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            analysis_timestamp: Utc::now(),
            findings,
            modules,
            packages,
        }
    }
}
