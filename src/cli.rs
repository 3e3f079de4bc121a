//! Command-line interface definitions.
//!
//! Subcommands:
//! - `analyze` — report capabilities for the queried packages of a bundle
//! - `compare` — diff an analysis against a baseline JSON report
//! - `graph` — emit the capability subgraph in DOT format
//! - `map` — validate and print the effective capability map
//!
//! Results go to stdout (or `--output`); status and logging go to stderr.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "capscope")]
#[command(about = "Static capability analysis over whole-program call graphs")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Use a custom capability map file, merged over the builtin map
    #[arg(long, global = true, value_name = "FILE")]
    pub capability_map: Option<String>,

    /// With --capability-map, do not merge the builtin map underneath it
    #[arg(long, global = true)]
    pub disable_builtin: bool,

    /// Never report UNANALYZED (suppresses tool-limitation noise)
    #[arg(long, global = true)]
    pub omit_unanalyzed: bool,

    /// Comma-separated capability list; prefix all entries with '-' to
    /// exclude instead of include (e.g. -UNANALYZED)
    #[arg(long, global = true, value_name = "CAPS", default_value = "", allow_hyphen_values = true)]
    pub capabilities: String,

    /// Reporting granularity
    #[arg(long, global = true, value_enum, default_value_t = GranularityArg::Function)]
    pub granularity: GranularityArg,

    /// Build tags forwarded to the front-end
    #[arg(long, global = true, value_name = "TAGS", default_value = "")]
    pub build_tags: String,

    /// Target operating system forwarded to the front-end
    #[arg(long, global = true, value_name = "OS", default_value = "")]
    pub target_os: String,

    /// Target architecture forwarded to the front-end
    #[arg(long, global = true, value_name = "ARCH", default_value = "")]
    pub target_arch: String,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a program bundle and report capabilities
    Analyze {
        /// Program bundle produced by a front-end
        bundle: String,

        /// Package patterns to query (defaults to the bundle's roots).
        /// A trailing /... matches a package and everything below it.
        #[arg(long, value_name = "PATTERNS")]
        packages: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },

    /// Compare an analysis against a baseline JSON report
    Compare {
        /// Baseline report from a previous `analyze --format json` run
        baseline: String,

        /// Program bundle for the current version
        bundle: String,

        /// Package patterns to query (defaults to the bundle's roots)
        #[arg(long, value_name = "PATTERNS")]
        packages: Option<String>,
    },

    /// Emit the capability subgraph in DOT format
    Graph {
        /// Program bundle produced by a front-end
        bundle: String,

        /// Package patterns to query (defaults to the bundle's roots)
        #[arg(long, value_name = "PATTERNS")]
        packages: Option<String>,
    },

    /// Validate the effective capability map and print it
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Capability counts
    Summary,
    /// Full findings with witness paths
    Terminal,
    /// Machine-readable report (also the comparison baseline format)
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Function,
    Package,
    Intermediate,
}

impl From<GranularityArg> for crate::types::Granularity {
    fn from(g: GranularityArg) -> Self {
        match g {
            GranularityArg::Function => crate::types::Granularity::Function,
            GranularityArg::Package => crate::types::Granularity::Package,
            GranularityArg::Intermediate => crate::types::Granularity::Intermediate,
        }
    }
}

/// Split a --packages value into patterns.
pub fn split_patterns(packages: Option<&str>) -> Vec<String> {
    packages
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
