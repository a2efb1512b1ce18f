use clap::Parser;
use std::path::PathBuf;

const LONG_ABOUT: &str = "\
Upgrades the major version of a Go module - or the major version of one of \
its dependencies - by editing the module's go.mod file and the corresponding \
import paths in its Go files.

If no arguments are given, upgrades the major version of the module rooted in \
the current directory: the major version component of its path is incremented \
in the go.mod file (adding the version component if necessary) and in any \
import statements between the module's packages.

The same behavior is triggered by supplying the module's own path for the \
[MODULE] argument. In that form a target [VERSION] can also be given, making \
it possible to jump several major versions at once, or to downgrade.

If the module path of a dependency is given instead, upgrades the dependency \
to the specified version, or, if no version is given, to the highest major \
version available. Updates the dependency's require directive in the go.mod \
file, as well as the relevant import paths in the module's Go files.

If the special target \"all\" is given, the tool attempts to upgrade all \
direct dependencies in the go.mod file to the highest major version \
available.

If given, [MODULE] must be a fully qualified module path, as written in the \
go.mod file, including the major version component if applicable. For \
example: \"github.com/example/widget/v2\".

If given, [VERSION] must be a valid semver module version of any precision: \
'v2', 'v2.3' or 'v2.3.4'. When upgrading the current module, only the major \
component is taken into account. When upgrading a dependency, the tool \
upgrades to the highest available matching version, unless the target major \
version is already required, in which case the existing minor/patch version \
is kept.

This tool does not create version control tags.";

#[derive(Parser, Debug)]
#[command(
    name = "modup",
    about = "Upgrade the major version of a Go module or one of its dependencies",
    long_about = LONG_ABOUT,
    version,
    author
)]
pub struct Cli {
    /// Module directory path
    #[arg(short = 'd', long = "dir", default_value = ".")]
    pub dir: PathBuf,

    /// Enable verbose output (echoes every index query and rewrite decision)
    #[arg(short, long)]
    pub verbose: bool,

    /// Fully qualified module path to upgrade, or "all"
    #[arg(value_name = "MODULE")]
    pub module: Option<String>,

    /// Target semver version ('v2', 'v2.3' or 'v2.3.4')
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,
}

/// Per-invocation settings, threaded through every component instead of
/// living in process-wide flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub dir: PathBuf,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            dir: cli.dir.clone(),
            verbose: cli.verbose,
        }
    }
}
