use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pseudogrep::commands::{
    candidates_command, init_logging, list_backends_command, search_command, SearchArgs,
};

/// Structural search over decompiled binaries.
///
/// This CLI is a thin wrapper around `pseudogrep-core` (exposed in code as
/// `pseudogrep_core`). All substantive logic lives in the library so it can
/// be tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "pseudogrep",
    version,
    about = "Structural search over decompiled binaries, narrowed by the call graph",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the functions that call every function the pattern names.
    ///
    /// Each candidate is decompiled and matched; functions with matches are
    /// reported with their match count.
    Search {
        #[command(flatten)]
        query: QueryArgs,

        /// Print every match, highlighted with context.
        #[arg(short = 'p', long = "print-matches", default_value_t = false)]
        print_matches: bool,

        /// Highlight matched nodes with ANSI colors.
        #[arg(short = 'C', long, default_value_t = false)]
        color: bool,

        /// Lines of context before each highlighted line.
        #[arg(short = 'B', long)]
        before: Option<usize>,

        /// Lines of context after each highlighted line.
        #[arg(short = 'A', long)]
        after: Option<usize>,

        /// Only report the first match per function.
        #[arg(short = 'l', long, default_value_t = false)]
        limit: bool,

        /// Drop matches where two variables bind the same text.
        #[arg(short = 'u', long, default_value_t = false)]
        unique: bool,

        /// Worker threads for decompile+match (defaults to the config, then 1).
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// Show the functions a pattern would search, without decompiling.
    Candidates {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// List host backends compiled into this binary.
    Backends {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Structural pattern, e.g. '{$n = strlen($s); memcpy(_, $s, $n);}'.
    pattern: String,

    /// Binary (rizin) or exported snapshot (.json/.yaml) to search.
    #[arg(long)]
    binary: String,

    /// Host backend (snapshot, rizin). Guessed from the file extension if omitted.
    #[arg(long)]
    backend: Option<String>,

    /// Config file (JSON or YAML). Defaults to ./.pseudogrep.json when present.
    #[arg(long)]
    config: Option<String>,

    /// Parse the pattern and pseudocode as C++.
    #[arg(short = 'X', long, default_value_t = false)]
    cpp: bool,

    /// Constrain a variable: `var=regex`, or `var!=regex` to negate.
    #[arg(short = 'R', long = "regex")]
    regex: Vec<String>,

    /// Accept patterns with syntax errors.
    #[arg(short = 'f', long, default_value_t = false)]
    force: bool,

    /// Only search functions whose name matches this regex (repeatable).
    #[arg(long)]
    include: Vec<String>,

    /// Skip functions whose name matches this regex (repeatable).
    #[arg(long)]
    exclude: Vec<String>,

    /// Search every function when no identifier names a function.
    #[arg(long, default_value_t = false)]
    scan_all: bool,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl QueryArgs {
    fn into_search_args(self) -> SearchArgs {
        SearchArgs {
            pattern: self.pattern,
            binary: self.binary,
            backend: self.backend,
            config: self.config,
            cpp: self.cpp,
            regex: self.regex,
            force: self.force,
            include: self.include,
            exclude: self.exclude,
            scan_all: self.scan_all,
            json: self.json,
            ..SearchArgs::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Search {
            query,
            print_matches,
            color,
            before,
            after,
            limit,
            unique,
            jobs,
        } => {
            let args = SearchArgs {
                print_matches,
                color,
                before,
                after,
                limit,
                unique,
                jobs,
                ..query.into_search_args()
            };
            search_command(&args)?;
        }
        Command::Candidates { query } => {
            candidates_command(&query.into_search_args())?;
        }
        Command::Backends { json } => list_backends_command(json)?,
    }

    Ok(())
}
