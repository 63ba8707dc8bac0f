use clap::{Parser, Subcommand, ValueEnum};
use portalapp::model::Status;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "portal",
    bin_name = "portal",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Browse and manage the local quality-document portal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to $PORTAL_DATA, then the platform data dir)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Manifest path or URL, overriding the configured one
    #[arg(long, global = true, value_name = "LOCATION", help_heading = "Options")]
    pub manifest: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t, help_heading = "Options")]
    pub output: OutputMode,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Browse(BrowseCommands),

    #[command(flatten)]
    Document(DocumentCommands),

    #[command(flatten)]
    Data(DataCommands),
}

#[derive(Subcommand, Debug)]
pub enum BrowseCommands {
    /// Show the chapter tree with document counts
    #[command(display_order = 1)]
    Chapters,

    /// List the documents of a chapter
    #[command(alias = "ls", display_order = 2)]
    List {
        /// Chapter code (e.g. 01 or 01.1)
        chapter: String,

        /// Only documents with this status (approved, draft, obsolete)
        #[arg(long)]
        status: Option<Status>,

        /// Only documents dated in the last 7 days
        #[arg(long, conflicts_with = "last_month")]
        last_week: bool,

        /// Only documents dated in the last 30 days
        #[arg(long, conflicts_with = "last_week")]
        last_month: bool,
    },

    /// Show the most recent uploads
    #[command(display_order = 3)]
    Recent {
        /// How many uploads to show
        #[arg(short = 'n', long, default_value_t = portalapp::commands::recent::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Search titles and tags across the catalog
    #[command(alias = "s", display_order = 4)]
    Search {
        /// Search words (joined with spaces)
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Catalog totals by status and chapter
    #[command(display_order = 5)]
    Stats,

    /// Write an uploaded file to disk, or show where a manifest document lives
    #[command(alias = "v", display_order = 6)]
    View {
        /// Catalog entry id
        id: String,

        /// Destination file or directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Mark or list favorite documents
    #[command(alias = "fav", display_order = 7)]
    Favorites {
        /// Entry id to toggle; lists favorites when omitted
        id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DocumentCommands {
    /// Upload a file into a chapter
    #[command(alias = "up", display_order = 10)]
    Upload {
        /// File to upload
        path: PathBuf,

        /// Document title
        #[arg(short, long)]
        title: String,

        /// Chapter code
        #[arg(short, long)]
        chapter: String,

        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,

        /// Document status
        #[arg(long, default_value = "approved")]
        status: Status,
    },

    /// Change the title or tags of an upload
    #[command(alias = "e", display_order = 11)]
    Update {
        /// Upload id
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New comma-separated tags (empty clears them)
        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete one or more uploads
    #[command(alias = "rm", display_order = 12)]
    Delete {
        /// Upload ids
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Delete every upload
    #[command(display_order = 13)]
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// Show storage usage
    #[command(display_order = 20)]
    Capacity,

    /// Check the stored snapshots for inconsistencies
    #[command(display_order = 21)]
    Doctor,

    /// Export every upload to a .tar.gz archive
    #[command(display_order = 22)]
    Export {
        /// Archive path or directory
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Replace all uploads with the contents of an exported archive
    #[command(display_order = 23)]
    Import {
        /// Archive created by `portal export`
        archive: PathBuf,
    },
}
