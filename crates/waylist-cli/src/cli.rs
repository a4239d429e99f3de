use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use waylist_core::models::Checklist;

#[derive(Parser)]
#[command(name = "waylist")]
#[command(about = "Browse and tick off travel checklists from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local mirror and the outbound queue
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Path to a JSON client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only queue mutations; do not try to send them now
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch catalog or user data into the local mirror
    Refresh {
        #[command(subcommand)]
        target: RefreshTarget,
        /// Ignore the freshness window
        #[arg(short, long, global = true)]
        force: bool,
    },
    /// List places of a checklist from the local mirror
    List {
        /// Checklist (locations, uncountries, whss, beaches, golfcourses, divesites, restaurants)
        #[arg(value_parser = parse_checklist)]
        list: Checklist,
        /// Number of places to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show places you have visited
        #[arg(long)]
        visited: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search places of a checklist by title
    Search {
        #[arg(value_parser = parse_checklist)]
        list: Checklist,
        /// Search query
        query: String,
        /// Number of places to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a place as visited
    Checkin {
        #[arg(value_parser = parse_checklist)]
        list: Checklist,
        /// Place ID
        item_id: i64,
    },
    /// Remove a place from your visited list
    Checkout {
        #[arg(value_parser = parse_checklist)]
        list: Checklist,
        /// Place ID
        item_id: i64,
    },
    /// Upload a photo to a location
    Photo {
        /// Location ID
        location_id: i64,
        /// Image file to upload
        path: PathBuf,
        /// Photo caption
        #[arg(short, long, default_value = "")]
        caption: String,
        /// MIME type (guessed from the file extension when omitted)
        #[arg(long, value_name = "TYPE")]
        mime_type: Option<String>,
    },
    /// Publish a post on a location
    Post {
        /// Location ID
        location_id: i64,
        /// Post text
        text: Vec<String>,
    },
    /// Update profile fields
    Profile {
        /// Field to update, e.g. --set full_name="Ada Lovelace"
        #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Show pending outbound operations
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send pending outbound operations now
    Flush,
    /// Sign in with an API token and save it to the config file
    Login {
        /// Bearer token issued by the catalog API
        #[arg(long)]
        token: String,
    },
    /// Forget the session token and user data in the local mirror
    Logout,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshTarget {
    /// Catalog places of one checklist
    Places {
        #[arg(value_parser = parse_checklist)]
        list: Checklist,
    },
    /// Your visited items across all checklists
    Checklists,
    /// One leaderboard page
    Rankings {
        #[arg(value_parser = parse_checklist)]
        list: Checklist,
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Photos of a location
    Photos { location_id: i64 },
    /// Posts of a location
    Posts { location_id: i64 },
    /// Your profile
    Profile,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

pub fn parse_checklist(value: &str) -> Result<Checklist, String> {
    value.parse::<Checklist>().map_err(|error| error.to_string())
}
