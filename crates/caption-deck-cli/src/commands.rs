use caption_deck_core::grid::{GridSort, GridView};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Request timeout for command-line runs when neither `--timeout`,
/// `Config.toml` nor the environment sets one.
pub const CLI_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Parser)]
#[command(name = "caption-deck")]
#[command(about = "Batch image captioning against a local vision model", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON file with a list of {directory, model, system} jobs
    #[arg(long, value_name = "PATH")]
    pub queue: Option<PathBuf>,

    /// Caption every image in this directory
    #[arg(long, value_name = "PATH")]
    pub directory: Option<PathBuf>,

    /// Model name (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// System prompt text, or a path to a file containing it
    #[arg(long, value_name = "TEXT_OR_PATH")]
    pub system: Option<String>,

    /// Inference server base URL (defaults to the configured endpoint)
    #[arg(long)]
    pub url: Option<String>,

    /// Regenerate captions that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Per-image request timeout in seconds [default: configured, else 60]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the models installed on the inference server
    Models,
    /// Show the images of a directory with their caption and favorite state
    Browse {
        directory: PathBuf,
        #[arg(long, value_enum, default_value_t = ViewArg::All)]
        view: ViewArg,
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
        /// Only show images whose name or caption contains this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Print the generation prompt embedded in an image
    Extract {
        image: PathBuf,
        /// Also save the prompt as the image's caption
        #[arg(long)]
        save: bool,
    },
    /// Toggle the favorite marker of an image
    Favorite { image: PathBuf },
    /// Delete an image with its caption, favorite marker and thumbnail
    Delete {
        image: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ViewArg {
    All,
    Favorites,
    Captioned,
    Uncaptioned,
}

impl From<ViewArg> for GridView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::All => GridView::All,
            ViewArg::Favorites => GridView::Favorites,
            ViewArg::Captioned => GridView::Captioned,
            ViewArg::Uncaptioned => GridView::Uncaptioned,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    NameDesc,
    Captioned,
    Favorites,
}

impl From<SortArg> for GridSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Name => GridSort::NameAsc,
            SortArg::NameDesc => GridSort::NameDesc,
            SortArg::Captioned => GridSort::CaptionedFirst,
            SortArg::Favorites => GridSort::FavoritesFirst,
        }
    }
}
