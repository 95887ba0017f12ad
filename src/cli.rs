use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "libcurate",
    version,
    about = "Offline document library catalog reconciliation and classification"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Reconcile(ReconcileArgs),
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Validate(ValidateArgs),
    Status(StatusArgs),
}

/// Locations shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct LibraryArgs {
    #[arg(long, env = "LIBCURATE_ROOT", default_value = ".")]
    pub library_root: PathBuf,

    /// Directory the acquisition layer deposits files into, relative to the
    /// library root.
    #[arg(long, default_value = "pdfs")]
    pub acquired_dir: PathBuf,

    #[arg(long)]
    pub catalog_path: Option<PathBuf>,
}

impl LibraryArgs {
    pub fn acquired_path(&self) -> PathBuf {
        self.library_root.join(&self.acquired_dir)
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.library_root.join("catalog")
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.catalog_dir().join("catalog.json"))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.catalog_dir().join("reports")
    }

    pub fn extraction_manifest(&self, explicit: Option<&PathBuf>) -> PathBuf {
        explicit
            .cloned()
            .unwrap_or_else(|| self.catalog_dir().join("extraction_manifest.json"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    #[arg(long)]
    pub acquisition_manifest: Option<PathBuf>,

    #[arg(long)]
    pub extraction_manifest: Option<PathBuf>,

    #[arg(long)]
    pub overrides_path: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long = "extension", default_value = "pdf")]
    pub extensions: Vec<String>,

    #[arg(long, default_value_t = 0.85)]
    pub title_threshold: f64,

    #[arg(long, default_value_t = 5)]
    pub page_tolerance: u32,

    #[arg(long, default_value_t = 0.10)]
    pub size_tolerance: f64,

    #[arg(long, default_value_t = 20.0)]
    pub large_size_mb: f64,

    #[arg(long, default_value_t = false)]
    pub reclassify_all: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long = "extension", default_value = "pdf")]
    pub extensions: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    #[arg(long)]
    pub extraction_manifest: Option<PathBuf>,

    #[arg(long = "extension", default_value = "pdf")]
    pub extensions: Vec<String>,

    /// Leading pages passed to pdftotext.
    #[arg(long, default_value_t = 5)]
    pub max_pages: u32,

    #[arg(long, default_value_t = 4000)]
    pub max_text_chars: usize,

    /// Re-extract files that already have an entry in the manifest.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub library: LibraryArgs,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    /// Re-hash every cataloged file and compare against `contentHash`.
    #[arg(long, default_value_t = false)]
    pub verify_hashes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub library: LibraryArgs,
}
