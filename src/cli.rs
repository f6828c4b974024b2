use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bookfix",
    version,
    about = "Repair passes for converted DocBook-style book markup"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    FixDepth(FixDepthArgs),
    FixXrefs(FixXrefsArgs),
    FixTocTitles(FixTocTitlesArgs),
    FixTocLevels(FixTocLevelsArgs),
    GroupFrontMatter(GroupFrontMatterArgs),
    ReconcileIds(ReconcileIdsArgs),
    FixEntities(FixEntitiesArgs),
    CheckIds(CheckIdsArgs),
    Migrate(MigrateArgs),
    PdfText(PdfTextArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BookLayoutArgs {
    #[arg(long, default_value = "book")]
    pub dir: PathBuf,

    #[arg(long, default_value = "book/toc.xml")]
    pub toc: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct OutlineArgs {
    #[arg(long, default_value = "book/toc.xml")]
    pub toc: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct FixDepthArgs {
    #[command(flatten)]
    pub layout: BookLayoutArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FixXrefsArgs {
    #[command(flatten)]
    pub layout: BookLayoutArgs,

    #[arg(long, default_value_t = false)]
    pub include_ids: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FixTocTitlesArgs {
    #[command(flatten)]
    pub outline: OutlineArgs,

    #[arg(long)]
    pub placeholder: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FixTocLevelsArgs {
    #[command(flatten)]
    pub outline: OutlineArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FrontMatterArgs {
    #[arg(long = "front-matter-title", default_value = "Front Matter")]
    pub title: String,

    #[arg(long = "front-matter-linkend", default_value = "frontmatter")]
    pub linkend: String,

    #[arg(long, default_value_t = 1)]
    pub first_chapter: u32,
}

#[derive(Args, Debug, Clone)]
pub struct GroupFrontMatterArgs {
    #[command(flatten)]
    pub outline: OutlineArgs,

    #[command(flatten)]
    pub front_matter: FrontMatterArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    #[arg(long, default_value_t = 6)]
    pub min_match_chars: usize,

    #[arg(long, default_value_t = false)]
    pub ignore_depth: bool,

    #[arg(long, default_value_t = false)]
    pub no_update_references: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileIdsArgs {
    #[command(flatten)]
    pub layout: BookLayoutArgs,

    #[command(flatten)]
    pub matching: MatchArgs,

    #[arg(long)]
    pub placeholder: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FixEntitiesArgs {
    #[command(flatten)]
    pub layout: BookLayoutArgs,

    #[arg(long, default_value = "book/entities.ent")]
    pub entities: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CheckIdsArgs {
    #[command(flatten)]
    pub layout: BookLayoutArgs,

    #[arg(long, default_value_t = false)]
    pub fix: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub layout: BookLayoutArgs,

    #[arg(long, default_value = "book/entities.ent")]
    pub entities: PathBuf,

    #[arg(long)]
    pub placeholder: Option<String>,

    #[command(flatten)]
    pub front_matter: FrontMatterArgs,

    #[command(flatten)]
    pub matching: MatchArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct PdfTextArgs {
    #[arg(long)]
    pub pdf: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub first_page: usize,

    #[arg(long)]
    pub max_pages: Option<usize>,

    #[arg(long)]
    pub grep: Option<String>,

    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
