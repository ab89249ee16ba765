use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};

use infradash::{
    DashboardConfigBuilder, DashboardContext, DataSource, PageKind, init_logging, render_page,
};

/// Municipality-scoped statistics and map layers for Serbian infrastructure data.
#[derive(Debug, Parser)]
#[command(name = "infradash", version, about)]
struct Cli {
    /// Where layers are read from: `remote`, `test` or `local:<dir>`
    #[arg(
        long,
        global = true,
        env = "INFRADASH_SOURCE",
        default_value = "remote",
        value_parser = parse_source
    )]
    source: DataSource,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve free text against the municipality names
    Resolve { text: String },
    /// Road lengths per category, bridges and tunnels
    Roads(PageArgs),
    /// Rail lengths, bridges, tunnels and stations
    Rails(PageArgs),
    /// Schools and universities
    Schools(PageArgs),
    /// Hospitals
    Hospitals(PageArgs),
    /// Download every layer into the local cache
    Prefetch,
}

#[derive(Debug, Args)]
struct PageArgs {
    /// Municipality name, accents and case optional
    #[arg(short, long)]
    municipality: Option<String>,

    /// Write the map view and layers as JSON to this file
    #[arg(long)]
    geojson: Option<PathBuf>,
}

fn parse_source(value: &str) -> std::result::Result<DataSource, String> {
    match value {
        "remote" => Ok(DataSource::default()),
        "test" => Ok(DataSource::Test),
        other => other
            .strip_prefix("local:")
            .filter(|dir| !dir.is_empty())
            .map(|dir| DataSource::LocalDir(PathBuf::from(dir)))
            .ok_or_else(|| format!("expected remote, test or local:<dir>, got '{other}'")),
    }
}

fn show_page(ctx: &DashboardContext, kind: PageKind, args: &PageArgs) -> Result<()> {
    let mut selection = ctx.new_selection();
    if let Some(input) = &args.municipality {
        let names = ctx.municipalities()?.names();
        let outcome = selection.apply(input, names, &ctx.config().resolver);
        if let Some(message) = outcome.message(selection.current()) {
            println!("{message}\n");
        }
    }

    let page = render_page(ctx, kind, selection.current())
        .with_context(|| format!("Rendering {kind} for {}", selection.current()))?;
    print!("{page}");

    if let Some(path) = &args.geojson {
        std::fs::write(path, page.to_map_document()?)
            .with_context(|| format!("Writing map document to {}", path.display()))?;
        info!(path = %path.display(), "Map document written");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO })?;

    let ctx = DashboardContext::new(&cli.source, DashboardConfigBuilder::new().build())
        .with_context(|| format!("Opening {}", cli.source))?;

    match &cli.command {
        Command::Resolve { text } => {
            let names = ctx.municipalities()?.names();
            let resolution = names.resolve_with_tier(text, &ctx.config().resolver);
            if resolution.names.is_empty() {
                bail!("No municipality matches '{text}'");
            }
            println!("{:?} match:", resolution.tier);
            for name in &resolution.names {
                println!("  {name}");
            }
        }
        Command::Roads(args) => show_page(&ctx, PageKind::Roads, args)?,
        Command::Rails(args) => show_page(&ctx, PageKind::Rails, args)?,
        Command::Schools(args) => show_page(&ctx, PageKind::Schools, args)?,
        Command::Hospitals(args) => show_page(&ctx, PageKind::Hospitals, args)?,
        Command::Prefetch => {
            let t0 = std::time::Instant::now();
            let bytes = ctx.prefetch()?;
            println!(
                "Fetched {bytes} bytes in {:.2} seconds",
                t0.elapsed().as_secs_f32()
            );
        }
    }
    Ok(())
}
