use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

use super::CliContext;
use xbytechat::api::reports::MessageLogReport;
use xbytechat::api::tracking::TrackingReport;
use xbytechat::report::{
    ExportBackend, ExportFormat, ExportSource, ReportQuery, ReportRunner, ReportState,
    SearchBackend, SearchSequencer, export_report,
};

#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Print one page of a report
    Search(QueryArgs),
    /// Download a report as csv, xlsx or json
    Export {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// Directory for the file, defaults to <root>/exports
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportKind {
    Messages,
    Tracking,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(long, value_enum, default_value = "messages")]
    pub report: ReportKind,
    #[arg(long)]
    pub search: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub from: Option<NaiveDate>,
    #[arg(long)]
    pub to: Option<NaiveDate>,
    /// Repeatable, e.g. --filter status=Failed
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,
    #[arg(long)]
    pub sort: Option<String>,
    /// Flip the sort to ascending
    #[arg(long)]
    pub asc: bool,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = xbytechat::report::query::DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

impl QueryArgs {
    fn to_query(&self) -> anyhow::Result<ReportQuery> {
        let mut query = ReportQuery::new(self.page_size);
        if let Some(search) = &self.search {
            query.set_search(search);
        }
        query.set_date_range(self.from, self.to)?;
        for (key, value) in &self.filters {
            query.set_filter(key, Some(value));
        }
        if let Some(column) = &self.sort {
            query.toggle_sort(column);
            if self.asc {
                query.toggle_sort(column);
            }
        }
        query.set_page(self.page);
        Ok(query)
    }
}

/// Runs one settled search through the debounced runner.
async fn search_once<B: SearchBackend>(
    backend: Arc<B>,
    query: &ReportQuery,
    context: &CliContext,
) -> anyhow::Result<ReportState<B::Row>> {
    let sequencer = Arc::new(SearchSequencer::new(context.settings.stale_response_guard));
    let runner = ReportRunner::spawn(backend, context.settings.search_debounce, sequencer);
    let mut state = runner.state();
    runner.submit(query);
    let settled = state
        .wait_for(|s| s.request.is_some() && !s.loading)
        .await
        .context("report runner stopped")?
        .clone();
    if let Some(err) = &settled.error {
        anyhow::bail!("search failed: {err}");
    }
    Ok(settled)
}

fn print_rows<R: Serialize>(state: &ReportState<R>, page_size: u32) -> anyhow::Result<()> {
    for row in &state.rows {
        println!("{}", serde_json::to_string(row)?);
    }
    let pages = state.total_count.div_ceil(u64::from(page_size.max(1)));
    println!(
        "page {} of {} ({} rows total)",
        state.page,
        pages.max(1),
        state.total_count
    );
    Ok(())
}

async fn run<B>(backend: Arc<B>, command: ReportCommands, context: &CliContext) -> anyhow::Result<()>
where
    B: SearchBackend + ExportBackend,
    B::Row: Serialize,
{
    match command {
        ReportCommands::Search(args) => {
            let query = args.to_query()?;
            let state = search_once(backend, &query, context).await?;
            print_rows(&state, args.page_size)
        }
        ReportCommands::Export { query, format, out } => {
            let query = query.to_query()?;
            let state = search_once(backend.clone(), &query, context).await?;
            let file = export_report(backend.as_ref(), &query.to_request(), format, &state.rows).await?;

            let dir = out.unwrap_or_else(|| context.root.join("exports"));
            std::fs::create_dir_all(&dir)?;
            let path = dir.join(&file.file_name);
            std::fs::write(&path, &file.bytes)?;
            match file.source {
                ExportSource::Server => println!("✅ Export written to {}", path.display()),
                ExportSource::Client => println!(
                    "✅ Server export unavailable, {} built from {} loaded rows: {}",
                    file.format,
                    state.rows.len(),
                    path.display()
                ),
            }
            Ok(())
        }
    }
}

pub async fn execute(args: ReportArgs, context: &CliContext) -> anyhow::Result<()> {
    context.require_login()?;
    let api = context.api()?;
    let kind = match &args.command {
        ReportCommands::Search(query) => query.report,
        ReportCommands::Export { query, .. } => query.report,
    };
    match kind {
        ReportKind::Messages => run(Arc::new(MessageLogReport::new(api)), args.command, context).await,
        ReportKind::Tracking => run(Arc::new(TrackingReport::new(api)), args.command, context).await,
    }
}
