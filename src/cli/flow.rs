use std::path::PathBuf;

use clap::{Args, Subcommand};
use tracing::info;

use super::CliContext;
use xbytechat::api::flows;
use xbytechat::flow::{
    FlowEditor, JourneyOutcome, file, load_flow_from_file, save_flow_to_file,
};

#[derive(Args, Debug)]
pub struct FlowArgs {
    #[command(subcommand)]
    pub command: FlowCommands,
}

#[derive(Subcommand, Debug)]
pub enum FlowCommands {
    /// Check a flow file: name, steps, broken links, cycles
    Validate { file: PathBuf },
    /// Walk a flow file from its first step
    Simulate { file: PathBuf },
    /// Save a flow file to the server as draft, or published with --publish
    Push {
        file: PathBuf,
        #[arg(long)]
        publish: bool,
    },
    /// List published flows, or drafts with --drafts
    List {
        #[arg(long)]
        drafts: bool,
    },
    /// Download a flow into a file (.json, .yaml or .yml)
    Pull { id: String, out: PathBuf },
    Delete { id: String },
    /// Write the flow document JSON Schema into <root>/schemas
    Schema {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn describe(outcome: &JourneyOutcome) -> String {
    match outcome {
        JourneyOutcome::Empty => "flow has no steps".to_string(),
        JourneyOutcome::Completed { path } => format!("completed: {}", path.join(" → ")),
        JourneyOutcome::BrokenChain { path, missing } => {
            format!("broken after {}: step `{missing}` does not exist", path.join(" → "))
        }
        JourneyOutcome::Cycle { path, revisited } => {
            format!("cycle: {} → {revisited}", path.join(" → "))
        }
    }
}

pub async fn execute(args: FlowArgs, context: &CliContext) -> anyhow::Result<()> {
    match args.command {
        FlowCommands::Validate { file } => {
            let editor = FlowEditor::open(load_flow_from_file(&file)?);
            let mut problems = 0;
            if let Err(err) = editor.validate() {
                println!("❌ {err}");
                problems += 1;
            }
            for broken in editor.broken_links() {
                println!(
                    "❌ step {} (`{}`) button `{}` points to missing step `{}`",
                    broken.step_order, broken.step_id, broken.button_text, broken.missing_step_id
                );
                problems += 1;
            }
            for cycle in editor.cycles() {
                println!("⚠️  steps loop back on each other: {}", cycle.join(", "));
            }
            for step in xbytechat::flow::graph::unreachable_steps(editor.flow()) {
                println!("⚠️  step `{step}` cannot be reached from the first step");
            }
            if problems == 0 {
                println!("✅ Flow file is valid.");
                Ok(())
            } else {
                anyhow::bail!("{problems} problem(s) found in {}", file.display())
            }
        }
        FlowCommands::Simulate { file } => {
            let editor = FlowEditor::open(load_flow_from_file(&file)?);
            let outcome = editor.simulate_journey();
            println!("{}", describe(&outcome));
            if outcome.is_completed() {
                Ok(())
            } else {
                anyhow::bail!("journey did not complete")
            }
        }
        FlowCommands::Push { file, publish } => {
            context.require_login()?;
            let api = context.api()?;
            let mut editor =
                FlowEditor::open(load_flow_from_file(&file)?).with_notifier(context.notifier.clone());
            let id = editor.save_flow(publish, &api).await?;
            // Keep the server id so the next push updates instead of creating.
            save_flow_to_file(&file, editor.flow())?;
            println!(
                "✅ Flow `{}` {} (id {id}).",
                editor.flow().flow_name,
                if publish { "published" } else { "saved as draft" }
            );
            Ok(())
        }
        FlowCommands::List { drafts } => {
            context.require_login()?;
            let api = context.api()?;
            let list = if drafts {
                flows::list_drafts(&api).await?
            } else {
                flows::list_published(&api).await?
            };
            if list.is_empty() {
                println!("No flows.");
            }
            for flow in list {
                println!(
                    "{}\t{}\t{}",
                    flow.id,
                    flow.flow_name,
                    if flow.is_published { "published" } else { "draft" }
                );
            }
            Ok(())
        }
        FlowCommands::Pull { id, out } => {
            context.require_login()?;
            let api = context.api()?;
            let mut flow = flows::get_flow(&api, &id).await?;
            flow.sort_by_order();
            save_flow_to_file(&out, &flow)?;
            info!(flow_id = %id, out = %out.display(), "flow pulled");
            println!("✅ Flow `{}` written to {}.", flow.flow_name, out.display());
            Ok(())
        }
        FlowCommands::Delete { id } => {
            context.require_login()?;
            flows::delete_flow(&context.api()?, &id).await?;
            println!("✅ Flow `{id}` deleted.");
            Ok(())
        }
        FlowCommands::Schema { out } => {
            let dir = out.unwrap_or_else(|| context.root.join("schemas"));
            let path = file::write_schema(&dir)?;
            println!("Schema written to {}", path.display());
            Ok(())
        }
    }
}
