use clap::{Args, Subcommand};

use super::CliContext;
use xbytechat::api::campaigns;

#[derive(Args, Debug)]
pub struct CampaignArgs {
    #[command(subcommand)]
    pub command: CampaignCommands,
}

#[derive(Subcommand, Debug)]
pub enum CampaignCommands {
    List,
    Show { id: String },
    Send { id: String },
    /// Ask the server to resend every failed message of a campaign
    RetryFailed { id: String },
    Delete { id: String },
}

fn ack_message(message: Option<String>, fallback: &str) -> String {
    message.unwrap_or_else(|| fallback.to_string())
}

pub async fn execute(args: CampaignArgs, context: &CliContext) -> anyhow::Result<()> {
    context.require_login()?;
    let api = context.api()?;
    match args.command {
        CampaignCommands::List => {
            let list = campaigns::list_campaigns(&api).await?;
            if list.is_empty() {
                println!("No campaigns.");
            }
            for campaign in list {
                println!(
                    "{}\t{}\t{}\tsent {} / failed {}",
                    campaign.id,
                    campaign.name,
                    campaign.status.as_deref().unwrap_or("-"),
                    campaign.sent_count,
                    campaign.failed_count
                );
            }
            Ok(())
        }
        CampaignCommands::Show { id } => {
            let campaign = campaigns::get_campaign(&api, &id).await?;
            println!("{}", serde_json::to_string_pretty(&campaign)?);
            Ok(())
        }
        CampaignCommands::Send { id } => {
            let ack = campaigns::send_campaign(&api, &id).await?;
            println!("✅ {}", ack_message(ack.message, "Campaign sent."));
            Ok(())
        }
        CampaignCommands::RetryFailed { id } => {
            let ack = campaigns::retry_failed(&api, &id).await?;
            println!("✅ {}", ack_message(ack.message, "Retry requested."));
            Ok(())
        }
        CampaignCommands::Delete { id } => {
            campaigns::delete_campaign(&api, &id).await?;
            println!("✅ Campaign `{id}` deleted.");
            Ok(())
        }
    }
}
