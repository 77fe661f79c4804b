use clap::{Args, Subcommand};

use super::CliContext;
use xbytechat::api::contacts::{self, NewContact};

#[derive(Args, Debug)]
pub struct ContactArgs {
    #[command(subcommand)]
    pub command: ContactCommands,
}

#[derive(Subcommand, Debug)]
pub enum ContactCommands {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    Add {
        name: String,
        phone: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Delete { id: String },
}

pub async fn execute(args: ContactArgs, context: &CliContext) -> anyhow::Result<()> {
    context.require_login()?;
    let api = context.api()?;
    match args.command {
        ContactCommands::List {
            search,
            page,
            page_size,
        } => {
            let result = contacts::list_contacts(&api, page, page_size, search.as_deref()).await?;
            for contact in &result.items {
                println!("{}\t{}\t{}", contact.id, contact.name, contact.phone_number);
            }
            println!("page {} of {}", result.page, result.total_pages().max(1));
            Ok(())
        }
        ContactCommands::Add {
            name,
            phone,
            email,
            tags,
        } => {
            let contact = NewContact {
                name,
                phone_number: phone,
                email,
                tags,
            };
            let created = contacts::create_contact(&api, &contact).await?;
            println!("✅ Contact `{}` created (id {}).", created.name, created.id);
            Ok(())
        }
        ContactCommands::Delete { id } => {
            contacts::delete_contact(&api, &id).await?;
            println!("✅ Contact `{id}` deleted.");
            Ok(())
        }
    }
}
