use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

pub mod campaigns;
pub mod config;
pub mod contacts;
pub mod flow;
pub mod inbox;
pub mod login;
pub mod report;
pub mod status;

use campaigns::CampaignArgs;
use config::ConfigArgs;
use contacts::ContactArgs;
use flow::FlowArgs;
use inbox::InboxArgs;
use login::LoginArgs;
use report::ReportArgs;

use xbytechat::{
    api::ApiClient,
    config::{ClientSettings, ConfigManager},
    notifier::{Notifier, TerminalSink},
    session::{FileTokenStore, Session},
};

#[derive(Parser, Debug)]
#[command(
    name = "xbytechat",
    about = "Admin client for the xByteChat WhatsApp Business platform",
    version = "0.1.0"
)]
pub struct Cli {
    /// Log level directive (e.g. error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Also print logs on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session token
    Login(LoginArgs),

    /// Forget the stored session token
    Logout,

    /// Show session, endpoints and plan
    Status,

    /// Build, check and publish CTA flows
    Flow(FlowArgs),

    /// Realtime inbox
    Inbox(InboxArgs),

    /// Message log and tracking reports
    Report(ReportArgs),

    /// Manage contacts
    Contacts(ContactArgs),

    /// Manage campaigns
    Campaigns(CampaignArgs),

    /// Handle configuration
    Config(ConfigArgs),
}

pub struct CliContext {
    pub root: PathBuf,
    pub config_manager: ConfigManager,
    pub settings: ClientSettings,
    pub session: Arc<Session>,
    pub notifier: Notifier,
}

impl CliContext {
    pub async fn new(root: PathBuf, config_manager: ConfigManager) -> anyhow::Result<Self> {
        let settings = ClientSettings::load(&config_manager)
            .await
            .context("invalid configuration")?;
        let store = FileTokenStore::new(root.join("state").join("session.json"));
        let session = Session::open(Arc::new(store)).context("could not open session")?;
        let notifier = Notifier::new(Arc::new(TerminalSink), settings.notify_cooldown);
        Ok(Self {
            root,
            config_manager,
            settings,
            session,
            notifier,
        })
    }

    pub fn api(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::new(
            &self.settings,
            self.session.clone(),
            self.notifier.clone(),
        )?)
    }

    pub fn require_login(&self) -> anyhow::Result<()> {
        if !self.session.is_authenticated() {
            anyhow::bail!("not logged in, run `xbytechat login` first");
        }
        Ok(())
    }
}

pub async fn execute(context: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login(args) => login::execute(args, context).await,
        Commands::Logout => login::logout(context).await,
        Commands::Status => status::execute(context).await,
        Commands::Flow(args) => flow::execute(args, context).await,
        Commands::Inbox(args) => inbox::execute(args, context).await,
        Commands::Report(args) => report::execute(args, context).await,
        Commands::Contacts(args) => contacts::execute(args, context).await,
        Commands::Campaigns(args) => campaigns::execute(args, context).await,
        Commands::Config(args) => config::execute(args, context).await,
    }
}

pub fn default_command() -> Commands {
    Commands::Status
}
