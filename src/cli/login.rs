use std::io::{BufRead, Write};

use anyhow::Context;
use clap::Args;

use super::CliContext;
use xbytechat::api::auth;

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Read from stdin when omitted
    #[arg(long)]
    pub password: Option<String>,
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("could not read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn execute(args: LoginArgs, context: &CliContext) -> anyhow::Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => read_password()?,
    };
    let api = context.api()?;
    let response = auth::login(&api, &args.email, &password).await?;
    match response.role {
        Some(role) => println!("✅ Logged in as {} ({role}).", args.email),
        None => println!("✅ Logged in as {}.", args.email),
    }
    Ok(())
}

pub async fn logout(context: &CliContext) -> anyhow::Result<()> {
    auth::logout(&context.api()?)?;
    println!("✅ Logged out.");
    Ok(())
}
