use super::CliContext;
use xbytechat::api::{ApiRequest, RequestOptions, plans};

pub async fn execute(context: &CliContext) -> anyhow::Result<()> {
    let settings = &context.settings;
    println!("root:     {}", context.root.display());
    println!("api:      {}", settings.api_url);
    println!("hub:      {}", settings.hub_url);
    println!(
        "session:  {}",
        if context.session.is_authenticated() {
            "logged in"
        } else {
            "logged out"
        }
    );

    if context.session.is_authenticated() {
        let api = context.api()?;
        let request = ApiRequest::get("/plan/me")
            .options(RequestOptions::suppress_auth_redirect());
        match api.call::<plans::Plan>(request).await {
            Ok(plan) => println!("plan:     {}", plan.name),
            Err(err) => println!("plan:     unavailable ({err})"),
        }
    }
    Ok(())
}
