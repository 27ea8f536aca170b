//! `check`: verify credentials and show the account profile.

use smartwater_core::{Coordinator, Profile};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(p: &Profile) -> String {
    [
        format!("Account:  {}", p.id),
        format!("Name:     {}", p.name.as_deref().unwrap_or("-")),
        format!("Email:    {}", p.email.as_deref().unwrap_or("-")),
        format!("Type:     {}", p.account_type.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

pub async fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let profile = coordinator.setup().await?;
    let out = output::render_single(&global.output, &profile, detail, |p| p.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
