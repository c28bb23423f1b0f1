//! Deploy command

use anyhow::{bail, Result};
use deckhand_ipc::{DeploySource, Request, Response};

use crate::cli::DeployArgs;
use crate::commands::{expect_ok, get_client};
use crate::output::{print_app_detail, print_success};

pub async fn execute(args: DeployArgs) -> Result<()> {
    let source = if let Some(path) = &args.archive {
        let data = std::fs::read(path)?;
        DeploySource::Archive { data }
    } else if let Some(url) = &args.git {
        DeploySource::Git {
            url: url.clone(),
            branch: args.branch.clone(),
        }
    } else {
        bail!("specify either --archive <file> or --git <url>");
    };

    let client = get_client();
    let response = client
        .send(&Request::Deploy {
            name: args.name,
            source,
        })
        .await?;

    match expect_ok(response)? {
        Response::Deployed { app } => {
            print_success(&format!(
                "deployed {} on port {} ({})",
                app.name, app.port, app.current_version
            ));
            print_app_detail(&app);
            Ok(())
        }
        _ => bail!("unexpected response from daemon"),
    }
}
