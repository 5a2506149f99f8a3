//! `oauth-ssh ssh ...` / `oauth-ssh scp ...`

use super::AppContext;
use crate::error::{Error, Result};
use crate::local::{run_wrapped, scp_host, ssh_host};

async fn wrap(ctx: &AppContext, program: &'static str, host: Option<String>, args: Vec<String>) -> Result<u32> {
    let host = host.ok_or(Error::MissingHost(program))?;
    let access_token = ctx.tokens.find_access_token(&host).await?;

    let code = tokio::task::spawn_blocking(move || run_wrapped(program, args, &access_token))
        .await
        .map_err(std::io::Error::other)??;
    Ok(code)
}

pub async fn ssh(ctx: &AppContext, args: Vec<String>) -> Result<u32> {
    let host = ssh_host(&args);
    wrap(ctx, "ssh", host, args).await
}

pub async fn scp(ctx: &AppContext, args: Vec<String>) -> Result<u32> {
    let host = scp_host(&args);
    wrap(ctx, "scp", host, args).await
}
