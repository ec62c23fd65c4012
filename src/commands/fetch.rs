use crate::cli::FetchArgs;
use dockerfile_transform::error::Result;
use dockerfile_transform::relay::RelayClient;
use std::io::Write;

/// relay에서 파일 하나를 받아 stdout으로 출력
pub async fn fetch(args: FetchArgs) -> Result<()> {
    let mut client = match &args.addr {
        Some(addr) => RelayClient::connect(addr).await?,
        None => RelayClient::from_env().await?,
    };

    let content = client.fetch(&args.context, &args.filename).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;

    Ok(())
}
