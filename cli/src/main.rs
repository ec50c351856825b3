mod args;
mod run;
mod settings;

use anyhow::Result;
use args::Args;

async fn try_main(args: &Args) -> Result<()> {
    let settings = settings::resolve(args)?;
    run::run(
        &settings,
        &args.bucket_name,
        &args.file_name,
        args.item_name.as_deref(),
    )
    .await
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse_or_exit();
    if let Err(err) = try_main(&args).await {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}
