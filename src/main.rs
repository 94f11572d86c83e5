use envoy_display::{
    config::certificate_path_from_env, display_loop, establish_session, CredentialStore, Display,
    EnphaseAuthentication, Error, Gateway, YoctoDisplay,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Starting Envoy display bridge");
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Error> {
    let store = CredentialStore::from_env();
    let config = store.load()?;

    let hub_url = config.yoctopuce_url.clone();
    let mut display = YoctoDisplay::first_display(&hub_url)
        .await
        .map_err(|e| Error::Hardware(format!("Unable to connect to {hub_url} ({e:#})")))?
        .ok_or_else(|| Error::Hardware(format!("No Yocto-MaxiDisplay connected on {hub_url}")))?;
    let prepare = async {
        display.reset_all().await?;
        display.clear().await
    };
    prepare
        .await
        .map_err(|e: anyhow::Error| Error::Hardware(format!("{e:#}")))?;

    let mut credentials = config.credentials.clone();
    let gateway = Gateway::new(credentials.gateway_host());
    let session = establish_session(
        &mut credentials,
        &mut EnphaseAuthentication::new(),
        &gateway,
        &certificate_path_from_env(),
        |refreshed| {
            let mut updated = config.clone();
            updated.credentials = refreshed.clone();
            store.save(&updated)
        },
    )
    .await?;

    display_loop::run(&session, &mut display, display_loop::REFRESH_INTERVAL).await
}
