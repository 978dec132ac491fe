use soullink::api::v1::*;
use soullink::app::App;
use soullink::domain_model::*;
use soullink::logger::*;
use soullink::settings::*;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let app = App::try_new(&project_settings).await?;

    match cli.command.unwrap_or(Command::Listen) {
        Command::Listen => listen(&app).await?,
        Command::Login { phone } => {
            let response = app
                .auth
                .login(&LoginRequest {
                    phone_number: phone,
                    device_id: DeviceId::new_random(),
                })
                .await?;
            info!(verification_sent = response.verification_sent, "login requested");
        }
        Command::Verify { phone, code } => {
            let response = app
                .auth
                .verify(&VerifyRequest {
                    phone_number: phone,
                    verification_code: code,
                })
                .await?;
            info!(success = response.success, "verification finished");
        }
        Command::Logout => {
            app.auth.logout().await?;
            info!("logged out");
        }
        Command::Presence { status } => {
            let status: PresenceStatus = status.parse().map_err(anyhow::Error::msg)?;
            let response = app.presence.update(status).await?;
            info!(success = response.success, %status, "presence updated");
        }
    }

    let shutdown_timeout = Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, app.shutdown()).await {
        Ok(_) => info!("client shutdown successfully"),
        Err(_) => error!("client shutdown timed out"),
    }

    Ok(())
}

async fn listen(app: &App) -> anyhow::Result<()> {
    if !app.auth.is_authenticated().await {
        return Err(anyhow::anyhow!(
            "not authenticated, run `soullink login` and `soullink verify` first"
        ));
    }

    let subscriptions: Vec<_> = EventKind::ALL
        .into_iter()
        .map(|kind| {
            app.realtime
                .on(kind, move |data| info!(kind = %kind, %data, "realtime event"))
        })
        .collect();

    if !app.realtime.connect().await {
        warn!("realtime session not open yet, reconnecting in the background");
    }

    let mut state = app.realtime.watch_state();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(state = %current, attempts = app.realtime.reconnect_attempts(), "realtime state changed");
            }
        }
    }

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    Ok(())
}
