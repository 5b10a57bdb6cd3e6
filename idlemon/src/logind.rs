//! Подписка на события suspend/resume от systemd-logind.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};
use zbus::export::futures_util::StreamExt;

use idlemon_core::power::PowerEvent;

/// Слушать сигнал `PrepareForSleep` менеджера logind и транслировать его
/// в события питания. `true` в теле сигнала — уход в сон, `false` —
/// пробуждение.
///
/// Возвращается с ошибкой, если системной шины нет или подписка не
/// удалась; вызывающая сторона продолжает работу без событий питания.
pub async fn watch_power_events(tx: mpsc::Sender<PowerEvent>) -> Result<()> {
    let connection = zbus::Connection::system()
        .await
        .context("failed to connect to the system D-Bus")?;
    let proxy = zbus::Proxy::new(
        &connection,
        "org.freedesktop.login1",
        "/org/freedesktop/login1",
        "org.freedesktop.login1.Manager",
    )
    .await
    .context("failed to create logind manager proxy")?;
    let mut stream = proxy
        .receive_signal("PrepareForSleep")
        .await
        .context("failed to subscribe to PrepareForSleep")?;
    info!("subscribed to logind PrepareForSleep");

    while let Some(message) = stream.next().await {
        let entering_sleep: bool = match message.body() {
            Ok(flag) => flag,
            Err(e) => {
                debug!("malformed PrepareForSleep body ignored: {e}");
                continue;
            }
        };
        let event = if entering_sleep {
            PowerEvent::Suspend
        } else {
            PowerEvent::Resume
        };
        debug!(?event, "power event from logind");
        if tx.send(event).await.is_err() {
            // Решение уже принято, получатель закрыт.
            break;
        }
    }
    Ok(())
}
