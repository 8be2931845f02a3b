//! Termination signals as engine input

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::Message;
use sair_core::prelude::*;

/// Forward the first SIGINT/SIGTERM (Ctrl+C on Windows) as `Message::Quit`.
///
/// The task ends after one signal; a second Ctrl+C falls through to the
/// default handler and kills the process.
pub fn spawn_signal_handler(tx: mpsc::Sender<Message>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match termination().await {
            Ok(name) => {
                info!("Received {}, shutting down", name);
                let _ = tx.send(Message::Quit).await;
            }
            Err(e) => error!("{}", e),
        }
    })
}

#[cfg(unix)]
async fn termination() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let listen = |kind: SignalKind, name: &str| {
        signal(kind).map_err(|e| Error::signal(format!("cannot listen for {name}: {e}")))
    };
    let mut interrupt = listen(SignalKind::interrupt(), "SIGINT")?;
    let mut terminate = listen(SignalKind::terminate(), "SIGTERM")?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    };
    Ok(name)
}

#[cfg(windows)]
async fn termination() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::signal(format!("cannot listen for Ctrl+C: {e}")))?;
    Ok("Ctrl+C")
}
