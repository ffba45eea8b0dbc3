use std::sync::Arc;

use anyhow::Context;
use stream_core::{SessionView, SubmitError};
use stream_engine::{Channel, SessionController, WsChannel};
use stream_logging::{stream_info, stream_warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::ClientConfig;
use super::ui::render::TerminalRenderer;

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Submit(&'a str),
    Reconnect,
    Quit,
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        ":quit" | ":q" => Input::Quit,
        ":reconnect" => Input::Reconnect,
        _ => Input::Submit(line),
    }
}

pub async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let channel = Arc::new(WsChannel::new(config.channel_settings()));
    // Bound before connecting so the `connect` notification reaches the controller.
    let controller = SessionController::new(channel.clone(), config.controller_settings());
    channel
        .connect(&config.endpoint)
        .await
        .with_context(|| format!("connecting to {}", config.endpoint))?;

    let renderer = spawn_renderer(controller.subscribe());
    println!("type text and press enter to process it; :reconnect, :quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Reconnect => {
                if let Err(err) = channel.connect(&config.endpoint).await {
                    stream_warn!("reconnect failed: {}", err);
                    println!("! reconnect failed: {err}");
                }
            }
            Input::Submit(text) => match controller.submit(text) {
                Ok(()) => {}
                Err(SubmitError::Validation) => println!("! input cannot be empty"),
                Err(err @ SubmitError::Conflict { .. }) => {
                    println!("! {err}; wait for it to finish")
                }
            },
        }
    }

    // Input closed; give a running job the chance to finish.
    tokio::select! {
        _ = wait_until_idle(controller.subscribe()) => {}
        _ = tokio::signal::ctrl_c() => stream_info!("interrupted while waiting for the job"),
    }
    controller.shutdown().await;
    // Dropping the last controller handle closes the view channel; the
    // renderer prints whatever is pending and exits.
    drop(controller);
    let _ = renderer.await;
    Ok(())
}

fn spawn_renderer(mut views: watch::Receiver<SessionView>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut renderer = TerminalRenderer::new();
        loop {
            let view = views.borrow_and_update().clone();
            for line in renderer.render(&view) {
                println!("{line}");
            }
            // Ends once the controller, and with it the sender, is gone.
            if views.changed().await.is_err() {
                break;
            }
        }
    })
}

async fn wait_until_idle(mut views: watch::Receiver<SessionView>) {
    loop {
        if !views.borrow_and_update().busy {
            return;
        }
        if views.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_recognized() {
        assert_eq!(parse_input(":quit"), Input::Quit);
        assert_eq!(parse_input("  :q "), Input::Quit);
        assert_eq!(parse_input(":reconnect"), Input::Reconnect);
        assert_eq!(parse_input("hello world"), Input::Submit("hello world"));
        assert_eq!(parse_input("  "), Input::Submit("  "));
    }
}
