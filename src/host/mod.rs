//! Native messaging host. The extension starts this process and talks to it over stdio; the
//! session core runs here against a mirror of the browser state.

pub mod args;
pub mod messages;
pub mod mirror;
pub mod protocol;
pub mod shutdown;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Settings,
    coordinator::{
        command::{BrowserEvent, Command, Lifecycle, Response},
        handle::{channel, CoordinatorHandle},
        Platform, SessionCoordinator,
    },
    platform::{KeyValueStore, Tab, WindowId},
    storage::json_store::JsonFileStore,
    utils::{
        clock::{Clock, DefaultClock},
        dir::store_path,
    },
};

use args::HostArgs;

use messages::{request_id_of, Inbound, Outbound};
use mirror::MirrorBrowser;

const OUTBOUND_CAPACITY: usize = 32;

/// Runs the host on the process stdio with the store inside `app_dir`.
pub async fn serve(args: &HostArgs, app_dir: &Path) -> Result<()> {
    let settings = args.settings()?;
    let store = Arc::new(JsonFileStore::new(store_path(app_dir))?);
    info!("Serving extension {:?}", args.origin);
    run(
        tokio::io::stdin(),
        tokio::io::stdout(),
        store,
        Arc::new(DefaultClock),
        settings,
    )
    .await
}

/// Serves one extension connection until it closes or the process is interrupted.
pub async fn run(
    input: impl AsyncRead + Unpin,
    output: impl AsyncWrite + Unpin,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    settings: Settings,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    let (outbound, outbound_receiver) = mpsc::channel(OUTBOUND_CAPACITY);
    let browser = Arc::new(MirrorBrowser::new(outbound.clone()));

    let platform = Platform {
        store,
        tabs: browser.clone(),
        rules: browser.clone(),
        clock,
    };
    info!("Blocked pages redirect to {}", settings.block_page_url());
    let coordinator = SessionCoordinator::new(platform, &settings);
    let (handle, inputs) = channel();

    let (_, read_result, write_result, coordinator_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown.clone()),
        read_messages(input, handle, browser, outbound, shutdown.clone()),
        write_messages(output, outbound_receiver, shutdown.clone()),
        coordinator.run(inputs, shutdown.clone()),
    );

    if let Err(e) = &read_result {
        error!("Reading from the extension failed {e:?}");
    }
    if let Err(e) = &write_result {
        error!("Writing to the extension failed {e:?}");
    }
    if let Err(e) = &coordinator_result {
        error!("Session coordinator failed {e:?}");
    }
    read_result.and(write_result).and(coordinator_result)
}

async fn read_messages(
    mut input: impl AsyncRead + Unpin,
    handle: CoordinatorHandle,
    browser: Arc<MirrorBrowser>,
    outbound: mpsc::Sender<Outbound>,
    shutdown: CancellationToken,
) -> Result<()> {
    let result = read_until_closed(&mut input, &handle, &browser, &outbound, &shutdown).await;
    shutdown.cancel();
    result
}

async fn read_until_closed(
    mut input: impl AsyncRead + Unpin,
    handle: &CoordinatorHandle,
    browser: &MirrorBrowser,
    outbound: &mpsc::Sender<Outbound>,
    shutdown: &CancellationToken,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            frame = protocol::read_frame(&mut input) => frame?,
        };
        let Some(frame) = frame else {
            info!("Extension closed the connection");
            return Ok(());
        };
        dispatch(&frame, handle, browser, outbound).await;
    }
}

async fn dispatch(
    frame: &[u8],
    handle: &CoordinatorHandle,
    browser: &MirrorBrowser,
    outbound: &mpsc::Sender<Outbound>,
) {
    let raw: Value = match serde_json::from_slice(frame) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Dropping malformed message: {e}");
            return;
        }
    };
    let message: Inbound = match serde_json::from_value(raw.clone()) {
        Ok(message) => message,
        Err(e) => {
            warn!("Unrecognized message {raw}: {e}");
            if let Some(request_id) = request_id_of(&raw) {
                send(
                    outbound,
                    Outbound::Response {
                        request_id,
                        response: Response::failure(format!("Malformed request: {e}")),
                    },
                )
                .await;
            }
            return;
        }
    };

    debug!("Received {:?}", message);
    match message {
        Inbound::TabActivated { tab_id, window_id } => {
            browser.activate_tab(tab_id, window_id);
            handle
                .send_event(BrowserEvent::TabActivated { tab: tab_id })
                .await;
        }
        Inbound::TabUpdated { tab } => {
            let id = tab.id;
            let url = tab.url.clone();
            if browser.update_tab(tab) {
                if let Some(url) = url {
                    handle
                        .send_event(BrowserEvent::TabNavigated { tab: id, url })
                        .await;
                }
            }
        }
        Inbound::TabRemoved { tab_id } => browser.remove_tab(tab_id),
        Inbound::WindowFocusChanged { window_id } => {
            let focused = browser.focus_window(window_id);
            handle
                .send_event(BrowserEvent::WindowFocusChanged { focused })
                .await;
        }
        Inbound::IdleStateChanged { state } => {
            handle
                .send_event(BrowserEvent::IdleStateChanged { state })
                .await;
        }
        Inbound::Startup {
            tabs,
            focused_window_id,
        } => start_over(Lifecycle::Startup, tabs, focused_window_id, handle, browser).await,
        Inbound::Installed {
            tabs,
            focused_window_id,
        } => start_over(Lifecycle::Installed, tabs, focused_window_id, handle, browser).await,
        Inbound::SessionRules { rules } => browser.replace_rules(rules),
        Inbound::AddBlock { request_id, domain } => {
            answer(request_id, Command::AddBlock { domain }, handle, outbound)
        }
        Inbound::RemoveBlock { request_id, domain } => {
            answer(request_id, Command::RemoveBlock { domain }, handle, outbound)
        }
        Inbound::ResetSession { request_id } => {
            answer(request_id, Command::ResetSession, handle, outbound)
        }
    }
}

/// The snapshot is the only focus report the tracker gets until the user switches windows.
async fn start_over(
    lifecycle: Lifecycle,
    tabs: Vec<Tab>,
    focused_window: Option<WindowId>,
    handle: &CoordinatorHandle,
    browser: &MirrorBrowser,
) {
    let focused = browser.replace_tabs(tabs, focused_window);
    handle.send_lifecycle(lifecycle).await;
    handle
        .send_event(BrowserEvent::WindowFocusChanged { focused })
        .await;
}

/// Executes a ui request on a separate task, so events keep flowing while the command waits its
/// turn in the queue.
fn answer(
    request_id: Value,
    command: Command,
    handle: &CoordinatorHandle,
    outbound: &mpsc::Sender<Outbound>,
) {
    let handle = handle.clone();
    let outbound = outbound.clone();
    tokio::spawn(async move {
        let response = handle.execute(command).await;
        send(
            &outbound,
            Outbound::Response {
                request_id,
                response,
            },
        )
        .await;
    });
}

async fn send(outbound: &mpsc::Sender<Outbound>, message: Outbound) {
    if outbound.send(message).await.is_err() {
        warn!("Connection to the extension is closed, message dropped");
    }
}

/// Drains outbound messages until every sender is gone. On a write failure the host is shut
/// down, remaining messages are discarded.
async fn write_messages(
    mut output: impl AsyncWrite + Unpin,
    mut messages: mpsc::Receiver<Outbound>,
    shutdown: CancellationToken,
) -> Result<()> {
    while let Some(message) = messages.recv().await {
        let data = serde_json::to_vec(&message)?;
        if let Err(e) = protocol::write_frame(&data, &mut output).await {
            shutdown.cancel();
            messages.close();
            return Err(e.into());
        }
    }
    Ok(())
}
