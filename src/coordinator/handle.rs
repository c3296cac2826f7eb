use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use super::command::{BrowserEvent, Command, Input, Lifecycle, Response};

const QUEUE_CAPACITY: usize = 64;

/// Cloneable sender side of the coordinator queue.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<Input>,
}

pub fn channel() -> (CoordinatorHandle, mpsc::Receiver<Input>) {
    let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
    (CoordinatorHandle { sender }, receiver)
}

impl CoordinatorHandle {
    /// Queues a command and waits for its response. Always produces exactly one response, a
    /// failure one if the coordinator has stopped.
    pub async fn execute(&self, command: Command) -> Response {
        let (reply, response) = oneshot::channel();
        if self
            .sender
            .send(Input::Command { command, reply })
            .await
            .is_err()
        {
            return Response::failure("Session coordinator is not running");
        }
        response
            .await
            .unwrap_or_else(|_| Response::failure("Session coordinator dropped the request"))
    }

    pub async fn send_event(&self, event: BrowserEvent) {
        if self.sender.send(Input::Browser(event)).await.is_err() {
            warn!("Browser event dropped, coordinator is not running");
        }
    }

    pub async fn send_lifecycle(&self, lifecycle: Lifecycle) {
        if self.sender.send(Input::Lifecycle(lifecycle)).await.is_err() {
            warn!("Lifecycle signal dropped, coordinator is not running");
        }
    }
}
