//! Background refresh of an open board.
//!
//! Polls on a fixed interval; the first refresh happens one interval after
//! start since opening the board already loads it.

use crate::board::BoardController;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs until `cancel` is triggered.
pub async fn run(controller: BoardController, every: Duration, cancel: CancellationToken) {
    info!(
        board_id = controller.board_id(),
        interval_secs = every.as_secs(),
        "board poller started"
    );

    let mut interval = interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(board_id = controller.board_id(), "board poller stopped");
                return;
            }
            _ = interval.tick() => {
                if controller.is_dragging() {
                    debug!("drag in progress, skipping poll");
                    continue;
                }
                controller.silent_refresh().await;
            }
        }
    }
}
