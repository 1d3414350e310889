use crossfire::{MRx, MTx, Rx, TryRecvError, TrySendError, detect_backoff_cfg, mpmc, mpsc};
use logfall_core::{ControlCommand, LogEvent};
use logfall_sim::FunnelWorld;
use std::sync::Arc;
use tracing::{debug, warn};

pub type EventSender = MTx<LogEvent>;
pub type EventReceiver = Rx<LogEvent>;
pub type CommandSender = MTx<ControlCommand>;
pub type CommandReceiver = MRx<ControlCommand>;
pub type CommandDrain = Arc<dyn Fn(&mut FunnelWorld) + Send + Sync>;
pub type CommandSubmit = Arc<dyn Fn(ControlCommand) -> bool + Send + Sync>;

/// Handoff queue between the ingestion thread and the frame loop.
///
/// Unbounded: a burst of log lines queues up instead of being dropped, and
/// the `max_entities` cap downstream stays a purely visual policy.
pub fn create_event_queue() -> (EventSender, EventReceiver) {
    detect_backoff_cfg();
    mpsc::unbounded_blocking()
}

pub fn create_command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_blocking(capacity)
}

/// Drain every currently queued event into the world without blocking.
/// Returns the number of events ingested.
pub fn drain_pending_events(receiver: &EventReceiver, world: &mut FunnelWorld) -> usize {
    let mut drained = 0;
    loop {
        match receiver.try_recv() {
            Ok(event) => {
                world.ingest(&event);
                drained += 1;
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
    drained
}

pub fn drain_pending_commands(receiver: &CommandReceiver, world: &mut FunnelWorld) {
    loop {
        match receiver.try_recv() {
            Ok(command) => {
                debug!(?command, "applying control command");
                world.apply_command(command);
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
}

pub fn make_command_drain(receiver: CommandReceiver) -> CommandDrain {
    let receiver = Arc::new(receiver);
    Arc::new(move |world: &mut FunnelWorld| {
        drain_pending_commands(&receiver, world);
    })
}

pub fn make_command_submit(sender: CommandSender) -> CommandSubmit {
    let sender = Arc::new(sender);
    Arc::new(
        move |command: ControlCommand| match sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                warn!(?cmd, "control command queue full; dropping command");
                false
            }
            Err(TrySendError::Disconnected(cmd)) => {
                warn!(?cmd, "control command queue disconnected");
                false
            }
        },
    )
}
