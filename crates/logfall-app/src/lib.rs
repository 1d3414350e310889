//! Shared application plumbing for the logfall surfaces.

use std::sync::{Arc, Mutex};

use logfall_sim::FunnelWorld;

pub type SharedWorld = Arc<Mutex<FunnelWorld>>;

pub mod command;
pub mod ingest;
pub mod terminal;

pub mod renderer {
    use anyhow::Result;

    use crate::SharedWorld;
    use crate::command::{CommandDrain, CommandSubmit, EventReceiver};

    /// Shared context passed to renderer implementations.
    pub struct RendererContext {
        pub world: SharedWorld,
        /// Receiving end of the ingestion handoff queue; the frame loop is
        /// its single consumer.
        pub events: EventReceiver,
        pub command_drain: CommandDrain,
        pub command_submit: CommandSubmit,
    }

    pub trait Renderer {
        /// Stable identifier describing the renderer implementation.
        fn name(&self) -> &'static str;

        /// Launch the renderer; blocks until the rendering session completes.
        fn run(&self, ctx: RendererContext) -> Result<()>;
    }
}

pub use command::{
    CommandDrain, CommandReceiver, CommandSender, CommandSubmit, EventReceiver, EventSender,
    create_command_bus, create_event_queue, drain_pending_commands, drain_pending_events,
    make_command_drain, make_command_submit,
};
