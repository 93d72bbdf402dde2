//! Core 1 offload context
//!
//! The dispatcher on core 0 hands work items to core 1 over a small
//! cross-core channel. Core 1 never runs the embassy executor; it blocks on
//! the channel and runs each job with [`execute`], which sets the readiness
//! signal when the job returns.
//!
//! ```ignore
//! use embassy_rp::multicore::{spawn_core1, Stack};
//! use static_cell::StaticCell;
//! use trail_mapper::core::offload::ReadinessSignal;
//! use trail_mapper::platform::rp2350::{core1_worker, Core1Context, HandOff};
//!
//! static CORE1_STACK: StaticCell<Stack<8192>> = StaticCell::new();
//! static HANDOFF: HandOff<RenderJob> = HandOff::new();
//! static READY: ReadinessSignal = ReadinessSignal::new();
//!
//! spawn_core1(p.CORE1, CORE1_STACK.init(Stack::new()), move || {
//!     core1_worker(Renderer::new(panel), &HANDOFF, &READY)
//! });
//! let context = Core1Context::new(&HANDOFF);
//! ```

use crate::core::offload::{execute, OffloadContext, OffloadError, OffloadTarget, ReadinessSignal, WorkItem};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

/// Hand-off channel depth. The dispatcher launches one job at a time, so a
/// full channel means core 1 is not consuming.
pub const HANDOFF_DEPTH: usize = 2;

/// Channel between the dispatcher and core 1
pub type HandOff<J> = Channel<CriticalSectionRawMutex, WorkItem<J>, HANDOFF_DEPTH>;

/// Dispatcher side of the core 1 context
pub struct Core1Context<J: 'static> {
    handoff: &'static HandOff<J>,
}

impl<J: 'static> Core1Context<J> {
    pub fn new(handoff: &'static HandOff<J>) -> Self {
        Self { handoff }
    }
}

impl<J: 'static> OffloadContext<J> for Core1Context<J> {
    fn launch(&mut self, item: WorkItem<J>) -> Result<(), OffloadError> {
        self.handoff.try_send(item).map_err(|TrySendError::Full(_)| {
            crate::log_warn!("Core 1 hand-off full");
            OffloadError::ContextBusy
        })
    }
}

/// Core 1 entry point: run jobs forever
pub fn core1_worker<J, T: OffloadTarget<J>>(
    mut target: T,
    handoff: &'static HandOff<J>,
    ready: &'static ReadinessSignal,
) -> ! {
    crate::log_info!("Core 1 offload worker started");
    loop {
        let item = embassy_futures::block_on(handoff.receive());
        execute(&mut target, item, ready);
    }
}
