//! Task dispatch, deadline enforcement, and bug/SARIF forwarding.

mod control_loop;
mod http;
mod inbound;
mod routines;
mod state;

pub use control_loop::run as run_control_loop;
pub use http::router as http_router;
pub use inbound::run as run_inbound_consumer;
pub use state::SchedulerState;
