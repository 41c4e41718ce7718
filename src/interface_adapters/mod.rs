// Interface adapters: wire protocol, network handling and HTTP routes.

pub mod net;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod utils;
