pub mod audit;
pub mod handlers;
pub mod middleware;
pub mod playback;
pub mod routes;
pub mod ws;

pub use middleware::{CallerId, USER_ID_HEADER};
pub use routes::create_router;
pub use ws::WsMessage;
