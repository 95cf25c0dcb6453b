pub mod articles;
pub mod handlers;
pub mod jobs;
pub mod routes;
pub mod storage;

pub use routes::create_router;
