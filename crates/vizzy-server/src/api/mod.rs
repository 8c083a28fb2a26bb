mod chat;
mod meta;
mod router;
mod session;

pub use router::create_router;
