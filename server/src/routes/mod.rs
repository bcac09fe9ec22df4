pub mod api;
pub mod compute;
