// Mappers - upstream / error -> client response

pub mod response;

pub use response::{json_error, json_relay, plain_error, relay_upstream};
