// Handlers module - API endpoint handlers

pub mod proxy;
pub mod token;
