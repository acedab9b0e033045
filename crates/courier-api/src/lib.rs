pub mod auth;
pub mod datetime;
pub mod error;
pub mod events;
pub mod messages;
pub mod middleware;
pub mod recurring;
pub mod routes;
pub mod settings;
pub mod state;
pub mod users;

#[cfg(test)]
mod test_support;
