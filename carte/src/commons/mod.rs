pub mod basic_functions;
pub mod config;
pub mod error;

#[cfg(test)]
pub(crate) mod test_server;
