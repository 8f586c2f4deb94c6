pub mod error;
pub mod file_logging;
pub mod middleware;
pub mod routes;

#[cfg(test)]
pub(crate) mod test_helpers;
