pub mod branches;
pub mod capacity;
pub mod lifecycle;
pub mod relay;
pub mod reports;
pub mod route;
pub mod tracking;

#[cfg(test)]
pub(crate) mod test_support;
