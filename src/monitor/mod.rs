pub mod due_check;
pub mod fetcher;
pub mod scheduler;
pub mod sweep;

#[cfg(test)]
pub(crate) mod test_support;
