pub mod capture_logger;
pub mod capture_task;
pub mod control_watcher;
pub mod device_state;
pub mod shutdown;
pub mod status_reporter;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;
