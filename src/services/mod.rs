pub mod gateway;
pub mod job_store;
pub mod merge;
pub mod pipeline;
pub mod poller;
pub mod progress;
pub mod realtime;
pub mod tracker;
