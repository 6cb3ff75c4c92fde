pub mod charts;
pub mod cleaner;
pub mod cli;
pub mod features;
pub mod jobs;
pub mod loader;
pub mod merge;
pub mod metrics;
pub mod output;
pub mod segmentation;
