pub mod build_info {
    // Generated by build.rs through the `built` crate
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
pub mod constants;
pub mod run_config;
pub mod segrnn;
pub mod util {
    pub mod device;
    pub mod error;
    pub mod lr_scheduler;
    pub mod metrics;
    pub mod model_logger;
}
