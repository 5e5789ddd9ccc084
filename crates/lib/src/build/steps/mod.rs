//! Concrete pipeline steps, in pipeline order.

mod bootstrap;
mod commit;
mod connect;
mod export;
mod generated_data;
mod provision;
mod pull;
mod run;
mod set_defaults;
mod temp_dir;

pub use bootstrap::StepBootstrap;
pub use commit::StepCommit;
pub use connect::StepConnect;
pub use export::StepExport;
pub use generated_data::StepDefaultGeneratedData;
pub use provision::StepProvision;
pub use pull::StepPull;
pub use run::StepRun;
pub use set_defaults::{StepSetDefaults, default_changes};
pub use temp_dir::StepTempDir;
