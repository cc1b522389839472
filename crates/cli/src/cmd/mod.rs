mod run;
mod status;
mod verify;

pub use run::cmd_run;
pub use status::cmd_status;
pub use verify::cmd_verify;
