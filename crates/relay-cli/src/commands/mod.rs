pub mod dispatch;
pub mod history;
pub mod records;
pub mod run;
pub mod run_all;
pub mod shared;
pub mod watch;
