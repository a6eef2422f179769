pub mod check;
pub mod sync;

pub use check::{check_connection, check_with_client, CheckConnectionResult};
pub use sync::{run_sync, sync_with_client};
