pub mod ignore;
pub mod timetable;
pub mod walker;

pub use ignore::IgnoreMatcher;
pub use timetable::{file_stamp, ChangeDetector, ChangeRecord, RecordLoad, TIMETABLE_NAME};
pub use walker::{remote_path_for, SyncReport, TreeWalker, WalkOptions};
