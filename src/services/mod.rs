pub mod outcome;
pub mod progress;

pub use outcome::{finalize, BatchOutcome, BatchStatus, ProgressSnapshot, SharedProgress, WorkerEnd, WorkerResult};
pub use progress::{spawn_writer, OutputChannel, ProgressEmitter, ProgressFields, ProgressType};
