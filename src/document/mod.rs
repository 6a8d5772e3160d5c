/*!
 * Subtitle document model.
 *
 * - `line`: timed subtitle lines and timestamp formatting
 * - `batch`, `scene`, `file`: the aggregate that owns every line
 * - `batcher`: segmentation of lines into scenes and batches
 * - `editing`: scene, batch and line merges
 * - `serialization`: the tagged JSON project representation
 */

pub mod batch;
pub mod batcher;
pub mod editing;
pub mod file;
pub mod line;
pub mod scene;
pub mod serialization;

pub use batch::{BatchContext, BatchError, BatchErrorKind, BatchStatus, SubtitleBatch};
pub use batcher::{BatchingConfig, SubtitleBatcher};
pub use editing::LineMerge;
pub use file::{ProjectSettings, SubtitleFile};
pub use line::{BatchKey, SubtitleLine, format_timestamp, parse_timestamp};
pub use scene::SubtitleScene;
