pub mod compile;
pub mod error;
pub mod loader;
pub mod reader;
pub mod resources;
pub mod runtime;

pub use error::{CompileError, Result};
pub use loader::{FileFetcher, Loader};
pub use resources::{DocumentFetcher, MediaLoader, Resources};
pub use runtime::world::Scene;
