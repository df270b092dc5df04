mod entry;
pub use entry::{CatalogKey, JobCatalogEntry, JobDefinition};

mod spec;
pub use spec::JobSpec;
