mod key;
pub use key::TagKey;

mod info;
pub use info::{SourceRef, TagInfo};

mod change;
pub use change::{ChangeKind, TagChange};

mod request;
pub use request::{EnqueueReason, ReconcileRequest};
