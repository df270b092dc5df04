mod flag;
pub use flag::Flag;

mod labels;
pub use labels::Labels;

mod constants;
pub use constants::{LABEL_JOB, LABEL_SOURCE, LABEL_TAG};
