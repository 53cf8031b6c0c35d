pub mod form_spec;
pub mod report;
pub mod store;

pub use form_spec::{load_form_specs, FieldType, FormSpec, FormSpecs};
pub use report::{AssetRecord, MacroLocation, ReportRecord, SubmitState};
pub use store::{DocumentStore, JsonFileStore, MemoryStore, ReportStamp, UpdateResult};
