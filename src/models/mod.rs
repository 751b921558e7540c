//! Data models for munidata.

mod record;
mod run;

pub use record::{CanonicalRecord, HonorariumRecord, RawRow, RecordKind, StaffRecord};
pub use run::{cap_error_text, org_code, EngineKind, NewRun, Run, RunStatus, ERROR_TEXT_CAP};
