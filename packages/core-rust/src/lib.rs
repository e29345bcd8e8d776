//! `LdapTools` Core — operation model, directory types, and the collaborator
//! traits the operation invoker is built against.

pub mod clock;
pub mod config;
pub mod error;
pub mod log;
pub mod operation;
pub mod traits;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::DomainConfig;
pub use error::{ConnectionError, OperationError};
pub use log::{LogEntry, LogSink};
pub use operation::{
    AddOperation, AuthenticationOperation, DeleteOperation, ModifyOperation, Operation,
    QueryOperation, RenameOperation,
};
pub use traits::{Connection, EventDispatcher, OperationEvent};
pub use types::{
    AuthenticationResponse, Credentials, Entry, Modification, ModificationKind,
    OperationResponse, SearchPage, SearchRequest, SearchScope,
};
