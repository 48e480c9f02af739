//! Application layer use cases for the bridge.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules) and the infrastructure (serial port, sockets, files).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects and the token registry to fulfil a goal
//!   (e.g., "turn this HTTP query into exactly one bus read and route the
//!   answer back to whoever asked").
//! - **Depend on abstractions** (the traits in [`ports`]) rather than
//!   concrete implementations, so the RTU driver or the Wi-Fi backend can be
//!   swapped without touching this code.
//! - **Contain no serial I/O, no socket I/O, no file system access**.
//!
//! # Sub-modules
//!
//! - **`ports`** – The traits the infrastructure implements: bus driver,
//!   response handler, credentials store, Wi-Fi backend, reply sink.
//!
//! - **`translator`** – Validates an inbound request, mints a token, registers
//!   the caller and submits the transaction.
//!
//! - **`dispatcher`** – Receives the driver's callbacks, finds the waiting
//!   caller by token and hands it the formatted reply.
//!
//! - **`device_state`** – The provisioning / operational state machine.
//!
//! - **`scan_cache`** – Background Wi-Fi scan results for the provisioning UI.

pub mod device_state;
pub mod dispatcher;
pub mod ports;
pub mod scan_cache;
pub mod translator;

pub use device_state::{
    evaluate_boot, BootDecision, OperationalSession, ProvisioningError, ProvisioningSession,
    RestartReason, RestartRequest,
};
pub use dispatcher::ResponseDispatcher;
pub use ports::{
    BusDriver, CredentialStore, CredentialStoreError, ReplySink, ResponseHandler, SubmitError,
    WifiBackend, WifiError,
};
pub use scan_cache::ScanCache;
pub use translator::{RawRequest, RequestTranslator, TranslateError};
