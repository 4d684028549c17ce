pub mod admission;
pub mod audit;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod metrics;
pub mod playback;
pub mod relay;
pub mod testing;

pub use admission::{
    Admission, AdmissionGate, CooldownError, CooldownStore, SqliteCooldownStore, UserId,
};
pub use audit::{
    create_audit_system, AuditEvent, AuditFilter, AuditHandle, AuditRecord, AuditStore,
    SqliteAuditStore,
};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthenticatedClient, Authenticator,
    Credentials, NoneAuthenticator,
};
pub use catalog::{Candidate, CatalogError, CatalogSource, HttpCatalog};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, SanitizedConfig,
};
pub use playback::{
    create_playback_system, CandidateResolver, NowPlaying, PlaybackConfig, PlaybackError,
    PlaybackEvent, PlaybackHandle, PlaybackStatus, StopOutcome, Trigger,
};
pub use relay::{FfmpegRelay, RelayExit, RelaySupervisor};
