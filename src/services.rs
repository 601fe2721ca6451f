pub mod admin_service;
pub use admin_service::AdminService;
pub mod audit_service;
pub use audit_service::AuditService;
pub mod sync_service;
pub use sync_service::SyncService;
