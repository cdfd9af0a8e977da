//! Record types for the hosted store tables and the read-models
//! assembled from them.

mod billing;
mod business;
mod call;
mod dashboard;
mod profile;
mod relation;
mod review;
mod support;

pub use billing::{
    InvoiceRecord, PlanRecord, PlanSummary, SubscriptionRecord, SubscriptionRow,
    SubscriptionStatus,
};
pub use business::{BusinessRecord, BusinessSummary};
pub use call::CallRecord;
pub use dashboard::{DashboardStats, MonthlyTotal};
pub use profile::{Profile, SubscriptionDetail, UsageStats, UserDetail, UserSummary};
pub use relation::OneOrMany;
pub use review::{ReviewRecord, ReviewRow};
pub use support::{
    DocumentStatus, KnowledgeDocument, MessageRole, SupportTicket, TicketMessage, TicketPriority,
    TicketStatus,
};

pub(crate) use billing::SubscriptionWire;
pub(crate) use profile::{ProfileWire, UserSubscriptionWire};
pub(crate) use review::ReviewWire;
