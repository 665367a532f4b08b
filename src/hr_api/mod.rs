mod client;
pub mod types;

pub use client::HrApiClient;
pub use types::{Collaborator, CollaboratorStatus, Company, PayslipRecord};
