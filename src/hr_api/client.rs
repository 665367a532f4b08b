mod collaborators;
mod company;
mod core;
mod payslips;

pub use self::core::HrApiClient;
