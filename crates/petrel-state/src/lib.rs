pub mod boot;
pub mod clock;
pub mod mode;
pub mod registry;
