pub mod applications;
pub mod automation;
pub mod platforms;
pub mod tracking;
