pub mod doctor;
pub mod environment;
