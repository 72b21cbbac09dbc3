pub mod doctor;
pub mod generate;
