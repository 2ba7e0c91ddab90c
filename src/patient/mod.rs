pub mod model;

pub use model::{Age, PatientForm, PatientRecord};
