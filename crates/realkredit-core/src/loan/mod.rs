pub mod analysis;
pub mod inputs;
pub mod model;
pub mod schedule;

pub use inputs::LoanInputs;
pub use model::LoanModel;
pub use schedule::{Period, Schedule, ScheduleRow};
