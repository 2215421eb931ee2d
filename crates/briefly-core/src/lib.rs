pub mod api_key;
pub mod article;
pub mod category;
pub mod error;
pub mod frequency;
pub mod preferences;
pub mod schedule;

pub use article::Article;
pub use error::ValidationError;
pub use frequency::Frequency;
pub use preferences::{NewPreferences, Preferences, SubmitPreferences};
pub use schedule::{CycleRequest, ScheduleEvent, ScheduleUpdate};
