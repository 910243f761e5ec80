mod auth;
mod workout_day;

pub use auth::Login;
pub use workout_day::WorkoutDay;
