mod handler;
mod model;

pub use handler::{login, profile, register};
pub use model::{LoginRequest, LoginResponse, RegisterRequest, User, UserProfile};
