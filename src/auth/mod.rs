mod login;
mod session;

pub use login::{Authenticator, Login};
pub use session::Session;
