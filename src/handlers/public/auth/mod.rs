mod login;
mod refresh;
mod register;

pub use login::login;
pub use refresh::refresh;
pub use register::register;
